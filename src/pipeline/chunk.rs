//! Chunking: split page text into overlapping excerpts for retrieval.
//!
//! Excerpts never cross a page boundary, so every retrieved excerpt cites
//! exactly one page. Sizes are counted in characters rather than bytes since
//! Japanese text is three bytes per character in UTF-8.

use crate::pipeline::extract::PageText;

/// One retrievable excerpt of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub page_label: String,
    pub text: String,
}

/// Characters after which a chunk may end cleanly.
const BREAK_CHARS: &[char] = &['。', '．', '！', '？', '.', '!', '?', '\n'];

/// Split every page into chunks of at most `chunk_chars` characters, with
/// `overlap` characters repeated between neighbours of the same page.
///
/// `overlap` must be smaller than `chunk_chars`.
pub fn chunk_pages(pages: &[PageText], chunk_chars: usize, overlap: usize) -> Vec<Chunk> {
    pages
        .iter()
        .flat_map(|page| {
            split_text(&page.text, chunk_chars, overlap)
                .into_iter()
                .map(move |text| Chunk {
                    page_label: page.label.clone(),
                    text,
                })
        })
        .collect()
}

/// Split one text. A chunk ends at the last sentence break in its second
/// half when there is one, otherwise at the hard size limit.
pub fn split_text(text: &str, chunk_chars: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_chars = chunk_chars.max(1);
    let overlap = overlap.min(chunk_chars - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_chars).min(chars.len());
        let end = if hard_end < chars.len() {
            find_break(&chars, start + chunk_chars / 2, hard_end).unwrap_or(hard_end)
        } else {
            hard_end
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Position just after the last break character in `chars[from..to]`.
fn find_break(chars: &[char], from: usize, to: usize) -> Option<usize> {
    (from..to)
        .rev()
        .find(|&i| BREAK_CHARS.contains(&chars[i]))
        .map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(label: &str, text: &str) -> PageText {
        PageText {
            label: label.into(),
            text: text.into(),
        }
    }

    #[test]
    fn short_page_is_one_chunk() {
        let chunks = chunk_pages(&[page("1", "猫は動物です。")], 100, 10);
        assert_eq!(
            chunks,
            vec![Chunk {
                page_label: "1".into(),
                text: "猫は動物です。".into()
            }]
        );
    }

    #[test]
    fn empty_pages_produce_no_chunks() {
        assert!(chunk_pages(&[page("1", ""), page("2", "   ")], 100, 10).is_empty());
    }

    #[test]
    fn chunks_stay_within_their_page() {
        let chunks = chunk_pages(&[page("1", "あいう"), page("ii", "えお")], 100, 10);
        let labels: Vec<_> = chunks.iter().map(|c| c.page_label.as_str()).collect();
        assert_eq!(labels, vec!["1", "ii"]);
    }

    #[test]
    fn long_text_splits_at_sentence_breaks() {
        let text = "一文目です。二文目です。三文目です。";
        let chunks = split_text(text, 10, 0);
        assert_eq!(chunks, vec!["一文目です。", "二文目です。", "三文目です。"]);
    }

    #[test]
    fn hard_split_respects_size_and_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = split_text(text, 10, 3);
        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert!(chunks.last().unwrap().ends_with('z'));
    }
}
