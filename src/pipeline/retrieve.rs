//! Retrieval: nearest-neighbour search over excerpt embeddings.
//!
//! Every excerpt is embedded once when the document is indexed and inserted
//! into an HNSW graph with cosine distance. A question is embedded the same
//! way and the `top_k` closest excerpts are returned, best first. Like a
//! vector store's similarity search, a query always returns up to `top_k`
//! excerpts even when none is a good match.

use crate::pipeline::chunk::Chunk;
use hnsw_rs::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

/// A chunk selected for a question, with its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// HNSW index over a document's chunk embeddings.
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    hnsw: Hnsw<'static, f32, DistCosine>,
    dimensions: usize,
}

impl VectorIndex {
    /// Index `chunks` by their `embeddings` (same order, same length).
    ///
    /// Fails when the counts differ, when the vectors disagree on dimension,
    /// or when a vector holds NaN or infinity.
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, String> {
        if chunks.is_empty() {
            return Err("no excerpts to index".into());
        }
        if embeddings.len() != chunks.len() {
            return Err(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                embeddings.len()
            ));
        }

        let dimensions = embeddings[0].len();
        if dimensions == 0 {
            return Err("embedding provider returned empty vectors".into());
        }
        for (i, v) in embeddings.iter().enumerate() {
            if v.len() != dimensions {
                return Err(format!(
                    "vector {} has {} dimensions, expected {}",
                    i,
                    v.len(),
                    dimensions
                ));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(format!("vector {} contains NaN or infinity", i));
            }
        }

        // log2(n) layers, kept within what hnsw_rs supports.
        let max_layer = ((chunks.len() as f32).log2().ceil() as usize).clamp(4, 16);
        let mut hnsw: Hnsw<f32, DistCosine> =
            Hnsw::new(16, chunks.len(), max_layer, 200, DistCosine);

        for (id, v) in embeddings.iter().enumerate() {
            let normalized = normalize_vector(v);
            hnsw.insert((normalized.as_slice(), id));
        }
        hnsw.set_searching_mode(true);

        debug!(
            "Vector index built: {} excerpts, {} dimensions",
            chunks.len(),
            dimensions
        );

        Ok(Self {
            chunks,
            hnsw,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The `top_k` excerpts closest to `query`, best first.
    ///
    /// Equal scores keep document order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredChunk<'_>>, String> {
        if query.len() != self.dimensions {
            return Err(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            ));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err("query contains NaN or infinity".into());
        }

        let k = top_k.min(self.chunks.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let normalized = normalize_vector(query);
        let ef_search = (k * 2).max(50);
        let mut hits: Vec<(usize, f32)> = self
            .hnsw
            .search(&normalized, k, ef_search)
            .into_iter()
            .filter(|n| n.d_id < self.chunks.len())
            .map(|n| (n.d_id, 1.0 - n.distance))
            .collect();

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);

        debug!("Retrieved {:?}", hits);

        Ok(hits
            .into_iter()
            .map(|(id, score)| ScoredChunk {
                chunk: &self.chunks[id],
                score,
            })
            .collect())
    }
}

/// Scale `vector` to unit length; zero vectors are returned unchanged.
fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return vector.to_vec();
    }
    vector.iter().map(|&x| x / magnitude).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(label: &str, text: &str) -> Chunk {
        Chunk {
            page_label: label.into(),
            text: text.into(),
        }
    }

    fn sample() -> VectorIndex {
        VectorIndex::build(
            vec![
                chunk("1", "保証"),
                chunk("2", "電源"),
                chunk("3", "お問い合わせ"),
            ],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn nearest_excerpt_comes_first() {
        let index = sample();
        let hits = index.search(&[0.1, 0.9, 0.2], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.page_label, "2");
        assert_eq!(hits[1].chunk.page_label, "3");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn top_k_larger_than_index_returns_everything() {
        let index = sample();
        assert_eq!(index.search(&[1.0, 1.0, 1.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let err = VectorIndex::build(vec![chunk("1", "a")], vec![]).err().unwrap();
        assert!(err.contains("expected 1 vectors"), "got: {err}");
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = VectorIndex::build(
            vec![chunk("1", "a"), chunk("2", "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .err()
        .unwrap();
        assert!(err.contains("vector 1"), "got: {err}");

        let index = sample();
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn nan_is_rejected() {
        assert!(VectorIndex::build(vec![chunk("1", "a")], vec![vec![f32::NAN]]).is_err());
    }

    #[test]
    fn normalize_to_unit_length() {
        let n = normalize_vector(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize_vector(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
