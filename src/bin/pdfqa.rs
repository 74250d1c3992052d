//! CLI binary for edgequake-pdfqa.
//!
//! Loads one PDF, then answers questions about it either from `-q` flags or
//! from an interactive prompt. A thin shim: all state lives in the library's
//! `Conversation`.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfqa::{
    default_transcript_path, resolve_input, save_transcript, AssistantConfig, Conversation,
    ConversationEvents, EventsHandle, HistoryLimit, PdfIndexer, Turn, UploadOutcome,
    INTRO_PROMPT,
};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};
use std::borrow::Cow;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const PROMPT: &str = "ご質問をどうぞ> ";

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Spinner and streamed output driven by conversation events ────────────────

/// Shows a spinner while a document is indexed or a question is answered,
/// and prints answer text as it streams in.
struct CliEvents {
    spinners: bool,
    status: bool,
    active: Mutex<Option<ProgressBar>>,
    streamed: AtomicBool,
}

impl CliEvents {
    fn new(spinners: bool, status: bool) -> Arc<Self> {
        Arc::new(Self {
            spinners,
            status,
            active: Mutex::new(None),
            streamed: AtomicBool::new(false),
        })
    }

    fn start(&self, prefix: &str, message: String) {
        if !self.spinners {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix(prefix.to_string());
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = active.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn stop(&self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = active.take() {
            bar.finish_and_clear();
        }
    }

    /// Whether answer text was printed since the last question started.
    fn take_streamed(&self) -> bool {
        self.streamed.swap(false, Ordering::SeqCst)
    }
}

impl ConversationEvents for CliEvents {
    fn on_index_start(&self, document: &str) {
        self.start("Indexing", document.to_string());
    }

    fn on_index_complete(&self, document: &str, from_cache: bool) {
        self.stop();
        if self.status {
            let how = if from_cache { " (cached)" } else { "" };
            eprintln!("{} {}{}", green("✔"), bold(document), dim(how));
        }
    }

    fn on_index_error(&self, document: &str, error: &str) {
        self.stop();
        eprintln!("{} {}  {}", red("✘"), bold(document), red(error));
    }

    fn on_query_start(&self, question: &str) {
        self.streamed.store(false, Ordering::SeqCst);
        let preview: String = question.chars().take(40).collect();
        self.start("Thinking", preview);
    }

    fn on_answer_chunk(&self, chunk: &str) {
        self.stop();
        self.streamed.store(true, Ordering::SeqCst);
        let mut out = io::stdout().lock();
        let _ = write!(out, "{}", green(chunk));
        let _ = out.flush();
    }

    fn on_query_complete(&self, _question: &str, _duration_ms: u64) {
        self.stop();
    }

    fn on_query_error(&self, _question: &str, error: &str) {
        self.stop();
        tracing::debug!("query error detail: {}", error);
    }
}

// ── Line editor ──────────────────────────────────────────────────────────────

const COMMANDS: [&str; 4] = [":open", ":history", ":save", ":quit"];

fn matching_commands(head: &str) -> impl Iterator<Item = &'static str> + '_ {
    COMMANDS.into_iter().filter(move |cmd| cmd.starts_with(head))
}

/// The rest of the only command `head` can still become.
fn command_hint(head: &str) -> Option<&'static str> {
    if !head.starts_with(':') || head.contains(' ') {
        return None;
    }
    let mut matches = matching_commands(head).filter(|cmd| cmd.len() > head.len());
    match (matches.next(), matches.next()) {
        (Some(cmd), None) => Some(&cmd[head.len()..]),
        _ => None,
    }
}

/// Completion, hints and highlighting for the interactive prompt.
struct ReplHelper {
    files: FilenameCompleter,
}

impl ReplHelper {
    fn new() -> Self {
        Self {
            files: FilenameCompleter::new(),
        }
    }
}

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = &line[..pos];
        if !head.starts_with(':') {
            return Ok((0, vec![]));
        }

        match head.split_once(' ') {
            Some((":open" | ":save", _)) => self.files.complete(line, pos, ctx),
            Some(_) => Ok((pos, vec![])),
            None => {
                let candidates = matching_commands(head)
                    .map(|cmd| Pair {
                        display: cmd.to_string(),
                        replacement: cmd.to_string(),
                    })
                    .collect();
                Ok((0, candidates))
            }
        }
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        command_hint(&line[..pos]).map(str::to_string)
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with(':') {
            Cow::Owned(cyan(line))
        } else {
            Cow::Borrowed(line)
        }
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        Cow::Owned(cyan(prompt))
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(dim(hint))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Validator for ReplHelper {}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Interactive session
  pdfqa manual.pdf

  # Ask questions non-interactively
  pdfqa manual.pdf -q "保証期間は？" -q "問い合わせ先は？"

  # Ask about a PDF on the web, with a different model
  pdfqa --model gpt-4.1-mini https://example.com/report.pdf -q "要点は？"

  # Start with a short summary of the document
  pdfqa --intro manual.pdf

  # JSON transcript on stdout
  pdfqa --json manual.pdf -q "保証期間は？" > transcript.json

INTERACTIVE COMMANDS:
  :open <pdf|url>    Switch to another document (clears the conversation)
  :history           Print the conversation so far
  :save [file.json]  Write the conversation to a JSON file
  :quit              Exit (Ctrl-D works too)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Ask:             pdfqa document.pdf

  PDFium is downloaded automatically on first run and cached.
"#;

/// Ask questions about a PDF and get answers with page references.
#[derive(Parser, Debug)]
#[command(
    name = "pdfqa",
    version,
    about = "Ask questions about a PDF and get answers with page references",
    long_about = "Load a PDF (local file or URL), then ask questions about it. Each answer is \
generated by an LLM from the most relevant excerpts and lists the pages it was drawn from. \
Supports OpenAI, Anthropic, Google Gemini, Ollama and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Question to ask; repeat for several. Skips the interactive prompt.
    #[arg(short = 'q', long = "question")]
    questions: Vec<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Excerpts retrieved per question.
    #[arg(long, env = "PDFQA_TOP_K", default_value_t = 2)]
    top_k: usize,

    /// Keep at most this many turns of history (default: all).
    #[arg(long, env = "PDFQA_HISTORY_LIMIT")]
    history_limit: Option<usize>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFQA_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens per answer.
    #[arg(long, env = "PDFQA_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFQA_PASSWORD")]
    password: Option<String>,

    /// Text file with a custom QA template ({context_str} and {query_str}).
    #[arg(long, env = "PDFQA_PROMPT_TEMPLATE")]
    prompt_template: Option<PathBuf>,

    /// Ask for a short summary of the document before anything else.
    #[arg(long)]
    intro: bool,

    /// Print the conversation as JSON on exit.
    #[arg(long, env = "PDFQA_JSON")]
    json: bool,

    /// Disable spinners.
    #[arg(long, env = "PDFQA_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFQA_VERBOSE")]
    verbose: bool,

    /// Suppress everything except answers and errors.
    #[arg(long, env = "PDFQA_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFQA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-question LLM call timeout in seconds.
    #[arg(long, env = "PDFQA_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Spinners replace INFO logs unless the user asks for more.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    ensure_pdfium(cli.quiet)?;

    // JSON mode keeps stdout for the transcript only.
    let events = (!cli.json).then(|| CliEvents::new(show_progress, !cli.quiet));
    let config = build_config(&cli, events.clone().map(|ev| ev as EventsHandle)).await?;

    let indexer = Arc::new(PdfIndexer::from_config(&config).context("No LLM provider available")?);
    let mut conversation = Conversation::new(indexer, &config);

    open_document(&mut conversation, &cli.input, &config).await?;

    let out = events.as_deref();
    if cli.intro {
        ask(&mut conversation, INTRO_PROMPT, out).await;
    }

    if cli.questions.is_empty() {
        repl(&mut conversation, &config, out).await?;
    } else {
        for question in &cli.questions {
            ask(&mut conversation, question, out).await;
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(conversation.session())
            .context("Failed to serialise conversation")?;
        println!("{json}");
    }

    Ok(())
}

/// Make sure the pdfium shared library is present before any PDF is opened.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    #[cfg(feature = "bundled")]
    {
        let _ = quiet;
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_bundled())
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        if quiet {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
            return Ok(());
        }

        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        tokio::task::block_in_place(|| {
            pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                if let Some(t) = total {
                    bar.set_length(t);
                }
                bar.set_position(downloaded);
            }))
        })
        .context("Failed to download PDFium engine")?;

        dl_bar.finish_and_clear();
    }

    Ok(())
}

/// Map CLI args to `AssistantConfig`.
async fn build_config(cli: &Cli, events: Option<EventsHandle>) -> Result<AssistantConfig> {
    let mut builder = AssistantConfig::builder()
        .similarity_top_k(cli.top_k)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(n) = cli.history_limit {
        builder = builder.history_limit(HistoryLimit::MaxTurns(n));
    }
    if let Some(ref path) = cli.prompt_template {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ev) = events {
        builder = builder.events(ev);
    }

    builder.build().context("Invalid configuration")
}

async fn open_document(
    conversation: &mut Conversation,
    input: &str,
    config: &AssistantConfig,
) -> Result<()> {
    let document = resolve_input(input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to load {input}"))?;
    let outcome = conversation
        .on_document_uploaded(&document)
        .await
        .with_context(|| format!("Failed to index {}", document.identity()))?;
    tracing::info!("{}: {:?}", document.identity(), outcome);
    if outcome == UploadOutcome::Unchanged {
        eprintln!("{}", dim("(same document, conversation kept)"));
    }
    Ok(())
}

/// Ask one question and print whatever turn it produced. `out` is `None`
/// when nothing should be printed.
async fn ask(conversation: &mut Conversation, question: &str, out: Option<&CliEvents>) {
    conversation.ask(question).await;
    let Some(events) = out else {
        return;
    };
    let streamed = events.take_streamed();
    match conversation.history().last() {
        Some(Turn::Answer(answer)) if streamed => {
            let rendered = answer.render();
            let sources = rendered.rsplit_once("\n\n").map_or("", |(_, s)| s);
            println!("\n\n{}\n", cyan(sources));
        }
        Some(turn) => {
            if streamed {
                println!();
            }
            print_turn(turn);
        }
        None => {}
    }
}

async fn repl(
    conversation: &mut Conversation,
    config: &AssistantConfig,
    out: Option<&CliEvents>,
) -> Result<()> {
    let mut rl: Editor<ReplHelper, DefaultHistory> =
        Editor::new().context("Failed to start the line editor")?;
    rl.set_helper(Some(ReplHelper::new()));

    loop {
        let line = match tokio::task::block_in_place(|| rl.readline(PROMPT)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                eprintln!("{}", dim("(Ctrl-C) type :quit or press Ctrl-D to exit"));
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        match line.split_once(' ').unwrap_or((line, "")) {
            (":quit" | ":q" | ":exit", _) => break,
            (":history", _) => {
                if out.is_some() {
                    for turn in conversation.history() {
                        print_turn(turn);
                    }
                }
            }
            (":open", target) if !target.trim().is_empty() => {
                if let Err(e) = open_document(conversation, target.trim(), config).await {
                    eprintln!("{} {e:#}", red("✘"));
                }
            }
            (":save", target) => {
                let path = if target.trim().is_empty() {
                    default_transcript_path(conversation.active_document())
                } else {
                    PathBuf::from(target.trim())
                };
                match save_transcript(conversation.session(), &path).await {
                    Ok(()) => eprintln!("{} {}", green("✔"), path.display()),
                    Err(e) => eprintln!("{} {e}", red("✘")),
                }
            }
            (cmd, _) if cmd.starts_with(':') => {
                eprintln!("{}", dim("commands: :open <pdf>, :history, :save [file], :quit"));
            }
            _ => ask(conversation, line, out).await,
        }
    }

    Ok(())
}

fn print_turn(turn: &Turn) {
    println!("{}\n", format_turn(turn));
    if let Turn::Answer(answer) = turn {
        tracing::debug!(
            "{} tokens in / {} tokens out, {}ms",
            answer.input_tokens,
            answer.output_tokens,
            answer.duration_ms
        );
    }
}

/// Role styling: question cyan, answer green with cyan sources, error red.
fn format_turn(turn: &Turn) -> String {
    match turn {
        Turn::Question { message } => format!("{} {}", bold("Q:"), cyan(message)),
        Turn::Answer(answer) => {
            let rendered = answer.render();
            let (text, sources) = rendered
                .rsplit_once("\n\n")
                .unwrap_or((rendered.as_str(), ""));
            format!("{}\n\n{}", green(text), cyan(sources))
        }
        Turn::Error { message } => red(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_pdfqa::Answer;

    #[test]
    fn question_is_cyan() {
        let turn = Turn::Question {
            message: "保証期間は？".into(),
        };
        assert_eq!(format_turn(&turn), "\x1b[1mQ:\x1b[0m \x1b[36m保証期間は？\x1b[0m");
    }

    #[test]
    fn answer_text_green_sources_cyan() {
        let turn = Turn::Answer(Answer {
            text: "1年です。".into(),
            source_pages: vec!["3".into(), "iv".into()],
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        });
        let out = format_turn(&turn);
        assert!(out.starts_with("\x1b[32m1年です。\x1b[0m"));
        assert!(out.ends_with("\x1b[36m参照ページ：3, iv\x1b[0m"));
    }

    #[test]
    fn commands_complete_and_hint() {
        assert_eq!(matching_commands(":").count(), COMMANDS.len());
        assert_eq!(matching_commands(":s").collect::<Vec<_>>(), vec![":save"]);
        assert_eq!(command_hint(":hi"), Some("story"));
        assert_eq!(command_hint(":open x"), None);
        assert_eq!(command_hint("hello"), None);
        assert_eq!(command_hint(":quit"), None);
    }

    #[test]
    fn spinner_survives_a_poisoned_lock() {
        let events = CliEvents::new(true, false);
        events.start("Thinking", "q".into());

        let poisoner = Arc::clone(&events);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.active.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(events.active.is_poisoned());

        events.stop();
        events.on_answer_chunk("");
        assert!(events.take_streamed());
        assert!(!events.take_streamed());
    }
}
