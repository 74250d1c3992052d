//! Prompt template and fixed user-facing strings.
//!
//! Every string the assistant shows or sends lives here so that wording
//! changes touch exactly one place and tests can inspect them directly.
//!
//! Callers can override the QA template via
//! [`crate::config::AssistantConfig::prompt_template`]; the constants here are
//! used only when no override is provided.

/// Placeholder replaced with the retrieved page excerpts.
pub const CONTEXT_PLACEHOLDER: &str = "{context_str}";

/// Placeholder replaced with the user's question.
pub const QUERY_PLACEHOLDER: &str = "{query_str}";

/// Default question-answering template.
///
/// Asks the model to answer in Japanese using only the supplied excerpts.
pub const DEFAULT_QA_TEMPLATE: &str = "下記の情報が与えられています。 \n\
---------------------\n\
{context_str}\
\n---------------------\n\
この情報を参照して次の質問に日本語で答えてください: {query_str}\n";

/// Fixed message shown whenever a question could not be answered.
pub const QUERY_FAILED_MESSAGE: &str = "エラーが発生しました！　もう一度、質問して下さい。";

/// Label introducing the comma-joined source page list under an answer.
pub const SOURCE_PAGES_LABEL: &str = "参照ページ：";

/// Opening request that summarises the document in about 30 characters and
/// then invites the user to ask.
pub const INTRO_PROMPT: &str = "この文章を３０字程度で要約して下さい。　回答後は、必ず'改行'して「ご質問をどうぞ。」を付けて下さい。";

/// Fill a QA template with retrieved context and the question.
///
/// The context is substituted first so that a question which happens to
/// contain `{context_str}` is left untouched.
pub fn render_qa_prompt(template: &str, context: &str, query: &str) -> String {
    match template.split_once(CONTEXT_PLACEHOLDER) {
        Some((before, after)) => {
            let before = before.replace(QUERY_PLACEHOLDER, query);
            let after = after.replace(QUERY_PLACEHOLDER, query);
            format!("{before}{context}{after}")
        }
        None => template.replace(QUERY_PLACEHOLDER, query),
    }
}

/// Check that a template carries both placeholders.
pub fn validate_template(template: &str) -> Result<(), String> {
    for placeholder in [CONTEXT_PLACEHOLDER, QUERY_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(format!("prompt template is missing {placeholder}"));
        }
    }
    Ok(())
}

/// Format source page labels the way they are shown under an answer.
pub fn format_source_pages(pages: &[String]) -> String {
    format!("{}{}", SOURCE_PAGES_LABEL, pages.join(", "))
}
