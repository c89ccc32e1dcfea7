//! Plain-text rendering of documents, query answers and upload progress.

use crate::client::ingest_client::{Document, QueryResponse, SourceNode};
use crate::progress::phase::Phase;
use crate::progress::poller::ProgressView;

const SOURCE_TITLE_MAX: usize = 28;
const SOURCE_TEXT_MAX: usize = 150;
const SOURCE_TEXT_KEEP: usize = 130;
const DOCUMENT_TEXT_MAX: usize = 80;

pub const GENERATING_LABEL: &str = "Generating content...";
pub const STARTING_LABEL: &str = "Starting upload";
pub const FAILED_LABEL: &str = "Video processing failed on the server.";

/// Keeps the first `keep` chars and appends "..." when `s` is longer than `max`.
fn ellipsize(s: &str, max: usize, keep: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(keep).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

pub fn source_title(source: &SourceNode) -> String {
    ellipsize(&source.doc_id, SOURCE_TITLE_MAX, SOURCE_TITLE_MAX)
}

pub fn source_excerpt(source: &SourceNode) -> String {
    ellipsize(&source.text, SOURCE_TEXT_MAX, SOURCE_TEXT_KEEP)
}

pub fn source_footer(source: &SourceNode) -> String {
    fn or_dash<T: ToString>(v: Option<T>) -> String {
        v.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
    }
    format!(
        "Similarity={}, start={}, end={}",
        or_dash(source.similarity),
        or_dash(source.start),
        or_dash(source.end)
    )
}

pub fn render_query(resp: &QueryResponse) -> String {
    let mut out = String::from("Query Response\n");
    out.push_str(&resp.text);
    out.push_str("\n\nResponse Sources\n");
    if resp.sources.is_empty() {
        out.push_str("(none)\n");
    }
    for source in &resp.sources {
        out.push_str(&format!(
            "- {}\n  {}\n  {}\n",
            source_title(source),
            source_excerpt(source),
            source_footer(source)
        ));
    }
    out
}

pub fn render_documents(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No documents indexed yet.\n".to_string();
    }
    docs.iter()
        .map(|d| {
            let text = d.text.split_whitespace().collect::<Vec<_>>().join(" ");
            format!("{}: {}\n", d.id, ellipsize(&text, DOCUMENT_TEXT_MAX, DOCUMENT_TEXT_MAX))
        })
        .collect()
}

/// Status line under the progress bar (or in place of it).
pub fn progress_label(view: &ProgressView) -> String {
    match view.phase {
        Phase::Failed => FAILED_LABEL.to_string(),
        Phase::GeneratingContent | Phase::Finished => GENERATING_LABEL.to_string(),
        Phase::Uploading(p) => format!("{p}%"),
        Phase::NotStarted => format!("{STARTING_LABEL}{}", ".".repeat(view.dots as usize)),
    }
}
