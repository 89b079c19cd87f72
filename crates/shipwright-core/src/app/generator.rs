//! ContentGenerator - brief (+ 前回の document) から 1 枚の HTML を作る
//!
//! # フロー
//! 1. attachment を working directory に展開（不完全なものはスキップ）
//! 2. 指示文を組み立てる（round > 1 なら前回の document を添える）
//! 3. GenerationService を 1 回だけ呼ぶ
//! 4. `{"html": ...}` を取り出す。形が違えば fallback ページ
//! 5. working directory の index.html を置き換える

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{Attachment, GeneratedDocument, TaskRequest};
use crate::error::PipelineError;
use crate::ports::{GenerationRequest, GenerationService};
use crate::workdir::{WorkdirError, WorkingDirectory};

pub const SYSTEM_PROMPT: &str = "You are a web developer assistant.";

/// JSON field the generation service is asked to put the page in.
pub const HTML_FIELD: &str = "html";

pub struct ContentGenerator {
    service: Arc<dyn GenerationService>,
    work_root: PathBuf,
}

impl ContentGenerator {
    pub fn new(service: Arc<dyn GenerationService>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            service,
            work_root: work_root.into(),
        }
    }

    /// Produce this round's document and store it in the working directory.
    ///
    /// Service failures propagate; malformed content degrades to the
    /// fallback page.
    pub async fn generate(&self, request: &TaskRequest) -> Result<GeneratedDocument, PipelineError> {
        let dir = WorkingDirectory::open(&self.work_root, &request.task).await?;
        stage_attachments(&dir, &request.attachments).await?;

        let previous = if request.round.is_first() {
            None
        } else {
            let previous = dir.read_document().await?;
            if previous.is_none() {
                warn!(
                    task = %request.task,
                    round = %request.round,
                    "no previous document in working directory; generating from the brief alone"
                );
            }
            previous
        };

        let generation = GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_instruction(&request.brief, previous.as_deref()),
        };
        let content = self.service.complete(&generation).await?;

        let document = parse_document(content.as_deref());
        if document.fallback {
            warn!(
                task = %request.task,
                round = %request.round,
                "generation response was not a usable {{\"{HTML_FIELD}\": ...}} object; using fallback page"
            );
        }
        dir.write_document(&document.html).await?;

        info!(
            task = %request.task,
            round = %request.round,
            bytes = document.html.len(),
            revision = previous.is_some(),
            "document generated"
        );
        Ok(document)
    }
}

/// Decode attachments into the working directory.
///
/// Missing names, missing or undecodable payloads and unsafe names are
/// skipped; only I/O failures are errors.
async fn stage_attachments(
    dir: &WorkingDirectory,
    attachments: &[Attachment],
) -> Result<(), WorkdirError> {
    for attachment in attachments {
        let Some(name) = attachment.name.as_deref().filter(|n| !n.is_empty()) else {
            debug!("skipping attachment without a name");
            continue;
        };
        let bytes = match attachment.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(attachment = name, error = %e, "skipping attachment");
                continue;
            }
        };
        match dir.write_attachment(name, &bytes).await {
            Ok(()) => debug!(attachment = name, bytes = bytes.len(), "attachment staged"),
            Err(WorkdirError::InvalidName(_)) => {
                warn!(attachment = name, "skipping attachment with unsafe name");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// The instruction sent to the generation service.
pub fn build_instruction(brief: &str, previous: Option<&str>) -> String {
    let mut prompt = format!(
        r#"
You are an expert web developer. Your task is to build a single-page web application based on the following brief:

**Brief:** {brief}

**Instructions:**
1.  Create a single `index.html` file.
2.  You can use HTML, CSS, and JavaScript.
3.  If CSS or JavaScript is needed, embed it directly into the `index.html` file.
4.  The application should be self-contained in this single file.
5.  Do not use any external libraries unless specified in the brief.
6.  The output should be a JSON object with a single key "{HTML_FIELD}" and the value as the complete HTML code.
"#
    );
    if let Some(existing) = previous {
        prompt.push_str(&format!(
            "\n**Existing HTML (for revision):**\n```html\n{existing}\n```"
        ));
    }
    prompt
}

/// Extract the page from the service's answer, or fall back.
///
/// Anything but a JSON object with a non-blank string `html` field yields the
/// fallback page.
pub fn parse_document(content: Option<&str>) -> GeneratedDocument {
    let Some(content) = content else {
        return GeneratedDocument::fallback();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return GeneratedDocument::fallback();
    };
    match value.get(HTML_FIELD).and_then(|v| v.as_str()) {
        Some(html) if !html.trim().is_empty() => GeneratedDocument::generated(html),
        _ => GeneratedDocument::fallback(),
    }
}
