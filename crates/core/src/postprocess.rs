//! Response post-processing: code block extraction, clipboard delivery,
//! stream reassembly and overlay HTML.

use crate::error::{AppError, Result};
use crate::event::RequestId;
use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use tracing::{debug, info, warn};

/// Separator placed between consecutive code blocks.
pub const CODE_BLOCK_DELIMITER: &str = "\n\n";

const PREVIEW_CHARS: usize = 200;

/// Concatenates the bodies of all fenced code blocks, in document order.
///
/// Indented code blocks are ignored. Returns an empty string when the text
/// has no fenced block.
pub fn extract_code_blocks(text: &str) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                current = Some(String::new());
            }
            Event::Text(body) => {
                if let Some(block) = current.as_mut() {
                    block.push_str(&body);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    let block = block.trim_end_matches('\n');
                    if !block.is_empty() {
                        blocks.push(block.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    blocks.join(CODE_BLOCK_DELIMITER)
}

/// Short content id for log correlation (first 8 hex chars of BLAKE3).
pub fn fingerprint(text: &str) -> String {
    let hash = blake3::hash(text.as_bytes()).to_hex();
    hash.as_str()[..8].to_string()
}

/// First [`PREVIEW_CHARS`] characters of `text`, for diagnostics.
pub fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Clipboard collaborator.
pub trait ClipboardWriter {
    /// Replaces the clipboard text; `false` on failure.
    fn write(&mut self, text: &str) -> bool;
}

/// System clipboard via `arboard`.
///
/// The handle is kept alive after the first write: on X11/Wayland the
/// process owning the selection serves it to other applications.
#[derive(Default)]
pub struct ArboardClipboard {
    clipboard: Option<arboard::Clipboard>,
}

impl ArboardClipboard {
    fn try_write(&mut self, text: &str) -> Result<()> {
        let clipboard = match &mut self.clipboard {
            Some(clipboard) => clipboard,
            slot => slot.insert(arboard::Clipboard::new().map_err(clipboard_error)?),
        };
        let written = clipboard.set_text(text.to_string());
        if written.is_err() {
            // Recreate the handle next time, the old one may be stale.
            self.clipboard = None;
        }
        written.map_err(clipboard_error)
    }
}

fn clipboard_error(e: arboard::Error) -> AppError {
    AppError::Clipboard(e.to_string())
}

impl ClipboardWriter for ArboardClipboard {
    fn write(&mut self, text: &str) -> bool {
        match self.try_write(text) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "copy to clipboard failed");
                false
            }
        }
    }
}

/// Writes `text` to the clipboard once. Empty text is never written.
pub fn write_clipboard_once(clipboard: &mut dyn ClipboardWriter, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    let id = fingerprint(text);
    if clipboard.write(text) {
        info!(chars = text.chars().count(), id = %id, "code copied to clipboard");
        true
    } else {
        warn!(id = %id, "failed to copy code to clipboard");
        false
    }
}

/// Reassembles a streamed response.
///
/// Chunks for a request accumulate until [`StreamAssembler::finish`], which
/// hands out the final text exactly once.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    request: Option<RequestId>,
    buffer: String,
    chunks: usize,
}

impl StreamAssembler {
    /// Starts collecting for `request`, discarding any stale buffer.
    pub fn begin(&mut self, request: RequestId) {
        if self.request.is_some() && self.chunks > 0 {
            warn!(stale = ?self.request, "discarding unfinished stream buffer");
        }
        self.request = Some(request);
        self.buffer.clear();
        self.chunks = 0;
    }

    /// Appends a chunk. Chunks for any other request are ignored.
    pub fn push(&mut self, request: RequestId, chunk: &str) -> bool {
        if self.request != Some(request) {
            debug!(request, "ignoring chunk for inactive request");
            return false;
        }
        self.chunks += 1;
        self.buffer.push_str(chunk);
        true
    }

    /// Finalizes `request`.
    ///
    /// Returns the assembled text, or `fallback` when nothing was streamed.
    /// A second call for the same request returns `None`.
    pub fn finish(&mut self, request: RequestId, fallback: String) -> Option<String> {
        if self.request != Some(request) {
            return None;
        }
        self.request = None;
        let streamed = std::mem::take(&mut self.buffer);
        let chunks = std::mem::take(&mut self.chunks);

        if chunks == 0 {
            Some(fallback)
        } else {
            debug!(request, chunks, chars = streamed.len(), "stream finalized");
            Some(streamed)
        }
    }
}

/// CommonMark → HTML for the overlay.
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

/// Red error paragraph for the overlay.
pub fn error_html(message: &str) -> String {
    let mut escaped = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    format!("<p style='color: red;'>Error: {escaped}</p>")
}
