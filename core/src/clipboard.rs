//! Clipboard output and markdown block extraction.
//!
//! The enhanced text arrives wrapped in a fenced ```markdown block; the copy
//! action lifts the inner content out of that block when present and falls
//! back to the full text otherwise. The clipboard itself sits behind a trait
//! so tests can capture writes without a display server.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

pub trait Clipboard: Send + Sync {
    fn write(&self, text: &str) -> Result<()>;
}

/// Writes through the platform clipboard utility (`pbcopy`, `wl-copy`, or
/// `xclip`, whichever responds first).
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn pipe_through(program: &str, args: &[&str], text: &str) -> Result<()> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("no stdin for {program}"))?
            .write_all(text.as_bytes())?;
        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("{program} exited with {status}"))
        }
    }
}

impl Clipboard for SystemClipboard {
    fn write(&self, text: &str) -> Result<()> {
        let attempts: [(&str, &[&str]); 3] = [
            ("pbcopy", &[]),
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
        ];
        let mut last_err = anyhow!("no clipboard utility available");
        for (program, args) in attempts {
            match Self::pipe_through(program, args, text) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }
}

/// In-process clipboard capturing the last written value, for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryClipboard {
    pub fn last_copied(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write(&self, text: &str) -> Result<()> {
        *self.contents.lock() = Some(text.to_string());
        Ok(())
    }
}

/// Inner content of the first fenced code block labeled `markdown`
/// (case-insensitive), if the text contains one.
pub fn extract_markdown_block(text: &str) -> Option<String> {
    let mut inner = String::new();
    let mut in_block = false;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            if in_block {
                return Some(inner.trim().to_string());
            }
            let language = trimmed.trim_matches('`').trim();
            if language.eq_ignore_ascii_case("markdown") {
                in_block = true;
            }
            continue;
        }
        if in_block {
            inner.push_str(line);
            inner.push('\n');
        }
    }
    // Unterminated block still counts once we entered it.
    if in_block && !inner.trim().is_empty() {
        Some(inner.trim().to_string())
    } else {
        None
    }
}

/// The text the copy action places on the clipboard: the markdown block's
/// inner content when present, the trimmed full text otherwise.
pub fn copy_payload(text: &str) -> String {
    extract_markdown_block(text).unwrap_or_else(|| text.trim().to_string())
}
