use anyhow::{Context, Result};

/// Write-only clipboard access.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard through arboard. A fresh handle is opened per write so a
/// clipboard owner disappearing between writes does not wedge us.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut clipboard = arboard::Clipboard::new().context("Failed to access clipboard")?;
        clipboard
            .set_text(text.to_string())
            .context("Failed to copy to clipboard")
    }
}
