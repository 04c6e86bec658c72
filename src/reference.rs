use std::borrow::Cow;
use std::path::Path;

use crate::location::LocationToken;

pub const DEFAULT_LINK_SCHEME: &str = "obsidian";
pub const DEFAULT_LINK_ACTION: &str = "epub-jump";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("not a {expected} link")]
    WrongScheme { expected: String },

    #[error("jump link is missing `{0}`")]
    MissingParameter(&'static str),

    #[error("malformed jump link: {detail}")]
    Malformed { detail: String },
}

/// Where jump links point: `<scheme>://<action>?file=...&cfi=...`.
///
/// A reference is what lands on the clipboard when the user copies a
/// selection:
///
/// ```text
/// 📖 Book: [[Books/MyBook.epub]]
/// 📍 Location: [Jump back](obsidian://epub-jump?file=Books%2FMyBook.epub&cfi=L42&text=a%20key%20passage)
/// > a key passage
/// ```
///
/// The jump link is the interoperability contract with whatever handles the
/// URI later, so its shape must not drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFormat {
    pub scheme: String,
    pub action: String,
}

impl Default for LinkFormat {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_SCHEME, DEFAULT_LINK_ACTION)
    }
}

/// A decoded jump link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpLink {
    pub file: String,
    pub location: LocationToken,
    /// Quoted passage, present on links taken from a reference
    pub text: Option<String>,
}

impl LinkFormat {
    pub fn new(scheme: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            action: action.into(),
        }
    }

    fn prefix(&self) -> String {
        format!("{}://{}?", self.scheme, self.action)
    }

    pub fn jump_uri(&self, file_path: &str, location: &LocationToken) -> String {
        format!(
            "{}file={}&cfi={}",
            self.prefix(),
            urlencoding::encode(file_path),
            urlencoding::encode(&location.to_string())
        )
    }

    /// Jump link that also carries the quoted passage.
    pub fn excerpt_uri(&self, file_path: &str, location: &LocationToken, text: &str) -> String {
        format!(
            "{}&text={}",
            self.jump_uri(file_path, location),
            urlencoding::encode(text)
        )
    }

    /// Book back-link, jump link and the quoted excerpt, one per line.
    pub fn reference(&self, file_path: &str, location: &LocationToken, text: &str) -> String {
        format!(
            "📖 Book: [[{file_path}]]\n📍 Location: [Jump back]({})\n{}",
            self.excerpt_uri(file_path, location, text),
            block_quote(text)
        )
    }

    /// Link to the current page, titled with the book's base name.
    pub fn page_link(&self, file_path: &str, location: &LocationToken) -> String {
        let basename = Path::new(file_path)
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or(Cow::Borrowed(file_path));
        format!(
            "[⚓ {basename}]({})",
            self.jump_uri(file_path, location)
        )
    }

    pub fn parse(&self, uri: &str) -> Result<JumpLink, LinkError> {
        let query = uri
            .strip_prefix(&self.prefix())
            .ok_or_else(|| LinkError::WrongScheme {
                expected: format!("{}://{}", self.scheme, self.action),
            })?;

        let mut file = None;
        let mut cfi = None;
        let mut text = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(value).map_err(|e| LinkError::Malformed {
                detail: format!("{name}: {e}"),
            })?;
            match name {
                "file" => file = Some(value.into_owned()),
                "cfi" => cfi = Some(value.into_owned()),
                "text" => text = Some(value.into_owned()),
                _ => {}
            }
        }

        let file = file
            .filter(|f| !f.is_empty())
            .ok_or(LinkError::MissingParameter("file"))?;
        let cfi = cfi
            .filter(|c| !c.is_empty())
            .ok_or(LinkError::MissingParameter("cfi"))?;

        Ok(JumpLink {
            file,
            location: LocationToken::from_external(&cfi),
            text: text.filter(|t| !t.is_empty()),
        })
    }
}

fn block_quote(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
