use std::path::Path;

use chrono::{DateTime, Local};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteOptions {
    /// Target folder when `use_same_folder` is off
    pub folder: String,
    pub use_same_folder: bool,
    pub tags: String,
}

/// Vault-relative path of the note for `book_path`. Creating the file is
/// left to the host.
pub fn note_path(book_path: &str, options: &NoteOptions) -> String {
    let path = Path::new(book_path);
    let basename = book_basename(book_path);

    let folder = if options.use_same_folder {
        path.parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        options.folder.trim_end_matches('/').to_string()
    };

    if folder.is_empty() {
        format!("{basename}.md")
    } else {
        format!("{folder}/{basename}.md")
    }
}

/// Front matter and title for a new note.
pub fn note_content(book_path: &str, options: &NoteOptions, created: DateTime<Local>) -> String {
    format!(
        "---\nTags: {}\nDate: {}\n---\n\n# {}\n",
        options.tags,
        created.to_rfc2822(),
        book_basename(book_path)
    )
}

pub fn book_basename(book_path: &str) -> String {
    Path::new(book_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| book_path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn options(use_same_folder: bool, folder: &str) -> NoteOptions {
        NoteOptions {
            folder: folder.to_string(),
            use_same_folder,
            tags: "notes/booknotes".to_string(),
        }
    }

    #[test]
    fn note_next_to_book() {
        assert_eq!(
            note_path("Books/Dune.epub", &options(true, "")),
            "Books/Dune.md"
        );
        assert_eq!(note_path("Dune.epub", &options(true, "")), "Dune.md");
    }

    #[test]
    fn note_in_configured_folder() {
        assert_eq!(
            note_path("Books/Dune.epub", &options(false, "Notes/")),
            "Notes/Dune.md"
        );
        assert_eq!(
            note_path("Books/Dune.epub", &options(false, "Notes")),
            "Notes/Dune.md"
        );
    }

    #[test]
    fn content_has_front_matter_and_title() {
        let created = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let content = note_content("Books/Dune.epub", &options(true, ""), created);

        assert!(content.starts_with("---\nTags: notes/booknotes\nDate: "));
        assert!(content.ends_with("---\n\n# Dune\n"));
    }
}
