use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-facing outcome of a reader action ("copied", "select some text first").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

/// Notices raised by a view and not yet shown by the host, oldest first.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    pending: Vec<Notice>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.post(message.into(), NoticeLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.post(message.into(), NoticeLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.post(message.into(), NoticeLevel::Error);
    }

    fn post(&mut self, message: String, level: NoticeLevel) {
        debug!("Notice ({level:?}): {message}");
        self.pending.push(Notice { message, level });
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.pending.last()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand every pending notice to the host.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_the_last_posted() {
        let mut board = NoticeBoard::new();
        board.warn("Select some text first");
        board.info("Copied reference to clipboard");

        let latest = board.latest().unwrap();
        assert_eq!(latest.level, NoticeLevel::Info);
        assert_eq!(latest.message, "Copied reference to clipboard");
        assert_eq!(board.len(), 2);
    }

    #[test]
    fn drain_empties_the_board_in_posting_order() {
        let mut board = NoticeBoard::new();
        board.error("clipboard write failed: denied");
        board.warn("The book is still loading");

        let levels: Vec<NoticeLevel> = board.drain().into_iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![NoticeLevel::Error, NoticeLevel::Warning]);
        assert!(board.is_empty());
        assert!(board.latest().is_none());
    }
}
