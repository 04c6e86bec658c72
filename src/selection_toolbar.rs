use std::cell::RefCell;

use log::{debug, warn};

use crate::clipboard::Clipboard;
use crate::error::ActionError;
use crate::location::LocationToken;
use crate::notice::NoticeBoard;
use crate::overlay::{AffordancePosition, OverlayLease};
use crate::position_bridge::PositionBridge;
use crate::reference::LinkFormat;
use crate::render_engine::{EngineCall, RenderEngineAdapter};

/// Vertical gap between the toolbar anchor and the top of the selection.
pub const DEFAULT_TOOLBAR_OFFSET: f64 = 40.0;

/// Bounding box of a selection in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SelectionRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Raw selection-change notification from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange {
    pub text: String,
    pub rect: SelectionRect,
}

impl SelectionChange {
    pub fn new(text: impl Into<String>, rect: SelectionRect) -> Self {
        Self {
            text: text.into(),
            rect,
        }
    }

    pub fn cleared() -> Self {
        Self::new("", SelectionRect::default())
    }
}

/// What the toolbar is bound to while armed.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSnapshot {
    pub text: String,
    pub anchor: SelectionRect,
    pub captured_at: Option<LocationToken>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolbarState {
    Idle,
    Armed {
        snapshot: SelectionSnapshot,
        position: AffordancePosition,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    CopyReference,
    Highlight,
}

/// Anything that can say where the reader is, if it knows.
pub trait LocationSource {
    fn resolvable_location(&self) -> Option<LocationToken>;
}

impl LocationSource for PositionBridge {
    fn resolvable_location(&self) -> Option<LocationToken> {
        PositionBridge::resolvable_location(self)
    }
}

impl LocationSource for Option<LocationToken> {
    fn resolvable_location(&self) -> Option<LocationToken> {
        self.clone()
    }
}

/// Floating toolbar that turns a text selection into a reference or a
/// highlight.
///
/// Two states: `Idle` (nothing selected, toolbar hidden) and `Armed` (a
/// non-empty selection, toolbar shown above it). Actions always read the
/// latest selection and ask for the position at the moment they run.
pub struct SelectionToolbar {
    state: ToolbarState,
    lease: OverlayLease,
    offset: f64,
    file_path: String,
    link_format: LinkFormat,
}

impl SelectionToolbar {
    pub fn new(lease: OverlayLease, file_path: impl Into<String>, link_format: LinkFormat) -> Self {
        Self {
            state: ToolbarState::Idle,
            lease,
            offset: DEFAULT_TOOLBAR_OFFSET,
            file_path: file_path.into(),
            link_format,
        }
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn state(&self) -> &ToolbarState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, ToolbarState::Armed { .. })
    }

    /// Selected text the toolbar is currently bound to.
    pub fn selection(&self) -> Option<&str> {
        match &self.state {
            ToolbarState::Armed { snapshot, .. } => Some(&snapshot.text),
            ToolbarState::Idle => None,
        }
    }

    pub fn on_selection_changed(
        &mut self,
        change: &SelectionChange,
        captured_at: Option<LocationToken>,
    ) {
        let text = change.text.trim();
        if text.is_empty() {
            self.disarm();
            return;
        }

        let rect = change.rect;
        let position = AffordancePosition {
            x: rect.left + rect.width / 2.0,
            y: rect.top - self.offset,
        };
        self.lease.show(position);
        debug!("Toolbar armed at ({:.0}, {:.0})", position.x, position.y);
        self.state = ToolbarState::Armed {
            snapshot: SelectionSnapshot {
                text: text.to_string(),
                anchor: rect,
                captured_at,
            },
            position,
        };
    }

    /// Hide the toolbar. Repeated calls while idle do nothing.
    pub fn disarm(&mut self) {
        if self.is_armed() {
            self.lease.hide();
            self.state = ToolbarState::Idle;
            debug!("Toolbar disarmed");
        }
    }

    /// Copy a reference for the current selection. Returns the copied text.
    pub fn copy_reference(
        &mut self,
        source: &dyn LocationSource,
        clipboard: &mut dyn Clipboard,
        notices: &mut NoticeBoard,
    ) -> Result<String, ActionError> {
        let (text, location) = match self.preconditions(source) {
            Ok(bound) => bound,
            Err(e) => return Err(report(e, notices)),
        };

        let reference = self.link_format.reference(&self.file_path, &location, &text);
        if let Err(e) = clipboard.write_text(&reference) {
            let err = ActionError::Clipboard {
                detail: format!("{e:#}"),
            };
            return Err(report(err, notices));
        }

        notices.info("Copied reference to clipboard");
        self.disarm();
        Ok(reference)
    }

    /// Highlight the current position for this session only.
    pub fn highlight(
        &mut self,
        source: &dyn LocationSource,
        engine: &RefCell<RenderEngineAdapter>,
        notices: &mut NoticeBoard,
    ) -> Result<LocationToken, ActionError> {
        let (_, location) = match self.preconditions(source) {
            Ok(bound) => bound,
            Err(e) => return Err(report(e, notices)),
        };

        let outcome = engine.borrow_mut().highlight_at(&location);
        match outcome {
            Ok(EngineCall::Applied) => {
                notices.info("Highlighted (temporary: cleared when the book is closed)");
                self.disarm();
                Ok(location)
            }
            Ok(EngineCall::NotLoaded) => Err(report(ActionError::NotReady, notices)),
            Err(e) => Err(report(ActionError::Highlight(e), notices)),
        }
    }

    fn preconditions(
        &self,
        source: &dyn LocationSource,
    ) -> Result<(String, LocationToken), ActionError> {
        let text = self
            .selection()
            .map(str::to_string)
            .ok_or(ActionError::NothingSelected)?;
        let location = source
            .resolvable_location()
            .ok_or(ActionError::PositionUnknown)?;
        Ok((text, location))
    }
}

fn report(err: ActionError, notices: &mut NoticeBoard) -> ActionError {
    if !err.is_precondition() {
        warn!("Toolbar action failed: {err:#}");
        notices.error(err.to_string());
        return err;
    }
    match &err {
        ActionError::NothingSelected => notices.warn("Select some text first"),
        ActionError::PositionUnknown => {
            notices.warn("Reading position unknown, wait for the book to finish loading")
        }
        _ => notices.warn("The book is still loading"),
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::overlay::OverlayRegistry;
    use crate::test_utils::{FakeEngine, MemoryClipboard, OverlayCall, RecordingOverlay};
    use std::rc::Rc;

    struct Fixture {
        toolbar: SelectionToolbar,
        surface: Rc<RefCell<RecordingOverlay>>,
        clipboard: MemoryClipboard,
        notices: NoticeBoard,
        engine: RefCell<RenderEngineAdapter>,
        _registry: OverlayRegistry,
    }

    fn fixture() -> Fixture {
        let surface = Rc::new(RefCell::new(RecordingOverlay::default()));
        let registry = OverlayRegistry::new(surface.clone());
        let toolbar =
            SelectionToolbar::new(registry.acquire(), "Books/MyBook.epub", LinkFormat::default());
        let mut adapter = RenderEngineAdapter::new();
        adapter.attach(Box::new(FakeEngine::new()));
        Fixture {
            toolbar,
            surface,
            clipboard: MemoryClipboard::default(),
            notices: NoticeBoard::new(),
            engine: RefCell::new(adapter),
            _registry: registry,
        }
    }

    fn rect() -> SelectionRect {
        SelectionRect {
            left: 100.0,
            top: 200.0,
            width: 60.0,
            height: 18.0,
        }
    }

    #[test]
    fn blank_selection_keeps_toolbar_idle() {
        let mut f = fixture();
        for text in ["", "   ", "\n\t "] {
            f.toolbar
                .on_selection_changed(&SelectionChange::new(text, rect()), None);
            assert_eq!(f.toolbar.state(), &ToolbarState::Idle);
        }
        assert!(!f
            .surface
            .borrow()
            .calls
            .iter()
            .any(|c| matches!(c, OverlayCall::Show(_) | OverlayCall::Hide)));
    }

    #[test]
    fn selection_arms_above_midpoint() {
        let mut f = fixture();
        f.toolbar
            .on_selection_changed(&SelectionChange::new("  hello  ", rect()), None);

        match f.toolbar.state() {
            ToolbarState::Armed { snapshot, position } => {
                assert_eq!(snapshot.text, "hello");
                assert_eq!(*position, AffordancePosition { x: 130.0, y: 160.0 });
            }
            ToolbarState::Idle => panic!("toolbar should be armed"),
        }
    }

    #[test]
    fn newer_selection_replaces_older_text() {
        let mut f = fixture();
        f.toolbar
            .on_selection_changed(&SelectionChange::new("first", rect()), None);
        f.toolbar
            .on_selection_changed(&SelectionChange::new("second", rect()), None);

        let copied = f
            .toolbar
            .copy_reference(
                &Some(LocationToken::cfi("L1")),
                &mut f.clipboard,
                &mut f.notices,
            )
            .unwrap();
        assert!(copied.ends_with("> second"));
    }

    #[test]
    fn clearing_selection_hides_toolbar() {
        let mut f = fixture();
        f.toolbar
            .on_selection_changed(&SelectionChange::new("text", rect()), None);
        f.toolbar.on_selection_changed(&SelectionChange::cleared(), None);

        assert_eq!(f.toolbar.state(), &ToolbarState::Idle);
        assert_eq!(f.surface.borrow().calls.last(), Some(&OverlayCall::Hide));
    }

    #[test]
    fn actions_without_location_do_nothing() {
        let mut f = fixture();
        f.toolbar
            .on_selection_changed(&SelectionChange::new("hello", rect()), None);

        let err = f
            .toolbar
            .copy_reference(&None::<LocationToken>, &mut f.clipboard, &mut f.notices)
            .unwrap_err();
        assert!(matches!(err, ActionError::PositionUnknown));

        let err = f
            .toolbar
            .highlight(&None::<LocationToken>, &f.engine, &mut f.notices)
            .unwrap_err();
        assert!(matches!(err, ActionError::PositionUnknown));

        assert!(f.clipboard.writes.is_empty());
        assert_eq!(f.notices.len(), 2);
        assert!(f.toolbar.is_armed());
    }

    #[test]
    fn actions_without_selection_do_nothing() {
        let mut f = fixture();
        let err = f
            .toolbar
            .copy_reference(
                &Some(LocationToken::cfi("L1")),
                &mut f.clipboard,
                &mut f.notices,
            )
            .unwrap_err();
        assert!(matches!(err, ActionError::NothingSelected));
        assert!(f.clipboard.writes.is_empty());
    }

    #[test]
    fn copy_writes_reference_and_disarms() {
        let mut f = fixture();
        f.toolbar
            .on_selection_changed(&SelectionChange::new("a key passage", rect()), None);

        f.toolbar
            .copy_reference(
                &Some(LocationToken::cfi("L42")),
                &mut f.clipboard,
                &mut f.notices,
            )
            .unwrap();

        assert_eq!(f.clipboard.writes.len(), 1);
        let written = &f.clipboard.writes[0];
        assert!(written.contains("obsidian://epub-jump?file=Books%2FMyBook.epub&cfi=L42"));
        assert!(written.lines().any(|l| l == "> a key passage"));
        assert_eq!(f.toolbar.state(), &ToolbarState::Idle);
    }

    #[test]
    fn clipboard_failure_is_reported_and_keeps_selection() {
        let mut f = fixture();
        f.clipboard.fail = true;
        f.toolbar
            .on_selection_changed(&SelectionChange::new("text", rect()), None);

        let err = f
            .toolbar
            .copy_reference(
                &Some(LocationToken::cfi("L1")),
                &mut f.clipboard,
                &mut f.notices,
            )
            .unwrap_err();
        assert!(matches!(err, ActionError::Clipboard { .. }));
        assert!(!err.is_precondition());
        assert!(f.toolbar.is_armed());
    }

    #[test]
    fn highlight_goes_to_engine_at_current_location() {
        let surface = Rc::new(RefCell::new(RecordingOverlay::default()));
        let registry = OverlayRegistry::new(surface);
        let mut toolbar =
            SelectionToolbar::new(registry.acquire(), "b.epub", LinkFormat::default());
        let engine = FakeEngine::new();
        let log = engine.log();
        let mut adapter = RenderEngineAdapter::new();
        adapter.attach(Box::new(engine));
        let adapter = RefCell::new(adapter);
        let mut notices = NoticeBoard::new();

        toolbar.on_selection_changed(&SelectionChange::new("mark me", rect()), None);
        let location = toolbar
            .highlight(&Some(LocationToken::cfi("L7")), &adapter, &mut notices)
            .unwrap();

        assert_eq!(location, LocationToken::cfi("L7"));
        assert_eq!(log.borrow().highlights, vec![LocationToken::cfi("L7")]);
        assert!(notices.latest().unwrap().message.contains("temporary"));
        assert!(!toolbar.is_armed());
    }

    #[test]
    fn highlight_before_engine_loads_is_not_ready() {
        let mut f = fixture();
        f.engine = RefCell::new(RenderEngineAdapter::new());
        f.toolbar
            .on_selection_changed(&SelectionChange::new("text", rect()), None);

        let err = f
            .toolbar
            .highlight(&Some(LocationToken::cfi("L1")), &f.engine, &mut f.notices)
            .unwrap_err();
        assert!(matches!(err, ActionError::NotReady));
    }

    #[test]
    fn engine_highlight_failure_is_an_error_notice() {
        let surface = Rc::new(RefCell::new(RecordingOverlay::default()));
        let registry = OverlayRegistry::new(surface);
        let mut toolbar =
            SelectionToolbar::new(registry.acquire(), "b.epub", LinkFormat::default());
        let mut adapter = RenderEngineAdapter::new();
        adapter.attach(Box::new(FakeEngine::new().rejecting("L8")));
        let adapter = RefCell::new(adapter);
        let mut notices = NoticeBoard::new();

        toolbar.on_selection_changed(&SelectionChange::new("text", rect()), None);
        let err = toolbar
            .highlight(&Some(LocationToken::cfi("L8")), &adapter, &mut notices)
            .unwrap_err();

        assert!(matches!(err, ActionError::Highlight(EngineError::Generic { .. })));
        assert_eq!(
            notices.latest().unwrap().level,
            crate::notice::NoticeLevel::Error
        );
        assert!(toolbar.is_armed());
    }
}
