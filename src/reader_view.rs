use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::info;

use crate::clipboard::Clipboard;
use crate::error::{ActionError, BridgeError};
use crate::location::LocationToken;
use crate::notice::{Notice, NoticeBoard};
use crate::overlay::OverlayRegistry;
use crate::persist::PositionWriter;
use crate::position_bridge::{DEFAULT_STORAGE_READ_TIMEOUT, HostHandle, PositionBridge};
use crate::reference::LinkFormat;
use crate::render_engine::{RenderEngine, RenderEngineAdapter};
use crate::selection_toolbar::{
    DEFAULT_TOOLBAR_OFFSET, SelectionChange, SelectionToolbar, ToolbarAction, ToolbarState,
};
use crate::settings::{LayoutMode, Settings};
use crate::subscription::{Signal, Subscription};
use crate::theme::{ColorMode, FontScale};

/// What the host hands over when it opens a document.
#[derive(Debug, Clone)]
pub struct MountOptions {
    pub contents: Vec<u8>,
    /// Display title, also the persistence identity
    pub title: String,
    /// Host path of the file, used in links
    pub file_path: String,
    pub layout: LayoutMode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSize {
    pub width: f64,
    pub height: f64,
}

/// Event sources owned by the host.
#[derive(Default)]
pub struct HostSignals {
    pub selection: Signal<SelectionChange>,
    pub resize: Signal<ViewportSize>,
    /// Location changes reported by the render engine
    pub location: Signal<LocationToken>,
}

impl HostSignals {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Process-wide collaborators shared by every mounted view.
#[derive(Clone)]
pub struct ReaderServices {
    pub writer: Rc<PositionWriter>,
    pub overlay: OverlayRegistry,
    pub clipboard: Rc<RefCell<dyn Clipboard>>,
    pub link_format: LinkFormat,
    pub toolbar_offset: f64,
    pub storage_read_timeout: Duration,
}

impl ReaderServices {
    pub fn new(
        writer: Rc<PositionWriter>,
        overlay: OverlayRegistry,
        clipboard: Rc<RefCell<dyn Clipboard>>,
    ) -> Self {
        Self {
            writer,
            overlay,
            clipboard,
            link_format: LinkFormat::default(),
            toolbar_offset: DEFAULT_TOOLBAR_OFFSET,
            storage_read_timeout: DEFAULT_STORAGE_READ_TIMEOUT,
        }
    }

    pub fn configured(mut self, settings: &Settings) -> Self {
        self.link_format = settings.link_format();
        self.toolbar_offset = settings.toolbar_offset;
        self.storage_read_timeout = settings.storage_read_timeout();
        self
    }
}

/// A mounted reader: one document, its position bridge and its toolbar,
/// wired to the host's event signals.
///
/// Mounting restores the position and subscribes to the host's signals;
/// dropping (or [`ReaderView::unmount`]) unsubscribes everything, revokes the
/// host handle and gives back the shared toolbar, before any persistence
/// write still in flight completes.
pub struct ReaderView {
    options: MountOptions,
    initial_location: LocationToken,
    engine: Rc<RefCell<RenderEngineAdapter>>,
    bridge: Rc<PositionBridge>,
    toolbar: Rc<RefCell<SelectionToolbar>>,
    clipboard: Rc<RefCell<dyn Clipboard>>,
    notices: NoticeBoard,
    link_format: LinkFormat,
    subscriptions: Vec<Subscription>,
}

impl ReaderView {
    pub fn mount(options: MountOptions, services: &ReaderServices, signals: &HostSignals) -> Self {
        let engine = Rc::new(RefCell::new(RenderEngineAdapter::new()));
        let bridge = Rc::new(
            PositionBridge::new(engine.clone(), services.writer.clone())
                .with_read_timeout(services.storage_read_timeout),
        );
        let initial_location = bridge.initialize(&options.title);

        let toolbar = Rc::new(RefCell::new(
            SelectionToolbar::new(
                services.overlay.acquire(),
                options.file_path.clone(),
                services.link_format.clone(),
            )
            .with_offset(services.toolbar_offset),
        ));

        let subscriptions = vec![
            {
                let bridge = bridge.clone();
                let toolbar = toolbar.clone();
                signals.selection.subscribe(move |change| {
                    let captured_at = bridge.resolvable_location();
                    toolbar
                        .borrow_mut()
                        .on_selection_changed(change, captured_at);
                })
            },
            {
                let bridge = bridge.clone();
                signals
                    .resize
                    .subscribe(move |size| bridge.on_viewport_resized(size.width, size.height))
            },
            {
                let bridge = bridge.clone();
                signals
                    .location
                    .subscribe(move |location| bridge.on_render_location_changed(location.clone()))
            },
        ];

        info!(
            "Mounted {:?} ({}) at {initial_location}",
            options.title,
            options.layout.as_str()
        );

        Self {
            options,
            initial_location,
            engine,
            bridge,
            toolbar,
            clipboard: services.clipboard.clone(),
            notices: NoticeBoard::new(),
            link_format: services.link_format.clone(),
            subscriptions,
        }
    }

    /// Detach from the host. Equivalent to dropping the view.
    pub fn unmount(self) {
        drop(self);
    }

    pub fn title(&self) -> &str {
        &self.options.title
    }

    pub fn file_path(&self) -> &str {
        &self.options.file_path
    }

    pub fn layout(&self) -> LayoutMode {
        self.options.layout
    }

    /// Raw document bytes for the render engine to decode.
    pub fn contents(&self) -> &[u8] {
        &self.options.contents
    }

    /// Position restored at mount (the sentinel on first open).
    pub fn initial_location(&self) -> &LocationToken {
        &self.initial_location
    }

    /// The engine finished loading the document.
    pub fn attach_engine(&self, engine: Box<dyn RenderEngine>) {
        self.bridge.attach_engine(engine);
    }

    pub fn handle(&self) -> HostHandle {
        self.bridge.handle()
    }

    pub fn current_location(&self) -> LocationToken {
        self.bridge.get_current_location()
    }

    pub fn jump_to(&self, location: LocationToken) -> Result<(), BridgeError> {
        self.bridge.jump_to(location)
    }

    pub fn toolbar_state(&self) -> ToolbarState {
        self.toolbar.borrow().state().clone()
    }

    pub fn copy_reference(&mut self) -> Result<String, ActionError> {
        let mut clipboard = self.clipboard.borrow_mut();
        self.toolbar.borrow_mut().copy_reference(
            self.bridge.as_ref(),
            &mut *clipboard,
            &mut self.notices,
        )
    }

    pub fn highlight(&mut self) -> Result<LocationToken, ActionError> {
        self.toolbar
            .borrow_mut()
            .highlight(self.bridge.as_ref(), &self.engine, &mut self.notices)
    }

    pub fn perform(&mut self, action: ToolbarAction) -> Result<(), ActionError> {
        match action {
            ToolbarAction::CopyReference => self.copy_reference().map(drop),
            ToolbarAction::Highlight => self.highlight().map(drop),
        }
    }

    /// Copy a link to the page being read, without any excerpt.
    pub fn copy_page_link(&mut self) -> Result<String, ActionError> {
        let Some(location) = self.bridge.resolvable_location() else {
            self.notices
                .warn("Reading position unknown, wait for the book to finish loading");
            return Err(ActionError::PositionUnknown);
        };
        let link = self
            .link_format
            .page_link(&self.options.file_path, &location);
        if let Err(e) = self.clipboard.borrow_mut().write_text(&link) {
            let err = ActionError::Clipboard {
                detail: format!("{e:#}"),
            };
            self.notices.error(err.to_string());
            return Err(err);
        }
        self.notices.info("Copied link to current page");
        Ok(link)
    }

    pub fn set_font_scale(&self, percent: u16) -> FontScale {
        self.engine.borrow_mut().set_font_scale(percent)
    }

    pub fn font_scale(&self) -> FontScale {
        self.engine.borrow().font_scale()
    }

    pub fn apply_color_mode(&self, mode: ColorMode) {
        self.engine.borrow_mut().apply_theme(mode);
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }
}

impl Drop for ReaderView {
    fn drop(&mut self) {
        self.subscriptions.clear();
        self.bridge.detach();
        if let Ok(mut toolbar) = self.toolbar.try_borrow_mut() {
            toolbar.disarm();
        }
        info!("Unmounted {:?}", self.options.title);
    }
}
