use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::error::BridgeError;
use crate::location::LocationToken;
use crate::persist::PositionWriter;
use crate::position_store::position_key;
use crate::render_engine::{EngineCall, RenderEngine, RenderEngineAdapter};

pub const DEFAULT_STORAGE_READ_TIMEOUT: Duration = Duration::from_millis(500);

struct BridgeCore {
    document_id: String,
    canonical: Option<LocationToken>,
    /// Jump requested before the engine loaded; canonical only once accepted
    pending_jump: Option<LocationToken>,
    engine: Rc<RefCell<RenderEngineAdapter>>,
    writer: Rc<PositionWriter>,
    read_timeout: Duration,
    attached: bool,
}

impl BridgeCore {
    fn persist(&self, location: &LocationToken) {
        if self.document_id.is_empty() {
            debug!("No document yet, not persisting {location}");
            return;
        }
        self.writer.persist(&position_key(&self.document_id), location);
    }
}

/// Single source of truth for where the reader is.
///
/// The render engine (page turns, scrolling), the host (programmatic jumps)
/// and the position store (the value restored at mount) all move the
/// position. The bridge reconciles them, persists every position the engine
/// accepted and hands the host a revocable [`HostHandle`].
pub struct PositionBridge {
    core: Rc<RefCell<BridgeCore>>,
}

impl PositionBridge {
    pub fn new(engine: Rc<RefCell<RenderEngineAdapter>>, writer: Rc<PositionWriter>) -> Self {
        Self {
            core: Rc::new(RefCell::new(BridgeCore {
                document_id: String::new(),
                canonical: None,
                pending_jump: None,
                engine,
                writer,
                read_timeout: DEFAULT_STORAGE_READ_TIMEOUT,
                attached: true,
            })),
        }
    }

    pub fn with_read_timeout(self, timeout: Duration) -> Self {
        self.core.borrow_mut().read_timeout = timeout;
        self
    }

    /// Seed the position from storage. Never fails: a missing, slow or broken
    /// store yields the start-of-document sentinel.
    pub fn initialize(&self, document_id: &str) -> LocationToken {
        let mut core = self.core.borrow_mut();
        core.document_id = document_id.to_string();

        let key = position_key(document_id);
        let restored = match core.writer.load(&key, core.read_timeout) {
            Ok(Some(location)) => {
                info!("Restored position for {document_id:?}: {location}");
                location
            }
            Ok(None) => {
                debug!("No stored position for {document_id:?}");
                LocationToken::start()
            }
            Err(e) => {
                error!("Failed to read position for {document_id:?}, starting at the beginning: {e:#}");
                LocationToken::start()
            }
        };
        core.canonical = Some(restored.clone());
        restored
    }

    /// The engine moved; remember and persist where it is now.
    pub fn on_render_location_changed(&self, location: LocationToken) {
        let mut core = self.core.borrow_mut();
        if !core.attached {
            debug!("Ignoring location {location} reported after detach");
            return;
        }
        core.persist(&location);
        core.canonical = Some(location);
    }

    /// Live engine position, else the last known one, else the sentinel.
    pub fn get_current_location(&self) -> LocationToken {
        current_location(&self.core).unwrap_or_else(LocationToken::start)
    }

    /// Like [`Self::get_current_location`], but `None` while only the
    /// start-of-document sentinel is known. Links cannot point at it.
    pub fn resolvable_location(&self) -> Option<LocationToken> {
        current_location(&self.core).filter(|location| !location.is_start())
    }

    pub fn jump_to(&self, location: LocationToken) -> Result<(), BridgeError> {
        jump_to(&self.core, location)
    }

    pub fn on_viewport_resized(&self, width: f64, height: f64) {
        let engine = {
            let core = self.core.borrow();
            if !core.attached {
                return;
            }
            core.engine.clone()
        };
        engine.borrow_mut().resize_viewport(width, height);
    }

    /// Hand the loaded engine over and bring it to the known position.
    ///
    /// A jump deferred while loading is replayed first. If the engine refuses
    /// it, the position known before that jump is restored instead.
    pub fn attach_engine(&self, engine: Box<dyn RenderEngine>) {
        let (adapter, pending, restored) = {
            let mut core = self.core.borrow_mut();
            (
                core.engine.clone(),
                core.pending_jump.take(),
                core.canonical.clone(),
            )
        };
        adapter.borrow_mut().attach(engine);

        if let Some(location) = pending {
            let outcome = adapter.borrow_mut().navigate_to(&location);
            match outcome {
                Ok(_) => {
                    info!("Jumped to deferred location {location}");
                    let mut core = self.core.borrow_mut();
                    core.persist(&location);
                    core.canonical = Some(location);
                    return;
                }
                Err(e) => warn!("Engine refused deferred jump to {location}: {e}"),
            }
        }

        if let Some(location) = restored.filter(|l| !l.is_start()) {
            let outcome = adapter.borrow_mut().navigate_to(&location);
            if let Err(e) = outcome {
                warn!("Engine refused restored position {location}: {e}");
            }
        }
    }

    /// Capability object for the host; revoked by [`Self::detach`].
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            core: Rc::downgrade(&self.core),
        }
    }

    pub fn detach(&self) {
        let mut core = self.core.borrow_mut();
        if core.attached {
            core.attached = false;
            info!("Position bridge for {:?} detached", core.document_id);
        }
    }
}

/// What the host keeps to read and set the position of a mounted view.
///
/// Every call fails with [`BridgeError::Detached`] once the view is gone.
#[derive(Clone)]
pub struct HostHandle {
    core: Weak<RefCell<BridgeCore>>,
}

impl HostHandle {
    /// `None` when the view has no position worth linking to yet.
    pub fn get_current_location(&self) -> Result<Option<LocationToken>, BridgeError> {
        let core = self.live_core()?;
        Ok(current_location(&core).filter(|location| !location.is_start()))
    }

    pub fn jump_to(&self, location: LocationToken) -> Result<(), BridgeError> {
        let core = self.live_core()?;
        jump_to(&core, location)
    }

    pub fn is_live(&self) -> bool {
        self.live_core().is_ok()
    }

    fn live_core(&self) -> Result<Rc<RefCell<BridgeCore>>, BridgeError> {
        let core = self.core.upgrade().ok_or(BridgeError::Detached)?;
        let attached = core
            .try_borrow()
            .map(|c| c.attached)
            .unwrap_or(true);
        if attached {
            Ok(core)
        } else {
            Err(BridgeError::Detached)
        }
    }
}

// Reads never panic on a busy engine; they fall back to the remembered value.
fn current_location(core: &RefCell<BridgeCore>) -> Option<LocationToken> {
    let core = core.try_borrow().ok()?;
    let live = core
        .engine
        .try_borrow()
        .ok()
        .and_then(|engine| engine.get_current_location());
    live.or_else(|| core.pending_jump.clone())
        .or_else(|| core.canonical.clone())
}

fn jump_to(core: &RefCell<BridgeCore>, location: LocationToken) -> Result<(), BridgeError> {
    let engine = {
        let core = core.borrow();
        if !core.attached {
            return Err(BridgeError::Detached);
        }
        core.engine.clone()
    };

    let outcome = engine.borrow_mut().navigate_to(&location);
    match outcome {
        Ok(EngineCall::NotLoaded) => {
            debug!("Engine not loaded, jump to {location} deferred");
            core.borrow_mut().pending_jump = Some(location);
            Ok(())
        }
        Ok(EngineCall::Applied) => {
            info!("Jumped to {location}");
            let mut core = core.borrow_mut();
            core.persist(&location);
            core.canonical = Some(location);
            core.pending_jump = None;
            Ok(())
        }
        Err(source) => {
            warn!("Jump to {location} rejected: {source}");
            Err(BridgeError::Navigation {
                token: location,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position_store::PositionStore;
    use crate::test_utils::{FailingStore, FakeEngine, SharedMemoryStore, SlowStore};

    fn bridge_with(store: Box<dyn PositionStore>) -> (PositionBridge, Rc<PositionWriter>) {
        let writer = Rc::new(PositionWriter::spawn(store).unwrap());
        let adapter = Rc::new(RefCell::new(RenderEngineAdapter::new()));
        (PositionBridge::new(adapter, writer.clone()), writer)
    }

    #[test]
    fn first_open_starts_at_sentinel() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        assert_eq!(bridge.initialize("MyBook"), LocationToken::Ordinal(0));
        assert_eq!(bridge.get_current_location(), LocationToken::start());
        assert_eq!(bridge.resolvable_location(), None);
    }

    #[test]
    fn reported_location_is_persisted_under_title_key() {
        let store = SharedMemoryStore::new();
        let (bridge, writer) = bridge_with(Box::new(store.clone()));
        bridge.initialize("MyBook");

        bridge.on_render_location_changed(LocationToken::cfi("epubcfi(/6/4!/4/2)"));
        writer.flush().unwrap();

        assert_eq!(
            store.get("reader-position:MyBook"),
            Some(LocationToken::cfi("epubcfi(/6/4!/4/2)"))
        );
    }

    #[test]
    fn rapid_reports_persist_the_last_one() {
        let store = SharedMemoryStore::new();
        let (bridge, writer) = bridge_with(Box::new(store.clone()));
        bridge.initialize("Book");

        for i in 1..=50 {
            bridge.on_render_location_changed(LocationToken::cfi(format!("L{i}")));
        }
        writer.flush().unwrap();

        assert_eq!(store.get("reader-position:Book"), Some(LocationToken::cfi("L50")));
        assert_eq!(bridge.get_current_location(), LocationToken::cfi("L50"));
    }

    #[test]
    fn restored_position_is_used_until_engine_reports() {
        let store = SharedMemoryStore::new();
        store.insert("reader-position:Book", LocationToken::cfi("L9"));
        let (bridge, _) = bridge_with(Box::new(store));

        assert_eq!(bridge.initialize("Book"), LocationToken::cfi("L9"));
        assert_eq!(bridge.resolvable_location(), Some(LocationToken::cfi("L9")));
    }

    #[test]
    fn broken_or_slow_storage_falls_back_to_sentinel() {
        let (bridge, _) = bridge_with(Box::new(FailingStore));
        assert!(bridge.initialize("Book").is_start());

        let (bridge, _) = bridge_with(Box::new(SlowStore::new(Duration::from_millis(500))));
        let bridge = bridge.with_read_timeout(Duration::from_millis(10));
        assert!(bridge.initialize("Book").is_start());
    }

    #[test]
    fn live_engine_position_wins_over_last_report() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        bridge.initialize("Book");
        bridge.on_render_location_changed(LocationToken::cfi("stale"));

        let engine = FakeEngine::new();
        let cursor = engine.cursor();
        bridge.attach_engine(Box::new(engine));
        cursor.set(LocationToken::cfi("fresh"));

        assert_eq!(bridge.get_current_location(), LocationToken::cfi("fresh"));
    }

    #[test]
    fn jump_round_trips_through_engine() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        bridge.initialize("Book");
        bridge.attach_engine(Box::new(FakeEngine::new()));

        for token in [LocationToken::cfi("epubcfi(/6/2!/4)"), LocationToken::Ordinal(17)] {
            bridge.jump_to(token.clone()).unwrap();
            assert_eq!(bridge.get_current_location(), token);
        }
    }

    #[test]
    fn rejected_jump_keeps_previous_position() {
        let store = SharedMemoryStore::new();
        let (bridge, writer) = bridge_with(Box::new(store.clone()));
        bridge.initialize("Book");
        bridge.attach_engine(Box::new(FakeEngine::new().rejecting("garbage")));
        bridge.jump_to(LocationToken::cfi("good")).unwrap();

        let err = bridge.jump_to(LocationToken::cfi("garbage")).unwrap_err();
        assert!(matches!(err, BridgeError::Navigation { .. }));
        assert_eq!(bridge.get_current_location(), LocationToken::cfi("good"));

        writer.flush().unwrap();
        assert_eq!(store.get("reader-position:Book"), Some(LocationToken::cfi("good")));
    }

    #[test]
    fn jump_before_engine_loads_is_replayed_on_attach() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        bridge.initialize("Book");
        bridge.jump_to(LocationToken::cfi("L5")).unwrap();
        assert_eq!(bridge.get_current_location(), LocationToken::cfi("L5"));

        let engine = FakeEngine::new();
        let log = engine.log();
        bridge.attach_engine(Box::new(engine));
        assert_eq!(log.borrow().displayed, vec![LocationToken::cfi("L5")]);
    }

    #[test]
    fn deferred_jump_is_not_persisted_before_engine_accepts() {
        let store = SharedMemoryStore::new();
        let (bridge, writer) = bridge_with(Box::new(store.clone()));
        bridge.initialize("Book");
        bridge.jump_to(LocationToken::cfi("L5")).unwrap();

        writer.flush().unwrap();
        assert_eq!(store.get("reader-position:Book"), None);

        bridge.attach_engine(Box::new(FakeEngine::new()));
        writer.flush().unwrap();
        assert_eq!(store.get("reader-position:Book"), Some(LocationToken::cfi("L5")));
    }

    #[test]
    fn deferred_jump_rejected_on_attach_restores_previous_position() {
        let store = SharedMemoryStore::new();
        store.insert("reader-position:Book", LocationToken::cfi("good"));
        let (bridge, writer) = bridge_with(Box::new(store.clone()));
        bridge.initialize("Book");

        bridge.jump_to(LocationToken::cfi("garbage")).unwrap();
        let engine = FakeEngine::new().rejecting("garbage");
        let log = engine.log();
        bridge.attach_engine(Box::new(engine));
        writer.flush().unwrap();

        assert_eq!(bridge.get_current_location(), LocationToken::cfi("good"));
        assert_eq!(store.get("reader-position:Book"), Some(LocationToken::cfi("good")));
        assert_eq!(log.borrow().displayed, vec![LocationToken::cfi("good")]);
    }

    #[test]
    fn handle_is_revoked_on_detach() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        bridge.initialize("Book");
        bridge.on_render_location_changed(LocationToken::cfi("L3"));

        let handle = bridge.handle();
        assert_eq!(
            handle.get_current_location().unwrap(),
            Some(LocationToken::cfi("L3"))
        );

        bridge.detach();
        assert!(matches!(
            handle.get_current_location(),
            Err(BridgeError::Detached)
        ));
        assert!(matches!(
            handle.jump_to(LocationToken::cfi("L4")),
            Err(BridgeError::Detached)
        ));
        assert!(!handle.is_live());
    }

    #[test]
    fn handle_reports_nothing_for_sentinel() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        bridge.initialize("Book");
        assert_eq!(bridge.handle().get_current_location().unwrap(), None);
    }

    #[test]
    fn handle_outliving_bridge_is_detached() {
        let (bridge, _) = bridge_with(Box::new(SharedMemoryStore::new()));
        let handle = bridge.handle();
        drop(bridge);
        assert!(matches!(
            handle.get_current_location(),
            Err(BridgeError::Detached)
        ));
    }
}
