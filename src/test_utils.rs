//! Recording fakes for the reader's external collaborators.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};

use crate::clipboard::Clipboard;
use crate::error::EngineError;
use crate::location::LocationToken;
use crate::overlay::{AffordancePosition, OverlaySurface};
use crate::position_store::PositionStore;
use crate::render_engine::RenderEngine;

/// Everything a [`FakeEngine`] was asked to do.
#[derive(Debug, Default)]
pub struct EngineLog {
    pub displayed: Vec<LocationToken>,
    pub styles: Vec<(String, String)>,
    pub font_sizes: Vec<String>,
    pub resizes: Vec<(f64, f64)>,
    pub highlights: Vec<LocationToken>,
}

/// Handle to move a [`FakeEngine`] as if the reader scrolled.
#[derive(Clone)]
pub struct EngineCursor(Rc<RefCell<Option<LocationToken>>>);

impl EngineCursor {
    pub fn set(&self, location: LocationToken) {
        *self.0.borrow_mut() = Some(location);
    }

    pub fn get(&self) -> Option<LocationToken> {
        self.0.borrow().clone()
    }
}

pub struct FakeEngine {
    cursor: EngineCursor,
    rejected: Vec<String>,
    log: Rc<RefCell<EngineLog>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            cursor: EngineCursor(Rc::new(RefCell::new(None))),
            rejected: Vec::new(),
            log: Rc::new(RefCell::new(EngineLog::default())),
        }
    }

    /// Refuse to display the given token.
    pub fn rejecting(mut self, token: &str) -> Self {
        self.rejected.push(token.to_string());
        self
    }

    pub fn log(&self) -> Rc<RefCell<EngineLog>> {
        self.log.clone()
    }

    pub fn cursor(&self) -> EngineCursor {
        self.cursor.clone()
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for FakeEngine {
    fn current_location(&self) -> Option<LocationToken> {
        self.cursor.get()
    }

    fn display(&mut self, location: &LocationToken) -> Result<(), EngineError> {
        if self.rejected.contains(&location.to_string()) {
            return Err(EngineError::rejected(location, "no such location"));
        }
        self.log.borrow_mut().displayed.push(location.clone());
        self.cursor.set(location.clone());
        Ok(())
    }

    fn override_style(&mut self, property: &str, value: &str) {
        self.log
            .borrow_mut()
            .styles
            .push((property.to_string(), value.to_string()));
    }

    fn set_font_size(&mut self, size: &str) {
        self.log.borrow_mut().font_sizes.push(size.to_string());
    }

    fn resize(&mut self, width: f64, height: f64) {
        self.log.borrow_mut().resizes.push((width, height));
    }

    fn highlight(&mut self, location: &LocationToken) -> Result<(), EngineError> {
        if self.rejected.contains(&location.to_string()) {
            return Err(EngineError::generic(format!("cannot highlight {location}")));
        }
        self.log.borrow_mut().highlights.push(location.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryClipboard {
    pub writes: Vec<String>,
    pub fail: bool,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        if self.fail {
            bail!("clipboard unavailable");
        }
        self.writes.push(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayCall {
    InjectStyle,
    Create,
    Show(AffordancePosition),
    Hide,
    Remove,
    RemoveStyle,
}

#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub calls: Vec<OverlayCall>,
}

impl RecordingOverlay {
    pub fn visible(&self) -> bool {
        matches!(
            self.calls
                .iter()
                .rev()
                .find(|c| matches!(c, OverlayCall::Show(_) | OverlayCall::Hide)),
            Some(OverlayCall::Show(_))
        )
    }
}

impl OverlaySurface for RecordingOverlay {
    fn inject_style(&mut self) {
        self.calls.push(OverlayCall::InjectStyle);
    }

    fn create_affordance(&mut self) {
        self.calls.push(OverlayCall::Create);
    }

    fn show_affordance(&mut self, position: AffordancePosition) {
        self.calls.push(OverlayCall::Show(position));
    }

    fn hide_affordance(&mut self) {
        self.calls.push(OverlayCall::Hide);
    }

    fn remove_affordance(&mut self) {
        self.calls.push(OverlayCall::Remove);
    }

    fn remove_style(&mut self) {
        self.calls.push(OverlayCall::RemoveStyle);
    }
}

/// In-memory store the test keeps a second handle to.
#[derive(Clone, Default)]
pub struct SharedMemoryStore {
    positions: Arc<Mutex<HashMap<String, LocationToken>>>,
    writes: Arc<Mutex<usize>>,
}

impl SharedMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, location: LocationToken) {
        self.positions
            .lock()
            .unwrap()
            .insert(key.to_string(), location);
    }

    pub fn get(&self, key: &str) -> Option<LocationToken> {
        self.positions.lock().unwrap().get(key).cloned()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }
}

impl PositionStore for SharedMemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<LocationToken>> {
        Ok(self.get(key))
    }

    fn store(&mut self, key: &str, location: &LocationToken) -> anyhow::Result<()> {
        self.insert(key, location.clone());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

/// Store whose every operation fails.
pub struct FailingStore;

impl PositionStore for FailingStore {
    fn load(&self, _key: &str) -> anyhow::Result<Option<LocationToken>> {
        Err(anyhow!("storage is offline"))
    }

    fn store(&mut self, _key: &str, _location: &LocationToken) -> anyhow::Result<()> {
        Err(anyhow!("storage is offline"))
    }
}

/// Store that takes `delay` to answer a read.
pub struct SlowStore {
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl PositionStore for SlowStore {
    fn load(&self, _key: &str) -> anyhow::Result<Option<LocationToken>> {
        std::thread::sleep(self.delay);
        Ok(None)
    }

    fn store(&mut self, _key: &str, _location: &LocationToken) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Store whose first write blocks until the paired [`StoreGate`] opens.
pub struct GatedStore {
    inner: SharedMemoryStore,
    entered: flume::Sender<()>,
    gate: flume::Receiver<()>,
}

/// Test-side end of a [`GatedStore`].
pub struct StoreGate {
    entered: flume::Receiver<()>,
    open: flume::Sender<()>,
}

impl GatedStore {
    pub fn new(inner: SharedMemoryStore) -> (Self, StoreGate) {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (open_tx, open_rx) = flume::bounded(0);
        let store = Self {
            inner,
            entered: entered_tx,
            gate: open_rx,
        };
        let gate = StoreGate {
            entered: entered_rx,
            open: open_tx,
        };
        (store, gate)
    }
}

impl StoreGate {
    /// Block until the writer is inside its first write.
    pub fn wait_for_writer(&self) {
        let _ = self.entered.recv_timeout(Duration::from_secs(5));
    }

    /// Let the blocked write and every later one through.
    pub fn open(self) {
        drop(self.open);
    }
}

impl PositionStore for GatedStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<LocationToken>> {
        self.inner.load(key)
    }

    fn store(&mut self, key: &str, location: &LocationToken) -> anyhow::Result<()> {
        let _ = self.entered.send(());
        // Returns at once after the gate sender is dropped.
        let _ = self.gate.recv();
        self.inner.store(key, location)
    }
}
