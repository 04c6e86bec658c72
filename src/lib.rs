pub mod clipboard;
pub mod error;
pub mod location;
pub mod notes;
pub mod notice;
pub mod overlay;
pub mod panic_handler;
pub mod persist;
pub mod position_bridge;
pub mod position_store;
pub mod reader_view;
pub mod reference;
pub mod render_engine;
pub mod selection_toolbar;
pub mod settings;
pub mod subscription;
pub mod theme;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ActionError, BridgeError, EngineError};
pub use location::LocationToken;
pub use position_bridge::{HostHandle, PositionBridge};
pub use reader_view::{HostSignals, MountOptions, ReaderServices, ReaderView, ViewportSize};
pub use selection_toolbar::{SelectionChange, SelectionRect, ToolbarAction, ToolbarState};
