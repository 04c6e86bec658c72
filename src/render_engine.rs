use log::debug;

use crate::error::EngineError;
use crate::location::LocationToken;
use crate::theme::{ColorMode, FontScale};

/// What an external render engine has to offer the reader core.
pub trait RenderEngine {
    /// Start of the currently displayed range, if the engine knows it.
    fn current_location(&self) -> Option<LocationToken>;

    fn display(&mut self, location: &LocationToken) -> Result<(), EngineError>;

    fn override_style(&mut self, property: &str, value: &str);

    fn set_font_size(&mut self, size: &str);

    fn resize(&mut self, width: f64, height: f64);

    fn highlight(&mut self, location: &LocationToken) -> Result<(), EngineError>;
}

/// Outcome of a call that may arrive before the engine finished loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    Applied,
    NotLoaded,
}

/// Façade over an optional, possibly not yet loaded, engine.
///
/// Presentation settings requested before the engine exists are remembered
/// and pushed once it attaches.
#[derive(Default)]
pub struct RenderEngineAdapter {
    engine: Option<Box<dyn RenderEngine>>,
    color_mode: Option<ColorMode>,
    font_scale: FontScale,
    viewport: Option<(f64, f64)>,
}

impl RenderEngineAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, mut engine: Box<dyn RenderEngine>) {
        if let Some(mode) = self.color_mode {
            push_theme(engine.as_mut(), mode);
        }
        engine.set_font_size(&self.font_scale.as_css());
        if let Some((width, height)) = self.viewport {
            engine.resize(width, height);
        }
        self.engine = Some(engine);
    }

    pub fn get_current_location(&self) -> Option<LocationToken> {
        self.engine.as_ref()?.current_location()
    }

    pub fn navigate_to(&mut self, location: &LocationToken) -> Result<EngineCall, EngineError> {
        match self.engine.as_mut() {
            Some(engine) => {
                engine.display(location)?;
                Ok(EngineCall::Applied)
            }
            None => Ok(EngineCall::NotLoaded),
        }
    }

    pub fn apply_theme(&mut self, mode: ColorMode) {
        self.color_mode = Some(mode);
        if let Some(engine) = self.engine.as_mut() {
            push_theme(engine.as_mut(), mode);
        }
    }

    pub fn set_font_scale(&mut self, percent: u16) -> FontScale {
        self.font_scale = FontScale::new(percent);
        if let Some(engine) = self.engine.as_mut() {
            engine.set_font_size(&self.font_scale.as_css());
        }
        self.font_scale
    }

    pub fn font_scale(&self) -> FontScale {
        self.font_scale
    }

    pub fn resize_viewport(&mut self, width: f64, height: f64) {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            debug!("Ignoring degenerate viewport {width}x{height}");
            return;
        }
        self.viewport = Some((width, height));
        if let Some(engine) = self.engine.as_mut() {
            engine.resize(width, height);
        }
    }

    /// Session-scoped highlight; nothing is stored.
    pub fn highlight_at(&mut self, location: &LocationToken) -> Result<EngineCall, EngineError> {
        match self.engine.as_mut() {
            Some(engine) => {
                engine.highlight(location)?;
                Ok(EngineCall::Applied)
            }
            None => Ok(EngineCall::NotLoaded),
        }
    }
}

fn push_theme(engine: &mut dyn RenderEngine, mode: ColorMode) {
    let overrides = mode.overrides();
    engine.override_style("color", overrides.color);
    engine.override_style("background", overrides.background);
}
