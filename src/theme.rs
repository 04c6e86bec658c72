use serde::{Deserialize, Serialize};

pub const MIN_FONT_SCALE: u16 = 80;
pub const MAX_FONT_SCALE: u16 = 180;
pub const DEFAULT_FONT_SCALE: u16 = 100;

/// Host color scheme the reader follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn from_dark_flag(is_dark: bool) -> Self {
        if is_dark {
            ColorMode::Dark
        } else {
            ColorMode::Light
        }
    }

    /// Style overrides pushed into rendered content.
    pub fn overrides(self) -> ThemeOverrides {
        match self {
            ColorMode::Dark => ThemeOverrides {
                color: "#fff",
                background: "#000",
            },
            ColorMode::Light => ThemeOverrides {
                color: "#000",
                background: "#fff",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeOverrides {
    pub color: &'static str,
    pub background: &'static str,
}

/// Font size as a percentage of the publication's own size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub struct FontScale(u16);

impl FontScale {
    pub fn new(percent: u16) -> Self {
        Self(percent.clamp(MIN_FONT_SCALE, MAX_FONT_SCALE))
    }

    pub fn percent(self) -> u16 {
        self.0
    }

    pub fn as_css(self) -> String {
        format!("{}%", self.0)
    }
}

impl Default for FontScale {
    fn default() -> Self {
        Self(DEFAULT_FONT_SCALE)
    }
}

impl From<u16> for FontScale {
    fn from(percent: u16) -> Self {
        Self::new(percent)
    }
}

impl From<FontScale> for u16 {
    fn from(scale: FontScale) -> Self {
        scale.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_scale_is_clamped() {
        assert_eq!(FontScale::new(10).percent(), 80);
        assert_eq!(FontScale::new(400).percent(), 180);
        assert_eq!(FontScale::default().as_css(), "100%");
    }

    #[test]
    fn dark_mode_inverts_colors() {
        let dark = ColorMode::from_dark_flag(true).overrides();
        assert_eq!((dark.color, dark.background), ("#fff", "#000"));
        let light = ColorMode::Light.overrides();
        assert_eq!((light.color, light.background), ("#000", "#fff"));
    }
}
