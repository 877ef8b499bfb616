//! View, video and resolution selections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::PlaybackError;

/// Course view layout requested through the `viewMode` route parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Slides only, video hidden
    #[serde(rename = "SLIDE_MODE")]
    SlideMode,
    /// Video with slides alongside
    #[default]
    #[serde(rename = "COMBINED_MODE")]
    CombinedMode,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::SlideMode => "SLIDE_MODE",
            ViewMode::CombinedMode => "COMBINED_MODE",
        }
    }

    /// The mode the "show/hide video" toggle switches to.
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::SlideMode => ViewMode::CombinedMode,
            ViewMode::CombinedMode => ViewMode::SlideMode,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewMode {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SLIDE_MODE" => Ok(ViewMode::SlideMode),
            "COMBINED_MODE" => Ok(ViewMode::CombinedMode),
            other => Err(PlaybackError::invalid_route_param("viewMode", other)),
        }
    }
}

/// Which recording drives the primary player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoMode {
    /// Prefer the presentation or composite recording, then the presenter
    #[default]
    Auto,
    Presenter,
    Presentation,
}

impl VideoMode {
    /// Value stored under the `videoMode` preference. `Auto` is stored as absence.
    pub fn preference_value(self) -> Option<&'static str> {
        match self {
            VideoMode::Auto => None,
            VideoMode::Presenter => Some("presenter"),
            VideoMode::Presentation => Some("presentation"),
        }
    }

    /// Parse a stored preference; anything unknown means `Auto`.
    pub fn from_preference(value: Option<&str>) -> Self {
        match value {
            Some("presenter") => VideoMode::Presenter,
            Some("presentation") => VideoMode::Presentation,
            _ => VideoMode::Auto,
        }
    }
}

/// Vertical video resolution in lines (360, 720, 1080, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resolution(pub u32);

impl Resolution {
    pub const DEFAULT: Resolution = Resolution(720);

    /// Key used by clip details documents (`r720`).
    pub fn key(self) -> String {
        format!("r{}", self.0)
    }

    /// Parse a `r720` style key.
    pub fn from_key(key: &str) -> Option<Self> {
        key.strip_prefix('r').and_then(|n| n.parse().ok()).map(Resolution)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

impl FromStr for Resolution {
    type Err = PlaybackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(Resolution)
            .ok_or_else(|| PlaybackError::parse("resolution", format!("'{s}' is not a line count")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_mode_round_trips_route_values() {
        assert_eq!("SLIDE_MODE".parse::<ViewMode>().unwrap(), ViewMode::SlideMode);
        assert_eq!(ViewMode::CombinedMode.to_string(), "COMBINED_MODE");
        assert!("VIDEO".parse::<ViewMode>().is_err());
        assert_eq!(ViewMode::SlideMode.toggled(), ViewMode::CombinedMode);
    }

    #[test]
    fn video_mode_preferences() {
        assert_eq!(VideoMode::from_preference(Some("presenter")), VideoMode::Presenter);
        assert_eq!(VideoMode::from_preference(Some("garbage")), VideoMode::Auto);
        assert_eq!(VideoMode::from_preference(None), VideoMode::Auto);
        assert_eq!(VideoMode::Auto.preference_value(), None);
    }

    #[test]
    fn resolution_keys() {
        assert_eq!(Resolution(1080).key(), "r1080");
        assert_eq!(Resolution::from_key("r360"), Some(Resolution(360)));
        assert_eq!(Resolution::from_key("presentationUrl"), None);
        assert_eq!("720".parse::<Resolution>().unwrap(), Resolution(720));
        assert!("0".parse::<Resolution>().is_err());
    }
}
