//! Viewport sizes and named device presets

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn rotated(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1000, 660)
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Device presets, portrait dimensions
const PRESETS: &[(&str, Viewport)] = &[
    ("macbook-16", Viewport::new(1536, 960)),
    ("macbook-15", Viewport::new(1440, 900)),
    ("macbook-13", Viewport::new(1280, 800)),
    ("macbook-11", Viewport::new(1366, 768)),
    ("ipad-2", Viewport::new(768, 1024)),
    ("ipad-mini", Viewport::new(768, 1024)),
    ("iphone-xr", Viewport::new(414, 896)),
    ("iphone-x", Viewport::new(375, 812)),
    ("iphone-6+", Viewport::new(414, 736)),
    ("iphone-se2", Viewport::new(375, 667)),
    ("iphone-8", Viewport::new(375, 667)),
    ("iphone-7", Viewport::new(375, 667)),
    ("iphone-6", Viewport::new(375, 667)),
    ("iphone-5", Viewport::new(320, 568)),
    ("iphone-4", Viewport::new(320, 480)),
    ("iphone-3", Viewport::new(320, 480)),
    ("samsung-s10", Viewport::new(360, 760)),
    ("samsung-note9", Viewport::new(414, 846)),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// A viewport to apply before a suite or test: a named device or an
/// explicit size.
///
/// Deserializes from `"iphone-x"`, `"iphone-x:landscape"` or
/// `{ width: 375, height: 812 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProfileSpec", into = "ProfileSpec")]
pub enum ViewportProfile {
    Preset {
        name: String,
        orientation: Orientation,
    },
    Custom(Viewport),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ProfileSpec {
    Named(String),
    Size(Viewport),
}

impl TryFrom<ProfileSpec> for ViewportProfile {
    type Error = Error;

    fn try_from(spec: ProfileSpec) -> Result<Self> {
        match spec {
            ProfileSpec::Named(name) => name.parse(),
            ProfileSpec::Size(size) => Ok(ViewportProfile::Custom(size)),
        }
    }
}

impl From<ViewportProfile> for ProfileSpec {
    fn from(profile: ViewportProfile) -> Self {
        match profile {
            ViewportProfile::Custom(size) => ProfileSpec::Size(size),
            named => ProfileSpec::Named(named.to_string()),
        }
    }
}

impl ViewportProfile {
    pub fn preset(name: &str) -> Result<Self> {
        name.parse()
    }

    pub fn landscape(self) -> Self {
        match self {
            ViewportProfile::Preset { name, .. } => ViewportProfile::Preset {
                name,
                orientation: Orientation::Landscape,
            },
            custom => custom,
        }
    }

    /// Resolved width and height
    pub fn viewport(&self) -> Viewport {
        match self {
            ViewportProfile::Custom(size) => *size,
            ViewportProfile::Preset { name, orientation } => {
                // names are validated on construction
                let size = lookup(name).unwrap_or_default();
                match orientation {
                    Orientation::Portrait => size,
                    Orientation::Landscape => size.rotated(),
                }
            }
        }
    }

    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }
}

fn lookup(name: &str) -> Option<Viewport> {
    PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, size)| *size)
}

impl FromStr for ViewportProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, orientation) = match s.split_once(':') {
            Some((name, "landscape")) => (name, Orientation::Landscape),
            Some((name, "portrait")) => (name, Orientation::Portrait),
            Some(_) => return Err(Error::UnknownViewport(s.to_string())),
            None => (s, Orientation::Portrait),
        };
        let name = name.trim().to_ascii_lowercase();
        if lookup(&name).is_none() {
            return Err(Error::UnknownViewport(s.to_string()));
        }
        Ok(ViewportProfile::Preset { name, orientation })
    }
}

impl fmt::Display for ViewportProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewportProfile::Preset {
                name,
                orientation: Orientation::Portrait,
            } => f.write_str(name),
            ViewportProfile::Preset {
                name,
                orientation: Orientation::Landscape,
            } => write!(f, "{}:landscape", name),
            ViewportProfile::Custom(size) => write!(f, "{}", size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("iphone-x", 375, 812)]
    #[test_case("iphone-x:landscape", 812, 375)]
    #[test_case("macbook-15", 1440, 900)]
    #[test_case("samsung-s10", 360, 760)]
    fn test_preset_sizes(name: &str, width: u32, height: u32) {
        let profile: ViewportProfile = name.parse().unwrap();
        assert_eq!(profile.viewport(), Viewport::new(width, height));
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(
            "nokia-3310".parse::<ViewportProfile>(),
            Err(Error::UnknownViewport(_))
        ));
        assert!("iphone-x:sideways".parse::<ViewportProfile>().is_err());
    }

    #[test]
    fn test_deserialize_forms() {
        let named: ViewportProfile = serde_json::from_str(r#""iphone-x""#).unwrap();
        assert_eq!(named.to_string(), "iphone-x");
        let custom: ViewportProfile = serde_json::from_str(r#"{"width": 800, "height": 600}"#).unwrap();
        assert_eq!(custom, ViewportProfile::Custom(Viewport::new(800, 600)));
    }
}
