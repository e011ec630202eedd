//! pagecheck common library
//!
//! Page snapshot model, selector engine, locators, viewport presets and the
//! runner configuration shared by the pagecheck crates.

pub mod config;
pub mod dom;
pub mod error;
pub mod locator;
pub mod selector;
pub mod viewport;

// Re-export commonly used types
pub use config::{Config, WebDriverConfig};
pub use dom::{Document, DomNode, ElementState, NodeId};
pub use error::{Error, Result};
pub use locator::{Locator, FOCUSABLE};
pub use selector::SelectorList;
pub use viewport::{Orientation, Viewport, ViewportProfile};

/// pagecheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pagecheck.toml";
