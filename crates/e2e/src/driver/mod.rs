//! Driver adapter boundary
//!
//! Everything the runner does to a browser goes through [`Driver`]. Two
//! adapters ship with the crate: [`WebDriver`] talks W3C WebDriver to a real
//! browser, [`MockDriver`] serves in-memory documents for deterministic tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pagecheck_common::{DomNode, ElementState, Locator, Viewport};

use crate::error::DriverResult;

pub mod mock;
pub mod webdriver;

pub use mock::{DriverCall, MockDriver, PageContext};
pub use webdriver::WebDriver;

/// Remote browser operations. Every call is a suspension point; failures are
/// typed [`DriverError`](crate::error::DriverError)s, never silent no-ops.
#[async_trait]
pub trait Driver: Send {
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// State of every element `locator` matches, in document order. The
    /// locator's index is ignored here.
    async fn query(&mut self, locator: &Locator) -> DriverResult<Vec<ElementState>>;

    /// Append `text` to the addressed element's value
    async fn type_text(&mut self, locator: &Locator, text: &str) -> DriverResult<()>;

    async fn clear(&mut self, locator: &Locator) -> DriverResult<()>;

    async fn click(&mut self, locator: &Locator) -> DriverResult<()>;

    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()>;

    async fn viewport(&mut self) -> DriverResult<Viewport>;

    /// Clear local and session storage of the current origin
    async fn clear_storage(&mut self) -> DriverResult<()>;

    async fn storage(&mut self) -> DriverResult<StorageSnapshot>;

    /// Serialized tree of the whole current document
    async fn page_snapshot(&mut self) -> DriverResult<DomNode>;

    async fn close(&mut self) -> DriverResult<()> {
        Ok(())
    }
}

/// Contents of the client-side storage areas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSnapshot {
    #[serde(default)]
    pub local: BTreeMap<String, String>,
    #[serde(default)]
    pub session: BTreeMap<String, String>,
}

impl StorageSnapshot {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.session.is_empty()
    }
}
