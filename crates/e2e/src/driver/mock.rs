//! In-memory driver for deterministic tests
//!
//! Pages are `DomNode` trees keyed by URL. Navigating re-renders the page from
//! its tree, so element values and mutations do not survive a reload while
//! storage does. Click handlers stand in for the application under test, and
//! scheduled mutations model content that appears after a delay.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

use pagecheck_common::{Document, DomNode, ElementState, Locator, NodeId, Viewport};

use super::{Driver, StorageSnapshot};
use crate::error::{DriverError, DriverResult};

const BLANK_URL: &str = "about:blank";

/// Mutable view of the current page handed to click handlers
pub struct PageContext<'a> {
    pub url: &'a str,
    pub document: &'a mut Document,
    pub local_storage: &'a mut BTreeMap<String, String>,
    pub session_storage: &'a mut BTreeMap<String, String>,
}

impl PageContext<'_> {
    /// Current value of the first element `locator` matches
    pub fn value_of(&self, locator: &Locator) -> String {
        match self.document.locate_one(locator) {
            Ok(Some(id)) => self.document.value(id).to_string(),
            _ => String::new(),
        }
    }

    pub fn show(&mut self, locator: &Locator) {
        if let Ok(Some(id)) = self.document.locate_one(locator) {
            self.document.remove_attr(id, "hidden");
        }
    }

    pub fn hide(&mut self, locator: &Locator) {
        if let Ok(Some(id)) = self.document.locate_one(locator) {
            self.document.set_attr(id, "hidden", "");
        }
    }
}

type ClickAction = Box<dyn FnMut(&mut PageContext<'_>) + Send>;
type Mutation = Box<dyn FnOnce(&mut Document) + Send>;

/// Calls recorded by the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    Query(String),
    Type { selector: String, text: String },
    Clear(String),
    Click(String),
    SetViewport(Viewport),
    ClearStorage,
    Snapshot,
}

struct ClickHandler {
    target: Locator,
    action: ClickAction,
}

struct Scheduled {
    after_queries: usize,
    mutation: Mutation,
}

struct MockState {
    pages: BTreeMap<String, DomNode>,
    url: String,
    document: Document,
    handlers: Vec<ClickHandler>,
    scheduled: Vec<Scheduled>,
    local_storage: BTreeMap<String, String>,
    session_storage: BTreeMap<String, String>,
    viewport: Viewport,
    calls: Vec<DriverCall>,
    queries: usize,
    lost: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            pages: BTreeMap::new(),
            url: BLANK_URL.to_string(),
            document: Document::from_dom(&DomNode::element("html")),
            handlers: Vec::new(),
            scheduled: Vec::new(),
            local_storage: BTreeMap::new(),
            session_storage: BTreeMap::new(),
            viewport: Viewport::default(),
            calls: Vec::new(),
            queries: 0,
            lost: None,
        }
    }
}

impl MockState {
    fn ensure_session(&self) -> DriverResult<()> {
        match &self.lost {
            Some(reason) => Err(DriverError::SessionLost(reason.clone())),
            None => Ok(()),
        }
    }

    /// Resolve the element an action targets and check it can receive input
    fn actionable(&self, locator: &Locator) -> DriverResult<NodeId> {
        let id = self
            .document
            .locate_one(locator)?
            .ok_or_else(|| DriverError::NotFound {
                selector: locator.to_string(),
            })?;
        let refuse = |reason: &str| DriverError::NotInteractable {
            selector: locator.to_string(),
            reason: reason.to_string(),
        };
        if !self.document.is_visible(id) {
            return Err(refuse("element is not visible"));
        }
        if !self.document.is_enabled(id) {
            return Err(refuse("element is disabled"));
        }
        Ok(id)
    }

    fn editable(&self, locator: &Locator) -> DriverResult<NodeId> {
        let id = self.actionable(locator)?;
        let doc = &self.document;
        let typeable = match doc.tag(id) {
            "textarea" => true,
            "input" => !matches!(
                doc.attr(id, "type").unwrap_or("text"),
                "checkbox" | "radio" | "submit" | "button" | "reset" | "image" | "file"
            ),
            _ => doc.has_attr(id, "contenteditable"),
        };
        if !typeable || doc.has_attr(id, "readonly") {
            return Err(DriverError::NotInteractable {
                selector: locator.to_string(),
                reason: "element cannot be typed into".to_string(),
            });
        }
        Ok(id)
    }
}

/// Cloneable handle to an in-memory browser session
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `dom` at `url`
    pub fn with_page(self, url: impl Into<String>, dom: DomNode) -> Self {
        self.state.lock().pages.insert(url.into(), dom);
        self
    }

    /// Run `action` whenever the element `target` addresses (or one of its
    /// descendants) is clicked
    pub fn on_click<F>(self, target: Locator, action: F) -> Self
    where
        F: FnMut(&mut PageContext<'_>) + Send + 'static,
    {
        self.state.lock().handlers.push(ClickHandler {
            target,
            action: Box::new(action),
        });
        self
    }

    /// Apply `mutation` to the current document once `after_queries` more
    /// queries have been made
    pub fn schedule<F>(&self, after_queries: usize, mutation: F)
    where
        F: FnOnce(&mut Document) + Send + 'static,
    {
        let mut state = self.state.lock();
        let at = state.queries + after_queries;
        state.scheduled.push(Scheduled {
            after_queries: at,
            mutation: Box::new(mutation),
        });
    }

    pub fn set_local_item(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.lock().local_storage.insert(key.into(), value.into());
    }

    pub fn set_session_item(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.lock().session_storage.insert(key.into(), value.into());
    }

    pub fn storage_snapshot(&self) -> StorageSnapshot {
        let state = self.state.lock();
        StorageSnapshot {
            local: state.local_storage.clone(),
            session: state.session_storage.clone(),
        }
    }

    pub fn current_url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn current_viewport(&self) -> Viewport {
        self.state.lock().viewport
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    /// Recorded calls other than queries and snapshots
    pub fn actions(&self) -> Vec<DriverCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, DriverCall::Query(_) | DriverCall::Snapshot))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    /// Make every later call fail as if the browser had crashed
    pub fn lose_session(&self, reason: impl Into<String>) {
        self.state.lock().lost = Some(reason.into());
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::Navigate(url.to_string()));
        let dom = state
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| DriverError::Navigation {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
        state.document = Document::from_dom(&dom);
        state.url = url.to_string();
        trace!(url, "mock navigation");
        Ok(())
    }

    async fn query(&mut self, locator: &Locator) -> DriverResult<Vec<ElementState>> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::Query(locator.to_string()));
        state.queries += 1;

        let now = state.queries;
        let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.scheduled)
            .into_iter()
            .partition(|s| s.after_queries <= now);
        state.scheduled = pending;
        for scheduled in ready {
            (scheduled.mutation)(&mut state.document);
        }

        let doc = &state.document;
        Ok(doc
            .locate(locator)?
            .into_iter()
            .map(|id| doc.element_state(id))
            .collect())
    }

    async fn type_text(&mut self, locator: &Locator, text: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::Type {
            selector: locator.to_string(),
            text: text.to_string(),
        });
        let id = state.editable(locator)?;
        state.document.append_value(id, text);
        Ok(())
    }

    async fn clear(&mut self, locator: &Locator) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::Clear(locator.to_string()));
        let id = state.editable(locator)?;
        state.document.set_value(id, "");
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::Click(locator.to_string()));
        let clicked = state.actionable(locator)?;

        let MockState {
            url,
            document,
            handlers,
            local_storage,
            session_storage,
            ..
        } = &mut *state;
        for handler in handlers.iter_mut() {
            let hit = match document.locate_one(&handler.target)? {
                Some(target) => target == clicked || document.is_ancestor(target, clicked),
                None => false,
            };
            if hit {
                let mut page = PageContext {
                    url: url.as_str(),
                    document: &mut *document,
                    local_storage: &mut *local_storage,
                    session_storage: &mut *session_storage,
                };
                (handler.action)(&mut page);
            }
        }
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::SetViewport(viewport));
        state.viewport = viewport;
        Ok(())
    }

    async fn viewport(&mut self) -> DriverResult<Viewport> {
        let state = self.state.lock();
        state.ensure_session()?;
        Ok(state.viewport)
    }

    async fn clear_storage(&mut self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::ClearStorage);
        state.local_storage.clear();
        state.session_storage.clear();
        Ok(())
    }

    async fn storage(&mut self) -> DriverResult<StorageSnapshot> {
        let state = self.state.lock();
        state.ensure_session()?;
        Ok(StorageSnapshot {
            local: state.local_storage.clone(),
            session: state.session_storage.clone(),
        })
    }

    async fn page_snapshot(&mut self) -> DriverResult<DomNode> {
        let mut state = self.state.lock();
        state.ensure_session()?;
        state.calls.push(DriverCall::Snapshot);
        Ok(state.document.to_dom(state.document.root()))
    }
}
