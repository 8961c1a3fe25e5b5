use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared::{
    domain::{PathId, SessionId},
    error::DispatchError,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    page::{PageInstance, SharedPage},
    panel::ContentPanel,
};

pub type SharedPanel = Arc<Mutex<ContentPanel>>;

/// One user session. Every map sits behind its own short-lived lock; none of
/// them is ever held while a page lock is taken.
pub struct Session {
    id: SessionId,
    authenticated: RwLock<bool>,
    attributes: Mutex<IndexMap<String, Value>>,
    pages: Mutex<HashMap<PathId, SharedPage>>,
    panels: Mutex<HashMap<PathId, SharedPanel>>,
    sticky_paths: Mutex<Vec<String>>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            authenticated: RwLock::new(false),
            attributes: Mutex::new(IndexMap::new()),
            pages: Mutex::new(HashMap::new()),
            panels: Mutex::new(HashMap::new()),
            sticky_paths: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.read()
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        *self.authenticated.write() = authenticated;
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.lock().get(name).cloned()
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.lock().insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.lock().shift_remove(name)
    }

    pub fn page(&self, path_id: &PathId) -> Option<SharedPage> {
        self.pages.lock().get(path_id).cloned()
    }

    pub fn has_page(&self, path_id: &PathId) -> bool {
        self.pages.lock().contains_key(path_id)
    }

    /// Returns the page for `path_id`, creating it on first access. The flag is
    /// true when this call created the page. `create` must not touch the
    /// session.
    pub fn page_or_create<F>(
        &self,
        path_id: &PathId,
        create: F,
    ) -> Result<(SharedPage, bool), DispatchError>
    where
        F: FnOnce() -> Result<PageInstance, DispatchError>,
    {
        let mut pages = self.pages.lock();
        if let Some(page) = pages.get(path_id) {
            return Ok((Arc::clone(page), false));
        }

        let page = Arc::new(Mutex::new(create()?));
        pages.insert(path_id.clone(), Arc::clone(&page));
        debug!(session = %self.id, path_id = %path_id, "page instance created");
        Ok((page, true))
    }

    pub fn remove_pages(&self, path_ids: &[PathId]) -> usize {
        let mut pages = self.pages.lock();
        let mut panels = self.panels.lock();
        let mut removed = 0;
        for path_id in path_ids {
            if pages.remove(path_id).is_some() {
                removed += 1;
            }
            panels.remove(path_id);
        }
        if removed > 0 {
            debug!(session = %self.id, removed, "closed page instances removed");
        }
        removed
    }

    pub fn page_ids(&self) -> Vec<PathId> {
        let mut ids: Vec<PathId> = self.pages.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Content panel of the document at `document`, created on first use.
    pub fn content_panel(&self, document: &PathId, tabbed: bool) -> SharedPanel {
        let mut panels = self.panels.lock();
        Arc::clone(
            panels
                .entry(document.clone())
                .or_insert_with(|| Arc::new(Mutex::new(ContentPanel::new(tabbed)))),
        )
    }

    pub fn existing_content_panel(&self, document: &PathId) -> Option<SharedPanel> {
        self.panels.lock().get(document).cloned()
    }

    pub fn add_sticky_path(&self, path: impl Into<String>) {
        self.sticky_paths.lock().push(path.into());
    }

    /// Removes and returns the pending sticky paths in recording order.
    pub fn take_sticky_paths(&self) -> Vec<String> {
        std::mem::take(&mut *self.sticky_paths.lock())
    }

    fn clear(&self) {
        self.pages.lock().clear();
        self.panels.lock().clear();
        self.sticky_paths.lock().clear();
        self.attributes.lock().clear();
        self.set_authenticated(false);
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> Arc<Session> {
        let id = SessionId::new(Uuid::new_v4().to_string());
        let session = Arc::new(Session::new(id.clone()));
        self.sessions.write().insert(id.clone(), Arc::clone(&session));
        info!(session = %id, "session started");
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Looks up the session named by a client token, starting a new one when the
    /// token is absent or stale. The flag is true for a new session.
    pub fn get_or_create(&self, token: Option<&str>) -> (Arc<Session>, bool) {
        if let Some(session) = token.and_then(|token| self.get(&SessionId::from(token))) {
            return (session, false);
        }
        (self.create(), true)
    }

    /// Ends the session, dropping every page instance it holds.
    pub fn end(&self, id: &SessionId) -> bool {
        let Some(session) = self.sessions.write().remove(id) else {
            return false;
        };
        session.clear();
        info!(session = %id, "session ended");
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
