use std::sync::Arc;

use dispatch::Dispatcher;
use session::SessionStore;

use crate::config::Settings;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) sessions: SessionStore,
    pub(crate) settings: Arc<Settings>,
}

impl AppState {
    pub(crate) fn new(dispatcher: Dispatcher, settings: Settings) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            sessions: SessionStore::new(),
            settings: Arc::new(settings),
        }
    }
}
