use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use shared::domain::{ControllerName, ControllerPathParts, PathId};

use crate::{bean::PageBean, component::ComponentTree};

pub type SharedPage = Arc<Mutex<PageInstance>>;

/// Session-resident state of one controller path.
pub struct PageInstance {
    path_parts: ControllerPathParts,
    bean: Box<dyn PageBean>,
    components: ComponentTree,
    validation_enabled: bool,
    is_document: bool,
    initialized: bool,
    attributes: IndexMap<String, Value>,
}

impl PageInstance {
    pub fn new(
        path_parts: ControllerPathParts,
        bean: Box<dyn PageBean>,
        components: ComponentTree,
    ) -> Self {
        Self {
            path_parts,
            bean,
            components,
            validation_enabled: true,
            is_document: false,
            initialized: false,
            attributes: IndexMap::new(),
        }
    }

    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn as_document(mut self, is_document: bool) -> Self {
        self.is_document = is_document;
        self
    }

    pub fn path_id(&self) -> &PathId {
        &self.path_parts.path_id
    }

    pub fn controller_name(&self) -> &ControllerName {
        &self.path_parts.controller_name
    }

    pub fn path_parts(&self) -> &ControllerPathParts {
        &self.path_parts
    }

    pub fn is_document(&self) -> bool {
        self.is_document
    }

    /// False until the first request holding this page's lock has run the
    /// controller's init hook.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub fn is_validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    pub fn set_validation_enabled(&mut self, enabled: bool) {
        self.validation_enabled = enabled;
    }

    pub fn bean(&self) -> &dyn PageBean {
        self.bean.as_ref()
    }

    pub fn bean_mut(&mut self) -> &mut dyn PageBean {
        self.bean.as_mut()
    }

    pub fn bean_as<T: 'static>(&self) -> Option<&T> {
        self.bean.as_any().downcast_ref::<T>()
    }

    pub fn bean_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.bean.as_any_mut().downcast_mut::<T>()
    }

    pub fn replace_bean(&mut self, bean: Box<dyn PageBean>) {
        self.bean = bean;
    }

    pub fn components(&self) -> &ComponentTree {
        &self.components
    }

    /// Component tree and bean borrowed together, for population and commands.
    pub fn split_mut(&mut self) -> (&mut ComponentTree, &mut dyn PageBean) {
        (&mut self.components, self.bean.as_mut())
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name)
    }
}
