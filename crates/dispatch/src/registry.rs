use std::{collections::HashSet, fmt, sync::Arc};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use session::{BeanFactory, ComponentFactory, ComponentTree, MapBean, PageBean, PageInstance};
use shared::{
    domain::{ContentKind, ControllerKind, ControllerName, ControllerPathParts},
    error::DispatchError,
    protocol::results,
    transfer::PropertyBinding,
};
use tracing::debug;

use crate::{
    action::{base_actions, ActionContext},
    config::DispatchConfig,
    generators,
    response::ResponseGenerator,
    validation::ValidationRule,
};

static CONTROLLER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/[A-Za-z][A-Za-z0-9_-]*$").expect("controller name regex should compile")
});

pub type ActionHandler =
    Arc<dyn Fn(&mut ActionContext<'_>) -> Result<String, DispatchError> + Send + Sync>;

pub type PageHook = Arc<dyn Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct PageHooks {
    pub on_init: Option<PageHook>,
    pub on_index: Option<PageHook>,
    pub on_open: Option<PageHook>,
    pub on_load: Option<PageHook>,
    pub on_save: Option<PageHook>,
    pub on_close: Option<PageHook>,
}

impl PageHooks {
    fn overlay(&mut self, child: &PageHooks) {
        let pairs = [
            (&mut self.on_init, &child.on_init),
            (&mut self.on_index, &child.on_index),
            (&mut self.on_open, &child.on_open),
            (&mut self.on_load, &child.on_load),
            (&mut self.on_save, &child.on_save),
            (&mut self.on_close, &child.on_close),
        ];
        for (slot, hook) in pairs {
            if hook.is_some() {
                slot.clone_from(hook);
            }
        }
    }
}

/// Response plan for one result name.
#[derive(Clone)]
pub struct ResultMapping {
    name: String,
    generators: Vec<Arc<dyn ResponseGenerator>>,
    content_kind: ContentKind,
    reload: bool,
}

impl ResultMapping {
    pub fn new(name: impl Into<String>, content_kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            generators: Vec::new(),
            content_kind,
            reload: false,
        }
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, ContentKind::Json)
    }

    pub fn html(name: impl Into<String>) -> Self {
        Self::new(name, ContentKind::Html)
    }

    pub fn with(self, generator: impl ResponseGenerator + 'static) -> Self {
        self.with_shared(Arc::new(generator))
    }

    pub fn with_shared(mut self, generator: Arc<dyn ResponseGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    pub fn reloading(mut self) -> Self {
        self.reload = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generators(&self) -> &[Arc<dyn ResponseGenerator>] {
        &self.generators
    }

    pub fn generator_names(&self) -> Vec<&str> {
        self.generators.iter().map(|generator| generator.name()).collect()
    }

    pub fn content_kind(&self) -> ContentKind {
        self.content_kind
    }

    pub fn is_reload(&self) -> bool {
        self.reload
    }
}

impl fmt::Debug for ResultMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultMapping")
            .field("name", &self.name)
            .field("generators", &self.generator_names())
            .field("content_kind", &self.content_kind)
            .field("reload", &self.reload)
            .finish()
    }
}

fn action_key(action: &str) -> String {
    let action = action.rsplit('/').next().unwrap_or(action).trim();
    format!("/{action}")
}

/// Declarative description of a controller type, merged once at registry build.
#[derive(Clone)]
pub struct ControllerType {
    name: String,
    kind: ControllerKind,
    parent: Option<String>,
    secured: bool,
    read_only: bool,
    reset_on_write: bool,
    validation_enabled: bool,
    tabbed: bool,
    bean_factory: Option<BeanFactory>,
    component_factory: Option<ComponentFactory>,
    page_names: IndexMap<String, String>,
    bindings: IndexMap<String, PropertyBinding>,
    validations: IndexMap<String, Vec<String>>,
    actions: IndexMap<String, ActionHandler>,
    hooks: PageHooks,
    results: IndexMap<String, ResultMapping>,
}

impl ControllerType {
    fn new(name: impl Into<String>, kind: ControllerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            secured: false,
            read_only: false,
            reset_on_write: false,
            validation_enabled: true,
            tabbed: true,
            bean_factory: None,
            component_factory: None,
            page_names: IndexMap::new(),
            bindings: IndexMap::new(),
            validations: IndexMap::new(),
            actions: IndexMap::new(),
            hooks: PageHooks::default(),
            results: IndexMap::new(),
        }
    }

    pub fn page(name: impl Into<String>) -> Self {
        Self::new(name, ControllerKind::Page)
    }

    pub fn document(name: impl Into<String>) -> Self {
        Self::new(name, ControllerKind::Document)
    }

    /// Plain controller: names bind directly to bean properties.
    pub fn resource(name: impl Into<String>) -> Self {
        Self::new(name, ControllerKind::Resource)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn secured(mut self) -> Self {
        self.secured = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn reset_on_write(mut self) -> Self {
        self.reset_on_write = true;
        self
    }

    pub fn validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    pub fn tabbed(mut self, tabbed: bool) -> Self {
        self.tabbed = tabbed;
        self
    }

    pub fn bean(
        mut self,
        factory: impl Fn() -> Box<dyn PageBean> + Send + Sync + 'static,
    ) -> Self {
        self.bean_factory = Some(Arc::new(factory));
        self
    }

    pub fn bean_template(mut self, template: MapBean) -> Self {
        self.bean_factory = Some(MapBean::factory(template));
        self
    }

    pub fn components(
        mut self,
        factory: impl Fn() -> ComponentTree + Send + Sync + 'static,
    ) -> Self {
        self.component_factory = Some(Arc::new(factory));
        self
    }

    pub fn page_name(mut self, short_name: impl Into<String>, long_name: impl Into<String>) -> Self {
        self.page_names.insert(short_name.into(), long_name.into());
        self
    }

    /// Binds transfer identifier `id` to component `long_name` and bean `property`.
    pub fn bind(
        mut self,
        id: impl Into<String>,
        long_name: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        self.bindings
            .insert(id.into(), PropertyBinding::new(long_name, property));
        self
    }

    pub fn validate_action(mut self, action: &str, rules: &[&str]) -> Self {
        self.validations.insert(
            action_key(action),
            rules.iter().map(|rule| rule.to_string()).collect(),
        );
        self
    }

    pub fn action(
        mut self,
        name: &str,
        handler: impl Fn(&mut ActionContext<'_>) -> Result<String, DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.actions.insert(action_key(name), Arc::new(handler));
        self
    }

    pub fn on_init(
        mut self,
        hook: impl Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_init = Some(Arc::new(hook));
        self
    }

    pub fn on_index(
        mut self,
        hook: impl Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_index = Some(Arc::new(hook));
        self
    }

    pub fn on_open(
        mut self,
        hook: impl Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_open = Some(Arc::new(hook));
        self
    }

    pub fn on_load(
        mut self,
        hook: impl Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_load = Some(Arc::new(hook));
        self
    }

    pub fn on_save(
        mut self,
        hook: impl Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_save = Some(Arc::new(hook));
        self
    }

    pub fn on_close(
        mut self,
        hook: impl Fn(&mut ActionContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_close = Some(Arc::new(hook));
        self
    }

    pub fn result(mut self, mapping: ResultMapping) -> Self {
        self.results.insert(mapping.name().to_string(), mapping);
        self
    }
}

/// Merged, immutable controller definition.
pub struct ControllerDef {
    name: ControllerName,
    kind: ControllerKind,
    secured: bool,
    read_only: bool,
    reset_on_write: bool,
    validation_enabled: bool,
    tabbed: bool,
    bean_factory: BeanFactory,
    component_factory: ComponentFactory,
    page_names: IndexMap<String, String>,
    bindings: IndexMap<String, PropertyBinding>,
    validations: IndexMap<String, Vec<Arc<dyn ValidationRule>>>,
    actions: IndexMap<String, ActionHandler>,
    hooks: PageHooks,
    results: IndexMap<String, Arc<ResultMapping>>,
}

impl ControllerDef {
    pub fn name(&self) -> &ControllerName {
        &self.name
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn is_document(&self) -> bool {
        self.kind == ControllerKind::Document
    }

    pub fn is_plain(&self) -> bool {
        self.kind == ControllerKind::Resource
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_reset_on_write(&self) -> bool {
        self.reset_on_write
    }

    pub fn is_tabbed(&self) -> bool {
        self.tabbed
    }

    pub fn new_bean(&self) -> Box<dyn PageBean> {
        (self.bean_factory)()
    }

    pub fn create_page(&self, path_parts: ControllerPathParts) -> PageInstance {
        PageInstance::new(path_parts, self.new_bean(), (self.component_factory)())
            .with_validation(self.validation_enabled)
            .as_document(self.is_document())
    }

    pub fn page_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.page_names
            .iter()
            .map(|(short, long)| (short.as_str(), long.as_str()))
    }

    pub fn binding(&self, id: &str) -> Option<&PropertyBinding> {
        self.bindings.get(id)
    }

    /// Long name a short page name stands for.
    pub fn page_name(&self, short_name: &str) -> Option<&str> {
        self.page_names.get(short_name).map(String::as_str)
    }

    pub fn validation_rules(&self, action: &str) -> &[Arc<dyn ValidationRule>] {
        self.validations
            .get(&action_key(action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn action(&self, name: &str) -> Option<&ActionHandler> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn hooks(&self) -> &PageHooks {
        &self.hooks
    }

    pub fn has_result(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    pub fn result(&self, name: &str) -> Option<&Arc<ResultMapping>> {
        self.results.get(name)
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    types: Vec<ControllerType>,
    rules: IndexMap<String, Arc<dyn ValidationRule>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn controller(mut self, controller: ControllerType) -> Self {
        self.types.push(controller);
        self
    }

    pub fn rule(mut self, name: impl Into<String>, rule: impl ValidationRule + 'static) -> Self {
        self.rules.insert(name.into(), Arc::new(rule));
        self
    }

    pub fn build(self, config: &DispatchConfig) -> Result<ControllerRegistry, DispatchError> {
        let mut by_name: IndexMap<String, &ControllerType> = IndexMap::new();
        for controller in &self.types {
            if !CONTROLLER_NAME.is_match(&controller.name) {
                return Err(DispatchError::Registration(format!(
                    "controller name '{}' must look like '/name'",
                    controller.name
                )));
            }
            if by_name.insert(controller.name.clone(), controller).is_some() {
                return Err(DispatchError::Registration(format!(
                    "controller '{}' registered twice",
                    controller.name
                )));
            }
        }

        let mut controllers = IndexMap::new();
        for controller in &self.types {
            let chain = inheritance_chain(controller, &by_name)?;
            let def = merge_chain(&chain, &self.rules)?;
            debug!(
                controller = %def.name,
                actions = def.actions.len(),
                results = def.results.len(),
                "controller registered"
            );
            controllers.insert(def.name.clone(), Arc::new(def));
        }

        let registry = ControllerRegistry {
            controllers,
            common_utilities: ControllerName::new(config.common_utilities_controller.clone()),
            unauthorized: ControllerName::new(config.unauthorized_controller.clone()),
            system_info: ControllerName::new(config.system_info_controller.clone()),
        };
        registry.check_system_controllers()?;
        Ok(registry)
    }
}

fn inheritance_chain<'a>(
    controller: &'a ControllerType,
    by_name: &IndexMap<String, &'a ControllerType>,
) -> Result<Vec<&'a ControllerType>, DispatchError> {
    let mut chain = vec![controller];
    let mut seen = HashSet::from([controller.name.as_str()]);
    let mut current = controller;
    while let Some(parent) = current.parent.as_deref() {
        let next = by_name.get(parent).copied().ok_or_else(|| {
            DispatchError::Registration(format!(
                "controller '{}' extends unknown controller '{parent}'",
                current.name
            ))
        })?;
        if !seen.insert(next.name.as_str()) {
            return Err(DispatchError::Registration(format!(
                "controller '{}' has a cyclic parent chain",
                controller.name
            )));
        }
        chain.push(next);
        current = next;
    }
    chain.reverse();
    Ok(chain)
}

/// Walks the chain root first so subtype entries win, then lays the fixed
/// built-in mappings over the result.
fn merge_chain(
    chain: &[&ControllerType],
    rules: &IndexMap<String, Arc<dyn ValidationRule>>,
) -> Result<ControllerDef, DispatchError> {
    let Some(leaf) = chain.last() else {
        return Err(DispatchError::Registration("empty controller chain".into()));
    };

    let mut actions: IndexMap<String, ActionHandler> = base_actions()
        .into_iter()
        .map(|(name, handler)| (name.to_string(), handler))
        .collect();
    let mut results: IndexMap<String, Arc<ResultMapping>> = IndexMap::new();
    insert_declared(&mut results, generators::base_save_mapping());

    let mut hooks = PageHooks::default();
    let mut page_names = IndexMap::new();
    let mut bindings = IndexMap::new();
    let mut validation_names: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut bean_factory = None;
    let mut component_factory = None;

    for controller in chain {
        actions.extend(
            controller
                .actions
                .iter()
                .map(|(name, handler)| (name.clone(), Arc::clone(handler))),
        );
        for mapping in controller.results.values() {
            insert_declared(&mut results, mapping.clone());
        }
        hooks.overlay(&controller.hooks);
        page_names.extend(controller.page_names.clone());
        bindings.extend(controller.bindings.clone());
        validation_names.extend(controller.validations.clone());
        if controller.bean_factory.is_some() {
            bean_factory.clone_from(&controller.bean_factory);
        }
        if controller.component_factory.is_some() {
            component_factory.clone_from(&controller.component_factory);
        }
    }

    for mapping in generators::builtin_mappings() {
        results.insert(mapping.name().to_string(), Arc::new(mapping));
    }

    let mut validations = IndexMap::new();
    for (action, names) in validation_names {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            let rule = rules.get(&name).ok_or_else(|| {
                DispatchError::Registration(format!(
                    "controller '{}' references unknown validation rule '{name}'",
                    leaf.name
                ))
            })?;
            resolved.push(Arc::clone(rule));
        }
        validations.insert(action, resolved);
    }

    Ok(ControllerDef {
        name: ControllerName::new(leaf.name.clone()),
        kind: leaf.kind,
        secured: leaf.secured,
        read_only: leaf.read_only,
        reset_on_write: leaf.reset_on_write,
        validation_enabled: leaf.validation_enabled,
        tabbed: leaf.tabbed,
        bean_factory: bean_factory.unwrap_or_else(|| MapBean::factory(MapBean::new())),
        component_factory: component_factory.unwrap_or_else(|| Arc::new(ComponentTree::new)),
        page_names,
        bindings,
        validations,
        actions,
        hooks,
        results,
    })
}

/// Declared data-exchange mappings always end with the hint and menu refreshers.
fn insert_declared(results: &mut IndexMap<String, Arc<ResultMapping>>, mut mapping: ResultMapping) {
    if mapping.content_kind().is_data_exchange() {
        for generator in generators::implicit_generators() {
            mapping = mapping.with_shared(generator);
        }
    }
    results.insert(mapping.name().to_string(), Arc::new(mapping));
}

pub struct ControllerRegistry {
    controllers: IndexMap<ControllerName, Arc<ControllerDef>>,
    common_utilities: ControllerName,
    unauthorized: ControllerName,
    system_info: ControllerName,
}

impl ControllerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn get(&self, name: &ControllerName) -> Option<&Arc<ControllerDef>> {
        self.controllers.get(name)
    }

    pub fn controller(&self, name: &ControllerName) -> Result<Arc<ControllerDef>, DispatchError> {
        self.controllers
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownController {
                path: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &ControllerName> {
        self.controllers.keys()
    }

    pub fn common_utilities(&self) -> &ControllerName {
        &self.common_utilities
    }

    pub fn unauthorized(&self) -> &ControllerName {
        &self.unauthorized
    }

    pub fn system_info(&self) -> &ControllerName {
        &self.system_info
    }

    fn check_system_controllers(&self) -> Result<(), DispatchError> {
        for name in [&self.common_utilities, &self.unauthorized, &self.system_info] {
            if !self.controllers.contains_key(name) {
                return Err(DispatchError::Registration(format!(
                    "required controller '{name}' is not registered"
                )));
            }
        }
        let system_info = &self.controllers[&self.system_info];
        if !system_info.has_result(results::SHOW_SYSTEM_EXCEPTION) {
            return Err(DispatchError::Registration(format!(
                "controller '{}' must map result '{}'",
                self.system_info,
                results::SHOW_SYSTEM_EXCEPTION
            )));
        }
        Ok(())
    }
}

/// Controllers every application needs for result fallback and error pages.
pub fn system_controllers(config: &DispatchConfig) -> Vec<ControllerType> {
    vec![
        ControllerType::page(config.common_utilities_controller.clone()).validation(false),
        ControllerType::document(config.unauthorized_controller.clone()).validation(false),
        ControllerType::page(config.system_info_controller.clone())
            .validation(false)
            .result(
                ResultMapping::json(results::SHOW_SYSTEM_EXCEPTION)
                    .with(generators::SystemError),
            ),
    ]
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
