use std::{collections::HashSet, collections::VecDeque, sync::Arc};

use indexmap::IndexMap;
use shared::{error::DispatchError, transfer::TransferNode};

use crate::bean::PageBean;

/// Result of a component command: an optional result name that overrides the
/// generic command result.
pub type CommandOutcome = Result<Option<String>, DispatchError>;

pub type CommandHandler =
    Arc<dyn Fn(&mut dyn PageBean, Option<usize>) -> CommandOutcome + Send + Sync>;

/// Widget-side collaborator the dispatch core talks to.
pub trait Component: Send {
    fn long_name(&self) -> &str;

    fn short_name(&self) -> &str;

    fn populate(&mut self, node: &TransferNode, bean: &mut dyn PageBean)
        -> Result<(), DispatchError>;

    fn child_mut(
        &mut self,
        _id: &str,
        _index: Option<usize>,
    ) -> Option<&mut (dyn Component + 'static)> {
        None
    }

    fn child(&self, _id: &str, _index: Option<usize>) -> Option<&(dyn Component + 'static)> {
        None
    }

    /// Long name of the component that handles commands on behalf of this one.
    fn relay(&self) -> Option<&str> {
        None
    }

    fn execute_command(
        &mut self,
        command: &str,
        _index: Option<usize>,
        _bean: &mut dyn PageBean,
    ) -> CommandOutcome {
        Err(DispatchError::handler(format!(
            "component '{}' has no command '{command}'",
            self.long_name()
        )))
    }

    /// Long names of components that must be pushed along with this one.
    fn references(&self) -> &[String] {
        &[]
    }
}

#[derive(Clone, Default)]
struct CommandTable {
    handlers: IndexMap<String, CommandHandler>,
}

impl CommandTable {
    fn run(
        &self,
        owner: &str,
        command: &str,
        index: Option<usize>,
        bean: &mut dyn PageBean,
    ) -> CommandOutcome {
        match self.handlers.get(command) {
            Some(handler) => handler(bean, index),
            None => Err(DispatchError::handler(format!(
                "component '{owner}' has no command '{command}'"
            ))),
        }
    }
}

/// Single bound input writing straight into one bean property.
#[derive(Clone)]
pub struct Field {
    long_name: String,
    short_name: String,
    property: String,
    references: Vec<String>,
    commands: CommandTable,
    relay: Option<String>,
}

impl Field {
    pub fn new(long_name: impl Into<String>, property: impl Into<String>) -> Self {
        let long_name = long_name.into();
        let short_name = long_name
            .rsplit('.')
            .next()
            .unwrap_or(long_name.as_str())
            .to_string();
        Self {
            long_name,
            short_name,
            property: property.into(),
            references: Vec::new(),
            commands: CommandTable::default(),
            relay: None,
        }
    }

    pub fn referencing(mut self, long_name: impl Into<String>) -> Self {
        self.references.push(long_name.into());
        self
    }

    pub fn relay_to(mut self, long_name: impl Into<String>) -> Self {
        self.relay = Some(long_name.into());
        self
    }

    pub fn on_command(
        mut self,
        command: impl Into<String>,
        handler: impl Fn(&mut dyn PageBean, Option<usize>) -> CommandOutcome + Send + Sync + 'static,
    ) -> Self {
        self.commands
            .handlers
            .insert(command.into(), Arc::new(handler));
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }
}

impl Component for Field {
    fn long_name(&self) -> &str {
        &self.long_name
    }

    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn populate(
        &mut self,
        node: &TransferNode,
        bean: &mut dyn PageBean,
    ) -> Result<(), DispatchError> {
        bean.write_property(&self.property, node.item_index(), node.values())
    }

    fn relay(&self) -> Option<&str> {
        self.relay.as_deref()
    }

    fn execute_command(
        &mut self,
        command: &str,
        index: Option<usize>,
        bean: &mut dyn PageBean,
    ) -> CommandOutcome {
        self.commands.run(&self.long_name, command, index, bean)
    }

    fn references(&self) -> &[String] {
        &self.references
    }
}

/// Composite component. Nested targets are addressed through the child chain
/// of the transfer node, one short name per link.
pub struct Container {
    long_name: String,
    short_name: String,
    children: IndexMap<String, Box<dyn Component>>,
    references: Vec<String>,
    commands: CommandTable,
    relay: Option<String>,
}

impl Container {
    pub fn new(long_name: impl Into<String>) -> Self {
        let long_name = long_name.into();
        let short_name = long_name
            .rsplit('.')
            .next()
            .unwrap_or(long_name.as_str())
            .to_string();
        Self {
            long_name,
            short_name,
            children: IndexMap::new(),
            references: Vec::new(),
            commands: CommandTable::default(),
            relay: None,
        }
    }

    pub fn with_child(mut self, child: impl Component + 'static) -> Self {
        self.children
            .insert(child.short_name().to_string(), Box::new(child));
        self
    }

    pub fn referencing(mut self, long_name: impl Into<String>) -> Self {
        self.references.push(long_name.into());
        self
    }

    pub fn relay_to(mut self, long_name: impl Into<String>) -> Self {
        self.relay = Some(long_name.into());
        self
    }

    pub fn on_command(
        mut self,
        command: impl Into<String>,
        handler: impl Fn(&mut dyn PageBean, Option<usize>) -> CommandOutcome + Send + Sync + 'static,
    ) -> Self {
        self.commands
            .handlers
            .insert(command.into(), Arc::new(handler));
        self
    }
}

impl Component for Container {
    fn long_name(&self) -> &str {
        &self.long_name
    }

    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn populate(
        &mut self,
        node: &TransferNode,
        bean: &mut dyn PageBean,
    ) -> Result<(), DispatchError> {
        let mut target: &mut (dyn Component + 'static) = match node.child() {
            Some(first) => match self.children.get_mut(first.id()) {
                Some(child) => child.as_mut(),
                None => return Ok(()),
            },
            None => return Ok(()),
        };

        let mut index = node.child().and_then(TransferNode::item_index);
        for link in node.child_chain().skip(1) {
            target = match target.child_mut(link.id(), link.item_index()) {
                Some(child) => child,
                None => return Ok(()),
            };
            index = link.item_index().or(index);
        }

        let leaf = TransferNode::new(
            target.short_name().to_string(),
            index.or(node.item_index()),
            node.values().to_vec(),
        );
        target.populate(&leaf, bean)
    }

    fn child_mut(
        &mut self,
        id: &str,
        _index: Option<usize>,
    ) -> Option<&mut (dyn Component + 'static)> {
        self.children.get_mut(id).map(|child| child.as_mut())
    }

    fn child(&self, id: &str, _index: Option<usize>) -> Option<&(dyn Component + 'static)> {
        self.children.get(id).map(|child| child.as_ref())
    }

    fn relay(&self) -> Option<&str> {
        self.relay.as_deref()
    }

    fn execute_command(
        &mut self,
        command: &str,
        index: Option<usize>,
        bean: &mut dyn PageBean,
    ) -> CommandOutcome {
        self.commands.run(&self.long_name, command, index, bean)
    }

    fn references(&self) -> &[String] {
        &self.references
    }
}

/// Components of one page, addressed by long name.
#[derive(Default)]
pub struct ComponentTree {
    components: IndexMap<String, Box<dyn Component>>,
    always_push: Vec<String>,
}

pub type ComponentFactory = Arc<dyn Fn() -> ComponentTree + Send + Sync>;

impl ComponentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, component: impl Component + 'static) -> Self {
        self.insert(Box::new(component));
        self
    }

    pub fn always_pushing(mut self, long_name: impl Into<String>) -> Self {
        self.always_push.push(long_name.into());
        self
    }

    pub fn insert(&mut self, component: Box<dyn Component>) {
        self.components
            .insert(component.long_name().to_string(), component);
    }

    pub fn get(&self, long_name: &str) -> Option<&(dyn Component + 'static)> {
        self.components.get(long_name).map(|component| component.as_ref())
    }

    pub fn get_mut(&mut self, long_name: &str) -> Option<&mut (dyn Component + 'static)> {
        self.components
            .get_mut(long_name)
            .map(|component| component.as_mut())
    }

    /// Resolves a long name that may point below a top-level component, such as
    /// `form.grid.row`, by descending through child short names.
    pub fn find_mut(&mut self, long_name: &str) -> Option<&mut (dyn Component + 'static)> {
        if self.components.contains_key(long_name) {
            return self.get_mut(long_name);
        }

        let (root, rest) = self
            .components
            .keys()
            .filter_map(|key| {
                let rest = long_name.strip_prefix(key.as_str())?.strip_prefix('.')?;
                Some((key.clone(), rest.to_string()))
            })
            .max_by_key(|(key, _)| key.len())?;

        let mut target = self.get_mut(&root)?;
        for short_name in rest.split('.') {
            target = target.child_mut(short_name, None)?;
        }
        Some(target)
    }

    pub fn contains(&self, long_name: &str) -> bool {
        self.components.contains_key(long_name)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn always_push(&self) -> &[String] {
        &self.always_push
    }

    /// Always-push ids expanded through component references, breadth first.
    pub fn always_push_closure(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        let mut queue: VecDeque<&str> = self.always_push.iter().map(String::as_str).collect();
        while let Some(long_name) = queue.pop_front() {
            if !seen.insert(long_name.to_string()) {
                continue;
            }
            ordered.push(long_name.to_string());
            if let Some(component) = self.components.get(long_name) {
                queue.extend(component.references().iter().map(String::as_str));
            }
        }
        ordered
    }
}

#[cfg(test)]
#[path = "tests/component_tests.rs"]
mod tests;
