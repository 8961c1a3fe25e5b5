use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SEGMENT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9]*)(?:_(\d+))?$").expect("segment name regex should compile")
});

/// Largest row index a structured name may carry. Names with a larger index do
/// not resolve.
pub const MAX_ITEM_INDEX: usize = 99_999;

/// Target of a resolved transfer name: the fully qualified component name and
/// the bean property it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBinding {
    pub long_name: String,
    pub property: String,
}

impl PropertyBinding {
    pub fn new(long_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            long_name: long_name.into(),
            property: property.into(),
        }
    }
}

/// One `id[_index]` segment of a structured transfer name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSegment {
    pub id: String,
    pub index: Option<usize>,
}

/// Splits `grid_0002.row.edit` into segments. Returns `None` for anything that
/// does not follow the page-scoped naming convention.
pub fn parse_structured_name(name: &str) -> Option<Vec<NameSegment>> {
    if name.is_empty() {
        return None;
    }

    name.split('.')
        .map(|segment| {
            let captures = SEGMENT_NAME.captures(segment)?;
            let index = match captures.get(2) {
                Some(digits) => Some(
                    digits
                        .as_str()
                        .parse::<usize>()
                        .ok()
                        .filter(|index| *index <= MAX_ITEM_INDEX)?,
                ),
                None => None,
            };
            Some(NameSegment {
                id: captures[1].to_string(),
                index,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferNode {
    id: String,
    item_index: Option<usize>,
    values: Vec<String>,
    binding: Option<PropertyBinding>,
    sibling: Option<Box<TransferNode>>,
    child: Option<Box<TransferNode>>,
}

impl TransferNode {
    pub fn new(id: impl Into<String>, item_index: Option<usize>, values: Vec<String>) -> Self {
        Self {
            id: id.into(),
            item_index,
            values,
            binding: None,
            sibling: None,
            child: None,
        }
    }

    pub fn with_binding(mut self, binding: PropertyBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Builds the head node and its child chain from parsed segments. Values sit
    /// on the head; child links only locate the nested target.
    pub fn from_segments(segments: &[NameSegment], values: Vec<String>) -> Option<Self> {
        let (head, rest) = segments.split_first()?;
        let mut node = TransferNode::new(head.id.clone(), head.index, values);
        let mut child: Option<Box<TransferNode>> = None;
        for segment in rest.iter().rev() {
            let mut link = TransferNode::new(segment.id.clone(), segment.index, Vec::new());
            link.child = child.take();
            child = Some(Box::new(link));
        }
        node.child = child;
        Some(node)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn item_index(&self) -> Option<usize> {
        self.item_index
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn binding(&self) -> Option<&PropertyBinding> {
        self.binding.as_ref()
    }

    /// Fully qualified name of the target component, falling back to the id in
    /// plain mode.
    pub fn long_name(&self) -> &str {
        self.binding
            .as_ref()
            .map(|binding| binding.long_name.as_str())
            .unwrap_or(&self.id)
    }

    pub fn property(&self) -> &str {
        self.binding
            .as_ref()
            .map(|binding| binding.property.as_str())
            .unwrap_or(&self.id)
    }

    pub fn sibling(&self) -> Option<&TransferNode> {
        self.sibling.as_deref()
    }

    pub fn child(&self) -> Option<&TransferNode> {
        self.child.as_deref()
    }

    /// Links `node` directly behind this head. The newest node becomes the first
    /// sibling while earlier siblings move one step down the chain.
    pub fn link_sibling(&mut self, mut node: TransferNode) {
        node.sibling = self.sibling.take();
        self.sibling = Some(Box::new(node));
    }

    /// Head followed by its sibling chain.
    pub fn chain(&self) -> SiblingIter<'_> {
        SiblingIter { next: Some(self) }
    }

    pub fn chain_len(&self) -> usize {
        self.chain().count()
    }

    /// Child links below this node, outermost first.
    pub fn child_chain(&self) -> ChildIter<'_> {
        ChildIter { next: self.child() }
    }
}

pub struct SiblingIter<'a> {
    next: Option<&'a TransferNode>,
}

impl<'a> Iterator for SiblingIter<'a> {
    type Item = &'a TransferNode;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.sibling();
        Some(current)
    }
}

pub struct ChildIter<'a> {
    next: Option<&'a TransferNode>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a TransferNode;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.child();
        Some(current)
    }
}

/// Per-request map of transfer nodes keyed by identifier, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferTree {
    nodes: IndexMap<String, TransferNode>,
    action_id: Option<String>,
}

impl TransferTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. A repeated identifier joins the existing entry's sibling
    /// chain; the first-seen node stays the map entry.
    pub fn insert(&mut self, node: TransferNode) {
        match self.nodes.get_mut(node.id()) {
            Some(head) => head.link_sibling(node),
            None => {
                self.nodes.insert(node.id().to_string(), node);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&TransferNode> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }

    pub fn set_action_id(&mut self, action_id: impl Into<String>) {
        let action_id = action_id.into();
        self.action_id = if action_id.trim().is_empty() {
            None
        } else {
            Some(action_id)
        };
    }
}

#[cfg(test)]
#[path = "tests/transfer_tests.rs"]
mod tests;
