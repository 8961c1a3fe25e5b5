use regex::Regex;
use shared::transfer::{TransferNode, TransferTree};
use tracing::debug;

use crate::{context::RequestContext, registry::ControllerDef};

/// Named check run against the whole transfer tree before any mutation.
pub trait ValidationRule: Send + Sync {
    fn validate(&self, tree: &TransferTree, rc: &mut RequestContext) -> bool;
}

impl<F> ValidationRule for F
where
    F: Fn(&TransferTree, &mut RequestContext) -> bool + Send + Sync,
{
    fn validate(&self, tree: &TransferTree, rc: &mut RequestContext) -> bool {
        self(tree, rc)
    }
}

/// Runs every rule declared for the tree's action id and ANDs the outcomes.
/// All rules run even after a failure so every message is collected.
pub fn validate(
    def: &ControllerDef,
    validation_enabled: bool,
    tree: &TransferTree,
    rc: &mut RequestContext,
) -> bool {
    if !validation_enabled {
        return true;
    }
    let Some(action_id) = tree.action_id() else {
        return true;
    };

    let mut success = true;
    for rule in def.validation_rules(action_id) {
        success &= rule.validate(tree, rc);
    }
    debug!(controller = %def.name(), action = action_id, success, "validation gate");
    success
}

fn non_blank(node: &TransferNode) -> bool {
    node.values().iter().any(|value| !value.trim().is_empty())
}

/// Fails when the identifier is missing or every occurrence is blank.
pub struct Required {
    id: String,
    message: String,
}

impl Required {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

impl ValidationRule for Required {
    fn validate(&self, tree: &TransferTree, rc: &mut RequestContext) -> bool {
        let present = tree
            .get(&self.id)
            .map(|head| head.chain().any(non_blank))
            .unwrap_or(false);
        if !present {
            rc.add_validation_info(Some(&self.id), self.message.clone());
        }
        present
    }
}

/// Every submitted value of the identifier must match the pattern. Absent
/// identifiers pass.
pub struct Matches {
    id: String,
    pattern: Regex,
    message: String,
}

impl Matches {
    pub fn new(id: impl Into<String>, pattern: Regex, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern,
            message: message.into(),
        }
    }
}

impl ValidationRule for Matches {
    fn validate(&self, tree: &TransferTree, rc: &mut RequestContext) -> bool {
        let Some(head) = tree.get(&self.id) else {
            return true;
        };
        let valid = head
            .chain()
            .flat_map(|node| node.values().iter())
            .all(|value| self.pattern.is_match(value));
        if !valid {
            rc.add_validation_info(Some(&self.id), self.message.clone());
        }
        valid
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
