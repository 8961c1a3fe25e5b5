use session::PageInstance;
use shared::{error::DispatchError, transfer::TransferTree};
use tracing::debug;

use crate::registry::ControllerDef;

/// Applies a validated transfer tree to the page. Returns the number of nodes
/// that reached a target.
pub fn populate(
    def: &ControllerDef,
    page: &mut PageInstance,
    tree: &TransferTree,
) -> Result<usize, DispatchError> {
    if def.is_read_only() {
        debug!(controller = %def.name(), "read-only controller, population skipped");
        return Ok(0);
    }
    if def.is_reset_on_write() {
        page.replace_bean(def.new_bean());
    }

    let mut written = 0;
    for head in tree.iter() {
        for node in head.chain() {
            if def.is_plain() {
                page.bean_mut()
                    .write_property(node.property(), node.item_index(), node.values())?;
                written += 1;
                continue;
            }

            let (components, bean) = page.split_mut();
            match components.get_mut(node.long_name()) {
                Some(component) => {
                    component.populate(node, bean)?;
                    written += 1;
                    debug!(target_component = node.long_name(), index = ?node.item_index(), "node populated");
                }
                None => debug!(target_component = node.long_name(), "no live component for node"),
            }
        }
    }
    Ok(written)
}

#[cfg(test)]
#[path = "tests/populate_tests.rs"]
mod tests;
