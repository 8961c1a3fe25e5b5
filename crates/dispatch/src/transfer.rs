use shared::{
    error::DispatchError,
    protocol::{params, ClientRequest},
    transfer::{parse_structured_name, PropertyBinding, TransferNode, TransferTree},
};
use tracing::{debug, warn};

use crate::{
    context::{PendingCommand, RequestContext},
    registry::ControllerDef,
};

fn is_set(value: Option<&str>) -> bool {
    value
        .map(str::trim)
        .is_some_and(|value| !value.is_empty() && !value.eq_ignore_ascii_case("false"))
}

/// Turns the flat parameter namespace into the transfer tree of `def`, moving
/// reserved control fields into the request context on the way.
pub fn build_transfer(
    request: &ClientRequest,
    def: &ControllerDef,
    rc: &mut RequestContext,
) -> Result<TransferTree, DispatchError> {
    let request_params = &request.params;
    let no_transfer = is_set(request_params.first(params::NO_TRANSFER));
    let mut tree = TransferTree::new();

    if let Some(action_id) = request_params.first(params::VALIDATION_ACTION) {
        tree.set_action_id(action_id);
    }
    if let Some(target) = request_params.first(params::TARGET_VALUE) {
        rc.set_target_value(target);
    }
    for (short_name, long_name) in def.page_names() {
        rc.set_page_alias(short_name, long_name);
    }

    for (name, values) in request_params.iter() {
        if params::is_skipped(name) {
            continue;
        }

        match name {
            params::REFRESH => {
                for panel in values
                    .iter()
                    .flat_map(|value| value.split(','))
                    .map(str::trim)
                    .filter(|panel| !panel.is_empty())
                {
                    rc.add_refresh_panel(panel);
                }
                continue;
            }
            params::COMMAND => {
                if values.len() > 1 {
                    return Err(DispatchError::MultipleCommandParameters);
                }
                if let Some(descriptor) = values.first() {
                    extract_command(def, descriptor, rc)?;
                }
                continue;
            }
            params::COMMAND_TAG => {
                match values.first().filter(|tag| !tag.trim().is_empty()) {
                    Some(tag) => rc.set_command_tag(tag.as_str()),
                    None => warn!(param = name, "blank command tag ignored"),
                }
                continue;
            }
            params::TRIGGER_WIDGET => {
                match values.first().filter(|id| !id.trim().is_empty()) {
                    Some(id) => rc.set_trigger_id(id.as_str()),
                    None => warn!(param = name, "blank trigger widget id ignored"),
                }
                continue;
            }
            _ => {}
        }

        if no_transfer {
            continue;
        }

        match resolve_node(def, name, values.to_vec()) {
            Some(node) => tree.insert(node),
            None => debug!(param = name, controller = %def.name(), "unresolvable parameter skipped"),
        }
    }

    debug!(
        controller = %def.name(),
        nodes = tree.len(),
        no_transfer,
        "transfer tree built"
    );
    Ok(tree)
}

/// Plain controllers bind names verbatim. Everything else must follow the
/// page-scoped naming convention and resolve through the controller bindings or
/// page names.
pub fn resolve_node(def: &ControllerDef, name: &str, values: Vec<String>) -> Option<TransferNode> {
    if def.is_plain() {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        return Some(TransferNode::new(name, None, values));
    }

    let segments = parse_structured_name(name)?;
    let head = segments.first()?;
    let binding = match def.binding(&head.id) {
        Some(binding) => binding.clone(),
        None => {
            let long_name = def.page_name(&head.id)?;
            PropertyBinding::new(long_name, head.id.clone())
        }
    };
    TransferNode::from_segments(&segments, values).map(|node| node.with_binding(binding))
}

fn extract_command(
    def: &ControllerDef,
    descriptor: &str,
    rc: &mut RequestContext,
) -> Result<(), DispatchError> {
    let malformed = || DispatchError::MalformedCommand {
        descriptor: descriptor.to_string(),
    };
    let (reference, verb) = descriptor.split_once("->").ok_or_else(malformed)?;
    let (reference, verb) = (reference.trim(), verb.trim());
    if reference.is_empty() || verb.is_empty() {
        return Err(malformed());
    }

    match resolve_node(def, reference, Vec::new()) {
        Some(locator) => rc.set_command(PendingCommand {
            locator,
            verb: verb.to_string(),
        }),
        None => warn!(descriptor, controller = %def.name(), "command target does not resolve"),
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/transfer_tests.rs"]
mod tests;
