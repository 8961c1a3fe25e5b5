use std::collections::HashSet;

use shared::{
    domain::{ControllerName, ControllerPathParts, PathId},
    error::DispatchError,
};

/// Splits request paths of the form `/controller[:var...][/action]` and checks
/// the controller against the registered names.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    controllers: HashSet<ControllerName>,
}

impl PathResolver {
    pub fn new<I>(controllers: I) -> Self
    where
        I: IntoIterator<Item = ControllerName>,
    {
        Self {
            controllers: controllers.into_iter().collect(),
        }
    }

    pub fn resolve(&self, path: &str) -> Result<ControllerPathParts, DispatchError> {
        let parts = split_path(path)?;
        if !self.controllers.contains(&parts.controller_name) {
            return Err(DispatchError::UnknownController {
                path: path.to_string(),
            });
        }
        Ok(parts)
    }
}

pub fn split_path(path: &str) -> Result<ControllerPathParts, DispatchError> {
    let malformed = || DispatchError::MalformedPath {
        path: path.to_string(),
    };

    let trimmed = path.trim();
    let rest = trimmed.strip_prefix('/').ok_or_else(malformed)?;
    let (controller_segment, action) = match rest.split_once('/') {
        Some((controller, action)) => (controller, Some(action)),
        None => (rest, None),
    };
    if controller_segment.is_empty() {
        return Err(malformed());
    }

    let action_name = match action {
        None | Some("") => None,
        Some(action) if action.contains('/') => return Err(malformed()),
        Some(action) => Some(format!("/{action}")),
    };

    let mut pieces = controller_segment.split(':');
    let name = pieces.next().filter(|name| !name.is_empty()).ok_or_else(malformed)?;
    let path_variables: Vec<String> = pieces.map(str::to_string).collect();
    if path_variables.iter().any(String::is_empty) {
        return Err(malformed());
    }

    Ok(ControllerPathParts {
        controller_path: trimmed.to_string(),
        path_id: PathId::new(format!("/{controller_segment}")),
        controller_name: ControllerName::new(format!("/{name}")),
        action_name,
        path_variables,
    })
}
