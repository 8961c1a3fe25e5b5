use std::sync::Arc;

use shared::error::DispatchError;
use tracing::debug;

use crate::registry::{ControllerDef, ControllerRegistry, ResultMapping};

/// Where a result name was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionLevel {
    Executing,
    Document,
    CommonUtilities,
}

#[derive(Clone)]
pub struct ResolvedResult {
    pub controller: Arc<ControllerDef>,
    pub mapping: Arc<ResultMapping>,
    pub level: ResolutionLevel,
}

/// Looks `result` up on the executing controller, then on the enclosing
/// document (only for embedded pages), then on the common-utilities controller.
pub fn resolve_result(
    registry: &ControllerRegistry,
    executing: &Arc<ControllerDef>,
    document: Option<&Arc<ControllerDef>>,
    result: &str,
) -> Result<ResolvedResult, DispatchError> {
    let mut candidates = vec![(Arc::clone(executing), ResolutionLevel::Executing)];
    if !executing.is_document() {
        if let Some(document) = document {
            candidates.push((Arc::clone(document), ResolutionLevel::Document));
        }
    }
    candidates.push((
        registry.controller(registry.common_utilities())?,
        ResolutionLevel::CommonUtilities,
    ));

    for (controller, level) in candidates {
        if let Some(mapping) = controller.result(result).cloned() {
            debug!(
                result,
                controller = %controller.name(),
                ?level,
                generators = ?mapping.generator_names(),
                "result routed"
            );
            return Ok(ResolvedResult {
                controller,
                mapping,
                level,
            });
        }
    }

    Err(DispatchError::UnresolvedResult {
        controller: executing.name().to_string(),
        result: result.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/result_tests.rs"]
mod tests;
