pub mod action;
pub mod config;
pub mod context;
pub mod generators;
pub mod path;
pub mod pipeline;
pub mod populate;
pub mod registry;
pub mod response;
pub mod result;
pub mod transfer;
pub mod validation;

pub use action::{ActionContext, FollowUp};
pub use config::DispatchConfig;
pub use context::{HintMode, RequestContext};
pub use pipeline::Dispatcher;
pub use registry::{
    system_controllers, ControllerDef, ControllerRegistry, ControllerType, RegistryBuilder,
    ResultMapping,
};
pub use response::{GenerateContext, ResponseGenerator, ResponseWriter};
pub use result::{ResolutionLevel, ResolvedResult};
pub use validation::{Matches, Required, ValidationRule};

#[cfg(test)]
mod test_support;
