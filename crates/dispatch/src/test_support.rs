use shared::{
    domain::{ControllerName, ControllerPathParts, PathId},
    protocol::{ClientRequest, RequestParams},
};

use crate::{
    config::DispatchConfig,
    registry::{system_controllers, ControllerRegistry, ControllerType},
};

pub(crate) fn registry_with(types: Vec<ControllerType>) -> ControllerRegistry {
    let config = DispatchConfig::default();
    let mut builder = ControllerRegistry::builder();
    for controller in system_controllers(&config).into_iter().chain(types) {
        builder = builder.controller(controller);
    }
    builder.build(&config).expect("registry should build")
}

pub(crate) fn parts(path_id: &str) -> ControllerPathParts {
    let name = path_id.split(':').next().unwrap_or(path_id);
    ControllerPathParts {
        controller_path: path_id.to_string(),
        path_id: PathId::from(path_id),
        controller_name: ControllerName::from(name),
        action_name: None,
        path_variables: Vec::new(),
    }
}

pub(crate) fn request(path: &str, pairs: &[(&str, &str)]) -> ClientRequest {
    ClientRequest::new(path, RequestParams::from_pairs(pairs.iter().copied()))
}
