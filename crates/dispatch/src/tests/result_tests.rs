use shared::domain::ControllerName;

use super::*;
use crate::{
    config::DispatchConfig,
    generators::RefreshPanel,
    registry::{system_controllers, ControllerType},
};

fn registry() -> ControllerRegistry {
    let config = DispatchConfig::default();
    let mut builder = ControllerRegistry::builder();
    for controller in system_controllers(&config)
        .into_iter()
        .filter(|controller| controller.name() != config.common_utilities_controller)
    {
        builder = builder.controller(controller);
    }
    builder
        .controller(
            ControllerType::document("/main")
                .result(ResultMapping::json("shared").with(RefreshPanel))
                .result(ResultMapping::json("docOnly").with(RefreshPanel)),
        )
        .controller(
            ControllerType::page("/acct").result(ResultMapping::json("shared").with(RefreshPanel)),
        )
        .controller(
            ControllerType::page(config.common_utilities_controller.clone())
                .validation(false)
                .result(ResultMapping::json("utility").with(RefreshPanel))
                .result(ResultMapping::json("docOnly")),
        )
        .build(&config)
        .expect("registry")
}

fn named(registry: &ControllerRegistry, name: &str) -> Arc<ControllerDef> {
    registry.controller(&ControllerName::from(name)).expect("controller")
}

#[test]
fn executing_controller_wins_when_it_maps_the_result() {
    let registry = registry();
    let acct = named(&registry, "/acct");
    let main = named(&registry, "/main");

    let resolved = resolve_result(&registry, &acct, Some(&main), "shared").expect("resolved");
    assert_eq!(resolved.level, ResolutionLevel::Executing);
    assert_eq!(resolved.controller.name().as_str(), "/acct");
}

#[test]
fn document_is_consulted_before_common_utilities() {
    let registry = registry();
    let acct = named(&registry, "/acct");
    let main = named(&registry, "/main");

    let resolved = resolve_result(&registry, &acct, Some(&main), "docOnly").expect("resolved");
    assert_eq!(resolved.level, ResolutionLevel::Document);
    assert_eq!(resolved.controller.name().as_str(), "/main");
}

#[test]
fn common_utilities_is_the_last_resort() {
    let registry = registry();
    let acct = named(&registry, "/acct");
    let main = named(&registry, "/main");

    let resolved = resolve_result(&registry, &acct, Some(&main), "utility").expect("resolved");
    assert_eq!(resolved.level, ResolutionLevel::CommonUtilities);

    let resolved = resolve_result(&registry, &acct, None, "docOnly").expect("resolved");
    assert_eq!(resolved.level, ResolutionLevel::CommonUtilities);
}

#[test]
fn documents_skip_the_document_level() {
    let registry = registry();
    let main = named(&registry, "/main");
    let other = named(&registry, "/unauthorized");

    let resolved = resolve_result(&registry, &other, Some(&main), "docOnly").expect("resolved");
    assert_eq!(resolved.level, ResolutionLevel::CommonUtilities);
}

#[test]
fn unmapped_results_are_configuration_errors() {
    let registry = registry();
    let acct = named(&registry, "/acct");

    let err = resolve_result(&registry, &acct, None, "nowhere")
        .err()
        .expect("unresolved");
    assert!(matches!(err, DispatchError::UnresolvedResult { .. }));
}
