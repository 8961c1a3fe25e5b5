//! Controllers served by the binary: a tabbed `/main` document hosting
//! `/account` pages, plus the system controllers the pipeline needs.

use dispatch::{
    generators::RefreshPanel, system_controllers, ControllerRegistry, ControllerType,
    DispatchConfig, HintMode, Required, ResultMapping,
};
use session::{ComponentTree, Field, MapBean};
use shared::error::DispatchError;
use tracing::info;

fn account_components() -> ComponentTree {
    ComponentTree::new()
        .with(Field::new("accountForm.name", "name"))
        .with(Field::new("accountForm.email", "email"))
        .with(Field::new("accountForm.note", "note").on_command("clear", |bean, _index| {
            bean.write_property("note", None, &[String::new()])?;
            Ok(Some(shared::protocol::results::REFRESH_PANELS.to_string()))
        }))
}

pub(crate) fn registry(config: &DispatchConfig) -> Result<ControllerRegistry, DispatchError> {
    let mut builder =
        ControllerRegistry::builder().rule("nameRequired", Required::new("name", "name is required"));
    for controller in system_controllers(config) {
        builder = builder.controller(controller);
    }
    builder
        .controller(ControllerType::document("/main"))
        .controller(
            ControllerType::page("/account")
                .bean_template(MapBean::new().with("name", "").with("email", ""))
                .components(account_components)
                .bind("name", "accountForm.name", "name")
                .bind("email", "accountForm.email", "email")
                .bind("note", "accountForm.note", "note")
                .validate_action("/savePage", &["nameRequired"])
                .on_load(|ctx| {
                    ctx.add_on_save_id("accountForm.note");
                    Ok(())
                })
                .on_save(|ctx| {
                    info!(page = %ctx.page().path_id(), "account saved");
                    ctx.hint(HintMode::Info, "account saved");
                    Ok(())
                })
                .result(ResultMapping::json("save").with(RefreshPanel)),
        )
        .build(config)
}
