use std::sync::Arc;

use serde_json::{json, Value};
use shared::{
    error::DispatchError,
    protocol::{results, session_attrs},
};

use crate::{
    registry::ResultMapping,
    response::{GenerateContext, ResponseGenerator, ResponseWriter},
};

pub const STACK_TRACE_VISIBLE: &str = "stackTraceVisible";

fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn document_path(ctx: &GenerateContext<'_>) -> Value {
    ctx.request
        .document()
        .map(|document| json!(document.path_parts.path_id.as_str()))
        .unwrap_or(Value::Null)
}

/// Command endpoint of the page the response renders.
fn command_path(ctx: &GenerateContext<'_>) -> String {
    let path_id = ctx
        .request
        .response_path_parts()
        .map(|parts| parts.path_id.as_str())
        .unwrap_or_else(|| ctx.page.path_id().as_str());
    format!("{path_id}/command")
}

/// Full markup shell of the target page with its bean embedded as JSON.
pub struct LoadDocument;

impl ResponseGenerator for LoadDocument {
    fn name(&self) -> &str {
        "loaddocument"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let bean = serde_json::to_string(&ctx.page.bean().snapshot())
            .map_err(|err| DispatchError::Generation(err.to_string()))?
            .replace('<', "\\u003c");
        let title = html_escape(ctx.page.controller_name().as_str());
        let path_id = html_escape(ctx.page.path_id().as_str());
        let nonce = ctx.request.nonce().to_string();
        let command = html_escape(&command_path(ctx));

        writer
            .write("<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\"><title>")
            .write(&title)
            .write("</title></head><body data-path-id=\"")
            .write(&path_id)
            .write("\" data-command-path=\"")
            .write(&command)
            .write("\"><script type=\"application/json\" id=\"pageBean\" nonce=\"")
            .write(&nonce)
            .write("\">")
            .write(&bean)
            .write("</script></body></html>");
        Ok(())
    }
}

pub struct LoadContent;

impl ResponseGenerator for LoadContent {
    fn name(&self) -> &str {
        "loadcontent"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let pages: Vec<String> = ctx
            .request
            .document()
            .and_then(|document| ctx.session.existing_content_panel(&document.path_parts.path_id))
            .map(|panel| {
                panel
                    .lock()
                    .pages()
                    .iter()
                    .map(|page| page.to_string())
                    .collect()
            })
            .unwrap_or_default();
        writer.write_json(&json!({
            "handler": "loadContentHdl",
            "path": ctx.page.path_id().as_str(),
            "docPath": document_path(ctx),
            "pages": pages,
            "commandPath": command_path(ctx),
            "onSaveList": ctx.request.on_save_ids(),
            "bean": ctx.page.bean().snapshot(),
        }))?;
        Ok(())
    }
}

pub struct RemoteDocView;

impl ResponseGenerator for RemoteDocView {
    fn name(&self) -> &str {
        "remotedocview"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write_json(&json!({
            "handler": "remoteDocViewHdl",
            "path": ctx.page.path_id().as_str(),
            "bean": ctx.page.bean().snapshot(),
        }))?;
        Ok(())
    }
}

pub struct UnloadContent;

impl ResponseGenerator for UnloadContent {
    fn name(&self) -> &str {
        "unloadcontent"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let closed: Vec<&str> = ctx
            .request
            .closed_paths()
            .iter()
            .map(|path| path.as_str())
            .collect();
        writer.write_json(&json!({
            "handler": "unloadContentHdl",
            "docPath": document_path(ctx),
            "closed": closed,
        }))?;
        Ok(())
    }
}

pub struct ReloadContent;

impl ResponseGenerator for ReloadContent {
    fn name(&self) -> &str {
        "reloadcontent"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write_json(&json!({
            "handler": "reloadContentHdl",
            "path": ctx.page.path_id().as_str(),
            "bean": ctx.page.bean().snapshot(),
        }))?;
        Ok(())
    }
}

pub struct PostResponse;

impl ResponseGenerator for PostResponse {
    fn name(&self) -> &str {
        "postresponse"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let path = ctx.request.post_response_path().ok_or_else(|| {
            DispatchError::Generation("post response requested without a target path".into())
        })?;
        writer.write_json(&json!({ "handler": "postHdl", "path": path }))?;
        Ok(())
    }
}

/// Refreshes the panels named in the request, resolving page-name aliases.
pub struct RefreshPanel;

impl ResponseGenerator for RefreshPanel {
    fn name(&self) -> &str {
        "refreshpanel"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let names = ctx.request.take_refresh_panels();
        let panels: Vec<Value> = names
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "target": ctx.request.resolve_page_alias(name),
                })
            })
            .collect();
        writer.write_json(&json!({
            "handler": "refreshPanelHdl",
            "panels": panels,
        }))?;
        Ok(())
    }
}

pub struct CommandPost;

impl ResponseGenerator for CommandPost {
    fn name(&self) -> &str {
        "commandpost"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write_json(&json!({
            "handler": "commandPostHdl",
            "trigger": ctx.request.trigger_id(),
            "tag": ctx.request.command_tag(),
            "bean": ctx.page.bean().snapshot(),
        }))?;
        Ok(())
    }
}

pub struct HidePopup;

impl ResponseGenerator for HidePopup {
    fn name(&self) -> &str {
        "hidepopup"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        _ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write("{\"handler\":\"hidePopupHdl\"}");
        Ok(())
    }
}

/// Drains the pending user hints.
pub struct HintUser;

impl ResponseGenerator for HintUser {
    fn name(&self) -> &str {
        "hintuser"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let hints = ctx.request.take_hints();
        writer.write_json(&json!({
            "handler": "hintUserHdl",
            "hintList": hints,
        }))?;
        Ok(())
    }
}

pub struct RefreshMenu;

impl ResponseGenerator for RefreshMenu {
    fn name(&self) -> &str {
        "refreshmenu"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        _ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write("{\"handler\":\"refreshMenuHdl\"}");
        Ok(())
    }
}

/// Drains the validation messages collected by the gate.
pub struct ValidationErrors;

impl ResponseGenerator for ValidationErrors {
    fn name(&self) -> &str {
        "validationerror"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let infos = ctx.request.take_validation_infos();
        writer.write_json(&json!({
            "handler": "validationErrorHdl",
            "validationInfo": infos,
        }))?;
        Ok(())
    }
}

pub struct SystemError;

impl ResponseGenerator for SystemError {
    fn name(&self) -> &str {
        "systemerror"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        let show_trace = ctx
            .page
            .attribute(STACK_TRACE_VISIBLE)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let trace = if show_trace {
            ctx.session
                .attribute(session_attrs::EXCEPTION_STACKTRACE)
                .unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        writer.write_json(&json!({
            "handler": "showSystemErrorHdl",
            "message": ctx.session.attribute(session_attrs::EXCEPTION_MESSAGE),
            "loginRequired": ctx
                .session
                .attribute(session_attrs::LOGIN_REQUIRED)
                .unwrap_or(Value::Bool(false)),
            "stackTrace": trace,
        }))?;
        Ok(())
    }
}

pub struct CloseWindow;

impl ResponseGenerator for CloseWindow {
    fn name(&self) -> &str {
        "closewindow"
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        _ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write("{\"handler\":\"closeWindowHdl\"}");
        Ok(())
    }
}

/// Appended to every declared data-exchange mapping.
pub fn implicit_generators() -> Vec<Arc<dyn ResponseGenerator>> {
    vec![Arc::new(HintUser), Arc::new(RefreshMenu)]
}

/// `save` as supplied by the base page type. Subtypes may replace it.
pub fn base_save_mapping() -> ResultMapping {
    ResultMapping::json(results::SAVE)
}

/// Mappings every controller carries and no controller may override.
pub fn builtin_mappings() -> Vec<ResultMapping> {
    vec![
        ResultMapping::html(results::INDEX).with(LoadDocument),
        ResultMapping::json(results::OPEN)
            .with(LoadContent)
            .with(HintUser),
        ResultMapping::json(results::REMOTE_VIEW).with(RemoteDocView),
        ResultMapping::json(results::CLOSE)
            .with(UnloadContent)
            .with(HintUser),
        ResultMapping::json(results::RELOAD)
            .with(ReloadContent)
            .with(HintUser)
            .reloading(),
        ResultMapping::json(results::NONE),
        ResultMapping::json(results::COMMAND)
            .with(CommandPost)
            .with(HintUser),
        ResultMapping::json(results::VALIDATION_ERROR)
            .with(ValidationErrors)
            .with(HintUser),
        ResultMapping::json(results::HINT_USER).with(HintUser),
        ResultMapping::json(results::HIDE_POPUP)
            .with(HidePopup)
            .with(HintUser),
        ResultMapping::json(results::REFRESH_PANELS)
            .with(RefreshPanel)
            .with(HintUser),
        ResultMapping::json(results::POST_RESPONSE).with(PostResponse),
        ResultMapping::json(results::CLOSE_WINDOW).with(CloseWindow),
    ]
}
