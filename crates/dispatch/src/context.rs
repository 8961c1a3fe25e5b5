use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use shared::{
    domain::{ControllerPathParts, PathId},
    transfer::TransferNode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintMode {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub mode: HintMode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationInfo {
    pub target: Option<String>,
    pub message: String,
}

/// Command extracted from a `<ref>-><verb>` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub locator: TransferNode,
    pub verb: String,
}

/// Enclosing document of the request, when the request targets embedded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    pub path_parts: ControllerPathParts,
    pub tabbed: bool,
}

/// Per-request attribute bag. Nothing in here outlives the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    started_at: DateTime<Utc>,
    command: Option<PendingCommand>,
    command_tag: Option<String>,
    command_result: Option<String>,
    trigger_id: Option<String>,
    target_value: Option<String>,
    closed_paths: Vec<PathId>,
    page_aliases: IndexMap<String, String>,
    refresh_panels: Vec<String>,
    validation_infos: Vec<ValidationInfo>,
    on_save_ids: Vec<String>,
    hints: Vec<Hint>,
    scroll_reset: bool,
    nonce: Option<String>,
    remote_viewer: Option<String>,
    post_response_path: Option<String>,
    request_path_parts: Option<ControllerPathParts>,
    response_path_parts: Option<ControllerPathParts>,
    document: Option<DocumentTarget>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RequestContext {
    pub fn new(remote_viewer: Option<String>) -> Self {
        Self {
            started_at: Utc::now(),
            command: None,
            command_tag: None,
            command_result: None,
            trigger_id: None,
            target_value: None,
            closed_paths: Vec::new(),
            page_aliases: IndexMap::new(),
            refresh_panels: Vec::new(),
            validation_infos: Vec::new(),
            on_save_ids: Vec::new(),
            hints: Vec::new(),
            scroll_reset: false,
            nonce: None,
            remote_viewer,
            post_response_path: None,
            request_path_parts: None,
            response_path_parts: None,
            document: None,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn set_command(&mut self, command: PendingCommand) {
        self.command = Some(command);
    }

    pub fn command(&self) -> Option<&PendingCommand> {
        self.command.as_ref()
    }

    pub fn take_command(&mut self) -> Option<PendingCommand> {
        self.command.take()
    }

    pub fn set_command_tag(&mut self, tag: impl Into<String>) {
        self.command_tag = Some(tag.into());
    }

    pub fn command_tag(&self) -> Option<&str> {
        self.command_tag.as_deref()
    }

    /// Result name a command handler wants instead of the generic command result.
    pub fn set_command_result(&mut self, result: impl Into<String>) {
        self.command_result = Some(result.into());
    }

    pub fn take_command_result(&mut self) -> Option<String> {
        self.command_result
            .take()
            .filter(|result| !result.trim().is_empty())
    }

    pub fn set_trigger_id(&mut self, id: impl Into<String>) {
        self.trigger_id = Some(id.into());
    }

    pub fn trigger_id(&self) -> Option<&str> {
        self.trigger_id.as_deref()
    }

    pub fn set_target_value(&mut self, value: impl Into<String>) {
        self.target_value = Some(value.into());
    }

    pub fn target_value(&self) -> Option<&str> {
        self.target_value.as_deref()
    }

    pub fn add_closed_path(&mut self, path_id: PathId) {
        if !self.closed_paths.contains(&path_id) {
            self.closed_paths.push(path_id);
        }
    }

    pub fn add_closed_paths(&mut self, path_ids: impl IntoIterator<Item = PathId>) {
        for path_id in path_ids {
            self.add_closed_path(path_id);
        }
    }

    pub fn closed_paths(&self) -> &[PathId] {
        &self.closed_paths
    }

    pub fn set_page_alias(&mut self, short_name: impl Into<String>, long_name: impl Into<String>) {
        self.page_aliases.insert(short_name.into(), long_name.into());
    }

    pub fn resolve_page_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.page_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    pub fn add_refresh_panel(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.refresh_panels.contains(&name) {
            self.refresh_panels.push(name);
        }
    }

    pub fn refresh_panels(&self) -> &[String] {
        &self.refresh_panels
    }

    pub fn take_refresh_panels(&mut self) -> Vec<String> {
        std::mem::take(&mut self.refresh_panels)
    }

    pub fn add_validation_info(&mut self, target: Option<&str>, message: impl Into<String>) {
        self.validation_infos.push(ValidationInfo {
            target: target.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn validation_infos(&self) -> &[ValidationInfo] {
        &self.validation_infos
    }

    pub fn take_validation_infos(&mut self) -> Vec<ValidationInfo> {
        std::mem::take(&mut self.validation_infos)
    }

    pub fn add_on_save_id(&mut self, id: impl Into<String>) {
        self.on_save_ids.push(id.into());
    }

    pub fn on_save_ids(&self) -> &[String] {
        &self.on_save_ids
    }

    pub fn add_hint(&mut self, mode: HintMode, message: impl Into<String>) {
        self.hints.push(Hint {
            mode,
            message: message.into(),
        });
    }

    pub fn hints(&self) -> &[Hint] {
        &self.hints
    }

    pub fn take_hints(&mut self) -> Vec<Hint> {
        std::mem::take(&mut self.hints)
    }

    pub fn set_scroll_reset(&mut self) {
        self.scroll_reset = true;
    }

    pub fn is_scroll_reset(&self) -> bool {
        self.scroll_reset
    }

    /// Per-request nonce, generated on first use from the request timestamp.
    pub fn nonce(&mut self) -> &str {
        let started_at = self.started_at;
        self.nonce.get_or_insert_with(|| {
            let stamp = started_at
                .timestamp_nanos_opt()
                .unwrap_or_else(|| started_at.timestamp_micros());
            STANDARD.encode(stamp.to_string())
        })
    }

    pub fn remote_viewer(&self) -> Option<&str> {
        self.remote_viewer.as_deref()
    }

    pub fn is_remote_viewer(&self) -> bool {
        self.remote_viewer.is_some()
    }

    pub fn set_post_response_path(&mut self, path: impl Into<String>) {
        self.post_response_path = Some(path.into());
    }

    pub fn post_response_path(&self) -> Option<&str> {
        self.post_response_path.as_deref()
    }

    pub fn set_request_path_parts(&mut self, parts: ControllerPathParts) {
        self.request_path_parts = Some(parts);
    }

    pub fn request_path_parts(&self) -> Option<&ControllerPathParts> {
        self.request_path_parts.as_ref()
    }

    pub fn set_response_path_parts(&mut self, parts: ControllerPathParts) {
        self.response_path_parts = Some(parts);
    }

    pub fn response_path_parts(&self) -> Option<&ControllerPathParts> {
        self.response_path_parts.as_ref()
    }

    pub fn set_document(&mut self, document: DocumentTarget) {
        self.document = Some(document);
    }

    pub fn document(&self) -> Option<&DocumentTarget> {
        self.document.as_ref()
    }

    /// Resets every field except the request timestamp and remote-viewer marker.
    pub fn clear(&mut self) {
        let remote_viewer = self.remote_viewer.take();
        let started_at = self.started_at;
        *self = Self::new(remote_viewer);
        self.started_at = started_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_stable_within_request() {
        let mut rc = RequestContext::new(None);
        let first = rc.nonce().to_string();
        assert!(!first.is_empty());
        assert_eq!(rc.nonce(), first);
        assert!(STANDARD.decode(&first).is_ok());
    }

    #[test]
    fn draining_hints_empties_the_list() {
        let mut rc = RequestContext::new(None);
        rc.add_hint(HintMode::Info, "saved");
        rc.add_hint(HintMode::Warning, "check totals");
        assert_eq!(rc.take_hints().len(), 2);
        assert!(rc.hints().is_empty());
    }

    #[test]
    fn blank_command_result_is_ignored() {
        let mut rc = RequestContext::new(None);
        rc.set_command_result(" ");
        assert_eq!(rc.take_command_result(), None);
        rc.set_command_result("refreshpanels");
        assert_eq!(rc.take_command_result().as_deref(), Some("refreshpanels"));
    }

    #[test]
    fn clear_drops_request_fields() {
        let mut rc = RequestContext::new(Some("viewer".into()));
        rc.add_closed_path(PathId::from("/acct"));
        rc.add_refresh_panel("summary");
        rc.add_refresh_panel("summary");
        assert_eq!(rc.refresh_panels().len(), 1);
        rc.set_scroll_reset();
        rc.clear();
        assert!(rc.closed_paths().is_empty());
        assert!(rc.refresh_panels().is_empty());
        assert!(!rc.is_scroll_reset());
        assert_eq!(rc.remote_viewer(), Some("viewer"));
    }
}
