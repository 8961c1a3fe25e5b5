use std::fs;

use anyhow::Context;
use dispatch::DispatchConfig;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub common_utilities_controller: String,
    pub unauthorized_controller: String,
    pub system_info_controller: String,
    pub friendly_redirect: bool,
    pub hide_error_trace: bool,
    pub csp_nonce: bool,
    pub response_headers: Vec<(String, String)>,
    pub writer_pool_size: usize,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            server_bind: "127.0.0.1:8080".into(),
            common_utilities_controller: dispatch.common_utilities_controller,
            unauthorized_controller: dispatch.unauthorized_controller,
            system_info_controller: dispatch.system_info_controller,
            friendly_redirect: dispatch.friendly_redirect,
            hide_error_trace: dispatch.hide_error_trace,
            csp_nonce: dispatch.csp_nonce,
            response_headers: Vec::new(),
            writer_pool_size: dispatch.writer_pool_size,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Settings {
    pub fn to_dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            common_utilities_controller: self.common_utilities_controller.clone(),
            unauthorized_controller: self.unauthorized_controller.clone(),
            system_info_controller: self.system_info_controller.clone(),
            friendly_redirect: self.friendly_redirect,
            hide_error_trace: self.hide_error_trace,
            csp_nonce: self.csp_nonce,
            response_headers: self.response_headers.clone(),
            writer_pool_size: self.writer_pool_size,
        }
    }
}

/// Optional keys of `server.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    bind_addr: Option<String>,
    common_utilities_controller: Option<String>,
    unauthorized_controller: Option<String>,
    system_info_controller: Option<String>,
    friendly_redirect: Option<bool>,
    hide_error_trace: Option<bool>,
    csp_nonce: Option<bool>,
    response_headers: Option<Vec<String>>,
    writer_pool_size: Option<usize>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let file = match fs::read_to_string("server.toml") {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(err).context("failed to read server.toml"),
    };
    settings_from(file.as_deref(), |name| std::env::var(name).ok())
}

/// Layers defaults, the optional file contents and the environment, in that
/// order. `APP__*` variables win over their legacy unprefixed names.
pub(crate) fn settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings = toml::from_str(raw).context("invalid server.toml")?;
        apply_file(&mut settings, file_cfg)?;
    }

    let lookup = |legacy: &str, prefixed: &str| env(prefixed).or_else(|| env(legacy));

    if let Some(v) = lookup("SERVER_BIND", "APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__COMMON_UTILITIES_CONTROLLER") {
        settings.common_utilities_controller = v;
    }
    if let Some(v) = env("APP__UNAUTHORIZED_CONTROLLER") {
        settings.unauthorized_controller = v;
    }
    if let Some(v) = env("APP__SYSTEM_INFO_CONTROLLER") {
        settings.system_info_controller = v;
    }
    if let Some(v) = env("APP__FRIENDLY_REDIRECT") {
        settings.friendly_redirect = parse_flag("APP__FRIENDLY_REDIRECT", &v)?;
    }
    if let Some(v) = env("APP__HIDE_ERROR_TRACE") {
        settings.hide_error_trace = parse_flag("APP__HIDE_ERROR_TRACE", &v)?;
    }
    if let Some(v) = env("APP__CSP_NONCE") {
        settings.csp_nonce = parse_flag("APP__CSP_NONCE", &v)?;
    }
    if let Some(v) = env("APP__RESPONSE_HEADERS") {
        settings.response_headers = v
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_header)
            .collect::<anyhow::Result<_>>()?;
    }
    if let Some(v) = env("APP__WRITER_POOL_SIZE") {
        settings.writer_pool_size = v
            .parse()
            .with_context(|| format!("APP__WRITER_POOL_SIZE is not a number: {v}"))?;
    }
    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        settings.max_body_bytes = v
            .parse()
            .with_context(|| format!("APP__MAX_BODY_BYTES is not a number: {v}"))?;
    }

    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) -> anyhow::Result<()> {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.common_utilities_controller {
        settings.common_utilities_controller = v;
    }
    if let Some(v) = file_cfg.unauthorized_controller {
        settings.unauthorized_controller = v;
    }
    if let Some(v) = file_cfg.system_info_controller {
        settings.system_info_controller = v;
    }
    if let Some(v) = file_cfg.friendly_redirect {
        settings.friendly_redirect = v;
    }
    if let Some(v) = file_cfg.hide_error_trace {
        settings.hide_error_trace = v;
    }
    if let Some(v) = file_cfg.csp_nonce {
        settings.csp_nonce = v;
    }
    if let Some(entries) = file_cfg.response_headers {
        settings.response_headers = entries
            .iter()
            .map(|entry| parse_header(entry))
            .collect::<anyhow::Result<_>>()?;
    }
    if let Some(v) = file_cfg.writer_pool_size {
        settings.writer_pool_size = v;
    }
    if let Some(v) = file_cfg.max_body_bytes {
        settings.max_body_bytes = v;
    }
    Ok(())
}

fn parse_flag(name: &str, raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{name} is not a flag: {other}"),
    }
}

/// Parses a `name=value` response header entry.
pub(crate) fn parse_header(entry: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = entry
        .split_once('=')
        .with_context(|| format!("response header must be name=value: {entry}"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("response header without a name: {entry}");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
