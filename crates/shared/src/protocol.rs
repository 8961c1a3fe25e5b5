use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod params {
    pub const DOCUMENT: &str = "req_doc";
    pub const TARGET_VALUE: &str = "req_trg";
    pub const WINDOW_NAME: &str = "req_win";
    pub const VALIDATION_ACTION: &str = "req_va";
    pub const CONFIRM_MSG: &str = "req_cmsg";
    pub const CONFIRM_MSGICON: &str = "req_cmsgicon";
    pub const CONFIRM_PARAM: &str = "req_cprm";
    pub const NO_TRANSFER: &str = "req_notrf";
    pub const REMOTE_VIEWER: &str = "req_rv";
    pub const REFRESH: &str = "req_rsh";
    pub const COMMAND: &str = "req_cmd";
    pub const COMMAND_TAG: &str = "req_ctag";
    pub const TRIGGER_WIDGET: &str = "req_trgid";

    /// Names that never reach the transfer tree and are not consumed as control fields.
    pub const SKIP_ON_POPULATE: &[&str] = &[
        DOCUMENT,
        TARGET_VALUE,
        WINDOW_NAME,
        VALIDATION_ACTION,
        CONFIRM_MSG,
        CONFIRM_MSGICON,
        CONFIRM_PARAM,
        NO_TRANSFER,
        REMOTE_VIEWER,
    ];

    pub fn is_skipped(name: &str) -> bool {
        SKIP_ON_POPULATE.contains(&name)
    }
}

pub mod actions {
    pub const INDEX_PAGE: &str = "/indexPage";
    pub const OPEN_PAGE: &str = "/openPage";
    pub const REPLACE_PAGE: &str = "/replacePage";
    pub const SAVE_PAGE: &str = "/savePage";
    pub const CLOSE_PAGE: &str = "/closePage";
    pub const NO_RESULT: &str = "/noResult";
    pub const CONTENT: &str = "/content";
    pub const COMMAND: &str = "/command";
    pub const HIDE_POPUP: &str = "/hidePopup";
}

pub mod results {
    pub const INDEX: &str = "index";
    pub const OPEN: &str = "open";
    pub const REMOTE_VIEW: &str = "remoteview";
    pub const SAVE: &str = "save";
    pub const CLOSE: &str = "close";
    pub const RELOAD: &str = "reload";
    pub const NONE: &str = "none";
    pub const COMMAND: &str = "command";
    pub const VALIDATION_ERROR: &str = "validationerror";
    pub const HINT_USER: &str = "hintuser";
    pub const HIDE_POPUP: &str = "hidepopup";
    pub const REFRESH_PANELS: &str = "refreshpanels";
    pub const POST_RESPONSE: &str = "postresponse";
    pub const CLOSE_WINDOW: &str = "closewindow";
    pub const SHOW_SYSTEM_EXCEPTION: &str = "showsystemexception";
}

pub mod session_attrs {
    pub const EXCEPTION_MESSAGE: &str = "sys.exceptionMessage";
    pub const EXCEPTION_STACKTRACE: &str = "sys.exceptionStacktrace";
    pub const LOGIN_REQUIRED: &str = "sys.loginRequired";
    pub const EXCEPTION_ERROR: &str = "sys.exceptionError";
    pub const POPUP: &str = "ui.popup";
}

/// Flat multi-valued parameter namespace, kept in first-arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestParams {
    values: IndexMap<String, Vec<String>>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (name, value) in pairs {
            params.add(name, value);
        }
        params
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Inbound HTTP-like request as seen by the dispatch pipeline.
#[derive(Debug, Clone, Default)]
pub struct ClientRequest {
    pub path: String,
    pub charset: Option<String>,
    pub params: RequestParams,
}

impl ClientRequest {
    pub fn new(path: impl Into<String>, params: RequestParams) -> Self {
        Self {
            path: path.into(),
            charset: None,
            params,
        }
    }

    pub fn document_path(&self) -> Option<&str> {
        self.params
            .first(params::DOCUMENT)
            .map(str::trim)
            .filter(|path| !path.is_empty())
    }

    pub fn remote_viewer(&self) -> Option<&str> {
        self.params
            .first(params::REMOTE_VIEWER)
            .map(str::trim)
            .filter(|viewer| !viewer.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientResponse {
    content_type: Option<String>,
    charset: Option<String>,
    headers: IndexMap<String, String>,
    body: String,
    committed: bool,
}

impl ClientResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = Some(content_type.into());
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = Some(charset.into());
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Appends to the body. The response counts as committed from the first write on.
    pub fn write(&mut self, text: &str) {
        self.committed = true;
        self.body.push_str(text);
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}
