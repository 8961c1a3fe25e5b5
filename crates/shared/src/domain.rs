use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

name_newtype!(ControllerName);
name_newtype!(PathId);
name_newtype!(SessionId);

/// Parsed request path: `/controller[:var[:var]][/action]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerPathParts {
    pub controller_path: String,
    pub path_id: PathId,
    pub controller_name: ControllerName,
    pub action_name: Option<String>,
    pub path_variables: Vec<String>,
}

impl ControllerPathParts {
    pub fn is_action_path(&self) -> bool {
        self.action_name.is_some()
    }

    pub fn is_variable_path(&self) -> bool {
        !self.path_variables.is_empty()
    }

    pub fn path_variable(&self) -> Option<&str> {
        self.path_variables.first().map(String::as_str)
    }

    /// Full path of `action` on the same page instance.
    pub fn action_path(&self, action: &str) -> String {
        format!("{}{}", self.path_id, action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    Page,
    Document,
    Resource,
}

/// Response content-kind of a result mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Json,
    Html,
}

impl ContentKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ContentKind::Json => "application/json",
            ContentKind::Html => "text/html",
        }
    }

    pub fn is_data_exchange(self) -> bool {
        matches!(self, ContentKind::Json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosePageMode {
    #[default]
    Close,
    CloseAll,
    CloseOthers,
}

impl ClosePageMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("closeall" | "close_all") => ClosePageMode::CloseAll,
            Some("closeothers" | "close_others") => ClosePageMode::CloseOthers,
            _ => ClosePageMode::Close,
        }
    }
}
