//! Shared connector types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported task-management platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Asana,
    ClickUp,
    Linear,
}

impl Platform {
    /// Platform key as used in routes and the session store.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Asana => "asana",
            Platform::ClickUp => "clickup",
            Platform::Linear => "linear",
        }
    }

    /// All supported platforms.
    pub fn all() -> [Platform; 3] {
        [Platform::Asana, Platform::ClickUp, Platform::Linear]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognized platform keys.
#[derive(Debug, thiserror::Error)]
#[error("Unknown platform: '{0}'")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asana" => Ok(Platform::Asana),
            "clickup" => Ok(Platform::ClickUp),
            "linear" => Ok(Platform::Linear),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// OAuth application credentials for one platform.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

/// Token payload from a completed OAuth code exchange.
///
/// Providers return different extras; unrecognized fields are preserved so
/// the stored payload round-trips intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthToken {
    /// Bearer/access token
    pub access_token: String,
    /// Refresh token, when the provider grants one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Token type (typically "bearer")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Any additional provider-specific fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A flat task record handed to the retrieval layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Source platform
    pub platform: Platform,
    /// Project (Asana project, ClickUp list, Linear project/team)
    #[serde(default)]
    pub project: Option<String>,
    /// Section/space/state grouping within the project
    #[serde(default)]
    pub section: Option<String>,
    /// Task title
    pub title: String,
    /// Task body/notes/description
    #[serde(default)]
    pub body: Option<String>,
    /// Status label ("completed", "Open", workflow state name, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Assignee display name
    #[serde(default)]
    pub assignee: Option<String>,
    /// Link back to the task
    #[serde(default)]
    pub url: Option<String>,
}

impl TaskDocument {
    /// Render the document as one retrieval chunk.
    pub fn text(&self) -> String {
        let mut out = format!("Task: {}", self.title);
        if let Some(project) = &self.project {
            out.push_str(&format!(", Project: {project}"));
        }
        if let Some(section) = &self.section {
            out.push_str(&format!(", Section: {section}"));
        }
        if let Some(status) = &self.status {
            out.push_str(&format!(", Status: {status}"));
        }
        if let Some(assignee) = &self.assignee {
            out.push_str(&format!(", Assignee: {assignee}"));
        }
        if let Some(body) = &self.body {
            if !body.is_empty() {
                out.push_str(&format!(". {body}"));
            }
        }
        out
    }
}
