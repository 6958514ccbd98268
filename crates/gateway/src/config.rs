//! Configuration for the gateway service.

use std::env;

use connectors::{OauthConfig, Platform};

/// OAuth app credentials for one platform, with optional endpoint overrides
/// for pointing at test servers.
#[derive(Debug, Clone)]
pub struct PlatformCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Token endpoint override.
    pub token_url: Option<String>,
    /// API base URL override.
    pub api_url: Option<String>,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Externally visible base URL, used to build OAuth redirect URIs.
    pub public_base_url: String,
    /// Chat UI the OAuth callback redirects back to.
    pub chat_ui_url: String,
    /// Directory holding the session store file.
    pub session_store_dir: String,
    /// Asana OAuth app, if configured.
    pub asana: Option<PlatformCredentials>,
    /// ClickUp OAuth app, if configured.
    pub clickup: Option<PlatformCredentials>,
    /// Linear OAuth app, if configured.
    pub linear: Option<PlatformCredentials>,
    /// Gemini API key; chat and instruction routes are disabled without it.
    pub google_api_key: Option<String>,
    /// Chat model name.
    pub chat_model: String,
    /// Embedding model name.
    pub embed_model: String,
    /// Context chunks retrieved per question.
    pub rag_top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: env::var("GATEWAY_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            chat_ui_url: env::var("CHAT_UI_URL")
                .unwrap_or_else(|_| "http://localhost:8501/chat".to_string()),
            session_store_dir: env::var("SESSION_STORE_DIR")
                .unwrap_or_else(|_| ".sessions".to_string()),
            asana: platform_credentials("ASANA"),
            clickup: platform_credentials("CLICKUP"),
            linear: platform_credentials("LINEAR"),
            google_api_key: env::var("GOOGLE_API_KEY").ok().filter(|s| !s.is_empty()),
            chat_model: env::var("GEMINI_CHAT_MODEL")
                .unwrap_or_else(|_| llm::gemini::DEFAULT_CHAT_MODEL.to_string()),
            embed_model: env::var("GEMINI_EMBED_MODEL")
                .unwrap_or_else(|_| llm::gemini::DEFAULT_EMBED_MODEL.to_string()),
            rag_top_k: env::var("RAG_TOP_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
        }
    }
}

impl Config {
    /// Credentials for a platform, if that platform is enabled.
    pub fn credentials(&self, platform: Platform) -> Option<&PlatformCredentials> {
        match platform {
            Platform::Asana => self.asana.as_ref(),
            Platform::ClickUp => self.clickup.as_ref(),
            Platform::Linear => self.linear.as_ref(),
        }
    }

    /// OAuth config for a platform; redirect URI points back at this service.
    pub fn oauth(&self, platform: Platform) -> Option<OauthConfig> {
        self.credentials(platform).map(|creds| OauthConfig {
            client_id: creds.client_id.clone(),
            client_secret: creds.client_secret.clone(),
            redirect_uri: format!("{}/{platform}/callback", self.public_base_url),
        })
    }

    /// Platforms with credentials present.
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        Platform::all()
            .into_iter()
            .filter(|p| self.credentials(*p).is_some())
            .collect()
    }

    /// Whether the model backend is usable.
    pub fn ai_configured(&self) -> bool {
        self.google_api_key.is_some()
    }
}

/// Read `{PREFIX}_CLIENT_ID` / `{PREFIX}_CLIENT_SECRET`; both must be set
/// for the platform to count as configured.
fn platform_credentials(prefix: &str) -> Option<PlatformCredentials> {
    let client_id = env::var(format!("{prefix}_CLIENT_ID"))
        .ok()
        .filter(|s| !s.is_empty())?;
    let client_secret = env::var(format!("{prefix}_CLIENT_SECRET"))
        .ok()
        .filter(|s| !s.is_empty())?;
    Some(PlatformCredentials {
        client_id,
        client_secret,
        token_url: env::var(format!("{prefix}_TOKEN_URL")).ok(),
        api_url: env::var(format!("{prefix}_API_URL")).ok(),
    })
}
