//! Asana REST integration.
//!
//! Walks workspaces -> projects -> sections/tasks -> task detail, the same
//! traversal the chat flow needs to build its flat document set. Failures on
//! sub-resources skip that resource; only the workspace listing is fatal.

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::models::{OauthConfig, OauthToken, Platform, TaskDocument};

/// Asana OAuth authorize endpoint.
pub const AUTHORIZE_URL: &str = "https://app.asana.com/-/oauth_authorize";

/// Asana OAuth token endpoint.
pub const TOKEN_URL: &str = "https://app.asana.com/-/oauth_token";

/// Asana REST API base.
const ASANA_API_URL: &str = "https://app.asana.com/api/1.0";

/// Page size for task listing.
const PAGE_SIZE: u32 = 50;

/// Build the authorize URL the user is redirected to.
pub fn authorize_url(config: &OauthConfig, state: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&response_type=code&state={}",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
        urlencoding::encode(state),
    )
}

/// Exchange an authorization code for a token.
pub async fn exchange_code(config: &OauthConfig, code: &str) -> Result<OauthToken> {
    exchange_code_at(config, code, TOKEN_URL).await
}

/// Exchange against a specific token endpoint (overridable for tests).
#[instrument(skip_all)]
pub async fn exchange_code_at(
    config: &OauthConfig,
    code: &str,
    token_url: &str,
) -> Result<OauthToken> {
    let params = [
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("code", code),
    ];

    let response = reqwest::Client::new()
        .post(token_url)
        .form(&params)
        .send()
        .await
        .context("Failed to send token request to Asana")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Asana token exchange failed ({status}): {body}"));
    }

    response
        .json()
        .await
        .context("Failed to parse Asana token response")
}

/// Asana workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub gid: String,
    pub name: String,
}

/// Asana project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Asana section within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub gid: String,
    pub name: String,
}

/// Compact task reference from a project task listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRef {
    pub gid: String,
}

/// Asana user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub gid: String,
    pub name: String,
}

/// Full task detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub gid: String,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub due_on: Option<String>,
    #[serde(default)]
    pub permalink_url: Option<String>,
}

/// One project with its sections and fully-detailed tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub sections: Vec<Section>,
    pub tasks: Vec<Task>,
}

/// Everything fetched for one Asana account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaExport {
    pub projects: Vec<ProjectDetail>,
}

impl AsanaExport {
    /// Flatten the export into retrieval documents.
    pub fn to_documents(&self) -> Vec<TaskDocument> {
        self.projects
            .iter()
            .flat_map(|detail| {
                detail.tasks.iter().map(|task| TaskDocument {
                    platform: Platform::Asana,
                    project: Some(detail.project.name.clone()),
                    section: None,
                    title: task.name.clone(),
                    body: task.notes.clone().filter(|n| !n.is_empty()),
                    status: Some(if task.completed { "completed" } else { "open" }.to_string()),
                    assignee: task.assignee.as_ref().map(|a| a.name.clone()),
                    url: task.permalink_url.clone(),
                })
            })
            .collect()
    }
}

/// Standard Asana response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    next_page: Option<NextPage>,
}

#[derive(Debug, Deserialize)]
struct NextPage {
    offset: String,
}

/// Asana REST client.
#[derive(Debug, Clone)]
pub struct AsanaClient {
    client: reqwest::Client,
    api_url: String,
}

impl AsanaClient {
    /// Create a client with an OAuth access token.
    pub fn new(access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .context("Invalid access token")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: ASANA_API_URL.to_string(),
        })
    }

    /// Create a client with a custom API URL (for testing).
    pub fn with_url(access_token: &str, api_url: &str) -> Result<Self> {
        let mut client = Self::new(access_token)?;
        client.api_url = api_url.to_string();
        Ok(client)
    }

    /// GET an enveloped resource; non-success is an error.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Envelope<T>> {
        let url = format!("{}{path}", self.api_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to Asana: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Asana API returned {status} for {path}: {body}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Asana response for {path}"))
    }

    /// GET an enveloped resource; non-success logs and yields `None`.
    async fn try_get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.get(path).await {
            Ok(envelope) => Some(envelope.data),
            Err(e) => {
                warn!(path = %path, error = %e, "Skipping Asana resource");
                None
            }
        }
    }

    /// List all workspaces visible to the token.
    #[instrument(skip(self))]
    pub async fn workspaces(&self) -> Result<Vec<Workspace>> {
        Ok(self.get("/workspaces").await?.data)
    }

    /// List task refs in a project, following `next_page` offsets.
    async fn project_task_refs(&self, project_gid: &str) -> Vec<TaskRef> {
        let mut refs = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let path = match &offset {
                Some(o) => format!("/projects/{project_gid}/tasks?limit={PAGE_SIZE}&offset={o}"),
                None => format!("/projects/{project_gid}/tasks?limit={PAGE_SIZE}"),
            };

            let envelope: Envelope<Vec<TaskRef>> = match self.get(&path).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(project = %project_gid, error = %e, "Skipping project tasks");
                    break;
                }
            };

            refs.extend(envelope.data);
            match envelope.next_page {
                Some(page) => offset = Some(page.offset),
                None => break,
            }
        }

        refs
    }

    /// Fetch every project, its sections, and fully-detailed tasks.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<AsanaExport> {
        let workspaces = self.workspaces().await?;
        let mut projects = Vec::new();

        for workspace in &workspaces {
            let Some(workspace_projects) = self
                .try_get::<Vec<Project>>(&format!("/projects?workspace={}", workspace.gid))
                .await
            else {
                continue;
            };

            for project in workspace_projects {
                let sections = self
                    .try_get::<Vec<Section>>(&format!("/projects/{}/sections", project.gid))
                    .await
                    .unwrap_or_default();

                let refs = self.project_task_refs(&project.gid).await;
                let mut tasks = Vec::with_capacity(refs.len());
                for task_ref in refs {
                    if let Some(task) = self
                        .try_get::<Task>(&format!("/tasks/{}", task_ref.gid))
                        .await
                    {
                        tasks.push(task);
                    }
                }

                debug!(
                    project = %project.name,
                    sections = sections.len(),
                    tasks = tasks.len(),
                    "Fetched Asana project"
                );

                projects.push(ProjectDetail {
                    project,
                    sections,
                    tasks,
                });
            }
        }

        Ok(AsanaExport { projects })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> OauthConfig {
        OauthConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8080/asana/callback".into(),
        }
    }

    #[test]
    fn test_authorize_url_encodes_params() {
        let url = authorize_url(&config(), "state-1");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fasana%2Fcallback"));
        assert!(url.contains("state=state-1"));
        assert!(url.contains("response_type=code"));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;

        let token = exchange_code_at(&config(), "code-1", &format!("{}/token", server.uri()))
            .await
            .unwrap();

        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn test_exchange_code_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad code"))
            .mount(&server)
            .await;

        let err = exchange_code_at(&config(), "bad", &server.uri())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("token exchange failed"));
    }

    #[tokio::test]
    async fn test_fetch_all_walks_hierarchy() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/workspaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "w1", "name": "Acme"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects"))
            .and(query_param("workspace", "w1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "p1", "name": "Website"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects/p1/sections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "s1", "name": "Backlog"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects/p1/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "t1"}],
                "next_page": null
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/tasks/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "gid": "t1",
                    "name": "Fix login",
                    "completed": false,
                    "assignee": {"gid": "u1", "name": "Ada"}
                }
            })))
            .mount(&server)
            .await;

        let client = AsanaClient::with_url("token", &server.uri()).unwrap();
        let export = client.fetch_all().await.unwrap();

        assert_eq!(export.projects.len(), 1);
        assert_eq!(export.projects[0].sections[0].name, "Backlog");
        assert_eq!(export.projects[0].tasks[0].name, "Fix login");

        let docs = export.to_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].project.as_deref(), Some("Website"));
        assert_eq!(docs[0].status.as_deref(), Some("open"));
        assert_eq!(docs[0].assignee.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_fetch_all_skips_failing_subresources() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/workspaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "w1", "name": "Acme"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = AsanaClient::with_url("token", &server.uri()).unwrap();
        let export = client.fetch_all().await.unwrap();
        assert!(export.projects.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_fails_without_workspaces() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/workspaces"))
            .respond_with(ResponseTemplate::new(401).set_body_string("no"))
            .mount(&server)
            .await;

        let client = AsanaClient::with_url("token", &server.uri()).unwrap();
        assert!(client.fetch_all().await.is_err());
    }

    #[tokio::test]
    async fn test_task_pagination_follows_offsets() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/p1/tasks"))
            .and(query_param("offset", "cursor-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "t2"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects/p1/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"gid": "t1"}],
                "next_page": {"offset": "cursor-2"}
            })))
            .mount(&server)
            .await;

        let client = AsanaClient::with_url("token", &server.uri()).unwrap();
        let refs = client.project_task_refs("p1").await;
        assert_eq!(refs.len(), 2);
    }
}
