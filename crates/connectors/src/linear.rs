//! Linear GraphQL integration.
//!
//! Unlike the REST platforms, Linear answers the whole viewer/teams/issues/
//! projects shape in one query.

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::models::{OauthConfig, OauthToken, Platform, TaskDocument};

/// Linear OAuth authorize endpoint.
pub const AUTHORIZE_URL: &str = "https://linear.app/oauth/authorize";

/// Linear OAuth token endpoint.
pub const TOKEN_URL: &str = "https://api.linear.app/oauth/token";

/// Linear GraphQL endpoint.
const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

/// Build the authorize URL the user is redirected to.
pub fn authorize_url(config: &OauthConfig, state: &str) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&response_type=code&scope=read&state={}",
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
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
        ("code", code),
    ];

    let response = reqwest::Client::new()
        .post(token_url)
        .form(&params)
        .send()
        .await
        .context("Failed to send token request to Linear")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Linear token exchange failed ({status}): {body}"));
    }

    response
        .json()
        .await
        .context("Failed to parse Linear token response")
}

/// GraphQL request body.
#[derive(Debug, Serialize)]
struct GraphQLRequest {
    query: &'static str,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

/// GraphQL error.
#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

/// Connection wrapper (`{ nodes: [...] }`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nodes<T> {
    pub nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

/// Authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Workflow state of an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueState {
    pub id: String,
    pub name: String,
}

/// Issue assignee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Project reference on an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

/// Linear issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<IssueState>,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub project: Option<ProjectRef>,
}

/// Linear project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Linear team with its issues and projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub issues: Nodes<Issue>,
    #[serde(default)]
    pub projects: Nodes<Project>,
}

/// Everything fetched for one Linear account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearExport {
    pub viewer: Viewer,
    pub teams: Nodes<Team>,
}

impl LinearExport {
    /// Flatten the export into retrieval documents.
    pub fn to_documents(&self) -> Vec<TaskDocument> {
        self.teams
            .nodes
            .iter()
            .flat_map(|team| {
                team.issues.nodes.iter().map(move |issue| TaskDocument {
                    platform: Platform::Linear,
                    project: issue
                        .project
                        .as_ref()
                        .map_or_else(|| Some(team.name.clone()), |p| Some(p.name.clone())),
                    section: Some(team.key.clone()),
                    title: issue.title.clone(),
                    body: issue.description.clone().filter(|d| !d.is_empty()),
                    status: issue.state.as_ref().map(|s| s.name.clone()),
                    assignee: issue.assignee.as_ref().map(|a| a.name.clone()),
                    url: None,
                })
            })
            .collect()
    }
}

/// Full-account export query, shaped after the chat flow's needs.
const EXPORT_QUERY: &str = r"
    query {
        viewer {
            id
            name
            email
        }
        teams {
            nodes {
                id
                name
                key
                issues(first: 50) {
                    nodes {
                        id
                        title
                        description
                        state {
                            id
                            name
                        }
                        assignee {
                            id
                            name
                            email
                        }
                        project {
                            id
                            name
                        }
                    }
                }
                projects {
                    nodes {
                        id
                        name
                        description
                    }
                }
            }
        }
    }
";

/// Linear GraphQL client.
#[derive(Debug, Clone)]
pub struct LinearClient {
    client: reqwest::Client,
    api_url: String,
}

impl LinearClient {
    /// Create a client with an OAuth access token.
    pub fn new(access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .context("Invalid access token")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: LINEAR_API_URL.to_string(),
        })
    }

    /// Create a client with a custom API URL (for testing).
    pub fn with_url(access_token: &str, api_url: &str) -> Result<Self> {
        let mut client = Self::new(access_token)?;
        client.api_url = api_url.to_string();
        Ok(client)
    }

    /// Execute a GraphQL query.
    async fn execute<R: DeserializeOwned>(&self, query: &'static str) -> Result<R> {
        let request = GraphQLRequest { query };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Linear API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Linear API returned error status {status}: {body}"));
        }

        let gql_response: GraphQLResponse<R> = response
            .json()
            .await
            .context("Failed to parse Linear API response")?;

        if let Some(errors) = gql_response.errors {
            let error_messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("GraphQL errors: {}", error_messages.join(", ")));
        }

        gql_response
            .data
            .ok_or_else(|| anyhow!("No data in GraphQL response"))
    }

    /// Fetch the viewer plus every team's issues and projects.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<LinearExport> {
        let export: LinearExport = self.execute(EXPORT_QUERY).await?;
        debug!(
            teams = export.teams.nodes.len(),
            viewer = %export.viewer.name,
            "Fetched Linear export"
        );
        Ok(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> OauthConfig {
        OauthConfig {
            client_id: "cid".into(),
            client_secret: "secret".into(),
            redirect_uri: "http://localhost:8080/linear/callback".into(),
        }
    }

    #[test]
    fn test_authorize_url_includes_scope_and_state() {
        let url = authorize_url(&config(), "uuid-as-state");
        assert!(url.contains("scope=read"));
        assert!(url.contains("state=uuid-as-state"));
        assert!(url.contains("response_type=code"));
    }

    #[tokio::test]
    async fn test_fetch_all_parses_export() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("authorization", "Bearer lin-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "viewer": {"id": "v1", "name": "Ada", "email": "ada@example.com"},
                    "teams": {"nodes": [{
                        "id": "team1",
                        "name": "Core",
                        "key": "COR",
                        "issues": {"nodes": [{
                            "id": "i1",
                            "title": "Fix sync",
                            "description": "sync drops updates",
                            "state": {"id": "s1", "name": "In Progress"},
                            "assignee": {"id": "u1", "name": "Ada", "email": null},
                            "project": {"id": "p1", "name": "Sync Engine"}
                        }]},
                        "projects": {"nodes": [{"id": "p1", "name": "Sync Engine", "description": null}]}
                    }]}
                }
            })))
            .mount(&server)
            .await;

        let client = LinearClient::with_url("lin-token", &server.uri()).unwrap();
        let export = client.fetch_all().await.unwrap();

        assert_eq!(export.viewer.name, "Ada");
        assert_eq!(export.teams.nodes[0].issues.nodes.len(), 1);

        let docs = export.to_documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].project.as_deref(), Some("Sync Engine"));
        assert_eq!(docs[0].section.as_deref(), Some("COR"));
        assert_eq!(docs[0].status.as_deref(), Some("In Progress"));
    }

    #[tokio::test]
    async fn test_graphql_errors_surface() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": null,
                "errors": [{"message": "not authorized"}]
            })))
            .mount(&server)
            .await;

        let client = LinearClient::with_url("bad", &server.uri()).unwrap();
        let err = client.fetch_all().await.unwrap_err();
        assert!(err.to_string().contains("not authorized"));
    }

    #[tokio::test]
    async fn test_issue_without_project_falls_back_to_team() {
        let export = LinearExport {
            viewer: Viewer {
                id: "v".into(),
                name: "Ada".into(),
                email: None,
            },
            teams: Nodes {
                nodes: vec![Team {
                    id: "t".into(),
                    name: "Core".into(),
                    key: "COR".into(),
                    issues: Nodes {
                        nodes: vec![Issue {
                            id: "i".into(),
                            title: "Orphan issue".into(),
                            description: None,
                            state: None,
                            assignee: None,
                            project: None,
                        }],
                    },
                    projects: Nodes::default(),
                }],
            },
        };

        let docs = export.to_documents();
        assert_eq!(docs[0].project.as_deref(), Some("Core"));
    }
}
