//! ClickUp REST integration.
//!
//! Walks teams -> spaces -> folders -> lists -> tasks, plus the folderless
//! lists each space carries. ClickUp's authorize flow carries no `state`
//! parameter and its Authorization header takes the raw token, no Bearer
//! prefix.

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::models::{OauthConfig, OauthToken, Platform, TaskDocument};

/// ClickUp OAuth authorize endpoint.
pub const AUTHORIZE_URL: &str = "https://app.clickup.com/api";

/// ClickUp OAuth token endpoint.
pub const TOKEN_URL: &str = "https://api.clickup.com/api/v2/oauth/token";

/// ClickUp REST API base.
const CLICKUP_API_URL: &str = "https://api.clickup.com/api/v2";

/// Build the authorize URL the user is redirected to.
pub fn authorize_url(config: &OauthConfig) -> String {
    format!(
        "{AUTHORIZE_URL}?client_id={}&redirect_uri={}",
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri),
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
        ("code", code),
        ("redirect_uri", config.redirect_uri.as_str()),
    ];

    let response = reqwest::Client::new()
        .post(token_url)
        .form(&params)
        .send()
        .await
        .context("Failed to send token request to ClickUp")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("ClickUp token exchange failed ({status}): {body}"));
    }

    response
        .json()
        .await
        .context("Failed to parse ClickUp token response")
}

/// ClickUp team (workspace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// ClickUp space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
}

/// ClickUp folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
}

/// ClickUp list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub name: String,
}

/// Task status wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub status: String,
}

/// Task assignee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignee {
    pub id: i64,
    pub username: String,
}

/// ClickUp task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A list with its tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListData {
    pub list: List,
    pub tasks: Vec<Task>,
}

/// A folder with its lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderData {
    pub folder: Folder,
    pub lists: Vec<ListData>,
}

/// A space with folders and folderless lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceData {
    pub space: Space,
    pub folders: Vec<FolderData>,
    pub lists: Vec<ListData>,
}

/// A team with its spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamData {
    pub team: Team,
    pub spaces: Vec<SpaceData>,
}

/// Everything fetched for one ClickUp account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickUpExport {
    pub teams: Vec<TeamData>,
}

impl ClickUpExport {
    /// Flatten the export into retrieval documents.
    pub fn to_documents(&self) -> Vec<TaskDocument> {
        fn list_docs(space: &Space, list_data: &ListData, out: &mut Vec<TaskDocument>) {
            for task in &list_data.tasks {
                out.push(TaskDocument {
                    platform: Platform::ClickUp,
                    project: Some(list_data.list.name.clone()),
                    section: Some(space.name.clone()),
                    title: task.name.clone(),
                    body: task.text_content.clone().filter(|t| !t.is_empty()),
                    status: task.status.as_ref().map(|s| s.status.clone()),
                    assignee: task.assignees.first().map(|a| a.username.clone()),
                    url: task.url.clone(),
                });
            }
        }

        let mut docs = Vec::new();
        for team_data in &self.teams {
            for space_data in &team_data.spaces {
                for folder_data in &space_data.folders {
                    for list_data in &folder_data.lists {
                        list_docs(&space_data.space, list_data, &mut docs);
                    }
                }
                for list_data in &space_data.lists {
                    list_docs(&space_data.space, list_data, &mut docs);
                }
            }
        }
        docs
    }
}

#[derive(Debug, Deserialize)]
struct TeamsResponse {
    teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
struct SpacesResponse {
    spaces: Vec<Space>,
}

#[derive(Debug, Deserialize)]
struct FoldersResponse {
    folders: Vec<Folder>,
}

#[derive(Debug, Deserialize)]
struct ListsResponse {
    lists: Vec<List>,
}

#[derive(Debug, Deserialize)]
struct TasksPage {
    tasks: Vec<Task>,
    #[serde(default)]
    last_page: Option<bool>,
}

/// ClickUp REST client.
#[derive(Debug, Clone)]
pub struct ClickUpClient {
    client: reqwest::Client,
    api_url: String,
}

impl ClickUpClient {
    /// Create a client with an OAuth access token.
    pub fn new(access_token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // ClickUp wants the bare token, not "Bearer <token>"
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(access_token).context("Invalid access token")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: CLICKUP_API_URL.to_string(),
        })
    }

    /// Create a client with a custom API URL (for testing).
    pub fn with_url(access_token: &str, api_url: &str) -> Result<Self> {
        let mut client = Self::new(access_token)?;
        client.api_url = api_url.to_string();
        Ok(client)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.api_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request to ClickUp: {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("ClickUp API returned {status} for {path}: {body}"));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse ClickUp response for {path}"))
    }

    /// GET, logging and yielding `None` on failure.
    async fn try_get<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        match self.get(path).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path, error = %e, "Skipping ClickUp resource");
                None
            }
        }
    }

    /// List teams visible to the token.
    #[instrument(skip(self))]
    pub async fn teams(&self) -> Result<Vec<Team>> {
        Ok(self.get::<TeamsResponse>("/team").await?.teams)
    }

    /// Fetch all tasks in a list, following `page` pagination.
    async fn list_tasks(&self, list_id: &str) -> Vec<Task> {
        let mut tasks = Vec::new();
        let mut page = 0u32;

        loop {
            let Some(response) = self
                .try_get::<TasksPage>(&format!("/list/{list_id}/task?page={page}"))
                .await
            else {
                break;
            };

            let batch_empty = response.tasks.is_empty();
            tasks.extend(response.tasks);

            if batch_empty || response.last_page.unwrap_or(false) {
                break;
            }
            page += 1;
        }

        tasks
    }

    async fn fetch_list(&self, list: List) -> ListData {
        let tasks = self.list_tasks(&list.id).await;
        ListData { list, tasks }
    }

    /// Fetch the full team/space/folder/list/task hierarchy.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<ClickUpExport> {
        let teams = self.teams().await?;
        let mut team_data = Vec::new();

        for team in teams {
            let spaces = self
                .try_get::<SpacesResponse>(&format!("/team/{}/space", team.id))
                .await
                .map(|r| r.spaces)
                .unwrap_or_default();

            let mut space_data = Vec::new();
            for space in spaces {
                let folders = self
                    .try_get::<FoldersResponse>(&format!("/space/{}/folder", space.id))
                    .await
                    .map(|r| r.folders)
                    .unwrap_or_default();

                let mut folder_data = Vec::new();
                for folder in folders {
                    let lists = self
                        .try_get::<ListsResponse>(&format!("/folder/{}/list", folder.id))
                        .await
                        .map(|r| r.lists)
                        .unwrap_or_default();

                    let mut list_data = Vec::new();
                    for list in lists {
                        list_data.push(self.fetch_list(list).await);
                    }
                    folder_data.push(FolderData {
                        folder,
                        lists: list_data,
                    });
                }

                // Folderless lists hang directly off the space
                let folderless = self
                    .try_get::<ListsResponse>(&format!("/space/{}/list", space.id))
                    .await
                    .map(|r| r.lists)
                    .unwrap_or_default();

                let mut lists = Vec::new();
                for list in folderless {
                    lists.push(self.fetch_list(list).await);
                }

                debug!(
                    space = %space.name,
                    folders = folder_data.len(),
                    folderless_lists = lists.len(),
                    "Fetched ClickUp space"
                );

                space_data.push(SpaceData {
                    space,
                    folders: folder_data,
                    lists,
                });
            }

            team_data.push(TeamData {
                team,
                spaces: space_data,
            });
        }

        Ok(ClickUpExport { teams: team_data })
    }
}
