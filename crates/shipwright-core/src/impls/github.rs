//! GitHubClient - GitHub REST API による ArtifactStore + HostingApi
//!
//! # 使う endpoint
//! - `GET  /user`                                  owner 名（設定がなければ 1 回だけ）
//! - `POST /user/repos`                            repository 作成（422 = 既存）
//! - `GET  /repos/{owner}/{repo}`                  repository 取得（404 = なし）
//! - `GET  /repos/{full}/contents/{path}?ref=main` ファイルの sha
//! - `PUT  /repos/{full}/contents/{path}`          作成 / 条件付き更新
//! - `GET  /repos/{full}/commits?sha=main&per_page=1`
//! - `POST /repos/{full}/pages`, `GET /repos/{full}/pages`

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::{Client, IntoUrl, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::GitHubConfig;
use crate::domain::{Commit, DEFAULT_BRANCH, RemoteFile, Repository};
use crate::ports::{ArtifactStore, FileWrite, HostingApi, HostingError, StoreError};

const USER_AGENT: &str = concat!("shipwright/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

pub struct GitHubClient {
    client: Client,
    token: String,
    api_url: String,
    owner: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    full_name: String,
    html_url: String,
}

impl From<RepoResponse> for Repository {
    fn from(r: RepoResponse) -> Self {
        Repository {
            name: r.name,
            full_name: r.full_name,
            html_url: r.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    path: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PagesRequest<'a> {
    source: PagesSource<'a>,
}

#[derive(Debug, Serialize)]
struct PagesSource<'a> {
    branch: &'a str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    html_url: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        let owner = match &config.owner {
            Some(owner) => OnceCell::new_with(Some(owner.clone())),
            None => OnceCell::new(),
        };
        Self {
            client: Client::new(),
            token: config.token.clone(),
            api_url: config.api_url.clone(),
            owner,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.request_url(method, format!("{}{}", self.api_url, path))
    }

    fn request_url(&self, method: reqwest::Method, url: impl IntoUrl) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    /// `/repos/{full}/contents/{path}` with `path` as one encoded segment,
    /// so `#` and `?` in file names stay part of the name.
    fn contents_url(&self, repo: &Repository, path: &str) -> Result<Url, StoreError> {
        let base = format!("{}/repos/{}/contents", self.api_url, repo.full_name);
        let mut url = Url::parse(&base).map_err(|e| StoreError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport(format!("cannot be a base url: {base}")))?
            .push(path);
        Ok(url)
    }

    async fn owner(&self) -> Result<&str, StoreError> {
        let owner = self
            .owner
            .get_or_try_init(|| async {
                let response = self
                    .send(self.request(reqwest::Method::GET, "/user"))
                    .await?;
                let user: UserResponse = decode(ensure_success(response).await?).await?;
                debug!(owner = %user.login, "resolved repository owner");
                Ok::<_, StoreError>(user.login)
            })
            .await?;
        Ok(owner.as_str())
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl ArtifactStore for GitHubClient {
    async fn create_repository(&self, name: &str) -> Result<Repository, StoreError> {
        let response = self
            .send(
                self.request(reqwest::Method::POST, "/user/repos")
                    .json(&CreateRepoRequest {
                        name,
                        private: false,
                    }),
            )
            .await?;
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        let repo: RepoResponse = decode(ensure_success(response).await?).await?;
        Ok(repo.into())
    }

    async fn get_repository(&self, name: &str) -> Result<Option<Repository>, StoreError> {
        let owner = self.owner().await?;
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("/repos/{owner}/{name}")))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let repo: RepoResponse = decode(ensure_success(response).await?).await?;
        Ok(Some(repo.into()))
    }

    async fn get_file(
        &self,
        repo: &Repository,
        path: &str,
    ) -> Result<Option<RemoteFile>, StoreError> {
        let response = self
            .send(
                self.request_url(reqwest::Method::GET, self.contents_url(repo, path)?)
                    .query(&[("ref", DEFAULT_BRANCH)]),
            )
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let file: ContentResponse = decode(ensure_success(response).await?).await?;
        Ok(Some(RemoteFile {
            path: file.path,
            sha: file.sha,
        }))
    }

    async fn put_file(&self, repo: &Repository, write: FileWrite<'_>) -> Result<(), StoreError> {
        let body = PutContentRequest {
            message: &write.message,
            content: BASE64_STANDARD.encode(write.content),
            branch: DEFAULT_BRANCH,
            sha: write.sha,
        };
        let response = self
            .send(
                self.request_url(reqwest::Method::PUT, self.contents_url(repo, write.path)?)
                    .json(&body),
            )
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn latest_commit(&self, repo: &Repository) -> Result<Commit, StoreError> {
        let response = self
            .send(
                self.request(
                    reqwest::Method::GET,
                    &format!("/repos/{}/commits", repo.full_name),
                )
                .query(&[("sha", DEFAULT_BRANCH), ("per_page", "1")]),
            )
            .await?;
        let commits: Vec<CommitResponse> = decode(ensure_success(response).await?).await?;
        commits
            .into_iter()
            .next()
            .map(|c| Commit { sha: c.sha })
            .ok_or_else(|| StoreError::Decode(format!("no commits on {}", repo.full_name)))
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn enable(&self, repo: &Repository) -> Result<Option<String>, HostingError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/pages", repo.full_name),
            )
            .json(&PagesRequest {
                source: PagesSource {
                    branch: DEFAULT_BRANCH,
                    path: "/",
                },
            })
            .send()
            .await
            .map_err(|e| HostingError::Transport(e.to_string()))?;
        if response.status() != StatusCode::CREATED {
            return Err(HostingError::Status {
                status: response.status().as_u16(),
            });
        }
        let pages: PagesResponse = response
            .json()
            .await
            .map_err(|e| HostingError::Transport(e.to_string()))?;
        Ok(pages.html_url)
    }

    async fn status(&self, repo: &Repository) -> Result<Option<String>, HostingError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/repos/{}/pages", repo.full_name),
            )
            .send()
            .await
            .map_err(|e| HostingError::Transport(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(HostingError::Status {
                status: response.status().as_u16(),
            });
        }
        let pages: PagesResponse = response
            .json()
            .await
            .map_err(|e| HostingError::Transport(e.to_string()))?;
        Ok(pages.html_url)
    }
}
