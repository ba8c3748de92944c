//! Microsoft To Do client over the Graph REST API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    BodyType, ExternalList, ExternalTask, Importance, Provider, ProviderError, RemoteStatus, TaskBody, TaskWrite,
    ZonedDateTime,
};
use crate::constants::{MSTODO_SOURCE, PREFER_UTC_HEADER};

/// Upper bound on followed `@odata.nextLink` pages for one listing.
const MAX_PAGES: usize = 500;

#[derive(Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireList {
    id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTask {
    id: String,
    #[serde(default)]
    title: String,
    body: Option<WireBody>,
    status: Option<String>,
    importance: Option<String>,
    due_date_time: Option<ZonedDateTime>,
    completed_date_time: Option<ZonedDateTime>,
    last_modified_date_time: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTaskWrite<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<WireBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    importance: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date_time: Option<&'a Option<ZonedDateTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_date_time: Option<&'a Option<ZonedDateTime>>,
}

impl<'a> From<&'a TaskWrite> for WireTaskWrite<'a> {
    fn from(write: &'a TaskWrite) -> Self {
        Self {
            title: write.title.as_deref(),
            body: write.body.as_ref().map(|body| WireBody {
                content: Some(body.content.clone()),
                content_type: Some(match body.content_type {
                    BodyType::Text => "text".to_string(),
                    BodyType::Html => "html".to_string(),
                }),
            }),
            status: write.status.as_ref().map(RemoteStatus::as_wire),
            importance: write.importance.as_ref().map(Importance::as_wire),
            due_date_time: write.due.as_ref(),
            completed_date_time: write.completed.as_ref(),
        }
    }
}

impl WireTask {
    /// Decode one listed item on its own so a malformed item does not take
    /// the rest of its page down with it.
    fn decode_listed(value: serde_json::Value, list_id: &str) -> ExternalTask {
        let id = value
            .get("id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<WireTask>(value) {
            Ok(wire) => wire.into_external(list_id),
            Err(e) => {
                warn!("Task {id:?} in list {list_id} could not be decoded: {e}");
                ExternalTask::undecodable(id, list_id, e.to_string())
            }
        }
    }

    fn into_external(self, list_id: &str) -> ExternalTask {
        let body = self
            .body
            .and_then(|b| {
                let content = b.content.filter(|c| !c.is_empty())?;
                Some((content, b.content_type.unwrap_or_default()))
            })
            .map(|(content, content_type)| TaskBody {
                content,
                content_type: if content_type.eq_ignore_ascii_case("html") {
                    BodyType::Html
                } else {
                    BodyType::Text
                },
            });

        let mut decode_error = None;
        let last_modified = match self.last_modified_date_time.as_deref() {
            Some(raw) => match raw.parse::<DateTime<Utc>>() {
                Ok(stamp) => Some(stamp),
                Err(e) => {
                    warn!("Task {} carries an unreadable lastModifiedDateTime {raw:?}: {e}", self.id);
                    decode_error = Some(format!("invalid lastModifiedDateTime {raw:?}"));
                    None
                }
            },
            None => None,
        };

        ExternalTask {
            id: self.id,
            list_id: list_id.to_string(),
            title: self.title,
            body,
            status: RemoteStatus::from_wire(self.status.as_deref().unwrap_or("notStarted")),
            importance: Importance::from_wire(self.importance.as_deref().unwrap_or("normal")),
            due: self.due_date_time,
            completed: self.completed_date_time,
            last_modified,
            decode_error,
        }
    }
}

/// Graph To Do client. Holds no credentials; each call carries a token.
pub struct MsTodoClient {
    http: Client,
    base_url: Url,
}

impl MsTodoClient {
    /// Client rooted at `base_url` (for example `https://graph.microsoft.com/v1.0`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url).map_err(|e| ProviderError::InvalidData(format!("base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::InvalidData(format!("base url {base_url} cannot hold a path")));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(token)
            .header("Prefer", PREFER_UTC_HEADER)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, ProviderError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Unavailable(format!("{what}: request timed out"))
            } else {
                ProviderError::Unavailable(format!("{what}: {}", e.without_url()))
            }
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ProviderError::Unauthorized),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(what.to_string())),
            status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                Err(ProviderError::Unavailable(format!("{what}: status {status}")))
            }
            status => {
                warn!("{what} rejected with status {status}");
                Err(ProviderError::Rejected {
                    status: status.as_u16(),
                })
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ProviderError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidData(format!("{what}: {}", e.without_url())))
    }

    /// Follow `@odata.nextLink` until the listing is exhausted.
    async fn fetch_all<T: DeserializeOwned>(&self, token: &str, first: Url, what: &str) -> Result<Vec<T>, ProviderError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(ProviderError::InvalidData(format!("{what}: more than {MAX_PAGES} pages")));
            }

            let response = self.send(self.request(Method::GET, url, token), what).await?;
            let page: Page<T> = Self::decode(response, what).await?;
            items.extend(page.value);

            next = match page.next_link {
                Some(link) => Some(
                    Url::parse(&link).map_err(|e| ProviderError::InvalidData(format!("{what}: next link: {e}")))?,
                ),
                None => None,
            };
        }

        debug!("{what}: {} items over {pages} pages", items.len());
        Ok(items)
    }
}

#[async_trait]
impl Provider for MsTodoClient {
    fn source_tag(&self) -> &str {
        MSTODO_SOURCE
    }

    async fn fetch_lists(&self, token: &str) -> Result<Vec<ExternalList>, ProviderError> {
        let url = self.endpoint(&["me", "todo", "lists"]);
        let lists: Vec<WireList> = self.fetch_all(token, url, "list enumeration").await?;
        Ok(lists
            .into_iter()
            .map(|l| ExternalList {
                id: l.id,
                display_name: l.display_name,
            })
            .collect())
    }

    async fn fetch_tasks(&self, token: &str, list_id: &str) -> Result<Vec<ExternalTask>, ProviderError> {
        let url = self.endpoint(&["me", "todo", "lists", list_id, "tasks"]);
        let items: Vec<serde_json::Value> = self.fetch_all(token, url, "task listing").await?;
        Ok(items
            .into_iter()
            .map(|item| WireTask::decode_listed(item, list_id))
            .collect())
    }

    async fn create_list(&self, token: &str, display_name: &str) -> Result<ExternalList, ProviderError> {
        let url = self.endpoint(&["me", "todo", "lists"]);
        let request = self
            .request(Method::POST, url, token)
            .json(&serde_json::json!({ "displayName": display_name }));
        let response = self.send(request, "list creation").await?;
        let list: WireList = Self::decode(response, "list creation").await?;
        Ok(ExternalList {
            id: list.id,
            display_name: list.display_name,
        })
    }

    async fn create_task(&self, token: &str, list_id: &str, task: &TaskWrite) -> Result<ExternalTask, ProviderError> {
        let url = self.endpoint(&["me", "todo", "lists", list_id, "tasks"]);
        let request = self.request(Method::POST, url, token).json(&WireTaskWrite::from(task));
        let response = self.send(request, "task creation").await?;
        let created: WireTask = Self::decode(response, "task creation").await?;
        Ok(created.into_external(list_id))
    }

    async fn update_task(
        &self,
        token: &str,
        list_id: &str,
        task_id: &str,
        patch: &TaskWrite,
    ) -> Result<ExternalTask, ProviderError> {
        let url = self.endpoint(&["me", "todo", "lists", list_id, "tasks", task_id]);
        let request = self.request(Method::PATCH, url, token).json(&WireTaskWrite::from(patch));
        let response = self.send(request, "task update").await?;
        let updated: WireTask = Self::decode(response, "task update").await?;
        Ok(updated.into_external(list_id))
    }
}
