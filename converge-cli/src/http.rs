//! HTTP transport for the resource API.
//!
//! Collections map to `{endpoint}/{collection}` and objects to
//! `{endpoint}/{collection}/{native_id}`. Full updates are sent as `PUT`,
//! incremental ones as `PATCH`.

use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use converge_core::{RemoteApi, RemoteError, RequestKind, WireRequest, WireResponse};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpRemote {
    client: Client,
    endpoint: Url,
    token: Option<String>,
    /// JSON pointer to the native id in a create response.
    id_pointer: String,
}

impl HttpRemote {
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        id_pointer: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint).with_context(|| format!("invalid endpoint {endpoint}"))?;
        if endpoint.cannot_be_a_base() {
            bail!("endpoint {endpoint} cannot be used as a base URL");
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            token,
            id_pointer: id_pointer.into(),
        })
    }

    fn url(&self, collection: &str, native_id: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(collection);
            if let Some(id) = native_id {
                segments.push(id);
            }
        }
        url
    }

    /// Send a request and return the parsed body, `None` if it was empty.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Option<Value>, RemoteError> {
        debug!(%method, %url, "remote request");
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        check_status(status, &text)?;

        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RemoteError::Api {
                status: Some(status.as_u16()),
                message: format!("invalid JSON response: {e}"),
            })
    }
}

fn check_status(status: StatusCode, body: &str) -> Result<(), RemoteError> {
    if status.is_success() {
        return Ok(());
    }
    let message = match body.trim() {
        "" => status.to_string(),
        text => text.to_string(),
    };
    Err(match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::PermissionDenied(message),
        _ => RemoteError::Api {
            status: Some(status.as_u16()),
            message,
        },
    })
}

fn native_id_at(body: &Value, pointer: &str) -> Option<String> {
    match body.pointer(pointer)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn create_object(
        &self,
        collection: &str,
        request: &WireRequest,
    ) -> Result<String, RemoteError> {
        let url = self.url(collection, None);
        let body = self.send(Method::POST, url, Some(&request.body)).await?;
        body.as_ref()
            .and_then(|body| native_id_at(body, &self.id_pointer))
            .ok_or_else(|| RemoteError::Api {
                status: None,
                message: format!("create response has no id at {}", self.id_pointer),
            })
    }

    async fn get_object(
        &self,
        collection: &str,
        native_id: &str,
    ) -> Result<WireResponse, RemoteError> {
        let url = self.url(collection, Some(native_id));
        match self.send(Method::GET, url, None).await? {
            Some(body) => Ok(WireResponse::new(body)),
            None => Err(RemoteError::Api {
                status: None,
                message: "empty get response".to_string(),
            }),
        }
    }

    async fn update_object(
        &self,
        collection: &str,
        native_id: &str,
        request: &WireRequest,
    ) -> Result<(), RemoteError> {
        let method = match request.kind {
            RequestKind::Full => Method::PUT,
            RequestKind::Incremental => Method::PATCH,
        };
        let url = self.url(collection, Some(native_id));
        self.send(method, url, Some(&request.body)).await?;
        Ok(())
    }

    async fn delete_object(&self, collection: &str, native_id: &str) -> Result<(), RemoteError> {
        let url = self.url(collection, Some(native_id));
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote(endpoint: &str) -> HttpRemote {
        HttpRemote::new(endpoint, None, "/data/id").unwrap()
    }

    #[test]
    fn test_url_building() {
        let remote = remote("https://api.example.com/v1/");
        assert_eq!(
            remote.url("Teams", None).as_str(),
            "https://api.example.com/v1/Teams"
        );
        assert_eq!(
            remote.url("Teams", Some("t-1")).as_str(),
            "https://api.example.com/v1/Teams/t-1"
        );

        let remote = self::remote("https://api.example.com");
        assert_eq!(
            remote.url("CloudAccounts", Some("a/b")).as_str(),
            "https://api.example.com/CloudAccounts/a%2Fb"
        );
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(HttpRemote::new("not a url", None, "/data/id").is_err());
        assert!(HttpRemote::new("mailto:ops@example.com", None, "/data/id").is_err());
    }

    #[test]
    fn test_status_classification() {
        assert!(check_status(StatusCode::OK, "").is_ok());
        assert!(check_status(StatusCode::NO_CONTENT, "").is_ok());
        assert!(
            check_status(StatusCode::NOT_FOUND, "")
                .unwrap_err()
                .is_not_found()
        );
        assert!(
            check_status(StatusCode::FORBIDDEN, "denied")
                .unwrap_err()
                .is_permission_denied()
        );
        assert!(
            check_status(StatusCode::UNAUTHORIZED, "")
                .unwrap_err()
                .is_permission_denied()
        );
        assert_eq!(
            check_status(StatusCode::CONFLICT, " name taken ").unwrap_err(),
            RemoteError::Api {
                status: Some(409),
                message: "name taken".to_string(),
            }
        );
    }

    #[test]
    fn test_native_id_from_create_response() {
        assert_eq!(
            native_id_at(&json!({ "data": { "id": "acct-1" } }), "/data/id"),
            Some("acct-1".to_string())
        );
        assert_eq!(
            native_id_at(&json!({ "id": 42 }), "/id"),
            Some("42".to_string())
        );
        assert_eq!(native_id_at(&json!({ "data": { "id": "" } }), "/data/id"), None);
        assert_eq!(native_id_at(&json!({ "data": {} }), "/data/id"), None);
    }
}
