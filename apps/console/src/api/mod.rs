use std::sync::Arc;

use anyhow::Context;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;
use crate::query::CardId;

pub type ClientResult<T> = Result<T, ClientError>;

/// Query parameters shared by both timeline endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimelineParams {
    #[serde(rename = "cardId", skip_serializing_if = "Option::is_none")]
    pub card_id: Option<CardId>,
    pub include: &'static str,
}

impl TimelineParams {
    pub const INCLUDE_EVENTS: &'static str = "events";

    pub fn with_events(card_id: Option<CardId>) -> Self {
        Self {
            card_id,
            include: Self::INCLUDE_EVENTS,
        }
    }
}

/// Read side of the timeline API.
#[allow(async_fn_in_trait)]
pub trait TimelineSource {
    /// Timelines scoped to a saved card.
    async fn card_timelines<T>(&self, card_id: CardId, params: &TimelineParams) -> ClientResult<Vec<T>>
    where
        T: DeserializeOwned;

    /// Every timeline visible to the current user.
    async fn all_timelines<T>(&self, params: &TimelineParams) -> ClientResult<Vec<T>>
    where
        T: DeserializeOwned;
}

#[derive(Clone)]
pub struct ApiClient {
    inner: reqwest::Client,
    config: Arc<AppConfig>,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: AppConfig) -> ClientResult<Self> {
        let base_url = normalize_base_url(&config.api_base_url);

        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.request_timeout);

        let client = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            inner: client,
            config: Arc::new(config),
            base_url,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = self.join_path(path);
        let mut builder = self.inner.request(method, url);

        if let Some(token) = self.config.bearer_token() {
            builder = builder.header(header::AUTHORIZATION, token);
        }

        builder.header(header::ACCEPT, "application/json")
    }

    fn join_path(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T>(&self, builder: reqwest::RequestBuilder) -> ClientResult<T>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await.map_err(ClientError::from)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ClientError::from)?;
        decode_response(status, &bytes)
    }
}

impl TimelineSource for ApiClient {
    async fn card_timelines<T>(&self, card_id: CardId, params: &TimelineParams) -> ClientResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = format!("card/{card_id}/timelines");
        let builder = self
            .request(Method::GET, &path)
            .query(&[("include", params.include)]);
        self.send(builder).await
    }

    async fn all_timelines<T>(&self, params: &TimelineParams) -> ClientResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let builder = self.request(Method::GET, "timeline").query(params);
        self.send(builder).await
    }
}

/// Maps a raw response onto the client's error model. Failures carry the
/// server's `message` when the body has one.
fn decode_response<T>(status: StatusCode, bytes: &[u8]) -> ClientResult<T>
where
    T: DeserializeOwned,
{
    if bytes.is_empty() {
        return Err(ClientError::EmptyResponse(status));
    }

    if status.is_success() {
        return serde_json::from_slice(bytes).map_err(ClientError::from);
    }

    match serde_json::from_slice::<ApiErrorBody>(bytes) {
        Ok(body) => Err(ClientError::Api(body.with_status(status))),
        Err(_) => Err(ClientError::UnexpectedStatus {
            status,
            body: bytes.to_vec(),
        }),
    }
}

fn normalize_base_url(input: &str) -> String {
    input.trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub errors: Option<Value>,
    #[serde(skip)]
    pub status: Option<StatusCode>,
}

impl ApiErrorBody {
    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({status})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("api error: {0}")]
    Api(ApiErrorBody),
    #[error("empty response body: {0}")]
    EmptyResponse(StatusCode),
    #[error("unexpected status {status}: {body:?}")]
    UnexpectedStatus { status: StatusCode, body: Vec<u8> },
    #[error("client setup failed: {0:#}")]
    Build(#[from] anyhow::Error),
    #[error("api client is not configured")]
    NotConfigured,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(body) => body.status,
            Self::EmptyResponse(status) => Some(*status),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_successful_array() {
        let body = br#"["Response for all timelines"]"#;
        let decoded: Vec<String> = decode_response(StatusCode::OK, body).unwrap();
        assert_eq!(decoded, vec!["Response for all timelines".to_string()]);
    }

    #[test]
    fn surfaces_api_message_on_failure() {
        let body = br#"{"message": "You don't have permissions to do that."}"#;
        let err = decode_response::<Vec<String>>(StatusCode::FORBIDDEN, body).unwrap_err();
        assert!(matches!(err, ClientError::Api(ref b) if b.message.contains("permissions")));
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn keeps_raw_body_when_failure_is_not_json() {
        let err = decode_response::<Vec<String>>(StatusCode::BAD_GATEWAY, b"<html>").unwrap_err();
        match err {
            ClientError::UnexpectedStatus { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, b"<html>".to_vec());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_and_malformed_bodies_are_errors() {
        let empty = decode_response::<Vec<String>>(StatusCode::NO_CONTENT, b"").unwrap_err();
        assert_eq!(empty.status(), Some(StatusCode::NO_CONTENT));

        let malformed = decode_response::<Vec<String>>(StatusCode::OK, b"{\"id\":1}").unwrap_err();
        assert!(matches!(malformed, ClientError::Decode(_)));
    }

    #[test]
    fn builds_urls_against_normalized_base() {
        let client = ApiClient::new(AppConfig {
            api_base_url: "http://localhost:3000/api/".into(),
            ..AppConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.join_path("/card/1/timelines"),
            "http://localhost:3000/api/card/1/timelines"
        );
    }

    #[test]
    fn all_timelines_params_omit_missing_card() {
        let params = TimelineParams::with_events(None);
        let encoded = serde_json::to_value(&params).unwrap();
        assert_eq!(encoded, serde_json::json!({"include": "events"}));

        let scoped = serde_json::to_value(TimelineParams::with_events(Some(4))).unwrap();
        assert_eq!(scoped, serde_json::json!({"cardId": 4, "include": "events"}));
    }
}
