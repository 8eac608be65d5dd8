//! JSON over HTTP.

use async_trait::async_trait;
use playground_proto::{
    AuthResponse, LoginRequest, RegisterRequest, RoomDetail, RoomId, RoomSummary, UserResponse,
};
use reqwest::{Client, Method, RequestBuilder, Response, header::AUTHORIZATION};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::Api;
use crate::{config::ClientConfig, credential::CredentialReader, error::TransportError};

/// [`Api`] over HTTP with a cookie store for the refresh cookie.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: Client,
    base: Url,
    credentials: CredentialReader,
}

impl HttpApi {
    /// Build a client for `config.api_base_url`.
    pub fn new(config: &ClientConfig, credentials: CredentialReader) -> Result<Self, TransportError> {
        let mut base = Url::parse(&config.api_base_url).map_err(|e| TransportError::InvalidUrl {
            url: config.api_base_url.clone(),
            reason: e.to_string(),
        })?;
        // Relative joins must not drop the last path segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .cookie_store(true)
            .build()
            .map_err(TransportError::from)?;

        Ok(Self { http, base, credentials })
    }

    /// Base URL all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base.join(path).map_err(|e| TransportError::InvalidUrl {
            url: format!("{}{path}", self.base),
            reason: e.to_string(),
        })
    }

    fn room_endpoint(&self, room_id: &RoomId) -> Result<Url, TransportError> {
        let mut url = self.endpoint("rooms/")?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl {
                url: self.base.to_string(),
                reason: "base cannot carry path segments".to_string(),
            })?
            .pop_if_empty()
            .push(room_id.as_str());
        Ok(url)
    }

    /// Send with the bearer attached at this moment.
    async fn send(&self, request: RequestBuilder, gated: bool) -> Result<Response, TransportError> {
        let (generation, bearer) = self.credentials.current();
        let request = match bearer {
            Some(bearer) => request.header(AUTHORIZATION, bearer),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if gated && status.as_u16() == 401 {
            self.credentials.report_unauthorized(generation);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        debug!(status = status.as_u16(), %message, "request rejected");
        Err(TransportError::Status { status: status.as_u16(), message })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        gated: bool,
    ) -> Result<T, TransportError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = self.send(request, gated).await?;
        response.json::<T>().await.map_err(|e| TransportError::Decode { reason: e.to_string() })
    }
}

/// Extract a human readable message from an error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

fn json_body<T: Serialize>(body: &T) -> Result<Value, TransportError> {
    serde_json::to_value(body).map_err(|e| TransportError::Decode { reason: e.to_string() })
}

#[async_trait]
impl Api for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, TransportError> {
        let url = self.endpoint("auth/login")?;
        self.call(Method::POST, url, Some(json_body(request)?), false).await
    }

    async fn guest_login(&self) -> Result<AuthResponse, TransportError> {
        let url = self.endpoint("auth/guest")?;
        self.call(Method::POST, url, None, false).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, TransportError> {
        let url = self.endpoint("auth/register")?;
        self.call(Method::POST, url, Some(json_body(request)?), false).await
    }

    async fn refresh(&self) -> Result<AuthResponse, TransportError> {
        let url = self.endpoint("auth/refresh")?;
        self.call(Method::POST, url, None, false).await
    }

    async fn logout(&self) -> Result<(), TransportError> {
        let url = self.endpoint("auth/logout")?;
        let response = self.send(self.http.post(url), false).await?;
        if let Err(err) = response.bytes().await {
            warn!(%err, "logout body unreadable");
        }
        Ok(())
    }

    async fn identity(&self) -> Result<UserResponse, TransportError> {
        let url = self.endpoint("auth/me")?;
        self.call(Method::GET, url, None, true).await
    }

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, TransportError> {
        let url = self.endpoint("rooms/")?;
        self.call(Method::GET, url, None, true).await
    }

    async fn room_detail(&self, room_id: &RoomId) -> Result<RoomDetail, TransportError> {
        let url = self.room_endpoint(room_id)?;
        self.call(Method::GET, url, None, true).await
    }
}
