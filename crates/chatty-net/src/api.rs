//! REST client for the Chatty backend.
//!
//! The session is cookie based: the login/signup responses set an auth
//! cookie which the shared `reqwest::Client` replays on every later call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use chatty_shared::{
    AddContactRequest, AuthUser, ChatUser, Credentials, Message, MessageContent, ProfileUpdate,
    SignupDetails, UserId,
};

use crate::error::ApiError;

/// Backend operations the client core depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// `GET /auth/check`
    async fn check_auth(&self) -> Result<AuthUser, ApiError>;
    /// `POST /auth/signup`
    async fn signup(&self, details: &SignupDetails) -> Result<AuthUser, ApiError>;
    /// `POST /auth/login`
    async fn login(&self, credentials: &Credentials) -> Result<AuthUser, ApiError>;
    /// `POST /auth/logout`
    async fn logout(&self) -> Result<(), ApiError>;
    /// `PUT /auth/update-profile`
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ApiError>;
    /// `POST /auth/add-contact`
    async fn add_contact(&self, request: &AddContactRequest) -> Result<(), ApiError>;
    /// `GET /messages/users`
    async fn contacts(&self) -> Result<Vec<ChatUser>, ApiError>;
    /// `GET /messages/{peerId}`
    async fn messages(&self, peer: &UserId) -> Result<Vec<Message>, ApiError>;
    /// `POST /messages/send/{peerId}`
    async fn send_message(&self, peer: &UserId, content: &MessageContent)
        -> Result<Message, ApiError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// [`ChatApi`] over HTTP.
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;

        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn request<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint(path);
        debug!(%method, %url, "api request");

        let mut req = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message);
        warn!(%method, %url, status = status.as_u16(), ?message, "api request rejected");
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.request::<()>(Method::GET, path, None).await?;
        Ok(resp.json().await?)
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self.request(method, path, Some(body)).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn check_auth(&self) -> Result<AuthUser, ApiError> {
        self.get("auth/check").await
    }

    async fn signup(&self, details: &SignupDetails) -> Result<AuthUser, ApiError> {
        self.send(Method::POST, "auth/signup", details).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthUser, ApiError> {
        self.send(Method::POST, "auth/login", credentials).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.request::<()>(Method::POST, "auth/logout", None).await?;
        Ok(())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthUser, ApiError> {
        self.send(Method::PUT, "auth/update-profile", update).await
    }

    async fn add_contact(&self, request: &AddContactRequest) -> Result<(), ApiError> {
        self.request(Method::POST, "auth/add-contact", Some(request))
            .await?;
        Ok(())
    }

    async fn contacts(&self) -> Result<Vec<ChatUser>, ApiError> {
        self.get("messages/users").await
    }

    async fn messages(&self, peer: &UserId) -> Result<Vec<Message>, ApiError> {
        self.get(&format!("messages/{peer}")).await
    }

    async fn send_message(
        &self,
        peer: &UserId,
        content: &MessageContent,
    ) -> Result<Message, ApiError> {
        self.send(Method::POST, &format!("messages/send/{peer}"), content)
            .await
    }
}
