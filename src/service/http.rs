use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};

use super::PersistenceService;
use crate::error::{Error, Result};
use crate::server::dto::DraftRequest;
use crate::types::{Application, Draft, FormData, Progress};

/// HTTP implementation of [`PersistenceService`] against the enrollment API.
///
/// The server identifies the owner from the bearer token, so `owner_id`
/// arguments only need to name the same account the token belongs to.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    error: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let resp = request.bearer_auth(&self.token).send().await?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(error_from_response(resp).await)
        }
    }

    async fn data<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = self.send(request).await?;
        let api_resp: ApiResponse<T> = resp.json().await?;
        api_resp
            .data
            .ok_or_else(|| Error::Remote("Server returned an empty response".into()))
    }
}

async fn error_from_response(resp: Response) -> Error {
    let status = resp.status();
    let message = resp
        .json::<ApiResponse<()>>()
        .await
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| "Server error (no details provided)".into());

    match status {
        StatusCode::NOT_FOUND => Error::NotFound,
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::FORBIDDEN => Error::Forbidden,
        StatusCode::BAD_REQUEST => Error::BadRequest(message),
        StatusCode::CONFLICT => Error::Conflict(message),
        _ => Error::Remote(format!("{status}: {message}")),
    }
}

impl PersistenceService for ApiClient {
    async fn get_draft(&self, _owner_id: &str) -> Result<Option<Draft>> {
        match self.data(self.client.get(self.url("/draft"))).await {
            Ok(draft) => Ok(Some(draft)),
            Err(Error::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_draft(
        &self,
        _owner_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> Result<Draft> {
        let body = DraftRequest {
            form_data: form_data.clone(),
            progress: Some(*progress),
        };
        self.data(self.client.post(self.url("/draft")).json(&body))
            .await
    }

    async fn update_draft(
        &self,
        draft_id: &str,
        form_data: &FormData,
        progress: &Progress,
    ) -> Result<Draft> {
        let body = DraftRequest {
            form_data: form_data.clone(),
            progress: Some(*progress),
        };
        self.data(
            self.client
                .put(self.url(&format!("/drafts/{draft_id}")))
                .json(&body),
        )
        .await
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<()> {
        self.send(self.client.delete(self.url(&format!("/drafts/{draft_id}"))))
            .await?;
        Ok(())
    }

    async fn list_draft_applications(&self, _owner_id: &str) -> Result<Vec<Application>> {
        self.data(
            self.client
                .get(self.url("/applications"))
                .query(&[("status", "draft")]),
        )
        .await
    }

    async fn delete_application_documents(&self, application_id: &str) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/applications/{application_id}/documents"))),
        )
        .await?;
        Ok(())
    }

    async fn delete_application(&self, application_id: &str) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/applications/{application_id}"))),
        )
        .await?;
        Ok(())
    }
}
