//! HTTP client for the reader backend
//!
//! Implements every collaborator trait against the backend's REST API:
//!
//! - `GET    /api/books/{book_id}/chapters/{index}`
//! - `POST   /api/highlights`
//! - `DELETE /api/highlights/{id}`
//! - `GET    /api/books/{book_id}/progress`
//! - `PUT    /api/books/{book_id}/progress`
//! - `POST   /api/ai/analyze`

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::types::{AnalysisRequest, AnalysisResult, CreateHighlightRequest, HighlightResponse, ProgressResponse};
use super::{AnalysisService, ChapterSource, HighlightService, ProgressService};
use crate::chapter::Chapter;
use crate::config::BackendConfig;
use crate::error::ServiceError;
use crate::highlights::HighlightId;
use crate::position::ReadingPosition;

/// Backend REST client
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chapter_url(&self, book_id: &str, chapter_index: usize) -> String {
        self.url(&format!(
            "/api/books/{}/chapters/{}",
            urlencoding::encode(book_id),
            chapter_index
        ))
    }

    fn progress_url(&self, book_id: &str) -> String {
        self.url(&format!("/api/books/{}/progress", urlencoding::encode(book_id)))
    }
}

/// Fail on non-2xx, keeping the body for diagnostics
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ServiceError> {
    let bytes = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ChapterSource for BackendClient {
    async fn get_chapter(&self, book_id: &str, chapter_index: usize) -> Result<Chapter, ServiceError> {
        let response = self
            .client
            .get(self.chapter_url(book_id, chapter_index))
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl HighlightService for BackendClient {
    async fn create(&self, request: &CreateHighlightRequest) -> Result<HighlightId, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/highlights"))
            .json(request)
            .send()
            .await?;
        let created: HighlightResponse = decode(response).await?;
        Ok(created.id)
    }

    async fn delete(&self, id: HighlightId) -> Result<(), ServiceError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/highlights/{}", id)))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressService for BackendClient {
    /// The backend creates a default record on first read, so a 404 here
    /// means the book itself is unknown
    async fn get(&self, book_id: &str) -> Result<Option<ReadingPosition>, ServiceError> {
        let response = self.client.get(self.progress_url(book_id)).send().await?;
        let progress: ProgressResponse = decode(response).await?;
        Ok(Some(progress.position))
    }

    async fn put(&self, book_id: &str, position: &ReadingPosition) -> Result<(), ServiceError> {
        let response = self
            .client
            .put(self.progress_url(book_id))
            .json(position)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisService for BackendClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/ai/analyze"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }
}
