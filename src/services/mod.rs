//! External collaborators
//!
//! The engine consumes these services but does not implement them. Each is
//! an async trait so tests can swap in fakes and the binary can use the HTTP
//! client in [`http`].

use async_trait::async_trait;

use crate::chapter::Chapter;
use crate::error::ServiceError;
use crate::highlights::HighlightId;
use crate::position::ReadingPosition;

pub mod http;
mod types;

pub use http::BackendClient;
pub use types::{
    AnalysisRequest, AnalysisResult, CreateHighlightRequest, GrammarPoint, HighlightResponse,
    ProgressResponse, VocabularyNuance,
};

/// Source of tokenized chapters
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Fetch a chapter's segments and the highlights created in it
    async fn get_chapter(&self, book_id: &str, chapter_index: usize) -> Result<Chapter, ServiceError>;
}

/// Highlight persistence
#[async_trait]
pub trait HighlightService: Send + Sync {
    /// Persist a highlight and return the id the server assigned
    async fn create(&self, request: &CreateHighlightRequest) -> Result<HighlightId, ServiceError>;

    /// Delete a highlight
    async fn delete(&self, id: HighlightId) -> Result<(), ServiceError>;
}

/// Reading-position persistence
#[async_trait]
pub trait ProgressService: Send + Sync {
    /// Last known position for a book, if one was ever saved
    async fn get(&self, book_id: &str) -> Result<Option<ReadingPosition>, ServiceError>;

    /// Store a complete position snapshot
    async fn put(&self, book_id: &str, position: &ReadingPosition) -> Result<(), ServiceError>;
}

/// Text analysis (translation, grammar and nuance notes)
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ServiceError>;
}
