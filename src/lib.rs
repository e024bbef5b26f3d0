//! Shiori Engine Library
//!
//! Annotation and reading-state engine for tokenized e-book chapters.
//! The `shiori` binary in main.rs drives it against a running backend.
//!
//! # Modules
//!
//! - `address`: Token addresses and inclusive ranges
//! - `chapter`: Tokenized chapter model as served by the backend
//! - `highlights`: Highlight index and optimistic annotation controller
//! - `position`: Reading-position store and scroll restoration
//! - `context`: Sentence-aligned context windows for analysis
//! - `services`: Collaborator traits and the HTTP backend client

pub mod address;
pub mod chapter;
pub mod config;
pub mod context;
pub mod error;
pub mod highlights;
pub mod position;
pub mod services;
