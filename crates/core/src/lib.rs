//! `articlehub-core`: content domain building blocks.
//!
//! This crate contains **pure domain** records and identifiers (no transport or
//! storage concerns).

pub mod article;
pub mod error;
pub mod id;

pub use article::{Article, ArticleStatus, CreateArticle, UpdateArticle};
pub use error::{DomainError, DomainResult};
pub use id::{ArticleId, RoleId, UserId};
