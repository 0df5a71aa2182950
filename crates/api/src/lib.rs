//! `articlehub-api`: typed backend services on top of the session core.
//!
//! Every service call goes through the session's request authorizer, so it
//! carries the stored credential and survives one token expiry transparently.

pub mod articles;
pub mod authz;
pub mod error;
pub mod profile;
pub mod users;

pub use articles::{ArticleQuery, ArticleService};
pub use error::ServiceError;
pub use profile::ProfileService;
pub use users::UserService;
