//! `articlehub-auth`: pure authorization boundary for the content client.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows what a
//! user record looks like and what each role may do, nothing more.

pub mod authorize;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{
    authorize, authorize_account_change, authorize_article_delete, authorize_article_edit,
    can_change_account, can_delete_article, can_edit_article, can_manage_articles,
    can_manage_users, can_publish_articles, can_write_articles, is_admin, is_editor, is_reader,
    is_writer, AuthzError, Capabilities,
};
pub use permissions::{permissions_for, Permission};
pub use roles::{Role, RoleRecord};
pub use user::{NewUser, SignupRequest, UpdatePassword, UpdateProfile, User, UserUpdate};
