use serde::Serialize;
use thiserror::Error;

use articlehub_core::{Article, UserId};

use crate::{permissions_for, Permission, Role, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),

    #[error("forbidden: not the author of this article")]
    NotAuthor,

    #[error("forbidden: administrators cannot delete or re-role their own account")]
    OwnAccount,
}

/// Authorize the session user for one permission.
///
/// - No IO
/// - No panics
/// - Absent user is `Unauthenticated`, never a panic
pub fn authorize(user: Option<&User>, required: Permission) -> Result<(), AuthzError> {
    let user = user.ok_or(AuthzError::Unauthenticated)?;
    if permissions_for(&user.role).contains(&required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

fn has_role(user: Option<&User>, role: &Role) -> bool {
    user.is_some_and(|u| u.role == *role)
}

fn grants(user: Option<&User>, permission: Permission) -> bool {
    authorize(user, permission).is_ok()
}

pub fn is_admin(user: Option<&User>) -> bool {
    has_role(user, &Role::ADMIN)
}

pub fn is_editor(user: Option<&User>) -> bool {
    has_role(user, &Role::EDITOR)
}

pub fn is_writer(user: Option<&User>) -> bool {
    has_role(user, &Role::WRITER)
}

pub fn is_reader(user: Option<&User>) -> bool {
    has_role(user, &Role::READER)
}

/// Admin only.
pub fn can_manage_users(user: Option<&User>) -> bool {
    grants(user, Permission::ManageUsers)
}

/// Admin or editor.
pub fn can_manage_articles(user: Option<&User>) -> bool {
    grants(user, Permission::ManageArticles)
}

/// Admin, editor or writer.
pub fn can_write_articles(user: Option<&User>) -> bool {
    grants(user, Permission::WriteArticles)
}

/// Admin or editor.
pub fn can_publish_articles(user: Option<&User>) -> bool {
    grants(user, Permission::PublishArticles)
}

fn is_author(user: &User, article: &Article) -> bool {
    article.author == user.id
}

/// Article managers may edit any article; writers only the ones they authored.
pub fn authorize_article_edit(user: Option<&User>, article: &Article) -> Result<(), AuthzError> {
    let user = user.ok_or(AuthzError::Unauthenticated)?;
    if grants(Some(user), Permission::ManageArticles) {
        return Ok(());
    }
    authorize(Some(user), Permission::WriteArticles)?;
    if is_author(user, article) {
        Ok(())
    } else {
        Err(AuthzError::NotAuthor)
    }
}

/// Article managers and the article's author may delete it.
pub fn authorize_article_delete(user: Option<&User>, article: &Article) -> Result<(), AuthzError> {
    let user = user.ok_or(AuthzError::Unauthenticated)?;
    if grants(Some(user), Permission::ManageArticles) || is_author(user, article) {
        Ok(())
    } else if grants(Some(user), Permission::WriteArticles) {
        Err(AuthzError::NotAuthor)
    } else {
        Err(AuthzError::Forbidden(Permission::ManageArticles))
    }
}

/// Deleting an account or changing its role: admin only, and never the
/// admin's own account.
pub fn authorize_account_change(user: Option<&User>, target: &UserId) -> Result<(), AuthzError> {
    let user = user.ok_or(AuthzError::Unauthenticated)?;
    authorize(Some(user), Permission::ManageUsers)?;
    if user.id == *target {
        Err(AuthzError::OwnAccount)
    } else {
        Ok(())
    }
}

pub fn can_edit_article(user: Option<&User>, article: &Article) -> bool {
    authorize_article_edit(user, article).is_ok()
}

pub fn can_delete_article(user: Option<&User>, article: &Article) -> bool {
    authorize_article_delete(user, article).is_ok()
}

pub fn can_change_account(user: Option<&User>, target: &UserId) -> bool {
    authorize_account_change(user, target).is_ok()
}

/// Snapshot of everything the current session user may do.
///
/// Views compute this once per session change instead of calling each
/// predicate separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub authenticated: bool,
    pub manage_users: bool,
    pub manage_articles: bool,
    pub write_articles: bool,
    pub publish_articles: bool,
}

impl Capabilities {
    pub fn for_user(user: Option<&User>) -> Self {
        Self {
            authenticated: user.is_some(),
            manage_users: can_manage_users(user),
            manage_articles: can_manage_articles(user),
            write_articles: can_write_articles(user),
            publish_articles: can_publish_articles(user),
        }
    }
}
