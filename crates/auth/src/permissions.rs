use serde::{Deserialize, Serialize};

use crate::Role;

/// Capability granted by a role.
///
/// Roles are not ordered by their codes; what each role may do is decided by
/// [`permissions_for`] alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Administer user accounts (list, create, edit, delete, change roles).
    ManageUsers,
    /// Edit or delete any article, not only one's own.
    ManageArticles,
    /// Author new articles.
    WriteArticles,
    /// Publish or archive articles.
    PublishArticles,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageUsers => "users.manage",
            Permission::ManageArticles => "articles.manage",
            Permission::WriteArticles => "articles.write",
            Permission::PublishArticles => "articles.publish",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

const ADMIN: &[Permission] = &[
    Permission::ManageUsers,
    Permission::ManageArticles,
    Permission::WriteArticles,
    Permission::PublishArticles,
];
const EDITOR: &[Permission] = &[
    Permission::ManageArticles,
    Permission::WriteArticles,
    Permission::PublishArticles,
];
const WRITER: &[Permission] = &[Permission::WriteArticles];

/// Role → permission table.
///
/// Readers and unknown codes get nothing.
pub fn permissions_for(role: &Role) -> &'static [Permission] {
    if *role == Role::ADMIN {
        ADMIN
    } else if *role == Role::EDITOR {
        EDITOR
    } else if *role == Role::WRITER {
        WRITER
    } else {
        &[]
    }
}
