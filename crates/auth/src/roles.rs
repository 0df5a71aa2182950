use std::borrow::Cow;

use serde::{Deserialize, Serialize, Serializer};

use articlehub_core::RoleId;

/// Role code used for RBAC.
///
/// The backend sends a role either as a bare code (`"editor"`) or as a role
/// record (`{"_id": "...", "code": "editor"}`). Both shapes collapse into this
/// one type at deserialization; it always serializes back as the bare code.
/// Codes outside the known set are kept verbatim and satisfy no predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "RoleRepr")]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const EDITOR: Role = Role(Cow::Borrowed("editor"));
    pub const WRITER: Role = Role(Cow::Borrowed("writer"));
    pub const READER: Role = Role(Cow::Borrowed("reader"));

    /// Surrounding whitespace is dropped before the code is matched or kept.
    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        let code = match code.into() {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
            Cow::Owned(s) if s.trim().len() == s.len() => Cow::Owned(s),
            Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
        };
        let known = match &*code {
            "admin" => Some(Self::ADMIN),
            "editor" => Some(Self::EDITOR),
            "writer" => Some(Self::WRITER),
            "reader" => Some(Self::READER),
            _ => None,
        };
        known.unwrap_or_else(|| Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the four codes the permission table knows about.
    pub fn is_known(&self) -> bool {
        [Self::ADMIN, Self::EDITOR, Self::WRITER, Self::READER].contains(self)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleRepr {
    Code(String),
    Record {
        #[serde(default)]
        code: Option<String>,
    },
}

impl From<RoleRepr> for Role {
    fn from(repr: RoleRepr) -> Self {
        match repr {
            RoleRepr::Code(code) => Role::new(code),
            RoleRepr::Record { code } => Role::new(code.unwrap_or_default()),
        }
    }
}

/// A role as listed by the backend's role catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    #[serde(rename = "_id")]
    pub id: RoleId,
    pub code: Role,
    #[serde(default = "default_active")]
    pub status: bool,
}

fn default_active() -> bool {
    true
}
