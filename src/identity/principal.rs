use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Authorization level carried by a [`Principal`].
///
/// Roles are opaque strings at this layer; which roles exist and which role
/// satisfies which requirement is decided by the policy table in
/// `authorizer`, never by the type itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role(Cow::Owned(name.to_string()))
    }
}

/// The authenticated identity as stored in the session store.
///
/// A principal is written once by the login flow and treated as immutable
/// for the lifetime of a guard evaluation. Absence of a principal means
/// "not authenticated"; there is no guest default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}
