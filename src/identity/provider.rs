//! Login flow: credential verification against the user registry, producing
//! the principal the session guard later consumes.

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use super::authorizer::{role_permissions, Permission};
use super::principal::{Principal, Role};
use crate::security;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub principal: Principal,
    /// Default grants derived from the principal's role at login time.
    pub permissions: Vec<Permission>,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse>;
}

/// Provider backed by the registry under the data root.
pub struct LocalAuthProvider {
    pub data_root: String,
}

impl LocalAuthProvider {
    pub fn new(data_root: impl Into<String>) -> Self {
        Self { data_root: data_root.into() }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse> {
        // Unknown user and wrong password share one error so the response
        // does not leak which usernames exist.
        let Some(user) = security::find_user(&self.data_root, &req.username)? else {
            return Err(anyhow!("invalid_credentials"));
        };
        if !user.active {
            return Err(anyhow!("account_inactive"));
        }
        if !security::verify_password(&user.password_hash, &req.password) {
            return Err(anyhow!("invalid_credentials"));
        }
        if let Err(e) = security::record_login(&self.data_root, &user.username) {
            warn!(user = %user.username, error = %e, "failed to stamp last login");
        }

        let role = Role::new(user.role.clone());
        let principal = Principal {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            role: role.clone(),
        };
        let permissions = role_permissions(&role).to_vec();
        info!(user = %principal.username, role = %principal.role, "login succeeded");
        Ok(LoginResponse { principal, permissions })
    }
}
