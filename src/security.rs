//! Persisted user registry and credential verification.
//!
//! Users live in a single JSON document under the data root. Every mutation
//! is load-modify-store; an update for an existing username replaces the
//! prior record. Passwords are Argon2 PHC strings.

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: String,
    pub password_hash: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Attributes for a new (or replacing) registry entry.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub password: String,
    pub active: bool,
}

fn users_path(data_root: &str) -> PathBuf {
    Path::new(data_root).join("users.json")
}

/// Canonical username form: NFC-normalized and lowercased. Applied on write
/// and on lookup so `Amélie` and `amélie` (in any normalization form) hit
/// the same record.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().nfc().collect::<String>().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

fn read_registry(path: &Path) -> Result<Vec<UserRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading user registry at {}", path.display()))?;
    let users: Vec<UserRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("decoding user registry at {}", path.display()))?;
    Ok(users)
}

fn write_registry(path: &Path, users: &[UserRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let raw = serde_json::to_string_pretty(users)?;
    std::fs::write(path, raw)
        .with_context(|| format!("writing user registry at {}", path.display()))?;
    Ok(())
}

/// Provision the default administrator on first start. A registry file that
/// already exists is left untouched, whatever it contains.
pub fn ensure_default_admin(data_root: &str) -> Result<()> {
    let path = users_path(data_root);
    if path.exists() {
        return Ok(());
    }
    let admin = UserRecord {
        id: Uuid::new_v4().to_string(),
        username: "admin".into(),
        name: "Default Administrator".into(),
        email: "admin@strandworks.local".into(),
        role: "admin".into(),
        password_hash: hash_password("strandworks")?,
        active: true,
        created_at: Utc::now(),
        last_login: None,
    };
    write_registry(&path, &[admin])
}

/// Add a user, replacing any existing record with the same username.
pub fn add_user(data_root: &str, new: NewUser) -> Result<UserRecord> {
    let path = users_path(data_root);
    let username = normalize_username(&new.username);
    let mut users = read_registry(&path)?;
    users.retain(|u| u.username != username);
    let record = UserRecord {
        id: Uuid::new_v4().to_string(),
        username,
        name: new.name,
        email: new.email,
        role: new.role,
        password_hash: hash_password(&new.password)?,
        active: new.active,
        created_at: Utc::now(),
        last_login: None,
    };
    users.push(record.clone());
    write_registry(&path, &users)?;
    Ok(record)
}

pub fn delete_user(data_root: &str, username: &str) -> Result<()> {
    let path = users_path(data_root);
    let username = normalize_username(username);
    let mut users = read_registry(&path)?;
    users.retain(|u| u.username != username);
    write_registry(&path, &users)
}

/// Update password, role or active flag for an existing user. Fields left
/// as `None` keep their current value.
pub fn alter_user(
    data_root: &str,
    username: &str,
    new_password: Option<&str>,
    new_role: Option<&str>,
    new_active: Option<bool>,
) -> Result<()> {
    let path = users_path(data_root);
    let username = normalize_username(username);
    let mut users = read_registry(&path)?;
    let Some(user) = users.iter_mut().find(|u| u.username == username) else {
        return Err(anyhow!("user not found"));
    };
    if let Some(pw) = new_password {
        user.password_hash = hash_password(pw)?;
    }
    if let Some(role) = new_role {
        user.role = role.to_string();
    }
    if let Some(active) = new_active {
        user.active = active;
    }
    write_registry(&path, &users)
}

pub fn find_user(data_root: &str, username: &str) -> Result<Option<UserRecord>> {
    let path = users_path(data_root);
    let username = normalize_username(username);
    let users = read_registry(&path)?;
    Ok(users.into_iter().find(|u| u.username == username))
}

/// Stamp a successful login on the record. Missing user is a no-op; the
/// caller has already authenticated.
pub fn record_login(data_root: &str, username: &str) -> Result<()> {
    let path = users_path(data_root);
    let username = normalize_username(username);
    let mut users = read_registry(&path)?;
    if let Some(user) = users.iter_mut().find(|u| u.username == username) {
        user.last_login = Some(Utc::now());
        write_registry(&path, &users)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_user(username: &str, role: &str, password: &str) -> NewUser {
        NewUser {
            username: username.into(),
            name: format!("{username} test"),
            email: format!("{username}@example.com"),
            role: role.into(),
            password: password.into(),
            active: true,
        }
    }

    #[test]
    fn default_admin_is_provisioned_once() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        ensure_default_admin(root).unwrap();
        let admin = find_user(root, "admin").unwrap().expect("admin exists");
        assert_eq!(admin.role, "admin");
        assert!(admin.active);
        assert!(verify_password(&admin.password_hash, "strandworks"));

        // second call leaves the registry alone
        alter_user(root, "admin", Some("changed"), None, None).unwrap();
        ensure_default_admin(root).unwrap();
        let admin = find_user(root, "admin").unwrap().unwrap();
        assert!(verify_password(&admin.password_hash, "changed"));
    }

    #[test]
    fn add_replaces_existing_username() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        add_user(root, new_user("alice", "staff", "first")).unwrap();
        add_user(root, new_user("alice", "manager", "second")).unwrap();

        let alice = find_user(root, "alice").unwrap().unwrap();
        assert_eq!(alice.role, "manager");
        assert!(!verify_password(&alice.password_hash, "first"));
        assert!(verify_password(&alice.password_hash, "second"));
    }

    #[test]
    fn usernames_are_normalized_on_write_and_lookup() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        // NFD form with a combining acute accent
        add_user(root, new_user("Ame\u{0301}lie", "staff", "pw")).unwrap();
        // NFC composed form, different case
        let found = find_user(root, "AM\u{c9}LIE").unwrap();
        assert!(found.is_some(), "lookup must hit the normalized record");
        assert_eq!(found.unwrap().username, "am\u{e9}lie");
    }

    #[test]
    fn alter_unknown_user_fails() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        let err = alter_user(root, "ghost", Some("pw"), None, None).unwrap_err();
        assert!(err.to_string().contains("user not found"));
    }

    #[test]
    fn delete_then_find_is_absent() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        add_user(root, new_user("bo", "cashier", "pw")).unwrap();
        delete_user(root, "bo").unwrap();
        assert!(find_user(root, "bo").unwrap().is_none());
        // deleting again is a no-op
        delete_user(root, "bo").unwrap();
    }

    #[test]
    fn record_login_stamps_last_login() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        add_user(root, new_user("cass", "staff", "pw")).unwrap();
        assert!(find_user(root, "cass").unwrap().unwrap().last_login.is_none());
        record_login(root, "cass").unwrap();
        assert!(find_user(root, "cass").unwrap().unwrap().last_login.is_some());
    }

    #[test]
    fn verify_rejects_bad_hash_and_bad_password() {
        let phc = hash_password("s3cr3t!").unwrap();
        assert!(verify_password(&phc, "s3cr3t!"));
        assert!(!verify_password(&phc, "wrong"));
        assert!(!verify_password("not-a-phc-string", "s3cr3t!"));
    }
}
