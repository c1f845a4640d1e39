//! Session issue/validate/teardown over a [`SessionStore`].
//!
//! A session is three keys in one store: the serialized principal under
//! `"user"`, lifetime metadata under `"meta"` and the CSRF token under
//! `"csrf"`. Expiry is enforced at validate time by purging the store, so
//! readers above only ever see present or absent.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::principal::Principal;
use super::store::{SessionStore, StoreError, USER_KEY};

pub const META_KEY: &str = "meta";
pub const CSRF_KEY: &str = "csrf";

/// Default session lifetime: 24 hours.
pub const DEFAULT_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMeta {
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// 256-bit random token, base64url without padding.
pub fn gen_id() -> String {
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub meta: SessionMeta,
    pub csrf_token: String,
}

/// Serialize the principal plus lifetime metadata and a fresh CSRF token
/// into the store.
pub fn issue(
    store: &dyn SessionStore,
    principal: &Principal,
    ttl: Duration,
) -> Result<IssuedSession, StoreError> {
    let now = Utc::now();
    let meta = SessionMeta {
        session_id: gen_id(),
        issued_at: now,
        expires_at: now + ttl,
    };
    let csrf_token = gen_id();
    store.set(
        USER_KEY,
        &serde_json::to_string(principal).expect("principal serializes"),
    )?;
    store.set(META_KEY, &serde_json::to_string(&meta).expect("meta serializes"))?;
    store.set(CSRF_KEY, &csrf_token)?;
    info!(
        user = %principal.username,
        session_id = %meta.session_id,
        ttl_secs = ttl.num_seconds(),
        "session issued"
    );
    Ok(IssuedSession { meta, csrf_token })
}

/// Check the session's lifetime metadata.
///
/// Missing, unreadable or expired metadata invalidates the whole session:
/// the store is purged and `None` is returned, so a later guard read sees
/// a plain absent principal.
pub fn validate(store: &dyn SessionStore) -> Option<SessionMeta> {
    let raw = match store.get(META_KEY) {
        Some(v) => v,
        None => {
            if store.get(USER_KEY).is_some() {
                debug!("session has a principal but no metadata, purging");
                let _ = teardown(store);
            }
            return None;
        }
    };
    let meta: SessionMeta = match serde_json::from_str(&raw) {
        Ok(m) => m,
        Err(e) => {
            debug!(error = %e, "session metadata failed to decode, purging");
            let _ = teardown(store);
            return None;
        }
    };
    if meta.expires_at <= Utc::now() {
        debug!(session_id = %meta.session_id, "session expired, purging");
        let _ = teardown(store);
        return None;
    }
    Some(meta)
}

/// Remove every session key. Safe to call on an already-empty store.
pub fn teardown(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove(USER_KEY)?;
    store.remove(META_KEY)?;
    store.remove(CSRF_KEY)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::principal::Role;
    use crate::identity::store::{stored_principal, MemorySessionStore};

    fn principal() -> Principal {
        Principal {
            id: "u-9".into(),
            name: "Nita Cruz".into(),
            username: "nita".into(),
            email: "nita@example.com".into(),
            role: Role::new("manager"),
        }
    }

    #[test]
    fn issue_then_validate() {
        let store = MemorySessionStore::new();
        let issued = issue(&store, &principal(), Duration::seconds(DEFAULT_TTL_SECS)).unwrap();
        assert!(!issued.csrf_token.is_empty());
        let meta = validate(&store).expect("fresh session validates");
        assert_eq!(meta.session_id, issued.meta.session_id);
        assert_eq!(stored_principal(&store), Some(principal()));
        assert_eq!(store.get(CSRF_KEY).as_deref(), Some(issued.csrf_token.as_str()));
    }

    #[test]
    fn expired_session_reads_as_absent() {
        let store = MemorySessionStore::new();
        issue(&store, &principal(), Duration::seconds(-1)).unwrap();
        assert!(validate(&store).is_none());
        // the purge removed the principal too
        assert_eq!(stored_principal(&store), None);
        assert_eq!(store.get(CSRF_KEY), None);
    }

    #[test]
    fn malformed_meta_purges_the_session() {
        let store = MemorySessionStore::new();
        issue(&store, &principal(), Duration::seconds(60)).unwrap();
        store.set(META_KEY, "definitely not json").unwrap();
        assert!(validate(&store).is_none());
        assert_eq!(stored_principal(&store), None);
    }

    #[test]
    fn principal_without_meta_is_purged() {
        let store = MemorySessionStore::new();
        store
            .set(USER_KEY, &serde_json::to_string(&principal()).unwrap())
            .unwrap();
        assert!(validate(&store).is_none());
        assert_eq!(stored_principal(&store), None);
    }

    #[test]
    fn teardown_is_idempotent() {
        let store = MemorySessionStore::new();
        teardown(&store).unwrap();
        issue(&store, &principal(), Duration::seconds(60)).unwrap();
        teardown(&store).unwrap();
        teardown(&store).unwrap();
        assert!(validate(&store).is_none());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = gen_id();
        let b = gen_id();
        assert_ne!(a, b);
        assert!(a.len() >= 40, "256 bits of base64url");
    }
}
