//! Identity subsystem: session store capability, role-gated guard, session
//! lifecycle and login provider.
//! The public surface stays thin; implementation is split across sub-modules.

mod principal;
mod store;
mod session;
mod guard;
mod accessor;
pub mod authorizer;
mod provider;

pub use principal::{Principal, Role};
pub use store::{stored_principal, FileSessionStore, MemorySessionStore, SessionStore, StoreError, USER_KEY};
pub use session::{gen_id, issue, teardown, validate, IssuedSession, SessionMeta, CSRF_KEY, DEFAULT_TTL_SECS, META_KEY};
pub use guard::{evaluate_access, Decision, GuardState, Rendered, SessionGuard, DEFAULT_FALLBACK};
pub use accessor::SessionAccessor;
pub use authorizer::{has_permission, role_permissions, RolePolicy};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
