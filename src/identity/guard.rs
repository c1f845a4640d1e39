//! Session guard: gate rendering of a protected view behind an
//! authentication check and an optional role check.
//!
//! The decision is a pure value ([`Decision`]); navigating to the fallback
//! destination is the caller's side effect. The guard never errors across
//! its boundary: a missing principal, an unreadable store and an
//! insufficient role all fold into `Denied` (the distinction is logged at
//! debug level and nowhere else).

use std::sync::Arc;

use tracing::debug;

use super::authorizer::{RolePolicy, DEFAULT_POLICY};
use super::principal::{Principal, Role};
use super::store::{stored_principal, SessionStore};

/// Default navigation target for denied evaluations.
pub const DEFAULT_FALLBACK: &str = "/login";

/// Outcome of a single access evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Granted(Principal),
    Denied { destination: String },
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted(_))
    }
}

/// Evaluate access against the injected store and policy.
///
/// Render happens iff a valid principal exists and (no role required, or
/// the principal's role satisfies it under the policy table).
pub fn evaluate_access(
    store: &dyn SessionStore,
    policy: &RolePolicy,
    required_role: Option<&Role>,
    fallback: &str,
) -> Decision {
    let Some(principal) = stored_principal(store) else {
        debug!(fallback, "access denied: no stored principal");
        return Decision::Denied { destination: fallback.to_string() };
    };
    if let Some(required) = required_role {
        if !policy.satisfies(&principal.role, required) {
            debug!(
                role = %principal.role,
                required = %required,
                fallback,
                "access denied: role does not satisfy requirement"
            );
            return Decision::Denied { destination: fallback.to_string() };
        }
    }
    Decision::Granted(principal)
}

/// Transient evaluation state of a mounted guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Store not yet consulted; the only non-terminal state a caller may
    /// surface (as a loading placeholder).
    Pending,
    /// Store read in progress. The store is synchronous, so this state is
    /// never observable from outside an evaluation.
    Checking,
    Granted(Principal),
    Denied { destination: String },
}

/// What the caller should put on screen for this evaluation cycle.
#[derive(Debug, PartialEq, Eq)]
pub enum Rendered<R> {
    /// Guard not evaluated yet; show a loading placeholder.
    Loading,
    /// Access granted; the wrapped view's output.
    Content(R),
    /// Access denied; navigate to the destination and render nothing.
    Redirect(String),
}

/// Per-mount guard wrapping an opaque view.
///
/// A fresh guard starts `Pending`; the first [`SessionGuard::evaluate`]
/// resolves it to a terminal state which is then cached. The decision is
/// recomputed only when the inputs change ([`SessionGuard::set_inputs`]),
/// not when the store mutates underneath, since the read is a one-shot
/// snapshot rather than a subscription.
pub struct SessionGuard {
    policy: Arc<RolePolicy>,
    required_role: Option<Role>,
    fallback: String,
    state: GuardState,
}

impl SessionGuard {
    pub fn new(required_role: Option<Role>) -> Self {
        Self::with_policy(DEFAULT_POLICY.clone(), required_role, DEFAULT_FALLBACK)
    }

    pub fn with_policy(
        policy: Arc<RolePolicy>,
        required_role: Option<Role>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            policy,
            required_role,
            fallback: fallback.into(),
            state: GuardState::Pending,
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Replace the guard inputs. A change resets the evaluation cycle; an
    /// identical pair leaves the cached decision alone.
    pub fn set_inputs(&mut self, required_role: Option<Role>, fallback: impl Into<String>) {
        let fallback = fallback.into();
        if self.required_role == required_role && self.fallback == fallback {
            return;
        }
        self.required_role = required_role;
        self.fallback = fallback;
        self.state = GuardState::Pending;
    }

    /// Run the evaluation if this cycle has not resolved yet; otherwise
    /// return the cached terminal state.
    pub fn evaluate(&mut self, store: &dyn SessionStore) -> &GuardState {
        if matches!(self.state, GuardState::Pending | GuardState::Checking) {
            self.state = GuardState::Checking;
            self.state = match evaluate_access(
                store,
                &self.policy,
                self.required_role.as_ref(),
                &self.fallback,
            ) {
                Decision::Granted(p) => GuardState::Granted(p),
                Decision::Denied { destination } => GuardState::Denied { destination },
            };
        }
        &self.state
    }

    /// Evaluate and invoke the wrapped view iff access is granted.
    ///
    /// The view is opaque: the guard neither inspects nor transforms its
    /// output, it only decides whether to call it.
    pub fn render<R>(
        &mut self,
        store: &dyn SessionStore,
        view: impl FnOnce(&Principal) -> R,
    ) -> Rendered<R> {
        match self.evaluate(store) {
            GuardState::Granted(p) => Rendered::Content(view(p)),
            GuardState::Denied { destination } => Rendered::Redirect(destination.clone()),
            GuardState::Pending | GuardState::Checking => Rendered::Loading,
        }
    }
}
