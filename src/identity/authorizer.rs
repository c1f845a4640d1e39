//! Role precedence and permission tables.
//!
//! The rule the rest of the crate relies on, "admin satisfies any required
//! role", lives here as data rather than inline conditionals: each
//! registered role maps to a coverage, and [`RolePolicy::satisfies`] is the
//! single comparison point. Additional superset roles are a `grant_all`
//! call away.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::principal::Role;

/// What a role is allowed to stand in for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// Satisfies every required role, including ones registered later.
    All,
    /// Satisfies exactly the listed roles (itself included).
    Exact(HashSet<Role>),
}

/// Declared precedence table over the closed role set.
///
/// The member set is configuration: callers build their own policy or use
/// [`RolePolicy::default`], which registers the roles this deployment ships
/// with. The guard consults the policy and never compares role names itself.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    coverage: HashMap<Role, Coverage>,
}

impl RolePolicy {
    pub fn empty() -> Self {
        Self { coverage: HashMap::new() }
    }

    /// Register a role that satisfies only itself.
    pub fn register(&mut self, role: Role) -> &mut Self {
        let mut set = HashSet::new();
        set.insert(role.clone());
        self.coverage.entry(role).or_insert(Coverage::Exact(set));
        self
    }

    /// Register (or upgrade) a role that satisfies every requirement.
    pub fn grant_all(&mut self, role: Role) -> &mut Self {
        self.coverage.insert(role, Coverage::All);
        self
    }

    /// Let `role` additionally stand in for `covers`.
    pub fn grant(&mut self, role: Role, covers: Role) -> &mut Self {
        match self.coverage.entry(role.clone()).or_insert_with(|| {
            let mut set = HashSet::new();
            set.insert(role);
            Coverage::Exact(set)
        }) {
            Coverage::All => {}
            Coverage::Exact(set) => {
                set.insert(covers);
            }
        }
        self
    }

    pub fn is_known(&self, role: &Role) -> bool {
        self.coverage.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.coverage.keys()
    }

    /// Capability comparison: does `principal_role` meet `required`?
    ///
    /// An exact match always passes, even for roles the policy has never
    /// seen; everything else is decided by the coverage table.
    pub fn satisfies(&self, principal_role: &Role, required: &Role) -> bool {
        if principal_role == required {
            return true;
        }
        match self.coverage.get(principal_role) {
            Some(Coverage::All) => true,
            Some(Coverage::Exact(set)) => set.contains(required),
            None => false,
        }
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        let mut p = RolePolicy::empty();
        p.grant_all(Role::new(ADMIN));
        p.register(Role::new(MANAGER));
        p.register(Role::new(STAFF));
        p.register(Role::new(CASHIER));
        p
    }
}

pub const ADMIN: &str = "admin";
pub const MANAGER: &str = "manager";
pub const STAFF: &str = "staff";
pub const CASHIER: &str = "cashier";

/// Process-wide default policy for callers that do not inject their own.
pub static DEFAULT_POLICY: Lazy<Arc<RolePolicy>> = Lazy::new(|| Arc::new(RolePolicy::default()));

// --- Permissions -----------------------------------------------------------
//
// Fine-grained grants used by API endpoints that gate on an action rather
// than a role. The admin override mirrors the role table: an admin principal
// holds every permission.

pub type Permission = &'static str;

pub mod permissions {
    use super::Permission;

    // Dashboard & reporting
    pub const DASHBOARD_VIEW: Permission = "dashboard_view";
    pub const ANALYTICS_VIEW: Permission = "analytics_view";
    pub const REPORTS_GENERATE: Permission = "reports_generate";

    // Quotations
    pub const QUOTATIONS_VIEW: Permission = "quotations_view";
    pub const QUOTATIONS_CREATE: Permission = "quotations_create";
    pub const QUOTATIONS_EDIT: Permission = "quotations_edit";
    pub const QUOTATIONS_APPROVE: Permission = "quotations_approve";

    // Orders
    pub const SALES_ORDERS_VIEW: Permission = "sales_orders_view";
    pub const SALES_ORDERS_CREATE: Permission = "sales_orders_create";
    pub const JOB_ORDERS_VIEW: Permission = "job_orders_view";
    pub const JOB_ORDERS_CREATE: Permission = "job_orders_create";

    // Inventory & products
    pub const INVENTORY_VIEW: Permission = "inventory_view";
    pub const INVENTORY_EDIT: Permission = "inventory_edit";
    pub const PRODUCTS_VIEW: Permission = "products_view";
    pub const PRODUCTS_EDIT: Permission = "products_edit";

    // Customers & staff
    pub const CUSTOMERS_VIEW: Permission = "customers_view";
    pub const CUSTOMERS_EDIT: Permission = "customers_edit";
    pub const STAFF_VIEW: Permission = "staff_view";
    pub const STAFF_MANAGE: Permission = "staff_manage";

    // Financial
    pub const PRICES_VIEW: Permission = "prices_view";
    pub const PRICES_EDIT: Permission = "prices_edit";
    pub const PAYMENTS_VIEW: Permission = "payments_view";
    pub const PAYMENTS_RECORD: Permission = "payments_record";
    pub const INVOICES_GENERATE: Permission = "invoices_generate";

    // System
    pub const SYSTEM_SETTINGS: Permission = "system_settings";
    pub const ADMIN_PORTAL_ACCESS: Permission = "admin_portal_access";
}

use permissions as perm;

/// Default grants per role. Unknown roles get the most restricted (staff)
/// set rather than nothing, matching the application's historical behavior.
pub fn role_permissions(role: &Role) -> &'static [Permission] {
    static ADMIN_PERMS: &[Permission] = &[
        perm::DASHBOARD_VIEW,
        perm::ANALYTICS_VIEW,
        perm::REPORTS_GENERATE,
        perm::QUOTATIONS_VIEW,
        perm::QUOTATIONS_CREATE,
        perm::QUOTATIONS_EDIT,
        perm::QUOTATIONS_APPROVE,
        perm::SALES_ORDERS_VIEW,
        perm::SALES_ORDERS_CREATE,
        perm::JOB_ORDERS_VIEW,
        perm::JOB_ORDERS_CREATE,
        perm::INVENTORY_VIEW,
        perm::INVENTORY_EDIT,
        perm::PRODUCTS_VIEW,
        perm::PRODUCTS_EDIT,
        perm::CUSTOMERS_VIEW,
        perm::CUSTOMERS_EDIT,
        perm::STAFF_VIEW,
        perm::STAFF_MANAGE,
        perm::PRICES_VIEW,
        perm::PRICES_EDIT,
        perm::PAYMENTS_VIEW,
        perm::PAYMENTS_RECORD,
        perm::INVOICES_GENERATE,
        perm::SYSTEM_SETTINGS,
        perm::ADMIN_PORTAL_ACCESS,
    ];
    static MANAGER_PERMS: &[Permission] = &[
        perm::DASHBOARD_VIEW,
        perm::ANALYTICS_VIEW,
        perm::QUOTATIONS_VIEW,
        perm::QUOTATIONS_CREATE,
        perm::QUOTATIONS_EDIT,
        perm::SALES_ORDERS_VIEW,
        perm::SALES_ORDERS_CREATE,
        perm::JOB_ORDERS_VIEW,
        perm::JOB_ORDERS_CREATE,
        perm::INVENTORY_VIEW,
        perm::INVENTORY_EDIT,
        perm::PRODUCTS_VIEW,
        perm::CUSTOMERS_VIEW,
        perm::CUSTOMERS_EDIT,
        perm::PRICES_VIEW,
        perm::PAYMENTS_VIEW,
        perm::PAYMENTS_RECORD,
    ];
    static STAFF_PERMS: &[Permission] = &[
        perm::DASHBOARD_VIEW,
        perm::QUOTATIONS_VIEW,
        perm::SALES_ORDERS_VIEW,
        perm::JOB_ORDERS_VIEW,
        perm::INVENTORY_VIEW,
        perm::CUSTOMERS_VIEW,
        perm::PRODUCTS_VIEW,
        perm::PRICES_VIEW,
        perm::PAYMENTS_VIEW,
    ];
    static CASHIER_PERMS: &[Permission] = &[
        perm::DASHBOARD_VIEW,
        perm::QUOTATIONS_VIEW,
        perm::QUOTATIONS_CREATE,
        perm::CUSTOMERS_VIEW,
        perm::PRODUCTS_VIEW,
        perm::PRICES_VIEW,
        perm::PAYMENTS_VIEW,
        perm::PAYMENTS_RECORD,
    ];

    match role.as_str() {
        ADMIN => ADMIN_PERMS,
        MANAGER => MANAGER_PERMS,
        CASHIER => CASHIER_PERMS,
        _ => STAFF_PERMS,
    }
}

/// Does `role` hold `required`? Admin holds everything.
pub fn has_permission(role: &Role, required: Permission) -> bool {
    if role.as_str() == ADMIN {
        return true;
    }
    role_permissions(role).contains(&required)
}

pub fn has_any_permission(role: &Role, required: &[Permission]) -> bool {
    required.iter().any(|p| has_permission(role, p))
}

pub fn has_all_permissions(role: &Role, required: &[Permission]) -> bool {
    required.iter().all(|p| has_permission(role, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_any_required_role() {
        let policy = RolePolicy::default();
        let admin = Role::new(ADMIN);
        for required in ["admin", "cashier", "manager", "staff", "warehouse_lead"] {
            assert!(policy.satisfies(&admin, &Role::new(required.to_string())), "admin vs {required}");
        }
    }

    #[test]
    fn exact_match_satisfies() {
        let policy = RolePolicy::default();
        assert!(policy.satisfies(&Role::new(CASHIER), &Role::new(CASHIER)));
        // exact match passes even for roles the policy never registered
        assert!(policy.satisfies(&Role::new("auditor"), &Role::new("auditor")));
    }

    #[test]
    fn mismatched_role_denied() {
        let policy = RolePolicy::default();
        assert!(!policy.satisfies(&Role::new(CASHIER), &Role::new(ADMIN)));
        assert!(!policy.satisfies(&Role::new(STAFF), &Role::new(MANAGER)));
        assert!(!policy.satisfies(&Role::new("auditor"), &Role::new(STAFF)));
    }

    #[test]
    fn grant_all_extends_the_table() {
        let mut policy = RolePolicy::default();
        assert!(!policy.is_known(&Role::new("owner")));
        policy.grant_all(Role::new("owner"));
        assert!(policy.is_known(&Role::new("owner")));
        assert!(policy.satisfies(&Role::new("owner"), &Role::new(CASHIER)));
        assert!(policy.satisfies(&Role::new("owner"), &Role::new(ADMIN)));
        assert_eq!(policy.roles().count(), 5);
    }

    #[test]
    fn grant_adds_a_single_cover() {
        let mut policy = RolePolicy::default();
        policy.grant(Role::new(MANAGER), Role::new(STAFF));
        assert!(policy.satisfies(&Role::new(MANAGER), &Role::new(STAFF)));
        assert!(!policy.satisfies(&Role::new(MANAGER), &Role::new(CASHIER)));
    }

    #[test]
    fn admin_override_holds_for_every_permission() {
        let admin = Role::new(ADMIN);
        for p in [perm::QUOTATIONS_VIEW, perm::STAFF_MANAGE, perm::SYSTEM_SETTINGS] {
            assert!(has_permission(&admin, p));
        }
    }

    #[test]
    fn unknown_role_falls_back_to_staff_grants() {
        let unknown = Role::new("warehouse_lead");
        assert!(has_permission(&unknown, perm::INVENTORY_VIEW));
        assert!(!has_permission(&unknown, perm::INVENTORY_EDIT));
        assert!(has_any_permission(&unknown, &[perm::STAFF_MANAGE, perm::DASHBOARD_VIEW]));
        assert!(!has_all_permissions(&unknown, &[perm::DASHBOARD_VIEW, perm::STAFF_MANAGE]));
    }
}
