use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use strandworks::identity::{
    evaluate_access, MemorySessionStore, Principal, Role, RolePolicy, SessionStore,
    DEFAULT_FALLBACK, USER_KEY,
};

fn store_with_role(role: &str) -> MemorySessionStore {
    let store = MemorySessionStore::new();
    let p = Principal {
        id: "bench-user".into(),
        name: "Bench User".into(),
        username: "bench".into(),
        email: "bench@strandworks.local".into(),
        role: Role::new(role.to_string()),
    };
    store
        .set(USER_KEY, &serde_json::to_string(&p).unwrap())
        .unwrap();
    store
}

fn bench_guard(c: &mut Criterion) {
    let policy = RolePolicy::default();
    let mut group = c.benchmark_group("guard_evaluate");

    // Denial on an empty store: the cheapest path
    let empty = MemorySessionStore::new();
    group.bench_function("deny_absent", |b| {
        b.iter(|| {
            let d = evaluate_access(&empty, &policy, None, DEFAULT_FALLBACK);
            criterion::black_box(d);
        });
    });

    // Grant paths: decode + policy lookup
    for (label, stored, required) in [
        ("grant_no_requirement", "staff", None),
        ("grant_exact_role", "cashier", Some("cashier")),
        ("grant_admin_override", "admin", Some("cashier")),
        ("deny_role_mismatch", "cashier", Some("admin")),
    ] {
        let store = store_with_role(stored);
        let required = required.map(|r| Role::new(r.to_string()));
        group.bench_with_input(BenchmarkId::new("decision", label), &store, |b, store| {
            b.iter(|| {
                let d = evaluate_access(store, &policy, required.as_ref(), DEFAULT_FALLBACK);
                criterion::black_box(d);
            });
        });
    }

    group.finish();

    // Policy table lookup alone
    let mut group = c.benchmark_group("policy_satisfies");
    let admin = Role::new("admin");
    let cashier = Role::new("cashier");
    group.bench_function("admin_covers_all", |b| {
        b.iter(|| criterion::black_box(policy.satisfies(&admin, &cashier)));
    });
    group.bench_function("exact_match", |b| {
        b.iter(|| criterion::black_box(policy.satisfies(&cashier, &cashier)));
    });
    group.finish();
}

criterion_group!(benches, bench_guard);
criterion_main!(benches);
