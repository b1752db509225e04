use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use warden_auth::{
    authorize, Action, Email, Grants, PolicyTable, Principal, Profile, ResourceTypeName, RoleName,
};

fn table_with_roles(role_count: usize) -> (PolicyTable, Principal) {
    let mut table = PolicyTable::new();
    let orders = table
        .register_resource_type(ResourceTypeName::parse("orders").unwrap())
        .unwrap();
    let mut principal = Principal::new(
        Email::parse("bench@example.com").unwrap(),
        Profile::new("Bench", "User", None).unwrap(),
        Utc::now(),
    );
    for i in 0..role_count {
        let role = table
            .create_role(RoleName::parse(&format!("role-{i}")).unwrap())
            .unwrap();
        // Only the last role grants delete, so the OR walks every role.
        let grants = if i + 1 == role_count {
            Grants::only(&[Action::Read, Action::Delete])
        } else {
            Grants::only(&[Action::Read])
        };
        table.create_rule(role.id, orders.id, grants).unwrap();
        principal.assign_role(role.id);
    }
    (table, principal)
}

fn bench_authorize_against_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("authorize_table");
    let orders = ResourceTypeName::parse("orders").unwrap();

    for roles in [1usize, 8, 64] {
        let (table, principal) = table_with_roles(roles);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(roles), &roles, |b, _| {
            b.iter(|| authorize(Some(black_box(&principal)), &orders, Action::Delete, &table));
        });
    }

    group.finish();
}

fn bench_snapshot_then_authorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_then_authorize");
    let orders = ResourceTypeName::parse("orders").unwrap();

    for roles in [1usize, 8, 64] {
        let (table, principal) = table_with_roles(roles);
        group.bench_with_input(BenchmarkId::from_parameter(roles), &roles, |b, _| {
            b.iter(|| {
                let snapshot = table.snapshot_for(&principal.roles, &orders);
                authorize(Some(black_box(&principal)), &orders, Action::Delete, &snapshot)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_authorize_against_table, bench_snapshot_then_authorize);
criterion_main!(benches);
