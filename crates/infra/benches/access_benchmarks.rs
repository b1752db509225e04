use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use std::sync::Arc;

use chrono::Utc;
use warden_auth::{Action, Email, Grants, Principal, Profile, ResourceTypeName, RoleName};
use warden_infra::access::{AccessGate, ResourceAccess};
use warden_infra::store::{IdentityStore, InMemoryOwnedStore, InMemoryStore, OwnedStore, Page, PolicyStore};
use warden_orders::{NewOrder, Order};

fn setup(rt: &tokio::runtime::Runtime, rows: usize) -> (ResourceAccess<Order>, Principal) {
    rt.block_on(async {
        let store = Arc::new(InMemoryStore::new());
        let orders = store
            .register_resource_type(ResourceTypeName::parse("orders").unwrap())
            .await
            .unwrap();
        let role = store.create_role(RoleName::parse("Manager").unwrap()).await.unwrap();
        store
            .create_rule(role.id, orders.id, Grants::only(&[Action::Read, Action::Create]))
            .await
            .unwrap();

        let mut principal = Principal::new(
            Email::parse("bench@example.com").unwrap(),
            Profile::new("Bench", "User", None).unwrap(),
            Utc::now(),
        );
        principal.assign_role(role.id);
        let principal = store.create_principal(principal, "hash".into()).await.unwrap();

        let policy: Arc<dyn PolicyStore> = store.clone();
        let table: Arc<dyn OwnedStore<Order>> = Arc::new(InMemoryOwnedStore::<Order>::new());
        let access = ResourceAccess::new(AccessGate::new("orders", policy), table);
        for i in 0..rows {
            access
                .create_owned(&principal, NewOrder::new(&format!("item-{i}"), 100).unwrap())
                .await
                .unwrap();
        }
        (access, principal)
    })
}

fn bench_gate_check(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (access, principal) = setup(&rt, 0);

    c.bench_function("gate_check_read", |b| {
        b.iter(|| rt.block_on(access.gate().check(black_box(&principal), Action::Read)))
    });
}

fn bench_list_owned(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("list_owned_first_page");

    for rows in [10usize, 1_000] {
        let (access, principal) = setup(&rt, rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            b.iter(|| rt.block_on(access.list_owned(black_box(&principal), Page::default())))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_gate_check, bench_list_owned);
criterion_main!(benches);
