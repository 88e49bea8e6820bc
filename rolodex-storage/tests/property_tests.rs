//! Property tests: the layer agrees with the store under arbitrary
//! sequences of operations.

use proptest::prelude::*;
use rolodex_storage::{CacheConfig, CollectionPolicy, ContactStore};
use rolodex_test_utils::fixtures::Harness;
use rolodex_test_utils::generators::{arb_contact_patch, arb_new_contacts};
use rolodex_test_utils::{ContactPatch, NewContact, RolodexResult};

#[derive(Debug, Clone)]
enum Op {
    Read(usize),
    Update(usize, ContactPatch),
    Delete(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8).prop_map(Op::Read),
        ((0usize..8), arb_contact_patch()).prop_map(|(i, p)| Op::Update(i, p)),
        (0usize..8).prop_map(Op::Delete),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build")
}

async fn run_ops(
    config: CacheConfig,
    seed: Vec<NewContact>,
    ops: Vec<Op>,
) -> RolodexResult<Harness> {
    let (h, created) = Harness::seeded(config, seed).await?;
    let ids: Vec<_> = created.iter().map(|c| c.id).collect();
    for op in ops {
        match op {
            Op::Read(i) => {
                let _ = h.layer.read(ids[i % ids.len()]).await;
            }
            Op::Update(i, patch) => {
                let _ = h.layer.update(ids[i % ids.len()], patch).await;
            }
            Op::Delete(i) => {
                let _ = h.layer.delete(ids[i % ids.len()]).await;
            }
        }
    }
    Ok(h)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Single-record reads always match the store after any operation mix.
    #[test]
    fn prop_record_reads_match_store(
        seed in arb_new_contacts(5),
        ops in proptest::collection::vec(arb_op(), 0..20),
    ) {
        let rt = runtime();
        let result: RolodexResult<()> = rt.block_on(async {
            let h = run_ops(CacheConfig::default(), seed, ops).await?;
            for stored in h.store.inner().find_all().await? {
                let read = h.layer.read(stored.id).await?;
                assert_eq!(read, stored);
            }
            Ok(())
        });
        prop_assert!(result.is_ok(), "{:?}", result);
    }

    /// With eager invalidation the collection never goes stale.
    #[test]
    fn prop_collection_matches_store_under_invalidate_policy(
        seed in arb_new_contacts(5),
        ops in proptest::collection::vec(arb_op(), 0..20),
    ) {
        let rt = runtime();
        let config = CacheConfig::new().with_collection_policy(CollectionPolicy::InvalidateOnUpdate);
        let result: RolodexResult<()> = rt.block_on(async {
            let h = run_ops(config, seed, ops).await?;
            let mut listed = h.layer.read_all().await?;
            let mut stored = h.store.inner().find_all().await?;
            listed.sort_by_key(|c| c.id);
            stored.sort_by_key(|c| c.id);
            assert_eq!(listed, stored);
            Ok(())
        });
        prop_assert!(result.is_ok(), "{:?}", result);
    }

    /// Deleted ids never reappear in the cached collection.
    #[test]
    fn prop_deleted_ids_leave_collection(
        seed in arb_new_contacts(5),
        ops in proptest::collection::vec(arb_op(), 0..20),
    ) {
        let rt = runtime();
        let result: RolodexResult<()> = rt.block_on(async {
            let h = run_ops(CacheConfig::default(), seed, ops).await?;
            let stored = h.store.inner().find_all().await?;
            for listed in h.layer.read_all().await? {
                assert!(stored.iter().any(|s| s.id == listed.id));
            }
            Ok(())
        });
        prop_assert!(result.is_ok(), "{:?}", result);
    }
}
