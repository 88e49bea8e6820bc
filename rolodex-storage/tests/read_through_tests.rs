//! Consistency tests for the read-through / write-invalidate layer.
//!
//! Each test drives `CachedContactStore` over a counting store and a
//! switchable cache, then inspects both sides.

use std::time::Duration;

use rolodex_storage::cache::payload;
use rolodex_storage::{
    CacheBackend, CacheConfig, CacheKey, CollectionPolicy, ContactStore, WriteTtl,
};
use rolodex_test_utils::assertions::{assert_conflict, assert_not_found, assert_validation};
use rolodex_test_utils::fixtures::{ada, grace, linus, Harness};
use rolodex_test_utils::{
    CacheMode, CacheWrite, ContactId, ContactPatch, CountingStore, NewContact, RolodexResult,
};

fn record_key(id: ContactId) -> String {
    CacheKey::Record(id).render(None)
}

const COLLECTION: &str = "allContacts";

// ============================================================================
// READ-THROUGH
// ============================================================================

#[tokio::test]
async fn read_returns_store_value_and_second_read_skips_store() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;

    let first = h.layer.read(id).await?;
    assert_eq!(Some(first.clone()), h.store.inner().find_by_id(id).await?);
    assert_eq!(h.store.find_by_id_calls(), 1);

    let second = h.layer.read(id).await?;
    assert_eq!(second, first);
    assert_eq!(h.store.find_by_id_calls(), 1, "second read must be a cache hit");
    Ok(())
}

#[tokio::test]
async fn read_all_populates_collection_on_miss() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada(), grace()]).await?;
    h.cache.inner().delete(COLLECTION).await.ok();

    let all = h.layer.read_all().await?;
    assert_eq!(all.len(), 2);
    assert_eq!(h.store.find_all_calls(), 1);
    for contact in &created {
        assert!(all.contains(contact));
    }

    h.layer.read_all().await?;
    assert_eq!(h.store.find_all_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn read_of_unknown_id_is_not_found_and_caches_nothing() -> RolodexResult<()> {
    let h = Harness::new(CacheConfig::default());
    let id = ContactId::now_v7();

    assert_not_found(&h.layer.read(id).await, id);
    assert!(h.raw(&record_key(id)).await.is_none());
    assert!(h.cache.write_log().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn record_entry_expires_and_repopulates() -> RolodexResult<()> {
    let config = CacheConfig::new().with_ttl(Duration::from_secs(30));
    let (h, created) = Harness::seeded(config, vec![ada()]).await?;
    let id = created[0].id;

    h.layer.read(id).await?;
    tokio::time::advance(Duration::from_secs(31)).await;
    h.layer.read(id).await?;
    assert_eq!(h.store.find_by_id_calls(), 2);
    Ok(())
}

// ============================================================================
// CREATE
// ============================================================================

#[tokio::test]
async fn create_rewrites_collection_from_store() -> RolodexResult<()> {
    let (h, _) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let listed = h.layer.read_all().await?;
    assert_eq!(listed.len(), 1);

    let created = h.layer.create(grace()).await?;
    assert_eq!(h.store.find_all_calls(), 1, "create re-fetches the list");

    let all = h.layer.read_all().await?;
    assert_eq!(all.len(), 2);
    assert!(all.contains(&created));
    assert_eq!(h.store.find_all_calls(), 1, "list read after create is a hit");
    Ok(())
}

#[tokio::test]
async fn create_does_not_touch_record_entries() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    h.layer.read(created[0].id).await?;
    h.cache.clear_write_log();

    h.layer.create(grace()).await?;
    let keys: Vec<String> = h
        .cache
        .write_log()
        .iter()
        .map(|w| w.key().to_string())
        .collect();
    assert_eq!(keys, vec![COLLECTION.to_string()]);
    Ok(())
}

#[tokio::test]
async fn create_duplicate_is_conflict_and_leaves_cache_alone() -> RolodexResult<()> {
    let (h, _) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;

    let dup = NewContact::new("Imposter", "ada@example.com", "555-7777");
    assert_conflict(&h.layer.create(dup).await, "email");
    assert!(h.cache.write_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn create_rejects_blank_fields() {
    let h = Harness::new(CacheConfig::default());
    assert_validation(&h.layer.create(NewContact::new("Ada", "ada@x.io", "  ")).await);
    assert_eq!(h.store.writes(), 0);
}

// ============================================================================
// UPDATE
// ============================================================================

#[tokio::test]
async fn read_after_update_reflects_patch() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;
    h.layer.read(id).await?;

    let patch = ContactPatch::default().with_name("Countess of Lovelace");
    let updated = h.layer.update(id, patch).await?;
    assert_eq!(updated.name, "Countess of Lovelace");

    h.store.reset_counts();
    let read = h.layer.read(id).await?;
    assert_eq!(read.name, "Countess of Lovelace");
    assert_eq!(h.store.find_by_id_calls(), 0, "overwritten entry serves the read");
    Ok(())
}

#[tokio::test]
async fn collection_stays_stale_after_update_by_default() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada(), grace()]).await?;
    let id = created[0].id;
    h.layer.read_all().await?;

    h.layer
        .update(id, ContactPatch::default().with_phone("555-9000"))
        .await?;

    let listed = h.layer.read_all().await?;
    let stale = listed.iter().find(|c| c.id == id).map(|c| c.phone.clone());
    assert_eq!(stale.as_deref(), Some("555-0100"));
    assert_eq!(h.layer.read(id).await?.phone, "555-9000");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stale_collection_heals_after_ttl() -> RolodexResult<()> {
    let config = CacheConfig::new().with_ttl(Duration::from_secs(60));
    let (h, created) = Harness::seeded(config, vec![ada()]).await?;
    let id = created[0].id;

    h.layer
        .update(id, ContactPatch::default().with_name("Ada King"))
        .await?;
    assert_eq!(h.layer.read_all().await?[0].name, "Ada Lovelace");

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(h.layer.read_all().await?[0].name, "Ada King");
    Ok(())
}

#[tokio::test]
async fn invalidate_policy_drops_collection_on_update() -> RolodexResult<()> {
    let config = CacheConfig::new().with_collection_policy(CollectionPolicy::InvalidateOnUpdate);
    let (h, created) = Harness::seeded(config, vec![ada()]).await?;
    let id = created[0].id;

    h.layer
        .update(id, ContactPatch::default().with_name("Ada King"))
        .await?;
    assert!(h.raw(COLLECTION).await.is_none());
    assert_eq!(h.layer.read_all().await?[0].name, "Ada King");
    Ok(())
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found_without_cache_writes() -> RolodexResult<()> {
    let (h, _) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = ContactId::now_v7();

    let result = h
        .layer
        .update(id, ContactPatch::default().with_name("Ghost"))
        .await;
    assert_not_found(&result, id);
    assert!(h.cache.write_log().is_empty());
    Ok(())
}

#[tokio::test]
async fn update_into_taken_email_is_conflict() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada(), grace()]).await?;
    let result = h
        .layer
        .update(
            created[0].id,
            ContactPatch::default().with_email("grace@example.com"),
        )
        .await;
    assert_conflict(&result, "email");
    Ok(())
}

#[tokio::test]
async fn empty_update_is_rejected_before_store() {
    let h = Harness::new(CacheConfig::default());
    assert_validation(&h.layer.update(ContactId::now_v7(), ContactPatch::default()).await);
    assert_eq!(h.store.writes(), 0);
}

// ============================================================================
// DELETE
// ============================================================================

#[tokio::test]
async fn delete_removes_record_and_filters_collection() -> RolodexResult<()> {
    let (h, created) =
        Harness::seeded(CacheConfig::default(), vec![ada(), grace(), linus()]).await?;
    let victim = created[1].id;
    h.layer.read(victim).await?;
    h.layer.read_all().await?;

    let removed = h.layer.delete(victim).await?;
    assert_eq!(removed.id, victim);
    assert!(h.raw(&record_key(victim)).await.is_none());

    h.store.reset_counts();
    let listed = h.layer.read_all().await?;
    assert_eq!(h.store.find_all_calls(), 0, "filtered collection is still cached");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|c| c.id != victim));

    assert_not_found(&h.layer.read(victim).await, victim);
    Ok(())
}

#[tokio::test]
async fn delete_without_cached_collection_only_drops_record_key() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;
    h.cache.inner().delete(COLLECTION).await.ok();

    h.layer.delete(id).await?;
    assert_eq!(
        h.cache.write_log(),
        vec![CacheWrite::Delete {
            key: record_key(id)
        }]
    );
    assert!(h.raw(COLLECTION).await.is_none());
    Ok(())
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found_without_cache_mutation() -> RolodexResult<()> {
    let (h, _) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let before = h.raw(COLLECTION).await;
    let id = ContactId::now_v7();

    assert_not_found(&h.layer.delete(id).await, id);
    assert!(h.cache.write_log().is_empty());
    assert_eq!(h.raw(COLLECTION).await, before);
    Ok(())
}

#[tokio::test]
async fn second_delete_is_not_found() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;
    h.layer.delete(id).await?;
    h.cache.clear_write_log();

    assert_not_found(&h.layer.delete(id).await, id);
    assert!(h.cache.write_log().is_empty());
    Ok(())
}

// ============================================================================
// TTL POLICY
// ============================================================================

#[tokio::test]
async fn populate_writes_always_carry_ttl() -> RolodexResult<()> {
    let config = CacheConfig::new().with_write_ttl(WriteTtl::Persist);
    let (h, created) = Harness::seeded(config, vec![ada()]).await?;

    h.layer.read(created[0].id).await?;
    assert_eq!(
        h.cache.write_log(),
        vec![CacheWrite::SetWithTtl {
            key: record_key(created[0].id),
            ttl: Duration::from_secs(3600),
        }]
    );
    Ok(())
}

#[tokio::test]
async fn persist_mode_overwrites_without_ttl() -> RolodexResult<()> {
    let config = CacheConfig::new().with_write_ttl(WriteTtl::Persist);
    let (h, created) = Harness::seeded(config, vec![ada()]).await?;
    let id = created[0].id;

    h.layer
        .update(id, ContactPatch::default().with_name("Ada King"))
        .await?;
    h.layer.delete(id).await?;
    let log = h.cache.write_log();
    assert_eq!(
        log,
        vec![
            CacheWrite::Set {
                key: record_key(id)
            },
            CacheWrite::Delete {
                key: record_key(id)
            },
            CacheWrite::Set {
                key: COLLECTION.to_string()
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn reapply_mode_overwrites_with_ttl() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;

    h.layer
        .update(id, ContactPatch::default().with_name("Ada King"))
        .await?;
    assert!(matches!(
        h.cache.write_log().as_slice(),
        [CacheWrite::SetWithTtl { ttl, .. }] if *ttl == Duration::from_secs(3600)
    ));
    Ok(())
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_misses_converge_on_store_value() -> RolodexResult<()> {
    let store = CountingStore::new().with_read_delay(Duration::from_millis(50));
    let h = Harness::with_store(store, CacheConfig::default());
    let created = h.layer.create(ada()).await?;
    h.reset();

    let (a, b) = tokio::join!(h.layer.read(created.id), h.layer.read(created.id));
    let (a, b) = (a?, b?);
    assert_eq!(a, created);
    assert_eq!(b, created);
    assert_eq!(h.store.find_by_id_calls(), 2, "both readers missed");

    let cached = h.raw(&record_key(created.id)).await.expect("entry populated");
    assert_eq!(payload::decode_record(created.id, &cached), Ok(created));
    Ok(())
}

// ============================================================================
// PARTIAL FAILURES
// ============================================================================

#[tokio::test]
async fn delete_with_rejected_writes_still_evicts_record_and_collection() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada(), grace()]).await?;
    let id = created[0].id;
    h.layer.read(id).await?;
    assert!(h.raw(&record_key(id)).await.is_some());
    assert!(h.raw(COLLECTION).await.is_some());

    h.cache.set_mode(CacheMode::RejectWrites);
    let removed = h.layer.delete(id).await?;
    assert_eq!(removed.id, id);
    assert!(h.raw(&record_key(id)).await.is_none());
    assert!(h.raw(COLLECTION).await.is_none(), "unrewritable collection is dropped");

    h.cache.set_mode(CacheMode::Healthy);
    assert_not_found(&h.layer.delete(id).await, id);
    assert_not_found(&h.layer.read(id).await, id);
    let listed = h.layer.read_all().await?;
    assert_eq!(listed, vec![created[1].clone()]);
    Ok(())
}

#[tokio::test]
async fn delete_evicts_record_before_touching_collection() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;

    h.layer.delete(id).await?;
    let keys: Vec<String> = h
        .cache
        .write_log()
        .iter()
        .map(|w| w.key().to_string())
        .collect();
    assert_eq!(keys, vec![record_key(id), COLLECTION.to_string()]);
    Ok(())
}

#[tokio::test]
async fn update_with_failed_refetch_drops_record_entry() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;
    h.layer.read(id).await?;

    h.store.fail_next_find_by_id();
    let updated = h
        .layer
        .update(id, ContactPatch::default().with_name("Countess"))
        .await?;
    assert_eq!(updated.name, "Countess");
    assert!(h.raw(&record_key(id)).await.is_none());

    assert_eq!(h.layer.read(id).await?.name, "Countess");
    Ok(())
}

#[tokio::test]
async fn update_with_rejected_write_drops_record_entry() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;
    h.layer.read(id).await?;

    h.cache.set_mode(CacheMode::RejectWrites);
    h.layer
        .update(id, ContactPatch::default().with_name("Countess"))
        .await?;
    assert!(h.raw(&record_key(id)).await.is_none());

    h.cache.set_mode(CacheMode::Healthy);
    assert_eq!(h.layer.read(id).await?.name, "Countess");
    Ok(())
}

#[tokio::test]
async fn create_with_rejected_write_drops_collection() -> RolodexResult<()> {
    let (h, _) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    assert!(h.raw(COLLECTION).await.is_some());

    h.cache.set_mode(CacheMode::RejectWrites);
    let made = h.layer.create(grace()).await?;
    assert!(h.raw(COLLECTION).await.is_none());

    h.cache.set_mode(CacheMode::Healthy);
    let listed = h.layer.read_all().await?;
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&made));
    Ok(())
}

// ============================================================================
// DEGRADED CACHE
// ============================================================================

#[tokio::test]
async fn unavailable_cache_fails_open_for_every_operation() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    h.cache.set_mode(CacheMode::Unavailable);

    let id = created[0].id;
    assert_eq!(h.layer.read(id).await?, created[0]);
    assert_eq!(h.layer.read_all().await?.len(), 1);
    let made = h.layer.create(grace()).await?;
    h.layer
        .update(made.id, ContactPatch::default().with_name("Rear Admiral"))
        .await?;
    h.layer.delete(id).await?;

    assert_eq!(h.store.inner().len(), 1);
    assert!(h.layer.stats().degraded_ops > 0);
    Ok(())
}

#[tokio::test]
async fn backend_errors_are_not_swallowed() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    h.cache.set_mode(CacheMode::Failing);

    let err = h.layer.read(created[0].id).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(!err.is_not_found());
    Ok(())
}

#[tokio::test]
async fn corrupt_record_entry_is_a_miss_and_is_replaced() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada()]).await?;
    let id = created[0].id;
    h.cache
        .inner()
        .set(&record_key(id), b"{\"not\":\"a contact\"}")
        .await
        .ok();

    assert_eq!(h.layer.read(id).await?, created[0]);
    assert_eq!(h.store.find_by_id_calls(), 1);
    assert_eq!(h.layer.stats().corrupt_entries, 1);

    let repaired = h.raw(&record_key(id)).await.expect("entry repopulated");
    assert_eq!(payload::decode_record(id, &repaired), Ok(created[0].clone()));
    Ok(())
}

#[tokio::test]
async fn record_cached_under_wrong_key_is_a_miss() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada(), grace()]).await?;
    let (a, g) = (&created[0], &created[1]);
    let foreign = payload::encode_record(g).map_err(rolodex_test_utils::RolodexError::from)?;
    h.cache.inner().set(&record_key(a.id), &foreign).await.ok();

    assert_eq!(&h.layer.read(a.id).await?, a);
    assert_eq!(h.layer.stats().corrupt_entries, 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_collection_is_dropped_on_delete() -> RolodexResult<()> {
    let (h, created) = Harness::seeded(CacheConfig::default(), vec![ada(), grace()]).await?;
    h.cache.inner().set(COLLECTION, b"garbage").await.ok();

    h.layer.delete(created[0].id).await?;
    assert!(h.raw(COLLECTION).await.is_none());

    let listed = h.layer.read_all().await?;
    assert_eq!(listed, vec![created[1].clone()]);
    Ok(())
}
