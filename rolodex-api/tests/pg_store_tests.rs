//! PostgreSQL smoke tests for the contact store.
//!
//! Run with `--features db-tests` against the database named by the
//! `ROLODEX_DB_*` variables.

#![cfg(feature = "db-tests")]

use rolodex_api::{ApiResult, DbConfig, PgContactStore};
use rolodex_core::{ContactId, ContactPatch, NewContact, RolodexError};
use rolodex_storage::ContactStore;

async fn test_store() -> ApiResult<PgContactStore> {
    let store = PgContactStore::from_config(&DbConfig::from_env())?;
    store.migrate().await?;
    Ok(store)
}

fn unique_contact(tag: &str) -> NewContact {
    let seed = ContactId::now_v7();
    NewContact::new(
        format!("Smoke {}", tag),
        format!("{}.{}@example.com", tag, seed),
        format!("smoke-{}", seed),
    )
}

#[tokio::test]
async fn smoke_test_contact_crud_chain() -> ApiResult<()> {
    let store = test_store().await?;
    store.health_check().await?;

    let created = store.insert(unique_contact("crud")).await?;
    assert_eq!(created.created_at, created.updated_at);

    let fetched = store.find_by_id(created.id).await?;
    assert_eq!(fetched.as_ref(), Some(&created));

    let all = store.find_all().await?;
    assert!(all.iter().any(|c| c.id == created.id));

    let patch = ContactPatch::default().with_name("Smoke Renamed");
    let updated = store
        .update_by_id(created.id, &patch)
        .await?
        .ok_or_else(|| RolodexError::not_found(created.id))?;
    assert_eq!(updated.name, "Smoke Renamed");
    assert_eq!(updated.email, created.email);
    assert!(updated.updated_at >= created.updated_at);

    let deleted = store.delete_by_id(created.id).await?;
    assert_eq!(deleted.map(|c| c.id), Some(created.id));
    assert_eq!(store.find_by_id(created.id).await?, None);
    Ok(())
}

#[tokio::test]
async fn smoke_test_unique_constraints() -> ApiResult<()> {
    let store = test_store().await?;
    let original = store.insert(unique_contact("unique")).await?;

    let mut same_email = unique_contact("unique-email");
    same_email.email = original.email.clone();
    let err = store.insert(same_email).await.err();
    assert_eq!(
        err,
        Some(RolodexError::conflict("email", original.email.as_str()))
    );

    let mut same_phone = unique_contact("unique-phone");
    same_phone.phone = original.phone.clone();
    let err = store.insert(same_phone).await.err();
    assert!(
        matches!(&err, Some(RolodexError::Conflict { field, .. }) if field == "phone"),
        "expected phone conflict, got {:?}",
        err
    );

    store.delete_by_id(original.id).await?;
    Ok(())
}

#[tokio::test]
async fn smoke_test_missing_ids() -> ApiResult<()> {
    let store = test_store().await?;
    let missing = ContactId::now_v7();

    assert_eq!(store.find_by_id(missing).await?, None);
    assert_eq!(store.delete_by_id(missing).await?, None);
    let patch = ContactPatch::default().with_phone("000-000000");
    assert_eq!(store.update_by_id(missing, &patch).await?, None);
    Ok(())
}
