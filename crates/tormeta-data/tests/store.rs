use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tormeta_data::{AccessTokenRecord, DataError, NewUser, SqliteTorrentStore, UserStore, connect};
use tormeta_torrent_core::{InfoHash, NewTorrent, TorrentError, TorrentPatch, TorrentStore};

const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

async fn store() -> Result<SqliteTorrentStore> {
    Ok(SqliteTorrentStore::new(connect("sqlite::memory:").await?))
}

fn magnet(name: &str) -> NewTorrent {
    NewTorrent {
        name: Some(name.to_string()),
        correct_name: Some(format!("{name} (display)")),
        source: format!("magnet:?xt=urn:btih:{HASH}&dn={name}"),
        tags: vec!["movie".to_string(), "Drama, Crime".to_string()],
        ..NewTorrent::default()
    }
}

#[tokio::test]
async fn create_starts_unconfirmed_and_round_trips_tags() -> Result<()> {
    let store = store().await?;
    let created = store.create(magnet("Foo")).await?;
    assert!(!created.added);
    assert!(created.error.is_none());
    assert_eq!(created.tags, vec!["movie", "Drama, Crime"]);
    assert!(created.custom_metadata.is_empty());
    assert_eq!(created.correct_name.as_deref(), Some("Foo (display)"));

    let fetched = store.get_by_id(created.id).await?;
    assert_eq!(fetched.map(|record| record.tags), Some(created.tags));
    Ok(())
}

#[tokio::test]
async fn mark_added_and_record_error_toggle_status() -> Result<()> {
    let store = store().await?;
    let created = store.create(magnet("Foo")).await?;
    let hash = InfoHash::parse(HASH)?;

    store.record_error(created.id, "daemon unavailable").await?;
    let failed = store.get_by_id(created.id).await?;
    assert!(matches!(failed, Some(ref record) if !record.added && record.error.as_deref() == Some("daemon unavailable")));

    store.mark_added(created.id, &hash).await?;
    let confirmed = store.get_by_id(created.id).await?;
    assert!(matches!(confirmed, Some(ref record) if record.added && record.error.is_none() && record.info_hash.as_ref() == Some(&hash)));

    assert!(matches!(
        store.mark_added(9_999, &hash).await,
        Err(TorrentError::NotFound { record_id: 9_999 })
    ));
    Ok(())
}

#[tokio::test]
async fn find_matches_source_or_hash() -> Result<()> {
    let store = store().await?;
    let created = store.create(magnet("Foo")).await?;
    let source = created.source.clone().unwrap_or_default();
    assert_eq!(
        store.find_by_source_or_hash(&source).await?.map(|record| record.id),
        Some(created.id)
    );
    assert!(store.find_by_source_or_hash(HASH).await?.is_none());

    store.mark_added(created.id, &InfoHash::parse(HASH)?).await?;
    assert_eq!(
        store
            .find_by_source_or_hash(&HASH.to_ascii_uppercase())
            .await?
            .map(|record| record.id),
        Some(created.id)
    );
    Ok(())
}

#[tokio::test]
async fn update_only_touches_supplied_fields() -> Result<()> {
    let store = store().await?;
    let created = store.create(magnet("Foo")).await?;
    let mut metadata = Map::new();
    metadata.insert("quality".to_string(), Value::from("2160p"));

    let updated = store
        .update(
            created.id,
            TorrentPatch {
                season: Some(2),
                tags: Some(vec!["tv".to_string()]),
                custom_metadata: Some(metadata.clone()),
                ..TorrentPatch::default()
            },
        )
        .await?;
    assert_eq!(updated.name.as_deref(), Some("Foo"));
    assert_eq!(updated.season, Some(2));
    assert_eq!(updated.tags, vec!["tv"]);
    assert_eq!(updated.custom_metadata, metadata);

    assert!(matches!(
        store.update(404, TorrentPatch::default()).await,
        Err(TorrentError::NotFound { record_id: 404 })
    ));
    Ok(())
}

#[tokio::test]
async fn listings_are_newest_first_and_delete_reports_presence() -> Result<()> {
    let store = store().await?;
    let first = store.create(magnet("one")).await?;
    let second = store.create(magnet("two")).await?;

    let ids: Vec<i64> = store.list_all().await?.iter().map(|record| record.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(store.list_recent(1).await?.len(), 1);

    assert!(store.delete(first.id).await?);
    assert!(!store.delete(first.id).await?);
    assert_eq!(store.list_all().await?.len(), 1);
    store.ping().await?;
    Ok(())
}

#[tokio::test]
async fn usernames_are_unique() -> Result<()> {
    let users = UserStore::new(connect("sqlite::memory:").await?);
    let user = NewUser {
        username: "alice",
        email: None,
        password_hash: "$argon2id$stub",
        is_admin: false,
    };
    let created = users.create_user(user.clone()).await?;
    assert!(created.is_active);
    assert_eq!(users.count_users().await?, 1);
    assert!(matches!(
        users.create_user(user).await,
        Err(DataError::Conflict { field: "username", .. })
    ));
    assert_eq!(
        users.find_user_by_username("alice").await?.map(|found| found.id),
        Some(created.id)
    );
    Ok(())
}

#[tokio::test]
async fn expired_tokens_are_purged() -> Result<()> {
    let users = UserStore::new(connect("sqlite::memory:").await?);
    let owner = users
        .create_user(NewUser {
            username: "bob",
            email: Some("bob@example.test"),
            password_hash: "$argon2id$stub",
            is_admin: true,
        })
        .await?;
    let now = Utc::now();
    for (token_id, offset) in [("live", Duration::minutes(30)), ("stale", -Duration::minutes(1))] {
        users
            .insert_token(&AccessTokenRecord {
                token_id: token_id.to_string(),
                user_id: owner.id,
                secret_hash: "$argon2id$secret".to_string(),
                expires_at: now + offset,
                created_at: now,
            })
            .await?;
    }

    assert_eq!(users.delete_expired_tokens(now).await?, 1);
    assert!(users.find_token("stale").await?.is_none());
    assert_eq!(
        users.find_token("live").await?.map(|token| token.user_id),
        Some(owner.id)
    );
    Ok(())
}
