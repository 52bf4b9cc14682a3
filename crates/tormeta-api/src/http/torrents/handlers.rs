//! Torrent record handlers: ingest, listing, edits, and daemon controls.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Multipart, Path as AxumPath, State},
    http::StatusCode,
};
use tormeta_torrent_core::{InfoHash, NewTorrent, TorrentPatch, TorrentRecord, normalize_tags};
use tracing::info;

use crate::http::auth::AuthContext;
use crate::http::constants::RECENT_LIMIT;
use crate::http::errors::ApiError;
use crate::http::torrents::ingest::IngestForm;
use crate::http::torrents::{Acknowledged, TorrentOut};
use crate::state::ApiState;

pub(crate) async fn ingest_torrent(
    State(state): State<Arc<ApiState>>,
    Extension(context): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TorrentOut>), ApiError> {
    let form = IngestForm::read(multipart).await?;
    let submission = form.into_submission(&state.upload_dir).await?;

    let record = match existing_record(&state, &submission).await? {
        Some(current) => state
            .store
            .update(current.id, TorrentPatch::from_submission(&submission))
            .await
            .map_err(|err| ApiError::from_torrent(&err, "failed to update torrent"))?,
        None => state
            .store
            .create(submission)
            .await
            .map_err(|err| ApiError::from_torrent(&err, "failed to create torrent"))?,
    };

    state
        .workflow
        .submit(record.clone())
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to schedule transfer"))?;
    state.workflow.records_changed();
    info!(
        record_id = record.id,
        user_id = context.user_id,
        username = %context.username,
        "torrent ingested"
    );
    Ok((StatusCode::CREATED, Json(record.into())))
}

pub(crate) async fn list_torrents(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<TorrentOut>>, ApiError> {
    let records = state
        .store
        .list_recent(RECENT_LIMIT)
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to list torrents"))?;
    Ok(Json(records.into_iter().map(TorrentOut::from).collect()))
}

pub(crate) async fn get_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<TorrentOut>, ApiError> {
    Ok(Json(load(&state, id).await?.into()))
}

pub(crate) async fn get_torrent_by_hash(
    State(state): State<Arc<ApiState>>,
    AxumPath(raw): AxumPath<String>,
) -> Result<Json<TorrentOut>, ApiError> {
    let hash = InfoHash::parse(&raw).map_err(|err| ApiError::from_torrent(&err, "invalid hash"))?;
    let record = state
        .store
        .find_by_source_or_hash(hash.as_str())
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to look up torrent"))?
        .filter(|record| record.info_hash.as_ref() == Some(&hash))
        .ok_or_else(|| ApiError::not_found("torrent not found"))?;
    Ok(Json(record.into()))
}

pub(crate) async fn update_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<i64>,
    Json(mut patch): Json<TorrentPatch>,
) -> Result<Json<TorrentOut>, ApiError> {
    let current = load(&state, id).await?;
    if patch.is_empty() {
        return Ok(Json(current.into()));
    }
    patch.tags = patch.tags.map(normalize_tags);
    let tags_changed = patch.tags.is_some();

    let record = state
        .store
        .update(id, patch)
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to update torrent"))?;
    if tags_changed && record.info_hash.is_some() {
        state
            .workflow
            .sync_tags(record.clone())
            .await
            .map_err(|err| ApiError::from_torrent(&err, "failed to schedule tag sync"))?;
    }
    state.workflow.records_changed();
    Ok(Json(record.into()))
}

pub(crate) async fn stop_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Acknowledged>, ApiError> {
    let hash = hash_of(load(&state, id).await?)?;
    state
        .workflow
        .pause(&hash)
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to pause transfer"))?;
    info!(record_id = id, info_hash = %hash, "transfer paused");
    Ok(Json(Acknowledged::OK))
}

pub(crate) async fn resume_torrent(
    State(state): State<Arc<ApiState>>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Acknowledged>, ApiError> {
    let hash = hash_of(load(&state, id).await?)?;
    state
        .workflow
        .resume(&hash)
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to resume transfer"))?;
    info!(record_id = id, info_hash = %hash, "transfer resumed");
    Ok(Json(Acknowledged::OK))
}

/// Remove the transfer (with its files) from the daemon, then the record.
///
/// A record the daemon never acknowledged has no hash; only the record is removed.
pub(crate) async fn delete_torrent(
    State(state): State<Arc<ApiState>>,
    Extension(context): Extension<AuthContext>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<Acknowledged>, ApiError> {
    let record = load(&state, id).await?;
    if let Some(hash) = &record.info_hash {
        state
            .workflow
            .remove(hash, true)
            .await
            .map_err(|err| ApiError::from_torrent(&err, "failed to remove transfer"))?;
    }
    state
        .store
        .delete(id)
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to delete torrent"))?;
    state.workflow.records_changed();
    info!(record_id = id, user_id = context.user_id, "torrent deleted");
    Ok(Json(Acknowledged::OK))
}

/// Record already holding this submission's source, or failing that its hash.
async fn existing_record(
    state: &ApiState,
    submission: &NewTorrent,
) -> Result<Option<TorrentRecord>, ApiError> {
    let lookup = |key: String| async move {
        state
            .store
            .find_by_source_or_hash(&key)
            .await
            .map_err(|err| ApiError::from_torrent(&err, "failed to look up torrent"))
    };
    if let Some(record) = lookup(submission.source.clone()).await? {
        return Ok(Some(record));
    }
    let Some(hash) = &submission.info_hash else {
        return Ok(None);
    };
    // A v2 hash is stored as the daemon's truncated id once the add is acknowledged.
    for candidate in [hash.clone(), hash.transfer_id()] {
        let found = lookup(candidate.as_str().to_string())
            .await?
            .filter(|record| record.info_hash.as_ref() == Some(&candidate));
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

async fn load(state: &ApiState, id: i64) -> Result<TorrentRecord, ApiError> {
    state
        .store
        .get_by_id(id)
        .await
        .map_err(|err| ApiError::from_torrent(&err, "failed to load torrent"))?
        .ok_or_else(|| ApiError::not_found("torrent not found"))
}

fn hash_of(record: TorrentRecord) -> Result<InfoHash, ApiError> {
    record
        .info_hash
        .ok_or_else(|| ApiError::not_found("torrent has no info-hash yet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{METAINFO, TestApi, multipart};
    use tormeta_test_support::MemoryStore;
    use tormeta_test_support::fixtures::{hash, record};
    use tormeta_torrent_core::info_hash_from_metainfo;

    fn caller() -> Extension<AuthContext> {
        Extension(AuthContext {
            user_id: 1,
            username: "alice".to_string(),
        })
    }

    fn api_with(records: Vec<TorrentRecord>) -> anyhow::Result<TestApi> {
        TestApi::with_store(MemoryStore::with_records(records))
    }

    fn problem<T: std::fmt::Debug>(result: Result<T, ApiError>) -> ApiError {
        match result {
            Ok(value) => panic!("expected a problem response, got {value:?}"),
            Err(err) => err,
        }
    }

    #[tokio::test]
    async fn magnet_ingest_creates_then_submits() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let source = format!("magnet:?xt=urn:btih:{}&dn=Foo", "ABCDEF0123".repeat(4));
        let form = multipart(
            &[
                ("source", source.as_str()),
                ("tags", "movie,4k"),
                ("year", "1999"),
            ],
            None,
        )
        .await?;

        let (status, Json(out)) = ingest_torrent(State(api.state.clone()), caller(), form)
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(out.name.as_deref(), Some("Foo"));
        assert_eq!(out.info_hash, Some("abcdef0123".repeat(4)));
        assert!(!out.qb_added);
        assert_eq!(out.tags, vec!["movie".to_string(), "4k".to_string()]);
        assert_eq!(api.workflow.submitted().len(), 1);
        assert_eq!(api.workflow.changes(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn resubmitting_a_source_updates_the_record() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let source = "https://tracker.example/Foo.torrent";
        for year in ["", "2001"] {
            let form = multipart(&[("source", source), ("year", year)], None).await?;
            let (status, _) = ingest_torrent(State(api.state.clone()), caller(), form)
                .await
                .map_err(|err| anyhow::anyhow!("{err:?}"))?;
            assert_eq!(status, StatusCode::CREATED);
        }

        let records = api.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year, Some(2001));
        assert_eq!(records[0].name.as_deref(), Some("Foo"));
        assert_eq!(api.workflow.submitted().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn same_hash_from_another_magnet_updates_the_record() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let topic = "ABCDEF0123".repeat(4);
        for (display, year) in [("Foo", "1999"), ("Bar", "2001")] {
            let source = format!("magnet:?xt=urn:btih:{topic}&dn={display}&tr=udp%3A%2F%2Ft");
            let form = multipart(&[("source", source.as_str()), ("year", year)], None).await?;
            let (_, Json(out)) = ingest_torrent(State(api.state.clone()), caller(), form)
                .await
                .map_err(|err| anyhow::anyhow!("{err:?}"))?;
            assert_eq!(out.id, 1);
        }

        let records = api.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].year, Some(2001));
        assert_eq!(records[0].name.as_deref(), Some("Bar"));
        Ok(())
    }

    #[tokio::test]
    async fn upload_ingest_writes_under_upload_dir() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let form = multipart(&[], Some(("show.torrent", METAINFO))).await?;

        let (_, Json(out)) = ingest_torrent(State(api.state.clone()), caller(), form)
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;

        let stored = api.upload_path().join("show.torrent");
        assert!(stored.exists());
        assert_eq!(out.source, Some(stored.to_string_lossy().into_owned()));
        assert_eq!(
            out.info_hash,
            Some(info_hash_from_metainfo(METAINFO)?.as_str().to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_upload_is_rejected_before_storage() -> anyhow::Result<()> {
        let api = TestApi::new()?;
        let form = multipart(&[], Some(("bad.torrent", b"not bencode"))).await?;
        let err = problem(ingest_torrent(State(api.state.clone()), caller(), form).await);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(api.store.records().is_empty());
        assert!(api.workflow.submitted().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn listing_is_newest_first() -> anyhow::Result<()> {
        let api = api_with(vec![record(1, None, "a"), record(3, None, "c"), record(2, None, "b")])?;
        let Json(listed) = list_torrents(State(api.state.clone()))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        let ids: Vec<i64> = listed.iter().map(|out| out.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn lookups_return_not_found() -> anyhow::Result<()> {
        let api = api_with(vec![record(1, Some(hash(1)), "a")])?;

        let Json(found) =
            get_torrent_by_hash(State(api.state.clone()), AxumPath(hash(1).as_str().to_uppercase()))
                .await
                .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(found.id, 1);

        let missing = problem(get_torrent(State(api.state.clone()), AxumPath(9)).await);
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        let unknown = problem(
            get_torrent_by_hash(State(api.state.clone()), AxumPath(hash(2).as_str().to_string()))
                .await,
        );
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn patch_syncs_tags_only_for_hashed_records() -> anyhow::Result<()> {
        let api = api_with(vec![record(1, Some(hash(1)), "a"), record(2, None, "b")])?;
        let patch = || TorrentPatch {
            tags: Some(vec![" movie ".to_string(), String::new()]),
            ..TorrentPatch::default()
        };

        let Json(out) = update_torrent(State(api.state.clone()), AxumPath(1), Json(patch()))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(out.tags, vec!["movie".to_string()]);
        let Json(unhashed) = update_torrent(State(api.state.clone()), AxumPath(2), Json(patch()))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(unhashed.tags, vec!["movie".to_string()]);

        let synced = api.workflow.tag_syncs();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].id, 1);
        assert_eq!(api.workflow.changes(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn controls_require_a_hash_and_surface_daemon_errors() -> anyhow::Result<()> {
        let api = api_with(vec![record(1, Some(hash(1)), "a"), record(2, None, "b")])?;

        let Json(paused) = stop_torrent(State(api.state.clone()), AxumPath(1))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        let Json(resumed) = resume_torrent(State(api.state.clone()), AxumPath(1))
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert!(paused.ok && resumed.ok);
        assert_eq!(
            api.workflow.controls(),
            vec![("pause", hash(1)), ("resume", hash(1))]
        );

        let unhashed = problem(stop_torrent(State(api.state.clone()), AxumPath(2)).await);
        assert_eq!(unhashed.status, StatusCode::NOT_FOUND);

        api.workflow.set_failing(true);
        let failed = problem(resume_torrent(State(api.state.clone()), AxumPath(1)).await);
        assert_eq!(failed.status, StatusCode::BAD_GATEWAY);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_files_then_the_record() -> anyhow::Result<()> {
        let api = api_with(vec![record(1, Some(hash(1)), "a"), record(2, None, "b")])?;

        for id in [1, 2] {
            let Json(ack) = delete_torrent(State(api.state.clone()), caller(), AxumPath(id))
                .await
                .map_err(|err| anyhow::anyhow!("{err:?}"))?;
            assert!(ack.ok);
        }

        assert_eq!(api.workflow.controls(), vec![("delete", hash(1))]);
        assert!(api.store.records().is_empty());

        let gone = problem(delete_torrent(State(api.state.clone()), caller(), AxumPath(1)).await);
        assert_eq!(gone.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn daemon_failure_keeps_the_record() -> anyhow::Result<()> {
        let api = api_with(vec![record(1, Some(hash(1)), "a")])?;
        api.workflow.set_failing(true);
        let err = problem(delete_torrent(State(api.state.clone()), caller(), AxumPath(1)).await);
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api.store.records().len(), 1);
        Ok(())
    }
}
