//! Multipart ingest form parsing and submission building.
//!
//! A submission names its transfer either by an uploaded metainfo file or by a
//! `source` field holding a magnet URI or remote URL. Uploads are written under
//! the upload directory and hashed locally; magnets are hashed by parsing;
//! remote URLs stay unhashed until the daemon reports them.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use serde_json::{Map, Value};
use tormeta_torrent_core::{
    NewTorrent, TransferSource, info_hash_from_metainfo, parse_magnet, parse_tag_list,
};
use tracing::{debug, error};
use url::Url;

use crate::http::errors::ApiError;

const UNKNOWN_NAME: &str = "Unknown";
const DEFAULT_UPLOAD_NAME: &str = "upload.torrent";

/// Uploaded metainfo file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Upload {
    pub(crate) file_name: String,
    pub(crate) bytes: Vec<u8>,
}

/// Parsed ingest form fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct IngestForm {
    pub(crate) upload: Option<Upload>,
    pub(crate) source: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) save_path: Option<String>,
    pub(crate) media_type: Option<String>,
    pub(crate) season: Option<i32>,
    pub(crate) episode: Option<i32>,
    pub(crate) episode_title: Option<String>,
    pub(crate) year: Option<i32>,
    pub(crate) poster: Option<String>,
    pub(crate) tmdb_id: Option<i64>,
    pub(crate) tags: Vec<String>,
    pub(crate) custom_metadata: Map<String, Value>,
}

impl IngestForm {
    /// Drain a multipart body into a form; unknown fields are ignored.
    pub(crate) async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::bad_request(format!("invalid multipart body: {err}")))?
        {
            let Some(key) = field.name().map(str::to_string) else {
                continue;
            };
            if key == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("invalid upload: {err}")))?;
                if !bytes.is_empty() {
                    form.upload = Some(Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }
            let value = text(field).await?;
            form.apply(&key, value)?;
        }
        Ok(form)
    }

    fn apply(&mut self, key: &str, value: String) -> Result<(), ApiError> {
        match key {
            "source" => self.source = non_blank(&value),
            "name" => self.name = non_blank(&value),
            "save_path" => self.save_path = non_blank(&value),
            "media_type" => self.media_type = non_blank(&value),
            "season" => self.season = integer("season", &value)?,
            "episode" => self.episode = integer("episode", &value)?,
            "episode_title" => self.episode_title = non_blank(&value),
            "year" => self.year = integer("year", &value)?,
            "poster" => self.poster = non_blank(&value),
            "tmdb_id" => self.tmdb_id = integer("tmdb_id", &value)?,
            "tags" => self.tags = parse_tag_list(&value),
            "custom_metadata" => self.custom_metadata = metadata_object(&value),
            other => debug!(field = other, "ignoring unknown ingest field"),
        }
        Ok(())
    }

    /// Resolve the transfer source, writing any upload under `upload_dir`.
    pub(crate) async fn into_submission(self, upload_dir: &Path) -> Result<NewTorrent, ApiError> {
        let (source, info_hash, derived_name) = if let Some(upload) = &self.upload {
            let stem = file_stem(&upload.file_name);
            let info_hash = info_hash_from_metainfo(&upload.bytes)
                .map_err(|err| ApiError::from_torrent(&err, "failed to hash upload"))?;
            let path = store_upload(upload_dir, upload).await?;
            (TransferSource::File(path).to_stored(), Some(info_hash), stem)
        } else if let Some(raw) = &self.source {
            match TransferSource::classify(raw)
                .map_err(|err| ApiError::from_torrent(&err, "invalid source"))?
            {
                TransferSource::Magnet(uri) => {
                    let magnet = parse_magnet(&uri)
                        .map_err(|err| ApiError::from_torrent(&err, "invalid magnet"))?;
                    let name = self.name.clone().or(magnet.display_name);
                    (uri, Some(magnet.info_hash), name)
                }
                TransferSource::Url(url) => {
                    let stem = url_stem(&url);
                    (url, None, stem)
                }
                TransferSource::File(_) => {
                    return Err(ApiError::bad_request(
                        "source must be a magnet URI or an http(s) URL",
                    ));
                }
            }
        } else {
            return Err(ApiError::bad_request("either file or source is required"));
        };

        // `name` stays the daemon-facing name; the caller's title is the display name.
        let name = derived_name.unwrap_or_else(|| UNKNOWN_NAME.to_string());
        Ok(NewTorrent {
            info_hash,
            name: Some(name),
            correct_name: self.name,
            source,
            save_path: self.save_path,
            media_type: self.media_type,
            season: self.season,
            episode: self.episode,
            episode_title: self.episode_title,
            year: self.year,
            poster: self.poster,
            tmdb_id: self.tmdb_id,
            tags: self.tags,
            custom_metadata: self.custom_metadata,
        })
    }
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    let key = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|err| ApiError::bad_request(format!("{key}: unreadable field: {err}")))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn integer<T: FromStr>(field: &'static str, value: &str) -> Result<Option<T>, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ApiError::bad_request(format!("{field}: expected an integer")))
}

/// Object-valued JSON or an empty map for anything else.
fn metadata_object(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            debug!("custom_metadata is not a JSON object; storing an empty object");
            Map::new()
        }
    }
}

fn file_stem(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

fn url_stem(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let segment = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    file_stem(segment)
}

/// Final path component with anything outside `[A-Za-z0-9._-]` replaced.
fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        cleaned
    }
}

async fn store_upload(upload_dir: &Path, upload: &Upload) -> Result<PathBuf, ApiError> {
    let path = upload_dir.join(sanitize_file_name(&upload.file_name));
    tokio::fs::write(&path, &upload.bytes).await.map_err(|err| {
        error!(error = %err, path = %path.display(), "failed to store upload");
        ApiError::internal("failed to store upload")
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{METAINFO, multipart};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn reads_text_fields_and_tolerates_bad_metadata() -> anyhow::Result<()> {
        let form = IngestForm::read(
            multipart(
                &[
                    ("source", " magnet:?xt=urn:btih:abc "),
                    ("season", "2"),
                    ("episode", ""),
                    ("tags", "tv, hd ,,"),
                    ("custom_metadata", "[1, 2]"),
                    ("unexpected", "x"),
                ],
                None,
            )
            .await?,
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err:?}"))?;

        assert_eq!(form.source.as_deref(), Some("magnet:?xt=urn:btih:abc"));
        assert_eq!(form.season, Some(2));
        assert_eq!(form.episode, None);
        assert_eq!(form.tags, vec!["tv".to_string(), "hd".to_string()]);
        assert!(form.custom_metadata.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn non_numeric_integer_field_is_rejected() -> anyhow::Result<()> {
        let err = IngestForm::read(multipart(&[("year", "soon")], None).await?)
            .await
            .expect_err("year must be numeric");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn magnet_submission_is_hashed_without_a_daemon() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let form = IngestForm {
            source: Some(format!("magnet:?xt=urn:btih:{}&dn=Foo", "ABCDEF".repeat(6) + "ABCD")),
            ..IngestForm::default()
        };

        let submission = form
            .into_submission(dir.path())
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;

        let expected = "abcdef".repeat(6) + "abcd";
        assert_eq!(
            submission.info_hash.as_ref().map(|hash| hash.as_str().to_string()),
            Some(expected)
        );
        assert_eq!(submission.name.as_deref(), Some("Foo"));
        assert!(submission.correct_name.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn upload_is_stored_sanitized_and_hashed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let form = IngestForm::read(
            multipart(
                &[("tags", "movie"), ("name", "My Movie (2020)")],
                Some(("../My Movie.torrent", METAINFO)),
            )
            .await?,
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err:?}"))?;

        let submission = form
            .into_submission(dir.path())
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;

        let stored = dir.path().join("My_Movie.torrent");
        assert_eq!(submission.source, stored.to_string_lossy());
        assert_eq!(std::fs::read(&stored)?, METAINFO);
        assert_eq!(submission.name.as_deref(), Some("My Movie"));
        assert_eq!(submission.correct_name.as_deref(), Some("My Movie (2020)"));
        assert_eq!(
            submission.info_hash,
            Some(info_hash_from_metainfo(METAINFO)?)
        );
        Ok(())
    }

    #[tokio::test]
    async fn url_submission_takes_name_from_last_segment() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let form = IngestForm {
            source: Some("https://tracker.example/files/Show.S01E01.torrent?key=1".to_string()),
            name: Some("The Show".to_string()),
            ..IngestForm::default()
        };
        let submission = form
            .into_submission(dir.path())
            .await
            .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(submission.name.as_deref(), Some("Show.S01E01"));
        assert_eq!(submission.correct_name.as_deref(), Some("The Show"));
        assert!(submission.info_hash.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn missing_or_local_source_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = IngestForm::default()
            .into_submission(dir.path())
            .await
            .expect_err("nothing to add");
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);

        let local = IngestForm {
            source: Some("/etc/passwd".to_string()),
            ..IngestForm::default()
        }
        .into_submission(dir.path())
        .await
        .expect_err("local paths are not accepted from clients");
        assert_eq!(local.status, StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[test]
    fn sanitized_names_stay_inside_the_upload_dir() {
        assert_eq!(sanitize_file_name("a/b/../c d.torrent"), "c_d.torrent");
        assert_eq!(sanitize_file_name(".."), DEFAULT_UPLOAD_NAME);
        assert_eq!(sanitize_file_name(""), DEFAULT_UPLOAD_NAME);
    }
}
