//! Domain records shared by the store, daemon client, and live feed.
//!
//! # Design
//! - `InfoHash` is the only way to carry a hash; construction canonicalises to lowercase hex.
//! - Daemon reports enter through [`RawTransfer`] and are validated once into
//!   [`LiveTransferStatus`]; anything malformed is rejected as a whole.
//! - Persisted records carry tags as an ordered list and metadata as a JSON object.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TorrentError, TorrentResult};

const V1_HEX_LEN: usize = 40;
const V2_HEX_LEN: usize = 64;
const V1_BASE32_LEN: usize = 32;
const V1_DIGEST_LEN: usize = 20;

/// Canonical lowercase hexadecimal transfer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InfoHash(String);

impl InfoHash {
    /// Parse a hex (40 or 64 chars) or base32 (32 chars) hash.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidInfoHash`] when the value is neither form.
    pub fn parse(raw: &str) -> TorrentResult<Self> {
        let value = raw.trim();
        let invalid = || TorrentError::InvalidInfoHash {
            value: value.to_string(),
        };
        match value.len() {
            V1_HEX_LEN | V2_HEX_LEN if value.bytes().all(|byte| byte.is_ascii_hexdigit()) => {
                Ok(Self(value.to_ascii_lowercase()))
            }
            V1_BASE32_LEN => decode_base32(value)
                .filter(|bytes| bytes.len() == V1_DIGEST_LEN)
                .map(|bytes| Self::from_digest(&bytes))
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    /// Build a hash from raw digest bytes.
    #[must_use]
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Borrow the lowercase hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier the daemon reports for this transfer.
    ///
    /// qBittorrent keys pure v2 transfers by the SHA-256 hash truncated to 160 bits.
    #[must_use]
    pub fn transfer_id(&self) -> Self {
        match self.0.get(..V1_HEX_LEN) {
            Some(prefix) if self.0.len() == V2_HEX_LEN => Self(prefix.to_string()),
            _ => self.clone(),
        }
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl FromStr for InfoHash {
    type Err = TorrentError;

    fn from_str(value: &str) -> TorrentResult<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for InfoHash {
    type Error = TorrentError;

    fn try_from(value: String) -> TorrentResult<Self> {
        Self::parse(&value)
    }
}

impl From<InfoHash> for String {
    fn from(value: InfoHash) -> Self {
        value.0
    }
}

fn decode_base32(value: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(V1_DIGEST_LEN);
    let mut buffer: u32 = 0;
    let mut bits: u8 = 0;
    for ch in value.trim_end_matches('=').chars() {
        let ch = ch.to_ascii_uppercase();
        let digit = match ch {
            'A'..='Z' => u32::from(ch) - u32::from('A'),
            '2'..='7' => u32::from(ch) - u32::from('2') + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | digit;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(u8::try_from((buffer >> bits) & 0xff).ok()?);
        }
    }
    Some(out)
}

/// Persisted torrent metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentRecord {
    /// Store-assigned identifier.
    pub id: i64,
    /// Canonical hash once known.
    pub info_hash: Option<InfoHash>,
    /// Name derived at ingest time.
    pub name: Option<String>,
    /// Corrected display name.
    pub correct_name: Option<String>,
    /// Magnet URI, remote URL, or local metainfo path.
    pub source: Option<String>,
    /// Download directory requested from the daemon.
    pub save_path: Option<String>,
    /// Media classification (movie, tv, ...).
    pub media_type: Option<String>,
    /// Season number.
    pub season: Option<i32>,
    /// Episode number.
    pub episode: Option<i32>,
    /// Episode title.
    pub episode_title: Option<String>,
    /// Release year.
    pub year: Option<i32>,
    /// Poster artwork URL.
    pub poster: Option<String>,
    /// External catalog identifier.
    pub tmdb_id: Option<i64>,
    /// Ordered tags.
    pub tags: Vec<String>,
    /// Arbitrary caller metadata.
    pub custom_metadata: Map<String, Value>,
    /// Whether the daemon acknowledged the transfer.
    pub added: bool,
    /// Last background failure.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TorrentRecord {
    /// Name shown to live-feed clients.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.correct_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

/// Fields supplied when creating a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTorrent {
    /// Hash when known at ingest time.
    pub info_hash: Option<InfoHash>,
    /// Name derived at ingest time.
    pub name: Option<String>,
    /// Display name supplied by the caller.
    pub correct_name: Option<String>,
    /// Magnet URI, remote URL, or local metainfo path.
    pub source: String,
    /// Download directory.
    pub save_path: Option<String>,
    /// Media classification.
    pub media_type: Option<String>,
    /// Season number.
    pub season: Option<i32>,
    /// Episode number.
    pub episode: Option<i32>,
    /// Episode title.
    pub episode_title: Option<String>,
    /// Release year.
    pub year: Option<i32>,
    /// Poster artwork URL.
    pub poster: Option<String>,
    /// External catalog identifier.
    pub tmdb_id: Option<i64>,
    /// Ordered tags.
    pub tags: Vec<String>,
    /// Arbitrary caller metadata.
    pub custom_metadata: Map<String, Value>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TorrentPatch {
    /// Replacement hash.
    #[serde(skip)]
    pub info_hash: Option<InfoHash>,
    /// Replacement name.
    pub name: Option<String>,
    /// Replacement display name.
    pub correct_name: Option<String>,
    /// Replacement download directory.
    pub save_path: Option<String>,
    /// Replacement media classification.
    pub media_type: Option<String>,
    /// Replacement season.
    pub season: Option<i32>,
    /// Replacement episode.
    pub episode: Option<i32>,
    /// Replacement episode title.
    pub episode_title: Option<String>,
    /// Replacement year.
    pub year: Option<i32>,
    /// Replacement poster URL.
    pub poster: Option<String>,
    /// Replacement catalog identifier.
    pub tmdb_id: Option<i64>,
    /// Replacement tag list.
    pub tags: Option<Vec<String>>,
    /// Replacement metadata object.
    pub custom_metadata: Option<Map<String, Value>>,
}

impl TorrentPatch {
    /// Build a patch from a resubmission, keeping only fields that carry a value.
    #[must_use]
    pub fn from_submission(submission: &NewTorrent) -> Self {
        let non_empty = |value: &Option<String>| value.clone().filter(|text| !text.is_empty());
        Self {
            info_hash: submission.info_hash.clone(),
            name: non_empty(&submission.name),
            correct_name: non_empty(&submission.correct_name),
            save_path: non_empty(&submission.save_path),
            media_type: non_empty(&submission.media_type),
            season: submission.season,
            episode: submission.episode,
            episode_title: non_empty(&submission.episode_title),
            year: submission.year,
            poster: non_empty(&submission.poster),
            tmdb_id: submission.tmdb_id,
            tags: (!submission.tags.is_empty()).then(|| submission.tags.clone()),
            custom_metadata: (!submission.custom_metadata.is_empty())
                .then(|| submission.custom_metadata.clone()),
        }
    }

    /// Whether applying the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where the daemon should fetch a transfer from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSource {
    /// Magnet URI.
    Magnet(String),
    /// Remote metainfo URL fetched by the daemon.
    Url(String),
    /// Local metainfo file uploaded by a client.
    File(PathBuf),
}

impl TransferSource {
    /// Classify a stored source string.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidSource`] for an empty value.
    pub fn classify(raw: &str) -> TorrentResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(TorrentError::InvalidSource { reason: "empty" });
        }
        let lower = value.to_ascii_lowercase();
        if lower.starts_with("magnet:?") {
            Ok(Self::Magnet(value.to_string()))
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            Ok(Self::Url(value.to_string()))
        } else {
            Ok(Self::File(PathBuf::from(value)))
        }
    }

    /// Value persisted in the record's `source` column.
    #[must_use]
    pub fn to_stored(&self) -> String {
        match self {
            Self::Magnet(uri) | Self::Url(uri) => uri.clone(),
            Self::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Request to hand a transfer to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTransfer {
    /// Where the daemon fetches the transfer from.
    pub source: TransferSource,
    /// Hash when already computed locally.
    pub known_hash: Option<InfoHash>,
    /// Download directory.
    pub save_path: Option<String>,
    /// Tags applied on add.
    pub tags: Vec<String>,
    /// Daemon category.
    pub category: Option<String>,
}

impl AddTransfer {
    /// Build an add request for a persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::InvalidSource`] when the record has no usable source.
    pub fn for_record(record: &TorrentRecord) -> TorrentResult<Self> {
        let source = record
            .source
            .as_deref()
            .ok_or(TorrentError::InvalidSource { reason: "missing" })
            .and_then(TransferSource::classify)?;
        Ok(Self {
            source,
            known_hash: record.info_hash.clone(),
            save_path: record.save_path.clone(),
            tags: record.tags.clone(),
            category: record.media_type.clone(),
        })
    }
}

/// Live status of one transfer as reported by the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTransferStatus {
    /// Transfer hash.
    pub hash: InfoHash,
    /// Daemon-side name.
    pub name: String,
    /// Completion fraction in `0.0..=1.0`.
    pub progress: f64,
    /// Daemon state label.
    pub state: String,
    /// Download rate in bytes per second.
    pub dlspeed: u64,
    /// Upload rate in bytes per second.
    pub upspeed: u64,
    /// Estimated seconds remaining.
    pub eta: Option<i64>,
}

/// Transfer entry exactly as the daemon serialises it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransfer {
    /// Transfer hash.
    pub hash: Option<String>,
    /// Daemon-side name.
    pub name: Option<String>,
    /// Completion fraction.
    pub progress: Option<f64>,
    /// State label.
    pub state: Option<String>,
    /// Download rate.
    pub dlspeed: Option<i64>,
    /// Upload rate.
    pub upspeed: Option<i64>,
    /// Estimated seconds remaining.
    pub eta: Option<i64>,
}

impl TryFrom<RawTransfer> for LiveTransferStatus {
    type Error = TorrentError;

    fn try_from(raw: RawTransfer) -> TorrentResult<Self> {
        let malformed = |field: &'static str, reason: &'static str| {
            TorrentError::MalformedInput { field, reason }
        };
        let hash = InfoHash::parse(raw.hash.as_deref().ok_or(malformed("hash", "missing"))?)?;
        let name = raw.name.ok_or(malformed("name", "missing"))?;
        let state = raw
            .state
            .filter(|state| !state.is_empty())
            .ok_or(malformed("state", "missing"))?;
        let progress = raw.progress.ok_or(malformed("progress", "missing"))?;
        if !progress.is_finite() || !(0.0..=1.0).contains(&progress) {
            return Err(malformed("progress", "out_of_range"));
        }
        let rate = |value: Option<i64>, field: &'static str| {
            value
                .map_or(Ok(0), u64::try_from)
                .map_err(|_| malformed(field, "negative"))
        };
        Ok(Self {
            hash,
            name,
            progress,
            state,
            dlspeed: rate(raw.dlspeed, "dlspeed")?,
            upspeed: rate(raw.upspeed, "upspeed")?,
            eta: raw.eta.filter(|eta| *eta >= 0),
        })
    }
}
