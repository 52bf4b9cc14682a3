//! Magnet URI parsing.

use url::form_urlencoded;

use crate::error::{TorrentError, TorrentResult};
use crate::model::InfoHash;

const MAGNET_PREFIX: &str = "magnet:?";
const BTIH_URN: &str = "urn:btih:";
const BTMH_URN: &str = "urn:btmh:";
const SHA256_MULTIHASH_PREFIX: &str = "1220";

/// Fields of a magnet URI relevant to ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    /// Canonical transfer hash.
    pub info_hash: InfoHash,
    /// `dn` display name, if present.
    pub display_name: Option<String>,
}

/// Parse a magnet URI without contacting the daemon.
///
/// The v1 `btih` topic wins over a v2 `btmh` topic when both are present.
///
/// # Errors
///
/// Returns [`TorrentError::InvalidSource`] when the value is not a magnet URI or
/// carries no exact topic, and [`TorrentError::InvalidInfoHash`] when the topic
/// is not a valid hash.
pub fn parse_magnet(uri: &str) -> TorrentResult<MagnetLink> {
    let trimmed = uri.trim();
    let query = trimmed
        .get(..MAGNET_PREFIX.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(MAGNET_PREFIX))
        .map(|_| &trimmed[MAGNET_PREFIX.len()..])
        .ok_or(TorrentError::InvalidSource {
            reason: "not_a_magnet",
        })?;

    let mut v1 = None;
    let mut v2 = None;
    let mut display_name = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "xt" => {
                let lower = value.to_ascii_lowercase();
                if let Some(rest) = lower.strip_prefix(BTIH_URN) {
                    v1.get_or_insert_with(|| rest.to_string());
                } else if let Some(rest) = lower
                    .strip_prefix(BTMH_URN)
                    .and_then(|rest| rest.strip_prefix(SHA256_MULTIHASH_PREFIX))
                {
                    v2.get_or_insert_with(|| rest.to_string());
                }
            }
            "dn" if !value.is_empty() => {
                display_name.get_or_insert_with(|| value.into_owned());
            }
            _ => {}
        }
    }

    let topic = v1.or(v2).ok_or(TorrentError::InvalidSource {
        reason: "missing_exact_topic",
    })?;
    Ok(MagnetLink {
        info_hash: InfoHash::parse(&topic)?,
        display_name,
    })
}
