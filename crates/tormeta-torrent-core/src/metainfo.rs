//! Metainfo (`.torrent`) inspection.
//!
//! Only the byte span of the top-level `info` dictionary is located; its SHA-1
//! digest is the v1 info-hash. Values are skipped rather than materialised.

use sha1::{Digest, Sha1};

use crate::error::{TorrentError, TorrentResult};
use crate::model::InfoHash;

const INFO_KEY: &[u8] = b"info";

/// Compute the v1 info-hash of a metainfo document.
///
/// # Errors
///
/// Returns [`TorrentError::MalformedInput`] when the document is not valid
/// bencode or has no `info` dictionary.
pub fn info_hash_from_metainfo(bytes: &[u8]) -> TorrentResult<InfoHash> {
    let (start, end) = info_span(bytes)?;
    let digest = Sha1::digest(&bytes[start..end]);
    Ok(InfoHash::from_digest(&digest))
}

fn info_span(data: &[u8]) -> TorrentResult<(usize, usize)> {
    if data.first() != Some(&b'd') {
        return Err(malformed("not_a_dictionary"));
    }
    let mut pos = 1;
    while data.get(pos) != Some(&b'e') {
        let (key, value_start) = read_bytes(data, pos)?;
        let value_end = skip_value(data, value_start)?;
        if key == INFO_KEY {
            if data.get(value_start) != Some(&b'd') {
                return Err(malformed("info_not_a_dictionary"));
            }
            return Ok((value_start, value_end));
        }
        pos = value_end;
    }
    Err(malformed("missing_info"))
}

fn skip_value(data: &[u8], pos: usize) -> TorrentResult<usize> {
    match data.get(pos) {
        Some(b'i') => {
            let end = find(data, pos + 1, b'e')?;
            if end == pos + 1 {
                return Err(malformed("empty_integer"));
            }
            Ok(end + 1)
        }
        Some(b'l') => {
            let mut cursor = pos + 1;
            while data.get(cursor) != Some(&b'e') {
                cursor = skip_value(data, cursor)?;
            }
            Ok(cursor + 1)
        }
        Some(b'd') => {
            let mut cursor = pos + 1;
            while data.get(cursor) != Some(&b'e') {
                let (_, value_start) = read_bytes(data, cursor)?;
                cursor = skip_value(data, value_start)?;
            }
            Ok(cursor + 1)
        }
        Some(b'0'..=b'9') => read_bytes(data, pos).map(|(_, end)| end),
        Some(_) => Err(malformed("invalid_prefix")),
        None => Err(malformed("unexpected_eof")),
    }
}

fn read_bytes(data: &[u8], pos: usize) -> TorrentResult<(&[u8], usize)> {
    let colon = find(data, pos, b':')?;
    let len = std::str::from_utf8(&data[pos..colon])
        .ok()
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or_else(|| malformed("invalid_length"))?;
    let start = colon + 1;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| malformed("unexpected_eof"))?;
    Ok((&data[start..end], end))
}

fn find(data: &[u8], from: usize, needle: u8) -> TorrentResult<usize> {
    data.get(from..)
        .and_then(|rest| rest.iter().position(|byte| *byte == needle))
        .map(|offset| from + offset)
        .ok_or_else(|| malformed("unexpected_eof"))
}

const fn malformed(reason: &'static str) -> TorrentError {
    TorrentError::MalformedInput {
        field: "metainfo",
        reason,
    }
}
