//! Merge persisted records with live daemon state.
//!
//! # Design
//! - Pure: no I/O, inputs borrowed immutably, identical inputs yield identical output.
//! - Duplicate live hashes resolve last-write-wins.
//! - Output is stably sorted by descending record id so snapshots compare element-wise.

use std::collections::HashMap;

use tormeta_events::TorrentView;

use crate::model::{LiveTransferStatus, TorrentRecord};

/// State label for records the daemon does not report.
pub const MISSING_STATE: &str = "missing";

/// Build the ordered view list pushed to live-feed clients.
#[must_use]
pub fn build_snapshot(records: &[TorrentRecord], live: &[LiveTransferStatus]) -> Vec<TorrentView> {
    let by_hash: HashMap<&str, &LiveTransferStatus> = live
        .iter()
        .map(|status| (status.hash.as_str(), status))
        .collect();

    let mut views: Vec<TorrentView> = records
        .iter()
        .map(|record| {
            let hash = record
                .info_hash
                .as_ref()
                .map(|hash| hash.as_str())
                .unwrap_or_default();
            let matched = (!hash.is_empty())
                .then(|| by_hash.get(hash))
                .flatten()
                .copied();
            merge(record, hash, matched)
        })
        .collect();

    views.sort_by(|left, right| right.id.cmp(&left.id));
    views
}

fn merge(record: &TorrentRecord, hash: &str, live: Option<&LiveTransferStatus>) -> TorrentView {
    let base = TorrentView {
        id: record.id,
        hash: hash.to_string(),
        name: record.display_name().to_string(),
        progress: 0,
        state: MISSING_STATE.to_string(),
        dlspeed: 0,
        upspeed: 0,
        eta: None,
        poster: record.poster.clone(),
    };
    match live {
        Some(status) => TorrentView {
            progress: percent(status.progress),
            state: status.state.clone(),
            dlspeed: status.dlspeed,
            upspeed: status.upspeed,
            eta: status.eta,
            ..base
        },
        None => base,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0) as u8
}
