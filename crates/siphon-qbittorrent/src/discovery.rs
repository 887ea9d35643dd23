//! Identify the torrent created by a submission.
//!
//! The add endpoint does not return the new torrent's hash, so the downloader
//! snapshots the listing before submitting and then polls it. Selection order:
//! 1. a listed torrent whose hash equals the magnet's info-hash;
//! 2. otherwise the largest torrent absent from the snapshot, ties broken by
//!    the lexicographically smallest hash.
//!
//! Torrents that already existed are never picked by size.

use std::collections::HashSet;

use crate::types::TorrentInfo;

pub(crate) fn select_new_torrent<'a>(
    listing: &'a [TorrentInfo],
    known: &HashSet<String>,
    hash_hint: Option<&str>,
) -> Option<&'a TorrentInfo> {
    if let Some(hint) = hash_hint
        && let Some(exact) = listing
            .iter()
            .find(|torrent| torrent.hash.eq_ignore_ascii_case(hint))
    {
        return Some(exact);
    }

    listing
        .iter()
        .filter(|torrent| !known.contains(&torrent.hash.to_ascii_lowercase()))
        .max_by(|a, b| {
            a.known_size()
                .cmp(&b.known_size())
                .then_with(|| b.hash.cmp(&a.hash))
        })
}

pub(crate) fn snapshot(listing: &[TorrentInfo]) -> HashSet<String> {
    listing
        .iter()
        .map(|torrent| torrent.hash.to_ascii_lowercase())
        .collect()
}
