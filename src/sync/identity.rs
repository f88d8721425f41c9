//! Recovers which target issue stands for which source issue.
//!
//! The only record of a migrated issue is the provenance line written as the
//! first line of its body, so the mapping is rebuilt from the target's
//! current issues every time it is needed.

use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::client::Client;
use crate::config::RepoSlug;
use crate::error::SyncResult;
use crate::model::repo::Issue;
use crate::remote::Operation;

pub fn marker_prefix(source: &RepoSlug) -> String {
    format!("Migrated from {}#", source.full_name())
}

pub fn marker(source: &RepoSlug, number: u64) -> String {
    format!("{}{number}", marker_prefix(source))
}

/// The source issue number recorded in `body`, if its first line is a
/// well-formed provenance marker.
pub fn parse_marker(body: &str, prefix: &str) -> Option<u64> {
    let digits = body.lines().next()?.strip_prefix(prefix)?.trim_end();
    let well_formed = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !well_formed {
        return None;
    }
    digits.parse().ok()
}

/// Map source issue number -> target issue for every marked issue.
///
/// Two target issues claiming the same source number cannot be told apart;
/// the first one listed wins and the clash is logged.
pub fn index_migrated(issues: Vec<Issue>, prefix: &str) -> BTreeMap<u64, Issue> {
    let mut map: BTreeMap<u64, Issue> = BTreeMap::new();
    for issue in issues {
        let Some(body) = issue.body.as_deref() else {
            continue;
        };
        if !body.starts_with(prefix) {
            continue;
        }
        let Some(source_number) = parse_marker(body, prefix) else {
            debug!(target_issue = issue.number, "skipping malformed provenance marker");
            continue;
        };
        if let Some(first) = map.get(&source_number) {
            warn!(
                source_issue = source_number,
                kept = first.number,
                ignored = issue.number,
                "several target issues claim the same source issue"
            );
            continue;
        }
        map.insert(source_number, issue);
    }
    map
}

/// Fetch every target issue and index the migrated ones.
pub async fn resolve(
    target: &Client,
    target_repo: &RepoSlug,
    source_repo: &RepoSlug,
) -> SyncResult<BTreeMap<u64, Issue>> {
    info!("building map of already-migrated issues");
    let issues: Vec<Issue> = target
        .fetch_all(
            Operation::Issues,
            json!({ "owner": target_repo.owner, "name": target_repo.name }),
            "/repository/issues",
        )
        .await?;
    let map = index_migrated(issues, &marker_prefix(source_repo));
    info!("found {} issues already migrated", map.len());
    Ok(map)
}
