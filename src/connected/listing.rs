use crate::error::PresenceError;
use crate::roles::Role;
use crate::scope::{ScopeSelector, ScopedQuery};
use chrono::{DateTime, Utc};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedUserEntry {
    pub user_id: i64,
    pub belongs_to_current_course: bool,
    pub seconds_since_last_seen: u64,
}

/// Result of one role batch: the users listed and how many matched in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleListing {
    pub role: Role,
    pub match_count: usize,
    pub entries: Vec<ConnectedUserEntry>,
}

impl RoleListing {
    /// Matching users this batch could not show.
    pub fn hidden(&self) -> usize {
        self.match_count.saturating_sub(self.entries.len())
    }
}

/// Entries a batch may add: `max(0, min(match_count, cap - already_listed))`.
pub fn quota_take(match_count: usize, cap: usize, already_listed: usize) -> usize {
    cap.saturating_sub(already_listed).min(match_count)
}

/// Seconds between `last_time` and `now`. Unparseable or future timestamps read as 0.
pub fn elapsed_seconds(last_time: Option<&str>, now: DateTime<Utc>) -> u64 {
    let Some(raw) = last_time else {
        return 0;
    };
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(t) => (now - t.with_timezone(&Utc)).num_seconds().max(0) as u64,
        Err(_) => 0,
    }
}

/// Every connected user matching `scope` and `role`, most recently seen first.
pub fn ranked_connected(
    conn: &Connection,
    scope: &ScopeSelector,
    role: Role,
    now: DateTime<Utc>,
) -> Result<Vec<ConnectedUserEntry>, PresenceError> {
    let query = ScopedQuery::for_scope(scope, role)?;
    let sql = query.sql(
        "DISTINCT c.user_id, c.last_course_id, c.last_time",
        Some("c.last_time DESC, c.user_id"),
    );
    let current_course = scope.current_course();

    let mut stmt = conn.prepare(&sql)?;
    let mut entries = stmt
        .query_map(params_from_iter(query.params().iter()), |r| {
            let user_id: i64 = r.get(0)?;
            let last_course_id: Option<i64> = r.get::<_, Option<i64>>(1).ok().flatten();
            let last_time = r.get_ref(2)?.as_str().ok();
            Ok(ConnectedUserEntry {
                user_id,
                belongs_to_current_course: current_course.is_some()
                    && last_course_id == current_course,
                seconds_since_last_seen: elapsed_seconds(last_time, now),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    // Malformed timestamps decode to 0; re-sort so the order holds for them too.
    entries.sort_by_key(|e| e.seconds_since_last_seen);
    Ok(entries)
}

/// Lists one role batch under the shared display cap.
///
/// Returns the batch and the new running total of listed users.
pub fn list_connected(
    conn: &Connection,
    scope: &ScopeSelector,
    role: Role,
    cap: usize,
    already_listed: usize,
    now: DateTime<Utc>,
) -> Result<(RoleListing, usize), PresenceError> {
    let mut entries = ranked_connected(conn, scope, role, now)?;
    let match_count = entries.len();
    let take = quota_take(match_count, cap, already_listed);
    entries.truncate(take);
    Ok((
        RoleListing {
            role,
            match_count,
            entries,
        },
        already_listed.saturating_add(take),
    ))
}
