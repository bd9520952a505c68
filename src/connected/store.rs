use crate::error::PresenceError;
use crate::roles::Role;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

/// One user's presence row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub user_id: i64,
    pub role: String,
    pub last_course_id: Option<i64>,
    pub last_time: String,
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Records activity for `user_id`, replacing any previous record.
pub fn touch(
    conn: &Connection,
    user_id: i64,
    role: Role,
    course_id: Option<i64>,
) -> Result<(), PresenceError> {
    touch_at(conn, user_id, role, course_id, Utc::now())
}

pub fn touch_at(
    conn: &Connection,
    user_id: i64,
    role: Role,
    course_id: Option<i64>,
    at: DateTime<Utc>,
) -> Result<(), PresenceError> {
    // `Unknown` is a query wildcard, never a role a user acts in.
    if role == Role::Unknown {
        return Err(PresenceError::InvalidRole(
            "activity must be recorded under a concrete role".to_string(),
        ));
    }
    // Single-statement upsert: no read-modify-write window for a concurrent sweep.
    conn.execute(
        "INSERT INTO connected(user_id, role, last_course_id, last_time)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
           role = excluded.role,
           last_course_id = excluded.last_course_id,
           last_time = excluded.last_time",
        (user_id, role.as_str(), course_id, format_timestamp(at)),
    )?;
    tracing::debug!(user_id, role = role.as_str(), ?course_id, "presence touched");
    Ok(())
}

/// Deletes every record whose user holds no live session. Returns the number removed.
pub fn sweep(conn: &Connection) -> Result<usize, PresenceError> {
    let removed = conn.execute(
        "DELETE FROM connected
         WHERE user_id NOT IN (SELECT DISTINCT user_id FROM sessions)",
        [],
    )?;
    tracing::info!(removed, "swept stale connected users");
    Ok(removed)
}

pub fn get_record(conn: &Connection, user_id: i64) -> Result<Option<ConnectionRecord>, PresenceError> {
    let rec = conn
        .query_row(
            "SELECT user_id, role, last_course_id, last_time FROM connected WHERE user_id = ?",
            [user_id],
            |r| {
                Ok(ConnectionRecord {
                    user_id: r.get(0)?,
                    role: r.get(1)?,
                    last_course_id: r.get(2)?,
                    last_time: r.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(rec)
}
