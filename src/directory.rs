//! Collaborator-owned data the presence queries join against: hierarchy
//! containment, user sex, course enrolments, system admins and live sessions.

use crate::error::PresenceError;
use crate::roles::{Role, Sex};
use crate::scope::HierarchyLevel;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;

pub fn upsert_node(
    conn: &Connection,
    level: HierarchyLevel,
    id: i64,
    parent_id: Option<i64>,
) -> Result<(), PresenceError> {
    let Some(table) = level.table() else {
        return Err(PresenceError::InvalidScope(
            "the system level has no nodes".to_string(),
        ));
    };
    match (level.parent_column(), parent_id) {
        (None, _) => {
            conn.execute(
                &format!("INSERT OR IGNORE INTO {}(id) VALUES(?)", table),
                [id],
            )?;
        }
        (Some(column), Some(parent)) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table}(id, {column}) VALUES(?, ?)
                     ON CONFLICT(id) DO UPDATE SET {column} = excluded.{column}"
                ),
                (id, parent),
            )?;
        }
        (Some(_), None) => {
            return Err(PresenceError::InvalidScope(format!(
                "{} nodes require a parent id",
                level.as_str()
            )));
        }
    }
    Ok(())
}

pub fn upsert_user(conn: &Connection, user_id: i64, sex: Sex) -> Result<(), PresenceError> {
    conn.execute(
        "INSERT INTO users(id, sex) VALUES(?, ?)
         ON CONFLICT(id) DO UPDATE SET sex = excluded.sex",
        (user_id, sex.as_str()),
    )?;
    Ok(())
}

/// Drops every trace of a user, connection record included.
pub fn remove_user(conn: &mut Connection, user_id: i64) -> Result<(), PresenceError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM connected WHERE user_id = ?", [user_id])?;
    tx.execute("DELETE FROM sessions WHERE user_id = ?", [user_id])?;
    tx.execute("DELETE FROM admins WHERE user_id = ?", [user_id])?;
    tx.execute("DELETE FROM course_users WHERE user_id = ?", [user_id])?;
    tx.execute("DELETE FROM users WHERE id = ?", [user_id])?;
    tx.commit()?;
    Ok(())
}

/// Sets the user's role in a course; `None` removes the enrolment.
pub fn set_enrolment(
    conn: &Connection,
    course_id: i64,
    user_id: i64,
    role: Option<Role>,
) -> Result<(), PresenceError> {
    match role {
        Some(r) if r.is_course_role() => {
            conn.execute(
                "INSERT INTO course_users(course_id, user_id, role) VALUES(?, ?, ?)
                 ON CONFLICT(course_id, user_id) DO UPDATE SET role = excluded.role",
                (course_id, user_id, r.as_str()),
            )?;
        }
        Some(r) => {
            return Err(PresenceError::InvalidRole(format!(
                "{} is not a course role",
                r.as_str()
            )));
        }
        None => {
            conn.execute(
                "DELETE FROM course_users WHERE course_id = ? AND user_id = ?",
                (course_id, user_id),
            )?;
        }
    }
    Ok(())
}

pub fn set_admin(conn: &Connection, user_id: i64, is_admin: bool) -> Result<(), PresenceError> {
    if is_admin {
        conn.execute("INSERT OR IGNORE INTO admins(user_id) VALUES(?)", [user_id])?;
    } else {
        conn.execute("DELETE FROM admins WHERE user_id = ?", [user_id])?;
    }
    Ok(())
}

pub fn open_session(
    conn: &Connection,
    session_id: &str,
    user_id: i64,
    at: DateTime<Utc>,
) -> Result<(), PresenceError> {
    conn.execute(
        "INSERT INTO sessions(id, user_id, opened_at) VALUES(?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id",
        (
            session_id,
            user_id,
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    )?;
    Ok(())
}

/// Returns whether a session was removed.
pub fn close_session(conn: &Connection, session_id: &str) -> Result<bool, PresenceError> {
    let n = conn.execute("DELETE FROM sessions WHERE id = ?", [session_id])?;
    Ok(n > 0)
}

pub fn count_sessions(conn: &Connection) -> Result<u64, PresenceError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
    Ok(n.max(0) as u64)
}
