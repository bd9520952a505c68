use crate::connected::store::touch_at;
use crate::db;
use crate::directory;
use crate::roles::Role;
use crate::scope::{HierarchyLevel, ScopeSelector};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn memory_db() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    db::init_schema(&conn).expect("init schema");
    conn
}

pub fn temp_workspace(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn course_scope(course_id: i64) -> ScopeSelector {
    ScopeSelector::new(HierarchyLevel::Course, Some(course_id)).expect("course scope")
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
        .single()
        .expect("valid instant")
}

/// Country 1 > institution 10 > centre 100 > degree 1000 > courses 42, 43.
/// Country 2 > institution 20 > centre 200 > degree 2000 > course 99.
pub fn seed_hierarchy(conn: &Connection) {
    let nodes = [
        (HierarchyLevel::Country, 1, None),
        (HierarchyLevel::Country, 2, None),
        (HierarchyLevel::Institution, 10, Some(1)),
        (HierarchyLevel::Institution, 20, Some(2)),
        (HierarchyLevel::Centre, 100, Some(10)),
        (HierarchyLevel::Centre, 200, Some(20)),
        (HierarchyLevel::Degree, 1000, Some(100)),
        (HierarchyLevel::Degree, 2000, Some(200)),
        (HierarchyLevel::Course, 42, Some(1000)),
        (HierarchyLevel::Course, 43, Some(1000)),
        (HierarchyLevel::Course, 99, Some(2000)),
    ];
    for (level, id, parent) in nodes {
        directory::upsert_node(conn, level, id, parent).expect("seed node");
    }
}

pub fn connect_ago(
    conn: &Connection,
    user_id: i64,
    role: Role,
    course_id: Option<i64>,
    now: DateTime<Utc>,
    seconds_ago: i64,
) {
    touch_at(
        conn,
        user_id,
        role,
        course_id,
        now - chrono::Duration::seconds(seconds_ago),
    )
    .expect("touch");
}
