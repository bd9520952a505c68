use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "swad.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    // Several front-end workers may share one workspace; let SQLite serialize writers.
    conn.busy_timeout(Duration::from_secs(5))?;
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS countries(
            id INTEGER PRIMARY KEY
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS institutions(
            id INTEGER PRIMARY KEY,
            country_id INTEGER NOT NULL,
            FOREIGN KEY(country_id) REFERENCES countries(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_institutions_country ON institutions(country_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS centres(
            id INTEGER PRIMARY KEY,
            institution_id INTEGER NOT NULL,
            FOREIGN KEY(institution_id) REFERENCES institutions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_centres_institution ON centres(institution_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS degrees(
            id INTEGER PRIMARY KEY,
            centre_id INTEGER NOT NULL,
            FOREIGN KEY(centre_id) REFERENCES centres(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_degrees_centre ON degrees(centre_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            degree_id INTEGER NOT NULL,
            FOREIGN KEY(degree_id) REFERENCES degrees(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_degree ON courses(degree_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY,
            sex TEXT NOT NULL DEFAULT 'unknown'
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_users(
            course_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            PRIMARY KEY(course_id, user_id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_users_user ON course_users(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_users_course_role ON course_users(course_id, role)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            user_id INTEGER PRIMARY KEY
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            opened_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS connected(
            user_id INTEGER PRIMARY KEY,
            role TEXT NOT NULL,
            last_course_id INTEGER,
            last_time TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_connected_last_time ON connected(last_time)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspace_settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM workspace_settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO workspace_settings(key, value_json)
         VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET
           value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
