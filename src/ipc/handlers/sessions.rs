use crate::directory;
use crate::error::PresenceError;
use crate::ipc::error::ok;
use crate::ipc::handlers::params::{get_required_i64, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

fn sessions_open(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let user_id = get_required_i64(params, "userId")?;
    let session_id = match params.get("sessionId").and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    directory::open_session(conn, &session_id, user_id, Utc::now())?;
    Ok(json!({ "sessionId": session_id }))
}

fn sessions_close(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let session_id = get_required_str(params, "sessionId")?;
    let closed = directory::close_session(conn, session_id)?;
    Ok(json!({ "closed": closed }))
}

fn sessions_count(state: &mut AppState) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    Ok(json!({ "count": directory::count_sessions(conn)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "sessions.open" => sessions_open(state, &req.params),
        "sessions.close" => sessions_close(state, &req.params),
        "sessions.count" => sessions_count(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
