use crate::directory;
use crate::error::PresenceError;
use crate::ipc::error::ok;
use crate::ipc::handlers::params::{
    get_optional_i64, get_required_i64, get_required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::roles::{Role, Sex};
use crate::scope::HierarchyLevel;
use serde_json::{json, Value};

fn hierarchy_upsert(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let level = HierarchyLevel::parse(get_required_str(params, "level")?)?;
    let id = get_required_i64(params, "id")?;
    let parent_id = get_optional_i64(params, "parentId")?;
    directory::upsert_node(conn, level, id, parent_id)?;
    Ok(json!({ "ok": true }))
}

fn users_upsert(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let user_id = get_required_i64(params, "userId")?;
    let sex = match params.get("sex").and_then(|v| v.as_str()) {
        None => Sex::Unknown,
        Some(s) => Sex::parse(s).ok_or_else(|| {
            HandlerErr::bad_params("sex must be one of: unknown, female, male")
        })?,
    };
    directory::upsert_user(conn, user_id, sex)?;
    Ok(json!({ "ok": true }))
}

fn users_remove(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_mut().ok_or(PresenceError::StorageUnavailable)?;
    let user_id = get_required_i64(params, "userId")?;
    directory::remove_user(conn, user_id)?;
    Ok(json!({ "ok": true }))
}

fn enrolments_set(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let course_id = get_required_i64(params, "courseId")?;
    let user_id = get_required_i64(params, "userId")?;
    let role = match params.get("role") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params("role must be string or null"))?;
            Some(Role::parse(s)?)
        }
    };
    directory::set_enrolment(conn, course_id, user_id, role)?;
    Ok(json!({ "ok": true }))
}

fn admins_set(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let user_id = get_required_i64(params, "userId")?;
    let is_admin = params
        .get("isAdmin")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::bad_params("missing isAdmin"))?;
    directory::set_admin(conn, user_id, is_admin)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "hierarchy.upsert" => hierarchy_upsert(state, &req.params),
        "users.upsert" => users_upsert(state, &req.params),
        "users.remove" => users_remove(state, &req.params),
        "enrolments.set" => enrolments_set(state, &req.params),
        "admins.set" => admins_set(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
