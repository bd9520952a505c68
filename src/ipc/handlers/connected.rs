use crate::connected::{self, ListingOptions, RequestContext, Viewer};
use crate::directory;
use crate::error::PresenceError;
use crate::ipc::error::ok;
use crate::ipc::handlers::params::{
    get_optional_i64, get_optional_usize, get_required_i64, parse_instant, parse_role,
    parse_scope, HandlerErr,
};
use crate::ipc::handlers::setup;
use crate::ipc::types::{AppState, Request};
use crate::roles::Role;
use crate::scope::ScopeSelector;
use serde_json::{json, Value};

fn settings_err(e: anyhow::Error) -> HandlerErr {
    tracing::error!("failed to load presence settings: {e:?}");
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

fn scope_json(scope: &ScopeSelector) -> Value {
    json!({ "level": scope.level.as_str(), "nodeId": scope.node_id })
}

fn connected_touch(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let user_id = get_required_i64(params, "userId")?;
    let role = parse_role(params, "role")?;
    let course_id = get_optional_i64(params, "courseId")?;
    // Read before writing so an error reply means nothing was recorded.
    let every = setup::load_auto_sweep_every(conn).map_err(settings_err)?;
    match params.get("at") {
        None | Some(Value::Null) => connected::touch(conn, user_id, role, course_id)?,
        Some(_) => {
            let at = parse_instant(params, "at")?;
            connected::touch_at(conn, user_id, role, course_id, at)?
        }
    }

    // Only touches made while auto-sweep is on advance the counter.
    let swept = if every == 0 {
        None
    } else {
        state.touches_since_sweep += 1;
        if state.touches_since_sweep >= every {
            state.touches_since_sweep = 0;
            Some(connected::sweep(conn)?)
        } else {
            None
        }
    };
    Ok(json!({ "ok": true, "swept": swept }))
}

fn connected_get(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let user_id = get_required_i64(params, "userId")?;
    let record = connected::store::get_record(conn, user_id)?;
    Ok(json!({ "record": record }))
}

fn connected_sweep(state: &mut AppState) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let removed = connected::sweep(conn)?;
    state.touches_since_sweep = 0;
    Ok(json!({ "removed": removed }))
}

fn connected_count(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let scope = parse_scope(params)?;
    let role = parse_role(params, "role")?;
    let agg = connected::count_by_scope(state.db.as_ref(), &scope, role)?;
    Ok(json!({
        "scope": scope_json(&scope),
        "role": agg.role,
        "count": agg.count,
        "dominantSex": agg.dominant_sex
    }))
}

fn connected_sum_all_roles(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let scope = parse_scope(params)?;
    let total = connected::sum_all_roles(state.db.as_ref(), &scope)?;
    Ok(json!({ "scope": scope_json(&scope), "total": total }))
}

fn connected_list_role(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let scope = parse_scope(params)?;
    let role = parse_role(params, "role")?;
    let defaults = setup::load_listing_options(Some(conn)).map_err(settings_err)?;
    let cap = get_optional_usize(params, "cap")?.unwrap_or(defaults.cap);
    let already_listed = get_optional_usize(params, "alreadyListed")?.unwrap_or(0);
    let already_matched = get_optional_usize(params, "alreadyMatched")?.unwrap_or(0);
    let now = parse_instant(params, "now")?;

    let (listing, listed) = connected::list_connected(conn, &scope, role, cap, already_listed, now)?;
    let matched = already_matched.saturating_add(listing.match_count);
    Ok(json!({
        "role": listing.role,
        "matchCount": listing.match_count,
        "hidden": listing.hidden(),
        "entries": listing.entries,
        "alreadyListed": listed,
        "alreadyMatched": matched,
        "moreNotShown": matched > cap
    }))
}

fn connected_list(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref().ok_or(PresenceError::StorageUnavailable)?;
    let scope = parse_scope(params)?;
    let viewer = Viewer {
        user_id: get_optional_i64(params, "viewerId")?,
        role: match params.get("viewerRole") {
            None | Some(Value::Null) => Role::Unknown,
            Some(_) => parse_role(params, "viewerRole")?,
        },
    };
    let defaults = setup::load_listing_options(Some(conn)).map_err(settings_err)?;
    let options = ListingOptions {
        cap: get_optional_usize(params, "cap")?.unwrap_or(defaults.cap),
        ..defaults
    };
    let now = parse_instant(params, "now")?;

    let listing = RequestContext::new(scope, viewer, now).render_pass(conn, &options)?;
    let mut out = serde_json::to_value(&listing).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })?;
    out["scope"] = scope_json(&scope);
    out["cap"] = json!(options.cap);
    Ok(out)
}

fn connected_global(state: &mut AppState) -> Result<Value, HandlerErr> {
    let conn = state.db.as_ref();
    let scope = ScopeSelector::system();
    let per_role = connected::counts_for_all_roles(conn, &scope)?;
    let total: u64 = per_role.iter().map(|a| a.count).sum();
    let sessions = match conn {
        Some(c) => directory::count_sessions(c)?,
        None => 0,
    };
    Ok(json!({
        "sessions": sessions,
        "perRole": per_role,
        "total": total
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "connected.touch" => connected_touch(state, &req.params),
        "connected.get" => connected_get(state, &req.params),
        "connected.sweep" => connected_sweep(state),
        "connected.count" => connected_count(state, &req.params),
        "connected.sumAllRoles" => connected_sum_all_roles(state, &req.params),
        "connected.listRole" => connected_list_role(state, &req.params),
        "connected.list" => connected_list(state, &req.params),
        "connected.global" => connected_global(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
