use crate::connected::ListingOptions;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Connected,
    Sweep,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "connected" => Some(Self::Connected),
            "sweep" => Some(Self::Sweep),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Connected => "setup.connected",
            Self::Sweep => "setup.sweep",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Connected => json!({
            "maxShown": 15,
            "refreshSeconds": 60,
            "listGuestsForAdmins": true
        }),
        SetupSection::Sweep => json!({
            "autoSweepEveryTouches": 0
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool()
        .ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Connected => match k.as_str() {
                "maxShown" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
                }
                "refreshSeconds" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 5, 3600)?));
                }
                "listGuestsForAdmins" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown connected field: {}", k)),
            },
            SetupSection::Sweep => match k.as_str() {
                "autoSweepEveryTouches" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100_000)?));
                }
                _ => return Err(format!("unknown sweep field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block the widget.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Display cap and client refresh settings for the listing. Defaults apply
/// when no workspace is open.
pub fn load_listing_options(conn: Option<&rusqlite::Connection>) -> anyhow::Result<ListingOptions> {
    let section = match conn {
        Some(c) => load_section(c, SetupSection::Connected)?,
        None => default_section(SetupSection::Connected),
    };
    Ok(ListingOptions {
        cap: section["maxShown"].as_u64().unwrap_or(15) as usize,
        refresh_seconds: section["refreshSeconds"].as_u64().unwrap_or(60),
        list_guests_for_admins: section["listGuestsForAdmins"].as_bool().unwrap_or(true),
    })
}

/// 0 disables automatic sweeps.
pub fn load_auto_sweep_every(conn: &rusqlite::Connection) -> anyhow::Result<u64> {
    let section = load_section(conn, SetupSection::Sweep)?;
    Ok(section["autoSweepEveryTouches"].as_u64().unwrap_or(0))
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "storage_unavailable", "select a workspace first", None);
    };
    let connected = match load_section(conn, SetupSection::Connected) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let sweep = match load_section(conn, SetupSection::Sweep) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "connected": connected,
            "sweep": sweep
        }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "storage_unavailable", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
