use crate::error::PresenceError;
use crate::ipc::error::err;
use crate::roles::Role;
use crate::scope::{HierarchyLevel, ScopeSelector};
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<PresenceError> for HandlerErr {
    fn from(e: PresenceError) -> Self {
        match &e {
            PresenceError::StorageUnavailable => tracing::warn!("{}", e),
            _ => tracing::error!(code = e.code(), "presence request aborted: {}", e),
        }
        Self {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be integer or null", key))),
    }
}

pub fn get_optional_usize(params: &Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("{} must be a non-negative integer", key))
            }),
    }
}

pub fn get_required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// `level` (default "system") plus `nodeId`.
pub fn parse_scope(params: &Value) -> Result<ScopeSelector, HandlerErr> {
    let level = match params.get("level").and_then(|v| v.as_str()) {
        Some(s) => HierarchyLevel::parse(s)?,
        None => HierarchyLevel::System,
    };
    let node_id = get_optional_i64(params, "nodeId")?;
    Ok(ScopeSelector::new(level, node_id)?)
}

pub fn parse_role(params: &Value, key: &str) -> Result<Role, HandlerErr> {
    Ok(Role::parse(get_required_str(params, key)?)?)
}

/// Optional RFC 3339 instant; absent means now.
pub fn parse_instant(params: &Value, key: &str) -> Result<DateTime<Utc>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Utc::now()),
        Some(v) => {
            let s = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key)))?;
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| HandlerErr::bad_params(format!("{} is not RFC 3339: {}", key, e)))
        }
    }
}
