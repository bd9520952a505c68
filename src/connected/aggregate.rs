use crate::error::PresenceError;
use crate::roles::{Role, Sex};
use crate::scope::{ScopeSelector, ScopedQuery};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAggregate {
    pub role: Role,
    pub count: u64,
    pub dominant_sex: Sex,
}

impl RoleAggregate {
    pub fn empty(role: Role) -> Self {
        Self {
            role,
            count: 0,
            dominant_sex: Sex::Unknown,
        }
    }
}

/// Counts distinct connected users matching `scope` and `role`.
///
/// With no open storage the count is zero rather than an error; the widget is
/// shown before a workspace exists.
pub fn count_by_scope(
    conn: Option<&Connection>,
    scope: &ScopeSelector,
    role: Role,
) -> Result<RoleAggregate, PresenceError> {
    let query = ScopedQuery::for_scope(scope, role)?
        .with_leading_join("LEFT JOIN users u ON u.id = c.user_id");
    let Some(conn) = conn else {
        return Ok(RoleAggregate::empty(role));
    };

    let sql = query.sql(
        "COUNT(DISTINCT c.user_id),
         COUNT(DISTINCT COALESCE(u.sex, 'unknown')),
         MIN(COALESCE(u.sex, 'unknown'))",
        None,
    );
    let (count, sexes, any_sex): (i64, i64, Option<String>) = conn.query_row(
        &sql,
        params_from_iter(query.params().iter()),
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;

    let dominant_sex = match (sexes, any_sex) {
        (1, Some(s)) => Sex::from_stored(&s),
        _ => Sex::Unknown,
    };
    Ok(RoleAggregate {
        role,
        count: count.max(0) as u64,
        dominant_sex,
    })
}

/// Aggregates for every role in [`Role::SUM_ORDER`].
pub fn counts_for_all_roles(
    conn: Option<&Connection>,
    scope: &ScopeSelector,
) -> Result<Vec<RoleAggregate>, PresenceError> {
    Role::SUM_ORDER
        .iter()
        .map(|r| count_by_scope(conn, scope, *r))
        .collect()
}

/// Sum of [`counts_for_all_roles`]. Counts role memberships rather than
/// distinct users: someone enrolled under two course roles is counted once
/// per role.
pub fn sum_all_roles(conn: Option<&Connection>, scope: &ScopeSelector) -> Result<u64, PresenceError> {
    Ok(counts_for_all_roles(conn, scope)?
        .iter()
        .map(|a| a.count)
        .sum())
}
