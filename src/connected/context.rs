use super::aggregate::{count_by_scope, RoleAggregate};
use super::listing::{list_connected, ConnectedUserEntry};
use crate::error::PresenceError;
use crate::roles::Role;
use crate::scope::ScopeSelector;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Option<i64>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    pub cap: usize,
    pub refresh_seconds: u64,
    pub list_guests_for_admins: bool,
}

/// What the client-side timer needs: elapsed seconds per listed user, in
/// display order. The client adds one per second until the next refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockPayload {
    pub count: usize,
    pub elapsed_seconds: Vec<u64>,
    pub refresh_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleBatch {
    pub aggregate: RoleAggregate,
    pub match_count: usize,
    pub hidden: usize,
    pub entries: Vec<ConnectedUserEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedListing {
    pub batches: Vec<RoleBatch>,
    pub listed: usize,
    pub matched: usize,
    pub more_not_shown: bool,
    pub clock: ClockPayload,
}

/// State of one presence render pass. The quota counters only grow, and
/// batches consume them in call order.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub scope: ScopeSelector,
    pub viewer: Viewer,
    pub now: DateTime<Utc>,
    listed: usize,
    matched: usize,
}

impl RequestContext {
    pub fn new(scope: ScopeSelector, viewer: Viewer, now: DateTime<Utc>) -> Self {
        Self {
            scope,
            viewer,
            now,
            listed: 0,
            matched: 0,
        }
    }

    pub fn listed(&self) -> usize {
        self.listed
    }

    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Set once more users matched than the cap lets us show.
    pub fn more_not_shown(&self, cap: usize) -> bool {
        self.matched > cap
    }

    /// Role batches in quota order for this viewer.
    pub fn listing_roles(&self, list_guests_for_admins: bool) -> Vec<Role> {
        let mut roles = Role::LISTING_ORDER.to_vec();
        if list_guests_for_admins && self.viewer.role == Role::SysAdmin {
            roles.push(Role::Guest);
        }
        roles
    }

    pub fn list_role(
        &mut self,
        conn: &Connection,
        role: Role,
        cap: usize,
    ) -> Result<RoleBatch, PresenceError> {
        let aggregate = count_by_scope(Some(conn), &self.scope, role)?;
        let (listing, listed) = list_connected(conn, &self.scope, role, cap, self.listed, self.now)?;
        self.listed = listed;
        self.matched = self.matched.saturating_add(listing.match_count);
        Ok(RoleBatch {
            aggregate,
            match_count: listing.match_count,
            hidden: listing.hidden(),
            entries: listing.entries,
        })
    }

    pub fn render_pass(
        mut self,
        conn: &Connection,
        options: &ListingOptions,
    ) -> Result<ConnectedListing, PresenceError> {
        let mut batches = Vec::new();
        for role in self.listing_roles(options.list_guests_for_admins) {
            batches.push(self.list_role(conn, role, options.cap)?);
        }
        let elapsed_seconds: Vec<u64> = batches
            .iter()
            .flat_map(|b| b.entries.iter().map(|e| e.seconds_since_last_seen))
            .collect();
        tracing::debug!(
            scope = self.scope.level.as_str(),
            viewer = ?self.viewer.user_id,
            listed = self.listed(),
            matched = self.matched(),
            "connected users listed"
        );
        Ok(ConnectedListing {
            more_not_shown: self.more_not_shown(options.cap),
            listed: self.listed(),
            matched: self.matched(),
            clock: ClockPayload {
                count: elapsed_seconds.len(),
                elapsed_seconds,
                refresh_seconds: options.refresh_seconds,
            },
            batches,
        })
    }
}
