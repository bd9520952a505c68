//! Connected-users presence: the upsert ledger, per-scope aggregates and the
//! capped, recency-ordered listing.

pub mod aggregate;
pub mod context;
pub mod listing;
pub mod store;

pub use aggregate::{count_by_scope, counts_for_all_roles, sum_all_roles};
pub use context::{ListingOptions, RequestContext, Viewer};
pub use listing::list_connected;
pub use store::{sweep, touch, touch_at};
