//! Periodic syncers: the admin client's sole callers.
//!
//! Each syncer owns one of the three data-write namespaces and is the only
//! writer to it, per the ownership invariant in the data model.

pub mod buckets;
pub mod pool;
pub mod users;
pub mod usage;

pub use buckets::SyncBuckets;
pub use usage::SyncUsage;
pub use users::SyncUsers;
