//! Selection stage: anti-flood per event group, quota-exempt featured pools,
//! category quotas, and the per-author diversity breaker.

pub mod diversity;
pub mod featured;
pub mod group;
pub mod quota;

pub use diversity::select_top_n;
pub use featured::{split_featured, FeaturedSplit};
pub use group::GroupSelector;
pub use quota::{build_pools, PoolShares, QuotaAllocator};
