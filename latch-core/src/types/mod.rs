pub mod bucket;
pub mod primitives;

pub use bucket::{BucketConfig, BucketStatus, DripSize};
pub use primitives::{Script, SetCondition, new_token, now_ms, now_secs};
