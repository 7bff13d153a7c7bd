pub mod bans;
pub mod exclusion;

pub use bans::{BanRegistry, SqliteBanRegistry};
pub use exclusion::{ExclusionRegistry, ExclusionSource, SqliteExclusionSource};
