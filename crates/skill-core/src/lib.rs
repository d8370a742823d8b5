pub mod analysis;
pub mod config;
pub mod lifecycle;
pub mod matcher;
pub mod scan;
pub mod skills;
pub mod types;

pub use config::Config;
pub use matcher::{match_skills, MatchError, MatchWeights};
pub use types::*;
