pub mod mode;
pub mod types;

pub use mode::{ParseRunModeError, RunMode};
pub use types::*;
