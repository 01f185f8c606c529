mod common;
mod player;
mod stats;

pub use common::*;
pub use player::*;
pub use stats::*;
