//! Small helpers shared by the engine and the opponent driver.

pub mod cancel;
pub mod rng;

pub use cancel::CancellationToken;
pub use rng::{pick_index, shuffle_seeded, split_seed};
