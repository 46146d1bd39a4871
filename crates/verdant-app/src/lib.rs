//! Verdant headless terrain streamer.
//!
//! Drives a chunk tree from a scripted walk on a fixed timestep, keeps the
//! player on the ground, scatters props over streamed chunks and floods
//! the ones that dip below the water level.

pub mod error;
pub mod game_loop;
pub mod platform;
pub mod scatter;
pub mod session;
pub mod walk;
pub mod water;

pub use error::AppError;
pub use session::{Session, Summary, run};
