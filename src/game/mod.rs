//! Game simulation modules

pub mod collision;
pub mod diff;
pub mod scheduler;
pub mod session;
pub mod tuning;
pub mod world;

pub use session::{GameSession, SessionCommand, SessionHandle, SessionRegistry};
pub use tuning::GameConfig;
pub use world::World;
