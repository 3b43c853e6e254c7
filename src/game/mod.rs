//! Game simulation modules

pub mod ai;
pub mod hazard;
pub mod physics;
pub mod player;
pub mod registry;
pub mod rules;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod terrain;
pub mod weapons;

pub use registry::{LookupError, SessionHandle, SessionRegistry};
pub use runner::{SessionCommand, SessionSpawner};
pub use session::{ActionError, GameSession, Participant, SessionStatus};
