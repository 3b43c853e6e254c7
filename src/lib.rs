//! Artillery duel server
//!
//! Turn-based artillery matches over WebSocket: destructible terrain,
//! projectile physics, six weapons, lava hazards, computer opponents and a
//! matchmaking queue that falls back to an AI match.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod matchmaking;
pub mod util;
pub mod ws;
