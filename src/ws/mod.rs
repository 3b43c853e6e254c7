//! WebSocket transport: wire protocol, validation and per-player routing

pub mod channels;
pub mod handler;
pub mod protocol;
pub mod validate;
