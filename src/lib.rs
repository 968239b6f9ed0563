//! Invaders Server - authoritative arcade game server
//!
//! One WebSocket connection carries one player's game. The server owns
//! the full simulation state and streams create/update/delete diffs to
//! the client every tick; authentication and highscore persistence are
//! delegated to an external HTTP backend.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod store;
pub mod util;
pub mod ws;
