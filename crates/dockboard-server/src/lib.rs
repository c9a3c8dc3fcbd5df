//! Dock Board Server
//!
//! HTTP and WebSocket front end for the shared loading-dock scheduling
//! board. Every browser session connected to `/ws` sees the same board;
//! accepted changes are persisted and fanned out to all other sessions.
//!
//! # Usage
//!
//! ```bash
//! dockboard-server --config dockboard.toml --port 3000
//! ```
//!
//! # Endpoints
//!
//! - `GET /api/board` - current board snapshot
//! - `GET /api/yesterday`, `GET /api/tomorrow` - neighbouring days
//! - `POST /api/import` - re-read the schedule and merge it
//! - `GET|POST /api/report` - write the monthly report
//! - `GET /ws` - realtime board (`board:init`, `board:updated`,
//!   `board:update`, `board:command`, `board:rejected`)

mod handlers;
mod server;

pub use handlers::websocket::{ClientMessage, Rejection, ServerMessage};
pub use server::{shutdown_signal, AppState, BoardServer, ServerConfig};
