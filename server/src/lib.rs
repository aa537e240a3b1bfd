//! # Arena Server Library
//!
//! Authoritative simulation server for the arena shooter. Clients connect
//! over a WebSocket endpoint, submit control input, and receive periodic
//! JSON broadcasts of the world state; all physics, damage and scoring
//! decisions are made here.
//!
//! ## Architecture
//!
//! All state for a room lives on a single tokio task. Connection tasks parse
//! inbound frames at the socket boundary and forward validated messages
//! through one channel per room, so message handling and simulation ticks
//! interleave without ever overlapping and the room needs no locks.
//!
//! ## Module Organization
//!
//! - [`session`]: the registry of live connections and their latest input
//!   snapshots.
//! - [`game`]: the world model and the fixed-tick simulation (movement,
//!   bullets, collisions, scoring, respawns).
//! - [`room`]: the room event loop — message routing, the idle/running tick
//!   state machine, and best-effort broadcasting.
//! - [`network`]: the WebSocket accept loop and per-connection reader and
//!   writer tasks.

pub mod game;
pub mod network;
pub mod room;
pub mod session;
