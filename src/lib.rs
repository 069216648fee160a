//! Netswitch - proxy network coordination
//!
//! Tracks which backend server a player is on, which servers exist behind the
//! proxy, and carries out player moves between them.

/// Node configuration
pub mod config;
/// Tick scheduler and shutdown state
pub mod core;
/// Location storage (MySQL)
pub mod database;
/// User-facing message texts
pub mod lang;
/// Registry, switch coordination, cross-server contracts
pub mod network;
/// The view of an online player the network layer works with
pub mod user;
