//! Room Relay - a real-time WebSocket hub for party games
//!
//! This library provides the hub that owns client and room state, the
//! capability-aware broadcast policy, the per-connection session protocol
//! and the client for the external game/room service.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod game_service;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;
