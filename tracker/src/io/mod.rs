//! Side-effecting infrastructure.
//!
//! Each type offers `create` for the real resource and `create_null` for a
//! deterministic stand-in with the same methods.

pub mod clock;
pub mod config;
pub mod repository;
pub mod timer;
