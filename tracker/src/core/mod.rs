//! Deterministic, pure building blocks.
//!
//! Core modules perform no I/O. Time, timers, and storage live in
//! [`crate::io`] and are handed in by the services.

pub mod activity;
pub mod countdown;
pub mod duration;
pub mod events;
pub mod scripted;
pub mod store;
pub mod summary;
pub(crate) mod sync;
pub mod validation;
