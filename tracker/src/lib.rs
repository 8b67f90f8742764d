//! Activity tracker built on deterministic, nullable infrastructure.
//!
//! - **[`core`]**: Pure logic (scripted responses, events, store, validation,
//!   value objects, countdown and summary rules). No I/O.
//! - **[`io`]**: Clock, interval timer, activity storage, and configuration.
//!   Every type has a real `create` and a deterministic `create_null`.
//!
//! The services ([`activities`], [`countdown`]) combine the two and back the
//! CLI commands.

pub mod activities;
pub mod core;
pub mod countdown;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
