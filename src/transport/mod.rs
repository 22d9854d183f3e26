//! Transport module - TCP socket handling.
//!
//! Provides the listener used by the server accept loop and the dial helper
//! used by clients, which bounds connection setup with a timeout.

mod tcp;

pub use tcp::{dial, Listener};
