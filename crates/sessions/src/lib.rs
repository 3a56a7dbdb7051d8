//! Short-lived conversational state.
//!
//! Layers user-scoped, global, and "user properties" namespaces over the
//! shared TTL store. Keys are prefixed `confab:<scope>:<key>`; the global
//! scope uses the literal scope name `global` and a longer default TTL.
//! Sessions are created implicitly on first write and disappear when
//! every key expires or is cleared.

pub mod error;
pub mod props;
pub mod scope;

pub use {
    error::{Error, Result},
    scope::{ScopedSession, SessionStore, SessionTtl},
};

pub(crate) const KEY_PREFIX: &str = "confab";
pub(crate) const GLOBAL_SCOPE: &str = "global";

/// The session key the user-properties map lives under.
pub const PROPS_KEY: &str = "props";
