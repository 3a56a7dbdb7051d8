//! HTTP surface: the provider-facing webhook endpoints plus the
//! operator/admin API.

pub mod admin;
pub mod server;
pub mod webhook;

pub use server::{AppState, build_app, serve};
