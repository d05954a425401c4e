//! Core library for lectern - session management, auth, and research search clients.
//!
//! The central type is [`session::SessionManager`], which owns the
//! authenticated/unauthenticated state for the process, mirrors it into an
//! injected [`session::StorageBackend`], and notifies registered observers on
//! every transition. The [`api`] module talks to the account service; the
//! [`search`] module wraps the two external search products the CLI exercises.

pub mod api;
pub mod config;
pub mod models;
pub mod search;
pub mod session;
pub mod utils;
