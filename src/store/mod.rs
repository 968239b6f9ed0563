//! External service clients

pub mod backend;

pub use backend::{AuthBackend, BackendError, User};
