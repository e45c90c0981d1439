//! Request and response bodies exposed by the control API.

pub mod health;
pub mod session;
