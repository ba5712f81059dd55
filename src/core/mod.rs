//! Core building blocks of the bootstrap
//!
//! Gates, the shared application context, the background loader and the
//! traits the UI side implements.

pub mod context;
pub mod gate;
pub mod loader;
pub mod traits;
