//! ShotKeeper bootstrap core
//!
//! Single-instance arbitration, personal path resolution, background loading
//! of the configuration documents, weekly backups and last-resort fault
//! reporting for the ShotKeeper capture tool.

pub mod app;
pub mod backup;
pub mod cli;
pub mod config;
pub mod core;
pub mod instance;
pub mod logging;
pub mod paths;
pub mod reporter;
pub mod shell;
pub mod utils;

// Re-export core types and traits for easier use
pub use app::{Bootstrap, BootstrapOptions, RunOutcome};
pub use crate::core::{
    context::{ApplicationContext, ConfigSlot},
    gate::LoadGate,
    loader::LoadCoordinator,
    traits::{FaultPresenter, Shell},
};
pub use utils::error::{AppError, AppResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
