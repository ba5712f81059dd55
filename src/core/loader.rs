//! Background configuration loading
//!
//! The three documents are loaded one after the other on a single blocking
//! worker. Program settings go first because the default task settings live
//! there and the shell needs them before it can run. Each document's gate
//! opens as soon as that document is published.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::SettingsDocument;
use crate::core::context::{ApplicationContext, ConfigSlot};

pub struct LoadCoordinator;

impl LoadCoordinator {
    /// Schedule the load sequence on the runtime's blocking pool.
    pub fn start(ctx: Arc<ApplicationContext>, runtime: &Handle) -> JoinHandle<()> {
        runtime.spawn_blocking(move || Self::load_all(&ctx))
    }

    /// Load program, uploader and hotkey settings, in that order.
    pub fn load_all(ctx: &ApplicationContext) {
        let paths = ctx.paths();
        load_into(&ctx.settings, paths.application_config_file_path().as_deref());
        load_into(&ctx.uploaders_config, paths.uploaders_config_file_path().as_deref());
        load_into(&ctx.hotkeys_config, paths.hotkeys_config_file_path().as_deref());
    }
}

fn load_into<T: SettingsDocument>(slot: &ConfigSlot<T>, path: Option<&Path>) {
    let started = Instant::now();
    let document = match T::load(path) {
        Ok(document) => document,
        Err(e) => {
            error!("{}, continuing with defaults", e);
            T::default()
        }
    };
    slot.publish(document);
    info!("{} load finished in {} ms", T::FILE_NAME, started.elapsed().as_millis());
}
