use anyhow::Result;
use std::sync::Arc;

use shotkeeper::cli::lossy_args;
use shotkeeper::shell::HeadlessShell;
use shotkeeper::{Bootstrap, BootstrapOptions, Shell};

fn main() -> Result<()> {
    let args = lossy_args(std::env::args_os().skip(1));

    Bootstrap::new(BootstrapOptions::default()).run(args, |ctx, runtime| {
        Arc::new(HeadlessShell::new(ctx, runtime)) as Arc<dyn Shell>
    })?;

    Ok(())
}
