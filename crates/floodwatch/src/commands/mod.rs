//! Command dispatch: bridges CLI args -> sync engine -> output formatting.

pub mod alerts;
pub mod config_cmd;
pub mod devices;
pub mod util;
pub mod watch;

use floodwatch_core::SyncEngine;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
///
/// One-shot commands load a single snapshot; `watch` attaches to the
/// event stream and runs until interrupted.
pub async fn dispatch(
    cmd: Command,
    engine: &SyncEngine,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(engine, args, global).await,
        cmd => {
            engine.reload().await?;
            match cmd {
                Command::Devices(args) => devices::list(engine, &args, global),
                Command::Device { id } => devices::show(engine, &id, global),
                Command::Summary => devices::summary(engine, global),
                Command::Alerts(args) => alerts::list(engine, &args, global),
                // Config, Completions and Watch are handled before this point
                Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
            }
        }
    }
}
