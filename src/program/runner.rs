//! Runs uploaded programs against a fresh autosubmit power state

use crate::daemon::CommandSink;
use crate::power::PowerState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tank_shared::{Program, Statement};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Parse and run `source` on its own task
///
/// Returns as soon as the task is spawned. The program runs to completion;
/// parse and run errors are logged and otherwise discarded.
pub fn spawn_program(source: String, sink: Arc<dyn CommandSink>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match run_program(&source, sink).await {
            Ok(steps) => info!("[PROGRAM] finished after {} statements", steps),
            Err(e) => error!("[PROGRAM] aborted: {:#}", e),
        }
    })
}

/// Parse and run `source` to completion, returning the number of statements run
pub async fn run_program(source: &str, sink: Arc<dyn CommandSink>) -> Result<usize> {
    let program = Program::parse(source).context("invalid program")?;
    info!("[PROGRAM] starting, {} statements", program.len());

    let mut power = PowerState::new(true, sink);
    for statement in &program.statements {
        execute(&mut power, statement).await?;
    }

    Ok(program.len())
}

async fn execute(power: &mut PowerState, statement: &Statement) -> Result<()> {
    match statement {
        Statement::Set { channel, direction } => {
            power.set_direction(*channel, *direction).await?;
        }
        Statement::ResetChannel(channel) => power.reset_channel(*channel).await,
        Statement::ResetAll => power.reset().await,
        Statement::Sleep(duration) => tokio::time::sleep(*duration).await,
    }
    Ok(())
}
