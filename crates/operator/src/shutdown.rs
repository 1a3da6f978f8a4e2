//! Process signals that start the drain

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGINT (interactive) or SIGTERM (pod termination)
pub struct ShutdownSignal {
    sigterm: Signal,
}

impl ShutdownSignal {
    /// Register the SIGTERM handler; from here on SIGTERM no longer kills the process
    pub fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        Ok(Self { sigterm })
    }

    /// Wait for the first shutdown signal and return its name
    pub async fn recv(mut self) -> Result<&'static str> {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res.context("failed to listen for SIGINT")?;
                Ok("SIGINT")
            }
            _ = self.sigterm.recv() => Ok("SIGTERM"),
        }
    }
}
