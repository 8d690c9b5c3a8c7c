//! Process shutdown on SIGINT or SIGTERM
//!
//! Shared by the API server and the standalone worker. A signal whose handler
//! cannot be installed is logged and never fires; the other still does.

use std::fmt;
use std::future::Future;
use tokio::signal;
use tracing::{error, info};

/// Which signal ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait for Ctrl+C or SIGTERM, then log which one arrived
pub async fn shutdown_signal(service: &str) -> ShutdownSignal {
    let received = first_signal(interrupt(), terminate()).await;
    info!("{} received {}, shutting down", service, received);
    received
}

/// Resolve with whichever of the two futures finishes first
pub async fn first_signal<I, T>(interrupt: I, terminate: T) -> ShutdownSignal
where
    I: Future<Output = ()>,
    T: Future<Output = ()>,
{
    tokio::select! {
        _ = interrupt => ShutdownSignal::Interrupt,
        _ = terminate => ShutdownSignal::Terminate,
    }
}

async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Ctrl+C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("SIGTERM handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
