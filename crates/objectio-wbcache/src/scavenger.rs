//! Background eviction sweeps
//!
//! The store only evicts when it is touched. The scavenger forces a sweep on
//! a fixed cadence so entries that nobody accesses again still get written
//! back and dropped.

use crossbeam_channel::{Sender, bounded, select, tick};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

pub(crate) struct Scavenger {
    /// Dropping the sender wakes the thread and stops it
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scavenger {
    /// Spawn a thread that calls `sweep` every `interval` until stopped
    pub fn spawn<F>(name: &str, interval: Duration, sweep: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let ticker = tick(interval);
        let cache = name.to_string();

        let handle = thread::Builder::new()
            .name(format!("{name}-scavenger"))
            .spawn(move || {
                info!(cache = %cache, ?interval, "Scavenger started");
                loop {
                    select! {
                        recv(ticker) -> _ => sweep(),
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                info!(cache = %cache, "Scavenger stopped");
            })?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Scavenger thread panicked");
        }
    }
}

impl Drop for Scavenger {
    fn drop(&mut self) {
        self.shutdown();
    }
}
