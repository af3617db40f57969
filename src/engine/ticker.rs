//! Background mark-to-market.
//!
//! A dedicated thread wakes on a `crossbeam_channel::tick`, marks every open
//! position and publishes the account snapshots on a bounded channel. Sends
//! never block: when the consumer falls behind, that tick's batch is dropped.

use super::core::Engine;
use crate::account::AccountSummary;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct MarkToMarketTicker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MarkToMarketTicker {
    /// Starts the loop with the engine's configured interval and buffer.
    /// Returns the handle and the snapshot stream.
    pub fn spawn(engine: Arc<Engine>) -> (Self, Receiver<Vec<AccountSummary>>) {
        let interval = engine.config().mark_to_market_interval();
        let (snapshot_tx, snapshot_rx) = bounded(engine.config().snapshot_buffer.max(1));
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::spawn(move || {
            let ticker = tick(interval);
            tracing::info!(interval_ms = interval.as_millis() as u64, "mark-to-market started");
            loop {
                select! {
                    recv(ticker) -> _ => {
                        engine.update_position_prices();
                        let snapshots = engine.get_account_snapshots();
                        match snapshot_tx.try_send(snapshots) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                tracing::debug!("snapshot consumer lagging, batch dropped");
                            }
                            // nobody listening; keep marking
                            Err(TrySendError::Disconnected(_)) => {}
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            tracing::info!("mark-to-market stopped");
        });

        (
            Self {
                stop: Some(stop_tx),
                handle: Some(handle),
            },
            snapshot_rx,
        )
    }

    /// Stops the loop and waits for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the sender disconnects stop_rx, which ends the select
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("mark-to-market thread panicked");
            }
        }
    }
}

impl Drop for MarkToMarketTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
