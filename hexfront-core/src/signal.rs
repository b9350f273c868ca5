//! "Grid ready" signal
//!
//! A one-shot-per-load notification built on `tokio::sync::watch`. Each
//! completed load bumps the generation. Subscribers see every ready edge at
//! most once; dropping a subscription cancels it.

use crate::error::{GridError, GridResult};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadyState {
    pub generation: u64,
    pub ready: bool,
}

#[derive(Debug)]
pub struct GridReadySignal {
    tx: watch::Sender<ReadyState>,
}

impl GridReadySignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ReadyState::default());
        Self { tx }
    }

    pub fn state(&self) -> ReadyState {
        *self.tx.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state().ready
    }

    /// Grid is being (re)built; spatial lookups must wait
    pub fn mark_loading(&self) {
        self.tx.send_modify(|s| s.ready = false);
    }

    /// Grid finished loading. Returns the new generation.
    pub fn mark_ready(&self) -> u64 {
        self.tx.send_modify(|s| {
            s.generation += 1;
            s.ready = true;
        });
        self.state().generation
    }

    pub fn subscribe(&self) -> GridReadySubscription {
        GridReadySubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for GridReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle held by whoever waits for the grid
#[derive(Debug)]
pub struct GridReadySubscription {
    rx: watch::Receiver<ReadyState>,
}

impl GridReadySubscription {
    /// Non-blocking: true once per ready edge observed since the last call
    pub fn take_fired(&mut self) -> bool {
        match self.rx.has_changed() {
            Ok(true) => self.rx.borrow_and_update().ready,
            _ => false,
        }
    }

    /// Wait until the grid is ready, giving up after `timeout`
    pub async fn wait_ready(&mut self, timeout: Duration) -> GridResult<u64> {
        match tokio::time::timeout(timeout, self.rx.wait_for(|s| s.ready)).await {
            Ok(Ok(state)) => Ok(state.generation),
            Ok(Err(_)) | Err(_) => Err(GridError::GridNotReady { waited: timeout }),
        }
    }
}
