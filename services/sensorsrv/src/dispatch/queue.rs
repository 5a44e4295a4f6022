//! Bounded in-process alert queue

use super::AlertDispatcher;
use crate::models::AlertEvent;
use async_trait::async_trait;
use errors::{CityError, CityResult};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Producer side of the alert queue
///
/// `dispatch` never waits: a full queue rejects the alert immediately.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    tx: mpsc::Sender<AlertEvent>,
}

impl QueueDispatcher {
    /// Create the dispatcher and the receiver its processor consumes
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Free slots left in the queue
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl AlertDispatcher for QueueDispatcher {
    fn name(&self) -> &'static str {
        "queue"
    }

    async fn dispatch(&self, alert: &AlertEvent) -> CityResult<()> {
        self.tx.try_send(alert.clone()).map_err(|e| match e {
            TrySendError::Full(a) => {
                CityError::Dispatch(format!("alert queue full, dropped alert for {}", a.sensor))
            },
            TrySendError::Closed(a) => {
                CityError::Dispatch(format!("alert queue closed, dropped alert for {}", a.sensor))
            },
        })
    }
}
