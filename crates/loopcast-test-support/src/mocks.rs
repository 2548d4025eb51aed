//! Fake [`Transfer`] implementations.

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use loopcast_core::{Transfer, TransferError};

/// Transfer that writes fixed bytes and records each requested identifier.
#[derive(Debug)]
pub struct RecordingTransfer {
    body: Vec<u8>,
    calls: Mutex<Vec<String>>,
}

impl RecordingTransfer {
    /// Transfer writing `body` into every target.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Identifiers requested so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for RecordingTransfer {
    fn default() -> Self {
        Self::new(b"fake video".to_vec())
    }
}

#[async_trait]
impl Transfer for RecordingTransfer {
    async fn fetch(&self, identifier: &str, target: &Path) -> Result<(), TransferError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(identifier.to_string());
        tokio::fs::write(target, &self.body)
            .await
            .map_err(|source| TransferError::io("write_fake_transfer", target, source))
    }
}

/// Transfer that always fails with the given HTTP status.
#[derive(Debug, Clone, Copy)]
pub struct FailingTransfer {
    status: u16,
}

impl FailingTransfer {
    /// Transfer failing with `status`.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self { status }
    }
}

#[async_trait]
impl Transfer for FailingTransfer {
    async fn fetch(&self, identifier: &str, _target: &Path) -> Result<(), TransferError> {
        Err(TransferError::Status {
            url: format!("https://drive.invalid/uc?id={identifier}"),
            status: self.status,
        })
    }
}
