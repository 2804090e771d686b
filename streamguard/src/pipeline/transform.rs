// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Record-to-chunk transform with injectable failures

use super::error::{TransformError, TransformSignalError};
use crate::bootstrap::POISON_ID;
use crate::storage::Record;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Serialized output of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk(Vec<u8>);

impl Chunk {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk(bytes)
    }
}

/// How the transform reacts to the poison record
///
/// Each failing mode ends the stream through a different channel:
///
/// - `SignalFault`: raises a [`TransformSignalError`] on the [`FaultSignal`]
///   and never completes the current call.
/// - `CallbackError`: returns [`TransformError::Rejected`] for the record.
/// - `Fatal`: panics. Nothing in the pipeline catches this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformMode {
    #[default]
    PassThrough,
    SignalFault,
    CallbackError,
    Fatal,
}

/// Receiving end of the transform's out-of-band fault channel
pub struct FaultSignal {
    rx: mpsc::Receiver<TransformSignalError>,
}

impl FaultSignal {
    /// Resolves with the first fault raised; pends forever if none ever is
    pub async fn raised(&mut self) -> TransformSignalError {
        match self.rx.recv().await {
            Some(fault) => fault,
            None => std::future::pending().await,
        }
    }
}

/// Converts records to newline-delimited JSON chunks
///
/// Called once per record; the caller awaits each call before passing the
/// next record.
pub struct TransformStage {
    mode: TransformMode,
    poison_id: String,
    fault_tx: mpsc::Sender<TransformSignalError>,
    fault_rx: Option<mpsc::Receiver<TransformSignalError>>,
    transformed: u64,
}

impl TransformStage {
    pub fn new(mode: TransformMode) -> Self {
        let (fault_tx, fault_rx) = mpsc::channel(1);
        Self {
            mode,
            poison_id: POISON_ID.to_string(),
            fault_tx,
            fault_rx: Some(fault_rx),
            transformed: 0,
        }
    }

    /// Trip on `id` instead of the default poison id
    pub fn with_poison_id(mut self, id: impl Into<String>) -> Self {
        self.poison_id = id.into();
        self
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    /// Records successfully converted so far
    pub fn transformed(&self) -> u64 {
        self.transformed
    }

    /// Hand out the fault channel receiver. Only the first call returns it.
    pub fn take_fault_signal(&mut self) -> Option<FaultSignal> {
        self.fault_rx.take().map(|rx| FaultSignal { rx })
    }

    pub async fn transform(&mut self, record: Record) -> Result<Chunk, TransformError> {
        if record.id == self.poison_id {
            match self.mode {
                TransformMode::PassThrough => {}
                TransformMode::CallbackError => {
                    log::debug!("Rejecting record '{}'", record.id);
                    return Err(TransformError::Rejected {
                        id: record.id,
                        reason: "callback error".to_string(),
                    });
                }
                TransformMode::SignalFault => {
                    log::debug!("Raising fault signal for record '{}'", record.id);
                    let fault = TransformSignalError {
                        id: record.id,
                        reason: "emitted error".to_string(),
                    };
                    if self.fault_tx.try_send(fault).is_err() {
                        log::warn!("Transform fault signal already raised");
                    }
                    // The result for this record never arrives.
                    return std::future::pending().await;
                }
                TransformMode::Fatal => {
                    panic!("unrecoverable transform fault on record '{}'", record.id);
                }
            }
        }

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.transformed += 1;
        Ok(Chunk::from(line))
    }
}
