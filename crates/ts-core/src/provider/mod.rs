//! The contract between the engine and pluggable data providers
//!
//! Providers receive a token and parameters, start their work without
//! blocking, and deliver the outcome back to the controller as
//! [`AcquisitionReply`] messages over a channel. The controller drains that
//! channel sequentially, which is what preserves the staleness and ordering
//! guarantees without a GUI event loop.

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::acquisition::AcquisitionToken;
use crate::range::TimeRange;
use crate::series::DataSeries;

/// Parameters handed to a provider for one acquisition.
#[derive(Debug, Clone)]
pub struct DataProviderParameters {
    pub range: TimeRange,
    /// Product-selection keys, forwarded verbatim from the variable.
    pub metadata: IndexMap<String, String>,
}

/// Failure reported by a provider for one token.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("malformed series: {0}")]
    MalformedSeries(String),
}

/// A single message travelling from a provider back to the controller.
#[derive(Debug)]
pub enum AcquisitionReply {
    /// Successful completion: one contiguous block covering `range`.
    DataProvided {
        token: AcquisitionToken,
        range: TimeRange,
        series: DataSeries,
    },
    /// Fraction of the acquisition already delivered, in `[0, 1]`.
    Progress {
        token: AcquisitionToken,
        fraction: f64,
    },
    Failed {
        token: AcquisitionToken,
        error: ProviderError,
    },
}

/// Cloneable sending side of the acquisition reply channel.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    tx: mpsc::UnboundedSender<AcquisitionReply>,
}

impl ReplyHandle {
    pub fn new(tx: mpsc::UnboundedSender<AcquisitionReply>) -> Self {
        Self { tx }
    }

    pub fn data_provided(&self, token: AcquisitionToken, range: TimeRange, series: DataSeries) {
        self.send(AcquisitionReply::DataProvided { token, range, series });
    }

    pub fn progress(&self, token: AcquisitionToken, fraction: f64) {
        self.send(AcquisitionReply::Progress { token, fraction });
    }

    pub fn failed(&self, token: AcquisitionToken, error: ProviderError) {
        self.send(AcquisitionReply::Failed { token, error });
    }

    fn send(&self, reply: AcquisitionReply) {
        if self.tx.send(reply).is_err() {
            // controller already shut down; late replies have nowhere to go
            tracing::debug!("dropping acquisition reply, controller is gone");
        }
    }
}

/// A data source able to produce series for arbitrary time ranges.
///
/// One provider instance is owned by exactly one variable; use
/// [`DataProvider::clone_provider`] to back another variable with the same
/// product.
pub trait DataProvider: Send + Sync {
    /// Start producing data for `token`. Must not block: spawn the work and
    /// return immediately, then deliver exactly one terminal reply (data or
    /// failure) through `replies` unless aborted first.
    fn request_data_loading(
        &self,
        token: AcquisitionToken,
        parameters: DataProviderParameters,
        replies: ReplyHandle,
    );

    /// Best-effort cancellation of the work behind `token`. No
    /// acknowledgment is expected; a reply may still arrive afterwards and
    /// will be discarded by the staleness guard.
    fn request_data_aborting(&self, token: AcquisitionToken);

    /// A fresh, independent instance backed by the same product.
    fn clone_provider(&self) -> Box<dyn DataProvider>;
}
