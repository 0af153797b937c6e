//! Outstanding-request table with the staleness guard
//!
//! At most one token per variable is ever *current*. Issuing a new request
//! supersedes the previous token without deleting it, so a late reply is
//! still recognized and can be dropped silently instead of being mistaken
//! for an unknown sender.

use std::time::Instant;

use ahash::AHashMap;

use crate::range::TimeRange;
use crate::variable::VariableId;

/// Token correlating an asynchronous fetch with its eventual reply.
pub type AcquisitionToken = uuid::Uuid;

/// One dispatched fetch.
#[derive(Debug, Clone)]
pub struct AcquisitionRequest {
    pub token: AcquisitionToken,
    pub variable: VariableId,
    pub range: TimeRange,
    pub issued_at: Instant,
}

#[derive(Debug)]
struct RequestRecord {
    request: AcquisitionRequest,
    superseded: bool,
}

/// Outcome of checking a token against the table.
#[derive(Debug, Clone)]
pub enum TokenValidity {
    /// The token is the latest issued for its variable.
    Current(AcquisitionRequest),
    /// A newer request replaced this one; its reply must be dropped.
    Superseded(VariableId),
    /// Never issued, or already settled.
    Unknown,
}

/// Tracks outstanding fetches per variable.
#[derive(Debug, Default)]
pub struct RequestTable {
    records: AHashMap<AcquisitionToken, RequestRecord>,
    current: AHashMap<VariableId, AcquisitionToken>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh token for `variable`, superseding any prior one.
    pub fn issue(&mut self, variable: VariableId, range: TimeRange) -> AcquisitionToken {
        let token = uuid::Uuid::new_v4();
        let request = AcquisitionRequest { token, variable, range, issued_at: Instant::now() };
        if let Some(previous) = self.current.insert(variable, token) {
            if let Some(record) = self.records.get_mut(&previous) {
                record.superseded = true;
            }
        }
        self.records.insert(token, RequestRecord { request, superseded: false });
        token
    }

    /// The active request for `variable`, if any.
    pub fn current(&self, variable: VariableId) -> Option<&AcquisitionRequest> {
        self.current
            .get(&variable)
            .and_then(|token| self.records.get(token))
            .map(|record| &record.request)
    }

    /// Non-destructive staleness check, used for progress messages.
    pub fn validity(&self, token: AcquisitionToken) -> TokenValidity {
        match self.records.get(&token) {
            Some(record) if record.superseded => TokenValidity::Superseded(record.request.variable),
            Some(record) => TokenValidity::Current(record.request.clone()),
            None => TokenValidity::Unknown,
        }
    }

    /// Resolve a terminal reply (data, failure): the record is removed
    /// whatever its status, and the caller learns whether it was current.
    pub fn settle(&mut self, token: AcquisitionToken) -> TokenValidity {
        match self.records.remove(&token) {
            Some(record) => {
                if record.superseded {
                    TokenValidity::Superseded(record.request.variable)
                } else {
                    self.current.remove(&record.request.variable);
                    TokenValidity::Current(record.request)
                }
            }
            None => TokenValidity::Unknown,
        }
    }

    /// Drop the active request for `variable`, returning it so the provider
    /// can be asked to abort. Superseded records are left for their late
    /// replies to settle.
    pub fn cancel(&mut self, variable: VariableId) -> Option<AcquisitionRequest> {
        let token = self.current.remove(&variable)?;
        self.records.remove(&token).map(|record| record.request)
    }

    /// Purge every record belonging to `variable`, returning the request
    /// that was still active, if any.
    pub fn remove_variable(&mut self, variable: VariableId) -> Option<AcquisitionRequest> {
        let active = self.cancel(variable);
        self.records.retain(|_, record| record.request.variable != variable);
        active
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
