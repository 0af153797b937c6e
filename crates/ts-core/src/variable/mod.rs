//! Variables and their lifecycle state
//!
//! A variable owns its display range, the range its cached series is valid
//! for, and the series handle itself. All mutation goes through the
//! controller; external collaborators only ever hold a [`VariableId`] and
//! read snapshots.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::range::TimeRange;
use crate::series::DataSeries;

/// Variable identifier type
pub type VariableId = uuid::Uuid;

/// Lifecycle state of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableState {
    /// Created, no load requested yet.
    Init,
    /// An acquisition is in flight.
    Loading,
    /// The cached series covers the display range.
    UpToDate,
    /// The last acquisition was cancelled.
    Aborted,
    /// The last acquisition failed.
    Error,
}

/// A browsable time series bound to one data provider.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    name: String,
    metadata: IndexMap<String, String>,
    display_range: Option<TimeRange>,
    cached_range: Option<TimeRange>,
    series: Option<Arc<DataSeries>>,
    state: VariableState,
}

/// Read-only view of a variable, safe to hand to external collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct VariableSnapshot {
    pub id: VariableId,
    pub name: String,
    pub state: VariableState,
    pub display_range: Option<TimeRange>,
    pub cached_range: Option<TimeRange>,
}

impl Variable {
    pub(crate) fn new(name: impl Into<String>, metadata: IndexMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            metadata,
            display_range: None,
            cached_range: None,
            series: None,
            state: VariableState::Init,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Product-selection keys handed to the provider verbatim.
    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    pub fn display_range(&self) -> Option<TimeRange> {
        self.display_range
    }

    pub fn cached_range(&self) -> Option<TimeRange> {
        self.cached_range
    }

    /// A consistent handle on the current series; the controller swaps the
    /// whole handle on fetch completion, never the buffers behind it.
    pub fn series(&self) -> Option<Arc<DataSeries>> {
        self.series.clone()
    }

    pub fn state(&self) -> VariableState {
        self.state
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        VariableSnapshot {
            id: self.id,
            name: self.name.clone(),
            state: self.state,
            display_range: self.display_range,
            cached_range: self.cached_range,
        }
    }

    /// Pure data mutation; fetching decisions live in the controller.
    pub(crate) fn set_display_range(&mut self, range: TimeRange) {
        self.display_range = Some(range);
    }

    pub(crate) fn mark_loading(&mut self) {
        self.state = VariableState::Loading;
    }

    pub(crate) fn mark_up_to_date(&mut self) {
        self.state = VariableState::UpToDate;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = VariableState::Aborted;
    }

    pub(crate) fn mark_error(&mut self) {
        self.state = VariableState::Error;
    }

    /// Install a fetched block. The cached range becomes the union with the
    /// previous cache when the two join; a gap (or a shape change) means the
    /// new block stands alone and the old cache is invalidated.
    pub(crate) fn apply_fetch_result(&mut self, range: TimeRange, series: DataSeries) {
        let merged = match (&self.series, &self.cached_range) {
            (Some(old), Some(cached)) if cached.joins(&range) => old.merged_with(&series),
            _ => None,
        };
        match merged {
            Some(combined) => {
                // joins(range) held, so the union exists
                self.cached_range = self.cached_range.and_then(|cached| cached.union(&range));
                self.series = Some(Arc::new(combined));
            }
            None => {
                self.cached_range = Some(range);
                self.series = Some(Arc::new(series));
            }
        }
        self.state = VariableState::UpToDate;
    }
}
