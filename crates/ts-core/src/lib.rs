//! Core time-range acquisition engine for the time series browser
//!
//! This crate decides when a display-range change needs a provider fetch,
//! tracks in-flight acquisitions so stale replies are discarded, and keeps
//! synchronized variables aligned on the same absolute time window.

pub mod acquisition;
pub mod controller;
pub mod events;
pub mod provider;
pub mod range;
pub mod series;
pub mod sync;
pub mod variable;

// Re-export commonly used types
pub use acquisition::{
    plan_acquisition, AcquisitionDecision, AcquisitionRequest, AcquisitionToken,
    AcquisitionZoomType, RequestTable, TokenValidity,
};
pub use controller::{
    AcquisitionSettings, ControllerError, VariableController, DEFAULT_TOLERANCE_FRACTION,
};
pub use events::VariableObserver;
pub use provider::{AcquisitionReply, DataProvider, DataProviderParameters, ProviderError, ReplyHandle};
pub use range::{InvalidRange, TimeRange};
pub use series::{DataSeries, SeriesError, Unit};
pub use sync::{SynchronizationGroupId, SynchronizationRegistry};
pub use variable::{Variable, VariableId, VariableSnapshot, VariableState};
