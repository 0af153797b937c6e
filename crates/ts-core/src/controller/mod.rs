//! The variable controller: single source of truth for acquisition policy
//!
//! All state mutation funnels through one writer: public operations take the
//! write lock, provider replies are drained sequentially from one channel.
//! Concurrent range changes for the same variable are serialized by the
//! request table's supersede-on-issue rule, never by blocking.

use std::sync::{Arc, Weak};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::acquisition::{
    plan_acquisition, AcquisitionDecision, AcquisitionToken, RequestTable, TokenValidity,
};
use crate::events::VariableObserver;
use crate::provider::{
    AcquisitionReply, DataProvider, DataProviderParameters, ProviderError, ReplyHandle,
};
use crate::range::TimeRange;
use crate::series::DataSeries;
use crate::sync::{SynchronizationGroupId, SynchronizationRegistry};
use crate::variable::{Variable, VariableId, VariableSnapshot, VariableState};

/// Default tolerance applied around a requested display range before
/// fetching, so small follow-up pans are absorbed by the cache.
pub const DEFAULT_TOLERANCE_FRACTION: f64 = 0.2;

/// Acquisition policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Fraction of the display width added to each padded fetch edge.
    pub tolerance_fraction: f64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self { tolerance_fraction: DEFAULT_TOLERANCE_FRACTION }
    }
}

/// Errors surfaced by controller operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("unknown variable {0}")]
    UnknownVariable(VariableId),
    #[error("unknown synchronization group {0}")]
    UnknownGroup(SynchronizationGroupId),
}

struct VariableEntry {
    variable: Variable,
    provider: Box<dyn DataProvider>,
}

#[derive(Default)]
struct ControllerState {
    variables: AHashMap<VariableId, VariableEntry>,
    requests: RequestTable,
    sync: SynchronizationRegistry,
}

/// Notifications gathered under the lock, dispatched after it is released.
enum Notification {
    RangeChanged(VariableId, TimeRange),
    StateChanged(VariableId, VariableState),
}

/// Owns every variable and orchestrates fetches, staleness and
/// synchronization. External collaborators hold [`VariableId`]s and read
/// snapshots; the controller is the only mutator.
pub struct VariableController {
    state: RwLock<ControllerState>,
    observers: RwLock<Vec<Weak<dyn VariableObserver>>>,
    replies_tx: mpsc::UnboundedSender<AcquisitionReply>,
    settings: AcquisitionSettings,
}

impl VariableController {
    /// Create a controller plus the receiving end of its reply channel. The
    /// caller decides how the channel is drained; see [`Self::run`].
    pub fn new(
        settings: AcquisitionSettings,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<AcquisitionReply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Arc::new(Self {
            state: RwLock::new(ControllerState::default()),
            observers: RwLock::new(Vec::new()),
            replies_tx: tx,
            settings,
        });
        (controller, rx)
    }

    /// Create a controller and spawn its reply loop on the current runtime.
    pub fn spawn(settings: AcquisitionSettings) -> Arc<Self> {
        let (controller, replies) = Self::new(settings);
        tokio::spawn(Arc::clone(&controller).run(replies));
        controller
    }

    /// Drain provider replies in arrival order. For a single variable only
    /// the reply matching the latest issued token is ever applied.
    pub async fn run(self: Arc<Self>, mut replies: mpsc::UnboundedReceiver<AcquisitionReply>) {
        while let Some(reply) = replies.recv().await {
            self.handle_reply(reply);
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Register a new variable in `Init` state; no fetch is issued until the
    /// first display-range request.
    pub fn create_variable(
        &self,
        name: impl Into<String>,
        metadata: IndexMap<String, String>,
        provider: Box<dyn DataProvider>,
    ) -> VariableId {
        let variable = Variable::new(name, metadata);
        let id = variable.id();
        self.state.write().variables.insert(id, VariableEntry { variable, provider });
        info!(variable = %id, "variable created");
        id
    }

    /// Delete a variable: observers are told first, then the active request
    /// is cancelled, group memberships dropped, and series and provider
    /// released. A late reply for its old token is a no-op.
    pub fn delete_variable(&self, id: VariableId) -> Result<(), ControllerError> {
        if !self.state.read().variables.contains_key(&id) {
            return Err(ControllerError::UnknownVariable(id));
        }
        self.notify(|observer| observer.variable_about_to_be_deleted(id));

        let mut guard = self.state.write();
        let state = &mut *guard;
        if let Some(entry) = state.variables.remove(&id) {
            if let Some(request) = state.requests.remove_variable(id) {
                entry.provider.request_data_aborting(request.token);
            }
            state.sync.remove_variable(id);
        }
        drop(guard);
        info!(variable = %id, "variable deleted");
        Ok(())
    }

    /// Delete a set of variables, each with full cleanup.
    pub fn delete_variables(&self, ids: &[VariableId]) {
        for &id in ids {
            if let Err(error) = self.delete_variable(id) {
                warn!(%error, "skipping deletion");
            }
        }
    }

    /// Request the data loading of `variables` within `new_range`.
    ///
    /// Each variable is classified against its own cache; a fetch is issued
    /// only when the tolerance-padded display is not already covered. With
    /// `synchronize`, the same absolute range is propagated to every group
    /// sibling, which then runs its own classification.
    pub fn on_request_data_loading(
        &self,
        variables: &[VariableId],
        new_range: TimeRange,
        old_range: TimeRange,
        synchronize: bool,
    ) -> Result<(), ControllerError> {
        let mut notifications = Vec::new();
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            for &id in variables {
                if !state.variables.contains_key(&id) {
                    return Err(ControllerError::UnknownVariable(id));
                }
            }
            for &id in variables {
                Self::request_range(
                    state,
                    &self.settings,
                    &self.replies_tx,
                    id,
                    new_range,
                    Some(old_range),
                    &mut notifications,
                );
            }
            if synchronize {
                let mut siblings: AHashSet<VariableId> = AHashSet::new();
                for &id in variables {
                    siblings.extend(state.sync.siblings_of(id));
                }
                for &id in variables {
                    siblings.remove(&id);
                }
                for id in siblings {
                    Self::request_range(
                        state,
                        &self.settings,
                        &self.replies_tx,
                        id,
                        new_range,
                        None,
                        &mut notifications,
                    );
                }
            }
        }
        self.dispatch(notifications);
        Ok(())
    }

    /// Cancel the current acquisition of `variable`, best effort. The
    /// visible state becomes `Aborted` immediately; a result the provider
    /// still delivers afterwards is rejected by the staleness guard.
    pub fn abort_progress(&self, id: VariableId) -> Result<(), ControllerError> {
        let mut notifications = Vec::new();
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            let entry = state
                .variables
                .get_mut(&id)
                .ok_or(ControllerError::UnknownVariable(id))?;
            if let Some(request) = state.requests.cancel(id) {
                entry.provider.request_data_aborting(request.token);
                entry.variable.mark_aborted();
                notifications.push(Notification::StateChanged(id, VariableState::Aborted));
                debug!(variable = %id, token = %request.token, "acquisition aborted");
            }
        }
        self.dispatch(notifications);
        Ok(())
    }

    pub fn add_synchronization_group(&self, group: SynchronizationGroupId) {
        if self.state.write().sync.add_group(group) {
            debug!(%group, "synchronization group added");
        }
    }

    pub fn remove_synchronization_group(&self, group: SynchronizationGroupId) {
        if self.state.write().sync.remove_group(group) {
            debug!(%group, "synchronization group removed");
        }
    }

    pub fn join_synchronization_group(
        &self,
        variable: VariableId,
        group: SynchronizationGroupId,
    ) -> Result<(), ControllerError> {
        let mut guard = self.state.write();
        if !guard.variables.contains_key(&variable) {
            return Err(ControllerError::UnknownVariable(variable));
        }
        if !guard.sync.join(variable, group) {
            return Err(ControllerError::UnknownGroup(group));
        }
        Ok(())
    }

    /// Apply one provider reply. Normally called from [`Self::run`].
    pub fn handle_reply(&self, reply: AcquisitionReply) {
        match reply {
            AcquisitionReply::DataProvided { token, range, series } => {
                self.on_data_provided(token, range, series)
            }
            AcquisitionReply::Progress { token, fraction } => {
                self.on_data_progress(token, fraction)
            }
            AcquisitionReply::Failed { token, error } => self.on_data_failed(token, error),
        }
    }

    pub fn snapshot(&self, id: VariableId) -> Option<VariableSnapshot> {
        self.state.read().variables.get(&id).map(|entry| entry.variable.snapshot())
    }

    /// A consistent handle on the variable's current series.
    pub fn series(&self, id: VariableId) -> Option<Arc<DataSeries>> {
        self.state.read().variables.get(&id).and_then(|entry| entry.variable.series())
    }

    pub fn variable_ids(&self) -> Vec<VariableId> {
        self.state.read().variables.keys().copied().collect()
    }

    pub fn add_observer(&self, observer: Arc<dyn VariableObserver>) {
        self.observers.write().push(Arc::downgrade(&observer));
    }

    fn request_range(
        state: &mut ControllerState,
        settings: &AcquisitionSettings,
        replies: &mpsc::UnboundedSender<AcquisitionReply>,
        id: VariableId,
        new_range: TimeRange,
        explicit_old: Option<TimeRange>,
        notifications: &mut Vec<Notification>,
    ) {
        let Some(entry) = state.variables.get_mut(&id) else {
            return;
        };
        let old_range = explicit_old
            .or_else(|| entry.variable.display_range())
            .unwrap_or(new_range);
        let cached = entry.variable.cached_range();
        let decision = plan_acquisition(
            &old_range,
            &new_range,
            cached.as_ref(),
            settings.tolerance_fraction,
        );
        entry.variable.set_display_range(new_range);
        notifications.push(Notification::RangeChanged(id, new_range));

        match decision {
            AcquisitionDecision::CacheHit => {
                debug!(variable = %id, range = %new_range, "display range served from cache");
                if entry.variable.state() != VariableState::UpToDate {
                    entry.variable.mark_up_to_date();
                    notifications.push(Notification::StateChanged(id, VariableState::UpToDate));
                }
            }
            AcquisitionDecision::Fetch { zoom, range } => {
                let token = state.requests.issue(id, range);
                entry.variable.mark_loading();
                notifications.push(Notification::StateChanged(id, VariableState::Loading));
                debug!(variable = %id, ?zoom, fetch = %range, "dispatching acquisition");
                let parameters = DataProviderParameters {
                    range,
                    metadata: entry.variable.metadata().clone(),
                };
                entry
                    .provider
                    .request_data_loading(token, parameters, ReplyHandle::new(replies.clone()));
            }
        }
    }

    fn on_data_provided(&self, token: AcquisitionToken, range: TimeRange, series: DataSeries) {
        let mut notifications = Vec::new();
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            match state.requests.settle(token) {
                TokenValidity::Current(request) => {
                    if let Some(entry) = state.variables.get_mut(&request.variable) {
                        entry.variable.apply_fetch_result(range, series);
                        debug!(variable = %request.variable, range = %range, "acquisition completed");
                        notifications.push(Notification::StateChanged(
                            request.variable,
                            VariableState::UpToDate,
                        ));
                    }
                }
                TokenValidity::Superseded(variable) => {
                    debug!(%token, %variable, "discarding stale acquisition reply");
                }
                TokenValidity::Unknown => {
                    debug!(%token, "discarding reply for unknown token");
                }
            }
        }
        self.dispatch(notifications);
    }

    fn on_data_progress(&self, token: AcquisitionToken, fraction: f64) {
        let variable = {
            let guard = self.state.read();
            match guard.requests.validity(token) {
                TokenValidity::Current(request) => Some(request.variable),
                _ => {
                    debug!(%token, "discarding stale progress report");
                    None
                }
            }
        };
        if let Some(variable) = variable {
            self.notify(|observer| observer.load_progress(variable, fraction));
        }
    }

    fn on_data_failed(&self, token: AcquisitionToken, error: ProviderError) {
        let mut notifications = Vec::new();
        {
            let mut guard = self.state.write();
            let state = &mut *guard;
            match state.requests.settle(token) {
                TokenValidity::Current(request) => {
                    if let Some(entry) = state.variables.get_mut(&request.variable) {
                        entry.variable.mark_error();
                        warn!(variable = %request.variable, %error, "acquisition failed");
                        notifications.push(Notification::StateChanged(
                            request.variable,
                            VariableState::Error,
                        ));
                    }
                }
                TokenValidity::Superseded(variable) => {
                    debug!(%token, %variable, %error, "discarding stale failure");
                }
                TokenValidity::Unknown => {
                    debug!(%token, %error, "discarding failure for unknown token");
                }
            }
        }
        self.dispatch(notifications);
    }

    fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            match notification {
                Notification::RangeChanged(id, range) => {
                    self.notify(|observer| observer.range_changed(id, &range));
                }
                Notification::StateChanged(id, state) => {
                    self.notify(|observer| observer.state_changed(id, state));
                }
            }
        }
    }

    /// Notify live observers, pruning dead weak references.
    fn notify(&self, f: impl Fn(&dyn VariableObserver)) {
        let mut observers = self.observers.write();
        observers.retain(|weak| weak.strong_count() > 0);
        for weak in observers.iter() {
            if let Some(observer) = weak.upgrade() {
                f(observer.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::series::Unit;

    #[derive(Clone, Default)]
    struct ScriptedProvider {
        requests: Arc<Mutex<Vec<(AcquisitionToken, DataProviderParameters)>>>,
        aborted: Arc<Mutex<Vec<AcquisitionToken>>>,
    }

    impl ScriptedProvider {
        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        fn last_request(&self) -> (AcquisitionToken, DataProviderParameters) {
            self.requests.lock().last().cloned().expect("no request recorded")
        }
    }

    impl DataProvider for ScriptedProvider {
        fn request_data_loading(
            &self,
            token: AcquisitionToken,
            parameters: DataProviderParameters,
            _replies: ReplyHandle,
        ) {
            self.requests.lock().push((token, parameters));
        }

        fn request_data_aborting(&self, token: AcquisitionToken) {
            self.aborted.lock().push(token);
        }

        fn clone_provider(&self) -> Box<dyn DataProvider> {
            Box::new(self.clone())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        ranges: Mutex<Vec<(VariableId, TimeRange)>>,
        progress: Mutex<Vec<(VariableId, f64)>>,
        deleted: Mutex<Vec<VariableId>>,
    }

    impl VariableObserver for RecordingObserver {
        fn range_changed(&self, variable: VariableId, range: &TimeRange) {
            self.ranges.lock().push((variable, *range));
        }

        fn variable_about_to_be_deleted(&self, variable: VariableId) {
            self.deleted.lock().push(variable);
        }

        fn load_progress(&self, variable: VariableId, fraction: f64) {
            self.progress.lock().push((variable, fraction));
        }
    }

    fn range(start: f64, end: f64) -> TimeRange {
        TimeRange::new(start, end).unwrap()
    }

    fn series_for(fetched: &TimeRange) -> DataSeries {
        let x = vec![fetched.start(), (fetched.start() + fetched.end()) / 2.0, fetched.end()];
        DataSeries::new(x, vec![0.0; 3], 1, Unit::new("t", true), Unit::default()).unwrap()
    }

    fn complete_last(controller: &VariableController, provider: &ScriptedProvider) {
        let (token, parameters) = provider.last_request();
        controller.handle_reply(AcquisitionReply::DataProvided {
            token,
            range: parameters.range,
            series: series_for(&parameters.range),
        });
    }

    fn setup() -> (Arc<VariableController>, ScriptedProvider, VariableId) {
        let (controller, _replies) = VariableController::new(AcquisitionSettings::default());
        let provider = ScriptedProvider::default();
        let id = controller.create_variable(
            "var",
            IndexMap::new(),
            Box::new(provider.clone()),
        );
        (controller, provider, id)
    }

    #[test]
    fn initial_load_fetches_the_padded_range() {
        let (controller, provider, id) = setup();
        let initial = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], initial, initial, false).unwrap();

        assert_eq!(provider.request_count(), 1);
        let (_, parameters) = provider.last_request();
        assert!(parameters.range.approx_equals(&range(-20.0, 120.0), 1e-9));
        assert_eq!(controller.snapshot(id).unwrap().state, VariableState::Loading);

        complete_last(&controller, &provider);
        let snapshot = controller.snapshot(id).unwrap();
        assert_eq!(snapshot.state, VariableState::UpToDate);
        assert_eq!(snapshot.cached_range, Some(range(-20.0, 120.0)));
    }

    #[test]
    fn contained_zoom_in_issues_no_provider_call() {
        let (controller, provider, id) = setup();
        let initial = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], initial, initial, false).unwrap();
        complete_last(&controller, &provider);

        controller
            .on_request_data_loading(&[id], range(20.0, 80.0), initial, false)
            .unwrap();

        assert_eq!(provider.request_count(), 1);
        let snapshot = controller.snapshot(id).unwrap();
        assert_eq!(snapshot.state, VariableState::UpToDate);
        assert_eq!(snapshot.display_range, Some(range(20.0, 80.0)));
        assert_eq!(snapshot.cached_range, Some(range(-20.0, 120.0)));
    }

    #[test]
    fn pan_fetches_strictly_less_than_a_full_refetch() {
        let (controller, provider, id) = setup();
        let initial = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], initial, initial, false).unwrap();
        complete_last(&controller, &provider);

        let panned = range(30.0, 130.0);
        controller.on_request_data_loading(&[id], panned, initial, false).unwrap();

        assert_eq!(provider.request_count(), 2);
        let (_, parameters) = provider.last_request();
        assert!(parameters.range.approx_equals(&range(30.0, 150.0), 1e-9));
        assert!(parameters.range.width() < panned.padded(DEFAULT_TOLERANCE_FRACTION).width());

        complete_last(&controller, &provider);
        // overlapping fetch extended the cache instead of replacing it
        assert_eq!(controller.snapshot(id).unwrap().cached_range, Some(range(-20.0, 150.0)));
    }

    #[test]
    fn stale_reply_arriving_last_is_discarded() {
        let (controller, provider, id) = setup();
        let first = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], first, first, false).unwrap();
        let (stale_token, stale_parameters) = provider.last_request();

        let second = range(1000.0, 1100.0);
        controller.on_request_data_loading(&[id], second, first, false).unwrap();
        let (current_token, current_parameters) = provider.last_request();
        assert_ne!(stale_token, current_token);

        // the current reply lands first, the stale one afterwards
        controller.handle_reply(AcquisitionReply::DataProvided {
            token: current_token,
            range: current_parameters.range,
            series: series_for(&current_parameters.range),
        });
        controller.handle_reply(AcquisitionReply::DataProvided {
            token: stale_token,
            range: stale_parameters.range,
            series: series_for(&stale_parameters.range),
        });

        let snapshot = controller.snapshot(id).unwrap();
        assert_eq!(snapshot.state, VariableState::UpToDate);
        assert_eq!(snapshot.cached_range, Some(current_parameters.range));
    }

    #[test]
    fn stale_reply_arriving_first_is_also_discarded() {
        let (controller, provider, id) = setup();
        let first = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], first, first, false).unwrap();
        let (stale_token, stale_parameters) = provider.last_request();

        let second = range(1000.0, 1100.0);
        controller.on_request_data_loading(&[id], second, first, false).unwrap();

        controller.handle_reply(AcquisitionReply::DataProvided {
            token: stale_token,
            range: stale_parameters.range,
            series: series_for(&stale_parameters.range),
        });
        // the stale reply changed nothing, the variable still loads
        assert_eq!(controller.snapshot(id).unwrap().state, VariableState::Loading);

        complete_last(&controller, &provider);
        let snapshot = controller.snapshot(id).unwrap();
        assert_eq!(snapshot.state, VariableState::UpToDate);
        assert_eq!(snapshot.cached_range, Some(provider.last_request().1.range));
    }

    #[test]
    fn synchronized_siblings_follow_the_absolute_range() {
        let (controller, _replies) = VariableController::new(AcquisitionSettings::default());
        let provider_a = ScriptedProvider::default();
        let provider_b = ScriptedProvider::default();
        let a = controller.create_variable("a", IndexMap::new(), Box::new(provider_a.clone()));
        let b = controller.create_variable("b", IndexMap::new(), Box::new(provider_b.clone()));

        let group = uuid::Uuid::new_v4();
        controller.add_synchronization_group(group);
        controller.join_synchronization_group(a, group).unwrap();
        controller.join_synchronization_group(b, group).unwrap();

        // b browses a completely different window first
        let b_initial = range(5000.0, 5100.0);
        controller.on_request_data_loading(&[b], b_initial, b_initial, false).unwrap();
        let (token, parameters) = provider_b.last_request();
        controller.handle_reply(AcquisitionReply::DataProvided {
            token,
            range: parameters.range,
            series: series_for(&parameters.range),
        });

        let shared = range(0.0, 100.0);
        controller.on_request_data_loading(&[a], shared, shared, true).unwrap();

        // both display the same absolute window, each with its own cache
        assert_eq!(controller.snapshot(a).unwrap().display_range, Some(shared));
        assert_eq!(controller.snapshot(b).unwrap().display_range, Some(shared));
        assert_eq!(provider_a.request_count(), 1);
        assert_eq!(provider_b.request_count(), 2);
        // b's own plan: a far pan left, fetched with the leading margin only
        assert!(provider_b.last_request().1.range.approx_equals(&range(-20.0, 100.0), 1e-9));
    }

    #[test]
    fn unsynchronized_request_leaves_siblings_alone() {
        let (controller, _replies) = VariableController::new(AcquisitionSettings::default());
        let provider_a = ScriptedProvider::default();
        let provider_b = ScriptedProvider::default();
        let a = controller.create_variable("a", IndexMap::new(), Box::new(provider_a.clone()));
        let b = controller.create_variable("b", IndexMap::new(), Box::new(provider_b.clone()));
        let group = uuid::Uuid::new_v4();
        controller.add_synchronization_group(group);
        controller.join_synchronization_group(a, group).unwrap();
        controller.join_synchronization_group(b, group).unwrap();

        let window = range(0.0, 100.0);
        controller.on_request_data_loading(&[a], window, window, false).unwrap();

        assert_eq!(provider_b.request_count(), 0);
        assert!(controller.snapshot(b).unwrap().display_range.is_none());
    }

    #[test]
    fn abort_marks_aborted_and_late_reply_is_dropped() {
        let (controller, provider, id) = setup();
        let window = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], window, window, false).unwrap();
        let (token, parameters) = provider.last_request();

        controller.abort_progress(id).unwrap();
        assert_eq!(controller.snapshot(id).unwrap().state, VariableState::Aborted);
        assert_eq!(provider.aborted.lock().as_slice(), &[token]);

        // the provider delivered anyway; the staleness guard rejects it
        controller.handle_reply(AcquisitionReply::DataProvided {
            token,
            range: parameters.range,
            series: series_for(&parameters.range),
        });
        let snapshot = controller.snapshot(id).unwrap();
        assert_eq!(snapshot.state, VariableState::Aborted);
        assert_eq!(snapshot.cached_range, None);

        // a new range change resumes loading
        controller.on_request_data_loading(&[id], window, window, false).unwrap();
        assert_eq!(controller.snapshot(id).unwrap().state, VariableState::Loading);
    }

    #[test]
    fn provider_failure_moves_the_variable_to_error() {
        let (controller, provider, id) = setup();
        let window = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], window, window, false).unwrap();
        let (token, _) = provider.last_request();

        controller.handle_reply(AcquisitionReply::Failed {
            token,
            error: ProviderError::Retrieval("server unreachable".into()),
        });
        let snapshot = controller.snapshot(id).unwrap();
        assert_eq!(snapshot.state, VariableState::Error);
        assert_eq!(snapshot.cached_range, None);

        controller.on_request_data_loading(&[id], window, window, false).unwrap();
        assert_eq!(controller.snapshot(id).unwrap().state, VariableState::Loading);
    }

    #[test]
    fn deletion_cancels_the_active_request_and_group_memberships() {
        let (controller, _replies) = VariableController::new(AcquisitionSettings::default());
        let provider_a = ScriptedProvider::default();
        let provider_b = ScriptedProvider::default();
        let a = controller.create_variable("a", IndexMap::new(), Box::new(provider_a.clone()));
        let b = controller.create_variable("b", IndexMap::new(), Box::new(provider_b.clone()));
        let group = uuid::Uuid::new_v4();
        controller.add_synchronization_group(group);
        controller.join_synchronization_group(a, group).unwrap();
        controller.join_synchronization_group(b, group).unwrap();

        let window = range(0.0, 100.0);
        controller.on_request_data_loading(&[a], window, window, false).unwrap();
        let (token, parameters) = provider_a.last_request();

        let observer = Arc::new(RecordingObserver::default());
        controller.add_observer(observer.clone());

        controller.delete_variable(a).unwrap();
        assert_eq!(observer.deleted.lock().as_slice(), &[a]);
        assert_eq!(provider_a.aborted.lock().as_slice(), &[token]);
        assert!(controller.snapshot(a).is_none());

        // a late reply for the purged token is a no-op
        controller.handle_reply(AcquisitionReply::DataProvided {
            token,
            range: parameters.range,
            series: series_for(&parameters.range),
        });
        assert!(controller.snapshot(a).is_none());

        // b no longer has siblings to propagate to
        controller.on_request_data_loading(&[b], window, window, true).unwrap();
        assert_eq!(provider_a.request_count(), 1);

        assert!(matches!(
            controller.delete_variable(a),
            Err(ControllerError::UnknownVariable(_))
        ));
    }

    #[test]
    fn progress_is_forwarded_only_while_the_token_is_current() {
        let (controller, provider, id) = setup();
        let observer = Arc::new(RecordingObserver::default());
        controller.add_observer(observer.clone());

        let window = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], window, window, false).unwrap();
        let (first_token, _) = provider.last_request();

        controller.handle_reply(AcquisitionReply::Progress { token: first_token, fraction: 0.5 });
        assert_eq!(observer.progress.lock().as_slice(), &[(id, 0.5)]);

        // superseded by a new request: further progress for the old token is dropped
        controller.on_request_data_loading(&[id], range(500.0, 600.0), window, false).unwrap();
        controller.handle_reply(AcquisitionReply::Progress { token: first_token, fraction: 0.9 });
        assert_eq!(observer.progress.lock().len(), 1);
    }

    #[test]
    fn range_changes_are_notified_in_absolute_time() {
        let (controller, _provider, id) = setup();
        let observer = Arc::new(RecordingObserver::default());
        controller.add_observer(observer.clone());

        let window = range(0.0, 100.0);
        controller.on_request_data_loading(&[id], window, window, false).unwrap();
        assert_eq!(observer.ranges.lock().as_slice(), &[(id, window)]);
    }

    #[test]
    fn unknown_variable_is_rejected() {
        let (controller, _replies) = VariableController::new(AcquisitionSettings::default());
        let window = range(0.0, 100.0);
        let bogus = uuid::Uuid::new_v4();
        assert!(matches!(
            controller.on_request_data_loading(&[bogus], window, window, false),
            Err(ControllerError::UnknownVariable(_))
        ));
        assert!(matches!(
            controller.join_synchronization_group(bogus, uuid::Uuid::new_v4()),
            Err(ControllerError::UnknownVariable(_))
        ));
    }
}
