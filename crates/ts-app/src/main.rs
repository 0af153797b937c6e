//! Headless demo session driving the acquisition engine
//!
//! Creates two synchronized cosinus variables, performs an initial load, a
//! pan and a tolerance-contained zoom-in, then prints the resulting variable
//! states. The zoom-in must be served from cache without a provider call.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use tracing::info;

use ts_core::{
    AcquisitionSettings, TimeRange, VariableController, VariableId, VariableObserver,
    VariableState,
};
use ts_data::{CosinusSource, SourceProvider};

/// Logs every notification the engine emits.
struct LogObserver;

impl VariableObserver for LogObserver {
    fn range_changed(&self, variable: VariableId, range: &TimeRange) {
        info!(%variable, %range, "range changed");
    }

    fn state_changed(&self, variable: VariableId, state: VariableState) {
        info!(%variable, ?state, "state changed");
    }

    fn load_progress(&self, variable: VariableId, fraction: f64) {
        info!(%variable, fraction, "loading");
    }

    fn variable_about_to_be_deleted(&self, variable: VariableId) {
        info!(%variable, "deleting");
    }
}

fn cosinus_metadata(shape: &str, frequency: f64) -> IndexMap<String, String> {
    let mut metadata = IndexMap::new();
    metadata.insert("cosinusType".to_string(), shape.to_string());
    metadata.insert("cosinusFrequency".to_string(), frequency.to_string());
    metadata
}

/// Poll until none of `ids` is loading any more.
async fn wait_for_idle(
    controller: &VariableController,
    ids: &[VariableId],
    timeout: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let loading = ids.iter().any(|id| {
            controller
                .snapshot(*id)
                .map(|snapshot| snapshot.state == VariableState::Loading)
                .unwrap_or(false)
        });
        if !loading {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("acquisition did not settle within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("starting demo acquisition session");

    let controller = VariableController::spawn(AcquisitionSettings::default());
    let observer = Arc::new(LogObserver);
    controller.add_observer(observer.clone());

    let scalar = controller.create_variable(
        "cosinus-scalar",
        cosinus_metadata("scalar", 10.0),
        Box::new(SourceProvider::new(CosinusSource::new())),
    );
    let vector = controller.create_variable(
        "cosinus-vector",
        cosinus_metadata("vector", 1.0),
        Box::new(SourceProvider::new(CosinusSource::new())),
    );

    let group = uuid::Uuid::new_v4();
    controller.add_synchronization_group(group);
    controller.join_synchronization_group(scalar, group)?;
    controller.join_synchronization_group(vector, group)?;

    let session_start = Utc.with_ymd_and_hms(2013, 1, 1, 0, 0, 0).unwrap().timestamp() as f64;
    let initial = TimeRange::new(session_start, session_start + 3600.0)?;

    info!(range = %initial, "initial load");
    controller.on_request_data_loading(&[scalar, vector], initial, initial, true)?;
    wait_for_idle(&controller, &[scalar, vector], Duration::from_secs(5)).await?;

    // pan right by a quarter window: both variables follow, both fetch
    let panned = TimeRange::new(session_start + 900.0, session_start + 4500.0)?;
    info!(range = %panned, "panning right");
    controller.on_request_data_loading(&[scalar], panned, initial, true)?;
    wait_for_idle(&controller, &[scalar, vector], Duration::from_secs(5)).await?;

    // zoom into the middle of the window: inside the padded cache, no fetch
    let zoomed = TimeRange::new(session_start + 1800.0, session_start + 3600.0)?;
    info!(range = %zoomed, "zooming in (expected cache hit)");
    controller.on_request_data_loading(&[scalar], zoomed, panned, true)?;
    wait_for_idle(&controller, &[scalar, vector], Duration::from_secs(5)).await?;

    for id in [scalar, vector] {
        let snapshot = controller
            .snapshot(id)
            .ok_or_else(|| anyhow::anyhow!("variable disappeared"))?;
        let samples = controller.series(id).map(|series| series.len()).unwrap_or(0);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        println!("  samples cached: {samples}");
    }

    controller.delete_variables(&[scalar, vector]);
    info!("session finished");
    Ok(())
}
