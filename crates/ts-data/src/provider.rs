//! Adapter between async series sources and the provider contract
//!
//! A [`SeriesSource`] produces one contiguous block for a requested range.
//! [`SourceProvider`] wraps it into a [`DataProvider`]: each acquisition runs
//! on its own tokio task, keyed by token so aborts can kill the right one.

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use ts_core::{
    AcquisitionToken, DataProvider, DataProviderParameters, DataSeries, ProviderError,
    ReplyHandle, TimeRange,
};

use crate::DataError;

/// Reports fraction-complete for one acquisition back to the controller.
#[derive(Clone)]
pub struct ProgressReporter {
    replies: ReplyHandle,
    token: AcquisitionToken,
}

impl ProgressReporter {
    pub fn new(replies: ReplyHandle, token: AcquisitionToken) -> Self {
        Self { replies, token }
    }

    pub fn report(&self, fraction: f64) {
        self.replies.progress(self.token, fraction.clamp(0.0, 1.0));
    }
}

/// Asynchronous production of one contiguous data block.
#[async_trait]
pub trait SeriesSource: Send + Sync + 'static {
    /// Produce the series covering `range`. Implementations should report
    /// progress as blocks complete and may await freely; the surrounding
    /// task is aborted on cancellation.
    async fn produce(
        &self,
        range: &TimeRange,
        metadata: &IndexMap<String, String>,
        progress: &ProgressReporter,
    ) -> Result<DataSeries, DataError>;

    /// Get the source name
    fn source_name(&self) -> &str;
}

/// Turns any [`SeriesSource`] into a controller-facing [`DataProvider`].
///
/// The acquired range reported on completion is the requested range: sources
/// must cover it, even if their sample grid lands strictly inside.
pub struct SourceProvider<S> {
    source: Arc<S>,
    tasks: Arc<Mutex<AHashMap<AcquisitionToken, JoinHandle<()>>>>,
}

impl<S> SourceProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            tasks: Arc::new(Mutex::new(AHashMap::new())),
        }
    }
}

impl<S: SeriesSource> DataProvider for SourceProvider<S> {
    fn request_data_loading(
        &self,
        token: AcquisitionToken,
        parameters: DataProviderParameters,
        replies: ReplyHandle,
    ) {
        let source = Arc::clone(&self.source);
        let handle = tokio::spawn(async move {
            let progress = ProgressReporter::new(replies.clone(), token);
            let produced = source
                .produce(&parameters.range, &parameters.metadata, &progress)
                .await;
            match produced {
                Ok(series) => replies.data_provided(token, parameters.range, series),
                Err(DataError::Series(error)) => {
                    replies.failed(token, ProviderError::MalformedSeries(error.to_string()))
                }
                Err(error) => replies.failed(token, ProviderError::Retrieval(error.to_string())),
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(token, handle);
    }

    fn request_data_aborting(&self, token: AcquisitionToken) {
        match self.tasks.lock().remove(&token) {
            Some(task) => {
                task.abort();
                tracing::debug!(%token, source = self.source.source_name(), "acquisition task aborted");
            }
            None => tracing::debug!(%token, "abort requested for unknown token"),
        }
    }

    fn clone_provider(&self) -> Box<dyn DataProvider> {
        // fresh task table: the clone serves a different variable
        Box::new(Self {
            source: Arc::clone(&self.source),
            tasks: Arc::new(Mutex::new(AHashMap::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::mpsc;
    use ts_core::{AcquisitionReply, Unit};

    struct SlowSource {
        delay: Duration,
    }

    #[async_trait]
    impl SeriesSource for SlowSource {
        async fn produce(
            &self,
            range: &TimeRange,
            _metadata: &IndexMap<String, String>,
            progress: &ProgressReporter,
        ) -> Result<DataSeries, DataError> {
            progress.report(0.0);
            tokio::time::sleep(self.delay).await;
            progress.report(1.0);
            let x = vec![range.start(), range.end()];
            Ok(DataSeries::new(x, vec![0.0, 0.0], 1, Unit::new("t", true), Unit::default())?)
        }

        fn source_name(&self) -> &str {
            "slow"
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SeriesSource for FailingSource {
        async fn produce(
            &self,
            _range: &TimeRange,
            _metadata: &IndexMap<String, String>,
            _progress: &ProgressReporter,
        ) -> Result<DataSeries, DataError> {
            Err(DataError::Retrieval("no backend".into()))
        }

        fn source_name(&self) -> &str {
            "failing"
        }
    }

    fn request(
        provider: &dyn DataProvider,
    ) -> (AcquisitionToken, mpsc::UnboundedReceiver<AcquisitionReply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = uuid::Uuid::new_v4();
        let parameters = DataProviderParameters {
            range: TimeRange::new(0.0, 10.0).unwrap(),
            metadata: IndexMap::new(),
        };
        provider.request_data_loading(token, parameters, ReplyHandle::new(tx));
        (token, rx)
    }

    #[tokio::test]
    async fn delivers_progress_then_data() {
        let provider = SourceProvider::new(SlowSource { delay: Duration::from_millis(5) });
        let (token, mut rx) = request(&provider);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, AcquisitionReply::Progress { token: t, .. } if t == token));

        loop {
            match rx.recv().await.unwrap() {
                AcquisitionReply::Progress { .. } => continue,
                AcquisitionReply::DataProvided { token: t, range, series } => {
                    assert_eq!(t, token);
                    assert_eq!(range, TimeRange::new(0.0, 10.0).unwrap());
                    assert_eq!(series.len(), 2);
                    break;
                }
                other => panic!("unexpected reply {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn failure_is_reported_as_a_failed_reply() {
        let provider = SourceProvider::new(FailingSource);
        let (token, mut rx) = request(&provider);

        loop {
            match rx.recv().await.unwrap() {
                AcquisitionReply::Progress { .. } => continue,
                AcquisitionReply::Failed { token: t, error } => {
                    assert_eq!(t, token);
                    assert!(matches!(error, ProviderError::Retrieval(_)));
                    break;
                }
                other => panic!("unexpected reply {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn abort_kills_the_task_and_no_data_arrives() {
        let provider = SourceProvider::new(SlowSource { delay: Duration::from_secs(60) });
        let (token, mut rx) = request(&provider);

        provider.request_data_aborting(token);
        drop(provider);

        // channel closes without a terminal reply once the task dies
        loop {
            match rx.recv().await {
                Some(AcquisitionReply::Progress { .. }) => continue,
                Some(other) => panic!("unexpected reply {other:?}"),
                None => break,
            }
        }
    }
}
