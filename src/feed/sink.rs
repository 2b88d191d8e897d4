use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::error::RecordError;
use super::source::FeedStatus;
use super::types::Observation;

/// Receiver of everything a feed produces.
///
/// Called from the feed's replay task. Implementations that live on another
/// execution context are responsible for handing the update over themselves.
pub trait ObservationSink: Send + Sync + 'static {
    fn observe(&self, observation: Observation);

    fn status_changed(&self, _status: FeedStatus) {}

    fn record_rejected(&self, _error: RecordError) {}
}

impl<T: ObservationSink> ObservationSink for Arc<T> {
    fn observe(&self, observation: Observation) {
        (**self).observe(observation)
    }

    fn status_changed(&self, status: FeedStatus) {
        (**self).status_changed(status)
    }

    fn record_rejected(&self, error: RecordError) {
        (**self).record_rejected(error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Observation(Observation),
    Status(FeedStatus),
    Rejected(RecordError),
}

/// Channel-backed sink. Send failures mean the receiver is gone and are ignored.
impl ObservationSink for UnboundedSender<FeedEvent> {
    fn observe(&self, observation: Observation) {
        let _ = self.send(FeedEvent::Observation(observation));
    }

    fn status_changed(&self, status: FeedStatus) {
        let _ = self.send(FeedEvent::Status(status));
    }

    fn record_rejected(&self, error: RecordError) {
        let _ = self.send(FeedEvent::Rejected(error));
    }
}
