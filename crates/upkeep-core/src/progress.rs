use log::trace;
use tokio::sync::mpsc;

/// One result line emitted by a maintenance activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub success: bool,
    pub message: String,
}

/// Sending half of the single channel every activity reports through.
///
/// Reporting never fails: once the host drops the receiver, events are
/// discarded.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressReporter {
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn report(&self, success: bool, message: impl Into<String>) {
        let event = ProgressEvent {
            success,
            message: message.into(),
        };
        if self.tx.send(event).await.is_err() {
            trace!("progress receiver dropped; event discarded");
        }
    }

    pub async fn success(&self, message: impl Into<String>) {
        self.report(true, message).await;
    }

    pub async fn failure(&self, message: impl Into<String>) {
        self.report(false, message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::{ProgressEvent, ProgressReporter};

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (reporter, mut rx) = ProgressReporter::channel(4);

        reporter.success("first").await;
        reporter.failure("second").await;

        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent {
                success: true,
                message: "first".to_string()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent {
                success: false,
                message: "second".to_string()
            })
        );
    }

    #[tokio::test]
    async fn report_after_receiver_dropped_is_ignored() {
        let (reporter, rx) = ProgressReporter::channel(1);
        drop(rx);

        reporter.success("nobody listening").await;
    }
}
