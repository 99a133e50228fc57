//! Progress sinks - the orchestrator's observability hook
//!
//! Sinks are called synchronously at every stage transition and must return
//! promptly: they are fire-and-forget and never fail the run.

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::Stage;

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, stage: Stage, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(Stage, &str) + Send + Sync,
{
    fn on_progress(&self, stage: Stage, message: &str) {
        self(stage, message)
    }
}

/// Writes progress to the tracing log
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, stage: Stage, message: &str) {
        info!(stage = %stage, "{}", message);
    }
}

/// Discards progress
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _stage: Stage, _message: &str) {}
}

/// One progress notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
}

/// Forwards progress over an unbounded channel
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, stage: Stage, message: &str) {
        if self
            .tx
            .send(ProgressEvent {
                stage,
                message: message.to_string(),
            })
            .is_err()
        {
            debug!(%stage, "ChannelProgress::on_progress: receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_channel_progress_delivers_in_order() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.on_progress(Stage::BuildRequest, "building");
        sink.on_progress(Stage::AnalyzeRepo, "analyzing");

        assert_eq!(rx.recv().await.unwrap().stage, Stage::BuildRequest);
        assert_eq!(rx.recv().await.unwrap().message, "analyzing");
    }

    #[test]
    fn test_channel_progress_survives_dropped_receiver() {
        let (sink, rx) = ChannelProgress::new();
        drop(rx);
        sink.on_progress(Stage::Done, "done");
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = move |stage: Stage, message: &str| {
            captured.lock().unwrap().push(format!("{}: {}", stage, message));
        };

        sink.on_progress(Stage::SelectDirectory, "picked docs");
        assert_eq!(seen.lock().unwrap().as_slice(), ["SELECT_DIRECTORY: picked docs"]);
    }
}
