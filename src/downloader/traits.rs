// Task plumbing - event channel and handle shared by search and download tasks

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::errors::FetchError;
use super::models::ProgressSample;

/// Event delivered to the caller. `Finished` / `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T> {
    Progress {
        sample: ProgressSample,
        status: String,
    },
    Finished(T),
    Failed(FetchError),
}

impl<T> TaskEvent<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Producer side of a task's event stream.
///
/// `finish` consumes the sender, so a task can emit its terminal event once
/// and nothing after it.
#[derive(Debug)]
pub struct EventSender<T> {
    tx: mpsc::UnboundedSender<TaskEvent<T>>,
}

impl<T> EventSender<T> {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskEvent<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn progress(&self, sample: ProgressSample, status: impl Into<String>) {
        // receiver gone means nobody is listening anymore
        let _ = self.tx.send(TaskEvent::Progress {
            sample,
            status: status.into(),
        });
    }

    pub fn finish(self, result: Result<T, FetchError>) {
        let event = match result {
            Ok(value) => TaskEvent::Finished(value),
            Err(e) => TaskEvent::Failed(e),
        };
        let _ = self.tx.send(event);
    }
}

/// Caller side of a spawned task
#[derive(Debug)]
pub struct TaskHandle<T> {
    events: mpsc::UnboundedReceiver<TaskEvent<T>>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl<T> TaskHandle<T> {
    pub fn new(
        events: mpsc::UnboundedReceiver<TaskEvent<T>>,
        cancel: CancellationToken,
        join: JoinHandle<()>,
    ) -> Self {
        Self { events, cancel, join }
    }

    /// Next event, `None` once the task is gone and all events were read
    pub async fn next_event(&mut self) -> Option<TaskEvent<T>> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Drain events until the terminal one and return it as a result.
    /// Progress events are discarded.
    pub async fn wait(mut self) -> Result<T, FetchError> {
        while let Some(event) = self.events.recv().await {
            match event {
                TaskEvent::Progress { .. } => continue,
                TaskEvent::Finished(value) => return Ok(value),
                TaskEvent::Failed(e) => return Err(e),
            }
        }
        // sender dropped without a terminal event: the task panicked or was aborted
        Err(FetchError::Cancelled)
    }
}
