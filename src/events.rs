//! Progress event channel.
//!
//! Stages and the engine emit lightweight progress events through a bounded
//! `flume` channel. Emission never blocks pipeline execution: when nobody is
//! draining the channel and the buffer fills up, events are dropped with a
//! debug log. Callers that care subscribe via [`EventBus::subscribe`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default buffer capacity for the progress channel.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// One progress event emitted during pipeline execution.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineEvent {
    pub trace_id: String,
    /// Encoded stage name; `None` for engine-level events.
    pub stage: Option<String>,
    pub scope: String,
    pub message: String,
    pub when: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn stage_message(
        trace_id: impl Into<String>,
        stage: impl Into<String>,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            stage: Some(stage.into()),
            scope: scope.into(),
            message: message.into(),
            when: Utc::now(),
        }
    }

    pub fn engine_message(
        trace_id: impl Into<String>,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            stage: None,
            scope: scope.into(),
            message: message.into(),
            when: Utc::now(),
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stage {
            Some(stage) => write!(f, "[{}:{}] {}", stage, self.scope, self.message),
            None => write!(f, "[{}] {}", self.scope, self.message),
        }
    }
}

/// Cloneable handle used to publish events.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: flume::Sender<PipelineEvent>,
}

impl EventEmitter {
    /// Publish an event; drops (with a debug log) instead of blocking when the
    /// buffer is full or the channel is closed.
    pub fn emit(&self, event: PipelineEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::debug!(error = %err, "progress event dropped");
        }
    }
}

/// Bounded progress channel owned by the engine.
#[derive(Debug)]
pub struct EventBus {
    sender: flume::Sender<PipelineEvent>,
    receiver: flume::Receiver<PipelineEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(buffer_capacity: usize) -> Self {
        let capacity = if buffer_capacity == 0 {
            DEFAULT_BUFFER_CAPACITY
        } else {
            buffer_capacity
        };
        let (sender, receiver) = flume::bounded(capacity);
        Self { sender, receiver }
    }

    #[must_use]
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            sender: self.sender.clone(),
        }
    }

    /// Receiver end of the channel. Multiple subscribers compete for events;
    /// subscribe once per engine if you need every event.
    #[must_use]
    pub fn subscribe(&self) -> flume::Receiver<PipelineEvent> {
        self.receiver.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

/// Spawn a background task that drains a receiver into `tracing` at info
/// level. The task ends when every sender is dropped.
pub fn spawn_tracing_drain(
    receiver: flume::Receiver<PipelineEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(event) = receiver.recv_async().await {
            tracing::info!(trace_id = %event.trace_id, "{event}");
        }
    })
}
