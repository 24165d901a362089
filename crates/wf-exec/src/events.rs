//! State transition sinks

use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use wf_core::{NodeState, StateTransition};

/// Receives every node state change of a run, in the order they happen
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &StateTransition);
}

/// Writes transitions to the log
#[derive(Debug, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &StateTransition) {
        match (event.to, &event.error) {
            (NodeState::Failed, Some(error)) => {
                log::error!("[{}] {} failed: {}", event.run_id, event.task, error)
            }
            (NodeState::UpstreamFailed | NodeState::Skipped, reason) => log::warn!(
                "[{}] {} {}: {}",
                event.run_id,
                event.task,
                event.to,
                reason.as_deref().unwrap_or("not executed")
            ),
            _ => log::info!(
                "[{}] {} {} -> {}",
                event.run_id,
                event.task,
                event.from,
                event.to
            ),
        }
    }
}

/// Forwards transitions to a channel; a closed receiver is ignored
#[derive(Debug)]
pub struct ChannelEventSink {
    sender: UnboundedSender<StateTransition>,
}

impl ChannelEventSink {
    pub fn new(sender: UnboundedSender<StateTransition>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &StateTransition) {
        let _ = self.sender.send(event.clone());
    }
}

/// Keeps every transition in memory
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<StateTransition>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the transitions so far
    pub fn events(&self) -> Vec<StateTransition> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Transitions of one task
    pub fn for_task(&self, task: &str) -> Vec<StateTransition> {
        self.events()
            .into_iter()
            .filter(|e| e.task == task)
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &StateTransition) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}
