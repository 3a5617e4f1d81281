//! Resolution event log
//!
//! A bounded, in-process record of resolution attempts. Once the capacity
//! is reached the oldest events are dropped. Live subscribers receive every
//! recorded event over a `crossbeam` channel.

use std::collections::VecDeque;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::event::ResolutionEvent;

/// Default number of events kept
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Record events at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of events kept
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            capacity: default_capacity(),
        }
    }
}

impl EventLogConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

#[derive(Debug, Default)]
struct LogState {
    events: VecDeque<ResolutionEvent>,
    next_sequence: u64,
    dropped: u64,
}

/// Bounded resolution event log
#[derive(Debug, Default)]
pub struct EventLog {
    config: EventLogConfig,
    state: Mutex<LogState>,
    subscribers: Mutex<Vec<Sender<ResolutionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_config(EventLogConfig::default())
    }

    pub fn with_config(config: EventLogConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LogState::default()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &EventLogConfig {
        &self.config
    }

    /// Record an event, returning its sequence number (`None` when disabled)
    pub fn record(&self, mut event: ResolutionEvent) -> Option<u64> {
        if !self.config.enabled {
            return None;
        }

        let sequence = {
            let mut state = self.state.lock();
            event.sequence = state.next_sequence;
            state.next_sequence += 1;

            state.events.push_back(event.clone());
            while state.events.len() > self.config.capacity {
                state.events.pop_front();
                state.dropped += 1;
            }
            event.sequence
        };

        // Disconnected subscribers are pruned on the way
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());

        Some(sequence)
    }

    /// Receive every event recorded from now on
    pub fn subscribe(&self) -> Receiver<ResolutionEvent> {
        let (tx, rx) = channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// All retained events, oldest first
    pub fn events(&self) -> Vec<ResolutionEvent> {
        self.state.lock().events.iter().cloned().collect()
    }

    /// Retained events for one requested name, oldest first
    pub fn events_for(&self, name: &str) -> Vec<ResolutionEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.requested_name == name)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<ResolutionEvent> {
        self.state.lock().events.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    /// Events discarded because the log was full
    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }

    /// Drop retained events; sequence numbers keep increasing
    pub fn clear(&self) {
        self.state.lock().events.clear();
    }

    /// Export retained events as JSON lines
    pub fn to_jsonl(&self) -> Result<String> {
        let state = self.state.lock();
        let mut out = String::new();
        for event in &state.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}
