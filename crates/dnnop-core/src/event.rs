use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::device::{DeviceOption, DeviceType};
use crate::error::{Error, Result};

// Event - Completion signal for one operator invocation
//
// The execution engine creates one event per operator before dispatch and
// owns it. The operator signals it exactly once per run (finished or failed),
// and downstream operators wait on it before they start.
//
// State transitions:
//
//   Initialized --record(None)-----> Scheduled
//   Initialized --record(Some(e))--> Failed
//   Initialized/Scheduled --set_finished(None)----> Success
//   Initialized/Scheduled --set_finished(Some(e))-> Failed
//   Success/Failed: terminal until reset()
//
// Waiting blocks only while the event is Scheduled. An Initialized event has
// nothing pending and a terminal one has nothing left to do.

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(0);

/// Status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Initialized,
    Scheduled,
    Success,
    Failed,
}

impl EventStatus {
    /// Whether this status is Success or Failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Success | EventStatus::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventStatus::Initialized => "initialized",
            EventStatus::Scheduled => "scheduled",
            EventStatus::Success => "success",
            EventStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug)]
struct EventState {
    status: EventStatus,
    err_msg: Option<String>,
}

/// A completion/failure signal shared between an operator and its waiters.
#[derive(Debug)]
pub struct Event {
    id: u64,
    device_type: DeviceType,
    state: Mutex<EventState>,
    completed: Condvar,
}

impl Event {
    /// Create an event for operators running on `option`'s device.
    pub fn new(option: &DeviceOption) -> Self {
        Event {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            device_type: option.device_type,
            state: Mutex::new(EventState {
                status: EventStatus::Initialized,
                err_msg: None,
            }),
            completed: Condvar::new(),
        }
    }

    /// Process-unique id of this event.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn lock(&self) -> Result<MutexGuard<'_, EventState>> {
        self.state
            .lock()
            .map_err(|_| Error::msg("event lock poisoned"))
    }

    /// Current status.
    pub fn query(&self) -> Result<EventStatus> {
        Ok(self.lock()?.status)
    }

    /// Failure message, if the event failed.
    pub fn error_message(&self) -> Result<Option<String>> {
        Ok(self.lock()?.err_msg.clone())
    }

    /// Record the event from a context of `device_type`.
    ///
    /// Without a message the event becomes Scheduled; with one it fails
    /// immediately. Recording a terminal event changes nothing.
    pub fn record(&self, device_type: DeviceType, err_msg: Option<&str>) -> Result<()> {
        if device_type != self.device_type {
            return Err(Error::DeviceMismatch {
                event: self.device_type,
                context: device_type,
            });
        }
        let mut state = self.lock()?;
        let status = state.status;
        match status {
            EventStatus::Scheduled => return Err(Error::EventMultipleRecord),
            EventStatus::Initialized => match err_msg {
                None => {
                    state.status = EventStatus::Scheduled;
                    tracing::trace!(event = self.id, "event scheduled");
                }
                Some(msg) => {
                    state.status = EventStatus::Failed;
                    state.err_msg = Some(msg.to_string());
                    tracing::trace!(event = self.id, "event failed on record");
                    self.completed.notify_all();
                }
            },
            EventStatus::Success | EventStatus::Failed => {}
        }
        Ok(())
    }

    /// Move the event to a terminal state: Success without a message,
    /// Failed with one. Errors if the event already finished.
    pub fn set_finished(&self, err_msg: Option<&str>) -> Result<()> {
        let mut state = self.lock()?;
        if state.status.is_terminal() {
            return Err(Error::EventAlreadyFinished {
                status: state.status,
            });
        }
        match err_msg {
            None => state.status = EventStatus::Success,
            Some(msg) => {
                state.status = EventStatus::Failed;
                state.err_msg = Some(msg.to_string());
            }
        }
        tracing::trace!(event = self.id, status = %state.status, "event finished");
        self.completed.notify_all();
        Ok(())
    }

    /// Block the calling thread while the event is Scheduled.
    pub fn wait(&self) -> Result<()> {
        let mut state = self.lock()?;
        while state.status == EventStatus::Scheduled {
            state = self
                .completed
                .wait(state)
                .map_err(|_| Error::msg("event lock poisoned"))?;
        }
        Ok(())
    }

    /// Return the event to Initialized so it can signal the next run.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.status = EventStatus::Initialized;
        state.err_msg = None;
        Ok(())
    }
}
