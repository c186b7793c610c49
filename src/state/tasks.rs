/// Task slots: the per-operation state machine the UI observes
///
/// Each asynchronous operation (preview, convert) gets one slot. A slot is
/// idle, pending, or holds exactly one outcome. Invocations are tagged with
/// a sequence number so that when a newer call supersedes an older one, the
/// older call's late resolution is recognized and discarded instead of
/// clobbering the newer result.

/// Observable state of one task slot
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState<T> {
    /// Never invoked (or reset)
    Idle,
    /// An invocation is outstanding
    Pending,
    /// The latest invocation resolved successfully
    Success(T),
    /// The latest invocation failed; carries a human-readable description
    Error(String),
}

/// One task slot with "overwrite, last call wins" supersession
///
/// `begin` clears any previous outcome the instant a new invocation starts,
/// not when it resolves. There is no cancellation of in-flight work — a
/// superseded call keeps running, and its result is simply dropped when it
/// finally arrives with a stale sequence number.
#[derive(Debug)]
pub struct TaskSlot<T> {
    state: TaskState<T>,
    seq: u64,
}

impl<T> TaskSlot<T> {
    pub fn new() -> Self {
        Self {
            state: TaskState::Idle,
            seq: 0,
        }
    }

    /// Start a new invocation: wipe the old outcome, go pending, and return
    /// the sequence number the eventual resolution must present
    pub fn begin(&mut self) -> u64 {
        self.seq += 1;
        self.state = TaskState::Pending;
        self.seq
    }

    /// Commit an outcome if (and only if) it belongs to the latest invocation
    ///
    /// Returns false for a stale resolution, which leaves the slot exactly
    /// as it was.
    pub fn resolve(&mut self, seq: u64, outcome: Result<T, String>) -> bool {
        if seq != self.seq {
            return false;
        }
        self.state = match outcome {
            Ok(value) => TaskState::Success(value),
            Err(message) => TaskState::Error(message),
        };
        true
    }

    /// Return to idle, dropping any held outcome
    ///
    /// The sequence counter keeps advancing, so an invocation that was
    /// outstanding when the reset happened still resolves stale.
    pub fn reset(&mut self) {
        self.seq += 1;
        self.state = TaskState::Idle;
    }

    pub fn state(&self) -> &TaskState<T> {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, TaskState::Pending)
    }

    /// The outcome, if the latest invocation succeeded
    pub fn success(&self) -> Option<&T> {
        match &self.state {
            TaskState::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The failure description, if the latest invocation failed
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            TaskState::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl<T> Default for TaskSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
