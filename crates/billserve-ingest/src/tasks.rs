//! Task chains, their submission queue and the registry that observes them.
//!
//! A [`Chain`] is a sequence of [`Task`]s. Only the head is queued; when it
//! succeeds the remainder is queued with the head's [`TaskOutput`] as input.
//! A failed step ends its chain. Independently submitted chains have no
//! ordering between them.

use std::{
  collections::{HashMap, VecDeque},
  sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

pub type TaskId = Uuid;

/// The final result of one task as seen by whoever waits on it.
pub type TaskOutcome = Result<TaskOutput, String>;

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
  /// Ingest one status document; yields the bill.
  Populate { url: String },
  /// Relate `bill_id` with the bill produced by the preceding populate.
  LinkRelatedBill { bill_id: Uuid },
  /// Populate every document of a manifest and wait for all of them.
  BulkIngest { manifest_url: String },
  RebuildAggregation,
}

impl Task {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Populate { .. } => "populate",
      Self::LinkRelatedBill { .. } => "link_related_bill",
      Self::BulkIngest { .. } => "bulk_ingest",
      Self::RebuildAggregation => "rebuild_aggregation",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "output", rename_all = "snake_case")]
pub enum TaskOutput {
  Bill { bill_id: Uuid },
  Linked { bill_id: Uuid, related_bill_id: Uuid },
  Bulk { discovered: usize, skipped: usize, succeeded: usize, failed: usize },
  Rebuilt { subjects: usize },
}

/// An ordered sequence of tasks; each step starts only after the previous
/// one succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
  steps: VecDeque<Task>,
}

impl Chain {
  pub fn new(first: Task) -> Self { Self { steps: VecDeque::from([first]) } }

  pub fn then(mut self, next: Task) -> Self {
    self.steps.push_back(next);
    self
  }

  fn split(mut self) -> Option<(Task, Chain)> {
    let head = self.steps.pop_front()?;
    Some((head, self))
  }

  pub fn is_empty(&self) -> bool { self.steps.is_empty() }
}

/// One queued step plus everything needed to continue its chain.
pub(crate) struct Envelope {
  pub id:    TaskId,
  pub task:  Task,
  pub rest:  Chain,
  pub input: Option<TaskOutput>,
  pub done:  Option<oneshot::Sender<TaskOutcome>>,
}

impl std::fmt::Debug for Envelope {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Envelope").field("id", &self.id).field("task", &self.task).finish()
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
  Queued,
  Running,
  Succeeded { output: TaskOutput },
  Failed { error: String },
}

impl TaskState {
  pub fn is_finished(&self) -> bool { matches!(self, Self::Succeeded { .. } | Self::Failed { .. }) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
  pub id:       TaskId,
  pub task:     Task,
  pub state:    TaskState,
  pub attempts: u32,
  /// The step this one was chained after.
  pub after:    Option<TaskId>,
}

/// Every task ever submitted, with its current state.
#[derive(Debug)]
pub struct TaskRegistry {
  records: Mutex<HashMap<TaskId, TaskRecord>>,
  pending: watch::Sender<usize>,
}

impl Default for TaskRegistry {
  fn default() -> Self {
    Self {
      records: Mutex::new(HashMap::new()),
      pending: watch::Sender::new(0),
    }
  }
}

impl TaskRegistry {
  fn with_records<R>(&self, f: impl FnOnce(&mut HashMap<TaskId, TaskRecord>) -> R) -> R {
    let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut records)
  }

  fn enqueue(&self, id: TaskId, task: Task, after: Option<TaskId>) {
    self.with_records(|records| {
      records.insert(id, TaskRecord { id, task, state: TaskState::Queued, attempts: 0, after });
    });
    self.pending.send_modify(|n| *n += 1);
  }

  pub(crate) fn start(&self, id: TaskId) {
    self.with_records(|records| {
      if let Some(record) = records.get_mut(&id) {
        record.state = TaskState::Running;
        record.attempts += 1;
      }
    });
  }

  pub(crate) fn finish(&self, id: TaskId, outcome: &TaskOutcome) {
    let state = match outcome {
      Ok(output) => TaskState::Succeeded { output: output.clone() },
      Err(error) => TaskState::Failed { error: error.clone() },
    };
    self.with_records(|records| {
      if let Some(record) = records.get_mut(&id) {
        record.state = state;
      }
    });
    self.pending.send_modify(|n| *n = n.saturating_sub(1));
  }

  pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
    self.with_records(|records| records.get(&id).cloned())
  }

  /// All records, queued ones first, then in no particular order.
  pub fn list(&self) -> Vec<TaskRecord> {
    let mut all: Vec<TaskRecord> = self.with_records(|records| records.values().cloned().collect());
    all.sort_by_key(|r| r.state.is_finished());
    all
  }

  /// Number of tasks queued or running.
  pub fn pending(&self) -> usize { *self.pending.borrow() }

  /// Resolve once no task is queued or running.
  ///
  /// A chain's next step is queued before its predecessor is marked
  /// finished, so this never resolves between two steps of one chain.
  pub async fn wait_idle(&self) {
    let mut rx = self.pending.subscribe();
    // The sender lives in `self`, so the channel cannot close while waiting.
    let _ = rx.wait_for(|n| *n == 0).await;
  }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

/// Non-blocking submission handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Scheduler {
  tx:       mpsc::UnboundedSender<Envelope>,
  registry: Arc<TaskRegistry>,
}

impl Scheduler {
  pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx, registry: Arc::new(TaskRegistry::default()) }, rx)
  }

  pub fn registry(&self) -> &Arc<TaskRegistry> { &self.registry }

  /// Queue the head of `chain`; fire-and-forget.
  pub fn submit(&self, chain: Chain) -> Option<TaskId> { self.enqueue(chain, None, None, None) }

  /// Queue the head of `chain` and get notified when that step finishes.
  pub fn submit_watched(&self, chain: Chain) -> Option<(TaskId, oneshot::Receiver<TaskOutcome>)> {
    let (done, rx) = oneshot::channel();
    self.enqueue(chain, None, None, Some(done)).map(|id| (id, rx))
  }

  /// Queue the remainder of a chain after step `after` produced `input`.
  pub(crate) fn continue_chain(&self, rest: Chain, input: TaskOutput, after: TaskId) -> Option<TaskId> {
    self.enqueue(rest, Some(input), Some(after), None)
  }

  fn enqueue(
    &self,
    chain: Chain,
    input: Option<TaskOutput>,
    after: Option<TaskId>,
    done: Option<oneshot::Sender<TaskOutcome>>,
  ) -> Option<TaskId> {
    let (task, rest) = chain.split()?;
    let id = Uuid::new_v4();
    self.registry.enqueue(id, task.clone(), after);

    let envelope = Envelope { id, task, rest, input, done };
    if let Err(mpsc::error::SendError(envelope)) = self.tx.send(envelope) {
      let outcome: TaskOutcome = Err("task queue is closed".to_owned());
      self.registry.finish(id, &outcome);
      if let Some(done) = envelope.done {
        let _ = done.send(outcome);
      }
    }
    Some(id)
  }

  // ── Entry points ──────────────────────────────────────────────────────────

  /// Ingest one status document.
  pub fn ingest_document(&self, url: impl Into<String>) -> TaskId {
    self.submit_single(Chain::new(Task::Populate { url: url.into() }))
  }

  /// Ingest every document of a manifest, then rebuild the aggregation.
  pub fn bulk_ingest_from_manifest(&self, manifest_url: impl Into<String>) -> TaskId {
    self.submit_single(
      Chain::new(Task::BulkIngest { manifest_url: manifest_url.into() })
        .then(Task::RebuildAggregation),
    )
  }

  pub fn rebuild_aggregation(&self) -> TaskId {
    self.submit_single(Chain::new(Task::RebuildAggregation))
  }

  fn submit_single(&self, chain: Chain) -> TaskId {
    // A chain built from `Chain::new` always has a head.
    self.submit(chain).unwrap_or_else(Uuid::nil)
  }
}
