//! The worker pool that executes queued tasks.

use std::sync::Arc;

use billserve_core::store::BillStore;
use billserve_govinfo::{DocumentSource, Locator};
use tokio::{
  sync::{OwnedSemaphorePermit, Semaphore, mpsc},
  task::JoinHandle,
};
use tracing::{Instrument as _, info, info_span, warn};

use crate::{
  Error, PipelineConfig, Result, aggregate,
  tasks::{Chain, Envelope, Scheduler, Task, TaskOutcome, TaskOutput},
};

/// Everything a running task can reach.
pub struct Pipeline<S, F> {
  pub(crate) store:     Arc<S>,
  pub(crate) source:    F,
  pub(crate) locator:   Locator,
  pub(crate) scheduler: Scheduler,
  pub(crate) config:    PipelineConfig,
}

/// A started pipeline: the submission handle plus its dispatcher task.
pub struct PipelineHandle {
  scheduler:  Scheduler,
  dispatcher: JoinHandle<()>,
}

impl PipelineHandle {
  pub fn scheduler(&self) -> &Scheduler { &self.scheduler }

  /// Stop taking new work. Tasks already running are not interrupted.
  pub fn shutdown(self) { self.dispatcher.abort(); }
}

impl<S, F> Pipeline<S, F>
where
  S: BillStore + 'static,
  F: DocumentSource + 'static,
{
  /// Spawn the dispatcher on the current runtime.
  pub fn start(store: Arc<S>, source: F, locator: Locator, config: PipelineConfig) -> PipelineHandle {
    let (scheduler, rx) = Scheduler::new();
    let workers = config.workers.max(1);
    let pipeline = Arc::new(Self {
      store,
      source,
      locator,
      scheduler: scheduler.clone(),
      config,
    });

    info!(workers, "pipeline started");
    let dispatcher = tokio::spawn(dispatch(pipeline, rx, workers));
    PipelineHandle { scheduler, dispatcher }
  }

  async fn run(self: Arc<Self>, envelope: Envelope, permit: OwnedSemaphorePermit) {
    let Envelope { id, task, rest, input, done } = envelope;
    let span = info_span!("task", %id, kind = task.kind());

    async move {
      let registry = self.scheduler.registry();
      let mut permit = Some(permit);
      let mut retries = 0;

      let result = loop {
        registry.start(id);
        info!("task started");
        match self.execute(&task, input.as_ref(), &mut permit).await {
          Err(e) if e.is_retryable() && retries < self.config.task_retries => {
            retries += 1;
            warn!(error = %e, retries, "task failed; retrying");
            tokio::time::sleep(self.config.retry_delay).await;
          }
          other => break other,
        }
      };

      match &result {
        Ok(output) => {
          info!(?output, "task succeeded");
          if let Some(next) = self.scheduler.continue_chain(rest, output.clone(), id) {
            info!(next = %next, "chained task queued");
          }
        }
        Err(e) => {
          if rest.is_empty() {
            warn!(error = %e, "task failed");
          } else {
            warn!(error = %e, "task failed; abandoning the rest of its chain");
          }
        }
      }

      let outcome: TaskOutcome = result.map_err(|e| e.to_string());
      registry.finish(id, &outcome);
      if let Some(done) = done {
        let _ = done.send(outcome);
      }
    }
    .instrument(span)
    .await
  }

  async fn execute(
    &self,
    task: &Task,
    input: Option<&TaskOutput>,
    permit: &mut Option<OwnedSemaphorePermit>,
  ) -> Result<TaskOutput> {
    match task {
      Task::Populate { url } => {
        let bill_id = self.populate(url).await?;
        Ok(TaskOutput::Bill { bill_id })
      }
      Task::LinkRelatedBill { bill_id } => {
        let Some(TaskOutput::Bill { bill_id: related_bill_id }) = input else {
          return Err(Error::ChainInput("link_related_bill must follow a populate"));
        };
        self
          .store
          .link_related_bills(*bill_id, *related_bill_id)
          .await
          .map_err(Error::store)?;
        Ok(TaskOutput::Linked { bill_id: *bill_id, related_bill_id: *related_bill_id })
      }
      Task::BulkIngest { manifest_url } => {
        // The populates this schedules need worker slots of their own.
        drop(permit.take());
        self.bulk_ingest(manifest_url).await
      }
      Task::RebuildAggregation => {
        let splits = aggregate::rebuild(&*self.store, &self.config.party_buckets).await?;
        Ok(TaskOutput::Rebuilt { subjects: splits.len() })
      }
    }
  }

  /// Schedule a populate for every manifest entry not already fully ingested
  /// and wait for all of them.
  async fn bulk_ingest(&self, manifest_url: &str) -> Result<TaskOutput> {
    let links = self.locator.discover_documents(&self.source, manifest_url).await?;
    let discovered = links.len();

    let mut skipped = 0;
    let mut waiting = Vec::new();
    for url in links {
      let known = self.store.find_bill_by_url(url.clone()).await.map_err(Error::store)?;
      if known.is_some_and(|bill| bill.is_ingested()) {
        skipped += 1;
        continue;
      }
      if let Some((_, done)) = self.scheduler.submit_watched(Chain::new(Task::Populate { url })) {
        waiting.push(done);
      }
    }
    info!(discovered, skipped, scheduled = waiting.len(), "bulk run scheduled");

    let (mut succeeded, mut failed) = (0, 0);
    for done in waiting {
      match done.await {
        Ok(Ok(_)) => succeeded += 1,
        _ => failed += 1,
      }
    }
    info!(succeeded, failed, "bulk run finished");
    Ok(TaskOutput::Bulk { discovered, skipped, succeeded, failed })
  }
}

async fn dispatch<S, F>(pipeline: Arc<Pipeline<S, F>>, mut rx: mpsc::UnboundedReceiver<Envelope>, workers: usize)
where
  S: BillStore + 'static,
  F: DocumentSource + 'static,
{
  let semaphore = Arc::new(Semaphore::new(workers));

  while let Some(envelope) = rx.recv().await {
    // Acquire before spawning so at most `workers` tasks execute at once.
    let Ok(permit) = semaphore.clone().acquire_owned().await else {
      break;
    };
    tokio::spawn(pipeline.clone().run(envelope, permit));
  }
}
