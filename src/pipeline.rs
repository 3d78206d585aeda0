//! Resumable three-stage generation: plan, detail each unit, aggregate
//!
//! The checkpoint is written to the store after every stage change and
//! after every finished unit, so an interrupted run resumes where it
//! stopped. Units are detailed strictly one after another.

use crate::completion::CompletionClient;
use crate::domain::{domain_for, PlanDomain};
use crate::error::{PipelineError, StoreError};
use crate::model::{GenerationCheckpoint, Plan, PlanRequest, Stage};
use crate::store::StateManager;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A progress report; `unit_index` never decreases within a run
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub unit_index: usize,
    pub unit_total: usize,
    pub message: String,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

pub struct GenerationPipeline {
    state: StateManager,
    client: Arc<CompletionClient>,
}

impl GenerationPipeline {
    pub fn new(state: StateManager, client: Arc<CompletionClient>) -> Self {
        Self { state, client }
    }

    /// Run (or resume) generation for `request` and return the finished draft
    ///
    /// The draft stays in the checkpoint until it is accepted or discarded.
    pub async fn run(
        &self,
        request: &PlanRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<Plan, PipelineError> {
        let domain = domain_for(request);
        let mut checkpoint = self.resume_or_start(request).await?;

        loop {
            match checkpoint.stage {
                Stage::Planning => self.plan(domain.as_ref(), &mut checkpoint, observer).await?,
                Stage::Detailing => self.detail(domain.as_ref(), &mut checkpoint, observer).await?,
                Stage::Aggregating => {
                    self.aggregate(domain.as_ref(), &mut checkpoint, observer)
                        .await?
                }
                Stage::Done => break,
            }
        }

        let total = checkpoint.planned_units.len();
        observer.on_progress(ProgressEvent {
            stage: Stage::Done,
            unit_index: total,
            unit_total: total,
            message: format!("{} ready for review", domain.kind()),
        });
        info!("Run {} finished", checkpoint.run_id);
        Ok(checkpoint.snapshot())
    }

    async fn resume_or_start(
        &self,
        request: &PlanRequest,
    ) -> Result<GenerationCheckpoint, StoreError> {
        match self.state.read(|doc| doc.checkpoint.clone()) {
            Some(existing) if existing.stage != Stage::Done && existing.is_for(request) => {
                info!(
                    "Resuming run {} at {} ({}/{} units done)",
                    existing.run_id,
                    existing.stage,
                    existing.completed_count(),
                    existing.planned_units.len()
                );
                return Ok(existing);
            }
            Some(existing) if existing.stage != Stage::Done => {
                warn!(
                    "Profile changed since run {}; starting over",
                    existing.run_id
                );
            }
            Some(existing) => {
                info!("Replacing unaccepted draft of run {}", existing.run_id);
            }
            None => {}
        }

        let checkpoint = GenerationCheckpoint::new(request);
        info!("Starting run {} ({})", checkpoint.run_id, request.kind());
        self.persist(&checkpoint).await?;
        Ok(checkpoint)
    }

    async fn persist(&self, checkpoint: &GenerationCheckpoint) -> Result<(), StoreError> {
        self.state
            .commit_now(|doc| doc.checkpoint = Some(checkpoint.clone()))
            .await?;
        debug!("Checkpoint saved at {}", checkpoint.stage);
        Ok(())
    }

    async fn plan(
        &self,
        domain: &dyn PlanDomain,
        checkpoint: &mut GenerationCheckpoint,
        observer: &dyn ProgressObserver,
    ) -> Result<(), PipelineError> {
        observer.on_progress(ProgressEvent {
            stage: Stage::Planning,
            unit_index: 0,
            unit_total: 0,
            message: format!("Planning the {}", domain.kind()),
        });

        let schedule = domain
            .plan(&self.client)
            .await
            .map_err(|e| PipelineError::at_stage(Stage::Planning, e))?;

        if schedule.planned_units().is_empty() {
            warn!("Planning produced no units");
            return Err(PipelineError::EmptyPlan);
        }

        checkpoint.set_schedule(schedule);
        self.persist(checkpoint).await?;
        Ok(())
    }

    async fn detail(
        &self,
        domain: &dyn PlanDomain,
        checkpoint: &mut GenerationCheckpoint,
        observer: &dyn ProgressObserver,
    ) -> Result<(), PipelineError> {
        let total = checkpoint.planned_units.len();
        let mut done = checkpoint.completed_count();

        observer.on_progress(ProgressEvent {
            stage: Stage::Detailing,
            unit_index: done,
            unit_total: total,
            message: if done > 0 {
                format!("Resuming after {} of {} units", done, total)
            } else {
                format!("Detailing {} units", total)
            },
        });

        for name in checkpoint.planned_units.clone() {
            if checkpoint.unit_named(&name).is_some() {
                continue;
            }

            let cached = self
                .state
                .read(|doc| doc.unit_cache.get(&name).map(|u| u.payload.clone()));
            let from_cache = cached.is_some();

            let payload = match cached {
                Some(payload) => {
                    debug!("Cache hit for '{}'", name);
                    payload
                }
                None => domain
                    .detail(&self.client, &name)
                    .await
                    .map_err(|e| PipelineError::for_unit(&name, e))?,
            };

            let unit = checkpoint.record_unit(&name, payload);
            let snapshot = checkpoint.clone();
            self.state
                .commit_now(|doc| {
                    doc.checkpoint = Some(snapshot);
                    if !from_cache {
                        doc.unit_cache.insert(name.clone(), unit);
                    }
                })
                .await?;

            done += 1;
            observer.on_progress(ProgressEvent {
                stage: Stage::Detailing,
                unit_index: done,
                unit_total: total,
                message: if from_cache {
                    format!("Reused {}", name)
                } else {
                    format!("Generated {}", name)
                },
            });
        }

        checkpoint.advance(Stage::Aggregating);
        self.persist(checkpoint).await?;
        Ok(())
    }

    async fn aggregate(
        &self,
        domain: &dyn PlanDomain,
        checkpoint: &mut GenerationCheckpoint,
        observer: &dyn ProgressObserver,
    ) -> Result<(), PipelineError> {
        let total = checkpoint.planned_units.len();
        observer.on_progress(ProgressEvent {
            stage: Stage::Aggregating,
            unit_index: total,
            unit_total: total,
            message: "Putting it all together".to_string(),
        });

        let aggregate = domain
            .aggregate(&self.client, &checkpoint.snapshot())
            .await
            .map_err(|e| PipelineError::at_stage(Stage::Aggregating, e))?;

        checkpoint.finish(aggregate);
        self.persist(checkpoint).await?;
        Ok(())
    }
}
