//! The API a front end drives: generation, review, edits, keys and history

use crate::completion::CompletionClient;
use crate::credentials::CredentialPool;
use crate::domain;
use crate::editor::{Edit, PlanEditor, PlanTarget, UnitSelector};
use crate::error::{AssistantError, PipelineError};
use crate::model::{
    CommittedPlan, Credential, Document, GenerationCheckpoint, GenerationUnit, Plan, PlanRequest,
};
use crate::pipeline::{GenerationPipeline, ProgressEvent, ProgressObserver};
use crate::store::StateManager;
use futures::Stream;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Item of the stream returned by [`Assistant::begin_generation`]
#[derive(Debug)]
pub enum GenerationEvent {
    Progress(ProgressEvent),
    /// Always the last item
    Finished(Result<Plan, PipelineError>),
}

pub struct Assistant {
    state: StateManager,
    pool: CredentialPool,
    client: Arc<CompletionClient>,
    pipeline: GenerationPipeline,
    editor: PlanEditor,
    history_limit: usize,
}

impl Assistant {
    pub fn new(state: StateManager, client: Arc<CompletionClient>, history_limit: usize) -> Self {
        Self {
            pool: client.pool().clone(),
            pipeline: GenerationPipeline::new(state.clone(), client.clone()),
            editor: PlanEditor::new(client.clone()),
            state,
            client,
            history_limit,
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Change notifications for anything that renders the document
    pub fn subscribe(&self) -> watch::Receiver<Document> {
        self.state.subscribe()
    }

    pub fn profile(&self) -> Option<PlanRequest> {
        self.state.read(|doc| doc.settings.profile.clone())
    }

    /// Store the profile; the write is debounced like any settings edit
    pub fn set_profile(&self, request: PlanRequest) {
        info!("Profile set for a {}", request.kind());
        self.state
            .commit_soon(|doc| doc.settings.profile = Some(request));
    }

    /// Popular job platforms for the stored career profile's role
    pub async fn suggest_platforms(&self) -> Result<Vec<String>, AssistantError> {
        let role = match self.profile() {
            Some(PlanRequest::Jobs(profile)) => profile.desired_role,
            _ => String::new(),
        };
        Ok(domain::suggest_platforms(&self.client, &role).await?)
    }

    /// Replace the platforms of the stored career profile
    pub fn set_platforms(&self, platforms: Vec<String>) -> Result<(), AssistantError> {
        match self.profile() {
            Some(PlanRequest::Jobs(mut profile)) => {
                profile.platforms = platforms;
                self.set_profile(PlanRequest::Jobs(profile));
                Ok(())
            }
            Some(PlanRequest::Meals(_)) => Err(AssistantError::NotJobSearch),
            None => Err(AssistantError::NoProfile),
        }
    }

    /// Start or resume generation in the background
    ///
    /// Dropping the stream does not stop the run; it keeps checkpointing
    /// and can be resumed by the next call.
    pub fn begin_generation(
        self: &Arc<Self>,
        request: PlanRequest,
    ) -> impl Stream<Item = GenerationEvent> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        let assistant = Arc::clone(self);

        tokio::spawn(async move {
            let progress = tx.clone();
            let observer = move |event: ProgressEvent| {
                let _ = progress.send(GenerationEvent::Progress(event));
            };
            let result = assistant.pipeline.run(&request, &observer).await;
            let _ = tx.send(GenerationEvent::Finished(result));
        });

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }

    /// Generate (or resume) a draft for `request`, reporting to `observer`
    pub async fn run_generation(
        &self,
        request: &PlanRequest,
        observer: &dyn ProgressObserver,
    ) -> Result<Plan, AssistantError> {
        Ok(self.pipeline.run(request, observer).await?)
    }

    /// Generate from the stored profile
    pub async fn generate(&self, observer: &dyn ProgressObserver) -> Result<Plan, AssistantError> {
        let request = self.profile().ok_or(AssistantError::NoProfile)?;
        self.run_generation(&request, observer).await
    }

    pub fn checkpoint(&self) -> Option<GenerationCheckpoint> {
        self.state.read(|doc| doc.checkpoint.clone())
    }

    pub fn draft(&self) -> Option<Plan> {
        self.state.read(|doc| doc.draft())
    }

    pub fn committed(&self) -> Option<CommittedPlan> {
        self.state.read(|doc| doc.committed.clone())
    }

    /// Commit a reviewed draft, push it on the history and clear the checkpoint
    ///
    /// `draft` must be the checkpoint's current draft; a copy taken before a
    /// later edit is refused with `StaleDraft`.
    pub async fn accept_draft(&self, draft: Plan) -> Result<CommittedPlan, AssistantError> {
        let limit = self.history_limit;
        let committed = self
            .state
            .commit_now(|doc| match doc.draft() {
                Some(current) if current == draft => Ok(doc.commit(current, limit)),
                Some(_) => Err(AssistantError::StaleDraft),
                None => Err(AssistantError::NoDraft),
            })
            .await??;
        info!("Accepted plan {}", committed.id);
        Ok(committed)
    }

    /// Drop the checkpoint, finished or not; returns whether there was one
    pub async fn discard_draft(&self) -> Result<bool, AssistantError> {
        let discarded = self
            .state
            .commit_now(|doc| doc.checkpoint.take().is_some())
            .await?;
        if discarded {
            info!("Discarded the pending run");
        }
        Ok(discarded)
    }

    pub async fn regenerate_unit(
        &self,
        target: PlanTarget,
        selector: &UnitSelector,
        hint: &str,
    ) -> Result<Plan, AssistantError> {
        let plan = self.plan_for(target)?;
        let edit = self.editor.regenerate_unit(&plan, selector, hint).await?;
        self.store_edit(target, edit).await
    }

    pub async fn regenerate_group(
        &self,
        target: PlanTarget,
        group: &str,
        hint: &str,
    ) -> Result<Plan, AssistantError> {
        let plan = self.plan_for(target)?;
        let edit = self.editor.regenerate_group(&plan, group, hint).await?;
        self.store_edit(target, edit).await
    }

    pub async fn refresh_aggregate(&self, target: PlanTarget) -> Result<Plan, AssistantError> {
        let plan = self.plan_for(target)?;
        let plan = self.editor.refresh_aggregate(&plan).await?;
        self.store_edit(
            target,
            Edit {
                plan,
                new_units: Vec::new(),
            },
        )
        .await
    }

    fn plan_for(&self, target: PlanTarget) -> Result<Plan, AssistantError> {
        match target {
            PlanTarget::Draft => self.draft().ok_or(AssistantError::NoDraft),
            PlanTarget::Committed => self
                .committed()
                .map(|c| c.plan)
                .ok_or(AssistantError::NoCommittedPlan),
        }
    }

    async fn store_edit(&self, target: PlanTarget, edit: Edit) -> Result<Plan, AssistantError> {
        let Edit { plan, new_units } = edit;
        let stored = plan.clone();

        let replaced = self
            .state
            .commit_now(|doc| {
                cache_units(doc, new_units);
                match target {
                    PlanTarget::Draft => doc
                        .checkpoint
                        .as_mut()
                        .map_or(false, |c| c.replace_draft(stored)),
                    PlanTarget::Committed => match doc.committed.as_mut() {
                        Some(committed) => {
                            committed.plan = stored;
                            true
                        }
                        None => false,
                    },
                }
            })
            .await?;

        match (replaced, target) {
            (true, _) => Ok(plan),
            (false, PlanTarget::Draft) => Err(AssistantError::NoDraft),
            (false, PlanTarget::Committed) => Err(AssistantError::NoCommittedPlan),
        }
    }

    pub fn list_credentials(&self) -> Vec<Credential> {
        self.pool.list()
    }

    /// Store a new key, optionally checking it with one cheap call first
    ///
    /// Returns false if the key was already known.
    pub async fn add_credential(&self, secret: &str, validate: bool) -> Result<bool, AssistantError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(AssistantError::EmptyCredential);
        }
        if validate {
            self.client
                .probe(&Credential::new(secret))
                .await
                .map_err(AssistantError::CredentialCheck)?;
        }
        Ok(self.pool.add(secret).await?)
    }

    pub async fn disable_credential(&self, secret: &str) -> Result<bool, AssistantError> {
        let credential = self
            .pool
            .find(secret)
            .ok_or(AssistantError::UnknownCredential)?;
        Ok(self.pool.disable(&credential).await?)
    }

    pub async fn enable_credential(&self, secret: &str) -> Result<bool, AssistantError> {
        self.pool
            .find(secret)
            .ok_or(AssistantError::UnknownCredential)?;
        Ok(self.pool.enable(secret).await?)
    }

    /// Accepted plans, newest first
    pub fn history(&self) -> Vec<CommittedPlan> {
        self.state.read(|doc| doc.history.clone())
    }

    /// Make a history entry the committed plan again
    pub async fn activate_history(&self, index: usize) -> Result<CommittedPlan, AssistantError> {
        let activated = self
            .state
            .commit_now(|doc| {
                let entry = doc.history.get(index).cloned()?;
                doc.committed = Some(entry.clone());
                Some(entry)
            })
            .await?;
        activated.ok_or_else(|| self.history_index_error(index))
    }

    pub async fn delete_history(&self, index: usize) -> Result<CommittedPlan, AssistantError> {
        let removed = self
            .state
            .commit_now(|doc| (index < doc.history.len()).then(|| doc.history.remove(index)))
            .await?;
        removed.ok_or_else(|| self.history_index_error(index))
    }

    fn history_index_error(&self, index: usize) -> AssistantError {
        AssistantError::HistoryIndex {
            index,
            len: self.state.read(|doc| doc.history.len()),
        }
    }

    /// Forget every cached unit; returns how many were dropped
    pub async fn clear_unit_cache(&self) -> Result<usize, AssistantError> {
        let cleared = self
            .state
            .commit_now(|doc| {
                let cleared = doc.unit_cache.len();
                doc.unit_cache.clear();
                cleared
            })
            .await?;
        info!("Cleared {} cached units", cleared);
        Ok(cleared)
    }
}

fn cache_units(doc: &mut Document, units: Vec<GenerationUnit>) {
    for unit in units {
        doc.unit_cache.insert(unit.name.clone(), unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::model::{Group, Schedule, Slot, Stage};
    use crate::testing::{self, Harness, ScriptedFactory};
    use futures::StreamExt;
    use serde_json::json;

    fn jobs_request() -> PlanRequest {
        serde_json::from_value(json!({"kind": "jobs", "desired_role": "SRE", "listing_count": 2}))
            .unwrap()
    }

    fn listing(title: &str, company: &str, score: u32) -> String {
        json!({
            "title": title,
            "company": company,
            "location": "Remote",
            "salary": "100k",
            "description": "Keep things running",
            "requirements": ["Linux"],
            "match_score": score,
            "match_reasoning": "Good fit",
        })
        .to_string()
    }

    fn respond(prompt: &str) -> Result<String, ServiceError> {
        if prompt.contains("most popular job boards") {
            Ok(json!({"platforms": ["LinkedIn", " Indeed ", "linkedin", "hh.ru"]}).to_string())
        } else if prompt.contains("replace the opening") {
            Ok(listing("Cloud Engineer", "Globex", 95))
        } else if prompt.contains("Propose") {
            Ok(json!({"listings": [
                {"title": "SRE", "company": "Acme"},
                {"title": "Platform Engineer", "company": "Initech"}
            ]})
            .to_string())
        } else if prompt.contains("\"SRE at Acme\"") {
            Ok(listing("SRE", "Acme", 90))
        } else if prompt.contains("\"Platform Engineer at Initech\"") {
            Ok(listing("Platform Engineer", "Initech", 80))
        } else {
            Err(ServiceError::Transport("unexpected prompt".into()))
        }
    }

    fn assistant(h: &Harness) -> Arc<Assistant> {
        Arc::new(Assistant::new(
            h.state.clone(),
            h.client.clone(),
            h.config.history_limit,
        ))
    }

    fn finished_checkpoint(tag: &str) -> GenerationCheckpoint {
        let request: PlanRequest =
            serde_json::from_value(json!({"kind": "meals", "preferences": tag})).unwrap();
        let mut checkpoint = GenerationCheckpoint::new(&request);
        checkpoint.set_schedule(Schedule {
            groups: vec![Group {
                name: "Day 1".into(),
                slots: vec![Slot {
                    key: "dinner".into(),
                    unit_name: format!("Dish {}", tag),
                    carry_over: false,
                    unit_id: None,
                }],
            }],
        });
        checkpoint.record_unit(&format!("Dish {}", tag), json!({}));
        checkpoint.advance(Stage::Aggregating);
        checkpoint.finish(None);
        checkpoint
    }

    #[tokio::test]
    async fn test_accept_clears_checkpoint_and_bounds_history() {
        let h = testing::harness(&["key-1"], ScriptedFactory::new(|c| respond(&c.prompt))).await;
        let assistant = assistant(&h);

        for i in 0..6 {
            let checkpoint = finished_checkpoint(&i.to_string());
            h.state.set(|doc| doc.checkpoint = Some(checkpoint));
            let draft = assistant.draft().unwrap();
            assistant.accept_draft(draft).await.unwrap();

            let stored = h.store.stored("tester").unwrap();
            assert!(stored.checkpoint.is_none());
        }

        let stored = h.store.stored("tester").unwrap();
        assert_eq!(stored.history.len(), 5);
        assert_eq!(stored.history[0], stored.committed.clone().unwrap());
        assert!(stored.history[0].plan.unit_by_name("Dish 5").is_some());
        assert!(stored.history[4].plan.unit_by_name("Dish 1").is_some());
    }

    #[tokio::test]
    async fn test_accept_requires_finished_run() {
        let h = testing::harness(&["key-1"], ScriptedFactory::new(|c| respond(&c.prompt))).await;
        let assistant = assistant(&h);
        let draft = finished_checkpoint("x").draft().unwrap();

        let err = assistant.accept_draft(draft.clone()).await.unwrap_err();
        assert!(matches!(err, AssistantError::NoDraft));

        let mut running = finished_checkpoint("x");
        running.stage = Stage::Detailing;
        h.state.set(|doc| doc.checkpoint = Some(running));
        assert!(assistant.accept_draft(draft).await.is_err());
        assert!(assistant.discard_draft().await.unwrap());
        assert!(!assistant.discard_draft().await.unwrap());
    }

    #[tokio::test]
    async fn test_accept_refuses_a_plan_other_than_the_draft() {
        let h = testing::harness(&["key-1"], ScriptedFactory::new(|c| respond(&c.prompt))).await;
        let assistant = assistant(&h);
        h.state.set(|doc| doc.checkpoint = Some(finished_checkpoint("x")));

        let mut outdated = assistant.draft().unwrap();
        outdated.aggregate_stale = !outdated.aggregate_stale;
        let err = assistant.accept_draft(outdated).await.unwrap_err();
        assert!(matches!(err, AssistantError::StaleDraft));
        assert!(assistant.committed().is_none());
        assert!(assistant.checkpoint().is_some());

        let foreign = finished_checkpoint("y").draft().unwrap();
        let err = assistant.accept_draft(foreign).await.unwrap_err();
        assert!(matches!(err, AssistantError::StaleDraft));

        let committed = assistant.accept_draft(assistant.draft().unwrap()).await.unwrap();
        assert_eq!(assistant.committed(), Some(committed));
    }

    #[tokio::test]
    async fn test_begin_generation_streams_progress_then_result() {
        let h = testing::harness(&["key-1"], ScriptedFactory::new(|c| respond(&c.prompt))).await;
        let assistant = assistant(&h);

        let events: Vec<GenerationEvent> = assistant
            .begin_generation(jobs_request())
            .collect()
            .await;

        let (last, progress) = events.split_last().unwrap();
        assert!(progress
            .iter()
            .all(|e| matches!(e, GenerationEvent::Progress(_))));
        assert!(progress.len() >= 4);

        let draft = match last {
            GenerationEvent::Finished(Ok(plan)) => plan.clone(),
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(draft.units.len(), 2);
        assert_eq!(assistant.draft().unwrap(), draft);
    }

    #[tokio::test]
    async fn test_edit_committed_plan_persists() {
        let factory = ScriptedFactory::new(|c| respond(&c.prompt));
        let h = testing::harness(&["key-1"], factory.clone()).await;
        let assistant = assistant(&h);

        let draft = assistant
            .run_generation(&jobs_request(), &|_: ProgressEvent| {})
            .await
            .unwrap();
        assistant.accept_draft(draft).await.unwrap();

        let updated = assistant
            .regenerate_unit(
                PlanTarget::Committed,
                &UnitSelector::new("Listings", "2"),
                "more cloud work",
            )
            .await
            .unwrap();
        assert_eq!(
            updated.unit_for_slot("Listings", "2").unwrap().name,
            "Cloud Engineer at Globex"
        );
        assert!(updated.aggregate_stale);

        let stored = h.store.stored("tester").unwrap();
        assert_eq!(stored.committed.as_ref().unwrap().plan, updated);
        assert!(stored.unit_cache.contains_key("Cloud Engineer at Globex"));
        // History keeps the plan as accepted
        assert_ne!(stored.history[0].plan, updated);

        let refreshed = assistant.refresh_aggregate(PlanTarget::Committed).await.unwrap();
        assert!(!refreshed.aggregate_stale);
        assert!(format!("{:?}", refreshed.aggregate).contains("Globex"));

        let err = assistant
            .regenerate_unit(PlanTarget::Draft, &UnitSelector::new("Listings", "1"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::NoDraft));
    }

    #[tokio::test]
    async fn test_history_activate_and_delete() {
        let h = testing::harness(&["key-1"], ScriptedFactory::new(|c| respond(&c.prompt))).await;
        let assistant = assistant(&h);
        for i in 0..3 {
            let checkpoint = finished_checkpoint(&i.to_string());
            h.state.set(|doc| doc.checkpoint = Some(checkpoint));
            assistant.accept_draft(assistant.draft().unwrap()).await.unwrap();
        }

        let oldest = assistant.activate_history(2).await.unwrap();
        assert_eq!(assistant.committed().unwrap(), oldest);
        assert_eq!(assistant.history().len(), 3);

        let removed = assistant.delete_history(0).await.unwrap();
        assert!(removed.plan.unit_by_name("Dish 2").is_some());
        assert_eq!(h.store.stored("tester").unwrap().history.len(), 2);

        let err = assistant.delete_history(5).await.unwrap_err();
        assert!(matches!(err, AssistantError::HistoryIndex { index: 5, len: 2 }));
    }

    #[tokio::test]
    async fn test_add_credential_with_validation() {
        let factory = ScriptedFactory::new(|call| match call.secret.as_str() {
            "good-key" => Ok(r#"{"ok": true}"#.to_string()),
            _ => Err(ServiceError::Api {
                status: 400,
                message: "API key not valid".into(),
            }),
        });
        let h = testing::harness(&[], factory).await;
        let assistant = assistant(&h);

        assert!(assistant.add_credential(" good-key ", true).await.unwrap());
        let err = assistant.add_credential("bad-key", true).await.unwrap_err();
        assert!(matches!(err, AssistantError::CredentialCheck(_)));
        assert!(matches!(
            assistant.add_credential("  ", false).await,
            Err(AssistantError::EmptyCredential)
        ));
        assert!(assistant.add_credential("bad-key", false).await.unwrap());

        assert!(assistant.disable_credential("good-key").await.unwrap());
        assert!(assistant.enable_credential("good-key").await.unwrap());
        assert!(assistant.disable_credential("  good-key\n").await.unwrap());
        assert!(!h.pool.find("good-key").unwrap().enabled);
        assert!(assistant.enable_credential(" good-key ").await.unwrap());
        assert!(matches!(
            assistant.disable_credential("nope").await,
            Err(AssistantError::UnknownCredential)
        ));
        assert_eq!(assistant.list_credentials().len(), 2);
    }

    #[tokio::test]
    async fn test_profile_and_cache_clear() {
        let h = testing::harness(&["key-1"], ScriptedFactory::new(|c| respond(&c.prompt))).await;
        let assistant = assistant(&h);

        let err = assistant.generate(&|_: ProgressEvent| {}).await.unwrap_err();
        assert!(matches!(err, AssistantError::NoProfile));

        assistant.set_profile(jobs_request());
        h.state.flush().await.unwrap();
        assert_eq!(h.store.stored("tester").unwrap().settings.profile, Some(jobs_request()));

        assistant.generate(&|_: ProgressEvent| {}).await.unwrap();
        assert_eq!(assistant.clear_unit_cache().await.unwrap(), 2);
        assert!(h.store.stored("tester").unwrap().unit_cache.is_empty());
    }

    #[tokio::test]
    async fn test_suggest_and_store_platforms() {
        let factory = ScriptedFactory::new(|c| respond(&c.prompt));
        let h = testing::harness(&["key-1"], factory.clone()).await;
        let assistant = assistant(&h);

        assert!(matches!(
            assistant.set_platforms(vec!["LinkedIn".into()]),
            Err(AssistantError::NoProfile)
        ));

        assistant.set_profile(jobs_request());
        let platforms = assistant.suggest_platforms().await.unwrap();
        assert_eq!(platforms, vec!["LinkedIn", "Indeed", "hh.ru"]);
        assert_eq!(factory.calls_mentioning("as SRE find openings"), 1);

        assistant.set_platforms(platforms.clone()).unwrap();
        h.state.flush().await.unwrap();
        match h.store.stored("tester").unwrap().settings.profile {
            Some(PlanRequest::Jobs(profile)) => assert_eq!(profile.platforms, platforms),
            other => panic!("unexpected profile: {other:?}"),
        }

        assistant.set_profile(serde_json::from_value(json!({"kind": "meals"})).unwrap());
        assert!(matches!(
            assistant.set_platforms(Vec::new()),
            Err(AssistantError::NotJobSearch)
        ));
    }
}
