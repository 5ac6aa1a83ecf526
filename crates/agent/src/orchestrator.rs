use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use optiq_core::config::AppConfig;
use optiq_core::heuristics::ScaleCheck;
use optiq_core::{
    AgentOutputRecord, ConversationRecord, JobRecord, JobStatus, PipelineEngine, PipelineError,
    RefinedSpecification, Sender, SpecificationPipeline, StageContext, StageEvent, StageState,
};
use optiq_schemas::SchemaRegistry;

use crate::invoker::ModelInvoker;
use crate::llm::ModelClient;
use crate::meaning::{MeaningOutcome, MeaningStage};
use crate::prompts::PromptStore;
use crate::refinement::RefinementStage;
use crate::session::SessionContext;

/// Everything the external sink receives when a pipeline run completes:
/// the refined specification plus the job, conversation, and agent-output
/// records. Storage itself happens elsewhere.
#[derive(Clone, Debug)]
pub struct PipelineCompletion {
    pub refined: RefinedSpecification,
    pub tokens_used: u32,
    pub job: JobRecord,
    pub conversation: Vec<ConversationRecord>,
    pub agent_outputs: Vec<AgentOutputRecord>,
}

/// Sequences Meaning → Refinement → Downstream for one session. The
/// Meaning → Refinement gate only opens on an explicit user confirmation
/// of a valid specification; nothing advances on confidence alone.
pub struct PipelineOrchestrator {
    engine: PipelineEngine<SpecificationPipeline>,
    state: StageState,
    session: SessionContext,
    meaning: MeaningStage,
    refinement: RefinementStage,
    job_id: Uuid,
    created_at: DateTime<Utc>,
    initial_input: Option<String>,
}

impl PipelineOrchestrator {
    pub fn new(meaning: MeaningStage, refinement: RefinementStage, session: SessionContext) -> Self {
        let engine = PipelineEngine::default();
        let state = engine.initial_state();
        Self {
            engine,
            state,
            session,
            meaning,
            refinement,
            job_id: Uuid::new_v4(),
            created_at: Utc::now(),
            initial_input: None,
        }
    }

    /// Assemble the full pipeline from configuration, a model client, and
    /// a compiled schema registry.
    pub fn build(
        client: Arc<dyn ModelClient>,
        config: &AppConfig,
        registry: Arc<SchemaRegistry>,
    ) -> Self {
        let prompts = PromptStore::new(config.prompts.dir.clone());
        let invoker = ModelInvoker::from_config(client, &config.model);
        let meaning = MeaningStage::new(
            invoker.clone(),
            &prompts,
            Arc::clone(&registry),
            ScaleCheck::new(config.scale_check.clone()),
        );
        let refinement = RefinementStage::new(invoker, &prompts, registry);
        Self::new(meaning, refinement, SessionContext::new(config.session.max_turns))
    }

    pub fn state(&self) -> &StageState {
        &self.state
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// One Meaning turn. Only legal while the pipeline is in the Meaning
    /// stage.
    pub async fn handle_message(&mut self, text: &str) -> Result<MeaningOutcome, PipelineError> {
        if self.state != StageState::Meaning {
            return Err(PipelineError::InvalidInput(format!(
                "messages are only accepted in the meaning stage (current: {:?})",
                self.state
            )));
        }

        if self.initial_input.is_none() {
            self.initial_input = Some(text.to_string());
        }

        let outcome = self.meaning.process_turn(&mut self.session, text).await?;
        info!(
            event_name = "pipeline.meaning_turn",
            job_id = %self.job_id,
            is_valid_problem = outcome.specification.is_valid_problem,
            "meaning turn handled"
        );
        Ok(outcome)
    }

    /// The human-in-the-loop gate: the user confirmed the current
    /// specification, so advance to Refinement and run it. On refinement
    /// failure the pipeline stays in Refinement; `run_refinement` can be
    /// retried or the session reset.
    pub async fn confirm_specification(&mut self) -> Result<PipelineCompletion, PipelineError> {
        let context = StageContext {
            specification_valid: self
                .session
                .current_specification()
                .map(|specification| specification.is_valid_problem)
                .unwrap_or(false),
        };

        let outcome = self
            .engine
            .apply(&self.state, &StageEvent::SpecificationConfirmed, &context)
            .map_err(|error| PipelineError::InvalidInput(error.to_string()))?;
        self.state = outcome.to;
        info!(
            event_name = "pipeline.specification_confirmed",
            job_id = %self.job_id,
            "specification confirmed by user"
        );

        self.run_refinement().await
    }

    /// Run (or retry) the refinement stage. Legal only in the Refinement
    /// state.
    pub async fn run_refinement(&mut self) -> Result<PipelineCompletion, PipelineError> {
        if self.state != StageState::Refinement {
            return Err(PipelineError::InvalidInput(format!(
                "refinement can only run from the refinement stage (current: {:?})",
                self.state
            )));
        }

        let specification = self.session.current_specification().cloned();
        let outcome = self.refinement.refine(specification.as_ref()).await?;

        let transition = self
            .engine
            .apply(&self.state, &StageEvent::RefinementSucceeded, &StageContext::default())
            .map_err(|error| PipelineError::InvalidInput(error.to_string()))?;
        self.state = transition.to;
        info!(
            event_name = "pipeline.refinement_succeeded",
            job_id = %self.job_id,
            "refinement gate passed, downstream stages are stubbed"
        );

        Ok(self.build_completion(outcome.refined, outcome.tokens_used))
    }

    /// Full reset: back to the Meaning stage with a fresh session and a
    /// fresh job identity.
    pub fn reset(&mut self) {
        if let Ok(outcome) =
            self.engine.apply(&self.state, &StageEvent::ResetRequested, &StageContext::default())
        {
            self.state = outcome.to;
        }
        self.session.reset();
        self.job_id = Uuid::new_v4();
        self.created_at = Utc::now();
        self.initial_input = None;
        info!(event_name = "pipeline.reset", job_id = %self.job_id, "session reset");
    }

    fn build_completion(
        &self,
        refined: RefinedSpecification,
        tokens_used: u32,
    ) -> PipelineCompletion {
        let now = Utc::now();
        let user_input = self.initial_input.clone().unwrap_or_default();
        let final_message = self
            .session
            .turns()
            .filter(|turn| turn.sender == Sender::Assistant)
            .last()
            .map(|turn| turn.message.clone())
            .unwrap_or_default();

        let job = JobRecord {
            id: self.job_id,
            created_at: self.created_at,
            title: derive_title(&user_input),
            user_input,
            status: JobStatus::Completed,
            final_message,
        };

        let conversation = self
            .session
            .turns()
            .map(|turn| ConversationRecord {
                job_id: self.job_id,
                sender: turn.sender,
                message: turn.message.clone(),
                timestamp: now,
            })
            .collect();

        let mut agent_outputs = Vec::new();
        if let Some(specification) = self.session.current_specification() {
            agent_outputs.push(AgentOutputRecord {
                job_id: self.job_id,
                agent_name: "meaning".to_string(),
                json_output: serde_json::to_string(specification).unwrap_or_default(),
                timestamp: now,
            });
        }
        agent_outputs.push(AgentOutputRecord {
            job_id: self.job_id,
            agent_name: "researcher".to_string(),
            json_output: serde_json::to_string(&refined).unwrap_or_default(),
            timestamp: now,
        });

        PipelineCompletion { refined, tokens_used, job, conversation, agent_outputs }
    }
}

fn derive_title(user_input: &str) -> String {
    let first_line = user_input.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= 60 {
        return first_line.to_string();
    }
    let truncated: String = first_line.chars().take(60).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::derive_title;

    #[test]
    fn titles_are_first_lines_truncated_on_char_boundaries() {
        assert_eq!(derive_title("Maximize profit\nwith two products"), "Maximize profit");

        let long = "x".repeat(80);
        let title = derive_title(&long);
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 63);
    }
}
