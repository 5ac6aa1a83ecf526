use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use optiq_core::{
    assess_quality, improvement_suggestions, unwrap_code_fence, PipelineError,
    ProblemSpecification, QualityAssessment, RefinedSpecification,
};
use optiq_schemas::{SchemaRegistry, REFINED_SPECIFICATION};

use crate::invoker::ModelInvoker;
use crate::prompts::{PromptName, PromptStore};

#[derive(Clone, Debug, PartialEq)]
pub struct RefinementOutcome {
    pub refined: RefinedSpecification,
    /// Advisory quality scores for the input specification; never gates
    /// the pipeline.
    pub quality: QualityAssessment,
    pub tokens_used: u32,
}

/// Strengthens an already-valid specification without losing information.
/// The stricter refined contract plus a field-for-field comparison of
/// `original_problem` against the input guarantee nothing is silently
/// dropped.
pub struct RefinementStage {
    invoker: ModelInvoker,
    system_prompt: String,
    registry: Arc<SchemaRegistry>,
}

impl RefinementStage {
    pub fn new(invoker: ModelInvoker, prompts: &PromptStore, registry: Arc<SchemaRegistry>) -> Self {
        Self { invoker, system_prompt: prompts.system_prompt(PromptName::Researcher), registry }
    }

    /// Refine a specification. Preconditions are checked synchronously:
    /// a missing specification or one with `is_valid_problem == false` is
    /// rejected before any model call is made.
    pub async fn refine(
        &self,
        specification: Option<&ProblemSpecification>,
    ) -> Result<RefinementOutcome, PipelineError> {
        let specification = specification.ok_or_else(|| {
            PipelineError::InvalidInput("no specification to refine".to_string())
        })?;

        if !specification.is_valid_problem {
            return Err(PipelineError::InvalidInput(
                "Cannot refine invalid problem from the meaning stage".to_string(),
            ));
        }

        let quality = assess_quality(specification);
        let input = json!({
            "meaning_output": specification,
            "task": "refine_and_improve_optimization_problem",
            "heuristic_suggestions": improvement_suggestions(specification),
        });
        let user_message = serde_json::to_string_pretty(&input)
            .map_err(|error| PipelineError::InvalidInput(error.to_string()))?;

        let completion = self.invoker.invoke(&self.system_prompt, &user_message).await?;
        let refined = self.interpret_response(&completion.text, specification)?;

        debug!(
            event_name = "refinement.completed",
            improvements = refined.improvements.len(),
            missing_data = refined.missing_data.len(),
            completeness = quality.completeness_score,
            tokens_used = completion.tokens_used,
            "refinement completed"
        );

        Ok(RefinementOutcome { refined, quality, tokens_used: completion.tokens_used })
    }

    fn interpret_response(
        &self,
        raw_text: &str,
        input: &ProblemSpecification,
    ) -> Result<RefinedSpecification, PipelineError> {
        let unwrapped = unwrap_code_fence(raw_text);

        let value: Value = serde_json::from_str(unwrapped).map_err(|error| {
            warn!(event_name = "refinement.parse_failed", error = %error, "refined reply was not JSON");
            PipelineError::InvalidModelOutput(format!("refined reply is not valid JSON: {error}"))
        })?;

        self.registry
            .validate(&value, REFINED_SPECIFICATION)
            .map_err(|violation| PipelineError::InvalidModelOutput(violation.to_string()))?;

        let refined: RefinedSpecification = serde_json::from_value(value)
            .map_err(|error| PipelineError::InvalidModelOutput(error.to_string()))?;

        if !refined.preserves_original(input) {
            warn!(
                event_name = "refinement.original_altered",
                "refined reply altered the original problem"
            );
            return Err(PipelineError::InvalidModelOutput(
                "refinement altered the original problem".to_string(),
            ));
        }

        Ok(refined)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use optiq_core::{PipelineError, ProblemSpecification};
    use optiq_schemas::SchemaRegistry;

    use crate::invoker::ModelInvoker;
    use crate::llm::ScriptedModelClient;
    use crate::prompts::PromptStore;

    use super::RefinementStage;

    fn stage_with_replies(replies: Vec<String>) -> RefinementStage {
        let client = Arc::new(ScriptedModelClient::new(replies));
        RefinementStage::new(
            ModelInvoker::new(client, 0.1, 2000),
            &PromptStore::new("prompts"),
            Arc::new(SchemaRegistry::builtin().expect("builtin contracts")),
        )
    }

    fn valid_specification() -> ProblemSpecification {
        let reply = serde_json::json!({
            "problem_type": "LP",
            "sense": "maximize",
            "objective": "3*x + 4*y",
            "objective_description": "Maximize total profit",
            "decision_variables": {
                "x": {"type": "Real", "description": "units of x", "bounds": [0, null]},
                "y": {"type": "Real", "description": "units of y", "bounds": [0, null]}
            },
            "auxiliary_variables": {},
            "constraints": [
                {"expression": "x + y <= 10", "description": "capacity", "type": "inequality"}
            ],
            "data": {},
            "is_valid_problem": true,
            "confidence": 0.9,
            "clarification": "Ready to refine.",
            "business_context": {"domain": "Manufacturing", "stakeholders": [], "constraints": []}
        });
        serde_json::from_value(reply).expect("fixture parses")
    }

    fn refined_reply(original: &ProblemSpecification) -> String {
        let mut refined = original.clone();
        refined.confidence = 0.95;
        let payload = serde_json::json!({
            "original_problem": original,
            "refined_problem": refined,
            "improvements": ["raised confidence after bounds review"],
            "missing_data": ["unit profit for y"],
            "clarification_requests": []
        });
        format!("```json\n{}\n```", payload)
    }

    #[tokio::test]
    async fn refining_none_is_rejected_without_a_model_call() {
        // No scripted replies: any model call would fail loudly as
        // ServiceUnavailable instead of InvalidInput.
        let stage = stage_with_replies(Vec::new());

        let error = stage.refine(None).await.err().expect("none must be rejected");
        assert!(matches!(error, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn refining_an_invalid_problem_is_rejected_synchronously() {
        let stage = stage_with_replies(Vec::new());
        let invalid = ProblemSpecification::invalid("still chatting");

        let error = stage.refine(Some(&invalid)).await.err().expect("invalid must be rejected");
        let message = error.to_string();
        assert!(message.contains("Cannot refine invalid problem"));
    }

    #[tokio::test]
    async fn fenced_reply_is_unwrapped_validated_and_typed() {
        let input = valid_specification();
        let stage = stage_with_replies(vec![refined_reply(&input)]);

        let outcome = stage.refine(Some(&input)).await.expect("refinement should succeed");
        assert_eq!(outcome.refined.original_problem, input);
        assert_eq!(outcome.refined.improvements.len(), 1);
        assert_eq!(outcome.refined.missing_data, vec!["unit profit for y".to_string()]);
        assert!(outcome.refined.refined_problem.confidence > input.confidence);

        // Advisory quality rides along: fixture has bounds everywhere but
        // no data block.
        assert_eq!(outcome.quality.issues, vec!["No data parameters provided".to_string()]);
        assert_eq!(outcome.quality.clarity_score, 0.8);
    }

    #[tokio::test]
    async fn unparsable_reply_is_invalid_model_output() {
        let input = valid_specification();
        let stage = stage_with_replies(vec!["not json at all".to_string()]);

        let error = stage.refine(Some(&input)).await.err().expect("parse failure");
        assert!(matches!(error, PipelineError::InvalidModelOutput(_)));
    }

    #[tokio::test]
    async fn schema_violating_reply_is_invalid_model_output() {
        let input = valid_specification();
        let stage =
            stage_with_replies(vec!["```json\n{\"improvements\": []}\n```".to_string()]);

        let error = stage.refine(Some(&input)).await.err().expect("schema failure");
        assert!(matches!(error, PipelineError::InvalidModelOutput(_)));
    }

    #[tokio::test]
    async fn altered_original_is_rejected() {
        let input = valid_specification();
        let mut tampered = input.clone();
        tampered.objective = "3*x + 5*y".to_string();
        let stage = stage_with_replies(vec![refined_reply(&tampered)]);

        let error = stage.refine(Some(&input)).await.err().expect("altered original");
        let message = error.to_string();
        assert!(message.contains("altered the original problem"));
    }
}
