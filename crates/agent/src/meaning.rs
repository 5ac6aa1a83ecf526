use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use optiq_core::heuristics::ScaleCheck;
use optiq_core::{PipelineError, ProblemSpecification, Sender};
use optiq_schemas::{SchemaRegistry, SchemaViolation, PROBLEM_SPECIFICATION};

use crate::invoker::ModelInvoker;
use crate::prompts::{PromptName, PromptStore};
use crate::session::SessionContext;

/// Result of one Meaning turn. The specification is always present and
/// always schema-conformant; failed interpretation shows up as the
/// canonical invalid shape, never as an error.
#[derive(Clone, Debug, PartialEq)]
pub struct MeaningOutcome {
    pub specification: ProblemSpecification,
    pub tokens_used: u32,
}

/// Converts natural-language input into a schema-valid
/// `ProblemSpecification`, one model round-trip per user turn.
pub struct MeaningStage {
    invoker: ModelInvoker,
    system_prompt: String,
    registry: Arc<SchemaRegistry>,
    scale_check: ScaleCheck,
}

impl MeaningStage {
    pub fn new(
        invoker: ModelInvoker,
        prompts: &PromptStore,
        registry: Arc<SchemaRegistry>,
        scale_check: ScaleCheck,
    ) -> Self {
        Self {
            invoker,
            system_prompt: prompts.system_prompt(PromptName::Meaning),
            registry,
            scale_check,
        }
    }

    /// Interpret raw model text for a turn.
    ///
    /// Parse failures and schema violations collapse into the canonical
    /// invalid shape with the detail embedded in `clarification`; the
    /// scale-consistency heuristic then runs against financial-domain
    /// specifications. This function cannot fail.
    pub fn interpret_response(&self, raw_text: &str) -> ProblemSpecification {
        match self.interpret(raw_text) {
            Ok(specification) | Err(specification) => specification,
        }
    }

    /// `Ok` when the reply passed the problem contract (even with
    /// `is_valid_problem == false`), `Err` with the canonical invalid
    /// shape when interpretation itself failed. Only `Ok` turns replace
    /// the session's specification.
    fn interpret(&self, raw_text: &str) -> Result<ProblemSpecification, ProblemSpecification> {
        let value: Value = match serde_json::from_str(raw_text) {
            Ok(value) => value,
            Err(error) => {
                warn!(event_name = "meaning.parse_failed", error = %error, "model reply was not JSON");
                return Err(ProblemSpecification::invalid(format!(
                    "Failed to parse response as JSON: {error}. Please provide a clearer problem description."
                )));
            }
        };

        if let Err(violation) = self.registry.validate(&value, PROBLEM_SPECIFICATION) {
            warn!(event_name = "meaning.schema_rejected", violation = %violation, "model reply failed the problem contract");
            return Err(ProblemSpecification::invalid(format!(
                "Schema validation failed: {}. Please provide a clearer problem description.",
                violation_detail(&violation)
            )));
        }

        let mut specification: ProblemSpecification = match serde_json::from_value(value) {
            Ok(specification) => specification,
            Err(error) => {
                return Err(ProblemSpecification::invalid(format!(
                    "Schema validation failed: {error}. Please provide a clearer problem description."
                )));
            }
        };

        if let Some(warning) = self.scale_check.apply(&mut specification) {
            debug!(
                event_name = "meaning.scale_warning",
                ratio = warning.ratio,
                "scale-consistency heuristic reduced confidence"
            );
        }

        Ok(specification)
    }

    /// Run one full user turn: append the message, rebuild context, invoke
    /// the model, interpret, and on a contract-passing reply replace the
    /// session's specification wholesale. A reply that fails
    /// interpretation becomes this turn's result but leaves the previous
    /// specification in place. Only transport-level failures surface as
    /// errors.
    pub async fn process_turn(
        &self,
        session: &mut SessionContext,
        user_message: &str,
    ) -> Result<MeaningOutcome, PipelineError> {
        session.append_turn(Sender::User, user_message);
        let input = format!("{}{}", session.build_context(), user_message);

        let completion = self.invoker.invoke(&self.system_prompt, &input).await?;
        let specification = match self.interpret(&completion.text) {
            Ok(specification) => {
                session.replace_specification(specification.clone());
                specification
            }
            Err(specification) => specification,
        };
        session.append_turn(Sender::Assistant, specification.clarification.clone());

        debug!(
            event_name = "meaning.turn_completed",
            is_valid_problem = specification.is_valid_problem,
            confidence = specification.confidence,
            tokens_used = completion.tokens_used,
            "meaning turn completed"
        );

        Ok(MeaningOutcome { specification, tokens_used: completion.tokens_used })
    }
}

fn violation_detail(violation: &SchemaViolation) -> String {
    match violation {
        SchemaViolation::UnknownContract(name) => format!("unknown contract `{name}`"),
        SchemaViolation::Invalid(detail) => detail.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use optiq_core::heuristics::ScaleCheck;
    use optiq_core::{PipelineError, ProblemSpecification, ProblemType};
    use optiq_schemas::SchemaRegistry;

    use crate::invoker::ModelInvoker;
    use crate::llm::ScriptedModelClient;
    use crate::prompts::PromptStore;
    use crate::session::SessionContext;

    use super::MeaningStage;

    fn stage_with_replies(replies: Vec<String>) -> MeaningStage {
        let client = Arc::new(ScriptedModelClient::new(replies));
        MeaningStage::new(
            ModelInvoker::new(client, 0.1, 2000),
            &PromptStore::new("prompts"),
            Arc::new(SchemaRegistry::builtin().expect("builtin contracts")),
            ScaleCheck::default(),
        )
    }

    fn lp_reply() -> String {
        serde_json::json!({
            "problem_type": "LP",
            "sense": "maximize",
            "objective": "100*x + 150*y",
            "objective_description": "Maximize total profit",
            "decision_variables": {
                "x": {"type": "Real", "description": "units of product x", "bounds": [0, null]},
                "y": {"type": "Real", "description": "units of product y", "bounds": [0, null]}
            },
            "auxiliary_variables": {},
            "constraints": [
                {"expression": "x + 2*y <= 100", "description": "material limit", "type": "inequality"},
                {"expression": "x + y <= 80", "description": "labor limit", "type": "inequality"}
            ],
            "data": {},
            "is_valid_problem": true,
            "confidence": 0.9,
            "clarification": "Looks like a linear program. Shall we confirm?",
            "business_context": {
                "domain": "Manufacturing",
                "stakeholders": ["production"],
                "constraints": ["capacity"]
            }
        })
        .to_string()
    }

    fn small_talk_reply() -> String {
        serde_json::to_string(&ProblemSpecification::invalid(
            "Hello! Tell me about the decision you want to optimize.",
        ))
        .expect("serialize")
    }

    #[tokio::test]
    async fn linear_program_turn_produces_valid_specification() {
        let stage = stage_with_replies(vec![lp_reply()]);
        let mut session = SessionContext::new(16);

        let outcome = stage
            .process_turn(
                &mut session,
                "Maximize profit: 100*x + 150*y subject to x + 2*y <= 100, x + y <= 80, x >= 0, y >= 0",
            )
            .await
            .expect("turn should succeed");

        let specification = outcome.specification;
        assert!(specification.is_valid_problem);
        assert_eq!(specification.problem_type, ProblemType::Lp);
        assert!(specification.decision_variables.contains_key("x"));
        assert!(specification.decision_variables.contains_key("y"));
        assert!(specification.constraints.len() >= 2);

        // Session saw both the user turn and the assistant reply.
        assert_eq!(session.turn_count(), 2);
        assert_eq!(session.current_specification(), Some(&specification));
    }

    #[tokio::test]
    async fn small_talk_yields_invalid_specification_with_clarification() {
        let stage = stage_with_replies(vec![small_talk_reply()]);
        let mut session = SessionContext::new(16);

        let outcome =
            stage.process_turn(&mut session, "Hi there").await.expect("turn should succeed");

        let specification = outcome.specification;
        assert!(!specification.is_valid_problem);
        assert_eq!(specification.confidence, 0.0);
        assert!(!specification.clarification.is_empty());
        assert!(specification.decision_variables.is_empty());
        assert!(specification.constraints.is_empty());
    }

    #[test]
    fn unparsable_text_degrades_to_the_canonical_invalid_shape() {
        let stage = stage_with_replies(Vec::new());

        let specification = stage.interpret_response("not json at all");
        assert!(!specification.is_valid_problem);
        assert_eq!(specification.confidence, 0.0);
        assert!(specification.clarification.contains("Failed to parse response as JSON"));
    }

    #[test]
    fn schema_violations_embed_the_detail_in_clarification() {
        let stage = stage_with_replies(Vec::new());

        let specification = stage.interpret_response(r#"{"problem_type": "LP"}"#);
        assert!(!specification.is_valid_problem);
        assert_eq!(specification.confidence, 0.0);
        assert!(specification.clarification.contains("Schema validation failed"));
    }

    #[test]
    fn financial_scale_mismatch_reduces_confidence() {
        let stage = stage_with_replies(Vec::new());
        let reply = serde_json::json!({
            "problem_type": "LP",
            "sense": "maximize",
            "objective": "3*x",
            "objective_description": "Maximize return",
            "decision_variables": {
                "x": {"type": "Real", "description": "amount invested", "bounds": [0, null]}
            },
            "auxiliary_variables": {},
            "constraints": [
                {"expression": "x <= 50000", "description": "budget cap", "type": "inequality"}
            ],
            "data": {},
            "is_valid_problem": true,
            "confidence": 0.9,
            "clarification": "Got it.",
            "business_context": {"domain": "Finance", "stakeholders": [], "constraints": []}
        })
        .to_string();

        let specification = stage.interpret_response(&reply);
        assert!((specification.confidence - 0.7).abs() < f64::EPSILON);
        assert!(specification.clarification.contains("unit consistency"));
    }

    #[tokio::test]
    async fn garbage_reply_does_not_clobber_the_previous_specification() {
        let stage = stage_with_replies(vec![lp_reply(), "not json at all".to_string()]);
        let mut session = SessionContext::new(16);

        let first = stage
            .process_turn(&mut session, "maximize 100*x + 150*y")
            .await
            .expect("first turn succeeds");
        assert!(first.specification.is_valid_problem);

        let second = stage
            .process_turn(&mut session, "and x should stay under 40")
            .await
            .expect("second turn still returns a result");
        assert!(!second.specification.is_valid_problem);

        // The session keeps the last contract-passing specification.
        let current = session.current_specification().expect("specification retained");
        assert_eq!(current, &first.specification);
        assert_eq!(session.turn_count(), 4);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_service_unavailable() {
        let stage = stage_with_replies(Vec::new());
        let mut session = SessionContext::new(16);

        let error =
            stage.process_turn(&mut session, "maximize profit").await.err().expect("no replies");
        assert!(matches!(error, PipelineError::ServiceUnavailable(_)));
    }
}
