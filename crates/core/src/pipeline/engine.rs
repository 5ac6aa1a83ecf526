use thiserror::Error;

use crate::pipeline::states::{
    StageAction, StageContext, StageEvent, StageState, TransitionOutcome,
};

pub trait PipelineDefinition {
    fn initial_state(&self) -> StageState;
    fn transition(
        &self,
        current: &StageState,
        event: &StageEvent,
        context: &StageContext,
    ) -> Result<TransitionOutcome, StageTransitionError>;
}

/// Meaning → Refinement → Downstream, each gate explicit. Refinement only
/// starts on a confirmed valid specification; Downstream only on refinement
/// success; reset is legal from anywhere.
#[derive(Clone, Debug, Default)]
pub struct SpecificationPipeline;

impl PipelineDefinition for SpecificationPipeline {
    fn initial_state(&self) -> StageState {
        StageState::Meaning
    }

    fn transition(
        &self,
        current: &StageState,
        event: &StageEvent,
        context: &StageContext,
    ) -> Result<TransitionOutcome, StageTransitionError> {
        transition_specification(current, event, context)
    }
}

pub struct PipelineEngine<P> {
    definition: P,
}

impl<P> PipelineEngine<P>
where
    P: PipelineDefinition,
{
    pub fn new(definition: P) -> Self {
        Self { definition }
    }

    pub fn initial_state(&self) -> StageState {
        self.definition.initial_state()
    }

    pub fn apply(
        &self,
        current: &StageState,
        event: &StageEvent,
        context: &StageContext,
    ) -> Result<TransitionOutcome, StageTransitionError> {
        self.definition.transition(current, event, context)
    }
}

impl Default for PipelineEngine<SpecificationPipeline> {
    fn default() -> Self {
        Self::new(SpecificationPipeline)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageTransitionError {
    #[error("cannot confirm from {state:?}: current specification is not a valid problem")]
    UnconfirmedSpecification { state: StageState },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: StageState, event: StageEvent },
}

fn transition_specification(
    current: &StageState,
    event: &StageEvent,
    context: &StageContext,
) -> Result<TransitionOutcome, StageTransitionError> {
    use StageAction::{InvokeRefinement, RecordJobOutcome};
    use StageEvent::{RefinementSucceeded, ResetRequested, SpecificationConfirmed};
    use StageState::{Downstream, Meaning, Refinement};

    let (to, actions) = match (current, event) {
        (Meaning, SpecificationConfirmed) => {
            if !context.specification_valid {
                return Err(StageTransitionError::UnconfirmedSpecification {
                    state: current.clone(),
                });
            }
            (Refinement, vec![InvokeRefinement])
        }
        (Refinement, RefinementSucceeded) => (Downstream, vec![RecordJobOutcome]),
        (_, ResetRequested) => (Meaning, Vec::new()),
        _ => {
            return Err(StageTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::pipeline::engine::{PipelineEngine, StageTransitionError};
    use crate::pipeline::states::{StageAction, StageContext, StageEvent, StageState};

    fn valid_context() -> StageContext {
        StageContext { specification_valid: true }
    }

    #[test]
    fn happy_path_reaches_downstream() {
        let engine = PipelineEngine::default();
        let mut state = engine.initial_state();
        assert_eq!(state, StageState::Meaning);

        let confirmed = engine
            .apply(&state, &StageEvent::SpecificationConfirmed, &valid_context())
            .expect("meaning -> refinement");
        assert_eq!(confirmed.to, StageState::Refinement);
        assert_eq!(confirmed.actions, vec![StageAction::InvokeRefinement]);

        state = confirmed.to;
        let finished = engine
            .apply(&state, &StageEvent::RefinementSucceeded, &valid_context())
            .expect("refinement -> downstream");
        assert_eq!(finished.to, StageState::Downstream);
        assert!(finished.actions.contains(&StageAction::RecordJobOutcome));
    }

    #[test]
    fn confirmation_requires_valid_specification() {
        let engine = PipelineEngine::default();
        let error = engine
            .apply(
                &StageState::Meaning,
                &StageEvent::SpecificationConfirmed,
                &StageContext::default(),
            )
            .expect_err("invalid specification must not advance");

        assert!(matches!(error, StageTransitionError::UnconfirmedSpecification { .. }));
    }

    #[test]
    fn pipeline_never_advances_backwards_without_reset() {
        let engine = PipelineEngine::default();

        let error = engine
            .apply(&StageState::Refinement, &StageEvent::SpecificationConfirmed, &valid_context())
            .expect_err("refinement cannot re-confirm");
        assert!(matches!(
            error,
            StageTransitionError::InvalidTransition { state: StageState::Refinement, .. }
        ));

        let error = engine
            .apply(&StageState::Meaning, &StageEvent::RefinementSucceeded, &valid_context())
            .expect_err("meaning cannot skip refinement");
        assert!(matches!(error, StageTransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn reset_returns_to_meaning_from_any_state() {
        let engine = PipelineEngine::default();

        for state in [StageState::Meaning, StageState::Refinement, StageState::Downstream] {
            let outcome = engine
                .apply(&state, &StageEvent::ResetRequested, &StageContext::default())
                .expect("reset is always legal");
            assert_eq!(outcome.to, StageState::Meaning);
            assert!(outcome.actions.is_empty());
        }
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = PipelineEngine::default();
        let events = [StageEvent::SpecificationConfirmed, StageEvent::RefinementSucceeded];

        let run = || {
            let mut state = engine.initial_state();
            let mut actions = Vec::new();
            for event in &events {
                let outcome =
                    engine.apply(&state, event, &valid_context()).expect("deterministic run");
                actions.push(outcome.actions);
                state = outcome.to;
            }
            (state, actions)
        };

        assert_eq!(run(), run());
    }
}
