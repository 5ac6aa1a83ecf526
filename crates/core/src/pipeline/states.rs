use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageState {
    Meaning,
    Refinement,
    Downstream,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageEvent {
    /// The user explicitly accepted a valid specification. Confidence alone
    /// never advances the pipeline.
    SpecificationConfirmed,
    RefinementSucceeded,
    ResetRequested,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageContext {
    pub specification_valid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageAction {
    InvokeRefinement,
    RecordJobOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: StageState,
    pub to: StageState,
    pub event: StageEvent,
    pub actions: Vec<StageAction>,
}
