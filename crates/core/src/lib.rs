pub mod config;
pub mod domain;
pub mod errors;
pub mod fence;
pub mod heuristics;
pub mod pipeline;
pub mod quality;

pub use domain::job::{AgentOutputRecord, ConversationRecord, JobRecord, JobStatus};
pub use domain::problem::{
    AuxiliaryVariable, BusinessContext, Constraint, ConstraintType, DecisionVariable,
    ProblemSpecification, ProblemType, Sense, VariableType,
};
pub use domain::refined::RefinedSpecification;
pub use domain::turn::{ConversationTurn, Sender};
pub use errors::PipelineError;
pub use fence::unwrap_code_fence;
pub use heuristics::{ScaleCheck, ScaleCheckConfig, ScaleWarning};
pub use pipeline::engine::{PipelineEngine, SpecificationPipeline, StageTransitionError};
pub use pipeline::states::{StageAction, StageContext, StageEvent, StageState, TransitionOutcome};
pub use quality::{assess_quality, improvement_suggestions, QualityAssessment};
