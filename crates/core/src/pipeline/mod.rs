pub mod engine;
pub mod states;

pub use engine::{PipelineDefinition, PipelineEngine, SpecificationPipeline, StageTransitionError};
pub use states::{StageAction, StageContext, StageEvent, StageState, TransitionOutcome};
