use serde::{Deserialize, Serialize};

use crate::domain::problem::ProblemSpecification;

/// Output of the Refinement stage. `original_problem` must equal the
/// specification that was refined, field for field; the refinement gate
/// rejects any output where the original drifted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefinedSpecification {
    pub original_problem: ProblemSpecification,
    pub refined_problem: ProblemSpecification,
    pub improvements: Vec<String>,
    #[serde(default)]
    pub missing_data: Vec<String>,
    #[serde(default)]
    pub clarification_requests: Vec<String>,
}

impl RefinedSpecification {
    /// True when the refinement preserved the original specification
    /// exactly. Compared as canonical JSON values so key ordering in the
    /// model output cannot produce a false mismatch.
    pub fn preserves_original(&self, input: &ProblemSpecification) -> bool {
        let original = serde_json::to_value(&self.original_problem);
        let expected = serde_json::to_value(input);
        matches!((original, expected), (Ok(left), Ok(right)) if left == right)
    }
}

#[cfg(test)]
mod tests {
    use super::RefinedSpecification;
    use crate::domain::problem::ProblemSpecification;

    #[test]
    fn preservation_check_accepts_exact_copy() {
        let input = ProblemSpecification::invalid("seed");
        let refined = RefinedSpecification {
            original_problem: input.clone(),
            refined_problem: input.clone(),
            improvements: vec!["added bounds".to_string()],
            missing_data: Vec::new(),
            clarification_requests: Vec::new(),
        };

        assert!(refined.preserves_original(&input));
    }

    #[test]
    fn preservation_check_rejects_drifted_original() {
        let input = ProblemSpecification::invalid("seed");
        let mut drifted = input.clone();
        drifted.clarification = "rewritten by the model".to_string();

        let refined = RefinedSpecification {
            original_problem: drifted,
            refined_problem: input.clone(),
            improvements: Vec::new(),
            missing_data: Vec::new(),
            clarification_requests: Vec::new(),
        };

        assert!(!refined.preserves_original(&input));
    }
}
