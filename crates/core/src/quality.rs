use crate::domain::problem::ProblemSpecification;

/// Advisory quality scores for a specification. Nothing here gates the
/// pipeline; the scores feed the refinement conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct QualityAssessment {
    pub completeness_score: f64,
    pub clarity_score: f64,
    pub robustness_score: f64,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Score a specification on completeness, clarity, and robustness.
///
/// Completeness counts one check per decision variable, one per constraint,
/// and one for the data block; each missing piece is an issue. Clarity and
/// robustness are two-level functions of the specification's own confidence
/// and of how much the assessment had to suggest.
pub fn assess_quality(specification: &ProblemSpecification) -> QualityAssessment {
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();

    for (name, variable) in &specification.decision_variables {
        if !variable.has_bounds() {
            issues.push(format!("Variable {name} lacks bounds"));
            suggestions.push(format!("Add reasonable bounds for {name}"));
        }
    }

    for (index, constraint) in specification.constraints.iter().enumerate() {
        if constraint.expression.trim().is_empty() {
            issues.push(format!("Constraint {} lacks mathematical expression", index + 1));
        }
    }

    if specification.data.is_empty() {
        issues.push("No data parameters provided".to_string());
        suggestions.push("Add parameter values for objective and constraints".to_string());
    }

    let total_checks =
        specification.decision_variables.len() + specification.constraints.len() + 1;
    let completeness_score = (1.0 - issues.len() as f64 / total_checks as f64).max(0.0);
    let clarity_score = if specification.confidence > 0.7 { 0.8 } else { 0.5 };
    let robustness_score = if suggestions.len() < 3 { 0.7 } else { 0.4 };

    QualityAssessment {
        completeness_score,
        clarity_score,
        robustness_score,
        issues,
        suggestions,
    }
}

/// Concrete improvement suggestions for the refinement prompt: bounds,
/// missing data, a linearization hint for heavily multiplicative
/// objectives, and a division-by-zero warning for suspicious constraints.
pub fn improvement_suggestions(specification: &ProblemSpecification) -> Vec<String> {
    let mut suggestions = Vec::new();

    for (name, variable) in &specification.decision_variables {
        if !variable.has_bounds() {
            suggestions
                .push(format!("Add bounds for variable {name} to ensure numerical stability"));
        }
    }

    if specification.data.is_empty() {
        suggestions
            .push("Provide parameter values for objective and constraint coefficients".to_string());
    }

    if specification.objective.matches('*').count() > 2 {
        suggestions
            .push("Consider using auxiliary variables to linearize complex objective".to_string());
    }

    for (index, constraint) in specification.constraints.iter().enumerate() {
        if constraint.expression.contains('/') && constraint.expression.contains('0') {
            suggestions
                .push(format!("Check constraint {} for potential division by zero", index + 1));
        }
    }

    if suggestions.is_empty() {
        suggestions.push("Problem structure looks good for mathematical modeling".to_string());
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::{assess_quality, improvement_suggestions};
    use crate::domain::problem::{
        Constraint, ConstraintType, DecisionVariable, ProblemSpecification, VariableType,
    };

    fn variable(bounds: Vec<Option<f64>>) -> DecisionVariable {
        DecisionVariable {
            variable_type: VariableType::Real,
            description: "quantity".to_string(),
            bounds,
        }
    }

    fn constraint(expression: &str) -> Constraint {
        Constraint {
            expression: expression.to_string(),
            description: "limit".to_string(),
            constraint_type: ConstraintType::Inequality,
        }
    }

    fn specification() -> ProblemSpecification {
        let mut spec = ProblemSpecification::invalid(String::new());
        spec.is_valid_problem = true;
        spec.confidence = 0.9;
        spec.objective = "3*x + 4*y".to_string();
        spec.decision_variables.insert("x".to_string(), variable(vec![Some(0.0), None]));
        spec.decision_variables.insert("y".to_string(), variable(vec![Some(0.0), Some(10.0)]));
        spec.constraints.push(constraint("x + y <= 10"));
        spec.data.insert("capacity".to_string(), serde_json::json!(10));
        spec
    }

    #[test]
    fn complete_specification_scores_clean() {
        let assessment = assess_quality(&specification());

        assert!(assessment.issues.is_empty());
        assert_eq!(assessment.completeness_score, 1.0);
        assert_eq!(assessment.clarity_score, 0.8);
        assert_eq!(assessment.robustness_score, 0.7);
    }

    #[test]
    fn missing_bounds_and_data_accumulate_issues() {
        let mut spec = specification();
        spec.decision_variables.insert("z".to_string(), variable(Vec::new()));
        spec.data.clear();
        spec.confidence = 0.5;

        let assessment = assess_quality(&spec);

        // 5 checks: three variables, one constraint, one data block.
        assert_eq!(assessment.issues.len(), 2);
        assert!((assessment.completeness_score - 0.6).abs() < 1e-9);
        assert_eq!(assessment.clarity_score, 0.5);
        assert!(assessment.suggestions.iter().any(|s| s.contains("bounds for z")));
    }

    #[test]
    fn empty_constraint_expression_is_flagged() {
        let mut spec = specification();
        spec.constraints.push(constraint("  "));

        let assessment = assess_quality(&spec);
        assert!(assessment
            .issues
            .iter()
            .any(|issue| issue.contains("Constraint 2 lacks mathematical expression")));
    }

    #[test]
    fn suggestions_cover_linearization_and_division() {
        let mut spec = specification();
        spec.objective = "a*b*c*d".to_string();
        spec.constraints.push(constraint("x / (y - 10) <= 5"));

        let suggestions = improvement_suggestions(&spec);
        assert!(suggestions.iter().any(|s| s.contains("linearize")));
        assert!(suggestions.iter().any(|s| s.contains("division by zero")));
    }

    #[test]
    fn clean_specification_gets_the_default_suggestion() {
        let suggestions = improvement_suggestions(&specification());
        assert_eq!(
            suggestions,
            vec!["Problem structure looks good for mathematical modeling".to_string()]
        );
    }
}
