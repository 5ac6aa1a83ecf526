use crate::domain::problem::ProblemSpecification;

/// Tuning for the scale-consistency heuristic. The threshold and penalty
/// are inherited tuning values, not derived constants; both are
/// configurable for that reason.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleCheckConfig {
    pub ratio_threshold: f64,
    pub confidence_penalty: f64,
    pub financial_domains: Vec<String>,
}

impl Default for ScaleCheckConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 100.0,
            confidence_penalty: 0.2,
            financial_domains: vec![
                "finance".to_string(),
                "cash flow".to_string(),
                "investment".to_string(),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScaleWarning {
    pub min_value: f64,
    pub max_value: f64,
    pub ratio: f64,
}

impl ScaleWarning {
    pub fn message(&self) -> String {
        format!(
            "Potential unit inconsistency detected. Values range from {} to {}",
            self.min_value, self.max_value
        )
    }
}

/// Flags objective/constraint literals spanning more than the configured
/// ratio as a proxy for unit mismatches. False positives are expected; the
/// check only lowers confidence and asks for clarification.
#[derive(Clone, Debug, Default)]
pub struct ScaleCheck {
    config: ScaleCheckConfig,
}

impl ScaleCheck {
    pub fn new(config: ScaleCheckConfig) -> Self {
        Self { config }
    }

    pub fn applies_to_domain(&self, domain: &str) -> bool {
        let normalized = domain.trim().to_ascii_lowercase();
        self.config.financial_domains.iter().any(|keyword| keyword == &normalized)
    }

    /// Compare every numeric literal in the constraints against those in
    /// the objective. Returns a warning when both sides carry literals and
    /// the overall spread exceeds the threshold. Zero literals are excluded
    /// so bound constraints like `x >= 0` cannot blow up the ratio.
    pub fn evaluate(&self, specification: &ProblemSpecification) -> Option<ScaleWarning> {
        let constraint_values: Vec<f64> = specification
            .constraints
            .iter()
            .flat_map(|constraint| extract_numeric_literals(&constraint.expression))
            .collect();
        let objective_values = extract_numeric_literals(&specification.objective);

        if constraint_values.is_empty() || objective_values.is_empty() {
            return None;
        }

        let positive: Vec<f64> = constraint_values
            .iter()
            .chain(objective_values.iter())
            .copied()
            .filter(|value| *value > 0.0)
            .collect();

        let min_value = positive.iter().copied().fold(f64::INFINITY, f64::min);
        let max_value = positive.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min_value.is_finite() || !max_value.is_finite() {
            return None;
        }

        let ratio = max_value / min_value;
        (ratio > self.config.ratio_threshold).then_some(ScaleWarning {
            min_value,
            max_value,
            ratio,
        })
    }

    /// Run the check against a financial-domain specification, appending the
    /// warning to `clarification` and lowering `confidence` by the
    /// configured penalty (floored at zero) when it fires.
    pub fn apply(&self, specification: &mut ProblemSpecification) -> Option<ScaleWarning> {
        if !self.applies_to_domain(&specification.business_context.domain) {
            return None;
        }

        let warning = self.evaluate(specification)?;
        let notice = format!("Please check unit consistency: {}", warning.message());
        if specification.clarification.is_empty() {
            specification.clarification = notice;
        } else {
            specification.clarification =
                format!("{} {notice}", specification.clarification);
        }
        specification.confidence =
            (specification.confidence - self.config.confidence_penalty).max(0.0);

        Some(warning)
    }
}

/// Pull standalone numeric literals out of an expression. Digits embedded
/// in identifiers (`x1`, `cost_2024`) are not literals and are skipped.
pub fn extract_numeric_literals(expression: &str) -> Vec<f64> {
    let mut literals = Vec::new();
    let characters: Vec<char> = expression.chars().collect();
    let mut index = 0;

    while index < characters.len() {
        let character = characters[index];

        if character.is_ascii_alphabetic() || character == '_' {
            // Skip the whole identifier, digits included.
            while index < characters.len()
                && (characters[index].is_ascii_alphanumeric() || characters[index] == '_')
            {
                index += 1;
            }
            continue;
        }

        if character.is_ascii_digit() {
            let start = index;
            let mut seen_dot = false;
            while index < characters.len() {
                let current = characters[index];
                if current.is_ascii_digit() {
                    index += 1;
                } else if current == '.' && !seen_dot {
                    seen_dot = true;
                    index += 1;
                } else {
                    break;
                }
            }
            let token: String = characters[start..index].iter().collect();
            if let Ok(value) = token.trim_end_matches('.').parse::<f64>() {
                literals.push(value);
            }
            continue;
        }

        index += 1;
    }

    literals
}
