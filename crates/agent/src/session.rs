use std::collections::VecDeque;

use optiq_core::{ConversationTurn, ProblemSpecification, Sender};

/// Per-session conversational state: the turn history plus the latest
/// agreed-upon specification. Owned by the orchestrator and passed into
/// every stage call; nothing here is ambient or shared across sessions.
#[derive(Clone, Debug)]
pub struct SessionContext {
    turns: VecDeque<ConversationTurn>,
    current_specification: Option<ProblemSpecification>,
    max_turns: usize,
}

impl SessionContext {
    /// `max_turns` is the retention cap: once exceeded, the oldest turns
    /// drop first. The cap is deliberately generous; it bounds memory, it
    /// does not model a context window.
    pub fn new(max_turns: usize) -> Self {
        Self { turns: VecDeque::new(), current_specification: None, max_turns: max_turns.max(1) }
    }

    pub fn append_turn(&mut self, sender: Sender, message: impl Into<String>) {
        self.turns.push_back(ConversationTurn::new(sender, message));
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// Replace the current specification wholesale. Specifications are
    /// single coherent snapshots, never field-by-field merges.
    pub fn replace_specification(&mut self, specification: ProblemSpecification) {
        self.current_specification = Some(specification);
    }

    pub fn current_specification(&self) -> Option<&ProblemSpecification> {
        self.current_specification.as_ref()
    }

    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Clear history and specification together. Used when the user
    /// explicitly starts over.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.current_specification = None;
    }

    /// Deterministic context for the next model call: the numbered turn
    /// history, a summary of the current specification (or an explicit
    /// marker that none exists yet), then the header the new message is
    /// appended under.
    pub fn build_context(&self) -> String {
        let mut lines = vec!["## CONVERSATION HISTORY:".to_string()];
        for (index, turn) in self.turns.iter().enumerate() {
            lines.push(format!("{}. {}: {}", index + 1, turn.sender.label(), turn.message));
        }

        lines.push(String::new());
        lines.push("## CURRENT PROBLEM STATE:".to_string());
        match &self.current_specification {
            Some(specification) => {
                let decision_names: Vec<&str> =
                    specification.decision_variables.keys().map(String::as_str).collect();
                let auxiliary_names: Vec<&str> =
                    specification.auxiliary_variables.keys().map(String::as_str).collect();

                lines.push(format!("- Problem Type: {}", specification.problem_type.as_str()));
                lines.push(format!(
                    "- Objective: {}",
                    if specification.objective.is_empty() {
                        "Not defined"
                    } else {
                        &specification.objective
                    }
                ));
                lines.push(format!("- Decision Variables: [{}]", decision_names.join(", ")));
                lines.push(format!("- Auxiliary Variables: [{}]", auxiliary_names.join(", ")));
                lines.push(format!("- Constraints: {}", specification.constraints.len()));
            }
            None => lines.push("- No problem state yet".to_string()),
        }

        lines.push(String::new());
        lines.push("## CURRENT MESSAGE TO ANALYZE:".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use optiq_core::{ProblemSpecification, Sender};

    use super::SessionContext;

    #[test]
    fn context_marks_missing_problem_state() {
        let mut session = SessionContext::new(16);
        session.append_turn(Sender::User, "Hi there");

        let context = session.build_context();
        assert!(context.contains("1. User: Hi there"));
        assert!(context.contains("- No problem state yet"));
        assert!(context.ends_with("## CURRENT MESSAGE TO ANALYZE:\n"));
    }

    #[test]
    fn context_summarizes_current_specification() {
        let mut session = SessionContext::new(16);
        session.append_turn(Sender::User, "maximize 3x + 4y");

        let mut specification = ProblemSpecification::invalid(String::new());
        specification.objective = "3*x + 4*y".to_string();
        session.replace_specification(specification);

        let context = session.build_context();
        assert!(context.contains("- Problem Type: Unknown"));
        assert!(context.contains("- Objective: 3*x + 4*y"));
        assert!(context.contains("- Decision Variables: []"));
        assert!(context.contains("- Constraints: 0"));
    }

    #[test]
    fn context_is_deterministic_without_intervening_mutation() {
        let mut session = SessionContext::new(16);
        session.append_turn(Sender::User, "minimize cost");
        session.append_turn(Sender::Assistant, "tell me about your variables");

        assert_eq!(session.build_context(), session.build_context());
    }

    #[test]
    fn retention_cap_drops_oldest_turns_first() {
        let mut session = SessionContext::new(3);
        for index in 0..5 {
            session.append_turn(Sender::User, format!("message {index}"));
        }

        assert_eq!(session.turn_count(), 3);
        let context = session.build_context();
        assert!(!context.contains("message 0"));
        assert!(!context.contains("message 1"));
        assert!(context.contains("1. User: message 2"));
        assert!(context.contains("3. User: message 4"));
    }

    #[test]
    fn reset_clears_history_and_specification_together() {
        let mut session = SessionContext::new(16);
        session.append_turn(Sender::User, "maximize profit");
        session.replace_specification(ProblemSpecification::invalid("seed"));

        session.reset();

        assert_eq!(session.turn_count(), 0);
        assert!(session.current_specification().is_none());
    }

    #[test]
    fn specification_is_replaced_wholesale() {
        let mut session = SessionContext::new(16);

        let mut first = ProblemSpecification::invalid("first");
        first.objective = "3*x".to_string();
        session.replace_specification(first);

        let second = ProblemSpecification::invalid("second");
        session.replace_specification(second.clone());

        let current = session.current_specification().expect("specification present");
        assert_eq!(current, &second);
        assert!(current.objective.is_empty());
    }
}
