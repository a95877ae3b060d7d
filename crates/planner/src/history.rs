//! Scratchpad: the planner's Thought/Action/Observation history for one run.
//!
//! History only grows. Budget trimming happens on the rendered window
//! ([`ScratchPad::render_window`]), never on the recorded steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const THOUGHT_MARKER: &str = "[THOUGHT]";
pub const ACTION_MARKER: &str = "[ACTION]";
pub const OBSERVATION_MARKER: &str = "[OBSERVATION]";
pub const FINAL_ANSWER_MARKER: &str = "[FINAL ANSWER]";

// ── Data Structures ───────────────────────────────────────────────────────

/// One recorded planner step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerStep {
    pub thought: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub action_variables: serde_json::Map<String, serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,

    pub timestamp: DateTime<Utc>,
}

/// Ordered planner history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScratchPad {
    steps: Vec<PlannerStep>,
}

// ── Implementation ────────────────────────────────────────────────────────

impl PlannerStep {
    pub fn action(
        thought: impl Into<String>,
        action: impl Into<String>,
        action_variables: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            thought: thought.into(),
            action: Some(action.into()),
            action_variables,
            observation: None,
            final_answer: None,
            timestamp: Utc::now(),
        }
    }

    pub fn final_answer(thought: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: None,
            action_variables: serde_json::Map::new(),
            observation: None,
            final_answer: Some(answer.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }

    /// Render in the same marker format the model is asked to produce.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.thought.is_empty() {
            out.push_str(THOUGHT_MARKER);
            out.push('\n');
            out.push_str(&self.thought);
            out.push('\n');
        }
        if let Some(action) = &self.action {
            let blob = serde_json::json!({
                "action": action,
                "action_variables": self.action_variables,
            });
            out.push_str(ACTION_MARKER);
            out.push('\n');
            out.push_str(&blob.to_string());
            out.push('\n');
        }
        if let Some(observation) = &self.observation {
            out.push_str(OBSERVATION_MARKER);
            out.push('\n');
            out.push_str(observation);
            out.push('\n');
        }
        if let Some(answer) = &self.final_answer {
            out.push_str(FINAL_ANSWER_MARKER);
            out.push('\n');
            out.push_str(answer);
            out.push('\n');
        }
        out
    }
}

impl ScratchPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: PlannerStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[PlannerStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render every step except the oldest `skip`.
    pub fn render_window(&self, skip: usize) -> String {
        self.steps
            .iter()
            .skip(skip)
            .map(PlannerStep::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The full rendered history.
    pub fn transcript(&self) -> String {
        self.render_window(0)
    }

    pub fn into_steps(self) -> Vec<PlannerStep> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(json: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn renders_action_step_in_marker_format() {
        let step = PlannerStep::action(
            "I should add",
            "math.add",
            vars(serde_json::json!({"input": "1", "amount": "2"})),
        )
        .with_observation("3");

        assert_eq!(
            step.render(),
            "[THOUGHT]\nI should add\n[ACTION]\n{\"action\":\"math.add\",\"action_variables\":{\"amount\":\"2\",\"input\":\"1\"}}\n[OBSERVATION]\n3\n"
        );
    }

    #[test]
    fn empty_thought_is_omitted() {
        let step = PlannerStep::final_answer("", "42");
        assert_eq!(step.render(), "[FINAL ANSWER]\n42\n");
    }

    #[test]
    fn window_drops_oldest_steps_only() {
        let mut pad = ScratchPad::new();
        for i in 0..3 {
            pad.push(
                PlannerStep::action(format!("t{i}"), "f", serde_json::Map::new())
                    .with_observation(format!("o{i}")),
            );
        }
        let window = pad.render_window(2);
        assert!(window.contains("t2"));
        assert!(!window.contains("t0") && !window.contains("t1"));
        assert!(pad.render_window(3).is_empty());
        assert_eq!(pad.len(), 3);
        assert!(pad.transcript().starts_with("[THOUGHT]\nt0"));
    }
}
