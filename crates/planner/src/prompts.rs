//! Default prompt templates.
//!
//! Both are ordinary skein templates, so they may reference functions as
//! well as variables.

/// Stepwise planner prompt. Reads `question`, `function_descriptions`,
/// `agent_scratch_pad` and `suffix`.
pub const STEPWISE_PROMPT: &str = r#"[INSTRUCTION]
Answer the question as accurately as possible. You may call the functions listed below, one per response.

[AVAILABLE FUNCTIONS]
Each function is listed as `plugin.name: description`, followed by one line per parameter.

{{$function_descriptions}}
[END AVAILABLE FUNCTIONS]

[RESPONSE FORMAT]
Start with your reasoning after [THOUGHT]. Then do exactly one of:
- Call a function: write [ACTION] followed by a single JSON object, for example
  {"action": "plugin.name", "action_variables": {"input": "some text", "parameter": "value"}}
  Every value in "action_variables" must be a string. Stop after the JSON object. The result comes back to you after [OBSERVATION].
- Answer: write [FINAL ANSWER] followed by the answer.
Only call functions from [AVAILABLE FUNCTIONS].
[END RESPONSE FORMAT]

[QUESTION]
{{$question}}

{{$agent_scratch_pad}}
{{$suffix}}"#;

pub const FIRST_SUFFIX: &str = "Begin! Start with a [THOUGHT].";

pub const CONTINUE_SUFFIX: &str =
    "Continue with a [THOUGHT], then either an [ACTION] or the [FINAL ANSWER].";

/// Markers the completion should stop at.
pub const STOP_SEQUENCES: [&str; 2] = ["[OBSERVATION]", "\n[THOUGHT]"];

/// Action planner prompt. Reads `goal` and `function_list`.
pub const ACTION_PROMPT: &str = r#"[INSTRUCTION]
Pick the one function below that best accomplishes the goal, and the parameters to call it with.
Respond with a JSON object in this shape:
{"plan": {"rationale": "why this function fits", "function": "plugin.name", "parameters": {"input": "..."}}}
If no function fits, set "function" to an empty string.

[AVAILABLE FUNCTIONS]
{{$function_list}}
[END AVAILABLE FUNCTIONS]

[GOAL]
{{$goal}}

[PLAN]
"#;
