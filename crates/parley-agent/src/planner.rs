//! Tool-use planner.
//!
//! Before answering, the driver can ask the model whether the user's request
//! needs a tool. The model replies with a small JSON object; anything that
//! does not parse falls back to answering directly.

use std::fmt::Write as _;

use parley_core::messages::ChatMessage;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::llm::ChatModel;

/// System prompt describing the plan format. Tool descriptions are appended.
pub const PLANNER_PROMPT: &str = r#"You are a planner for a conversational agent.
Given the user input and conversation history, decide:
1. If the agent should respond directly, set "action": "respond".
2. If a tool should be called, set "action": "tool", and provide "tool_name" and "arguments" as a JSON object.
Return ONLY JSON in the following format:
{
  "action": "respond" | "tool",
  "tool_name": null | string,
  "arguments": {}
}
Be concise and valid in JSON format."#;

/// What to do with the current request.
#[derive(Clone, Debug, PartialEq)]
pub enum Plan {
    /// Answer with the model.
    Respond,
    /// Run a tool.
    Tool {
        /// Registered tool name.
        name: String,
        /// Tool arguments.
        arguments: Map<String, Value>,
    },
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// Parse model output into a [`Plan`].
///
/// Accepts bare JSON or JSON inside a fenced code block. Anything else,
/// including a `tool` action without a name, falls back to [`Plan::Respond`].
pub fn parse_plan(text: &str) -> Plan {
    let body = strip_code_fence(text.trim());
    let raw: RawPlan = match serde_json::from_str(body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "planner output is not valid JSON, responding directly");
            return Plan::Respond;
        }
    };

    match (raw.action.as_deref(), raw.tool_name) {
        (Some("tool"), Some(name)) if !name.is_empty() => Plan::Tool {
            name,
            arguments: raw.arguments.unwrap_or_default(),
        },
        (Some("tool"), _) => {
            warn!("planner chose a tool without naming it, responding directly");
            Plan::Respond
        }
        _ => Plan::Respond,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Model-driven planner.
#[derive(Clone, Debug)]
pub struct Planner {
    system_prompt: String,
}

impl Planner {
    /// Planner that advertises `tools` as `(name, description)` pairs.
    pub fn new<'a>(tools: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut system_prompt = PLANNER_PROMPT.to_owned();
        let mut listed = false;
        for (name, description) in tools {
            if !listed {
                system_prompt.push_str("\nAvailable tools:");
                listed = true;
            }
            let _ = write!(system_prompt, "\n- {name}: {description}");
        }
        Self { system_prompt }
    }

    #[must_use]
    /// Full system prompt sent with every plan request.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Ask `model` for a plan given prior dialogue and the new input.
    pub async fn plan(
        &self,
        model: &dyn ChatModel,
        user_input: &str,
        history: &[ChatMessage],
    ) -> Result<Plan> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(user_input));

        let reply = model.generate(&messages).await?;
        let plan = parse_plan(&reply);
        debug!(?plan, "planner decided");
        Ok(plan)
    }
}
