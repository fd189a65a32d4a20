//! Per-turn driver.
//!
//! [`TurnDriver::run_turn`] is the only place that touches the context
//! controller during a conversation, and it always does so in this order:
//!
//! 1. **Advance**: `step()` once, purging packets whose time is up.
//! 2. **Produce**: add the retrieval packet for this query (if any), and
//!    replace the conversation and audio-state packets with fresh snapshots.
//! 3. **Act**: consult the planner when tools are registered; otherwise, or
//!    when the plan is to respond, assemble `build_messages()`, append the
//!    user utterance, and call the model.
//! 4. **Record**: store the exchange in memory, then add a reflection packet
//!    if one is due. It renders from the next turn on.
//!
//! Because advancing comes first, a packet with ttl `n` added in step 2 or 4
//! is visible for `n` assemblies counting the current one (step 2) or
//! `n - 1` (step 4).

use std::sync::Arc;

use parley_context::ContextController;
use parley_core::messages::{ChatMessage, Role};
use parley_settings::{ContextSettings, ParleySettings, RetrievalSettings};
use tracing::{debug, info, warn};

use crate::audio::AudioController;
use crate::errors::{ProviderError, Result};
use crate::llm::ChatModel;
use crate::memory::ConversationMemory;
use crate::planner::{Plan, Planner};
use crate::reflection::{self, Reflector};
use crate::retrieval::{self, Document, Embedder, build_retrieval_context};
use crate::tools::{Tool, ToolRegistry};

const DIALOGUE_ROLES: [Role; 2] = [Role::User, Role::Assistant];

/// Result of one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Text shown to the user.
    pub reply: String,
    /// Tool that produced the reply, if any.
    pub tool: Option<String>,
    /// Reflection summary generated at the end of the turn, if any.
    pub reflection: Option<String>,
}

/// Owns the context controller and every producer for one conversation.
pub struct TurnDriver {
    model: Arc<dyn ChatModel>,
    embedder: Option<Arc<dyn Embedder>>,
    documents: Vec<Document>,
    tools: ToolRegistry,
    planner: Planner,
    reflector: Reflector,
    controller: ContextController,
    memory: ConversationMemory,
    audio: AudioController,
    policies: ContextSettings,
    retrieval: RetrievalSettings,
    turns: u64,
}

impl TurnDriver {
    /// Driver with no retrieval and no tools.
    pub fn new(model: Arc<dyn ChatModel>, settings: &ParleySettings) -> Self {
        Self {
            model,
            embedder: None,
            documents: Vec::new(),
            tools: ToolRegistry::new(),
            planner: Planner::new([]),
            reflector: Reflector::from_settings(&settings.reflection),
            controller: ContextController::new(),
            memory: ConversationMemory::new(),
            audio: AudioController::new(),
            policies: settings.context.clone(),
            retrieval: settings.retrieval.clone(),
            turns: 0,
        }
    }

    /// Enable retrieval over `documents`.
    #[must_use]
    pub fn with_retrieval(mut self, embedder: Arc<dyn Embedder>, documents: Vec<Document>) -> Self {
        self.embedder = Some(embedder);
        self.documents = documents;
        self
    }

    /// Register a tool and advertise it to the planner.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self.planner = Planner::new(self.tools.descriptions());
        self
    }

    #[must_use]
    /// The live packet set.
    pub fn controller(&self) -> &ContextController {
        &self.controller
    }

    #[must_use]
    /// Dialogue so far.
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    #[must_use]
    /// Audio state machine.
    pub fn audio(&self) -> &AudioController {
        &self.audio
    }

    /// Audio state machine, for speech collaborators.
    pub fn audio_mut(&mut self) -> &mut AudioController {
        &mut self.audio
    }

    /// Turns completed successfully.
    #[must_use]
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Run one full turn for `user_input`.
    ///
    /// Model and tool failures abort the turn and leave the driver exactly as
    /// it was, so retrying the same input ages the context only once.
    /// Retrieval and reflection failures are logged and skipped.
    pub async fn run_turn(&mut self, user_input: &str) -> Result<TurnOutcome> {
        let turn = self.turns + 1;
        let before = self.controller.clone();

        let purged = self.controller.step();
        debug!(turn, purged, "turn started");

        self.produce(user_input).await;

        let (reply, tool) = match self.act(user_input).await {
            Ok(done) => done,
            Err(e) => {
                self.controller = before;
                warn!(turn, error = %e, "turn failed, context restored");
                return Err(e);
            }
        };
        self.turns = turn;

        self.memory.add(Role::User, user_input);
        self.memory.add(Role::Assistant, reply.clone());
        let reflection = self.maybe_reflect().await;

        info!(
            turn,
            tool = tool.as_deref().unwrap_or("-"),
            packets = self.controller.len(),
            "turn complete"
        );
        Ok(TurnOutcome {
            reply,
            tool,
            reflection,
        })
    }

    async fn produce(&mut self, user_input: &str) {
        if let Some(embedder) = &self.embedder {
            let found = build_retrieval_context(
                user_input,
                &self.documents,
                embedder.as_ref(),
                self.retrieval.top_k,
                self.retrieval.score_threshold,
            )
            .await;
            match found {
                Ok(Some(context)) => {
                    self.controller
                        .add(retrieval::to_packet(context, self.policies.retrieval));
                }
                Ok(None) => debug!("no relevant documents"),
                Err(e) => warn!(error = %e, "retrieval failed, continuing without sources"),
            }
        }

        let _ = self
            .controller
            .replace_by_source(self.memory.to_packet(self.policies.conversation));
        let _ = self
            .controller
            .replace_by_source(self.audio.to_packet(self.policies.audio));
    }

    async fn act(&self, user_input: &str) -> Result<(String, Option<String>)> {
        if !self.tools.is_empty() {
            let history = self.memory.messages(Some(&DIALOGUE_ROLES), None);
            let plan = self
                .planner
                .plan(self.model.as_ref(), user_input, &history)
                .await?;
            if let Plan::Tool { name, arguments } = plan {
                if let Some(tool) = self.tools.get(&name) {
                    let result = tool.run(&arguments)?;
                    info!(tool = %name, "tool produced the reply");
                    return Ok((format!("Tool {name} result: {result}"), Some(name)));
                }
                warn!(tool = %name, "planner chose an unregistered tool, responding directly");
            }
        }

        let mut messages = self.controller.build_messages();
        messages.push(ChatMessage::user(user_input));
        let reply = self.model.generate(&messages).await?;
        if reply.trim().is_empty() {
            return Err(ProviderError::EmptyResponse.into());
        }
        Ok((reply, None))
    }

    async fn maybe_reflect(&mut self) -> Option<String> {
        if !self.reflector.is_due(self.memory.len()) {
            return None;
        }
        match self
            .reflector
            .reflect(self.model.as_ref(), &self.memory.get())
            .await
        {
            Ok(Some(summary)) => {
                self.controller
                    .add(reflection::to_packet(summary.clone(), self.policies.reflection));
                Some(summary)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "reflection failed, skipping");
                None
            }
        }
    }
}

impl std::fmt::Debug for TurnDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnDriver")
            .field("model", &self.model.model())
            .field("retrieval", &self.embedder.is_some())
            .field("tools", &self.tools)
            .field("packets", &self.controller.dump())
            .field("turns", &self.turns)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AgentError;
    use crate::llm::testing::ScriptedModel;
    use crate::memory::MEMORY_SOURCE;
    use crate::reflection::REFLECTION_SOURCE;
    use crate::retrieval::testing::TableEmbedder;
    use crate::tools::testing::EchoTool;
    use assert_matches::assert_matches;
    use parley_context::PacketKind;
    use serde_json::json;

    fn quiet_settings() -> ParleySettings {
        let mut settings = ParleySettings::default();
        settings.reflection.interval = 1000;
        settings
    }

    fn driver(replies: Vec<&str>, settings: &ParleySettings) -> (TurnDriver, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel::new(replies));
        let driver = TurnDriver::new(model.clone(), settings);
        (driver, model)
    }

    // -- assembly --

    #[tokio::test]
    async fn first_turn_sends_only_the_utterance() {
        let (mut driver, model) = driver(vec!["hello!"], &quiet_settings());

        let outcome = driver.run_turn("hi").await.unwrap();

        assert_eq!(outcome.reply, "hello!");
        assert_eq!(outcome.tool, None);
        assert_eq!(model.requests(), vec![vec![ChatMessage::user("hi")]]);
        assert_eq!(driver.memory().len(), 2);
    }

    #[tokio::test]
    async fn later_turns_see_history_before_the_utterance() {
        let (mut driver, model) = driver(vec!["a1", "a2"], &quiet_settings());

        let _ = driver.run_turn("q1").await.unwrap();
        let _ = driver.run_turn("q2").await.unwrap();

        assert_eq!(
            model.requests()[1],
            vec![
                ChatMessage::user("q1"),
                ChatMessage::assistant("a1"),
                ChatMessage::user("q2"),
            ]
        );
    }

    #[tokio::test]
    async fn single_instance_packets_never_accumulate() {
        let (mut driver, _model) = driver(vec!["a", "b", "c", "d"], &quiet_settings());
        for input in ["1", "2", "3", "4"] {
            let _ = driver.run_turn(input).await.unwrap();
        }

        let sources: Vec<String> = driver
            .controller()
            .dump()
            .into_iter()
            .map(|s| s.source)
            .collect();
        assert_eq!(sources, vec![MEMORY_SOURCE, "audio"]);
        assert_eq!(driver.turns(), 4);
    }

    // -- retrieval --

    #[tokio::test]
    async fn retrieved_knowledge_renders_first_for_one_turn() {
        let embedder = Arc::new(TableEmbedder::new(&[
            ("ownership?", [1.0, 0.0]),
            ("Rust has ownership", [1.0, 0.2]),
        ]));
        let (driver, model) = driver(vec!["a1", "a2"], &quiet_settings());
        let mut driver =
            driver.with_retrieval(embedder, vec![Document::new("Rust has ownership")]);

        let _ = driver.run_turn("ownership?").await.unwrap();
        let first = &model.requests()[0];
        assert_eq!(first.len(), 2);
        assert!(first[0].is_system());
        assert!(first[0].content.contains("[1] (score: 0.98) Rust has ownership"));

        let _ = driver.run_turn("unrelated").await.unwrap();
        let second = &model.requests()[1];
        assert!(second.iter().all(|m| !m.is_system()));
    }

    #[tokio::test]
    async fn retrieval_failure_is_not_fatal() {
        struct Broken;

        #[async_trait::async_trait]
        impl Embedder for Broken {
            async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Err(AgentError::Embedding("model not loaded".into()))
            }
        }

        let (driver, _model) = driver(vec!["fine"], &quiet_settings());
        let mut driver = driver.with_retrieval(Arc::new(Broken), vec![Document::new("doc")]);

        let outcome = driver.run_turn("q").await.unwrap();
        assert_eq!(outcome.reply, "fine");
    }

    // -- reflection --

    #[tokio::test]
    async fn reflection_is_added_and_rendered_next_turn() {
        let mut settings = ParleySettings::default();
        settings.reflection.interval = 2;
        let (mut driver, model) = driver(vec!["a1", "summary one", "a2"], &settings);

        let outcome = driver.run_turn("q1").await.unwrap();
        assert_eq!(outcome.reflection.as_deref(), Some("summary one"));
        assert!(
            driver
                .controller()
                .dump()
                .iter()
                .any(|s| s.kind == PacketKind::Reflection && s.source == REFLECTION_SOURCE)
        );

        let _ = driver.run_turn("q2").await.unwrap();
        assert_eq!(
            model.requests()[2],
            vec![
                ChatMessage::user("q1"),
                ChatMessage::assistant("a1"),
                ChatMessage::system("summary one"),
                ChatMessage::user("q2"),
            ]
        );
    }

    #[tokio::test]
    async fn reflection_expires_after_its_ttl() {
        let mut settings = ParleySettings::default();
        settings.reflection.interval = 2;
        settings.context.reflection.ttl = 2;
        let (mut driver, model) = driver(vec!["a1", "s1", "a2", "s2", "a3"], &settings);

        // turn 1 reflects, turn 2 renders it and reflects again
        let _ = driver.run_turn("q1").await.unwrap();
        let _ = driver.run_turn("q2").await.unwrap();
        let reflections = driver
            .controller()
            .dump()
            .into_iter()
            .filter(|s| s.kind == PacketKind::Reflection)
            .count();
        assert_eq!(reflections, 2);

        // turn 3: s1 has been stepped twice and is gone, s2 remains
        let _ = driver.run_turn("q3").await.unwrap();
        let requests = model.requests();
        // a1, s1, a2, s2, a3, then the (exhausted) turn-3 reflection
        assert_eq!(requests.len(), 6);
        let third = &requests[4];
        assert_eq!(third.last(), Some(&ChatMessage::user("q3")));
        assert!(third.contains(&ChatMessage::system("s2")));
        assert!(!third.contains(&ChatMessage::system("s1")));
    }

    #[tokio::test]
    async fn reflection_failure_does_not_fail_turn() {
        let mut settings = ParleySettings::default();
        settings.reflection.interval = 2;
        // second request (the reflection) finds the script exhausted
        let (mut driver, _model) = driver(vec!["a1"], &settings);

        let outcome = driver.run_turn("q1").await.unwrap();
        assert_eq!(outcome.reply, "a1");
        assert!(outcome.reflection.is_none());
    }

    // -- tools --

    #[tokio::test]
    async fn planned_tool_replies_without_second_model_call() {
        let plan = r#"{"action": "tool", "tool_name": "echo", "arguments": {"text": "hello"}}"#;
        let (driver, model) = driver(vec![plan], &quiet_settings());
        let mut driver = driver.with_tool(Arc::new(EchoTool));

        let outcome = driver.run_turn("say hello").await.unwrap();

        assert_eq!(outcome.reply, "Tool echo result: hello");
        assert_eq!(outcome.tool.as_deref(), Some("echo"));
        assert_eq!(model.requests().len(), 1);
        assert_eq!(
            driver.memory().get()[1],
            ChatMessage::assistant("Tool echo result: hello")
        );
    }

    #[tokio::test]
    async fn calculator_answers_arithmetic() {
        let plan = r#"{"action": "tool", "tool_name": "calculator", "arguments": {"expression": "(2 + 3) * 4"}}"#;
        let (driver, model) = driver(vec![plan], &quiet_settings());
        let mut driver = driver.with_tool(Arc::new(crate::calculator::CalculatorTool));

        let outcome = driver.run_turn("what is (2+3)*4").await.unwrap();
        assert_eq!(outcome.reply, "Tool calculator result: Result: 20");
        assert_eq!(outcome.tool.as_deref(), Some("calculator"));
        assert!(model.requests()[0][0].content.contains("- calculator: Performs basic arithmetic"));
    }

    #[tokio::test]
    async fn respond_plan_falls_through_to_model() {
        let (driver, model) = driver(vec![r#"{"action": "respond"}"#, "answer"], &quiet_settings());
        let mut driver = driver.with_tool(Arc::new(EchoTool));

        let outcome = driver.run_turn("what is rust").await.unwrap();
        assert_eq!(outcome.reply, "answer");
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn unregistered_tool_falls_through_to_model() {
        let plan = r#"{"action": "tool", "tool_name": "weather"}"#;
        let (driver, _model) = driver(vec![plan, "no weather tool"], &quiet_settings());
        let mut driver = driver.with_tool(Arc::new(EchoTool));

        let outcome = driver.run_turn("weather?").await.unwrap();
        assert_eq!(outcome.reply, "no weather tool");
        assert!(outcome.tool.is_none());
    }

    #[tokio::test]
    async fn tool_failure_aborts_turn_without_recording() {
        let plan = r#"{"action": "tool", "tool_name": "echo", "arguments": {}}"#;
        let (driver, _model) = driver(vec![plan], &quiet_settings());
        let mut driver = driver.with_tool(Arc::new(EchoTool));

        let err = driver.run_turn("echo nothing").await.unwrap_err();
        assert_matches!(err, AgentError::Tool { .. });
        assert!(driver.memory().is_empty());
    }

    // -- failures --

    #[tokio::test]
    async fn model_failure_aborts_turn() {
        let model = Arc::new(ScriptedModel::failing());
        let mut driver = TurnDriver::new(model, &quiet_settings());

        let err = driver.run_turn("hi").await.unwrap_err();
        assert_matches!(err, AgentError::Provider(ProviderError::Request(_)));
        assert!(driver.memory().is_empty());
    }

    #[tokio::test]
    async fn failed_turn_leaves_context_unaged() {
        let mut settings = ParleySettings::default();
        settings.reflection.interval = 2;
        settings.context.reflection.ttl = 3;
        let (mut driver, _model) = driver(vec!["a1", "s1", "  ", "a2"], &settings);
        let reflection_ttl = |driver: &TurnDriver| {
            driver
                .controller()
                .dump()
                .into_iter()
                .find(|s| s.kind == PacketKind::Reflection)
                .map(|s| s.ttl)
        };

        let _ = driver.run_turn("q1").await.unwrap();
        assert_eq!(reflection_ttl(&driver), Some(3));
        let before = driver.controller().dump();

        let err = driver.run_turn("q2").await.unwrap_err();
        assert_matches!(err, AgentError::Provider(ProviderError::EmptyResponse));
        assert_eq!(driver.controller().dump(), before);
        assert_eq!(driver.memory().len(), 2);
        assert_eq!(driver.turns(), 1);

        let retried = driver.run_turn("q2").await.unwrap();
        assert_eq!(retried.reply, "a2");
        assert_eq!(reflection_ttl(&driver), Some(2));
        assert_eq!(driver.turns(), 2);
    }

    #[tokio::test]
    async fn blank_reply_is_an_error() {
        let (mut driver, _model) = driver(vec!["  "], &quiet_settings());
        let err = driver.run_turn("hi").await.unwrap_err();
        assert_matches!(err, AgentError::Provider(ProviderError::EmptyResponse));
    }

    // -- audio --

    #[tokio::test]
    async fn audio_state_is_snapshotted_each_turn() {
        let (mut driver, _model) = driver(vec!["a1", "a2"], &quiet_settings());
        driver.audio_mut().begin_listening().unwrap();
        let _ = driver.run_turn("q1").await.unwrap();

        let state = |driver: &TurnDriver| {
            driver
                .controller()
                .packets()
                .find(|p| p.source() == "audio")
                .and_then(|p| p.metadata())
                .and_then(|m| m.get("state"))
                .cloned()
        };
        assert_eq!(state(&driver), Some(json!("listening")));

        driver.audio_mut().end_listening();
        let _ = driver.run_turn("q2").await.unwrap();
        assert_eq!(state(&driver), Some(json!("idle")));
    }
}
