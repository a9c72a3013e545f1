//! The decision cycle.
//!
//! One complete iteration: observe → assess → plan → decide → reflect →
//! persist, then a quiescence delay before the next. At most one cycle
//! is ever in flight; errors inside a cycle move the machine to the
//! error state and the loop retries after a longer delay.

use crate::planner::TaskPlanner;
use crate::state::StateMachine;
use crate::strategy::Strategy;
use clawcraft_core::bot::BotClient;
use clawcraft_core::error::{Error, PerceptionError};
use clawcraft_core::goal::Goal;
use clawcraft_core::message::ChatMessage;
use clawcraft_core::provider::{ChatOptions, LlmBridge};
use clawcraft_core::state::BotState;
use clawcraft_core::storage::Storage;
use clawcraft_core::tool::Dispatcher;
use clawcraft_memory::{AgentMemory, ContextOptions};
use clawcraft_perception::{InventoryTracker, WorldPerceiver};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Timing and sampling knobs for the loop.
#[derive(Clone)]
pub struct RunnerConfig {
    /// Quiescence delay between successful cycles.
    pub cycle_delay: Duration,
    /// Backoff after a failed cycle.
    pub error_delay: Duration,
    pub chat_options: ChatOptions,
    pub context_options: ContextOptions,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cycle_delay: Duration::from_secs(2),
            error_delay: Duration::from_secs(5),
            chat_options: ChatOptions::default(),
            context_options: ContextOptions::default(),
        }
    }
}

/// What one cycle invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    /// Ran the full pipeline.
    Completed,
    /// Bot not spawned yet; try again next tick.
    Waiting,
    /// Another cycle was already in flight.
    Skipped,
}

/// Counters surfaced for observability.
#[derive(Debug, Clone)]
pub struct RunnerStats {
    pub cycles_completed: u64,
    pub tools_executed: u64,
    pub state: BotState,
}

/// The agent loop: owns memory, the state machine, and the cadence of
/// decision cycles.
pub struct AgentRunner {
    client: Arc<dyn BotClient>,
    perceiver: Arc<WorldPerceiver>,
    tracker: Arc<InventoryTracker>,
    memory: Mutex<AgentMemory>,
    machine: std::sync::Mutex<StateMachine>,
    bridge: Arc<dyn LlmBridge>,
    dispatcher: Arc<Dispatcher>,
    storage: Arc<dyn Storage>,
    strategy: Box<dyn Strategy>,
    planner: std::sync::Mutex<TaskPlanner>,
    config: RunnerConfig,
    running: AtomicBool,
    is_processing: AtomicBool,
    cycles_completed: AtomicU64,
    tools_executed: AtomicU64,
}

/// Map a tool to the activity state it drives the bot into.
fn activity_for_tool(tool_name: &str) -> Option<BotState> {
    match tool_name {
        "mine_block" => Some(BotState::Mining),
        "craft_item" => Some(BotState::Crafting),
        "goto_location" => Some(BotState::Navigating),
        "eat_food" => Some(BotState::Eating),
        _ => None,
    }
}

impl AgentRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn BotClient>,
        perceiver: Arc<WorldPerceiver>,
        tracker: Arc<InventoryTracker>,
        memory: AgentMemory,
        bridge: Arc<dyn LlmBridge>,
        dispatcher: Arc<Dispatcher>,
        storage: Arc<dyn Storage>,
        strategy: Box<dyn Strategy>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            client,
            perceiver,
            tracker,
            memory: Mutex::new(memory),
            machine: std::sync::Mutex::new(StateMachine::new()),
            bridge,
            dispatcher,
            storage,
            strategy,
            planner: std::sync::Mutex::new(TaskPlanner::new()),
            config,
            running: AtomicBool::new(false),
            is_processing: AtomicBool::new(false),
            cycles_completed: AtomicU64::new(0),
            tools_executed: AtomicU64::new(0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            tools_executed: self.tools_executed.load(Ordering::SeqCst),
            state: self.machine.lock().unwrap().current(),
        }
    }

    pub fn current_state(&self) -> BotState {
        self.machine.lock().unwrap().current()
    }

    /// Run the decision loop until `stop()` is called. Starting twice is
    /// a warning, not a second loop.
    pub async fn run(self: Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Agent loop already running, ignoring start");
            return;
        }

        info!(strategy = %self.strategy.name(), bridge = %self.bridge.name(), "Agent loop starting");
        self.perceiver.start_observing();
        self.tracker.start();

        // Surface previously recorded goals to the context builder.
        match self.storage.pending_goals().await {
            Ok(goals) if !goals.is_empty() => {
                info!(count = goals.len(), "Loaded pending goals");
                self.memory.lock().await.set_active_goals(goals);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not load pending goals"),
        }

        while self.running.load(Ordering::SeqCst) {
            match self.run_cycle().await {
                Ok(report) => {
                    debug!(?report, "Cycle finished");
                    tokio::time::sleep(self.config.cycle_delay).await;
                }
                Err(e) => {
                    error!(error = %e, "Decision cycle failed");
                    self.machine
                        .lock()
                        .unwrap()
                        .transition_to_error(&e.to_string());
                    tokio::time::sleep(self.config.error_delay).await;
                }
            }
        }

        info!("Agent loop stopped");
    }

    /// Cooperative stop: the in-flight cycle completes naturally; no new
    /// cycle is scheduled; the perception timer is cancelled now.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.perceiver.stop_observing();
        self.tracker.stop();

        let mut machine = self.machine.lock().unwrap();
        if machine.current() != BotState::Idle {
            if let Err(e) = machine.transition(BotState::Idle, Some("stopped")) {
                // Busy states all allow idle; error requires the reset arc.
                warn!(error = %e, "Forcing reset to idle on stop");
                machine.reset();
            }
        }
    }

    /// One observe → assess → plan → decide → reflect → persist pass.
    pub async fn run_cycle(&self) -> Result<CycleReport, Error> {
        if self.is_processing.swap(true, Ordering::SeqCst) {
            debug!("Cycle already in flight, skipping");
            return Ok(CycleReport::Skipped);
        }

        let result = self.cycle_body().await;
        self.is_processing.store(false, Ordering::SeqCst);

        if matches!(result, Ok(CycleReport::Completed)) {
            self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn cycle_body(&self) -> Result<CycleReport, Error> {
        // ── 1. Observe ──
        let snapshot = match self.perceiver.observe() {
            Ok(snapshot) => snapshot,
            Err(PerceptionError::BotNotSpawned) => {
                debug!("Bot not spawned yet, waiting");
                return Ok(CycleReport::Waiting);
            }
            Err(e) => return Err(e.into()),
        };
        self.tracker.refresh();

        {
            let mut memory = self.memory.lock().await;
            memory.set_world_state(&snapshot);
        }
        self.storage
            .insert_world_state(
                snapshot.position,
                snapshot.health,
                snapshot.food,
                &snapshot.dimension,
            )
            .await?;

        // ── 2. Assess ──
        let inventory = self.tracker.counts();
        let decision = self
            .strategy
            .decide(&inventory, snapshot.health, snapshot.food);
        let readiness = self.strategy.readiness(&inventory);
        let tips = self.strategy.tips(decision.phase);

        // ── 3. Plan ──
        {
            let mut machine = self.machine.lock().unwrap();
            if let Err(e) = machine.transition(BotState::Planning, Some("decision cycle")) {
                warn!(error = %e, "Could not enter planning, continuing");
            }
        }

        let mut situation = format!(
            "Phase: {} ({}% of the run complete)\nRecommended: {} — {}\nEstimated {}s; risks: {}",
            decision.phase.as_str(),
            decision.phase.progress_percent(),
            decision.action,
            decision.rationale,
            decision.estimated_secs,
            if decision.risks.is_empty() {
                "none".to_string()
            } else {
                decision.risks.join(", ")
            },
        );
        if readiness.ready {
            situation.push_str("\nReady to advance to the next phase.");
        } else {
            situation.push_str(&format!(
                "\nMissing for next phase: {}",
                readiness.missing.join(", ")
            ));
        }
        if !tips.is_empty() {
            situation.push_str(&format!("\nTips: {}", tips.join("; ")));
        }
        if let Some(task) = self.planner.lock().unwrap().next_executable_task() {
            situation.push_str(&format!(
                "\nNext queued task: {} (action {})",
                task.description, task.action
            ));
        }

        let context = {
            let mut memory = self.memory.lock().await;
            memory.add_message(ChatMessage::user(situation));
            memory.build_context(self.config.context_options)
        };

        // ── 4. Decide ──
        let outcome = self
            .bridge
            .chat_with_tools(&context, &self.dispatcher, &self.config.chat_options)
            .await?;

        self.tools_executed
            .fetch_add(outcome.executed.len() as u64, Ordering::SeqCst);

        {
            let mut memory = self.memory.lock().await;
            if let Some(usage) = outcome.usage {
                memory.update_token_usage(usage);
            }
            if !outcome.content.is_empty() {
                memory.add_message(ChatMessage::assistant(outcome.content.clone()));
            }
        }

        // ── 5. Reflect on executed tools ──
        {
            let mut machine = self.machine.lock().unwrap();
            if let Some(last) = outcome.last_executed() {
                if let Some(activity) = activity_for_tool(&last.call.name) {
                    if let Err(e) = machine.transition(activity, Some(&last.call.name)) {
                        warn!(error = %e, "Reflect transition rejected");
                    }
                }
            }
            if let Err(e) = machine.return_to_idle() {
                warn!(error = %e, "Could not return to idle");
            }
        }

        // ── 6. Persist ──
        self.memory
            .lock()
            .await
            .flush_to_storage(self.storage.as_ref())
            .await?;

        Ok(CycleReport::Completed)
    }

    /// Record a goal durably and break it into an executable task chain.
    pub async fn adopt_goal(&self, goal: Goal) -> Result<Vec<String>, Error> {
        self.storage.insert_goal(&goal).await?;
        let task_ids = self.planner.lock().unwrap().decompose_goal(&goal);
        info!(goal = %goal.description, tasks = task_ids.len(), "Adopted goal");

        let mut memory = self.memory.lock().await;
        let mut goals = self.storage.pending_goals().await.unwrap_or_default();
        if goals.is_empty() {
            goals.push(goal);
        }
        memory.set_active_goals(goals);
        Ok(task_ids)
    }

    /// Inspect or advance the task DAG.
    pub fn with_planner<R>(&self, f: impl FnOnce(&mut TaskPlanner) -> R) -> R {
        let mut planner = self.planner.lock().unwrap();
        f(&mut planner)
    }

    /// The shared client handle (handy for wiring and tests).
    pub fn client(&self) -> &Arc<dyn BotClient> {
        &self.client
    }

    /// Peek at memory (tests and status surfaces).
    pub async fn with_memory<R>(&self, f: impl FnOnce(&AgentMemory) -> R) -> R {
        let memory = self.memory.lock().await;
        f(&memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SpeedrunStrategy;
    use async_trait::async_trait;
    use clawcraft_client::SimClient;
    use clawcraft_core::error::LlmError;
    use clawcraft_core::message::TokenUsage;
    use clawcraft_core::provider::{ChatOutcome, ExecutedTool};
    use clawcraft_core::snapshot::Position;
    use clawcraft_core::tool::{ToolCall, ToolContext};
    use clawcraft_perception::ScanPolicy;
    use clawcraft_store::SqliteStore;
    use serde_json::json;
    use std::collections::VecDeque;

    /// A bridge that replays scripted tool calls through the real
    /// dispatcher, once per exchange.
    struct ScriptedBridge {
        script: std::sync::Mutex<VecDeque<(String, Vec<ToolCall>)>>,
    }

    impl ScriptedBridge {
        fn new(steps: Vec<(&str, Vec<ToolCall>)>) -> Self {
            Self {
                script: std::sync::Mutex::new(
                    steps
                        .into_iter()
                        .map(|(content, calls)| (content.to_string(), calls))
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl LlmBridge for ScriptedBridge {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<ChatOutcome, LlmError> {
            Ok(ChatOutcome::default())
        }

        async fn stream_chat(
            &self,
            _messages: &[ChatMessage],
            _options: &ChatOptions,
        ) -> Result<tokio::sync::mpsc::Receiver<Result<String, LlmError>>, LlmError> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }

        async fn chat_with_tools(
            &self,
            _messages: &[ChatMessage],
            dispatcher: &Dispatcher,
            _options: &ChatOptions,
        ) -> Result<ChatOutcome, LlmError> {
            let step = self.script.lock().unwrap().pop_front();
            let Some((content, calls)) = step else {
                return Ok(ChatOutcome::default());
            };

            let mut executed = Vec::new();
            for call in calls {
                let outcome = dispatcher.execute(&call).await;
                executed.push(ExecutedTool { call, outcome });
            }
            Ok(ChatOutcome {
                content,
                executed,
                usage: Some(TokenUsage {
                    prompt_tokens: 50,
                    completion_tokens: 20,
                    total_tokens: 70,
                }),
            })
        }
    }

    struct FailingBridge;

    #[async_trait]
    impl LlmBridge for FailingBridge {
        fn name(&self) -> &str {
            "failing"
        }

        async fn chat(
            &self,
            _m: &[ChatMessage],
            _o: &ChatOptions,
        ) -> Result<ChatOutcome, LlmError> {
            Err(LlmError::Network("connection refused".into()))
        }

        async fn stream_chat(
            &self,
            _m: &[ChatMessage],
            _o: &ChatOptions,
        ) -> Result<tokio::sync::mpsc::Receiver<Result<String, LlmError>>, LlmError> {
            Err(LlmError::Network("connection refused".into()))
        }

        async fn chat_with_tools(
            &self,
            _m: &[ChatMessage],
            _d: &Dispatcher,
            _o: &ChatOptions,
        ) -> Result<ChatOutcome, LlmError> {
            Err(LlmError::Network("connection refused".into()))
        }
    }

    fn pave(client: &SimClient) {
        for dx in -4..=4 {
            for dz in -4..=4 {
                client.place_block("stone", Position::new(dx as f64, 63.0, dz as f64));
            }
        }
    }

    async fn runner_with_bridge(
        client: Arc<SimClient>,
        bridge: Arc<dyn LlmBridge>,
    ) -> Arc<AgentRunner> {
        let perceiver = Arc::new(WorldPerceiver::new(
            client.clone(),
            ScanPolicy {
                interval: Duration::from_millis(50),
                ..ScanPolicy::default()
            },
        ));
        let tracker = Arc::new(InventoryTracker::new(client.clone() as Arc<dyn BotClient>));
        let storage: Arc<dyn Storage> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
        let dispatcher = Arc::new(Dispatcher::new(
            clawcraft_tools::default_registry(),
            ToolContext::new(client.clone()),
        ));

        Arc::new(AgentRunner::new(
            client,
            perceiver,
            tracker,
            AgentMemory::new(8000, 20),
            bridge,
            dispatcher,
            storage.clone(),
            Box::new(SpeedrunStrategy),
            RunnerConfig {
                cycle_delay: Duration::from_millis(10),
                error_delay: Duration::from_millis(10),
                ..RunnerConfig::default()
            },
        ))
    }

    #[tokio::test]
    async fn cycle_runs_full_pipeline() {
        let client = Arc::new(SimClient::demo_world());
        pave(&client);

        let bridge = Arc::new(ScriptedBridge::new(vec![(
            "Gathering wood first.",
            vec![ToolCall {
                id: "call_1".into(),
                name: "mine_block".into(),
                arguments: json!({"blockType": "oak_log", "count": 1}),
            }],
        )]));
        let runner = runner_with_bridge(client.clone(), bridge).await;

        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::Completed);

        // Tool ran against the world and the state machine passed
        // through mining before settling back to idle.
        assert_eq!(runner.current_state(), BotState::Idle);
        let stats = runner.stats();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.tools_executed, 1);

        // Memory holds the situation message and the assistant reply.
        runner
            .with_memory(|memory| {
                assert_eq!(memory.message_count(), 2);
                assert!(memory.messages()[0].content.contains("Phase: early_game"));
                assert_eq!(memory.messages()[1].content, "Gathering wood first.");
                assert_eq!(memory.token_usage().total_tokens, 70);
            })
            .await;

        // Vitals were durably recorded.
        let latest = runner.storage.latest_world_state().await.unwrap().unwrap();
        assert_eq!(latest.dimension, "overworld");

        // Messages were flushed.
        let rows = runner.storage.recent_messages(10).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn cycle_waits_before_spawn() {
        let client = Arc::new(SimClient::new());
        client.set_spawned(false);
        let bridge = Arc::new(ScriptedBridge::new(vec![]));
        let runner = runner_with_bridge(client, bridge).await;

        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::Waiting);
        runner
            .with_memory(|memory| assert_eq!(memory.message_count(), 0))
            .await;
    }

    #[tokio::test]
    async fn overlapping_cycles_skip() {
        let client = Arc::new(SimClient::new());
        pave(&client);
        let bridge = Arc::new(ScriptedBridge::new(vec![]));
        let runner = runner_with_bridge(client, bridge).await;

        runner.is_processing.store(true, Ordering::SeqCst);
        let report = runner.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::Skipped);
        runner.is_processing.store(false, Ordering::SeqCst);
    }

    #[tokio::test]
    async fn llm_failure_surfaces_as_error() {
        let client = Arc::new(SimClient::new());
        pave(&client);
        let runner = runner_with_bridge(client, Arc::new(FailingBridge)).await;

        let err = runner.run_cycle().await.unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let client = Arc::new(SimClient::new());
        pave(&client);
        let bridge = Arc::new(ScriptedBridge::new(vec![]));
        let runner = runner_with_bridge(client, bridge).await;

        let handle = tokio::spawn(runner.clone().run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(runner.is_running());

        // A second start is a warning, not a second loop.
        runner.clone().run().await;

        runner.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!runner.is_running());
        assert_eq!(runner.current_state(), BotState::Idle);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn adopted_goal_feeds_the_situation_message() {
        use clawcraft_core::goal::{Goal, GoalType};

        let client = Arc::new(SimClient::demo_world());
        pave(&client);
        let bridge = Arc::new(ScriptedBridge::new(vec![("Okay.", vec![])]));
        let runner = runner_with_bridge(client, bridge).await;

        let goal = Goal::new(GoalType::Main, "Collect wood for tools", 1);
        let task_ids = runner.adopt_goal(goal).await.unwrap();
        assert_eq!(task_ids.len(), 3);

        runner.run_cycle().await.unwrap();
        runner
            .with_memory(|memory| {
                let situation = &memory.messages()[0].content;
                assert!(situation.contains("Next queued task: Gather logs"));
                assert!(memory
                    .build_context(ContextOptions::default())[0]
                    .content
                    .contains("Collect wood for tools"));
            })
            .await;

        // Completing tasks advances the DAG.
        runner.with_planner(|planner| {
            planner.complete_task(&task_ids[0]);
            let next = planner.next_executable_task().unwrap();
            assert_eq!(next.id, task_ids[1]);
        });
    }

    #[test]
    fn tool_to_activity_mapping() {
        assert_eq!(activity_for_tool("mine_block"), Some(BotState::Mining));
        assert_eq!(activity_for_tool("craft_item"), Some(BotState::Crafting));
        assert_eq!(activity_for_tool("goto_location"), Some(BotState::Navigating));
        assert_eq!(activity_for_tool("eat_food"), Some(BotState::Eating));
        assert_eq!(activity_for_tool("get_health"), None);
    }
}
