//! The `Engine` facade (§6.1): turns a prompt into a running flow.
//!
//! This module bridges two facts about the lower crates that don't mix on
//! their own. The planner adapter (C10) is a plain `async fn` a caller
//! awaits directly. The scheduler's run future (C6) is pinned to a single
//! thread, because [`flowforge_core::Scope`] is `Rc`-backed and therefore
//! not `Send`. Every run here gets its own dedicated OS thread driving a
//! current-thread Tokio runtime and a [`tokio::task::LocalSet`]; only the
//! resulting [`Event`] stream — itself `Send`, since an `Event` owns plain
//! `String`/`serde_json::Value` data — crosses back to the caller.

use crate::config::EngineConfig;
use crate::error::{FacadeError, Result};
use flowforge_checkpoint::{Backend, SuspensionKey};
use flowforge_core::{
    compile, event_channel, CancellationToken, Event, Plan, Scheduler, SchedulerConfig,
    SuspensionManager, IR,
};
use flowforge_core::registry::{JoinRegistry, ToolRegistry};
use flowforge_llm::PlanningModel;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// The live event feed for one run, terminated by exactly one of
/// `flow-complete`, `flow-error`, or `flow-suspended`.
pub type EventStream = ReceiverStream<Event>;

/// Per-run overrides. Fields left `None` fall back to a freshly generated
/// id (`flow_id`) or no session correlation at all (`session_id`).
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Identifies this run in emitted events and log spans.
    pub flow_id: Option<String>,
    /// Caller-supplied session id, threaded into every tool's context.
    pub session_id: Option<String>,
}

/// Plans, compiles, and runs flows against a fixed set of tools and joins.
///
/// One `Engine` is typically built once per host process and shared
/// behind an `Arc`; `tools`, `joins`, and `planner` are immutable for its
/// lifetime (§5 — shared resources are immutable for a run's lifetime,
/// and that extends naturally to the engine that owns them).
pub struct Engine {
    tools: Arc<ToolRegistry>,
    joins: Arc<JoinRegistry>,
    planner: Arc<dyn PlanningModel>,
    backend: Arc<dyn Backend>,
    suspension: Arc<SuspensionManager>,
    config: EngineConfig,
    /// Compiled flows this engine has produced, keyed by `IR::hash`, so a
    /// later `resume` can reconstruct the scheduler that suspended without
    /// the caller re-supplying the plan. `IR` clones cheaply — every field
    /// is `Arc`-backed — so caching it is just a map insert.
    ir_cache: RwLock<HashMap<String, IR>>,
}

impl Engine {
    /// Build an engine over `tools`/`joins`, a planner adapter, and a
    /// suspension backend. Use [`EngineConfig::default`] unless the host
    /// has its own overrides.
    pub fn new(
        tools: ToolRegistry,
        joins: JoinRegistry,
        planner: Arc<dyn PlanningModel>,
        backend: Arc<dyn Backend>,
        config: EngineConfig,
    ) -> Self {
        let suspension = Arc::new(SuspensionManager::new(
            backend.clone(),
            chrono::Duration::minutes(config.suspension_ttl_minutes),
        ));
        Self {
            tools: Arc::new(tools),
            joins: Arc::new(joins),
            planner,
            backend,
            suspension,
            config,
            ir_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Plan and compile `prompt` into a runnable [`Instance`] without
    /// starting it.
    pub async fn generate(&self, prompt: &str) -> Result<Instance> {
        let plan = flowforge_llm::generate_plan(
            self.planner.as_ref(),
            &self.tools,
            &self.joins,
            prompt,
            self.config.planner_retry_count,
        )
        .await?;
        self.compile(plan)
    }

    fn compile(&self, plan: Plan) -> Result<Instance> {
        let ir = compile(&plan, self.tools.clone(), self.joins.clone())?;
        self.ir_cache.write().unwrap().insert(ir.hash(), ir.clone());
        Ok(Instance {
            plan,
            ir,
            config: self.config.clone(),
            suspension: self.suspension.clone(),
        })
    }

    /// Plan, compile, and run `prompt` in one call, returning the run's
    /// live event stream (§6.1).
    pub async fn execute(&self, prompt: &str, options: RunOptions) -> Result<EventStream> {
        let instance = self.generate(prompt).await?;
        Ok(instance.run(Value::Null, options))
    }

    /// Resume a run previously suspended at `key`, treating the suspended
    /// node as if it had just returned `resume_input`.
    ///
    /// The suspension record names the IR it was compiled from by hash;
    /// this looks that IR up in the engine's cache rather than requiring
    /// the caller to replan. A key from a different engine instance (or
    /// one whose cache has since been dropped) surfaces as
    /// [`FacadeError::Other`].
    pub async fn resume(&self, key: impl Into<SuspensionKey>, resume_input: Value, options: RunOptions) -> Result<EventStream> {
        let key = key.into();
        let record = self.backend.fetch(&key).await?;
        let ir = self
            .ir_cache
            .read()
            .unwrap()
            .get(&record.state.ir_hash)
            .cloned()
            .ok_or_else(|| {
                FacadeError::Other(anyhow::anyhow!(
                    "no compiled flow cached for suspension '{key}' (ir hash {})",
                    record.state.ir_hash
                ))
            })?;

        let flow_id = options.flow_id.unwrap_or_else(new_flow_id);
        Ok(spawn_run(RunRequest {
            ir,
            scheduler_config: SchedulerConfig::from(&self.config),
            suspension: self.suspension.clone(),
            flow_id,
            session_id: options.session_id,
            input: resume_input,
            resume_key: Some(key),
        }))
    }
}

/// A compiled flow, ready to run one or more times against fresh input.
pub struct Instance {
    plan: Plan,
    ir: IR,
    config: EngineConfig,
    suspension: Arc<SuspensionManager>,
}

impl Instance {
    /// The plan this instance was compiled from.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The compiled IR's content hash, stable across re-compiles of an
    /// identical plan (useful for a caller that wants to cache its own
    /// instances independently of the engine's internal cache).
    pub fn ir_hash(&self) -> String {
        self.ir.hash()
    }

    /// Start a run against `input`, returning its live event stream.
    pub fn run(&self, input: Value, options: RunOptions) -> EventStream {
        let flow_id = options.flow_id.unwrap_or_else(new_flow_id);
        spawn_run(RunRequest {
            ir: self.ir.clone(),
            scheduler_config: SchedulerConfig::from(&self.config),
            suspension: self.suspension.clone(),
            flow_id,
            session_id: options.session_id,
            input,
            resume_key: None,
        })
    }

    /// Run against `input` (defaulting to `null` when omitted) and block
    /// until the run reaches a terminal event, returning its payload.
    ///
    /// A `flow-suspended` terminal event surfaces as
    /// `Err(FacadeError::Flow(FlowError::Suspended(key)))` — a caller that
    /// wants to keep observing events through suspension should use
    /// [`Instance::run`] directly instead.
    pub async fn run_collect(&self, input: Option<Value>, options: RunOptions) -> Result<Value> {
        let stream = self.run(input.unwrap_or(Value::Null), options);
        collect_terminal(stream).await
    }
}

struct RunRequest {
    ir: IR,
    scheduler_config: SchedulerConfig,
    suspension: Arc<SuspensionManager>,
    flow_id: String,
    session_id: Option<String>,
    input: Value,
    resume_key: Option<SuspensionKey>,
}

/// Drive one scheduler run to completion on a dedicated OS thread, handing
/// the event receiver back to the calling thread as a `Send` stream.
fn spawn_run(request: RunRequest) -> EventStream {
    let (sink, rx) = event_channel(request.scheduler_config.event_channel_capacity);
    let thread_name = format!("flowforge-run-{}", request.flow_id);

    std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build a run's dedicated Tokio runtime");
            let local = tokio::task::LocalSet::new();
            local.block_on(&runtime, async move {
                let scheduler = Scheduler::new(
                    request.ir,
                    request.scheduler_config,
                    sink,
                    CancellationToken::new(),
                    Some(request.suspension),
                    request.flow_id,
                    request.session_id,
                );
                // The terminal event already carries this result (it's
                // what populates flow-complete/flow-error/flow-suspended),
                // so nothing further is done with it here.
                let _ = match request.resume_key {
                    Some(key) => scheduler.resume(&key, request.input).await,
                    None => scheduler.run(request.input).await,
                };
            });
        })
        .expect("failed to spawn a run's dedicated OS thread");

    ReceiverStream::new(rx)
}

async fn collect_terminal(mut stream: EventStream) -> Result<Value> {
    while let Some(event) = stream.next().await {
        match event {
            Event::FlowComplete { output, .. } => return Ok(output),
            Event::FlowError { error, .. } => {
                return Err(FacadeError::Flow(flowforge_core::FlowError::Custom(error)))
            }
            Event::FlowSuspended { suspension_key, .. } => {
                return Err(FacadeError::Flow(flowforge_core::FlowError::Suspended(suspension_key)))
            }
            _ => continue,
        }
    }
    Err(FacadeError::Flow(flowforge_core::FlowError::Custom(
        "run's event stream closed without a terminal event".into(),
    )))
}

fn new_flow_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowforge_checkpoint::InMemoryBackend;
    use flowforge_core::tool::{Tool, ToolCallError, ToolContext, ToolOutcome};
    use flowforge_llm::MockPlanningModel;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn id(&self) -> &str {
            "echo"
        }
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its input"
        }
        fn input_schema(&self) -> &Value {
            static SCHEMA: std::sync::OnceLock<Value> = std::sync::OnceLock::new();
            SCHEMA.get_or_init(|| json!({}))
        }
        fn output_schema(&self) -> &Value {
            self.input_schema()
        }
        async fn execute(&self, input: Value, _ctx: &ToolContext) -> std::result::Result<ToolOutcome, ToolCallError> {
            Ok(ToolOutcome::Success(input))
        }
    }

    fn echo_plan() -> Value {
        json!({
            "version": "1",
            "nodes": [{"id": "n1", "type": "tool", "toolId": "echo", "inputs": {}}],
            "edges": [],
            "rootIds": ["n1"]
        })
    }

    fn engine_with_echo() -> Engine {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool));
        let joins = JoinRegistry::new();
        let model: Arc<dyn PlanningModel> = Arc::new(MockPlanningModel::always(echo_plan()));
        let backend: Arc<dyn Backend> = Arc::new(InMemoryBackend::new());
        Engine::new(tools, joins, model, backend, EngineConfig::default())
    }

    #[tokio::test]
    async fn execute_runs_a_generated_plan_to_completion() {
        let engine = engine_with_echo();
        let stream = engine.execute("echo something", RunOptions::default()).await.unwrap();
        let result = collect_terminal(stream).await.unwrap();
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn generate_returns_an_inspectable_instance() {
        let engine = engine_with_echo();
        let instance = engine.generate("echo something").await.unwrap();
        assert_eq!(instance.plan().root_ids, vec!["n1".to_string()]);

        let output = instance.run_collect(None, RunOptions::default()).await.unwrap();
        assert_eq!(output, json!({}));
    }

    #[tokio::test]
    async fn run_accepts_explicit_input_and_a_flow_id_override() {
        let engine = engine_with_echo();
        let instance = engine.generate("echo something").await.unwrap();
        let options = RunOptions {
            flow_id: Some("fixed-id".into()),
            session_id: Some("session-1".into()),
        };
        let output = instance.run_collect(Some(json!({"x": 1})), options).await.unwrap();
        assert_eq!(output, json!({}));
    }
}
