//! The IR graph scheduler (C6, §4.6): readiness-based traversal over a
//! compiled [`IR`], dispatching each node by kind.
//!
//! `Scope` is arena-backed (`Rc<RefCell<_>>`, not `Send`), so the run's
//! future is not `Send` either — a host drives it from a current-thread
//! runtime, or `tokio::task::LocalSet` on a multi-thread one. Concurrency
//! within a single run (parallel branches, parallel `map` iterations)
//! still happens, just without crossing an OS thread: branches are
//! interleaved cooperatively via `futures::future::join_all`/`select_ok`
//! rather than `tokio::spawn`.

use crate::cache::{CacheKey, NodeCache};
use crate::error::{FailureKind, FlowError, Result};
use crate::events::{Event, EventSink};
use crate::ir::{IRNode, LoopKind, NodeConfig, IR};
use crate::plan::JoinStrategy;
use crate::retry::RetryPolicy;
use crate::schema;
use crate::scope::Scope;
use crate::suspend::{SuspensionManager, SuspensionRequest};
use crate::tool::{CancellationToken, ToolCallError, ToolContext, ToolOutcome};
use crate::value::IRValue;
use futures::future::{select_ok, FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// Engine-wide defaults a node's own `config` overrides (§4.6, §6.6).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Retry policy applied when a node has no `config.retries` override.
    pub default_retry: RetryPolicy,
    /// Timeout applied when a node has no `config.timeoutMs` override.
    pub default_timeout_ms: Option<u64>,
    /// Maximum iterations a `while` loop may run before `LoopBound`.
    pub loop_iteration_cap: u64,
    /// Concurrency used for a parallel `map` with no `config.concurrency`.
    pub default_concurrency: u32,
    /// Channel capacity for the run's event stream.
    pub event_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_retry: RetryPolicy::default(),
            default_timeout_ms: Some(30_000),
            loop_iteration_cap: 10_000,
            default_concurrency: 4,
            event_channel_capacity: 256,
        }
    }
}

type Completed = Rc<RefCell<HashMap<String, Value>>>;

/// Drives a single run of a compiled [`IR`] to completion or suspension.
pub struct Scheduler {
    ir: IR,
    config: SchedulerConfig,
    cache: NodeCache,
    events: EventSink,
    cancellation: CancellationToken,
    suspension: Option<Arc<SuspensionManager>>,
    flow_id: String,
    session_id: Option<String>,
}

impl Scheduler {
    /// Build a scheduler for one run of `ir`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ir: IR,
        config: SchedulerConfig,
        events: EventSink,
        cancellation: CancellationToken,
        suspension: Option<Arc<SuspensionManager>>,
        flow_id: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            ir,
            config,
            cache: NodeCache::new(),
            events,
            cancellation,
            suspension,
            flow_id: flow_id.into(),
            session_id,
        }
    }

    /// Run the compiled IR against `input`, returning the entry point's
    /// resolved output. A suspended run surfaces as `Err(FlowError::Suspended)`
    /// carrying the key a caller passes to resume.
    pub async fn run(&self, input: Value) -> Result<Value> {
        let _span = tracing::debug_span!("flow_run", flow_id = %self.flow_id).entered();
        tracing::info!("flow started");

        self.events
            .emit(Event::FlowStart {
                flow_id: self.flow_id.clone(),
                metadata: self.ir.metadata.clone(),
            })
            .await;

        let scope = Scope::root();
        scope.set("input", input);
        let completed: Completed = Rc::new(RefCell::new(HashMap::new()));

        let entry = self.ir.graph.entry_point.clone();
        match self.dispatch(&entry, scope, completed.clone()).await {
            Ok(output) => {
                tracing::info!("flow completed");
                self.events
                    .emit(Event::FlowComplete {
                        flow_id: self.flow_id.clone(),
                        output: output.clone(),
                    })
                    .await;
                Ok(output)
            }
            Err(FlowError::Suspended(key)) => {
                tracing::info!(suspension_key = %key, "flow suspended");
                self.events
                    .emit(Event::FlowSuspended {
                        flow_id: self.flow_id.clone(),
                        suspension_key: key.clone(),
                    })
                    .await;
                Err(FlowError::Suspended(key))
            }
            Err(err) => {
                tracing::warn!(error = %err, "flow failed");
                self.events
                    .emit(Event::FlowError {
                        flow_id: self.flow_id.clone(),
                        error: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    /// Resume a run previously suspended at `key`, treating the suspended
    /// node as if it had returned `resume_input` (validated against the
    /// tool's declared resume schema, if any), then continuing scheduling
    /// from that node's completion (§4.9 step 4).
    pub async fn resume(&self, key: &flowforge_checkpoint::SuspensionKey, resume_input: Value) -> Result<Value> {
        let manager = self.suspension.as_ref().ok_or_else(|| {
            FlowError::Custom("resume requested but no suspension backend is configured".into())
        })?;
        let frozen = manager.resume(key).await?;

        if frozen.ir_hash != self.ir.hash() {
            return Err(FlowError::Custom(
                "suspension was recorded against a different compiled flow".into(),
            ));
        }

        if let Some(IRNode::Tool(tool_node)) = self.ir.graph.nodes.get(&frozen.node_id) {
            if let Some(tool) = self.ir.tools.get(&tool_node.tool_id) {
                if let Some(resume_schema) = tool.resume_schema() {
                    schema::validate(&resume_input, resume_schema)
                        .map_err(|e| FlowError::input_validation(&frozen.node_id, e))?;
                }
            }
        }

        self.events
            .emit(Event::FlowResumed {
                flow_id: self.flow_id.clone(),
                suspension_key: key.to_string(),
            })
            .await;

        let scope = Scope::root();
        if let Value::Object(vars) = &frozen.scope_snapshot {
            for (name, value) in vars {
                scope.set(name.clone(), value.clone());
            }
        }

        let completed: Completed = Rc::new(RefCell::new(frozen.completed_outputs));
        completed
            .borrow_mut()
            .insert(frozen.node_id.clone(), resume_input.clone());
        if let Some(output_var) = self.ir.graph.nodes.get(&frozen.node_id).and_then(IRNode::output_var) {
            scope.set(output_var, resume_input.clone());
        }
        self.events
            .emit(Event::NodeComplete {
                node_id: frozen.node_id.clone(),
                output: resume_input,
            })
            .await;

        let entry = self.ir.graph.entry_point.clone();
        match self.dispatch(&entry, scope, completed).await {
            Ok(output) => {
                self.events
                    .emit(Event::FlowComplete {
                        flow_id: self.flow_id.clone(),
                        output: output.clone(),
                    })
                    .await;
                Ok(output)
            }
            Err(FlowError::Suspended(new_key)) => {
                self.events
                    .emit(Event::FlowSuspended {
                        flow_id: self.flow_id.clone(),
                        suspension_key: new_key.clone(),
                    })
                    .await;
                Err(FlowError::Suspended(new_key))
            }
            Err(err) => {
                self.events
                    .emit(Event::FlowError {
                        flow_id: self.flow_id.clone(),
                        error: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    fn dispatch<'a>(
        &'a self,
        node_id: &'a str,
        scope: Scope,
        completed: Completed,
    ) -> LocalBoxFuture<'a, Result<Value>> {
        use tracing::Instrument;
        let span = tracing::debug_span!(
            "dispatch_node",
            flow_id = %self.flow_id,
            node_id = %node_id,
            node_type = tracing::field::Empty
        );
        async move {
            if self.cancellation.is_cancelled() {
                return Err(FlowError::Cancelled);
            }

            // A resumed run pre-seeds `completed` with every node that ran
            // before suspension (plus the suspended node's resume value);
            // replaying the tree from the entry point must not re-invoke
            // their tools.
            if let Some(cached) = completed.borrow().get(node_id).cloned() {
                return Ok(cached);
            }

            let node = self
                .ir
                .graph
                .nodes
                .get(node_id)
                .ok_or_else(|| FlowError::Compilation(format!("unknown node '{node_id}'")))?;
            tracing::Span::current().record("node_type", node.type_name());

            self.events
                .emit(Event::NodeStart {
                    node_id: node_id.to_string(),
                    node_type: node.type_name(),
                })
                .await;

            let result = match node {
                IRNode::Tool(n) => {
                    self.dispatch_tool(node_id, &n.tool_id, &n.inputs, n.join_of.as_ref(), &n.config, &scope, &completed)
                        .await
                }
                IRNode::Conditional(n) => {
                    let value = IRValue::Expression(n.condition.clone()).resolve(node_id, &scope, &completed.borrow())?;
                    let branch = if crate::expr::truthy(&value) {
                        &n.then_branch
                    } else {
                        &n.else_branch
                    };
                    self.run_block(branch, scope.clone(), completed.clone()).await
                }
                IRNode::Sequence(n) => self.run_block(&n.steps, scope.clone(), completed.clone()).await,
                IRNode::Parallel(n) => self.dispatch_parallel(&n.branches, n.join_strategy, scope.clone(), completed.clone()).await,
                IRNode::Loop(n) => self.dispatch_loop(n, scope.clone(), completed.clone()).await,
                IRNode::Switch(n) => {
                    let discriminator = n.discriminator.resolve(node_id, &scope, &completed.borrow())?;
                    let key = case_key(&discriminator);
                    let branch = n
                        .cases
                        .get(&key)
                        .or(n.default.as_ref())
                        .ok_or_else(|| FlowError::NoMatch { node: node_id.to_string() })?;
                    self.run_block(branch, scope.clone(), completed.clone()).await
                }
            };

            match &result {
                Ok(output) => {
                    completed.borrow_mut().insert(node_id.to_string(), output.clone());
                    if let Some(output_var) = node.output_var() {
                        scope.set(output_var, output.clone());
                    }
                    self.events
                        .emit(Event::NodeComplete {
                            node_id: node_id.to_string(),
                            output: output.clone(),
                        })
                        .await;
                }
                Err(FlowError::Suspended(_)) => {}
                Err(err) => {
                    self.events
                        .emit(Event::NodeError {
                            node_id: node_id.to_string(),
                            error: err.to_string(),
                        })
                        .await;
                }
            }

            result
        }
        .instrument(span)
        .boxed_local()
    }

    /// Run a sequence of node ids in order, returning the last one's
    /// output (or `Null` if `ids` is empty).
    fn run_block<'a>(&'a self, ids: &'a [String], scope: Scope, completed: Completed) -> LocalBoxFuture<'a, Result<Value>> {
        async move {
            let mut last = Value::Null;
            for id in ids {
                last = self.dispatch(id, scope.clone(), completed.clone()).await?;
            }
            Ok(last)
        }
        .boxed_local()
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch_tool(
        &self,
        node_id: &str,
        tool_id: &str,
        inputs: &HashMap<String, IRValue>,
        join_of: Option<&(String, String)>,
        config: &NodeConfig,
        scope: &Scope,
        completed: &Completed,
    ) -> Result<Value> {
        let mut resolved = serde_json::Map::new();
        {
            let completed_ref = completed.borrow();
            for (key, value) in inputs {
                resolved.insert(key.clone(), value.resolve(node_id, scope, &completed_ref)?);
            }
        }
        let resolved_input = Value::Object(resolved);

        if config.cache {
            let key = CacheKey::new(node_id, &resolved_input);
            if let Some(cached) = self.cache.get(&key) {
                return Ok(cached);
            }
            let output = self
                .invoke_with_retry(node_id, tool_id, join_of, config, resolved_input.clone(), scope)
                .await?;
            self.cache.put(key, output.clone());
            return Ok(output);
        }

        self.invoke_with_retry(node_id, tool_id, join_of, config, resolved_input, scope)
            .await
    }

    async fn invoke_with_retry(
        &self,
        node_id: &str,
        tool_id: &str,
        join_of: Option<&(String, String)>,
        config: &NodeConfig,
        input: Value,
        scope: &Scope,
    ) -> Result<Value> {
        let policy = RetryPolicy::from_node_config(config.retries, config.retry_delay_ms, self.config.default_retry);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = self.invoke_once(node_id, tool_id, join_of, config, input.clone(), scope).await;
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    tokio::time::sleep(policy.delay_for(attempt)).await;
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn invoke_once(
        &self,
        node_id: &str,
        tool_id: &str,
        join_of: Option<&(String, String)>,
        config: &NodeConfig,
        input: Value,
        scope: &Scope,
    ) -> Result<Value> {
        if let Some((from_tool, to_tool)) = join_of {
            let join = self
                .ir
                .joins
                .get(from_tool, to_tool)
                .ok_or_else(|| FlowError::MissingJoin {
                    from: from_tool.clone(),
                    to: to_tool.clone(),
                })?;
            let from_value = input.get("from").cloned().unwrap_or(Value::Null);
            return join
                .decode(&from_value)
                .map_err(|e| self.classify_tool_error(node_id, to_tool, e));
        }

        use tracing::Instrument;
        let span = tracing::debug_span!("invoke_tool", node_id, tool_id);
        self.invoke_tool(node_id, tool_id, config, input, scope).instrument(span).await
    }

    async fn invoke_tool(
        &self,
        node_id: &str,
        tool_id: &str,
        config: &NodeConfig,
        input: Value,
        scope: &Scope,
    ) -> Result<Value> {
        let tool = self
            .ir
            .tools
            .get(tool_id)
            .ok_or_else(|| FlowError::Compilation(format!("tool '{tool_id}' not registered")))?;

        schema::validate(&input, tool.input_schema()).map_err(|e| FlowError::input_validation(node_id, e))?;

        let (token_tx, _token_rx) = tokio::sync::mpsc::channel(32);
        let emitter = crate::tool::TokenEmitter::new(token_tx);
        let ctx = ToolContext {
            flow_id: self.flow_id.clone(),
            node_id: node_id.to_string(),
            session_id: self.session_id.clone(),
            scope_snapshot: scope.snapshot(),
            cancellation: self.cancellation.clone(),
            emitter,
        };

        self.events
            .emit(Event::ToolStart {
                node_id: node_id.to_string(),
                tool_id: tool_id.to_string(),
            })
            .await;

        let timeout_ms = config.timeout_ms.or(self.config.default_timeout_ms);
        let call = tool.execute(input, &ctx);
        let outcome = match timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), call)
                .await
                .map_err(|_| FlowError::Timeout {
                    node: node_id.to_string(),
                    duration_ms: ms,
                })?,
            None => call.await,
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = self.classify_tool_error(node_id, tool_id, e);
                self.events
                    .emit(Event::ToolError {
                        node_id: node_id.to_string(),
                        tool_id: tool_id.to_string(),
                        error: err.to_string(),
                    })
                    .await;
                return Err(err);
            }
        };

        match outcome {
            ToolOutcome::Success(value) => {
                schema::validate(&value, tool.output_schema()).map_err(|e| FlowError::output_validation(node_id, e))?;
                Ok(value)
            }
            ToolOutcome::Suspend(signal) => {
                let manager = self.suspension.as_ref().ok_or_else(|| {
                    FlowError::Custom("tool requested suspension but no suspension backend is configured".into())
                })?;
                let key = manager
                    .suspend(SuspensionRequest {
                        ir_hash: self.ir.hash(),
                        node_id: node_id.to_string(),
                        completed_outputs: HashMap::new(),
                        scope,
                        pending_branch_state: None,
                        signal,
                    })
                    .await?;
                Err(FlowError::Suspended(key.to_string()))
            }
        }
    }

    fn classify_tool_error(&self, node_id: &str, tool_id: &str, err: ToolCallError) -> FlowError {
        let kind = if err.transient {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        };
        FlowError::tool_failure(node_id, tool_id, kind, err.message)
    }

    async fn dispatch_parallel(&self, branches: &[String], strategy: JoinStrategy, scope: Scope, completed: Completed) -> Result<Value> {
        match strategy {
            JoinStrategy::All => {
                let futures: Vec<_> = branches
                    .iter()
                    .map(|id| self.dispatch(id, scope.child(), completed.clone()))
                    .collect();
                let results = futures::future::join_all(futures).await;
                let mut outputs = Vec::with_capacity(results.len());
                for result in results {
                    match result {
                        Ok(value) => outputs.push(value),
                        Err(err) => {
                            self.cancellation.cancel();
                            return Err(err);
                        }
                    }
                }
                Ok(Value::Array(outputs))
            }
            JoinStrategy::Race => {
                let futures: Vec<LocalBoxFuture<'_, Result<Value>>> = branches
                    .iter()
                    .map(|id| self.dispatch(id, scope.child(), completed.clone()))
                    .collect();
                let (winner, _losers) = select_ok(futures).await?;
                self.cancellation.cancel();
                Ok(winner)
            }
            JoinStrategy::Settled => {
                let futures: Vec<_> = branches
                    .iter()
                    .map(|id| self.dispatch(id, scope.child(), completed.clone()))
                    .collect();
                let results = futures::future::join_all(futures).await;
                let settled: Vec<Value> = results
                    .into_iter()
                    .map(|r| match r {
                        Ok(value) => serde_json::json!({"status": "ok", "value": value}),
                        Err(err) => serde_json::json!({"status": "error", "error": err.to_string()}),
                    })
                    .collect();
                Ok(Value::Array(settled))
            }
        }
    }

    async fn dispatch_loop(&self, node: &crate::ir::LoopNode, scope: Scope, completed: Completed) -> Result<Value> {
        match node.loop_kind {
            LoopKind::While => {
                let condition = node
                    .condition
                    .as_ref()
                    .ok_or_else(|| FlowError::Compilation(format!("loop '{}' has no condition", node.id)))?;
                let mut iterations = 0u64;
                loop {
                    let truthy = crate::expr::truthy(&IRValue::Expression(condition.clone()).resolve(&node.id, &scope, &completed.borrow())?);
                    if !truthy {
                        break;
                    }
                    if iterations >= self.config.loop_iteration_cap {
                        tracing::warn!(node_id = %node.id, cap = self.config.loop_iteration_cap, "loop exceeded iteration cap");
                        return Err(FlowError::LoopBound {
                            node: node.id.clone(),
                            cap: self.config.loop_iteration_cap,
                        });
                    }
                    iterations += 1;
                    let iter_scope = scope.child();
                    self.run_block(&node.body, iter_scope, completed.clone()).await?;
                }
                Ok(Value::Null)
            }
            LoopKind::For | LoopKind::Map | LoopKind::Filter | LoopKind::Reduce => {
                let collection = node
                    .collection
                    .as_ref()
                    .ok_or_else(|| FlowError::Compilation(format!("loop '{}' has no collection", node.id)))?
                    .resolve(&node.id, &scope, &completed.borrow())?;
                let items = collection
                    .as_array()
                    .cloned()
                    .ok_or_else(|| FlowError::input_validation(&node.id, "collection did not resolve to an array"))?;
                if items.len() as u64 > self.config.loop_iteration_cap {
                    return Err(FlowError::LoopBound {
                        node: node.id.clone(),
                        cap: self.config.loop_iteration_cap,
                    });
                }

                match node.loop_kind {
                    LoopKind::For => {
                        for item in &items {
                            let iter_scope = scope.child();
                            if let Some(var) = &node.iterator_var {
                                iter_scope.set(var.clone(), item.clone());
                            }
                            self.run_block(&node.body, iter_scope, completed.clone()).await?;
                        }
                        Ok(Value::Null)
                    }
                    LoopKind::Map => {
                        if node.config.parallel {
                            use futures::stream::{self, StreamExt};
                            let concurrency = node.config.concurrency.unwrap_or(self.config.default_concurrency).max(1) as usize;
                            let results = stream::iter(items.iter().cloned().enumerate())
                                .map(|(idx, item)| {
                                    let iter_scope = scope.child();
                                    if let Some(var) = &node.iterator_var {
                                        iter_scope.set(var.clone(), item);
                                    }
                                    let completed = completed.clone();
                                    async move { (idx, self.run_block(&node.body, iter_scope, completed).await) }
                                })
                                .buffer_unordered(concurrency)
                                .collect::<Vec<_>>()
                                .await;
                            let mut ordered: Vec<(usize, Value)> = Vec::with_capacity(results.len());
                            for (idx, result) in results {
                                ordered.push((idx, result?));
                            }
                            ordered.sort_by_key(|(idx, _)| *idx);
                            Ok(Value::Array(ordered.into_iter().map(|(_, v)| v).collect()))
                        } else {
                            let mut out = Vec::with_capacity(items.len());
                            for item in &items {
                                let iter_scope = scope.child();
                                if let Some(var) = &node.iterator_var {
                                    iter_scope.set(var.clone(), item.clone());
                                }
                                out.push(self.run_block(&node.body, iter_scope, completed.clone()).await?);
                            }
                            Ok(Value::Array(out))
                        }
                    }
                    LoopKind::Filter => {
                        let mut kept = Vec::new();
                        for item in &items {
                            let iter_scope = scope.child();
                            if let Some(var) = &node.iterator_var {
                                iter_scope.set(var.clone(), item.clone());
                            }
                            let keep = if let Some(condition) = &node.condition {
                                crate::expr::truthy(&IRValue::Expression(condition.clone()).resolve(&node.id, &iter_scope, &completed.borrow())?)
                            } else {
                                crate::expr::truthy(&self.run_block(&node.body, iter_scope.clone(), completed.clone()).await?)
                            };
                            if keep {
                                kept.push(item.clone());
                            }
                        }
                        Ok(Value::Array(kept))
                    }
                    LoopKind::Reduce => {
                        let accumulator_name = node
                            .accumulator
                            .as_ref()
                            .ok_or_else(|| FlowError::Compilation(format!("reduce '{}' has no accumulator", node.id)))?;
                        let mut acc = node.initial.clone().unwrap_or(Value::Null);
                        for item in &items {
                            let iter_scope = scope.child();
                            iter_scope.set(accumulator_name.clone(), acc.clone());
                            if let Some(var) = &node.iterator_var {
                                iter_scope.set(var.clone(), item.clone());
                            }
                            acc = self.run_block(&node.body, iter_scope, completed.clone()).await?;
                        }
                        Ok(acc)
                    }
                    LoopKind::While => unreachable!("handled above"),
                }
            }
        }
    }
}

/// Render a discriminator value as the string key used to match `switch`
/// cases: strings pass through unquoted, everything else uses its
/// canonical JSON form.
fn case_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
