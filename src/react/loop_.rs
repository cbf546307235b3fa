//! 步骤循环（编排器）
//!
//! 每一步：折叠上一步动作结果 -> 感知页面 -> 流式推理并解析 -> 移除页面状态 -> 执行动作 -> 记录 Step Record。
//! run() 在步骤边界轮询暂停标志，取消令牌与 LLM 流共享；只有认证失败与取消越过步骤边界传播，
//! 其余错误记录进 Step Record 并作为下一步的上下文反馈给模型。

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use crate::browser::{BrowserActuator, PerceptionProvider};
use crate::config::AgentSettings;
use crate::core::{AgentError, ErrorDisposition, RecoveryEngine, TaskControl, TaskPhase};
use crate::llm::LlmClient;
use crate::memory::{HistoryStore, Redactor, TokenEstimator};
use crate::react::events::{AgentEvent, EventSink};
use crate::react::memory::ContextManager;
use crate::react::parser::{ActionCall, ParserEvent, StreamParser};
use crate::react::prompts::{build_perception_snapshot, build_system_prompt, describe_result};
use crate::react::task::{PerceptionSummary, StepOutcome, StepRecord, TaskContext, TaskOutcome};
use crate::tools::{ActionExecutor, ActionRegistry, ActionResult};

/// ActionOk 事件中内容预览的字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 一个任务用到的外部协作方
#[derive(Clone)]
pub struct TaskResources {
    pub llm: Arc<dyn LlmClient>,
    pub perception: Arc<dyn PerceptionProvider>,
    pub actuator: Arc<dyn BrowserActuator>,
    pub registry: Arc<ActionRegistry>,
}

/// 一次推理收集到的内容
#[derive(Debug, Default)]
struct Reasoning {
    actions: Vec<ActionCall>,
    question: Option<String>,
    final_response: Option<String>,
}

/// 单步执行中逐渐填充的记录草稿；出错时也要落成 Step Record
#[derive(Debug, Default)]
struct StepDraft {
    raw: String,
    perception: PerceptionSummary,
    results: Vec<ActionResult>,
}

/// 单任务编排器：独占 TaskContext 与消息日志
pub struct TaskExecutor {
    ctx: TaskContext,
    context: ContextManager,
    resources: TaskResources,
    executor: ActionExecutor,
    recovery: RecoveryEngine,
    settings: AgentSettings,
    events: EventSink,
    history_store: Option<Arc<dyn HistoryStore>>,
}

impl TaskExecutor {
    pub fn new(
        task: &str,
        resources: TaskResources,
        settings: AgentSettings,
        redactor: Arc<Redactor>,
    ) -> Self {
        let ctx = TaskContext::new(task, settings.max_steps, settings.max_consecutive_failures);
        let mut context = ContextManager::new(
            settings.max_input_tokens,
            TokenEstimator::new(settings.image_token_cost),
        )
        .with_redactor(redactor.clone());
        context.init_task(&build_system_prompt(&resources.registry), task);
        let executor = ActionExecutor::new(resources.registry.clone(), settings.action_timeout_secs)
            .with_redactor(redactor);

        Self {
            ctx,
            context,
            resources,
            executor,
            recovery: RecoveryEngine::new(),
            settings,
            events: EventSink::none(),
            history_store: None,
        }
    }

    pub fn with_event_tx(mut self, tx: tokio::sync::mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn with_history_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history_store = Some(store);
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.ctx.task_id = task_id.into();
        self
    }

    /// 暂停 / 恢复 / 取消句柄，可跨任务边界克隆
    pub fn control(&self) -> TaskControl {
        self.ctx.control.clone()
    }

    pub fn task_id(&self) -> &str {
        &self.ctx.task_id
    }

    pub fn phase(&self) -> TaskPhase {
        self.ctx.phase
    }

    pub fn task_context(&self) -> &TaskContext {
        &self.ctx
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextManager {
        &mut self.context
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.ctx.history
    }

    /// 追加用户 follow-up：离开等待输入 / 已完成状态，允许再次 run()
    pub fn add_follow_up(&mut self, text: &str) -> Result<(), AgentError> {
        if self.ctx.phase.is_terminal() {
            return Err(AgentError::InvalidState(format!(
                "cannot add follow-up to a {:?} task",
                self.ctx.phase
            )));
        }
        self.context.add_follow_up(text);
        self.ctx.pending_question = None;
        self.ctx.final_answer = None;
        if matches!(self.ctx.phase, TaskPhase::AwaitingInput | TaskPhase::Completed) {
            self.ctx.phase = TaskPhase::Running;
        }
        tracing::info!(task_id = %self.ctx.task_id, "follow-up added");
        Ok(())
    }

    /// 驱动任务直到完成、等待输入或任务级失败
    pub async fn run(&mut self) -> Result<TaskOutcome, AgentError> {
        match self.ctx.phase {
            TaskPhase::AwaitingInput => {
                return Ok(TaskOutcome::AwaitingInput {
                    question: self.ctx.pending_question.clone().unwrap_or_default(),
                })
            }
            TaskPhase::Completed => {
                return Ok(TaskOutcome::Completed {
                    answer: self.ctx.final_answer.clone().unwrap_or_default(),
                    success: self.ctx.final_success,
                })
            }
            TaskPhase::Failed | TaskPhase::Cancelled => {
                return Err(AgentError::InvalidState(format!(
                    "task already {:?}",
                    self.ctx.phase
                )))
            }
            TaskPhase::Idle => {
                tracing::info!(task_id = %self.ctx.task_id, task = %self.ctx.task, "task started");
                self.events.send(AgentEvent::TaskStarted {
                    task_id: self.ctx.task_id.clone(),
                    task: self.context.redactor().redact(&self.ctx.task),
                });
            }
            TaskPhase::Running | TaskPhase::Paused => {}
        }
        self.ctx.phase = TaskPhase::Running;

        loop {
            if self.ctx.control.is_cancelled() {
                return Err(self.cancelled());
            }
            if let Err(e) = self.wait_while_paused().await {
                return Err(self.fail_or_cancel(e));
            }
            if self.ctx.steps_exhausted() {
                return Err(self.fail(AgentError::MaxStepsReached(self.ctx.max_steps)));
            }

            match self.run_step().await {
                Ok(outcome) => {
                    if let Some(question) = outcome.question {
                        self.events.send(AgentEvent::TaskAwaitingInput {
                            task_id: self.ctx.task_id.clone(),
                            question: question.clone(),
                        });
                        tracing::info!(task_id = %self.ctx.task_id, "awaiting user input");
                        return Ok(TaskOutcome::AwaitingInput { question });
                    }
                    if outcome.done {
                        let answer = outcome.response.unwrap_or_default();
                        self.events.send(AgentEvent::TaskCompleted {
                            task_id: self.ctx.task_id.clone(),
                            answer: answer.clone(),
                        });
                        tracing::info!(task_id = %self.ctx.task_id, steps = self.ctx.step_index, "task completed");
                        return Ok(TaskOutcome::Completed {
                            answer,
                            success: self.ctx.final_success,
                        });
                    }
                    if self.ctx.failures_exhausted() {
                        return Err(self.fail(AgentError::MaxConsecutiveFailures(
                            self.ctx.consecutive_failures,
                        )));
                    }
                }
                Err(e) => return Err(self.fail_or_cancel(e)),
            }
        }
    }

    /// 执行一步。已取消时直接返回 Err(Cancelled)；暂停时不做任何事并返回空结果。
    pub async fn run_step(&mut self) -> Result<StepOutcome, AgentError> {
        if self.ctx.control.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        if self.ctx.control.is_paused() {
            return Ok(StepOutcome::default());
        }
        match self.ctx.phase {
            TaskPhase::AwaitingInput => {
                return Err(AgentError::InvalidState(
                    "task is awaiting input; add a follow-up first".to_string(),
                ))
            }
            p if p.is_terminal() => {
                return Err(AgentError::InvalidState(format!("task already {p:?}")))
            }
            _ => {}
        }

        let step = self.ctx.step_index;
        if self.ctx.phase == TaskPhase::Idle {
            self.ctx.phase = TaskPhase::Running;
        }
        self.events.send(AgentEvent::StepStarted {
            step,
            max_steps: self.ctx.max_steps,
        });
        tracing::info!(task_id = %self.ctx.task_id, step, "step started");

        let mut draft = StepDraft::default();
        let mut outcome = StepOutcome::default();
        let attempt = self.execute_step(step, &mut draft, &mut outcome).await;
        // 出错路径上推理可能没走完
        self.context.remove_perception_snapshot();

        let (propagated, step_error) = match attempt {
            Ok(()) => (None, None),
            Err(e) => match self.recovery.handle(&e) {
                ErrorDisposition::Propagate => {
                    let msg = e.to_string();
                    (Some(e), Some(msg))
                }
                ErrorDisposition::RecordAndContinue(msg) => {
                    tracing::warn!(step, error = %e, "step failed");
                    (None, Some(msg))
                }
                ErrorDisposition::Drop => {
                    tracing::warn!(step, error = %e, "step error dropped");
                    (None, None)
                }
            },
        };
        let step_error = step_error.map(|msg| self.context.redactor().redact(&msg));

        let failed = step_error.is_some() || draft.results.iter().any(|r| r.error.is_some());
        if propagated.is_none() {
            self.ctx.record_step_result(failed);
        }

        let mut pending = draft.results.clone();
        if propagated.is_none() {
            if let Some(msg) = &step_error {
                pending.push(ActionResult::error(msg.clone()));
            }
        }
        self.ctx.pending_results = pending;

        let record = StepRecord::new(
            step,
            self.context.redactor().redact(&draft.raw),
            draft.results,
            draft.perception,
            step_error.clone(),
        );
        self.ctx.history.push(record);
        self.ctx.step_index += 1;
        self.persist_history().await;

        match &step_error {
            Some(error) => self.events.send(AgentEvent::StepFailed {
                step,
                error: error.clone(),
            }),
            None => self.events.send(AgentEvent::StepOk { step }),
        }

        if let Some(e) = propagated {
            return Err(e);
        }
        outcome.error = step_error;
        Ok(outcome)
    }

    async fn execute_step(
        &mut self,
        step: usize,
        draft: &mut StepDraft,
        outcome: &mut StepOutcome,
    ) -> Result<(), AgentError> {
        // 1. 感知：先把上一步结果折叠进上下文（首步为空直接跳过）
        let transient = self.fold_pending_results();
        let state = self
            .resources
            .perception
            .world_state(self.settings.use_vision)
            .await?;
        draft.perception = PerceptionSummary::from_world(
            &state,
            self.settings.summary_preview_chars,
            self.context.redactor(),
        );
        self.context.add_perception_snapshot(build_perception_snapshot(
            &state,
            step,
            self.ctx.max_steps,
            &transient,
            self.settings.use_vision,
        ));

        // 2. 推理
        let reasoning = self.reason(draft).await;

        // 3. 记账：无论推理成功与否都移除页面状态
        self.context.remove_perception_snapshot();
        if !draft.raw.is_empty() {
            self.context.add_assistant_message(&draft.raw);
        }
        let reasoning = reasoning?;

        // 4. 决策
        if let Some(question) = reasoning.question {
            self.ctx.pending_question = Some(question.clone());
            self.ctx.phase = TaskPhase::AwaitingInput;
            outcome.done = true;
            outcome.question = Some(question);
            return Ok(());
        }

        if !reasoning.actions.is_empty() {
            self.execute_actions(step, reasoning.actions, draft).await?;
            if let Some(done) = draft.results.iter().find(|r| r.is_done) {
                let answer = done.extracted_content.clone().unwrap_or_default();
                self.complete(answer.clone(), done.success);
                outcome.done = true;
                outcome.response = Some(answer);
            }
            return Ok(());
        }

        if let Some(response) = reasoning.final_response {
            self.complete(response.clone(), true);
            outcome.done = true;
            outcome.response = Some(response);
        }
        Ok(())
    }

    /// 上一步结果：需要进记忆的写成 side information，其余只在本步页面状态里出现
    fn fold_pending_results(&mut self) -> Vec<ActionResult> {
        let pending = std::mem::take(&mut self.ctx.pending_results);
        let mut transient = Vec::new();
        for result in pending {
            if result.include_in_memory {
                if let Some(text) = describe_result(&result) {
                    self.context.add_side_information(&text);
                }
            } else {
                transient.push(result);
            }
        }
        transient
    }

    /// 打开模型流，逐块交给解析器；取消令牌触发时立即中止
    async fn reason(&mut self, draft: &mut StepDraft) -> Result<Reasoning, AgentError> {
        let messages = self.context.get_messages().to_vec();
        let token = self.ctx.control.token();
        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(AgentError::Cancelled),
            s = self.resources.llm.complete_stream(&messages, token.clone()) => s?,
        };

        let mut parser = StreamParser::new();
        let mut reasoning = Reasoning::default();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    draft.raw = parser.raw_content().to_string();
                    return Err(AgentError::Cancelled);
                }
                item = stream.next() => item,
            };
            match next {
                Some(Ok(chunk)) => {
                    for event in parser.process_chunk(&chunk) {
                        self.collect(event, &mut reasoning);
                    }
                }
                Some(Err(e)) => {
                    draft.raw = parser.raw_content().to_string();
                    return Err(e.into());
                }
                None => break,
            }
        }
        for event in parser.end() {
            self.collect(event, &mut reasoning);
        }
        draft.raw = parser.raw_content().to_string();
        tracing::debug!(
            model = self.resources.llm.model_name(),
            actions = reasoning.actions.len(),
            question = reasoning.question.is_some(),
            final_response = reasoning.final_response.is_some(),
            "reasoning finished"
        );
        Ok(reasoning)
    }

    fn collect(&self, event: ParserEvent, reasoning: &mut Reasoning) {
        match event {
            ParserEvent::Token(text) => self.events.send(AgentEvent::Token {
                text: self.context.redactor().redact(&text),
            }),
            ParserEvent::BlockStart(kind) => self.events.send(AgentEvent::BlockStart { kind }),
            ParserEvent::BlockContent { .. } => {}
            ParserEvent::BlockEnd { kind, content } => {
                self.events.send(AgentEvent::BlockEnd {
                    kind,
                    content: self.context.redactor().redact(&content),
                })
            }
            ParserEvent::Action(call) => reasoning.actions.push(call),
            ParserEvent::Question(q) => reasoning.question = Some(q),
            ParserEvent::FinalResponse(r) => reasoning.final_response = Some(r),
        }
    }

    /// 依次执行动作。校验失败 / 未注册动作中止本步剩余动作并作为步骤错误返回。
    async fn execute_actions(
        &mut self,
        step: usize,
        mut actions: Vec<ActionCall>,
        draft: &mut StepDraft,
    ) -> Result<(), AgentError> {
        let cap = self.settings.max_actions_per_step;
        if actions.len() > cap {
            tracing::warn!(step, requested = actions.len(), cap, "too many actions, extra ones dropped");
            actions.truncate(cap);
        }

        let total = actions.len();
        for (i, call) in actions.into_iter().enumerate() {
            if self.ctx.control.is_cancelled() {
                tracing::info!(step, remaining = total - i, "cancelled, skipping remaining actions");
                break;
            }
            self.events.send(AgentEvent::ActionStarted {
                step,
                action: call.name.clone(),
            });
            self.events.send(AgentEvent::ToolCall {
                action: call.name.clone(),
                args: call.args.clone(),
            });

            let args = self.context.redactor().reveal_value(call.args);
            let result = match self
                .executor
                .execute(&call.name, args, &*self.resources.actuator)
                .await
            {
                // 结果会进入历史与事件，先脱敏
                Ok(result) => result.redacted(self.context.redactor()),
                Err(e) => {
                    self.events.send(AgentEvent::ActionFailed {
                        step,
                        action: call.name.clone(),
                        error: self.context.redactor().redact(&e.to_string()),
                    });
                    return Err(e);
                }
            };

            match &result.error {
                Some(error) => self.events.send(AgentEvent::ActionFailed {
                    step,
                    action: call.name.clone(),
                    error: error.clone(),
                }),
                None => self.events.send(AgentEvent::ActionOk {
                    step,
                    action: call.name.clone(),
                    preview: result.extracted_content.as_ref().map(|c| preview(c)),
                }),
            }
            self.events.send(AgentEvent::ToolResult {
                action: call.name.clone(),
                success: result.success,
                content: result
                    .extracted_content
                    .clone()
                    .or_else(|| result.error.clone()),
            });

            let is_done = result.is_done;
            draft.results.push(result);
            if is_done {
                break;
            }
            let remaining = total - i - 1;
            if remaining > 0 && self.resources.registry.needs_fresh_perception(&call.name) {
                tracing::info!(
                    step,
                    action = %call.name,
                    remaining,
                    "page may have changed, skipping remaining actions"
                );
                break;
            }
        }
        Ok(())
    }

    fn complete(&mut self, answer: String, success: bool) {
        self.ctx.final_answer = Some(answer);
        self.ctx.final_success = success;
        self.ctx.phase = TaskPhase::Completed;
    }

    async fn wait_while_paused(&mut self) -> Result<(), AgentError> {
        if !self.ctx.control.is_paused() {
            return Ok(());
        }
        self.ctx.phase = TaskPhase::Paused;
        self.events.send(AgentEvent::TaskPaused {
            task_id: self.ctx.task_id.clone(),
        });
        tracing::info!(task_id = %self.ctx.task_id, "task paused");

        let interval = Duration::from_millis(self.settings.pause_poll_interval_ms.max(1));
        let token = self.ctx.control.token();
        while self.ctx.control.is_paused() {
            tokio::select! {
                _ = token.cancelled() => return Err(AgentError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.ctx.phase = TaskPhase::Running;
        self.events.send(AgentEvent::TaskResumed {
            task_id: self.ctx.task_id.clone(),
        });
        tracing::info!(task_id = %self.ctx.task_id, "task resumed");
        Ok(())
    }

    fn fail_or_cancel(&mut self, e: AgentError) -> AgentError {
        if e == AgentError::Cancelled {
            self.cancelled()
        } else {
            self.fail(e)
        }
    }

    fn cancelled(&mut self) -> AgentError {
        self.ctx.phase = TaskPhase::Cancelled;
        self.events.send(AgentEvent::TaskCancelled {
            task_id: self.ctx.task_id.clone(),
        });
        tracing::info!(task_id = %self.ctx.task_id, "task cancelled");
        AgentError::Cancelled
    }

    fn fail(&mut self, e: AgentError) -> AgentError {
        self.ctx.phase = TaskPhase::Failed;
        self.events.send(AgentEvent::TaskFailed {
            task_id: self.ctx.task_id.clone(),
            message: e.to_string(),
        });
        tracing::error!(task_id = %self.ctx.task_id, error = %e, "task failed");
        e
    }

    /// 尽力而为：失败只记日志
    async fn persist_history(&self) {
        let Some(store) = &self.history_store else {
            return;
        };
        if let Err(e) = store.save(&self.ctx.task_id, &self.ctx.history).await {
            tracing::warn!(task_id = %self.ctx.task_id, error = %e, "failed to persist step history");
        }
    }
}

fn preview(s: &str) -> String {
    if s.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", s.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
    } else {
        s.to_string()
    }
}
