//! Headless Agent 运行时
//!
//! 供调用方（CLI、HTTP 服务、测试）使用的无界面入口：
//! create_agent_components 按配置构建 LLM / 动作注册表 / 脱敏器 / 历史存储，可被多个任务共享；
//! start_task 为一个任务创建独占的 TaskExecutor；run_task 一次跑到底。

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::browser::{BrowserActuator, PerceptionProvider};
use crate::config::{AgentSettings, AppConfig};
use crate::core::AgentError;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{HistoryStore, JsonHistoryStore, Redactor};
use crate::react::{AgentEvent, TaskExecutor, TaskOutcome, TaskResources};
use crate::tools::ActionRegistry;

/// 预构建的 Agent 组件，任务之间共享
#[derive(Clone)]
pub struct AgentComponents {
    pub llm: Arc<dyn LlmClient>,
    pub registry: Arc<ActionRegistry>,
    pub settings: AgentSettings,
    pub redactor: Arc<Redactor>,
    pub history_store: Option<Arc<dyn HistoryStore>>,
}

impl AgentComponents {
    /// 用指定 LLM 替换配置选出的后端（测试、离线演示）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }
}

/// 创建 Agent 组件：注册内置动作并校验完整性，按配置选择 LLM
pub fn create_agent_components(cfg: &AppConfig) -> Result<AgentComponents, AgentError> {
    let registry = ActionRegistry::builtin()?;
    let history_store = cfg.history.dir.as_ref().map(|dir| {
        tracing::info!(dir = %dir.display(), "step history persistence enabled");
        Arc::new(JsonHistoryStore::new(dir)) as Arc<dyn HistoryStore>
    });

    Ok(AgentComponents {
        llm: create_llm_from_config(cfg),
        registry: Arc::new(registry),
        settings: cfg.agent.clone(),
        redactor: Arc::new(Redactor::new(&cfg.redaction.secrets)),
        history_store,
    })
}

/// 为一个任务创建独占的执行器；调用方持有它并负责其生命周期
pub fn start_task<B>(components: &AgentComponents, task: &str, browser: Arc<B>) -> TaskExecutor
where
    B: PerceptionProvider + BrowserActuator + 'static,
{
    let resources = TaskResources {
        llm: components.llm.clone(),
        perception: browser.clone(),
        actuator: browser,
        registry: components.registry.clone(),
    };
    let executor = TaskExecutor::new(
        task,
        resources,
        components.settings.clone(),
        components.redactor.clone(),
    );
    match &components.history_store {
        Some(store) => executor.with_history_store(store.clone()),
        None => executor,
    }
}

/// 跑一个任务直到完成、需要用户输入或失败
pub async fn run_task<B>(
    components: &AgentComponents,
    task: &str,
    browser: Arc<B>,
) -> Result<TaskOutcome, AgentError>
where
    B: PerceptionProvider + BrowserActuator + 'static,
{
    start_task(components, task, browser).run().await
}

/// 同 run_task，并把过程事件推送到 event_tx
pub async fn run_task_stream<B>(
    components: &AgentComponents,
    task: &str,
    browser: Arc<B>,
    event_tx: mpsc::UnboundedSender<AgentEvent>,
) -> Result<TaskOutcome, AgentError>
where
    B: PerceptionProvider + BrowserActuator + 'static,
{
    start_task(components, task, browser)
        .with_event_tx(event_tx)
        .run()
        .await
}
