//! Bee Browser - Rust 浏览器智能体运行时
//!
//! 给定自然语言目标，反复观察页面、询问模型下一步、执行固定集合中的浏览器动作，
//! 直到完成、失败或需要用户输入。
//!
//! 模块划分：
//! - **agent**: 无头运行时入口（组件构建、启动 / 运行任务）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与处置、恢复引擎、任务状态与控制句柄
//! - **browser**: 感知 / 执行协作方接口与内存实现
//! - **llm**: 流式 LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 计费消息日志、token 估算、脱敏、步骤历史持久化
//! - **react**: 标记协议解析、上下文管理、步骤循环
//! - **tools**: 动作注册表、schema 校验、执行器与内置浏览器动作

pub mod agent;
pub mod browser;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::{create_agent_components, run_task, start_task, AgentComponents};
pub use react::{TaskExecutor, TaskOutcome};
