//! 步骤历史持久化
//!
//! 将 Step History 写入/从 JSON 文件加载，供事后回放；尽力而为，失败只记日志，不影响任务。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::react::StepRecord;

/// 外部存储：按任务保存有序的 Step Record 列表
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn save(&self, task_id: &str, records: &[StepRecord]) -> anyhow::Result<()>;
}

/// 简单的文件持久化：每个任务一个 `<dir>/<task_id>.json`
#[derive(Debug, Clone)]
pub struct JsonHistoryStore {
    dir: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// task_id 必须是单个普通文件名，不能带路径分隔符或 `..`
    fn path_for(&self, task_id: &str) -> anyhow::Result<PathBuf> {
        let mut components = Path::new(task_id).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_normal || task_id.contains(['/', '\\']) {
            anyhow::bail!("invalid task id for history file: {task_id:?}");
        }
        Ok(self.dir.join(format!("{task_id}.json")))
    }

    /// 加载某任务的步骤历史；文件不存在时返回空 Vec
    pub fn load(&self, task_id: &str) -> anyhow::Result<Vec<StepRecord>> {
        let path = self.path_for(task_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn save(&self, task_id: &str, records: &[StepRecord]) -> anyhow::Result<()> {
        let path = self.path_for(task_id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let data = serde_json::to_string_pretty(records)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::react::{PerceptionSummary, StepRecord};
    use crate::tools::ActionResult;

    #[tokio::test]
    async fn test_save_and_load_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path().join("history"));
        let records = vec![StepRecord::new(
            0,
            "[THINKING]look[/THINKING]".to_string(),
            vec![ActionResult::done("ok", true)],
            PerceptionSummary {
                url: "https://example.com".into(),
                title: "Example".into(),
                summary: "links".into(),
            },
            None,
        )];
        store.save("task-1", &records).await.unwrap();

        let loaded = store.load("task-1").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].perception.url, "https://example.com");
        assert!(loaded[0].results[0].is_done);
    }

    #[tokio::test]
    async fn test_task_id_cannot_escape_dir() {
        let root = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(root.path().join("history"));
        for bad in ["../x", "a/b", "..", ".", "", "a\\b", "/etc/passwd"] {
            assert!(store.save(bad, &[]).await.is_err(), "{bad:?} accepted");
            assert!(store.load(bad).is_err(), "{bad:?} accepted");
        }
        assert!(!root.path().join("x.json").exists());
        assert!(store.save("task-7.retry", &[]).await.is_ok());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonHistoryStore::new(dir.path());
        assert!(store.load("nope").unwrap().is_empty());
    }
}
