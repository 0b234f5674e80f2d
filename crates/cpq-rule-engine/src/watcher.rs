//! 规则集文件热更新
//!
//! 使用 `notify` 监听规则集快照文件，写入后经 debounce 窗口去抖，
//! 重新编译并发布到 [`RuleSetStore`]。新文件无效或版本未递增时保留当前快照。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::compiler::RuleCompiler;
use crate::snapshot::RuleSetSnapshot;
use crate::store::RuleSetStore;
use crate::value::FieldSchema;

/// 读取字段 schema 文件
pub fn load_schema(path: impl AsRef<Path>) -> Result<FieldSchema> {
    let path = path.as_ref();
    FieldSchema::from_file(path).with_context(|| format!("加载字段 schema 失败: {}", path.display()))
}

/// 读取并编译规则集快照文件
pub fn load_snapshot(compiler: &RuleCompiler, path: impl AsRef<Path>) -> Result<RuleSetSnapshot> {
    let path = path.as_ref();
    compiler
        .compile_document_file(path)
        .with_context(|| format!("加载规则集失败: {}", path.display()))
}

/// 规则集文件监听器
pub struct SnapshotWatcher {
    /// 监听的规则集文件
    rules_path: PathBuf,
    /// debounce 窗口，避免文件连续写入触发多次重载
    debounce: Duration,
    compiler: Arc<RuleCompiler>,
    store: RuleSetStore,
    /// 用于通知 watcher 循环退出
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SnapshotWatcher {
    pub fn new(
        rules_path: impl AsRef<Path>,
        debounce: Duration,
        compiler: Arc<RuleCompiler>,
        store: RuleSetStore,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            rules_path: rules_path.as_ref().to_path_buf(),
            debounce,
            compiler,
            store,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn store(&self) -> &RuleSetStore {
        &self.store
    }

    /// 立即重新加载并发布
    pub fn reload(&self) -> Result<Arc<RuleSetSnapshot>> {
        reload_into(&self.compiler, &self.rules_path, &self.store)
    }

    /// 启动监听
    ///
    /// 监听文件所在目录，以便捕获编辑器"写临时文件再重命名"的保存方式。
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let target = self
            .rules_path
            .file_name()
            .map(|name| name.to_os_string())
            .with_context(|| format!("规则集路径没有文件名: {}", self.rules_path.display()))?;
        let watch_dir = match self.rules_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        // notify 事件通过 channel 转发到 tokio 异步任务
        let (event_tx, mut event_rx) = mpsc::channel::<()>(16);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(target.as_os_str()));

                    if relevant {
                        let _ = event_tx.try_send(());
                    }
                }
                Err(e) => {
                    warn!(error = %e, "文件监听器事件错误");
                }
            })
            .context("创建文件监听器失败")?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .context("启动文件监听失败")?;

        info!(path = %self.rules_path.display(), "规则集文件监听已启动");

        let debounce = self.debounce;
        let compiler = Arc::clone(&self.compiler);
        let rules_path = self.rules_path.clone();
        let store = self.store.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            // watcher 随任务存活，任务结束时停止监听
            let _watcher = watcher;

            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        // 等待窗口期并丢弃窗口内的重复事件
                        tokio::time::sleep(debounce).await;
                        while event_rx.try_recv().is_ok() {}

                        match reload_into(&compiler, &rules_path, &store) {
                            Ok(snapshot) => {
                                info!(version = snapshot.version(), "规则集文件变更，已重新发布");
                            }
                            Err(e) => {
                                error!(
                                    path = %rules_path.display(),
                                    error = %format!("{:#}", e),
                                    "规则集重新加载失败，保留当前快照"
                                );
                            }
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("规则集文件监听已停止");
                            break;
                        }
                    }
                }
            }
        });

        Ok(handle)
    }

    /// 停止监听
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

fn reload_into(
    compiler: &RuleCompiler,
    rules_path: &Path,
    store: &RuleSetStore,
) -> Result<Arc<RuleSetSnapshot>> {
    let snapshot = load_snapshot(compiler, rules_path)?;
    let published = store.publish(snapshot).context("发布规则集快照失败")?;
    Ok(published)
}
