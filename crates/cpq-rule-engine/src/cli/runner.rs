//! 命令执行器
//!
//! 将命令行参数转化为规则编译、评估与热更新调用。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use cpq_shared::config::EngineSettings;

use crate::compiler::RuleCompiler;
use crate::engine::{EngineConfig, EvaluationEngine, EvaluationOptions};
use crate::models::{ConfigurationState, Priority, RuleStatus, RuleType};
use crate::snapshot::{RuleFilter, RuleSetSnapshot};
use crate::store::RuleSetStore;
use crate::watcher::{SnapshotWatcher, load_schema, load_snapshot};

/// 规则列表中的一行
#[derive(Debug, Serialize)]
struct RuleSummary<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    rule_type: RuleType,
    priority: Priority,
    status: RuleStatus,
    affected_products: u32,
    conditions: String,
    actions: String,
}

/// 命令执行器
pub struct CommandRunner {
    settings: EngineSettings,
}

impl CommandRunner {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    fn compiler(&self) -> Result<RuleCompiler> {
        let schema = load_schema(&self.settings.schema_path)?;
        Ok(RuleCompiler::new(schema))
    }

    fn snapshot(&self) -> Result<RuleSetSnapshot> {
        let compiler = self.compiler()?;
        load_snapshot(&compiler, &self.settings.rules_path)
    }

    fn engine(&self) -> EvaluationEngine {
        EvaluationEngine::new(EngineConfig::from(&self.settings))
    }

    /// 执行 validate 命令
    pub fn run_validate(&self) -> Result<()> {
        let snapshot = self.snapshot()?;

        println!(
            "规则集有效: version={}, 规则数={}, 激活={}, 编译于 {}",
            snapshot.version(),
            snapshot.len(),
            snapshot.active_count(),
            snapshot.compiled_at().to_rfc3339()
        );
        Ok(())
    }

    /// 执行 list 命令
    pub fn run_list(&self, filter: &RuleFilter, json: bool) -> Result<()> {
        let snapshot = self.snapshot()?;
        let rules = snapshot.filter(filter);
        info!(
            total = snapshot.len(),
            matched = rules.len(),
            filters = filter.active_dimensions(),
            "规则筛选完成"
        );

        let summaries: Vec<RuleSummary<'_>> = rules
            .iter()
            .map(|rule| RuleSummary {
                id: &rule.id,
                name: &rule.name,
                rule_type: rule.rule_type,
                priority: rule.priority,
                status: rule.status,
                affected_products: rule.affected_products,
                conditions: rule.condition_summary(),
                actions: rule.action_summary(),
            })
            .collect();

        if json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }

        println!("{}", "-".repeat(60));
        for s in &summaries {
            println!(
                "{} [{}] {} ({} / {:?}, 影响 {} 个产品)",
                s.id,
                s.rule_type,
                s.name,
                s.priority.label(),
                s.status,
                s.affected_products
            );
            println!("    {}", s.conditions);
            println!("    → {}", s.actions);
        }
        println!("{}", "-".repeat(60));
        println!("共 {} 条规则", summaries.len());
        Ok(())
    }

    /// 执行 evaluate 命令
    pub fn run_evaluate(
        &self,
        config_path: &Path,
        is_final: bool,
        timeout_ms: Option<u64>,
        trace: bool,
    ) -> Result<()> {
        let snapshot = self.snapshot()?;
        let state = read_configuration(config_path)?;

        let mut options = EvaluationOptions::new();
        options.is_final = is_final;
        options.trace = trace;
        if let Some(ms) = timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }

        let result = self
            .engine()
            .evaluate(&snapshot, &state, &options)
            .context("配置评估失败")?;

        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    }

    /// 执行 test-rule 命令
    pub fn run_test_rule(&self, rule_id: &str, config_path: &Path, is_final: bool) -> Result<()> {
        let snapshot = self.snapshot()?;
        let state = read_configuration(config_path)?;

        let report = self
            .engine()
            .test_rule(&snapshot, rule_id, &state, is_final)
            .with_context(|| format!("规则 {} 试运行失败", rule_id))?;

        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    /// 执行 watch 命令
    pub async fn run_watch(&self) -> Result<()> {
        let compiler = Arc::new(self.compiler()?);
        let store = RuleSetStore::empty();
        let watcher = SnapshotWatcher::new(
            &self.settings.rules_path,
            Duration::from_millis(self.settings.watch_debounce_ms),
            compiler,
            store.clone(),
        );

        watcher.reload().context("初始规则集加载失败")?;
        let handle = watcher.start()?;
        let mut updates = store.subscribe();

        info!("按 Ctrl+C 停止监听");

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    println!(
                        "规则集已更新: version={}, 激活规则={}, 编译于 {}",
                        snapshot.version(),
                        snapshot.active_count(),
                        snapshot.compiled_at().to_rfc3339()
                    );
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("收到关闭信号");
                    break;
                }
            }
        }

        watcher.stop();
        handle.await.context("监听任务异常退出")?;
        Ok(())
    }
}

fn read_configuration(path: &Path) -> Result<ConfigurationState> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    ConfigurationState::from_json(&json)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))
}
