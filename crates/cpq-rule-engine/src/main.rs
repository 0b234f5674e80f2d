//! cpq-eval
//!
//! CPQ 配置规则引擎的命令行入口点。

use anyhow::Context;
use clap::Parser;
use cpq_engine::Priority;
use cpq_engine::cli::{Cli, CommandRunner, Commands};
use cpq_engine::snapshot::RuleFilter;
use cpq_shared::config::AppConfig;
use cpq_shared::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load("cpq-rule-engine").context("加载配置失败")?;
    if let Some(rules) = cli.rules {
        config.engine.rules_path = rules;
    }
    if let Some(schema) = cli.schema {
        config.engine.schema_path = schema;
    }

    // 命令行日志级别优先于配置文件，RUST_LOG 优先于两者
    let observability_config = config
        .observability
        .clone()
        .with_log_level(cli.log_level.as_deref());
    observability::init(&observability_config)?;

    let runner = CommandRunner::new(config.engine);

    match cli.command {
        Commands::Validate => runner.run_validate()?,
        Commands::List {
            types,
            priorities,
            statuses,
            min_affected,
            max_affected,
            json,
        } => {
            let mut filter = RuleFilter {
                types,
                statuses,
                ..Default::default()
            }
            .with_affected_range(min_affected, max_affected);
            for priority in priorities {
                let priority = Priority::try_from(priority).map_err(anyhow::Error::msg)?;
                filter = filter.with_priority(priority);
            }
            runner.run_list(&filter, json)?;
        }
        Commands::Evaluate {
            config,
            is_final,
            timeout_ms,
            trace,
        } => runner.run_evaluate(&config, is_final, timeout_ms, trace)?,
        Commands::TestRule {
            rule_id,
            config,
            is_final,
        } => runner.run_test_rule(&rule_id, &config, is_final)?,
        Commands::Watch => runner.run_watch().await?,
    }

    Ok(())
}
