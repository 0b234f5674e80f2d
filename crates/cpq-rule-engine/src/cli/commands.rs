//! CLI 命令定义

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use crate::models::{RuleStatus, RuleType};

/// CPQ 配置规则引擎命令行工具
#[derive(Parser, Debug)]
#[command(name = "cpq-eval")]
#[command(version, about = "CPQ 配置规则评估工具")]
#[command(propagate_version = true)]
pub struct Cli {
    /// 日志级别，覆盖配置文件 (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// 规则集快照文件，覆盖配置文件中的 engine.rules_path
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// 字段 schema 文件，覆盖配置文件中的 engine.schema_path
    #[arg(long)]
    pub schema: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 子命令枚举
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 编译规则集并报告定义错误
    Validate,

    /// 列出规则
    ///
    /// 同一选项可重复指定，多个取值之间为 OR。
    List {
        /// 规则类型
        #[arg(long = "type", value_parser = parse_enum::<RuleType>)]
        types: Vec<RuleType>,

        /// 优先级 (1-3)
        #[arg(long = "priority", value_parser = clap::value_parser!(u8).range(1..=3))]
        priorities: Vec<u8>,

        /// 规则状态 (active, inactive)
        #[arg(long = "status", value_parser = parse_enum::<RuleStatus>)]
        statuses: Vec<RuleStatus>,

        /// 最少受影响产品数
        #[arg(long)]
        min_affected: Option<u32>,

        /// 最多受影响产品数
        #[arg(long)]
        max_affected: Option<u32>,

        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 评估配置文件
    Evaluate {
        /// 配置文件（JSON）
        #[arg(short, long)]
        config: PathBuf,

        /// 按最终提交评估，未满足的依赖为阻断违规
        #[arg(long = "final")]
        is_final: bool,

        /// 超时（毫秒）
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// 输出匹配追踪
        #[arg(long)]
        trace: bool,
    },

    /// 单条规则试运行
    TestRule {
        /// 规则 ID
        #[arg(short, long)]
        rule_id: String,

        /// 配置文件（JSON）
        #[arg(short, long)]
        config: PathBuf,

        /// 按最终提交评估
        #[arg(long = "final")]
        is_final: bool,
    },

    /// 监听规则集文件并热更新，Ctrl+C 退出
    Watch,
}

/// 解析 snake_case 枚举取值
fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("无效的取值: {}", value))
}
