//! CLI 模块
//!
//! `cpq-eval` 命令行工具，包装规则引擎库：
//!
//! - `validate` - 编译规则集并报告定义错误
//! - `list` - 按类型、优先级、状态、受影响产品数筛选规则
//! - `evaluate` - 评估一个配置文件
//! - `test-rule` - 单条规则试运行
//! - `watch` - 监听规则集文件并热更新
//!
//! # 使用示例
//!
//! ```bash
//! cpq-eval --rules config/rules.json --schema config/schema.json validate
//! cpq-eval list --type dependency --priority 1
//! cpq-eval evaluate -c kitchen.json --final
//! cpq-eval test-rule -r rule-001 -c kitchen.json
//! ```

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::CommandRunner;
