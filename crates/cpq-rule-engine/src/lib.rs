//! CPQ 配置规则引擎
//!
//! 针对候选产品配置评估兼容性、依赖、约束与定价规则：
//! - 规则摄入时按字段 schema 校验并编译为强类型谓词和动作
//! - AND 条件短路匹配，规则较多时并行
//! - 按优先级解析冲突，记录被覆盖的动作
//! - 百分比定价按累计价格复利折算
//! - 版本化快照发布与规则文件热更新

pub mod actions;
pub mod cli;
pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod resolver;
pub mod result;
pub mod snapshot;
pub mod store;
pub mod value;
pub mod watcher;

pub use compiler::{Action, CompiledRule, Condition, Predicate, RuleCompiler};
pub use engine::{EngineConfig, EvaluationEngine, EvaluationOptions, RuleTestReport};
pub use error::{Result, RuleError};
pub use models::{
    ActionDefinition, AdjustmentKind, ConditionDefinition, ConfigurationState, Priority,
    RuleDefinition, RuleSetDocument, RuleStatus, RuleType,
};
pub use operators::Operator;
pub use result::{
    EvaluationResult, Exclusion, PriceAdjustment, RequiredAddition, SuppressedAction, Violation,
    ViolationKind,
};
pub use snapshot::{RuleFilter, RuleSetSnapshot};
pub use store::RuleSetStore;
pub use value::{FieldSchema, FieldType, FieldValue, Selection};
pub use watcher::SnapshotWatcher;
