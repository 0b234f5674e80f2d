//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// 快照构建（规则摄入）阶段的定义错误，整个快照被拒绝
    #[error("无效的规则定义: rule_id={rule_id}, {reason}")]
    InvalidRuleDefinition { rule_id: String, reason: String },

    /// 同优先级规则在同一字段上产生互斥动作
    #[error("无法解决的规则冲突: 字段 {field} 上 {first_rule} 与 {second_rule} 互斥")]
    UnresolvableConflict {
        field: String,
        first_rule: String,
        second_rule: String,
    },

    #[error("规则评估超时: 超过 {timeout_ms}ms")]
    EvaluationTimeout { timeout_ms: u64 },

    #[error("快照版本过旧: 当前 {current}, 提交 {offered}")]
    StaleSnapshot { current: u64, offered: u64 },

    #[error("无效的字段值: {0}")]
    InvalidValue(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("读取文件失败: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    pub(crate) fn invalid(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRuleDefinition {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRuleDefinition { .. } => "INVALID_RULE_DEFINITION",
            Self::UnresolvableConflict { .. } => "UNRESOLVABLE_CONFLICT",
            Self::EvaluationTimeout { .. } => "EVALUATION_TIMEOUT",
            Self::StaleSnapshot { .. } => "STALE_SNAPSHOT",
            Self::InvalidValue(_) => "INVALID_VALUE",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
