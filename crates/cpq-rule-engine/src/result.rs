//! 评估结果模型

use crate::models::{AdjustmentKind, Priority};
use crate::value::FieldValue;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// 阻断性违规种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// 选中了被兼容性规则排除的值
    Excluded,
    /// 数值超出约束范围
    OutOfBounds,
    /// 与约束要求的值不一致
    NotEqual,
    /// 最终提交时依赖项仍未满足
    MissingRequirement,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Excluded => "excluded",
            Self::OutOfBounds => "out_of_bounds",
            Self::NotEqual => "not_equal",
            Self::MissingRequirement => "missing_requirement",
        };
        write!(f, "{}", s)
    }
}

/// 阻断性违规
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub rule_id: String,
    pub field: String,
    pub kind: ViolationKind,
    pub reason: String,
}

/// 需要补充的选择
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequiredAddition {
    pub rule_id: String,
    pub field: String,
    pub any_of: Vec<FieldValue>,
}

/// 前瞻性排除：当前未选中，但后续不可选择
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub rule_id: String,
    pub field: String,
    pub value: FieldValue,
}

/// 已应用的价格调整
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAdjustment {
    pub rule_id: String,
    /// 规则定义的调整量（货币单位或百分比）
    pub amount: Decimal,
    pub kind: AdjustmentKind,
    /// 按累计价格折算后的实际调整金额
    pub applied_amount: Decimal,
}

/// 被更高优先级规则覆盖的动作
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuppressedAction {
    pub rule_id: String,
    pub field: String,
    pub priority: Priority,
    pub winning_rule: String,
}

/// 配置评估结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub is_valid: bool,
    pub blocking_violations: Vec<Violation>,
    pub required_additions: Vec<RequiredAddition>,
    pub price_adjustments: Vec<PriceAdjustment>,
    pub total_price_delta: Decimal,
    pub exclusions: Vec<Exclusion>,
    pub suppressed: Vec<SuppressedAction>,
    /// 按解析顺序排列的触发规则 ID
    pub fired_rules: Vec<String>,
    pub snapshot_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

impl EvaluationResult {
    /// 结果的指标标签
    pub fn outcome(&self) -> &'static str {
        if self.is_valid { "valid" } else { "invalid" }
    }
}
