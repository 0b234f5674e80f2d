//! 规则引擎领域模型
//!
//! 这里是规则编辑端提交的原始记录（可序列化），经 [`crate::compiler::RuleCompiler`]
//! 校验后才会变成评估时使用的强类型规则。

use crate::error::Result;
use crate::value::Selection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::operators::Operator;

/// 规则类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Compatibility,
    Dependency,
    Constraint,
    Pricing,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compatibility => "compatibility",
            Self::Dependency => "dependency",
            Self::Constraint => "constraint",
            Self::Pricing => "pricing",
        };
        write!(f, "{}", s)
    }
}

/// 规则优先级，数值越小优先级越高
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High (Critical)",
            Self::Medium => "Medium (Important)",
            Self::Low => "Low (Optional)",
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::High),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Low),
            other => Err(format!("优先级必须为 1、2 或 3，实际为 {}", other)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", *self as u8)
    }
}

/// 规则状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    #[default]
    Active,
    Inactive,
}

/// 价格调整方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// 按货币单位加减
    Additive,
    /// 按当前累计价格的百分比调整
    Percentage,
}

/// 规则定义（编辑端提交的原始记录）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 规则失败时展示给用户的提示，为空时由引擎生成
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "type", alias = "rule_type")]
    pub rule_type: RuleType,
    pub conditions: Vec<ConditionDefinition>,
    pub actions: Vec<ActionDefinition>,
    /// 原始优先级数值，摄入时校验为 [`Priority`]
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub status: RuleStatus,
    /// 受影响的产品数量（仅用于筛选和展示）
    #[serde(default)]
    pub affected_products: u32,
}

fn default_priority() -> u8 {
    Priority::Medium as u8
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            error_message: None,
            rule_type,
            conditions: Vec::new(),
            actions: Vec::new(),
            priority: default_priority(),
            status: RuleStatus::Active,
            affected_products: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: ConditionDefinition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.status = status;
        self
    }
}

/// 条件定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub field: String,
    pub operator: Operator,
    /// 单个值；between 为 [low, high] 数组
    pub value: Value,
}

impl ConditionDefinition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// 动作定义
///
/// 动作种类必须与所属规则的类型匹配：
/// compatibility → exclude，dependency → require，
/// constraint → bound / must_equal，pricing → price_adjustment。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDefinition {
    Exclude {
        field: String,
        value: Value,
    },
    Require {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        any_of: Vec<Value>,
    },
    Bound {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Value>,
    },
    MustEqual {
        field: String,
        value: Value,
    },
    PriceAdjustment {
        amount: Decimal,
        kind: AdjustmentKind,
    },
}

impl ActionDefinition {
    pub fn exclude(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Exclude {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn require(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Require {
            field: field.into(),
            value: Some(value.into()),
            any_of: Vec::new(),
        }
    }

    pub fn require_any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Require {
            field: field.into(),
            value: None,
            any_of: values,
        }
    }

    pub fn bound(field: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        Self::Bound {
            field: field.into(),
            min,
            max,
        }
    }

    pub fn must_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::MustEqual {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn price(amount: Decimal, kind: AdjustmentKind) -> Self {
        Self::PriceAdjustment { amount, kind }
    }

    /// 动作种类名称
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Exclude { .. } => "exclude",
            Self::Require { .. } => "require",
            Self::Bound { .. } => "bound",
            Self::MustEqual { .. } => "must_equal",
            Self::PriceAdjustment { .. } => "price_adjustment",
        }
    }
}

/// 规则集快照文档
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDocument {
    pub version: u64,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl RuleSetDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// 候选产品配置快照
///
/// 字段名到选择项的不可变映射，另带一个用于百分比定价的基础价格。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationState {
    #[serde(default)]
    base_price: Decimal,
    #[serde(default)]
    selections: BTreeMap<String, Selection>,
}

impl ConfigurationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, selection: impl Into<Selection>) -> Self {
        self.selections.insert(field.into(), selection.into());
        self
    }

    pub fn with_base_price(mut self, base_price: Decimal) -> Self {
        self.base_price = base_price;
        self
    }

    /// 获取字段的选择项，空的多选视为未选择
    pub fn get(&self, field: &str) -> Option<&Selection> {
        self.selections.get(field).filter(|s| !s.is_empty())
    }

    pub fn base_price(&self) -> Decimal {
        self.base_price
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.selections.keys().map(String::as_str)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
