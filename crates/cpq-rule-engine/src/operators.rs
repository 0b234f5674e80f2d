//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 反序列化同时接受 snake_case 与规则编辑界面使用的空格/连字符写法（如 "not equals"）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // 通用比较
    #[serde(alias = "eq")]
    Equals,
    #[serde(alias = "not equals", alias = "not-equals", alias = "neq")]
    NotEquals,

    // 字符串操作
    Contains,
    #[serde(alias = "starts with", alias = "starts-with")]
    StartsWith,
    #[serde(alias = "ends with", alias = "ends-with")]
    EndsWith,

    // 数值比较
    #[serde(alias = "greater than", alias = "greater-than", alias = "gt")]
    GreaterThan,
    #[serde(alias = "less than", alias = "less-than", alias = "lt")]
    LessThan,
    Between,
}

impl Operator {
    /// 仅适用于字符串字段的操作符
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }

    /// 仅适用于数值字段的操作符
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::GreaterThan | Self::LessThan | Self::Between)
    }

    /// 规则编辑界面中的展示文本
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::GreaterThan => "greater than",
            Self::LessThan => "less than",
            Self::Between => "between",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Between => "between",
        };
        write!(f, "{}", s)
    }
}
