//! 配置值模型
//!
//! 字段值、选择项与字段 schema。数值统一使用 `rust_decimal::Decimal`，不使用浮点数。

use crate::error::{Result, RuleError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// 单个字段值
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn number(value: impl Into<Decimal>) -> Self {
        Self::Number(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Number(_) => "number",
        }
    }

    /// 从 JSON 值转换
    ///
    /// 字符串映射为 Text，数字按十进制文本精确解析为 Number，其他类型拒绝。
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Number(n) => {
                let repr = n.to_string();
                Decimal::from_str(&repr)
                    .or_else(|_| Decimal::from_scientific(&repr))
                    .map(Self::Number)
                    .map_err(|e| RuleError::InvalidValue(format!("数值 '{}' 无法表示: {}", repr, e)))
            }
            other => Err(RuleError::InvalidValue(format!(
                "不支持的值类型 {}，只接受字符串或数字",
                json_type_name(other)
            ))),
        }
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_json(&value)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => {
                let number = serde_json::Number::from_str(&n.normalize().to_string())
                    .map_err(serde::ser::Error::custom)?;
                number.serialize(serializer)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n.normalize()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(Decimal::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(Decimal::from(value))
    }
}

/// 字段的选择结果：单选字段一个值，多选字段一组值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Single(FieldValue),
    Multi(Vec<FieldValue>),
}

impl Selection {
    pub fn values(&self) -> &[FieldValue] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Multi(vs) => vs,
        }
    }

    pub fn contains(&self, value: &FieldValue) -> bool {
        self.values().contains(value)
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl From<FieldValue> for Selection {
    fn from(value: FieldValue) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Self::Single(FieldValue::from(value))
    }
}

impl From<i64> for Selection {
    fn from(value: i64) -> Self {
        Self::Single(FieldValue::from(value))
    }
}

impl From<i32> for Selection {
    fn from(value: i32) -> Self {
        Self::Single(FieldValue::from(value))
    }
}

impl From<Decimal> for Selection {
    fn from(value: Decimal) -> Self {
        Self::Single(FieldValue::Number(value))
    }
}

impl From<Vec<FieldValue>> for Selection {
    fn from(values: Vec<FieldValue>) -> Self {
        Self::Multi(values)
    }
}

/// 字段类型（由配置器/目录服务提供）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Numeric,
    Enum,
    MultiSelect,
}

impl FieldType {
    /// 字段是否接受文本操作数
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::Numeric)
    }

    /// 值的类型是否与字段类型一致
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match value {
            FieldValue::Text(_) => self.is_textual(),
            FieldValue::Number(_) => !self.is_textual(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Numeric => "numeric",
            Self::Enum => "enum",
            Self::MultiSelect => "multi_select",
        };
        write!(f, "{}", s)
    }
}

/// 字段 schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub fields: BTreeMap<String, FieldType>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 从 JSON 文件读取
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
