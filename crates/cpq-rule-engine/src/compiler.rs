//! 规则编译器
//!
//! 将编辑端提交的规则定义按字段 schema 校验，并编译成强类型的条件谓词和动作。
//! 所有类型错误都在这里拒绝，评估阶段不再做任何字符串解析。

use crate::error::{Result, RuleError};
use crate::models::{
    ActionDefinition, AdjustmentKind, ConditionDefinition, Priority, RuleDefinition,
    RuleSetDocument, RuleStatus, RuleType,
};
use crate::operators::Operator;
use crate::snapshot::RuleSetSnapshot;
use crate::value::{FieldSchema, FieldType, FieldValue};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// 编译后的条件谓词
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operator", content = "operand", rename_all = "snake_case")]
pub enum Predicate {
    Equals(FieldValue),
    NotEquals(FieldValue),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    GreaterThan(Decimal),
    LessThan(Decimal),
    Between(Decimal, Decimal),
}

impl Predicate {
    pub fn operator(&self) -> Operator {
        match self {
            Self::Equals(_) => Operator::Equals,
            Self::NotEquals(_) => Operator::NotEquals,
            Self::Contains(_) => Operator::Contains,
            Self::StartsWith(_) => Operator::StartsWith,
            Self::EndsWith(_) => Operator::EndsWith,
            Self::GreaterThan(_) => Operator::GreaterThan,
            Self::LessThan(_) => Operator::LessThan,
            Self::Between(_, _) => Operator::Between,
        }
    }
}

/// 编译后的条件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.predicate.operator().label();
        match &self.predicate {
            Predicate::Equals(v) | Predicate::NotEquals(v) => {
                write!(f, "{} {} \"{}\"", self.field, label, v)
            }
            Predicate::Contains(s) | Predicate::StartsWith(s) | Predicate::EndsWith(s) => {
                write!(f, "{} {} \"{}\"", self.field, label, s)
            }
            Predicate::GreaterThan(n) | Predicate::LessThan(n) => {
                write!(f, "{} {} {}", self.field, label, n.normalize())
            }
            Predicate::Between(low, high) => write!(
                f,
                "{} {} {} and {}",
                self.field,
                label,
                low.normalize(),
                high.normalize()
            ),
        }
    }
}

/// 编译后的动作
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Exclude {
        field: String,
        value: FieldValue,
    },
    Require {
        field: String,
        any_of: Vec<FieldValue>,
    },
    Bound {
        field: String,
        min: Option<Decimal>,
        max: Option<Decimal>,
    },
    MustEqual {
        field: String,
        value: FieldValue,
    },
    PriceAdjustment {
        amount: Decimal,
        kind: AdjustmentKind,
    },
}

impl Action {
    /// 动作作用的字段，定价动作没有字段
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Exclude { field, .. }
            | Self::Require { field, .. }
            | Self::Bound { field, .. }
            | Self::MustEqual { field, .. } => Some(field),
            Self::PriceAdjustment { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclude { field, value } => write!(f, "Exclude {} \"{}\"", field, value),
            Self::Require { field, any_of } => {
                let values: Vec<String> = any_of.iter().map(|v| format!("\"{}\"", v)).collect();
                write!(f, "Require {} {}", field, values.join(" or "))
            }
            Self::Bound { field, min, max } => match (min, max) {
                (Some(min), Some(max)) => write!(
                    f,
                    "{} must be between {} and {}",
                    field,
                    min.normalize(),
                    max.normalize()
                ),
                (Some(min), None) => write!(f, "{} must be at least {}", field, min.normalize()),
                (None, Some(max)) => write!(f, "{} must be at most {}", field, max.normalize()),
                (None, None) => write!(f, "{} is unconstrained", field),
            },
            Self::MustEqual { field, value } => write!(f, "{} must equal \"{}\"", field, value),
            Self::PriceAdjustment { amount, kind } => match kind {
                AdjustmentKind::Additive => write!(f, "Adjust price by {}", amount.normalize()),
                AdjustmentKind::Percentage => {
                    write!(f, "Adjust price by {}%", amount.normalize())
                }
            },
        }
    }
}

/// 编译后的规则
#[derive(Debug, Clone, Serialize)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub error_message: Option<String>,
    pub rule_type: RuleType,
    pub priority: Priority,
    pub status: RuleStatus,
    pub affected_products: u32,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    /// 条件与动作引用的所有字段
    pub required_fields: BTreeSet<String>,
}

impl CompiledRule {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    /// 规则编辑界面使用的条件摘要，如 `If Finish equals "Premium" AND Width greater than 8`
    pub fn condition_summary(&self) -> String {
        let parts: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        format!("If {}", parts.join(" AND "))
    }

    /// 动作摘要，多个动作以 `; ` 连接
    pub fn action_summary(&self) -> String {
        let parts: Vec<String> = self.actions.iter().map(|a| a.to_string()).collect();
        parts.join("; ")
    }
}

/// 规则编译器
pub struct RuleCompiler {
    schema: FieldSchema,
}

impl RuleCompiler {
    pub fn new(schema: FieldSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    /// 从 JSON 字符串编译单条规则
    pub fn compile_from_json(&self, json: &str) -> Result<CompiledRule> {
        let rule: RuleDefinition = serde_json::from_str(json)?;
        self.compile(&rule)
    }

    /// 编译规则集文档
    pub fn compile_document(&self, document: &RuleSetDocument) -> Result<RuleSetSnapshot> {
        self.compile_snapshot(document.version, &document.rules)
    }

    /// 从 JSON 字符串编译规则集文档
    pub fn compile_document_json(&self, json: &str) -> Result<RuleSetSnapshot> {
        let document = RuleSetDocument::from_json(json)?;
        self.compile_document(&document)
    }

    /// 读取并编译规则集文档文件
    pub fn compile_document_file(&self, path: impl AsRef<Path>) -> Result<RuleSetSnapshot> {
        let json = std::fs::read_to_string(path)?;
        self.compile_document_json(&json)
    }

    /// 编译整个快照
    ///
    /// 任一规则无效则整个快照被拒绝，不会产生部分有效的快照。
    #[instrument(skip(self, rules), fields(rules = rules.len()))]
    pub fn compile_snapshot(&self, version: u64, rules: &[RuleDefinition]) -> Result<RuleSetSnapshot> {
        let mut seen = HashSet::with_capacity(rules.len());
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if !seen.insert(rule.id.as_str()) {
                warn!(rule_id = %rule.id, "规则 ID 重复，拒绝整个快照");
                return Err(RuleError::invalid(&rule.id, "规则 ID 在快照中重复"));
            }
            compiled.push(self.compile(rule)?);
        }

        debug!(version, rules = compiled.len(), "规则集快照编译完成");
        Ok(RuleSetSnapshot::new(version, compiled))
    }

    /// 编译单条规则
    pub fn compile(&self, rule: &RuleDefinition) -> Result<CompiledRule> {
        if rule.id.is_empty() {
            return Err(RuleError::invalid("", "规则 ID 不能为空"));
        }

        if rule.name.is_empty() {
            return Err(RuleError::invalid(&rule.id, "规则名称不能为空"));
        }

        let priority =
            Priority::try_from(rule.priority).map_err(|reason| RuleError::invalid(&rule.id, reason))?;

        if rule.conditions.is_empty() {
            return Err(RuleError::invalid(&rule.id, "规则至少需要一个条件"));
        }

        if rule.actions.is_empty() {
            return Err(RuleError::invalid(&rule.id, "规则至少需要一个动作"));
        }

        let mut required_fields = BTreeSet::new();

        let conditions = rule
            .conditions
            .iter()
            .enumerate()
            .map(|(i, cond)| {
                let path = format!("conditions[{}]", i);
                let compiled = self.compile_condition(&rule.id, cond, &path)?;
                required_fields.insert(compiled.field.clone());
                Ok(compiled)
            })
            .collect::<Result<Vec<_>>>()?;

        let actions = rule
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let path = format!("actions[{}]", i);
                let compiled = self.compile_action(rule, action, &path)?;
                if let Some(field) = compiled.field() {
                    required_fields.insert(field.to_string());
                }
                Ok(compiled)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledRule {
            id: rule.id.clone(),
            name: rule.name.clone(),
            description: rule.description.clone(),
            error_message: rule.error_message.clone(),
            rule_type: rule.rule_type,
            priority,
            status: rule.status,
            affected_products: rule.affected_products,
            conditions,
            actions,
            required_fields,
        })
    }

    /// 查找字段类型
    fn field_type(&self, rule_id: &str, field: &str, path: &str) -> Result<FieldType> {
        if field.is_empty() {
            return Err(RuleError::invalid(rule_id, format!("{} 的字段不能为空", path)));
        }

        self.schema.field_type(field).ok_or_else(|| {
            RuleError::invalid(rule_id, format!("{} 引用了未知字段 '{}'", path, field))
        })
    }

    /// 编译条件
    fn compile_condition(
        &self,
        rule_id: &str,
        cond: &ConditionDefinition,
        path: &str,
    ) -> Result<Condition> {
        let field_type = self.field_type(rule_id, &cond.field, path)?;
        let operator = cond.operator;

        if operator.is_textual() && !field_type.is_textual() {
            return Err(RuleError::invalid(
                rule_id,
                format!(
                    "{} 的 {} 操作符只适用于字符串字段，'{}' 为 {} 字段",
                    path, operator, cond.field, field_type
                ),
            ));
        }

        if operator.is_numeric() && field_type.is_textual() {
            return Err(RuleError::invalid(
                rule_id,
                format!(
                    "{} 的 {} 操作符只适用于数值字段，'{}' 为 {} 字段",
                    path, operator, cond.field, field_type
                ),
            ));
        }

        let predicate = match operator {
            Operator::Between => {
                let (low, high) = self.between_operands(rule_id, &cond.value, path)?;
                Predicate::Between(low, high)
            }
            Operator::GreaterThan => {
                Predicate::GreaterThan(self.number_operand(rule_id, &cond.value, path)?)
            }
            Operator::LessThan => {
                Predicate::LessThan(self.number_operand(rule_id, &cond.value, path)?)
            }
            Operator::Contains => Predicate::Contains(self.text_operand(rule_id, &cond.value, path)?),
            Operator::StartsWith => {
                Predicate::StartsWith(self.text_operand(rule_id, &cond.value, path)?)
            }
            Operator::EndsWith => Predicate::EndsWith(self.text_operand(rule_id, &cond.value, path)?),
            Operator::Equals => {
                Predicate::Equals(self.typed_operand(rule_id, field_type, &cond.value, path)?)
            }
            Operator::NotEquals => {
                Predicate::NotEquals(self.typed_operand(rule_id, field_type, &cond.value, path)?)
            }
        };

        Ok(Condition {
            field: cond.field.clone(),
            predicate,
        })
    }

    /// 编译动作，并校验动作种类与规则类型匹配
    fn compile_action(
        &self,
        rule: &RuleDefinition,
        action: &ActionDefinition,
        path: &str,
    ) -> Result<Action> {
        let rule_id = rule.id.as_str();
        let allowed = matches!(
            (rule.rule_type, action),
            (RuleType::Compatibility, ActionDefinition::Exclude { .. })
                | (RuleType::Dependency, ActionDefinition::Require { .. })
                | (RuleType::Constraint, ActionDefinition::Bound { .. })
                | (RuleType::Constraint, ActionDefinition::MustEqual { .. })
                | (RuleType::Pricing, ActionDefinition::PriceAdjustment { .. })
        );

        if !allowed {
            return Err(RuleError::invalid(
                rule_id,
                format!(
                    "{} 的动作 {} 不能用于 {} 类型的规则",
                    path,
                    action.kind_name(),
                    rule.rule_type
                ),
            ));
        }

        match action {
            ActionDefinition::Exclude { field, value } => {
                let field_type = self.field_type(rule_id, field, path)?;
                Ok(Action::Exclude {
                    field: field.clone(),
                    value: self.typed_operand(rule_id, field_type, value, path)?,
                })
            }
            ActionDefinition::Require {
                field,
                value,
                any_of,
            } => {
                let field_type = self.field_type(rule_id, field, path)?;
                let raw: Vec<&Value> = match (value, any_of.is_empty()) {
                    (Some(v), true) => vec![v],
                    (None, false) => any_of.iter().collect(),
                    (Some(_), false) => {
                        return Err(RuleError::invalid(
                            rule_id,
                            format!("{} 的 require 动作不能同时指定 value 和 any_of", path),
                        ));
                    }
                    (None, true) => {
                        return Err(RuleError::invalid(
                            rule_id,
                            format!("{} 的 require 动作需要 value 或非空的 any_of", path),
                        ));
                    }
                };

                let mut values = Vec::with_capacity(raw.len());
                for v in raw {
                    let typed = self.typed_operand(rule_id, field_type, v, path)?;
                    if !values.contains(&typed) {
                        values.push(typed);
                    }
                }

                Ok(Action::Require {
                    field: field.clone(),
                    any_of: values,
                })
            }
            ActionDefinition::Bound { field, min, max } => {
                let field_type = self.field_type(rule_id, field, path)?;
                if field_type != FieldType::Numeric {
                    return Err(RuleError::invalid(
                        rule_id,
                        format!("{} 的 bound 动作只适用于数值字段，'{}' 为 {} 字段", path, field, field_type),
                    ));
                }

                let min = min
                    .as_ref()
                    .map(|v| self.number_operand(rule_id, v, path))
                    .transpose()?;
                let max = max
                    .as_ref()
                    .map(|v| self.number_operand(rule_id, v, path))
                    .transpose()?;

                match (min, max) {
                    (None, None) => Err(RuleError::invalid(
                        rule_id,
                        format!("{} 的 bound 动作至少需要 min 或 max", path),
                    )),
                    (Some(lo), Some(hi)) if lo > hi => Err(RuleError::invalid(
                        rule_id,
                        format!("{} 的 bound 动作 min({}) 大于 max({})", path, lo, hi),
                    )),
                    _ => Ok(Action::Bound {
                        field: field.clone(),
                        min,
                        max,
                    }),
                }
            }
            ActionDefinition::MustEqual { field, value } => {
                let field_type = self.field_type(rule_id, field, path)?;
                Ok(Action::MustEqual {
                    field: field.clone(),
                    value: self.typed_operand(rule_id, field_type, value, path)?,
                })
            }
            ActionDefinition::PriceAdjustment { amount, kind } => Ok(Action::PriceAdjustment {
                amount: *amount,
                kind: *kind,
            }),
        }
    }

    /// 与字段类型一致的单值操作数
    fn typed_operand(
        &self,
        rule_id: &str,
        field_type: FieldType,
        value: &Value,
        path: &str,
    ) -> Result<FieldValue> {
        let typed = FieldValue::from_json(value)
            .map_err(|e| RuleError::invalid(rule_id, format!("{}: {}", path, e)))?;

        if !field_type.accepts(&typed) {
            return Err(RuleError::invalid(
                rule_id,
                format!(
                    "{} 的值类型 {} 与 {} 字段不匹配",
                    path,
                    typed.type_name(),
                    field_type
                ),
            ));
        }

        Ok(typed)
    }

    fn number_operand(&self, rule_id: &str, value: &Value, path: &str) -> Result<Decimal> {
        match self.typed_operand(rule_id, FieldType::Numeric, value, path)? {
            FieldValue::Number(n) => Ok(n),
            FieldValue::Text(s) => Err(RuleError::invalid(
                rule_id,
                format!("{} 需要数值，实际为 \"{}\"", path, s),
            )),
        }
    }

    fn text_operand(&self, rule_id: &str, value: &Value, path: &str) -> Result<String> {
        match self.typed_operand(rule_id, FieldType::String, value, path)? {
            FieldValue::Text(s) => Ok(s),
            FieldValue::Number(n) => Err(RuleError::invalid(
                rule_id,
                format!("{} 需要字符串，实际为 {}", path, n),
            )),
        }
    }

    /// between 操作数：恰好两个有序数值
    fn between_operands(&self, rule_id: &str, value: &Value, path: &str) -> Result<(Decimal, Decimal)> {
        let arr = value.as_array().ok_or_else(|| {
            RuleError::invalid(rule_id, format!("{} 的 between 操作符需要 [low, high] 数组", path))
        })?;

        if arr.len() != 2 {
            return Err(RuleError::invalid(
                rule_id,
                format!(
                    "{} 的 between 操作符需要 [low, high] 数组，当前有 {} 个元素",
                    path,
                    arr.len()
                ),
            ));
        }

        let low = self.number_operand(rule_id, &arr[0], path)?;
        let high = self.number_operand(rule_id, &arr[1], path)?;

        if low > high {
            return Err(RuleError::invalid(
                rule_id,
                format!("{} 的 between 下界 {} 大于上界 {}", path, low, high),
            ));
        }

        Ok((low, high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::new()
            .with_field("Finish", FieldType::Enum)
            .with_field("Cabinet", FieldType::Enum)
            .with_field("Color", FieldType::String)
            .with_field("Width", FieldType::Numeric)
            .with_field("Appliances", FieldType::MultiSelect)
    }

    fn dependency_rule() -> RuleDefinition {
        RuleDefinition::new("Premium finish requires Premium cabinets", RuleType::Dependency)
            .with_id("rule-001")
            .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Premium"))
            .with_action(ActionDefinition::require("Cabinet", "Premium"))
    }

    fn reason_of(err: RuleError) -> String {
        match err {
            RuleError::InvalidRuleDefinition { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compile_valid_rule() {
        let compiler = RuleCompiler::new(schema());
        let compiled = compiler.compile(&dependency_rule()).unwrap();

        assert_eq!(compiled.id(), "rule-001");
        assert_eq!(compiled.priority, Priority::Medium);
        assert_eq!(
            compiled.conditions[0].predicate,
            Predicate::Equals(FieldValue::text("Premium"))
        );
        assert_eq!(
            compiled.actions[0],
            Action::Require {
                field: "Cabinet".to_string(),
                any_of: vec![FieldValue::text("Premium")],
            }
        );
        assert_eq!(compiled.required_fields.len(), 2);
    }

    #[test]
    fn test_compile_from_json() {
        let compiler = RuleCompiler::new(schema());
        let compiled = compiler
            .compile_from_json(
                r#"
                {
                    "id": "rule-002",
                    "name": "Width limit",
                    "type": "constraint",
                    "priority": 1,
                    "conditions": [
                        {"field": "Width", "operator": "between", "value": [8, 20]}
                    ],
                    "actions": [
                        {"type": "bound", "field": "Width", "min": 8, "max": 20}
                    ]
                }
                "#,
            )
            .unwrap();

        assert_eq!(compiled.priority, Priority::High);
        assert_eq!(
            compiled.conditions[0].predicate,
            Predicate::Between(Decimal::from(8), Decimal::from(20))
        );
    }

    #[test]
    fn test_reject_empty_conditions() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("no conditions", RuleType::Dependency)
            .with_action(ActionDefinition::require("Cabinet", "Premium"));

        let reason = reason_of(compiler.compile(&rule).unwrap_err());
        assert!(reason.contains("至少需要一个条件"));
    }

    #[test]
    fn test_reject_empty_actions() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("no actions", RuleType::Dependency).with_condition(
            ConditionDefinition::new("Finish", Operator::Equals, "Premium"),
        );

        let reason = reason_of(compiler.compile(&rule).unwrap_err());
        assert!(reason.contains("至少需要一个动作"));
    }

    #[test]
    fn test_reject_invalid_priority() {
        let compiler = RuleCompiler::new(schema());
        let rule = dependency_rule().with_priority(7);
        assert!(compiler.compile(&rule).is_err());
    }

    #[test]
    fn test_reject_textual_operator_on_numeric_field() {
        let compiler = RuleCompiler::new(schema());
        for operator in [Operator::Contains, Operator::StartsWith, Operator::EndsWith] {
            let rule = RuleDefinition::new("bad", RuleType::Dependency)
                .with_condition(ConditionDefinition::new("Width", operator, "1"))
                .with_action(ActionDefinition::require("Cabinet", "Premium"));

            let reason = reason_of(compiler.compile(&rule).unwrap_err());
            assert!(reason.contains("只适用于字符串字段"), "{operator}: {reason}");
        }
    }

    #[test]
    fn test_reject_numeric_operator_on_text_field() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("bad", RuleType::Dependency)
            .with_condition(ConditionDefinition::new("Finish", Operator::GreaterThan, 3))
            .with_action(ActionDefinition::require("Cabinet", "Premium"));

        let reason = reason_of(compiler.compile(&rule).unwrap_err());
        assert!(reason.contains("只适用于数值字段"));
    }

    #[test]
    fn test_reject_non_numeric_comparison_operand() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("bad", RuleType::Dependency)
            .with_condition(ConditionDefinition::new("Width", Operator::LessThan, "wide"))
            .with_action(ActionDefinition::require("Cabinet", "Premium"));

        assert!(compiler.compile(&rule).is_err());
    }

    #[test]
    fn test_reject_malformed_between() {
        let compiler = RuleCompiler::new(schema());

        for value in [json!(10), json!([1, 2, 3]), json!([20, 8]), json!(["a", "b"])] {
            let rule = RuleDefinition::new("bad", RuleType::Dependency)
                .with_condition(ConditionDefinition::new("Width", Operator::Between, value.clone()))
                .with_action(ActionDefinition::require("Cabinet", "Premium"));
            assert!(compiler.compile(&rule).is_err(), "should reject {}", value);
        }

        // 上下界相等是合法的闭区间
        let rule = RuleDefinition::new("ok", RuleType::Dependency)
            .with_condition(ConditionDefinition::new("Width", Operator::Between, json!([8, 8])))
            .with_action(ActionDefinition::require("Cabinet", "Premium"));
        assert!(compiler.compile(&rule).is_ok());
    }

    #[test]
    fn test_reject_action_type_mismatch() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("bad", RuleType::Compatibility)
            .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Basic"))
            .with_action(ActionDefinition::require("Cabinet", "Premium"));

        let reason = reason_of(compiler.compile(&rule).unwrap_err());
        assert!(reason.contains("不能用于 compatibility"));

        let rule = RuleDefinition::new("bad", RuleType::Pricing)
            .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Basic"))
            .with_action(ActionDefinition::bound("Width", Some(json!(1)), None));
        assert!(compiler.compile(&rule).is_err());
    }

    #[test]
    fn test_reject_unknown_field() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("bad", RuleType::Dependency)
            .with_condition(ConditionDefinition::new("Handle", Operator::Equals, "Bar"))
            .with_action(ActionDefinition::require("Cabinet", "Premium"));

        let reason = reason_of(compiler.compile(&rule).unwrap_err());
        assert!(reason.contains("未知字段 'Handle'"));
    }

    #[test]
    fn test_reject_value_type_mismatch_in_action() {
        let compiler = RuleCompiler::new(schema());
        let rule = RuleDefinition::new("bad", RuleType::Compatibility)
            .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Basic"))
            .with_action(ActionDefinition::exclude("Width", "wide"));
        assert!(compiler.compile(&rule).is_err());
    }

    #[test]
    fn test_require_value_or_any_of() {
        let compiler = RuleCompiler::new(schema());

        let missing = RuleDefinition::new("bad", RuleType::Dependency)
            .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Premium"))
            .with_action(ActionDefinition::require_any_of("Cabinet", vec![]));
        assert!(compiler.compile(&missing).is_err());

        let any_of = RuleDefinition::new("ok", RuleType::Dependency)
            .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Premium"))
            .with_action(ActionDefinition::require_any_of(
                "Cabinet",
                vec![json!("Premium"), json!("Luxury"), json!("Premium")],
            ));
        let compiled = compiler.compile(&any_of).unwrap();
        // 重复值被去重
        assert!(matches!(&compiled.actions[0], Action::Require { any_of, .. } if any_of.len() == 2));
    }

    #[test]
    fn test_reject_invalid_bound() {
        let compiler = RuleCompiler::new(schema());
        let base = || {
            RuleDefinition::new("bound", RuleType::Constraint)
                .with_condition(ConditionDefinition::new("Finish", Operator::Equals, "Premium"))
        };

        let empty = base().with_action(ActionDefinition::bound("Width", None, None));
        assert!(compiler.compile(&empty).is_err());

        let inverted = base().with_action(ActionDefinition::bound(
            "Width",
            Some(json!(20)),
            Some(json!(8)),
        ));
        assert!(compiler.compile(&inverted).is_err());

        let text_field = base().with_action(ActionDefinition::bound("Color", Some(json!(1)), None));
        assert!(compiler.compile(&text_field).is_err());
    }

    #[test]
    fn test_snapshot_rejects_duplicate_ids() {
        let compiler = RuleCompiler::new(schema());
        let rules = vec![dependency_rule(), dependency_rule()];

        let err = compiler.compile_snapshot(1, &rules).unwrap_err();
        assert!(reason_of(err).contains("重复"));
    }

    #[test]
    fn test_snapshot_rejected_when_any_rule_invalid() {
        let compiler = RuleCompiler::new(schema());
        let rules = vec![
            dependency_rule(),
            RuleDefinition::new("bad", RuleType::Dependency).with_id("rule-bad"),
        ];

        let err = compiler.compile_snapshot(1, &rules).unwrap_err();
        assert!(matches!(err, RuleError::InvalidRuleDefinition { rule_id, .. } if rule_id == "rule-bad"));
    }

    #[test]
    fn test_summaries() {
        let compiler = RuleCompiler::new(schema());
        let rule = dependency_rule().with_condition(ConditionDefinition::new(
            "Width",
            Operator::GreaterThan,
            8,
        ));
        let compiled = compiler.compile(&rule).unwrap();

        assert_eq!(
            compiled.condition_summary(),
            r#"If Finish equals "Premium" AND Width greater than 8"#
        );
        assert_eq!(compiled.action_summary(), r#"Require Cabinet "Premium""#);
    }
}
