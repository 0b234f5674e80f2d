//! 动作执行
//!
//! 将已触发规则的单个动作作用于配置快照，产出一个 [`Effect`]。
//! 价格调整的折算依赖累计价格，由冲突解析阶段完成。

use crate::compiler::{Action, CompiledRule};
use crate::models::{AdjustmentKind, ConfigurationState};
use crate::result::{Exclusion, RequiredAddition, Violation, ViolationKind};
use crate::value::FieldValue;
use rust_decimal::Decimal;

/// 动作效果
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// 动作条件已满足，无需处理
    Satisfied,
    Violation(Violation),
    Exclusion(Exclusion),
    RequiredAddition(RequiredAddition),
    Price { amount: Decimal, kind: AdjustmentKind },
}

/// 动作执行器
pub struct ActionApplier;

impl ActionApplier {
    pub fn apply(rule: &CompiledRule, action: &Action, state: &ConfigurationState) -> Effect {
        match action {
            Action::Exclude { field, value } => Self::exclude(rule, field, value, state),
            Action::Require { field, any_of } => Self::require(rule, field, any_of, state),
            Action::Bound { field, min, max } => Self::bound(rule, field, *min, *max, state),
            Action::MustEqual { field, value } => Self::must_equal(rule, field, value, state),
            Action::PriceAdjustment { amount, kind } => Effect::Price {
                amount: *amount,
                kind: *kind,
            },
        }
    }

    fn exclude(
        rule: &CompiledRule,
        field: &str,
        value: &FieldValue,
        state: &ConfigurationState,
    ) -> Effect {
        let selected = state.get(field).is_some_and(|s| s.contains(value));

        if selected {
            Effect::Violation(Self::violation(
                rule,
                field,
                ViolationKind::Excluded,
                || format!("{} \"{}\" 与规则 '{}' 不兼容", field, value, rule.name),
            ))
        } else {
            Effect::Exclusion(Exclusion {
                rule_id: rule.id.clone(),
                field: field.to_string(),
                value: value.clone(),
            })
        }
    }

    fn require(
        rule: &CompiledRule,
        field: &str,
        any_of: &[FieldValue],
        state: &ConfigurationState,
    ) -> Effect {
        let satisfied = state
            .get(field)
            .is_some_and(|s| any_of.iter().any(|v| s.contains(v)));

        if satisfied {
            Effect::Satisfied
        } else {
            Effect::RequiredAddition(RequiredAddition {
                rule_id: rule.id.clone(),
                field: field.to_string(),
                any_of: any_of.to_vec(),
            })
        }
    }

    fn bound(
        rule: &CompiledRule,
        field: &str,
        min: Option<Decimal>,
        max: Option<Decimal>,
        state: &ConfigurationState,
    ) -> Effect {
        let Some(selection) = state.get(field) else {
            return Effect::Satisfied;
        };

        // 非数值的选择值无法判断是否落在范围内，按违规处理
        let within = selection.values().iter().all(|v| {
            v.as_number().is_some_and(|n| {
                min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
            })
        });

        if within {
            return Effect::Satisfied;
        }

        Effect::Violation(Self::violation(rule, field, ViolationKind::OutOfBounds, || {
            let actual = selection
                .values()
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let range = match (min, max) {
                (Some(lo), Some(hi)) => format!("[{}, {}]", lo.normalize(), hi.normalize()),
                (Some(lo), None) => format!(">= {}", lo.normalize()),
                (None, Some(hi)) => format!("<= {}", hi.normalize()),
                (None, None) => "任意值".to_string(),
            };
            format!("{} 的值 {} 超出允许范围 {}", field, actual, range)
        }))
    }

    fn must_equal(
        rule: &CompiledRule,
        field: &str,
        value: &FieldValue,
        state: &ConfigurationState,
    ) -> Effect {
        let Some(selection) = state.get(field) else {
            return Effect::Satisfied;
        };

        if selection.values().iter().all(|v| v == value) {
            return Effect::Satisfied;
        }

        Effect::Violation(Self::violation(rule, field, ViolationKind::NotEqual, || {
            format!("{} 必须为 \"{}\"", field, value)
        }))
    }

    /// 规则配置了错误提示时优先使用
    fn violation<F>(rule: &CompiledRule, field: &str, kind: ViolationKind, default_reason: F) -> Violation
    where
        F: FnOnce() -> String,
    {
        Violation {
            rule_id: rule.id.clone(),
            field: field.to_string(),
            kind,
            reason: rule.error_message.clone().unwrap_or_else(default_reason),
        }
    }
}
