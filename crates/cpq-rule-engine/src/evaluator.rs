//! 条件评估器
//!
//! 针对一个配置快照评估单个已编译条件。评估是全函数：操作数类型已在编译阶段校验，
//! 配置值与字段类型不一致时比较直接不成立。

use crate::compiler::{Condition, Predicate};
use crate::models::ConfigurationState;
use crate::value::{FieldValue, Selection};
use rust_decimal::Decimal;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    pub fn evaluate(condition: &Condition, state: &ConfigurationState) -> bool {
        Self::evaluate_selection(state.get(&condition.field), &condition.predicate)
    }

    /// 评估字段选择项
    ///
    /// 字段未选择时只有 not_equals 成立；多选字段只要任一选中值满足即成立。
    pub fn evaluate_selection(selection: Option<&Selection>, predicate: &Predicate) -> bool {
        let selection = match selection {
            Some(s) if !s.is_empty() => s,
            _ => return matches!(predicate, Predicate::NotEquals(_)),
        };

        match predicate {
            Predicate::Equals(expected) => selection.contains(expected),
            Predicate::NotEquals(expected) => !selection.contains(expected),
            Predicate::Contains(needle) => Self::any_text(selection, |s| s.contains(needle.as_str())),
            Predicate::StartsWith(prefix) => {
                Self::any_text(selection, |s| s.starts_with(prefix.as_str()))
            }
            Predicate::EndsWith(suffix) => Self::any_text(selection, |s| s.ends_with(suffix.as_str())),
            Predicate::GreaterThan(bound) => Self::any_number(selection, |n| n > *bound),
            Predicate::LessThan(bound) => Self::any_number(selection, |n| n < *bound),
            Predicate::Between(low, high) => {
                Self::any_number(selection, |n| *low <= n && n <= *high)
            }
        }
    }

    fn any_text<F>(selection: &Selection, test: F) -> bool
    where
        F: Fn(&str) -> bool,
    {
        selection
            .values()
            .iter()
            .filter_map(FieldValue::as_text)
            .any(test)
    }

    fn any_number<F>(selection: &Selection, test: F) -> bool
    where
        F: Fn(Decimal) -> bool,
    {
        selection
            .values()
            .iter()
            .filter_map(FieldValue::as_number)
            .any(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(field: &str, predicate: Predicate) -> Condition {
        Condition {
            field: field.to_string(),
            predicate,
        }
    }

    fn state() -> ConfigurationState {
        ConfigurationState::new()
            .with("Finish", "Premium")
            .with("Color", "Walnut Brown")
            .with("Width", 12i64)
            .with(
                "Appliances",
                vec![FieldValue::text("Oven"), FieldValue::text("Hob")],
            )
            .with("Extras", Vec::<FieldValue>::new())
    }

    #[test]
    fn test_equals_is_case_sensitive() {
        let s = state();
        assert!(ConditionEvaluator::evaluate(
            &cond("Finish", Predicate::Equals(FieldValue::text("Premium"))),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Finish", Predicate::Equals(FieldValue::text("premium"))),
            &s
        ));
    }

    #[test]
    fn test_not_equals_is_negation() {
        let s = state();
        assert!(!ConditionEvaluator::evaluate(
            &cond("Finish", Predicate::NotEquals(FieldValue::text("Premium"))),
            &s
        ));
        assert!(ConditionEvaluator::evaluate(
            &cond("Finish", Predicate::NotEquals(FieldValue::text("Basic"))),
            &s
        ));
    }

    #[test]
    fn test_absent_field_asymmetry() {
        let s = state();
        assert!(ConditionEvaluator::evaluate(
            &cond("Handle", Predicate::NotEquals(FieldValue::text("Bar"))),
            &s
        ));

        let others = [
            Predicate::Equals(FieldValue::text("Bar")),
            Predicate::Contains("B".to_string()),
            Predicate::StartsWith("B".to_string()),
            Predicate::EndsWith("r".to_string()),
            Predicate::GreaterThan(Decimal::ZERO),
            Predicate::LessThan(Decimal::from(100)),
            Predicate::Between(Decimal::ZERO, Decimal::from(100)),
        ];
        for predicate in others {
            assert!(
                !ConditionEvaluator::evaluate(&cond("Handle", predicate.clone()), &s),
                "{:?} should be false on an absent field",
                predicate
            );
        }
    }

    #[test]
    fn test_empty_multi_select_is_absent() {
        let s = state();
        assert!(ConditionEvaluator::evaluate(
            &cond("Extras", Predicate::NotEquals(FieldValue::text("Sink"))),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Extras", Predicate::Contains(String::new())),
            &s
        ));
    }

    #[test]
    fn test_multi_select_membership() {
        let s = state();
        assert!(ConditionEvaluator::evaluate(
            &cond("Appliances", Predicate::Equals(FieldValue::text("Hob"))),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Appliances", Predicate::NotEquals(FieldValue::text("Hob"))),
            &s
        ));
        assert!(ConditionEvaluator::evaluate(
            &cond("Appliances", Predicate::NotEquals(FieldValue::text("Fridge"))),
            &s
        ));
    }

    #[test]
    fn test_text_operators() {
        let s = state();
        assert!(ConditionEvaluator::evaluate(
            &cond("Color", Predicate::Contains("nut".to_string())),
            &s
        ));
        assert!(ConditionEvaluator::evaluate(
            &cond("Color", Predicate::StartsWith("Walnut".to_string())),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Color", Predicate::EndsWith("Walnut".to_string())),
            &s
        ));
    }

    #[test]
    fn test_numeric_operators() {
        let s = state();
        assert!(ConditionEvaluator::evaluate(
            &cond("Width", Predicate::GreaterThan(Decimal::from(8))),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Width", Predicate::LessThan(Decimal::from(12))),
            &s
        ));
        // between 为闭区间
        assert!(ConditionEvaluator::evaluate(
            &cond("Width", Predicate::Between(Decimal::from(12), Decimal::from(20))),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Width", Predicate::Between(Decimal::from(13), Decimal::from(20))),
            &s
        ));
    }

    #[test]
    fn test_type_mismatch_fails_comparison() {
        let s = ConfigurationState::new().with("Width", "wide");
        assert!(!ConditionEvaluator::evaluate(
            &cond("Width", Predicate::GreaterThan(Decimal::ZERO)),
            &s
        ));
        assert!(!ConditionEvaluator::evaluate(
            &cond("Width", Predicate::Equals(FieldValue::from(10))),
            &s
        ));
    }
}
