//! 冲突解析
//!
//! 触发规则按 (优先级, ID) 排序。同一字段上优先级数值最小的规则获胜，
//! 该优先级的所有动作都生效，更低优先级的动作记录为被覆盖。
//! 获胜优先级内部互相矛盾的动作视为无法解决的冲突。

use crate::compiler::{Action, CompiledRule};
use crate::error::{Result, RuleError};
use crate::models::{AdjustmentKind, Priority};
use crate::result::{PriceAdjustment, SuppressedAction};
use crate::value::FieldValue;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// 冲突解析结果
#[derive(Debug, Default)]
pub struct Resolution<'a> {
    /// 按解析顺序排列的触发规则
    pub ordered: Vec<&'a CompiledRule>,
    /// 按解析顺序生效的动作
    pub applied: Vec<(&'a CompiledRule, &'a Action)>,
    pub suppressed: Vec<SuppressedAction>,
}

/// 字段上的获胜者
struct Winner<'a> {
    priority: Priority,
    rule_id: &'a str,
}

/// 获胜优先级内某字段上的生效动作
#[derive(Default)]
struct FieldActions<'a> {
    excludes: Vec<(&'a str, &'a FieldValue)>,
    requires: Vec<(&'a str, &'a [FieldValue])>,
    must_equals: Vec<(&'a str, &'a FieldValue)>,
    bounds: Vec<(&'a str, Option<Decimal>, Option<Decimal>)>,
}

/// 冲突解析器
pub struct ConflictResolver;

impl ConflictResolver {
    /// 按优先级升序、ID 升序排序
    pub fn order(rules: &mut [&CompiledRule]) {
        rules.sort_by(|a, b| (a.priority, a.id.as_str()).cmp(&(b.priority, b.id.as_str())));
    }

    /// 解析触发规则
    ///
    /// 覆盖按字段而不是按取值判断：`P1 exclude Countertop=Laminate` 会同时覆盖
    /// `P3 exclude Countertop=Tile`，此时 Tile 不再被排除。
    pub fn resolve<'a>(mut fired: Vec<&'a CompiledRule>) -> Result<Resolution<'a>> {
        Self::order(&mut fired);

        // 已排序，第一个作用于字段的规则即获胜者
        let mut winners: BTreeMap<&'a str, Winner<'a>> = BTreeMap::new();
        for &rule in &fired {
            for field in rule.actions.iter().filter_map(Action::field) {
                winners.entry(field).or_insert(Winner {
                    priority: rule.priority,
                    rule_id: rule.id.as_str(),
                });
            }
        }

        let mut applied = Vec::new();
        let mut suppressed = Vec::new();
        let mut suppressed_keys: HashSet<(&str, &str)> = HashSet::new();
        let mut by_field: BTreeMap<&'a str, FieldActions<'a>> = BTreeMap::new();

        for &rule in &fired {
            for action in &rule.actions {
                let Some(field) = action.field() else {
                    applied.push((rule, action));
                    continue;
                };

                // 每个字段都在上面登记过获胜者
                let Some(winner) = winners.get(field) else {
                    continue;
                };

                if rule.priority != winner.priority {
                    if suppressed_keys.insert((rule.id.as_str(), field)) {
                        debug!(
                            rule_id = %rule.id,
                            field,
                            winning_rule = winner.rule_id,
                            "动作被更高优先级规则覆盖"
                        );
                        suppressed.push(SuppressedAction {
                            rule_id: rule.id.clone(),
                            field: field.to_string(),
                            priority: rule.priority,
                            winning_rule: winner.rule_id.to_string(),
                        });
                    }
                    continue;
                }

                let entry = by_field.entry(field).or_default();
                match action {
                    Action::Exclude { value, .. } => entry.excludes.push((rule.id.as_str(), value)),
                    Action::Require { any_of, .. } => {
                        entry.requires.push((rule.id.as_str(), any_of.as_slice()))
                    }
                    Action::MustEqual { value, .. } => {
                        entry.must_equals.push((rule.id.as_str(), value))
                    }
                    Action::Bound { min, max, .. } => {
                        entry.bounds.push((rule.id.as_str(), *min, *max))
                    }
                    Action::PriceAdjustment { .. } => {}
                }
                applied.push((rule, action));
            }
        }

        for (field, actions) in &by_field {
            Self::check_contradictions(field, actions)?;
        }

        Ok(Resolution {
            ordered: fired,
            applied,
            suppressed,
        })
    }

    /// 检测同一字段上获胜优先级内的矛盾动作
    fn check_contradictions(field: &str, actions: &FieldActions<'_>) -> Result<()> {
        // 两个 must_equal 要求不同的值
        if let Some((first, value)) = actions.must_equals.first() {
            if let Some((second, _)) = actions.must_equals.iter().find(|(_, v)| v != value) {
                return Err(Self::conflict(field, first, second));
            }
        }

        // must_equal 的值被排除
        for (must_rule, value) in &actions.must_equals {
            if let Some((exclude_rule, _)) = actions.excludes.iter().find(|(_, v)| v == value) {
                return Err(Self::conflict(field, must_rule, exclude_rule));
            }
        }

        // require 的所有候选值都被排除
        for (require_rule, any_of) in &actions.requires {
            let excluding: Option<Vec<&str>> = any_of
                .iter()
                .map(|candidate| {
                    actions
                        .excludes
                        .iter()
                        .find(|(_, v)| *v == candidate)
                        .map(|(rule_id, _)| *rule_id)
                })
                .collect();

            if let Some(first_excluder) = excluding.and_then(|rules| rules.first().copied()) {
                return Err(Self::conflict(field, require_rule, first_excluder));
            }
        }

        // must_equal 的值不在 require 的候选值中
        for (must_rule, value) in &actions.must_equals {
            if let Some((require_rule, _)) = actions
                .requires
                .iter()
                .find(|(_, any_of)| !any_of.contains(*value))
            {
                return Err(Self::conflict(field, must_rule, require_rule));
            }
        }

        if actions.bounds.is_empty() {
            return Ok(());
        }

        // bound 交集为空
        let mut lower: Option<(&str, Decimal)> = None;
        let mut upper: Option<(&str, Decimal)> = None;
        for (rule_id, min, max) in &actions.bounds {
            if let Some(min) = min {
                if lower.is_none_or(|(_, lo)| *min > lo) {
                    lower = Some((*rule_id, *min));
                }
            }
            if let Some(max) = max {
                if upper.is_none_or(|(_, hi)| *max < hi) {
                    upper = Some((*rule_id, *max));
                }
            }
        }

        if let (Some((lo_rule, lo)), Some((hi_rule, hi))) = (lower, upper) {
            if lo > hi {
                return Err(Self::conflict(field, lo_rule, hi_rule));
            }
        }

        // 返回越界一侧的 bound 规则，非数值视为越界
        let violated_by = |value: &FieldValue| {
            let Some(n) = value.as_number() else {
                return lower.or(upper).map(|(rule_id, _)| rule_id);
            };
            match (lower, upper) {
                (Some((rule_id, lo)), _) if n < lo => Some(rule_id),
                (_, Some((rule_id, hi))) if n > hi => Some(rule_id),
                _ => None,
            }
        };

        // must_equal 的值落在 bound 之外
        for (must_rule, value) in &actions.must_equals {
            if let Some(bound_rule) = violated_by(*value) {
                return Err(Self::conflict(field, must_rule, bound_rule));
            }
        }

        // require 的所有候选值都落在 bound 之外
        for (require_rule, any_of) in &actions.requires {
            let outside: Option<Vec<&str>> = any_of.iter().map(&violated_by).collect();
            if let Some(bound_rule) = outside.and_then(|rules| rules.first().copied()) {
                return Err(Self::conflict(field, require_rule, bound_rule));
            }
        }

        Ok(())
    }

    fn conflict(field: &str, first_rule: &str, second_rule: &str) -> RuleError {
        warn!(field, first_rule, second_rule, "同优先级规则动作互斥");
        RuleError::UnresolvableConflict {
            field: field.to_string(),
            first_rule: first_rule.to_string(),
            second_rule: second_rule.to_string(),
        }
    }
}

/// 价格累加器
///
/// 按解析顺序折叠价格调整：固定金额直接累加，百分比按当前累计价格折算。
#[derive(Debug, Clone, Copy)]
pub struct PriceLedger {
    base: Decimal,
    running: Decimal,
}

impl PriceLedger {
    pub fn new(base: Decimal) -> Self {
        Self {
            base,
            running: base,
        }
    }

    pub fn apply(&mut self, rule_id: &str, amount: Decimal, kind: AdjustmentKind) -> Result<PriceAdjustment> {
        let applied_amount = match kind {
            AdjustmentKind::Additive => amount,
            AdjustmentKind::Percentage => self
                .running
                .checked_mul(amount)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                .ok_or_else(|| Self::overflow(rule_id))?,
        };

        self.running = self
            .running
            .checked_add(applied_amount)
            .ok_or_else(|| Self::overflow(rule_id))?;

        Ok(PriceAdjustment {
            rule_id: rule_id.to_string(),
            amount,
            kind,
            applied_amount,
        })
    }

    pub fn running(&self) -> Decimal {
        self.running
    }

    /// 相对基础价格的总调整
    pub fn delta(&self) -> Result<Decimal> {
        self.running
            .checked_sub(self.base)
            .ok_or_else(|| RuleError::InvalidValue("总价格调整超出可表示范围".to_string()))
    }

    fn overflow(rule_id: &str) -> RuleError {
        RuleError::InvalidValue(format!("规则 {} 的价格调整超出可表示范围", rule_id))
    }
}
