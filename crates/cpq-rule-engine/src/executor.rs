//! 规则匹配器
//!
//! 条件之间为 AND 关系，遇到第一个不成立的条件立即短路，可选地记录评估追踪。

use crate::compiler::CompiledRule;
use crate::evaluator::ConditionEvaluator;
use crate::models::ConfigurationState;
use serde::Serialize;

/// 单条规则的匹配结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub rule_id: String,
    pub fired: bool,
    /// 成立的条件摘要
    pub matched_conditions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

/// 规则匹配器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleMatcher {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// 规则是否触发，非激活规则永不触发
    pub fn fires(&self, rule: &CompiledRule, state: &ConfigurationState) -> bool {
        rule.is_active()
            && rule
                .conditions
                .iter()
                .all(|cond| ConditionEvaluator::evaluate(cond, state))
    }

    /// 执行匹配并返回详细结果
    pub fn execute(&self, rule: &CompiledRule, state: &ConfigurationState) -> MatchOutcome {
        let mut outcome = MatchOutcome {
            rule_id: rule.id.clone(),
            ..Default::default()
        };

        if !rule.is_active() {
            if self.trace_enabled {
                outcome.trace.push(format!("{}: 规则未激活，跳过", rule.id));
            }
            return outcome;
        }

        for (i, cond) in rule.conditions.iter().enumerate() {
            let matched = ConditionEvaluator::evaluate(cond, state);

            if self.trace_enabled {
                outcome.trace.push(format!(
                    "conditions[{}]: {} => {}",
                    i,
                    cond,
                    if matched { "MATCHED" } else { "NOT_MATCHED" }
                ));
            }

            if !matched {
                if self.trace_enabled {
                    outcome
                        .trace
                        .push(format!("AND 短路 - 条件 {} 不成立", i));
                }
                return outcome;
            }

            outcome.matched_conditions.push(cond.to_string());
        }

        if self.trace_enabled {
            outcome.trace.push("AND 条件全部成立".to_string());
        }

        outcome.fired = true;
        outcome
    }
}
