//! 配置评估引擎
//!
//! 评估流程：筛选激活规则 → 匹配（规则较多时并行）→ 冲突解析 → 按序执行动作 →
//! 最终提交时将未满足的依赖提升为阻断违规。引擎本身不持有可变状态。

use crate::actions::{ActionApplier, Effect};
use crate::compiler::CompiledRule;
use crate::error::{Result, RuleError};
use crate::executor::{MatchOutcome, RuleMatcher};
use crate::models::{ConfigurationState, RuleStatus};
use crate::resolver::{ConflictResolver, PriceLedger, Resolution};
use crate::result::{EvaluationResult, RequiredAddition, Violation, ViolationKind};
use crate::snapshot::RuleSetSnapshot;
use cpq_shared::config::EngineSettings;
use cpq_shared::observability::metrics as engine_metrics;
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// 引擎配置
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 是否允许跨规则并行匹配
    pub parallel_matching: bool,
    /// 激活规则数达到该值时才并行匹配
    pub parallel_threshold: usize,
    /// 调用方未指定超时时使用的默认超时
    pub default_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_matching: true,
            parallel_threshold: 64,
            default_timeout: None,
        }
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            parallel_matching: settings.parallel_matching,
            parallel_threshold: settings.parallel_threshold,
            // 配置文件中 0 表示不设超时
            default_timeout: (settings.default_timeout_ms > 0)
                .then(|| Duration::from_millis(settings.default_timeout_ms)),
        }
    }
}

/// 单次评估选项
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// 最终提交时未满足的依赖为阻断违规
    pub is_final: bool,
    /// 超时为零时总是超时
    pub timeout: Option<Duration>,
    /// 是否在结果中附带匹配追踪
    pub trace: bool,
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn final_submission(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_trace(mut self) -> Self {
        self.trace = true;
        self
    }
}

/// 单条规则试运行报告
#[derive(Debug, Clone, Serialize)]
pub struct RuleTestReport {
    pub rule_id: String,
    pub rule_name: String,
    /// 规则当前是否激活；试运行总是按激活状态评估
    pub active: bool,
    pub condition_summary: String,
    pub action_summary: String,
    /// 规则条件与动作引用的全部字段
    pub required_fields: Vec<String>,
    pub outcome: MatchOutcome,
    pub result: EvaluationResult,
}

struct Deadline {
    start: Instant,
    timeout: Option<Duration>,
}

impl Deadline {
    fn check(&self) -> Result<()> {
        match self.timeout {
            Some(timeout) if self.start.elapsed() >= timeout => Err(RuleError::EvaluationTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

/// 配置评估引擎
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine {
    config: EngineConfig,
}

impl EvaluationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 评估一个配置快照
    pub fn evaluate_configuration(
        &self,
        snapshot: &RuleSetSnapshot,
        state: &ConfigurationState,
        is_final: bool,
    ) -> Result<EvaluationResult> {
        let options = EvaluationOptions {
            is_final,
            ..Default::default()
        };
        self.evaluate(snapshot, state, &options)
    }

    /// 按选项评估一个配置快照
    #[instrument(
        skip(self, snapshot, state, options),
        fields(snapshot_version = snapshot.version(), is_final = options.is_final)
    )]
    pub fn evaluate(
        &self,
        snapshot: &RuleSetSnapshot,
        state: &ConfigurationState,
        options: &EvaluationOptions,
    ) -> Result<EvaluationResult> {
        let start = Instant::now();
        let deadline = Deadline {
            start,
            timeout: options.timeout.or(self.config.default_timeout),
        };

        let result = self.run(snapshot, state, options, &deadline);
        let elapsed = start.elapsed();

        match &result {
            Ok(r) => {
                debug!(
                    is_valid = r.is_valid,
                    fired = r.fired_rules.len(),
                    violations = r.blocking_violations.len(),
                    elapsed_us = elapsed.as_micros() as u64,
                    "配置评估完成"
                );
                engine_metrics::record_evaluation(r.outcome(), r.fired_rules.len(), elapsed.as_secs_f64());
            }
            Err(RuleError::UnresolvableConflict { .. }) => {
                engine_metrics::record_evaluation("conflict", 0, elapsed.as_secs_f64());
            }
            Err(RuleError::EvaluationTimeout { timeout_ms }) => {
                warn!(timeout_ms, elapsed_us = elapsed.as_micros() as u64, "配置评估超时");
                engine_metrics::record_evaluation("timeout", 0, elapsed.as_secs_f64());
            }
            Err(e) => {
                warn!(error = %e, "配置评估失败");
                engine_metrics::record_evaluation("error", 0, elapsed.as_secs_f64());
            }
        }

        result
    }

    /// 单条规则试运行
    ///
    /// 规则单独组成一个快照进行评估，忽略其激活状态，用于编辑端的规则测试。
    pub fn test_rule(
        &self,
        snapshot: &RuleSetSnapshot,
        rule_id: &str,
        state: &ConfigurationState,
        is_final: bool,
    ) -> Result<RuleTestReport> {
        let rule = snapshot
            .get(rule_id)
            .ok_or_else(|| RuleError::RuleNotFound(rule_id.to_string()))?;

        let mut candidate = rule.clone();
        candidate.status = RuleStatus::Active;

        let outcome = RuleMatcher::new().with_trace().execute(&candidate, state);
        let single = RuleSetSnapshot::new(snapshot.version(), vec![candidate]);
        let options = EvaluationOptions {
            is_final,
            ..Default::default()
        };
        let result = self.run(&single, state, &options, &Deadline {
            start: Instant::now(),
            timeout: None,
        })?;

        Ok(RuleTestReport {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            active: rule.is_active(),
            condition_summary: rule.condition_summary(),
            action_summary: rule.action_summary(),
            required_fields: rule.required_fields.iter().cloned().collect(),
            outcome,
            result,
        })
    }

    fn run(
        &self,
        snapshot: &RuleSetSnapshot,
        state: &ConfigurationState,
        options: &EvaluationOptions,
        deadline: &Deadline,
    ) -> Result<EvaluationResult> {
        let active: Vec<&CompiledRule> = snapshot.active_rules().collect();
        let mut trace = options.trace.then(Vec::new);

        let fired = self.match_rules(&active, state, trace.as_mut());
        deadline.check()?;

        let resolution = ConflictResolver::resolve(fired)?;
        let mut result = Self::fold(snapshot, state, options, resolution, deadline)?;
        result.trace = trace;

        Ok(result)
    }

    /// 按解析顺序执行生效动作并汇总结果，每一步之前检查超时
    fn fold(
        snapshot: &RuleSetSnapshot,
        state: &ConfigurationState,
        options: &EvaluationOptions,
        resolution: Resolution<'_>,
        deadline: &Deadline,
    ) -> Result<EvaluationResult> {
        let mut result = EvaluationResult {
            snapshot_version: snapshot.version(),
            fired_rules: resolution.ordered.iter().map(|r| r.id.clone()).collect(),
            suppressed: resolution.suppressed,
            ..Default::default()
        };

        for rule in &resolution.ordered {
            debug!(rule_id = %rule.id, priority = %rule.priority, "规则触发");
        }

        let mut ledger = PriceLedger::new(state.base_price());

        for (rule, action) in resolution.applied {
            deadline.check()?;

            match ActionApplier::apply(rule, action, state) {
                Effect::Satisfied => {}
                Effect::Violation(violation) => result.blocking_violations.push(violation),
                Effect::Exclusion(exclusion) => result.exclusions.push(exclusion),
                Effect::RequiredAddition(addition) => {
                    if options.is_final {
                        result
                            .blocking_violations
                            .push(Self::missing_requirement(rule, &addition));
                    }
                    result.required_additions.push(addition);
                }
                Effect::Price { amount, kind } => {
                    let adjustment = ledger.apply(&rule.id, amount, kind)?;
                    result.price_adjustments.push(adjustment);
                }
            }
        }

        result.total_price_delta = ledger.delta()?;
        result.is_valid = result.blocking_violations.is_empty();

        Ok(result)
    }

    /// 匹配激活规则，返回的触发规则保持快照中的顺序
    fn match_rules<'a>(
        &self,
        active: &[&'a CompiledRule],
        state: &ConfigurationState,
        trace: Option<&mut Vec<String>>,
    ) -> Vec<&'a CompiledRule> {
        let parallel =
            self.config.parallel_matching && active.len() >= self.config.parallel_threshold.max(1);

        let Some(lines) = trace else {
            let matcher = RuleMatcher::new();
            return if parallel {
                active
                    .par_iter()
                    .copied()
                    .filter(|rule| matcher.fires(rule, state))
                    .collect()
            } else {
                active
                    .iter()
                    .copied()
                    .filter(|rule| matcher.fires(rule, state))
                    .collect()
            };
        };

        let matcher = RuleMatcher::new().with_trace();
        let outcomes: Vec<MatchOutcome> = if parallel {
            active.par_iter().map(|rule| matcher.execute(rule, state)).collect()
        } else {
            active.iter().map(|rule| matcher.execute(rule, state)).collect()
        };

        let mut fired = Vec::new();
        for (rule, outcome) in active.iter().zip(outcomes) {
            lines.extend(outcome.trace.into_iter().map(|line| format!("{}: {}", rule.id, line)));
            if outcome.fired {
                fired.push(*rule);
            }
        }
        fired
    }

    fn missing_requirement(rule: &CompiledRule, addition: &RequiredAddition) -> Violation {
        let reason = rule.error_message.clone().unwrap_or_else(|| {
            let values: Vec<String> = addition.any_of.iter().map(|v| format!("\"{}\"", v)).collect();
            format!("{} 需要选择 {}", addition.field, values.join(" 或 "))
        });

        Violation {
            rule_id: rule.id.clone(),
            field: addition.field.clone(),
            kind: ViolationKind::MissingRequirement,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleCompiler;
    use crate::value::{FieldSchema, FieldType};
    use rust_decimal::Decimal;

    fn snapshot(rules: &str) -> RuleSetSnapshot {
        let schema = FieldSchema::new()
            .with_field("Finish", FieldType::Enum)
            .with_field("Cabinet", FieldType::Enum)
            .with_field("Width", FieldType::Numeric);
        RuleCompiler::new(schema)
            .compile_document_json(&format!(r#"{{"version": 7, "rules": {}}}"#, rules))
            .unwrap()
    }

    fn premium_snapshot() -> RuleSetSnapshot {
        snapshot(
            r#"[
                {"id": "dep-cabinet", "name": "Premium needs Premium cabinets", "type": "dependency",
                 "conditions": [{"field": "Finish", "operator": "equals", "value": "Premium"}],
                 "actions": [{"type": "require", "field": "Cabinet", "value": "Premium"}]},
                {"id": "price-premium", "name": "Premium surcharge", "type": "pricing", "priority": 1,
                 "conditions": [{"field": "Finish", "operator": "equals", "value": "Premium"}],
                 "actions": [{"type": "price_adjustment", "amount": 500, "kind": "additive"}]}
            ]"#,
        )
    }

    #[test]
    fn test_fold_checks_deadline_before_each_action() {
        let snapshot = premium_snapshot();
        let state = ConfigurationState::new().with("Finish", "Premium");
        let fired: Vec<&CompiledRule> = snapshot.active_rules().collect();
        let options = EvaluationOptions::new();

        // 匹配阶段已经通过，折叠阶段的第一个动作前超时
        let expired = Deadline {
            start: Instant::now(),
            timeout: Some(Duration::ZERO),
        };
        let resolution = ConflictResolver::resolve(fired.clone()).unwrap();
        assert_eq!(resolution.applied.len(), 2);
        let err = EvaluationEngine::fold(&snapshot, &state, &options, resolution, &expired)
            .unwrap_err();
        assert!(matches!(err, RuleError::EvaluationTimeout { timeout_ms: 0 }));

        let unbounded = Deadline {
            start: Instant::now(),
            timeout: None,
        };
        let resolution = ConflictResolver::resolve(fired).unwrap();
        let result =
            EvaluationEngine::fold(&snapshot, &state, &options, resolution, &unbounded).unwrap();
        assert_eq!(result.required_additions.len(), 1);
        assert_eq!(result.total_price_delta, Decimal::from(500));
    }

    #[test]
    fn test_fold_without_actions_ignores_deadline() {
        let snapshot = premium_snapshot();
        let expired = Deadline {
            start: Instant::now(),
            timeout: Some(Duration::ZERO),
        };

        let result = EvaluationEngine::fold(
            &snapshot,
            &ConfigurationState::new(),
            &EvaluationOptions::new(),
            Resolution::default(),
            &expired,
        )
        .unwrap();
        assert!(result.is_valid);
    }

    #[test]
    fn test_price_delta_overflow_is_error() {
        let snapshot = snapshot(
            r#"[
                {"id": "p1", "name": "p1", "type": "pricing", "priority": 1,
                 "conditions": [{"field": "Finish", "operator": "equals", "value": "Premium"}],
                 "actions": [{"type": "price_adjustment", "amount": "70000000000000000000000000000", "kind": "additive"}]},
                {"id": "p2", "name": "p2", "type": "pricing", "priority": 2,
                 "conditions": [{"field": "Finish", "operator": "equals", "value": "Premium"}],
                 "actions": [{"type": "price_adjustment", "amount": "70000000000000000000000000000", "kind": "additive"}]}
            ]"#,
        );
        let state = ConfigurationState::new()
            .with("Finish", "Premium")
            .with_base_price(Decimal::from_str_exact("-70000000000000000000000000000").unwrap());

        let err = EvaluationEngine::default()
            .evaluate_configuration(&snapshot, &state, false)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_VALUE");
    }

    #[test]
    fn test_empty_rule_set_is_valid() {
        let engine = EvaluationEngine::default();
        let result = engine
            .evaluate_configuration(&RuleSetSnapshot::empty(1), &ConfigurationState::new(), true)
            .unwrap();

        assert!(result.is_valid);
        assert!(result.fired_rules.is_empty());
        assert_eq!(result.total_price_delta, Decimal::ZERO);
        assert_eq!(result.snapshot_version, 1);
    }

    #[test]
    fn test_required_addition_blocks_only_when_final() {
        let engine = EvaluationEngine::default();
        let snapshot = premium_snapshot();
        let state = ConfigurationState::new().with("Finish", "Premium");

        let draft = engine.evaluate_configuration(&snapshot, &state, false).unwrap();
        assert!(draft.is_valid);
        assert_eq!(draft.required_additions.len(), 1);

        let submitted = engine.evaluate_configuration(&snapshot, &state, true).unwrap();
        assert!(!submitted.is_valid);
        assert_eq!(submitted.required_additions.len(), 1);
        assert_eq!(
            submitted.blocking_violations[0].kind,
            ViolationKind::MissingRequirement
        );
    }

    #[test]
    fn test_fired_rules_in_resolution_order() {
        let engine = EvaluationEngine::default();
        let state = ConfigurationState::new().with("Finish", "Premium");
        let result = engine
            .evaluate_configuration(&premium_snapshot(), &state, false)
            .unwrap();

        assert_eq!(result.fired_rules, vec!["price-premium", "dep-cabinet"]);
        assert_eq!(result.total_price_delta, Decimal::from(500));
    }

    #[test]
    fn test_zero_timeout_always_expires() {
        let engine = EvaluationEngine::default();
        let options = EvaluationOptions::new().with_timeout(Duration::ZERO);
        let err = engine
            .evaluate(&premium_snapshot(), &ConfigurationState::new(), &options)
            .unwrap_err();

        assert!(matches!(err, RuleError::EvaluationTimeout { timeout_ms: 0 }));
    }

    #[test]
    fn test_default_timeout_from_settings() {
        let settings = EngineSettings {
            default_timeout_ms: 0,
            ..Default::default()
        };
        assert!(EngineConfig::from(&settings).default_timeout.is_none());

        let settings = EngineSettings {
            default_timeout_ms: 25,
            parallel_threshold: 4,
            ..Default::default()
        };
        let config = EngineConfig::from(&settings);
        assert_eq!(config.default_timeout, Some(Duration::from_millis(25)));
        assert_eq!(config.parallel_threshold, 4);
    }

    #[test]
    fn test_trace_is_opt_in() {
        let engine = EvaluationEngine::default();
        let state = ConfigurationState::new().with("Finish", "Basic");

        let plain = engine
            .evaluate(&premium_snapshot(), &state, &EvaluationOptions::new())
            .unwrap();
        assert!(plain.trace.is_none());

        let traced = engine
            .evaluate(&premium_snapshot(), &state, &EvaluationOptions::new().with_trace())
            .unwrap();
        let lines = traced.trace.unwrap();
        assert!(lines.iter().any(|l| l.starts_with("dep-cabinet:")));
        assert!(lines.iter().any(|l| l.contains("短路")));
    }

    #[test]
    fn test_rule_dry_run_ignores_status() {
        let snapshot = snapshot(
            r#"[
                {"id": "draft", "name": "Draft width limit", "type": "constraint", "status": "inactive",
                 "conditions": [{"field": "Finish", "operator": "equals", "value": "Premium"}],
                 "actions": [{"type": "bound", "field": "Width", "max": 10}]}
            ]"#,
        );
        let engine = EvaluationEngine::default();
        let state = ConfigurationState::new()
            .with("Finish", "Premium")
            .with("Width", 12);

        // 正常评估时非激活规则不触发
        let normal = engine.evaluate_configuration(&snapshot, &state, false).unwrap();
        assert!(normal.is_valid);

        let report = engine.test_rule(&snapshot, "draft", &state, false).unwrap();
        assert!(!report.active);
        assert_eq!(report.required_fields, vec!["Finish", "Width"]);
        assert!(report.outcome.fired);
        assert!(!report.result.is_valid);
        assert_eq!(report.result.blocking_violations[0].kind, ViolationKind::OutOfBounds);

        let missing = engine.test_rule(&snapshot, "nope", &state, false).unwrap_err();
        assert_eq!(missing.code(), "RULE_NOT_FOUND");
    }
}
