//! 规则集快照
//!
//! 快照在构建后不可变，通过 `Arc` 在评估任务之间共享。

use crate::compiler::CompiledRule;
use crate::models::{Priority, RuleStatus, RuleType};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// 不可变的版本化规则集
#[derive(Debug, Clone)]
pub struct RuleSetSnapshot {
    version: u64,
    rules: Arc<[CompiledRule]>,
    compiled_at: DateTime<Utc>,
}

impl RuleSetSnapshot {
    pub fn new(version: u64, rules: Vec<CompiledRule>) -> Self {
        Self {
            version,
            rules: rules.into(),
            compiled_at: Utc::now(),
        }
    }

    /// 空规则集
    pub fn empty(version: u64) -> Self {
        Self::new(version, Vec::new())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    /// 按编写顺序返回所有规则
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, rule_id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id == rule_id)
    }

    pub fn active_rules(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(|r| r.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_rules().count()
    }

    /// 按筛选条件列出规则
    pub fn filter(&self, filter: &RuleFilter) -> Vec<&CompiledRule> {
        self.rules.iter().filter(|r| filter.matches(r)).collect()
    }
}

/// 规则列表筛选条件
///
/// 各维度之间为 AND；同一维度内的多个取值为 OR，空集合表示不限制。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleFilter {
    pub types: Vec<RuleType>,
    pub priorities: Vec<Priority>,
    pub statuses: Vec<RuleStatus>,
    pub min_affected_products: Option<u32>,
    pub max_affected_products: Option<u32>,
}

impl RuleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, rule_type: RuleType) -> Self {
        self.types.push(rule_type);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priorities.push(priority);
        self
    }

    pub fn with_status(mut self, status: RuleStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_affected_range(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_affected_products = min;
        self.max_affected_products = max;
        self
    }

    /// 当前激活的筛选维度数量
    pub fn active_dimensions(&self) -> usize {
        [
            !self.types.is_empty(),
            !self.priorities.is_empty(),
            !self.statuses.is_empty(),
            self.min_affected_products.is_some() || self.max_affected_products.is_some(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn matches(&self, rule: &CompiledRule) -> bool {
        if !self.types.is_empty() && !self.types.contains(&rule.rule_type) {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&rule.priority) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&rule.status) {
            return false;
        }
        if self
            .min_affected_products
            .is_some_and(|min| rule.affected_products < min)
        {
            return false;
        }
        if self
            .max_affected_products
            .is_some_and(|max| rule.affected_products > max)
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RuleCompiler;
    use crate::models::RuleSetDocument;
    use crate::value::{FieldSchema, FieldType};

    fn snapshot() -> RuleSetSnapshot {
        let schema = FieldSchema::new()
            .with_field("Finish", FieldType::Enum)
            .with_field("Cabinet", FieldType::Enum)
            .with_field("Width", FieldType::Numeric);

        let document = RuleSetDocument::from_json(
            r#"
            {
                "version": 3,
                "rules": [
                    {
                        "id": "r-dep", "name": "dep", "type": "dependency", "priority": 1,
                        "affected_products": 45,
                        "conditions": [{"field": "Finish", "operator": "equals", "value": "Premium"}],
                        "actions": [{"type": "require", "field": "Cabinet", "value": "Premium"}]
                    },
                    {
                        "id": "r-cmp", "name": "cmp", "type": "compatibility", "priority": 2,
                        "status": "inactive", "affected_products": 5,
                        "conditions": [{"field": "Finish", "operator": "equals", "value": "Basic"}],
                        "actions": [{"type": "exclude", "field": "Cabinet", "value": "Luxury"}]
                    },
                    {
                        "id": "r-con", "name": "con", "type": "constraint", "priority": 3,
                        "affected_products": 120,
                        "conditions": [{"field": "Finish", "operator": "not_equals", "value": "Basic"}],
                        "actions": [{"type": "bound", "field": "Width", "min": 8}]
                    }
                ]
            }
            "#,
        )
        .unwrap();

        RuleCompiler::new(schema).compile_document(&document).unwrap()
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = snapshot();
        assert_eq!(snapshot.version(), 3);
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.active_count(), 2);
        assert!(snapshot.get("r-cmp").is_some());
        assert!(snapshot.get("missing").is_none());
        assert!(RuleSetSnapshot::empty(1).is_empty());

        let later = RuleSetSnapshot::empty(4);
        assert!(later.compiled_at() >= snapshot.compiled_at());
    }

    #[test]
    fn test_filter_by_dimensions() {
        let snapshot = snapshot();

        let all = snapshot.filter(&RuleFilter::new());
        assert_eq!(all.len(), 3);

        let filter = RuleFilter::new()
            .with_type(RuleType::Dependency)
            .with_type(RuleType::Constraint);
        let ids: Vec<&str> = snapshot.filter(&filter).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["r-dep", "r-con"]);

        let filter = RuleFilter::new().with_status(RuleStatus::Inactive);
        assert_eq!(snapshot.filter(&filter).len(), 1);

        let filter = RuleFilter::new()
            .with_priority(Priority::High)
            .with_status(RuleStatus::Active);
        assert_eq!(filter.active_dimensions(), 2);
        assert_eq!(snapshot.filter(&filter).len(), 1);
    }

    #[test]
    fn test_filter_by_affected_products() {
        let snapshot = snapshot();

        let filter = RuleFilter::new().with_affected_range(Some(10), Some(100));
        let ids: Vec<&str> = snapshot.filter(&filter).iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["r-dep"]);

        let filter = RuleFilter::new().with_affected_range(Some(100), None);
        assert_eq!(snapshot.filter(&filter).len(), 1);
    }
}
