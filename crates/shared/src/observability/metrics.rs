//! 规则引擎指标
//!
//! 基于 metrics 门面记录评估与快照发布指标。导出器由宿主程序安装。

/// 注册指标描述
///
/// 这些描述会出现在导出端的 HELP 注释中
pub fn describe_engine_metrics() {
    metrics::describe_counter!(
        "cpq_evaluations_total",
        "Total number of configuration evaluations"
    );
    metrics::describe_histogram!(
        "cpq_evaluation_duration_seconds",
        "Configuration evaluation duration in seconds"
    );
    metrics::describe_counter!(
        "cpq_snapshot_publishes_total",
        "Total number of rule set snapshot publications"
    );
    metrics::describe_gauge!(
        "cpq_snapshot_active_rules",
        "Active rules in the currently published snapshot"
    );
}

/// 记录一次配置评估
///
/// outcome: valid / invalid / conflict / timeout / error
#[inline]
pub fn record_evaluation(outcome: &'static str, fired_rules: usize, duration_secs: f64) {
    metrics::counter!("cpq_evaluations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("cpq_evaluation_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
    metrics::histogram!("cpq_evaluation_fired_rules").record(fired_rules as f64);
}

/// 记录快照发布
#[inline]
pub fn record_snapshot_publish(status: &'static str, active_rules: usize) {
    metrics::counter!("cpq_snapshot_publishes_total", "status" => status).increment(1);
    if status == "published" {
        metrics::gauge!("cpq_snapshot_active_rules").set(active_rules as f64);
    }
}
