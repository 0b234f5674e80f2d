//! 规则集快照存储
//!
//! 使用 `ArcSwap` 持有当前快照，读取仅一次原子 load；
//! 发布新快照时通过 `watch` channel 通知订阅方。正在进行的评估继续持有旧快照。

use crate::error::{Result, RuleError};
use crate::snapshot::RuleSetSnapshot;
use arc_swap::ArcSwap;
use cpq_shared::observability::metrics as engine_metrics;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// 版本化快照存储
#[derive(Clone)]
pub struct RuleSetStore {
    current: Arc<ArcSwap<RuleSetSnapshot>>,
    tx: watch::Sender<Arc<RuleSetSnapshot>>,
}

impl RuleSetStore {
    pub fn new(initial: RuleSetSnapshot) -> Self {
        let initial = Arc::new(initial);
        let (tx, _rx) = watch::channel(initial.clone());
        Self {
            current: Arc::new(ArcSwap::from(initial)),
            tx,
        }
    }

    /// 以版本 0 的空规则集初始化
    pub fn empty() -> Self {
        Self::new(RuleSetSnapshot::empty(0))
    }

    /// 当前快照
    pub fn current(&self) -> Arc<RuleSetSnapshot> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version()
    }

    /// 订阅快照变更
    pub fn subscribe(&self) -> watch::Receiver<Arc<RuleSetSnapshot>> {
        self.tx.subscribe()
    }

    /// 发布新快照
    ///
    /// 版本号必须严格大于当前版本，否则返回 `StaleSnapshot`，当前快照保持不变。
    #[instrument(skip(self, snapshot), fields(offered = snapshot.version()))]
    pub fn publish(&self, snapshot: RuleSetSnapshot) -> Result<Arc<RuleSetSnapshot>> {
        let next = Arc::new(snapshot);

        loop {
            let current = self.current.load_full();
            if next.version() <= current.version() {
                warn!(current = current.version(), "快照版本未递增，拒绝发布");
                engine_metrics::record_snapshot_publish("rejected", 0);
                return Err(RuleError::StaleSnapshot {
                    current: current.version(),
                    offered: next.version(),
                });
            }

            let previous = self.current.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&*previous, &current) {
                break;
            }
        }

        // 并发发布时只向订阅方推送更新的版本
        self.tx.send_if_modified(|latest| {
            if latest.version() < next.version() {
                *latest = Arc::clone(&next);
                true
            } else {
                false
            }
        });

        info!(
            version = next.version(),
            rules = next.len(),
            active = next.active_count(),
            "规则集快照已发布"
        );
        engine_metrics::record_snapshot_publish("published", next.active_count());

        Ok(next)
    }
}

impl Default for RuleSetStore {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_increasing_versions() {
        let store = RuleSetStore::empty();
        assert_eq!(store.version(), 0);

        store.publish(RuleSetSnapshot::empty(1)).unwrap();
        store.publish(RuleSetSnapshot::empty(5)).unwrap();
        assert_eq!(store.version(), 5);
    }

    #[test]
    fn test_stale_snapshot_rejected() {
        let store = RuleSetStore::new(RuleSetSnapshot::empty(3));

        for offered in [3, 2] {
            let err = store.publish(RuleSetSnapshot::empty(offered)).unwrap_err();
            assert!(matches!(
                err,
                RuleError::StaleSnapshot { current: 3, offered: o } if o == offered
            ));
        }
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let store = RuleSetStore::new(RuleSetSnapshot::empty(1));
        let held = store.current();

        store.publish(RuleSetSnapshot::empty(2)).unwrap();
        assert_eq!(held.version(), 1);
        assert_eq!(store.current().version(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_notified() {
        let store = RuleSetStore::empty();
        let mut rx = store.subscribe();

        let publisher = store.clone();
        tokio::spawn(async move {
            publisher.publish(RuleSetSnapshot::empty(9)).unwrap();
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().version(), 9);
    }
}
