// ==========================================
// UMKM 餐饮经营自动化 - 通知日志与发布中心
// ==========================================
// 职责: 有界内存通知日志 + 持久化发布
// 说明: 超出容量时淘汰最旧通知；列表按优先级、时间降序
// ==========================================

use crate::domain::{NotificationCategory, NotificationSummary, SmartNotification};
use crate::engine::notification::sort_by_priority_then_recency;
use crate::repository::{AutomationStore, RepositoryResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// NotificationLog
// ==========================================

/// 有界通知日志（追加写，最旧淘汰）
#[derive(Debug)]
pub struct NotificationLog {
    capacity: usize,
    entries: VecDeque<SmartNotification>,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, notification: SmartNotification) {
        self.entries.push_back(notification);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 优先级降序、时间降序
    pub fn list(&self) -> Vec<SmartNotification> {
        let mut out: Vec<_> = self.entries.iter().rev().cloned().collect();
        sort_by_priority_then_recency(&mut out);
        out
    }

    /// 标记已读；id 不存在时返回 false
    pub fn mark_read(&mut self, notification_id: &str) -> bool {
        match self.entries.iter_mut().find(|n| n.id == notification_id) {
            Some(n) => {
                n.is_read = true;
                true
            }
            None => false,
        }
    }

    /// 返回本次新标记的条数
    pub fn mark_all_read(&mut self) -> usize {
        let mut marked = 0;
        for n in self.entries.iter_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            marked += 1;
        }
        marked
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.is_read).count()
    }

    pub fn by_category(&self, category: NotificationCategory) -> Vec<SmartNotification> {
        let mut out: Vec<_> = self
            .entries
            .iter()
            .rev()
            .filter(|n| n.category == category)
            .cloned()
            .collect();
        sort_by_priority_then_recency(&mut out);
        out
    }

    pub fn summary(&self) -> NotificationSummary {
        let mut summary = NotificationSummary {
            total: self.entries.len(),
            ..NotificationSummary::default()
        };
        for n in &self.entries {
            if !n.is_read {
                summary.unread += 1;
                if n.priority == crate::domain::NotificationPriority::High {
                    summary.high_priority_unread += 1;
                }
            }
            *summary.by_category.entry(n.category).or_insert(0) += 1;
        }
        summary
    }
}

// ==========================================
// NotificationCenter
// ==========================================

/// 通知发布中心：先写库，再进内存日志
pub struct NotificationCenter {
    store: Arc<dyn AutomationStore>,
    log: Mutex<NotificationLog>,
}

impl NotificationCenter {
    pub fn new(store: Arc<dyn AutomationStore>, capacity: usize) -> Self {
        Self {
            store,
            log: Mutex::new(NotificationLog::new(capacity)),
        }
    }

    fn log(&self) -> MutexGuard<'_, NotificationLog> {
        match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub async fn publish(&self, notification: SmartNotification) -> RepositoryResult<()> {
        self.store.save_notification(&notification).await?;
        tracing::info!(
            notification_id = %notification.id,
            category = %notification.category,
            priority = %notification.priority,
            title = %notification.title,
            "通知已发布"
        );
        self.log().push(notification);
        Ok(())
    }

    /// 逐条发布；遇到存储错误立即返回，已发布的保留
    pub async fn publish_all(
        &self,
        notifications: impl IntoIterator<Item = SmartNotification>,
    ) -> RepositoryResult<usize> {
        let mut published = 0;
        for notification in notifications {
            self.publish(notification).await?;
            published += 1;
        }
        Ok(published)
    }

    pub fn list(&self) -> Vec<SmartNotification> {
        self.log().list()
    }

    pub fn mark_read(&self, notification_id: &str) -> bool {
        self.log().mark_read(notification_id)
    }

    pub fn mark_all_read(&self) -> usize {
        self.log().mark_all_read()
    }

    pub fn unread_count(&self) -> usize {
        self.log().unread_count()
    }

    pub fn by_category(&self, category: NotificationCategory) -> Vec<SmartNotification> {
        self.log().by_category(category)
    }

    pub fn summary(&self) -> NotificationSummary {
        self.log().summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationPriority, NotificationType};
    use crate::repository::SqliteStore;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(minute: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + Duration::minutes(minute)
    }

    fn note(
        priority: NotificationPriority,
        category: NotificationCategory,
        minute: i64,
    ) -> SmartNotification {
        SmartNotification::new(
            NotificationType::Info,
            category,
            priority,
            format!("n{}", minute),
            "",
            at(minute),
        )
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = NotificationLog::new(3);
        for m in 0..5 {
            log.push(note(NotificationPriority::Low, NotificationCategory::Orders, m));
        }
        assert_eq!(log.len(), 3);
        let titles: Vec<_> = log.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["n4", "n3", "n2"]);
    }

    #[test]
    fn test_log_ordering_and_read_state() {
        let mut log = NotificationLog::new(10);
        log.push(note(NotificationPriority::Low, NotificationCategory::Inventory, 3));
        log.push(note(NotificationPriority::High, NotificationCategory::Financial, 1));
        log.push(note(NotificationPriority::High, NotificationCategory::Inventory, 2));

        let list = log.list();
        assert_eq!(list[0].title, "n2");
        assert_eq!(list[1].title, "n1");
        assert_eq!(list[2].title, "n3");

        assert_eq!(log.by_category(NotificationCategory::Inventory).len(), 2);

        let summary = log.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.unread, 3);
        assert_eq!(summary.high_priority_unread, 2);
        assert_eq!(summary.by_category.get(&NotificationCategory::Inventory), Some(&2));

        assert!(log.mark_read(&list[0].id));
        assert!(!log.mark_read("missing"));
        assert_eq!(log.unread_count(), 2);
        assert_eq!(log.mark_all_read(), 2);
        assert_eq!(log.unread_count(), 0);
    }

    #[tokio::test]
    async fn test_center_persists_and_logs() {
        let store = SqliteStore::open_in_memory().unwrap();
        let center = NotificationCenter::new(Arc::new(store.clone()), 10);
        let published = center
            .publish_all(vec![
                note(NotificationPriority::Medium, NotificationCategory::Production, 0),
                note(NotificationPriority::High, NotificationCategory::Production, 1),
            ])
            .await
            .unwrap();

        assert_eq!(published, 2);
        assert_eq!(center.list().len(), 2);
        assert_eq!(store.list_notifications(10).await.unwrap().len(), 2);
    }
}
