// ==========================================
// UMKM 餐饮经营自动化 - 原料价格历史缓存
// ==========================================
// 职责: 按原料保存最近 N 次价格，供价格巡检比较
// 说明: 仅由 CostCascade 持有和写入；超出上限时淘汰最旧记录
// ==========================================

use crate::domain::PricePoint;
use chrono::NaiveDateTime;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug)]
pub struct PriceHistoryCache {
    limit: usize,
    entries: Mutex<HashMap<String, VecDeque<PricePoint>>>,
}

impl PriceHistoryCache {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// 追加一次价格；超出上限时淘汰最旧的记录
    pub fn record(&self, ingredient_id: &str, price: f64, recorded_at: NaiveDateTime) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let history = entries.entry(ingredient_id.to_string()).or_default();
        history.push_back(PricePoint { price, recorded_at });
        while history.len() > self.limit {
            history.pop_front();
        }
    }

    pub fn latest(&self, ingredient_id: &str) -> Option<PricePoint> {
        self.with_history(ingredient_id, |h| h.back().cloned())
            .flatten()
    }

    /// 时间升序
    pub fn history(&self, ingredient_id: &str) -> Vec<PricePoint> {
        self.with_history(ingredient_id, |h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn with_history<T>(
        &self,
        ingredient_id: &str,
        f: impl FnOnce(&VecDeque<PricePoint>) -> T,
    ) -> Option<T> {
        let entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(ingredient_id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let cache = PriceHistoryCache::new(3);
        let t0 = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        for i in 0..5 {
            cache.record("ING-1", 1_000.0 + f64::from(i), t0 + Duration::minutes(i64::from(i)));
        }

        let history = cache.history("ING-1");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].price, 1_002.0);
        assert_eq!(cache.latest("ING-1").unwrap().price, 1_004.0);
        assert!(cache.latest("ING-2").is_none());
        assert!(cache.history("ING-2").is_empty());
    }
}
