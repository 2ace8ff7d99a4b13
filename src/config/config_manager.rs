// ==========================================
// UMKM 餐饮经营自动化 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::automation_config::AutomationConfig;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 读取并解析数值配置；格式错误时告警并使用默认值
    fn read_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Display + Copy,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 加载自动化参数（默认值 + config_kv 覆写）
    pub fn load_automation_config(&self) -> RepositoryResult<AutomationConfig> {
        let d = AutomationConfig::default();
        let mut cfg = d.clone();

        // ===== 库存 =====
        cfg.inventory.ordering_cost =
            self.read_or_default(config_keys::ORDERING_COST, d.inventory.ordering_cost)?;
        cfg.inventory.holding_rate =
            self.read_or_default(config_keys::HOLDING_RATE, d.inventory.holding_rate)?;
        cfg.inventory.auto_reorder_days =
            self.read_or_default(config_keys::AUTO_REORDER_DAYS, d.inventory.auto_reorder_days)?;

        // ===== 生产 =====
        cfg.production.work_start_hour =
            self.read_or_default(config_keys::WORK_START_HOUR, d.production.work_start_hour)?;
        cfg.production.work_end_hour =
            self.read_or_default(config_keys::WORK_END_HOUR, d.production.work_end_hour)?;
        cfg.production.max_daily_workload_hours = self.read_or_default(
            config_keys::MAX_DAILY_WORKLOAD_HOURS,
            d.production.max_daily_workload_hours,
        )?;

        // ===== 成本 =====
        cfg.cost.labor_hourly_rate =
            self.read_or_default(config_keys::LABOR_HOURLY_RATE, d.cost.labor_hourly_rate)?;
        cfg.cost.high_impact_percent =
            self.read_or_default(config_keys::HIGH_IMPACT_PERCENT, d.cost.high_impact_percent)?;
        cfg.cost.batch_recalc_percent =
            self.read_or_default(config_keys::BATCH_RECALC_PERCENT, d.cost.batch_recalc_percent)?;
        cfg.cost.recalc_delay_secs =
            self.read_or_default(config_keys::RECALC_DELAY_SECS, d.cost.recalc_delay_secs)?;

        // ===== 通知 / 总线 =====
        cfg.notification.log_capacity = self.read_or_default(
            config_keys::NOTIFICATION_LOG_CAPACITY,
            d.notification.log_capacity,
        )?;
        cfg.notification.max_synthesized =
            self.read_or_default(config_keys::MAX_SYNTHESIZED, d.notification.max_synthesized)?;
        cfg.notification.low_margin_percent = self.read_or_default(
            config_keys::LOW_MARGIN_PERCENT,
            d.notification.low_margin_percent,
        )?;
        cfg.bus.handler_timeout_secs =
            self.read_or_default(config_keys::HANDLER_TIMEOUT_SECS, d.bus.handler_timeout_secs)?;

        cfg.validate().map_err(RepositoryError::ValidationError)?;
        Ok(cfg)
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> RepositoryResult<usize> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)
            .map_err(|e| RepositoryError::ValidationError(format!("配置快照格式错误: {}", e)))?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 库存 / EOQ
    pub const ORDERING_COST: &str = "inventory.ordering_cost";
    pub const HOLDING_RATE: &str = "inventory.holding_rate";
    pub const AUTO_REORDER_DAYS: &str = "inventory.auto_reorder_days";

    // 生产排程
    pub const WORK_START_HOUR: &str = "production.work_start_hour";
    pub const WORK_END_HOUR: &str = "production.work_end_hour";
    pub const MAX_DAILY_WORKLOAD_HOURS: &str = "production.max_daily_workload_hours";

    // HPP
    pub const LABOR_HOURLY_RATE: &str = "cost.labor_hourly_rate";
    pub const HIGH_IMPACT_PERCENT: &str = "cost.high_impact_percent";
    pub const BATCH_RECALC_PERCENT: &str = "cost.batch_recalc_percent";
    pub const RECALC_DELAY_SECS: &str = "cost.recalc_delay_secs";

    // 通知
    pub const NOTIFICATION_LOG_CAPACITY: &str = "notification.log_capacity";
    pub const MAX_SYNTHESIZED: &str = "notification.max_synthesized";
    pub const LOW_MARGIN_PERCENT: &str = "notification.low_margin_percent";

    // 事件总线
    pub const HANDLER_TIMEOUT_SECS: &str = "bus.handler_timeout_secs";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_without_overrides() {
        let mgr = manager();
        let cfg = mgr.load_automation_config().unwrap();
        assert_eq!(cfg, AutomationConfig::default());
    }

    #[test]
    fn test_override_and_bad_value_fallback() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::ORDERING_COST, "75000").unwrap();
        mgr.set_global_config_value(config_keys::HOLDING_RATE, "abc").unwrap();

        let cfg = mgr.load_automation_config().unwrap();
        assert_eq!(cfg.inventory.ordering_cost, 75_000.0);
        assert_eq!(cfg.inventory.holding_rate, 0.20);
    }

    #[test]
    fn test_invalid_combination_rejected() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::WORK_START_HOUR, "21").unwrap();
        assert!(matches!(
            mgr.load_automation_config(),
            Err(RepositoryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_snapshot_restore() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::LABOR_HOURLY_RATE, "60000").unwrap();
        let snapshot = mgr.get_config_snapshot().unwrap();

        mgr.set_global_config_value(config_keys::LABOR_HOURLY_RATE, "1").unwrap();
        assert_eq!(mgr.restore_config_from_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(
            mgr.get_global_config_value(config_keys::LABOR_HOURLY_RATE).unwrap(),
            Some("60000".to_string())
        );
    }
}
