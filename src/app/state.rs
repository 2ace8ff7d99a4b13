// ==========================================
// UMKM 餐饮经营自动化 - 应用状态
// ==========================================
// 职责: 打开数据库、加载配置、装配 AutomationApi
// 说明: SqliteStore 与 ConfigManager 共享同一连接
// ==========================================

use std::sync::Arc;

use crate::api::AutomationApi;
use crate::config::ConfigManager;
use crate::domain::default_operational_costs;
use crate::engine::SystemClock;
use crate::repository::{AutomationStore, SqliteStore};

/// 应用状态
///
/// 进程内单例；命令行入口与宿主应用共用
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 数据存储（种子数据写入需要具体类型）
    pub store: Arc<SqliteStore>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 自动化 API
    pub api: Arc<AutomationApi>,
}

impl AppState {
    /// 初始化应用状态
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// - 运营成本表为空时写入默认成本项
    /// - 配置读取失败回退到默认值
    pub async fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let store = SqliteStore::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let store = Arc::new(store);

        let existing = store
            .list_operational_costs()
            .await
            .map_err(|e| format!("读取运营成本失败: {}", e))?;
        if existing.is_empty() {
            for cost in default_operational_costs() {
                store
                    .upsert_operational_cost(&cost)
                    .map_err(|e| format!("写入默认运营成本失败: {}", e))?;
            }
            tracing::info!("已写入默认运营成本");
        }

        let config_manager = ConfigManager::from_connection(store.connection())
            .map_err(|e| format!("无法创建配置管理器: {}", e))?;
        let config = match config_manager.load_automation_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "读取自动化配置失败，使用默认配置");
                Default::default()
            }
        };

        let api = AutomationApi::new(
            Arc::clone(&store) as Arc<dyn AutomationStore>,
            config,
            Arc::new(SystemClock),
        );

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            store,
            config_manager: Arc::new(config_manager),
            api: Arc::new(api),
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 UMKM_AUTOMATION_DB_PATH（非空时优先）
/// - 开发环境: 用户数据目录/umkm-automation-dev/umkm_automation.db
/// - 生产环境: 用户数据目录/umkm-automation/umkm_automation.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("UMKM_AUTOMATION_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./umkm_automation.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("umkm-automation-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("umkm-automation");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("umkm_automation.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[tokio::test]
    async fn test_app_state_seeds_operational_costs() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).await.unwrap();
        assert_eq!(state.get_db_path(), db_path);

        let costs = state.store.list_operational_costs().await.unwrap();
        assert_eq!(costs.len(), default_operational_costs().len());

        // 再次打开不重复写入
        drop(state);
        let state = AppState::new(db_path).await.unwrap();
        let costs = state.store.list_operational_costs().await.unwrap();
        assert_eq!(costs.len(), default_operational_costs().len());
    }
}
