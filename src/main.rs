// ==========================================
// UMKM 餐饮经营自动化 - 命令行入口
// ==========================================
// 用法: umkm-automation [YYYY-MM-DD]
// 行为: 执行一次每日巡检，结果以 JSON 输出到 stdout
// 环境变量: UMKM_AUTOMATION_DB_PATH / RUST_LOG / UMKM_LOG_JSON
// ==========================================

use anyhow::Context;
use chrono::NaiveDate;
use umkm_automation::app::{get_default_db_path, AppState};
use umkm_automation::{i18n, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    if std::env::var("UMKM_LOG_JSON").is_ok() {
        logging::init_json();
    } else {
        logging::init();
    }
    i18n::init();

    tracing::info!("==================================================");
    tracing::info!("{}", umkm_automation::APP_NAME);
    tracing::info!("系统版本: {}", umkm_automation::VERSION);
    tracing::info!("==================================================");

    let date = match std::env::args().nth(1) {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("日期格式错误（应为 YYYY-MM-DD）: {}", raw))?,
        None => chrono::Local::now().date_naive(),
    };

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");

    let state = AppState::new(db_path)
        .await
        .map_err(anyhow::Error::msg)
        .context("AppState初始化失败")?;

    let review = state.api.run_daily_review(date, None).await?;
    state.api.wait_idle().await;

    let json = serde_json::to_string_pretty(&review)?;
    println!("{}", json);

    Ok(())
}
