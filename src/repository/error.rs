// ==========================================
// UMKM 餐饮经营自动化 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: SQLite 约束失败按约束种类归类，API 层据此转为输入错误
// ==========================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("数据约束违反({constraint}): {message}")]
    ConstraintViolation { constraint: String, message: String },

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// 约束失败消息 → 约束种类（UNIQUE / FOREIGN KEY / CHECK / NOT NULL）
fn constraint_kind(msg: &str) -> &'static str {
    if msg.contains("UNIQUE") {
        "UNIQUE"
    } else if msg.contains("FOREIGN KEY") {
        "FOREIGN KEY"
    } else if msg.contains("CHECK") {
        "CHECK"
    } else if msg.contains("NOT NULL") {
        "NOT NULL"
    } else {
        "OTHER"
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, Some(msg))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                RepositoryError::ConstraintViolation {
                    constraint: constraint_kind(&msg).to_string(),
                    message: msg,
                }
            }
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DatabaseBusy => {
                RepositoryError::LockError(e.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::not_found("row", "?"),
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::InternalError(format!("JSON 编解码失败: {}", err))
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_check_constraint_is_classified() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v REAL CHECK (v >= 0));")
            .unwrap();
        let err: RepositoryError = conn
            .execute("INSERT INTO t (v) VALUES (-1)", [])
            .unwrap_err()
            .into();
        match err {
            RepositoryError::ConstraintViolation { constraint, .. } => {
                assert_eq!(constraint, "CHECK")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
