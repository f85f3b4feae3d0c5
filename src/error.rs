use thiserror::Error;

/// 估算引擎统一错误类型
#[derive(Debug, Error)]
pub enum EstimateError {
    /// 输入校验失败，未发生任何写入
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Substitution {0} has already been applied")]
    AlreadyApplied(i64),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Export error: {0}")]
    Export(String),

    /// 存储中的数据无法解析 (如未知枚举值)
    #[error("Invalid stored data: {0}")]
    Data(String),
}

impl EstimateError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EstimateError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        EstimateError::NotFound { entity, id }
    }
}

impl From<csv::Error> for EstimateError {
    fn from(err: csv::Error) -> Self {
        EstimateError::Export(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EstimateError>;
