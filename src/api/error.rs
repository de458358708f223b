// ==========================================
// 车间生产排产系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository错误为用户友好的错误消息
// 红线: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::validator::ValidationIssue;
use crate::engine::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    /// 计划校验失败（带逐条违规详情）
    #[error("计划校验失败: {reason}")]
    PlanValidationError {
        reason: String,
        issues: Vec<ValidationIssue>,
    },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "{}已被其他用户修改（期望revision={}，实际revision={}）",
                id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),

            // 通用错误
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// 引擎拒绝输入属于调用方数据问题，映射为业务错误
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidQuantity { .. } => ApiError::InvalidInput(err.to_string()),
            EngineError::MissingStep { .. } | EngineError::DependencyCycle { .. } => {
                ApiError::BusinessRuleViolation(err.to_string())
            }
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        // NotFound错误转换
        let repo_err = RepositoryError::NotFound {
            entity: "Schedule".to_string(),
            id: "SCH001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Schedule"));
                assert!(msg.contains("SCH001"));
            }
            _ => panic!("Expected NotFound"),
        }

        // OptimisticLockFailure转换
        let repo_err = RepositoryError::OptimisticLockFailure {
            id: "R001".to_string(),
            expected: 1,
            actual: 2,
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::OptimisticLockFailure(msg) => {
                assert!(msg.contains("R001"));
                assert!(msg.contains("已被其他用户修改"));
            }
            _ => panic!("Expected OptimisticLockFailure"),
        }
    }

    #[test]
    fn test_engine_error_conversion() {
        let api_err: ApiError = EngineError::DependencyCycle {
            step_id: "S1".to_string(),
        }
        .into();
        assert!(matches!(api_err, ApiError::BusinessRuleViolation(_)));

        let api_err: ApiError = EngineError::InvalidQuantity {
            demand_id: "D1".to_string(),
            quantity: -3,
        }
        .into();
        assert!(matches!(api_err, ApiError::InvalidInput(_)));
    }
}
