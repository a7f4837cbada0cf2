use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

#[cfg(feature = "axum")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};

/// 系统统一错误类型
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum LibraError {
    // === 认证/授权错误 ===
    #[error("{message}")]
    InvalidToken { message: String },

    #[error("Invalid token type: expected '{expected}'")]
    InvalidTokenType { expected: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Недостаточно прав: требуется {permission}")]
    Forbidden { permission: String },

    // === 业务错误 ===
    #[error("User not found")]
    UserNotFound,

    #[error("Role with id [{role_id}] not found")]
    RoleNotFound { role_id: Uuid },

    #[error("Role with alias [{alias}] not found")]
    RoleNotFoundByAlias { alias: String },

    #[error("Permission with id [{permission_id}] not found")]
    PermissionNotFound { permission_id: Uuid },

    #[error("User with email '{email}' already exists")]
    UserAlreadyExists { email: String },

    #[error("{reason}")]
    CannotDelete { reason: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("验证失败: {message}")]
    Validation { message: String },

    // === 技术错误 ===
    #[error("数据库错误")]
    Database { message: String },

    #[error("消息队列错误: {message}")]
    Queue { message: String },

    #[error("邮件发送错误: {message}")]
    Mail { message: String },

    #[error("配置错误: {key} - {reason}")]
    Configuration { key: String, reason: String },

    #[error("序列化错误: {format}")]
    Serialization { format: String, message: String },

    // === 系统错误 ===
    #[error("内部系统错误: {message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

/// 错误严重级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Low,      // 可预期的业务错误
    Medium,   // 技术错误但不影响核心功能
    High,     // 影响核心功能的错误
    Critical, // 系统级严重错误
}

impl LibraError {
    /// 获取错误的严重级别
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LibraError::UserNotFound
            | LibraError::RoleNotFound { .. }
            | LibraError::RoleNotFoundByAlias { .. }
            | LibraError::PermissionNotFound { .. }
            | LibraError::UserAlreadyExists { .. }
            | LibraError::CannotDelete { .. }
            | LibraError::NotFound { .. }
            | LibraError::Validation { .. } => ErrorSeverity::Low,
            LibraError::InvalidToken { .. }
            | LibraError::InvalidTokenType { .. }
            | LibraError::Unauthorized { .. }
            | LibraError::Forbidden { .. } => ErrorSeverity::Medium,
            LibraError::Database { .. }
            | LibraError::Queue { .. }
            | LibraError::Mail { .. }
            | LibraError::Serialization { .. } => ErrorSeverity::High,
            LibraError::Internal { .. } | LibraError::Configuration { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    /// 转换为 HTTP 状态码
    pub fn to_http_status(&self) -> u16 {
        match self {
            LibraError::InvalidToken { .. }
            | LibraError::InvalidTokenType { .. }
            | LibraError::Unauthorized { .. } => 401,
            LibraError::Forbidden { .. } => 403,
            LibraError::UserNotFound
            | LibraError::RoleNotFound { .. }
            | LibraError::RoleNotFoundByAlias { .. }
            | LibraError::PermissionNotFound { .. }
            | LibraError::NotFound { .. } => 404,
            LibraError::UserAlreadyExists { .. } => 409,
            LibraError::CannotDelete { .. } | LibraError::Validation { .. } => 400,
            _ => 500,
        }
    }

    /// 获取用户友好的错误消息，技术错误不向外泄露内部细节
    pub fn user_message(&self) -> String {
        match self {
            LibraError::Database { .. } => "数据访问失败，请稍后重试".to_string(),
            LibraError::Queue { .. } => "消息投递失败，请稍后重试".to_string(),
            LibraError::Mail { .. } => "邮件发送失败，请稍后重试".to_string(),
            LibraError::Serialization { .. }
            | LibraError::Internal { .. }
            | LibraError::Configuration { .. } => "系统内部错误，请联系管理员".to_string(),
            other => other.to_string(),
        }
    }

    /// 记录错误日志
    pub fn log(&self, component: &str) {
        match self.severity() {
            ErrorSeverity::Low => {
                warn!(component = %component, error = %self, "业务错误");
            }
            ErrorSeverity::Medium => {
                warn!(component = %component, error = %self, "认证/授权错误");
            }
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!(component = %component, error = %self, severity = ?self.severity(), "严重错误");
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraError>;

// === 转换实现 ===

impl From<serde_json::Error> for LibraError {
    fn from(err: serde_json::Error) -> Self {
        LibraError::Serialization {
            format: "json".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<uuid::Error> for LibraError {
    fn from(err: uuid::Error) -> Self {
        LibraError::Serialization {
            format: "uuid".to_string(),
            message: err.to_string(),
        }
    }
}

// Axum integration
#[cfg(feature = "axum")]
impl IntoResponse for LibraError {
    fn into_response(self) -> axum::response::Response {
        let status_code = StatusCode::from_u16(self.to_http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({
            "error": self.user_message(),
        });

        (status_code, Json(body)).into_response()
    }
}
