use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::DefaultRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub group: String,
    pub alias: String,
    pub description: Option<String>,
}

/// 角色，权限集合随角色一起加载（多对多，顺序无关）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub alias: String,
    pub permissions: Vec<Permission>,
}

impl Role {
    /// superadmin 是保留别名，绕过所有权限检查
    pub fn is_superadmin(&self) -> bool {
        self.alias == DefaultRole::SUPERADMIN
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub email_verify_at: Option<DateTime<Utc>>,
    pub role_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub role: Role,
}

impl User {
    /// 权限检查：superadmin 直接通过，否则在角色权限集中精确匹配别名
    pub fn has_permission(&self, permission_alias: &str) -> bool {
        if self.role.is_superadmin() {
            return true;
        }
        self.role
            .permissions
            .iter()
            .any(|p| p.alias == permission_alias)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// 账号可用的不变式：激活且未软删除
    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deleted()
    }
}

/// 待持久化的新用户
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: Uuid,
}

/// 待持久化的新权限
#[derive(Debug, Clone)]
pub struct NewPermission {
    pub group: String,
    pub alias: String,
    pub description: Option<String>,
}

// === API 请求/响应类型 ===

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleCreate {
    pub alias: String,
    pub permission_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub alias: String,
    pub permission_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionCreate {
    pub group: String,
    pub alias: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionUpdate {
    pub description: Option<String>,
}
