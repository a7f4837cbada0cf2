//! 测试辅助：内存存储、记录型邮件/队列、固定测试密钥对

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use libra_error::{LibraError, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::events::EventPublisher;
use crate::jwt::{JwtService, TokenTtl};
use crate::mail::MailSender;
use crate::models::{NewPermission, NewUser, Permission, Role, User};
use crate::store::{RbacStore, UserStore};

const TEST_PRIVATE_PEM: &str = include_str!("../testdata/jwt-private.pem");
const TEST_PUBLIC_PEM: &str = include_str!("../testdata/jwt-public.pem");

pub(crate) fn test_jwt() -> JwtService {
    JwtService::from_pem(
        TEST_PRIVATE_PEM.as_bytes(),
        TEST_PUBLIC_PEM.as_bytes(),
        Algorithm::RS256,
        TokenTtl {
            access_minutes: 10,
            refresh_minutes: 10080,
            verify_email_minutes: 60,
            reset_password_minutes: 60,
        },
    )
    .unwrap()
}

pub(crate) fn make_permission(alias: &str) -> Permission {
    let group = alias.split('.').next().unwrap_or("misc").to_string();
    Permission {
        id: Uuid::new_v4(),
        group,
        alias: alias.to_string(),
        description: None,
    }
}

pub(crate) fn make_role(alias: &str, permission_aliases: &[&str]) -> Role {
    Role {
        id: Uuid::new_v4(),
        alias: alias.to_string(),
        permissions: permission_aliases
            .iter()
            .map(|a| make_permission(a))
            .collect(),
    }
}

pub(crate) fn make_user_with_role(username: &str, email: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
        password_hash: String::new(),
        is_active: true,
        email_verify_at: None,
        role_id: role.id,
        created_at: now,
        updated_at: now,
        deleted_at: None,
        role,
    }
}

pub(crate) fn test_user(username: &str, email: &str) -> User {
    make_user_with_role(username, email, make_role("user", &[]))
}

/// 内存用户存储，角色表在构造时固定
pub(crate) struct MemoryUserStore {
    users: RwLock<Vec<User>>,
    roles: Vec<Role>,
}

impl MemoryUserStore {
    pub(crate) fn new(roles: Vec<Role>) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            roles,
        }
    }

    pub(crate) async fn push(&self, user: User) {
        self.users.write().await.push(user);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(LibraError::UserAlreadyExists { email: new.email });
        }
        let role = self
            .roles
            .iter()
            .find(|r| r.id == new.role_id)
            .cloned()
            .ok_or(LibraError::RoleNotFound {
                role_id: new.role_id,
            })?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            is_active: true,
            email_verify_at: None,
            role_id: role.id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            role,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn set_email_verify_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.email_verify_at = Some(at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count_by_role(&self, role_id: Uuid) -> Result<i64> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| u.role_id == role_id)
            .count() as i64)
    }
}

/// 内存角色/权限存储
#[derive(Default)]
pub(crate) struct MemoryRbacStore {
    roles: RwLock<Vec<Role>>,
    permissions: RwLock<Vec<Permission>>,
}

impl MemoryRbacStore {
    pub(crate) async fn push_role(&self, role: Role) {
        self.roles.write().await.push(role);
    }

    pub(crate) async fn push_permission(&self, permission: Permission) {
        self.permissions.write().await.push(permission);
    }
}

#[async_trait]
impl RbacStore for MemoryRbacStore {
    async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.read().await.clone())
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|r| r.id == role_id)
            .cloned())
    }

    async fn find_role_by_alias(&self, alias: &str) -> Result<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|r| r.alias == alias)
            .cloned())
    }

    async fn insert_role(&self, alias: &str) -> Result<Role> {
        let mut roles = self.roles.write().await;
        if roles.iter().any(|r| r.alias == alias) {
            return Err(LibraError::Validation {
                message: format!("角色别名 '{}' 已存在", alias),
            });
        }
        let role = Role {
            id: Uuid::new_v4(),
            alias: alias.to_string(),
            permissions: Vec::new(),
        };
        roles.push(role.clone());
        Ok(role)
    }

    async fn rename_role(&self, role_id: Uuid, alias: &str) -> Result<()> {
        let mut roles = self.roles.write().await;
        if let Some(role) = roles.iter_mut().find(|r| r.id == role_id) {
            role.alias = alias.to_string();
        }
        Ok(())
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<()> {
        self.roles.write().await.retain(|r| r.id != role_id);
        Ok(())
    }

    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<()> {
        let permissions = self.permissions.read().await;
        let mut attached = Vec::with_capacity(permission_ids.len());
        for id in permission_ids {
            let permission = permissions
                .iter()
                .find(|p| p.id == *id)
                .cloned()
                .ok_or(LibraError::PermissionNotFound { permission_id: *id })?;
            attached.push(permission);
        }
        drop(permissions);

        let mut roles = self.roles.write().await;
        if let Some(role) = roles.iter_mut().find(|r| r.id == role_id) {
            role.permissions = attached;
        }
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        Ok(self.permissions.read().await.clone())
    }

    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>> {
        Ok(self
            .permissions
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn find_permission_by_alias(&self, alias: &str) -> Result<Option<Permission>> {
        Ok(self
            .permissions
            .read()
            .await
            .iter()
            .find(|p| p.alias == alias)
            .cloned())
    }

    async fn insert_permission(&self, new: NewPermission) -> Result<Permission> {
        let permission = Permission {
            id: Uuid::new_v4(),
            group: new.group,
            alias: new.alias,
            description: new.description,
        };
        self.permissions.write().await.push(permission.clone());
        Ok(permission)
    }

    async fn update_permission_description(
        &self,
        id: Uuid,
        description: Option<&str>,
    ) -> Result<Permission> {
        let mut permissions = self.permissions.write().await;
        let permission = permissions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(LibraError::PermissionNotFound { permission_id: id })?;
        permission.description = description.map(|s| s.to_string());
        Ok(permission.clone())
    }
}

/// 记录发出的每封邮件
#[derive(Debug, Clone)]
pub(crate) struct SentMail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    #[allow(dead_code)]
    pub html_body: String,
}

#[derive(Default)]
pub(crate) struct RecordingMailer {
    pub sent: RwLock<Vec<SentMail>>,
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<()> {
        self.sent.write().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            text_body: text_body.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

/// 记录发布的事件；fail=true 时模拟队列不可用
pub(crate) struct RecordingPublisher {
    pub events: RwLock<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingPublisher {
    pub(crate) fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            fail: false,
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, queue: &str, payload: &str) -> Result<()> {
        if self.fail {
            return Err(LibraError::Queue {
                message: "队列不可用".to_string(),
            });
        }
        self.events
            .write()
            .await
            .push((queue.to_string(), payload.to_string()));
        Ok(())
    }
}
