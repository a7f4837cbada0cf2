use std::sync::Arc;

use libra_error::{LibraError, Result};
use uuid::Uuid;

use crate::models::{
    NewPermission, Permission, PermissionCreate, PermissionUpdate, Role, RoleCreate, RoleUpdate,
};
use crate::permissions::{permissions_for_roles, permissions_for_seed, DefaultRole};
use crate::store::{RbacStore, UserStore};

/// 角色/权限管理服务
///
/// superadmin 是保留角色，对管理接口完全隐藏：不出现在列表里，
/// 按 id 查询/删除一律视为不存在。
pub struct RbacService {
    store: Arc<dyn RbacStore>,
    users: Arc<dyn UserStore>,
}

impl RbacService {
    pub fn new(store: Arc<dyn RbacStore>, users: Arc<dyn UserStore>) -> Self {
        Self { store, users }
    }

    pub async fn get_all_roles(&self) -> Result<Vec<Role>> {
        Ok(self
            .store
            .list_roles()
            .await?
            .into_iter()
            .filter(|r| !r.is_superadmin())
            .collect())
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<Role> {
        match self.store.find_role_by_id(role_id).await? {
            Some(role) if !role.is_superadmin() => Ok(role),
            _ => Err(LibraError::RoleNotFound { role_id }),
        }
    }

    /// 创建角色；permission_ids 先整体校验再挂接，任何一个不存在都拒绝整次请求
    pub async fn create_role(&self, input: RoleCreate) -> Result<Role> {
        let permission_ids = input.permission_ids.unwrap_or_default();
        self.ensure_permissions_exist(&permission_ids).await?;

        let role = self.store.insert_role(&input.alias).await?;
        if !permission_ids.is_empty() {
            self.store
                .replace_role_permissions(role.id, &permission_ids)
                .await?;
        }

        self.reload_role(role.id).await
    }

    /// 更新角色；permission_ids 为 Some 时整体替换权限集，None 保持不变
    pub async fn update_role(&self, role_id: Uuid, input: RoleUpdate) -> Result<Role> {
        let existing = self.get_role(role_id).await?;

        if let Some(permission_ids) = &input.permission_ids {
            self.ensure_permissions_exist(permission_ids).await?;
            self.store
                .replace_role_permissions(role_id, permission_ids)
                .await?;
        }

        if input.alias != existing.alias {
            self.store.rename_role(role_id, &input.alias).await?;
        }

        self.reload_role(role_id).await
    }

    pub async fn delete_role(&self, role_id: Uuid) -> Result<()> {
        let role = match self.store.find_role_by_id(role_id).await? {
            Some(role) if !role.is_superadmin() => role,
            _ => return Err(LibraError::RoleNotFound { role_id }),
        };

        if role.alias == DefaultRole::USER {
            return Err(LibraError::CannotDelete {
                reason: "Cannot delete default role".to_string(),
            });
        }
        if self.users.count_by_role(role_id).await? > 0 {
            return Err(LibraError::CannotDelete {
                reason: "Cannot delete role that is assigned to users".to_string(),
            });
        }

        self.store.delete_role(role_id).await
    }

    pub async fn get_all_permissions(&self) -> Result<Vec<Permission>> {
        self.store.list_permissions().await
    }

    pub async fn create_permission(&self, input: PermissionCreate) -> Result<Permission> {
        self.store
            .insert_permission(NewPermission {
                group: input.group,
                alias: input.alias,
                description: input.description,
            })
            .await
    }

    pub async fn update_permission(
        &self,
        id: Uuid,
        input: PermissionUpdate,
    ) -> Result<Permission> {
        self.store
            .update_permission_description(id, input.description.as_deref())
            .await
    }

    /// 启动种子：保留角色与权限注册表按别名幂等写入；
    /// 默认授权只在角色权限集为空时挂接，不覆盖管理员后续的调整
    pub async fn seed(&self) -> Result<()> {
        for alias in DefaultRole::all() {
            if self.store.find_role_by_alias(alias).await?.is_none() {
                self.store.insert_role(alias).await?;
                tracing::info!(role = alias, "种子角色已创建");
            }
        }

        for seed in permissions_for_seed() {
            if self
                .store
                .find_permission_by_alias(seed.alias)
                .await?
                .is_none()
            {
                self.store
                    .insert_permission(NewPermission {
                        group: seed.group.to_string(),
                        alias: seed.alias.to_string(),
                        description: Some(seed.description.to_string()),
                    })
                    .await?;
            }
        }

        for (role_alias, grants) in permissions_for_roles() {
            let role = self
                .store
                .find_role_by_alias(role_alias)
                .await?
                .ok_or_else(|| LibraError::RoleNotFoundByAlias {
                    alias: role_alias.to_string(),
                })?;
            if !role.permissions.is_empty() {
                continue;
            }

            let mut permission_ids = Vec::with_capacity(grants.len());
            for alias in grants {
                if let Some(permission) = self.store.find_permission_by_alias(alias).await? {
                    permission_ids.push(permission.id);
                }
            }
            self.store
                .replace_role_permissions(role.id, &permission_ids)
                .await?;
        }

        Ok(())
    }

    async fn ensure_permissions_exist(&self, permission_ids: &[Uuid]) -> Result<()> {
        for id in permission_ids {
            if self.store.find_permission_by_id(*id).await?.is_none() {
                return Err(LibraError::PermissionNotFound { permission_id: *id });
            }
        }
        Ok(())
    }

    async fn reload_role(&self, role_id: Uuid) -> Result<Role> {
        self.store
            .find_role_by_id(role_id)
            .await?
            .ok_or(LibraError::RoleNotFound { role_id })
    }
}
