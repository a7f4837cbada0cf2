use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libra_error::{LibraError, Result};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{NewPermission, NewUser, Permission, Role, User};

/// 用户存储接口
///
/// find_* 是裸查询；get_* 只过滤软删除（deleted_at），is_active 故意不在这里检查：
/// 登录/刷新/当前用户等调用点各自决定是否应用「可用」不变式。
/// 所有用户查询都会一并加载角色及其权限集，避免授权路径上的 N+1。
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn set_email_verify_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()>;
    async fn count_by_role(&self, role_id: Uuid) -> Result<i64>;

    async fn get_by_email(&self, email: &str) -> Result<User> {
        match self.find_by_email(email).await? {
            Some(user) if !user.is_deleted() => Ok(user),
            _ => Err(LibraError::UserNotFound),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        match self.find_by_id(id).await? {
            Some(user) if !user.is_deleted() => Ok(user),
            _ => Err(LibraError::UserNotFound),
        }
    }
}

/// 角色/权限存储接口
#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>>;
    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_alias(&self, alias: &str) -> Result<Option<Role>>;
    async fn insert_role(&self, alias: &str) -> Result<Role>;
    async fn rename_role(&self, role_id: Uuid, alias: &str) -> Result<()>;
    async fn delete_role(&self, role_id: Uuid) -> Result<()>;
    /// 整体替换，不是增量修改；在一个事务内完成
    async fn replace_role_permissions(&self, role_id: Uuid, permission_ids: &[Uuid])
        -> Result<()>;

    async fn list_permissions(&self) -> Result<Vec<Permission>>;
    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>>;
    async fn find_permission_by_alias(&self, alias: &str) -> Result<Option<Permission>>;
    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission>;
    async fn update_permission_description(
        &self,
        id: Uuid,
        description: Option<&str>,
    ) -> Result<Permission>;
}

fn db_err(operation: &str, e: sqlx::Error) -> LibraError {
    tracing::error!(operation = operation, error = %e, "数据库操作失败");
    LibraError::Database {
        message: format!("{}: {}", operation, e),
    }
}

fn map_permission(row: &sqlx::postgres::PgRow) -> Permission {
    Permission {
        id: row.get("id"),
        group: row.get("group"),
        alias: row.get("alias"),
        description: row.get("description"),
    }
}

async fn load_role_permissions(pool: &PgPool, role_id: Uuid) -> Result<Vec<Permission>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p."group", p.alias, p.description
        FROM rbac_permissions p
        JOIN rbac_role_permission rp ON rp.permission_id = p.id
        WHERE rp.role_id = $1
        "#,
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
    .map_err(|e| db_err("load_role_permissions", e))?;

    Ok(rows.iter().map(map_permission).collect())
}

async fn load_role(pool: &PgPool, role_id: Uuid) -> Result<Role> {
    let row = sqlx::query("SELECT id, alias FROM rbac_roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| db_err("load_role", e))?
        .ok_or(LibraError::RoleNotFound { role_id })?;

    let permissions = load_role_permissions(pool, role_id).await?;

    Ok(Role {
        id: row.get("id"),
        alias: row.get("alias"),
        permissions,
    })
}

fn map_user(row: &sqlx::postgres::PgRow, role: Role) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        email_verify_at: row.get("email_verify_at"),
        role_id: row.get("role_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
        role,
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, email_verify_at, \
                            role_id, created_at, updated_at, deleted_at";

/// Postgres 用户存储
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: Option<sqlx::postgres::PgRow>) -> Result<Option<User>> {
        match row {
            None => Ok(None),
            Some(row) => {
                let role = load_role(&self.pool, row.get("role_id")).await?;
                Ok(Some(map_user(&row, role)))
            }
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find_user_by_email", e))?;
        self.hydrate(row).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find_user_by_id", e))?;
        self.hydrate(row).await
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_active, role_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, $6)
            "#,
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // 唯一约束是并发重复注册的最终仲裁者
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return LibraError::UserAlreadyExists {
                        email: user.email.clone(),
                    };
                }
            }
            db_err("insert_user", e)
        })?;

        self.get_by_id(id).await
    }

    async fn set_email_verify_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET email_verify_at = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("set_email_verify_at", e))?;
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("set_password", e))?;
        Ok(())
    }

    async fn count_by_role(&self, role_id: Uuid) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM users WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_err("count_users_by_role", e))?;
        Ok(row.get("cnt"))
    }
}

/// Postgres 角色/权限存储
pub struct PgRbacStore {
    pool: PgPool,
}

impl PgRbacStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RbacStore for PgRbacStore {
    async fn list_roles(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT id, alias FROM rbac_roles ORDER BY alias")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list_roles", e))?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            roles.push(Role {
                id,
                alias: row.get("alias"),
                permissions: load_role_permissions(&self.pool, id).await?,
            });
        }
        Ok(roles)
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>> {
        match load_role(&self.pool, role_id).await {
            Ok(role) => Ok(Some(role)),
            Err(LibraError::RoleNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_role_by_alias(&self, alias: &str) -> Result<Option<Role>> {
        let row = sqlx::query("SELECT id FROM rbac_roles WHERE alias = $1")
            .bind(alias.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_err("find_role_by_alias", e))?;

        match row {
            None => Ok(None),
            Some(row) => self.find_role_by_id(row.get("id")).await,
        }
    }

    async fn insert_role(&self, alias: &str) -> Result<Role> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO rbac_roles (id, alias) VALUES ($1, $2)")
            .bind(id)
            .bind(alias.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return LibraError::Validation {
                            message: format!("角色别名 '{}' 已存在", alias),
                        };
                    }
                }
                db_err("insert_role", e)
            })?;

        Ok(Role {
            id,
            alias: alias.to_string(),
            permissions: Vec::new(),
        })
    }

    async fn rename_role(&self, role_id: Uuid, alias: &str) -> Result<()> {
        sqlx::query("UPDATE rbac_roles SET alias = $2 WHERE id = $1")
            .bind(role_id)
            .bind(alias.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("rename_role", e))?;
        Ok(())
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("delete_role:begin", e))?;

        sqlx::query("DELETE FROM rbac_role_permission WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("delete_role:detach", e))?;

        sqlx::query("DELETE FROM rbac_roles WHERE id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("delete_role", e))?;

        tx.commit().await.map_err(|e| db_err("delete_role:commit", e))
    }

    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<()> {
        // 其他读者只能看到提交后的完整集合，不会观察到 clear 与 re-append 之间的中间态
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("replace_role_permissions:begin", e))?;

        sqlx::query("DELETE FROM rbac_role_permission WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("replace_role_permissions:clear", e))?;

        for permission_id in permission_ids {
            sqlx::query(
                "INSERT INTO rbac_role_permission (role_id, permission_id) VALUES ($1, $2)",
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("replace_role_permissions:attach", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_err("replace_role_permissions:commit", e))
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let rows = sqlx::query(
            r#"SELECT id, "group", alias, description FROM rbac_permissions ORDER BY "group", alias"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("list_permissions", e))?;

        Ok(rows.iter().map(map_permission).collect())
    }

    async fn find_permission_by_id(&self, id: Uuid) -> Result<Option<Permission>> {
        let row = sqlx::query(
            r#"SELECT id, "group", alias, description FROM rbac_permissions WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("find_permission_by_id", e))?;

        Ok(row.as_ref().map(map_permission))
    }

    async fn find_permission_by_alias(&self, alias: &str) -> Result<Option<Permission>> {
        let row = sqlx::query(
            r#"SELECT id, "group", alias, description FROM rbac_permissions WHERE alias = $1"#,
        )
        .bind(alias.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("find_permission_by_alias", e))?;

        Ok(row.as_ref().map(map_permission))
    }

    async fn insert_permission(&self, permission: NewPermission) -> Result<Permission> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO rbac_permissions (id, "group", alias, description) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(id)
        .bind(&permission.group)
        .bind(&permission.alias)
        .bind(&permission.description)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("insert_permission", e))?;

        Ok(Permission {
            id,
            group: permission.group,
            alias: permission.alias,
            description: permission.description,
        })
    }

    async fn update_permission_description(
        &self,
        id: Uuid,
        description: Option<&str>,
    ) -> Result<Permission> {
        let row = sqlx::query(
            r#"
            UPDATE rbac_permissions SET description = $2
            WHERE id = $1
            RETURNING id, "group", alias, description
            "#,
        )
        .bind(id)
        .bind(description.map(|s| s.to_string()))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("update_permission_description", e))?
        .ok_or(LibraError::PermissionNotFound { permission_id: id })?;

        Ok(map_permission(&row))
    }
}
