pub mod config;
pub mod events;
pub mod jwt;
pub mod mail;
pub mod middleware;
pub mod models;
pub mod password;
pub mod permissions;
pub mod rbac;
pub mod service;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出核心类型
pub use config::AuthConfig;
pub use events::{EventPublisher, RedisEventPublisher};
pub use jwt::{Claims, JwtService, TokenKind, TokenTtl};
pub use mail::{LogMailSender, MailSender, Notifier};
pub use middleware::{authorize, RequirePermission};
pub use models::{NewPermission, NewUser, Permission, Role, TokenResponse, User};
pub use password::PasswordService;
pub use permissions::{DefaultRole, PermissionGroup, Permissions};
pub use rbac::RbacService;
pub use service::{AuthService, USER_REGISTERED_QUEUE};
pub use store::{PgRbacStore, PgUserStore, RbacStore, UserStore};

// 错误类型
pub use libra_error::{LibraError, Result};
