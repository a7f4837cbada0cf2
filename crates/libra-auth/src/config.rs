use std::env;
use std::path::PathBuf;

use libra_error::{LibraError, Result};

/// 认证配置，进程启动时读取一次，之后以不可变引用注入各服务
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// 对外基础 URL，用于拼接邮件里的验证/重置链接
    pub app_url: String,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub algorithm: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_minutes: i64,
    pub verify_email_token_expire_minutes: i64,
    pub reset_password_token_expire_minutes: i64,
}

impl AuthConfig {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            app_url: env_or("APP_URL", "https://localhost"),
            private_key_path: PathBuf::from(env_or(
                "AUTH_JWT_PRIVATE_KEY_PATH",
                "jwt-private.pem",
            )),
            public_key_path: PathBuf::from(env_or("AUTH_JWT_PUBLIC_KEY_PATH", "jwt-public.pem")),
            algorithm: env_or("AUTH_JWT_ALGORITHM", "RS256"),
            access_token_expire_minutes: env_i64("AUTH_JWT_ACCESS_TOKEN_EXPIRED", 10)?,
            refresh_token_expire_minutes: env_i64("AUTH_JWT_REFRESH_TOKEN_EXPIRED", 60 * 24 * 7)?,
            verify_email_token_expire_minutes: env_i64("AUTH_JWT_VERIFY_TOKEN_EXPIRED", 60)?,
            reset_password_token_expire_minutes: env_i64(
                "AUTH_JWT_RESET_PASSWORD_TOKEN_EXPIRED",
                60,
            )?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_i64(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| LibraError::Configuration {
            key: key.to_string(),
            reason: format!("'{}' 不是合法的整数", raw),
        }),
        Err(_) => Ok(default),
    }
}
