use std::fmt;
use std::fs;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use libra_error::{LibraError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::User;

/// 令牌类型，写入 `type` claim，每种类型有独立的过期策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    VerifyEmail,
    ResetPassword,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::VerifyEmail => "verify_email",
            TokenKind::ResetPassword => "reset_password",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "access" => Some(TokenKind::Access),
            "refresh" => Some(TokenKind::Refresh),
            "verify_email" => Some(TokenKind::VerifyEmail),
            "reset_password" => Some(TokenKind::ResetPassword),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user ID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>, // 仅 access 令牌
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>, // access / verify_email / reset_password 令牌
    #[serde(rename = "type")]
    pub typ: String, // token type discriminator
    pub iat: i64,    // issued at timestamp
    pub exp: i64,    // expiration timestamp
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| LibraError::InvalidToken {
            message: format!("Invalid user ID in token: {}", e),
        })
    }

    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_str(&self.typ)
    }

    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.typ == kind.as_str()
    }

    /// 解码成功不代表类型正确：每个消费方必须显式检查 `type` claim
    pub fn require_kind(&self, kind: TokenKind) -> Result<()> {
        if self.is_kind(kind) {
            Ok(())
        } else {
            Err(LibraError::InvalidTokenType {
                expected: kind.as_str().to_string(),
            })
        }
    }
}

/// 每种令牌的有效期（分钟）
#[derive(Debug, Clone)]
pub struct TokenTtl {
    pub access_minutes: i64,
    pub refresh_minutes: i64,
    pub verify_email_minutes: i64,
    pub reset_password_minutes: i64,
}

impl TokenTtl {
    fn minutes_for(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_minutes,
            TokenKind::Refresh => self.refresh_minutes,
            TokenKind::VerifyEmail => self.verify_email_minutes,
            TokenKind::ResetPassword => self.reset_password_minutes,
        }
    }
}

/// JWT 服务 - 非对称密钥：私钥签名，公钥验签
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    ttl: TokenTtl,
}

impl JwtService {
    /// 从配置读取 PEM 密钥对
    pub fn from_config(cfg: &AuthConfig) -> Result<Self> {
        let algorithm: Algorithm =
            cfg.algorithm
                .parse()
                .map_err(|_| LibraError::Configuration {
                    key: "AUTH_JWT_ALGORITHM".to_string(),
                    reason: format!("未知的签名算法 '{}'", cfg.algorithm),
                })?;

        let private_pem =
            fs::read(&cfg.private_key_path).map_err(|e| LibraError::Configuration {
                key: "AUTH_JWT_PRIVATE_KEY_PATH".to_string(),
                reason: format!("{}: {}", cfg.private_key_path.display(), e),
            })?;
        let public_pem = fs::read(&cfg.public_key_path).map_err(|e| LibraError::Configuration {
            key: "AUTH_JWT_PUBLIC_KEY_PATH".to_string(),
            reason: format!("{}: {}", cfg.public_key_path.display(), e),
        })?;

        Self::from_pem(
            &private_pem,
            &public_pem,
            algorithm,
            TokenTtl {
                access_minutes: cfg.access_token_expire_minutes,
                refresh_minutes: cfg.refresh_token_expire_minutes,
                verify_email_minutes: cfg.verify_email_token_expire_minutes,
                reset_password_minutes: cfg.reset_password_token_expire_minutes,
            },
        )
    }

    pub fn from_pem(
        private_pem: &[u8],
        public_pem: &[u8],
        algorithm: Algorithm,
        ttl: TokenTtl,
    ) -> Result<Self> {
        let encoding_key =
            EncodingKey::from_rsa_pem(private_pem).map_err(|e| LibraError::Configuration {
                key: "AUTH_JWT_PRIVATE_KEY_PATH".to_string(),
                reason: format!("无法解析私钥: {}", e),
            })?;
        let decoding_key =
            DecodingKey::from_rsa_pem(public_pem).map_err(|e| LibraError::Configuration {
                key: "AUTH_JWT_PUBLIC_KEY_PATH".to_string(),
                reason: format!("无法解析公钥: {}", e),
            })?;

        let validation = Validation::new(algorithm);

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm,
            validation,
            ttl,
        })
    }

    /// 生成访问令牌
    pub fn create_access_token(&self, user: &User) -> Result<String> {
        self.issue(
            TokenKind::Access,
            user.id,
            Some(user.username.clone()),
            Some(user.email.clone()),
            self.ttl.minutes_for(TokenKind::Access),
        )
    }

    /// 生成刷新令牌，只携带 sub
    pub fn create_refresh_token(&self, user_id: Uuid) -> Result<String> {
        self.issue(
            TokenKind::Refresh,
            user_id,
            None,
            None,
            self.ttl.minutes_for(TokenKind::Refresh),
        )
    }

    /// 生成邮箱验证令牌
    pub fn create_verify_email_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        self.issue(
            TokenKind::VerifyEmail,
            user_id,
            None,
            Some(email.to_string()),
            self.ttl.minutes_for(TokenKind::VerifyEmail),
        )
    }

    /// 生成密码重置令牌
    pub fn create_reset_password_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        self.issue(
            TokenKind::ResetPassword,
            user_id,
            None,
            Some(email.to_string()),
            self.ttl.minutes_for(TokenKind::ResetPassword),
        )
    }

    pub(crate) fn issue(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        username: Option<String>,
        email: Option<String>,
        expire_minutes: i64,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username,
            email,
            typ: kind.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(expire_minutes)).timestamp(),
        };

        encode(
            &Header::new(self.algorithm),
            &claims,
            &self.encoding_key,
        )
        .map_err(|e| LibraError::Internal {
            message: format!("Failed to generate {} token: {}", kind, e),
            details: None,
        })
    }

    /// 验证并解码令牌，签名/格式/过期问题一律归为 InvalidToken
    pub fn decode(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => LibraError::InvalidToken {
                    message: "Token has expired".to_string(),
                },
                jsonwebtoken::errors::ErrorKind::InvalidSignature => LibraError::InvalidToken {
                    message: "Invalid token signature".to_string(),
                },
                _ => LibraError::InvalidToken {
                    message: format!("Invalid token: {}", e),
                },
            })
    }

    /// 从 Authorization header 中提取 bearer token
    pub fn extract_token_from_header(authorization: &str) -> Result<&str> {
        authorization
            .strip_prefix("Bearer ")
            .ok_or_else(|| LibraError::Unauthorized {
                message: "Invalid Authorization header format".to_string(),
            })
    }
}
