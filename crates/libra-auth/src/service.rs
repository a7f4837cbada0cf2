use std::sync::Arc;

use chrono::Utc;
use libra_core::SuccessResponse;
use libra_error::{LibraError, Result};

use crate::events::EventPublisher;
use crate::jwt::{JwtService, TokenKind};
use crate::mail::Notifier;
use crate::models::{LoginRequest, NewUser, RegisterRequest, TokenResponse, User};
use crate::password::PasswordService;
use crate::permissions::DefaultRole;
use crate::store::{RbacStore, UserStore};

/// 注册事件队列名，payload 为新用户 id
pub const USER_REGISTERED_QUEUE: &str = "user-registered";

/// 认证服务 - 注册、登录、令牌刷新、邮箱验证与密码重置
pub struct AuthService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RbacStore>,
    jwt: Arc<JwtService>,
    notifier: Arc<Notifier>,
    events: Arc<dyn EventPublisher>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RbacStore>,
        jwt: Arc<JwtService>,
        notifier: Arc<Notifier>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            users,
            roles,
            jwt,
            notifier,
            events,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// 注册新用户，分配默认 "user" 角色
    ///
    /// 邮箱存在性检查不区分软删除状态。user-registered 事件发布失败
    /// 只记日志，注册本身照常成功，验证邮件由 worker 异步补发。
    pub async fn register(&self, input: RegisterRequest) -> Result<User> {
        let role = self
            .roles
            .find_role_by_alias(DefaultRole::USER)
            .await?
            .ok_or_else(|| LibraError::RoleNotFoundByAlias {
                alias: DefaultRole::USER.to_string(),
            })?;

        if self.users.find_by_email(&input.email).await?.is_some() {
            return Err(LibraError::UserAlreadyExists { email: input.email });
        }

        let password_hash = PasswordService::hash_password(&input.password)?;
        let user = self
            .users
            .insert(NewUser {
                username: input.username,
                email: input.email,
                password_hash,
                role_id: role.id,
            })
            .await?;

        if let Err(e) = self
            .events
            .publish(USER_REGISTERED_QUEUE, &user.id.to_string())
            .await
        {
            tracing::warn!(user_id = %user.id, error = %e, "user-registered 事件发布失败");
        }

        tracing::info!(user_id = %user.id, email = %user.email, "用户注册成功");
        Ok(user)
    }

    /// 登录换取令牌对
    ///
    /// 用户不存在、密码错误、未激活、已软删除四种情况折叠为同一个
    /// Unauthorized，不向调用方泄露账号状态。
    pub async fn login(&self, input: LoginRequest) -> Result<TokenResponse> {
        let user = match self.users.find_by_email(&input.email).await? {
            Some(user) if user.is_usable() => user,
            _ => return Err(Self::invalid_credentials()),
        };

        if !PasswordService::verify_password(&input.password, &user.password_hash)? {
            return Err(Self::invalid_credentials());
        }

        self.token_pair(&user)
    }

    /// 用 refresh 令牌换新令牌对；旧令牌在自然过期前仍可用（无状态轮换）
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenResponse> {
        let claims = self.jwt.decode(refresh_token)?;
        claims.require_kind(TokenKind::Refresh)?;

        let user = match self.users.find_by_id(claims.user_id()?).await? {
            Some(user) if user.is_usable() => user,
            _ => return Err(Self::invalid_credentials()),
        };

        self.token_pair(&user)
    }

    /// 用 access 令牌解析当前用户，角色与权限集已随用户加载
    pub async fn current_user(&self, access_token: &str) -> Result<User> {
        let claims = self.jwt.decode(access_token)?;
        claims.require_kind(TokenKind::Access)?;

        match self.users.find_by_id(claims.user_id()?).await? {
            Some(user) if user.is_usable() => Ok(user),
            _ => Err(Self::invalid_credentials()),
        }
    }

    /// 邮箱验证
    ///
    /// 令牌类型不符与重复验证是 soft 失败（success=false），不是错误；
    /// 签名/过期问题仍走 InvalidToken 错误路径。
    pub async fn verify_email(&self, token: &str) -> Result<SuccessResponse> {
        let claims = self.jwt.decode(token)?;
        if !claims.is_kind(TokenKind::VerifyEmail) {
            return Ok(SuccessResponse::failure("Invalid token type"));
        }

        let user = match self.users.find_by_id(claims.user_id()?).await? {
            Some(user) if user.is_usable() => user,
            _ => return Err(LibraError::UserNotFound),
        };

        if user.email_verify_at.is_some() {
            return Ok(SuccessResponse::failure(
                "The email has already been verified.",
            ));
        }

        self.users.set_email_verify_at(user.id, Utc::now()).await?;
        self.notifier
            .send_email_verified(&user.email, &user.username)
            .await?;

        Ok(SuccessResponse::ok(format!(
            "Verified email for {}",
            user.email
        )))
    }

    /// 发起密码重置，邮件中携带 reset_password 令牌链接
    pub async fn forgot_password(&self, email: &str) -> Result<SuccessResponse> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) if user.is_usable() => user,
            _ => return Err(LibraError::UserNotFound),
        };

        let token = self.jwt.create_reset_password_token(user.id, &user.email)?;
        self.notifier
            .send_email_forgot_password(&user.email, &user.username, &token)
            .await?;

        Ok(SuccessResponse::ok(format!(
            "Password reset email sent to {}",
            user.email
        )))
    }

    /// 按令牌中的 email claim 定位用户并重置密码
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<SuccessResponse> {
        let claims = self.jwt.decode(token)?;
        if !claims.is_kind(TokenKind::ResetPassword) {
            return Ok(SuccessResponse::failure("Invalid token type"));
        }

        let email = claims.email.clone().ok_or_else(|| LibraError::InvalidToken {
            message: "Token missing email claim".to_string(),
        })?;
        let user = match self.users.find_by_email(&email).await? {
            Some(user) if user.is_usable() => user,
            _ => return Err(LibraError::UserNotFound),
        };

        let password_hash = PasswordService::hash_password(new_password)?;
        self.users.set_password(user.id, &password_hash).await?;
        self.notifier
            .send_email_reset_password(&user.email, &user.username, new_password)
            .await?;

        Ok(SuccessResponse::ok("Password reset successfully"))
    }

    fn token_pair(&self, user: &User) -> Result<TokenResponse> {
        Ok(TokenResponse {
            token_type: "Bearer".to_string(),
            access_token: self.jwt.create_access_token(user)?,
            refresh_token: self.jwt.create_refresh_token(user.id)?,
        })
    }

    fn invalid_credentials() -> LibraError {
        LibraError::Unauthorized {
            message: "Invalid credentials".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        make_role, make_user_with_role, test_jwt, MemoryRbacStore, MemoryUserStore,
        RecordingMailer, RecordingPublisher,
    };
    use chrono::Utc;

    struct Harness {
        svc: AuthService,
        users: Arc<MemoryUserStore>,
        mailer: Arc<RecordingMailer>,
        publisher: Arc<RecordingPublisher>,
    }

    async fn harness_with(publisher: Arc<RecordingPublisher>) -> Harness {
        let user_role = make_role(DefaultRole::USER, &["book.show", "book.list"]);
        let roles = Arc::new(MemoryRbacStore::default());
        roles.push_role(user_role.clone()).await;
        let users = Arc::new(MemoryUserStore::new(vec![user_role]));
        let mailer = Arc::new(RecordingMailer::default());

        let svc = AuthService::new(
            users.clone(),
            roles,
            Arc::new(test_jwt()),
            Arc::new(Notifier::new(mailer.clone(), "https://libra.example.com")),
            publisher.clone(),
        );

        Harness {
            svc,
            users,
            mailer,
            publisher,
        }
    }

    async fn harness() -> Harness {
        harness_with(Arc::new(RecordingPublisher::new())).await
    }

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_assigns_default_role_and_hashes_password() {
        let h = harness().await;

        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        assert_eq!(user.role.alias, DefaultRole::USER);
        assert_ne!(user.password_hash, "secret123");
        assert!(PasswordService::verify_password("secret123", &user.password_hash).unwrap());
        assert!(user.email_verify_at.is_none());
    }

    #[tokio::test]
    async fn test_register_publishes_user_registered_event() {
        let h = harness().await;

        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let events = h.publisher.events.read().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, USER_REGISTERED_QUEUE);
        assert_eq!(events[0].1, user.id.to_string());
    }

    #[tokio::test]
    async fn test_register_succeeds_when_queue_is_down() {
        let h = harness_with(Arc::new(RecordingPublisher::failing())).await;

        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        assert_eq!(user.email, "reader@example.com");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_rejected_even_for_deleted_user() {
        let h = harness().await;

        let role = make_role(DefaultRole::USER, &[]);
        let mut deleted = make_user_with_role("old", "taken@example.com", role);
        deleted.deleted_at = Some(Utc::now());
        h.users.push(deleted).await;

        let result = h
            .svc
            .register(register_request("new", "taken@example.com", "secret123"))
            .await;

        assert!(matches!(
            result,
            Err(LibraError::UserAlreadyExists { email }) if email == "taken@example.com"
        ));
    }

    #[tokio::test]
    async fn test_register_fails_when_default_role_missing() {
        let roles = Arc::new(MemoryRbacStore::default());
        let users = Arc::new(MemoryUserStore::new(vec![]));
        let mailer = Arc::new(RecordingMailer::default());
        let svc = AuthService::new(
            users,
            roles,
            Arc::new(test_jwt()),
            Arc::new(Notifier::new(mailer, "https://libra.example.com")),
            Arc::new(RecordingPublisher::new()),
        );

        let result = svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await;

        assert!(matches!(
            result,
            Err(LibraError::RoleNotFoundByAlias { alias }) if alias == DefaultRole::USER
        ));
    }

    #[tokio::test]
    async fn test_login_returns_bearer_token_pair() {
        let h = harness().await;
        h.svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let tokens = h
            .svc
            .login(login_request("reader@example.com", "secret123"))
            .await
            .unwrap();

        assert_eq!(tokens.token_type, "Bearer");
        let access = h.svc.jwt().decode(&tokens.access_token).unwrap();
        assert_eq!(access.kind(), Some(TokenKind::Access));
        let refresh = h.svc.jwt().decode(&tokens.refresh_token).unwrap();
        assert_eq!(refresh.kind(), Some(TokenKind::Refresh));
    }

    #[tokio::test]
    async fn test_login_failures_collapse_to_invalid_credentials() {
        let h = harness().await;
        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        // 未知邮箱
        let unknown = h
            .svc
            .login(login_request("nobody@example.com", "secret123"))
            .await;
        // 密码错误
        let wrong = h
            .svc
            .login(login_request("reader@example.com", "wrong"))
            .await;

        for result in [unknown, wrong] {
            match result {
                Err(LibraError::Unauthorized { message }) => {
                    assert_eq!(message, "Invalid credentials");
                }
                other => panic!("expected Unauthorized, got {:?}", other),
            }
        }

        // 未激活账号也一样
        let role = make_role(DefaultRole::USER, &[]);
        let mut inactive = make_user_with_role("off", "off@example.com", role);
        inactive.is_active = false;
        inactive.password_hash = PasswordService::hash_password("secret123").unwrap();
        h.users.push(inactive).await;

        match h.svc.login(login_request("off@example.com", "secret123")).await {
            Err(LibraError::Unauthorized { message }) => {
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("expected Unauthorized, got {:?}", other),
        }

        // 已软删除的账号，即使密码正确
        let role = make_role(DefaultRole::USER, &[]);
        let mut gone = make_user_with_role("gone", "gone@example.com", role);
        gone.deleted_at = Some(Utc::now());
        gone.password_hash = PasswordService::hash_password("secret123").unwrap();
        h.users.push(gone).await;

        match h.svc.login(login_request("gone@example.com", "secret123")).await {
            Err(LibraError::Unauthorized { message }) => {
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("expected Unauthorized, got {:?}", other),
        }
        let _ = user;
    }

    #[tokio::test]
    async fn test_refresh_requires_refresh_token() {
        let h = harness().await;
        h.svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();
        let tokens = h
            .svc
            .login(login_request("reader@example.com", "secret123"))
            .await
            .unwrap();

        // access 令牌不能用来刷新
        assert!(matches!(
            h.svc.refresh_tokens(&tokens.access_token).await,
            Err(LibraError::InvalidTokenType { expected }) if expected == "refresh"
        ));

        let renewed = h.svc.refresh_tokens(&tokens.refresh_token).await.unwrap();
        let claims = h.svc.jwt().decode(&renewed.access_token).unwrap();
        assert_eq!(claims.kind(), Some(TokenKind::Access));
    }

    #[tokio::test]
    async fn test_refresh_rejected_for_deactivated_user() {
        let h = harness().await;
        let role = make_role(DefaultRole::USER, &[]);
        let mut user = make_user_with_role("reader", "reader@example.com", role);
        user.is_active = false;
        let user_id = user.id;
        h.users.push(user).await;

        let refresh = h.svc.jwt().create_refresh_token(user_id).unwrap();

        assert!(matches!(
            h.svc.refresh_tokens(&refresh).await,
            Err(LibraError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_current_user_round_trip() {
        let h = harness().await;
        let registered = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();
        let tokens = h
            .svc
            .login(login_request("reader@example.com", "secret123"))
            .await
            .unwrap();

        let user = h.svc.current_user(&tokens.access_token).await.unwrap();
        assert_eq!(user.id, registered.id);
        assert_eq!(user.role.alias, DefaultRole::USER);

        // refresh 令牌不能当 access 用
        assert!(matches!(
            h.svc.current_user(&tokens.refresh_token).await,
            Err(LibraError::InvalidTokenType { expected }) if expected == "access"
        ));
    }

    #[tokio::test]
    async fn test_verify_email_marks_user_and_sends_confirmation() {
        let h = harness().await;
        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let token = h
            .svc
            .jwt()
            .create_verify_email_token(user.id, &user.email)
            .unwrap();
        let response = h.svc.verify_email(&token).await.unwrap();

        assert!(response.success);
        assert_eq!(
            response.msg.as_deref(),
            Some("Verified email for reader@example.com")
        );

        let stored = h.users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.email_verify_at.is_some());

        let sent = h.mailer.sent.read().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Email Verified");
    }

    #[tokio::test]
    async fn test_verify_email_wrong_token_kind_is_soft_failure() {
        let h = harness().await;
        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let access = h.svc.jwt().create_access_token(&user).unwrap();
        let response = h.svc.verify_email(&access).await.unwrap();

        assert!(!response.success);
        assert_eq!(response.msg.as_deref(), Some("Invalid token type"));
    }

    #[tokio::test]
    async fn test_verify_email_twice_is_soft_failure() {
        let h = harness().await;
        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();
        let token = h
            .svc
            .jwt()
            .create_verify_email_token(user.id, &user.email)
            .unwrap();

        h.svc.verify_email(&token).await.unwrap();
        let second = h.svc.verify_email(&token).await.unwrap();

        assert!(!second.success);
        assert_eq!(
            second.msg.as_deref(),
            Some("The email has already been verified.")
        );
    }

    #[tokio::test]
    async fn test_forgot_password_sends_reset_link() {
        let h = harness().await;
        h.svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let response = h.svc.forgot_password("reader@example.com").await.unwrap();
        assert!(response.success);
        assert_eq!(
            response.msg.as_deref(),
            Some("Password reset email sent to reader@example.com")
        );

        let sent = h.mailer.sent.read().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0]
            .text_body
            .contains("https://libra.example.com/auth/reset-password?token="));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email_is_not_found() {
        let h = harness().await;
        assert!(matches!(
            h.svc.forgot_password("nobody@example.com").await,
            Err(LibraError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_changes_credentials() {
        let h = harness().await;
        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let token = h
            .svc
            .jwt()
            .create_reset_password_token(user.id, &user.email)
            .unwrap();
        let response = h.svc.reset_password(&token, "newpass456").await.unwrap();

        assert!(response.success);
        assert_eq!(response.msg.as_deref(), Some("Password reset successfully"));

        // 旧密码失效，新密码可登录
        assert!(h
            .svc
            .login(login_request("reader@example.com", "secret123"))
            .await
            .is_err());
        h.svc
            .login(login_request("reader@example.com", "newpass456"))
            .await
            .unwrap();

        // 通知邮件正文包含新密码
        let sent = h.mailer.sent.read().await;
        let reset_mail = sent
            .iter()
            .find(|m| m.subject == "Password Reset Successfully")
            .unwrap();
        assert!(reset_mail.text_body.contains("newpass456"));
    }

    #[tokio::test]
    async fn test_reset_password_wrong_token_kind_is_soft_failure() {
        let h = harness().await;
        let user = h
            .svc
            .register(register_request("reader", "reader@example.com", "secret123"))
            .await
            .unwrap();

        let verify = h
            .svc
            .jwt()
            .create_verify_email_token(user.id, &user.email)
            .unwrap();
        let response = h.svc.reset_password(&verify, "newpass456").await.unwrap();

        assert!(!response.success);
        assert_eq!(response.msg.as_deref(), Some("Invalid token type"));
    }
}
