use std::sync::Arc;

use async_trait::async_trait;
use libra_error::Result;

/// 邮件发送接口；SMTP 等实际投递渠道由部署环境提供
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text_body: &str, html_body: &str) -> Result<()>;
}

/// 把邮件内容写入日志的发送器，本地开发与无邮件服务的环境下使用
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, to: &str, subject: &str, text_body: &str, _html_body: &str) -> Result<()> {
        tracing::info!(to = to, subject = subject, body = text_body, "发送邮件");
        Ok(())
    }
}

/// 通知器 - 拼装认证流程中的各类邮件并交给 MailSender 投递
pub struct Notifier {
    mail: Arc<dyn MailSender>,
    app_url: String,
}

impl Notifier {
    pub fn new(mail: Arc<dyn MailSender>, app_url: impl Into<String>) -> Self {
        Self {
            mail,
            app_url: app_url.into(),
        }
    }

    fn verify_email_link(&self, token: &str) -> String {
        format!("{}/auth/verify-email?token={}", self.app_url, token)
    }

    fn reset_password_link(&self, token: &str) -> String {
        format!("{}/auth/reset-password?token={}", self.app_url, token)
    }

    /// 注册后的邮箱验证邮件，链接中携带 verify_email 令牌
    pub async fn send_verification_email(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<()> {
        let link = self.verify_email_link(token);
        let text = format!(
            "Hi {}!\n\nPlease verify your email address by opening the link below:\n{}\n",
            username, link
        );
        let html = format!(
            "<p>Hi {}!</p><p>Please verify your email address: <a href=\"{}\">Verify email</a></p>",
            username, link
        );
        self.mail.send(to, "Verify Email", &text, &html).await
    }

    /// 验证成功的确认邮件
    pub async fn send_email_verified(&self, to: &str, username: &str) -> Result<()> {
        let text = format!("Hi {}!\n\nYour email has been verified.\n", username);
        let html = format!("<p>Hi {}!</p><p>Your email has been verified.</p>", username);
        self.mail.send(to, "Email Verified", &text, &html).await
    }

    /// 忘记密码邮件，链接中携带 reset_password 令牌
    pub async fn send_email_forgot_password(
        &self,
        to: &str,
        username: &str,
        token: &str,
    ) -> Result<()> {
        let link = self.reset_password_link(token);
        let text = format!(
            "Hi {}!\n\nYou requested a password reset. Open the link below to set a new password:\n{}\n",
            username, link
        );
        let html = format!(
            "<p>Hi {}!</p><p>You requested a password reset: <a href=\"{}\">Reset password</a></p>",
            username, link
        );
        self.mail.send(to, "Reset Password", &text, &html).await
    }

    /// 重置完成邮件，正文包含新密码
    pub async fn send_email_reset_password(
        &self,
        to: &str,
        username: &str,
        new_password: &str,
    ) -> Result<()> {
        let text = format!(
            "Hi {}!\n\nYour password has been reset. New password: {}\n",
            username, new_password
        );
        let html = format!(
            "<p>Hi {}!</p><p>Your password has been reset. New password: <code>{}</code></p>",
            username, new_password
        );
        self.mail
            .send(to, "Password Reset Successfully", &text, &html)
            .await
    }
}
