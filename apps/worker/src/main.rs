use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use libra_auth::{
    AuthConfig, JwtService, LogMailSender, Notifier, PgUserStore, UserStore,
    USER_REGISTERED_QUEUE,
};
use redis::AsyncCommands;
use uuid::Uuid;

/// 注册事件 worker：BRPOP user-registered 队列，给新用户发验证邮件
///
/// 单条事件处理失败只记日志，不影响后续消费。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")?;
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    let users = PgUserStore::new(pool);

    let cfg = AuthConfig::from_env()?;
    let jwt = JwtService::from_config(&cfg)?;
    let notifier = Notifier::new(Arc::new(LogMailSender), cfg.app_url.clone());

    let client = redis::Client::open(redis_url.as_str())?;
    let mut conn = client.get_async_connection().await?;

    tracing::info!(queue = USER_REGISTERED_QUEUE, "libra-worker 启动，等待注册事件");

    loop {
        // timeout 0 表示无限期阻塞
        let item: std::result::Result<(String, String), redis::RedisError> =
            conn.brpop(USER_REGISTERED_QUEUE, 0.0).await;

        let payload = match item {
            Ok((_, payload)) => payload,
            Err(e) => {
                tracing::error!(error = %e, "BRPOP 失败，1 秒后重连");
                tokio::time::sleep(Duration::from_secs(1)).await;
                match client.get_async_connection().await {
                    Ok(new_conn) => conn = new_conn,
                    Err(e) => tracing::error!(error = %e, "Redis 重连失败"),
                }
                continue;
            }
        };

        if let Err(e) = handle_registered(&users, &jwt, &notifier, &payload).await {
            tracing::error!(payload = %payload, error = %e, "处理注册事件失败");
        }
    }
}

async fn handle_registered(
    users: &PgUserStore,
    jwt: &JwtService,
    notifier: &Notifier,
    payload: &str,
) -> libra_error::Result<()> {
    let user_id = Uuid::parse_str(payload.trim())?;
    let user = users.get_by_id(user_id).await?;

    let token = jwt.create_verify_email_token(user.id, &user.email)?;
    notifier
        .send_verification_email(&user.email, &user.username, &token)
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "验证邮件已发送");
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}
