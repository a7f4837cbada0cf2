use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use dotenv::dotenv;
use libra_auth::{
    AuthConfig, AuthService, DefaultRole, JwtService, LogMailSender, NewUser, Notifier,
    PasswordService, PgRbacStore, PgUserStore, RbacService, RbacStore, RedisEventPublisher,
    UserStore,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod auth_routes;
mod catalog_routes;
mod rbac_routes;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rbac: Arc<RbacService>,
    pub pool: sqlx::PgPool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")?;
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let cfg = AuthConfig::from_env()?;
    let jwt = Arc::new(JwtService::from_config(&cfg)?);
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));
    let roles: Arc<dyn RbacStore> = Arc::new(PgRbacStore::new(pool.clone()));
    let notifier = Arc::new(Notifier::new(Arc::new(LogMailSender), cfg.app_url.clone()));
    let events = Arc::new(RedisEventPublisher::new(&redis_url)?);

    let auth = Arc::new(AuthService::new(
        users.clone(),
        roles.clone(),
        jwt,
        notifier,
        events,
    ));
    let rbac = Arc::new(RbacService::new(roles.clone(), users.clone()));

    rbac.seed().await?;
    bootstrap_superadmin(&users, &roles).await?;

    let state = AppState {
        auth: auth.clone(),
        rbac,
        pool,
    };

    let app = Router::new()
        .nest("/auth", auth_routes::router())
        .merge(rbac_routes::router(auth.clone()))
        .merge(catalog_routes::router(auth))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("APP_PORT").unwrap_or_else(|_| "8000".to_string());
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!(%addr, "libra-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
    let fmt_layer = fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,tower_http=info"))
        .unwrap();
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// 从 APP_SUPERADMIN_EMAIL / APP_SUPERADMIN_PASSWORD 创建超管账号
///
/// 未配置时跳过；账号已存在时不做任何修改。超管邮箱视为已验证。
async fn bootstrap_superadmin(
    users: &Arc<dyn UserStore>,
    roles: &Arc<dyn RbacStore>,
) -> anyhow::Result<()> {
    let (email, password) = match (
        std::env::var("APP_SUPERADMIN_EMAIL"),
        std::env::var("APP_SUPERADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => (email, password),
        _ => return Ok(()),
    };

    if users.find_by_email(&email).await?.is_some() {
        return Ok(());
    }

    let role = roles
        .find_role_by_alias(DefaultRole::SUPERADMIN)
        .await?
        .ok_or_else(|| anyhow::anyhow!("superadmin role missing, seed did not run"))?;

    let user = users
        .insert(NewUser {
            username: "superadmin".to_string(),
            email: email.clone(),
            password_hash: PasswordService::hash_password(&password)?,
            role_id: role.id,
        })
        .await?;
    users.set_email_verify_at(user.id, Utc::now()).await?;

    tracing::info!(email = %email, "超管账号已创建");
    Ok(())
}
