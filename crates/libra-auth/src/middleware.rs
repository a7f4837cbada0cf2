use std::sync::Arc;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use libra_error::{LibraError, Result};
use tower_http::auth::{AsyncAuthorizeRequest, AsyncRequireAuthorizationLayer};

use crate::jwt::JwtService;
use crate::models::User;
use crate::service::AuthService;

/// 路由门卫的核心判定：认证 + 权限检查
///
/// 判定顺序固定：缺失/格式错误的 Authorization header 和无效令牌都是
/// 认证问题（401），只有身份确认之后权限不足才是 403。
pub async fn authorize(
    auth: &AuthService,
    authorization: Option<&str>,
    permission: &str,
) -> Result<User> {
    let header = authorization.ok_or_else(|| LibraError::Unauthorized {
        message: "Missing Authorization header".to_string(),
    })?;
    let token = JwtService::extract_token_from_header(header)?;
    let user = auth.current_user(token).await?;

    if !user.has_permission(permission) {
        return Err(LibraError::Forbidden {
            permission: permission.to_string(),
        });
    }

    Ok(user)
}

/// 按路由挂载的权限门卫，通过后把 User 放进 request extensions
#[derive(Clone)]
pub struct RequirePermission {
    auth: Arc<AuthService>,
    permission: &'static str,
}

impl RequirePermission {
    pub fn layer(
        auth: Arc<AuthService>,
        permission: &'static str,
    ) -> AsyncRequireAuthorizationLayer<Self> {
        AsyncRequireAuthorizationLayer::new(Self { auth, permission })
    }
}

impl<B> AsyncAuthorizeRequest<B> for RequirePermission
where
    B: Send + 'static,
{
    type RequestBody = B;
    type ResponseBody = axum::body::Body;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<
                    Output = std::result::Result<Request<B>, Response<Self::ResponseBody>>,
                > + Send,
        >,
    >;

    fn authorize(&mut self, request: Request<B>) -> Self::Future {
        let auth = self.auth.clone();
        let permission = self.permission;

        Box::pin(async move {
            let header = request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            match authorize(&auth, header.as_deref(), permission).await {
                Ok(user) => {
                    let mut request = request;
                    request.extensions_mut().insert(user);
                    Ok(request)
                }
                Err(e) => Err(e.into_response()),
            }
        })
    }
}
