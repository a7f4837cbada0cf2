use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use libra_auth::models::{
    Permission, PermissionCreate, PermissionUpdate, Role, RoleCreate, RoleUpdate,
};
use libra_auth::{AuthService, Permissions, RequirePermission};
use libra_core::ResponseList;
use libra_error::Result;
use uuid::Uuid;

use crate::AppState;

/// 角色/权限管理路由，每个路由挂各自的权限门卫
pub fn router(auth: Arc<AuthService>) -> Router<AppState> {
    let gate = |permission: &'static str| RequirePermission::layer(auth.clone(), permission);

    Router::new()
        .route(
            "/roles",
            get(list_roles)
                .layer(gate(Permissions::ROLE_LIST))
                .merge(post(create_role).layer(gate(Permissions::ROLE_CREATE))),
        )
        .route(
            "/roles/:id",
            get(get_role)
                .layer(gate(Permissions::ROLE_SHOW))
                .merge(patch(update_role).layer(gate(Permissions::ROLE_UPDATE)))
                .merge(delete(delete_role).layer(gate(Permissions::ROLE_DELETE))),
        )
        .route(
            "/permissions",
            get(list_permissions)
                .layer(gate(Permissions::PERMISSION_LIST))
                .merge(post(create_permission).layer(gate(Permissions::PERMISSION_CREATE))),
        )
        .route(
            "/permissions/:id",
            patch(update_permission).layer(gate(Permissions::PERMISSION_UPDATE)),
        )
}

async fn list_roles(State(state): State<AppState>) -> Result<Json<ResponseList<Role>>> {
    Ok(Json(ResponseList::new(state.rbac.get_all_roles().await?)))
}

async fn get_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Role>> {
    Ok(Json(state.rbac.get_role(id).await?))
}

async fn create_role(
    State(state): State<AppState>,
    Json(input): Json<RoleCreate>,
) -> Result<(StatusCode, Json<Role>)> {
    let role = state.rbac.create_role(input).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<RoleUpdate>,
) -> Result<Json<Role>> {
    Ok(Json(state.rbac.update_role(id, input).await?))
}

async fn delete_role(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.rbac.delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<ResponseList<Permission>>> {
    Ok(Json(ResponseList::new(
        state.rbac.get_all_permissions().await?,
    )))
}

async fn create_permission(
    State(state): State<AppState>,
    Json(input): Json<PermissionCreate>,
) -> Result<(StatusCode, Json<Permission>)> {
    let permission = state.rbac.create_permission(input).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

async fn update_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PermissionUpdate>,
) -> Result<Json<Permission>> {
    Ok(Json(state.rbac.update_permission(id, input).await?))
}
