use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use facturo_auth::JwtIssuer;
use facturo_core::Entity;

use crate::app::dto::{self, ValidatedJson};
use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::UserContext;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::RegisterRequest>,
) -> ApiResult<Response> {
    let user = services.users.register(body.into()).await?;
    let token = services.tokens.issue(*user.id(), Utc::now())?;

    let body = dto::AuthResponse {
        message: Some("user registered"),
        user: user.profile(),
        token,
    };
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ValidatedJson(body): ValidatedJson<dto::LoginRequest>,
) -> ApiResult<Json<dto::AuthResponse>> {
    let user = services.users.authenticate(&body.email, &body.password).await?;
    let token = services.tokens.issue(*user.id(), Utc::now())?;

    Ok(Json(dto::AuthResponse {
        message: None,
        user: user.profile(),
        token,
    }))
}

pub async fn profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<UserContext>,
) -> ApiResult<Json<facturo_auth::UserProfile>> {
    let user = services.users.get_user(caller.user_id()).await?;
    Ok(Json(user.profile()))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<UserContext>,
    ValidatedJson(body): ValidatedJson<dto::UpdateProfileRequest>,
) -> ApiResult<Json<dto::ProfileUpdatedResponse>> {
    let user = services
        .users
        .update_user(caller.user_id(), body.into())
        .await?;

    Ok(Json(dto::ProfileUpdatedResponse {
        message: "profile updated",
        user: user.profile(),
    }))
}
