use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::request::{require_identity, RequestIdentity};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub principal_id: i64,
    pub email: String,
    pub role: String,
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Authenticated principal", body = MeResponse),
        (status = 401, description = "No valid access token presented")
    ),
    tag = "auth"
)]
pub async fn me(identity: Option<Extension<RequestIdentity>>) -> Response {
    match require_identity(identity.map(|Extension(identity)| identity)) {
        Ok(identity) => Json(MeResponse {
            principal_id: identity.principal_id,
            email: identity.email,
            role: identity.role.to_string(),
        })
        .into_response(),
        Err(status) => status.into_response(),
    }
}
