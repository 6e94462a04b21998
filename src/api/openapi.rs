use utoipa::OpenApi;

use super::handlers::{auth, health, me};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, auth::login, auth::reissue, auth::logout, me::me),
    components(schemas(
        health::Health,
        auth::LoginResponse,
        auth::TokenResponse,
        me::MeResponse,
    )),
    tags(
        (name = "auth", description = "Login, token rotation, and logout"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::openapi;

    #[test]
    fn openapi_lists_auth_routes() {
        let doc = openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|path| path.as_str() == "/auth/google"));
        assert!(paths.iter().any(|path| path.as_str() == "/auth/reissue"));
        assert!(paths.iter().any(|path| path.as_str() == "/auth/logout"));
        assert!(paths.iter().any(|path| path.as_str() == "/me"));
    }
}
