//! Principal extraction for HTTP handlers.
//!
//! Authentication itself (password checks, token issuance) happens upstream;
//! this layer trusts the identity headers injected by the auth gateway and
//! only turns them into a typed [`Principal`]. Roles are a closed enum and
//! are matched exhaustively, never compared as strings.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use model::{Principal, Role};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the authenticated user id (UUID).
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated role (`USER` or `ADMIN`).
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor for any authenticated principal.
#[derive(Debug, Clone, Copy)]
pub struct AuthPrincipal(pub Principal);

/// Extractor that additionally requires the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminPrincipal(pub Principal);

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, USER_ID_HEADER)
            .ok_or(ApiError::Unauthorized("missing x-user-id header"))?;
        let id: Uuid = id
            .parse()
            .map_err(|_| ApiError::Unauthorized("invalid x-user-id header"))?;

        let role = header_str(parts, USER_ROLE_HEADER)
            .ok_or(ApiError::Unauthorized("missing x-user-role header"))?;
        let role: Role = role
            .parse()
            .map_err(|_| ApiError::Unauthorized("invalid x-user-role header"))?;

        Ok(AuthPrincipal(Principal { id, role }))
    }
}

impl<S> FromRequestParts<S> for AdminPrincipal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthPrincipal(principal) = AuthPrincipal::from_request_parts(parts, state).await?;
        match principal.role {
            Role::Admin => Ok(AdminPrincipal(principal)),
            Role::User => Err(ApiError::Forbidden("admin role required")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_valid_user_principal() {
        let mut parts = parts_with(&[
            (USER_ID_HEADER, "7f2c1f6e-26a5-4c5f-9e7a-0b9f4a3d8e21"),
            (USER_ROLE_HEADER, "USER"),
        ]);
        let AuthPrincipal(principal) = AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(principal.role, Role::User);
        assert!(!principal.is_admin());
    }

    #[tokio::test]
    async fn test_missing_headers_rejected() {
        let mut parts = parts_with(&[]);
        assert!(AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());

        let mut parts = parts_with(&[(USER_ID_HEADER, "not-a-uuid"), (USER_ROLE_HEADER, "USER")]);
        assert!(AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let mut parts = parts_with(&[
            (USER_ID_HEADER, "7f2c1f6e-26a5-4c5f-9e7a-0b9f4a3d8e21"),
            (USER_ROLE_HEADER, "ROOT"),
        ]);
        assert!(AuthPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_admin_extractor_requires_admin_role() {
        let mut parts = parts_with(&[
            (USER_ID_HEADER, "7f2c1f6e-26a5-4c5f-9e7a-0b9f4a3d8e21"),
            (USER_ROLE_HEADER, "ADMIN"),
        ]);
        assert!(AdminPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_ok());

        let mut parts = parts_with(&[
            (USER_ID_HEADER, "7f2c1f6e-26a5-4c5f-9e7a-0b9f4a3d8e21"),
            (USER_ROLE_HEADER, "USER"),
        ]);
        assert!(AdminPrincipal::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }
}
