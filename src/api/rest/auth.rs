use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::identity::{Caller, Role, VerificationLevel};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_RATING_HEADER: &str = "x-user-rating";
pub const USER_VERIFICATION_HEADER: &str = "x-user-verification";

/// Caller identity forwarded by the authorization layer in front of the service.
#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers)
    }
}

fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, AppError> {
    let user_id = header_str(headers, USER_ID_HEADER)?
        .ok_or(AppError::Unauthenticated)?
        .parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("{USER_ID_HEADER} must be a UUID")))?;

    let role = match header_str(headers, USER_ROLE_HEADER)? {
        None | Some("customer") => Role::Customer,
        Some("traveler") => Role::Traveler,
        Some("admin") => Role::Admin,
        Some(other) => {
            return Err(AppError::Validation(format!("unknown role {other}")));
        }
    };

    let rating = header_str(headers, USER_RATING_HEADER)?
        .map(|raw| {
            raw.parse::<f64>()
                .ok()
                .filter(|rating| (0.0..=5.0).contains(rating))
                .ok_or_else(|| {
                    AppError::Validation(format!("{USER_RATING_HEADER} must be between 0 and 5"))
                })
        })
        .transpose()?;

    let verification = match header_str(headers, USER_VERIFICATION_HEADER)? {
        None | Some("unverified") => VerificationLevel::Unverified,
        Some("basic") => VerificationLevel::Basic,
        Some("verified") => VerificationLevel::Verified,
        Some(other) => {
            return Err(AppError::Validation(format!(
                "unknown verification level {other}"
            )));
        }
    };

    Ok(Caller {
        user_id,
        role,
        rating,
        verification,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::Validation(format!("{name} is not valid text")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_user_id_is_unauthenticated() {
        let headers = HeaderMap::new();
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn defaults_to_unverified_customer() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.user_id, id);
        assert_eq!(caller.role, Role::Customer);
        assert_eq!(caller.rating, None);
        assert_eq!(caller.verification, VerificationLevel::Unverified);
    }

    #[test]
    fn reads_traveler_profile() {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(),
        );
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("traveler"));
        headers.insert(USER_RATING_HEADER, HeaderValue::from_static("4.7"));
        headers.insert(USER_VERIFICATION_HEADER, HeaderValue::from_static("verified"));

        let caller = caller_from_headers(&headers).unwrap();
        assert_eq!(caller.role, Role::Traveler);
        assert_eq!(caller.rating, Some(4.7));
        assert_eq!(caller.verification, VerificationLevel::Verified);
    }

    #[test]
    fn rejects_malformed_values() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::Validation(_))
        ));

        headers.insert(
            USER_ID_HEADER,
            HeaderValue::from_str(&Uuid::new_v4().to_string()).unwrap(),
        );
        headers.insert(USER_RATING_HEADER, HeaderValue::from_static("9"));
        assert!(matches!(
            caller_from_headers(&headers),
            Err(AppError::Validation(_))
        ));
    }
}
