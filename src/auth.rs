use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::models::Role;

/// JWT claims issued by the external identity service: subject id, resolved
/// role, expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

/// Verified caller identity, inserted into request extensions by the
/// authentication middleware.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user_id: String,
    pub role: Role,
}

/// JWT validation. Token issuance and credential management live with the
/// external identity collaborator; this service only verifies.
pub fn verify_token(token: &str, secret: &str) -> Result<CallerIdentity, String> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    ) {
        Ok(token_data) => Ok(CallerIdentity {
            user_id: token_data.claims.sub,
            role: token_data.claims.role,
        }),
        Err(e) => Err(format!("Token decode error: {}", e)),
    }
}
