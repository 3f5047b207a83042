use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Claims issued by the identity service. `sub` carries the account id.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub role: String,
}

impl TryFrom<AccountClaims> for Account {
    type Error = AppError;

    fn try_from(claims: AccountClaims) -> Result<Self, Self::Error> {
        let id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthenticationError("invalid subject claim".to_string()))?;
        Ok(Account { id, role: claims.role })
    }
}

pub async fn require_account(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("unauthorized".to_string()))?;

    let token_data = decode::<AccountClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(e.to_string()))?;

    let account = Account::try_from(token_data.claims)?;
    tracing::debug!(account_id = account.id, role = %account.role, "Authenticated request");
    req.extensions_mut().insert(account);

    Ok(next.run(req).await)
}
