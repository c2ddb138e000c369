use actix_web::HttpRequest;
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub const TOKEN_HEADER: &str = "X-Token";

const TOKEN_BYTES: usize = 16;

/// Generates the per-process secret: 16 random bytes, hex encoded.
pub fn generate_token() -> Result<String, AppError> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| AppError::Config(format!("Failed to generate token: {e}")))?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

/// Rejects the request unless its token header matches `expected`.
pub fn authorize(req: &HttpRequest, expected: &str) -> Result<(), AppError> {
    let presented = req
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::PermissionDenied("missing token".into()))?;

    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied("invalid token".into()))
    }
}
