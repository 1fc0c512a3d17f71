//! Random values for login attempts and session identifiers

use base64::Engine as _;
use rand::RngCore as _;

/// Number of random bytes behind every generated token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generates an opaque random token.
///
/// 32 bytes from the thread-local CSPRNG encoded as base64url without
/// padding, giving a 43 character string.
///
/// # Examples
///
/// ```
/// use oidc_gateway::oidc::generators::random_token;
///
/// let token = random_token();
/// assert_eq!(token.len(), 43);
/// ```
pub fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generates a fresh `nonce` for an authorization request.
pub fn nonce() -> String {
    random_token()
}

/// Generates a fresh `state` for an authorization request.
pub fn state() -> String {
    random_token()
}
