//! AuthCodec - Authentication header construction and parsing
//!
//! ## Responsibilities
//!
//! - Parse `WWW-Authenticate` challenges (Digest / Basic)
//! - RFC 2617 Digest response computation
//! - Basic credentials header
//! - WS-Security UsernameToken for ONVIF SOAP calls
//!
//! Pure functions only. No I/O happens in this module.

mod basic;
mod challenge;
mod digest;
mod ws_security;

pub use basic::basic_authorization;
pub use challenge::{AuthChallenge, AuthScheme};
pub use digest::{digest_authorization, digest_response, md5_hex, session_ha1, QopParams};
pub use ws_security::{password_digest, UsernameToken};

use crate::models::Credential;

/// Build the `Authorization` header value answering `challenge`. `nc` is the
/// Digest nonce count for this request and is ignored by Basic.
pub fn authorization_header(
    challenge: &AuthChallenge,
    credential: &Credential,
    method: &str,
    uri: &str,
    nc: u32,
) -> String {
    match challenge.scheme {
        AuthScheme::Digest => digest_authorization(challenge, credential, method, uri, None, nc),
        AuthScheme::Basic => basic_authorization(credential),
    }
}
