use base64::Engine;
use rand::Rng;
use sha1::{Digest, Sha1};

use crate::models::Credential;

/// WS-Security UsernameToken (PasswordDigest profile)
///
/// A token is single use: every SOAP request builds a fresh one.
#[derive(Debug, Clone)]
pub struct UsernameToken {
    pub username: String,
    pub password_digest: String,
    pub nonce_b64: String,
    pub created: String,
}

impl UsernameToken {
    /// New token with a 16-byte random nonce and the current UTC time
    pub fn generate(credential: &Credential) -> Self {
        let mut rng = rand::thread_rng();
        let nonce: [u8; 16] = rng.gen();
        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        Self::from_parts(credential, &nonce, &created)
    }

    pub fn from_parts(credential: &Credential, nonce: &[u8], created: &str) -> Self {
        Self {
            username: credential.username.clone(),
            password_digest: password_digest(nonce, created, &credential.password),
            nonce_b64: base64::engine::general_purpose::STANDARD.encode(nonce),
            created: created.to_string(),
        }
    }

    /// `<wsse:Security>` header block
    pub fn to_xml(&self) -> String {
        format!(
            r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">
      <wsse:UsernameToken>
        <wsse:Username>{}</wsse:Username>
        <wsse:Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest">{}</wsse:Password>
        <wsse:Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{}</wsse:Nonce>
        <wsu:Created>{}</wsu:Created>
      </wsse:UsernameToken>
    </wsse:Security>"#,
            xml_escape(&self.username),
            self.password_digest,
            self.nonce_b64,
            self.created
        )
    }
}

/// PasswordDigest = Base64(SHA1(nonce + created + password))
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
