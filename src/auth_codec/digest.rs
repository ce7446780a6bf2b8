use md5::{Digest, Md5};
use rand::Rng;

use super::AuthChallenge;
use crate::models::Credential;

/// Client side of `qop=auth`
#[derive(Debug, Clone, Copy)]
pub struct QopParams<'a> {
    pub nc: &'a str,
    pub cnonce: &'a str,
}

pub fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// RFC 2617 response hash
///
/// HA1 = MD5(user:realm:pass), HA2 = MD5(method:uri).
/// Without qop: MD5(HA1:nonce:HA2). With qop=auth: MD5(HA1:nonce:nc:cnonce:auth:HA2).
pub fn digest_response(
    credential: &Credential,
    realm: &str,
    nonce: &str,
    method: &str,
    uri: &str,
    qop: Option<QopParams<'_>>,
) -> String {
    let ha1 = md5_hex(&format!(
        "{}:{}:{}",
        credential.username, realm, credential.password
    ));
    response_from_ha1(&ha1, nonce, method, uri, qop)
}

/// MD5-sess HA1 = MD5(MD5(user:realm:pass):nonce:cnonce)
pub fn session_ha1(ha1: &str, nonce: &str, cnonce: &str) -> String {
    md5_hex(&format!("{}:{}:{}", ha1, nonce, cnonce))
}

fn response_from_ha1(ha1: &str, nonce: &str, method: &str, uri: &str, qop: Option<QopParams<'_>>) -> String {
    let ha2 = md5_hex(&format!("{}:{}", method, uri));

    match qop {
        Some(q) => md5_hex(&format!(
            "{}:{}:{}:{}:auth:{}",
            ha1, nonce, q.nc, q.cnonce, ha2
        )),
        None => md5_hex(&format!("{}:{}:{}", ha1, nonce, ha2)),
    }
}

/// Full `Authorization: Digest ...` value.
///
/// `nc` is the number of requests already answered with this nonce plus one.
/// A random cnonce is generated when qop=auth or MD5-sess needs one and none
/// is supplied.
pub fn digest_authorization(
    challenge: &AuthChallenge,
    credential: &Credential,
    method: &str,
    uri: &str,
    cnonce: Option<&str>,
    nc: u32,
) -> String {
    let nonce = challenge.nonce.as_deref().unwrap_or_default();
    let sess = challenge.is_md5_sess();

    let cnonce: Option<String> = if challenge.qop_auth() || sess {
        Some(cnonce.map(str::to_string).unwrap_or_else(random_cnonce))
    } else {
        None
    };
    let nc_value = format!("{:08x}", nc.max(1));
    let qop = if challenge.qop_auth() {
        cnonce.as_deref().map(|c| QopParams {
            nc: nc_value.as_str(),
            cnonce: c,
        })
    } else {
        None
    };

    let mut ha1 = md5_hex(&format!(
        "{}:{}:{}",
        credential.username, challenge.realm, credential.password
    ));
    if let (true, Some(c)) = (sess, cnonce.as_deref()) {
        ha1 = session_ha1(&ha1, nonce, c);
    }
    let response = response_from_ha1(&ha1, nonce, method, uri, qop);

    let mut header = format!(
        r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
        credential.username, challenge.realm, nonce, uri, response
    );
    if let Some(opaque) = &challenge.opaque {
        header.push_str(&format!(r#", opaque="{}""#, opaque));
    }
    if sess {
        header.push_str(", algorithm=MD5-sess");
    } else if challenge.algorithm.is_some() {
        header.push_str(", algorithm=MD5");
    }
    match (qop, cnonce.as_deref()) {
        (Some(q), _) => header.push_str(&format!(r#", qop=auth, nc={}, cnonce="{}""#, q.nc, q.cnonce)),
        (None, Some(c)) => header.push_str(&format!(r#", cnonce="{}""#, c)),
        (None, None) => {}
    }
    header
}

fn random_cnonce() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(qop: Option<&str>) -> AuthChallenge {
        AuthChallenge {
            scheme: super::super::AuthScheme::Digest,
            realm: "cam1".to_string(),
            nonce: Some("abc123".to_string()),
            opaque: None,
            qop: qop.map(str::to_string),
            algorithm: None,
        }
    }

    #[test]
    fn test_digest_response_without_qop() {
        let cred = Credential::new("admin", "1234");
        let resp = digest_response(&cred, "cam1", "abc123", "DESCRIBE", "/ch1", None);
        assert_eq!(resp, "716320314bdd7b8da22b051ae7170faf");
    }

    #[test]
    fn test_digest_response_with_qop() {
        let cred = Credential::new("admin", "1234");
        let qop = QopParams {
            nc: "00000001",
            cnonce: "0a4f113b",
        };
        let resp = digest_response(&cred, "cam1", "abc123", "DESCRIBE", "/ch1", Some(qop));
        assert_eq!(resp, "e792139c22636e784d12bacb80713146");
    }

    #[test]
    fn test_rfc2617_example() {
        let cred = Credential::new("Mufasa", "Circle Of Life");
        let qop = QopParams {
            nc: "00000001",
            cnonce: "0a4f113b",
        };
        let resp = digest_response(
            &cred,
            "testrealm@host.com",
            "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            "GET",
            "/dir/index.html",
            Some(qop),
        );
        assert_eq!(resp, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn test_digest_header_fields() {
        let cred = Credential::new("admin", "1234");
        let header = digest_authorization(&challenge(None), &cred, "DESCRIBE", "/ch1", None, 1);
        assert_eq!(
            header,
            r#"Digest username="admin", realm="cam1", nonce="abc123", uri="/ch1", response="716320314bdd7b8da22b051ae7170faf""#
        );

        let header = digest_authorization(
            &challenge(Some("auth")),
            &cred,
            "DESCRIBE",
            "/ch1",
            Some("0a4f113b"),
            1,
        );
        assert!(header.contains(r#"response="e792139c22636e784d12bacb80713146""#));
        assert!(header.ends_with(r#"qop=auth, nc=00000001, cnonce="0a4f113b""#));
    }

    #[test]
    fn test_generated_cnonce() {
        let cred = Credential::new("admin", "1234");
        let header = digest_authorization(&challenge(Some("auth")), &cred, "DESCRIBE", "/ch1", None, 1);
        let cnonce = header.rsplit("cnonce=\"").next().unwrap().trim_end_matches('"');
        assert_eq!(cnonce.len(), 16);
    }

    #[test]
    fn test_nonce_count_in_header() {
        let cred = Credential::new("admin", "1234");
        let header = digest_authorization(&challenge(Some("auth")), &cred, "DESCRIBE", "/ch1", Some("0a4f113b"), 2);
        assert!(header.contains(r#"response="f49153148d172bbd018410e4c56ff0cc""#));
        assert!(header.contains("nc=00000002"));
        // 0 is treated as the first use
        let header = digest_authorization(&challenge(Some("auth")), &cred, "DESCRIBE", "/ch1", Some("0a4f113b"), 0);
        assert!(header.contains("nc=00000001"));
    }

    #[test]
    fn test_md5_sess() {
        let cred = Credential::new("admin", "1234");
        let mut c = challenge(None);
        c.algorithm = Some("MD5-sess".to_string());
        let header = digest_authorization(&c, &cred, "DESCRIBE", "/ch1", Some("0a4f113b"), 1);
        assert!(header.contains(r#"response="002121bb97f3e18ea5e365702b5f45ff""#));
        assert!(header.contains("algorithm=MD5-sess"));
        assert!(header.ends_with(r#"cnonce="0a4f113b""#));

        c.qop = Some("auth".to_string());
        let header = digest_authorization(&c, &cred, "DESCRIBE", "/ch1", Some("0a4f113b"), 1);
        assert!(header.contains(r#"response="08f0de40859c590fed297359dd92b564""#));
        assert!(header.ends_with(r#"qop=auth, nc=00000001, cnonce="0a4f113b""#));
    }
}
