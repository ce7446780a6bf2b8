use std::fmt;

/// Supported authentication schemes, in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthScheme {
    Digest,
    Basic,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Digest => write!(f, "Digest"),
            AuthScheme::Basic => write!(f, "Basic"),
        }
    }
}

/// Parsed `WWW-Authenticate` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    pub realm: String,
    pub nonce: Option<String>,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub algorithm: Option<String>,
}

impl AuthChallenge {
    /// Parse one header value. Returns None for unknown schemes and for
    /// Digest challenges that cannot be answered (no realm, no nonce, not MD5 or MD5-sess).
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, rest) = header
            .split_once(char::is_whitespace)
            .unwrap_or((header, ""));

        let scheme = if scheme.eq_ignore_ascii_case("digest") {
            AuthScheme::Digest
        } else if scheme.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else {
            return None;
        };

        let mut challenge = AuthChallenge {
            scheme,
            realm: String::new(),
            nonce: None,
            opaque: None,
            qop: None,
            algorithm: None,
        };
        let mut has_realm = false;

        for (key, value) in parse_params(rest) {
            match key.as_str() {
                "realm" => {
                    challenge.realm = value;
                    has_realm = true;
                }
                "nonce" => challenge.nonce = Some(value),
                "opaque" => challenge.opaque = Some(value),
                "qop" => challenge.qop = Some(value),
                "algorithm" => challenge.algorithm = Some(value),
                _ => {}
            }
        }

        if scheme == AuthScheme::Digest {
            if !has_realm || challenge.realm.is_empty() {
                return None;
            }
            if challenge.nonce.as_deref().map_or(true, str::is_empty) {
                return None;
            }
            if let Some(alg) = &challenge.algorithm {
                if !alg.eq_ignore_ascii_case("md5") && !alg.eq_ignore_ascii_case("md5-sess") {
                    return None;
                }
            }
        }

        Some(challenge)
    }

    /// Parse every header value, keep the usable ones, Digest first
    pub fn parse_all<'a, I>(headers: I) -> Vec<AuthChallenge>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut challenges: Vec<AuthChallenge> =
            headers.into_iter().filter_map(AuthChallenge::parse).collect();
        challenges.sort_by_key(|c| c.scheme);
        challenges
    }

    pub fn is_md5_sess(&self) -> bool {
        self.algorithm
            .as_deref()
            .map(|a| a.eq_ignore_ascii_case("md5-sess"))
            .unwrap_or(false)
    }

    /// Whether the server offered `qop=auth`
    pub fn qop_auth(&self) -> bool {
        self.qop
            .as_deref()
            .map(|q| q.split(',').any(|v| v.trim().eq_ignore_ascii_case("auth")))
            .unwrap_or(false)
    }
}

/// Split `k1="v, 1", k2=v2` into pairs. Keys are lowercased.
fn parse_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq]
            .trim()
            .trim_start_matches(',')
            .trim()
            .to_ascii_lowercase();
        rest = rest[eq + 1..].trim_start();

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut escaped = false;
            let mut end = None;
            for (i, c) in quoted.char_indices() {
                if escaped {
                    out.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    end = Some(i);
                    break;
                } else {
                    out.push(c);
                }
            }
            rest = match end {
                Some(i) => &quoted[i + 1..],
                None => "",
            };
            out
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let token = rest[..end].trim().to_string();
            rest = &rest[end..];
            token
        };

        rest = rest.trim_start().trim_start_matches(',').trim_start();
        if !key.is_empty() {
            params.push((key, value));
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digest() {
        let c = AuthChallenge::parse(
            r#"Digest realm="IP Camera(12345)", nonce="abc123", qop="auth,auth-int", opaque="xyz""#,
        )
        .unwrap();
        assert_eq!(c.scheme, AuthScheme::Digest);
        assert_eq!(c.realm, "IP Camera(12345)");
        assert_eq!(c.nonce.as_deref(), Some("abc123"));
        assert_eq!(c.opaque.as_deref(), Some("xyz"));
        assert!(c.qop_auth());
    }

    #[test]
    fn test_parse_quoted_comma() {
        let c = AuthChallenge::parse(r#"Digest realm="a, b", nonce=n1"#).unwrap();
        assert_eq!(c.realm, "a, b");
        assert_eq!(c.nonce.as_deref(), Some("n1"));
        assert!(!c.qop_auth());
    }

    #[test]
    fn test_invalid_digest_discarded() {
        assert!(AuthChallenge::parse(r#"Digest realm="cam1""#).is_none());
        assert!(AuthChallenge::parse(r#"Digest nonce="abc""#).is_none());
        assert!(AuthChallenge::parse(r#"Digest realm="", nonce="abc""#).is_none());
        assert!(AuthChallenge::parse(r#"Digest realm="r", nonce="n", algorithm=SHA-256"#).is_none());
        assert!(AuthChallenge::parse(r#"Negotiate abc"#).is_none());
    }

    #[test]
    fn test_md5_sess_accepted() {
        let c = AuthChallenge::parse(r#"Digest realm="r", nonce="n", algorithm=MD5-sess, qop="auth""#).unwrap();
        assert!(c.is_md5_sess());
        let c = AuthChallenge::parse(r#"Digest realm="r", nonce="n", algorithm=MD5"#).unwrap();
        assert!(!c.is_md5_sess());
    }

    #[test]
    fn test_basic_without_realm() {
        let c = AuthChallenge::parse("Basic").unwrap();
        assert_eq!(c.scheme, AuthScheme::Basic);
        assert_eq!(c.realm, "");
    }

    #[test]
    fn test_parse_all_prefers_digest() {
        let headers = [
            r#"Basic realm="cam""#,
            r#"Digest realm="cam""#,
            r#"Digest realm="cam", nonce="n1""#,
        ];
        let challenges = AuthChallenge::parse_all(headers);
        assert_eq!(challenges.len(), 2);
        assert_eq!(challenges[0].scheme, AuthScheme::Digest);
        assert_eq!(challenges[0].nonce.as_deref(), Some("n1"));
        assert_eq!(challenges[1].scheme, AuthScheme::Basic);
    }
}
