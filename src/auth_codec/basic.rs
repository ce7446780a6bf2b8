use base64::Engine;

use crate::models::Credential;

/// `Basic base64(user:pass)`
pub fn basic_authorization(credential: &Credential) -> String {
    let token = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", credential.username, credential.password));
    format!("Basic {}", token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_authorization() {
        let cred = Credential::new("admin", "1234");
        assert_eq!(basic_authorization(&cred), "Basic YWRtaW46MTIzNA==");
    }
}
