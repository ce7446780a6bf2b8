//! RTSP request session with authentication negotiation
//!
//! The first 401 is answered once: challenges are parsed, Digest is preferred
//! over Basic, invalid challenges are skipped, and the request is retried with
//! the negotiated header. Later requests (SETUP, PLAY, ...) reuse the
//! negotiated challenge with a digest computed for their own method and URI.

use std::net::SocketAddr;
use std::time::Duration;

use crate::auth_codec::{authorization_header, AuthChallenge};
use crate::error::{Error, Result};
use crate::models::Credential;
use crate::transport::{RtspConnection, RtspRequest, RtspResponse};

pub struct RtspSession {
    addr: SocketAddr,
    io_timeout: Duration,
    conn: RtspConnection,
    credential: Option<Credential>,
    challenge: Option<AuthChallenge>,
    auth_retry_used: bool,
    /// Digest requests sent with the current nonce
    nonce_count: u32,
    session_id: Option<String>,
}

impl RtspSession {
    pub async fn open(addr: SocketAddr, credential: Option<&Credential>, io_timeout: Duration) -> Result<Self> {
        let conn = RtspConnection::connect(addr, io_timeout).await?;
        Ok(Self {
            addr,
            io_timeout,
            conn,
            credential: credential.cloned(),
            challenge: None,
            auth_retry_used: false,
            nonce_count: 0,
            session_id: None,
        })
    }

    pub fn challenge(&self) -> Option<&AuthChallenge> {
        self.challenge.as_ref()
    }

    pub fn set_session_id(&mut self, id: String) {
        self.session_id = Some(id);
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Send a request, answering the first 401 with one authenticated retry
    pub async fn request(&mut self, method: &str, uri: &str, headers: &[(&str, String)]) -> Result<RtspResponse> {
        let response = self.send(method, uri, headers).await?;
        if response.status != 401 || self.auth_retry_used {
            return Ok(response);
        }
        self.auth_retry_used = true;

        if self.credential.is_none() {
            return Ok(response);
        }

        let challenges = AuthChallenge::parse_all(response.header_values("WWW-Authenticate"));
        let Some(challenge) = challenges.into_iter().next() else {
            tracing::debug!(addr = %self.addr, uri = %uri, "401 without a usable challenge");
            return Ok(response);
        };
        tracing::debug!(addr = %self.addr, scheme = %challenge.scheme, realm = %challenge.realm, "Auth negotiated");
        self.challenge = Some(challenge);
        self.nonce_count = 0;

        if response.closes_connection() {
            self.reconnect().await?;
            return self.send(method, uri, headers).await;
        }

        match self.send(method, uri, headers).await {
            // Peer hung up after the 401: same retry on a fresh socket
            Err(Error::Network(_)) | Err(Error::Io(_)) => {
                self.reconnect().await?;
                self.send(method, uri, headers).await
            }
            other => other,
        }
    }

    /// Best-effort TEARDOWN; errors are ignored
    pub async fn teardown(&mut self, uri: &str) {
        let mut headers = Vec::new();
        if let Some(id) = &self.session_id {
            headers.push(("Session", id.clone()));
        }
        if let Err(e) = self.send("TEARDOWN", uri, &headers).await {
            tracing::debug!(addr = %self.addr, error = %e, "TEARDOWN failed");
        }
    }

    async fn send(&mut self, method: &str, uri: &str, headers: &[(&str, String)]) -> Result<RtspResponse> {
        let mut request = RtspRequest::new(method, uri);
        for (name, value) in headers {
            request = request.header(name, value.clone());
        }
        if let Some(value) = self.authorization(method, uri) {
            request = request.header("Authorization", value);
        }
        self.conn.send(&request).await
    }

    /// Header for the next request; each Digest use bumps the nonce count
    fn authorization(&mut self, method: &str, uri: &str) -> Option<String> {
        let (challenge, credential) = (self.challenge.as_ref()?, self.credential.as_ref()?);
        self.nonce_count = self.nonce_count.saturating_add(1);
        Some(authorization_header(challenge, credential, method, uri, self.nonce_count))
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.conn = RtspConnection::connect(self.addr, self.io_timeout).await?;
        Ok(())
    }
}
