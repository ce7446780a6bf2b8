use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::tcp::connect_with_timeout;
use crate::error::{Error, Result};

pub const USER_AGENT: &str = concat!("camscan/", env!("CARGO_PKG_VERSION"));

/// Upper bound for a response body (SDP is a few KB)
const MAX_BODY_BYTES: usize = 64 * 1024;

/// One RTSP request. `CSeq` and `User-Agent` are added by the connection.
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn encode(&self, cseq: u32) -> String {
        let mut out = format!(
            "{} {} RTSP/1.0\r\nCSeq: {}\r\nUser-Agent: {}\r\n",
            self.method, self.uri, cseq, USER_AGENT
        );
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

/// Parsed RTSP response
#[derive(Debug, Clone, Default)]
pub struct RtspResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RtspResponse {
    /// First header with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Session id without the `;timeout=` suffix
    pub fn session_id(&self) -> Option<String> {
        self.header("Session")
            .and_then(|s| s.split(';').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn closes_connection(&self) -> bool {
        self.header("Connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }
}

/// Read one response: status line, headers up to the blank line, then a body
/// bounded by `Content-Length`. Without a length, a body is only read (up to the
/// next blank line or EOF) when `Content-Type` announces one.
pub async fn read_response<R>(reader: &mut R) -> Result<RtspResponse>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();

    // Status line, tolerating stray CRLFs between messages
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(Error::Network("connection closed by peer".to_string()));
        }
        if !line.trim().is_empty() {
            break;
        }
    }

    let status_line = line.trim_end().to_string();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("RTSP/") {
        return Err(Error::Protocol(format!("bad status line: {}", status_line)));
    }
    let status: u16 = parts
        .next()
        .and_then(|c| c.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("bad status code: {}", status_line)))?;
    let reason = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line.trim().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let mut response = RtspResponse {
        status,
        reason,
        headers,
        body: String::new(),
    };

    let content_length = response
        .header("Content-Length")
        .and_then(|v| v.parse::<usize>().ok());

    match content_length {
        Some(len) => {
            let len = len.min(MAX_BODY_BYTES);
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await?;
            response.body = String::from_utf8_lossy(&body).into_owned();
        }
        None if response.header("Content-Type").is_some() => {
            loop {
                line.clear();
                let n = reader.read_line(&mut line).await?;
                if n == 0 || line.trim().is_empty() || response.body.len() > MAX_BODY_BYTES {
                    break;
                }
                response.body.push_str(&line);
            }
        }
        None => {}
    }

    Ok(response)
}

/// A TCP connection carrying sequential RTSP requests
pub struct RtspConnection {
    stream: BufReader<TcpStream>,
    addr: SocketAddr,
    cseq: u32,
    io_timeout: Duration,
}

impl RtspConnection {
    pub async fn connect(addr: SocketAddr, io_timeout: Duration) -> Result<Self> {
        let stream = connect_with_timeout(addr, io_timeout).await?;
        Ok(Self {
            stream: BufReader::new(stream),
            addr,
            cseq: 0,
            io_timeout,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send a request and wait for its response
    pub async fn send(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        self.cseq += 1;
        let encoded = request.encode(self.cseq);

        tracing::debug!(
            addr = %self.addr,
            method = %request.method,
            uri = %request.uri,
            cseq = self.cseq,
            "RTSP request"
        );

        let io_timeout = self.io_timeout;
        let exchange = async {
            self.stream.get_mut().write_all(encoded.as_bytes()).await?;
            read_response(&mut self.stream).await
        };

        match timeout(io_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{} {} ({}ms)",
                request.method,
                request.uri,
                io_timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_read_response_content_length() {
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nContent-Type: application/sdp\r\nContent-Length: 10\r\n\r\nv=0\r\nm=vEXTRA";
        let mut reader: &[u8] = raw;
        let resp = read_response(&mut reader).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.reason, "OK");
        assert_eq!(resp.header("cseq"), Some("2"));
        assert_eq!(resp.header("Content-type"), Some("application/sdp"));
        assert_eq!(resp.header("Session"), None);
        assert_eq!(resp.body, "v=0\r\nm=vE");
    }

    #[tokio::test]
    async fn test_read_response_body_until_blank() {
        let raw = b"RTSP/1.0 200 OK\r\nContent-Type: application/sdp\r\n\r\nv=0\r\nm=video 0 RTP/AVP 96\r\n\r\ntrailing";
        let mut reader: &[u8] = raw;
        let resp = read_response(&mut reader).await.unwrap();
        assert_eq!(resp.body, "v=0\r\nm=video 0 RTP/AVP 96\r\n");
    }

    #[tokio::test]
    async fn test_read_response_no_body() {
        let raw = b"\r\nRTSP/1.0 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"a\"\r\nWWW-Authenticate: Digest realm=\"a\", nonce=\"b\"\r\nSession: 1234ABCD;timeout=60\r\n\r\n";
        let mut reader: &[u8] = raw;
        let resp = read_response(&mut reader).await.unwrap();
        assert_eq!(resp.status, 401);
        assert_eq!(resp.header_values("www-authenticate").count(), 2);
        assert_eq!(resp.session_id().as_deref(), Some("1234ABCD"));
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_read_response_errors() {
        let mut empty: &[u8] = b"";
        assert!(matches!(read_response(&mut empty).await, Err(Error::Network(_))));

        let mut http: &[u8] = b"HTTP/1.1 200 OK\r\n\r\n";
        assert!(matches!(read_response(&mut http).await, Err(Error::Protocol(_))));
    }

    #[test]
    fn test_request_encode() {
        let req = RtspRequest::new("DESCRIBE", "rtsp://10.0.0.1:554/live").header("Accept", "application/sdp");
        let encoded = req.encode(3);
        assert!(encoded.starts_with("DESCRIBE rtsp://10.0.0.1:554/live RTSP/1.0\r\nCSeq: 3\r\n"));
        assert!(encoded.contains("Accept: application/sdp\r\n"));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_connection_cseq_increments() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            for _ in 0..2 {
                let mut cseq = String::new();
                loop {
                    let mut line = String::new();
                    socket.read_line(&mut line).await.unwrap();
                    if let Some(v) = line.strip_prefix("CSeq: ") {
                        cseq = v.trim().to_string();
                    }
                    if line == "\r\n" {
                        break;
                    }
                }
                let reply = format!("RTSP/1.0 200 OK\r\nCSeq: {}\r\n\r\n", cseq);
                socket.get_mut().write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let mut conn = RtspConnection::connect(addr, Duration::from_secs(2)).await.unwrap();
        let req = RtspRequest::new("OPTIONS", "rtsp://127.0.0.1/");
        assert_eq!(conn.send(&req).await.unwrap().header("CSeq"), Some("1"));
        assert_eq!(conn.send(&req).await.unwrap().header("CSeq"), Some("2"));
    }
}
