// ABOUTME: Loopback HTTP server receiving the OAuth authorization redirect
// ABOUTME: Extracts code and state, reports provider errors, and enforces a timeout

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};

pub const CALLBACK_PATH: &str = "/auth/callback";

/// Parameters delivered to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

#[derive(Debug, PartialEq, Eq)]
enum CallbackRequest {
    Authorized(CallbackParams),
    Denied(String),
    Failed(String),
    /// Favicon and other stray requests
    Ignored,
}

pub struct CallbackServer {
    port: u16,
    timeout: Duration,
}

impl CallbackServer {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    pub fn callback_url(&self) -> String {
        callback_url_for(self.port)
    }

    /// Bind the listener. Done before the browser is opened so the
    /// redirect cannot arrive before anyone is listening.
    pub async fn bind(&self) -> AuthResult<BoundCallback> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AuthError::CallbackServer(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::CallbackServer(format!("Failed to read local address: {}", e)))?;

        info!("Waiting for OAuth callback on {}", local_addr);
        Ok(BoundCallback {
            listener,
            local_addr,
            timeout: self.timeout,
        })
    }
}

pub fn callback_url_for(port: u16) -> String {
    format!("http://localhost:{}{}", port, CALLBACK_PATH)
}

pub struct BoundCallback {
    listener: TcpListener,
    local_addr: SocketAddr,
    timeout: Duration,
}

impl BoundCallback {
    pub fn callback_url(&self) -> String {
        callback_url_for(self.local_addr.port())
    }

    /// Serve requests until the redirect arrives or the timeout elapses
    pub async fn wait(self, provider: &str) -> AuthResult<CallbackParams> {
        let timeout = self.timeout;
        tokio::time::timeout(timeout, self.accept_loop(provider))
            .await
            .map_err(|_| AuthError::Timeout(format!("{} authorization callback", provider)))?
    }

    async fn accept_loop(self, provider: &str) -> AuthResult<CallbackParams> {
        loop {
            let (mut stream, peer) = self.listener.accept().await.map_err(|e| {
                AuthError::CallbackServer(format!("Failed to accept connection: {}", e))
            })?;
            debug!("Received callback connection from {}", peer);

            let request = read_request(&mut stream).await?;
            match parse_request(&request) {
                CallbackRequest::Authorized(params) => {
                    respond(&mut stream, "200 OK", SUCCESS_HTML).await;
                    return Ok(params);
                }
                CallbackRequest::Denied(reason) => {
                    respond(&mut stream, "400 Bad Request", &failure_html(&reason)).await;
                    return Err(AuthError::AccessDenied(provider.to_string()));
                }
                CallbackRequest::Failed(reason) => {
                    respond(&mut stream, "400 Bad Request", &failure_html(&reason)).await;
                    return Err(AuthError::OAuthFailed(format!(
                        "{} returned an error: {}",
                        provider, reason
                    )));
                }
                CallbackRequest::Ignored => {
                    respond(&mut stream, "404 Not Found", "").await;
                }
            }
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> AuthResult<String> {
    let mut buffer = vec![0; 4096];
    let n = stream
        .read(&mut buffer)
        .await
        .map_err(|e| AuthError::CallbackServer(format!("Failed to read request: {}", e)))?;
    Ok(String::from_utf8_lossy(&buffer[..n]).into_owned())
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        warn!("Failed to write callback response: {}", e);
    }
}

fn parse_request(request: &str) -> CallbackRequest {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return CallbackRequest::Ignored;
    };

    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return CallbackRequest::Ignored;
    };
    if url.path() != CALLBACK_PATH {
        return CallbackRequest::Ignored;
    }

    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        let reason = params
            .get("error_description")
            .map(|d| format!("{}: {}", error, d))
            .unwrap_or_else(|| error.clone());
        return if error == "access_denied" {
            CallbackRequest::Denied(reason)
        } else {
            CallbackRequest::Failed(reason)
        };
    }

    match (params.get("code"), params.get("state")) {
        (Some(code), Some(state)) => CallbackRequest::Authorized(CallbackParams {
            code: code.clone(),
            state: state.clone(),
        }),
        _ => CallbackRequest::Failed("No authorization code or state in callback".to_string()),
    }
}

fn failure_html(reason: &str) -> String {
    let escaped = reason
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<html><body><h1>Connection failed</h1><p>{}</p><p>You can close this tab and return to your terminal.</p></body></html>",
        escaped
    )
}

const SUCCESS_HTML: &str = r#"<html>
<head>
    <title>Connected</title>
    <style>
        body { font-family: system-ui, -apple-system, sans-serif; max-width: 600px; margin: 100px auto; text-align: center; }
        h1 { color: #22c55e; }
        p { color: #64748b; }
    </style>
</head>
<body>
    <h1>Connected</h1>
    <p>You can now close this tab and return to your terminal.</p>
</body>
</html>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_code_and_state() {
        let request = "GET /auth/callback?code=abc123&state=xyz789 HTTP/1.1\r\nHost: localhost:3737\r\n";
        assert_eq!(
            parse_request(request),
            CallbackRequest::Authorized(CallbackParams {
                code: "abc123".to_string(),
                state: "xyz789".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_decodes_percent_encoding() {
        let request = "GET /auth/callback?state=a%2Fb&code=4%2F0Ad HTTP/1.1\r\n";
        assert_eq!(
            parse_request(request),
            CallbackRequest::Authorized(CallbackParams {
                code: "4/0Ad".to_string(),
                state: "a/b".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_denied_and_errors() {
        assert_eq!(
            parse_request("GET /auth/callback?error=access_denied HTTP/1.1\r\n"),
            CallbackRequest::Denied("access_denied".to_string())
        );
        assert_eq!(
            parse_request(
                "GET /auth/callback?error=server_error&error_description=down HTTP/1.1\r\n"
            ),
            CallbackRequest::Failed("server_error: down".to_string())
        );
        assert!(matches!(
            parse_request("GET /auth/callback?code=only HTTP/1.1\r\n"),
            CallbackRequest::Failed(_)
        ));
    }

    #[test]
    fn test_parse_ignores_other_paths() {
        assert_eq!(
            parse_request("GET /favicon.ico HTTP/1.1\r\n"),
            CallbackRequest::Ignored
        );
        assert_eq!(parse_request(""), CallbackRequest::Ignored);
    }

    #[test]
    fn test_callback_url() {
        let server = CallbackServer::new(3737, Duration::from_secs(60));
        assert_eq!(server.callback_url(), "http://localhost:3737/auth/callback");
    }

    #[tokio::test]
    async fn test_serves_redirect_after_stray_request() {
        let server = CallbackServer::new(0, Duration::from_secs(5));
        let bound = server.bind().await.unwrap();
        let addr = bound.local_addr;

        let client = tokio::spawn(async move {
            for target in ["/favicon.ico", "/auth/callback?code=c1&state=s1"] {
                let mut stream = TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target).as_bytes())
                    .await
                    .unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).await.unwrap();
            }
        });

        let params = bound.wait("google").await.unwrap();
        client.await.unwrap();

        assert_eq!(params.code, "c1");
        assert_eq!(params.state, "s1");
    }

    #[tokio::test]
    async fn test_times_out_without_redirect() {
        let server = CallbackServer::new(0, Duration::from_millis(50));
        let bound = server.bind().await.unwrap();

        assert!(matches!(
            bound.wait("spotify").await,
            Err(AuthError::Timeout(_))
        ));
    }
}
