//! HTTP implementation of the pairing API
//!
//! Credentials for this flow are the ambient session cookie, not a bearer
//! token. The client keeps a cookie jar, and a configured session cookie is
//! sent on every request.

use async_trait::async_trait;
use reqwest::header::COOKIE;
use std::time::Duration;
use tracing::{debug, info};

use mp_protocol::{
    PairReply, PairRequest, PairResponseBody, ScreenSummary, ScreensResponse,
    IDEMPOTENCY_KEY_HEADER, INSTALLATION_ID_HEADER, MAX_RESPONSE_SIZE, PAIR_PATH, SCREENS_PATH,
};

use super::{PairingApi, SubmissionMeta};
use crate::error::{MenupiError, Result};
use crate::settings::AgentSettings;

pub struct HttpPairingApi {
    http: reqwest::Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl HttpPairingApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| MenupiError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_cookie: None,
        })
    }

    pub fn from_settings(settings: &AgentSettings) -> Result<Self> {
        let mut api = Self::new(&settings.api_base_url, settings.request_timeout())?;
        api.session_cookie = settings.session_cookie.clone();
        Ok(api)
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_credentials(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_cookie {
            Some(cookie) => req.header(COOKIE, cookie),
            None => req,
        }
    }
}

#[async_trait]
impl PairingApi for HttpPairingApi {
    async fn list_screens(&self) -> Result<Vec<ScreenSummary>> {
        let url = self.url(SCREENS_PATH);
        debug!(url = %url, "Fetching screens");

        let resp = self
            .with_credentials(self.http.get(&url))
            .send()
            .await
            .map_err(|e| MenupiError::network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = read_body(resp).await?;

        if !(200..300).contains(&status) {
            let parsed = PairResponseBody::from_body(&body);
            return Err(MenupiError::PairingRejected {
                status,
                message: parsed
                    .error
                    .unwrap_or_else(|| format!("screen listing failed (HTTP {})", status)),
            });
        }

        let parsed: ScreensResponse = serde_json::from_str(&body)
            .map_err(|e| MenupiError::Decode(format!("screens response: {}", e)))?;
        debug!(count = parsed.screens.len(), "Fetched screens");
        Ok(parsed.screens)
    }

    async fn pair(&self, request: &PairRequest, meta: &SubmissionMeta) -> Result<PairReply> {
        let url = self.url(PAIR_PATH);

        let mut req = self
            .http
            .post(&url)
            .json(request)
            .header(IDEMPOTENCY_KEY_HEADER, &meta.idempotency_key);
        if let Some(installation_id) = &meta.installation_id {
            req = req.header(INSTALLATION_ID_HEADER, installation_id);
        }

        let resp = self
            .with_credentials(req)
            .send()
            .await
            .map_err(|e| MenupiError::network(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = read_body(resp).await?;

        info!(status, by_code = request.public_code.is_some(), "Pairing response received");
        Ok(PairReply {
            status,
            body: PairResponseBody::from_body(&body),
        })
    }
}

async fn read_body(mut resp: reqwest::Response) -> Result<String> {
    if let Some(len) = resp.content_length() {
        if len > MAX_RESPONSE_SIZE as u64 {
            return Err(too_large(len));
        }
    }

    // Chunked bodies carry no length; stop as soon as the cap is crossed
    let mut body = Vec::new();
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| MenupiError::network(format!("failed to read response: {}", e)))?
    {
        if body.len() + chunk.len() > MAX_RESPONSE_SIZE {
            return Err(too_large((body.len() + chunk.len()) as u64));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

fn too_large(len: u64) -> MenupiError {
    MenupiError::Decode(format!(
        "response too large: at least {} bytes (max {})",
        len, MAX_RESPONSE_SIZE
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_base_url_is_normalized() {
        let api = HttpPairingApi::new("http://example.test/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://example.test");
        assert_eq!(api.url(PAIR_PATH), "http://example.test/api/pair");
    }

    #[test]
    fn test_from_settings_carries_cookie() {
        let settings = AgentSettings {
            api_base_url: "https://signage.example".to_string(),
            session_cookie: Some("session=abc".to_string()),
            ..Default::default()
        };
        let api = HttpPairingApi::from_settings(&settings).unwrap();
        assert_eq!(api.session_cookie.as_deref(), Some("session=abc"));
        assert_eq!(api.url(SCREENS_PATH), "https://signage.example/api/screens");
    }

    /// Serve one HTTP/1.1 response with a chunked body, then close
    async fn serve_chunked(chunks: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match sock.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                        Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if sock.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            for chunk in chunks {
                let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
                frame.extend_from_slice(&chunk);
                frame.extend_from_slice(b"\r\n");
                if sock.write_all(&frame).await.is_err() {
                    return;
                }
            }
            let _ = sock.write_all(b"0\r\n\r\n").await;
        });

        format!("http://{}", addr)
    }

    fn local_api(base_url: String) -> HttpPairingApi {
        HttpPairingApi {
            http: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
            base_url,
            session_cookie: None,
        }
    }

    #[tokio::test]
    async fn test_chunked_body_is_read_in_pieces() {
        let url = serve_chunked(vec![
            br#"{"screens":[{"id":"scr_1","#.to_vec(),
            br#""name":"Lobby"}]}"#.to_vec(),
        ])
        .await;
        let api = local_api(url);

        let screens = api.list_screens().await.unwrap();
        assert_eq!(screens.len(), 1);
        assert_eq!(screens[0].name, "Lobby");
    }

    #[tokio::test]
    async fn test_oversized_chunked_body_is_refused() {
        let chunks = (0..8).map(|_| vec![b' '; MAX_RESPONSE_SIZE / 4]).collect();
        let url = serve_chunked(chunks).await;
        let api = local_api(url);

        let err = api.list_screens().await.unwrap_err();
        assert!(matches!(err, MenupiError::Decode(ref msg) if msg.contains("too large")));
    }
}
