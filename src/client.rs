use std::time::Duration;
use thiserror::Error;

pub const SYSTEM_PROMPT: &str = "You are a grammar correction assistant. Fix any grammatical errors in the text provided without changing the meaning or adding additional commentary. Return only the corrected text with no explanations.";

const TEMPERATURE: f64 = 0.3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("no API key stored")]
    MissingCredential,
    #[error("nothing to correct")]
    EmptyInput,
    #[error("request failed: {0}")]
    RequestFailed(#[source] reqwest::Error),
    #[error("API returned HTTP {0}")]
    HttpStatus(u16),
    #[error("unexpected response body")]
    MalformedResponse,
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(serde::Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Pulls `choices[0].message.content` out of a chat-completion body.
fn extract_content(body: &[u8]) -> Result<String, CorrectionError> {
    let parsed: ChatResponse =
        serde_json::from_slice(body).map_err(|_| CorrectionError::MalformedResponse)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|s| !s.trim().is_empty())
        .ok_or(CorrectionError::MalformedResponse)
}

/// Cheap to clone; share one per app.
#[derive(Clone)]
pub struct CorrectionClient {
    http: reqwest::Client,
    base_url: String,
}

impl CorrectionClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fix_grammar(
        &self,
        text: &str,
        api_key: &str,
        model: &str,
    ) -> Result<String, CorrectionError> {
        if api_key.trim().is_empty() {
            return Err(CorrectionError::MissingCredential);
        }
        if text.is_empty() {
            return Err(CorrectionError::EmptyInput);
        }

        let req = ChatRequest {
            model,
            messages: [
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: text },
            ],
            temperature: TEMPERATURE,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .map_err(CorrectionError::RequestFailed)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CorrectionError::HttpStatus(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(CorrectionError::RequestFailed)?;
        extract_content(&body)
    }

    /// Validates the key against the models listing. Only 200 counts.
    pub async fn check_status(&self, api_key: &str) -> Result<(), CorrectionError> {
        if api_key.trim().is_empty() {
            return Err(CorrectionError::MissingCredential);
        }

        let resp = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(CorrectionError::RequestFailed)?;

        match resp.status().as_u16() {
            200 => Ok(()),
            code => Err(CorrectionError::HttpStatus(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Debug, Clone)]
    struct Seen {
        request_line: String,
        authorization: Option<String>,
        body: String,
    }

    /// Loopback HTTP stub answering every request with `status` and `body`.
    struct Stub {
        base_url: String,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl Stub {
        async fn start(status: u16, body: &'static str) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&seen);

            tokio::spawn(async move {
                loop {
                    let Ok((mut sock, _)) = listener.accept().await else { break };
                    let req = read_request(&mut sock).await;
                    log.lock().unwrap().push(req);
                    let resp = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                }
            });

            Self { base_url: format!("http://{}/v1", addr), seen }
        }

        fn client(&self) -> CorrectionClient {
            loopback_client(&self.base_url)
        }

        fn requests(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    /// Ignores any proxy configured in the environment.
    fn loopback_client(base_url: &str) -> CorrectionClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        CorrectionClient { http, base_url: base_url.to_string() }
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) -> Seen {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break buf.len();
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.lines();
        let request_line = lines.next().unwrap_or_default().to_string();
        let mut content_length = 0;
        let mut authorization = None;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                let value = value.trim().to_string();
                match name.to_ascii_lowercase().as_str() {
                    "content-length" => content_length = value.parse().unwrap_or(0),
                    "authorization" => authorization = Some(value),
                    _ => {}
                }
            }
        }

        while buf.len() < header_end + content_length {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[header_end..]).to_string();
        Seen { request_line, authorization, body }
    }

    const CORRECTED: &str =
        r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"He goes to school."}}]}"#;

    #[tokio::test]
    async fn fix_grammar_posts_chat_completion() {
        let stub = Stub::start(200, CORRECTED).await;

        let out = stub.client().fix_grammar("he go to school", "sk-test", "gpt-4o-mini").await.unwrap();
        assert_eq!(out, "He goes to school.");

        let reqs = stub.requests();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].request_line.starts_with("POST /v1/chat/completions "));
        assert_eq!(reqs[0].authorization.as_deref(), Some("Bearer sk-test"));

        let body: serde_json::Value = serde_json::from_str(&reqs[0].body).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.3);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "he go to school");
    }

    #[tokio::test]
    async fn empty_key_never_hits_the_network() {
        let stub = Stub::start(200, CORRECTED).await;

        let err = stub.client().fix_grammar("he go to school", "", "gpt-4o").await.unwrap_err();
        assert!(matches!(err, CorrectionError::MissingCredential));
        let err = stub.client().check_status("  ").await.unwrap_err();
        assert!(matches!(err, CorrectionError::MissingCredential));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_rejected_locally() {
        let stub = Stub::start(200, CORRECTED).await;
        let err = stub.client().fix_grammar("", "sk-test", "gpt-4o").await.unwrap_err();
        assert!(matches!(err, CorrectionError::EmptyInput));
        assert!(stub.requests().is_empty());
    }

    #[tokio::test]
    async fn non_2xx_is_http_status() {
        let stub = Stub::start(429, r#"{"error":{"message":"slow down"}}"#).await;
        let err = stub.client().fix_grammar("text", "sk-test", "gpt-4o").await.unwrap_err();
        assert!(matches!(err, CorrectionError::HttpStatus(429)));
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let stub = Stub::start(200, r#"{"choices":[]}"#).await;
        let err = stub.client().fix_grammar("text", "sk-test", "gpt-4o").await.unwrap_err();
        assert!(matches!(err, CorrectionError::MalformedResponse));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_request_failed() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let client = loopback_client(&format!("http://127.0.0.1:{}/v1", port));
        let err = client.fix_grammar("text", "sk-test", "gpt-4o").await.unwrap_err();
        assert!(matches!(err, CorrectionError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn check_status_gets_models() {
        let stub = Stub::start(200, r#"{"data":[]}"#).await;
        stub.client().check_status("sk-test").await.unwrap();

        let reqs = stub.requests();
        assert!(reqs[0].request_line.starts_with("GET /v1/models "));
        assert_eq!(reqs[0].authorization.as_deref(), Some("Bearer sk-test"));
    }

    #[tokio::test]
    async fn check_status_rejects_bad_key() {
        let stub = Stub::start(401, r#"{"error":{}}"#).await;
        let err = stub.client().check_status("sk-bad").await.unwrap_err();
        assert!(matches!(err, CorrectionError::HttpStatus(401)));
    }

    #[test]
    fn extract_content_reads_first_choice() {
        assert_eq!(extract_content(CORRECTED.as_bytes()).unwrap(), "He goes to school.");
        assert!(extract_content(b"{}").is_err());
        assert!(extract_content(br#"{"choices":[{"message":{"content":null}}]}"#).is_err());
        assert!(extract_content(b"<html>").is_err());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = CorrectionClient::new("https://api.openai.com/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
    }
}
