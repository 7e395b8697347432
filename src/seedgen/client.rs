use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SeedGenError;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// 根据系统提示词和用户提示词生成一段回复
pub trait LanguageModel: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> impl Future<Output = Result<String, SeedGenError>> + Send;
}

/// OpenAI 兼容的 chat completions 客户端
pub struct ChatClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SeedGenError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, endpoint, model, api_key))
    }

    pub fn with_client(
        http: Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self { http, endpoint: endpoint.into(), model: model.into(), api_key: api_key.into() }
    }
}

impl LanguageModel for ChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, SeedGenError> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "developer", content: system },
                ChatMessage { role: "user", content: user },
            ],
        };

        let response = self.http.post(&self.endpoint).bearer_auth(&self.api_key).json(&req).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(SeedGenError::Server { status: status.as_u16(), body });
        }

        let res: ChatResponse = response.json().await?;
        res.into_content().ok_or(SeedGenError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|choice| choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::*;

    /// 读取一个完整的 HTTP 请求（请求头和 Content-Length 指定的请求体）
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = vec![];
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let len = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// 在本地端口上应答一次请求，返回接口地址和收到的原始请求
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
            request
        });
        (endpoint, handle)
    }

    fn local_client(endpoint: String) -> ChatClient {
        let http = Client::builder().no_proxy().timeout(Duration::from_secs(10)).build().unwrap();
        ChatClient::with_client(http, endpoint, DEFAULT_MODEL, "test-key")
    }

    #[tokio::test]
    async fn test_complete_returns_content() {
        let (endpoint, server) =
            serve_once("200 OK", r#"{"choices":[{"message":{"role":"assistant","content":"```\nA\n```"}}]}"#).await;
        let reply = local_client(endpoint).complete("sys", "hello").await.unwrap();
        assert_eq!(reply, "```\nA\n```");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer test-key"));
        assert!(request.contains(r#""model":"gpt-4o""#));
        assert!(request.contains(r#""role":"developer""#));
    }

    #[tokio::test]
    async fn test_complete_server_error() {
        let (endpoint, server) = serve_once("500 Internal Server Error", "boom").await;
        let err = local_client(endpoint).complete("sys", "hello").await.unwrap_err();
        assert!(matches!(err, SeedGenError::Server { status: 500, ref body } if body == "boom"), "{err:?}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_without_choices() {
        let (endpoint, server) = serve_once("200 OK", r#"{"choices":[]}"#).await;
        let err = local_client(endpoint).complete("sys", "hello").await.unwrap_err();
        assert!(matches!(err, SeedGenError::EmptyResponse), "{err:?}");
        server.await.unwrap();
    }

    #[test]
    fn test_request_body() {
        let req = ChatRequest {
            model: DEFAULT_MODEL,
            messages: vec![ChatMessage { role: "developer", content: "sys" }, ChatMessage { role: "user", content: "hi" }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    { "role": "developer", "content": "sys" },
                    { "role": "user", "content": "hi" },
                ]
            })
        );
    }

    #[test]
    fn test_response_content() {
        let res: ChatResponse =
            serde_json::from_str(r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"```\nA\n```"}}]}"#)
                .unwrap();
        assert_eq!(res.into_content().as_deref(), Some("```\nA\n```"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(empty.into_content(), None);

        let missing: ChatResponse = serde_json::from_str(r#"{"error":"x"}"#).unwrap();
        assert_eq!(missing.into_content(), None);
    }
}
