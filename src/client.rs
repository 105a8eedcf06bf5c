use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUESTS, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS};
use crate::sse::process_frames;
use crate::types::{
    ApiChatSession, ChatRequest, CreateSessionRequest, CreateSessionResponse, Credential,
    DocumentListResponse, EmbeddedDocument, ProtocolFrame, Session, sessions_from_history,
};

/// Where the backend listens when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A lazy, finite, non-restartable sequence of frames from one chat request.
///
/// See [`process_frames`] for the ordering guarantees. Dropping the stream
/// abandons the request.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<ProtocolFrame>> + Send>>;

/// Opens streaming chat requests.
///
/// [`ChatClient`] is the production implementation; the conversation
/// controller only depends on this trait.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Start a chat request and return its frames.
    ///
    /// Errors returned here happened before any byte of the answer arrived.
    async fn open(
        &self,
        request: &ChatRequest,
        credential: Option<&Credential>,
    ) -> Result<FrameStream>;
}

/// Client for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client for the backend at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds non-streaming calls. Streaming calls are only bounded
    /// while connecting so long answers are not cut off.
    pub fn with_options(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::url(
                format!("{base_url} cannot be used as a base URL"),
                None,
            ));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = ReqwestClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// The backend's base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        credential: Option<&Credential>,
    ) -> Result<RequestBuilder> {
        let mut builder = self
            .client
            .request(method, self.endpoint(segments))
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(credential) = credential {
            let value = HeaderValue::from_str(&credential.header_value()).map_err(|e| {
                Error::validation(
                    format!("credential is not a valid header value: {e}"),
                    Some("credential".to_string()),
                )
            })?;
            builder = builder.header(header::AUTHORIZATION, value);
        }
        Ok(builder)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = builder.send().await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {e}"),
                    Some(self.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
            }
        })?;

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.execute(builder.timeout(self.timeout)).await?;
        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        let error_message = error_message(&error_body)
            .unwrap_or_else(|| format!("HTTP error! status: {status_code} {error_body}"));

        match status_code {
            400 => Error::bad_request(error_message),
            401 => Error::authentication(error_message),
            403 => Error::permission(error_message),
            404 => Error::not_found(error_message, None, None),
            408 => Error::timeout(error_message, None),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after),
            _ => Error::api(status_code, error_message),
        }
    }

    /// Send a chat query and stream the answer.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        credential: Option<&Credential>,
    ) -> Result<FrameStream> {
        let builder = self
            .request(Method::POST, &["api", "chat", ""], credential)?
            .header(header::ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(request);
        tracing::debug!(
            session_id = request.session_id.as_deref(),
            document_filter = request.document_filter.as_deref(),
            "opening chat stream"
        );
        let response = self.execute(builder).await?;
        Ok(Box::pin(process_frames(response.bytes_stream())))
    }

    /// Create a session on the backend.
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
        credential: Option<&Credential>,
    ) -> Result<CreateSessionResponse> {
        let builder = self
            .request(Method::POST, &["api", "chat", "session"], credential)?
            .json(request);
        self.fetch_json(builder).await
    }

    /// List the sessions the backend holds, in the backend's order.
    ///
    /// Records that cannot be converted are logged and skipped.
    pub async fn list_sessions(&self, credential: Option<&Credential>) -> Result<Vec<Session>> {
        let builder = self.request(Method::GET, &["api", "chat", "history"], credential)?;
        let sessions: Vec<ApiChatSession> = self.fetch_json(builder).await?;
        Ok(sessions_from_history(sessions))
    }

    /// Fetch one session with its turns.
    pub async fn get_session(
        &self,
        session_id: &str,
        credential: Option<&Credential>,
    ) -> Result<Session> {
        let builder = self.request(
            Method::GET,
            &["api", "chat", "history", session_id],
            credential,
        )?;
        let session: ApiChatSession = self.fetch_json(builder).await.map_err(|e| {
            if e.is_not_found() {
                Error::session_not_found(session_id)
            } else {
                e
            }
        })?;
        session.into_session()
    }

    /// Delete one session.
    pub async fn delete_session(
        &self,
        session_id: &str,
        credential: Option<&Credential>,
    ) -> Result<()> {
        let builder = self.request(
            Method::DELETE,
            &["api", "chat", "history", session_id],
            credential,
        )?;
        self.execute(builder.timeout(self.timeout)).await?;
        Ok(())
    }

    /// Delete every session of the current user.
    pub async fn delete_all_sessions(&self, credential: Option<&Credential>) -> Result<()> {
        let builder = self.request(Method::DELETE, &["api", "chat", "history"], credential)?;
        self.execute(builder.timeout(self.timeout)).await?;
        Ok(())
    }

    /// List the embedded documents available as chat context.
    pub async fn documents(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Vec<EmbeddedDocument>> {
        let builder = self.request(Method::GET, &["api", "upload", "documents"], credential)?;
        let list: DocumentListResponse = self.fetch_json(builder).await?;
        Ok(list.documents)
    }

    /// Look up one embedded document by name.
    pub async fn document(
        &self,
        document_name: &str,
        credential: Option<&Credential>,
    ) -> Result<EmbeddedDocument> {
        let builder = self.request(
            Method::GET,
            &["api", "upload", "documents", document_name],
            credential,
        )?;
        self.fetch_json(builder).await
    }

    /// Query the backend's health endpoint.
    pub async fn health(&self) -> Result<Value> {
        let builder = self.request(Method::GET, &["health"], None)?;
        self.fetch_json(builder).await
    }
}

#[async_trait::async_trait]
impl ChatTransport for ChatClient {
    async fn open(
        &self,
        request: &ChatRequest,
        credential: Option<&Credential>,
    ) -> Result<FrameStream> {
        self.stream_chat(request, credential).await
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}` and
/// `{"error": {"message": "..."}}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail") {
        Some(Value::String(detail)) => return Some(detail.clone()),
        Some(Value::Array(items)) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }
    match value.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new(DEFAULT_API_URL).unwrap();
        assert_eq!(client.base_url().as_str(), DEFAULT_API_URL);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client =
            ChatClient::with_options("https://chat.example.com/backend", Some(Duration::from_secs(5)))
                .unwrap();
        assert_eq!(client.base_url().as_str(), "https://chat.example.com/backend/");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(ChatClient::new("not a url").is_err());
        assert!(ChatClient::new("mailto:someone@example.com").is_err());
    }

    #[test]
    fn endpoints() {
        let client = ChatClient::new("http://localhost:8000").unwrap();
        assert_eq!(
            client.endpoint(&["api", "chat", ""]).as_str(),
            "http://localhost:8000/api/chat/"
        );
        assert_eq!(
            client.endpoint(&["api", "chat", "history", "abc"]).as_str(),
            "http://localhost:8000/api/chat/history/abc"
        );
        assert_eq!(
            client
                .endpoint(&["api", "upload", "documents", "my report.pdf"])
                .as_str(),
            "http://localhost:8000/api/upload/documents/my%20report.pdf"
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            error_message(r#"{"detail": "Session not found"}"#).as_deref(),
            Some("Session not found")
        );
        assert_eq!(
            error_message(r#"{"detail": [{"msg": "field required"}, {"msg": "too long"}]}"#)
                .as_deref(),
            Some("field required; too long")
        );
        assert_eq!(
            error_message(r#"{"error": {"message": "overloaded"}}"#).as_deref(),
            Some("overloaded")
        );
        assert_eq!(error_message("<html>oops</html>"), None);
    }
}
