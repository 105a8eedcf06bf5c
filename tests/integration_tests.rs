//! Integration tests for the ragchat library.
//!
//! Each test starts a throwaway HTTP responder on localhost that answers a
//! single request with a canned response and hands back the raw request.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use ragchat::{
        ChatClient, ChatRequest, Conversation, ConversationOptions, Credential, Error,
        MemorySessionStore, RemoteSessionStore, SendOutcome, SessionReconciler, SessionStore,
        StreamHandler, StreamOutcome, dispatch,
    };

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_delta(&mut self, text: &str) {
            self.calls.push(format!("delta:{text}"));
        }

        fn on_complete(&mut self) {
            self.calls.push("complete".to_string());
        }

        fn on_error(&mut self, error: &Error) {
            self.calls.push(format!("error:{error}"));
        }
    }

    /// Serve one connection with `response` and return the request as text.
    async fn serve_once(response: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(&response).await.unwrap();
            socket.flush().await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (base_url, handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = find(&buf, b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    fn respond(status: &str, content_type: &str, body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    const ANSWER: &str = concat!(
        "data: {\"chunk\": \"A\"}\n\n",
        "data: {\"chunk\": \"B\"}\n\n",
        "data: {\"done\": true}\n\n",
    );

    #[tokio::test]
    async fn streams_an_answer_with_credentials() {
        let (base_url, server) =
            serve_once(respond("200 OK", "text/event-stream", ANSWER)).await;
        let client = ChatClient::new(&base_url).unwrap();
        let request = ChatRequest::new("hi")
            .with_session_id("s1")
            .with_document_filter(Some("report.pdf".to_string()))
            .with_max_tokens(500)
            .with_use_context(true);
        let credential = Credential::bearer("secret");

        let frames = client.stream_chat(&request, Some(&credential)).await.unwrap();
        let mut recorder = Recorder::default();
        let outcome = dispatch(frames, &mut recorder, &AtomicBool::new(false)).await;

        assert!(outcome.is_completed());
        assert_eq!(recorder.calls, vec!["delta:A", "delta:B", "complete"]);

        let raw = server.await.unwrap();
        let lowered = raw.to_lowercase();
        assert!(raw.starts_with("POST /api/chat/ HTTP/1.1"));
        assert!(lowered.contains("authorization: bearer secret"));
        assert!(raw.contains("\"query\":\"hi\""));
        assert!(raw.contains("\"session_id\":\"s1\""));
        assert!(raw.contains("\"document_filter\":\"report.pdf\""));
        assert!(raw.contains("\"max_tokens\":500"));
    }

    #[tokio::test]
    async fn open_mode_sends_no_authorization() {
        let (base_url, server) =
            serve_once(respond("200 OK", "text/event-stream", ANSWER)).await;
        let client = ChatClient::new(&base_url).unwrap();
        let frames = client
            .stream_chat(&ChatRequest::new("hi"), None)
            .await
            .unwrap();
        let outcome = dispatch(frames, &mut Recorder::default(), &AtomicBool::new(false)).await;
        assert!(outcome.is_completed());
        let raw = server.await.unwrap().to_lowercase();
        assert!(!raw.contains("authorization:"));
    }

    #[tokio::test]
    async fn rejected_request_is_an_error() {
        let (base_url, _server) = serve_once(respond(
            "401 Unauthorized",
            "application/json",
            r#"{"detail": "Not authenticated"}"#,
        ))
        .await;
        let client = ChatClient::new(&base_url).unwrap();
        let err = match client.stream_chat(&ChatRequest::new("hi"), None).await {
            Ok(_) => panic!("expected the request to be rejected"),
            Err(err) => err,
        };
        assert!(err.is_authentication());
        assert!(err.to_string().contains("Not authenticated"));
    }

    #[tokio::test]
    async fn server_error_frame_fails_the_stream() {
        let body = "data: {\"chunk\": \"A\"}\n\ndata: {\"error\": \"index unavailable\"}\n\n";
        let (base_url, _server) = serve_once(respond("200 OK", "text/event-stream", body)).await;
        let client = ChatClient::new(&base_url).unwrap();
        let frames = client
            .stream_chat(&ChatRequest::new("hi"), None)
            .await
            .unwrap();
        let mut recorder = Recorder::default();
        let outcome = dispatch(frames, &mut recorder, &AtomicBool::new(false)).await;
        assert!(matches!(outcome, StreamOutcome::Failed(ref err) if err.is_stream()));
        assert_eq!(recorder.calls, vec!["delta:A", "error:index unavailable"]);
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let chunk = "data: {\"chunk\": \"A\"}\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{chunk}\r\n",
            chunk.len()
        );
        let (base_url, _server) = serve_once(response.into_bytes()).await;
        let client = ChatClient::new(&base_url).unwrap();
        let frames = client
            .stream_chat(&ChatRequest::new("hi"), None)
            .await
            .unwrap();
        let mut recorder = Recorder::default();
        let outcome = dispatch(frames, &mut recorder, &AtomicBool::new(false)).await;
        assert!(matches!(outcome, StreamOutcome::Failed(ref err) if err.is_streaming()));
        assert_eq!(recorder.calls.first().map(String::as_str), Some("delta:A"));
        assert_eq!(recorder.calls.len(), 2);
    }

    #[tokio::test]
    async fn remote_store_lists_only_readable_durable_sessions() {
        let body = r#"[
            {"session_id": "empty", "user_id": "u1", "title": "New Chat", "messages": [],
             "created_at": "2024-05-01T10:00:00", "updated_at": "2024-05-01T10:00:00"},
            {"session_id": "full", "user_id": "u1", "title": "What is RAG?",
             "messages": [
                {"role": "user", "content": "What is RAG?", "timestamp": "2024-05-01T10:01:00.250"},
                {"role": "assistant", "content": "Retrieval...", "timestamp": "2024-05-01T10:01:05"}
             ],
             "document_id": "rag.pdf", "document_name": "rag.pdf",
             "created_at": "2024-05-01T10:01:00", "updated_at": "2024-05-01T10:01:05.5+00:00"},
            {"session_id": "garbled", "user_id": "u1", "title": "Broken",
             "messages": [{"role": "user", "content": "lost", "timestamp": ""}],
             "created_at": "", "updated_at": ""}
        ]"#;
        let (base_url, server) = serve_once(respond("200 OK", "application/json", body)).await;
        let store = RemoteSessionStore::new(
            ChatClient::new(&base_url).unwrap(),
            Some(Credential::bearer("tok")),
        );

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "full");
        assert_eq!(sessions[0].turns.len(), 2);
        assert_eq!(sessions[0].document.as_ref().unwrap().name, "rag.pdf");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /api/chat/history HTTP/1.1"));
        assert!(raw.to_lowercase().contains("authorization: bearer tok"));
    }

    #[tokio::test]
    async fn remote_store_missing_session_is_not_found() {
        let (base_url, server) = serve_once(respond(
            "404 Not Found",
            "application/json",
            r#"{"detail": "Session not found"}"#,
        ))
        .await;
        let store = RemoteSessionStore::new(ChatClient::new(&base_url).unwrap(), None);
        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(server.await.unwrap().starts_with("GET /api/chat/history/nope HTTP/1.1"));
    }

    #[tokio::test]
    async fn conversation_over_http_commits_the_answer() {
        let (base_url, _server) =
            serve_once(respond("200 OK", "text/event-stream", ANSWER)).await;
        let store = Arc::new(MemorySessionStore::new());
        let reconciler = Arc::new(SessionReconciler::new(store.clone()));
        let mut conversation = Conversation::open(
            Arc::new(ChatClient::new(&base_url).unwrap()),
            reconciler,
            None,
            ConversationOptions::default(),
        )
        .await;

        let outcome = conversation
            .send(
                "Explain the architecture",
                None,
                &mut Recorder::default(),
                &AtomicBool::new(false),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, SendOutcome::Answered(ref turn) if turn.content == "AB"));

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Explain the architecture");
        assert_eq!(listed[0].turns.len(), 2);
    }
}
