use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use zeroize::Zeroizing;

use gemini_chat::{
    app::build_router,
    config::Config,
    crypto::jwt::TokenService,
    error::AppError,
    models::chat::{ChatSession, Message, Role, SessionWithCount},
    repositories::{chat::ChatStore, memory::MemoryStore},
    services::{
        gemini::{GatewayError, HistoryTurn, LanguageModel},
        identity::{FederatedIdentity, IdentityError, IdentityVerifier},
    },
    state::AppState,
};

const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";

/// Replies with the number of history turns it was given, or fails on demand.
#[derive(Default)]
struct StubModel {
    fail_with: Mutex<Option<GatewayError>>,
    seen_history: Mutex<Vec<usize>>,
}

#[async_trait]
impl LanguageModel for StubModel {
    async fn send_message(
        &self,
        message: &str,
        history: &[HistoryTurn],
    ) -> Result<String, GatewayError> {
        self.seen_history.lock().unwrap().push(history.len());
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(format!("echo: {message}"))
    }
}

/// Accepts tokens of the form `google:<subject>:<email>`.
struct StubIdentity;

#[async_trait]
impl IdentityVerifier for StubIdentity {
    async fn verify(&self, id_token: &str) -> Result<FederatedIdentity, IdentityError> {
        let mut parts = id_token.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("google"), Some(subject), Some(email)) => Ok(FederatedIdentity {
                subject: subject.to_string(),
                email: email.to_string(),
                name: None,
                picture: Some("https://example.com/p.png".to_string()),
            }),
            _ => Err(IdentityError::InvalidToken("bad token".to_string())),
        }
    }

    fn client_id(&self) -> Option<&str> {
        Some("client-123.apps.googleusercontent.com")
    }
}

/// Delegates to a [`MemoryStore`] but fails message writes while `broken`.
struct FlakyChatStore {
    inner: MemoryStore,
    broken: AtomicBool,
}

#[async_trait]
impl ChatStore for FlakyChatStore {
    async fn create_session(&self, user_id: Uuid, title: &str) -> Result<ChatSession, AppError> {
        self.inner.create_session(user_id, title).await
    }

    async fn find_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ChatSession>, AppError> {
        self.inner.find_session(session_id, user_id).await
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<SessionWithCount>, AppError> {
        self.inner.list_sessions(user_id).await
    }

    async fn list_messages(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Vec<Message>>, AppError> {
        self.inner.list_messages(session_id, user_id).await
    }

    async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Message>, AppError> {
        self.inner.recent_messages(session_id, limit).await
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: &str,
    ) -> Result<Message, AppError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(AppError::Internal("connection reset".to_string()));
        }
        self.inner.append_message(session_id, role, content).await
    }

    async fn touch_session(&self, session_id: Uuid, title: Option<&str>) -> Result<(), AppError> {
        self.inner.touch_session(session_id, title).await
    }

    async fn rename_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        title: &str,
    ) -> Result<bool, AppError> {
        self.inner.rename_session(session_id, user_id, title).await
    }

    async fn delete_session(&self, session_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        self.inner.delete_session(session_id, user_id).await
    }
}

fn test_config() -> Config {
    Config {
        database_url: None,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        cors_origins: vec!["http://localhost:3000".to_string()],
        static_dir: None,
        jwt_secret: Zeroizing::new(SECRET.to_string()),
        jwt_issuer: "gemini-chat".to_string(),
        jwt_audience: "gemini-chat-users".to_string(),
        jwt_expiration_days: 7,
        gemini_api_key: None,
        gemini_model: "test-model".to_string(),
        gemini_api_url: "http://127.0.0.1:9".to_string(),
        gemini_timeout_secs: 5,
        google_client_id: Some("client-123.apps.googleusercontent.com".to_string()),
        google_certs_url: "http://127.0.0.1:9/certs".to_string(),
        allowed_email_domain: "amzur.com".to_string(),
        organization_name: "Amzur".to_string(),
    }
}

struct TestApp {
    router: Router,
    store: MemoryStore,
    model: Arc<StubModel>,
}

impl TestApp {
    fn new() -> Self {
        let store = MemoryStore::new();
        Self::with_chat_store(store.clone(), Arc::new(store))
    }

    fn with_chat_store(store: MemoryStore, chats: Arc<dyn ChatStore>) -> Self {
        let model = Arc::new(StubModel::default());
        let state = AppState::from_parts(
            test_config(),
            Arc::new(store.clone()),
            chats,
            model.clone(),
            Arc::new(StubIdentity),
        );
        Self {
            router: build_router(state),
            store,
            model,
        }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        match body {
            Some(body) => {
                self.call_raw(method, uri, token, Some("application/json"), &body.to_string())
                    .await
            }
            None => self.call_raw(method, uri, token, None, "").await,
        }
    }

    /// Sends `body` verbatim, so malformed payloads can be exercised.
    async fn call_raw(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(&self, email: &str) -> (String, Uuid) {
        let (status, body) = self
            .call(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({"name": "Jane Doe", "email": email, "password": "secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let token = body["token"].as_str().unwrap().to_string();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (token, id)
    }

    async fn chat(&self, token: &str, message: &str, session: Option<&str>) -> (StatusCode, Value) {
        let mut body = json!({ "message": message });
        if let Some(session) = session {
            body["sessionId"] = json!(session);
        }
        self.call("POST", "/api/chat", Some(token), Some(body)).await
    }
}

#[tokio::test]
async fn test_register_login_and_validate() {
    let app = TestApp::new();
    let (token, user_id) = app.register("Jane.Doe@Amzur.com").await;

    let (status, body) = app.call("GET", "/api/auth/validate", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"], user_id.to_string());
    assert_eq!(body["user"]["email"], "jane.doe@amzur.com");

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "JANE.DOE@amzur.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "jane.doe@amzur.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@amzur.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_registration_rules() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "Eve", "email": "eve@gmail.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Only Amzur employees (@amzur.com) can register");

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "Eve", "email": "eve@amzur.com", "password": "123"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Password must be at least 6 characters");

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "", "email": "eve@amzur.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Name, email, and password are required");

    app.register("dup@amzur.com").await;
    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"name": "Dup", "email": "DUP@AMZUR.COM", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User with this email already exists");
}

#[tokio::test]
async fn test_deactivated_account_is_rejected() {
    let app = TestApp::new();
    let (token, user_id) = app.register("gone@amzur.com").await;
    app.store.set_active(user_id, false).await.unwrap();

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "gone@amzur.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Account is deactivated");

    let (status, _) = app.call("GET", "/api/auth/validate", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_required() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/api/chat/sessions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No valid token provided");

    let (status, body) = app
        .call("GET", "/api/chat/sessions", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_never_validate() {
    let app = TestApp::new();
    let (_, user_id) = app.register("clock@amzur.com").await;

    let expired = TokenService::new(
        SECRET.as_bytes(),
        "gemini-chat",
        "gemini-chat-users",
        chrono::Duration::seconds(-60),
    )
    .issue(user_id, "clock@amzur.com", "Jane Doe")
    .unwrap();
    let (status, _) = app.call("GET", "/api/auth/validate", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenService::new(
        b"another-secret-that-is-also-32-bytes-long!",
        "gemini-chat",
        "gemini-chat-users",
        chrono::Duration::days(1),
    )
    .issue(user_id, "clock@amzur.com", "Jane Doe")
    .unwrap();
    let (status, _) = app.call("GET", "/api/auth/validate", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_google_login_creates_then_reuses_account() {
    let app = TestApp::new();

    let (status, body) = app.call("GET", "/api/auth/google/client-id", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clientId"], "client-123.apps.googleusercontent.com");

    let (status, first) = app
        .call(
            "POST",
            "/api/auth/google",
            None,
            Some(json!({"idToken": "google:sub-1:Sam.Smith@amzur.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["user"]["name"], "sam.smith");
    assert_eq!(first["user"]["email"], "sam.smith@amzur.com");
    assert_eq!(first["user"]["profilePicture"], "https://example.com/p.png");

    let (status, second) = app
        .call(
            "POST",
            "/api/auth/google",
            None,
            Some(json!({"idToken": "google:sub-1:sam.smith@amzur.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["user"]["id"], first["user"]["id"]);

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/google",
            None,
            Some(json!({"idToken": "google:sub-2:outsider@gmail.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"],
        "Only Amzur employees (@amzur.com) can access this application"
    );

    let (status, body) = app
        .call("POST", "/api/auth/google", None, Some(json!({"idToken": "garbage"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid Google token");

    let (status, body) = app
        .call("POST", "/api/auth/google", None, Some(json!({"idToken": "  "})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Google ID token is required");
}

#[tokio::test]
async fn test_google_login_links_password_account() {
    let app = TestApp::new();
    let (_, user_id) = app.register("linked@amzur.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/google",
            None,
            Some(json!({"idToken": "google:sub-9:linked@amzur.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id.to_string());
    assert_eq!(body["user"]["name"], "Jane Doe");

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "linked@amzur.com", "password": "secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_conversation_flow() {
    let app = TestApp::new();
    let (token, _) = app.register("talker@amzur.com").await;

    let (status, first) = app.chat(&token, "hello", None).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["success"], true);
    assert_eq!(first["response"], "echo: hello");
    let session_id = first["sessionId"].as_str().unwrap().to_string();

    let (status, second) = app.chat(&token, "and again", Some(&session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["sessionId"], session_id.as_str());

    // Context grows by one exchange per turn.
    assert_eq!(*app.model.seen_history.lock().unwrap(), vec![0, 2]);

    let (status, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], session_id.as_str());
    assert_eq!(sessions[0]["title"], "hello");
    assert_eq!(sessions[0]["messageCount"], 4);

    let (status, messages) = app
        .call(
            "GET",
            &format!("/api/chat/sessions/{session_id}/messages"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<_> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| (m["role"].as_str().unwrap(), m["content"].as_str().unwrap()))
        .collect();
    assert_eq!(
        contents,
        vec![
            ("user", "hello"),
            ("assistant", "echo: hello"),
            ("user", "and again"),
            ("assistant", "echo: and again"),
        ]
    );
}

#[tokio::test]
async fn test_context_window_is_capped() {
    let app = TestApp::new();
    let (token, _) = app.register("chatty@amzur.com").await;

    let (_, first) = app.chat(&token, "message 0", None).await;
    let session_id = first["sessionId"].as_str().unwrap().to_string();
    for i in 1..8 {
        let (status, _) = app.chat(&token, &format!("message {i}"), Some(&session_id)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let seen = app.model.seen_history.lock().unwrap().clone();
    assert_eq!(seen, vec![0, 2, 4, 6, 8, 10, 10, 10]);
}

#[tokio::test]
async fn test_long_first_message_gets_truncated_title() {
    let app = TestApp::new();
    let (token, _) = app.register("titles@amzur.com").await;

    let message = format!("{} {}", "a".repeat(25), "b".repeat(34));
    app.chat(&token, &message, None).await;

    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(sessions[0]["title"], format!("{}...", "a".repeat(25)));
}

#[tokio::test]
async fn test_gateway_failure_keeps_session() {
    let app = TestApp::new();
    let (token, _) = app.register("unlucky@amzur.com").await;
    *app.model.fail_with.lock().unwrap() = Some(GatewayError::RateLimited);

    let (status, body) = app.chat(&token, "are you there?", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(
        body["error"],
        "Rate limit exceeded. Please wait a moment and try again."
    );
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    // The user message is kept, no assistant message is stored.
    assert_eq!(app.store.message_count().await, 1);

    *app.model.fail_with.lock().unwrap() = None;
    let (status, body) = app.chat(&token, "retry", Some(&session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], session_id.as_str());

    // The failed first message already counts as the opening message.
    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(sessions[0]["title"], "New Chat");
}

#[tokio::test]
async fn test_store_failure_still_returns_session() {
    let store = MemoryStore::new();
    let chats = Arc::new(FlakyChatStore {
        inner: store.clone(),
        broken: AtomicBool::new(true),
    });
    let app = TestApp::with_chat_store(store, chats.clone());
    let (token, _) = app.register("fragile@amzur.com").await;

    let (status, body) = app.chat(&token, "hello?", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "An error occurred while processing your message");
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["id"], session_id.as_str());

    chats.broken.store(false, Ordering::SeqCst);
    let (status, body) = app.chat(&token, "hello again", Some(&session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], session_id.as_str());
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let app = TestApp::new();
    let (token, _) = app.register("sloppy@amzur.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/chat",
            Some(&token),
            Some(json!({"message": "hi", "sessionId": "not-a-uuid"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some());
    assert_eq!(app.store.message_count().await, 0);

    let (status, body) = app
        .call_raw(
            "POST",
            "/api/auth/login",
            None,
            Some("application/json"),
            r#"{"email": "sloppy@amzur.com", "pass"#,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .call_raw(
            "POST",
            "/api/auth/register",
            None,
            Some("text/plain"),
            "name=Jane",
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .call(
            "GET",
            "/api/chat/sessions/not-a-uuid/messages",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_chat_validation() {
    let app = TestApp::new();
    let (token, _) = app.register("strict@amzur.com").await;

    let (status, body) = app.chat(&token, "   ", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message cannot be empty");

    let missing = Uuid::new_v4().to_string();
    let (status, body) = app.chat(&token, "hi", Some(&missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Chat session not found");
    assert_eq!(app.store.message_count().await, 0);
}

#[tokio::test]
async fn test_session_management() {
    let app = TestApp::new();
    let (token, _) = app.register("organizer@amzur.com").await;

    let (status, created) = app
        .call("POST", "/api/chat/sessions", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "New Chat");
    assert_eq!(created["messageCount"], 0);
    let session_id = created["id"].as_str().unwrap().to_string();

    let (status, named) = app
        .call(
            "POST",
            "/api/chat/sessions",
            Some(&token),
            Some(json!({"title": "Planning"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(named["title"], "Planning");

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/chat/sessions/{session_id}"),
            Some(&token),
            Some(json!({"title": "Renamed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/chat/sessions/{session_id}"),
            Some(&token),
            Some(json!({"title": "  "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title cannot be empty");

    // A first message does not overwrite a title the user chose.
    app.chat(&token, "first words", Some(&session_id)).await;
    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    let renamed = sessions
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == session_id.as_str())
        .unwrap();
    assert_eq!(renamed["title"], "Renamed");
    assert_eq!(renamed["messageCount"], 2);
}

#[tokio::test]
async fn test_sessions_ordered_by_latest_activity() {
    let app = TestApp::new();
    let (token, _) = app.register("busy@amzur.com").await;

    let (_, older) = app
        .call("POST", "/api/chat/sessions", Some(&token), Some(json!({"title": "Older"})))
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (_, newer) = app
        .call("POST", "/api/chat/sessions", Some(&token), Some(json!({"title": "Newer"})))
        .await;
    let older_id = older["id"].as_str().unwrap().to_string();
    let newer_id = newer["id"].as_str().unwrap().to_string();

    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(sessions[0]["id"], newer_id.as_str());
    assert_eq!(sessions[1]["id"], older_id.as_str());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, _) = app.chat(&token, "bump", Some(&older_id)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, sessions) = app.call("GET", "/api/chat/sessions", Some(&token), None).await;
    assert_eq!(sessions[0]["id"], older_id.as_str());
    assert_eq!(sessions[0]["messageCount"], 2);
    assert_eq!(sessions[1]["id"], newer_id.as_str());
}

#[tokio::test]
async fn test_delete_cascades_messages() {
    let app = TestApp::new();
    let (token, _) = app.register("cleaner@amzur.com").await;

    let (_, body) = app.chat(&token, "temporary", None).await;
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    assert_eq!(app.store.message_count().await, 2);

    let (status, body) = app
        .call(
            "DELETE",
            &format!("/api/chat/sessions/{session_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(app.store.message_count().await, 0);

    let (status, _) = app
        .call(
            "GET",
            &format!("/api/chat/sessions/{session_id}/messages"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            "DELETE",
            &format!("/api/chat/sessions/{session_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sessions_are_private() {
    let app = TestApp::new();
    let (alice, _) = app.register("alice@amzur.com").await;
    let (bob, _) = app.register("bob@amzur.com").await;

    let (_, body) = app.chat(&alice, "secret plans", None).await;
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (status, sessions) = app.call("GET", "/api/chat/sessions", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sessions, json!([]));

    let path = format!("/api/chat/sessions/{session_id}");
    let messages = format!("{path}/messages");

    let (status, _) = app.call("GET", &messages, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.chat(&bob, "let me in", Some(&session_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call("PUT", &path, Some(&bob), Some(json!({"title": "mine now"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call("DELETE", &path, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, messages) = app.call("GET", &messages, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/api/chat/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().is_some());
}
