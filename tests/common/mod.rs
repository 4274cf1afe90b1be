//! In-process mock of the OnLibrary API, served over real HTTP on an
//! ephemeral port so the library is exercised through `reqwest`.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use actix_web::{rt, web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};

use onlibrary::storage::KeyValueStore;
use onlibrary::{AppState, Config};

pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "test-token";

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
pub struct MockState {
    pub requests: Mutex<Vec<Recorded>>,
    pub notifications: Mutex<BTreeMap<i64, Value>>,
    pub profile: Mutex<Value>,
}

impl MockState {
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications
            .lock()
            .unwrap()
            .values()
            .filter(|n| n["is_read"] == 0)
            .count()
    }

    fn record(&self, req: &HttpRequest, body: &[u8]) {
        let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
            .map(|q| q.into_inner())
            .unwrap_or_default();
        let authorization = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(Recorded {
            method: req.method().to_string(),
            path: req.path().to_string(),
            query,
            authorization,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    fn authorized(req: &HttpRequest) -> bool {
        req.headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false)
    }
}

pub struct MockApi {
    pub base_url: String,
    pub state: web::Data<MockState>,
}

impl MockApi {
    pub fn config(&self, data_dir: &std::path::Path) -> Config {
        Config::with_base_url(self.base_url.clone(), data_dir)
    }

    pub fn app(&self, storage: Arc<dyn KeyValueStore>) -> AppState {
        let config = Config::with_base_url(self.base_url.clone(), std::env::temp_dir());
        AppState::with_store(config, storage).unwrap()
    }
}

/// A URL nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

pub fn user_record(unread: usize) -> Value {
    json!({
        "id": 1,
        "name": "Test User",
        "username": "testuser",
        "email": "test@example.com",
        "unread_notifications_count": unread,
        "is_active": 1,
        "is_verified": 1,
        "role_id": 2,
        "role": { "id": 2, "name": "Reader", "mobile_actions": ["Books", "Notifications"] },
        "library_id": 3
    })
}

fn notification(id: i64, title: &str, is_read: u8) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": format!("{} description", title),
        "mobile_action": format!("Book:{{bookId:{}}}", id * 10),
        "user_id": 1,
        "is_read": is_read,
        "created_at": "2024-03-01T10:00:00.000Z"
    })
}

fn ok(data: Value) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "data": data, "meta": { "success": true } }))
}

fn ok_list(rows: Vec<Value>) -> HttpResponse {
    let count = rows.len();
    HttpResponse::Ok().json(json!({ "data": rows, "meta": { "success": true, "count": count } }))
}

fn rejected(errors: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "data": null, "meta": { "success": false, "errors": errors } }))
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "data": null,
        "meta": { "success": false, "errors": "Unauthorized" }
    }))
}

async fn login(req: HttpRequest, body: web::Bytes, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &body);
    let credentials: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if credentials["password"] != PASSWORD {
        return rejected("Invalid credentials");
    }
    let mut user = state.profile.lock().unwrap().clone();
    user["unread_notifications_count"] = json!(state.unread_count());
    user["token"] = json!(TOKEN);
    ok(user)
}

async fn push_token(req: HttpRequest, body: web::Bytes, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &body);
    if !MockState::authorized(&req) {
        return unauthorized();
    }
    ok(json!({}))
}

async fn get_profile(req: HttpRequest, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    if !MockState::authorized(&req) {
        return unauthorized();
    }
    let mut user = state.profile.lock().unwrap().clone();
    user["unread_notifications_count"] = json!(state.unread_count());
    ok(user)
}

async fn put_profile(req: HttpRequest, body: web::Bytes, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &body);
    if !MockState::authorized(&req) {
        return unauthorized();
    }
    let changes: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if let Some(current) = changes.get("current_password") {
        if *current != PASSWORD {
            return rejected("Current password is incorrect");
        }
        return ok(json!({}));
    }
    let mut profile = state.profile.lock().unwrap();
    for field in ["name", "username"] {
        if let Some(value) = changes.get(field) {
            profile[field] = value.clone();
        }
    }
    ok(profile.clone())
}

async fn upload(req: HttpRequest, body: web::Bytes, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &body);
    if !MockState::authorized(&req) {
        return unauthorized();
    }
    if req.path() == "/profile/avatar" {
        return ok(json!({
            "avatar_url": "https://files/avatar.jpg",
            "avatar_thumbnail_url": "https://files/avatar_thumb.jpg"
        }));
    }
    ok(json!({ "id": 99 }))
}

async fn list_notifications(req: HttpRequest, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    if !MockState::authorized(&req) {
        return unauthorized();
    }
    let rows = state.notifications.lock().unwrap().values().cloned().collect();
    ok_list(rows)
}

async fn get_notification(req: HttpRequest, path: web::Path<i64>, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    match state.notifications.lock().unwrap().get(&path.into_inner()) {
        Some(item) => ok(item.clone()),
        None => rejected("Notification not found"),
    }
}

async fn set_read(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Bytes,
    state: web::Data<MockState>,
) -> HttpResponse {
    state.record(&req, &body);
    let patch: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut notifications = state.notifications.lock().unwrap();
    match notifications.get_mut(&path.into_inner()) {
        Some(item) => {
            item["is_read"] = patch["is_read"].clone();
            ok(item.clone())
        }
        None => rejected("Notification not found"),
    }
}

async fn delete_notification(req: HttpRequest, path: web::Path<i64>, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    match state.notifications.lock().unwrap().remove(&path.into_inner()) {
        Some(_) => HttpResponse::NoContent().finish(),
        None => rejected("Notification not found"),
    }
}

async fn list_books(req: HttpRequest, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    ok_list(vec![
        json!({ "id": 1, "title": "Dune", "author": "Frank Herbert", "isbn": "9780441013593" }),
        json!({ "id": 2, "title": "Emma", "author": "Jane Austen" }),
    ])
}

async fn get_book(req: HttpRequest, path: web::Path<i64>, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    let id = path.into_inner();
    if id == 500 {
        return HttpResponse::InternalServerError().body("boom");
    }
    ok(json!({ "id": id, "title": "Dune", "author": "Frank Herbert", "pages": 412 }))
}

async fn list_documents(req: HttpRequest, path: web::Path<i64>, state: web::Data<MockState>) -> HttpResponse {
    state.record(&req, &[]);
    let book_id = path.into_inner();
    ok_list(vec![json!({
        "id": 5,
        "model_name": "Book",
        "model_id": book_id,
        "document_id": 77,
        "document": {
            "id": 77,
            "code": "DOC-77",
            "description": "Invoice",
            "file_url": "https://files/doc.pdf",
            "file_name": "doc.pdf",
            "file_content_type": "application/pdf"
        }
    })])
}

/// Starts the mock API with two notifications: #1 unread and #2 read.
pub async fn spawn_mock_api() -> MockApi {
    let state = web::Data::new(MockState::default());
    *state.profile.lock().unwrap() = user_record(0);
    {
        let mut notifications = state.notifications.lock().unwrap();
        notifications.insert(1, notification(1, "Reservation ready", 0));
        notifications.insert(2, notification(2, "Return reminder", 1));
    }

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let server_state = state.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .route("/auth/login", web::post().to(login))
            .route("/users/my/fcm-token", web::patch().to(push_token))
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::put().to(put_profile))
            .route("/profile/avatar", web::post().to(upload))
            .route("/notifications/my", web::get().to(list_notifications))
            .route("/notifications/{id}", web::get().to(get_notification))
            .route("/notifications/{id}/read", web::patch().to(set_read))
            .route("/notifications/{id}/my", web::delete().to(delete_notification))
            .route("/books", web::get().to(list_books))
            .route("/books/{id}", web::get().to(get_book))
            .route("/books/{id}/documents", web::get().to(list_documents))
            .route("/books/{id}/documents", web::post().to(upload))
            .route("/books/{id}/photo", web::post().to(upload))
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen on mock port")
    .run();
    rt::spawn(server);

    MockApi {
        base_url: format!("http://127.0.0.1:{}", port),
        state,
    }
}
