//! End-to-end behaviour against an in-process mock of the CRUD backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::fetcher::error::{MSG_ALREADY_REGISTERED, MSG_SERVER_ERROR};
use crate::fetcher::{ClientOptions, CrudClient, CrudError, CsrfSource};
use crate::pagination::{FileStore, MemoryStore, PageSizeStore};
use crate::render::DateStyle;
use crate::schema::default_registry;
use crate::view::{NoticeKind, TableView};

const TOKEN: &str = "tok123";

#[derive(Clone, Debug)]
struct Recorded {
    method: &'static str,
    table: String,
    csrf: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Backend {
    tables: HashMap<String, Vec<Value>>,
    next_id: i64,
    requests: Vec<Recorded>,
    /// Answer every list with a plain-text 500.
    fail_lists: bool,
}

type Shared = Arc<Mutex<Backend>>;

fn csrf_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-csrftoken")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::CONTENT_TYPE, "text/html")],
        "<!DOCTYPE html><html><body><h1>Forbidden (403)</h1>CSRF verification failed.</body></html>",
    )
        .into_response()
}

/// Mutating requests need the token; returns the rejection otherwise.
fn record(st: &Shared, method: &'static str, table: &str, headers: &HeaderMap, body: Value) -> Option<Response> {
    let csrf = csrf_of(headers);
    let mut guard = st.lock().unwrap();
    guard.requests.push(Recorded {
        method,
        table: table.to_string(),
        csrf: csrf.clone(),
        body,
    });
    if method != "GET" && csrf.as_deref() != Some(TOKEN) {
        return Some(forbidden());
    }
    None
}

async fn home() -> Response {
    (
        [(header::SET_COOKIE, format!("csrftoken={TOKEN}; Path=/"))],
        "<html><body>home</body></html>",
    )
        .into_response()
}

async fn list_rows(
    State(st): State<Shared>,
    Path(table): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejected) = record(&st, "GET", &table, &headers, json!(q)) {
        return rejected;
    }
    if st.lock().unwrap().fail_lists {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let page: usize = q.get("page").and_then(|v| v.parse().ok()).unwrap_or(1).max(1);
    let page_size: usize = q.get("page_size").and_then(|v| v.parse().ok()).unwrap_or(5).max(1);
    let guard = st.lock().unwrap();
    let rows = guard.tables.get(&table).cloned().unwrap_or_default();
    let total = rows.len();
    let total_pages = total.div_ceil(page_size).max(1);
    let data: Vec<Value> = rows.into_iter().skip((page - 1) * page_size).take(page_size).collect();
    let mut body = json!({
        "data": data,
        "pagination": {
            "enabled": true,
            "page": page,
            "page_size": page_size,
            "total_items": total,
            "total_pages": total_pages,
            "has_next": page < total_pages,
            "has_previous": page > 1
        }
    });
    if table == "table1" {
        body["table2_options"] = json!([{"id": 1, "positive_small_int": 1}, {"id": 2, "positive_small_int": null}]);
        body["table3_options"] = json!([{"id": 5, "email_field": "a@x.io"}]);
    }
    Json(body).into_response()
}

async fn create_row(
    State(st): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> Response {
    if let Some(rejected) = record(&st, "POST", &table, &headers, row.clone()) {
        return rejected;
    }
    match row.get("char_field").and_then(Value::as_str) {
        Some("bad") => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid date format for date_field"})))
                .into_response()
        }
        Some("dup") => {
            return (
                StatusCode::BAD_REQUEST,
                "UNIQUE constraint failed: json_app_table1.char_field",
            )
                .into_response()
        }
        _ => {}
    }
    let mut guard = st.lock().unwrap();
    guard.next_id += 1;
    row["id"] = json!(guard.next_id);
    guard.tables.entry(table).or_default().push(row.clone());
    (StatusCode::CREATED, Json(json!({"data": row}))).into_response()
}

async fn update_row(
    State(st): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(row): Json<Value>,
) -> Response {
    if let Some(rejected) = record(&st, "PUT", &table, &headers, row.clone()) {
        return rejected;
    }
    let mut guard = st.lock().unwrap();
    let rows = guard.tables.entry(table).or_default();
    match rows.iter_mut().find(|r| r["id"] == row["id"]) {
        Some(existing) => {
            *existing = row.clone();
            Json(json!({"data": row})).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response(),
    }
}

async fn delete_row(
    State(st): State<Shared>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(rejected) = record(&st, "DELETE", &table, &headers, body.clone()) {
        return rejected;
    }
    let mut guard = st.lock().unwrap();
    let rows = guard.tables.entry(table).or_default();
    rows.retain(|r| r["id"] != body["id"]);
    StatusCode::NO_CONTENT.into_response()
}

fn seeded(count: i64) -> Shared {
    let mut backend = Backend::default();
    let rows = (1..=count)
        .map(|id| json!({"id": id, "char_field": format!("row{id}"), "boolean_field": id % 2 == 0, "foreign_key": null}))
        .collect();
    backend.tables.insert("table1".to_string(), rows);
    backend.next_id = count;
    Arc::new(Mutex::new(backend))
}

async fn spawn_backend(state: Shared) -> String {
    let app = Router::new()
        .route("/json_app/", get(home))
        .route(
            "/json_app/{table}/",
            get(list_rows).post(create_row).put(update_row).delete(delete_row),
        )
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/json_app/")
}

fn client(base_url: &str, csrf: CsrfSource) -> CrudClient {
    CrudClient::new(ClientOptions {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        proxy: None,
        csrf,
    })
    .unwrap()
}

fn view_with(table: &str, store: Arc<dyn PageSizeStore>) -> TableView {
    TableView::new(table, Arc::new(default_registry()), store, DateStyle::default()).unwrap()
}

fn view(table: &str) -> TableView {
    view_with(table, Arc::new(MemoryStore::new()))
}

fn requests(st: &Shared) -> Vec<Recorded> {
    st.lock().unwrap().requests.clone()
}

#[tokio::test]
async fn list_pages_through_rows() {
    let st = seeded(7);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Disabled);
    let mut v = view("table1");

    v.select_table(&c, "table1").await.unwrap();
    assert_eq!(v.rows().len(), 5);
    assert_eq!(v.pagination().state().total_pages, 2);
    assert_eq!(v.options().get("table2_options").len(), 2);

    assert!(v.change_page(&c, 2).await.unwrap());
    assert_eq!(v.rows().len(), 2);
    assert!(!v.change_page(&c, 3).await.unwrap());
    assert_eq!(v.pagination().state().page, 2);

    let html = v.render();
    assert!(html.contains("Page 2 of 2"));
    assert!(html.contains("<td>row7</td>"));
    assert_eq!(requests(&st).len(), 2);
}

#[tokio::test]
async fn create_sends_cookie_token_and_reloads() {
    let st = seeded(2);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::default());
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let mut form = v.form(None);
    form.set("char_field", "hello").unwrap();
    form.set("foreign_key", "1").unwrap();
    let row = v.submit(&c, &form).await.unwrap();
    assert_eq!(row.id(), Some(3));

    let post = requests(&st).into_iter().find(|r| r.method == "POST").unwrap();
    assert_eq!(post.table, "table1");
    assert_eq!(post.csrf.as_deref(), Some(TOKEN));
    assert!(post.body.get("id").is_none());
    assert_eq!(post.body["foreign_key"], json!({"id": 1}));
    assert_eq!(post.body["boolean_field"], json!(false));
    assert_eq!(v.rows().len(), 3);
}

#[tokio::test]
async fn update_and_delete_use_row_id() {
    let st = seeded(3);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Token(TOKEN.to_string()));
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let mut form = v.form(Some(2));
    assert_eq!(form.id, Some(2));
    form.set("char_field", "renamed").unwrap();
    v.submit(&c, &form).await.unwrap();
    let put = requests(&st).into_iter().find(|r| r.method == "PUT").unwrap();
    assert_eq!(put.body["id"], json!(2));
    assert_eq!(put.body["char_field"], json!("renamed"));
    assert_eq!(put.body["boolean_field"], json!(true));
    assert!(v.render().contains("<td>renamed</td>"));

    v.delete(&c, 1).await.unwrap();
    let delete = requests(&st).into_iter().find(|r| r.method == "DELETE").unwrap();
    assert_eq!(delete.body, json!({"id": 1}));
    assert_eq!(v.rows().len(), 2);
    assert!(v.notice().is_none());
}

#[tokio::test]
async fn json_error_message_is_surfaced_verbatim() {
    let st = seeded(1);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Token(TOKEN.to_string()));
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let mut form = v.form(None);
    form.set("char_field", "bad").unwrap();
    let err = v.submit(&c, &form).await.unwrap_err();
    assert!(matches!(err, CrudError::Api { status: 400, .. }));
    let notice = v.notice().unwrap();
    assert_eq!(notice.kind, NoticeKind::Alert);
    assert_eq!(notice.message, "Invalid date format for date_field");
    assert_eq!(v.rows().len(), 1);
}

#[tokio::test]
async fn text_and_html_errors_are_translated() {
    let st = seeded(1);
    let base = spawn_backend(st.clone()).await;

    let c = client(&base, CsrfSource::Token(TOKEN.to_string()));
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();
    let mut form = v.form(None);
    form.set("char_field", "dup").unwrap();
    let err = v.submit(&c, &form).await.unwrap_err();
    assert_eq!(err.user_message(), MSG_ALREADY_REGISTERED);

    let no_token = client(&base, CsrfSource::Disabled);
    let err = no_token.delete("table1", 1).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.user_message(), MSG_SERVER_ERROR);
}

#[tokio::test]
async fn unreadable_attachment_sends_nothing() {
    let st = seeded(1);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Token(TOKEN.to_string()));
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();
    let before = requests(&st).len();

    let dir = tempfile::tempdir().unwrap();
    let mut form = v.form(None);
    form.attach("image_field", dir.path().join("missing.png"));
    let err = v.submit(&c, &form).await.unwrap_err();
    assert!(matches!(err, CrudError::Attachment { .. }));
    assert_eq!(requests(&st).len(), before);
    assert_eq!(v.notice().map(|n| n.kind), Some(NoticeKind::Alert));
}

#[tokio::test]
async fn attachments_are_posted_as_data_urls() {
    let st = seeded(0);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Token(TOKEN.to_string()));
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();
    let mut form = v.form(None);
    form.attach("file_field", &path);
    v.submit(&c, &form).await.unwrap();

    let post = requests(&st).into_iter().find(|r| r.method == "POST").unwrap();
    assert_eq!(
        post.body["file_field"],
        json!({"name": "notes.txt", "content": "data:text/plain;base64,aGVsbG8="})
    );
}

#[tokio::test]
async fn page_size_survives_a_new_view() {
    let st = seeded(12);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Disabled);
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PageSizeStore> = Arc::new(FileStore::new(dir.path().join("sizes.json")));

    let mut v = view_with("table1", store.clone());
    v.select_table(&c, "table1").await.unwrap();
    v.change_page_size(&c, 10).await.unwrap();
    assert_eq!(v.rows().len(), 10);

    let mut reopened = view_with("table1", store);
    assert_eq!(reopened.pagination().state().page_size, 10);
    reopened.select_table(&c, "table1").await.unwrap();
    let last = requests(&st).pop().unwrap();
    assert_eq!(last.body["page_size"], json!("10"));
    assert_eq!(last.body["page"], json!("1"));
}

#[tokio::test]
async fn edit_form_lists_related_options() {
    let st = seeded(2);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Disabled);
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let html = v.open_form(&c, Some(1)).await.unwrap();
    assert!(html.contains("Edit Entry"));
    assert!(html.contains("-- Select Foreign Key --"));
    assert!(html.contains("1 - Table2 (1)"));
    assert!(html.contains("2 - Table2 (N/A)"));
    assert!(html.contains(r#"name="char_field" value="row1""#));
}

#[tokio::test]
async fn failed_load_keeps_last_render() {
    let st = seeded(3);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Disabled);
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let dead = client("http://127.0.0.1:9/json_app/", CsrfSource::Disabled);
    assert!(v.refresh(&dead).await.is_err());
    assert_eq!(v.rows().len(), 3);
    assert_eq!(v.notice().map(|n| n.kind), Some(NoticeKind::Banner));
    assert!(v.render().contains("<td>row3</td>"));
}

#[tokio::test]
async fn failed_page_change_keeps_current_page() {
    let st = seeded(7);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Disabled);
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();

    let dead = client("http://127.0.0.1:9/json_app/", CsrfSource::Disabled);
    assert!(v.change_page(&dead, 2).await.is_err());
    assert_eq!(v.pagination().state().page, 1);
    assert_eq!(v.rows().len(), 5);
    let html = v.render();
    assert!(html.contains("Page 1 of 2"));
    assert!(!html.contains("Page 2 of 2"));

    assert!(v.change_page(&c, 2).await.unwrap());
    assert_eq!(v.pagination().state().page, 2);
}

#[tokio::test]
async fn write_succeeds_even_if_reload_fails() {
    let st = seeded(2);
    let base = spawn_backend(st.clone()).await;
    let c = client(&base, CsrfSource::Token(TOKEN.to_string()));
    let mut v = view("table1");
    v.select_table(&c, "table1").await.unwrap();
    st.lock().unwrap().fail_lists = true;

    let mut form = v.form(None);
    form.set("char_field", "kept").unwrap();
    let row = v.submit(&c, &form).await.unwrap();
    assert_eq!(row.id(), Some(3));
    assert_eq!(st.lock().unwrap().tables["table1"].len(), 3);
    assert_eq!(v.take_notice().map(|n| n.kind), Some(NoticeKind::Banner));
    assert_eq!(v.rows().len(), 2);

    v.delete(&c, 1).await.unwrap();
    assert_eq!(st.lock().unwrap().tables["table1"].len(), 2);
    assert_eq!(v.notice().map(|n| n.kind), Some(NoticeKind::Banner));
}
