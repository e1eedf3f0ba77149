use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use crate::server::{APP_NAME, AppState};
use crate::storage::Engine;
use crate::writer;

#[derive(Deserialize)]
pub struct PageParams {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

fn sql_body(body: &Bytes) -> Result<&str, Response> {
    std::str::from_utf8(body).map_err(|e| Json(e.to_string()).into_response())
}

fn not_found(table: &str) -> Response {
    (StatusCode::NOT_FOUND, table.to_string()).into_response()
}

pub async fn root() -> &'static str {
    APP_NAME
}

pub async fn tables(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    match state.store.table_names() {
        Ok(names) => Json(names),
        Err(e) => {
            tracing::error!("GET /tables -> {}", e);
            Json(Vec::new())
        }
    }
}

pub async fn execute(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let sql = match sql_body(&body) {
        Ok(sql) => sql,
        Err(resp) => return resp,
    };
    tracing::debug!("{}", sql);
    match state.store.execute(sql) {
        Ok(_) => Json("OK").into_response(),
        Err(e) => {
            tracing::error!("POST /execute -> {} {}", e, sql);
            Json(e.to_string()).into_response()
        }
    }
}

pub async fn query(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let sql = match sql_body(&body) {
        Ok(sql) => sql,
        Err(resp) => return resp,
    };
    tracing::debug!("{}", sql);
    match state.store.query(sql) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            tracing::error!("POST /query -> {} {}", e, sql);
            Json(e.to_string()).into_response()
        }
    }
}

pub async fn create_index(
    State(state): State<Arc<AppState>>,
    Path((table, name, field)): Path<(String, String, String)>,
) -> Json<&'static str> {
    if let Err(e) = state.store.create_index(&table, &name, &field) {
        tracing::error!("POST /index/{}/{}/{} -> {}", table, name, field, e);
    }
    Json("OK")
}

pub async fn vacuum(State(state): State<Arc<AppState>>) -> Response {
    match state.store.vacuum() {
        Ok(()) => Json("OK").into_response(),
        Err(e) => {
            tracing::error!("GET /vacuum -> {}", e);
            Json(e.to_string()).into_response()
        }
    }
}

pub async fn count(State(state): State<Arc<AppState>>, Path(table): Path<String>) -> Response {
    match state.store.count(&table) {
        Ok(records) => Json(json!({ "records": records })).into_response(),
        Err(e) => {
            tracing::error!("GET /count/{} -> {}", table, e);
            not_found(&table)
        }
    }
}

pub async fn get_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<PageParams>,
) -> Response {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(100);
    match state.store.fetch_page(&table, offset, limit) {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            tracing::error!("GET /{} -> {}", table, e);
            not_found(&table)
        }
    }
}

/// Upsert the JSON body into `table`; answers with the rows written
pub async fn insert(State(state): State<Arc<AppState>>, Path(table): Path<String>, body: Bytes) -> Json<usize> {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("POST /{} -> {}", table, e);
            return Json(0);
        }
    };
    Json(writer::upsert(state.store.as_ref(), &table, payload))
}
