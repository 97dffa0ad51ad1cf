use std::sync::Arc;

use agrochoco::{
    Error, Record,
    error::{GatewayError, ProgrammingError},
    field::display_value,
    form::{FormController, SubmitOutcome},
    gateway::Gateway,
    list::{ListController, PAGE_SIZE, fetch_record},
    schema::{self, ID_KEY, TableSchema},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

struct AppState {
    gateway: Gateway,
}

struct ApiError(Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Schema(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Programming(ProgrammingError::ReadOnlyTable(_)) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            Error::Programming(ProgrammingError::InvalidRecordId(_)) => StatusCode::BAD_REQUEST,
            Error::Programming(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Gateway(GatewayError::Auth { .. }) => StatusCode::UNAUTHORIZED,
            Error::Gateway(GatewayError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Error::Gateway(GatewayError::Server { .. }) => StatusCode::BAD_GATEWAY,
            Error::Gateway(GatewayError::Transport { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let message = match &self.0 {
            Error::Gateway(e) => e.message().to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": { "message": message } }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
}

#[derive(Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    confirm: bool,
}

async fn get_tables() -> Json<Value> {
    Json(json!(schema::registry().tables()))
}

fn display_row(table: &TableSchema, record: &Record) -> Value {
    let display: Map<String, Value> = table
        .fields
        .iter()
        .map(|f| (f.key.clone(), Value::String(display_value(table, record, f))))
        .collect();
    json!({ "record": record, "display": display })
}

async fn get_records(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult {
    let table = schema::lookup(&table)?;
    let mut list = ListController::new(table);
    list.load(&state.gateway).await?;
    list.set_page(query.page.unwrap_or(1));
    let rows: Vec<Value> = list.page_records().iter().map(|r| display_row(table, r)).collect();
    Ok(Json(json!({
        "table": table.id,
        "page": list.page(),
        "total_pages": list.total_pages(),
        "page_size": PAGE_SIZE,
        "count": list.records().len(),
        "rows": rows,
    })))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
) -> ApiResult {
    let table = schema::lookup(&table)?;
    let record = fetch_record(&state.gateway, table, &id).await?;
    Ok(Json(display_row(table, &record)))
}

async fn get_form(Path(table): Path<String>) -> ApiResult {
    let table = schema::lookup(&table)?;
    let mut form = FormController::new();
    form.open_create(table)?;
    Ok(Json(json!({ "table": table.id, "fields": form.bindings() })))
}

async fn save(
    gateway: &Gateway,
    mut form: FormController<'_>,
    values: Map<String, Value>,
) -> ApiResult {
    for (key, value) in values {
        if key != ID_KEY {
            form.set_field(&key, value)?;
        }
    }
    match form.submit(gateway).await? {
        SubmitOutcome::Saved(saved) => Ok(Json(json!({ "saved": saved }))),
        SubmitOutcome::Ignored | SubmitOutcome::Stale => Ok(Json(json!({ "saved": null }))),
    }
}

async fn post_record(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Json(values): Json<Map<String, Value>>,
) -> ApiResult {
    let table = schema::lookup(&table)?;
    let mut form = FormController::new();
    form.open_create(table)?;
    save(&state.gateway, form, values).await
}

async fn put_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    Json(values): Json<Map<String, Value>>,
) -> ApiResult {
    let table = schema::lookup(&table)?;
    let record = fetch_record(&state.gateway, table, &id).await?;
    let mut form = FormController::new();
    form.open_edit(table, &record)?;
    save(&state.gateway, form, values).await
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult {
    let table = schema::lookup(&table)?;
    let mut list = ListController::new(table);
    let mut target = Record::new();
    target.insert(ID_KEY.to_string(), Value::String(id));
    let pending = list.request_delete(&target)?;
    if !query.confirm {
        return Ok(Json(json!({ "deleted": false, "confirm": pending.id() })));
    }
    list.confirm_delete(&state.gateway, pending).await?;
    Ok(Json(json!({ "deleted": true, "count": list.records().len() })))
}

pub async fn run(gateway: Gateway, port: u16) -> anyhow::Result<()> {
    info!("Starting admin console");
    let shared_state = Arc::new(AppState { gateway });
    let app = Router::new()
        .route("/tables", get(get_tables))
        .route("/tables/{table}/form", get(get_form))
        .route("/tables/{table}/records", get(get_records).post(post_record))
        .route(
            "/tables/{table}/records/{id}",
            get(get_record).put(put_record).delete(delete_record),
        )
        .with_state(shared_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("Listening on port {port}");
    axum::serve(listener, app).await?;
    Ok(())
}
