use crate::error::ApiError;
use crate::{auth, cors, dispatch, metrics, AppState};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    handler::Handler,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Json, Router,
};
use mongogate_core::{count_flag, plan_collections, DocumentQuery, GateError, Operation, Outcome};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Build the full routing table. `prefix` is either empty or starts with `/`.
///
/// Layer order, outermost first: tracing, CORS headers, pre-flight answer,
/// credential check, then route and method matching.
pub fn router(state: AppState, prefix: &str) -> Router {
    let api = Router::new()
        .route("/collections", get_only(list_collections))
        .route("/collections/index", get_only(documents_by_param))
        .route("/collections/:name", get_only(documents))
        .route("/collections/:name/:id", get_only(document_by_path_id))
        .route(
            "/collections/:name/:field/:value",
            get_only(documents_by_path_filter),
        )
        .route("/health", get_only(health))
        .route("/metrics", get_only(metrics_text));

    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    let app = app
        .fallback(route_not_found)
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_basic_auth,
        ))
        .layer(middleware::from_fn(cors::preflight));
    cors::with_cors_headers(app)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// axum answers HEAD with the GET handler unless HEAD has its own route.
fn get_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    get(handler)
        .head(method_not_allowed)
        .fallback(method_not_allowed)
}

/// Raw `key=value` pairs in request order. Decoding into pairs keeps
/// repeated keys visible instead of failing the whole extraction.
type RawParams = Result<Query<Vec<(String, String)>>, QueryRejection>;

fn pairs(raw: RawParams) -> Result<Vec<(String, String)>, GateError> {
    raw.map(|Query(pairs)| pairs)
        .map_err(|rejection| GateError::InvalidParameter(rejection.body_text()))
}

// A key given twice is ambiguous; a repeated `filter` is a bad filter.
fn set_once(slot: &mut Option<String>, key: &str, value: String) -> Result<(), GateError> {
    if slot.is_some() {
        return Err(match key {
            "filter" => GateError::InvalidFilter,
            _ => GateError::InvalidParameter(format!("`{}` given more than once", key)),
        });
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Debug, Default)]
struct CollectionParams {
    count: Option<String>,
}

impl CollectionParams {
    fn from_raw(raw: RawParams) -> Result<Self, GateError> {
        let mut p = Self::default();
        for (key, value) in pairs(raw)? {
            if key == "count" {
                set_once(&mut p.count, &key, value)?;
            }
        }
        Ok(p)
    }
}

#[derive(Debug, Default)]
struct DocumentParams {
    collection_name: Option<String>,
    id: Option<String>,
    filter_field: Option<String>,
    filter_value: Option<String>,
    filter: Option<String>,
    count: Option<String>,
    limit: Option<String>,
    skip: Option<String>,
}

impl DocumentParams {
    /// Unknown keys are ignored.
    fn from_raw(raw: RawParams) -> Result<Self, GateError> {
        let mut p = Self::default();
        for (key, value) in pairs(raw)? {
            let slot = match key.as_str() {
                "collectionName" => &mut p.collection_name,
                "id" => &mut p.id,
                "filterField" => &mut p.filter_field,
                "filterValue" => &mut p.filter_value,
                "filter" => &mut p.filter,
                "count" => &mut p.count,
                "limit" => &mut p.limit,
                "skip" => &mut p.skip,
                _ => continue,
            };
            set_once(slot, &key, value)?;
        }
        Ok(p)
    }

    fn into_query(self) -> DocumentQuery {
        DocumentQuery {
            collection: self.collection_name,
            id: self.id,
            filter_field: self.filter_field,
            filter_value: self.filter_value,
            filter: self.filter,
            count: count_flag(self.count.as_deref()),
            limit: self.limit,
            skip: self.skip,
        }
    }
}

async fn list_collections(State(app): State<AppState>, q: RawParams) -> Response {
    let plan =
        CollectionParams::from_raw(q).map(|p| plan_collections(count_flag(p.count.as_deref())));
    answer(&app, plan).await
}

async fn documents_by_param(State(app): State<AppState>, q: RawParams) -> Response {
    let plan = DocumentParams::from_raw(q).and_then(|p| p.into_query().plan(app.paginate));
    answer(&app, plan).await
}

async fn documents(
    State(app): State<AppState>,
    Path(name): Path<String>,
    q: RawParams,
) -> Response {
    let plan = DocumentParams::from_raw(q).and_then(|p| {
        DocumentQuery {
            collection: Some(name),
            ..p.into_query()
        }
        .plan(app.paginate)
    });
    answer(&app, plan).await
}

async fn document_by_path_id(
    State(app): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    q: RawParams,
) -> Response {
    let plan = DocumentParams::from_raw(q).and_then(|p| {
        DocumentQuery {
            collection: Some(name),
            id: Some(id),
            ..p.into_query()
        }
        .plan(app.paginate)
    });
    answer(&app, plan).await
}

async fn documents_by_path_filter(
    State(app): State<AppState>,
    Path((name, field, value)): Path<(String, String, String)>,
    q: RawParams,
) -> Response {
    debug!("filtering {} where {} = {}", name, field, value);
    let plan = DocumentParams::from_raw(q).and_then(|p| {
        DocumentQuery {
            collection: Some(name),
            filter_field: Some(field),
            filter_value: Some(value),
            ..p.into_query()
        }
        .plan(app.paginate)
    });
    answer(&app, plan).await
}

/// Run a resolved plan (or report why it could not be resolved) and turn
/// the result into the response. Planning errors never reach the store.
async fn answer(app: &AppState, plan: Result<Operation, GateError>) -> Response {
    let (op, result) = match plan {
        Ok(op) => {
            let result = dispatch::run(app, &op).await.and_then(render);
            (op.name(), result)
        }
        Err(e) => ("rejected", Err(e)),
    };
    let response = match result {
        Ok(resp) => resp,
        Err(e) => {
            if matches!(e, GateError::Store(_) | GateError::Timeout(_)) {
                warn!(op = op, "store failure: {}", e);
            }
            ApiError::from(e).into_response()
        }
    };
    metrics::REQUESTS_TOTAL
        .with_label_values(&[op, response.status().as_str()])
        .inc();
    response
}

fn render(outcome: Outcome) -> Result<Response, GateError> {
    Ok(match outcome {
        Outcome::Names(names) => Json(names).into_response(),
        Outcome::Count(count) => Json(json!({ "count": count })).into_response(),
        Outcome::Documents(docs) => {
            debug!("found {} documents", docs.len());
            Json(docs).into_response()
        }
        Outcome::Document(Some(doc)) => Json(doc).into_response(),
        Outcome::Document(None) => return Err(GateError::NotFound),
    })
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_text() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buf) {
        warn!("encoding metrics failed: {}", e);
    }
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    )
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
