use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use examquote_core::{
    build_quotation, parse_rows, Cart, CatalogEntry, CatalogStore, CoveragePercent, ExamCode,
    ExceptionSet, HistoryLog, IngestError, InsurerLogos, JsonStore, StoreError,
};

/// Application state shared across REST API handlers
///
/// All services sit behind one mutex: every operation is a short,
/// run-to-completion state transition (single operator, single session),
/// so one lock keeps "which catalog is active" and "what data is loaded"
/// from ever being observed mid-change.
#[derive(Clone)]
struct AppState {
    inner: Arc<Mutex<Services>>,
}

struct Services {
    catalogs: CatalogStore,
    exceptions: ExceptionSet,
    insurer_logos: InsurerLogos,
    history: HistoryLog,
}

type HandlerError = (StatusCode, String);

fn lock_services(state: &AppState) -> Result<MutexGuard<'_, Services>, HandlerError> {
    state.inner.lock().map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "state lock poisoned".to_string(),
        )
    })
}

fn internal_error(e: impl std::fmt::Display) -> HandlerError {
    tracing::error!("internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error".to_string(),
    )
}

#[derive(serde::Serialize, ToSchema)]
struct HealthRes {
    status: String,
}

#[derive(serde::Serialize, ToSchema)]
struct CatalogSummary {
    index: usize,
    name: String,
    exam_count: usize,
    insurers: Vec<String>,
    active: bool,
    has_logo: bool,
}

#[derive(serde::Deserialize, ToSchema)]
struct UploadCatalogReq {
    name: String,
    /// Decoded sheet rows: column name to cell value.
    #[schema(value_type = Vec<Object>)]
    rows: Vec<BTreeMap<String, Option<String>>>,
    logo: Option<String>,
    #[serde(default)]
    activate: bool,
}

#[derive(serde::Serialize, ToSchema)]
struct UploadCatalogRes {
    index: usize,
    exam_count: usize,
    insurers: Vec<String>,
}

#[derive(serde::Deserialize, ToSchema)]
struct ReplaceLogoReq {
    logo: Option<String>,
}

#[derive(serde::Deserialize, ToSchema)]
struct ExceptionReq {
    code: String,
}

#[derive(serde::Deserialize, ToSchema)]
struct SetInsurerLogoReq {
    /// Base64-encoded image data.
    logo: String,
}

#[derive(serde::Serialize, ToSchema)]
struct InsurerLogoRes {
    insurer: String,
    logo: String,
}

#[derive(serde::Deserialize, ToSchema)]
struct QuoteItemReq {
    code: String,
    #[serde(default)]
    quantity: Option<u32>,
}

#[derive(serde::Deserialize, ToSchema)]
struct QuoteReq {
    insurer: String,
    coverage: f64,
    client_name: String,
    client_cedula: String,
    advisor: String,
    items: Vec<QuoteItemReq>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_catalogs,
        upload_catalog,
        activate_catalog,
        remove_catalog,
        replace_logo,
        list_exceptions,
        add_exception,
        remove_exception,
        list_insurer_logos,
        get_insurer_logo,
        set_insurer_logo,
        remove_insurer_logo,
        create_quote,
        export_history
    ),
    components(schemas(
        HealthRes,
        CatalogSummary,
        UploadCatalogReq,
        UploadCatalogRes,
        ReplaceLogoReq,
        ExceptionReq,
        SetInsurerLogoReq,
        InsurerLogoRes,
        QuoteItemReq,
        QuoteReq
    ))
)]
struct ApiDoc;

/// Main entry point for the exam quoting service
///
/// # Environment Variables
/// - `EXAMQUOTE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `EXAMQUOTE_DATA_DIR`: Directory for persisted state (default: "examquote_data")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examquote=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("EXAMQUOTE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir =
        std::env::var("EXAMQUOTE_DATA_DIR").unwrap_or_else(|_| "examquote_data".into());

    tracing::info!("++ Starting examquote REST on {}", rest_addr);
    tracing::info!("++ Persisting state under {}", data_dir);

    let storage = JsonStore::open(&data_dir)?;
    let services = Services {
        catalogs: CatalogStore::open(storage.clone()),
        exceptions: ExceptionSet::open(storage.clone()),
        insurer_logos: InsurerLogos::open(storage.clone()),
        history: HistoryLog::open(storage),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/catalogs", get(list_catalogs))
        .route("/catalogs", post(upload_catalog))
        .route("/catalogs/:index/activate", post(activate_catalog))
        .route("/catalogs/:index", delete(remove_catalog))
        .route("/catalogs/:index/logo", put(replace_logo))
        .route("/exceptions", get(list_exceptions))
        .route("/exceptions", post(add_exception))
        .route("/exceptions/:code", delete(remove_exception))
        .route("/insurer-logos", get(list_insurer_logos))
        .route(
            "/insurer-logos/:insurer",
            get(get_insurer_logo)
                .put(set_insurer_logo)
                .delete(remove_insurer_logo),
        )
        .route("/quotes", post(create_quote))
        .route("/history.csv", get(export_history))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(AppState {
            inner: Arc::new(Mutex::new(services)),
        });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/catalogs",
    responses(
        (status = 200, description = "Stored catalogs", body = [CatalogSummary])
    )
)]
async fn list_catalogs(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogSummary>>, HandlerError> {
    let services = lock_services(&state)?;
    let active_index = services.catalogs.active().map(|a| a.index);
    let summaries = services
        .catalogs
        .list()
        .iter()
        .enumerate()
        .map(|(index, entry)| CatalogSummary {
            index,
            name: entry.name.clone(),
            exam_count: entry.catalog.exams.len(),
            insurers: entry.catalog.insurers.clone(),
            active: Some(index) == active_index,
            has_logo: entry.logo.is_some(),
        })
        .collect();
    Ok(Json(summaries))
}

#[utoipa::path(
    post,
    path = "/catalogs",
    request_body = UploadCatalogReq,
    responses(
        (status = 201, description = "Catalog ingested", body = UploadCatalogRes),
        (status = 422, description = "Price file has the wrong structure"),
        (status = 500, description = "Internal server error")
    )
)]
async fn upload_catalog(
    State(state): State<AppState>,
    Json(req): Json<UploadCatalogReq>,
) -> Result<(StatusCode, Json<UploadCatalogRes>), HandlerError> {
    let catalog = parse_rows(&req.rows).map_err(|e| match e {
        IngestError::MalformedCatalog(_) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        IngestError::Unreadable(_) => (StatusCode::BAD_REQUEST, e.to_string()),
    })?;
    let exam_count = catalog.exams.len();
    let insurers = catalog.insurers.clone();

    let mut services = lock_services(&state)?;
    let index = services
        .catalogs
        .add(CatalogEntry {
            name: req.name,
            catalog,
            logo: req.logo,
        })
        .map_err(internal_error)?;
    if req.activate {
        services.catalogs.set_active(index).map_err(internal_error)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadCatalogRes {
            index,
            exam_count,
            insurers,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/catalogs/{index}/activate",
    params(("index" = usize, Path, description = "Catalog index")),
    responses(
        (status = 204, description = "Catalog activated"),
        (status = 404, description = "No catalog at that index")
    )
)]
async fn activate_catalog(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<StatusCode, HandlerError> {
    let mut services = lock_services(&state)?;
    match services.catalogs.set_active(index) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e @ StoreError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err(internal_error(e)),
    }
}

#[utoipa::path(
    delete,
    path = "/catalogs/{index}",
    params(("index" = usize, Path, description = "Catalog index")),
    responses(
        (status = 204, description = "Catalog removed"),
        (status = 404, description = "No catalog at that index")
    )
)]
async fn remove_catalog(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<StatusCode, HandlerError> {
    let mut services = lock_services(&state)?;
    match services.catalogs.remove(index) {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e @ StoreError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err(internal_error(e)),
    }
}

#[utoipa::path(
    put,
    path = "/catalogs/{index}/logo",
    params(("index" = usize, Path, description = "Catalog index")),
    request_body = ReplaceLogoReq,
    responses(
        (status = 204, description = "Logo replaced"),
        (status = 404, description = "No catalog at that index")
    )
)]
async fn replace_logo(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(req): Json<ReplaceLogoReq>,
) -> Result<StatusCode, HandlerError> {
    let mut services = lock_services(&state)?;
    match services.catalogs.replace_logo(index, req.logo) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e @ StoreError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err(internal_error(e)),
    }
}

#[utoipa::path(
    get,
    path = "/exceptions",
    responses(
        (status = 200, description = "Excluded exam codes", body = [String])
    )
)]
async fn list_exceptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, HandlerError> {
    let services = lock_services(&state)?;
    Ok(Json(
        services
            .exceptions
            .list()
            .map(|code| code.to_string())
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/exceptions",
    request_body = ExceptionReq,
    responses(
        (status = 204, description = "Code excluded from coverage"),
        (status = 400, description = "Empty code")
    )
)]
async fn add_exception(
    State(state): State<AppState>,
    Json(req): Json<ExceptionReq>,
) -> Result<StatusCode, HandlerError> {
    let code =
        ExamCode::new(&req.code).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let mut services = lock_services(&state)?;
    services.exceptions.add(code).map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/exceptions/{code}",
    params(("code" = String, Path, description = "Exam code")),
    responses(
        (status = 204, description = "Coverage re-enabled for the code"),
        (status = 400, description = "Empty code")
    )
)]
async fn remove_exception(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let code = ExamCode::new(&code).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let mut services = lock_services(&state)?;
    services.exceptions.remove(&code).map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/insurer-logos",
    responses(
        (status = 200, description = "Insurer names with a stored logo", body = [String])
    )
)]
async fn list_insurer_logos(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, HandlerError> {
    let services = lock_services(&state)?;
    Ok(Json(
        services
            .insurer_logos
            .insurers()
            .map(str::to_string)
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/insurer-logos/{insurer}",
    params(("insurer" = String, Path, description = "Insurer name")),
    responses(
        (status = 200, description = "Stored logo", body = InsurerLogoRes),
        (status = 404, description = "No logo stored for that insurer")
    )
)]
async fn get_insurer_logo(
    State(state): State<AppState>,
    Path(insurer): Path<String>,
) -> Result<Json<InsurerLogoRes>, HandlerError> {
    let services = lock_services(&state)?;
    match services.insurer_logos.get(&insurer) {
        Some(logo) => Ok(Json(InsurerLogoRes {
            insurer,
            logo: logo.to_string(),
        })),
        None => Err((
            StatusCode::NOT_FOUND,
            format!("no logo stored for insurer {}", insurer),
        )),
    }
}

#[utoipa::path(
    put,
    path = "/insurer-logos/{insurer}",
    params(("insurer" = String, Path, description = "Insurer name")),
    request_body = SetInsurerLogoReq,
    responses(
        (status = 204, description = "Logo stored")
    )
)]
async fn set_insurer_logo(
    State(state): State<AppState>,
    Path(insurer): Path<String>,
    Json(req): Json<SetInsurerLogoReq>,
) -> Result<StatusCode, HandlerError> {
    let mut services = lock_services(&state)?;
    services
        .insurer_logos
        .set(&insurer, req.logo)
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/insurer-logos/{insurer}",
    params(("insurer" = String, Path, description = "Insurer name")),
    responses(
        (status = 204, description = "Logo removed")
    )
)]
async fn remove_insurer_logo(
    State(state): State<AppState>,
    Path(insurer): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let mut services = lock_services(&state)?;
    services
        .insurer_logos
        .remove(&insurer)
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/quotes",
    request_body = QuoteReq,
    responses(
        (status = 201, description = "Quotation computed and logged"),
        (status = 400, description = "Validation rejected"),
        (status = 404, description = "Unknown exam code"),
        (status = 409, description = "No active catalog")
    )
)]
async fn create_quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteReq>,
) -> Result<(StatusCode, Json<serde_json::Value>), HandlerError> {
    let mut services = lock_services(&state)?;

    let mut cart = Cart::new();
    {
        let catalog = services.catalogs.active_catalog().ok_or((
            StatusCode::CONFLICT,
            "no active catalog".to_string(),
        ))?;
        for item in &req.items {
            let code = ExamCode::new(&item.code)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            let exam = catalog.find_by_code(&code).ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    format!("exam {} not found in the active catalog", code),
                )
            })?;
            cart.add_or_increment(exam, &req.insurer);
            if let Some(quantity) = item.quantity {
                cart.set_quantity(&code, quantity);
            }
        }
    }

    let quotation = build_quotation(
        &cart,
        &req.insurer,
        CoveragePercent::clamped(req.coverage),
        services.exceptions.codes(),
        &req.client_name,
        &req.client_cedula,
    )
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    services
        .history
        .append(quotation.history_entry(&req.advisor))
        .map_err(internal_error)?;

    let body = serde_json::to_value(&quotation).map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/history.csv",
    responses(
        (status = 200, description = "Quotation history as CSV", content_type = "text/csv")
    )
)]
async fn export_history(State(state): State<AppState>) -> Result<String, HandlerError> {
    let services = lock_services(&state)?;
    services.history.export_csv().map_err(internal_error)
}
