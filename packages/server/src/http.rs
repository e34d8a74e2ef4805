//! HTTP read API over engine snapshots.
//!
//! | Route                          | Schema     | Body                               |
//! |--------------------------------|------------|------------------------------------|
//! | `GET /api/snapshot`            | any        | full snapshot                      |
//! | `GET /api/stats`               | any        | packet counters                    |
//! | `GET /api/span-groups?columns` | transcript | span groups and their envelopes    |
//! | `GET /api/layout`              | events     | timeline rows and padded time axis |

use crate::error::ServerResult;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use livegrid_engine::events::{EventEngine, EventLayout};
use livegrid_engine::transcript::{self, SpanEnvelope, SpanGroups, TranscriptEngine};
use livegrid_engine::{DocumentSchema, Engine, FormatDetector, IngestStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Upper bound for `?columns=`
pub const MAX_COLUMNS: usize = 65_536;

fn api_routes<S, D>() -> Router<Arc<Engine<S, D>>>
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    Router::new()
        .route("/api/snapshot", get(snapshot::<S, D>))
        .route("/api/stats", get(stats::<S, D>))
}

/// Schema-independent routes
pub fn router<S, D>(engine: Arc<Engine<S, D>>) -> Router
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    api_routes().with_state(engine).layer(CorsLayer::permissive())
}

pub fn transcript_router(engine: Arc<TranscriptEngine>) -> Router {
    api_routes()
        .route("/api/span-groups", get(span_groups))
        .with_state(engine)
        .layer(CorsLayer::permissive())
}

pub fn events_router(engine: Arc<EventEngine>) -> Router {
    api_routes()
        .route("/api/layout", get(event_layout))
        .with_state(engine)
        .layer(CorsLayer::permissive())
}

pub async fn serve(listener: TcpListener, app: Router) -> ServerResult<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("[HTTP] Listening on http://{}", addr);
    }
    axum::serve(listener, app).await?;
    Ok(())
}

async fn snapshot<S, D>(State(engine): State<Arc<Engine<S, D>>>) -> Json<S::Snapshot>
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    Json(engine.snapshot())
}

async fn stats<S, D>(State(engine): State<Arc<Engine<S, D>>>) -> Json<IngestStats>
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    Json(engine.stats())
}

#[derive(Debug, Deserialize)]
struct SpanGroupsQuery {
    columns: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SpanGroupsResponse {
    columns: usize,
    measure_length: f64,
    groups: SpanGroups,
    envelopes: Vec<SpanEnvelope>,
}

async fn span_groups(
    State(engine): State<Arc<TranscriptEngine>>,
    Query(query): Query<SpanGroupsQuery>,
) -> Json<SpanGroupsResponse> {
    let (document, _) = engine.snapshot().into_parts();
    let measure_length = document.measure_length();

    let columns = query
        .columns
        .unwrap_or_else(|| transcript::column_count(document.song_length(), measure_length))
        .min(MAX_COLUMNS);

    let groups = transcript::compute_span_groups(document.transcript(), measure_length, columns);
    let envelopes = transcript::span_envelopes(&groups);

    Json(SpanGroupsResponse {
        columns,
        measure_length,
        groups,
        envelopes,
    })
}

async fn event_layout(State(engine): State<Arc<EventEngine>>) -> Json<Option<EventLayout>> {
    Json(engine.snapshot().layout())
}
