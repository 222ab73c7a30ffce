//! Demo pages used to exercise the middleware stack.
//!
//! # Endpoints
//!
//! - `GET /blog` - Post index (cacheable)
//! - `GET /blog/{slug}` - A single post, 404 for unknown slugs (cacheable when found)
//! - `GET /admin/stats` - Live statistics (exclude it with `CACHE_EXCLUDED_PATH`)
//! - `POST /echo` - Echoes the request body (POST is not cached by default)
//! - `GET /teapot` - Always 418 (not a cacheable status by default)
//!
//! Every page carries a `render` sequence number; two responses with the same
//! number prove the second one was served from the cache.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::error::{AppError, AppResult};
use crate::models::{AdminStatsResponse, EchoResponse, PageResponse, PostSummary};
use crate::state::AppState;

/// (slug, title, body)
const POSTS: [(&str, &str, &str); 3] = [
    (
        "hello-world",
        "Hello, world",
        "The first post on this blog.",
    ),
    (
        "caching-responses",
        "Caching responses",
        "Rendered once, then served from the response cache until the TTL expires.",
    ),
    (
        "filtering-clients",
        "Filtering clients",
        "Blacklists and whitelists are CIDR ranges checked before any handler runs.",
    ),
];

/// Blog index.
#[instrument(skip(state))]
pub async fn blog_index(State(state): State<AppState>) -> Json<PageResponse> {
    let render = state.record_render();
    debug!(render, "Rendering blog index");

    Json(PageResponse {
        title: "Blog".to_string(),
        body: format!("{} posts", POSTS.len()),
        posts: POSTS
            .iter()
            .map(|(slug, title, _)| PostSummary {
                slug: (*slug).to_string(),
                title: (*title).to_string(),
            })
            .collect(),
        render,
        rendered_at: Utc::now(),
    })
}

/// A single blog post.
#[instrument(skip(state))]
pub async fn blog_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<PageResponse>> {
    let (_, title, body) = POSTS
        .iter()
        .find(|(candidate, _, _)| *candidate == slug)
        .ok_or_else(|| AppError::NotFound(format!("Post '{slug}' not found")))?;

    let render = state.record_render();
    debug!(render, slug = %slug, "Rendering blog post");

    Ok(Json(PageResponse {
        title: (*title).to_string(),
        body: (*body).to_string(),
        posts: Vec::new(),
        render,
        rendered_at: Utc::now(),
    }))
}

/// Live statistics.
#[instrument(skip(state))]
pub async fn admin_stats(State(state): State<AppState>) -> Json<AdminStatsResponse> {
    Json(AdminStatsResponse {
        uptime_seconds: state.uptime_seconds(),
        renders: state.render_count(),
        cache_enabled: state.config.cache_enabled,
        cache_store: state.store.name().to_string(),
        cache_entries: state.store.entry_count().await,
        ip_filter_enabled: state.config.ip_filter.is_enabled(),
    })
}

/// Echo the request body back.
#[instrument(skip(body))]
pub async fn echo(body: Bytes) -> Json<EchoResponse> {
    let echo = String::from_utf8_lossy(&body).into_owned();
    Json(EchoResponse {
        length: body.len(),
        echo,
    })
}

/// I'm a teapot.
pub async fn teapot() -> (StatusCode, &'static str) {
    (StatusCode::IM_A_TEAPOT, "I'm a teapot")
}
