use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post, put};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::app::browser::DataBrowser;
use crate::app::remote::RemoteServices;
use crate::formats::{BrowserRecord, GraphqlRequest, ProgressState};
use crate::navigation;
use crate::page::Site;
use crate::progress::ProgressStore;
use crate::widgets;

type ApiError = (StatusCode, String);

const DEFAULT_RETURN_PATH: &str = "/";

/// Shared by every handler. The progress store sits behind one lock, so
/// updates apply in request order.
#[derive(Clone)]
pub struct AppState {
    pub site: Arc<Site>,
    pub progress: Arc<Mutex<ProgressStore>>,
    pub remote: Arc<dyn RemoteServices>,
}

impl AppState {
    pub fn new(site: Site, progress: ProgressStore, remote: Arc<dyn RemoteServices>) -> Self {
        Self {
            site: Arc::new(site),
            progress: Arc::new(Mutex::new(progress)),
            remote,
        }
    }

    pub async fn snapshot(&self) -> Arc<ProgressState> {
        self.progress.lock().await.get()
    }
}

pub fn router(state: AppState) -> Router {
    let images = ServeDir::new(state.site.images_dir());

    Router::new()
        .route("/healthz", get(|| async { "ok\n" }))
        .route("/", get(landing_page))
        .route("/auth/github", get(github_auth))
        .route("/api/progress", get(progress_snapshot))
        .route("/api/progress/skip-auth", post(skip_auth))
        .route("/api/track", post(select_track))
        .route("/api/invite", post(send_invite))
        .route("/api/console", post(console))
        .route("/api/browser", get(list_records).post(create_record))
        .route("/api/browser/:id", put(update_record).delete(delete_record))
        .nest_service("/images", images)
        .route("/:chapter/:subchapter", get(subchapter_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %format!("{err:#}"), "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal error\n".to_string(),
    )
}

fn upstream(err: anyhow::Error) -> ApiError {
    tracing::warn!(error = %format!("{err:#}"), "upstream call failed");
    (StatusCode::BAD_GATEWAY, format!("{err:#}\n"))
}

/// Accepts only same-site absolute paths.
fn local_path(raw: Option<&str>, fallback: &str) -> String {
    match raw.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_owned(),
        _ => fallback.to_owned(),
    }
}

async fn render_blocking<F>(render: F) -> Result<Html<String>, ApiError>
where
    F: FnOnce() -> anyhow::Result<String> + Send + 'static,
{
    let html = tokio::task::spawn_blocking(render)
        .await
        .map_err(|err| internal(anyhow::anyhow!("render task failed: {err}")))?
        .map_err(internal)?;
    Ok(Html(html))
}

#[derive(Debug, Deserialize)]
struct CodeQuery {
    code: Option<String>,
}

/// Exchanges a one-time OAuth code and records the claimed endpoint. A failed
/// exchange leaves the reader unconnected.
async fn consume_code(state: &AppState, code: &str) -> Result<(), ApiError> {
    match state.remote.exchange_code(code).await {
        Ok(user) => {
            tracing::info!(email = %user.email, project_id = ?user.project_id, "endpoint claimed");
            let mut store = state.progress.lock().await;
            store.claim_endpoint(user).map_err(internal)?;
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "auth code exchange failed");
        }
    }
    Ok(())
}

async fn landing_page(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> Result<Response, ApiError> {
    if let Some(code) = query.code.as_deref() {
        consume_code(&state, code).await?;
        return Ok(Redirect::to("/").into_response());
    }

    let snapshot = {
        let mut store = state.progress.lock().await;
        store
            .ensure_initial_load_timestamp(Utc::now())
            .map_err(internal)?;
        if let Some(track) =
            navigation::track_selection_for(state.site.catalog(), None, &store.get())
        {
            store.set_selected_track(&track).map_err(internal)?;
        }
        store.get()
    };

    let site = Arc::clone(&state.site);
    let html = render_blocking(move || site.render_landing(&snapshot)).await?;
    Ok(html.into_response())
}

async fn subchapter_page(
    State(state): State<AppState>,
    Path((chapter, subchapter)): Path<(String, String)>,
    Query(query): Query<CodeQuery>,
) -> Result<Response, ApiError> {
    let Some(sub) = state.site.locate(&chapter, &subchapter).cloned() else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("no such page: /{chapter}/{subchapter}\n"),
        ));
    };

    if let Some(code) = query.code.as_deref() {
        consume_code(&state, code).await?;
        return Ok(Redirect::to(&sub.route()).into_response());
    }

    let snapshot = {
        let mut store = state.progress.lock().await;
        store
            .ensure_initial_load_timestamp(Utc::now())
            .map_err(internal)?;
        store.mark_read(&sub.alias).map_err(internal)?;
        if let Some(track) = navigation::track_selection_for(
            state.site.catalog(),
            Some(&sub.chapter_alias),
            &store.get(),
        ) {
            store.set_selected_track(&track).map_err(internal)?;
        }
        store.get()
    };

    let site = Arc::clone(&state.site);
    let html =
        render_blocking(move || site.render_subchapter(&sub, &snapshot, Utc::now())).await?;
    Ok(html.into_response())
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    return_to: Option<String>,
    star: Option<String>,
}

async fn github_auth(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> Result<Redirect, ApiError> {
    let config = state.site.config();
    if config.github_oauth_client_id.is_empty() {
        tracing::warn!("LEARNSITE_GITHUB_OAUTH_CLIENT_ID is not set");
    }
    let return_to = local_path(query.return_to.as_deref(), DEFAULT_RETURN_PATH);
    let redirect_uri = widgets::oauth_redirect_uri(config, &return_to).map_err(internal)?;
    let allow_star = query.star.as_deref().is_some_and(|v| !v.is_empty());
    let url = widgets::oauth_authorize_url(config, &redirect_uri, allow_star);
    Ok(Redirect::to(url.as_str()))
}

async fn progress_snapshot(State(state): State<AppState>) -> Json<ProgressState> {
    Json(state.snapshot().await.as_ref().clone())
}

#[derive(Debug, Deserialize)]
struct ReturnForm {
    return_to: Option<String>,
}

async fn skip_auth(
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Result<Redirect, ApiError> {
    state
        .progress
        .lock()
        .await
        .set_skipped_auth(true)
        .map_err(internal)?;

    let return_to = local_path(form.return_to.as_deref(), DEFAULT_RETURN_PATH);
    let path = return_to.split('#').next().unwrap_or(DEFAULT_RETURN_PATH);
    Ok(Redirect::to(&format!(
        "{path}#{}",
        widgets::ENDPOINT_ANCHOR
    )))
}

#[derive(Debug, Deserialize)]
struct TrackForm {
    alias: String,
}

async fn select_track(
    State(state): State<AppState>,
    Form(form): Form<TrackForm>,
) -> Result<Redirect, ApiError> {
    let Some(track) = navigation::validate_track(state.site.catalog(), form.alias.trim()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("not a track: {}\n", form.alias),
        ));
    };
    state
        .progress
        .lock()
        .await
        .set_selected_track(&track.alias)
        .map_err(internal)?;
    Ok(Redirect::to(&track.route()))
}

#[derive(Debug, Deserialize)]
struct InviteForm {
    email: String,
    return_to: Option<String>,
}

async fn send_invite(
    State(state): State<AppState>,
    Form(form): Form<InviteForm>,
) -> Result<Redirect, ApiError> {
    let email = form.email.trim();
    if email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "email is required\n".to_string()));
    }
    state.remote.invite(email).await.map_err(upstream)?;
    Ok(Redirect::to(&local_path(
        form.return_to.as_deref(),
        DEFAULT_RETURN_PATH,
    )))
}

async fn claimed_endpoint(state: &AppState) -> Result<Url, ApiError> {
    let snapshot = state.snapshot().await;
    let Some(project_id) = snapshot.project_id() else {
        return Err((
            StatusCode::CONFLICT,
            "no GraphQL endpoint claimed yet\n".to_string(),
        ));
    };
    state
        .site
        .config()
        .project_endpoint(project_id)
        .map_err(internal)
}

async fn console(
    State(state): State<AppState>,
    Json(request): Json<GraphqlRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let endpoint = claimed_endpoint(&state).await?;
    let response = state
        .remote
        .graphql(&endpoint, &request)
        .await
        .map_err(upstream)?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct RecordInput {
    name: String,
    url: String,
}

async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<BrowserRecord>>, ApiError> {
    let endpoint = claimed_endpoint(&state).await?;
    let records = DataBrowser::new(state.remote.as_ref(), endpoint)
        .list_records()
        .await
        .map_err(upstream)?;
    Ok(Json(records))
}

async fn create_record(
    State(state): State<AppState>,
    Json(input): Json<RecordInput>,
) -> Result<(StatusCode, Json<BrowserRecord>), ApiError> {
    let endpoint = claimed_endpoint(&state).await?;
    let record = DataBrowser::new(state.remote.as_ref(), endpoint)
        .create_record(&input.name, &input.url)
        .await
        .map_err(upstream)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<RecordInput>,
) -> Result<Json<BrowserRecord>, ApiError> {
    let endpoint = claimed_endpoint(&state).await?;
    let record = DataBrowser::new(state.remote.as_ref(), endpoint)
        .update_record(&id, &input.name, &input.url)
        .await
        .map_err(upstream)?;
    Ok(Json(record))
}

async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let endpoint = claimed_endpoint(&state).await?;
    let deleted = DataBrowser::new(state.remote.as_ref(), endpoint)
        .delete_record(&id)
        .await
        .map_err(upstream)?;
    Ok(Json(serde_json::json!({ "id": deleted })))
}
