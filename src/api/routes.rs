//! REST route handlers
//!
//! Handlers read through the cache first and fall back to the content store.
//! Content store errors never reach the client: they are logged and treated
//! as "not found".

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{Claim, ModsCache};
use crate::content::is_valid_mod_id;
use crate::jobs::CacheCoordinator;

use super::protocol::{
    parse_cache_status_request, AssetListing, CacheStatusView, Envelope, HealthResponse,
    NOT_CACHED_ERROR,
};

/// 1x1 transparent PNG served when a mod has no thumbnail
pub const PLACEHOLDER_IMAGE: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const CACHE_CONTROL_PUBLIC: &str = "public, max-age=3600";

const MOD_NOT_FOUND: &str = "Mod not found";

/// Application state shared across handlers
pub struct AppState {
    pub coordinator: CacheCoordinator,
    /// Repository directory that is enumerated for mod ids
    pub mods_path: String,
    /// Mod ids enumerated from the content store; None until a listing succeeds
    mod_ids: RwLock<Option<Vec<String>>>,
}

impl AppState {
    pub fn new(coordinator: CacheCoordinator, mods_path: impl Into<String>) -> Self {
        Self {
            coordinator,
            mods_path: mods_path.into(),
            mod_ids: RwLock::new(None),
        }
    }

    fn cache(&self) -> &ModsCache {
        self.coordinator.cache()
    }

    /// Enumerate mod ids from the content store and remember them
    pub async fn load_mod_ids(&self) -> Option<Vec<String>> {
        match self.coordinator.store().list_directories(&self.mods_path).await {
            Ok(ids) => {
                info!(count = ids.len(), "Loaded mod list");
                *self.mod_ids.write().await = Some(ids.clone());
                Some(ids)
            }
            Err(e) => {
                warn!(error = %e, path = %self.mods_path, "Failed to list mods");
                None
            }
        }
    }

    /// Cache state of one mod: entry first, then task
    fn status_view(&self, mod_id: &str) -> CacheStatusView {
        if let Some(entry) = self.cache().get(mod_id) {
            return CacheStatusView::from_entry(mod_id, &entry);
        }
        match self.cache().get_cache_task(mod_id) {
            Some(task) => CacheStatusView::from_task(&task),
            None => CacheStatusView::not_cached(mod_id),
        }
    }
}

/// Build the `/mods` and `/health` routes
pub fn routes() -> Router<Arc<AppState>> {
    let mods = Router::new()
        .route("/", get(list_mods))
        .route("/cache-status", post(batch_cache_status))
        .route("/:id", get(get_mod))
        .route("/:id/image", get(get_mod_image))
        .route("/:id/cache", post(cache_mod))
        .route("/:id/cache-status", get(cache_status))
        .route("/:id/assets", get(list_assets))
        .route("/:id/assets/*path", get(download_asset));

    Router::new()
        .nest("/mods", mods)
        .route("/health", get(health))
}

fn failure(status: StatusCode, error: &str) -> Response {
    (status, Json(Envelope::failure(error))).into_response()
}

/// 404 for ids that cannot name a mod directory
fn reject_mod_id(id: &str) -> Option<Response> {
    if is_valid_mod_id(id) {
        return None;
    }
    warn!(mod_id = %id, "Rejected invalid mod id");
    Some(failure(StatusCode::NOT_FOUND, MOD_NOT_FOUND))
}

async fn list_mods(State(state): State<Arc<AppState>>) -> Response {
    if let Some(ids) = state.mod_ids.read().await.clone() {
        return Json(Envelope::ok(ids)).into_response();
    }

    match state.load_mod_ids().await {
        Some(ids) => Json(Envelope::ok(ids)).into_response(),
        None => failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch mods list"),
    }
}

async fn get_mod(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Some(rejected) = reject_mod_id(&id) {
        return rejected;
    }
    if let Some(entry) = state.cache().get(&id) {
        return Json(Envelope::ok(entry.info.clone())).into_response();
    }

    match state.coordinator.store().get_metadata(&id).await {
        Ok(Some(info)) => Json(Envelope::ok(info)).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, MOD_NOT_FOUND),
        Err(e) => {
            warn!(mod_id = %id, error = %e, "Failed to fetch mod info");
            failure(StatusCode::NOT_FOUND, MOD_NOT_FOUND)
        }
    }
}

async fn get_mod_image(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Some(rejected) = reject_mod_id(&id) {
        return rejected;
    }
    let image = match state.cache().get(&id) {
        Some(entry) => entry.image.clone(),
        None => match state.coordinator.store().get_image(&id).await {
            Ok(image) => image,
            Err(e) => {
                warn!(mod_id = %id, error = %e, "Failed to fetch mod image");
                None
            }
        },
    };

    let body = image.unwrap_or_else(|| {
        debug!(mod_id = %id, "Serving placeholder image");
        PLACEHOLDER_IMAGE.to_vec()
    });

    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, CACHE_CONTROL_PUBLIC),
        ],
        body,
    )
        .into_response()
}

async fn cache_mod(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Some(rejected) = reject_mod_id(&id) {
        return rejected;
    }
    let (message, view) = match state.coordinator.trigger(&id) {
        Claim::Cached(entry) => ("Mod already cached", CacheStatusView::from_entry(&id, &entry)),
        Claim::InFlight(task) => ("Mod is already being cached", CacheStatusView::from_task(&task)),
        Claim::Started(task) => ("Caching started", CacheStatusView::from_task(&task)),
    };
    Json(Envelope::ok_with_message(message, view)).into_response()
}

async fn cache_status(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Some(rejected) = reject_mod_id(&id) {
        return rejected;
    }
    Json(Envelope::ok(state.status_view(&id))).into_response()
}

async fn batch_cache_status(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let Some(request) = parse_cache_status_request(&body) else {
        return failure(StatusCode::BAD_REQUEST, "modIds must be an array");
    };

    let statuses: Vec<CacheStatusView> = request
        .mod_ids
        .iter()
        .map(|id| state.status_view(id))
        .collect();
    Json(Envelope::ok(statuses)).into_response()
}

async fn list_assets(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    if let Some(rejected) = reject_mod_id(&id) {
        return rejected;
    }
    match state.cache().get(&id) {
        Some(entry) => Json(Envelope::ok(AssetListing::from_entry(&id, &entry))).into_response(),
        None => failure(StatusCode::NOT_FOUND, NOT_CACHED_ERROR),
    }
}

async fn download_asset(
    State(state): State<Arc<AppState>>,
    Path((id, path)): Path<(String, String)>,
) -> Response {
    if let Some(rejected) = reject_mod_id(&id) {
        return rejected;
    }
    let Some(entry) = state.cache().get(&id) else {
        return failure(StatusCode::NOT_FOUND, NOT_CACHED_ERROR);
    };

    let path = path.trim_start_matches('/');
    let Some(bytes) = entry.assets.get(path) else {
        return failure(StatusCode::NOT_FOUND, "Asset not found");
    };

    let basename = path.rsplit('/').next().unwrap_or(path).replace('"', "");
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", basename),
            ),
            (header::CACHE_CONTROL, CACHE_CONTROL_PUBLIC.to_string()),
        ],
        bytes.clone(),
    )
        .into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Marketplace API is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::build_router;
    use crate::cache::TaskStatus;
    use crate::content::memory::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    fn test_state(store: MemoryStore) -> Arc<AppState> {
        test_state_with(Arc::new(store))
    }

    fn test_state_with(store: Arc<MemoryStore>) -> Arc<AppState> {
        let cache = Arc::new(ModsCache::new(Duration::from_secs(3600)));
        let coordinator = CacheCoordinator::new(cache, store, Duration::from_secs(30));
        Arc::new(AppState::new(coordinator, "mods"))
    }

    fn sample_store() -> MemoryStore {
        MemoryStore::new()
            .with_mod("mod-a", Some(vec![1, 2, 3]), &[("a.txt", b"hello"), ("ui/b.png", b"png!")])
            .with_mod("mod-b", None, &[("only.bin", b"x")])
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> Response {
        build_router(Arc::clone(state)).oneshot(request).await.unwrap()
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> Response {
        send(state, Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(state: &Arc<AppState>, uri: &str, body: &str) -> Response {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(state, request).await
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn wait_until_cached(state: &Arc<AppState>, mod_id: &str) {
        for _ in 0..200 {
            if state.cache().is_cached(mod_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} was never cached", mod_id);
    }

    #[tokio::test]
    async fn test_health() {
        let state = test_state(MemoryStore::new());
        let response = get(&state, "/api/v1/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Marketplace API is running");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_list_mods() {
        let state = test_state(sample_store());
        state.load_mod_ids().await;

        let json = body_json(get(&state, "/api/v1/mods").await).await;
        assert_eq!(json, json!({"success": true, "data": ["mod-a", "mod-b"]}));
    }

    #[tokio::test]
    async fn test_list_mods_upstream_failure() {
        let state = test_state(MemoryStore::new().listing_fails());
        assert!(state.load_mod_ids().await.is_none());

        let response = get(&state, "/api/v1/mods").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json, json!({"success": false, "error": "Failed to fetch mods list"}));
    }

    #[tokio::test]
    async fn test_get_mod() {
        let state = test_state(sample_store());

        let json = body_json(get(&state, "/api/v1/mods/mod-a").await).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], "mod-a");
        assert_eq!(json["data"]["clientVersionUpload"], "version-0123456789abcdef");

        let response = get(&state, "/api/v1/mods/nope").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json, json!({"success": false, "error": "Mod not found"}));
    }

    #[tokio::test]
    async fn test_get_mod_upstream_error_is_not_found() {
        let state = test_state(sample_store().failing("timed out"));
        let response = get(&state, "/api/v1/mods/mod-a").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mod_image_and_placeholder() {
        let state = test_state(sample_store());

        let response = get(&state, "/api/v1/mods/mod-a/image").await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(body_bytes(response).await, vec![1, 2, 3]);

        let response = get(&state, "/api/v1/mods/mod-b/image").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, PLACEHOLDER_IMAGE);
    }

    #[tokio::test]
    async fn test_cache_flow() {
        let state = test_state(sample_store());

        let json = body_json(post(&state, "/api/v1/mods/mod-a/cache", "").await).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Caching started");
        assert_eq!(json["data"]["modId"], "mod-a");
        assert_eq!(json["data"]["status"], "pending");
        assert_eq!(json["data"]["cached"], false);
        assert!(json["data"]["startedAt"].is_u64());

        wait_until_cached(&state, "mod-a").await;

        let json = body_json(get(&state, "/api/v1/mods/mod-a/cache-status").await).await;
        assert_eq!(json["data"]["status"], "completed");
        assert_eq!(json["data"]["cached"], true);
        assert_eq!(json["data"]["assetsCount"], 2);

        let json = body_json(post(&state, "/api/v1/mods/mod-a/cache", "").await).await;
        assert_eq!(json["message"], "Mod already cached");
        assert_eq!(json["data"]["cached"], true);
        assert_eq!(json["data"]["assetsCount"], 2);
        assert!(json["data"]["cachedAt"].is_u64());
    }

    #[tokio::test]
    async fn test_cache_in_flight_returns_existing_task() {
        let gate = Arc::new(Semaphore::new(0));
        let state = test_state(sample_store().gated(gate.clone()));

        let first = body_json(post(&state, "/api/v1/mods/mod-a/cache", "").await).await;
        while !state.cache().is_being_cached("mod-a") {
            tokio::task::yield_now().await;
        }

        let second = body_json(post(&state, "/api/v1/mods/mod-a/cache", "").await).await;
        assert_eq!(second["message"], "Mod is already being cached");
        assert_eq!(second["data"]["status"], "in_progress");
        assert_eq!(second["data"]["startedAt"], first["data"]["startedAt"]);

        gate.add_permits(1);
        wait_until_cached(&state, "mod-a").await;
    }

    #[tokio::test]
    async fn test_cache_status_failed_and_unknown() {
        let state = test_state(sample_store());

        let json = body_json(get(&state, "/api/v1/mods/mod-z/cache-status").await).await;
        assert_eq!(json["data"], json!({"modId": "mod-z", "status": "not_cached", "cached": false}));

        post(&state, "/api/v1/mods/mod-z/cache", "").await;
        for _ in 0..200 {
            let done = state
                .cache()
                .get_cache_task("mod-z")
                .is_some_and(|t| t.status == TaskStatus::Failed);
            if done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let json = body_json(get(&state, "/api/v1/mods/mod-z/cache-status").await).await;
        assert_eq!(json["data"]["status"], "failed");
        assert_eq!(json["data"]["cached"], false);
        assert_eq!(json["data"]["error"], "Mod not found");
    }

    #[tokio::test]
    async fn test_batch_cache_status() {
        let state = test_state(sample_store());
        post(&state, "/api/v1/mods/mod-b/cache", "").await;
        wait_until_cached(&state, "mod-b").await;

        let response = post(&state, "/api/v1/mods/cache-status", r#"{"modIds":["mod-a","mod-b"]}"#).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["modId"], "mod-a");
        assert_eq!(data[0]["cached"], false);
        assert_eq!(data[1]["cached"], true);
        assert_eq!(data[1]["assetsCount"], 1);
    }

    #[tokio::test]
    async fn test_batch_cache_status_rejects_bad_body() {
        let state = test_state(sample_store());
        for body in [r#"{"modIds":"mod-a"}"#, "{}", "garbage"] {
            let response = post(&state, "/api/v1/mods/cache-status", body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = body_json(response).await;
            assert_eq!(json, json!({"success": false, "error": "modIds must be an array"}));
        }
    }

    #[tokio::test]
    async fn test_traversal_mod_ids_are_rejected() {
        let store = Arc::new(sample_store());
        let state = test_state_with(Arc::clone(&store));

        let response = post(&state, "/api/v1/mods/..%2F..%2Fother%2Fcontents/cache", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json, json!({"success": false, "error": "Mod not found"}));
        assert!(state.cache().get_cache_task("../../other/contents").is_none());

        for uri in [
            "/api/v1/mods/..",
            "/api/v1/mods/..%2Fsecret/image",
            "/api/v1/mods/a%5Cb/cache-status",
            "/api/v1/mods/..%2Fx/assets",
            "/api/v1/mods/..%2Fx/assets/a.txt",
        ] {
            let response = get(&state, uri).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
        assert_eq!(store.metadata_calls(), 0);
    }

    #[tokio::test]
    async fn test_assets_require_cache() {
        let state = test_state(sample_store());

        let response = get(&state, "/api/v1/mods/mod-a/assets").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"], NOT_CACHED_ERROR);

        let response = get(&state, "/api/v1/mods/mod-a/assets/a.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_assets_listing_and_download() {
        let state = test_state(sample_store());
        post(&state, "/api/v1/mods/mod-a/cache", "").await;
        wait_until_cached(&state, "mod-a").await;

        let json = body_json(get(&state, "/api/v1/mods/mod-a/assets").await).await;
        assert_eq!(json["data"]["totalAssets"], 2);
        assert_eq!(json["data"]["assets"][0], json!({"filename": "a.txt", "size": 5}));
        assert_eq!(json["data"]["assets"][1], json!({"filename": "ui/b.png", "size": 4}));

        let response = get(&state, "/api/v1/mods/mod-a/assets/ui/b.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"b.png\""
        );
        assert_eq!(body_bytes(response).await, b"png!");

        let response = get(&state, "/api/v1/mods/mod-a/assets/missing.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json, json!({"success": false, "error": "Asset not found"}));
    }
}
