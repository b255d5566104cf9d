use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const COLLECTION_PATH: &str = "/api/v1/packer/build-configurations";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    pub username: String,
    pub name: String,
}

#[derive(Deserialize, Serialize)]
pub struct CreateEnvelope {
    pub build_configuration: BuildConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize)]
pub struct VersionEnvelope {
    pub version: VersionBody,
}

#[derive(Deserialize)]
pub struct VersionBody {
    pub builds: Vec<Build>,
}

#[derive(Serialize, Deserialize)]
pub struct UploadTarget {
    pub upload_path: String,
}

/// A version record. `payload` stays `None` until its upload arrives.
#[derive(Clone, Debug)]
pub struct Version {
    pub number: u64,
    pub builds: Vec<Build>,
    pub token: Uuid,
    pub payload: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct Store {
    configs: HashMap<(String, String), Vec<Version>>,
    // upload token -> owning config
    uploads: HashMap<Uuid, (String, String)>,
}

/// Shared server state. `public_base` prefixes every issued upload path.
#[derive(Clone)]
pub struct AppState {
    public_base: Arc<str>,
    store: Arc<RwLock<Store>>,
}

impl AppState {
    pub fn new(public_base: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').into(),
            store: Arc::new(RwLock::new(Store::default())),
        }
    }

    /// Versions recorded for a config, or `None` if the config is unknown.
    pub async fn versions(&self, user: &str, name: &str) -> Option<Vec<Version>> {
        let store = self.store.read().await;
        store.configs.get(&(user.to_string(), name.to_string())).cloned()
    }

    /// Payload uploaded for version `number` (1-based) of a config.
    pub async fn payload(&self, user: &str, name: &str, number: u64) -> Option<Vec<u8>> {
        let store = self.store.read().await;
        store
            .configs
            .get(&(user.to_string(), name.to_string()))?
            .iter()
            .find(|v| v.number == number)?
            .payload
            .clone()
    }
}

type Reply<T> = Result<T, (StatusCode, Json<Value>)>;

fn failure(status: StatusCode, errors: Value) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "errors": errors })))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route(COLLECTION_PATH, post(create_config))
        .route(&format!("{COLLECTION_PATH}/{{user}}/{{name}}"), get(get_config))
        .route(&format!("{COLLECTION_PATH}/{{user}}/{{name}}/versions"), post(create_version))
        .route("/uploads/{token}", put(upload).layer(DefaultBodyLimit::disable()))
        .with_state(state)
}

/// Serve on `listener`, issuing upload paths under the listener's own address.
pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    let state = AppState::new(&format!("http://{}", listener.local_addr()?));
    run_with_state(listener, state).await
}

pub async fn run_with_state(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn get_config(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
) -> Reply<Json<BuildConfig>> {
    let store = state.store.read().await;
    if !store.configs.contains_key(&(user.clone(), name.clone())) {
        return Err(failure(StatusCode::NOT_FOUND, json!(["build configuration not found"])));
    }
    Ok(Json(BuildConfig { username: user, name }))
}

async fn create_config(
    State(state): State<AppState>,
    Json(input): Json<CreateEnvelope>,
) -> Reply<(StatusCode, Json<CreateEnvelope>)> {
    let config = input.build_configuration;
    let key = (config.username.clone(), config.name.clone());
    let mut store = state.store.write().await;
    if store.configs.contains_key(&key) {
        return Err(failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "name": ["has already been taken"] }),
        ));
    }
    store.configs.insert(key, Vec::new());
    tracing::info!(user = %config.username, name = %config.name, "created build configuration");
    Ok((
        StatusCode::CREATED,
        Json(CreateEnvelope {
            build_configuration: config,
        }),
    ))
}

async fn create_version(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
    Json(input): Json<VersionEnvelope>,
) -> Reply<Json<UploadTarget>> {
    let mut store = state.store.write().await;
    let key = (user, name);
    let versions = store
        .configs
        .get_mut(&key)
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, json!(["build configuration not found"])))?;

    let token = Uuid::new_v4();
    let number = versions.len() as u64 + 1;
    versions.push(Version {
        number,
        builds: input.version.builds,
        token,
        payload: None,
    });
    tracing::info!(user = %key.0, name = %key.1, number, "created version");
    store.uploads.insert(token, key);

    Ok(Json(UploadTarget {
        upload_path: format!("{}/uploads/{token}", state.public_base),
    }))
}

async fn upload(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let mut store = state.store.write().await;
    let key = store.uploads.get(&token).cloned().ok_or(StatusCode::NOT_FOUND)?;
    let version = store
        .configs
        .get_mut(&key)
        .and_then(|versions| versions.iter_mut().find(|v| v.token == token))
        .ok_or(StatusCode::NOT_FOUND)?;
    if version.payload.is_some() {
        return Err(StatusCode::CONFLICT);
    }
    tracing::debug!(%token, size = body.len(), "stored payload");
    version.payload = Some(body.to_vec());
    Ok(StatusCode::OK)
}
