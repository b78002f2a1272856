//! Application handlers served behind the pipeline.
//!
//! Handlers only run for requests every stage admitted, so they read the
//! caller's identity rather than checking credentials themselves.

use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::GatekeeperConfig;
use crate::http::response::ApiError;
use crate::identity::Identity;
use crate::routing::RouteTable;
use crate::security::Access;

const MAX_TITLE_BYTES: usize = 500;

/// Static facts reported by the healthcheck.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub environment: String,
    pub version: &'static str,
}

impl SystemInfo {
    pub fn from_config(config: &GatekeeperConfig) -> Self {
        Self {
            environment: config.listener.environment.clone(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub year: i32,
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewMovie {
    title: String,
    #[serde(default)]
    year: i32,
    #[serde(default)]
    genres: Vec<String>,
}

/// In-memory movie list backing the demo routes.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    movies: Arc<RwLock<Vec<Movie>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self) -> Vec<Movie> {
        self.movies.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn add(&self, new: NewMovie) -> Movie {
        let mut movies = self.movies.write().unwrap_or_else(PoisonError::into_inner);
        let movie = Movie {
            id: movies.len() as i64 + 1,
            title: new.title,
            year: new.year,
            genres: new.genres,
        };
        movies.push(movie.clone());
        movie
    }
}

/// Register the application routes with their access levels.
pub fn register(table: RouteTable, info: SystemInfo, catalog: Catalog) -> RouteTable {
    table
        .route("/v1/healthcheck", get(healthcheck).with_state(info), Access::Public)
        .route("/v1/users/me", get(current_user), Access::Activated)
        .route(
            "/v1/movies",
            get(list_movies).with_state(catalog.clone()),
            Access::permission("movies:read"),
        )
        .route(
            "/v1/movies",
            post(create_movie).with_state(catalog),
            Access::permission("movies:write"),
        )
}

/// Convenience for tests and embedding: the application routes as a router.
pub fn router(table: RouteTable, info: SystemInfo) -> Router {
    register(table, info, Catalog::new()).into_router()
}

async fn healthcheck(State(info): State<SystemInfo>) -> Json<Value> {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": info.environment,
            "version": info.version,
        }
    }))
}

/// Behind an `Access::Activated` guard, so an identity is always attached.
async fn current_user(identity: Identity) -> Result<Json<Value>, ApiError> {
    let user = identity
        .user()
        .ok_or_else(|| ApiError::server_error("current user route reached without an identity"))?;
    Ok(Json(json!({ "user": user })))
}

async fn list_movies(State(catalog): State<Catalog>) -> Json<Value> {
    Json(json!({ "movies": catalog.list() }))
}

async fn create_movie(
    State(catalog): State<Catalog>,
    payload: Result<Json<NewMovie>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(new) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let title = new.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must be provided".into()));
    }
    if title.len() > MAX_TITLE_BYTES {
        return Err(ApiError::BadRequest(format!(
            "title must not be more than {MAX_TITLE_BYTES} bytes long"
        )));
    }

    let movie = catalog.add(NewMovie {
        title: title.to_owned(),
        ..new
    });
    tracing::debug!(movie_id = movie.id, "Movie created");
    Ok((StatusCode::CREATED, Json(json!({ "movie": movie }))))
}
