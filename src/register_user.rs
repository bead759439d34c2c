//! Endpoints for registering users and fetching their profiles.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    db::lock_connection,
    user::{User, UserID, create_user, get_user_by_id},
};

/// The state needed to register and look up users.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The database connection for managing users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The JSON body for registering a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// The name to display for the user.
    pub name: String,
    /// The user's canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// Omit it to use the server's timezone.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// A route handler for creating a new user with an empty ledger, responds
/// with the user and `201 Created`.
pub async fn register_user(
    State(state): State<RegistrationState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), Error> {
    let connection = lock_connection(&state.db_connection)?;

    let user = create_user(&request.name, request.timezone.as_deref(), &connection)?;
    tracing::info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(user)))
}

/// A route handler for fetching a user's profile, including their balance.
pub async fn get_user_endpoint(
    State(state): State<RegistrationState>,
    Path(user_id): Path<UserID>,
) -> Result<Json<User>, Error> {
    let connection = lock_connection(&state.db_connection)?;

    get_user_by_id(user_id, &connection).map(Json)
}
