//! Staff account administration plus the `me` and username-availability
//! endpoints. Deleting a user archives the account.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::guard::CurrentUser;
use crate::security::password::hash_password;
use crate::shared::error::ApiError;
use crate::shared::models::{status, User, UserResponse};
use crate::shared::pagination::{page_params, Paginated};
use crate::shared::schema::users;
use crate::shared::state::AppState;
use crate::shared::utils::db_conn;

const DEFAULT_PAGE_SIZE: i64 = 25;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/me", get(me))
        .route("/api/users/check-username", get(check_username))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(archive_user),
        )
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub q: Option<String>,
    /// Comma-separated role filter, e.g. `admin,department_staff`.
    #[serde(rename = "userRoles")]
    pub user_roles: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub rfid_number: String,
    pub firstname: String,
    pub lastname: String,
    pub sex: String,
    pub birthdate: NaiveDate,
    pub email: String,
    #[serde(default)]
    pub contact_number: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub rfid_number: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub sex: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
    pub avatar: Option<String>,
}

/// Changeset applied to the row; the password here is already hashed.
#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct UserChangeset {
    rfid_number: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    sex: Option<String>,
    birthdate: Option<NaiveDate>,
    email: Option<String>,
    contact_number: Option<String>,
    username: Option<String>,
    password: Option<String>,
    role: Option<String>,
    department_id: Option<Uuid>,
    status: Option<String>,
    avatar: Option<String>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Paginated<UserResponse>>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let (page, size, offset) = page_params(query.page, query.size, DEFAULT_PAGE_SIZE);

    let mut filtered = users::table.into_boxed();
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        filtered = filtered.filter(
            users::firstname
                .ilike(pattern.clone())
                .or(users::lastname.ilike(pattern.clone()))
                .or(users::username.ilike(pattern)),
        );
    }
    if let Some(roles) = query.user_roles.as_deref().filter(|r| !r.is_empty()) {
        let roles: Vec<String> = roles
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        filtered = filtered.filter(users::role.eq_any(roles));
    }

    let rows: Vec<User> = filtered
        .order(users::lastname.asc())
        .limit(size)
        .offset(offset)
        .load(&mut conn)?;
    let count: i64 = users::table.count().get_result(&mut conn)?;

    Ok(Json(Paginated {
        data: rows.into_iter().map(UserResponse::from).collect(),
        count,
        page,
        size,
    }))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "Username and password are required".into(),
        ));
    }

    let mut conn = db_conn(&state.conn)?;

    let taken: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::username.eq(&payload.username)),
    ))
    .get_result(&mut conn)?;
    if taken {
        return Err(ApiError::BadRequest("Username is already taken".into()));
    }

    let password = hash_password(&payload.password)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        rfid_number: payload.rfid_number,
        firstname: payload.firstname,
        lastname: payload.lastname,
        sex: payload.sex,
        birthdate: payload.birthdate,
        email: payload.email,
        contact_number: payload.contact_number,
        username: payload.username,
        password,
        role: payload.role,
        department_id: payload.department_id,
        status: payload.status.unwrap_or_else(|| status::ACTIVE.to_string()),
        avatar: payload.avatar,
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(users::table)
        .values(&user)
        .execute(&mut conn)?;
    info!(user_id = %user.id, "user {} created", user.username);
    Ok(Json(user.into()))
}

async fn me(
    State(state): State<Arc<AppState>>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let user: User = users::table.find(identity.user_id).first(&mut conn)?;
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CheckUsernameResponse {
    pub exists: bool,
}

async fn check_username(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckUsernameQuery>,
) -> Result<Json<CheckUsernameResponse>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let exists: bool = diesel::select(diesel::dsl::exists(
        users::table.filter(users::username.eq(&query.username)),
    ))
    .get_result(&mut conn)?;
    Ok(Json(CheckUsernameResponse { exists }))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let user: User = users::table.find(id).first(&mut conn)?;
    Ok(Json(user.into()))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let password = match payload.password.as_deref().filter(|p| !p.is_empty()) {
        Some(plain) => {
            Some(hash_password(plain).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        None => None,
    };

    let changeset = UserChangeset {
        rfid_number: payload.rfid_number,
        firstname: payload.firstname,
        lastname: payload.lastname,
        sex: payload.sex,
        birthdate: payload.birthdate,
        email: payload.email,
        contact_number: payload.contact_number,
        username: payload.username,
        password,
        role: payload.role,
        department_id: payload.department_id,
        status: payload.status,
        avatar: payload.avatar,
    };

    let mut conn = db_conn(&state.conn)?;
    let user: User = diesel::update(users::table.find(id))
        .set((&changeset, users::updated_at.eq(Utc::now())))
        .get_result(&mut conn)?;
    Ok(Json(user.into()))
}

/// Soft delete. The account can no longer log in but stays referencable
/// from tickets and audit rows.
async fn archive_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let user: User = diesel::update(users::table.find(id))
        .set((
            users::status.eq(status::ARCHIVED),
            users::updated_at.eq(Utc::now()),
        ))
        .get_result(&mut conn)?;

    // A disabled account should not keep live sessions.
    state
        .sessions
        .revoke_all_for_user(id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(user_id = %id, "user archived");
    Ok(Json(user.into()))
}
