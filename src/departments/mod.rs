//! Department administration. Deleting a department archives it; ticket and
//! user references stay intact.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::shared::error::ApiError;
use crate::shared::models::{status, Department};
use crate::shared::pagination::{page_params, Paginated};
use crate::shared::schema::departments;
use crate::shared::state::AppState;
use crate::shared::utils::db_conn;

const DEFAULT_PAGE_SIZE: i64 = 20;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/departments", get(list_departments).post(create_department))
        .route(
            "/api/departments/:id",
            get(get_department)
                .put(update_department)
                .delete(archive_department),
        )
}

#[derive(Debug, Deserialize)]
pub struct DepartmentListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub abbv: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub avatar: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, AsChangeset)]
#[diesel(table_name = departments)]
pub struct UpdateDepartmentRequest {
    pub name: Option<String>,
    pub abbv: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub avatar: Option<String>,
    pub status: Option<String>,
}

async fn list_departments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DepartmentListQuery>,
) -> Result<Json<Paginated<Department>>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let (page, size, offset) = page_params(query.page, query.size, DEFAULT_PAGE_SIZE);

    let mut filtered = departments::table.into_boxed();
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        filtered = filtered.filter(
            departments::name
                .ilike(pattern.clone())
                .or(departments::abbv.ilike(pattern)),
        );
    }

    let data: Vec<Department> = filtered
        .order(departments::name.asc())
        .limit(size)
        .offset(offset)
        .load(&mut conn)?;
    let count: i64 = departments::table.count().get_result(&mut conn)?;

    Ok(Json(Paginated {
        data,
        count,
        page,
        size,
    }))
}

async fn create_department(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    if payload.name.trim().is_empty() || payload.abbv.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Department name and abbreviation are required".into(),
        ));
    }

    let mut conn = db_conn(&state.conn)?;
    let now = Utc::now();
    let department = Department {
        id: Uuid::new_v4(),
        name: payload.name,
        abbv: payload.abbv,
        description: payload.description,
        keywords: payload.keywords,
        avatar: payload.avatar,
        status: payload.status.unwrap_or_else(|| status::ACTIVE.to_string()),
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(departments::table)
        .values(&department)
        .execute(&mut conn)?;
    info!(abbv = %department.abbv, "department created");
    Ok(Json(department))
}

async fn get_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let department: Department = departments::table.find(id).first(&mut conn)?;
    Ok(Json(department))
}

async fn update_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDepartmentRequest>,
) -> Result<Json<Department>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let department: Department = diesel::update(departments::table.find(id))
        .set((&payload, departments::updated_at.eq(Utc::now())))
        .get_result(&mut conn)?;
    Ok(Json(department))
}

/// Soft delete: flips the row to `archived` so historical tickets keep a
/// resolvable department.
async fn archive_department(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Department>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let department: Department = diesel::update(departments::table.find(id))
        .set((
            departments::status.eq(status::ARCHIVED),
            departments::updated_at.eq(Utc::now()),
        ))
        .get_result(&mut conn)?;
    info!(abbv = %department.abbv, "department archived");
    Ok(Json(department))
}
