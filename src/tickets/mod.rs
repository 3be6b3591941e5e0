//! Ticket CRUD, triage and the audit trail, plus ticket categories.
//!
//! Every assignment or state transition made through `PUT /api/tickets/:id`
//! is mirrored into `ticket_updates` so the history view can replay how a
//! ticket moved through the helpdesk.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::guard::CurrentUser;
use crate::shared::error::ApiError;
use crate::shared::models::{update_kind, Ticket, TicketCategory, TicketFile, TicketUpdate};
use crate::shared::pagination::{page_params, Paginated};
use crate::shared::schema::{departments, files, ticket_categories, ticket_updates, tickets, users};
use crate::shared::state::AppState;
use crate::shared::utils::{db_conn, DbConn};

const DEFAULT_PAGE_SIZE: i64 = 20;
const CATEGORY_PAGE_SIZE: i64 = 15;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route(
            "/api/tickets/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/api/tickets/categories/:id",
            get(get_category).put(update_category),
        )
        .route("/api/tickets/updates", get(list_updates).post(create_update))
        .route(
            "/api/tickets/:id",
            get(get_ticket).put(update_ticket).delete(delete_ticket),
        )
}

// ---------------------------------------------------------------------------
// Request / response shapes

#[derive(Debug, Deserialize)]
pub struct TicketListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub q: Option<String>,
    #[serde(rename = "departmentAssignedId")]
    pub department_assigned_id: Option<Uuid>,
    #[serde(rename = "userAssignedId")]
    pub user_assigned_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub category_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub current_department_assigned: Option<Uuid>,
    pub current_user_assigned: Option<Uuid>,
    pub reported_by: Option<Uuid>,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct UpdateTicketRequest {
    pub category_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub current_department_assigned: Option<Uuid>,
    pub current_user_assigned: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentSummary {
    pub id: Uuid,
    pub name: String,
    pub abbv: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub firstname: String,
    pub lastname: String,
    pub avatar: Option<String>,
}

/// Ticket row with its foreign keys resolved into display summaries and
/// its attachments inlined.
#[derive(Debug, Serialize)]
pub struct TicketDetail {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub code: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub category: Option<CategorySummary>,
    pub current_department_assigned: Option<DepartmentSummary>,
    pub current_user_assigned: Option<UserSummary>,
    pub reported_by: Option<UserSummary>,
    pub files: Vec<TicketFile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pure helpers

pub fn next_ticket_code(existing: i64) -> String {
    format!("TKT-{}", existing + 1)
}

/// Compares a ticket before and after an edit and emits one audit row per
/// observable transition. Assignments produce a row only when a new target
/// is set, matching how the triage UI reports them.
pub fn derive_update_events(
    before: &Ticket,
    after: &Ticket,
    actor: Uuid,
    now: DateTime<Utc>,
) -> Vec<TicketUpdate> {
    let mut events = Vec::new();
    let mut push = |kind: &str, assigned_id: Option<Uuid>, title: String, message: String| {
        events.push(TicketUpdate {
            id: Uuid::new_v4(),
            ticket_id: after.id,
            assigned_id,
            kind: kind.to_string(),
            title,
            message,
            updated_by: actor,
            updated_at: now,
        });
    };

    if after.current_department_assigned != before.current_department_assigned {
        if let Some(department_id) = after.current_department_assigned {
            push(
                update_kind::DEPARTMENT_ASSIGN,
                Some(department_id),
                "Department assigned".to_string(),
                format!("Ticket {} was routed to a new department", after.code),
            );
        }
    }

    if after.current_user_assigned != before.current_user_assigned {
        if let Some(user_id) = after.current_user_assigned {
            push(
                update_kind::USER_ASSIGN,
                Some(user_id),
                "Agent assigned".to_string(),
                format!("Ticket {} was assigned to an agent", after.code),
            );
        }
    }

    if after.status != before.status {
        push(
            update_kind::STATUS_CHANGE,
            None,
            "Status updated".to_string(),
            format!("Status changed from {} to {}", before.status, after.status),
        );
    }

    if after.priority != before.priority {
        push(
            update_kind::PRIORITY_CHANGE,
            None,
            "Priority updated".to_string(),
            format!(
                "Priority changed from {} to {}",
                before.priority, after.priority
            ),
        );
    }

    events
}

/// Resolves category, department, user and file references for a page of
/// tickets with one batched query per table.
fn hydrate_tickets(
    conn: &mut DbConn,
    rows: Vec<Ticket>,
) -> Result<Vec<TicketDetail>, diesel::result::Error> {
    let ticket_ids: Vec<Uuid> = rows.iter().map(|t| t.id).collect();
    let category_ids: Vec<Uuid> = rows.iter().filter_map(|t| t.category_id).collect();
    let department_ids: Vec<Uuid> = rows
        .iter()
        .filter_map(|t| t.current_department_assigned)
        .collect();
    let user_ids: Vec<Uuid> = rows
        .iter()
        .flat_map(|t| [t.current_user_assigned, t.reported_by])
        .flatten()
        .collect();

    let categories: HashMap<Uuid, CategorySummary> = ticket_categories::table
        .filter(ticket_categories::id.eq_any(&category_ids))
        .select((ticket_categories::id, ticket_categories::name))
        .load::<(Uuid, String)>(conn)?
        .into_iter()
        .map(|(id, name)| (id, CategorySummary { id, name }))
        .collect();

    let department_summaries: HashMap<Uuid, DepartmentSummary> = departments::table
        .filter(departments::id.eq_any(&department_ids))
        .select((departments::id, departments::name, departments::abbv))
        .load::<(Uuid, String, String)>(conn)?
        .into_iter()
        .map(|(id, name, abbv)| (id, DepartmentSummary { id, name, abbv }))
        .collect();

    let user_summaries: HashMap<Uuid, UserSummary> = users::table
        .filter(users::id.eq_any(&user_ids))
        .select((users::id, users::firstname, users::lastname, users::avatar))
        .load::<(Uuid, String, String, Option<String>)>(conn)?
        .into_iter()
        .map(|(id, firstname, lastname, avatar)| {
            (
                id,
                UserSummary {
                    id,
                    firstname,
                    lastname,
                    avatar,
                },
            )
        })
        .collect();

    let mut files_by_ticket: HashMap<Uuid, Vec<TicketFile>> = HashMap::new();
    for file in files::table
        .filter(files::ticket_id.eq_any(&ticket_ids))
        .order(files::created_at.asc())
        .load::<TicketFile>(conn)?
    {
        files_by_ticket.entry(file.ticket_id).or_default().push(file);
    }

    Ok(rows
        .into_iter()
        .map(|ticket| TicketDetail {
            category: ticket
                .category_id
                .and_then(|id| categories.get(&id).cloned()),
            current_department_assigned: ticket
                .current_department_assigned
                .and_then(|id| department_summaries.get(&id).cloned()),
            current_user_assigned: ticket
                .current_user_assigned
                .and_then(|id| user_summaries.get(&id).cloned()),
            reported_by: ticket
                .reported_by
                .and_then(|id| user_summaries.get(&id).cloned()),
            files: files_by_ticket.remove(&ticket.id).unwrap_or_default(),
            id: ticket.id,
            category_id: ticket.category_id,
            code: ticket.code,
            title: ticket.title,
            description: ticket.description,
            priority: ticket.priority,
            status: ticket.status,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        })
        .collect())
}

fn write_audit_events(
    conn: &mut DbConn,
    events: &[TicketUpdate],
) -> Result<(), diesel::result::Error> {
    if events.is_empty() {
        return Ok(());
    }
    diesel::insert_into(ticket_updates::table)
        .values(events)
        .execute(conn)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Ticket handlers

async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicketListQuery>,
) -> Result<Json<Paginated<TicketDetail>>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let (page, size, offset) = page_params(query.page, query.size, DEFAULT_PAGE_SIZE);

    let mut filtered = tickets::table.into_boxed();
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        filtered = filtered.filter(tickets::title.ilike(format!("%{q}%")));
    }
    if let Some(department_id) = query.department_assigned_id {
        filtered = filtered.filter(tickets::current_department_assigned.eq(department_id));
    }
    if let Some(user_id) = query.user_assigned_id {
        filtered = filtered.filter(tickets::current_user_assigned.eq(user_id));
    }

    let rows: Vec<Ticket> = filtered
        .order(tickets::created_at.desc())
        .limit(size)
        .offset(offset)
        .load(&mut conn)?;
    let count: i64 = tickets::table.count().get_result(&mut conn)?;

    let data = hydrate_tickets(&mut conn, rows)?;
    Ok(Json(Paginated {
        data,
        count,
        page,
        size,
    }))
}

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<Json<TicketDetail>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Ticket title is required".into()));
    }

    let mut conn = db_conn(&state.conn)?;
    let existing: i64 = tickets::table.count().get_result(&mut conn)?;
    let now = Utc::now();

    let ticket = Ticket {
        id: Uuid::new_v4(),
        category_id: payload.category_id,
        code: next_ticket_code(existing),
        title: payload.title,
        description: payload.description,
        priority: payload.priority.unwrap_or_else(|| "medium".to_string()),
        status: payload.status.unwrap_or_else(|| "backlog".to_string()),
        current_department_assigned: payload.current_department_assigned,
        current_user_assigned: payload.current_user_assigned,
        reported_by: payload.reported_by.or(Some(actor.user_id)),
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(tickets::table)
        .values(&ticket)
        .execute(&mut conn)?;

    let opened = TicketUpdate {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        assigned_id: None,
        kind: update_kind::CREATE_TICKET.to_string(),
        title: "Ticket created".to_string(),
        message: format!("Ticket {} was created", ticket.code),
        updated_by: actor.user_id,
        updated_at: now,
    };
    write_audit_events(&mut conn, std::slice::from_ref(&opened))?;

    info!(code = %ticket.code, "ticket created by {}", actor.username);
    let mut detail = hydrate_tickets(&mut conn, vec![ticket])?;
    Ok(Json(detail.remove(0)))
}

async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let ticket: Ticket = tickets::table.find(id).first(&mut conn)?;
    let mut detail = hydrate_tickets(&mut conn, vec![ticket])?;
    Ok(Json(detail.remove(0)))
}

async fn update_ticket(
    State(state): State<Arc<AppState>>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTicketRequest>,
) -> Result<Json<TicketDetail>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let now = Utc::now();

    let before: Ticket = tickets::table.find(id).first(&mut conn)?;
    let after: Ticket = diesel::update(tickets::table.find(id))
        .set((&payload, tickets::updated_at.eq(now)))
        .get_result(&mut conn)?;

    let events = derive_update_events(&before, &after, actor.user_id, now);
    write_audit_events(&mut conn, &events)?;
    if !events.is_empty() {
        info!(code = %after.code, "ticket updated with {} audit events", events.len());
    }

    let mut detail = hydrate_tickets(&mut conn, vec![after])?;
    Ok(Json(detail.remove(0)))
}

/// Hard delete. Audit rows and attachments go with the ticket via
/// `ON DELETE CASCADE`.
async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let deleted = diesel::delete(tickets::table.find(id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Ticket not found"));
    }
    info!(%id, "ticket deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

// ---------------------------------------------------------------------------
// Category handlers

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, AsChangeset)]
#[diesel(table_name = ticket_categories)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub department_id: Option<Uuid>,
    pub status: Option<String>,
}

async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<Paginated<TicketCategory>>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let (page, size, offset) = page_params(query.page, query.size, CATEGORY_PAGE_SIZE);

    let mut filtered = ticket_categories::table.into_boxed();
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        filtered = filtered.filter(ticket_categories::name.ilike(format!("%{q}%")));
    }

    let data: Vec<TicketCategory> = filtered
        .order(ticket_categories::name.asc())
        .limit(size)
        .offset(offset)
        .load(&mut conn)?;
    let count: i64 = ticket_categories::table.count().get_result(&mut conn)?;

    Ok(Json(Paginated {
        data,
        count,
        page,
        size,
    }))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Json<TicketCategory>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Category name is required".into()));
    }

    let mut conn = db_conn(&state.conn)?;
    let now = Utc::now();
    let category = TicketCategory {
        id: Uuid::new_v4(),
        name: payload.name,
        department_id: payload.department_id,
        status: payload.status.unwrap_or_else(|| "active".to_string()),
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(ticket_categories::table)
        .values(&category)
        .execute(&mut conn)?;
    Ok(Json(category))
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketCategory>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let category: TicketCategory = ticket_categories::table.find(id).first(&mut conn)?;
    Ok(Json(category))
}

async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<TicketCategory>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let category: TicketCategory = diesel::update(ticket_categories::table.find(id))
        .set((&payload, ticket_categories::updated_at.eq(Utc::now())))
        .get_result(&mut conn)?;
    Ok(Json(category))
}

// ---------------------------------------------------------------------------
// Audit trail handlers

#[derive(Debug, Deserialize)]
pub struct UpdateListQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    #[serde(rename = "ticketId")]
    pub ticket_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketUpdateRequest {
    pub ticket_id: Uuid,
    pub assigned_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
}

async fn list_updates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpdateListQuery>,
) -> Result<Json<Paginated<TicketUpdate>>, ApiError> {
    let mut conn = db_conn(&state.conn)?;
    let (page, size, offset) = page_params(query.page, query.size, DEFAULT_PAGE_SIZE);

    let mut filtered = ticket_updates::table.into_boxed();
    if let Some(ticket_id) = query.ticket_id {
        filtered = filtered.filter(ticket_updates::ticket_id.eq(ticket_id));
    }

    let data: Vec<TicketUpdate> = filtered
        .order(ticket_updates::updated_at.desc())
        .limit(size)
        .offset(offset)
        .load(&mut conn)?;
    let count: i64 = ticket_updates::table.count().get_result(&mut conn)?;

    Ok(Json(Paginated {
        data,
        count,
        page,
        size,
    }))
}

async fn create_update(
    State(state): State<Arc<AppState>>,
    CurrentUser(actor): CurrentUser,
    Json(payload): Json<CreateTicketUpdateRequest>,
) -> Result<Json<TicketUpdate>, ApiError> {
    let mut conn = db_conn(&state.conn)?;

    // Reject updates for tickets that no longer exist.
    tickets::table
        .find(payload.ticket_id)
        .select(tickets::id)
        .first::<Uuid>(&mut conn)?;

    let update = TicketUpdate {
        id: Uuid::new_v4(),
        ticket_id: payload.ticket_id,
        assigned_id: payload.assigned_id,
        kind: payload.kind,
        title: payload.title,
        message: payload.message,
        updated_by: actor.user_id,
        updated_at: Utc::now(),
    };

    diesel::insert_into(ticket_updates::table)
        .values(&update)
        .execute(&mut conn)?;
    Ok(Json(update))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket() -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            category_id: None,
            code: "TKT-7".into(),
            title: "Projector is down".into(),
            description: "Room 204".into(),
            priority: "medium".into(),
            status: "backlog".into(),
            current_department_assigned: None,
            current_user_assigned: None,
            reported_by: Some(Uuid::new_v4()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_next_ticket_code() {
        assert_eq!(next_ticket_code(0), "TKT-1");
        assert_eq!(next_ticket_code(41), "TKT-42");
    }

    #[test]
    fn test_no_changes_emit_no_events() {
        let ticket = sample_ticket();
        let events = derive_update_events(&ticket, &ticket.clone(), Uuid::new_v4(), Utc::now());
        assert!(events.is_empty());
    }

    #[test]
    fn test_status_and_priority_changes() {
        let before = sample_ticket();
        let mut after = before.clone();
        after.status = "in_progress".into();
        after.priority = "highest".into();

        let events = derive_update_events(&before, &after, Uuid::new_v4(), Utc::now());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, update_kind::STATUS_CHANGE);
        assert!(events[0].message.contains("backlog"));
        assert!(events[0].message.contains("in_progress"));
        assert_eq!(events[1].kind, update_kind::PRIORITY_CHANGE);
    }

    #[test]
    fn test_assignments_carry_target_ids() {
        let before = sample_ticket();
        let mut after = before.clone();
        let department_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        after.current_department_assigned = Some(department_id);
        after.current_user_assigned = Some(user_id);

        let actor = Uuid::new_v4();
        let events = derive_update_events(&before, &after, actor, Utc::now());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, update_kind::DEPARTMENT_ASSIGN);
        assert_eq!(events[0].assigned_id, Some(department_id));
        assert_eq!(events[1].kind, update_kind::USER_ASSIGN);
        assert_eq!(events[1].assigned_id, Some(user_id));
        assert!(events.iter().all(|e| e.updated_by == actor));
    }

    #[test]
    fn test_clearing_an_assignment_is_silent() {
        let mut before = sample_ticket();
        before.current_user_assigned = Some(Uuid::new_v4());
        let mut after = before.clone();
        after.current_user_assigned = None;

        let events = derive_update_events(&before, &after, Uuid::new_v4(), Utc::now());
        assert!(events.is_empty());
    }
}
