//! Database records shared across the API modules.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::schema::{
    departments, files, sessions, ticket_categories, ticket_updates, tickets, users,
};

/// Lifecycle states shared by users, departments and ticket categories.
/// Archiving is a soft delete; rows are never physically removed.
pub mod status {
    pub const ACTIVE: &str = "active";
    pub const INACTIVE: &str = "inactive";
    pub const ARCHIVED: &str = "archived";
}

/// Audit-trail entry kinds written to `ticket_updates`.
pub mod update_kind {
    pub const CREATE_TICKET: &str = "create_ticket";
    pub const DEPARTMENT_ASSIGN: &str = "department_assign";
    pub const USER_ASSIGN: &str = "user_assign";
    pub const STATUS_CHANGE: &str = "status_change";
    pub const PRIORITY_CHANGE: &str = "priority_change";
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub abbv: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub avatar: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full user row. Never serialized directly; the password hash stays
/// server-side and responses go through [`UserResponse`].
#[derive(Debug, Clone, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub rfid_number: String,
    pub firstname: String,
    pub lastname: String,
    pub sex: String,
    pub birthdate: NaiveDate,
    pub email: String,
    pub contact_number: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub status: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub rfid_number: String,
    pub firstname: String,
    pub lastname: String,
    pub sex: String,
    pub birthdate: NaiveDate,
    pub email: String,
    pub contact_number: String,
    pub username: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub status: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            rfid_number: user.rfid_number,
            firstname: user.firstname,
            lastname: user.lastname,
            sex: user.sex,
            birthdate: user.birthdate,
            email: user.email,
            contact_number: user.contact_number,
            username: user.username,
            role: user.role,
            department_id: user.department_id,
            status: user.status,
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = sessions)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub user_agent: String,
    pub expired_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = ticket_categories)]
pub struct TicketCategory {
    pub id: Uuid,
    pub name: String,
    pub department_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub code: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub current_department_assigned: Option<Uuid>,
    pub current_user_assigned: Option<Uuid>,
    pub reported_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = ticket_updates)]
pub struct TicketUpdate {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub assigned_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Insertable)]
#[diesel(table_name = files)]
pub struct TicketFile {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub owner_id: Uuid,
    pub path: String,
    pub kind: String,
    pub size: i64,
    pub extension: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}
