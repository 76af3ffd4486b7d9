//! User and postal-address records referenced by assignments.
//!
//! These rows are owned by the account-management collaborator. The timeline
//! only references them by id and joins them into resolution results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;
pub type AddressId = Uuid;

/// Account holder as seen by the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Normalized 8-character carrier lookup id.
    pub smart_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Profile phone, used when an address carries none.
    pub phone: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub smart_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Postal address row. Immutable from the timeline's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub nickname: Option<String>,
    pub line_one: String,
    pub line_two: Option<String>,
    pub unit: Option<String>,
    pub business_name: Option<String>,
    pub attention_to: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub delivery_instructions: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub nickname: Option<String>,
    pub line_one: String,
    pub line_two: Option<String>,
    pub unit: Option<String>,
    pub business_name: Option<String>,
    pub attention_to: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub delivery_instructions: Option<String>,
}
