#![allow(dead_code)]

use address_timeline_core::{
    open_db_in_memory, AddressId, DirectoryRepository, NewAddress, NewUser,
    SqliteDirectoryRepository, UserId,
};
use chrono::NaiveDate;
use rusqlite::Connection;

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

pub fn insert_user(conn: &Connection, smart_id: &str) -> UserId {
    insert_user_with_phone(conn, smart_id, "555-0100")
}

pub fn insert_user_with_phone(conn: &Connection, smart_id: &str, phone: &str) -> UserId {
    SqliteDirectoryRepository::new(conn)
        .insert_user(&NewUser {
            smart_id: smart_id.to_string(),
            email: format!("{}@example.com", smart_id.to_lowercase()),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            phone: phone.to_string(),
        })
        .unwrap()
        .id
}

pub fn insert_address(conn: &Connection, line_one: &str) -> AddressId {
    insert_address_with_phone(conn, line_one, None)
}

pub fn insert_address_with_phone(
    conn: &Connection,
    line_one: &str,
    phone: Option<&str>,
) -> AddressId {
    SqliteDirectoryRepository::new(conn)
        .insert_address(&NewAddress {
            nickname: Some(line_one.to_string()),
            line_one: line_one.to_string(),
            city: "Arlington".to_string(),
            state: "VA".to_string(),
            zip_code: "22201".to_string(),
            country: "US".to_string(),
            phone: phone.map(str::to_string),
            ..NewAddress::default()
        })
        .unwrap()
        .id
}

/// Drops the open-permanent unique index so tests can store timelines the
/// writer would never produce.
pub fn drop_open_permanent_guard(conn: &Connection) {
    conn.execute_batch("DROP INDEX ux_address_assignments_open_permanent;")
        .unwrap();
}

/// Inserts a raw row, bypassing every service check.
pub fn insert_raw_assignment(
    conn: &Connection,
    user_id: UserId,
    address_id: AddressId,
    status: &str,
    start_date: &str,
    end_date: Option<&str>,
) -> uuid::Uuid {
    let id = uuid::Uuid::new_v4();
    conn.execute(
        "INSERT INTO address_assignments (id, user_id, address_id, status, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        rusqlite::params![
            id.to_string(),
            user_id.to_string(),
            address_id.to_string(),
            status,
            start_date,
            end_date,
        ],
    )
    .unwrap();
    id
}
