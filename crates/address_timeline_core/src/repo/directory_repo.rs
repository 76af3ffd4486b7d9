//! Narrow user/address directory used by the timeline.
//!
//! Account management owns these rows. The timeline only needs to insert
//! them (for collaborators and fixtures), look them up by id, and find a
//! user by smart id for carrier lookups.

use super::{parse_uuid, RepoError, RepoResult};
use crate::model::directory::{Address, AddressId, NewAddress, NewUser, User, UserId};
use crate::model::smart_id::normalize_smart_id;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    id,
    smart_id,
    email,
    first_name,
    last_name,
    phone,
    created_at,
    updated_at
FROM users";

const ADDRESS_SELECT_SQL: &str = "SELECT
    id,
    nickname,
    line_one,
    line_two,
    unit,
    business_name,
    attention_to,
    city,
    state,
    zip_code,
    country,
    phone,
    latitude,
    longitude,
    delivery_instructions,
    created_at,
    updated_at
FROM addresses";

/// Directory lookups the timeline depends on.
pub trait DirectoryRepository {
    /// Stores the smart id in normalized form; `Rejected` when it cannot be
    /// normalized.
    fn insert_user(&self, user: &NewUser) -> RepoResult<User>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Exact match on an already-normalized smart id.
    fn find_user_by_smart_id(&self, smart_id: &str) -> RepoResult<Option<User>>;
    fn insert_address(&self, address: &NewAddress) -> RepoResult<Address>;
    fn get_address(&self, id: AddressId) -> RepoResult<Option<Address>>;
}

/// SQLite-backed directory.
pub struct SqliteDirectoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn insert_user(&self, user: &NewUser) -> RepoResult<User> {
        let smart_id = normalize_smart_id(&user.smart_id).map_err(RepoError::Rejected)?;
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO users (id, smart_id, email, first_name, last_name, phone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                smart_id.as_str(),
                user.email.as_str(),
                user.first_name.as_str(),
                user.last_name.as_str(),
                user.phone.as_str(),
            ],
        )?;
        self.get_user(id)?.ok_or_else(|| missing_after_insert("users", id))
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                read_user_columns,
            )
            .optional()?
            .map(UserColumns::into_user)
            .transpose()
    }

    fn find_user_by_smart_id(&self, smart_id: &str) -> RepoResult<Option<User>> {
        self.conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE smart_id = ?1;"),
                [smart_id],
                read_user_columns,
            )
            .optional()?
            .map(UserColumns::into_user)
            .transpose()
    }

    fn insert_address(&self, address: &NewAddress) -> RepoResult<Address> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO addresses (
                id,
                nickname,
                line_one,
                line_two,
                unit,
                business_name,
                attention_to,
                city,
                state,
                zip_code,
                country,
                phone,
                latitude,
                longitude,
                delivery_instructions
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                id.to_string(),
                address.nickname.as_deref(),
                address.line_one.as_str(),
                address.line_two.as_deref(),
                address.unit.as_deref(),
                address.business_name.as_deref(),
                address.attention_to.as_deref(),
                address.city.as_str(),
                address.state.as_str(),
                address.zip_code.as_str(),
                address.country.as_str(),
                address.phone.as_deref(),
                address.latitude,
                address.longitude,
                address.delivery_instructions.as_deref(),
            ],
        )?;
        self.get_address(id)?
            .ok_or_else(|| missing_after_insert("addresses", id))
    }

    fn get_address(&self, id: AddressId) -> RepoResult<Option<Address>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ADDRESS_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_address_row(row)?)),
            None => Ok(None),
        }
    }
}

fn missing_after_insert(table: &str, id: Uuid) -> RepoError {
    RepoError::InvalidData(format!("{table} row {id} missing after insert"))
}

/// Raw user columns; the id is parsed outside the rusqlite row closure so
/// malformed ids surface as `InvalidData`.
struct UserColumns {
    id: String,
    smart_id: String,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
    created_at: i64,
    updated_at: i64,
}

impl UserColumns {
    fn into_user(self) -> RepoResult<User> {
        Ok(User {
            id: parse_uuid(&self.id, "users.id")?,
            smart_id: self.smart_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn read_user_columns(row: &Row<'_>) -> rusqlite::Result<UserColumns> {
    Ok(UserColumns {
        id: row.get("id")?,
        smart_id: row.get("smart_id")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        phone: row.get("phone")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_address_row(row: &Row<'_>) -> RepoResult<Address> {
    let id_text: String = row.get("id")?;
    Ok(Address {
        id: parse_uuid(&id_text, "addresses.id")?,
        nickname: row.get("nickname")?,
        line_one: row.get("line_one")?,
        line_two: row.get("line_two")?,
        unit: row.get("unit")?,
        business_name: row.get("business_name")?,
        attention_to: row.get("attention_to")?,
        city: row.get("city")?,
        state: row.get("state")?,
        zip_code: row.get("zip_code")?,
        country: row.get("country")?,
        phone: row.get("phone")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        delivery_instructions: row.get("delivery_instructions")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
