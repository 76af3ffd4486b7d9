//! Assignment store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the narrow persistence operations the timeline services need.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every filtered query takes its status set from the caller.
//! - Result lists are deterministic: `start_date ASC, id ASC`.
//! - Overlap is inclusive on both ends; open-ended rows reach forever.
//! - Effective-date matching is `start_date < target` and
//!   `end_date IS NULL OR end_date > target`.

use super::{date_value, parse_date, parse_uuid, uuid_value, RepoError, RepoResult};
use crate::model::assignment::{AddressAssignment, AssignmentId, ValidatedAssignment};
use crate::model::directory::UserId;
use crate::model::status::AssignmentStatus;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const ASSIGNMENT_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    address_id,
    status,
    start_date,
    end_date,
    created_at,
    updated_at
FROM address_assignments";

const ORDER_BY_TIMELINE: &str = " ORDER BY start_date ASC, id ASC";

/// Persistence operations over `address_assignments`.
pub trait AssignmentStore {
    /// Inserts a validated row and returns it with its new id.
    fn insert(&self, assignment: &ValidatedAssignment) -> RepoResult<AddressAssignment>;
    /// Loads one row; terminal rows only when `include_terminal`.
    fn get(&self, id: AssignmentId, include_terminal: bool)
        -> RepoResult<Option<AddressAssignment>>;
    /// Rows of `user_id` with a status in `statuses` whose range intersects
    /// `[start, end]` inclusively.
    fn find_overlapping(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<AssignmentId>,
    ) -> RepoResult<Vec<AddressAssignment>>;
    /// Rows of `user_id` with a status in `statuses` in effect on `target`.
    fn find_by_user_and_status_and_date(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        target: NaiveDate,
    ) -> RepoResult<Vec<AddressAssignment>>;
    /// Rows of `user_id` with a status in `statuses` whose end date equals
    /// `end_date` (`None` selects open-ended rows).
    fn find_by_end_date(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        end_date: Option<NaiveDate>,
        exclude: Option<AssignmentId>,
    ) -> RepoResult<Vec<AddressAssignment>>;
    /// Whether any row with a status in `statuses` starts before `before`.
    fn exists_starting_before(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        before: NaiveDate,
        exclude: Option<AssignmentId>,
    ) -> RepoResult<bool>;
    /// Rows with a status in `statuses` whose end date is before `as_of`.
    fn find_ended_before(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        as_of: NaiveDate,
    ) -> RepoResult<Vec<AddressAssignment>>;
    /// Rows with a status in `statuses`, optionally only those still running
    /// after `active_after`, capped at `limit`.
    fn list_for_user(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        active_after: Option<NaiveDate>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<AddressAssignment>>;
    fn update_dates(
        &self,
        id: AssignmentId,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> RepoResult<()>;
    fn update_end_date(&self, id: AssignmentId, end_date: Option<NaiveDate>) -> RepoResult<()>;
    fn update_status(&self, id: AssignmentId, status: AssignmentStatus) -> RepoResult<()>;
    /// Physically removes one row.
    fn purge(&self, id: AssignmentId) -> RepoResult<()>;
}

/// SQLite-backed assignment store.
pub struct SqliteAssignmentStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_list(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<AddressAssignment>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_assignment_row(row)?);
        }
        Ok(items)
    }
}

impl AssignmentStore for SqliteAssignmentStore<'_> {
    fn insert(&self, assignment: &ValidatedAssignment) -> RepoResult<AddressAssignment> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO address_assignments (
                id,
                user_id,
                address_id,
                status,
                start_date,
                end_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id.to_string(),
                assignment.user_id.to_string(),
                assignment.address_id.to_string(),
                assignment.status.as_db_str(),
                assignment.start_date,
                assignment.end_date,
            ],
        )?;

        self.get(id, true)?.ok_or(RepoError::NotFound(id))
    }

    fn get(
        &self,
        id: AssignmentId,
        include_terminal: bool,
    ) -> RepoResult<Option<AddressAssignment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ASSIGNMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => {
                let assignment = parse_assignment_row(row)?;
                if assignment.status.is_terminal() && !include_terminal {
                    return Ok(None);
                }
                Ok(Some(assignment))
            }
            None => Ok(None),
        }
    }

    fn find_overlapping(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<AssignmentId>,
    ) -> RepoResult<Vec<AddressAssignment>> {
        let mut query = FilteredQuery::for_user(user_id, statuses);
        query.push(" AND start_date <= ?", date_value(end));
        query.push(" AND (end_date IS NULL OR end_date >= ?)", date_value(start));
        query.exclude(exclude);
        let (sql, binds) = query.finish(ORDER_BY_TIMELINE);
        self.query_list(&sql, binds)
    }

    fn find_by_user_and_status_and_date(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        target: NaiveDate,
    ) -> RepoResult<Vec<AddressAssignment>> {
        let mut query = FilteredQuery::for_user(user_id, statuses);
        query.push(" AND start_date < ?", date_value(target));
        query.push(" AND (end_date IS NULL OR end_date > ?)", date_value(target));
        let (sql, binds) = query.finish(ORDER_BY_TIMELINE);
        self.query_list(&sql, binds)
    }

    fn find_by_end_date(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        end_date: Option<NaiveDate>,
        exclude: Option<AssignmentId>,
    ) -> RepoResult<Vec<AddressAssignment>> {
        let mut query = FilteredQuery::for_user(user_id, statuses);
        match end_date {
            Some(end_date) => query.push(" AND end_date = ?", date_value(end_date)),
            None => query.push_sql(" AND end_date IS NULL"),
        }
        query.exclude(exclude);
        let (sql, binds) = query.finish(ORDER_BY_TIMELINE);
        self.query_list(&sql, binds)
    }

    fn exists_starting_before(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        before: NaiveDate,
        exclude: Option<AssignmentId>,
    ) -> RepoResult<bool> {
        let mut query = FilteredQuery::for_user(user_id, statuses);
        query.push(" AND start_date < ?", date_value(before));
        query.exclude(exclude);
        let (sql, binds) = query.finish(" LIMIT 1");
        Ok(!self.query_list(&sql, binds)?.is_empty())
    }

    fn find_ended_before(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        as_of: NaiveDate,
    ) -> RepoResult<Vec<AddressAssignment>> {
        let mut query = FilteredQuery::for_user(user_id, statuses);
        query.push(" AND end_date IS NOT NULL AND end_date < ?", date_value(as_of));
        let (sql, binds) = query.finish(ORDER_BY_TIMELINE);
        self.query_list(&sql, binds)
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        statuses: &[AssignmentStatus],
        active_after: Option<NaiveDate>,
        limit: Option<u32>,
    ) -> RepoResult<Vec<AddressAssignment>> {
        let mut query = FilteredQuery::for_user(user_id, statuses);
        if let Some(as_of) = active_after {
            query.push(" AND (end_date IS NULL OR end_date > ?)", date_value(as_of));
        }
        let mut tail = ORDER_BY_TIMELINE.to_string();
        if let Some(limit) = limit {
            tail.push_str(" LIMIT ?");
            query.bind(Value::Integer(i64::from(limit)));
        }
        let (sql, binds) = query.finish(&tail);
        self.query_list(&sql, binds)
    }

    fn update_dates(
        &self,
        id: AssignmentId,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE address_assignments
             SET start_date = ?2,
                 end_date = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), start_date, end_date],
        )?;
        ensure_changed(changed, id)
    }

    fn update_end_date(&self, id: AssignmentId, end_date: Option<NaiveDate>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE address_assignments
             SET end_date = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), end_date],
        )?;
        ensure_changed(changed, id)
    }

    fn update_status(&self, id: AssignmentId, status: AssignmentStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE address_assignments
             SET status = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), status.as_db_str()],
        )?;
        ensure_changed(changed, id)
    }

    fn purge(&self, id: AssignmentId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM address_assignments WHERE id = ?1;",
            [id.to_string()],
        )?;
        ensure_changed(changed, id)
    }
}

/// Positional-parameter query over one user's rows filtered by status.
struct FilteredQuery {
    sql: String,
    bind_values: Vec<Value>,
}

impl FilteredQuery {
    fn for_user(user_id: UserId, statuses: &[AssignmentStatus]) -> Self {
        let mut sql = format!("{ASSIGNMENT_SELECT_SQL} WHERE user_id = ?");
        let mut bind_values = vec![uuid_value(user_id)];

        if statuses.is_empty() {
            sql.push_str(" AND 0");
        } else {
            let placeholders = vec!["?"; statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({placeholders})"));
            bind_values.extend(
                statuses
                    .iter()
                    .map(|status| Value::Text(status.as_db_str().to_string())),
            );
        }

        Self { sql, bind_values }
    }

    fn push(&mut self, clause: &str, value: Value) {
        self.sql.push_str(clause);
        self.bind_values.push(value);
    }

    fn push_sql(&mut self, clause: &str) {
        self.sql.push_str(clause);
    }

    fn bind(&mut self, value: Value) {
        self.bind_values.push(value);
    }

    fn exclude(&mut self, id: Option<AssignmentId>) {
        if let Some(id) = id {
            self.push(" AND id <> ?", uuid_value(id));
        }
    }

    fn finish(mut self, tail: &str) -> (String, Vec<Value>) {
        self.sql.push_str(tail);
        self.sql.push(';');
        (self.sql, self.bind_values)
    }
}

fn ensure_changed(changed: usize, id: AssignmentId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(id));
    }
    Ok(())
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<AddressAssignment> {
    let id_text: String = row.get("id")?;
    let user_text: String = row.get("user_id")?;
    let address_text: String = row.get("address_id")?;

    let status_text: String = row.get("status")?;
    let status = AssignmentStatus::from_db_str(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in address_assignments.status"
        ))
    })?;

    let start_text: String = row.get("start_date")?;
    let end_date = row
        .get::<_, Option<String>>("end_date")?
        .map(|value| parse_date(&value, "address_assignments.end_date"))
        .transpose()?;

    Ok(AddressAssignment {
        id: parse_uuid(&id_text, "address_assignments.id")?,
        user_id: parse_uuid(&user_text, "address_assignments.user_id")?,
        address_id: parse_uuid(&address_text, "address_assignments.address_id")?,
        status,
        start_date: parse_date(&start_text, "address_assignments.start_date")?,
        end_date,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
