mod common;

use address_timeline_core::{
    AssignmentStatus, IntegrityViolation, Missing, NewAssignment, TimelineError, TimelineService,
    ValidationError, GENERIC_FAILURE_MESSAGE,
};
use common::{day, setup};

#[test]
fn create_permanent_closes_current_on_day_before_new_start() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");
    let new_home = common::insert_address(&conn, "9 New Home St");

    let first = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            home,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();
    assert!(first.closed_predecessor.is_none());
    assert!(first.assignment.assignment.is_open_permanent());

    let second = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            new_home,
            AssignmentStatus::FullPermanent,
            day("2020-06-01"),
        ))
        .unwrap();

    let closed = second.closed_predecessor.unwrap();
    assert_eq!(closed.id, first.assignment.assignment.id);
    assert_eq!(closed.end_date, Some(day("2020-05-31")));
    assert_eq!(second.assignment.address.id, new_home);
    assert_eq!(second.assignment.assignment.end_date, None);

    let open: Vec<_> = service
        .list_non_terminal_assignments(user_id)
        .unwrap()
        .into_iter()
        .filter(|row| row.is_open_permanent())
        .collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, second.assignment.assignment.id);
}

#[test]
fn permanent_classes_share_one_chain() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");
    let mailbox = common::insert_address(&conn, "PO Box 12");

    let full = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            home,
            AssignmentStatus::FullPermanent,
            day("2021-01-01"),
        ))
        .unwrap();
    let mail_only = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            mailbox,
            AssignmentStatus::MailOnlyPermanent,
            day("2021-03-15"),
        ))
        .unwrap();

    let closed = mail_only.closed_predecessor.unwrap();
    assert_eq!(closed.id, full.assignment.assignment.id);
    assert_eq!(closed.end_date, Some(day("2021-03-14")));
}

#[test]
fn create_permanent_not_after_current_start_is_rejected() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");

    let current = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            home,
            AssignmentStatus::FullPermanent,
            day("2020-06-01"),
        ))
        .unwrap();

    for start in ["2020-06-01", "2020-01-01"] {
        let err = service
            .create_assignment(&NewAssignment::permanent(
                user_id,
                home,
                AssignmentStatus::FullPermanent,
                day(start),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            TimelineError::Validation(ValidationError::StartNotAfterCurrent { current_id, .. })
                if current_id == current.assignment.assignment.id
        ));
    }

    let rows = service.list_non_terminal_assignments(user_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].end_date, None);
}

#[test]
fn create_rejects_missing_fields_and_terminal_status() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");

    let mut request = NewAssignment::temporary(
        user_id,
        home,
        AssignmentStatus::FullTemporary,
        day("2024-01-01"),
        day("2024-01-31"),
    );
    request.end_date = None;
    let err = service.create_assignment(&request).unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Validation(ValidationError::MissingEndDate { .. })
    ));
    assert!(err.is_user_facing());

    request.status = None;
    let err = service.create_assignment(&request).unwrap_err();
    assert!(matches!(err, TimelineError::Validation(ValidationError::MissingStatus)));

    let expired =
        NewAssignment::permanent(user_id, home, AssignmentStatus::Expired, day("2024-01-01"));
    let err = service.create_assignment(&expired).unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Validation(ValidationError::TerminalStatus(AssignmentStatus::Expired))
    ));

    assert!(service.list_non_terminal_assignments(user_id).unwrap().is_empty());
}

#[test]
fn create_requires_existing_user_and_address() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");
    let unknown = uuid::Uuid::new_v4();

    let err = service
        .create_assignment(&NewAssignment::permanent(
            unknown,
            home,
            AssignmentStatus::FullPermanent,
            day("2024-01-01"),
        ))
        .unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(Missing::User(id)) if id == unknown));

    let err = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            unknown,
            AssignmentStatus::FullPermanent,
            day("2024-01-01"),
        ))
        .unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(Missing::Address(id)) if id == unknown));
}

#[test]
fn create_with_two_open_permanent_rows_is_an_integrity_error() {
    let conn = setup();
    common::drop_open_permanent_guard(&conn);
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");
    common::insert_raw_assignment(&conn, user_id, home, "permanent", "2019-01-01", None);
    common::insert_raw_assignment(&conn, user_id, home, "mail_only_permanent", "2019-06-01", None);

    let err = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            home,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap_err();

    assert!(matches!(
        err,
        TimelineError::Integrity(IntegrityViolation::MultipleOpenPermanent { ref assignment_ids, .. })
            if assignment_ids.len() == 2
    ));
    assert!(!err.is_user_facing());
    assert_eq!(err.public_message(), GENERIC_FAILURE_MESSAGE);
    // Nothing was closed and nothing was inserted.
    let rows = service.list_non_terminal_assignments(user_id).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.end_date.is_none()));
}

#[test]
fn delete_open_permanent_reopens_predecessor() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let home = common::insert_address(&conn, "1 Home St");
    let new_home = common::insert_address(&conn, "9 New Home St");

    let first = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            home,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();
    let second = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            new_home,
            AssignmentStatus::FullPermanent,
            day("2020-06-01"),
        ))
        .unwrap();

    let outcome = service
        .delete_assignment(second.assignment.assignment.id)
        .unwrap();

    assert_eq!(outcome.deleted.status, AssignmentStatus::Deleted);
    let repaired = outcome.repaired_predecessor.unwrap();
    assert_eq!(repaired.id, first.assignment.assignment.id);
    assert_eq!(repaired.end_date, None);
}

#[test]
fn delete_bounded_permanent_extends_predecessor_to_its_end() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let mut ids = Vec::new();
    for start in ["2020-01-01", "2020-06-01", "2021-01-01"] {
        let outcome = service
            .create_assignment(&NewAssignment::permanent(
                user_id,
                address,
                AssignmentStatus::FullPermanent,
                day(start),
            ))
            .unwrap();
        ids.push(outcome.assignment.assignment.id);
    }

    let outcome = service.delete_assignment(ids[1]).unwrap();

    let repaired = outcome.repaired_predecessor.unwrap();
    assert_eq!(repaired.id, ids[0]);
    assert_eq!(repaired.end_date, Some(day("2020-12-31")));

    let rows = service.list_non_terminal_assignments(user_id).unwrap();
    let ids_left: Vec<_> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids_left, vec![ids[0], ids[2]]);
}

#[test]
fn delete_earliest_permanent_needs_no_repair() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let first = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();

    let outcome = service
        .delete_assignment(first.assignment.assignment.id)
        .unwrap();
    assert!(outcome.repaired_predecessor.is_none());
    assert!(service.list_non_terminal_assignments(user_id).unwrap().is_empty());
}

#[test]
fn delete_of_terminal_or_unknown_row_is_not_found() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let temp = service
        .create_assignment(&NewAssignment::temporary(
            user_id,
            address,
            AssignmentStatus::FullTemporary,
            day("2024-01-01"),
            day("2024-01-10"),
        ))
        .unwrap();
    let temp_id = temp.assignment.assignment.id;
    service.delete_assignment(temp_id).unwrap();

    let err = service.delete_assignment(temp_id).unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(Missing::Assignment(id)) if id == temp_id));

    let unknown = uuid::Uuid::new_v4();
    let err = service.delete_assignment(unknown).unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(Missing::Assignment(id)) if id == unknown));
}

#[test]
fn delete_with_duplicate_predecessors_rolls_back() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");
    common::insert_raw_assignment(
        &conn,
        user_id,
        address,
        "permanent",
        "2019-01-01",
        Some("2019-12-31"),
    );
    common::insert_raw_assignment(
        &conn,
        user_id,
        address,
        "package_only_permanent",
        "2019-06-01",
        Some("2019-12-31"),
    );
    let current =
        common::insert_raw_assignment(&conn, user_id, address, "permanent", "2020-01-01", None);

    let err = service.delete_assignment(current).unwrap_err();

    assert!(matches!(
        err,
        TimelineError::Integrity(IntegrityViolation::DuplicatePredecessor { successor_id, .. })
            if successor_id == current
    ));
    let rows = service.list_non_terminal_assignments(user_id).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().any(|row| row.id == current && row.end_date.is_none()));
}

#[test]
fn delete_with_missing_predecessor_is_an_integrity_error() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");
    // Gap between 2019-03-31 and 2020-01-01.
    common::insert_raw_assignment(
        &conn,
        user_id,
        address,
        "permanent",
        "2019-01-01",
        Some("2019-03-31"),
    );
    let current =
        common::insert_raw_assignment(&conn, user_id, address, "permanent", "2020-01-01", None);

    let err = service.delete_assignment(current).unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Integrity(IntegrityViolation::MissingPredecessor { expected_end, .. })
            if expected_end == day("2019-12-31")
    ));
}

#[test]
fn correcting_start_with_missing_predecessor_rolls_back() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");
    // Gap between 2019-03-31 and 2020-01-01.
    let earlier = common::insert_raw_assignment(
        &conn,
        user_id,
        address,
        "permanent",
        "2019-01-01",
        Some("2019-03-31"),
    );
    let current =
        common::insert_raw_assignment(&conn, user_id, address, "permanent", "2020-01-01", None);

    let err = service
        .correct_assignment_dates(current, day("2020-02-01"), None)
        .unwrap_err();

    assert!(matches!(
        err,
        TimelineError::Integrity(IntegrityViolation::MissingPredecessor { assignment_id, expected_end })
            if assignment_id == current && expected_end == day("2019-12-31")
    ));
    assert_eq!(err.public_message(), GENERIC_FAILURE_MESSAGE);
    assert!(conn.is_autocommit());
    let rows = service.list_non_terminal_assignments(user_id).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, earlier);
    assert_eq!(rows[0].start_date, day("2019-01-01"));
    assert_eq!(rows[0].end_date, Some(day("2019-03-31")));
    assert_eq!(rows[1].id, current);
    assert_eq!(rows[1].start_date, day("2020-01-01"));
    assert_eq!(rows[1].end_date, None);
}

#[test]
fn correcting_permanent_start_moves_predecessor_end() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let first = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();
    let second = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-06-01"),
        ))
        .unwrap();

    let outcome = service
        .correct_assignment_dates(second.assignment.assignment.id, day("2020-07-15"), None)
        .unwrap();

    assert_eq!(outcome.assignment.start_date, day("2020-07-15"));
    assert_eq!(outcome.assignment.end_date, None);
    let repaired = outcome.repaired_predecessor.unwrap();
    assert_eq!(repaired.id, first.assignment.assignment.id);
    assert_eq!(repaired.end_date, Some(day("2020-07-14")));
}

#[test]
fn correcting_permanent_start_onto_predecessor_start_is_an_integrity_error() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let first = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();
    let second = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-06-01"),
        ))
        .unwrap();

    let err = service
        .correct_assignment_dates(second.assignment.assignment.id, day("2020-01-01"), None)
        .unwrap_err();

    assert!(matches!(
        err,
        TimelineError::Integrity(IntegrityViolation::StartNotAfterPredecessor { predecessor_id, .. })
            if predecessor_id == first.assignment.assignment.id
    ));
    // Rolled back: predecessor still ends the day before the original start.
    let rows = service.list_non_terminal_assignments(user_id).unwrap();
    assert_eq!(rows[0].end_date, Some(day("2020-05-31")));
    assert_eq!(rows[1].start_date, day("2020-06-01"));
}

#[test]
fn correcting_permanent_end_date_is_rejected() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let current = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();

    let err = service
        .correct_assignment_dates(
            current.assignment.assignment.id,
            day("2020-01-01"),
            Some(day("2020-12-31")),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Validation(ValidationError::PermanentEndDateManaged)
    ));
}

#[test]
fn correcting_earliest_permanent_start_needs_no_predecessor() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let current = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-03-01"),
        ))
        .unwrap();

    let outcome = service
        .correct_assignment_dates(current.assignment.assignment.id, day("2019-11-01"), None)
        .unwrap();
    assert!(outcome.repaired_predecessor.is_none());
    assert_eq!(outcome.assignment.start_date, day("2019-11-01"));
}

#[test]
fn correcting_temporary_dates_ignores_its_own_range() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let temp = service
        .create_assignment(&NewAssignment::temporary(
            user_id,
            address,
            AssignmentStatus::FullTemporary,
            day("2024-03-01"),
            day("2024-03-31"),
        ))
        .unwrap();

    let outcome = service
        .correct_assignment_dates(
            temp.assignment.assignment.id,
            day("2024-03-10"),
            Some(day("2024-04-10")),
        )
        .unwrap();
    assert_eq!(outcome.assignment.start_date, day("2024-03-10"));
    assert_eq!(outcome.assignment.end_date, Some(day("2024-04-10")));
    assert!(outcome.repaired_predecessor.is_none());

    let err = service
        .correct_assignment_dates(
            temp.assignment.assignment.id,
            day("2024-04-11"),
            Some(day("2024-04-01")),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Validation(ValidationError::EndBeforeStart { .. })
    ));
}

#[test]
fn expire_marks_only_elapsed_bounded_permanent_rows() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let mut ids = Vec::new();
    for start in ["2020-01-01", "2021-01-01", "2022-01-01"] {
        let outcome = service
            .create_assignment(&NewAssignment::permanent(
                user_id,
                address,
                AssignmentStatus::FullPermanent,
                day(start),
            ))
            .unwrap();
        ids.push(outcome.assignment.assignment.id);
    }
    let temp = service
        .create_assignment(&NewAssignment::temporary(
            user_id,
            address,
            AssignmentStatus::FullTemporary,
            day("2020-02-01"),
            day("2020-02-10"),
        ))
        .unwrap();

    let expired = service
        .expire_elapsed_permanent(user_id, day("2021-06-01"))
        .unwrap();

    assert_eq!(expired, vec![ids[0]]);
    let live: Vec<_> = service
        .list_non_terminal_assignments(user_id)
        .unwrap()
        .into_iter()
        .map(|row| row.id)
        .collect();
    assert_eq!(live, vec![temp.assignment.assignment.id, ids[1], ids[2]]);

    // An expired predecessor is out of the chain; deleting its successor
    // leaves nothing to repair.
    let outcome = service.delete_assignment(ids[1]).unwrap();
    assert!(outcome.repaired_predecessor.is_none());
}

#[test]
fn purge_removes_only_deleted_rows() {
    let conn = setup();
    let service = TimelineService::new(&conn);
    let user_id = common::insert_user(&conn, "7K3D9QXP");
    let address = common::insert_address(&conn, "1 Home St");

    let current = service
        .create_assignment(&NewAssignment::permanent(
            user_id,
            address,
            AssignmentStatus::FullPermanent,
            day("2020-01-01"),
        ))
        .unwrap();
    let id = current.assignment.assignment.id;

    let err = service.purge_assignment(id).unwrap_err();
    assert!(matches!(
        err,
        TimelineError::Validation(ValidationError::PurgeRequiresDeleted {
            status: AssignmentStatus::FullPermanent,
            ..
        })
    ));

    service.delete_assignment(id).unwrap();
    service.purge_assignment(id).unwrap();

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM address_assignments WHERE id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 0);

    let err = service.purge_assignment(id).unwrap_err();
    assert!(matches!(err, TimelineError::NotFound(Missing::Assignment(_))));
}
