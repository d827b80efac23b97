//! End-to-end flows through the public API.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use fieldops::{
    App, AssignmentStatus, CheckInOutcome, CheckInRequest, Collection, Config, KeyValueStore,
    Location, MemoryKv, RoundupPeriod, SqliteKv,
};

const EMPLOYEES: &str = r#"[
    {"id": "e1", "name": "Asha Verma", "email": "asha@example.com", "role": "employee"},
    {"id": "e2", "name": "Ben Okafor", "email": "ben@example.com", "role": "employee"}
]"#;

const DOCTORS: &str = r#"[
    {"id": "d1", "name": "Dr. Rao", "specialization": "Cardiology",
     "location": {"lat": 28.6139, "lng": 77.209}},
    {"id": "d2", "name": "Dr. Mehta", "specialization": "cardiology",
     "location": {"lat": 28.5355, "lng": 77.391}}
]"#;

async fn seeded(kv: Arc<dyn KeyValueStore>) -> App {
    let app = App::with_kv(Config::default(), kv);
    app.import(Collection::Employees, EMPLOYEES).await.unwrap();
    app.import(Collection::Doctors, DOCTORS).await.unwrap();
    app
}

fn visit(employee: &str, doctor: &str, at: Location) -> CheckInRequest {
    CheckInRequest {
        employee_id: employee.to_string(),
        doctor_id: doctor.to_string(),
        location: Some(at),
        ..CheckInRequest::default()
    }
}

#[tokio::test]
async fn test_field_day_feeds_analytics_and_roundup() {
    let app = seeded(Arc::new(MemoryKv::new())).await;
    let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();

    let to_rao = app.assign("e1", "d1", 2, start).await.unwrap();
    app.assign("e1", "d2", 4, start).await.unwrap();

    let near_rao = Location::new(28.6140, 77.2091);
    let near_mehta = Location::new(28.5355, 77.391);
    for (offset, doctor, at) in [(1, "d1", near_rao), (2, "d2", near_mehta), (3, "d1", near_rao)] {
        let outcome = app
            .check_in(visit("e1", doctor, at), start + Duration::hours(offset))
            .await
            .unwrap();
        assert!(matches!(outcome, CheckInOutcome::Recorded { .. }));
    }

    // Too far from Dr. Rao, rejected without a write
    let rejected = app
        .check_in(visit("e2", "d1", near_mehta), start + Duration::hours(4))
        .await
        .unwrap();
    assert!(matches!(rejected, CheckInOutcome::OutOfRange { .. }));

    let rao = app.assignments.get_by_id(&to_rao.id).await.unwrap().unwrap();
    assert_eq!(rao.current_progress, 2);
    assert!(rao.is_target_met());
    assert_eq!(rao.status, AssignmentStatus::Active);

    let now = start + Duration::hours(12);
    let analytics = app.analytics.get_employee_analytics_at("e1", now).await.unwrap();
    assert_eq!(analytics.total_assignments, 2);
    assert_eq!(analytics.total_check_ins, 3);
    assert_eq!(analytics.last_check_in, Some(start + Duration::hours(3)));
    assert!((analytics.target_achievement_rate - 50.0).abs() < 1e-9);

    let roundup = app
        .analytics
        .generate_activity_roundup_at(RoundupPeriod::Weekly, &now)
        .await
        .unwrap();
    assert_eq!(roundup.total_check_ins, 3);
    assert_eq!(roundup.active_employees, 1);
    assert_eq!(roundup.employees[0].doctors_visited, vec!["d1", "d2"]);
    assert_eq!(roundup.employees[0].targets_achieved, 1);
    assert_eq!(roundup.employees[1].check_ins, 0);
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let path = std::env::temp_dir().join(format!("fieldops_it_{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);

    {
        let app = seeded(Arc::new(SqliteKv::open(&path).unwrap())).await;
        let outcome = app
            .check_in(visit("e2", "d2", Location::new(28.5355, 77.391)), Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, CheckInOutcome::Recorded { .. }));
    }

    let app = App::with_kv(Config::default(), Arc::new(SqliteKv::open(&path).unwrap()));
    assert_eq!(app.employees.get_all().await.unwrap().len(), 2);
    assert_eq!(
        app.doctors.get_by_specialization("CARDIOLOGY").await.unwrap().len(),
        2
    );
    let check_ins = app.check_ins.get_by_employee("e2", None, None).await.unwrap();
    assert_eq!(check_ins.len(), 1);
    assert_eq!(check_ins[0].doctor_id, "d2");

    drop(app);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_missing_collections_read_as_empty() {
    let app = App::in_memory(Config::default());
    assert!(app.employees.get_all().await.unwrap().is_empty());
    assert!(app.check_ins.get_by_doctor("d1").await.unwrap().is_empty());
    assert!(app.assignments.update_progress("nope", 1).await.unwrap().is_none());

    let all = app.analytics.get_all_employees_analytics().await.unwrap();
    assert!(all.is_empty());
}
