//! End-to-end flows against a real database. Each test is skipped when
//! `TEST_DATABASE_URL` (or the local default) cannot be reached.

mod common;

use axum::{
    http::{Method, StatusCode},
    Router,
};
use chrono::{Duration, NaiveTime, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{database_app, register, send, TestAccount};

#[tokio::test]
async fn student_completes_an_assigned_workout() {
    let Some((app, _pool)) = database_app().await else {
        return;
    };

    let personal = register(&app, "personal").await;
    let student = register(&app, "student").await;

    let hired = send(
        &app,
        Method::POST,
        &format!("/api/v1/personals/{}/hire", personal.profile_id),
        Some(&student.bearer),
        None,
    )
    .await;
    assert_eq!(hired.status, StatusCode::OK);
    assert_eq!(hired.body["personal_id"], json!(personal.profile_id));

    let workout = send(
        &app,
        Method::POST,
        "/api/v1/workouts",
        Some(&personal.bearer),
        Some(json!({
            "name": "Lower body A",
            "difficulty": "beginner",
            "exercises": [
                { "name": "Goblet squat", "sets": 3, "reps": 10 },
                { "name": "Romanian deadlift", "sets": 3, "reps": 8, "rest_seconds": 90 }
            ]
        })),
    )
    .await;
    assert_eq!(workout.status, StatusCode::CREATED, "{}", workout.body);
    assert_eq!(workout.body["exercises"].as_array().map(Vec::len), Some(2));
    let workout_id = workout.body["id"].as_str().unwrap().to_string();

    let assigned = send(
        &app,
        Method::POST,
        &format!("/api/v1/workouts/{workout_id}/assign"),
        Some(&personal.bearer),
        Some(json!({ "student_id": student.profile_id })),
    )
    .await;
    assert_eq!(assigned.status, StatusCode::CREATED, "{}", assigned.body);

    let again = send(
        &app,
        Method::POST,
        &format!("/api/v1/workouts/{workout_id}/assign"),
        Some(&personal.bearer),
        Some(json!({ "student_id": student.profile_id })),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let mine = send(&app, Method::GET, "/api/v1/assignments", Some(&student.bearer), None).await;
    assert_eq!(mine.status, StatusCode::OK);
    let assignment_id = mine.body[0]["id"].as_str().unwrap().to_string();
    assert_eq!(mine.body[0]["status"], "active");

    let mistyped = send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{assignment_id}/complete"),
        Some(&student.bearer),
        Some(json!({ "rating": "five" })),
    )
    .await;
    assert_eq!(mistyped.status, StatusCode::BAD_REQUEST);

    let still_open = send(&app, Method::GET, "/api/v1/assignments", Some(&student.bearer), None).await;
    assert_eq!(still_open.body[0]["status"], "active");

    let completed = send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{assignment_id}/complete"),
        Some(&student.bearer),
        Some(json!({ "feedback": "Felt strong", "rating": 5 })),
    )
    .await;
    assert_eq!(completed.status, StatusCode::OK, "{}", completed.body);
    assert_eq!(completed.body["status"], "completed");

    let twice = send(
        &app,
        Method::POST,
        &format!("/api/v1/assignments/{assignment_id}/complete"),
        Some(&student.bearer),
        None,
    )
    .await;
    assert_eq!(twice.status, StatusCode::UNPROCESSABLE_ENTITY);

    let inbox = send(&app, Method::GET, "/api/v1/notifications", Some(&personal.bearer), None).await;
    assert_eq!(inbox.status, StatusCode::OK);
    let kinds: Vec<&Value> = inbox
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|n| &n["kind"])
        .collect();
    assert!(kinds.contains(&&json!("workout_completed")));
    assert!(kinds.contains(&&json!("student_linked")));
}

#[tokio::test]
async fn bookings_respect_availability_and_never_double_book() {
    let Some((app, _pool)) = database_app().await else {
        return;
    };

    let personal = register(&app, "personal").await;
    let student = register(&app, "student").await;

    let hired = send(
        &app,
        Method::POST,
        &format!("/api/v1/personals/{}/hire", personal.profile_id),
        Some(&student.bearer),
        None,
    )
    .await;
    assert_eq!(hired.status, StatusCode::OK);

    let day = Utc::now().date_naive() + Duration::days(3);
    let at = |hour: u32, minute: u32| {
        day.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
            .and_utc()
            .to_rfc3339()
    };

    let slot = send(
        &app,
        Method::POST,
        "/api/v1/availability",
        Some(&personal.bearer),
        Some(json!({ "starts_at": at(10, 0), "ends_at": at(14, 0) })),
    )
    .await;
    assert_eq!(slot.status, StatusCode::CREATED, "{}", slot.body);

    let booked = send(
        &app,
        Method::POST,
        "/api/v1/appointments",
        Some(&student.bearer),
        Some(json!({
            "personal_id": personal.profile_id,
            "starts_at": at(11, 0),
            "ends_at": at(12, 0),
        })),
    )
    .await;
    assert_eq!(booked.status, StatusCode::CREATED, "{}", booked.body);
    assert_eq!(booked.body["status"], "pending");
    let appointment_id = booked.body["id"].as_str().unwrap().to_string();

    let overlapping = send(
        &app,
        Method::POST,
        "/api/v1/appointments",
        Some(&student.bearer),
        Some(json!({
            "personal_id": personal.profile_id,
            "starts_at": at(11, 30),
            "ends_at": at(12, 30),
        })),
    )
    .await;
    assert_eq!(overlapping.status, StatusCode::CONFLICT);

    let outside = send(
        &app,
        Method::POST,
        "/api/v1/appointments",
        Some(&student.bearer),
        Some(json!({
            "personal_id": personal.profile_id,
            "starts_at": at(15, 0),
            "ends_at": at(16, 0),
        })),
    )
    .await;
    assert_eq!(outside.status, StatusCode::CONFLICT);

    let student_confirms = send(
        &app,
        Method::PUT,
        &format!("/api/v1/appointments/{appointment_id}/status"),
        Some(&student.bearer),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(student_confirms.status, StatusCode::FORBIDDEN);

    let confirmed = send(
        &app,
        Method::PUT,
        &format!("/api/v1/appointments/{appointment_id}/status"),
        Some(&personal.bearer),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(confirmed.status, StatusCode::OK, "{}", confirmed.body);
    assert_eq!(confirmed.body["status"], "confirmed");

    let calendar = send(
        &app,
        Method::GET,
        &format!("/api/v1/calendar/day?date={day}"),
        Some(&personal.bearer),
        None,
    )
    .await;
    assert_eq!(calendar.status, StatusCode::OK, "{}", calendar.body);
    assert_eq!(calendar.body["days"].as_array().map(Vec::len), Some(1));

    let entries = calendar.body["days"][0]["entries"].as_array().unwrap();
    let appointment = entries
        .iter()
        .find(|e| e["kind"] == "appointment")
        .expect("appointment on the calendar");
    // 11:00 is five hours below the 06:00 grid start
    assert_eq!(appointment["top_offset_minutes"], 300);
    assert_eq!(appointment["duration_minutes"], 60);
    assert!(entries.iter().any(|e| e["kind"] == "availability"));
    assert_eq!(calendar.body["days"][0]["cells"].as_array().map(Vec::len), Some(32));
}

#[tokio::test]
async fn finance_summary_groups_categories() {
    let Some((app, _pool)) = database_app().await else {
        return;
    };

    let personal = register(&app, "personal").await;
    let today = Utc::now().date_naive();

    for (kind, category, amount) in [
        ("income", "Sessions", 120.0),
        ("income", "sessions", 80.0),
        ("expense", "Equipment", 45.5),
    ] {
        let created = send(
            &app,
            Method::POST,
            "/api/v1/finance/records",
            Some(&personal.bearer),
            Some(json!({
                "kind": kind,
                "category": category,
                "amount": amount,
                "occurred_on": today,
            })),
        )
        .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    }

    let summary = send(
        &app,
        Method::GET,
        &format!("/api/v1/finance/summary?from={today}&to={today}"),
        Some(&personal.bearer),
        None,
    )
    .await;
    assert_eq!(summary.status, StatusCode::OK, "{}", summary.body);
    assert_eq!(summary.body["total_income"], 200.0);
    assert_eq!(summary.body["total_expense"], 45.5);
    assert_eq!(summary.body["balance"], 154.5);
}

async fn hire(app: &Router, personal: &TestAccount, student: &TestAccount) {
    let hired = send(
        app,
        Method::POST,
        &format!("/api/v1/personals/{}/hire", personal.profile_id),
        Some(&student.bearer),
        None,
    )
    .await;
    assert_eq!(hired.status, StatusCode::OK, "{}", hired.body);
}

#[tokio::test]
async fn concurrent_reviews_keep_the_rating_aggregate_exact() {
    let Some((app, _pool)) = database_app().await else {
        return;
    };

    let personal = register(&app, "personal").await;
    let first = register(&app, "student").await;
    let second = register(&app, "student").await;
    hire(&app, &personal, &first).await;
    hire(&app, &personal, &second).await;

    let reviews_uri = format!("/api/v1/personals/{}/reviews", personal.profile_id);
    let (a, b) = tokio::join!(
        send(&app, Method::POST, &reviews_uri, Some(&first.bearer), Some(json!({ "rating": 5 }))),
        send(&app, Method::POST, &reviews_uri, Some(&second.bearer), Some(json!({ "rating": 2, "comment": "Late twice" }))),
    );
    assert_eq!(a.status, StatusCode::CREATED, "{}", a.body);
    assert_eq!(b.status, StatusCode::CREATED, "{}", b.body);

    let duplicate = send(&app, Method::POST, &reviews_uri, Some(&first.bearer), Some(json!({ "rating": 1 }))).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let outsider = register(&app, "student").await;
    let unrelated = send(&app, Method::POST, &reviews_uri, Some(&outsider.bearer), Some(json!({ "rating": 1 }))).await;
    assert_eq!(unrelated.status, StatusCode::FORBIDDEN);

    let detail = send(
        &app,
        Method::GET,
        &format!("/api/v1/personals/{}", personal.profile_id),
        None,
        None,
    )
    .await;
    assert_eq!(detail.status, StatusCode::OK, "{}", detail.body);
    assert_eq!(detail.body["profile"]["review_count"], 2);
    assert_eq!(detail.body["profile"]["average_rating"], 3.5);
    assert_eq!(detail.body["recent_reviews"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn purchases_book_store_income_except_for_free_products() {
    let Some((app, _pool)) = database_app().await else {
        return;
    };

    let personal = register(&app, "personal").await;
    let student = register(&app, "student").await;

    let mut product_ids = Vec::new();
    for (name, price) in [("12 week plan", 49.9), ("Mobility guide", 0.0)] {
        let created = send(
            &app,
            Method::POST,
            "/api/v1/store/products",
            Some(&personal.bearer),
            Some(json!({ "name": name, "price": price })),
        )
        .await;
        assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
        product_ids.push(created.body["id"].as_str().unwrap().to_string());
    }

    for product_id in &product_ids {
        let order = send(
            &app,
            Method::POST,
            &format!("/api/v1/store/products/{product_id}/purchase"),
            Some(&student.bearer),
            None,
        )
        .await;
        assert_eq!(order.status, StatusCode::CREATED, "{}", order.body);
        assert_eq!(order.body["student_id"], json!(student.profile_id));
    }

    let orders = send(&app, Method::GET, "/api/v1/store/orders", Some(&student.bearer), None).await;
    assert_eq!(orders.status, StatusCode::OK);
    assert_eq!(orders.body.as_array().map(Vec::len), Some(2));

    let records = send(&app, Method::GET, "/api/v1/finance/records", Some(&personal.bearer), None).await;
    assert_eq!(records.status, StatusCode::OK, "{}", records.body);
    let records = records.body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["kind"], "income");
    assert_eq!(records[0]["category"], "Store");
    assert_eq!(records[0]["amount"], 49.9);
    assert_eq!(records[0]["student_id"], json!(student.profile_id));

    let personal_buys = send(
        &app,
        Method::POST,
        &format!("/api/v1/store/products/{}/purchase", product_ids[0]),
        Some(&personal.bearer),
        None,
    )
    .await;
    assert_eq!(personal_buys.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn quotes_are_answered_once() {
    let Some((app, _pool)) = database_app().await else {
        return;
    };

    let personal = register(&app, "personal").await;
    let student = register(&app, "student").await;
    let ask = json!({
        "personal_id": personal.profile_id,
        "message": "Looking for three sessions a week",
        "sessions_per_week": 3,
    });

    let first = send(&app, Method::POST, "/api/v1/quotes", Some(&student.bearer), Some(ask.clone())).await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);
    assert_eq!(first.body["status"], "pending");
    let first_id = first.body["id"].as_str().unwrap().to_string();

    let pending_again = send(&app, Method::POST, "/api/v1/quotes", Some(&student.bearer), Some(ask.clone())).await;
    assert_eq!(pending_again.status, StatusCode::CONFLICT);

    let unpriced = send(
        &app,
        Method::POST,
        &format!("/api/v1/quotes/{first_id}/respond"),
        Some(&personal.bearer),
        Some(json!({ "accept": true })),
    )
    .await;
    assert_eq!(unpriced.status, StatusCode::BAD_REQUEST);

    let accepted = send(
        &app,
        Method::POST,
        &format!("/api/v1/quotes/{first_id}/respond"),
        Some(&personal.bearer),
        Some(json!({ "accept": true, "proposed_price": 240.0, "response_message": "Monthly package" })),
    )
    .await;
    assert_eq!(accepted.status, StatusCode::OK, "{}", accepted.body);
    assert_eq!(accepted.body["status"], "accepted");
    assert_eq!(accepted.body["proposed_price"], 240.0);

    let declined_late = send(
        &app,
        Method::POST,
        &format!("/api/v1/quotes/{first_id}/respond"),
        Some(&personal.bearer),
        Some(json!({ "accept": false })),
    )
    .await;
    assert_eq!(declined_late.status, StatusCode::UNPROCESSABLE_ENTITY);

    // Once answered, a new request may be opened and declined
    let second = send(&app, Method::POST, "/api/v1/quotes", Some(&student.bearer), Some(ask)).await;
    assert_eq!(second.status, StatusCode::CREATED, "{}", second.body);
    let second_id = second.body["id"].as_str().unwrap().to_string();

    let declined = send(
        &app,
        Method::POST,
        &format!("/api/v1/quotes/{second_id}/respond"),
        Some(&personal.bearer),
        Some(json!({ "accept": false })),
    )
    .await;
    assert_eq!(declined.status, StatusCode::OK, "{}", declined.body);
    assert_eq!(declined.body["status"], "declined");

    let sent = send(&app, Method::GET, "/api/v1/quotes/sent", Some(&student.bearer), None).await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body.as_array().map(Vec::len), Some(2));
}
