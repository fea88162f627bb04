mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;

use learnhub_api::app::AppSettings;
use learnhub_api::auth::Role;
use learnhub_api::progress::{CatalogTotals, ProgressStore};

use common::{token, TestApp};

#[tokio::test]
async fn new_learner_sees_zero_state() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(5, 4, 2));
    let learner = token("learner-1", Role::Learner);

    let (status, body) = app.get("/api/progress/stats", Some(&learner)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["stats"],
        json!({
            "modules": { "total": 5, "completed": 0, "percentage": 0 },
            "quizzes": { "total": 4, "completed": 0, "percentage": 0 },
            "simulations": { "total": 2, "completed": 0, "percentage": 0 },
            "overall": 0
        })
    );
    assert_eq!(body["data"]["progress"]["modules"], json!([]));

    // reading never creates a record
    assert_eq!(app.store.get_progress("learner-1").await?, None);
    Ok(())
}

#[tokio::test]
async fn completions_roll_up_into_stats() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(2, 10, 4));
    let learner = token("learner-1", Role::Learner);

    let (status, _) = app.post("/api/progress/modules/m1", Some(&learner), json!({})).await?;
    assert_eq!(status, StatusCode::CREATED);

    for quiz in ["q1", "q2", "q3"] {
        let (status, _) = app
            .post(&format!("/api/progress/quizzes/{}", quiz), Some(&learner), json!({ "score": 80, "passed": true }))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }
    app.post("/api/progress/quizzes/q4", Some(&learner), json!({ "score": 10, "passed": false }))
        .await?;

    for sim in ["s1", "s2", "s3", "s4"] {
        app.post(&format!("/api/progress/simulations/{}", sim), Some(&learner), json!({ "outcome": { "ok": true } }))
            .await?;
    }

    let (status, body) = app.get("/api/progress/stats", Some(&learner)).await?;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"]["stats"];
    assert_eq!(stats["modules"]["percentage"], 50);
    assert_eq!(stats["quizzes"]["completed"], 3);
    assert_eq!(stats["quizzes"]["percentage"], 30);
    assert_eq!(stats["simulations"]["percentage"], 100);
    assert_eq!(stats["overall"], 60);
    assert_eq!(body["data"]["progress"]["quizzes"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn repeat_completion_does_not_duplicate() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(1, 1, 0));
    let learner = token("learner-1", Role::Learner);

    app.post("/api/progress/quizzes/q1", Some(&learner), json!({ "score": 30, "passed": false }))
        .await?;
    let (_, body) = app
        .post("/api/progress/quizzes/q1", Some(&learner), json!({ "score": 95, "passed": true }))
        .await?;

    let quizzes = body["data"]["progress"]["quizzes"].as_array().cloned().unwrap_or_default();
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0]["score"], 95);
    assert_eq!(quizzes[0]["passed"], true);
    Ok(())
}

#[tokio::test]
async fn progress_is_scoped_to_the_caller() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(3, 0, 0));

    app.post("/api/progress/modules/m1", Some(&token("alice", Role::Learner)), json!({}))
        .await?;

    let (_, body) = app.get("/api/progress", Some(&token("bob", Role::Learner))).await?;
    assert_eq!(body["data"]["progress"]["learnerId"], "bob");
    assert_eq!(body["data"]["progress"]["modules"], json!([]));

    let (_, body) = app.get("/api/progress", Some(&token("alice", Role::Learner))).await?;
    assert_eq!(body["data"]["progress"]["modules"][0]["moduleId"], "m1");
    Ok(())
}

#[tokio::test]
async fn out_of_range_quiz_score_is_rejected() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(0, 1, 0));
    let learner = token("learner-1", Role::Learner);

    let (status, body) = app
        .post("/api/progress/quizzes/q1", Some(&learner), json!({ "score": 140, "passed": true }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.store.get_progress("learner-1").await?, None);
    Ok(())
}

#[tokio::test]
async fn malformed_submission_bodies_use_error_envelope() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(0, 1, 1));
    let learner = token("learner-1", Role::Learner);

    // missing `passed`
    let (status, body) = app
        .post("/api/progress/quizzes/q1", Some(&learner), json!({ "score": 80 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let request = Request::post("/api/progress/simulations/s1")
        .header(header::AUTHORIZATION, format!("Bearer {}", learner))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = app.request(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    assert_eq!(app.store.get_progress("learner-1").await?, None);
    Ok(())
}

#[tokio::test]
async fn unpublished_content_can_push_past_one_hundred() -> Result<()> {
    let app = TestApp::new(CatalogTotals::new(3, 0, 0));
    let learner = token("learner-1", Role::Learner);
    for module in ["m1", "m2", "m3"] {
        app.post(&format!("/api/progress/modules/{}", module), Some(&learner), json!({}))
            .await?;
    }
    app.store.set_catalog(CatalogTotals::new(2, 0, 0)).await;

    let (_, body) = app.get("/api/progress/stats", Some(&learner)).await?;
    assert_eq!(body["data"]["stats"]["modules"]["percentage"], 150);
    Ok(())
}

#[tokio::test]
async fn display_clamp_caps_percentages_when_enabled() -> Result<()> {
    let settings = AppSettings { clamp_display_percentages: true, ..AppSettings::default() };
    let app = TestApp::with_settings(CatalogTotals::new(3, 5, 5), settings);
    let learner = token("learner-1", Role::Learner);
    for module in ["m1", "m2", "m3"] {
        app.post(&format!("/api/progress/modules/{}", module), Some(&learner), json!({}))
            .await?;
    }
    app.store.set_catalog(CatalogTotals::new(2, 5, 5)).await;

    let (_, body) = app.get("/api/progress/stats", Some(&learner)).await?;
    let stats = &body["data"]["stats"];
    assert_eq!(stats["modules"]["percentage"], 100);
    assert_eq!(stats["modules"]["completed"], 3);
    // mean of the displayed 100, 0, 0
    assert_eq!(stats["overall"], 33);
    Ok(())
}
