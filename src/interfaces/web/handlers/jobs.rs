use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt::Write;

use super::super::AppState;
use crate::core::job::{Job, TIME_FORMAT};

/// Plain-text listing of every registered job.
pub async fn describe_jobs(State(state): State<AppState>) -> String {
    let mut out = String::from("===== registered job list ===== \n");
    for job in state.registry.jobs() {
        let _ = writeln!(
            out,
            "{} : {}, cron : {}",
            job.name(),
            job.description(),
            job.cron()
        );
    }
    out.push_str("===== registered jobs End ===== \n");
    out
}

/// Plain-text status of every registered job.
pub async fn job_statuses(State(state): State<AppState>) -> String {
    let mut out = String::from("===== job status list===== \n");
    for job in state.registry.jobs() {
        let snapshot = job.status();
        let _ = writeln!(
            out,
            "{} : {} (last success: {})",
            job.name(),
            snapshot.status,
            snapshot.last_success_display()
        );
    }
    out.push_str("===== job status list End ===== \n");
    out
}

fn job_json(job: &Job) -> serde_json::Value {
    let snapshot = job.status();
    serde_json::json!({
        "name": job.name(),
        "description": job.description(),
        "cron": job.cron(),
        "status": snapshot.status,
        "last_success": snapshot.last_success.map(|t| t.format(TIME_FORMAT).to_string()),
        "last_run": snapshot.last_run.map(|t| t.format(TIME_FORMAT).to_string()),
        "last_error": snapshot.last_error,
        "running": job.in_flight(),
    })
}

pub async fn get_jobs(State(state): State<AppState>) -> Json<serde_json::Value> {
    let jobs: Vec<_> = state.registry.jobs().iter().map(|job| job_json(job)).collect();
    Json(serde_json::json!({
        "success": true,
        "jobs": jobs
    }))
}

pub async fn get_job(Path(name): Path<String>, State(state): State<AppState>) -> Response {
    match state.registry.get(&name) {
        Some(job) => Json(serde_json::json!({
            "success": true,
            "job": job_json(job)
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "success": false,
                "error": format!("Job '{}' not found", name)
            })),
        )
            .into_response(),
    }
}
