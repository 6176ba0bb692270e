//! Lab worker and pharmacist dashboards.

use crate::outcome::refuse_to;
use crate::AppState;
use api_shared::{Notice, NoticeParams};
use axum::extract::{Extension, Query, State};
use axum::response::{Json, Response};
use hms_core::repositories::catalog::{CatalogService, LabTest, Medicine};
use hms_core::Actor;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LabWorkerDashboard {
    pub notice: Option<Notice>,
    pub lab_tests: Vec<LabTest>,
}

#[derive(Debug, Serialize)]
pub struct PharmacistDashboard {
    pub notice: Option<Notice>,
    pub medicines: Vec<Medicine>,
}

#[utoipa::path(
    get,
    path = "/dashboard/labworker",
    params(NoticeParams),
    responses((status = 200, description = "Available lab tests"))
)]
#[axum::debug_handler]
pub async fn lab_worker_dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<LabWorkerDashboard>, Response> {
    let lab_tests = CatalogService::new(state.db.clone())
        .list_lab_tests(&actor)
        .await
        .map_err(refuse_to("/login"))?;
    Ok(Json(LabWorkerDashboard {
        notice: params.into_notice(),
        lab_tests,
    }))
}

#[utoipa::path(
    get,
    path = "/dashboard/pharmacist",
    params(NoticeParams),
    responses((status = 200, description = "Medicine stock"))
)]
#[axum::debug_handler]
pub async fn pharmacist_dashboard(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<NoticeParams>,
) -> Result<Json<PharmacistDashboard>, Response> {
    let medicines = CatalogService::new(state.db.clone())
        .list_medicines(&actor)
        .await
        .map_err(refuse_to("/login"))?;
    Ok(Json(PharmacistDashboard {
        notice: params.into_notice(),
        medicines,
    }))
}
