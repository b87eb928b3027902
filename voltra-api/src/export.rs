use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use voltra_core::identity::Permission;
use voltra_offer::dto::BulkFilter;
use voltra_offer::{ExportMode, ExportOutput};

use crate::{error::AppError, middleware::auth::AuthSeller, state::AppState};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub filter: BulkFilter,
    #[serde(default = "default_mode")]
    pub mode: ExportMode,
}

fn default_mode() -> ExportMode {
    ExportMode::File
}

/// POST /v1/offers/export
/// Runs the export for the caller's business and answers according to the
/// requested mode: a stored file path, the workbook bytes as an attachment,
/// a CSV body, or the raw row matrix.
pub async fn export(
    State(state): State<AppState>,
    AuthSeller(actor): AuthSeller,
    Json(req): Json<ExportRequest>,
) -> Result<Response, AppError> {
    if !actor.has(Permission::ExportOffers) && !actor.has(Permission::AdminOffers) {
        return Err(AppError::AuthorizationError(
            "export permission required".to_string(),
        ));
    }

    let output = state
        .exports
        .export(&actor, &req.filter, req.mode)
        .await
        .map_err(AppError::offer)?;
    state.metrics.offers_exported.inc();

    let response = match output {
        ExportOutput::File { path } => Json(json!({ "path": path })).into_response(),
        ExportOutput::Download { path, bytes } => {
            let filename = path.rsplit('/').next().unwrap_or("export.xlsx").to_string();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        ExportOutput::Stream { csv } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv".to_string())],
            csv,
        )
            .into_response(),
        ExportOutput::Rows { header, rows } => {
            Json(json!({ "header": header, "rows": rows })).into_response()
        }
    };

    Ok(response)
}
