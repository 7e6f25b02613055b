use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use facturo_core::{InvoiceId, InvoiceLineId};
use facturo_invoicing::InvoiceLine;

use crate::app::dto::{self, JsonBody, ValidatedJson};
use crate::app::errors::{parse_id, ApiResult};
use crate::app::services::AppServices;

/// `/lines/:id`. Creation and listing hang off the owning invoice's routes.
pub fn router() -> Router {
    Router::new().route("/:id", get(get_line).put(update_line).delete(delete_line))
}

pub async fn create_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(invoice_id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::CreateLineRequest>,
) -> ApiResult<Response> {
    let invoice_id: InvoiceId = parse_id(&invoice_id, "invoice")?;
    let line = services
        .lines
        .create_line(invoice_id, body.into_new_line())
        .await?;
    Ok((StatusCode::CREATED, Json(line)).into_response())
}

/// The body is a JSON array of lines; every line goes to the invoice in the path.
pub async fn bulk_create_lines(
    Extension(services): Extension<Arc<AppServices>>,
    Path(invoice_id): Path<String>,
    JsonBody(body): JsonBody<Vec<dto::CreateLineRequest>>,
) -> ApiResult<Response> {
    let invoice_id: InvoiceId = parse_id(&invoice_id, "invoice")?;
    dto::validate_lines(&body)?;

    let inputs = body.into_iter().map(dto::CreateLineRequest::into_new_line).collect();
    let lines = services.lines.bulk_create_lines(invoice_id, inputs).await?;
    Ok((StatusCode::CREATED, Json(lines)).into_response())
}

pub async fn list_lines(
    Extension(services): Extension<Arc<AppServices>>,
    Path(invoice_id): Path<String>,
) -> ApiResult<Json<Vec<InvoiceLine>>> {
    let invoice_id: InvoiceId = parse_id(&invoice_id, "invoice")?;
    Ok(Json(services.lines.list_lines(invoice_id).await?))
}

pub async fn get_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceLine>> {
    let id: InvoiceLineId = parse_id(&id, "line")?;
    Ok(Json(services.lines.get_line(id).await?))
}

pub async fn update_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::UpdateLineRequest>,
) -> ApiResult<Json<InvoiceLine>> {
    let id: InvoiceLineId = parse_id(&id, "line")?;
    Ok(Json(services.lines.update_line(id, body.into()).await?))
}

pub async fn delete_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<dto::MessageResponse>> {
    let id: InvoiceLineId = parse_id(&id, "line")?;
    services.lines.delete_line(id).await?;
    Ok(Json(dto::MessageResponse {
        message: "line deleted",
    }))
}
