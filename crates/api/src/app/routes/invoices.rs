use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

use facturo_core::InvoiceId;
use facturo_infra::InvoiceWithLines;
use facturo_invoicing::{Invoice, InvoiceSummary};

use crate::app::dto::{self, JsonBody, ValidatedJson};
use crate::app::errors::{parse_id, ApiResult};
use crate::app::routes::lines;
use crate::app::services::AppServices;
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route(
            "/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/:id/status", put(update_invoice_status))
        .route("/:id/pdf", get(invoice_pdf))
        .route("/:id/lines", post(lines::create_line).get(lines::list_lines))
        .route("/:id/lines/bulk", post(lines::bulk_create_lines))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<UserContext>,
    ValidatedJson(body): ValidatedJson<dto::CreateInvoiceRequest>,
) -> ApiResult<Response> {
    let invoice = services
        .invoices
        .create_invoice(body.into_new_invoice(caller.user_id()))
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)).into_response())
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
) -> ApiResult<Json<Vec<InvoiceSummary>>> {
    Ok(Json(services.invoices.list_invoices().await?))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceWithLines>> {
    let id: InvoiceId = parse_id(&id, "invoice")?;
    Ok(Json(services.invoices.get_invoice_with_lines(id).await?))
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<dto::UpdateInvoiceRequest>,
) -> ApiResult<Json<Invoice>> {
    let id: InvoiceId = parse_id(&id, "invoice")?;
    let changes = body.into_changes()?;
    Ok(Json(services.invoices.update_invoice(id, changes).await?))
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Json<dto::MessageResponse>> {
    let id: InvoiceId = parse_id(&id, "invoice")?;
    services.invoices.delete_invoice(id).await?;
    Ok(Json(dto::MessageResponse {
        message: "invoice deleted",
    }))
}

pub async fn update_invoice_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<dto::UpdateStatusRequest>,
) -> ApiResult<Json<Invoice>> {
    let id: InvoiceId = parse_id(&id, "invoice")?;
    Ok(Json(
        services
            .invoices
            .update_invoice_status(id, &body.status)
            .await?,
    ))
}

pub async fn invoice_pdf(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id: InvoiceId = parse_id(&id, "invoice")?;
    let pdf = services.invoices.render_pdf(id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "attachment; filename=facture.pdf"),
        ],
        pdf,
    )
        .into_response())
}
