use axum::extract::{FromRequest, Request};
use axum::Json;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use facturo_auth::{NewUser, UserChanges, UserProfile};
use facturo_core::{DomainResult, UserId};
use facturo_infra::ServiceError;
use facturo_invoicing::{
    InvoiceChanges, InvoiceLineChanges, InvoiceStatus, NewInvoice, NewInvoiceLine,
    deserialize_some,
};

use crate::app::errors::ApiError;

// -------------------------
// Extractors
// -------------------------

/// JSON body whose parse failures are reported as validation errors.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            ServiceError::Validation(vec![format!("invalid JSON body: {}", rejection.body_text())])
        })?;
        Ok(Self(value))
    }
}

/// JSON body that also passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(value) = JsonBody::<T>::from_request(req, state).await?;
        value
            .validate()
            .map_err(|errors| ServiceError::Validation(validation_messages(&errors)))?;
        Ok(Self(value))
    }
}

/// Flatten `validator` output into one message per failed rule, sorted.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages = Vec::new();
    collect_messages(errors, None, &mut messages);
    messages.sort();
    messages
}

fn collect_messages(errors: &ValidationErrors, prefix: Option<&str>, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let message = match &failure.message {
                        Some(message) => message.to_string(),
                        None => format!("{field} is invalid ({})", failure.code),
                    };
                    out.push(match prefix {
                        Some(prefix) => format!("{prefix}: {message}"),
                        None => message,
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect_messages(inner, Some(&field.to_string()), out)
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_messages(inner, Some(&format!("{field}[{index}]")), out);
                }
            }
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

impl From<RegisterRequest> for NewUser {
    fn from(value: RegisterRequest) -> Self {
        NewUser {
            name: value.name,
            email: value.email,
            password: value.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
}

impl From<UpdateProfileRequest> for UserChanges {
    fn from(value: UpdateProfileRequest) -> Self {
        UserChanges {
            name: value.name,
            email: value.email,
            password: value.password,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    #[validate(length(min = 3, message = "name is required and must be at least 3 characters"))]
    pub name: String,
    pub issuer_name: Option<String>,
    pub issuer_address: Option<String>,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub vat_active: Option<bool>,
    #[validate(range(min = 0.0, max = 100.0, message = "vatRate must be between 0 and 100"))]
    pub vat_rate: Option<f64>,
    pub user_id: Option<UserId>,
}

impl CreateInvoiceRequest {
    /// The owner defaults to the authenticated caller.
    pub fn into_new_invoice(self, caller: UserId) -> NewInvoice {
        NewInvoice {
            name: self.name,
            issuer_name: self.issuer_name,
            issuer_address: self.issuer_address,
            client_name: self.client_name,
            client_address: self.client_address,
            vat_active: self.vat_active,
            vat_rate: self.vat_rate,
            user_id: Some(self.user_id.unwrap_or(caller)),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub issuer_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub issuer_address: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub client_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub client_address: Option<Option<String>>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub vat_active: Option<bool>,
    #[validate(range(min = 0.0, max = 100.0, message = "vatRate must be between 0 and 100"))]
    pub vat_rate: Option<f64>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub user_id: Option<Option<UserId>>,
}

impl UpdateInvoiceRequest {
    pub fn into_changes(self) -> DomainResult<InvoiceChanges> {
        let status = self.status.as_deref().map(InvoiceStatus::parse).transpose()?;
        Ok(InvoiceChanges {
            name: self.name,
            issuer_name: self.issuer_name,
            issuer_address: self.issuer_address,
            client_name: self.client_name,
            client_address: self.client_address,
            invoice_date: self.invoice_date,
            due_date: self.due_date,
            vat_active: self.vat_active,
            vat_rate: self.vat_rate,
            status,
            user_id: self.user_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLineRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[validate(
        required(message = "quantity is required"),
        range(
            min = 0.0,
            max = 1_000_000_000_000.0,
            message = "quantity must be a positive number up to 1e12"
        )
    )]
    pub quantity: Option<f64>,
    #[validate(
        required(message = "unitPrice is required"),
        range(
            min = 0.0,
            max = 1_000_000_000_000.0,
            message = "unitPrice must be a positive number up to 1e12"
        )
    )]
    pub unit_price: Option<f64>,
}

impl CreateLineRequest {
    /// Only meaningful once validated: both amounts are then present.
    pub fn into_new_line(self) -> NewInvoiceLine {
        NewInvoiceLine {
            description: self.description,
            quantity: self.quantity.unwrap_or_default(),
            unit_price: self.unit_price.unwrap_or_default(),
        }
    }
}

/// Validate every line of a bulk payload, prefixing messages with the index.
pub fn validate_lines(lines: &[CreateLineRequest]) -> Result<(), ServiceError> {
    let messages: Vec<String> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| line.validate().err().map(|errors| (index, errors)))
        .flat_map(|(index, errors)| {
            validation_messages(&errors)
                .into_iter()
                .map(move |message| format!("lines[{index}]: {message}"))
        })
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::Validation(messages))
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLineRequest {
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: Option<String>,
    #[validate(range(
        min = 0.0,
        max = 1_000_000_000_000.0,
        message = "quantity must be a positive number up to 1e12"
    ))]
    pub quantity: Option<f64>,
    #[validate(range(
        min = 0.0,
        max = 1_000_000_000_000.0,
        message = "unitPrice must be a positive number up to 1e12"
    ))]
    pub unit_price: Option<f64>,
}

impl From<UpdateLineRequest> for InvoiceLineChanges {
    fn from(value: UpdateLineRequest) -> Self {
        InvoiceLineChanges {
            description: value.description,
            quantity: value.quantity,
            unit_price: value.unit_price,
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: &'static str,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
