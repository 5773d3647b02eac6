use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{CompanyId, CompanyStatus, LetterId, LetterStatus};
use super::repository::{
    CompanyQuery, CompanyRepository, CompanySort, EmailSender, LetterQuery, LetterRepository,
    PageRequest, DEFAULT_PAGE_LIMIT,
};
use super::service::{OutreachError, OutreachErrorKind, OutreachService, TOP_COMPANY_LIMIT};

type SharedService<C, L, E> = Arc<OutreachService<C, L, E>>;

/// Router exposing company review, letter drafting, delivery, and ingestion under `/api`.
pub fn outreach_router<C, L, E>(service: SharedService<C, L, E>) -> Router
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    Router::new()
        .route("/api/companies", get(list_companies_handler::<C, L, E>))
        .route("/api/companies/top-20", get(top_companies_handler::<C, L, E>))
        .route("/api/companies/:id", get(company_detail_handler::<C, L, E>))
        .route(
            "/api/companies/:id/approve",
            post(approve_company_handler::<C, L, E>),
        )
        .route(
            "/api/companies/:id/reject",
            post(reject_company_handler::<C, L, E>),
        )
        .route("/api/letters", get(list_letters_handler::<C, L, E>))
        .route(
            "/api/letters/generate/:company_id",
            post(generate_letter_handler::<C, L, E>),
        )
        .route(
            "/api/letters/:id",
            get(latest_letter_handler::<C, L, E>).put(update_letter_handler::<C, L, E>),
        )
        .route(
            "/api/letters/:id/approve",
            post(approve_letter_handler::<C, L, E>),
        )
        .route(
            "/api/letters/:id/reject",
            post(reject_letter_handler::<C, L, E>),
        )
        .route(
            "/api/emails/send/:company_id",
            post(send_email_handler::<C, L, E>),
        )
        .route(
            "/api/emails/status/:company_id",
            get(email_status_handler::<C, L, E>),
        )
        .route("/api/ingest", post(ingest_handler::<C, L, E>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompanyListParams {
    pub(crate) status: Option<String>,
    pub(crate) industry: Option<String>,
    pub(crate) min_score: Option<f64>,
    pub(crate) sort_by: Option<String>,
    pub(crate) page: Option<u32>,
    pub(crate) limit: Option<u32>,
}

impl CompanyListParams {
    pub(crate) fn into_query(self) -> Result<CompanyQuery, OutreachError> {
        let status = self
            .status
            .map(|raw| {
                CompanyStatus::parse(&raw).ok_or_else(|| {
                    OutreachError::InvalidArgument(format!(
                        "unknown status '{raw}': expected new, approved, rejected, sent or responded"
                    ))
                })
            })
            .transpose()?;

        if let Some(min) = self.min_score {
            if !(0.0..=100.0).contains(&min) {
                return Err(OutreachError::InvalidArgument(
                    "min_score must be between 0 and 100".to_string(),
                ));
            }
        }

        let sort = match self.sort_by {
            Some(raw) => CompanySort::parse(&raw).ok_or_else(|| {
                OutreachError::InvalidArgument(format!(
                    "unknown sort_by '{raw}': expected score_desc, score_asc, name_asc or name_desc"
                ))
            })?,
            None => CompanySort::default(),
        };

        Ok(CompanyQuery {
            status,
            industry: self.industry.filter(|value| !value.is_empty()),
            min_score: self.min_score,
            sort,
            page: page_request(self.page, self.limit)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LetterListParams {
    pub(crate) status: Option<String>,
    pub(crate) company_id: Option<u64>,
    pub(crate) page: Option<u32>,
    pub(crate) limit: Option<u32>,
}

impl LetterListParams {
    pub(crate) fn into_query(self) -> Result<LetterQuery, OutreachError> {
        let status = self
            .status
            .map(|raw| {
                LetterStatus::parse(&raw).ok_or_else(|| {
                    OutreachError::InvalidArgument(format!(
                        "unknown status '{raw}': expected draft, approved, rejected or sent"
                    ))
                })
            })
            .transpose()?;

        Ok(LetterQuery {
            status,
            company_id: self.company_id.map(CompanyId),
            page: page_request(self.page, self.limit)?,
        })
    }
}

fn page_request(page: Option<u32>, limit: Option<u32>) -> Result<PageRequest, OutreachError> {
    PageRequest::new(page.unwrap_or(1), limit.unwrap_or(DEFAULT_PAGE_LIMIT))
        .map_err(OutreachError::InvalidArgument)
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemplateParams {
    #[serde(default = "default_template")]
    pub(crate) template: String,
}

fn default_template() -> String {
    "formal".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DryRunParams {
    #[serde(default)]
    pub(crate) dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApprovalBody {
    pub(crate) comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RejectionBody {
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LetterApprovalBody {
    pub(crate) body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LetterUpdateBody {
    pub(crate) body: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendEmailBody {
    pub(crate) email: String,
}

pub(crate) async fn list_companies_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Query(params): Query<CompanyListParams>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    let result = params
        .into_query()
        .and_then(|query| service.list_companies(&query));
    respond(StatusCode::OK, result)
}

pub(crate) async fn top_companies_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(StatusCode::OK, service.top_companies(TOP_COMPANY_LIMIT))
}

pub(crate) async fn company_detail_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(id): Path<u64>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(StatusCode::OK, service.company_detail(CompanyId(id)))
}

pub(crate) async fn approve_company_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(id): Path<u64>,
    body: Option<Json<ApprovalBody>>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    let body = body.map(|Json(body)| body).unwrap_or_default();
    respond(
        StatusCode::OK,
        service.approve_company(CompanyId(id), body.comment.as_deref()),
    )
}

pub(crate) async fn reject_company_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(id): Path<u64>,
    body: Option<Json<RejectionBody>>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    let body = body.map(|Json(body)| body).unwrap_or_default();
    respond(
        StatusCode::OK,
        service.reject_company(CompanyId(id), body.reason.as_deref()),
    )
}

pub(crate) async fn list_letters_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Query(params): Query<LetterListParams>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    let result = params
        .into_query()
        .and_then(|query| service.list_letters(&query));
    respond(StatusCode::OK, result)
}

pub(crate) async fn generate_letter_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(company_id): Path<u64>,
    Query(params): Query<TemplateParams>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(
        StatusCode::CREATED,
        service.generate_letter(CompanyId(company_id), &params.template),
    )
}

pub(crate) async fn latest_letter_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(company_id): Path<u64>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(StatusCode::OK, service.latest_letter(CompanyId(company_id)))
}

pub(crate) async fn update_letter_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(id): Path<u64>,
    Json(payload): Json<LetterUpdateBody>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(
        StatusCode::OK,
        service.update_letter(LetterId(id), payload.body),
    )
}

pub(crate) async fn approve_letter_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(id): Path<u64>,
    body: Option<Json<LetterApprovalBody>>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    let body = body.map(|Json(body)| body).unwrap_or_default();
    respond(StatusCode::OK, service.approve_letter(LetterId(id), body.body))
}

pub(crate) async fn reject_letter_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(id): Path<u64>,
    body: Option<Json<RejectionBody>>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    let body = body.map(|Json(body)| body).unwrap_or_default();
    respond(StatusCode::OK, service.reject_letter(LetterId(id), body.reason))
}

pub(crate) async fn send_email_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(company_id): Path<u64>,
    Query(params): Query<DryRunParams>,
    Json(payload): Json<SendEmailBody>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(
        StatusCode::OK,
        service.send_email(CompanyId(company_id), &payload.email, params.dry_run),
    )
}

pub(crate) async fn email_status_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    Path(company_id): Path<u64>,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(StatusCode::OK, service.email_status(CompanyId(company_id)))
}

/// Accepts the raw scraper output, JSON array or newline-delimited.
pub(crate) async fn ingest_handler<C, L, E>(
    State(service): State<SharedService<C, L, E>>,
    body: String,
) -> Response
where
    C: CompanyRepository + 'static,
    L: LetterRepository + 'static,
    E: EmailSender + 'static,
{
    respond(
        StatusCode::CREATED,
        service.ingest(Cursor::new(body.into_bytes())),
    )
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, OutreachError>) -> Response {
    match result {
        Ok(value) => (status, Json(value)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) fn status_for(kind: OutreachErrorKind) -> StatusCode {
    match kind {
        OutreachErrorKind::NotFound => StatusCode::NOT_FOUND,
        OutreachErrorKind::InvalidArgument | OutreachErrorKind::PreconditionFailed => {
            StatusCode::BAD_REQUEST
        }
        OutreachErrorKind::Conflict => StatusCode::CONFLICT,
        OutreachErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_response(err: OutreachError) -> Response {
    let status = status_for(err.kind());
    if status.is_server_error() {
        error!(error = %err, "outreach request failed");
    }

    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
