//! HTTP surface
//!
//! Error bodies are `{error, status}`: 400 for validation, state and
//! insufficient-funds problems, 404 for unknown cards/accounts, 500
//! otherwise. A client-supplied `Idempotency-Key` header supersedes the
//! server-assigned key.

use crate::authorization::AuthorizationService;
use crate::cards::CardService;
use crate::errors::CardEngineError;
use crate::issuance::IssuanceService;
use crate::models::{
    AuthorizationApiResponse, AuthorizeTransactionRequest, CardApiResponse, CreateCardRequest,
    SettlementAmountQuery,
};
use crate::processor::webhooks::{AuthorizationWebhook, ClearingWebhook, ReversalWebhook};
use crate::processor::ProcessorAdapter;
use crate::settlement::{ClearingRequest, ReversalRequest, SettlementService};
use actix_web::{web, HttpRequest, HttpResponse};
use bank_adapters::BankAccountAdapter;
use card_core::authorization::{AuthorizationRequest, Merchant};
use card_core::idempotency;
use card_core::money::{Currency, Money};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

type Result<T> = std::result::Result<T, CardEngineError>;

fn idempotency_key(req: &HttpRequest) -> String {
    req.headers()
        .get("Idempotency-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(idempotency::generate)
}

pub async fn health_check(bank: web::Data<Arc<dyn BankAccountAdapter>>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "card-engine",
        "bankAdapter": bank.adapter_name(),
        "bankAdapterHealthy": bank.is_healthy().await,
    }))
}

// =========================================================================
// AUTHORIZATIONS
// =========================================================================

pub async fn authorize(
    service: web::Data<Arc<AuthorizationService>>,
    body: web::Json<AuthorizeTransactionRequest>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let currency = Currency::from_str(&body.currency)?;

    let request = AuthorizationRequest {
        authorization_id: Uuid::new_v4().to_string(),
        card_id: body.card_id,
        amount: Money::new(body.amount, currency),
        merchant: Merchant {
            name: body.merchant_name,
            category_code: body.merchant_category_code,
            city: body.merchant_city,
            country: body.merchant_country,
        },
        idempotency_key: idempotency_key(&req),
    };

    let response = service.authorize(request).await?;
    Ok(HttpResponse::Ok().json(AuthorizationApiResponse::from(response)))
}

pub async fn get_authorization(
    service: web::Data<Arc<AuthorizationService>>,
    authorization_id: web::Path<String>,
) -> Result<HttpResponse> {
    let authorization = service.get_authorization(&authorization_id).await?;
    Ok(HttpResponse::Ok().json(authorization))
}

// =========================================================================
// SETTLEMENT
// =========================================================================

pub async fn clear(
    service: web::Data<Arc<SettlementService>>,
    authorization_id: web::Path<String>,
    query: web::Query<SettlementAmountQuery>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let currency = Currency::from_str(&query.currency)?;

    service
        .clear(ClearingRequest {
            authorization_id: authorization_id.into_inner(),
            clearing_amount: Money::new(query.amount, currency),
            idempotency_key: idempotency_key(&req),
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub async fn release(
    service: web::Data<Arc<SettlementService>>,
    authorization_id: web::Path<String>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    service
        .release(&authorization_id, &idempotency_key(&req))
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub async fn reverse(
    service: web::Data<Arc<SettlementService>>,
    authorization_id: web::Path<String>,
    query: web::Query<SettlementAmountQuery>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let currency = Currency::from_str(&query.currency)?;

    service
        .reverse(ReversalRequest {
            authorization_id: authorization_id.into_inner(),
            reversal_amount: Money::new(query.amount, currency),
            idempotency_key: idempotency_key(&req),
        })
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

// =========================================================================
// CARDS
// =========================================================================

pub async fn create_card(
    service: web::Data<Arc<IssuanceService>>,
    body: web::Json<CreateCardRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let card = service
        .issue_card(
            &body.bank_client_ref,
            &body.bank_account_ref,
            &body.cardholder_name,
            body.expiration_date,
            body.issued_by.as_deref().unwrap_or("api"),
        )
        .await?;

    Ok(HttpResponse::Created().json(CardApiResponse::from(card)))
}

pub async fn get_card(
    service: web::Data<Arc<CardService>>,
    card_id: web::Path<String>,
) -> Result<HttpResponse> {
    let card = service.get_card(&card_id).await?;
    Ok(HttpResponse::Ok().json(CardApiResponse::from(card)))
}

pub async fn activate_card(
    service: web::Data<Arc<IssuanceService>>,
    card_id: web::Path<String>,
) -> Result<HttpResponse> {
    let card = service.activate(&card_id).await?;
    Ok(HttpResponse::Ok().json(CardApiResponse::from(card)))
}

pub async fn freeze_card(
    service: web::Data<Arc<CardService>>,
    card_id: web::Path<String>,
) -> Result<HttpResponse> {
    let card = service.freeze(&card_id).await?;
    Ok(HttpResponse::Ok().json(CardApiResponse::from(card)))
}

pub async fn unfreeze_card(
    service: web::Data<Arc<CardService>>,
    card_id: web::Path<String>,
) -> Result<HttpResponse> {
    let card = service.unfreeze(&card_id).await?;
    Ok(HttpResponse::Ok().json(CardApiResponse::from(card)))
}

pub async fn close_card(
    service: web::Data<Arc<CardService>>,
    card_id: web::Path<String>,
) -> Result<HttpResponse> {
    let card = service.close(&card_id).await?;
    Ok(HttpResponse::Ok().json(CardApiResponse::from(card)))
}

// =========================================================================
// PROCESSOR WEBHOOKS
// =========================================================================

pub async fn processor_authorize(
    adapter: web::Data<Arc<ProcessorAdapter>>,
    webhook: web::Json<AuthorizationWebhook>,
) -> HttpResponse {
    // Always a 200: declines are decisions, not transport failures.
    let response = adapter.handle_authorization(webhook.into_inner()).await;
    HttpResponse::Ok().json(response)
}

pub async fn processor_clear(
    adapter: web::Data<Arc<ProcessorAdapter>>,
    webhook: web::Json<ClearingWebhook>,
) -> Result<HttpResponse> {
    adapter.handle_clearing(webhook.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub async fn processor_reverse(
    adapter: web::Data<Arc<ProcessorAdapter>>,
    webhook: web::Json<ReversalWebhook>,
) -> Result<HttpResponse> {
    adapter.handle_reversal(webhook.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/authorizations", web::post().to(authorize))
        .route("/authorizations/{id}", web::get().to(get_authorization))
        .service(
            web::scope("/settlement")
                .route("/clear/{id}", web::post().to(clear))
                .route("/release/{id}", web::post().to(release))
                .route("/reverse/{id}", web::post().to(reverse)),
        )
        .service(
            web::scope("/cards")
                .route("", web::post().to(create_card))
                .route("/{id}", web::get().to(get_card))
                .route("/{id}/activate", web::post().to(activate_card))
                .route("/{id}/freeze", web::post().to(freeze_card))
                .route("/{id}/unfreeze", web::post().to(unfreeze_card))
                .route("/{id}/close", web::post().to(close_card)),
        )
        .service(
            web::scope("/webhooks/processor/sample")
                .route("/authorize", web::post().to(processor_authorize))
                .route("/clear", web::post().to(processor_clear))
                .route("/reverse", web::post().to(processor_reverse)),
        );
}
