//! HTTP client for the Fineract API
//!
//! Basic auth plus the tenant header on every call, with per-call
//! timeouts: the balance lookup and the journal/transaction posts carry
//! separate budgets because they sit on the authorization path.

use super::dtos::{
    AccountBalance, JournalEntryRequest, JournalEntryResponse, SavingsTransactionRequest,
    SavingsTransactionResponse,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Fineract returned status {0}")]
    Status(StatusCode),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

pub struct FineractClient {
    http: Client,
    base_url: String,
    tenant: String,
    username: String,
    password: String,
    balance_timeout: Duration,
    write_timeout: Duration,
}

impl FineractClient {
    pub fn new(
        base_url: impl Into<String>,
        tenant: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        balance_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            tenant: tenant.into(),
            username: username.into(),
            password: password.into(),
            balance_timeout,
            write_timeout,
        }
    }

    pub async fn account_balance(&self, savings_account_id: i64) -> ClientResult<AccountBalance> {
        let url = format!("{}/savingsaccounts/{}", self.base_url, savings_account_id);
        debug!("Fetching account balance: accountId={}", savings_account_id);

        self.get_json(self.request(Method::GET, &url).timeout(self.balance_timeout))
            .await
    }

    pub async fn create_journal_entry(
        &self,
        request: &JournalEntryRequest,
    ) -> ClientResult<JournalEntryResponse> {
        let url = format!("{}/journalentries", self.base_url);
        debug!("Creating journal entry: reference={}", request.reference_number);

        self.post_json(url, request).await
    }

    /// Withdrawal against a savings account (the actual debit of a
    /// committed clearing).
    pub async fn withdraw(
        &self,
        savings_account_id: i64,
        request: &SavingsTransactionRequest,
    ) -> ClientResult<SavingsTransactionResponse> {
        let url = format!(
            "{}/savingsaccounts/{}/transactions?command=withdrawal",
            self.base_url, savings_account_id
        );
        debug!(
            "Debiting account: accountId={}, amount={}",
            savings_account_id, request.transaction_amount
        );

        self.post_json(url, request).await
    }

    /// Deposit into a savings account (refund side of a reversal).
    pub async fn deposit(
        &self,
        savings_account_id: i64,
        request: &SavingsTransactionRequest,
    ) -> ClientResult<SavingsTransactionResponse> {
        let url = format!(
            "{}/savingsaccounts/{}/transactions?command=deposit",
            self.base_url, savings_account_id
        );
        debug!(
            "Crediting account: accountId={}, amount={}",
            savings_account_id, request.transaction_amount
        );

        self.post_json(url, request).await
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Fineract-Platform-TenantId", &self.tenant)
            .header("Content-Type", "application/json")
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> ClientResult<T> {
        self.get_json(
            self.request(Method::POST, &url)
                .timeout(self.write_timeout)
                .json(body),
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}
