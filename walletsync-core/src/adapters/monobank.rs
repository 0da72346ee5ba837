//! Monobank personal API client
//!
//! Implements the `BankApi` port over HTTP. Authorized endpoints take the
//! personal token in the `X-Token` header; the currency table is public.
//!
//! API Documentation: https://api.monobank.ua/docs/

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::domain::result::{Error, Result};
use crate::ports::{BankApi, ClientInfo, CurrencyRateItem, StatementItem};

/// Default production API URL
const MONOBANK_PRODUCTION_URL: &str = "https://api.monobank.ua";

/// Environment variable to override the API base URL (staging, mocks)
pub const BASE_URL_ENV: &str = "WALLETSYNC_BASE_URL";

/// Default transport timeouts
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Get the API base URL, checking the environment variable first
pub fn get_base_url() -> String {
    std::env::var(BASE_URL_ENV).unwrap_or_else(|_| MONOBANK_PRODUCTION_URL.to_string())
}

/// Monobank API client
#[derive(Debug, Clone)]
pub struct MonobankClient {
    client: Client,
    base_url: String,
    read_timeout: Duration,
}

impl MonobankClient {
    /// Create a client for the production API (or `WALLETSYNC_BASE_URL`)
    pub fn new() -> Result<Self> {
        Self::with_options(&get_base_url(), DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Create a client with an explicit base URL and timeouts
    pub fn with_options(
        base_url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            read_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a path and decode its JSON body
    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", path);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header("X-Token", token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        check_response_status(response.status())?;

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Data(format!("Failed to parse response from {}: {}", path, e)))
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::transport(format!(
                "Request timed out after {} seconds",
                self.read_timeout.as_secs()
            ))
        } else if error.is_connect() {
            Error::transport("Unable to connect to the bank API")
        } else {
            Error::transport(format!("Bank API request failed: {}", error))
        }
    }
}

/// Check response status and return the matching error class
fn check_response_status(status: StatusCode) -> Result<()> {
    match status.as_u16() {
        200..=299 => Ok(()),
        401 | 403 => Err(Error::Unauthorized(
            "The API token was rejected. It may be invalid or revoked.".to_string(),
        )),
        429 => Err(Error::RateLimited(
            "Too many requests. Wait before calling the API again.".to_string(),
        )),
        404 => Err(Error::transport("Bank API resource not found")),
        code => Err(Error::transport(format!("Bank API error: HTTP {}", code))),
    }
}

#[async_trait]
impl BankApi for MonobankClient {
    async fn client_info(&self, token: &str) -> Result<ClientInfo> {
        self.get_json("/personal/client-info", Some(token)).await
    }

    async fn statement(
        &self,
        token: &str,
        account_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<StatementItem>> {
        let path = format!("/personal/statement/{}/{}/{}", account_id, from, to);
        self.get_json(&path, Some(token)).await
    }

    async fn currency_rates(&self) -> Result<Vec<CurrencyRateItem>> {
        self.get_json("/bank/currency", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::monobank_mock::{MockConfig, MockMonobankServer};
    use rust_decimal_macros::dec;

    fn client_for(server: &MockMonobankServer) -> MonobankClient {
        MonobankClient::with_options(
            &server.base_url(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_reject_empty_base_url() {
        let result = MonobankClient::with_options(" ", DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = MonobankClient::with_options(
            "http://localhost/api/",
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_READ_TIMEOUT,
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost/api");
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_response_status(StatusCode::OK).is_ok());
        assert!(matches!(
            check_response_status(StatusCode::UNAUTHORIZED),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            check_response_status(StatusCode::FORBIDDEN),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            check_response_status(StatusCode::TOO_MANY_REQUESTS),
            Err(Error::RateLimited(_))
        ));
        assert!(matches!(
            check_response_status(StatusCode::BAD_GATEWAY),
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_client_info_from_mock() {
        let server = MockMonobankServer::start(MockConfig {
            num_accounts: 2,
            ..Default::default()
        })
        .unwrap();

        let info = client_for(&server).client_info("valid_token").await.unwrap();
        assert_eq!(info.accounts.len(), 2);
        assert_eq!(info.accounts[0].currency_code, 980);
    }

    #[tokio::test]
    async fn test_statement_from_mock() {
        let server = MockMonobankServer::start(MockConfig {
            num_transactions_per_account: 7,
            ..Default::default()
        })
        .unwrap();

        let items = client_for(&server)
            .statement("valid_token", "acc_1", 1_700_000_000, 1_700_086_400)
            .await
            .unwrap();
        assert_eq!(items.len(), 7);
        assert!(items.iter().all(|i| i.id.starts_with("acc_1_")));
    }

    #[tokio::test]
    async fn test_currency_rates_need_no_token() {
        let server = MockMonobankServer::start(MockConfig {
            fail_auth: true,
            ..Default::default()
        })
        .unwrap();

        let rates = client_for(&server).currency_rates().await.unwrap();
        assert!(!rates.is_empty());
        assert_eq!(rates[0].rate_buy, Some(dec!(41.1)));
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_unauthorized() {
        let server = MockMonobankServer::start(MockConfig {
            fail_auth: true,
            ..Default::default()
        })
        .unwrap();

        let result = client_for(&server).client_info("valid_token").await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let server = MockMonobankServer::start(MockConfig {
            rate_limit: true,
            ..Default::default()
        })
        .unwrap();

        let result = client_for(&server)
            .statement("valid_token", "acc_1", 0, 10)
            .await;
        assert!(matches!(result, Err(Error::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_data_error() {
        let server = MockMonobankServer::start(MockConfig {
            malformed_body: true,
            ..Default::default()
        })
        .unwrap();

        let result = client_for(&server).client_info("valid_token").await;
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_transport() {
        let client = MonobankClient::with_options(
            "http://127.0.0.1:1",
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .unwrap();
        let result = client.currency_rates().await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
