use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::{CurrencyCode, ProviderQuote, QuoteProvider, QuoteSheet};

const RATES_PATH: &str = "/v1/exchange-rates/commercial";
const CONVERT_PATH: &str = "/v1/exchange-rates/commercial/convert";

/// Client for the TBC Bank commercial exchange-rate API.
///
/// Holds a single `reqwest::Client`, so clones of the provider and concurrent
/// background fetches share one connection pool.
#[derive(Clone)]
pub struct TbcProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl TbcProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent("exrate/0.1")
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(5 * 60))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(TbcProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn get(&self, url: &str, timeout: Option<Duration>) -> RequestBuilder {
        let request = self.client.get(url).header("apikey", &self.api_key);
        match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    async fn fetch_text(&self, url: &str, timeout: Option<Duration>) -> Result<String> {
        debug!("Requesting {}", url);
        let response = self
            .get(url, timeout)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for URL: {}", e, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("HTTP error: {} for URL: {} {}", status, url, body)
                .context("TBC rates request failed"));
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {url}"))
    }

    async fn fetch_sheet(&self, url: &str, timeout: Option<Duration>) -> Result<QuoteSheet> {
        let text = self.fetch_text(url, timeout).await?;
        let data: CommercialRatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse rates response from {}: {}", url, e))?;
        Ok(data.into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommercialRatesResponse {
    base: String,
    commercial_rates_list: Vec<CommercialRate>,
}

#[derive(Debug, Deserialize)]
struct CommercialRate {
    currency: String,
    buy: f64,
    sell: f64,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    value: f64,
}

impl From<CommercialRatesResponse> for QuoteSheet {
    fn from(response: CommercialRatesResponse) -> Self {
        QuoteSheet {
            base: response.base,
            quotes: response
                .commercial_rates_list
                .into_iter()
                .map(|r| ProviderQuote {
                    currency: r.currency,
                    bid: r.buy,
                    ask: r.sell,
                })
                .collect(),
        }
    }
}

/// Formats an amount for a query string: fixed point, at most ten decimals, no trailing zeros.
pub fn format_amount(amount: f64) -> String {
    if amount == 0.0 {
        return "0".to_string();
    }
    let fixed = format!("{amount:.10}");
    fixed
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[async_trait]
impl QuoteProvider for TbcProvider {
    #[instrument(name = "TbcFetchAll", skip(self))]
    async fn fetch_all(&self, timeout: Option<Duration>) -> Result<QuoteSheet> {
        let url = format!("{}{}", self.base_url, RATES_PATH);
        let sheet = self.fetch_sheet(&url, timeout).await?;
        debug!(base = %sheet.base, count = sheet.quotes.len(), "Fetched full quote list");
        Ok(sheet)
    }

    #[instrument(name = "TbcFetchOne", skip(self), fields(code = %code))]
    async fn fetch_one(&self, code: CurrencyCode, timeout: Duration) -> Result<ProviderQuote> {
        let url = format!("{}{}?currency={}", self.base_url, RATES_PATH, code);
        let sheet = self.fetch_sheet(&url, Some(timeout)).await?;
        sheet
            .quotes
            .into_iter()
            .find(|q| q.currency.trim().eq_ignore_ascii_case(code.as_str()))
            .ok_or_else(|| anyhow!("No rate data found for currency: {}", code))
    }

    #[instrument(name = "TbcConvert", skip(self))]
    async fn convert_direct(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        amount: f64,
        timeout: Duration,
    ) -> Result<f64> {
        let url = format!(
            "{}{}?From={}&To={}&Amount={}",
            self.base_url,
            CONVERT_PATH,
            from,
            to,
            format_amount(amount)
        );
        let text = self.fetch_text(&url, Some(timeout)).await?;
        let data: ConvertResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse convert response for {}{}: {}", from, to, e))?;
        Ok(data.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FULL_RESPONSE: &str = r#"{
        "base": "GEL",
        "commercialRatesList": [
            {"currency": "USD", "buy": 2.70, "sell": 2.75},
            {"currency": "RUR", "buy": 0.028, "sell": 0.030},
            {"currency": "EUR", "buy": 2.90, "sell": 3.00}
        ]
    }"#;

    #[tokio::test]
    async fn test_fetch_all_maps_buy_sell_to_bid_ask() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .and(header("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FULL_RESPONSE))
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "test-key").unwrap();
        let sheet = provider.fetch_all(Some(Duration::from_secs(5))).await.unwrap();

        assert_eq!(sheet.base, "GEL");
        assert_eq!(sheet.quotes.len(), 3);
        assert_eq!(
            sheet.quotes[0],
            ProviderQuote {
                currency: "USD".to_string(),
                bid: 2.70,
                ask: 2.75
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_all_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "bad-key").unwrap();
        let result = provider.fetch_all(None).await;
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("401"));
    }

    #[tokio::test]
    async fn test_fetch_all_malformed_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"base": "GEL"}"#))
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "test-key").unwrap();
        let result = provider.fetch_all(None).await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse rates response")
        );
    }

    #[tokio::test]
    async fn test_fetch_all_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(FULL_RESPONSE)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "test-key").unwrap();
        let result = provider.fetch_all(Some(Duration::from_millis(50))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_one_selects_requested_currency() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .and(query_param("currency", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"base": "GEL", "commercialRatesList": [{"currency": "usd", "buy": 2.71, "sell": 2.76}]}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "test-key").unwrap();
        let quote = provider
            .fetch_one(CurrencyCode::Usd, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(quote.bid, 2.71);
        assert_eq!(quote.ask, 2.76);
    }

    #[tokio::test]
    async fn test_fetch_one_missing_currency() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RATES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"base": "GEL", "commercialRatesList": []}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "test-key").unwrap();
        let result = provider
            .fetch_one(CurrencyCode::Rur, Duration::from_secs(5))
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No rate data found for currency: RUR"
        );
    }

    #[tokio::test]
    async fn test_convert_direct() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(CONVERT_PATH))
            .and(query_param("From", "USD"))
            .and(query_param("To", "GEL"))
            .and(query_param("Amount", "12.5"))
            .and(header("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"from": "USD", "to": "GEL", "amount": 12.5, "value": 33.75}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = TbcProvider::new(&mock_server.uri(), "test-key").unwrap();
        let value = provider
            .convert_direct(
                CurrencyCode::Usd,
                CurrencyCode::Gel,
                12.5,
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert_eq!(value, 33.75);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(100.0), "100");
        assert_eq!(format_amount(12.5), "12.5");
        assert_eq!(format_amount(1e-7), "0.0000001");
        assert_eq!(format_amount(1e20), "100000000000000000000");
    }
}
