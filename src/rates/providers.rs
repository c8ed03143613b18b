//! External rate providers
//!
//! Two HTTP sources behind the [`RateProvider`](super::RateProvider) trait.
//! Both use a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use super::RateProvider;
use crate::error::ExpenseError;
use crate::models::RateSnapshot;
use crate::Result;

fn build_client() -> Client {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(4)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client")
}

/// Uppercases the currency keys of a raw rate object, keeping numeric values.
fn collect_rates(raw: &Value) -> Option<HashMap<String, f64>> {
    let object = raw.as_object()?;
    let mut rates = HashMap::with_capacity(object.len());
    for (code, value) in object {
        if let Some(rate) = value.as_f64() {
            rates.insert(code.to_uppercase(), rate);
        }
    }
    Some(rates)
}

//
// ================= jsDelivr currency CDN =================
//

/// Primary source: the fawazahmed0 currency CDN, with its pages.dev mirror
/// as an in-provider fallback URL.
/// Docs: https://github.com/fawazahmed0/exchange-api
pub struct JsDelivrProvider {
    client: Client,
}

impl JsDelivrProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(),
        }
    }

    async fn fetch_url(&self, url: &str, base_lower: &str) -> Result<HashMap<String, f64>> {
        let body: Value = self.client.get(url).send().await?.json().await?;
        let raw = body.get(base_lower).ok_or_else(|| {
            ExpenseError::RateProvider(format!("missing '{}' key in CDN response", base_lower))
        })?;
        collect_rates(raw).ok_or_else(|| {
            ExpenseError::RateProvider("CDN response is not a rate object".to_string())
        })
    }
}

impl Default for JsDelivrProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateProvider for JsDelivrProvider {
    fn name(&self) -> &'static str {
        "cdn_jsdelivr"
    }

    async fn fetch(&self, base_currency: &str, on_date: NaiveDate) -> Result<RateSnapshot> {
        let base_lower = base_currency.to_lowercase();
        let date = on_date.format("%Y-%m-%d");

        let main_url = format!(
            "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@{}/v1/currencies/{}.json",
            date, base_lower
        );
        let fallback_url = format!(
            "https://{}.currency-api.pages.dev/v1/currencies/{}.json",
            date, base_lower
        );

        let rates = match self.fetch_url(&main_url, &base_lower).await {
            Ok(rates) => rates,
            Err(_) => self.fetch_url(&fallback_url, &base_lower).await?,
        };

        Ok(RateSnapshot {
            base: base_currency.to_string(),
            rates,
        })
    }
}

//
// ================= freecurrencyapi.com =================
//

/// Secondary source. Uses the `latest` endpoint for today's date and the
/// `historical` endpoint otherwise. Requires an API key.
pub struct FreeCurrencyApiProvider {
    client: Client,
    api_key: Option<String>,
}

impl FreeCurrencyApiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: build_client(),
            api_key,
        }
    }

    /// Reads the key from `FREECURRENCYAPI_API_KEY`; a missing key makes
    /// every fetch fail, which the resolver treats as a fall-through.
    pub fn from_env() -> Self {
        Self::new(env::var("FREECURRENCYAPI_API_KEY").ok())
    }
}

#[async_trait]
impl RateProvider for FreeCurrencyApiProvider {
    fn name(&self) -> &'static str {
        "freecurrencyapi"
    }

    async fn fetch(&self, base_currency: &str, on_date: NaiveDate) -> Result<RateSnapshot> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ExpenseError::RateProvider("FREECURRENCYAPI_API_KEY not configured".to_string())
        })?;

        let today = chrono::Local::now().date_naive();
        let date = on_date.format("%Y-%m-%d").to_string();

        let url = if on_date == today {
            format!(
                "https://api.freecurrencyapi.com/v1/latest?apikey={}&base_currency={}",
                api_key, base_currency
            )
        } else {
            format!(
                "https://api.freecurrencyapi.com/v1/historical?apikey={}&date={}&base_currency={}",
                api_key, date, base_currency
            )
        };

        let body: Value = self.client.get(&url).send().await?.json().await?;
        let data = body
            .get("data")
            .ok_or_else(|| ExpenseError::RateProvider("missing 'data' key".to_string()))?;

        // historical responses nest rates one level deeper, under the date
        let raw = if on_date == today {
            data
        } else {
            data.get(&date)
                .ok_or_else(|| ExpenseError::RateProvider(format!("missing '{}' key", date)))?
        };

        let rates = collect_rates(raw).ok_or_else(|| {
            ExpenseError::RateProvider("response is not a rate object".to_string())
        })?;

        Ok(RateSnapshot {
            base: base_currency.to_string(),
            rates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_rates_uppercases_codes() {
        let raw = json!({"eur": 0.93, "amd": 387.2, "note": "ignored"});
        let rates = collect_rates(&raw).unwrap();
        assert_eq!(rates.get("EUR"), Some(&0.93));
        assert_eq!(rates.get("AMD"), Some(&387.2));
        assert!(!rates.contains_key("NOTE"));
    }

    #[test]
    fn test_collect_rates_rejects_non_object() {
        assert!(collect_rates(&json!("oops")).is_none());
        assert!(collect_rates(&json!([1, 2])).is_none());
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_fast() {
        let provider = FreeCurrencyApiProvider::new(None);
        let err = provider
            .fetch("USD", NaiveDate::from_ymd_opt(2024, 6, 14).unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FREECURRENCYAPI_API_KEY"));
    }
}
