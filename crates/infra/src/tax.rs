//! Tax collaborator clients.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use tillbook_core::Money;
use tillbook_documents::{TaxBreakdown, TaxCalculator, TaxError, TaxLine, TaxRequest};

/// Wire shape of a tax service answer: amounts in minor units.
#[derive(Debug, Deserialize)]
struct TaxResponse {
    lines: Vec<TaxResponseLine>,
}

#[derive(Debug, Deserialize)]
struct TaxResponseLine {
    name: String,
    amount: i64,
}

/// JSON-over-HTTP tax service: `POST {customer_id, items}` -> `{lines}`.
#[derive(Debug, Clone)]
pub struct HttpTaxCalculator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTaxCalculator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TaxError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TaxError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TaxCalculator for HttpTaxCalculator {
    async fn calculate(&self, request: &TaxRequest) -> Result<TaxBreakdown, TaxError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TaxError::Timeout
                } else {
                    TaxError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TaxError::Unavailable(format!("tax service answered {status}")));
        }

        let body: TaxResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TaxError::Timeout
            } else {
                TaxError::InvalidResponse(e.to_string())
            }
        })?;

        Ok(TaxBreakdown {
            lines: body
                .lines
                .into_iter()
                .map(|l| TaxLine {
                    name: l.name,
                    amount: Money::from_minor(l.amount),
                })
                .collect(),
        })
    }
}

/// Used when no tax service is configured; every document gets zero tax.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTaxCalculator;

#[async_trait]
impl TaxCalculator for DisabledTaxCalculator {
    async fn calculate(&self, _request: &TaxRequest) -> Result<TaxBreakdown, TaxError> {
        Err(TaxError::Unavailable("no tax service configured".to_string()))
    }
}
