//! HTTP ledger for the Masumi payment service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use docmint_core::PaymentId;

use crate::error::GatewayError;
use crate::hash;
use crate::ledger::PaymentLedger;
use crate::types::{PENDING_STATE, PaymentReceipt, PaymentRequest, PaymentWindows};

/// Payment service connection settings.
#[derive(Debug, Clone)]
pub struct MasumiConfig {
    /// Base URL, e.g. `https://payments.example.com/api/v1`
    pub base_url: String,
    /// Sent in the `token` header
    pub api_key: String,
    /// Ledger network, e.g. `Preprod`
    pub network: String,
    pub windows: PaymentWindows,
    /// Per-request timeout
    pub timeout: Duration,
}

impl MasumiConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            network: network.into(),
            windows: PaymentWindows::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_windows(mut self, windows: PaymentWindows) -> Self {
        self.windows = windows;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody<'a> {
    agent_identifier: &'a str,
    network: &'a str,
    input_hash: &'a str,
    pay_by_time: &'a str,
    submit_result_time: &'a str,
    unlock_time: &'a str,
    external_dispute_unlock_time: &'a str,
    identifier_from_purchaser: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResultBody<'a> {
    network: &'a str,
    blockchain_identifier: &'a str,
    submit_result_hash: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundBody<'a> {
    network: &'a str,
    blockchain_identifier: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPayment {
    blockchain_identifier: String,
    pay_by_time: Option<String>,
    submit_result_time: Option<String>,
    unlock_time: Option<String>,
    external_dispute_unlock_time: Option<String>,
    input_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentList {
    #[serde(rename = "Payments", alias = "payments", default)]
    payments: Vec<ListedPayment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedPayment {
    blockchain_identifier: String,
    on_chain_state: Option<String>,
}

/// Payment ledger backed by the Masumi payment service REST API.
#[derive(Debug, Clone)]
pub struct MasumiLedger {
    client: Client,
    config: MasumiConfig,
}

impl MasumiLedger {
    pub fn new(config: MasumiConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, GatewayError> {
        let url = self.url(path);
        debug!(%url, "payment service POST");
        self.client
            .post(&url)
            .header("token", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    error!(error = %e, "payment service request failed");
    if e.is_timeout() {
        GatewayError::Unavailable("request timed out".to_string())
    } else {
        GatewayError::Unavailable(e.to_string())
    }
}

/// Map a non-success response onto the gateway taxonomy.
async fn status_error(response: Response, payment_id: Option<&PaymentId>) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(status = status.as_u16(), %body, "payment service returned an error");

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            GatewayError::InvalidRequest(body)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized(body),
        StatusCode::NOT_FOUND => match payment_id {
            Some(id) => GatewayError::NotFound(id.clone()),
            None => GatewayError::Unavailable(format!("endpoint not found: {body}")),
        },
        _ => GatewayError::Unavailable(format!("{}: {}", status.as_u16(), body)),
    }
}

#[async_trait]
impl PaymentLedger for MasumiLedger {
    async fn create_payment(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentReceipt, GatewayError> {
        let input_hash = hash::input_hash(&request.purchaser_identifier, &request.input);
        let deadlines = self.config.windows.deadlines_from(Utc::now());

        let body = CreatePaymentBody {
            agent_identifier: &request.agent_identifier,
            network: &self.config.network,
            input_hash: &input_hash,
            pay_by_time: &deadlines.pay_by_time,
            submit_result_time: &deadlines.submit_result_time,
            unlock_time: &deadlines.unlock_time,
            external_dispute_unlock_time: &deadlines.external_dispute_unlock_time,
            identifier_from_purchaser: &request.purchaser_identifier,
        };

        let response = self.post("/payment", &body).await?;
        if !response.status().is_success() {
            return Err(status_error(response, None).await);
        }

        let created: Envelope<CreatedPayment> = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("payment creation response: {e}")))?;
        let created = created.data;

        Ok(PaymentReceipt {
            payment_id: PaymentId::new(created.blockchain_identifier),
            pay_by_time: created.pay_by_time.unwrap_or(deadlines.pay_by_time),
            submit_result_time: created
                .submit_result_time
                .unwrap_or(deadlines.submit_result_time),
            unlock_time: created.unlock_time.unwrap_or(deadlines.unlock_time),
            external_dispute_unlock_time: created
                .external_dispute_unlock_time
                .unwrap_or(deadlines.external_dispute_unlock_time),
            input_hash: created.input_hash.unwrap_or(input_hash),
        })
    }

    async fn payment_status(&self, payment_id: &PaymentId) -> Result<String, GatewayError> {
        let url = self.url("/payment");
        let response = self
            .client
            .get(&url)
            .header("token", &self.config.api_key)
            .query(&[
                ("network", self.config.network.as_str()),
                ("blockchainIdentifier", payment_id.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response, Some(payment_id)).await);
        }

        let list: Envelope<PaymentList> = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(format!("payment status response: {e}")))?;

        list.data
            .payments
            .into_iter()
            .find(|p| p.blockchain_identifier == payment_id.as_str())
            .map(|p| p.on_chain_state.unwrap_or_else(|| PENDING_STATE.to_string()))
            .ok_or_else(|| GatewayError::NotFound(payment_id.clone()))
    }

    async fn submit_result(
        &self,
        payment_id: &PaymentId,
        result_hash: &str,
    ) -> Result<(), GatewayError> {
        let body = SubmitResultBody {
            network: &self.config.network,
            blockchain_identifier: payment_id.as_str(),
            submit_result_hash: result_hash,
        };
        let response = self.post("/payment/submit-result", &body).await?;
        if !response.status().is_success() {
            return Err(status_error(response, Some(payment_id)).await);
        }
        Ok(())
    }

    async fn authorize_refund(&self, payment_id: &PaymentId) -> Result<(), GatewayError> {
        let body = RefundBody {
            network: &self.config.network,
            blockchain_identifier: payment_id.as_str(),
        };
        let response = self.post("/payment/authorize-refund", &body).await?;
        if !response.status().is_success() {
            return Err(status_error(response, Some(payment_id)).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmint_core::JobInput;
    use mockito::{Matcher, Server};

    fn ledger(server: &Server) -> MasumiLedger {
        MasumiLedger::new(MasumiConfig::new(server.url(), "test-key", "Preprod")).unwrap()
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            agent_identifier: "agent-1".to_string(),
            purchaser_identifier: "buyer-1".to_string(),
            input: [("text", "Name: Alice")].into_iter().collect::<JobInput>(),
        }
    }

    #[tokio::test]
    async fn create_payment_parses_receipt() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/payment")
            .match_header("token", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "agentIdentifier": "agent-1",
                "network": "Preprod",
                "identifierFromPurchaser": "buyer-1",
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"success","data":{
                    "blockchainIdentifier":"bc-123",
                    "payByTime":"1000",
                    "submitResultTime":"2000",
                    "unlockTime":"3000",
                    "externalDisputeUnlockTime":"4000"
                }}"#,
            )
            .create_async()
            .await;

        let receipt = ledger(&server).create_payment(&request()).await.unwrap();

        assert_eq!(receipt.payment_id, PaymentId::new("bc-123"));
        assert_eq!(receipt.pay_by_time, "1000");
        assert_eq!(receipt.external_dispute_unlock_time, "4000");
        assert_eq!(
            receipt.input_hash,
            hash::input_hash("buyer-1", &request().input)
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn schema_rejection_is_an_invalid_request() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/payment")
            .with_status(400)
            .with_body(r#"{"error":"identifierFromPurchaser too long"}"#)
            .create_async()
            .await;

        let err = ledger(&server).create_payment(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/payment")
            .with_status(503)
            .create_async()
            .await;

        let err = ledger(&server).create_payment(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
    }

    #[tokio::test]
    async fn status_reads_on_chain_state() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/payment")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("network".into(), "Preprod".into()),
                Matcher::UrlEncoded("blockchainIdentifier".into(), "bc-123".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"status":"success","data":{"Payments":[
                    {"blockchainIdentifier":"other","onChainState":"Disputed"},
                    {"blockchainIdentifier":"bc-123","onChainState":"FundsLocked"}
                ]}}"#,
            )
            .create_async()
            .await;

        let state = ledger(&server)
            .payment_status(&PaymentId::new("bc-123"))
            .await
            .unwrap();
        assert_eq!(state, "FundsLocked");
    }

    #[tokio::test]
    async fn status_without_on_chain_state_is_pending() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/payment")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"data":{"Payments":[{"blockchainIdentifier":"bc-1","onChainState":null}]}}"#,
            )
            .create_async()
            .await;

        let state = ledger(&server)
            .payment_status(&PaymentId::new("bc-1"))
            .await
            .unwrap();
        assert_eq!(state, PENDING_STATE);
    }

    #[tokio::test]
    async fn missing_payment_is_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/payment")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data":{"Payments":[]}}"#)
            .create_async()
            .await;

        let err = ledger(&server)
            .payment_status(&PaymentId::new("bc-404"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn submit_result_sends_hash() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/payment/submit-result")
            .match_header("token", "test-key")
            .match_body(Matcher::Json(serde_json::json!({
                "network": "Preprod",
                "blockchainIdentifier": "bc-123",
                "submitResultHash": "abc",
            })))
            .with_status(200)
            .with_body(r#"{"status":"success"}"#)
            .create_async()
            .await;

        ledger(&server)
            .submit_result(&PaymentId::new("bc-123"), "abc")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bad_api_key_is_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/payment/authorize-refund")
            .with_status(401)
            .create_async()
            .await;

        let err = ledger(&server)
            .authorize_refund(&PaymentId::new("bc-123"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unauthorized(_)));
    }
}
