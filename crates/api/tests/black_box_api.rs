use std::sync::Arc;
use std::time::Duration;

use docmint_api::app::services::{AgentInfo, AppServices};
use docmint_core::PaymentId;
use docmint_infra::jobs::{FailureSettlement, OrchestratorConfig};
use docmint_payments::{Amount, GatewayError, InMemoryLedger, LedgerGateway};
use docmint_pipeline::{
    InMemoryContentStore, InMemoryTools, PipelineConfig, PipelineExecutor, StepError,
};
use reqwest::StatusCode;
use serde_json::json;

const RESUME: &str = "Name: Jane Doe\nEmail: jane@example.com\n\nExperience:\n- Staff engineer at Example Corp";

struct TestServer {
    base_url: String,
    ledger: Arc<InMemoryLedger>,
    tools: Arc<InMemoryTools>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(FailureSettlement::Withhold).await
    }

    async fn spawn_with(settlement: FailureSettlement) -> Self {
        let ledger = InMemoryLedger::arc();
        let gateway = Arc::new(LedgerGateway::new(ledger.clone(), Duration::from_millis(10)));
        let tools = InMemoryTools::arc();
        let pipeline = PipelineExecutor::from_backends(
            tools.clone(),
            InMemoryContentStore::arc(),
            &PipelineConfig::default(),
        );
        let services = Arc::new(AppServices::new(
            gateway,
            pipeline,
            OrchestratorConfig::new("agent-test").with_failure_settlement(settlement),
            AgentInfo {
                agent_identifier: "agent-test".into(),
                seller_vkey: "vkey-test".into(),
                amount: Amount::default(),
            },
        ));

        // Same router as prod, bound to an ephemeral port.
        let app = docmint_api::app::build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            ledger,
            tools,
            handle,
        }
    }

    async fn start_job(&self, client: &reqwest::Client, text: &str) -> serde_json::Value {
        let res = client
            .post(format!("{}/start_job", self.base_url))
            .json(&json!({
                "identifier_from_purchaser": "buyer-1",
                "input_data": { "text": text },
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn status_eventually(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
    wanted: &str,
) -> serde_json::Value {
    // The pipeline runs in the background after the payment monitor fires.
    for _ in 0..200 {
        let res = client
            .get(format!("{}/status", base_url))
            .query(&[("job_id", job_id)])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body: serde_json::Value = res.json().await.unwrap();
        if body["status"] == wanted {
            return body;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("job {job_id} did not reach `{wanted}` within timeout");
}

#[tokio::test]
async fn health_availability_and_schema() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "healthy" }));

    let body: serde_json::Value = client
        .get(format!("{}/availability", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "available");
    assert_eq!(body["type"], "masumi-agent");

    let body: serde_json::Value = client
        .get(format!("{}/input_schema", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["input_data"][0]["id"], "text");
}

#[tokio::test]
async fn paid_job_runs_to_completion() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let receipt = srv.start_job(&client, RESUME).await;
    assert_eq!(receipt["status"], "success");
    assert_eq!(receipt["agentIdentifier"], "agent-test");
    assert_eq!(receipt["sellerVkey"], "vkey-test");
    assert_eq!(receipt["identifierFromPurchaser"], "buyer-1");
    let job_id = receipt["job_id"].as_str().unwrap().to_string();
    let payment_id = PaymentId::new(receipt["blockchainIdentifier"].as_str().unwrap());

    let body = status_eventually(&client, &srv.base_url, &job_id, "awaiting_payment").await;
    assert_eq!(body["payment_status"], "pending");
    assert!(body["result"].is_null());

    assert!(srv.ledger.confirm(&payment_id));
    let body = status_eventually(&client, &srv.base_url, &job_id, "completed").await;

    assert_eq!(body["job_id"], job_id);
    assert_eq!(body["result"]["status"], "completed");
    assert_eq!(
        body["result"]["convert"]["pdf_url"],
        "https://files.docmint.test/resume.pdf"
    );
    assert!(body["result"]["mint"]["tx_id"].is_string());

    // Settlement lands right after the job turns terminal.
    for _ in 0..100 {
        if !srv.ledger.submissions().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let submissions = srv.ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, payment_id);
    assert_eq!(srv.tools.calls_to("html_to_pdf"), 1);
}

#[tokio::test]
async fn failed_pipeline_is_reported_and_refunded() {
    let srv = TestServer::spawn_with(FailureSettlement::Refund).await;
    srv.tools
        .fail_with("html_to_pdf", StepError::Logical("converter offline".into()));
    let client = reqwest::Client::new();

    let receipt = srv.start_job(&client, RESUME).await;
    let job_id = receipt["job_id"].as_str().unwrap().to_string();
    let payment_id = PaymentId::new(receipt["blockchainIdentifier"].as_str().unwrap());

    srv.ledger.confirm(&payment_id);
    let body = status_eventually(&client, &srv.base_url, &job_id, "failed").await;
    assert!(body["error"].as_str().unwrap().contains("convert"));
    assert!(body["result"].is_null());

    for _ in 0..100 {
        if !srv.ledger.refunds().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(srv.ledger.refunds(), vec![payment_id]);
    assert!(srv.ledger.submissions().is_empty());
}

#[tokio::test]
async fn start_job_rejects_bad_input() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // no text field
    let res = client
        .post(format!("{}/start_job", srv.base_url))
        .json(&json!({
            "identifier_from_purchaser": "buyer-1",
            "input_data": { "other": "value" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_input");

    // too long
    let res = client
        .post(format!("{}/start_job", srv.base_url))
        .json(&json!({
            "identifier_from_purchaser": "buyer-1",
            "input_data": { "text": "x".repeat(5001) },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // not a start_job body at all
    let res = client
        .post(format!("{}/start_job", srv.base_url))
        .header("content-type", "application/json")
        .body("{\"input_data\": 5")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    assert!(srv.ledger.payment_ids().is_empty());
}

#[tokio::test]
async fn ledger_failures_map_to_http_errors() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let body = json!({
        "identifier_from_purchaser": "buyer-1",
        "input_data": { "text": RESUME },
    });

    srv.ledger
        .reject_next_create(GatewayError::InvalidRequest("bad identifier".into()));
    let res = client
        .post(format!("{}/start_job", srv.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    srv.ledger.set_unavailable(true);
    let res = client
        .post(format!("{}/start_job", srv.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "payment_service_error");
}

#[tokio::test]
async fn status_lookup_errors() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/status", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .get(format!("{}/status", srv.base_url))
        .query(&[("job_id", "not-a-job")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/status", srv.base_url))
        .query(&[("job_id", "0190b1d6-6a3e-7c4a-8b0e-5f1f2c3d4e5f")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}
