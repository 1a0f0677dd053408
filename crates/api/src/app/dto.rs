use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use docmint_core::input::{MAX_TEXT_LEN, MIN_TEXT_LEN, TEXT_FIELD};
use docmint_core::{JobId, JobInput};
use docmint_payments::{Amount, PaymentReceipt};

use crate::app::services::AgentInfo;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub identifier_from_purchaser: String,
    pub input_data: JobInput,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub job_id: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

/// Receipt returned by `POST /start_job`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub status: &'static str,
    #[serde(rename = "job_id")]
    pub job_id: JobId,
    pub blockchain_identifier: String,
    pub submit_result_time: String,
    pub unlock_time: String,
    pub external_dispute_unlock_time: String,
    pub pay_by_time: String,
    pub agent_identifier: String,
    pub seller_vkey: String,
    pub identifier_from_purchaser: String,
    pub amounts: Vec<Amount>,
    #[serde(rename = "input_hash")]
    pub input_hash: String,
}

impl StartJobResponse {
    pub fn new(
        job_id: JobId,
        receipt: PaymentReceipt,
        agent: &AgentInfo,
        identifier_from_purchaser: String,
    ) -> Self {
        Self {
            status: "success",
            job_id,
            blockchain_identifier: receipt.payment_id.to_string(),
            submit_result_time: receipt.submit_result_time,
            unlock_time: receipt.unlock_time,
            external_dispute_unlock_time: receipt.external_dispute_unlock_time,
            pay_by_time: receipt.pay_by_time,
            agent_identifier: agent.agent_identifier.clone(),
            seller_vkey: agent.seller_vkey.clone(),
            identifier_from_purchaser,
            amounts: vec![agent.amount.clone()],
            input_hash: receipt.input_hash,
        }
    }
}

pub fn availability() -> Value {
    json!({
        "status": "available",
        "type": "masumi-agent",
        "message": "Document service is ready to generate documents, convert them to PDF and mint them as NFTs.",
    })
}

/// Field description served by `GET /input_schema`.
pub fn input_schema() -> Value {
    json!({
        "input_data": [{
            "id": TEXT_FIELD,
            "type": "textarea",
            "name": "Resume Information",
            "data": {
                "description": "Your name, contact details, experience, education and skills, one `Label: value` per line where it applies.",
                "placeholder": "Name: John Smith\nEmail: john.smith@email.com\nPhone: (555) 123-4567\nLocation: New York, NY\n\nProfessional Summary:\n...",
            },
            "validations": [
                { "validation": "min", "value": MIN_TEXT_LEN.to_string() },
                { "validation": "max", "value": MAX_TEXT_LEN.to_string() },
                { "validation": "format", "value": "nonempty" },
            ],
        }]
    })
}
