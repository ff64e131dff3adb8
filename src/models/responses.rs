use crate::error::PosnetError;
use serde::{Deserialize, Serialize};

/// The bank's approval marker.
pub const APPROVED: &str = "1";

/// Decoded `posnetResponse`. Every element is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename = "posnetResponse")]
pub struct PosnetResponse {
    pub approved: Option<String>,
    #[serde(rename = "hostlogkey")]
    pub host_log_key: Option<String>,
    #[serde(rename = "authCode")]
    pub auth_code: Option<String>,
    #[serde(rename = "respCode")]
    pub error_code: Option<String>,
    #[serde(rename = "respText")]
    pub error_text: Option<String>,
    #[serde(rename = "tranDate")]
    pub tran_date: Option<String>,
    #[serde(rename = "yourIP")]
    pub your_ip: Option<String>,
    pub mac: Option<String>,
    #[serde(rename = "oosRequestDataResponse")]
    pub oos_request_data: Option<OosRequestDataResponse>,
    #[serde(rename = "oosResolveMerchantDataResponse")]
    pub oos_resolve_merchant_data: Option<OosResolveMerchantDataResponse>,
}

/// Encrypted packets to forward to the 3-D Secure page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OosRequestDataResponse {
    pub data1: String,
    pub data2: String,
    pub sign: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OosResolveMerchantDataResponse {
    pub xid: String,
    pub amount: String,
    pub currency: String,
    pub installment: String,
    pub point: Option<String>,
    #[serde(rename = "pointAmount")]
    pub point_amount: Option<String>,
    #[serde(rename = "txStatus")]
    pub tx_status: String,
    #[serde(rename = "mdStatus")]
    pub md_status: String,
    #[serde(rename = "mdErrorMessage")]
    pub md_error_message: Option<String>,
    pub mac: String,
}

impl PosnetResponse {
    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    pub fn is_approved(&self) -> bool {
        self.approved.as_deref() == Some(APPROVED)
    }

    /// Passes approved responses through and turns everything else into [`PosnetError::Declined`].
    pub fn into_approved(self) -> Result<Self, PosnetError> {
        if self.is_approved() {
            return Ok(self);
        }
        Err(PosnetError::Declined {
            code: self.error_code.unwrap_or_default(),
            text: self.error_text.unwrap_or_default(),
        })
    }
}

/// Envelope of every gateway JSON answer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Result of a direct or completed 3-D transaction, as returned by the gateway.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResult {
    pub host_log_key: Option<String>,
    pub auth_code: Option<String>,
    pub tran_date: Option<String>,
    pub order_id: Option<String>,
}

impl TransactionResult {
    pub fn from_response(response: PosnetResponse, order_id: Option<String>) -> Self {
        Self {
            host_log_key: response.host_log_key,
            auth_code: response.auth_code,
            tran_date: response.tran_date,
            order_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreeDInitiation {
    pub xid: String,
    /// Base64 HTML document that posts the cardholder to the bank.
    pub redirect_form: String,
}
