use crate::error::{ConfigurationError, DecodingError, PosnetError, Result};
use crate::models::common::{
    generate_correlation_id, Amount, CardNumber, CurrencyCode, Cvv2, ExpiryDate, Installment,
    OosTranType, Xid, ORDER_ID_LENGTH,
};
use crate::models::requests::{
    OosRequestData, OosResolveMerchantData, OosTranData, PosnetRequest, Transaction,
};
use crate::models::responses::{
    OosRequestDataResponse, OosResolveMerchantDataResponse, PosnetResponse, APPROVED,
};
use crate::services::crypto::{compute_mac, verify_mac};
use crate::services::endpoints::{EndpointTable, Environment};
use encoding_rs::Encoding;
use log::{debug, info, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::time::Duration;

const XML_FIELD: &str = "xmldata";

const HEADER_MERCHANT_ID: &str = "X-MERCHANT-ID";
const HEADER_TERMINAL_ID: &str = "X-TERMINAL-ID";
const HEADER_CORRELATION_ID: &str = "X-CORRELATION-ID";
const HEADER_POSNET_ID: &str = "X-POSNET-ID";

const DEFAULT_CHARSET: &str = "utf-8";

/// Merchant credentials issued by the bank.
#[derive(Clone)]
pub struct Credentials {
    pub merchant_id: String,
    pub terminal_id: String,
    pub key: String,
    pub posnet_id: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("merchant_id", &self.merchant_id)
            .field("terminal_id", &self.terminal_id)
            .field("key", &"<redacted>")
            .field("posnet_id", &self.posnet_id)
            .finish()
    }
}

/// Card and amount for the first 3-D Secure leg.
#[derive(Debug, Clone)]
pub struct ThreeDPayment {
    pub tran_type: OosTranType,
    pub card_holder_name: Option<String>,
    pub card_number: CardNumber,
    pub expiry: ExpiryDate,
    pub cvv2: Cvv2,
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub installment: Installment,
}

/// What the merchant expects a 3-D Secure callback to be about.
#[derive(Debug, Clone)]
pub struct ThreeDExpectation {
    pub xid: Xid,
    pub amount: Amount,
    pub currency: CurrencyCode,
}

/// Posnet XML client. Holds only immutable state; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PosnetClient {
    credentials: Credentials,
    endpoints: EndpointTable,
    http: Client,
}

impl PosnetClient {
    pub fn new(
        credentials: Credentials,
        endpoints: EndpointTable,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()?;

        Ok(Self {
            credentials,
            endpoints,
            http,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    /// Wraps `transaction` in an envelope carrying this merchant's ids.
    pub fn envelope(&self, transaction: Transaction) -> PosnetRequest {
        PosnetRequest::new(
            &self.credentials.merchant_id,
            &self.credentials.terminal_id,
            transaction,
        )
    }

    /// MAC over the 3-D transaction fields with this merchant's key.
    pub fn mac(&self, xid: &str, amount: &str, currency: &str, extra: Option<&str>) -> String {
        compute_mac(
            xid,
            amount,
            currency,
            &self.credentials.merchant_id,
            &self.credentials.key,
            &self.credentials.terminal_id,
            extra,
        )
    }

    pub fn oos_request(&self, xid: Xid, payment: ThreeDPayment) -> Result<PosnetRequest> {
        let posnet_id = self
            .credentials
            .posnet_id
            .clone()
            .ok_or(ConfigurationError::MissingPosnetId)?;

        Ok(self.envelope(Transaction::OosInitiate(OosRequestData {
            posnet_id,
            xid,
            tran_type: payment.tran_type,
            card_holder_name: payment.card_holder_name,
            card_number: payment.card_number,
            expiry: payment.expiry,
            cvv2: payment.cvv2,
            amount: payment.amount,
            currency: payment.currency,
            installment: payment.installment,
        })))
    }

    pub fn oos_resolve_request(
        &self,
        bank_data: String,
        merchant_data: String,
        sign: String,
        expected: &ThreeDExpectation,
    ) -> PosnetRequest {
        let mac = self.mac(
            expected.xid.as_str(),
            expected.amount.as_str(),
            expected.currency.as_str(),
            None,
        );
        self.envelope(Transaction::OosResolve(OosResolveMerchantData {
            bank_data,
            merchant_data,
            sign,
            mac,
        }))
    }

    /// `wpAmount` is the loyalty point amount; zero when points are not used.
    pub fn oos_transfer_request(
        &self,
        bank_data: String,
        wp_amount: Amount,
        expected: &ThreeDExpectation,
    ) -> PosnetRequest {
        let mac = self.mac(
            expected.xid.as_str(),
            expected.amount.as_str(),
            expected.currency.as_str(),
            None,
        );
        self.envelope(Transaction::OosTransfer(OosTranData {
            bank_data,
            wp_amount,
            mac,
        }))
    }

    /// Sends one request and returns the bank's answer if it approves the transaction.
    pub async fn execute(
        &self,
        environment: &Environment,
        request: &PosnetRequest,
    ) -> Result<PosnetResponse> {
        let url = self.endpoints.url_for(environment)?;
        let xml = request.to_xml()?;
        let correlation_id = request
            .reference()
            .map(str::to_owned)
            .unwrap_or_else(|| generate_correlation_id(ORDER_ID_LENGTH));

        info!(
            "Sending {} request to Posnet {} (correlation id {})",
            request.transaction.name(),
            environment,
            correlation_id
        );

        let mut builder = self
            .http
            .post(url)
            .header(HEADER_MERCHANT_ID, self.credentials.merchant_id.as_str())
            .header(HEADER_TERMINAL_ID, self.credentials.terminal_id.as_str())
            .header(HEADER_CORRELATION_ID, correlation_id.as_str())
            .form(&[(XML_FIELD, xml.as_str())]);

        if let Some(posnet_id) = request
            .posnet_id()
            .or(self.credentials.posnet_id.as_deref())
        {
            builder = builder.header(HEADER_POSNET_ID, posnet_id);
        }

        let response = builder.send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        let text = decode_body(&body, content_type.as_deref())?;
        let decoded = PosnetResponse::from_xml(&text).map_err(DecodingError::from)?;

        if decoded.is_approved() {
            info!(
                "Posnet approved {} (correlation id {})",
                request.transaction.name(),
                correlation_id
            );
        } else {
            warn!(
                "Posnet declined {} (correlation id {}): {} {}",
                request.transaction.name(),
                correlation_id,
                decoded.error_code.as_deref().unwrap_or_default(),
                decoded.error_text.as_deref().unwrap_or_default()
            );
        }

        decoded.into_approved()
    }

    /// Like [`execute`](Self::execute), but gives up as soon as `cancel` completes.
    ///
    /// The in-flight HTTP request is dropped, which aborts it.
    pub async fn execute_until<F>(
        &self,
        environment: &Environment,
        request: &PosnetRequest,
        cancel: F,
    ) -> Result<PosnetResponse>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.execute(environment, request) => result,
            _ = cancel => {
                warn!("Posnet {} request cancelled", request.transaction.name());
                Err(PosnetError::Cancelled)
            }
        }
    }

    /// First 3-D Secure leg: returns the packets for the redirect to the bank.
    pub async fn initiate_3d(
        &self,
        environment: &Environment,
        xid: Xid,
        payment: ThreeDPayment,
    ) -> Result<OosRequestDataResponse> {
        let request = self.oos_request(xid, payment)?;
        let response = self.execute(environment, &request).await?;
        response
            .oos_request_data
            .ok_or_else(|| DecodingError::MissingElement("oosRequestDataResponse").into())
    }

    /// Second 3-D Secure leg: decrypts the bank callback and checks that it is authentic.
    ///
    /// Only `mdStatus` 1 (full authentication) is accepted.
    pub async fn resolve_3d(
        &self,
        environment: &Environment,
        bank_data: String,
        merchant_data: String,
        sign: String,
        expected: &ThreeDExpectation,
    ) -> Result<OosResolveMerchantDataResponse> {
        let request = self.oos_resolve_request(bank_data, merchant_data, sign, expected);
        let response = self.execute(environment, &request).await?;
        let resolved = response
            .oos_resolve_merchant_data
            .ok_or(DecodingError::MissingElement("oosResolveMerchantDataResponse"))?;

        self.verify_resolved(&resolved, expected)?;

        if resolved.md_status != APPROVED {
            warn!(
                "3-D authentication failed for xid {} (mdStatus {})",
                resolved.xid, resolved.md_status
            );
            return Err(PosnetError::Declined {
                code: resolved.md_status,
                text: resolved.md_error_message.unwrap_or_default(),
            });
        }
        Ok(resolved)
    }

    /// Final 3-D Secure leg: performs the sale or authorization.
    pub async fn complete_3d(
        &self,
        environment: &Environment,
        bank_data: String,
        expected: &ThreeDExpectation,
    ) -> Result<PosnetResponse> {
        let request = self.oos_transfer_request(bank_data, Amount::zero(), expected);
        self.execute(environment, &request).await
    }

    fn verify_resolved(
        &self,
        resolved: &OosResolveMerchantDataResponse,
        expected: &ThreeDExpectation,
    ) -> std::result::Result<(), DecodingError> {
        let mac = self.mac(
            &resolved.xid,
            &resolved.amount,
            &resolved.currency,
            Some(&resolved.md_status),
        );
        if !verify_mac(&mac, &resolved.mac) {
            warn!("MAC mismatch in 3-D resolve response for xid {}", resolved.xid);
            return Err(DecodingError::MacMismatch);
        }
        if resolved.xid != expected.xid.as_str() {
            return Err(DecodingError::FieldMismatch("xid"));
        }
        if resolved.amount != expected.amount.as_str() {
            return Err(DecodingError::FieldMismatch("amount"));
        }
        if resolved.currency != expected.currency.as_str() {
            return Err(DecodingError::FieldMismatch("currency"));
        }
        Ok(())
    }
}

/// Transcodes a response body to UTF-8.
///
/// The charset comes from the `Content-Type` header, then from the XML
/// declaration, and defaults to UTF-8. Unknown labels are an error.
pub fn decode_body(
    body: &[u8],
    content_type: Option<&str>,
) -> std::result::Result<String, DecodingError> {
    let label = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_declaration(body))
        .unwrap_or_else(|| DEFAULT_CHARSET.to_string());

    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| DecodingError::UnknownCharset(label.clone()))?;
    debug!("Decoding Posnet response as {} (label {})", encoding.name(), label);

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(Cow::into_owned)
        .ok_or(DecodingError::MalformedBody(encoding.name()))
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

fn charset_from_declaration(body: &[u8]) -> Option<String> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Decl(decl)) => {
                return decl
                    .encoding()
                    .and_then(|label| label.ok())
                    .map(|label| String::from_utf8_lossy(&label).into_owned());
            }
            Ok(Event::Text(text)) if text.iter().all(u8::is_ascii_whitespace) => {}
            _ => return None,
        }
        buf.clear();
    }
}
