//! JSON bodies accepted by the gateway API and their conversion into Posnet fields.

use super::common::{
    Amount, CardNumber, CurrencyCode, Cvv2, ExpiryDate, HostLogKey, Installment, OosTranType,
    OrderId, TransactionReference, Xid,
};
use super::requests::{Cancel, CardPayment, PostAuth, Refund};
use crate::error::ConfigurationError;
use crate::services::posnet_client::{ThreeDExpectation, ThreeDPayment};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CardInput {
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv2: String,
}

struct ValidCard {
    number: CardNumber,
    expiry: ExpiryDate,
    cvv2: Cvv2,
}

impl CardInput {
    fn validate(self) -> Result<ValidCard, ConfigurationError> {
        Ok(ValidCard {
            number: CardNumber::parse(&self.number)?,
            expiry: ExpiryDate::new(&self.expiry_month, &self.expiry_year)?,
            cvv2: Cvv2::parse(&self.cvv2)?,
        })
    }
}

fn installment(count: Option<u8>) -> Result<Installment, ConfigurationError> {
    count.map_or_else(|| Ok(Installment::single()), Installment::new)
}

/// Direct sale or pre-authorization. `amount` is in major units (`12.50`).
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub order_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub installment: Option<u8>,
    pub card: CardInput,
}

impl PaymentRequest {
    pub fn into_card_payment(self) -> Result<CardPayment, ConfigurationError> {
        let order_id = match self.order_id {
            Some(order_id) => OrderId::parse(&order_id)?,
            None => OrderId::generate(),
        };
        let card = self.card.validate()?;

        Ok(CardPayment {
            card_number: card.number,
            expiry: card.expiry,
            cvv2: card.cvv2,
            amount: Amount::from_major_units(self.amount)?,
            currency: CurrencyCode::parse(&self.currency)?,
            installment: installment(self.installment)?,
            order_id,
            mail_order: None,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PostAuthRequest {
    pub host_log_key: String,
    pub amount: Decimal,
    pub currency: String,
    pub installment: Option<u8>,
}

impl PostAuthRequest {
    pub fn into_post_auth(self) -> Result<PostAuth, ConfigurationError> {
        Ok(PostAuth {
            amount: Amount::from_major_units(self.amount)?,
            currency: CurrencyCode::parse(&self.currency)?,
            installment: installment(self.installment)?,
            host_log_key: HostLogKey::parse(&self.host_log_key)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub host_log_key: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction: Option<String>,
}

impl RefundRequest {
    pub fn into_refund(self) -> Result<Refund, ConfigurationError> {
        Ok(Refund {
            amount: Amount::from_major_units(self.amount)?,
            currency: CurrencyCode::parse(&self.currency)?,
            transaction: self
                .transaction
                .as_deref()
                .map(TransactionReference::parse)
                .transpose()?,
            host_log_key: HostLogKey::parse(&self.host_log_key)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub host_log_key: String,
    pub transaction: String,
}

impl CancelRequest {
    pub fn into_cancel(self) -> Result<Cancel, ConfigurationError> {
        Ok(Cancel {
            transaction: TransactionReference::parse(&self.transaction)?,
            host_log_key: HostLogKey::parse(&self.host_log_key)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ThreeDInitiateRequest {
    pub amount: Decimal,
    pub currency: String,
    pub installment: Option<u8>,
    pub card: CardInput,
    /// `Sale` (default) or `Auth`.
    pub tran_type: Option<String>,
    pub card_holder_name: Option<String>,
    /// Overrides the configured merchant return URL.
    pub return_url: Option<String>,
}

impl ThreeDInitiateRequest {
    pub fn into_payment(self) -> Result<(ThreeDPayment, Option<String>), ConfigurationError> {
        let card = self.card.validate()?;
        let tran_type = match self.tran_type.as_deref() {
            Some(tran_type) => OosTranType::parse(tran_type)?,
            None => OosTranType::Sale,
        };

        let payment = ThreeDPayment {
            tran_type,
            card_holder_name: self.card_holder_name,
            card_number: card.number,
            expiry: card.expiry,
            cvv2: card.cvv2,
            amount: Amount::from_major_units(self.amount)?,
            currency: CurrencyCode::parse(&self.currency)?,
            installment: installment(self.installment)?,
        };
        Ok((payment, self.return_url))
    }
}

/// Identifies the 3-D transaction a bank callback belongs to.
#[derive(Debug, Deserialize)]
pub struct ThreeDReference {
    pub xid: String,
    pub amount: Decimal,
    pub currency: String,
}

impl ThreeDReference {
    pub fn to_expectation(&self) -> Result<ThreeDExpectation, ConfigurationError> {
        Ok(ThreeDExpectation {
            xid: Xid::parse(&self.xid)?,
            amount: Amount::from_major_units(self.amount)?,
            currency: CurrencyCode::parse(&self.currency)?,
        })
    }
}

/// The packets the bank posted to the merchant return URL.
#[derive(Debug, Deserialize)]
pub struct ThreeDResolveRequest {
    pub bank_data: String,
    pub merchant_data: String,
    pub sign: String,
    #[serde(flatten)]
    pub reference: ThreeDReference,
}

#[derive(Debug, Deserialize)]
pub struct ThreeDCompleteRequest {
    pub bank_data: String,
    #[serde(flatten)]
    pub reference: ThreeDReference,
}
