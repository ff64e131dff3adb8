use crate::error::ConfigurationError;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ORDER_ID_LENGTH: usize = 24;
pub const XID_LENGTH: usize = 20;

/// Strips every decimal separator from `text`, leaving the minor-unit digits ("1,00" -> "100").
pub fn normalize_amount(text: &str) -> Result<String, ConfigurationError> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .collect();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigurationError::MalformedAmount(text.to_string()));
    }
    Ok(digits)
}

/// "00" is a single payment.
pub fn normalize_installment(count: u8) -> Result<String, ConfigurationError> {
    if count > 99 {
        return Err(ConfigurationError::InvalidInstallment(count));
    }
    Ok(format!("{:02}", count))
}

/// Renders a card expiry as `YYMM`. The bank expects year first.
pub fn normalize_expiry(month: &str, year: &str) -> Result<String, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidExpiry(format!("{}/{}", month, year));
    let month = month.trim();
    let year = year.trim();

    if month.is_empty() || month.len() > 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let month_number: u8 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month_number) {
        return Err(invalid());
    }

    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let year = match year.len() {
        1 | 2 => year,
        4 => &year[2..],
        _ => return Err(invalid()),
    };

    Ok(format!("{:0>2}{:02}", year, month_number))
}

pub fn map_currency(code: &str) -> Result<CurrencyCode, ConfigurationError> {
    match code {
        "TRY" | "YTL" | "TRL" | "TL" => Ok(CurrencyCode::Lira),
        "USD" | "US" => Ok(CurrencyCode::Dollar),
        "EUR" | "EU" => Ok(CurrencyCode::Euro),
        other => Err(ConfigurationError::UnsupportedCurrency(other.to_string())),
    }
}

/// Random alphanumeric token drawn from the operating system CSPRNG.
pub fn generate_correlation_id(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn invalid_field(field: &'static str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Implements the string conversions serde uses for a validated newtype.
macro_rules! string_field {
    ($name:ident) => {
        impl TryFrom<String> for $name {
            type Error = ConfigurationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Non-negative amount in minor currency units, digits only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(String);

impl Amount {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        normalize_amount(text).map(Amount)
    }

    /// Converts a major-unit decimal (`12.50`) into minor units (`1250`).
    pub fn from_major_units(value: Decimal) -> Result<Self, ConfigurationError> {
        let malformed = || ConfigurationError::MalformedAmount(value.to_string());
        if value.is_sign_negative() || value.normalize().scale() > 2 {
            return Err(malformed());
        }
        let minor = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(malformed)?
            .trunc()
            .to_u64()
            .ok_or_else(malformed)?;
        Ok(Amount(minor.to_string()))
    }

    pub fn zero() -> Self {
        Amount("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_field!(Amount);

/// Two-letter currency code used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CurrencyCode {
    Lira,
    Dollar,
    Euro,
}

impl CurrencyCode {
    pub fn parse(code: &str) -> Result<Self, ConfigurationError> {
        map_currency(code)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CurrencyCode::Lira => "TL",
            CurrencyCode::Dollar => "US",
            CurrencyCode::Euro => "EU",
        }
    }
}

string_field!(CurrencyCode);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Installment(String);

impl Installment {
    pub fn new(count: u8) -> Result<Self, ConfigurationError> {
        normalize_installment(count).map(Installment)
    }

    pub fn single() -> Self {
        Installment("00".to_string())
    }

    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if text.len() != 2 || !is_digits(text) {
            return Err(invalid_field("installment", "expected two digits"));
        }
        Ok(Installment(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_field!(Installment);

/// Card expiry in `YYMM` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpiryDate(String);

impl ExpiryDate {
    pub fn new(month: &str, year: &str) -> Result<Self, ConfigurationError> {
        normalize_expiry(month, year).map(ExpiryDate)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if text.len() != 4 || !is_digits(text) {
            return Err(ConfigurationError::InvalidExpiry(text.to_string()));
        }
        ExpiryDate::new(&text[2..], &text[..2])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_field!(ExpiryDate);

/// Primary account number. `Debug` prints the masked form only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber(String);

impl CardNumber {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        let digits: String = text.chars().filter(|c| *c != ' ').collect();
        if !is_digits(&digits) || !(12..=19).contains(&digits.len()) {
            return Err(invalid_field("card number", "expected 12 to 19 digits"));
        }
        Ok(CardNumber(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        let len = self.0.len();
        format!("{}{}{}", &self.0[..6], "*".repeat(len - 10), &self.0[len - 4..])
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CardNumber").field(&self.masked()).finish()
    }
}

string_field!(CardNumber);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cvv2(String);

impl Cvv2 {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if !is_digits(text) || !(3..=4).contains(&text.len()) {
            return Err(invalid_field("cvv2", "expected 3 or 4 digits"));
        }
        Ok(Cvv2(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Cvv2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cvv2(***)")
    }
}

string_field!(Cvv2);

/// Merchant order reference, at most 24 alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if text.is_empty()
            || text.len() > ORDER_ID_LENGTH
            || !text.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(invalid_field(
                "order id",
                "expected 1 to 24 alphanumeric characters",
            ));
        }
        Ok(OrderId(text.to_string()))
    }

    pub fn generate() -> Self {
        OrderId(generate_correlation_id(ORDER_ID_LENGTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_field!(OrderId);

/// 3-D Secure transaction id, exactly 20 alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Xid(String);

impl Xid {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if text.len() != XID_LENGTH || !text.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid_field("xid", "expected 20 alphanumeric characters"));
        }
        Ok(Xid(text.to_string()))
    }

    pub fn generate() -> Self {
        Xid(generate_correlation_id(XID_LENGTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_field!(Xid);

/// Bank reference to an earlier transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostLogKey(String);

impl HostLogKey {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(invalid_field("host log key", "expected alphanumeric text"));
        }
        Ok(HostLogKey(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

string_field!(HostLogKey);

/// Kind of the earlier transaction a refund or cancel refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransactionReference {
    Sale,
    Auth,
    Capture,
    Return,
}

impl TransactionReference {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        match text {
            "sale" => Ok(TransactionReference::Sale),
            "auth" => Ok(TransactionReference::Auth),
            "capt" => Ok(TransactionReference::Capture),
            "return" => Ok(TransactionReference::Return),
            other => Err(invalid_field("transaction", format!("unknown kind {other}"))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransactionReference::Sale => "sale",
            TransactionReference::Auth => "auth",
            TransactionReference::Capture => "capt",
            TransactionReference::Return => "return",
        }
    }
}

string_field!(TransactionReference);

/// What a completed 3-D Secure exchange turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OosTranType {
    Sale,
    Auth,
}

impl OosTranType {
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        match text {
            "Sale" => Ok(OosTranType::Sale),
            "Auth" => Ok(OosTranType::Auth),
            other => Err(invalid_field("tranType", format!("unknown kind {other}"))),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OosTranType::Sale => "Sale",
            OosTranType::Auth => "Auth",
        }
    }
}

string_field!(OosTranType);
