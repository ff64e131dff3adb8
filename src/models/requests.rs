use super::common::{
    Amount, CardNumber, CurrencyCode, Cvv2, ExpiryDate, HostLogKey, Installment, OosTranType,
    OrderId, TransactionReference, Xid,
};
use crate::error::PosnetError;
use serde::{Deserialize, Serialize};

/// The `posnetRequest` envelope. It always carries exactly one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "posnetRequest")]
pub struct PosnetRequest {
    pub mid: String,
    pub tid: String,
    #[serde(
        rename = "tranDateRequired",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tran_date_required: Option<String>,
    #[serde(rename = "$value")]
    pub transaction: Transaction,
}

/// One transaction kind; the variant name is the XML element the bank expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    #[serde(rename = "sale")]
    Sale(CardPayment),
    #[serde(rename = "auth")]
    PreAuth(CardPayment),
    #[serde(rename = "capt")]
    PostAuth(PostAuth),
    #[serde(rename = "return")]
    Refund(Refund),
    #[serde(rename = "reverse")]
    Cancel(Cancel),
    #[serde(rename = "oosRequestData")]
    OosInitiate(OosRequestData),
    #[serde(rename = "oosResolveMerchantData")]
    OosResolve(OosResolveMerchantData),
    #[serde(rename = "oosTranData")]
    OosTransfer(OosTranData),
}

impl Transaction {
    pub fn name(&self) -> &'static str {
        match self {
            Transaction::Sale(_) => "sale",
            Transaction::PreAuth(_) => "auth",
            Transaction::PostAuth(_) => "capt",
            Transaction::Refund(_) => "return",
            Transaction::Cancel(_) => "reverse",
            Transaction::OosInitiate(_) => "oosRequestData",
            Transaction::OosResolve(_) => "oosResolveMerchantData",
            Transaction::OosTransfer(_) => "oosTranData",
        }
    }
}

/// Body of a direct `sale` or `auth` (pre-authorization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardPayment {
    #[serde(rename = "ccno")]
    pub card_number: CardNumber,
    #[serde(rename = "expDate")]
    pub expiry: ExpiryDate,
    #[serde(rename = "cvc")]
    pub cvv2: Cvv2,
    pub amount: Amount,
    #[serde(rename = "currencyCode")]
    pub currency: CurrencyCode,
    pub installment: Installment,
    #[serde(rename = "orderID")]
    pub order_id: OrderId,
    #[serde(
        rename = "mailorderflag",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mail_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAuth {
    pub amount: Amount,
    #[serde(rename = "currencyCode")]
    pub currency: CurrencyCode,
    pub installment: Installment,
    #[serde(rename = "hostlogkey")]
    pub host_log_key: HostLogKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub amount: Amount,
    #[serde(rename = "currencyCode")]
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionReference>,
    #[serde(rename = "hostlogkey")]
    pub host_log_key: HostLogKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub transaction: TransactionReference,
    #[serde(rename = "hostlogkey")]
    pub host_log_key: HostLogKey,
}

/// First leg of 3-D Secure: asks the bank to encrypt the card data for the redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OosRequestData {
    #[serde(rename = "posnetid")]
    pub posnet_id: String,
    #[serde(rename = "XID")]
    pub xid: Xid,
    #[serde(rename = "tranType")]
    pub tran_type: OosTranType,
    #[serde(
        rename = "cardHolderName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub card_holder_name: Option<String>,
    #[serde(rename = "ccno")]
    pub card_number: CardNumber,
    #[serde(rename = "expDate")]
    pub expiry: ExpiryDate,
    #[serde(rename = "cvc")]
    pub cvv2: Cvv2,
    pub amount: Amount,
    #[serde(rename = "currencyCode")]
    pub currency: CurrencyCode,
    pub installment: Installment,
}

/// Second leg: decrypts the packets the bank posted back to the merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OosResolveMerchantData {
    #[serde(rename = "bankData")]
    pub bank_data: String,
    #[serde(rename = "merchantData")]
    pub merchant_data: String,
    pub sign: String,
    pub mac: String,
}

/// Final leg: turns a verified 3-D authentication into a financial transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OosTranData {
    #[serde(rename = "bankData")]
    pub bank_data: String,
    #[serde(rename = "wpAmount")]
    pub wp_amount: Amount,
    pub mac: String,
}

impl PosnetRequest {
    pub fn new(merchant_id: &str, terminal_id: &str, transaction: Transaction) -> Self {
        Self {
            mid: merchant_id.to_string(),
            tid: terminal_id.to_string(),
            tran_date_required: Some("1".to_string()),
            transaction,
        }
    }

    pub fn to_xml(&self) -> Result<String, PosnetError> {
        quick_xml::se::to_string(self).map_err(PosnetError::RequestEncoding)
    }

    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// Reference the bank can use to reconcile this request with merchant logs, if it has one.
    pub fn reference(&self) -> Option<&str> {
        match &self.transaction {
            Transaction::Sale(payment) | Transaction::PreAuth(payment) => {
                Some(payment.order_id.as_str())
            }
            Transaction::OosInitiate(data) => Some(data.xid.as_str()),
            _ => None,
        }
    }

    pub fn posnet_id(&self) -> Option<&str> {
        match &self.transaction {
            Transaction::OosInitiate(data) => Some(data.posnet_id.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale() -> PosnetRequest {
        PosnetRequest::new(
            "6706598320",
            "67005551",
            Transaction::Sale(CardPayment {
                card_number: CardNumber::parse("4506349116608409").unwrap(),
                expiry: ExpiryDate::parse("0703").unwrap(),
                cvv2: Cvv2::parse("000").unwrap(),
                amount: Amount::parse("100").unwrap(),
                currency: CurrencyCode::parse("TL").unwrap(),
                installment: Installment::parse("00").unwrap(),
                order_id: OrderId::parse("ORDER0000000000000000001").unwrap(),
                mail_order: None,
            }),
        )
    }

    #[test]
    fn sale_serializes_to_bank_schema() {
        let xml = sale().to_xml().unwrap();
        assert!(xml.starts_with("<posnetRequest><mid>6706598320</mid><tid>67005551</tid>"));
        assert!(xml.contains("<tranDateRequired>1</tranDateRequired><sale>"));
        assert!(xml.contains("<ccno>4506349116608409</ccno>"));
        assert!(xml.contains("<expDate>0703</expDate>"));
        assert!(xml.contains("<cvc>000</cvc>"));
        assert!(xml.contains("<amount>100</amount>"));
        assert!(xml.contains("<currencyCode>TL</currencyCode>"));
        assert!(xml.contains("<installment>00</installment>"));
        assert!(xml.contains("<orderID>ORDER0000000000000000001</orderID>"));
        assert!(xml.ends_with("</sale></posnetRequest>"));
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let xml = sale().to_xml().unwrap();
        assert!(!xml.contains("mailorderflag"));

        let mut request = sale();
        request.tran_date_required = None;
        if let Transaction::Sale(payment) = &mut request.transaction {
            payment.mail_order = Some(String::new());
        }
        let xml = request.to_xml().unwrap();
        assert!(!xml.contains("tranDateRequired"));
        assert!(xml.contains("<mailorderflag"));
    }

    #[test]
    fn sale_round_trips_through_xml() {
        let request = sale();
        let parsed = PosnetRequest::from_xml(&request.to_xml().unwrap()).unwrap();
        assert_eq!(parsed, request);
        match parsed.transaction {
            Transaction::Sale(payment) => assert_eq!(payment.mail_order, None),
            other => panic!("expected sale, got {}", other.name()),
        }
    }

    #[test]
    fn cancel_uses_reverse_element() {
        let request = PosnetRequest::new(
            "6706598320",
            "67005551",
            Transaction::Cancel(Cancel {
                transaction: TransactionReference::Sale,
                host_log_key: HostLogKey::parse("021234567890").unwrap(),
            }),
        );
        let xml = request.to_xml().unwrap();
        assert!(xml.contains(
            "<reverse><transaction>sale</transaction><hostlogkey>021234567890</hostlogkey></reverse>"
        ));
        assert_eq!(request.reference(), None);
    }

    #[test]
    fn refund_round_trips_without_reference() {
        let request = PosnetRequest::new(
            "6706598320",
            "67005551",
            Transaction::Refund(Refund {
                amount: Amount::parse("5,00").unwrap(),
                currency: CurrencyCode::parse("EUR").unwrap(),
                transaction: None,
                host_log_key: HostLogKey::parse("021234567890").unwrap(),
            }),
        );
        let xml = request.to_xml().unwrap();
        assert!(xml.contains("<return><amount>500</amount><currencyCode>EU</currencyCode>"));
        assert!(!xml.contains("<transaction>"));
        assert_eq!(PosnetRequest::from_xml(&xml).unwrap(), request);
    }

    #[test]
    fn oos_request_exposes_correlation_headers() {
        let xid = Xid::generate();
        let request = PosnetRequest::new(
            "6706598320",
            "67005551",
            Transaction::OosInitiate(OosRequestData {
                posnet_id: "1010028724242434".into(),
                xid: xid.clone(),
                tran_type: OosTranType::Sale,
                card_holder_name: Some("Ali Veli".into()),
                card_number: CardNumber::parse("4506349116608409").unwrap(),
                expiry: ExpiryDate::new("3", "23").unwrap(),
                cvv2: Cvv2::parse("000").unwrap(),
                amount: Amount::parse("100").unwrap(),
                currency: CurrencyCode::Lira,
                installment: Installment::single(),
            }),
        );
        assert_eq!(request.reference(), Some(xid.as_str()));
        assert_eq!(request.posnet_id(), Some("1010028724242434"));

        let xml = request.to_xml().unwrap();
        assert!(xml.contains("<oosRequestData><posnetid>1010028724242434</posnetid>"));
        assert!(xml.contains("<tranType>Sale</tranType>"));
        assert!(xml.contains("<cardHolderName>Ali Veli</cardHolderName>"));
    }

    #[test]
    fn invalid_field_values_are_rejected_when_parsing() {
        let xml = sale()
            .to_xml()
            .unwrap()
            .replace("<currencyCode>TL</currencyCode>", "<currencyCode>GBP</currencyCode>");
        assert!(PosnetRequest::from_xml(&xml).is_err());
    }
}
