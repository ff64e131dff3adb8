//! End-to-end checks of the Posnet wire format through the public API.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use posnet_gateway::models::common::{
    map_currency, normalize_amount, normalize_expiry, normalize_installment, Amount, CardNumber,
    CurrencyCode, Cvv2, ExpiryDate, Installment, OrderId,
};
use posnet_gateway::models::requests::{CardPayment, PosnetRequest, Transaction};
use posnet_gateway::models::responses::PosnetResponse;
use posnet_gateway::services::crypto::compute_mac;
use posnet_gateway::services::endpoints::{EndpointTable, Environment};
use posnet_gateway::services::posnet_client::decode_body;
use posnet_gateway::services::redirect::build_redirect_form;

#[test]
fn test_direct_sale_from_raw_merchant_input() {
    let payment = CardPayment {
        card_number: CardNumber::parse("4506349116608409").unwrap(),
        expiry: ExpiryDate::parse(&normalize_expiry("3", "07").unwrap()).unwrap(),
        cvv2: Cvv2::parse("000").unwrap(),
        amount: Amount::parse(&normalize_amount("1,00").unwrap()).unwrap(),
        currency: map_currency("TRY").unwrap(),
        installment: Installment::parse(&normalize_installment(0).unwrap()).unwrap(),
        order_id: OrderId::generate(),
        mail_order: None,
    };
    let request = PosnetRequest::new("6706598320", "67005551", Transaction::Sale(payment));

    let xml = request.to_xml().expect("sale should serialize");
    assert!(xml.contains("<expDate>0703</expDate>"));
    assert!(xml.contains("<amount>100</amount>"));
    assert!(xml.contains("<currencyCode>TL</currencyCode>"));

    let parsed = PosnetRequest::from_xml(&xml).expect("sale should parse back");
    assert_eq!(parsed, request);
}

#[test]
fn test_three_d_resolve_mac_matches_bank_formula() {
    let key = "10,10,10,10,10,10,10,10";
    let tid = "67005551";
    let mac = compute_mac(
        "ABCDEFGHIJ0123456789",
        "5696",
        CurrencyCode::Lira.as_str(),
        "6706598320",
        key,
        tid,
        Some("1"),
    );

    let response = format!(
        "<posnetResponse><approved>1</approved><oosResolveMerchantDataResponse>\
         <xid>ABCDEFGHIJ0123456789</xid><amount>5696</amount><currency>TL</currency>\
         <mdStatus>1</mdStatus><mac>{mac}</mac></oosResolveMerchantDataResponse></posnetResponse>"
    );
    let decoded = PosnetResponse::from_xml(&response).unwrap();
    let resolved = decoded.oos_resolve_merchant_data.unwrap();
    assert_eq!(
        resolved.mac,
        compute_mac(
            &resolved.xid,
            &resolved.amount,
            &resolved.currency,
            "6706598320",
            key,
            tid,
            Some(&resolved.md_status),
        )
    );
}

#[test]
fn test_legacy_encoded_decline_is_readable() {
    let (body, _, _) = encoding_rs::WINDOWS_1254.encode(
        "<?xml version=\"1.0\" encoding=\"ISO-8859-9\"?>\
         <posnetResponse><approved>0</approved><respCode>0148</respCode>\
         <respText>Geçersiz işlem</respText></posnetResponse>",
    );
    let text = decode_body(&body, Some("text/xml;charset=ISO-8859-9")).unwrap();
    let response = PosnetResponse::from_xml(&text).unwrap();
    assert!(!response.is_approved());
    assert_eq!(response.error_text.as_deref(), Some("Geçersiz işlem"));
}

#[test]
fn test_redirect_form_targets_production_3d_page() {
    let fields = vec![
        ("mid".to_string(), "6706598320".to_string()),
        ("posnetData".to_string(), "A\"B<C".to_string()),
    ];
    let blob = build_redirect_form(&EndpointTable::default(), &Environment::Production, &fields)
        .unwrap();
    let page = String::from_utf8(BASE64.decode(blob).unwrap()).unwrap();

    assert!(page.contains(
        "action=\"https://posnet.yapikredi.com.tr/3DSWebService/YKBPaymentService\""
    ));
    assert!(page.contains("value=\"A&quot;B&lt;C\""));
}
