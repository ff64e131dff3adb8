use crate::error::{ConfigurationError, ErrorKind, PosnetError};
use crate::models::common::Xid;
use crate::models::gateway::{
    CancelRequest, PaymentRequest, PostAuthRequest, RefundRequest, ThreeDCompleteRequest,
    ThreeDInitiateRequest, ThreeDResolveRequest,
};
use crate::models::requests::Transaction;
use crate::models::responses::{ApiError, ApiResponse, ThreeDInitiation, TransactionResult};
use crate::services::endpoints::Environment;
use crate::services::posnet_client::PosnetClient;
use crate::services::redirect::{build_redirect_form, OosRedirectFields};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Result as ActixResult};
use log::{error, info, warn};
use serde::Serialize;

/// Shared by all handlers; read-only after start-up.
pub struct GatewayState {
    pub client: PosnetClient,
    pub environment: Environment,
    pub return_url: Option<String>,
    pub lang: String,
}

pub async fn sale(
    state: web::Data<GatewayState>,
    request: web::Json<PaymentRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received sale request");

    let result = async {
        let payment = request.into_inner().into_card_payment()?;
        let order_id = payment.order_id.to_string();
        let envelope = state.client.envelope(Transaction::Sale(payment));
        let response = state.client.execute(&state.environment, &envelope).await?;
        Ok::<_, PosnetError>(TransactionResult::from_response(response, Some(order_id)))
    }
    .await;

    respond("sale", result)
}

pub async fn preauth(
    state: web::Data<GatewayState>,
    request: web::Json<PaymentRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received pre-authorization request");

    let result = async {
        let payment = request.into_inner().into_card_payment()?;
        let order_id = payment.order_id.to_string();
        let envelope = state.client.envelope(Transaction::PreAuth(payment));
        let response = state.client.execute(&state.environment, &envelope).await?;
        Ok::<_, PosnetError>(TransactionResult::from_response(response, Some(order_id)))
    }
    .await;

    respond("pre-authorization", result)
}

pub async fn postauth(
    state: web::Data<GatewayState>,
    request: web::Json<PostAuthRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received post-authorization request");

    let result = async {
        let capture = request.into_inner().into_post_auth()?;
        let envelope = state.client.envelope(Transaction::PostAuth(capture));
        let response = state.client.execute(&state.environment, &envelope).await?;
        Ok::<_, PosnetError>(TransactionResult::from_response(response, None))
    }
    .await;

    respond("post-authorization", result)
}

pub async fn refund(
    state: web::Data<GatewayState>,
    request: web::Json<RefundRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received refund request");

    let result = async {
        let refund = request.into_inner().into_refund()?;
        let envelope = state.client.envelope(Transaction::Refund(refund));
        let response = state.client.execute(&state.environment, &envelope).await?;
        Ok::<_, PosnetError>(TransactionResult::from_response(response, None))
    }
    .await;

    respond("refund", result)
}

pub async fn cancel(
    state: web::Data<GatewayState>,
    request: web::Json<CancelRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received cancel request");

    let result = async {
        let cancel = request.into_inner().into_cancel()?;
        let envelope = state.client.envelope(Transaction::Cancel(cancel));
        let response = state.client.execute(&state.environment, &envelope).await?;
        Ok::<_, PosnetError>(TransactionResult::from_response(response, None))
    }
    .await;

    respond("cancel", result)
}

/// Starts 3-D Secure and returns the Base64 page that forwards the cardholder to the bank.
pub async fn initiate_3d(
    state: web::Data<GatewayState>,
    request: web::Json<ThreeDInitiateRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received 3-D Secure initiation request");

    let result = async {
        let (payment, return_url) = request.into_inner().into_payment()?;
        let return_url = return_url
            .or_else(|| state.return_url.clone())
            .ok_or(ConfigurationError::MissingSetting("POSNET_RETURN_URL"))?;
        let credentials = state.client.credentials();
        let posnet_id = credentials
            .posnet_id
            .clone()
            .ok_or(ConfigurationError::MissingPosnetId)?;

        let xid = Xid::generate();
        let packets = state
            .client
            .initiate_3d(&state.environment, xid.clone(), payment)
            .await?;

        let fields = OosRedirectFields {
            merchant_id: credentials.merchant_id.clone(),
            posnet_id,
            packets,
            return_url,
            lang: state.lang.clone(),
        }
        .into_fields();
        let redirect_form =
            build_redirect_form(state.client.endpoints(), &state.environment, &fields)?;

        Ok::<_, PosnetError>(ThreeDInitiation {
            xid: xid.to_string(),
            redirect_form,
        })
    }
    .await;

    respond("3-D Secure initiation", result)
}

pub async fn resolve_3d(
    state: web::Data<GatewayState>,
    request: web::Json<ThreeDResolveRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received 3-D Secure resolve request");

    let result = async {
        let request = request.into_inner();
        let expected = request.reference.to_expectation()?;
        let resolved = state
            .client
            .resolve_3d(
                &state.environment,
                request.bank_data,
                request.merchant_data,
                request.sign,
                &expected,
            )
            .await?;
        Ok::<_, PosnetError>(resolved)
    }
    .await;

    respond("3-D Secure resolve", result)
}

pub async fn complete_3d(
    state: web::Data<GatewayState>,
    request: web::Json<ThreeDCompleteRequest>,
) -> ActixResult<HttpResponse> {
    info!("Received 3-D Secure completion request");

    let result = async {
        let request = request.into_inner();
        let expected = request.reference.to_expectation()?;
        let response = state
            .client
            .complete_3d(&state.environment, request.bank_data, &expected)
            .await?;
        Ok::<_, PosnetError>(TransactionResult::from_response(
            response,
            Some(expected.xid.to_string()),
        ))
    }
    .await;

    respond("3-D Secure completion", result)
}

fn respond<T: Serialize>(
    operation: &str,
    result: Result<T, PosnetError>,
) -> ActixResult<HttpResponse> {
    match result {
        Ok(data) => {
            info!("Successfully processed {} request", operation);
            Ok(HttpResponse::Ok().json(ApiResponse::ok(data)))
        }
        Err(e) => {
            match e.kind() {
                ErrorKind::Configuration | ErrorKind::Declined => {
                    warn!("Rejected {} request: {}", operation, e)
                }
                _ => error!("Error processing {} request: {}", operation, e),
            }
            Ok(error_response(&e))
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Configuration => StatusCode::BAD_REQUEST,
        ErrorKind::Declined => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Transport | ErrorKind::Decoding => StatusCode::BAD_GATEWAY,
        ErrorKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn error_response(error: &PosnetError) -> HttpResponse {
    let kind = error.kind();
    let code = match error {
        PosnetError::Declined { code, .. } => Some(code.clone()),
        _ => None,
    };
    let body = ApiResponse::<()>::failed(ApiError {
        kind: format!("{:?}", kind),
        message: error.to_string(),
        code,
    });
    HttpResponse::build(status_for(kind)).json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::endpoints::EndpointTable;
    use crate::services::posnet_client::Credentials;
    use actix_web::{test as actix_test, App};
    use std::time::Duration;

    fn state() -> web::Data<GatewayState> {
        let credentials = Credentials {
            merchant_id: "6706598320".into(),
            terminal_id: "67005551".into(),
            key: "10,10,10,10,10,10,10,10".into(),
            posnet_id: None,
        };
        let client =
            PosnetClient::new(credentials, EndpointTable::default(), Duration::from_secs(1))
                .unwrap();
        web::Data::new(GatewayState {
            client,
            environment: Environment::Test,
            return_url: None,
            lang: "tr".into(),
        })
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(status_for(ErrorKind::Configuration), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Declined), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status_for(ErrorKind::Decoding), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Cancelled), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn declined_error_body_carries_bank_code() {
        let response = error_response(&PosnetError::Declined {
            code: "0127".into(),
            text: "ORDERID DAHA ONCE KULLANILMIS".into(),
        });
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[actix_web::test]
    async fn invalid_currency_is_rejected_before_calling_the_bank() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .route("/api/sale", web::post().to(sale)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/sale")
            .set_json(serde_json::json!({
                "amount": "1.00",
                "currency": "GBP",
                "card": {
                    "number": "4506349116608409",
                    "expiry_month": "3",
                    "expiry_year": "23",
                    "cvv2": "000"
                }
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "Configuration");
        assert_eq!(body["error"]["message"], "Configuration error: Unsupported currency: GBP");
    }

    #[actix_web::test]
    async fn oversized_amount_is_a_bad_request() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .route("/api/postauth", web::post().to(postauth)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/postauth")
            .set_json(serde_json::json!({
                "host_log_key": "0000000002P0806031",
                "amount": "79228162514264337593543950335",
                "currency": "TL"
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], "Configuration");
    }

    #[actix_web::test]
    async fn three_d_requires_posnet_id() {
        let app = actix_test::init_service(
            App::new()
                .app_data(state())
                .route("/api/3d/initiate", web::post().to(initiate_3d)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/3d/initiate")
            .set_json(serde_json::json!({
                "amount": "56.96",
                "currency": "TL",
                "return_url": "https://shop.example.com/3d/callback",
                "card": {
                    "number": "4506349116608409",
                    "expiry_month": "3",
                    "expiry_year": "23",
                    "cvv2": "000"
                }
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = actix_test::read_body_json(resp).await;
        assert_eq!(
            body["error"]["message"],
            "Configuration error: Posnet id is required for 3-D Secure transactions"
        );
    }
}
