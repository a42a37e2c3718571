//! Callback security tests
//!
//! Tests for Duitku callback signature verification and payload decoding.

use md5::{Digest, Md5};

use lensa_billing_core::{BillingError, CallbackPayload, CallbackVerifier, GatewayStatus};

const MERCHANT_CODE: &str = "D1234";
const API_KEY: &str = "test-api-key";

/// Compute the callback signature the way the gateway does:
/// md5(merchantCode + amount + merchantOrderId + apiKey)
fn gateway_signature(merchant_code: &str, amount: &str, order_id: &str, api_key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(merchant_code.as_bytes());
    hasher.update(amount.as_bytes());
    hasher.update(order_id.as_bytes());
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn valid_payload(order_id: &str, amount: &str, result_code: &str) -> CallbackPayload {
    CallbackPayload {
        merchant_code: MERCHANT_CODE.to_string(),
        amount: amount.to_string(),
        merchant_order_id: order_id.to_string(),
        payment_code: Some("VC".to_string()),
        result_code: result_code.to_string(),
        reference: Some("DREF-1".to_string()),
        signature: gateway_signature(MERCHANT_CODE, amount, order_id, API_KEY),
        publisher_order_id: None,
        settlement_date: None,
        issuer_code: None,
    }
}

#[test]
fn test_verifier_matches_gateway_recipe() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, API_KEY);
    assert_eq!(
        verifier.sign("SUB-abc-1000", "45000"),
        gateway_signature(MERCHANT_CODE, "45000", "SUB-abc-1000", API_KEY)
    );
}

#[test]
fn test_valid_callback_accepted() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, API_KEY);
    let payload = valid_payload("SUB-abc-1000", "45000", "00");
    assert_eq!(verifier.verify(&payload).unwrap(), GatewayStatus::Paid);
}

#[test]
fn test_forged_signature_rejected() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, API_KEY);
    let mut payload = valid_payload("SUB-abc-1000", "45000", "00");
    payload.signature = "d41d8cd98f00b204e9800998ecf8427e".to_string();
    assert!(matches!(
        verifier.verify(&payload),
        Err(BillingError::InvalidSignature)
    ));
}

#[test]
fn test_signature_bound_to_amount() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, API_KEY);
    // A signature for one amount must not authorize another
    let mut payload = valid_payload("SUB-abc-1000", "45000", "00");
    payload.amount = "1000".to_string();
    assert!(verifier.verify(&payload).is_err());
}

#[test]
fn test_signature_bound_to_order() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, API_KEY);
    let mut payload = valid_payload("SUB-abc-1000", "45000", "00");
    payload.merchant_order_id = "SUB-abc-2000".to_string();
    assert!(verifier.verify(&payload).is_err());
}

#[test]
fn test_wrong_api_key_rejected() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, "some-other-key");
    let payload = valid_payload("SUB-abc-1000", "45000", "00");
    assert!(verifier.verify(&payload).is_err());
}

#[test]
fn test_result_code_mapping() {
    let verifier = CallbackVerifier::new(MERCHANT_CODE, API_KEY);

    assert_eq!(
        verifier.verify(&valid_payload("SUB-a-1", "45000", "00")).unwrap(),
        GatewayStatus::Paid
    );
    assert_eq!(
        verifier.verify(&valid_payload("SUB-a-1", "45000", "01")).unwrap(),
        GatewayStatus::Failed
    );
    // Anything else is still pending
    for code in ["02", "03", "", "xx"] {
        assert_eq!(
            verifier.verify(&valid_payload("SUB-a-1", "45000", code)).unwrap(),
            GatewayStatus::Pending
        );
    }
}

#[test]
fn test_form_encoded_payload_decodes() {
    // The gateway posts application/x-www-form-urlencoded with camelCase keys
    let body = "merchantCode=D1234&amount=45000&merchantOrderId=SUB-abc-1000\
                &paymentCode=VC&resultCode=00&reference=DREF-1&signature=deadbeef";
    let payload: CallbackPayload = serde_urlencoded::from_str(body).unwrap();

    assert_eq!(payload.merchant_code, "D1234");
    assert_eq!(payload.amount, "45000");
    assert_eq!(payload.merchant_order_id, "SUB-abc-1000");
    assert_eq!(payload.result_code, "00");
    assert_eq!(payload.payment_code.as_deref(), Some("VC"));
}

#[test]
fn test_optional_fields_may_be_absent() {
    let body = "merchantCode=D1234&amount=45000&merchantOrderId=SUB-abc-1000\
                &resultCode=00&signature=deadbeef";
    let payload: CallbackPayload = serde_urlencoded::from_str(body).unwrap();

    assert!(payload.payment_code.is_none());
    assert!(payload.reference.is_none());
    assert!(payload.settlement_date.is_none());
}
