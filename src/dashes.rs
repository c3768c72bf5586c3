//! Dashes (monetary tips), preset amounts, and the payment redirect contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Currency;

/// Maximum length of the optional message attached to a dash, in characters.
pub const MAX_DASH_MESSAGE_LEN: usize = 200;

/// Sender summary attached to a dash or a dash push event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashSender {
    pub id: String,
    pub display_name: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// A settled tip. Immutable once received; the client only displays it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dash {
    pub id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: Currency,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sender: DashSender,
}

/// A preset amount offered in the dash modal, in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashPreset {
    pub amount: i64,
    pub display: String,
}

/// `new-dash` push payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewDashEvent {
    pub dash_id: String,
    pub moment_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub message: Option<String>,
    pub sender: DashSender,
    pub formatted_amount: String,
}

/// `dash-total-update` push payload. Authoritative; always applied wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashTotalUpdate {
    pub moment_id: String,
    pub total_dashes: i64,
    pub dash_count: i64,
}

/// Converts a free-form major-unit amount input to minor units.
///
/// Only the leading digits of the input are considered, so `"50"` and
/// `"50.75"` both resolve to 50 major units. Returns `None` when the input
/// carries no leading digits, which clears the selection in the dash flow.
pub fn custom_amount_to_minor(input: &str, currency: Currency) -> Option<i64> {
    let trimmed = input.trim();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let major: i64 = digits.parse().ok()?;
    major.checked_mul(currency.minor_units_per_major())
}

/// Truncates a dash message to [`MAX_DASH_MESSAGE_LEN`] characters,
/// respecting char boundaries.
pub fn clamp_message(message: &str) -> &str {
    match message.char_indices().nth(MAX_DASH_MESSAGE_LEN) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

/// Enumerated failure codes carried by the payment-failed redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFailure {
    PaymentFailed,
    VerificationFailed,
    InvalidReference,
    ServerError,
    /// Any unrecognized code; rendered with the generic message.
    Unknown,
}

impl PaymentFailure {
    pub fn from_code(code: &str) -> Self {
        match code {
            "payment_failed" => PaymentFailure::PaymentFailed,
            "verification_failed" => PaymentFailure::VerificationFailed,
            "invalid_reference" => PaymentFailure::InvalidReference,
            "server_error" => PaymentFailure::ServerError,
            _ => PaymentFailure::Unknown,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PaymentFailure::PaymentFailed => "The payment could not be completed.",
            PaymentFailure::VerificationFailed => "Payment verification failed.",
            PaymentFailure::InvalidReference => "Invalid payment reference.",
            PaymentFailure::ServerError => "A server error occurred.",
            PaymentFailure::Unknown => "Something went wrong with your payment.",
        }
    }
}

/// Terminal state reported back by the external payment page via redirect
/// query parameters. The success route carries `reference`, the failure
/// route carries `error`; a failure redirect with no code defaults to
/// `payment_failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { reference: Option<String> },
    Failure(PaymentFailure),
}

impl PaymentOutcome {
    /// Parses the query string of the success redirect page.
    pub fn from_success_query(query: &str) -> Self {
        PaymentOutcome::Success {
            reference: query_param(query, "reference"),
        }
    }

    /// Parses the query string of the failure redirect page.
    pub fn from_failure_query(query: &str) -> Self {
        let failure = match query_param(query, "error") {
            Some(code) => PaymentFailure::from_code(&code),
            None => PaymentFailure::PaymentFailed,
        };
        PaymentOutcome::Failure(failure)
    }

    pub fn message(&self) -> &str {
        match self {
            PaymentOutcome::Success { .. } => "Dash sent successfully!",
            PaymentOutcome::Failure(failure) => failure.message(),
        }
    }
}

// Payment references and error codes are plain alphanumeric tokens, so a
// simple pair split is sufficient; no percent-decoding is required.
fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_amount_converts_to_minor_units() {
        assert_eq!(custom_amount_to_minor("50", Currency::Ngn), Some(5000));
        assert_eq!(custom_amount_to_minor(" 1250 ", Currency::Kes), Some(125000));
    }

    #[test]
    fn test_custom_amount_ignores_fractional_part() {
        assert_eq!(custom_amount_to_minor("50.75", Currency::Zar), Some(5000));
    }

    #[test]
    fn test_custom_amount_rejects_non_numeric_input() {
        assert_eq!(custom_amount_to_minor("", Currency::Ngn), None);
        assert_eq!(custom_amount_to_minor("abc", Currency::Ngn), None);
        assert_eq!(custom_amount_to_minor("-5", Currency::Ngn), None);
    }

    #[test]
    fn test_clamp_message_caps_at_limit() {
        let long = "a".repeat(MAX_DASH_MESSAGE_LEN + 50);
        assert_eq!(clamp_message(&long).chars().count(), MAX_DASH_MESSAGE_LEN);

        let short = "nice one!";
        assert_eq!(clamp_message(short), short);
    }

    #[test]
    fn test_clamp_message_respects_char_boundaries() {
        let msg = "é".repeat(MAX_DASH_MESSAGE_LEN + 10);
        let clamped = clamp_message(&msg);
        assert_eq!(clamped.chars().count(), MAX_DASH_MESSAGE_LEN);
    }

    #[test]
    fn test_failure_codes_map_to_fixed_messages() {
        let outcome = PaymentOutcome::from_failure_query("?error=invalid_reference");
        assert_eq!(outcome.message(), "Invalid payment reference.");

        let outcome = PaymentOutcome::from_failure_query("error=verification_failed");
        assert_eq!(outcome.message(), "Payment verification failed.");
    }

    #[test]
    fn test_unknown_failure_code_falls_back_to_generic_message() {
        let outcome = PaymentOutcome::from_failure_query("?error=unknown_code");
        assert_eq!(
            outcome,
            PaymentOutcome::Failure(PaymentFailure::Unknown)
        );
        assert_eq!(outcome.message(), "Something went wrong with your payment.");
    }

    #[test]
    fn test_missing_failure_code_defaults_to_payment_failed() {
        let outcome = PaymentOutcome::from_failure_query("");
        assert_eq!(
            outcome,
            PaymentOutcome::Failure(PaymentFailure::PaymentFailed)
        );
    }

    #[test]
    fn test_success_query_extracts_reference() {
        let outcome = PaymentOutcome::from_success_query("?reference=DSH-20250601-8f3a&extra=1");
        assert_eq!(
            outcome,
            PaymentOutcome::Success {
                reference: Some("DSH-20250601-8f3a".to_string())
            }
        );

        let outcome = PaymentOutcome::from_success_query("");
        assert_eq!(outcome, PaymentOutcome::Success { reference: None });
    }

    #[test]
    fn test_new_dash_event_deserializes() {
        let json = r#"{
            "dashId": "d1",
            "momentId": "m1",
            "amount": 5000,
            "currency": "NGN",
            "message": "fire!",
            "sender": {
                "id": "u1",
                "displayName": "Chidi",
                "username": "chidi_l",
                "avatarUrl": null
            },
            "formattedAmount": "₦50"
        }"#;

        let event: NewDashEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.moment_id, "m1");
        assert_eq!(event.amount, 5000);
        assert_eq!(event.formatted_amount, "₦50");
    }
}
