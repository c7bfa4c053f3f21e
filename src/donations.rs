//! Donation intake.
//!
//! Validates the donation form and simulates payment processing. There is no
//! payment gateway behind it and nothing is persisted.

use std::time::Duration;

use chrono::Utc;
use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_AMOUNT: f64 = 1.0;
pub const MAX_AMOUNT: f64 = 100_000.0;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: regex::Regex =
        regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Monthly,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DonationRequest {
    pub amount: f64,
    pub frequency: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub campaign_id: Option<uuid::Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationReceipt {
    pub reference: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DonationError {
    #[error("{0}")]
    Validation(String),
    #[error("Payment processing failed. Please try again.")]
    Processing,
}

/// Checks the form fields and returns the parsed frequency.
pub fn validate(request: &DonationRequest) -> Result<Frequency, DonationError> {
    if !request.amount.is_finite() || !(MIN_AMOUNT..=MAX_AMOUNT).contains(&request.amount) {
        return Err(DonationError::Validation(
            "Amount must be between 1 and 100000".to_string(),
        ));
    }
    let frequency = match request.frequency.as_str() {
        "once" => Frequency::Once,
        "monthly" => Frequency::Monthly,
        _ => {
            return Err(DonationError::Validation(
                "Frequency must be 'once' or 'monthly'".to_string(),
            ))
        }
    };
    if request.name.trim().is_empty() {
        return Err(DonationError::Validation("Name is required".to_string()));
    }
    if !EMAIL_REGEX.is_match(request.email.trim()) {
        return Err(DonationError::Validation("Invalid email format".to_string()));
    }
    Ok(frequency)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// `DON-<base36 millis>-<6 random>`, upper-cased.
pub fn generate_reference() -> String {
    let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 6);
    format!("DON-{}-{}", to_base36(millis), suffix).to_uppercase()
}

#[derive(Debug, Clone)]
pub struct DonationProcessor {
    delay: Duration,
    failure_rate: f64,
}

impl DonationProcessor {
    pub fn new(delay: Duration, failure_rate: f64) -> Self {
        Self {
            delay,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub async fn process(&self, request: &DonationRequest) -> Result<DonationReceipt, DonationError> {
        let frequency = validate(request)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if rand::rng().random_bool(self.failure_rate) {
            tracing::warn!(amount = request.amount, "simulated payment failure");
            return Err(DonationError::Processing);
        }

        let reference = generate_reference();
        tracing::info!(
            reference = %reference,
            amount = request.amount,
            frequency = ?frequency,
            campaign = ?request.campaign_id,
            "donation accepted"
        );
        let message = match frequency {
            Frequency::Once => format!(
                "Thank you, {}! Your donation of ${:.2} was received.",
                request.name.trim(),
                request.amount
            ),
            Frequency::Monthly => format!(
                "Thank you, {}! Your monthly donation of ${:.2} is set up.",
                request.name.trim(),
                request.amount
            ),
        };
        Ok(DonationReceipt {
            reference,
            amount: request.amount,
            frequency,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: f64, frequency: &str) -> DonationRequest {
        DonationRequest {
            amount,
            frequency: frequency.to_string(),
            name: "Sam Donor".to_string(),
            email: "sam@example.org".to_string(),
            campaign_id: None,
        }
    }

    #[test]
    fn test_amount_bounds() {
        assert!(validate(&request(1.0, "once")).is_ok());
        assert!(validate(&request(100_000.0, "monthly")).is_ok());
        assert!(validate(&request(0.5, "once")).is_err());
        assert!(validate(&request(100_000.01, "once")).is_err());
        assert!(validate(&request(f64::NAN, "once")).is_err());
    }

    #[test]
    fn test_frequency_and_contact_fields() {
        assert!(matches!(
            validate(&request(10.0, "yearly")),
            Err(DonationError::Validation(_))
        ));
        let mut bad_email = request(10.0, "once");
        bad_email.email = "not-an-email".to_string();
        assert!(validate(&bad_email).is_err());
        let mut no_name = request(10.0, "once");
        no_name.name = "   ".to_string();
        assert!(validate(&no_name).is_err());
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_reference();
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "DON");
        assert_eq!(parts[2].len(), 6);
        assert_eq!(reference, reference.to_uppercase());
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[tokio::test]
    async fn test_process_without_failures() {
        let processor = DonationProcessor::new(Duration::ZERO, 0.0);
        let receipt = processor.process(&request(25.0, "monthly")).await.unwrap();
        assert_eq!(receipt.frequency, Frequency::Monthly);
        assert!(receipt.reference.starts_with("DON-"));
        assert!(receipt.message.contains("$25.00"));
    }

    #[tokio::test]
    async fn test_process_always_failing() {
        let processor = DonationProcessor::new(Duration::ZERO, 1.0);
        let err = processor.process(&request(25.0, "once")).await.unwrap_err();
        assert_eq!(err, DonationError::Processing);
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_processed() {
        let processor = DonationProcessor::new(Duration::ZERO, 1.0);
        let err = processor.process(&request(0.0, "once")).await.unwrap_err();
        assert!(matches!(err, DonationError::Validation(_)));
    }
}
