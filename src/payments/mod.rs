//! Clients for the hosted payment gateways.
//!
//! Both gateways are used the same way: create an order or checkout session for
//! an appointment's fee, then confirm the payment by querying the gateway
//! before the appointment is marked paid.

pub mod razorpay;
pub mod stripe;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0} is not configured")]
    Disabled(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{gateway} rejected the request ({status}): {message}")]
    Rejected {
        gateway: &'static str,
        status: u16,
        message: String,
    },

    #[error("invalid payment signature")]
    InvalidSignature,

    #[error("invalid payment reference {0:?}")]
    InvalidReference(String),

    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),
}

/// Converts a fee in major currency units to the gateways' minor units.
pub fn minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Joins `segments` onto the gateway base URL, percent-encoding each one as a
/// single path segment. Empty, `.` and `..` segments are refused.
pub(crate) fn endpoint(api_base: &str, segments: &[&str]) -> Result<reqwest::Url, PaymentError> {
    if let Some(bad) = segments
        .iter()
        .find(|segment| matches!(segment.trim(), "" | "." | ".."))
    {
        return Err(PaymentError::InvalidReference(bad.to_string()));
    }
    let mut url = reqwest::Url::parse(api_base)
        .map_err(|err| PaymentError::InvalidUrl(format!("{api_base}: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| PaymentError::InvalidUrl(api_base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) async fn rejection(gateway: &'static str, response: reqwest::Response) -> PaymentError {
    let status = response.status().as_u16();
    let message = match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .pointer("/error/description")
            .or_else(|| body.pointer("/error/message"))
            .and_then(|value| value.as_str())
            .unwrap_or("unexpected response")
            .to_string(),
        Err(_) => "unexpected response".to_string(),
    };
    PaymentError::Rejected {
        gateway,
        status,
        message,
    }
}
