//! Canonical formatting of property values.
//!
//! The same real-world entity must always produce the same property map,
//! otherwise uniqueness keys and cache keys diverge. ASNs are stored as
//! integers, IP addresses and prefixes in lowercase, and country codes in
//! uppercase. Every other property passes through untouched.

use crate::error::ValidationError;
use crate::value::{Properties, Value};

/// Property holding an autonomous system number.
pub const ASN: &str = "asn";
/// Property holding an IP address.
pub const IP: &str = "ip";
/// Property holding an IP prefix.
pub const PREFIX: &str = "prefix";
/// Property holding an ISO country code.
pub const COUNTRY_CODE: &str = "country_code";

/// Returns the canonical form of `props`.
///
/// The function is pure and idempotent: `normalize(&normalize(p)?)? == normalize(p)?`.
///
/// # Errors
///
/// Returns [`ValidationError::NotAnInteger`] if the ASN cannot be represented
/// as an integer.
///
/// # Examples
///
/// ```
/// use iyp::{normalize, properties, Value};
///
/// let props = properties([("asn", Value::from("65000")), ("country_code", Value::from("jp"))]);
/// let canonical = normalize(&props).unwrap();
///
/// assert_eq!(canonical["asn"], Value::Int(65000));
/// assert_eq!(canonical["country_code"], Value::from("JP"));
/// ```
pub fn normalize(props: &Properties) -> Result<Properties, ValidationError> {
    let mut out = props.clone();

    if let Some(asn) = out.get_mut(ASN) {
        *asn = Value::Int(coerce_int(ASN, asn)?);
    }

    for key in [IP, PREFIX] {
        if let Some(Value::String(s)) = out.get_mut(key) {
            *s = s.to_lowercase();
        }
    }

    if let Some(Value::String(s)) = out.get_mut(COUNTRY_CODE) {
        *s = s.to_uppercase();
    }

    Ok(out)
}

fn coerce_int(property: &str, value: &Value) -> Result<i64, ValidationError> {
    let not_an_integer = || ValidationError::NotAnInteger {
        property: property.to_string(),
        value: value.to_string(),
    };

    match value {
        Value::Int(v) => Ok(*v),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_an_integer()),
        #[allow(clippy::cast_possible_truncation)]
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15 => Ok(*f as i64),
        Value::Float(_) | Value::Timestamp(_) => Err(not_an_integer()),
    }
}
