//! Lenient deserializers for environment-sourced configuration
//!
//! Environment providers hand over values with their own type guesses: `APP_ID=123`
//! arrives as an integer, `FLAG=yes` as a string. These helpers accept either form.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Boolean accepting `true/false`, `0/1` and `"yes"/"no"` style strings (case-insensitive)
pub fn deserialize_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Scalar::deserialize(deserializer)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Int(0) => Ok(false),
        Scalar::Int(1) => Ok(true),
        Scalar::Int(i) => Err(D::Error::custom(format!(
            "Invalid integer value {}, expected 0 or 1",
            i
        ))),
        Scalar::Float(f) => Err(D::Error::custom(format!("Invalid boolean value {}", f))),
        Scalar::String(s) => {
            let t = s.trim();
            if t == "1"
                || t.eq_ignore_ascii_case("true")
                || t.eq_ignore_ascii_case("yes")
                || t.eq_ignore_ascii_case("on")
            {
                Ok(true)
            } else if t.is_empty()
                || t == "0"
                || t.eq_ignore_ascii_case("false")
                || t.eq_ignore_ascii_case("no")
                || t.eq_ignore_ascii_case("off")
            {
                Ok(false)
            } else {
                Err(D::Error::custom(format!(
                    "Invalid boolean value '{}', expected: 1/0, true/false, yes/no",
                    s
                )))
            }
        },
    }
}

/// String that may have been parsed as a number or bool by the provider
pub fn deserialize_string_lossy<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => String::new(),
        Some(Scalar::Bool(b)) => b.to_string(),
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        Some(Scalar::String(s)) => s,
    })
}

/// Unsigned integer given either natively or as a string; empty string is 0
pub fn deserialize_u64_flexible<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) if i >= 0 => Ok(i as u64),
        Scalar::Int(i) => Err(D::Error::custom(format!("negative value {} not allowed", i))),
        Scalar::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        Scalar::Float(f) => Err(D::Error::custom(format!("expected whole number, got {}", f))),
        Scalar::Bool(b) => Err(D::Error::custom(format!("expected number, got {}", b))),
        Scalar::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Ok(0)
            } else {
                t.parse::<u64>().map_err(D::Error::custom)
            }
        },
    }
}
