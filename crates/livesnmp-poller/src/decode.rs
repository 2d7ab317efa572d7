//! Decoding of `snmpget` typed values.
//!
//! With `-O n` every value comes back as `TYPE: RAW`. [`decode`] normalizes
//! the raw text according to its type:
//!
//! | TYPE | Result |
//! |---|---|
//! | `STRING` | surrounding double quotes removed |
//! | `INTEGER`, `Counter32`, `IpAddress`, `OID` | unchanged |
//! | `Hex-STRING` | hex byte pairs turned back into text |
//! | `Timeticks` | human readable part after the tick count |
//! | anything else | unchanged, with a note |

use std::fmt;

use crate::error::DecodeError;

/// Separator between the type and the value.
pub const TYPE_SEPARATOR: &str = ": ";

/// Separator between the tick count and the readable duration.
const TIMETICKS_SEPARATOR: &str = ") ";

/// Types whose raw text is already the value.
const PASSTHROUGH_TYPES: [&str; 4] = ["INTEGER", "Counter32", "IpAddress", "OID"];

/// A decoded value and the type it came with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedValue {
    pub datatype: String,
    pub value: String,
    /// Set when the type was not recognized and the value was passed through.
    pub note: Option<String>,
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Decodes a `TYPE: RAW` value.
///
/// ```
/// use livesnmp_poller::decode;
///
/// assert_eq!(decode("STRING: \"abc\"").unwrap().value, "abc");
/// assert_eq!(decode("Timeticks: (12345) 1:02:03.45").unwrap().value, "1:02:03.45");
/// assert!(decode("bogus").is_err());
/// ```
pub fn decode(typed: &str) -> Result<DecodedValue, DecodeError> {
    let (datatype, raw) = typed
        .split_once(TYPE_SEPARATOR)
        .ok_or_else(|| DecodeError::MissingSeparator(typed.to_string()))?;

    let mut note = None;
    let value = match datatype {
        "STRING" => unquote(raw).to_string(),
        "Hex-STRING" => decode_hex_string(raw)?,
        "Timeticks" => raw
            .split_once(TIMETICKS_SEPARATOR)
            .map(|(_, readable)| readable.to_string())
            .ok_or_else(|| DecodeError::InvalidTimeticks(raw.to_string()))?,
        t if PASSTHROUGH_TYPES.contains(&t) => raw.to_string(),
        other => {
            tracing::warn!(datatype = %other, "Unexpected data type");
            note = Some(format!("unexpected data type: {}", other));
            raw.to_string()
        }
    };

    Ok(DecodedValue {
        datatype: datatype.to_string(),
        value,
        note,
    })
}

/// Strips exactly one leading and one trailing double quote.
fn unquote(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}

/// Converts `68 65 6C 6C 6F` into `hello`.
fn decode_hex_string(raw: &str) -> Result<String, DecodeError> {
    let digits: Vec<u8> = raw.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(DecodeError::InvalidHex(raw.to_string()));
    }

    let bytes = digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| DecodeError::InvalidHex(raw.to_string()))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
