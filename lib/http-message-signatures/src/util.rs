use http::{header::ToStrError, HeaderMap, HeaderName, HeaderValue};
use std::time::SystemTime;

pub trait UnixTimestampExt {
    fn to_unix_timestamp(&self) -> Option<i64>;
}

impl UnixTimestampExt for SystemTime {
    fn to_unix_timestamp(&self) -> Option<i64> {
        let duration = self.duration_since(SystemTime::UNIX_EPOCH).ok()?;
        i64::try_from(duration.as_secs()).ok()
    }
}

/// Printable ASCII, excluding control characters
pub fn is_printable_ascii(value: &str) -> bool {
    value.bytes().all(|byte| (0x20..=0x7e).contains(&byte))
}

/// Values of a possibly repeated field, combined as if they were sent on a single line
pub fn combined_field_value(
    headers: &HeaderMap,
    name: &HeaderName,
) -> Result<Option<String>, ToStrError> {
    let mut values = headers.get_all(name).iter().peekable();
    if values.peek().is_none() {
        return Ok(None);
    }

    let values = values
        .map(HeaderValue::to_str)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(values.join(", ")))
}
