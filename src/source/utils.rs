use super::SourceError;

/// Parses a JSON-RPC hex quantity (e.g. `0x1b4`)
pub(super) fn parse_quantity(value: &str) -> Result<u64, SourceError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| SourceError::Decode(format!("quantity without 0x prefix: {value}")))?;

    u64::from_str_radix(digits, 16)
        .map_err(|e| SourceError::Decode(format!("invalid quantity {value}: {e}")))
}

pub(super) fn to_quantity(value: u64) -> String {
    format!("0x{value:x}")
}
