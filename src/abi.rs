//! Decoding of ABI-encoded return values and event payloads.
//!
//! Only the two shapes the indexer consumes are supported: strings (token
//! name and symbol, in both the dynamic and the fixed layout) and unsigned
//! integers of unbounded width (decimals, total supply, transfer amounts).

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// ERC20 method selectors.
pub const SELECTOR_NAME: &str = "0x06fdde03";
pub const SELECTOR_SYMBOL: &str = "0x95d89b41";
pub const SELECTOR_DECIMALS: &str = "0x313ce567";
pub const SELECTOR_TOTAL_SUPPLY: &str = "0x18160ddd";

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_SIGNATURE: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Which ABI string layout a payload decoded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringLayout {
    /// Offset word, length word at the offset, then exactly `length` bytes.
    Dynamic,
    /// Everything after the first 32-byte word, right-padded with zeros.
    Fixed,
}

/// A decoded ABI string together with the layout it parsed under. The
/// dynamic layout is attempted first; a malformed offset or length, or an
/// out-of-range slice, falls back to the fixed layout. This is an ordinary
/// value, not exception-driven control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedString {
    pub value: String,
    pub layout: StringLayout,
}

/// Decode an ABI-encoded string return value.
///
/// Returns `None` when the payload carries nothing usable (empty or all
/// zeros). Invalid UTF-8 in the payload yields an empty string value rather
/// than an error.
pub fn decode_string(raw: &str) -> Option<DecodedString> {
    let body = strip_hex_prefix(raw);
    if body.is_empty() || body.trim_start_matches('0').is_empty() {
        return None;
    }

    if let Some(value) = try_dynamic_layout(body) {
        return Some(DecodedString {
            value,
            layout: StringLayout::Dynamic,
        });
    }

    // Fixed layout: skip the first 32-byte word, take the rest as-is.
    let tail = body.get(64..).unwrap_or("");
    Some(DecodedString {
        value: bytes_to_text(tail),
        layout: StringLayout::Fixed,
    })
}

/// Attempt the dynamic layout: a 32-byte offset word, a 32-byte length word
/// at that offset, then exactly `length` payload bytes.
fn try_dynamic_layout(body: &str) -> Option<String> {
    if body.len() < 128 {
        return None;
    }

    let offset = usize::from_str_radix(body.get(..64)?, 16).ok()?;
    let start = offset.checked_mul(2)?;
    let length_word = body.get(start..start.checked_add(64)?)?;

    let length = usize::from_str_radix(length_word, 16).ok()?;
    let data_start = start + 64;
    let data_end = data_start.checked_add(length.checked_mul(2)?)?;

    Some(bytes_to_text(body.get(data_start..data_end)?))
}

/// Hex-decode, strip trailing zero padding, and interpret as UTF-8 text.
/// Invalid UTF-8 becomes an empty string.
fn bytes_to_text(hex_str: &str) -> String {
    // An odd-length slice cannot be hex-decoded; treat as empty.
    let bytes = match hex::decode(hex_str) {
        Ok(bytes) => bytes,
        Err(_) => return String::new(),
    };

    let trimmed_len = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map(|pos| pos + 1)
        .unwrap_or(0);

    String::from_utf8(bytes[..trimmed_len].to_vec()).unwrap_or_default()
}

/// Decode an unsigned big-endian integer of unbounded width from the full
/// hex payload. An empty payload decodes as zero.
pub fn decode_uint(raw: &str) -> Option<BigUint> {
    let body = strip_hex_prefix(raw);
    if body.is_empty() {
        return Some(BigUint::zero());
    }
    BigUint::parse_bytes(body.as_bytes(), 16)
}

/// Decode an unsigned integer expected to fit a u8 (token decimals).
/// Out-of-range values are rejected rather than truncated.
pub fn decode_uint8(raw: &str) -> Option<u8> {
    decode_uint(raw).and_then(|v| v.to_u8())
}

fn strip_hex_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    // offset 0x20, length 4, payload "Test"
    const DYNAMIC_TEST: &str = "0x0000000000000000000000000000000000000000000000000000000000000020\
                                0000000000000000000000000000000000000000000000000000000000000004\
                                5465737400000000000000000000000000000000000000000000000000000000";

    #[test]
    fn test_dynamic_string_decodes() {
        let raw: String = DYNAMIC_TEST.split_whitespace().collect();
        let decoded = decode_string(&raw).unwrap();
        assert_eq!(decoded.value, "Test");
        assert_eq!(decoded.layout, StringLayout::Dynamic);
    }

    #[test]
    fn test_short_payload_falls_back_to_fixed() {
        // Declares length 0x40 but carries only 4 bytes of data.
        let raw = "0x0000000000000000000000000000000000000000000000000000000000000020\
                   0000000000000000000000000000000000000000000000000000000000000040\
                   5465737400000000000000000000000000000000000000000000000000000000"
            .split_whitespace()
            .collect::<String>();
        let decoded = decode_string(&raw).unwrap();
        assert_eq!(decoded.layout, StringLayout::Fixed);
        // Fixed path takes everything after the first word; the length word
        // survives as a leading \x40 byte once trailing zeros are stripped.
        assert!(decoded.value.ends_with("Test"));
    }

    #[test]
    fn test_empty_and_zero_payloads() {
        assert!(decode_string("0x").is_none());
        assert!(decode_string("").is_none());
        let zeros = format!("0x{}", "0".repeat(128));
        assert!(decode_string(&zeros).is_none());
    }

    #[test]
    fn test_invalid_utf8_yields_empty_value() {
        // 0xff 0xfe is not valid UTF-8.
        let raw = "0x0000000000000000000000000000000000000000000000000000000000000020\
                   0000000000000000000000000000000000000000000000000000000000000002\
                   fffe000000000000000000000000000000000000000000000000000000000000"
            .split_whitespace()
            .collect::<String>();
        let decoded = decode_string(&raw).unwrap();
        assert_eq!(decoded.layout, StringLayout::Dynamic);
        assert_eq!(decoded.value, "");
    }

    #[test]
    fn test_decode_uint_small() {
        let amount = decode_uint(
            "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000",
        )
        .unwrap();
        assert_eq!(amount.to_string(), "1000000000000000000");
    }

    #[test]
    fn test_decode_uint_above_u64() {
        // 2^128, well past any machine word.
        let amount =
            decode_uint("0x0000000000000000000000000000000100000000000000000000000000000000")
                .unwrap();
        assert_eq!(amount.to_string(), "340282366920938463463374607431768211456");
    }

    #[test]
    fn test_decode_uint_empty_is_zero() {
        assert_eq!(decode_uint("0x").unwrap(), BigUint::zero());
    }

    #[test]
    fn test_decode_uint_rejects_garbage() {
        assert!(decode_uint("0xzz").is_none());
    }

    #[test]
    fn test_decode_uint8() {
        let eighteen = "0x0000000000000000000000000000000000000000000000000000000000000012";
        assert_eq!(decode_uint8(eighteen), Some(18));

        // 0x100 does not fit a u8.
        let too_big = "0x0000000000000000000000000000000000000000000000000000000000000100";
        assert_eq!(decode_uint8(too_big), None);
    }
}
