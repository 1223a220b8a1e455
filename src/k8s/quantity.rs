//! Resource quantity parsing and formatting for Kubernetes CPU and Memory
//!
//! Quantities are parsed into integers in a fixed base unit: millicores for
//! CPU and bytes for memory. The arithmetic is exact; anything finer than the
//! base unit is truncated toward zero.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::warn;

/// Power of ten that converts cores into millicores
const MILLI_SCALE: i32 = 3;

/// Parse CPU resource string to millicores
///
/// Examples:
/// - `"100m"` -> `100`
/// - `"1"` -> `1000`
/// - `"0.5"` -> `500`
/// - `"250000n"` -> `0` (a quarter millicore truncates)
///
/// Returns `None` when the string is not a valid non-negative quantity.
#[must_use]
pub fn parse_cpu(cpu_str: &str) -> Option<u64> {
    parse_scaled(cpu_str, MILLI_SCALE)
}

/// Parse memory resource string to bytes
///
/// Examples:
/// - `"128Mi"` -> `134217728`
/// - `"1Gi"` -> `1073741824`
/// - `"500M"` -> `500000000`
/// - `"1e3"` -> `1000`
#[must_use]
pub fn parse_memory(mem_str: &str) -> Option<u64> {
    parse_scaled(mem_str, 0)
}

/// Millicores requested by `quantity`, or zero when it is absent or unparseable
#[must_use]
pub fn cpu_or_zero(quantity: Option<&Quantity>) -> u64 {
    quantity.map_or(0, |q| {
        parse_cpu(&q.0).unwrap_or_else(|| {
            warn!("Unparseable CPU quantity {:?}, counting it as 0", q.0);
            0
        })
    })
}

/// Bytes requested by `quantity`, or zero when it is absent or unparseable
#[must_use]
pub fn memory_or_zero(quantity: Option<&Quantity>) -> u64 {
    quantity.map_or(0, |q| {
        parse_memory(&q.0).unwrap_or_else(|| {
            warn!("Unparseable memory quantity {:?}, counting it as 0", q.0);
            0
        })
    })
}

/// Parse `raw` and return its value multiplied by `10^scale`, truncated
fn parse_scaled(raw: &str, scale: i32) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (negative, unsigned) = match raw.as_bytes()[0] {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };

    let number_len = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(number_len);

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return None;
    }

    let mut mantissa: u128 = 0;
    for digit in whole.bytes().chain(fraction.bytes()) {
        mantissa = mantissa
            .checked_mul(10)?
            .checked_add(u128::from(digit - b'0'))?;
    }

    let (binary_factor, decimal_exponent) = suffix_factor(suffix)?;
    let fraction_len = i32::try_from(fraction.len()).ok()?;
    let exponent = decimal_exponent
        .checked_add(scale)?
        .checked_sub(fraction_len)?;

    let value = mantissa.checked_mul(binary_factor)?;
    let value = if exponent >= 0 {
        value.checked_mul(10_u128.checked_pow(exponent.unsigned_abs())?)?
    } else {
        // 10^39 already exceeds u128, so anything smaller truncates to zero
        10_u128
            .checked_pow(exponent.unsigned_abs())
            .map_or(0, |divisor| value / divisor)
    };

    if negative && value > 0 {
        return None;
    }

    u64::try_from(value).ok()
}

/// Binary multiplier and decimal exponent denoted by a quantity suffix
fn suffix_factor(suffix: &str) -> Option<(u128, i32)> {
    let factor = match suffix {
        "" => (1, 0),
        "n" => (1, -9),
        "u" => (1, -6),
        "m" => (1, -3),
        "k" => (1, 3),
        "M" => (1, 6),
        "G" => (1, 9),
        "T" => (1, 12),
        "P" => (1, 15),
        "E" => (1, 18),
        "Ki" => (1 << 10, 0),
        "Mi" => (1 << 20, 0),
        "Gi" => (1 << 30, 0),
        "Ti" => (1 << 40, 0),
        "Pi" => (1 << 50, 0),
        "Ei" => (1 << 60, 0),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            (1, exponent.parse::<i32>().ok()?)
        }
    };
    Some(factor)
}

/// Format CPU millicores to human-readable string
///
/// Examples:
/// - `100` -> `"100m"`
/// - `1000` -> `"1"`
/// - `1500` -> `"1.5"`
#[must_use]
pub fn format_cpu(millicores: u64) -> String {
    let cores = millicores / 1000;
    let millis = millicores % 1000;
    if millis == 0 {
        format!("{cores}")
    } else if cores == 0 {
        format!("{millis}m")
    } else {
        let fraction = format!("{millis:03}");
        format!("{cores}.{}", fraction.trim_end_matches('0'))
    }
}

/// Format memory bytes to human-readable string
///
/// Examples:
/// - `134217728` -> `"128Mi"`
/// - `1073741824` -> `"1Gi"`
/// - `500000000` -> `"476.8Mi"`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_memory(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("Ti", 1 << 40),
        ("Gi", 1 << 30),
        ("Mi", 1 << 20),
        ("Ki", 1 << 10),
    ];

    for (suffix, size) in UNITS {
        if bytes >= size {
            return if bytes % size == 0 {
                format!("{}{suffix}", bytes / size)
            } else {
                format!("{:.1}{suffix}", bytes as f64 / size as f64)
            };
        }
    }

    format!("{bytes}")
}
