// =============================================================================
// SMALL HELPERS
// =============================================================================

use std::path::Path;

use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

/// Most decimal places shown for a price
const MAX_PRICE_DIGITS: u32 = 5;

/// Formats a price with 2 to 5 decimal places, `"-"` for no price.
///
/// `format_price(Some(dec!(0.1)), Some("€"))` gives `"0.10 €"`.
pub fn format_price(price: Option<Decimal>, currency: Option<&str>) -> String {
    let Some(price) = price else {
        return "-".to_string();
    };
    let price = price.round_dp(MAX_PRICE_DIGITS).normalize();
    let number = if price.scale() < 2 {
        format!("{price:.2}")
    } else {
        price.to_string()
    };
    match currency {
        Some(symbol) if !symbol.is_empty() => format!("{number} {symbol}"),
        _ => number,
    }
}

/// Resolves a printed part label to a part id.
///
/// Labels are 7 digits, or 8 digits where the last one is a parity digit.
pub fn parse_barcode(code: &str) -> AppResult<i64> {
    let code = code.trim();
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::invalid(format!("barcode is not numeric: {code:?}")));
    }
    let digits = match code.len() {
        7 => code,
        8 => &code[..7],
        n => {
            return Err(AppError::invalid(format!(
                "barcode must have 7 or 8 digits, got {n}"
            )))
        }
    };
    digits
        .parse()
        .map_err(|_| AppError::invalid(format!("invalid barcode: {code}")))
}

/// Ranks candidate files for a missing attachment file.
///
/// Candidates must contain the missing file's basename (case-insensitive).
/// Order: same basename, then same stem, then the rest; alphabetical inside
/// each group, without duplicates.
pub fn proposed_filenames(missing: &str, available: &[String]) -> Vec<String> {
    let basename = file_name(missing);
    let stem = file_stem(missing);
    let needle = basename.to_lowercase();

    let mut candidates: Vec<&String> = available
        .iter()
        .filter(|f| f.to_lowercase().contains(&needle))
        .collect();
    candidates.sort();
    candidates.dedup();

    let (exact, rest): (Vec<&String>, Vec<&String>) =
        candidates.into_iter().partition(|f| file_name(f) == basename);
    let (same_stem, rest): (Vec<&String>, Vec<&String>) =
        rest.into_iter().partition(|f| file_stem(f) == stem);

    exact
        .into_iter()
        .chain(same_stem)
        .chain(rest)
        .cloned()
        .collect()
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

fn file_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}
