//! Localised number parsing for display strings in detail tables.
//!
//! Detail sections render amounts for humans: `€ 1.234,56`, `1,5`,
//! `-12.00 €`, `1,234.56 USD`. The separator convention follows the
//! request locale, but a string carrying both separators is unambiguous:
//! the last one is the decimal separator.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Decimal separator convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// `1.234,56`
    #[default]
    Continental,
    /// `1,234.56`
    English,
}

impl NumberFormat {
    pub fn for_locale(locale: &str) -> Self {
        if locale.to_ascii_lowercase().starts_with("en") {
            NumberFormat::English
        } else {
            NumberFormat::Continental
        }
    }

    fn decimal_separator(self) -> char {
        match self {
            NumberFormat::Continental => ',',
            NumberFormat::English => '.',
        }
    }
}

/// Parse a human-formatted number, ignoring currency symbols and spacing.
pub fn parse_localized_decimal(text: &str, format: NumberFormat) -> Result<Decimal, String> {
    let mut negative = false;
    let mut body = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '0'..='9' | '.' | ',' => body.push(c),
            '-' | '−' if body.is_empty() => negative = true,
            _ => {}
        }
    }

    if !body.chars().any(|c| c.is_ascii_digit()) {
        return Err(format!("no digits in `{}`", text));
    }

    let last_dot = body.rfind('.');
    let last_comma = body.rfind(',');
    let decimal_sep = match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(_), None) => single_separator(&body, '.', format),
        (None, Some(_)) => single_separator(&body, ',', format),
        (None, None) => None,
    };

    let mut normalized = String::with_capacity(body.len() + 1);
    if negative {
        normalized.push('-');
    }
    for c in body.chars() {
        match c {
            '0'..='9' => normalized.push(c),
            sep if Some(sep) == decimal_sep => normalized.push('.'),
            _ => {} // grouping
        }
    }

    Decimal::from_str(&normalized).map_err(|e| format!("`{}`: {}", text, e))
}

/// With only one kind of separator present: repeated means grouping,
/// otherwise the locale decides.
fn single_separator(body: &str, sep: char, format: NumberFormat) -> Option<char> {
    if body.matches(sep).count() > 1 {
        None
    } else if sep == format.decimal_separator() {
        Some(sep)
    } else {
        None
    }
}
