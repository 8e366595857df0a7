use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::DisplayConfig;

/// Renders fiat values for the published snapshot.
///
/// Values are rounded half away from zero to a fixed number of decimals,
/// optionally grouped with thousands separators and prefixed with the
/// currency's symbol (or suffixed with its code when no symbol is known).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiatFormatter {
    currency_code: String,
    decimals: u32,
    grouping: bool,
    symbol_override: Option<String>,
}

impl FiatFormatter {
    pub fn new(currency_code: impl AsRef<str>) -> Self {
        Self {
            currency_code: currency_code.as_ref().trim().to_uppercase(),
            decimals: 2,
            grouping: true,
            symbol_override: None,
        }
    }

    pub fn from_display(currency_code: impl AsRef<str>, display: &DisplayConfig) -> Self {
        Self {
            decimals: display.currency_decimals,
            grouping: display.currency_grouping,
            symbol_override: display.currency_symbol.clone(),
            ..Self::new(currency_code)
        }
    }

    /// Same formatting rules, different currency.
    pub fn for_currency(&self, currency_code: impl AsRef<str>) -> Self {
        Self {
            currency_code: currency_code.as_ref().trim().to_uppercase(),
            ..self.clone()
        }
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    pub fn format(&self, value: Decimal) -> String {
        let rounded =
            value.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();

        let mut digits = pad_fraction(&rounded.abs().to_string(), self.decimals);
        if self.grouping {
            digits = group_thousands(&digits);
        }

        let sign = if negative { "-" } else { "" };
        match self.symbol() {
            Some(symbol) => format!("{sign}{symbol}{digits}"),
            None => format!("{sign}{digits} {}", self.currency_code),
        }
    }

    fn symbol(&self) -> Option<&str> {
        if let Some(symbol) = &self.symbol_override {
            return Some(symbol.as_str());
        }
        currency_symbol(&self.currency_code)
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    let symbol = match code {
        "USD" | "AUD" | "CAD" | "NZD" | "SGD" | "HKD" | "MXN" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        "KRW" => "₩",
        "BRL" => "R$",
        "RUB" => "₽",
        "TRY" => "₺",
        "BTC" => "₿",
        _ => return None,
    };
    Some(symbol)
}

fn pad_fraction(s: &str, dp: u32) -> String {
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if dp == 0 {
        return int_part.to_string();
    }
    let mut frac: String = frac_part.chars().take(dp as usize).collect();
    while frac.len() < dp as usize {
        frac.push('0');
    }
    format!("{int_part}.{frac}")
}

fn group_thousands(s: &str) -> String {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    let len = int_part.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in int_part.chars().enumerate() {
        grouped.push(ch);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            grouped.push(',');
        }
    }

    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}
