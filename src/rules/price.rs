use regex::Regex;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d.,]*").expect("amount pattern is valid"));

fn is_separator(c: char) -> bool {
    c == '.' || c == ','
}

/// Converts a marketplace's displayed price into the catalog's display currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRule {
    /// ISO code of the currency the marketplace displays.
    pub source_currency: String,
    /// Multiplier into the target currency; 1 when the source already shows it.
    #[serde(default = "unit_rate")]
    pub exchange_rate: Decimal,
    /// Suffix appended after the formatted amount, e.g. `₸`.
    pub target_suffix: String,
    /// Currency symbols and words removed before parsing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strip: Vec<String>,
}

fn unit_rate() -> Decimal {
    Decimal::ONE
}

impl PriceRule {
    pub fn native(currency: &str, suffix: &str, strip: &[&str]) -> Self {
        Self {
            source_currency: currency.to_string(),
            exchange_rate: Decimal::ONE,
            target_suffix: suffix.to_string(),
            strip: strip.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn converted(currency: &str, rate: Decimal, suffix: &str, strip: &[&str]) -> Self {
        Self {
            exchange_rate: rate,
            ..Self::native(currency, suffix, strip)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.exchange_rate <= Decimal::ZERO {
            return Err("price.exchange_rate must be greater than 0".into());
        }
        if self.target_suffix.trim().is_empty() {
            return Err("price.target_suffix must not be empty".into());
        }
        Ok(())
    }

    /// First number in the displayed text, in the source currency.
    ///
    /// Whitespace (including the non-breaking and thin spaces marketplaces use as
    /// thousands separators) is removed. The last `.` or `,` is the decimal point
    /// when it occurs once and is not followed by exactly three digits, so
    /// `2 990,50`, `1,299.99` and `99.5` keep their fractions while `1.299.990`
    /// and `12,990` are grouped integers.
    pub fn parse_amount(&self, raw: &str) -> Option<Decimal> {
        let mut text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        for symbol in self.strip.iter().filter(|s| !s.is_empty()) {
            text = text.replace(symbol.as_str(), "|");
        }
        let number = AMOUNT.find(&text)?.as_str().trim_end_matches(is_separator);

        let digits = match number.rfind(is_separator) {
            Some(pos) if is_decimal_point(number, pos) => {
                let (whole, fraction) = number.split_at(pos);
                format!("{}.{}", ungroup(whole), &fraction[1..])
            }
            _ => ungroup(number),
        };
        Decimal::from_str(&digits).ok()
    }

    /// Converted amount rounded to two decimals. `None` when the conversion overflows.
    pub fn convert(&self, raw: &str) -> Option<Decimal> {
        let amount = self.parse_amount(raw)?.checked_mul(self.exchange_rate)?;
        let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        Some(rounded)
    }

    /// Display string stored on the record, e.g. `12990.00 ₸`.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        self.convert(raw)
            .map(|amount| format!("{} {}", amount, self.target_suffix))
    }
}

fn is_decimal_point(number: &str, pos: usize) -> bool {
    let separator = &number[pos..pos + 1];
    let fraction_len = number.len() - pos - 1;
    fraction_len != 3 && number.matches(separator).count() == 1
}

fn ungroup(number: &str) -> String {
    number.chars().filter(|c| !is_separator(*c)).collect()
}
