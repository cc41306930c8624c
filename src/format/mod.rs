// Display formatters
//
// Total functions turning loosely-typed numbers into presentation strings.
// None of them panic: null, NaN, infinities and non-numeric strings all
// produce the configured fallback.

mod value;

pub use value::{parse_numeric_str, AsNumber};

/// Shown when a value cannot be formatted
pub const FALLBACK: &str = "--";

/// Upper bound on fractional digits; larger requests are clamped
pub const MAX_DECIMALS: usize = 100;

/// Fixed-point formatting options
#[derive(Debug, Clone, PartialEq)]
pub struct FixedOptions {
    pub decimals: usize,
    pub trim_trailing_zeros: bool,
    pub fallback: String,
}

impl Default for FixedOptions {
    fn default() -> Self {
        Self {
            decimals: 2,
            trim_trailing_zeros: false,
            fallback: FALLBACK.to_string(),
        }
    }
}

/// `value` with `decimals` fixed digits, or "--"
pub fn to_fixed_safe(value: impl AsNumber, decimals: usize) -> String {
    to_fixed_with(
        value,
        &FixedOptions {
            decimals,
            ..FixedOptions::default()
        },
    )
}

pub fn to_fixed_with(value: impl AsNumber, options: &FixedOptions) -> String {
    match value.as_number() {
        Some(v) => {
            let fixed = fixed(v, options.decimals);
            if options.trim_trailing_zeros {
                trim_zeros(&fixed, 0)
            } else {
                fixed
            }
        }
        None => options.fallback.clone(),
    }
}

/// Currency formatting options
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyOptions {
    /// BCP 47 tag, e.g. "en-US" or "de-DE"
    pub locale: String,
    /// ISO 4217 code, e.g. "USD"
    pub currency_code: String,
    pub min_digits: usize,
    pub max_digits: usize,
    pub fallback: String,
}

impl Default for CurrencyOptions {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            currency_code: "USD".to_string(),
            min_digits: 2,
            max_digits: 4,
            fallback: FALLBACK.to_string(),
        }
    }
}

struct LocaleRules {
    group: &'static str,
    decimal: char,
    symbol_after: bool,
}

fn locale_rules(locale: &str) -> Option<LocaleRules> {
    let lang = locale.split(['-', '_']).next().unwrap_or_default().to_lowercase();
    match lang.as_str() {
        "en" | "ja" | "zh" | "ko" => Some(LocaleRules {
            group: ",",
            decimal: '.',
            symbol_after: false,
        }),
        "de" | "es" | "it" | "nl" | "pt" => Some(LocaleRules {
            group: ".",
            decimal: ',',
            symbol_after: true,
        }),
        "fr" => Some(LocaleRules {
            group: "\u{202f}",
            decimal: ',',
            symbol_after: true,
        }),
        _ => None,
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

/// Locale-aware currency string, e.g. "$1,234.50" or "1.234,50 €"
///
/// Unknown locales or currency codes fall back to a plain "$"-prefixed
/// fixed-point string.
pub fn currency(value: impl AsNumber, options: &CurrencyOptions) -> String {
    let Some(v) = value.as_number() else {
        return options.fallback.clone();
    };
    let max_digits = options.max_digits.max(options.min_digits);

    let (rules, symbol) = match (
        locale_rules(&options.locale),
        currency_symbol(&options.currency_code),
    ) {
        (Some(rules), Some(symbol)) => (rules, symbol),
        _ => {
            let body = trim_zeros(&fixed(v.abs(), max_digits), options.min_digits);
            let sign = if is_negative(v, max_digits) { "-" } else { "" };
            return format!("{}${}", sign, body);
        }
    };

    let body = trim_zeros(&fixed(v.abs(), max_digits), options.min_digits);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body.as_str(), None),
    };
    let mut number = group_digits(int_part, rules.group);
    if let Some(frac) = frac_part {
        number.push(rules.decimal);
        number.push_str(frac);
    }

    let sign = if is_negative(v, max_digits) { "-" } else { "" };
    if rules.symbol_after {
        format!("{}{}\u{a0}{}", sign, number, symbol)
    } else {
        format!("{}{}{}", sign, symbol, number)
    }
}

/// Percentage formatting options
#[derive(Debug, Clone, PartialEq)]
pub struct PercentOptions {
    pub digits: usize,
    /// Input is a fraction in [0, 1] rather than already in [0, 100]
    pub expects_fraction: bool,
    pub fallback: String,
}

impl Default for PercentOptions {
    fn default() -> Self {
        Self {
            digits: 1,
            expects_fraction: true,
            fallback: FALLBACK.to_string(),
        }
    }
}

/// "92.3%" from 0.923 (or from 92.3 when `expects_fraction` is false)
pub fn percentage(value: impl AsNumber, options: &PercentOptions) -> String {
    match value.as_number() {
        Some(v) => {
            let scaled = if options.expects_fraction { v * 100.0 } else { v };
            if !scaled.is_finite() {
                return options.fallback.clone();
            }
            format!("{}%", fixed(scaled, options.digits))
        }
        None => options.fallback.clone(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DurationUnit {
    /// Pick ms, s, m or h by magnitude
    #[default]
    Auto,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationOptions {
    pub unit: DurationUnit,
    pub digits: usize,
    pub fallback: String,
}

impl Default for DurationOptions {
    fn default() -> Self {
        Self {
            unit: DurationUnit::Auto,
            digits: 1,
            fallback: FALLBACK.to_string(),
        }
    }
}

/// Human duration from milliseconds: "850ms", "1.5s", "2.0m", "1.2h"
pub fn duration(value_ms: impl AsNumber, options: &DurationOptions) -> String {
    let Some(ms) = value_ms.as_number().filter(|v| *v >= 0.0) else {
        return options.fallback.clone();
    };

    let unit = match options.unit {
        DurationUnit::Auto if ms < 1_000.0 => DurationUnit::Milliseconds,
        DurationUnit::Auto if ms < 60_000.0 => DurationUnit::Seconds,
        DurationUnit::Auto if ms < 3_600_000.0 => DurationUnit::Minutes,
        DurationUnit::Auto => DurationUnit::Hours,
        explicit => explicit,
    };

    match unit {
        DurationUnit::Milliseconds => format!("{}ms", fixed(ms, 0)),
        DurationUnit::Seconds => format!("{}s", fixed(ms / 1_000.0, options.digits)),
        DurationUnit::Minutes => format!("{}m", fixed(ms / 60_000.0, options.digits)),
        DurationUnit::Hours | DurationUnit::Auto => {
            format!("{}h", fixed(ms / 3_600_000.0, options.digits))
        }
    }
}

/// Fixed-point with no negative zero ("-0.00" becomes "0.00")
fn fixed(v: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals.min(MAX_DECIMALS), v);
    match s.strip_prefix('-') {
        Some(rest) if rest.chars().all(|c| c == '0' || c == '.') => rest.to_string(),
        _ => s,
    }
}

fn is_negative(v: f64, decimals: usize) -> bool {
    fixed(v, decimals).starts_with('-')
}

/// Drop trailing fractional zeros, keeping at least `min_digits` decimals
fn trim_zeros(s: &str, min_digits: usize) -> String {
    let Some((int_part, frac)) = s.split_once('.') else {
        return s.to_string();
    };
    let mut frac = frac.trim_end_matches('0').to_string();
    while frac.len() < min_digits.min(MAX_DECIMALS) {
        frac.push('0');
    }
    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac)
    }
}

fn group_digits(int_part: &str, sep: &str) -> String {
    let digits: Vec<char> = int_part.chars().collect();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * sep.len());
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(sep);
        }
        out.push(*c);
    }
    out
}
