/// Shown in place of a value that is missing or not a finite number.
pub const PLACEHOLDER: &str = "n/a";

/// How a series value is turned into display text.
///
/// Every series names its own format. Guessing from magnitude (`>= 100` as
/// dollars, smaller as a percentage) would misread loan balances under $100
/// and repayment rates of 100% or more, so no such fallback exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Currency,
    Percent,
}

impl ValueFormat {
    pub fn apply(self, value: f64) -> String {
        match self {
            ValueFormat::Currency => format_currency(value),
            ValueFormat::Percent => format_percent(value),
        }
    }

    pub fn apply_opt(self, value: Option<f64>) -> String {
        value.map(|v| self.apply(v)).unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

/// Whole US dollars with thousands separators, e.g. `1234.5` -> `$1,235`.
///
/// Halves round away from zero.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }

    let rounded = value.round();
    let grouped = group_thousands(&format!("{:.0}", rounded.abs()));
    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// One decimal digit followed by `%`, e.g. `12.34` -> `12.3%`.
pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{:.1}%", value)
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
