//! Amount heuristic: an ordered list of named rules, first success wins.
//!
//! 1. `same-line-total`: a total/balance/amount/sum keyword and a value on
//!    the same line.
//! 2. `after-last-keyword`: largest value on or after the last line carrying
//!    a total/balance/amount-due keyword.
//! 3. `global-maximum`: largest value anywhere.
//!
//! Nothing matched yields `0.0`.

use std::sync::LazyLock;

use regex::Regex;

static SAME_LINE_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:total|balance|amount|sum)\b\s*(?:due\b)?\s*:?\s*\$?\s*(\d+\.\d{2})\b")
        .unwrap()
});

static TOTAL_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:total|balance|amount\s+due)\b").unwrap());

static MONETARY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?\s*(\d+\.\d{2})\b").unwrap());

/// A named amount heuristic over the receipt's lines.
pub struct AmountRule {
    pub name: &'static str,
    pub apply: fn(&[&str]) -> Option<f64>,
}

/// Rules in evaluation order.
pub static AMOUNT_RULES: &[AmountRule] = &[
    AmountRule {
        name: "same-line-total",
        apply: same_line_total,
    },
    AmountRule {
        name: "after-last-keyword",
        apply: after_last_keyword,
    },
    AmountRule {
        name: "global-maximum",
        apply: global_maximum,
    },
];

pub fn extract_amount(text: &str) -> f64 {
    let lines: Vec<&str> = text.lines().collect();
    for rule in AMOUNT_RULES {
        if let Some(amount) = (rule.apply)(&lines) {
            tracing::trace!(rule = rule.name, amount, "Amount rule matched");
            return amount;
        }
    }
    0.0
}

fn same_line_total(lines: &[&str]) -> Option<f64> {
    lines.iter().find_map(|line| {
        SAME_LINE_TOTAL
            .captures(line)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

fn after_last_keyword(lines: &[&str]) -> Option<f64> {
    let last_keyword = lines.iter().rposition(|line| TOTAL_KEYWORD.is_match(line))?;
    candidates(lines)
        .filter(|(index, _)| *index >= last_keyword)
        .map(|(_, value)| value)
        .reduce(f64::max)
}

fn global_maximum(lines: &[&str]) -> Option<f64> {
    candidates(lines).map(|(_, value)| value).reduce(f64::max)
}

/// Every monetary value with the index of the line it was found on.
fn candidates<'a>(lines: &'a [&'a str]) -> impl Iterator<Item = (usize, f64)> + 'a {
    lines.iter().enumerate().flat_map(|(index, line)| {
        MONETARY_VALUE
            .captures_iter(*line)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
            .map(move |value| (index, value))
    })
}
