//! Merchant name heuristic: the first line near the top of the receipt that
//! looks like a business name rather than a money or payment line.

const CURRENCY_MARKERS: &[&str] = &["$", "€", "£", "¥", "USD", "EUR", "GBP"];

/// Lines mentioning these are payment lines, never the merchant.
const SKIP_TOKENS: &[&str] = &["total", "tax", "cash", "card"];

const MERCHANT_KEYWORDS: &[&str] = &["store", "market", "restaurant", "cafe", "shop", "inc", "llc"];

/// Return the title-cased merchant name, or `""` when no line qualifies.
pub fn extract_merchant(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_payment_line(line))
        .filter(|line| qualifies(line))
        .map(clean_line)
        .find(|cleaned| !cleaned.is_empty())
        .unwrap_or_default()
}

fn is_payment_line(line: &str) -> bool {
    if CURRENCY_MARKERS.iter().any(|m| line.contains(m)) {
        return true;
    }
    let lower = line.to_lowercase();
    SKIP_TOKENS.iter().any(|t| lower.contains(t))
}

fn qualifies(line: &str) -> bool {
    let lower = line.to_lowercase();
    MERCHANT_KEYWORDS.iter().any(|k| lower.contains(k)) || line.chars().count() > 3
}

/// Keep alphanumerics and spaces, collapse whitespace, title-case each word.
fn clean_line(line: &str) -> String {
    let stripped: String = line
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    stripped
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
