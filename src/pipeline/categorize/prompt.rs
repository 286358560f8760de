use crate::models::Category;

/// Receipt text beyond this many characters is dropped from the prompt.
pub const MAX_SUBJECT_TEXT_CHARS: usize = 2000;

/// System instructions listing the closed category set.
pub fn build_instructions() -> String {
    let names: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
    format!(
        "You categorize expenses from receipts. \
         Answer with exactly one of the following categories and nothing else: {}. \
         If none fits, answer {}.",
        names.join(", "),
        Category::Other.as_str(),
    )
}

/// User prompt carrying the merchant and (capped) receipt text.
pub fn build_subject(merchant: &str, receipt_text: &str) -> String {
    let text = truncate_chars(receipt_text.trim(), MAX_SUBJECT_TEXT_CHARS);
    format!("Merchant: {}\n\nReceipt text:\n{}", merchant.trim(), text)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instructions_list_every_category() {
        let instructions = build_instructions();
        for category in Category::ALL {
            assert!(instructions.contains(category.as_str()));
        }
    }

    #[test]
    fn subject_contains_merchant_and_text() {
        let subject = build_subject("Uber", "TRIP 14.20");
        assert!(subject.contains("Merchant: Uber"));
        assert!(subject.contains("TRIP 14.20"));
    }

    #[test]
    fn long_text_capped_on_char_boundary() {
        let text = "é".repeat(MAX_SUBJECT_TEXT_CHARS + 50);
        let subject = build_subject("Cafe", &text);
        assert_eq!(subject.matches('é').count(), MAX_SUBJECT_TEXT_CHARS);
    }

    #[test]
    fn short_text_untouched() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 2), "ab");
    }
}
