//! GSM 03.38 text segmentation for concatenated SMS.

/// Length above which a text is sent as a multipart message.
pub const SINGLE_MESSAGE_CHARS: usize = 160;

const GSM_SINGLE_SEPTETS: usize = 160;
const GSM_PART_SEPTETS: usize = 153;
const UCS2_SINGLE_UNITS: usize = 70;
const UCS2_PART_UNITS: usize = 67;

const GSM_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";
const GSM_EXTENSION: &str = "\u{0C}^{}\\[~]|€";

fn gsm_septets(c: char) -> Option<usize> {
    if GSM_BASIC.contains(c) {
        Some(1)
    } else if GSM_EXTENSION.contains(c) {
        Some(2)
    } else {
        None
    }
}

fn is_gsm(text: &str) -> bool {
    text.chars().all(|c| gsm_septets(c).is_some())
}

/// Length is measured in UTF-16 code units, so each astral-plane character
/// counts twice.
pub fn needs_multipart(text: &str) -> bool {
    text.encode_utf16().count() > SINGLE_MESSAGE_CHARS
}

/// Splits `text` into the parts a carrier would transmit. Texts that fit a
/// single message come back as one part.
pub fn divide_message(text: &str) -> Vec<String> {
    if is_gsm(text) {
        split_by_cost(text, GSM_SINGLE_SEPTETS, GSM_PART_SEPTETS, |c| {
            gsm_septets(c).unwrap_or(1)
        })
    } else {
        split_by_cost(text, UCS2_SINGLE_UNITS, UCS2_PART_UNITS, char::len_utf16)
    }
}

fn split_by_cost(text: &str, single: usize, part: usize, cost: impl Fn(char) -> usize) -> Vec<String> {
    let total: usize = text.chars().map(&cost).sum();
    if total <= single {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for c in text.chars() {
        let c_cost = cost(c);
        if used + c_cost > part {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += c_cost;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_part() {
        assert_eq!(divide_message("hello"), vec!["hello".to_string()]);
        let exact = "a".repeat(160);
        assert_eq!(divide_message(&exact), vec![exact.clone()]);
        assert!(!needs_multipart(&exact));
    }

    #[test]
    fn test_gsm_text_splits_at_153() {
        let text = "a".repeat(200);
        assert!(needs_multipart(&text));
        let parts = divide_message(&text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 153);
        assert_eq!(parts[1].len(), 47);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_extension_chars_count_double() {
        // 80 braces cost 160 septets: still one message.
        let braces = "{".repeat(80);
        assert_eq!(divide_message(&braces).len(), 1);

        let more = "{".repeat(81);
        let parts = divide_message(&more);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].chars().count(), 76);
    }

    #[test]
    fn test_unicode_text_uses_ucs2_parts() {
        let text = "ж".repeat(200);
        let parts = divide_message(&text);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].chars().count(), 67);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn test_astral_chars_count_as_two_units() {
        assert!(!needs_multipart(&"😀".repeat(80)));
        assert!(needs_multipart(&"😀".repeat(81)));
        assert!(needs_multipart(&"😀".repeat(100)));
    }

    #[test]
    fn test_surrogate_pairs_are_not_split() {
        let text = "😀".repeat(40);
        let parts = divide_message(&text);
        assert!(parts.iter().all(|p| p.encode_utf16().count() <= 67));
        assert_eq!(parts.concat(), text);
    }
}
