// 🔤 Text & Code Normalization
// Names arrive with control characters and ragged spacing, codes arrive
// with punctuation or without leading zeros. Everything is normalized on load.

/// Width of an entity registration code
pub const CODE_WIDTH: usize = 8;

/// True when `identifier` is exactly eight ASCII digits
pub fn is_entity_code(identifier: &str) -> bool {
    identifier.len() == CODE_WIDTH && identifier.bytes().all(|b| b.is_ascii_digit())
}

/// Standardize a raw code to eight digits.
///
/// Non-digits are stripped, short codes are left-padded with zeros and
/// long codes truncated. Returns `None` when no digit remains.
///
/// Example: "1.234-5" → "00012345"
pub fn standardize_code(raw: &str) -> Option<String> {
    let digits: String = raw.trim().chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let padded = format!("{:0>width$}", digits, width = CODE_WIDTH);
    Some(padded[..CODE_WIDTH].to_string())
}

/// Remove ASCII control characters and collapse runs of whitespace
pub fn clean_text(raw: &str) -> String {
    let without_controls: String = raw
        .chars()
        .filter(|c| !(c.is_ascii_control() && !c.is_ascii_whitespace()))
        .collect();

    without_controls.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key used by the name index: trimmed and upper-cased
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Empty or whitespace-only cells are absent values
pub fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_entity_code() {
        assert!(is_entity_code("00000208"));
        assert!(!is_entity_code("0000208"));
        assert!(!is_entity_code("0000020A"));
        assert!(!is_entity_code(" 00000208"));
        assert!(!is_entity_code("000002080"));
    }

    #[test]
    fn test_standardize_code() {
        assert_eq!(standardize_code("1.234-5"), Some("00012345".to_string()));
        assert_eq!(standardize_code("208"), Some("00000208".to_string()));
        assert_eq!(standardize_code("60.746.948/0001-12"), Some("60746948".to_string()));
        assert_eq!(standardize_code("  "), None);
        assert_eq!(standardize_code("N/A"), None);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  BANCO\u{0007}  DO\tBRASIL \n"), "BANCO DO BRASIL");
        assert_eq!(clean_text("\u{007F}"), "");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Bank x "), "BANK X");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(" C001 "), Some("C001".to_string()));
        assert_eq!(non_empty("   "), None);
    }
}
