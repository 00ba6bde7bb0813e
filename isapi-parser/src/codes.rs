//! Vendor event-code normalization
//!
//! ISAPI devices report event types with their own spelling (`VMD`,
//! `fielddetection`, ...). Consumers work with a small canonical taxonomy
//! instead. Codes outside the table pass through unchanged so that new
//! firmware event types still reach the consumer.

/// Vendor code to canonical code, in the order the device documents them.
pub const CODE_TABLE: [(&str, &str); 6] = [
    ("IO", "AlarmLocal"),
    ("VMD", "VideoMotion"),
    ("linedetection", "LineDetection"),
    ("fielddetection", "IntrusionDetection"),
    ("videoloss", "VideoLoss"),
    ("shelteralarm", "VideoBlind"),
];

/// Map a vendor event code to its canonical name.
///
/// Lookup is case-sensitive. Unknown codes are returned as given.
///
/// ```
/// use isapi_parser::normalize;
///
/// assert_eq!(normalize("VMD"), "VideoMotion");
/// assert_eq!(normalize("tamperdetection"), "tamperdetection");
/// ```
pub fn normalize(vendor_code: &str) -> &str {
    match vendor_code {
        "IO" => "AlarmLocal",
        "VMD" => "VideoMotion",
        "linedetection" => "LineDetection",
        "fielddetection" => "IntrusionDetection",
        "videoloss" => "VideoLoss",
        "shelteralarm" => "VideoBlind",
        other => other,
    }
}

/// Whether `code` is one of the canonical names in [`CODE_TABLE`].
pub fn is_canonical(code: &str) -> bool {
    CODE_TABLE.iter().any(|(_, canonical)| *canonical == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("IO", "AlarmLocal")]
    #[case("VMD", "VideoMotion")]
    #[case("linedetection", "LineDetection")]
    #[case("fielddetection", "IntrusionDetection")]
    #[case("videoloss", "VideoLoss")]
    #[case("shelteralarm", "VideoBlind")]
    fn test_known_codes_normalize(#[case] vendor: &str, #[case] canonical: &str) {
        assert_eq!(normalize(vendor), canonical);
        assert!(is_canonical(normalize(vendor)));
    }

    #[rstest]
    #[case("tamperdetection")]
    #[case("vmd")]
    #[case("")]
    #[case("Unknown")]
    fn test_unknown_codes_pass_through(#[case] vendor: &str) {
        assert_eq!(normalize(vendor), vendor);
    }

    #[test]
    fn test_table_agrees_with_normalize() {
        for (vendor, canonical) in CODE_TABLE {
            assert_eq!(normalize(vendor), canonical);
        }
    }

    #[test]
    fn test_vendor_codes_are_not_canonical() {
        assert!(!is_canonical("VMD"));
        assert!(!is_canonical("IO"));
    }
}
