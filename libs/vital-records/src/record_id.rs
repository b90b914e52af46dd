//! Record identifier composer
//!
//! `YYYY` + `JJ` + `NNNNNN`: event year, two-letter jurisdiction, certificate number.
//! Missing parts become placeholders, so composing never fails.

use std::fmt;
use vitalis_models::Address;

pub const JURISDICTION_PLACEHOLDER: &str = "XX";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIdentifier {
    pub year: u16,
    pub jurisdiction: String,
    pub certificate_number: u32,
}

impl Default for RecordIdentifier {
    fn default() -> Self {
        Self {
            year: 0,
            jurisdiction: JURISDICTION_PLACEHOLDER.to_string(),
            certificate_number: 0,
        }
    }
}

impl RecordIdentifier {
    pub fn new(year: Option<i32>, jurisdiction: Option<&str>, certificate_number: Option<&str>) -> Self {
        Self {
            year: year
                .filter(|y| (0..=9999).contains(y))
                .and_then(|y| u16::try_from(y).ok())
                .unwrap_or(0),
            jurisdiction: normalize_jurisdiction(jurisdiction),
            certificate_number: certificate_number
                .and_then(|n| n.trim().parse::<u64>().ok())
                .map(|n| (n % 1_000_000) as u32)
                .unwrap_or(0),
        }
    }

    /// Parse a 12-character identifier back into its parts.
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != 12 || !value.is_ascii() {
            return None;
        }
        Some(Self {
            year: value[..4].parse().ok()?,
            jurisdiction: value[4..6].to_string(),
            certificate_number: value[6..].parse().ok()?,
        })
    }
}

impl fmt::Display for RecordIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{}{:06}",
            self.year, self.jurisdiction, self.certificate_number
        )
    }
}

pub fn compose(year: Option<i32>, jurisdiction: Option<&str>, certificate_number: Option<&str>) -> String {
    RecordIdentifier::new(year, jurisdiction, certificate_number).to_string()
}

/// First two characters, upper-cased. Anything but two ASCII alphanumerics gets
/// the placeholder, so the identifier stays 12 ASCII characters.
fn normalize_jurisdiction(code: Option<&str>) -> String {
    let code = code.map(str::trim).unwrap_or_default();
    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(a), Some(b)) if a.is_ascii_alphanumeric() && b.is_ascii_alphanumeric() => {
            [a, b].iter().map(char::to_ascii_uppercase).collect()
        }
        _ => JURISDICTION_PLACEHOLDER.to_string(),
    }
}

/// Jurisdiction of a place-of-event address. The jurisdiction extension wins over
/// `state` (New York City reports as `YC`, not `NY`).
pub fn jurisdiction_from_address(address: &Address, jurisdiction_url: &str) -> Option<String> {
    let explicit = address.extension(jurisdiction_url).and_then(|ext| {
        ext.value_str("valueString").map(str::to_string).or_else(|| {
            ext.value
                .get("valueCoding")
                .and_then(|c| c.get("code"))
                .and_then(|c| c.as_str())
                .map(str::to_string)
        })
    });
    explicit
        .or_else(|| address.state.clone())
        .filter(|j| !j.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vitalis_models::Extension;

    const URL: &str = "http://example.org/jurisdiction";

    #[test]
    fn placeholders_for_missing_parts() {
        assert_eq!(compose(None, None, None), "0000XX000000");
    }

    #[test]
    fn parts_are_padded_and_upper_cased() {
        assert_eq!(compose(Some(2022), Some("ma"), Some("100")), "2022MA000100");
        assert_eq!(compose(Some(7), Some(" nyc "), Some(" 42 ")), "0007NY000042");
    }

    #[test]
    fn bad_inputs_fall_back() {
        assert_eq!(compose(Some(-1), Some("M"), Some("abc")), "0000XX000000");
        assert_eq!(compose(Some(12345), Some(""), Some("-5")), "0000XX000000");
    }

    #[test]
    fn non_ascii_jurisdictions_use_placeholder() {
        for code in ["ßa", "ŉa", "ﬀ", "é1", "N-"] {
            let id = compose(Some(2022), Some(code), Some("1"));
            assert_eq!(id, "2022XX000001", "{code}");
            assert!(RecordIdentifier::parse(&id).is_some());
        }
    }

    #[test]
    fn long_certificate_numbers_keep_width() {
        let id = compose(Some(2023), Some("MA"), Some("1234567"));
        assert_eq!(id, "2023MA234567");
        assert_eq!(id.len(), 12);
    }

    #[test]
    fn parse_inverts_display() {
        let id = RecordIdentifier::new(Some(2022), Some("YC"), Some("981"));
        assert_eq!(RecordIdentifier::parse(&id.to_string()), Some(id));
        assert_eq!(RecordIdentifier::parse("2022YC"), None);
    }

    #[test]
    fn jurisdiction_extension_wins_over_state() {
        let mut address = Address {
            state: Some("NY".to_string()),
            ..Default::default()
        };
        assert_eq!(jurisdiction_from_address(&address, URL).as_deref(), Some("NY"));

        address
            .extension
            .push(Extension::with_value(URL, "valueString", json!("YC")));
        assert_eq!(jurisdiction_from_address(&address, URL).as_deref(), Some("YC"));
    }

    #[test]
    fn jurisdiction_from_coding_extension() {
        let address = Address {
            extension: vec![Extension::with_value(URL, "valueCoding", json!({ "code": "PR" }))],
            ..Default::default()
        };
        assert_eq!(jurisdiction_from_address(&address, URL).as_deref(), Some("PR"));
        assert_eq!(jurisdiction_from_address(&Address::default(), URL), None);
    }
}
