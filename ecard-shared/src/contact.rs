/// Phone and WhatsApp number normalization
///
/// Three form flows (registration, personal card, business card) share the
/// same pair of sub-algorithms:
///
/// - **parse**: split a stored canonical value back into the
///   (country-code, local-number) fields the forms render, preferring the
///   longest matching country code and falling back to the default code for
///   malformed legacy data;
/// - **serialize**: turn submitted country/local fields back into the single
///   canonical stored form (bare digits for phone, a `https://wa.me/` link
///   for WhatsApp), preserving the previous value on an empty submission.
///
/// The country-code table is injected explicitly (no ambient module state)
/// and pre-sorted by code length descending at construction so a 3-digit
/// code is always tried before a 1-digit prefix of it.

use serde::Serialize;
use thiserror::Error;

/// Default country code applied when no table entry matches.
pub const DEFAULT_COUNTRY_CODE: &str = "880";

const WA_ME_PREFIXES: [&str; 2] = ["https://wa.me/", "http://wa.me/"];

/// Which contact field is being normalized.
///
/// Only affects the URL wrapping and the wording of validation errors; the
/// algorithms are otherwise identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Phone,
    WhatsApp,
}

impl ContactKind {
    /// Field name used when surfacing validation errors.
    pub fn field_name(&self) -> &'static str {
        match self {
            ContactKind::Phone => "phone",
            ContactKind::WhatsApp => "whatsapp",
        }
    }
}

/// Validation failures surfaced field-by-field to the forms layer.
///
/// The message literals are part of the external contract; the web layer
/// renders them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("Enter digits only for the phone number.")]
    PhoneDigitsOnly,

    #[error("Select a country code for the phone number.")]
    PhoneCountryMissing,

    #[error("Enter digits only for the WhatsApp number.")]
    WhatsAppDigitsOnly,

    #[error("Select a country code.")]
    WhatsAppCountryMissing,

    #[error("This phone number is already registered with another account.")]
    PhoneAlreadyRegistered,

    #[error("A phone number is required.")]
    PhoneRequired,
}

impl ContactError {
    /// Field the error should be attached to in a form response.
    pub fn field(&self) -> &'static str {
        match self {
            ContactError::PhoneDigitsOnly
            | ContactError::PhoneCountryMissing
            | ContactError::PhoneAlreadyRegistered
            | ContactError::PhoneRequired => "phone",
            ContactError::WhatsAppDigitsOnly | ContactError::WhatsAppCountryMissing => "whatsapp",
        }
    }
}

/// A stored value split back into form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedNumber {
    /// Numeric country code, e.g. "880".
    pub country_code: String,

    /// Local digits with the country code stripped.
    pub local_number: String,

    /// Best-guess canonical digit string. Differs from the stored input only
    /// for legacy values that lacked a recognizable country code.
    pub canonical: String,
}

/// Ordered (numeric code, display label) table for country-code matching.
///
/// Construction sorts by code length descending so longest-prefix matching is
/// a linear scan.
#[derive(Debug, Clone)]
pub struct CountryCodes {
    entries: Vec<(String, String)>,
    default_code: String,
}

impl CountryCodes {
    /// Builds a table from (code, label) pairs.
    pub fn new<I, S>(entries: I, default_code: &str) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(code, label)| (code.into(), label.into()))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            entries,
            default_code: default_code.to_string(),
        }
    }

    /// The table shipped with the product forms.
    pub fn standard() -> Self {
        Self::new(
            [
                ("880", "Bangladesh (+880)"),
                ("1", "USA/Canada (+1)"),
                ("44", "United Kingdom (+44)"),
                ("91", "India (+91)"),
                ("971", "UAE (+971)"),
                ("966", "Saudi Arabia (+966)"),
                ("974", "Qatar (+974)"),
                ("965", "Kuwait (+965)"),
                ("968", "Oman (+968)"),
                ("60", "Malaysia (+60)"),
                ("65", "Singapore (+65)"),
                ("61", "Australia (+61)"),
                ("49", "Germany (+49)"),
                ("33", "France (+33)"),
                ("39", "Italy (+39)"),
                ("81", "Japan (+81)"),
                ("82", "South Korea (+82)"),
                ("86", "China (+86)"),
                ("92", "Pakistan (+92)"),
                ("94", "Sri Lanka (+94)"),
                ("95", "Myanmar (+95)"),
                ("977", "Nepal (+977)"),
            ],
            DEFAULT_COUNTRY_CODE,
        )
    }

    /// Fallback code used when nothing in the table matches.
    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    /// Entries in matching order (longest codes first), for rendering
    /// dropdowns.
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Longest code that is a prefix of `digits`.
    fn match_prefix<'a>(&'a self, digits: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .map(|(code, _)| code.as_str())
            .find(|code| digits.starts_with(code))
    }
}

fn strip_to_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Parses a stored canonical value back into form fields.
///
/// Returns `None` when the value holds no digits at all (nothing to split).
/// A value whose prefix matches no table entry is treated as legacy local
/// data: a single leading trunk zero is dropped, then the default country
/// code is assumed and the canonical form is reconstructed by prepending it
/// unless already present.
pub fn parse_stored(value: &str, kind: ContactKind, codes: &CountryCodes) -> Option<ParsedNumber> {
    let mut value = value.trim();

    if kind == ContactKind::WhatsApp {
        for prefix in WA_ME_PREFIXES {
            if let Some(rest) = value.strip_prefix(prefix) {
                value = rest;
                break;
            }
        }
    }

    let digits = strip_to_digits(value.trim_start_matches('+'));
    if digits.is_empty() {
        return None;
    }

    if let Some(code) = codes.match_prefix(&digits) {
        let local = digits[code.len()..].to_string();
        return Some(ParsedNumber {
            country_code: code.to_string(),
            local_number: local,
            canonical: digits,
        });
    }

    // Legacy data with no recognizable code: drop the trunk zero, assume the
    // default code and reconstruct a best-guess canonical value.
    let default_code = codes.default_code();
    let trimmed = digits.strip_prefix('0').unwrap_or(&digits);
    let local = trimmed.strip_prefix(default_code).unwrap_or(trimmed);

    Some(ParsedNumber {
        country_code: default_code.to_string(),
        local_number: local.to_string(),
        canonical: format!("{}{}", default_code, local),
    })
}

/// Serializes submitted form fields into the canonical stored value.
///
/// Returns `Ok(None)` when the user submitted nothing and no previous value
/// exists; an empty submission with an existing previous value preserves that
/// value unchanged, so a no-op edit never clears a number.
pub fn serialize_submitted(
    country_code: &str,
    local_number: &str,
    previous: Option<&str>,
    kind: ContactKind,
) -> Result<Option<String>, ContactError> {
    let country_code = country_code.trim();
    let local_number = local_number.trim();

    let digits = strip_to_digits(local_number);
    if digits.is_empty() {
        if !local_number.is_empty() {
            // The user typed something, none of it digits.
            return Err(match kind {
                ContactKind::Phone => ContactError::PhoneDigitsOnly,
                ContactKind::WhatsApp => ContactError::WhatsAppDigitsOnly,
            });
        }
        return Ok(previous.map(str::to_string));
    }

    if country_code.is_empty() {
        return Err(match kind {
            ContactKind::Phone => ContactError::PhoneCountryMissing,
            ContactKind::WhatsApp => ContactError::WhatsAppCountryMissing,
        });
    }

    let canonical = format!("{}{}", country_code, digits);
    Ok(Some(match kind {
        ContactKind::Phone => canonical,
        ContactKind::WhatsApp => format!("https://wa.me/{}", canonical),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes() -> CountryCodes {
        CountryCodes::standard()
    }

    #[test]
    fn test_serialize_phone_round_trip() {
        let stored = serialize_submitted("880", "1799911122", None, ContactKind::Phone)
            .expect("valid input")
            .expect("value produced");
        assert_eq!(stored, "8801799911122");

        let parsed = parse_stored(&stored, ContactKind::Phone, &codes()).expect("digits present");
        assert_eq!(parsed.country_code, "880");
        assert_eq!(parsed.local_number, "1799911122");
        assert_eq!(parsed.canonical, "8801799911122");
    }

    #[test]
    fn test_parse_wa_me_link() {
        let parsed = parse_stored(
            "https://wa.me/8801799911122",
            ContactKind::WhatsApp,
            &codes(),
        )
        .expect("digits present");
        assert_eq!(parsed.country_code, "880");
        assert_eq!(parsed.local_number, "1799911122");
    }

    #[test]
    fn test_serialize_whatsapp_wraps_link() {
        let stored = serialize_submitted("880", "1799911122", None, ContactKind::WhatsApp)
            .expect("valid input")
            .expect("value produced");
        assert_eq!(stored, "https://wa.me/8801799911122");
    }

    #[test]
    fn test_parse_prefers_longest_code() {
        // 971 (UAE) must win over 9... there is no 9 entry, but 880 must win
        // over a hypothetical 8; verify with 971 vs 97-prefixed digits.
        let parsed = parse_stored("9715012345678", ContactKind::Phone, &codes()).unwrap();
        assert_eq!(parsed.country_code, "971");
        assert_eq!(parsed.local_number, "5012345678");
    }

    #[test]
    fn test_parse_unmatched_falls_back_to_default() {
        // A bare local number stored by legacy code: no table prefix matches,
        // the trunk zero is dropped and the default code prepended.
        let parsed = parse_stored("01782793008", ContactKind::Phone, &codes()).unwrap();
        assert_eq!(parsed.country_code, "880");
        assert_eq!(parsed.local_number, "1782793008");
        assert_eq!(parsed.canonical, "8801782793008");
    }

    #[test]
    fn test_parse_fallback_zero_prefixed_country_code() {
        // "0880..." matches no table entry; after the trunk zero goes, the
        // remainder already carries the default code.
        let parsed = parse_stored("08801782793008", ContactKind::Phone, &codes()).unwrap();
        assert_eq!(parsed.country_code, "880");
        assert_eq!(parsed.local_number, "1782793008");
        assert_eq!(parsed.canonical, "8801782793008");
    }

    #[test]
    fn test_parse_fallback_round_trips_through_serialize() {
        let parsed = parse_stored("01782793008", ContactKind::Phone, &codes()).unwrap();
        let stored = serialize_submitted(
            &parsed.country_code,
            &parsed.local_number,
            None,
            ContactKind::Phone,
        )
        .expect("valid input")
        .expect("value produced");
        assert_eq!(stored, parsed.canonical);
    }

    #[test]
    fn test_parse_strips_plus_and_punctuation() {
        let parsed = parse_stored("+880 17-999-11122", ContactKind::Phone, &codes()).unwrap();
        assert_eq!(parsed.country_code, "880");
        assert_eq!(parsed.local_number, "1799911122");
    }

    #[test]
    fn test_parse_empty_value() {
        assert!(parse_stored("", ContactKind::Phone, &codes()).is_none());
        assert!(parse_stored("+-() ", ContactKind::WhatsApp, &codes()).is_none());
    }

    #[test]
    fn test_serialize_rejects_non_digit_local() {
        let err = serialize_submitted("880", "abc", None, ContactKind::WhatsApp).unwrap_err();
        assert_eq!(err, ContactError::WhatsAppDigitsOnly);
        assert_eq!(
            err.to_string(),
            "Enter digits only for the WhatsApp number."
        );

        let err = serialize_submitted("880", "abc", None, ContactKind::Phone).unwrap_err();
        assert_eq!(err.to_string(), "Enter digits only for the phone number.");
    }

    #[test]
    fn test_serialize_requires_country_code() {
        let err = serialize_submitted("", "1799911122", None, ContactKind::WhatsApp).unwrap_err();
        assert_eq!(err.to_string(), "Select a country code.");

        let err = serialize_submitted("", "1799911122", None, ContactKind::Phone).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Select a country code for the phone number."
        );
    }

    #[test]
    fn test_serialize_preserves_previous_on_empty_submission() {
        let stored = serialize_submitted(
            "",
            "",
            Some("https://wa.me/8801799911122"),
            ContactKind::WhatsApp,
        )
        .expect("no error");
        assert_eq!(stored.as_deref(), Some("https://wa.me/8801799911122"));

        let stored = serialize_submitted("880", "", None, ContactKind::Phone).expect("no error");
        assert_eq!(stored, None);
    }

    #[test]
    fn test_serialize_local_digits_with_separators() {
        // Separators mixed with digits are tolerated; digits are kept.
        let stored = serialize_submitted("44", "20-7946-0958", None, ContactKind::Phone)
            .unwrap()
            .unwrap();
        assert_eq!(stored, "442079460958");
    }

    #[test]
    fn test_error_fields() {
        assert_eq!(ContactError::PhoneDigitsOnly.field(), "phone");
        assert_eq!(ContactError::WhatsAppCountryMissing.field(), "whatsapp");
        assert_eq!(ContactError::PhoneAlreadyRegistered.field(), "phone");
    }

    #[test]
    fn test_table_sorted_longest_first() {
        let codes = CountryCodes::new([("1", "one"), ("880", "bd"), ("44", "uk")], "880");
        let lengths: Vec<usize> = codes.entries().iter().map(|(c, _)| c.len()).collect();
        let mut sorted = lengths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(lengths, sorted);
    }
}
