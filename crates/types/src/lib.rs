//! # Secu Types
//!
//! Validated value types shared across the workspace.
//!
//! Every type in this crate is constructed through a fallible `new` that trims its input and
//! checks it once. After construction the inner value can be trusted, and serde
//! deserialisation goes through the same check so stored or transmitted values cannot bypass it.

/// Errors that can occur when creating validated text types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input text exceeded the permitted number of characters
    #[error("Text cannot exceed {max} characters")]
    TooLong { max: usize },
    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),
    #[error("Invalid phone number: '{0}' (expected international format, e.g. +33612345678)")]
    InvalidPhone(String),
    #[error("Invalid insurance number: '{0}' (expected exactly 13 digits)")]
    InvalidInsuranceNumber(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Like [`NonEmptyText::new`], additionally bounding the character count.
    pub fn with_max_len(input: impl AsRef<str>, max: usize) -> Result<Self, TextError> {
        let text = Self::new(input)?;
        if text.0.chars().count() > max {
            return Err(TextError::TooLong { max });
        }
        Ok(text)
    }

    /// Maps blank input to `None` instead of an error.
    pub fn optional(input: Option<impl AsRef<str>>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// An email address with a plausible `local@domain.tld` shape.
///
/// The local part may contain letters, digits and `+ _ . -`. The domain may contain letters,
/// digits, dots and hyphens and must end in an alphabetic top-level label of at least two
/// characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }

        let invalid = || TextError::InvalidEmail(trimmed.to_owned());
        let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;

        let local_ok = !local.is_empty()
            && local
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'_' | b'.' | b'-'));
        let domain_chars_ok = domain
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-'));
        let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
        let tld_ok = tld.len() >= 2 && tld.bytes().all(|b| b.is_ascii_alphabetic());

        if !local_ok || !domain_chars_ok || host.is_empty() || !tld_ok {
            return Err(invalid());
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used for uniqueness comparisons.
    pub fn normalised(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

/// A phone number in international form: optional `+`, a non-zero leading digit, 2 to 15
/// digits in total.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }

        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let valid = (2..=15).contains(&digits.len())
            && digits.bytes().all(|b| b.is_ascii_digit())
            && !digits.starts_with('0');
        if !valid {
            return Err(TextError::InvalidPhone(trimmed.to_owned()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A social-security insurance number: exactly 13 ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsuranceNumber(String);

impl InsuranceNumber {
    pub const LENGTH: usize = 13;

    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() != Self::LENGTH || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TextError::InvalidInsuranceNumber(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype_impls {
    ($($ty:ident),+ $(,)?) => {$(
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = TextError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::new(s)
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    )+};
}

string_newtype_impls!(NonEmptyText, EmailAddress, PhoneNumber, InsuranceNumber);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_text_trims() {
        let text = NonEmptyText::new("  Dupont  ").unwrap();
        assert_eq!(text.as_str(), "Dupont");
    }

    #[test]
    fn test_non_empty_text_rejects_blank() {
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
        assert_eq!(NonEmptyText::new(""), Err(TextError::Empty));
    }

    #[test]
    fn test_non_empty_text_max_len() {
        assert!(NonEmptyText::with_max_len("Cardiologie", 100).is_ok());
        let long = "x".repeat(101);
        assert_eq!(
            NonEmptyText::with_max_len(long, 100),
            Err(TextError::TooLong { max: 100 })
        );
    }

    #[test]
    fn test_non_empty_text_optional() {
        assert!(NonEmptyText::optional(Some("  ")).is_none());
        assert!(NonEmptyText::optional(None::<&str>).is_none());
        assert_eq!(
            NonEmptyText::optional(Some(" Pédiatrie ")).unwrap().as_str(),
            "Pédiatrie"
        );
    }

    #[test]
    fn test_non_empty_text_deserialize_rejects_blank() {
        let result: Result<NonEmptyText, _> = serde_json::from_str("\"  \"");
        assert!(result.is_err());
    }

    #[test]
    fn test_email_accepts_common_forms() {
        assert!(EmailAddress::new("jean.dupont@example.fr").is_ok());
        assert!(EmailAddress::new("a+b_c-d@mail.sub-domain.com").is_ok());
    }

    #[test]
    fn test_email_rejects_malformed() {
        for bad in [
            "no-at-sign.example.com",
            "@example.com",
            "user@",
            "user@example",
            "user@example.c",
            "user@exa mple.com",
            "us er@example.com",
            "user@@example.com",
            "user@example.c0m",
        ] {
            assert!(
                matches!(EmailAddress::new(bad), Err(TextError::InvalidEmail(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_email_normalised_is_lowercase() {
        let email = EmailAddress::new("Jean.Dupont@Example.FR").unwrap();
        assert_eq!(email.normalised(), "jean.dupont@example.fr");
        assert_eq!(email.as_str(), "Jean.Dupont@Example.FR");
    }

    #[test]
    fn test_phone_valid() {
        assert!(PhoneNumber::new("+33612345678").is_ok());
        assert!(PhoneNumber::new("612345678").is_ok());
        assert!(PhoneNumber::new("12").is_ok());
    }

    #[test]
    fn test_phone_invalid() {
        for bad in ["0612345678", "+", "1", "+1234567890123456", "06-12-34", "abc"] {
            assert!(
                matches!(PhoneNumber::new(bad), Err(TextError::InvalidPhone(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_insurance_number() {
        assert!(InsuranceNumber::new("1850578006084").is_ok());
        assert!(matches!(
            InsuranceNumber::new("185057800608"),
            Err(TextError::InvalidInsuranceNumber(_))
        ));
        assert!(matches!(
            InsuranceNumber::new("185057800608A"),
            Err(TextError::InvalidInsuranceNumber(_))
        ));
        assert_eq!(InsuranceNumber::new(" "), Err(TextError::Empty));
    }

    #[test]
    fn test_serde_uses_plain_strings() {
        let number = InsuranceNumber::new("1850578006084").unwrap();
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, "\"1850578006084\"");

        let bad: Result<InsuranceNumber, _> = serde_json::from_str("\"123\"");
        assert!(bad.is_err());
    }
}
