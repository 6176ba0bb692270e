//! # HMS Types
//!
//! Small validated value types shared by the core and API crates.
//!
//! Each type checks its invariant once, at construction, so code holding a value can rely on it
//! without re-validating.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input exceeded the maximum permitted length
    #[error("Text cannot be longer than {0} characters")]
    TooLong(usize),
    /// The input contained characters outside the permitted set
    #[error("Text contains invalid characters")]
    InvalidCharacters,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Arguments
    ///
    /// * `input` - Any type that can be converted to a string reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(NonEmptyText)` if the trimmed input is non-empty,
    /// or `Err(TextError::Empty)` if it's empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A login handle.
///
/// Usernames are 1 to 150 characters drawn from ASCII letters, digits and `@ . + - _`.
/// Surrounding whitespace is trimmed; case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Maximum username length in characters.
    pub const MAX_LEN: usize = 150;

    /// Validates and wraps a username.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty`, `TextError::TooLong` or `TextError::InvalidCharacters`.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(TextError::TooLong(Self::MAX_LEN));
        }
        let ok = trimmed.bytes().all(|b| {
            matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'@' | b'.' | b'+' | b'-' | b'_')
        });
        if !ok {
            return Err(TextError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Username {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Paracetamol 500mg  ").expect("should accept text");
        assert_eq!(text.as_str(), "Paracetamol 500mg");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new(" \n\t "), Err(TextError::Empty));
    }

    #[test]
    fn non_empty_text_deserialize_rejects_empty() {
        let err = serde_json::from_str::<NonEmptyText>("\"   \"");
        assert!(err.is_err(), "empty string should not deserialize");
    }

    #[test]
    fn username_accepts_permitted_symbols() {
        let name = Username::parse("dr.house+clinic@st-mary_s").expect("should accept username");
        assert_eq!(name.as_str(), "dr.house+clinic@st-mary_s");
    }

    #[test]
    fn username_rejects_spaces_and_length() {
        assert_eq!(Username::parse("john smith"), Err(TextError::InvalidCharacters));
        assert_eq!(
            Username::parse("a".repeat(151)),
            Err(TextError::TooLong(Username::MAX_LEN))
        );
        assert_eq!(Username::parse(""), Err(TextError::Empty));
    }
}
