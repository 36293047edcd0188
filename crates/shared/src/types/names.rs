//! Validated names used to address stored files.
//!
//! A managed file is addressed by `(Namespace, EntityId, FileName)`. Each part
//! becomes one path segment on the origin store and on the CDN, so every
//! constructor guarantees the value is a single URL-safe segment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when a name fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The value was empty.
    #[error("{kind} must not be empty")]
    Empty {
        /// Which kind of name was being built.
        kind: &'static str,
    },

    /// The value exceeded the maximum length.
    #[error("{kind} exceeds {max} characters")]
    TooLong {
        /// Which kind of name was being built.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },

    /// The value contained a character outside the allowed set.
    #[error("{kind} contains invalid character {character:?}")]
    InvalidCharacter {
        /// Which kind of name was being built.
        kind: &'static str,
        /// The offending character.
        character: char,
    },

    /// The value is a reserved path segment (`.` or `..`).
    #[error("{kind} must not be a relative path segment")]
    Reserved {
        /// Which kind of name was being built.
        kind: &'static str,
    },
}

/// Macro to generate validated string wrappers.
///
/// Generates the struct, `new()`, `as_str()`, `Display`, `AsRef<str>`,
/// `FromStr` and the serde conversions. `$validate` is a
/// `fn(&str) -> Result<(), NameError>`.
macro_rules! validated_name {
    ($name:ident, $doc:expr, $validate:path) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validates `value` and wraps it.
            ///
            /// # Errors
            ///
            /// Returns a [`NameError`] describing the first violated rule.
            pub fn new(value: impl Into<String>) -> Result<Self, NameError> {
                let value = value.into();
                $validate(&value)?;
                Ok(Self(value))
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

validated_name!(
    Namespace,
    "Per-entity-family path prefix, e.g. `noticias`, `eb`, `patrocinadores`.",
    validate_namespace
);
validated_name!(
    EntityId,
    "Identifier of the record that owns a stored file.",
    validate_entity_id
);
validated_name!(
    FileName,
    "Logical filename of a stored file. Never contains a path separator.",
    validate_file_name
);

const NAMESPACE_MAX: usize = 64;
const ENTITY_ID_MAX: usize = 128;
const FILE_NAME_MAX: usize = 255;

fn check(
    kind: &'static str,
    value: &str,
    max: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty { kind });
    }
    if value.chars().count() > max {
        return Err(NameError::TooLong { kind, max });
    }
    if let Some(character) = value.chars().find(|c| !allowed(*c)) {
        return Err(NameError::InvalidCharacter { kind, character });
    }
    Ok(())
}

fn validate_namespace(value: &str) -> Result<(), NameError> {
    check("namespace", value, NAMESPACE_MAX, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
    })
}

fn validate_entity_id(value: &str) -> Result<(), NameError> {
    check("entity id", value, ENTITY_ID_MAX, |c| {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    })
}

fn is_file_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
}

fn validate_file_name(value: &str) -> Result<(), NameError> {
    check("file name", value, FILE_NAME_MAX, is_file_name_char)?;
    if value == "." || value == ".." {
        return Err(NameError::Reserved { kind: "file name" });
    }
    Ok(())
}

impl FileName {
    /// Builds a file name from user input.
    ///
    /// Drops any directory prefix (`/` or `\`), then replaces every character
    /// outside `[A-Za-z0-9._-]` with `_`.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing usable remains (e.g. an empty name or `..`).
    pub fn sanitize(raw: &str) -> Result<Self, NameError> {
        let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
        let sanitized: String = base
            .chars()
            .map(|c| if is_file_name_char(c) { c } else { '_' })
            .collect();
        Self::new(sanitized)
    }

    /// Returns the part before the extension (the whole name if there is none).
    #[must_use]
    pub fn stem(&self) -> &str {
        self.split().0
    }

    /// Returns the extension without the dot, if any.
    ///
    /// A leading dot does not start an extension: `.env` has none.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.split().1
    }

    /// Returns a sibling name with `_{suffix:03}` inserted before the extension.
    ///
    /// `cover.png` with suffix `42` becomes `cover_042.png`; `README` becomes
    /// `README_042`. The stem is shortened to stay within the length limit.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::TooLong`] when the extension alone leaves no room
    /// for the suffix.
    pub fn with_suffix(&self, suffix: u16) -> Result<Self, NameError> {
        let tail = match self.extension() {
            Some(ext) => format!("_{suffix:03}.{ext}"),
            None => format!("_{suffix:03}"),
        };
        // Names are ASCII, so byte offsets are char offsets.
        let stem = self.stem();
        let keep = stem.len().min(FILE_NAME_MAX.saturating_sub(tail.len()));
        Self::new(format!("{}{tail}", &stem[..keep]))
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.0.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < self.0.len() => {
                (&self.0[..idx], Some(&self.0[idx + 1..]))
            }
            _ => (&self.0, None),
        }
    }
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
