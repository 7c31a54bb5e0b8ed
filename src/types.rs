//! Core data model types for the publish pipeline.
//!
//! Every decoder turns its input into a sequence of [`Record`]s: one flattened text line per
//! logical row, with fields joined by [`FIELD_DELIMITER`].

use std::fmt;

use serde::Serialize;

/// Delimiter placed between the fields of a row when it is flattened into a [`Record`].
pub const FIELD_DELIMITER: char = ';';

/// A single normalized row, ready to be published.
///
/// Records are opaque to the pipeline; no structure is imposed beyond "one line of text".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Record(String);

impl Record {
    /// Create a record from an already-flattened line.
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    /// Join `fields` with [`FIELD_DELIMITER`] (no trailing delimiter).
    ///
    /// ```rust
    /// use file_publisher::types::Record;
    ///
    /// let r = Record::from_fields(["1", "Ada", "98.5"]);
    /// assert_eq!(r.as_str(), "1;Ada;98.5");
    /// ```
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut line = String::new();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                line.push(FIELD_DELIMITER);
            }
            line.push_str(field.as_ref());
        }
        Self(line)
    }

    /// Borrow the record text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the record and return the owned text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Length of the record text in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record text is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Record {
    fn from(line: String) -> Self {
        Self(line)
    }
}

impl From<&str> for Record {
    fn from(line: &str) -> Self {
        Self(line.to_owned())
    }
}

impl AsRef<str> for Record {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::Record;

    #[test]
    fn from_fields_joins_without_trailing_delimiter() {
        assert_eq!(Record::from_fields(["a", "b", "c"]).as_str(), "a;b;c");
        assert_eq!(Record::from_fields(["only"]).as_str(), "only");
    }

    #[test]
    fn from_fields_keeps_empty_fields_in_place() {
        assert_eq!(Record::from_fields(["a", "", "c"]).as_str(), "a;;c");
        assert!(Record::from_fields(Vec::<String>::new()).is_empty());
    }
}
