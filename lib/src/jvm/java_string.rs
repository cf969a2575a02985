use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// String as the JVM sees it: a sequence of UTF-16 code units
///
/// Unlike a Rust `String`, the code units need not be well-formed, since Java tolerates unpaired
/// surrogates in string constants. Well-formed strings (almost all of them) are kept as a regular
/// `String`, so two equal `JavaString`s always have the same representation.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JavaString(Repr);

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
enum Repr {
    Text(String),

    /// Only used when the units contain an unpaired surrogate
    Units(Vec<u16>),
}

impl JavaString {
    pub fn from_utf16(units: Vec<u16>) -> JavaString {
        match String::from_utf16(&units) {
            Ok(text) => JavaString(Repr::Text(text)),
            Err(_) => JavaString(Repr::Units(units)),
        }
    }

    /// The string, if it is valid unicode
    pub fn as_str(&self) -> Option<&str> {
        match &self.0 {
            Repr::Text(text) => Some(text),
            Repr::Units(_) => None,
        }
    }

    pub fn into_string(self) -> Result<String, JavaString> {
        match self.0 {
            Repr::Text(text) => Ok(text),
            units => Err(JavaString(units)),
        }
    }

    pub fn to_utf16(&self) -> Cow<'_, [u16]> {
        match &self.0 {
            Repr::Text(text) => Cow::Owned(text.encode_utf16().collect()),
            Repr::Units(units) => Cow::Borrowed(units),
        }
    }

    /// Unpaired surrogates are replaced with `U+FFFD`
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match &self.0 {
            Repr::Text(text) => Cow::Borrowed(text),
            Repr::Units(units) => Cow::Owned(String::from_utf16_lossy(units)),
        }
    }
}

impl From<String> for JavaString {
    fn from(text: String) -> JavaString {
        JavaString(Repr::Text(text))
    }
}

impl From<&str> for JavaString {
    fn from(text: &str) -> JavaString {
        JavaString(Repr::Text(text.to_owned()))
    }
}

impl PartialEq<str> for JavaString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for JavaString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl fmt::Display for JavaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for JavaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Text(text) => fmt::Debug::fmt(text, f),
            Repr::Units(units) => {
                f.write_str("\"")?;
                for decoded in char::decode_utf16(units.iter().copied()) {
                    match decoded {
                        Ok(c) => write!(f, "{}", c.escape_debug())?,
                        Err(err) => write!(f, "\\u{{{:x}}}", err.unpaired_surrogate())?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

/// Well-formed strings are plain JSON strings, others are arrays of code units
impl Serialize for JavaString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JavaString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => JavaString(Repr::Text(text)),
            Repr::Units(units) => JavaString::from_utf16(units),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_units_are_text() {
        let string = JavaString::from_utf16("a\u{1F600}".encode_utf16().collect());
        assert_eq!(string, "a\u{1F600}");
        assert_eq!(string, JavaString::from("a\u{1F600}"));
        assert_eq!(string.to_utf16().as_ref(), &[0x61, 0xD83D, 0xDE00]);
    }

    #[test]
    fn unpaired_surrogates_are_kept() {
        let string = JavaString::from_utf16(vec![0x61, 0xD800]);
        assert_eq!(string.as_str(), None);
        assert_eq!(string.to_utf16().as_ref(), &[0x61, 0xD800]);
        assert_eq!(string.to_string_lossy(), "a\u{FFFD}");
        assert_eq!(format!("{:?}", string), "\"a\\u{d800}\"");
        assert!(string.clone().into_string().is_err());
    }

    #[test]
    fn json_forms() {
        let text = JavaString::from("hi");
        let units = JavaString::from_utf16(vec![0xDC00]);
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"hi\"");
        assert_eq!(serde_json::to_string(&units).unwrap(), "[56320]");

        let read: JavaString = serde_json::from_str("[104,105]").unwrap();
        assert_eq!(read, text);
        let read: JavaString = serde_json::from_str("[56320]").unwrap();
        assert_eq!(read, units);
    }
}
