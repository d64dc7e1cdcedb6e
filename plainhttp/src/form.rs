//! `application/x-www-form-urlencoded` decoding.
//!
//! Used for both the query string of the request target and urlencoded
//! request bodies.

use std::borrow::Cow;

use percent_encoding::percent_decode;


/// Ordered name/value pairs. Names are case-sensitive and may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    data: Vec<(String, String)>,
}

impl Fields {
    pub fn add<N, V>(&mut self, name: N, value: V)
        where N: Into<String>, V: Into<String> {
        self.data.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.data.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item=&'a str> + 'a {
        self.data.iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item=(&str, &str)> {
        self.data.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}


/// Character sets a urlencoded body may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Latin1,
    Utf8,
    Ascii,
}

impl Charset {
    /// Looks up a charset label, `None` if we can't decode it.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches('"').to_ascii_lowercase();
        match label.as_str() {
            "iso-8859-1" | "iso8859-1" | "latin1" | "l1" | "iso_8859-1" => {
                Some(Charset::Latin1)
            }
            "utf-8" | "utf8" => Some(Charset::Utf8),
            "us-ascii" | "ascii" => Some(Charset::Ascii),
            _ => None,
        }
    }

    pub fn decode<'a>(self, bytes: &'a [u8]) -> Cow<'a, str> {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes),
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect::<String>().into(),
            Charset::Ascii => {
                bytes.iter()
                    .map(|&b| if b.is_ascii() { b as char } else { '?' })
                    .collect::<String>()
                    .into()
            }
        }
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::Latin1
    }
}


/// Decodes a single urlencoded component: `+` is a space and `%XX` an
/// escaped byte. The resulting bytes are read in `charset`.
pub fn decode_component(raw: &[u8], charset: Charset) -> String {
    let plussed: Vec<u8> = raw.iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    let bytes: Vec<u8> = percent_decode(&plussed).collect();
    charset.decode(&bytes).into_owned()
}

/// Parses `name=value&name2=value2` into fields.
///
/// Empty items (`&&`) are skipped, an item without `=` gets an empty value
/// and only the first `=` separates name from value.
pub fn parse(raw: &[u8], charset: Charset) -> Fields {
    let mut fields = Fields::default();

    for item in raw.split(|&b| b == b'&').filter(|item| !item.is_empty()) {
        let mut parts = item.splitn(2, |&b| b == b'=');
        let name = parts.next().map(trim_ascii).unwrap_or(&[]);
        let value = parts.next().map(trim_ascii).unwrap_or(&[]);

        fields.add(decode_component(name, charset), decode_component(value, charset));
    }

    fields
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }
    bytes
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_fields_in_order_with_duplicates() {
        let fields = parse(b"Role=admin&Role=support&UserId=42", Charset::Utf8);

        assert_eq!(fields.get_all("Role").collect::<Vec<_>>(), vec!["admin", "support"]);
        assert_eq!(fields.get("UserId"), Some("42"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn missing_value_is_empty_and_empty_items_are_skipped() {
        let fields = parse(b"a=b&&c&d=", Charset::Latin1);

        assert_eq!(fields.get("a"), Some("b"));
        assert_eq!(fields.get("c"), Some(""));
        assert_eq!(fields.get("d"), Some(""));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn only_the_first_equals_sign_splits() {
        let fields = parse(b"token=abc==", Charset::Utf8);
        assert_eq!(fields.get("token"), Some("abc=="));
    }

    #[test]
    fn names_are_case_sensitive() {
        let fields = parse(b"id=1", Charset::Utf8);
        assert_eq!(fields.get("ID"), None);
    }

    #[test]
    fn decodes_plus_and_percent_escapes_in_the_given_charset() {
        assert_eq!(decode_component(b"hello+world%21", Charset::Utf8), "hello world!");
        assert_eq!(decode_component(b"caf%C3%A9", Charset::Utf8), "caf\u{e9}");
        assert_eq!(decode_component(b"caf%E9", Charset::Latin1), "caf\u{e9}");
        assert_eq!(decode_component(b"caf%E9", Charset::Ascii), "caf?");
    }

    #[test]
    fn charset_labels_are_case_insensitive() {
        assert_eq!(Charset::from_label("UTF-8"), Some(Charset::Utf8));
        assert_eq!(Charset::from_label(" ISO-8859-1 "), Some(Charset::Latin1));
        assert_eq!(Charset::from_label("\"us-ascii\""), Some(Charset::Ascii));
        assert_eq!(Charset::from_label("shift_jis"), None);
        assert_eq!(Charset::from_label("windows-1252"), None);
    }
}
