use encoding_rs::{Encoding as Codec, ISO_8859_2, WINDOWS_1250};
use std::fmt::{self, Display};

/// Character encoding of a VFK file, announced by the `&HCODEPAGE` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// `EE8MSWIN1250`
    #[default]
    Windows1250,
    /// `WE8ISO8859P2` (ISO-8859-2, "Latin-2")
    Latin2,
}
impl Encoding {
    /// Map a `CODEPAGE` header value onto an encoding.
    ///
    /// Anything that doesn't name ISO-8859-2 falls back to the default.
    pub fn from_codepage(value: &str) -> Self {
        let value = value.trim().trim_matches('"').to_ascii_uppercase();
        if value.contains("8859") {
            Self::Latin2
        } else {
            Self::Windows1250
        }
    }

    pub fn is_latin2(&self) -> bool {
        matches!(self, Self::Latin2)
    }

    fn codec(&self) -> &'static Codec {
        match self {
            Self::Windows1250 => WINDOWS_1250,
            Self::Latin2 => ISO_8859_2,
        }
    }

    /// Decode raw bytes. Both encodings are single-byte and ASCII compatible,
    /// so decoding never fails; unmapped bytes become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _) = self.codec().decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Encode text, used to write fixtures and round-trip tests.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let (bytes, _, _) = self.codec().encode(text);
        bytes.into_owned()
    }
}
impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec().name())
    }
}
