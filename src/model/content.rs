// File: ./src/model/content.rs
// Decodes the escaped text found in Things' Database.xml.
//
// Things writes markup characters inside attribute values as `\uXX00`, where
// XX is the lowercase hex code of the character (so '<' becomes `\u3c00`).
// Notes are stored as a small XML fragment escaped that way.

/// Error returned when a note fragment can't be read back as XML.
#[derive(Debug, thiserror::Error)]
#[error("unreadable note content: {0}")]
pub struct ContentError(#[from] roxmltree::Error);

const MARKER_LEN: usize = 6;

fn hex_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a' + 10) as u32),
        _ => None,
    }
}

/// Matches a `\uXX00` marker at the start of `bytes` and returns the char it encodes.
fn decode_marker(bytes: &[u8]) -> Option<char> {
    if bytes.len() < MARKER_LEN
        || bytes[0] != b'\\'
        || bytes[1] != b'u'
        || bytes[4] != b'0'
        || bytes[5] != b'0'
    {
        return None;
    }
    let hi = hex_value(bytes[2])?;
    let lo = hex_value(bytes[3])?;
    char::from_u32(hi * 16 + lo)
}

/// Replaces every `\uXX00` marker with the character it stands for.
/// Anything that doesn't match the marker form is copied through untouched.
pub fn unescape(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(c) = decode_marker(&bytes[i..])
        {
            // Markers are pure ASCII, so `i` always sits on a char boundary here.
            out.push_str(&raw[copied..i]);
            out.push(c);
            i += MARKER_LEN;
            copied = i;
            continue;
        }
        i += 1;
    }
    out.push_str(&raw[copied..]);
    out
}

/// Turns the raw `content` attribute of a task into plain note text.
///
/// The unescaped value is a single element such as
/// `<note xml:space="preserve">Call Bob</note>`. Bare ampersands are escaped
/// before parsing because Things doesn't escape them. Returns the text of
/// the element's first child, or an empty string when there is none.
pub fn extract_note_text(raw: &str) -> Result<String, ContentError> {
    let xml = unescape(raw).replace('&', "&amp;");
    let doc = roxmltree::Document::parse(&xml)?;
    let text = doc
        .root_element()
        .first_child()
        .filter(|n| n.is_text())
        .and_then(|n| n.text())
        .unwrap_or("");
    Ok(text.to_string())
}
