//! Small helpers for working with TCPR message text.

/// Strips the `[HH:MM:SS] ` prefix a KAG server puts on console lines.
///
/// The prefix is matched structurally rather than with a regex: an opening
/// bracket, three two-digit groups separated by colons, a closing bracket
/// and a single space. Lines that do not carry exactly that shape are
/// returned unchanged, so the function is safe to apply to any message.
///
/// ```
/// use tcpr::util::strip_timestamp;
///
/// assert_eq!(strip_timestamp("[12:34:56] player joined"), "player joined");
/// assert_eq!(strip_timestamp("no timestamp here"), "no timestamp here");
/// assert_eq!(strip_timestamp("[12:34] too short"), "[12:34] too short");
/// ```
pub fn strip_timestamp(line: &str) -> &str {
    let bytes = line.as_bytes();
    if bytes.len() < 11 {
        return line;
    }
    let shaped = bytes[0] == b'['
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_digit()
        && bytes[3] == b':'
        && bytes[4].is_ascii_digit()
        && bytes[5].is_ascii_digit()
        && bytes[6] == b':'
        && bytes[7].is_ascii_digit()
        && bytes[8].is_ascii_digit()
        && bytes[9] == b']'
        && bytes[10] == b' ';
    if shaped {
        // The prefix is pure ASCII, so byte index 11 is a char boundary.
        &line[11..]
    } else {
        line
    }
}
