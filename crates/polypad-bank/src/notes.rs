/// Extracts a MIDI note number from a sample filename stem.
///
/// Accepted forms, in order of precedence:
/// - a bare number: `60`
/// - a trailing underscore-number: `kick_36`
/// - a note name with octave: `c4`, `f#3`, `eb2`, `fs3` (middle C = C4 = 60)
/// - a trailing underscore note name: `piano_c4`
///
/// Anything else, or a value outside 0..=127, yields `None`.
pub fn note_from_stem(stem: &str) -> Option<u8> {
    let stem = stem.trim();
    if let Ok(value) = stem.parse::<i32>() {
        return to_note(value);
    }
    if let Some((_, suffix)) = stem.rsplit_once('_') {
        if let Ok(value) = suffix.parse::<i32>() {
            return to_note(value);
        }
        if let Some(note) = parse_note_name(suffix) {
            return Some(note);
        }
    }
    parse_note_name(stem)
}

fn to_note(value: i32) -> Option<u8> {
    (0..=127).contains(&value).then(|| value as u8)
}

fn parse_note_name(text: &str) -> Option<u8> {
    let mut chars = text.chars();
    let semitone = match chars.next()?.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave_text) = match rest.chars().next() {
        Some('#') | Some('s') | Some('S') => (1, &rest[1..]),
        // A 'b' is only a flat when an octave follows; "b2" alone is the note B.
        Some('b') if rest.len() > 1 => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave_text.parse().ok()?;
    to_note((octave + 1) * 12 + semitone + accidental)
}
