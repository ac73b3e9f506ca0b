//! Script-aware token estimate used as a cheap pre-flight guard.
//!
//! Han characters cost 1.5 each; every other run of consecutive
//! non-space, non-punctuation characters costs 1. Not a tokenizer: the
//! authoritative usage always comes from the completion service.

/// Weight of a single Han character.
const HAN_WEIGHT: f64 = 1.5;

/// Estimate the completion-token cost of `text`.
pub fn estimate_tokens(text: &str) -> f64 {
    let mut total = 0.0;
    let mut in_word = false;

    for c in text.chars() {
        if is_han(c) {
            total += HAN_WEIGHT;
            in_word = false;
        } else if c.is_whitespace() || is_punctuation(c) {
            in_word = false;
        } else if !in_word {
            total += 1.0;
            in_word = true;
        }
    }

    total
}

/// Code points of the Han script (unified ideographs, extensions,
/// compatibility ideographs, radicals and the CJK ideographic marks).
fn is_han(c: char) -> bool {
    matches!(
        c as u32,
        0x2E80..=0x2E99
            | 0x2E9B..=0x2EF3
            | 0x2F00..=0x2FD5
            | 0x3005
            | 0x3007
            | 0x3021..=0x3029
            | 0x3038..=0x303B
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xF900..=0xFA6D
            | 0xFA70..=0xFAD9
            | 0x16FE2..=0x16FE3
            | 0x16FF0..=0x16FF1
            | 0x20000..=0x2A6DF
            | 0x2A700..=0x2EBEF
            | 0x2EBF0..=0x2EE5D
            | 0x2F800..=0x2FA1F
            | 0x30000..=0x323AF
    )
}

/// Unicode punctuation (general category P*) for the ranges chat text
/// actually uses: ASCII, Latin-1, general punctuation, CJK and fullwidth forms.
///
/// ASCII symbols such as `$ + < = > ^ \` | ~` are category S and therefore
/// do not break a run.
fn is_punctuation(c: char) -> bool {
    match c {
        '!' | '"' | '#' | '%' | '&' | '\'' | '(' | ')' | '*' | ',' | '-' | '.' | '/' | ':'
        | ';' | '?' | '@' | '[' | '\\' | ']' | '_' | '{' | '}' => true,
        '\u{A1}' | '\u{A7}' | '\u{AB}' | '\u{B6}' | '\u{B7}' | '\u{BB}' | '\u{BF}' => true,
        _ => matches!(
            c as u32,
            0x2010..=0x2027
                | 0x2030..=0x2043
                | 0x2045..=0x2051
                | 0x2053..=0x205E
                | 0x3001..=0x3003
                | 0x3008..=0x3011
                | 0x3014..=0x301F
                | 0x3030
                | 0x303D
                | 0x30A0
                | 0x30FB
                | 0xFE10..=0xFE19
                | 0xFE30..=0xFE52
                | 0xFE54..=0xFE61
                | 0xFF01..=0xFF03
                | 0xFF05..=0xFF0A
                | 0xFF0C..=0xFF0F
                | 0xFF1A..=0xFF1B
                | 0xFF1F..=0xFF20
                | 0xFF3B..=0xFF3D
                | 0xFF3F
                | 0xFF5B
                | 0xFF5D
                | 0xFF5F..=0xFF65
        ),
    }
}
