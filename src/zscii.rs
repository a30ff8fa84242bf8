//! ZSCII codec: Z-string decoding (3 z-chars per 16-bit word, alphabet
//! shifts, abbreviation expansion) and text-buffer encoding for input.
//!
//! Grounded on `text.rs`'s `decode_string`/`decode_string_recursive` (word
//! splitting, alphabet/abbreviation state machine) and `dictionary.rs`'s
//! `encode_word_v3`/`encode_word_v4_plus` (z-char packing for input), with
//! the debug-trace cruft and ad hoc length caps from the original replaced
//! by bounded, version-aware rules.

use crate::error::ZError;

const ALPHABET_A0: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
const ALPHABET_A1: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHABET_A2: &[u8; 26] = b" \n0123456789.,!?_#'\"/\\-:()";

/// Default "extra characters" translation table for ZSCII codes 155..=251,
/// per the Z-Machine Standard 1.0 §3.8.5.3. Index 0 is code 155.
const DEFAULT_EXTRA_CHARS: [char; 97] = [
    'ä', 'ö', 'ü', 'Ä', 'Ö', 'Ü', 'ß', '»', '«', 'ë', 'ï', 'ÿ', 'Ë', 'Ï', 'á', 'é', 'í', 'ó', 'ú',
    'ý', 'Á', 'É', 'Í', 'Ó', 'Ú', 'Ý', 'à', 'è', 'ì', 'ò', 'ù', 'À', 'È', 'Ì', 'Ò', 'Ù', 'â', 'ê',
    'î', 'ô', 'û', 'Â', 'Ê', 'Î', 'Ô', 'Û', 'å', 'Å', 'ø', 'Ø', 'ã', 'ñ', 'õ', 'Ã', 'Ñ', 'Õ', 'æ',
    'Æ', 'ç', 'Ç', 'þ', 'ð', 'Þ', 'Ð', '£', 'œ', 'Œ', '¡', '¿', '\u{0}', '\u{0}', '\u{0}', '\u{0}',
    '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}',
    '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}', '\u{0}',
    '\u{0}', '\u{0}',
];

/// Translate a ZSCII character code to the Unicode character it represents.
pub fn zchar_to_char(code: u16) -> Result<char, ZError> {
    match code {
        0 => Ok('\0'),
        13 => Ok('\n'),
        32..=126 => Ok(code as u8 as char),
        155..=251 => {
            let idx = (code - 155) as usize;
            let ch = DEFAULT_EXTRA_CHARS[idx];
            if ch == '\0' {
                Err(ZError::BadZsciiString {
                    reason: format!("undefined extra character code {code}"),
                })
            } else {
                Ok(ch)
            }
        }
        other => Err(ZError::BadZsciiString {
            reason: format!("ZSCII code {other} has no character mapping"),
        }),
    }
}

/// Decode a Z-string starting at `addr`. Returns the decoded text and the
/// byte address immediately past the terminating word (for callers like
/// `print`/`print_paddr` that push it back onto the call stack).
pub fn decode_zstring(
    memory: &[u8],
    addr: usize,
    abbrev_table_addr: usize,
    version: u8,
) -> Result<(String, usize), ZError> {
    decode_inner(memory, addr, abbrev_table_addr, version, 0)
}

fn read_zchar_words(memory: &[u8], addr: usize) -> Result<(Vec<u8>, usize), ZError> {
    let mut zchars = Vec::new();
    let mut offset = addr;
    loop {
        if offset + 1 >= memory.len() {
            return Err(ZError::BadZsciiString {
                reason: format!("Z-string at {addr:#06x} runs off the end of memory"),
            });
        }
        let word = ((memory[offset] as u16) << 8) | memory[offset + 1] as u16;
        offset += 2;
        let is_end = word & 0x8000 != 0;
        zchars.push(((word >> 10) & 0x1F) as u8);
        zchars.push(((word >> 5) & 0x1F) as u8);
        zchars.push((word & 0x1F) as u8);
        if is_end {
            break;
        }
    }
    Ok((zchars, offset))
}

fn decode_inner(
    memory: &[u8],
    addr: usize,
    abbrev_table_addr: usize,
    version: u8,
    depth: u8,
) -> Result<(String, usize), ZError> {
    if depth > 1 {
        return Err(ZError::BadZsciiString {
            reason: "abbreviation string referenced another abbreviation".to_string(),
        });
    }

    let (zchars, end_offset) = read_zchar_words(memory, addr)?;
    let mut out = String::new();

    let mut alphabet: u8 = 0; // 0 = A0, 1 = A1, 2 = A2
    let mut shift_lock: Option<u8> = None; // v1-2 lock
    let mut pending_shift: u8 = 0; // one-shot shift for v3+
    let mut pending_abbrev_row: u8 = 0;
    let mut pending_ten_bit: Option<u8> = None; // first half of a 10-bit literal

    let mut i = 0;
    while i < zchars.len() {
        let zc = zchars[i];
        i += 1;

        if let Some(high) = pending_ten_bit {
            let code = ((high as u16) << 5) | zc as u16;
            pending_ten_bit = None;
            if code == 13 {
                out.push('\n');
            } else {
                out.push(zchar_to_char(code)?);
            }
            continue;
        }

        if pending_abbrev_row > 0 {
            let row = pending_abbrev_row;
            pending_abbrev_row = 0;
            let abbrev_num = (row as u16 - 1) * 32 + zc as u16;
            let entry_addr = abbrev_table_addr + abbrev_num as usize * 2;
            if entry_addr + 1 >= memory.len() {
                return Err(ZError::BadZsciiString {
                    reason: format!("abbreviation table entry {abbrev_num} out of bounds"),
                });
            }
            let word_addr = ((memory[entry_addr] as u16) << 8) | memory[entry_addr + 1] as u16;
            let byte_addr = word_addr as usize * 2;
            let (abbrev_text, _) = decode_inner(memory, byte_addr, abbrev_table_addr, version, depth + 1)?;
            out.push_str(&abbrev_text);
            continue;
        }

        let effective_alphabet = if pending_shift != 0 {
            let a = pending_shift;
            pending_shift = 0;
            a
        } else {
            shift_lock.unwrap_or(alphabet)
        };

        match zc {
            0 => out.push(' '),
            1 => {
                if version == 1 {
                    out.push('\n');
                } else {
                    pending_abbrev_row = 1;
                }
            }
            2 => {
                if version <= 2 {
                    // v1-2: shift (one-shot toward next alphabet, locking on repeat)
                    shift_lock = Some(next_alphabet(shift_lock.unwrap_or(alphabet)));
                } else {
                    pending_abbrev_row = 2;
                }
            }
            3 => {
                if version <= 2 {
                    shift_lock = Some(prev_alphabet(shift_lock.unwrap_or(alphabet)));
                } else {
                    pending_abbrev_row = 3;
                }
            }
            4 => {
                if version <= 2 {
                    shift_lock = Some(next_alphabet(shift_lock.unwrap_or(alphabet)));
                } else {
                    pending_shift = 1; // A1 next char
                }
            }
            5 => {
                if version <= 2 {
                    shift_lock = Some(prev_alphabet(shift_lock.unwrap_or(alphabet)));
                } else {
                    pending_shift = 2; // A2 next char
                }
            }
            6 if effective_alphabet == 2 => {
                // start of 10-bit ZSCII literal: next two 5-bit chars
                if i >= zchars.len() {
                    return Err(ZError::BadZsciiString {
                        reason: "truncated 10-bit ZSCII literal".to_string(),
                    });
                }
                pending_ten_bit = Some(zchars[i]);
                i += 1;
            }
            7 if effective_alphabet == 2 => out.push('\n'),
            n => {
                let table: &[u8; 26] = match effective_alphabet {
                    0 => ALPHABET_A0,
                    1 => ALPHABET_A1,
                    _ => ALPHABET_A2,
                };
                let idx = n as usize - 6;
                if idx >= 26 {
                    return Err(ZError::BadZsciiString {
                        reason: format!("z-char {n} out of range for alphabet {effective_alphabet}"),
                    });
                }
                out.push(table[idx] as char);
            }
        }
    }

    Ok((out, end_offset))
}

fn next_alphabet(a: u8) -> u8 {
    (a + 1) % 3
}

fn prev_alphabet(a: u8) -> u8 {
    (a + 2) % 3
}

/// Encode text into a sequence of 5-bit z-characters for the input text
/// buffer (lowercased, padded with 5, truncated to `max_len` characters).
pub fn to_zchar_list(text: &str, max_len: usize) -> Vec<u8> {
    let mut chars: Vec<u8> = Vec::new();
    for ch in text.chars().take(max_len) {
        let ch = ch.to_ascii_lowercase();
        let code = match ch {
            'a'..='z' => (ch as u8 - b'a') + 6,
            ' ' => 0,
            '0'..='9' | '.' | ',' | '!' | '?' | '_' | '#' | '\'' | '"' | '/' | '\\' | '-' | ':'
            | '(' | ')' => {
                ALPHABET_A2
                    .iter()
                    .position(|&c| c == ch as u8)
                    .map(|p| (p as u8) + 6)
                    .unwrap_or(5)
            }
            _ => 5,
        };
        chars.push(code);
    }
    chars
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn word_bytes(zchars: [u8; 3], end: bool) -> [u8; 2] {
        let mut w = ((zchars[0] as u16) << 10) | ((zchars[1] as u16) << 5) | zchars[2] as u16;
        if end {
            w |= 0x8000;
        }
        [(w >> 8) as u8, (w & 0xFF) as u8]
    }

    #[test]
    fn decodes_plain_lowercase_word() {
        // "cab" -> c=8,a=6,b=7
        let bytes = word_bytes([8, 6, 7], true);
        let (s, end) = decode_zstring(&bytes, 0, 0, 3).unwrap();
        assert_eq!(s, "cab");
        assert_eq!(end, 2);
    }

    #[test]
    fn space_and_shift_to_a1() {
        // zchar 0 = space, then shift(4)->A1, then 'A' = idx0+6=6
        let bytes = word_bytes([0, 4, 6], true);
        let (s, _) = decode_zstring(&bytes, 0, 0, 3).unwrap();
        assert_eq!(s, " A");
    }

    #[test]
    fn abbreviation_expansion() {
        // memory: [zstring "ab" via abbrev row1 offset0][abbrev table entry][abbrev target "hi"]
        let mut memory = vec![0u8; 0];
        // main string: abbrev-row-1 (zchar 1), then offset char 0
        memory.extend_from_slice(&word_bytes([1, 0, 5], true));
        let abbrev_table_addr = memory.len();
        // one abbreviation table entry pointing at word-address below
        let target_byte_addr = abbrev_table_addr + 2;
        let target_word_addr = (target_byte_addr / 2) as u16;
        memory.extend_from_slice(&target_word_addr.to_be_bytes());
        // target z-string: "hi" -> h=13,i=14
        memory.extend_from_slice(&word_bytes([13, 14, 5], true));

        let (s, _) = decode_zstring(&memory, 0, abbrev_table_addr, 3).unwrap();
        assert_eq!(s, "hi");
    }

    #[test]
    fn nested_abbreviation_is_fatal() {
        // An abbreviation string that itself references an abbreviation.
        let mut memory = vec![0u8; 0];
        memory.extend_from_slice(&word_bytes([1, 0, 5], true)); // main: abbrev 0
        let abbrev_table_addr = memory.len();
        let target_byte_addr = abbrev_table_addr + 2;
        let target_word_addr = (target_byte_addr / 2) as u16;
        memory.extend_from_slice(&target_word_addr.to_be_bytes());
        // target references abbreviation again
        memory.extend_from_slice(&word_bytes([1, 0, 5], true));

        let err = decode_zstring(&memory, 0, abbrev_table_addr, 3).unwrap_err();
        assert!(matches!(err, ZError::BadZsciiString { .. }));
    }

    #[test]
    fn extra_char_table_maps_accented_letters() {
        assert_eq!(zchar_to_char(155).unwrap(), 'ä');
        assert!(zchar_to_char(3000).is_err());
    }

    #[test]
    fn to_zchar_list_lowercases_and_truncates() {
        let chars = to_zchar_list("OPEN MAILBOX", 6);
        assert_eq!(chars.len(), 6);
        assert_eq!(chars[0], 6 + 14); // 'o'
    }
}
