use bitreader::{BitReader, BitReaderError};
use log::trace;

/// The primary alphabet. Z-characters 6..=31 index it at `code - 6`.
pub const ALPHABET_A0: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// How far `decode_at` reads before giving up on finding an end marker
pub const MAX_TEXT_WINDOW: usize = 200;

pub type Zchar = u8;

/// One 16-bit text word: three 5-bit Z-characters and the end-of-string bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedChars {
    pub last: bool,
    pub chars: [Zchar; 3],
}

/// Split a big-endian text word into its end bit and three Z-characters
pub fn read_zchars_from_word(word: &[u8; 2]) -> Result<PackedChars, BitReaderError> {
    let mut br = BitReader::new(word);

    // top bit marks the last word of the string
    let mut pc = PackedChars {
        last: br.read_u8(1)? == 1,
        chars: [0, 0, 0],
    };

    for c in pc.chars.iter_mut() {
        *c = br.read_u8(5)?;
    }

    Ok(pc)
}

/// Decode packed text. Only the primary alphabet is rendered: shift codes 4
/// and 5 and abbreviation codes 1..=3 are skipped.
pub fn decode(bytes: &[u8]) -> String {
    decode_with_len(bytes).0
}

/// Decode packed text and report how many bytes were consumed. Stops after
/// the first word with its top bit set, or when fewer than two bytes remain.
pub fn decode_with_len(bytes: &[u8]) -> (String, usize) {
    let (text, consumed, _) = decode_terminated(bytes);
    (text, consumed)
}

/// As `decode_with_len`, also reporting whether an end bit was seen. A
/// `false` flag means the input ran out mid-string.
pub fn decode_terminated(bytes: &[u8]) -> (String, usize, bool) {
    let mut text = String::new();
    let mut consumed = 0;
    let mut terminated = false;

    for pair in bytes.chunks_exact(2) {
        let word = [pair[0], pair[1]];
        let packed = match read_zchars_from_word(&word) {
            Ok(packed) => packed,
            Err(_) => break,
        };
        consumed += 2;

        trace!(
            "Z-word {:02x}{:02x} = Z-chars {:?}, last={}",
            word[0],
            word[1],
            packed.chars,
            packed.last
        );

        for zc in packed.chars {
            match zc {
                0 => text.push(' '),
                1..=5 => {}
                6..=31 => text.push(ALPHABET_A0[(zc - 6) as usize] as char),
                _ => unreachable!(),
            }
        }

        if packed.last {
            terminated = true;
            break;
        }
    }

    (text.trim_end().to_string(), consumed, terminated)
}

/// Decode the string stored at a byte address, reading at most
/// `MAX_TEXT_WINDOW` bytes
pub fn decode_at(bytes: &[u8], addr: usize) -> String {
    if addr >= bytes.len() {
        return String::new();
    }
    let end = addr.saturating_add(MAX_TEXT_WINDOW).min(bytes.len());
    decode(&bytes[addr..end])
}

/// Unpack a packed address based on version
pub fn unpack_address(packed: u16, version: u8) -> usize {
    match version {
        1..=3 => (packed as usize) * 2,
        4..=7 => (packed as usize) * 4,
        8 => (packed as usize) * 8,
        _ => (packed as usize) * 2,
    }
}
