// ABOUTME: Conversion between editor byte columns and LSP position offsets
// ABOUTME: Handles UTF-8, UTF-16 and UTF-32 position encodings

use quill_types::lsp;
use quill_types::{Cursor, OffsetEncoding};

/// Byte column of an LSP `character` offset. Offsets past the end clamp to the line length.
pub fn character_to_byte(line: &str, character: u32, encoding: OffsetEncoding) -> usize {
    let character = character as usize;
    match encoding {
        OffsetEncoding::Utf8 => floor_char_boundary(line, character),
        OffsetEncoding::Utf16 => {
            let mut units = 0;
            for (idx, ch) in line.char_indices() {
                if units >= character {
                    return idx;
                }
                units += ch.len_utf16();
            }
            line.len()
        }
        OffsetEncoding::Utf32 => line
            .char_indices()
            .nth(character)
            .map_or(line.len(), |(idx, _)| idx),
    }
}

/// LSP `character` offset of a byte column
pub fn byte_to_character(line: &str, byte: usize, encoding: OffsetEncoding) -> u32 {
    let prefix = &line[..floor_char_boundary(line, byte)];
    let units = match encoding {
        OffsetEncoding::Utf8 => prefix.len(),
        OffsetEncoding::Utf16 => prefix.encode_utf16().count(),
        OffsetEncoding::Utf32 => prefix.chars().count(),
    };
    u32::try_from(units).unwrap_or(u32::MAX)
}

/// Position of the cursor as a server with `encoding` counts it
pub fn to_lsp_position(line: &str, cursor: Cursor, encoding: OffsetEncoding) -> lsp::Position {
    lsp::Position::new(cursor.line, byte_to_character(line, cursor.column, encoding))
}

/// Editor position of a server position, given the text of its line
pub fn from_lsp_position(line: &str, position: lsp::Position, encoding: OffsetEncoding) -> Cursor {
    Cursor::new(
        position.line,
        character_to_byte(line, position.character, encoding),
    )
}

pub(crate) fn floor_char_boundary(line: &str, byte: usize) -> usize {
    let mut byte = byte.min(line.len());
    while !line.is_char_boundary(byte) {
        byte -= 1;
    }
    byte
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_identical_in_every_encoding() {
        for encoding in [
            OffsetEncoding::Utf8,
            OffsetEncoding::Utf16,
            OffsetEncoding::Utf32,
        ] {
            assert_eq!(character_to_byte("let foo", 4, encoding), 4);
            assert_eq!(byte_to_character("let foo", 4, encoding), 4);
        }
    }

    #[test]
    fn test_utf16_surrogate_pairs() {
        // U+1F600 is four bytes and two UTF-16 units
        let line = "a😀b";
        assert_eq!(character_to_byte(line, 1, OffsetEncoding::Utf16), 1);
        assert_eq!(character_to_byte(line, 3, OffsetEncoding::Utf16), 5);
        assert_eq!(byte_to_character(line, 5, OffsetEncoding::Utf16), 3);
    }

    #[test]
    fn test_utf32_counts_scalars() {
        let line = "ää.x";
        assert_eq!(character_to_byte(line, 3, OffsetEncoding::Utf32), 5);
        assert_eq!(byte_to_character(line, 5, OffsetEncoding::Utf32), 3);
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(character_to_byte("abc", 10, OffsetEncoding::Utf16), 3);
        assert_eq!(character_to_byte("abc", 10, OffsetEncoding::Utf8), 3);
        assert_eq!(character_to_byte("abc", 10, OffsetEncoding::Utf32), 3);
    }

    #[test]
    fn test_utf8_snaps_to_char_boundary() {
        // byte 1 falls inside the two-byte ä
        assert_eq!(character_to_byte("äb", 1, OffsetEncoding::Utf8), 0);
        assert_eq!(byte_to_character("äb", 1, OffsetEncoding::Utf16), 0);
    }

    #[test]
    fn test_lsp_position_round_trip_through_cursor() {
        let line = "x = \"ü\".len";
        let cursor = Cursor::new(3, line.len());
        let position = to_lsp_position(line, cursor, OffsetEncoding::Utf16);
        assert_eq!(position, lsp::Position::new(3, 11));
        assert_eq!(
            from_lsp_position(line, position, OffsetEncoding::Utf16),
            cursor
        );
    }
}
