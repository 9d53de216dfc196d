//! GD3 (Game Description 3) tag handling

/// GD3 tag magic
const GD3_MAGIC: &[u8; 4] = b"Gd3 ";

/// GD3 version (1.00)
const GD3_VERSION: u32 = 0x00000100;

/// Number of strings in a GD3 tag
const GD3_FIELD_COUNT: usize = 11;

/// GD3 metadata: eleven strings in a fixed order.
///
/// Order on disk: title (en/native), game (en/native), system (en/native),
/// composer (en/native), release date, converter, notes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gd3Tag {
    pub title_en: String,
    pub title_jp: String,
    pub game_en: String,
    pub game_jp: String,
    pub system_en: String,
    pub system_jp: String,
    pub composer_en: String,
    pub composer_jp: String,
    pub date: String,
    pub converter: String,
    pub notes: String,
}

impl Gd3Tag {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.is_empty())
    }

    fn fields(&self) -> [&String; GD3_FIELD_COUNT] {
        [
            &self.title_en,
            &self.title_jp,
            &self.game_en,
            &self.game_jp,
            &self.system_en,
            &self.system_jp,
            &self.composer_en,
            &self.composer_jp,
            &self.date,
            &self.converter,
            &self.notes,
        ]
    }

    fn fields_mut(&mut self) -> [&mut String; GD3_FIELD_COUNT] {
        [
            &mut self.title_en,
            &mut self.title_jp,
            &mut self.game_en,
            &mut self.game_jp,
            &mut self.system_en,
            &mut self.system_jp,
            &mut self.composer_en,
            &mut self.composer_jp,
            &mut self.date,
            &mut self.converter,
            &mut self.notes,
        ]
    }

    /// Serialize to tag bytes: magic, version, payload length, then the
    /// eleven UTF-16LE strings. Every field contributes at least its
    /// double-null terminator.
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::new();

        data.extend_from_slice(GD3_MAGIC);
        data.extend_from_slice(&GD3_VERSION.to_le_bytes());

        // Placeholder for payload size (filled below)
        let size_offset = data.len();
        data.extend_from_slice(&0u32.to_le_bytes());

        let strings_start = data.len();
        for field in self.fields() {
            write_utf16_string(&mut data, field);
        }

        let strings_size = (data.len() - strings_start) as u32;
        data[size_offset..size_offset + 4].copy_from_slice(&strings_size.to_le_bytes());

        data
    }

    /// Parse a GD3 tag. Missing trailing fields become empty strings;
    /// a field that is not valid UTF-16 degrades to an empty string
    /// without corrupting the fields after it.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 12 || &data[0..4] != GD3_MAGIC {
            return None;
        }

        let payload_len =
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize;
        let payload = &data[12..data.len().min(12 + payload_len)];

        let mut tag = Gd3Tag::default();
        let mut pos = 0;
        for field in tag.fields_mut() {
            let mut units = Vec::new();
            while pos + 1 < payload.len() {
                let unit = u16::from_le_bytes([payload[pos], payload[pos + 1]]);
                pos += 2;
                if unit == 0 {
                    break;
                }
                units.push(unit);
            }
            *field = String::from_utf16(&units).unwrap_or_default();
        }

        Some(tag)
    }
}

/// Write a UTF-16LE null-terminated string
fn write_utf16_string(data: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16() {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    // Null terminator
    data.push(0);
    data.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_ascii() {
        let mut data = Vec::new();
        write_utf16_string(&mut data, "ABC");
        assert_eq!(data, vec![0x41, 0x00, 0x42, 0x00, 0x43, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_utf16_japanese() {
        let mut data = Vec::new();
        write_utf16_string(&mut data, "\u{3042}");
        // U+3042 = hiragana A
        assert_eq!(data, vec![0x42, 0x30, 0x00, 0x00]);
    }

    #[test]
    fn test_empty_tag_serialization() {
        let tag = Gd3Tag::default();
        let data = tag.serialize();
        // 12-byte header + 11 double-null terminators
        assert_eq!(data.len(), 12 + 22);
        assert_eq!(&data[0..4], b"Gd3 ");
    }

    #[test]
    fn test_round_trip() {
        let tag = Gd3Tag {
            title_en: "Main Theme".into(),
            game_en: "Descent".into(),
            composer_en: "Someone".into(),
            date: "1995".into(),
            converter: "fmconv".into(),
            ..Default::default()
        };
        let parsed = Gd3Tag::parse(&tag.serialize()).unwrap();
        assert_eq!(parsed, tag);
    }

    #[test]
    fn test_parse_missing_trailing_fields() {
        // Only the first field present, then the payload ends
        let mut data = Vec::new();
        data.extend_from_slice(b"Gd3 ");
        data.extend_from_slice(&0x100u32.to_le_bytes());
        let payload = {
            let mut p = Vec::new();
            write_utf16_string(&mut p, "T");
            p
        };
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);

        let tag = Gd3Tag::parse(&data).unwrap();
        assert_eq!(tag.title_en, "T");
        assert!(tag.notes.is_empty());
    }

    #[test]
    fn test_garbage_field_does_not_corrupt_rest() {
        // Second field is an unpaired surrogate; third field must survive
        let mut payload = Vec::new();
        write_utf16_string(&mut payload, "ok");
        payload.extend_from_slice(&0xD800u16.to_le_bytes());
        payload.push(0);
        payload.push(0);
        write_utf16_string(&mut payload, "game");
        for _ in 0..8 {
            payload.push(0);
            payload.push(0);
        }

        let mut data = Vec::new();
        data.extend_from_slice(b"Gd3 ");
        data.extend_from_slice(&GD3_VERSION.to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);

        let tag = Gd3Tag::parse(&data).unwrap();
        assert_eq!(tag.title_en, "ok");
        assert_eq!(tag.title_jp, "");
        assert_eq!(tag.game_en, "game");
    }
}
