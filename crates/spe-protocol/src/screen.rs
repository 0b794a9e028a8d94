//! Front-panel screen image interpretation
//!
//! A screen frame carries the amplifier's 8 × 40 character LCD:
//!
//! ```text
//! [0]        LED status byte (active low)
//! [1..=320]  8 lines × 40 character codes
//! [321..=360] 40 column bytes; bit `n` set = reverse video on line `n`
//! ```
//!
//! Each line is decoded into text segments that alternate between normal and
//! reverse video, always starting with a (possibly empty) normal segment.

use std::fmt;

use crate::error::ProtocolError;
use crate::SCREEN_PAYLOAD_LEN;

/// Display lines
pub const LINES: usize = 8;
/// Characters per line
pub const COLUMNS: usize = 40;

const CHARS_START: usize = 1;
const REVERSE_START: usize = CHARS_START + LINES * COLUMNS;

/// Line used for the disconnected placeholder
const PLACEHOLDER_LINE: usize = 3;
/// Text shown while no screen has been received
pub const PLACEHOLDER_TEXT: &str = "Waiting for amplifier...";

/// Device character code → displayed glyph
pub static GLYPHS: [char; 256] = build_glyphs();

const fn build_glyphs() -> [char; 256] {
    let mut t = [' '; 256];

    // Printable ASCII is shifted down by 0x20
    let mut i = 0x01;
    while i < 0x5F {
        t[i] = (i as u8 + 0x20) as char;
        i += 1;
    }

    t[0x80] = 'μ';
    t[0x81] = '╘';
    t[0x82] = '═';
    t[0x83] = '╧';
    t[0x84] = '╛';
    t[0x85] = '█';
    t[0x88] = '█';
    t[0x89] = '▌';
    t[0x8B] = '█';
    t[0x8D] = '─';
    t[0x8E] = '┬';
    t[0x8F] = '│';
    t[0x92] = '─';
    t[0x93] = '─';
    let mut i = 0x95;
    while i <= 0x98 {
        t[i] = '╫';
        i += 1;
    }
    t[0x99] = '◁';
    t[0x9A] = '△';
    t[0x9B] = '▽';
    t[0x9C] = '▷';
    t[0x9D] = '◁';
    t[0x9E] = '▷';
    t[0x9F] = '─';
    t[0xA0] = '─';
    t[0xA1] = '│';
    t[0xA2] = '┐';
    t[0xA3] = '┘';
    t[0xA4] = '│';
    t[0xA5] = '┌';
    t[0xA6] = '└';
    t[0xAA] = '°';
    t[0xAE] = '✓';
    t[0xB0] = '┌';
    let mut i = 0xB1;
    while i <= 0xBA {
        t[i] = '─';
        i += 1;
    }
    t[0xBB] = '│';
    t[0xBE] = '─';
    t[0xC7] = '│';
    t[0xD1] = '│';
    t[0xDC] = '└';
    let mut i = 0xDD;
    while i <= 0xDF {
        t[i] = '─';
        i += 1;
    }
    t
}

/// Translate one device character code
pub fn glyph(code: u8) -> char {
    GLYPHS[usize::from(code)]
}

/// Front-panel indicator LEDs
///
/// The status byte is active low: an LED is lit when its bit is clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Leds {
    pub alarm: bool,
    pub tune: bool,
    pub set: bool,
    pub operate: bool,
    pub transmit: bool,
    pub power: bool,
}

impl Leds {
    /// Decode the LED status byte
    pub fn from_status_byte(byte: u8) -> Self {
        let lit = |mask: u8| byte & mask == 0;
        Self {
            alarm: lit(0x80),
            tune: lit(0x40),
            set: lit(0x20),
            operate: lit(0x10),
            transmit: lit(0x08),
            power: lit(0x04),
        }
    }
}

/// One display line as alternating normal / reverse-video segments
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenLine {
    segments: Vec<String>,
}

impl ScreenLine {
    /// A line with a single normal segment
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            segments: vec![text.into()],
        }
    }

    /// Build a line from segments, starting with normal video
    ///
    /// An empty list becomes a single empty normal segment.
    pub fn from_segments(segments: Vec<String>) -> Self {
        if segments.is_empty() {
            Self::plain("")
        } else {
            Self { segments }
        }
    }

    /// Raw segments; odd indices are reverse video
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments paired with their reverse-video flag
    pub fn spans(&self) -> impl Iterator<Item = (&str, bool)> {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i % 2 == 1))
    }

    /// Line text without attributes
    pub fn text(&self) -> String {
        self.segments.concat()
    }

    fn decode(chars: &[u8], reverse_columns: &[u8], line: usize) -> Self {
        let mask = 1u8 << line;
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut reverse = false;

        for (&code, &columns) in chars.iter().zip(reverse_columns) {
            let want_reverse = columns & mask != 0;
            if want_reverse != reverse {
                segments.push(std::mem::take(&mut current));
                reverse = want_reverse;
            }
            current.push(glyph(code));
        }
        segments.push(current);

        Self { segments }
    }
}

impl Default for ScreenLine {
    fn default() -> Self {
        Self::plain("")
    }
}

impl fmt::Display for ScreenLine {
    /// Renders reverse-video segments in brackets
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (text, reverse) in self.spans() {
            if reverse {
                write!(f, "[{text}]")?;
            } else {
                f.write_str(text)?;
            }
        }
        Ok(())
    }
}

/// Decoded front-panel display
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenSnapshot {
    /// Raw LED status byte
    pub led_status: u8,
    /// Display lines, top to bottom
    pub lines: [ScreenLine; LINES],
}

impl ScreenSnapshot {
    /// Interpret a validated screen image
    pub fn from_payload(image: &[u8; SCREEN_PAYLOAD_LEN]) -> Self {
        let reverse_columns = &image[REVERSE_START..REVERSE_START + COLUMNS];
        let lines = std::array::from_fn(|line| {
            let start = CHARS_START + line * COLUMNS;
            ScreenLine::decode(&image[start..start + COLUMNS], reverse_columns, line)
        });
        Self {
            led_status: image[0],
            lines,
        }
    }

    /// Interpret a screen image from a slice of unchecked length
    pub fn from_slice(image: &[u8]) -> Result<Self, ProtocolError> {
        let image: &[u8; SCREEN_PAYLOAD_LEN] =
            image.try_into().map_err(|_| ProtocolError::PayloadLength {
                kind: "screen",
                expected: SCREEN_PAYLOAD_LEN,
                actual: image.len(),
            })?;
        Ok(Self::from_payload(image))
    }

    /// Display shown while the amplifier is not answering
    ///
    /// All LEDs dark, every line empty except the waiting message.
    pub fn placeholder() -> Self {
        let mut lines: [ScreenLine; LINES] = Default::default();
        lines[PLACEHOLDER_LINE] = ScreenLine::plain(PLACEHOLDER_TEXT);
        Self {
            led_status: 0xFF,
            lines,
        }
    }

    /// Returns true if this is the disconnected placeholder
    pub fn is_placeholder(&self) -> bool {
        *self == Self::placeholder()
    }

    pub fn leds(&self) -> Leds {
        Leds::from_status_byte(self.led_status)
    }
}

impl Default for ScreenSnapshot {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl fmt::Display for ScreenSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Image with every line filled from `text` (ASCII, already device-encoded)
    fn image_with(lines: [&str; LINES], reverse: [u8; COLUMNS]) -> [u8; SCREEN_PAYLOAD_LEN] {
        let mut image = [0u8; SCREEN_PAYLOAD_LEN];
        image[0] = 0xFF;
        for (n, text) in lines.iter().enumerate() {
            let start = CHARS_START + n * COLUMNS;
            for (j, b) in text.bytes().take(COLUMNS).enumerate() {
                image[start + j] = b - 0x20;
            }
        }
        image[REVERSE_START..].copy_from_slice(&reverse);
        image
    }

    #[test]
    fn test_glyph_table() {
        assert_eq!(glyph(0x00), ' ');
        assert_eq!(glyph(0x01), '!');
        assert_eq!(glyph(0x21), 'A');
        assert_eq!(glyph(0x5E), '~');
        assert_eq!(glyph(0x5F), ' ');
        assert_eq!(glyph(0x80), 'μ');
        assert_eq!(glyph(0x96), '╫');
        assert_eq!(glyph(0xB5), '─');
        assert_eq!(glyph(0xAA), '°');
        assert_eq!(glyph(0xAE), '✓');
        assert_eq!(glyph(0xFF), ' ');
    }

    #[test]
    fn test_unreversed_line_is_single_segment() {
        let image = image_with(["  STANDBY"; LINES], [0u8; COLUMNS]);
        let screen = ScreenSnapshot::from_payload(&image);
        for line in &screen.lines {
            assert_eq!(line.segments().len(), 1);
            assert_eq!(line.segments()[0].chars().count(), COLUMNS);
            assert!(line.text().starts_with("  STANDBY"));
        }
    }

    #[test]
    fn test_reverse_run_in_middle() {
        let mut reverse = [0u8; COLUMNS];
        // Columns 2..5 reversed on line 1 only
        for col in &mut reverse[2..5] {
            *col = 0b0000_0010;
        }
        let image = image_with(["ABCDEFGH"; LINES], reverse);
        let screen = ScreenSnapshot::from_payload(&image);

        let segs = screen.lines[1].segments();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], "AB");
        assert_eq!(segs[1], "CDE");
        assert!(segs[2].starts_with("FGH"));
        assert_eq!(segs[2].chars().count(), COLUMNS - 5);

        assert_eq!(screen.lines[0].segments().len(), 1);
    }

    #[test]
    fn test_reverse_from_first_column_has_empty_normal_segment() {
        let mut reverse = [0u8; COLUMNS];
        reverse[0] = 0x01;
        let image = image_with(["XY"; LINES], reverse);
        let screen = ScreenSnapshot::from_payload(&image);

        let spans: Vec<_> = screen.lines[0].spans().collect();
        assert_eq!(spans[0], ("", false));
        assert_eq!(spans[1], ("X", true));
        assert!(!spans[2].1);
    }

    #[test]
    fn test_reverse_to_end_of_line() {
        let image = image_with(["OPERATE"; LINES], [0x80; COLUMNS]);
        let screen = ScreenSnapshot::from_payload(&image);
        let segs = screen.lines[7].segments();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0], "");
        assert_eq!(segs[1].chars().count(), COLUMNS);
    }

    #[test]
    fn test_leds_active_low() {
        let leds = Leds::from_status_byte(0b0110_1011);
        assert!(leds.alarm);
        assert!(!leds.tune);
        assert!(!leds.set);
        assert!(leds.operate);
        assert!(!leds.transmit);
        assert!(leds.power);

        assert_eq!(Leds::from_status_byte(0xFF), Leds::default());
    }

    #[test]
    fn test_placeholder() {
        let screen = ScreenSnapshot::placeholder();
        assert!(screen.is_placeholder());
        assert_eq!(screen.led_status, 0xFF);
        assert_eq!(screen.lines[3].text(), PLACEHOLDER_TEXT);
        assert_eq!(screen.lines[0].segments(), &[String::new()]);
        assert_eq!(screen.leds(), Leds::default());
    }

    #[test]
    fn test_display_marks_reverse() {
        let line = ScreenLine::from_segments(vec!["A".into(), "B".into(), "C".into()]);
        assert_eq!(line.to_string(), "A[B]C");
        assert_eq!(ScreenLine::from_segments(Vec::new()).segments(), &[String::new()]);
    }

    #[test]
    fn test_from_slice_length_checked() {
        assert!(matches!(
            ScreenSnapshot::from_slice(&[0u8; 100]),
            Err(ProtocolError::PayloadLength { kind: "screen", .. })
        ));
        assert!(ScreenSnapshot::from_slice(&[0u8; SCREEN_PAYLOAD_LEN]).is_ok());
    }

    proptest! {
        #[test]
        fn segments_alternate_and_cover_line(
            chars in prop::collection::vec(any::<u8>(), LINES * COLUMNS),
            reverse in prop::collection::vec(any::<u8>(), COLUMNS),
        ) {
            let mut image = [0u8; SCREEN_PAYLOAD_LEN];
            image[CHARS_START..REVERSE_START].copy_from_slice(&chars);
            image[REVERSE_START..].copy_from_slice(&reverse);
            let screen = ScreenSnapshot::from_payload(&image);

            for (n, line) in screen.lines.iter().enumerate() {
                let total: usize = line.segments().iter().map(|s| s.chars().count()).sum();
                prop_assert_eq!(total, COLUMNS);

                // Every segment after the first is non-empty, and the
                // reverse flag of each character matches its column bit
                let mut col = 0;
                for (i, (text, is_reverse)) in line.spans().enumerate() {
                    if i > 0 {
                        prop_assert!(!text.is_empty());
                    }
                    for _ in text.chars() {
                        prop_assert_eq!(reverse[col] & (1 << n) != 0, is_reverse);
                        col += 1;
                    }
                }
            }
        }
    }
}
