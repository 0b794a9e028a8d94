//! Front-panel image rendering for the virtual amplifier
//!
//! Produces the 361-byte screen image an amplifier would send for a given
//! status, using the same character codes and reverse-video masks as the
//! real LCD.

use spe_protocol::screen::{COLUMNS, GLYPHS, LINES};
use spe_protocol::{StatusSnapshot, SCREEN_PAYLOAD_LEN};

const CHARS_START: usize = 1;
const REVERSE_START: usize = CHARS_START + LINES * COLUMNS;

/// Line carrying the STANDBY/OPERATE banner
const MODE_LINE: usize = 2;

/// Device character code for a displayed glyph
///
/// Characters without a device code are drawn as blanks.
pub fn char_code(ch: char) -> u8 {
    if ch == ' ' {
        return 0x00;
    }
    GLYPHS
        .iter()
        .position(|&g| g == ch)
        .and_then(|i| u8::try_from(i).ok())
        .unwrap_or(0x00)
}

/// Screen image under construction
struct Panel {
    image: [u8; SCREEN_PAYLOAD_LEN],
}

impl Panel {
    fn new(led_status: u8) -> Self {
        let mut image = [0u8; SCREEN_PAYLOAD_LEN];
        image[0] = led_status;
        Self { image }
    }

    fn write(&mut self, line: usize, column: usize, text: &str) {
        let start = CHARS_START + line * COLUMNS;
        for (offset, ch) in text.chars().enumerate() {
            let col = column + offset;
            if col >= COLUMNS {
                break;
            }
            self.image[start + col] = char_code(ch);
        }
    }

    fn reverse(&mut self, line: usize, columns: std::ops::Range<usize>) {
        for col in columns.take_while(|&c| c < COLUMNS) {
            self.image[REVERSE_START + col] |= 1 << line;
        }
    }
}

/// LED status byte for a status (active low)
pub fn led_byte(status: &StatusSnapshot) -> u8 {
    let mut byte = 0xFF;
    // Power LED is lit whenever the amplifier answers
    byte &= !0x04;
    if status.is_operate() {
        byte &= !0x10;
    }
    if status.is_transmit() {
        byte &= !0x08;
    }
    if status.alarm != b'N' {
        byte &= !0x80;
    }
    byte
}

/// Render the screen image for `status`
pub fn render_panel(status: &StatusSnapshot) -> [u8; SCREEN_PAYLOAD_LEN] {
    let mut panel = Panel::new(led_byte(status));

    let name = status.amp_name().unwrap_or_else(|| "??".to_string());
    panel.write(0, 1, &format!("EXPERT {name}"));

    let mode = if status.is_operate() { "OPERATE" } else { "STANDBY" };
    panel.write(MODE_LINE, 1, mode);
    panel.reverse(MODE_LINE, 1..1 + mode.len());
    if status.is_transmit() {
        panel.write(MODE_LINE, 33, "TX");
        panel.reverse(MODE_LINE, 33..35);
    }

    let band = status
        .band_meters()
        .map(|m| format!("{m}m"))
        .unwrap_or_else(|| "--".to_string());
    panel.write(
        3,
        1,
        &format!(
            "BAND {band:>4}  ANT {}  IN {}",
            char::from(status.tx_antenna),
            char::from(status.input)
        ),
    );
    panel.write(
        4,
        1,
        &format!(
            "PWR {}  OUT {:>4}W",
            char::from(status.power_level),
            status.output_power
        ),
    );
    panel.write(
        5,
        1,
        &format!(
            "SWR {:.2}  ATU {:.2}",
            status.swr_antenna_ratio(),
            status.swr_atu_ratio()
        ),
    );
    panel.write(
        6,
        1,
        &format!(
            "{:.1}V {:.1}A {}°C",
            status.pa_voltage_volts(),
            status.pa_current_amps(),
            status.temp_upper
        ),
    );

    if status.alarm != b'N' {
        panel.write(7, 1, status.alarm().description());
        panel.reverse(7, 0..COLUMNS);
    } else if status.warning != b'N' {
        panel.write(7, 1, status.warning().description());
    }

    panel.image
}

#[cfg(test)]
mod tests {
    use super::*;
    use spe_protocol::ScreenSnapshot;

    fn standby_status() -> StatusSnapshot {
        StatusSnapshot {
            amp_id: b'3',
            band: 5,
            pa_voltage: 487,
            temp_upper: 31,
            ..StatusSnapshot::default()
        }
    }

    #[test]
    fn test_char_code_inverts_glyph_table() {
        assert_eq!(char_code('A'), 0x21);
        assert_eq!(char_code(' '), 0x00);
        assert_eq!(char_code('°'), 0xAA);
        assert_eq!(char_code('€'), 0x00);
        for ch in "EXPERT 1.3K-FA".chars() {
            assert_eq!(GLYPHS[usize::from(char_code(ch))], ch);
        }
    }

    #[test]
    fn test_rendered_panel_decodes() {
        let screen = ScreenSnapshot::from_payload(&render_panel(&standby_status()));

        assert!(screen.lines[0].text().starts_with(" EXPERT 1.3K-FA"));
        assert!(screen.lines[3].text().contains("20m"));
        assert!(screen.lines[6].text().contains("48.7V"));

        let mode: Vec<_> = screen.lines[MODE_LINE].spans().collect();
        assert_eq!(mode[1], ("STANDBY", true));
    }

    #[test]
    fn test_led_byte_tracks_state() {
        let mut status = standby_status();
        let leds = ScreenSnapshot::from_payload(&render_panel(&status)).leds();
        assert!(leds.power);
        assert!(!leds.operate);
        assert!(!leds.alarm);

        status.standby_operate = b'O';
        status.receive_transmit = b'T';
        status.alarm = b'H';
        let leds = ScreenSnapshot::from_payload(&render_panel(&status)).leds();
        assert!(leds.operate);
        assert!(leds.transmit);
        assert!(leds.alarm);
    }
}
