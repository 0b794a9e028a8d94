//! Status record interpretation
//!
//! The amplifier answers a status poll with a 67-byte comma-separated ASCII
//! record. Fields sit at fixed offsets:
//!
//! ```text
//! ,13K,S,R,x,1,00,1a,0r,L,0000, 0.00, 0.00, 0.0, 0.0, 33,  0,  0,N,N,
//!   ^  ^ ^ ^ ^ ^^ ^^ ^  ^ ^^^^ ^^^^^ ^^^^^ ^^^^ ^^^^ ^^^ ^^^ ^^^ ^ ^
//!   id | | | | |  |  |  | pwr  swr   swr   V    I    temps     w a
//!      | | | | band  |  power  atu   ant
//!      | | | input   rx ant
//!      | | memory bank
//!      | rx/tx, standby/operate
//! ```
//!
//! Numeric fields are decoded digit by digit, ignoring spaces and decimal
//! points, so `" 1.25"` reads as `125`.

use std::fmt;

use crate::error::ProtocolError;
use crate::STATUS_PAYLOAD_LEN;

const AMP_ID: usize = 2;
const STANDBY_OPERATE: usize = 5;
const RECEIVE_TRANSMIT: usize = 7;
const MEMORY_BANK: usize = 9;
const INPUT: usize = 11;
const BAND: (usize, usize) = (13, 2);
const TX_ANTENNA: usize = 16;
const ATU_STATUS: usize = 17;
const RX_ANTENNA: usize = 19;
const POWER_LEVEL: usize = 22;
const OUTPUT_POWER: (usize, usize) = (24, 4);
const SWR_ATU: (usize, usize) = (29, 5);
const SWR_ANTENNA: (usize, usize) = (35, 5);
const PA_VOLTAGE: (usize, usize) = (41, 4);
const PA_CURRENT: (usize, usize) = (46, 4);
const TEMP_UPPER: (usize, usize) = (51, 3);
const TEMP_LOWER: (usize, usize) = (55, 3);
const TEMP_COMBINER: (usize, usize) = (59, 3);
const WARNING: usize = 63;
const ALARM: usize = 65;

/// Field separator positions in an encoded record
const SEPARATORS: [usize; 20] = [
    0, 4, 6, 8, 10, 12, 15, 18, 21, 23, 28, 34, 40, 45, 50, 54, 58, 62, 64, 66,
];

/// Band index → band in meters
pub const BANDS_METERS: [u8; 12] = [160, 80, 60, 40, 30, 20, 17, 15, 12, 10, 6, 4];

/// Decode a fixed-width numeric field
///
/// Spaces and periods are skipped; every other byte is taken as an ASCII
/// digit. Non-digit bytes wrap rather than fail, so malformed records still
/// produce a value.
fn decode_number(record: &[u8], (start, len): (usize, usize)) -> u16 {
    record[start..start + len]
        .iter()
        .filter(|&&b| b != b' ' && b != b'.')
        .fold(0u16, |sum, &b| {
            sum.wrapping_mul(10)
                .wrapping_add(u16::from(b.wrapping_sub(b'0')))
        })
}

/// Write `text` right-aligned into a fixed-width field
fn encode_field(record: &mut [u8], (start, len): (usize, usize), text: &str) {
    let bytes = text.as_bytes();
    let field = &mut record[start..start + len];
    field.fill(b' ');
    let take = bytes.len().min(len);
    field[len - take..].copy_from_slice(&bytes[bytes.len() - take..]);
}

/// SPE Expert amplifier model, identified by the status record's id byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AmpModel {
    /// Expert 1.3K-FA
    Expert1_3K,
    /// Expert 1.5K-FA
    Expert1_5K,
    /// Expert 2K-FA
    Expert2K,
}

impl AmpModel {
    /// Look up a model by its id byte
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            b'3' => Some(Self::Expert1_3K),
            b'5' => Some(Self::Expert1_5K),
            b'0' => Some(Self::Expert2K),
            _ => None,
        }
    }

    /// Id byte reported in the status record
    pub fn id(self) -> u8 {
        match self {
            Self::Expert1_3K => b'3',
            Self::Expert1_5K => b'5',
            Self::Expert2K => b'0',
        }
    }

    /// Power class as printed on the front panel
    pub fn name(self) -> &'static str {
        match self {
            Self::Expert1_3K => "1.3K",
            Self::Expert1_5K => "1.5K",
            Self::Expert2K => "2K",
        }
    }
}

/// Warning condition reported in the status record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Warning {
    AlarmAmplifier,
    NoSelectedAntenna,
    SwrAntenna,
    NoValidBand,
    PowerLimitExceeded,
    Overheating,
    AtuNotAvailable,
    TuningWithNoPower,
    AtuBypassed,
    PowerSwitchHeldByRemote,
    CombinerOverheating,
    CombinerFault,
    None,
    /// Code not in the documented set
    Unknown(u8),
}

impl Warning {
    /// Interpret a warning code byte
    pub fn from_code(code: u8) -> Self {
        match code {
            b'M' => Self::AlarmAmplifier,
            b'A' => Self::NoSelectedAntenna,
            b'S' => Self::SwrAntenna,
            b'B' => Self::NoValidBand,
            b'P' => Self::PowerLimitExceeded,
            b'O' => Self::Overheating,
            b'Y' => Self::AtuNotAvailable,
            b'W' => Self::TuningWithNoPower,
            b'K' => Self::AtuBypassed,
            b'R' => Self::PowerSwitchHeldByRemote,
            b'T' => Self::CombinerOverheating,
            b'C' => Self::CombinerFault,
            b'N' => Self::None,
            other => Self::Unknown(other),
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::AlarmAmplifier => "Alarm Amplifier",
            Self::NoSelectedAntenna => "No Selected Antenna",
            Self::SwrAntenna => "SWR Antenna",
            Self::NoValidBand => "No Valid Band",
            Self::PowerLimitExceeded => "Power Limit Exceeded",
            Self::Overheating => "Overheating",
            Self::AtuNotAvailable => "ATU Not Available",
            Self::TuningWithNoPower => "Tuning with No Power",
            Self::AtuBypassed => "ATU Bypassed",
            Self::PowerSwitchHeldByRemote => "Power Switch Held by Remote",
            Self::CombinerOverheating => "Combiner Overheating",
            Self::CombinerFault => "Combiner Fault",
            Self::None => "No Warnings",
            Self::Unknown(_) => "Unknown Warning",
        }
    }
}

/// Alarm condition reported in the status record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alarm {
    SwrExceedingLimits,
    AmplifierProtection,
    InputOverdriving,
    ExcessOverheating,
    CombinerFault,
    None,
    /// Code not in the documented set
    Unknown(u8),
}

impl Alarm {
    /// Interpret an alarm code byte
    pub fn from_code(code: u8) -> Self {
        match code {
            b'S' => Self::SwrExceedingLimits,
            b'A' => Self::AmplifierProtection,
            b'D' => Self::InputOverdriving,
            b'H' => Self::ExcessOverheating,
            b'C' => Self::CombinerFault,
            b'N' => Self::None,
            other => Self::Unknown(other),
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::SwrExceedingLimits => "SWR Exceeding Limits",
            Self::AmplifierProtection => "Amplifier Protection",
            Self::InputOverdriving => "Input Overdriving",
            Self::ExcessOverheating => "Excess Overheating",
            Self::CombinerFault => "Combiner Fault",
            Self::None => "No Alarms",
            Self::Unknown(_) => "Unknown Alarm",
        }
    }
}

/// Amplifier state decoded from one status record
///
/// Character fields keep the raw byte the amplifier sent; accessor methods
/// give typed views of them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusSnapshot {
    /// Model id byte (`'3'`, `'5'` or `'0'`)
    pub amp_id: u8,
    /// `'S'` standby or `'O'` operate
    pub standby_operate: u8,
    /// `'R'` receive or `'T'` transmit
    pub receive_transmit: u8,
    /// Memory bank (`'A'`, `'B'`, or `'x'` when none)
    pub memory_bank: u8,
    /// Selected input (`'1'` or `'2'`)
    pub input: u8,
    /// Band index, see [`BANDS_METERS`]
    pub band: u8,
    /// Transmit antenna
    pub tx_antenna: u8,
    /// ATU status character
    pub atu_status: u8,
    /// Receive antenna
    pub rx_antenna: u8,
    /// Power level selector (`'L'`, `'M'`, `'H'`)
    pub power_level: u8,
    /// Output power in watts
    pub output_power: u16,
    /// ATU SWR × 100
    pub swr_atu: u16,
    /// Antenna SWR × 100
    pub swr_antenna: u16,
    /// PA supply voltage × 10
    pub pa_voltage: u16,
    /// PA current × 10
    pub pa_current: u16,
    /// Upper heatsink temperature
    pub temp_upper: u16,
    /// Lower heatsink temperature
    pub temp_lower: u16,
    /// Combiner temperature
    pub temp_combiner: u16,
    /// Warning code byte
    pub warning: u8,
    /// Alarm code byte
    pub alarm: u8,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            amp_id: b'0',
            standby_operate: b'S',
            receive_transmit: b'R',
            memory_bank: b'x',
            input: b'1',
            band: 0,
            tx_antenna: b'1',
            atu_status: b'a',
            rx_antenna: b'0',
            power_level: b'L',
            output_power: 0,
            swr_atu: 1,
            swr_antenna: 1,
            pa_voltage: 0,
            pa_current: 0,
            temp_upper: 0,
            temp_lower: 0,
            temp_combiner: 0,
            warning: b'N',
            alarm: b'N',
        }
    }
}

impl StatusSnapshot {
    /// Interpret a validated status record
    pub fn from_payload(record: &[u8; STATUS_PAYLOAD_LEN]) -> Self {
        Self {
            amp_id: record[AMP_ID],
            standby_operate: record[STANDBY_OPERATE],
            receive_transmit: record[RECEIVE_TRANSMIT],
            memory_bank: record[MEMORY_BANK],
            input: record[INPUT],
            band: decode_number(record, BAND) as u8,
            tx_antenna: record[TX_ANTENNA],
            atu_status: record[ATU_STATUS],
            rx_antenna: record[RX_ANTENNA],
            power_level: record[POWER_LEVEL],
            output_power: decode_number(record, OUTPUT_POWER),
            swr_atu: decode_number(record, SWR_ATU),
            swr_antenna: decode_number(record, SWR_ANTENNA),
            pa_voltage: decode_number(record, PA_VOLTAGE),
            pa_current: decode_number(record, PA_CURRENT),
            temp_upper: decode_number(record, TEMP_UPPER),
            temp_lower: decode_number(record, TEMP_LOWER),
            temp_combiner: decode_number(record, TEMP_COMBINER),
            warning: record[WARNING],
            alarm: record[ALARM],
        }
    }

    /// Interpret a status record from a slice of unchecked length
    pub fn from_slice(record: &[u8]) -> Result<Self, ProtocolError> {
        let record: &[u8; STATUS_PAYLOAD_LEN] =
            record.try_into().map_err(|_| ProtocolError::PayloadLength {
                kind: "status",
                expected: STATUS_PAYLOAD_LEN,
                actual: record.len(),
            })?;
        Ok(Self::from_payload(record))
    }

    /// Encode this snapshot as the record the amplifier would send
    ///
    /// Numeric fields wider than their column are truncated to the low
    /// digits.
    pub fn to_payload(&self) -> [u8; STATUS_PAYLOAD_LEN] {
        let mut record = [b' '; STATUS_PAYLOAD_LEN];
        for pos in SEPARATORS {
            record[pos] = b',';
        }

        record[AMP_ID - 1] = if self.amp_id == b'0' { b'2' } else { b'1' };
        record[AMP_ID] = self.amp_id;
        record[AMP_ID + 1] = b'K';
        record[STANDBY_OPERATE] = self.standby_operate;
        record[RECEIVE_TRANSMIT] = self.receive_transmit;
        record[MEMORY_BANK] = self.memory_bank;
        record[INPUT] = self.input;
        encode_field(&mut record, BAND, &format!("{:02}", self.band));
        record[TX_ANTENNA] = self.tx_antenna;
        record[ATU_STATUS] = self.atu_status;
        record[RX_ANTENNA] = self.rx_antenna;
        record[RX_ANTENNA + 1] = b'r';
        record[POWER_LEVEL] = self.power_level;
        encode_field(&mut record, OUTPUT_POWER, &format!("{:04}", self.output_power));
        encode_field(&mut record, SWR_ATU, &hundredths(self.swr_atu));
        encode_field(&mut record, SWR_ANTENNA, &hundredths(self.swr_antenna));
        encode_field(&mut record, PA_VOLTAGE, &tenths(self.pa_voltage));
        encode_field(&mut record, PA_CURRENT, &tenths(self.pa_current));
        encode_field(&mut record, TEMP_UPPER, &self.temp_upper.to_string());
        encode_field(&mut record, TEMP_LOWER, &self.temp_lower.to_string());
        encode_field(&mut record, TEMP_COMBINER, &self.temp_combiner.to_string());
        record[WARNING] = self.warning;
        record[ALARM] = self.alarm;
        record
    }

    /// Amplifier model, if the id byte is known
    pub fn model(&self) -> Option<AmpModel> {
        AmpModel::from_id(self.amp_id)
    }

    /// Full model name, e.g. `"1.3K-FA"`
    pub fn amp_name(&self) -> Option<String> {
        self.model().map(|m| format!("{}-FA", m.name()))
    }

    pub fn is_operate(&self) -> bool {
        self.standby_operate == b'O'
    }

    pub fn is_transmit(&self) -> bool {
        self.receive_transmit == b'T'
    }

    /// Current band in meters
    pub fn band_meters(&self) -> Option<u8> {
        BANDS_METERS.get(usize::from(self.band)).copied()
    }

    pub fn warning(&self) -> Warning {
        Warning::from_code(self.warning)
    }

    pub fn alarm(&self) -> Alarm {
        Alarm::from_code(self.alarm)
    }

    /// PA current in amperes
    pub fn pa_current_amps(&self) -> f32 {
        f32::from(self.pa_current) * 0.1
    }

    /// PA supply voltage in volts
    pub fn pa_voltage_volts(&self) -> f32 {
        f32::from(self.pa_voltage) * 0.1
    }

    /// ATU SWR as a ratio
    pub fn swr_atu_ratio(&self) -> f32 {
        f32::from(self.swr_atu) * 0.01
    }

    /// Antenna SWR as a ratio
    pub fn swr_antenna_ratio(&self) -> f32 {
        f32::from(self.swr_antenna) * 0.01
    }
}

fn hundredths(value: u16) -> String {
    format!("{}.{:02}", value / 100, value % 100)
}

fn tenths(value: u16) -> String {
    format!("{}.{}", value / 10, value % 10)
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amp_name() {
            Some(name) => write!(f, "{name}")?,
            None => write!(f, "unknown amp (id 0x{:02X})", self.amp_id)?,
        }
        write!(
            f,
            " {} {}",
            if self.is_operate() { "OPERATE" } else { "STANDBY" },
            if self.is_transmit() { "TX" } else { "RX" },
        )?;
        match self.band_meters() {
            Some(m) => write!(f, " {m}m")?,
            None => write!(f, " band?")?,
        }
        write!(
            f,
            " pwr={}({}) out={}W swr={:.2}/{:.2} {:.1}V {:.1}A temp={}/{}/{} warn={} alarm={}",
            self.power_level as char,
            self.input as char,
            self.output_power,
            self.swr_atu_ratio(),
            self.swr_antenna_ratio(),
            self.pa_voltage_volts(),
            self.pa_current_amps(),
            self.temp_upper,
            self.temp_lower,
            self.temp_combiner,
            self.warning().description(),
            self.alarm().description(),
        )
    }
}
