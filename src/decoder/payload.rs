/// Arduino particulate-matter sensor payload decoding
use crate::error::DecodeError;
use crate::models::MessageData;
use crate::utils::round_to;

// Payload layout constants
const PAYLOAD_HEX_LEN: usize = 24; // 12 byte Sigfox uplink
const FIELDS_HEX_LEN: usize = 20; // five 16-bit fields, the last word is padding

const TEMP_RANGE: (f64, f64) = (-60.0, 60.0); // °C
const HUMID_MAX: f64 = 110.0; // %
const PM_RANGE: (f64, f64) = (1.0, 100.0); // µg/m³

/// Decode the 12 byte Arduino PM payload, given as 24 hex characters
///
/// The firmware packs five 16-bit words, each little-endian:
/// - Word 0: Temperature (signed, scaled to -60..60 °C)
/// - Word 1: Relative humidity (unsigned, scaled to 0..110 %)
/// - Word 2: PM1 (signed, scaled to 1..100 µg/m³)
/// - Word 3: PM2.5 (signed, scaled to 1..100 µg/m³)
/// - Word 4: PM10 (signed, scaled to 1..100 µg/m³)
/// - Word 5: Padding (ignored)
///
/// Every value is rounded to 2 decimal places.
pub fn decode_arduino_pm_hex(hex_string: &str) -> Result<MessageData, DecodeError> {
    let bytes = hex_string.as_bytes();
    if bytes.len() != PAYLOAD_HEX_LEN {
        return Err(DecodeError::Length {
            expected: PAYLOAD_HEX_LEN,
            actual: bytes.len(),
        });
    }

    let fields = hex::decode(&bytes[..FIELDS_HEX_LEN])?;
    let word = |index: usize| [fields[index * 2], fields[index * 2 + 1]];

    Ok(MessageData {
        temp: Some(round_to(
            int16_to_float(i16::from_le_bytes(word(0)), TEMP_RANGE),
            2,
        )),
        humid: Some(round_to(
            uint16_to_float(u16::from_le_bytes(word(1)), HUMID_MAX),
            2,
        )),
        pm1: Some(round_to(
            int16_to_float(i16::from_le_bytes(word(2)), PM_RANGE),
            2,
        )),
        pm2p5: Some(round_to(
            int16_to_float(i16::from_le_bytes(word(3)), PM_RANGE),
            2,
        )),
        pm10: Some(round_to(
            int16_to_float(i16::from_le_bytes(word(4)), PM_RANGE),
            2,
        )),
    })
}

fn int16_to_float(value: i16, (min, max): (f64, f64)) -> f64 {
    let conversion_factor = 32768.0 / (max - min);
    f64::from(value) / conversion_factor
}

fn uint16_to_float(value: u16, max: f64) -> f64 {
    let conversion_factor = 65536.0 / max;
    f64::from(value) / conversion_factor
}
