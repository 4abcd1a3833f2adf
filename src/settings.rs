// src/settings.rs
//
// Persisted analyzer settings: a whitespace-separated token archive
// opening with a type tag, readable across versions. Older saves carry
// fewer trailing fields; loading tolerates that by keeping defaults.

use alloc::format;
use alloc::string::String;
use core::str::SplitWhitespace;

use crate::common::types::{Mode, ParityAndStopbits};

/// Type tag written at the head of every archive.
pub const SETTINGS_TAG: &str = "ModbusAnalyzerSettings";
/// Tag written by historical releases; accepted on load.
pub const LEGACY_SETTINGS_TAG: &str = "SaleaeAsyncModbusAnalyzer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The archive belongs to some other analyzer.
    #[error("Settings archive does not belong to this analyzer")]
    UnrecognizedTag,

    /// A field was present but not parseable as its expected type.
    #[error("Invalid value for settings field '{0}'")]
    InvalidField(&'static str),
}

/// User-facing settings, as persisted between sessions.
///
/// `bits_per_transfer` and the shift order are fixed by the protocol
/// (8-bit characters, LSB first) and are not part of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerSettings {
    /// Index of the capture channel carrying the serial line.
    pub input_channel: u32,
    pub bit_rate: u32,
    pub inverted: bool,
    pub assume_starts_with_response: bool,
    pub mode: Mode,
    pub parity_and_stop: ParityAndStopbits,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            input_channel: 0,
            bit_rate: 9600,
            inverted: false,
            assume_starts_with_response: false,
            mode: Mode::RtuClient,
            parity_and_stop: ParityAndStopbits::EvenOne,
        }
    }
}

impl AnalyzerSettings {
    /// Serializes the settings. Field order is part of the format:
    /// channel, bit rate, inversion, response-first flag, mode, parity.
    pub fn save(&self) -> String {
        format!(
            "{} {} {} {} {} {} {}",
            SETTINGS_TAG,
            self.input_channel,
            self.bit_rate,
            u32::from(self.inverted),
            u32::from(self.assume_starts_with_response),
            self.mode as u32,
            self.parity_and_stop as u32,
        )
    }

    /// Parses an archive produced by `save` or by an older release.
    ///
    /// Fields missing from the tail of the archive keep their defaults;
    /// a field that is present but malformed is an error.
    pub fn load(archive: &str) -> Result<Self, SettingsError> {
        let mut tokens = archive.split_whitespace();
        match tokens.next() {
            Some(SETTINGS_TAG) | Some(LEGACY_SETTINGS_TAG) => {}
            _ => return Err(SettingsError::UnrecognizedTag),
        }

        let mut settings = Self::default();
        if let Some(value) = next_u32(&mut tokens, "input_channel")? {
            settings.input_channel = value;
        }
        if let Some(value) = next_u32(&mut tokens, "bit_rate")? {
            settings.bit_rate = value;
        }
        if let Some(value) = next_u32(&mut tokens, "inverted")? {
            settings.inverted = value != 0;
        }
        if let Some(value) = next_u32(&mut tokens, "assume_starts_with_response")? {
            settings.assume_starts_with_response = value != 0;
        }
        if let Some(value) = next_u32(&mut tokens, "mode")? {
            settings.mode = Mode::from_u32(value).ok_or(SettingsError::InvalidField("mode"))?;
        }
        if let Some(value) = next_u32(&mut tokens, "parity_and_stop")? {
            settings.parity_and_stop = ParityAndStopbits::from_u32(value)
                .ok_or(SettingsError::InvalidField("parity_and_stop"))?;
        }
        Ok(settings)
    }
}

fn next_u32(
    tokens: &mut SplitWhitespace<'_>,
    field: &'static str,
) -> Result<Option<u32>, SettingsError> {
    match tokens.next() {
        None => Ok(None),
        Some(token) => token
            .parse::<u32>()
            .map(Some)
            .map_err(|_| SettingsError::InvalidField(field)),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_load_roundtrip() {
        let settings = AnalyzerSettings {
            input_channel: 3,
            bit_rate: 19200,
            inverted: true,
            assume_starts_with_response: true,
            mode: Mode::AsciiBoth,
            parity_and_stop: ParityAndStopbits::NoneTwo,
        };
        assert_eq!(AnalyzerSettings::load(&settings.save()), Ok(settings));
    }

    #[test]
    fn save_emits_the_documented_field_order() {
        let archive = AnalyzerSettings::default().save();
        assert_eq!(archive, "ModbusAnalyzerSettings 0 9600 0 0 0 1");
    }

    #[test]
    fn legacy_tag_is_accepted() {
        let loaded =
            AnalyzerSettings::load("SaleaeAsyncModbusAnalyzer 1 115200 0 0 4 3").unwrap();
        assert_eq!(loaded.input_channel, 1);
        assert_eq!(loaded.bit_rate, 115_200);
        assert_eq!(loaded.mode, Mode::RtuBoth);
        assert_eq!(loaded.parity_and_stop, ParityAndStopbits::NoneOne);
    }

    #[test]
    fn foreign_tag_is_rejected() {
        assert_eq!(
            AnalyzerSettings::load("SomeOtherAnalyzer 0 9600"),
            Err(SettingsError::UnrecognizedTag)
        );
        assert_eq!(
            AnalyzerSettings::load(""),
            Err(SettingsError::UnrecognizedTag)
        );
    }

    #[test]
    fn truncated_archive_keeps_defaults_for_missing_fields() {
        // An older save that stops after the bit rate.
        let loaded = AnalyzerSettings::load("ModbusAnalyzerSettings 2 4800").unwrap();
        assert_eq!(loaded.input_channel, 2);
        assert_eq!(loaded.bit_rate, 4800);
        assert!(!loaded.inverted);
        assert_eq!(loaded.mode, Mode::RtuClient);
        assert_eq!(loaded.parity_and_stop, ParityAndStopbits::EvenOne);
    }

    #[test]
    fn malformed_field_is_an_error() {
        assert_eq!(
            AnalyzerSettings::load("ModbusAnalyzerSettings 0 fast"),
            Err(SettingsError::InvalidField("bit_rate"))
        );
        assert_eq!(
            AnalyzerSettings::load("ModbusAnalyzerSettings 0 9600 0 0 9"),
            Err(SettingsError::InvalidField("mode"))
        );
    }
}
