//! Decoding of the DP5's fixed 64-byte status block, and the
//! preset-dependent busy decision derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::acquisition::PresetConfig;
use crate::constants::STATUS_SIZE;
use crate::error::DeviceError;

// Byte offsets into the status block.
const OFF_FAST_COUNTS: usize = 0;
const OFF_SLOW_COUNTS: usize = 4;
const OFF_GP_COUNTER: usize = 8;
const OFF_ACC_TIME_MS: usize = 12;
const OFF_REAL_TIME_MS: usize = 20;
const OFF_HIGH_VOLTAGE: usize = 30;
const OFF_TEMP_HI: usize = 32;
const OFF_TEMP_LO: usize = 33;
const OFF_STATUS_FLAGS: usize = 35;

// Bits of the status flags byte.
/// Acquisition-active gate: clear means the MCA is disabled.
const FLAG_MCA_ENABLED: u8 = 0x20;
/// Real-time preset reached.
const FLAG_PRESET_REAL_DONE: u8 = 0x80;
/// Count preset reached.
const FLAG_PRESET_COUNT_DONE: u8 = 0x10;

/// One decoded status block. An owned value produced fresh on every
/// status request; nothing is cached between calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub fast_counts: u32,
    pub slow_counts: u32,
    pub general_purpose_counter: u32,
    /// Accumulation (live) time in seconds.
    pub accumulation_time_s: f64,
    /// Elapsed real time in seconds.
    pub real_time_s: f64,
    /// Detector high voltage in volts.
    pub high_voltage: f64,
    /// Detector temperature, 0.5-unit steps from the 12-bit register.
    pub temperature: f64,
    /// Raw acquisition/preset flags byte (offset 35).
    pub status_byte35: u8,
}

fn u32_le(raw: &[u8; STATUS_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], raw[offset + 3]])
}

impl StatusSnapshot {
    /// Decode the raw 64-byte status payload.
    pub fn decode(raw: &[u8; STATUS_SIZE]) -> Self {
        let acc_ms = u32_le(raw, OFF_ACC_TIME_MS);
        let real_ms = u32_le(raw, OFF_REAL_TIME_MS);
        let hv_raw = u16::from_le_bytes([raw[OFF_HIGH_VOLTAGE], raw[OFF_HIGH_VOLTAGE + 1]]);
        let temp_raw = (u16::from(raw[OFF_TEMP_HI] & 0x0F) << 8) | u16::from(raw[OFF_TEMP_LO]);

        StatusSnapshot {
            fast_counts: u32_le(raw, OFF_FAST_COUNTS),
            slow_counts: u32_le(raw, OFF_SLOW_COUNTS),
            general_purpose_counter: u32_le(raw, OFF_GP_COUNTER),
            accumulation_time_s: f64::from(acc_ms) * 0.001,
            real_time_s: f64::from(real_ms) * 0.001,
            high_voltage: f64::from(hv_raw) * 0.5,
            temperature: f64::from(temp_raw) * 0.5,
            status_byte35: raw[OFF_STATUS_FLAGS],
        }
    }

    /// Busy decision for this snapshot under the given preset.
    pub fn busy_for(&self, preset: &PresetConfig) -> Result<bool, DeviceError> {
        busy_for_preset(preset, self.status_byte35)
    }
}

/// Whether the device is still acquiring under `preset`, from the raw
/// status flags byte.
///
/// The acquisition-active bit (0x20) gates everything: when it is clear
/// the MCA is disabled and never busy. While it is set, the
/// mode-specific preset-reached bit (0x80 for real-time, 0x10 for
/// count) decides whether the preset has completed.
pub fn busy_for_preset(preset: &PresetConfig, status_byte35: u8) -> Result<bool, DeviceError> {
    if status_byte35 & FLAG_MCA_ENABLED == 0 {
        return Ok(false);
    }
    match preset {
        PresetConfig::RealTime(_) => Ok(status_byte35 & FLAG_PRESET_REAL_DONE == 0),
        PresetConfig::Count(_) => Ok(status_byte35 & FLAG_PRESET_COUNT_DONE == 0),
        PresetConfig::LiveTime(_) => Err(DeviceError::UnsupportedPreset),
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fast: {}, slow: {}, real: {:.3} s, acc: {:.3} s, HV: {:.1} V, temp: {:.1}, flags: {:#04x}",
            self.fast_counts,
            self.slow_counts,
            self.real_time_s,
            self.accumulation_time_s,
            self.high_voltage,
            self.temperature,
            self.status_byte35
        )
    }
}
