//! Tests for status block decoding and the preset busy table

mod common;

use common::*;
use dp5mca::busy_for_preset;

#[test]
fn test_status_field_extraction() {
    let raw: [u8; STATUS_SIZE] = status_payload(0x20).try_into().unwrap();
    let status = StatusSnapshot::decode(&raw);

    assert_eq!(status.fast_counts, 1234);
    assert_eq!(status.slow_counts, 56789);
    assert_eq!(status.general_purpose_counter, 42);
    assert!((status.accumulation_time_s - 1.5).abs() < 1e-9);
    assert!((status.real_time_s - 2.5).abs() < 1e-9);
    assert!((status.high_voltage - 495.0).abs() < 1e-9);
    assert_eq!(status.status_byte35, 0x20);
}

#[test]
fn test_temperature_masks_the_high_nibble() {
    // Byte 32 carries unrelated flags in its upper nibble; only the low
    // four bits belong to the 12-bit temperature register.
    let raw: [u8; STATUS_SIZE] = status_payload(0).try_into().unwrap();
    let status = StatusSnapshot::decode(&raw);
    // 0xA1 & 0x0F = 0x1, so raw temp = 0x1F4 = 500, scaled by 0.5
    assert!((status.temperature - 250.0).abs() < 1e-9);
}

#[test]
fn test_busy_table_real_time() {
    let preset = PresetConfig::RealTime(2.5);
    assert_eq!(busy_for_preset(&preset, 0x00).unwrap(), false);
    assert_eq!(busy_for_preset(&preset, 0x20).unwrap(), true);
    assert_eq!(busy_for_preset(&preset, 0xA0).unwrap(), false);
    // Preset-reached bit alone, with the enable gate clear: not busy
    assert_eq!(busy_for_preset(&preset, 0x80).unwrap(), false);
    // The count-done bit does not complete a real-time preset
    assert_eq!(busy_for_preset(&preset, 0x30).unwrap(), true);
}

#[test]
fn test_busy_table_count() {
    let preset = PresetConfig::Count(100_000);
    assert_eq!(busy_for_preset(&preset, 0x00).unwrap(), false);
    assert_eq!(busy_for_preset(&preset, 0x20).unwrap(), true);
    assert_eq!(busy_for_preset(&preset, 0x30).unwrap(), false);
    assert_eq!(busy_for_preset(&preset, 0x10).unwrap(), false);
    // The real-time-done bit does not complete a count preset
    assert_eq!(busy_for_preset(&preset, 0xA0).unwrap(), true);
}

#[test]
fn test_busy_rejects_live_time_preset() {
    let preset = PresetConfig::LiveTime(10.0);
    for byte in [0x00, 0x20, 0xA0, 0x30] {
        assert!(matches!(
            busy_for_preset(&preset, byte),
            Err(DeviceError::UnsupportedPreset)
        ));
    }
}

#[test]
fn test_snapshot_busy_for_delegates_to_the_table() {
    let raw: [u8; STATUS_SIZE] = status_payload(0x20).try_into().unwrap();
    let status = StatusSnapshot::decode(&raw);
    assert!(status.busy_for(&PresetConfig::RealTime(1.0)).unwrap());
    assert!(status.busy_for(&PresetConfig::Count(10)).unwrap());
}
