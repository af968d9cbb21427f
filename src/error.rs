use thiserror::Error;

use crate::transport::TransportKind;

/// Framing-level failures: a frame that does not satisfy the DP5 wire
/// format invariants.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("checksum mismatch: computed {computed:#06x}, frame carries {received:#06x}")]
    ChecksumMismatch { computed: u16, received: u16 },

    #[error("length mismatch: expected a {expected}-byte frame, got {actual} bytes")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("payload too large: {len} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Failures moving bytes to or from the device.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("DP5 device not found. Is it connected and powered?")]
    DeviceNotFound,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("timeout waiting for the device: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("{0} transport is not supported")]
    Unsupported(TransportKind),
}

/// Failures at the acquisition layer: requests the device (or this
/// driver) cannot honor.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("illegal channel count {0}: must be one of 256, 512, 1024, 2048, 4096, 8192")]
    IllegalChannelCount(u32),

    #[error("preset kind is not supported by the DP5 firmware")]
    UnsupportedPreset,

    #[error("parameter {0:?} is not a preset this driver can set")]
    IllegalPresetType(String),

    #[error("could not parse device response {0:?}")]
    UnparseableResponse(String),
}

/// The primary error type for the `dp5mca` library.
#[derive(Error, Debug)]
pub enum Dp5Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}
