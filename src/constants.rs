// Protocol constants for the Amptek DP5 wire format

/// First sync byte of every DP5 frame
pub const SYNC1: u8 = 0xF5;

/// Second sync byte of every DP5 frame
pub const SYNC2: u8 = 0xFA;

/// Size of the frame header: sync(2) + pid1 + pid2 + length(2)
pub const HEADER_SIZE: usize = 6;

/// Size of the trailing 16-bit checksum
pub const CHECKSUM_SIZE: usize = 2;

/// Smallest valid frame (header plus checksum, empty payload)
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload the device will accept in a single request
pub const MAX_WRITE_PAYLOAD: usize = 512;

/// Largest payload the device can return in a single response
pub const MAX_READ_PAYLOAD: usize = 32767;

/// PID pair of the ASCII configuration envelope
pub const PID_ASCII_COMMAND: (u8, u8) = (0x20, 0x02);

/// PID pair requesting the 64-byte status block
pub const PID_REQUEST_STATUS: (u8, u8) = (0x01, 0x01);

/// PID pair requesting the packed spectrum buffer
pub const PID_REQUEST_SPECTRUM: (u8, u8) = (0x02, 0x01);

/// PID pair clearing the accumulated spectrum and counters
pub const PID_MCA_CLEAR: (u8, u8) = (0xF0, 0x01);

/// PID pair enabling (arming) the MCA
pub const PID_MCA_ENABLE: (u8, u8) = (0xF0, 0x02);

/// PID pair disabling (stopping) the MCA
pub const PID_MCA_DISABLE: (u8, u8) = (0xF0, 0x03);

/// Size of the status response payload
pub const STATUS_SIZE: usize = 64;

/// Bytes per spectrum channel on the wire (24-bit packed)
pub const BYTES_PER_CHANNEL: usize = 3;

/// Largest channel count the hardware supports
pub const MAX_CHANNELS: usize = 8192;

/// Upper bound applied to ASCII response text before conversion
pub const MAX_ASCII_RESPONSE: usize = 256;
