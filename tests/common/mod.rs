//! Common test utilities and shared fixtures

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use dp5mca::constants::STATUS_SIZE;
#[allow(unused_imports)]
pub use dp5mca::error::{DeviceError, Dp5Error, ProtocolError, TransportError};
#[allow(unused_imports)]
pub use dp5mca::packet::{checksum, encode, Packet};
#[allow(unused_imports)]
pub use dp5mca::{
    AcquisitionState, ChannelCount, Dp5Device, Dp5Mca, Mca, PresetConfig, StatusSnapshot,
    TransportChannel, TransportKind,
};

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

/// Encoded frame the device answers with when a command carries no data
#[allow(dead_code)]
pub fn ack_frame() -> Vec<u8> {
    encode(0xFF, 0x00, &[])
}

/// Build a 64-byte status payload with the given flags byte and
/// plausible counter/time/voltage fields.
#[allow(dead_code)]
pub fn status_payload(status_byte35: u8) -> Vec<u8> {
    let mut raw = vec![0u8; STATUS_SIZE];
    raw[0..4].copy_from_slice(&1234u32.to_le_bytes()); // fast counts
    raw[4..8].copy_from_slice(&56789u32.to_le_bytes()); // slow counts
    raw[8..12].copy_from_slice(&42u32.to_le_bytes()); // GP counter
    raw[12..16].copy_from_slice(&1500u32.to_le_bytes()); // accumulation, ms
    raw[20..24].copy_from_slice(&2500u32.to_le_bytes()); // real time, ms
    raw[30..32].copy_from_slice(&990u16.to_le_bytes()); // HV, 0.5 V units
    raw[32] = 0xA1; // temp high nibble plus garbage upper bits
    raw[33] = 0xF4; // temp low byte: raw 0x1F4 = 500
    raw[35] = status_byte35;
    raw
}

/// A pre-loaded request/response pair for the mock transport.
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// A mock [`TransportChannel`] for driving the protocol layers without
/// hardware. Expectations are consumed in order: each `write_frame`
/// must match the next expected request exactly, and the paired
/// response is returned by the following `read_frame`.
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    pending_response: Option<Vec<u8>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_response: None,
        }
    }

    /// Add an expected request frame and the response frame to return
    /// for it.
    pub fn expect(mut self, request: Vec<u8>, response: Vec<u8>) -> Self {
        self.expectations.push_back(Expectation { request, response });
        self
    }

    /// True once every expectation has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.expectations.is_empty() && self.pending_response.is_none()
    }
}

#[async_trait]
impl TransportChannel for MockTransport {
    async fn write_frame(&mut self, frame: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let expectation = self
            .expectations
            .pop_front()
            .expect("unexpected write: no expectations left");
        assert_eq!(
            frame,
            expectation.request.as_slice(),
            "sent frame does not match the expected request"
        );
        self.pending_response = Some(expectation.response);
        Ok(())
    }

    async fn read_frame(
        &mut self,
        max_frame: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let mut response = self
            .pending_response
            .take()
            .expect("read with no pending response");
        response.truncate(max_frame);
        Ok(response)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Usb
    }
}
