//! Device session and command dispatch.
//!
//! [`Dp5Device`] owns the transport handle and the session settings
//! (timeout, frame tracing). Commands go out through three layers:
//! [`raw_command`](Dp5Device::raw_command) moves encoded frames over the
//! transport, [`binary_command`](Dp5Device::binary_command) adds typed
//! framing and size validation, and
//! [`ascii_command`](Dp5Device::ascii_command) wraps text configuration
//! commands in the binary envelope.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::constants::{
    CHECKSUM_SIZE, HEADER_SIZE, MAX_ASCII_RESPONSE, MAX_READ_PAYLOAD, MAX_WRITE_PAYLOAD,
    PID_ASCII_COMMAND,
};
use crate::error::{Dp5Error, ProtocolError};
use crate::packet::Packet;
use crate::transport::{SerialTransport, TransportChannel, TransportKind, UsbTransport};

/// Default timeout for one command round trip.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// An open session with one DP5.
///
/// The wire protocol carries no request identifiers, so only one
/// command may be in flight per session; every method takes `&mut self`
/// to enforce that. The session performs no retries and holds no
/// internal locks: callers sharing a session across tasks must
/// serialize whole round trips themselves.
pub struct Dp5Device {
    transport: Box<dyn TransportChannel>,
    timeout: Duration,
    trace_frames: bool,
}

impl Dp5Device {
    /// Open the first DP5 found on the USB bus.
    pub async fn open_usb() -> Result<Self, Dp5Error> {
        Ok(Self::with_transport(UsbTransport::open().await?))
    }

    /// Open the DP5 with the given USB serial-number string.
    pub async fn open_usb_with_serial(serial: &str) -> Result<Self, Dp5Error> {
        Ok(Self::with_transport(UsbTransport::open_with_serial(serial).await?))
    }

    /// Open the `index`-th DP5 in USB enumeration order.
    pub async fn open_usb_nth(index: usize) -> Result<Self, Dp5Error> {
        Ok(Self::with_transport(UsbTransport::open_nth(index).await?))
    }

    /// Open a DP5 connected over RS-232.
    pub fn open_serial(path: &str, baud_rate: u32) -> Result<Self, Dp5Error> {
        Ok(Self::with_transport(SerialTransport::open(path, baud_rate)?))
    }

    /// Build a session over an already-open transport. Tests use this
    /// with a mock transport.
    pub fn with_transport(transport: impl TransportChannel + 'static) -> Self {
        Dp5Device {
            transport: Box::new(transport),
            timeout: DEFAULT_TIMEOUT,
            trace_frames: false,
        }
    }

    /// Set the per-round-trip timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Log every frame as a hex dump at `debug` level.
    pub fn set_trace_frames(&mut self, enabled: bool) {
        self.trace_frames = enabled;
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Restore the device's power-up configuration defaults.
    pub async fn reset_to_defaults(&mut self) -> Result<(), Dp5Error> {
        self.ascii_command("RESC=Y;", false).await?;
        Ok(())
    }

    /// Send one encoded frame and read back the raw response frame, up
    /// to `max_reply_payload` payload bytes.
    pub async fn raw_command(
        &mut self,
        frame: &[u8],
        max_reply_payload: usize,
    ) -> Result<Vec<u8>, Dp5Error> {
        if self.trace_frames {
            debug!("TX frame: {:02x?}", frame);
        } else {
            trace!("TX frame: {} bytes", frame.len());
        }
        self.transport.write_frame(frame, self.timeout).await?;

        let max_frame = HEADER_SIZE + max_reply_payload + CHECKSUM_SIZE;
        let reply = self.transport.read_frame(max_frame, self.timeout).await?;
        if self.trace_frames {
            debug!("RX frame: {:02x?}", reply.as_slice());
        } else {
            trace!("RX frame: {} bytes", reply.len());
        }
        Ok(reply)
    }

    /// Typed request/response: frame the payload under `(pid1, pid2)`,
    /// round-trip it, and return the verified response payload.
    pub async fn binary_command(
        &mut self,
        pid1: u8,
        pid2: u8,
        payload: &[u8],
        max_reply_payload: usize,
    ) -> Result<Packet, Dp5Error> {
        if payload.len() > MAX_WRITE_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_WRITE_PAYLOAD,
            }
            .into());
        }
        debug_assert!(max_reply_payload <= MAX_READ_PAYLOAD);

        let frame = Packet::new(pid1, pid2, Bytes::copy_from_slice(payload)).encode();
        let reply = self.raw_command(&frame, max_reply_payload).await?;
        let packet = Packet::try_from(reply)?;
        debug!(
            "checksum verified: {:?} -> {:?} reply",
            (pid1, pid2),
            packet.pid()
        );

        if packet.payload.len() > max_reply_payload {
            return Err(ProtocolError::PayloadTooLarge {
                len: packet.payload.len(),
                max: max_reply_payload,
            }
            .into());
        }
        Ok(packet)
    }

    /// Send a text configuration command in the ASCII envelope.
    ///
    /// The command bytes go out exactly as given, with no added
    /// terminator. The device's reply is always consumed to keep the
    /// line in sync; when `want_response` is false it is discarded and
    /// an empty string returned. Response text is truncated to
    /// [`MAX_ASCII_RESPONSE`] bytes and cut at the first NUL.
    pub async fn ascii_command(
        &mut self,
        text: &str,
        want_response: bool,
    ) -> Result<String, Dp5Error> {
        let (pid1, pid2) = PID_ASCII_COMMAND;
        let packet = self
            .binary_command(pid1, pid2, text.as_bytes(), MAX_READ_PAYLOAD)
            .await?;
        if !want_response {
            return Ok(String::new());
        }

        let mut raw = packet.payload;
        raw.truncate(MAX_ASCII_RESPONSE);
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Extract `value` from a `NAME=value;` field in an ASCII response.
pub(crate) fn parse_ascii_field(response: &str, name: &str) -> Option<String> {
    let key = format!("{name}=");
    let start = response.find(&key)? + key.len();
    let end = response[start..].find(';')? + start;
    Some(response[start..end].to_string())
}
