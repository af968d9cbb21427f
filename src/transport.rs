//! Byte transports carrying DP5 frames.
//!
//! The protocol layer operates on the [`TransportChannel`] trait rather
//! than a concrete port, so the same dispatch code drives USB bulk
//! endpoints, an RS-232 line, or a mock transport in tests. Framing is
//! provided entirely by the protocol layer; the serial transport
//! reassembles frames from the byte stream using the length field of the
//! incoming header.

use std::time::Duration;

use async_trait::async_trait;
use nusb::transfer::RequestBuffer;
use nusb::Interface;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use crate::constants::{CHECKSUM_SIZE, HEADER_SIZE};
use crate::error::TransportError;

/// USB vendor ID of the Silicon Labs USBXpress bridge on the DP5.
pub const VID: u16 = 0x10C4;
/// USB product ID of the DP5 family.
pub const PID: u16 = 0x842A;
/// Bulk OUT endpoint carrying requests.
pub const ENDPOINT_OUT: u8 = 0x02;
/// Bulk IN endpoint carrying responses.
pub const ENDPOINT_IN: u8 = 0x81;

/// The physical link a session talks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum TransportKind {
    #[strum(to_string = "RS-232")]
    Rs232,
    #[strum(to_string = "USB")]
    Usb,
    #[strum(to_string = "Ethernet")]
    Ethernet,
}

/// Byte-level transport to a DP5.
///
/// One request/response in flight at a time: both methods take
/// `&mut self`, and callers must consume the response (or the timeout)
/// of one command before issuing the next.
#[async_trait]
pub trait TransportChannel: Send {
    /// Write one encoded frame to the device.
    async fn write_frame(&mut self, frame: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Read one response frame of at most `max_frame` bytes.
    async fn read_frame(
        &mut self,
        max_frame: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    fn kind(&self) -> TransportKind;
}

/// USB bulk transport over the DP5's fixed endpoint pair.
pub struct UsbTransport {
    interface: Interface,
}

impl UsbTransport {
    /// Find and claim the first DP5 on the bus.
    pub async fn open() -> Result<Self, TransportError> {
        Self::open_matching(|_| true).await
    }

    /// Find and claim the DP5 whose USB serial-number string equals
    /// `serial`.
    pub async fn open_with_serial(serial: &str) -> Result<Self, TransportError> {
        Self::open_matching(|s| s == Some(serial)).await
    }

    /// Find and claim the `index`-th DP5 in bus enumeration order, for
    /// setups that address units by position instead of serial number.
    pub async fn open_nth(index: usize) -> Result<Self, TransportError> {
        let mut seen = 0usize;
        Self::open_matching(move |_| {
            let found = seen == index;
            seen += 1;
            found
        })
        .await
    }

    async fn open_matching(
        mut matches: impl FnMut(Option<&str>) -> bool,
    ) -> Result<Self, TransportError> {
        info!("Searching for Amptek DP5 ({VID:04x}:{PID:04x})...");
        let device_info = nusb::list_devices()?
            .find(|d| {
                d.vendor_id() == VID && d.product_id() == PID && matches(d.serial_number())
            })
            .ok_or(TransportError::DeviceNotFound)?;

        info!(
            "Found device on bus {} addr {}",
            device_info.bus_number(),
            device_info.device_address()
        );

        let device = device_info.open()?;
        let interface = device.detach_and_claim_interface(0)?;
        info!("Interface claimed successfully.");

        Ok(UsbTransport { interface })
    }
}

#[async_trait]
impl TransportChannel for UsbTransport {
    async fn write_frame(
        &mut self,
        frame: &[u8],
        timeout_duration: Duration,
    ) -> Result<(), TransportError> {
        let transfer = self.interface.bulk_out(ENDPOINT_OUT, frame.to_vec());
        let completion = timeout(timeout_duration, transfer).await?;
        let sent = completion.into_result()?;
        debug!("USB: sent {} bytes", sent.actual_length());
        Ok(())
    }

    async fn read_frame(
        &mut self,
        max_frame: usize,
        timeout_duration: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let transfer = self.interface.bulk_in(ENDPOINT_IN, RequestBuffer::new(max_frame));
        let completion = timeout(timeout_duration, transfer).await?;
        let buffer = completion.into_result()?;
        debug!("USB: received {} bytes", buffer.len());
        Ok(buffer)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Usb
    }
}

/// RS-232 transport. The line carries no framing of its own, so the
/// response frame is reassembled here: read the 6-byte header, then the
/// payload length it declares plus the checksum.
pub struct SerialTransport {
    port: SerialStream,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = tokio_serial::new(path, baud_rate).open_native_async()?;
        info!("Opened serial port {path} at {baud_rate} baud");
        Ok(SerialTransport { port })
    }
}

#[async_trait]
impl TransportChannel for SerialTransport {
    async fn write_frame(
        &mut self,
        frame: &[u8],
        timeout_duration: Duration,
    ) -> Result<(), TransportError> {
        timeout(timeout_duration, self.port.write_all(frame)).await??;
        debug!("serial: sent {} bytes", frame.len());
        Ok(())
    }

    async fn read_frame(
        &mut self,
        max_frame: usize,
        timeout_duration: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let frame = timeout(timeout_duration, async {
            let mut frame = vec![0u8; HEADER_SIZE];
            self.port.read_exact(&mut frame).await?;

            let declared = u16::from_be_bytes([frame[4], frame[5]]) as usize;
            let rest = (declared + CHECKSUM_SIZE).min(max_frame.saturating_sub(HEADER_SIZE));
            let old_len = frame.len();
            frame.resize(old_len + rest, 0);
            self.port.read_exact(&mut frame[old_len..]).await?;
            Ok::<_, TransportError>(frame)
        })
        .await??;
        debug!("serial: received {} bytes", frame.len());
        Ok(frame)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Rs232
    }
}

/// Placeholder for the DP5's Ethernet (UDP) interface. Session configs
/// can name it, but every operation fails with
/// [`TransportError::Unsupported`].
pub struct EthernetTransport;

#[async_trait]
impl TransportChannel for EthernetTransport {
    async fn write_frame(&mut self, _frame: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        Err(TransportError::Unsupported(TransportKind::Ethernet))
    }

    async fn read_frame(
        &mut self,
        _max_frame: usize,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        Err(TransportError::Unsupported(TransportKind::Ethernet))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ethernet
    }
}
