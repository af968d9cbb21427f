//! Protocol and acquisition core for Amptek DP5-family multichannel
//! analyzers: the checksummed binary/ASCII command protocol, the
//! 64-byte status decode, 24-bit packed spectrum unpacking, and the
//! preset-driven acquisition state machine, over USB or RS-232.

pub mod acquisition;
pub mod constants;
pub mod device;
pub mod error;
pub mod packet;
pub mod spectrum;
pub mod status;
pub mod transport;

pub use acquisition::{AcquisitionState, ChannelCount, Dp5Mca, Mca, PresetConfig};
pub use device::Dp5Device;
pub use error::{DeviceError, Dp5Error, ProtocolError, TransportError};
pub use packet::Packet;
pub use spectrum::unpack_spectrum;
pub use status::{busy_for_preset, StatusSnapshot};
pub use transport::{
    EthernetTransport, SerialTransport, TransportChannel, TransportKind, UsbTransport,
};
