//! Acquisition layer: presets, channel counts, and the
//! trigger/stop/clear/read/status state machine driving a
//! [`Dp5Device`].

use async_trait::async_trait;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, info};

use crate::constants::{
    BYTES_PER_CHANNEL, MAX_CHANNELS, PID_MCA_CLEAR, PID_MCA_DISABLE, PID_MCA_ENABLE,
    PID_REQUEST_SPECTRUM, PID_REQUEST_STATUS, STATUS_SIZE,
};
use crate::device::{parse_ascii_field, Dp5Device};
use crate::error::{DeviceError, Dp5Error, ProtocolError};
use crate::spectrum::unpack_spectrum;
use crate::status::{busy_for_preset, StatusSnapshot};

/// The stopping condition for an acquisition.
///
/// `LiveTime` is recognized so configurations can name it, but the DP5
/// firmware path here does not support it: every operation rejects it
/// with [`DeviceError::UnsupportedPreset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PresetConfig {
    /// Stop after this many seconds of elapsed real time.
    RealTime(f64),
    /// Stop after this many accumulated counts.
    Count(u64),
    /// Stop after this many seconds of live time (unsupported).
    LiveTime(f64),
}

/// Channel counts the hardware can bin into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u32)]
pub enum ChannelCount {
    C256 = 256,
    C512 = 512,
    C1024 = 1024,
    C2048 = 2048,
    C4096 = 4096,
    C8192 = 8192,
}

impl ChannelCount {
    /// Validate an arbitrary channel count.
    pub fn from_u32(n: u32) -> Result<Self, DeviceError> {
        ChannelCount::try_from(n).map_err(|_| DeviceError::IllegalChannelCount(n))
    }

    pub fn num_bins(self) -> usize {
        u32::from(self) as usize
    }
}

/// Where the acquisition state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AcquisitionState {
    Idle,
    Armed,
    Acquiring,
    Completed,
    Stopped,
}

/// The MCA operations every acquisition backend exposes.
#[async_trait]
pub trait Mca {
    async fn trigger(&mut self, preset: PresetConfig) -> Result<(), Dp5Error>;
    async fn stop(&mut self) -> Result<(), Dp5Error>;
    async fn clear(&mut self) -> Result<(), Dp5Error>;
    async fn read(&mut self) -> Result<Vec<u32>, Dp5Error>;
    async fn get_status(&mut self) -> Result<StatusSnapshot, Dp5Error>;
    async fn get_parameter(&mut self, name: &str) -> Result<String, Dp5Error>;
    async fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), Dp5Error>;
}

/// Acquisition state machine over one DP5 session.
pub struct Dp5Mca {
    device: Dp5Device,
    state: AcquisitionState,
    preset: Option<PresetConfig>,
    channels: ChannelCount,
    busy: bool,
}

impl Dp5Mca {
    pub fn new(device: Dp5Device) -> Self {
        Dp5Mca {
            device,
            state: AcquisitionState::Idle,
            preset: None,
            channels: ChannelCount::C1024,
            busy: false,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Busy decision from the most recent status poll.
    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn current_preset(&self) -> Option<PresetConfig> {
        self.preset
    }

    /// The channel count spectrum reads are decoded with.
    pub fn current_num_channels(&self) -> ChannelCount {
        self.channels
    }

    pub fn device_mut(&mut self) -> &mut Dp5Device {
        &mut self.device
    }

    /// Program the preset and arm the MCA.
    ///
    /// The preset command string deliberately turns the other preset
    /// kinds OFF and sets the chosen one in a single command; the
    /// firmware's contract is the exact text, so it is never split or
    /// re-ordered.
    pub async fn trigger(&mut self, preset: PresetConfig) -> Result<(), Dp5Error> {
        let command = match preset {
            PresetConfig::RealTime(seconds) => format!("PREC=OFF;PRET=OFF;PRER={seconds};"),
            PresetConfig::Count(count) => format!("PRER=OFF;PRET=OFF;PREC={count};"),
            PresetConfig::LiveTime(_) => return Err(DeviceError::UnsupportedPreset.into()),
        };
        self.device.ascii_command(&command, false).await?;
        self.preset = Some(preset);
        self.state = AcquisitionState::Armed;

        let (pid1, pid2) = PID_MCA_ENABLE;
        self.device.binary_command(pid1, pid2, &[], 0).await?;
        self.state = AcquisitionState::Acquiring;
        self.busy = true;
        info!("acquisition armed with preset {preset:?}");
        Ok(())
    }

    /// Disable the MCA.
    pub async fn stop(&mut self) -> Result<(), Dp5Error> {
        let (pid1, pid2) = PID_MCA_DISABLE;
        self.device.binary_command(pid1, pid2, &[], 0).await?;
        self.state = AcquisitionState::Stopped;
        self.busy = false;
        Ok(())
    }

    /// Clear the accumulated spectrum and counters. Valid in any state.
    pub async fn clear(&mut self) -> Result<(), Dp5Error> {
        let (pid1, pid2) = PID_MCA_CLEAR;
        self.device.binary_command(pid1, pid2, &[], 0).await?;
        Ok(())
    }

    /// Fetch and decode the status block, and advance the state machine
    /// when the preset has been satisfied.
    pub async fn get_status(&mut self) -> Result<StatusSnapshot, Dp5Error> {
        let (pid1, pid2) = PID_REQUEST_STATUS;
        let reply = self.device.binary_command(pid1, pid2, &[], STATUS_SIZE).await?;
        let raw: &[u8; STATUS_SIZE] =
            reply
                .payload
                .as_ref()
                .try_into()
                .map_err(|_| ProtocolError::LengthMismatch {
                    expected: STATUS_SIZE,
                    actual: reply.payload.len(),
                })?;
        let snapshot = StatusSnapshot::decode(raw);

        if let Some(preset) = self.preset {
            self.busy = busy_for_preset(&preset, snapshot.status_byte35)?;
            if !self.busy && self.state == AcquisitionState::Acquiring {
                self.state = AcquisitionState::Completed;
                info!("preset satisfied after {:.3} s real time", snapshot.real_time_s);
            }
        }
        debug!("status: {snapshot}");
        Ok(snapshot)
    }

    /// Read and unpack the spectrum at the configured channel count.
    pub async fn read(&mut self) -> Result<Vec<u32>, Dp5Error> {
        let (pid1, pid2) = PID_REQUEST_SPECTRUM;
        let max_reply = BYTES_PER_CHANNEL * MAX_CHANNELS;
        let reply = self.device.binary_command(pid1, pid2, &[], max_reply).await?;

        let num_channels = self.channels.num_bins();
        let needed = BYTES_PER_CHANNEL * num_channels;
        if reply.payload.len() < needed {
            return Err(ProtocolError::LengthMismatch {
                expected: needed,
                actual: reply.payload.len(),
            }
            .into());
        }
        Ok(unpack_spectrum(&reply.payload, num_channels))
    }

    /// Set the device's channel count, validating it against the
    /// hardware's supported set.
    pub async fn set_current_num_channels(&mut self, num_channels: u32) -> Result<(), Dp5Error> {
        let channels = ChannelCount::from_u32(num_channels)?;
        self.device
            .ascii_command(&format!("MCAC={num_channels};"), false)
            .await?;
        self.channels = channels;
        Ok(())
    }

    /// Query the device's current channel count.
    pub async fn get_current_num_channels(&mut self) -> Result<u32, Dp5Error> {
        let response = self.device.ascii_command("MCAC;", true).await?;
        let value: u32 = parse_ascii_field(&response, "MCAC")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| DeviceError::UnparseableResponse(response.clone()))?;
        if let Ok(channels) = ChannelCount::from_u32(value) {
            self.channels = channels;
        }
        Ok(value)
    }

    async fn query_parameter(&mut self, name: &str) -> Result<String, Dp5Error> {
        let response = self.device.ascii_command(&format!("{name};"), true).await?;
        parse_ascii_field(&response, name)
            .ok_or_else(|| DeviceError::UnparseableResponse(response).into())
    }
}

#[async_trait]
impl Mca for Dp5Mca {
    async fn trigger(&mut self, preset: PresetConfig) -> Result<(), Dp5Error> {
        Dp5Mca::trigger(self, preset).await
    }

    async fn stop(&mut self) -> Result<(), Dp5Error> {
        Dp5Mca::stop(self).await
    }

    async fn clear(&mut self) -> Result<(), Dp5Error> {
        Dp5Mca::clear(self).await
    }

    async fn read(&mut self) -> Result<Vec<u32>, Dp5Error> {
        Dp5Mca::read(self).await
    }

    async fn get_status(&mut self) -> Result<StatusSnapshot, Dp5Error> {
        Dp5Mca::get_status(self).await
    }

    /// Parameter queries go to the device. A `PRER` query issues exactly
    /// one round trip; the count preset is only queried when asked for.
    async fn get_parameter(&mut self, name: &str) -> Result<String, Dp5Error> {
        match name {
            "MCAC" => Ok(self.get_current_num_channels().await?.to_string()),
            "PRER" | "PREC" => self.query_parameter(name).await,
            "PRET" => Err(DeviceError::UnsupportedPreset.into()),
            _ => Err(DeviceError::UnparseableResponse(name.to_string()).into()),
        }
    }

    /// Preset parameters are stored locally and programmed on the next
    /// `trigger`, which owns the combined OFF+SET command string.
    async fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), Dp5Error> {
        match name {
            "MCAC" => {
                let n: u32 = value
                    .parse()
                    .map_err(|_| DeviceError::UnparseableResponse(value.to_string()))?;
                self.set_current_num_channels(n).await
            }
            "PRER" => {
                let seconds: f64 = value
                    .parse()
                    .map_err(|_| DeviceError::UnparseableResponse(value.to_string()))?;
                self.preset = Some(PresetConfig::RealTime(seconds));
                Ok(())
            }
            "PREC" => {
                let count: u64 = value
                    .parse()
                    .map_err(|_| DeviceError::UnparseableResponse(value.to_string()))?;
                self.preset = Some(PresetConfig::Count(count));
                Ok(())
            }
            "PRET" => Err(DeviceError::UnsupportedPreset.into()),
            _ => Err(DeviceError::IllegalPresetType(name.to_string()).into()),
        }
    }
}
