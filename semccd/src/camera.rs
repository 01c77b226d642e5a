//! Single-code plugin calls: versions, camera selection, read mode and
//! the other settings that take a few scalars and return a status.

use semccd_proto::{Function, Message, Shape};

use crate::client::{Client, warn_status};
use crate::error::Result;
use crate::version::DmVersion;

/// Read modes accepted by [`Client::set_read_mode`].
pub mod read_mode {
    /// Camera without read modes.
    pub const NONE: i32 = -1;
    /// K2 linear.
    pub const K2_LINEAR: i32 = 0;
    /// K2 counting.
    pub const K2_COUNTING: i32 = 1;
    /// K2 super-resolution.
    pub const K2_SUPER_RES: i32 = 2;
    /// K3 linear; also tells the plugin the camera is a K3.
    pub const K3_LINEAR: i32 = 3;
    /// K3 super-resolution.
    pub const K3_SUPER_RES: i32 = 4;
    /// OneView diffraction.
    pub const ONEVIEW_DIFFRACTION: i32 = -2;
    /// OneView imaging.
    pub const ONEVIEW_IMAGING: i32 = -3;
}

/// What the running DigitalMicrograph can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmCapabilities {
    /// A shutter can be chosen per acquisition.
    pub can_select_shutter: bool,
    /// Settling time can be set.
    pub can_set_settling: bool,
    /// Opening the shutter works.
    pub open_shutter_works: bool,
}

impl Client {
    /// Raw DigitalMicrograph version number.
    pub fn dm_version(&mut self) -> Result<i32> {
        self.get_long(Function::GetDmVersion, [])
    }

    /// Decoded DigitalMicrograph version.
    pub fn dm_version_info(&mut self) -> Result<DmVersion> {
        self.dm_version().map(DmVersion::from_long)
    }

    /// Correction flags appropriate for the connected version.
    pub fn correction_flags(&mut self) -> Result<i32> {
        Ok(self.dm_version_info()?.correction_flags())
    }

    /// Version and build number.
    pub fn dm_version_and_build(&mut self) -> Result<(i32, i32)> {
        let request = Message::call(Function::GetDmVersionAndBuild);
        let response = self.exchange(&request, Shape::new(3, 0, 0))?;
        warn_status(&request, response.head());
        Ok((response.long(1), response.long(2)))
    }

    /// Shutter and settling capabilities.
    pub fn dm_capabilities(&mut self) -> Result<DmCapabilities> {
        let request = Message::call(Function::GetDmCapabilities);
        let response = self.exchange(&request, Shape::new(1, 3, 0))?;
        Ok(DmCapabilities {
            can_select_shutter: response.flag(0),
            can_set_settling: response.flag(1),
            open_shutter_works: response.flag(2),
        })
    }

    /// SerialEMCCD plugin version.
    pub fn plugin_version(&mut self) -> Result<i32> {
        self.get_long(Function::GetPluginVersion, [])
    }

    /// Code of the plugin's most recent error.
    pub fn last_error(&mut self) -> Result<i32> {
        self.get_long(Function::GetLastError, [])
    }

    /// Number of cameras known to DigitalMicrograph.
    pub fn number_of_cameras(&mut self) -> Result<i32> {
        self.get_long(Function::GetNumberOfCameras, [])
    }

    /// Dose rate measured during the last counting-mode acquisition.
    pub fn last_dose_rate(&mut self) -> Result<f64> {
        let request = Message::call(Function::GetLastDoseRate);
        let response = self.exchange(&request, Shape::new(1, 0, 1))?;
        Ok(response.double(0))
    }

    /// Sets the plugin's debug output level.
    pub fn set_debug_mode(&mut self, mode: i32) -> Result<()> {
        self.apply(&Message::call(Function::SetDebugMode).longs([mode]))
    }

    /// Sets the camera addressed by later calls without reselecting it.
    pub fn set_current_camera(&mut self, camera: i32) -> Result<()> {
        self.apply(&Message::call(Function::SetCurrentCamera).longs([camera]))
    }

    /// Selects the active camera.
    pub fn select_camera(&mut self, camera: i32) -> Result<()> {
        self.apply(&Message::call(Function::SelectCamera).longs([camera]))
    }

    /// Whether the camera at index `camera` is inserted.
    pub fn is_camera_inserted(&mut self, camera: i32) -> Result<bool> {
        let request = Message::call(Function::IsCameraInserted).longs([camera]);
        let response = self.exchange(&request, Shape::new(1, 1, 0))?;
        Ok(response.flag(0))
    }

    /// Inserts or retracts a camera unconditionally.
    pub fn insert_camera(&mut self, camera: i32, inserted: bool) -> Result<()> {
        self.apply(
            &Message::call(Function::InsertCamera)
                .longs([camera])
                .bools([inserted]),
        )
    }

    /// Sets the read mode (see [`read_mode`]) and count scaling.
    ///
    /// For K3 linear mode the per-millisecond offset is folded into the
    /// scaling as `scaling + 10 * round(offset_per_ms)`.
    pub fn set_read_mode(&mut self, mode: i32, scaling: f64) -> Result<()> {
        self.apply(
            &Message::call(Function::SetReadMode)
                .longs([mode])
                .doubles([scaling]),
        )
    }

    /// Sets which shutter stays closed between exposures.
    pub fn set_shutter_normally_closed(&mut self, camera: i32, shutter: i32) -> Result<()> {
        self.apply(&Message::call(Function::SetShutterNormallyClosed).longs([camera, shutter]))
    }

    /// Disables DigitalMicrograph's own settling delay.
    pub fn set_no_dm_settling(&mut self, value: i32) -> Result<()> {
        self.apply(&Message::call(Function::SetNoDmSettling).longs([value]))
    }

    /// Blocks the plugin until the camera is ready.
    pub fn wait_until_ready(&mut self, value: i32) -> Result<()> {
        self.apply(&Message::call(Function::WaitUntilReady).longs([value]))
    }

    /// Releases the cached K2 gain reference.
    pub fn free_k2_gain_reference(&mut self, value: i32) -> Result<()> {
        self.apply(&Message::call(Function::FreeK2GainReference).longs([value]))
    }

    /// Stops continuous acquisition.
    pub fn stop_continuous_camera(&mut self) -> Result<()> {
        self.apply(&Message::call(Function::StopContinuousCamera))
    }

    /// Stops a DigiScan acquisition.
    pub fn stop_ds_acquisition(&mut self) -> Result<()> {
        self.apply(&Message::call(Function::StopDsAcquisition))
    }
}
