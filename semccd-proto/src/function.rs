//! Function codes recognized by the SerialEMCCD socket pathway.
//!
//! Codes are assigned from 1 in declaration order and must match the peer
//! plugin exactly. New entries are only ever appended.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Declares [`Function`] together with its wire names, in code order.
macro_rules! functions {
    ($($variant:ident = $code:literal => $name:literal,)+) => {
        /// An operation understood by the peer, identified on the wire by its code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[non_exhaustive]
        #[repr(i32)]
        pub enum Function {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant = $code,
            )+
        }

        impl Function {
            /// Every declared function, in code order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// Wire name as used by the peer's pathway enum.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

functions! {
    ExecuteScript = 1 => "GS_ExecuteScript",
    SetDebugMode = 2 => "GS_SetDebugMode",
    SetDmVersion = 3 => "GS_SetDMVersion",
    SetCurrentCamera = 4 => "GS_SetCurrentCamera",
    QueueScript = 5 => "GS_QueueScript",
    GetAcquiredImage = 6 => "GS_GetAcquiredImage",
    GetDarkReference = 7 => "GS_GetDarkReference",
    GetGainReference = 8 => "GS_GetGainReference",
    SelectCamera = 9 => "GS_SelectCamera",
    SetReadMode = 10 => "GS_SetReadMode",
    GetNumberOfCameras = 11 => "GS_GetNumberOfCameras",
    IsCameraInserted = 12 => "GS_IsCameraInserted",
    InsertCamera = 13 => "GS_InsertCamera",
    GetDmVersion = 14 => "GS_GetDMVersion",
    GetDmCapabilities = 15 => "GS_GetDMCapabilities",
    SetShutterNormallyClosed = 16 => "GS_SetShutterNormallyClosed",
    SetNoDmSettling = 17 => "GS_SetNoDMSettling",
    GetDsProperties = 18 => "GS_GetDSProperties",
    AcquireDsImage = 19 => "GS_AcquireDSImage",
    ReturnDsChannel = 20 => "GS_ReturnDSChannel",
    StopDsAcquisition = 21 => "GS_StopDSAcquisition",
    CheckReferenceTime = 22 => "GS_CheckReferenceTime",
    SetK2Parameters = 23 => "GS_SetK2Parameters",
    ChunkHandshake = 24 => "GS_ChunkHandshake",
    SetupFileSaving = 25 => "GS_SetupFileSaving",
    GetFileSaveResult = 26 => "GS_GetFileSaveResult",
    SetupFileSaving2 = 27 => "GS_SetupFileSaving2",
    GetDefectList = 28 => "GS_GetDefectList",
    SetK2Parameters2 = 29 => "GS_SetK2Parameters2",
    StopContinuousCamera = 30 => "GS_StopContinuousCamera",
    GetPluginVersion = 31 => "GS_GetPluginVersion",
    GetLastError = 32 => "GS_GetLastError",
    FreeK2GainReference = 33 => "GS_FreeK2GainReference",
    IsGpuAvailable = 34 => "GS_IsGpuAvailable",
    SetupFrameAligning = 35 => "GS_SetupFrameAligning",
    FrameAlignResults = 36 => "GS_FrameAlignResults",
    ReturnDeferredSum = 37 => "GS_ReturnDeferredSum",
    MakeAlignComFile = 38 => "GS_MakeAlignComFile",
    WaitUntilReady = 39 => "GS_WaitUntilReady",
    GetLastDoseRate = 40 => "GS_GetLastDoseRate",
    SaveFrameMdoc = 41 => "GS_SaveFrameMdoc",
    GetDmVersionAndBuild = 42 => "GS_GetDMVersionAndBuild",
    GetTiltSumProperties = 43 => "GS_GetTiltSumProperties",
}

impl Function {
    /// Numeric code sent as the first long argument.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Resolves a wire name such as `GS_SelectCamera`.
    pub fn lookup(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == name)
            .ok_or_else(|| Error::UnknownOperation(name.to_owned()))
    }

    /// Resolves a numeric code back to its function.
    pub fn from_code(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|c| c.checked_sub(1))
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(Error::UnknownCode(code))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Function {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s)
    }
}
