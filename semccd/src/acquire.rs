//! Image and dark reference acquisition.

use std::fmt;
use std::str::FromStr;

use semccd_proto::{Function, Message, Shape};
use tracing::{debug, warn};

use crate::chunked::{self, ChunkHeader, Image};
use crate::client::Client;
use crate::error::{Error, Result};

/// Response announcing the chunked payload.
const ACQUIRE_RESPONSE: Shape = Shape::new(5, 0, 0);

/// Processing applied by the plugin before returning an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Processing {
    /// A dark reference instead of an image.
    Dark,
    /// Raw counts.
    #[default]
    Unprocessed,
    /// Dark reference subtracted.
    DarkSubtracted,
    /// Dark subtracted and gain normalized.
    GainNormalized,
}

impl Processing {
    /// Value of the processing argument; `None` for dark references,
    /// whose request omits it.
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Dark => None,
            Self::Unprocessed => Some(0),
            Self::DarkSubtracted => Some(1),
            Self::GainNormalized => Some(2),
        }
    }

    /// Function that performs the acquisition.
    pub const fn function(self) -> Function {
        match self {
            Self::Dark => Function::GetDarkReference,
            _ => Function::GetAcquiredImage,
        }
    }
}

impl fmt::Display for Processing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dark => "dark",
            Self::Unprocessed => "unprocessed",
            Self::DarkSubtracted => "dark subtracted",
            Self::GainNormalized => "gain normalized",
        })
    }
}

impl FromStr for Processing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dark" => Ok(Self::Dark),
            "unprocessed" => Ok(Self::Unprocessed),
            "dark subtracted" => Ok(Self::DarkSubtracted),
            "gain normalized" => Ok(Self::GainNormalized),
            other => Err(Error::Config(format!("unknown processing mode {other:?}"))),
        }
    }
}

/// Geometry and exposure of one acquisition.
///
/// Coordinates are unbinned camera pixels; `width` and `height` are the
/// binned size of the returned image.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Acquisition {
    /// Processing mode.
    pub processing: Processing,
    /// Image width.
    pub width: i32,
    /// Image height.
    pub height: i32,
    /// Binning factor.
    pub binning: i32,
    /// Top edge of the readout area.
    pub top: i32,
    /// Left edge of the readout area.
    pub left: i32,
    /// Bottom edge of the readout area.
    pub bottom: i32,
    /// Right edge of the readout area.
    pub right: i32,
    /// Exposure in seconds.
    pub exposure: f64,
    /// Correction flags (see [`Client::correction_flags`]).
    pub corrections: i32,
    /// Shutter selector.
    pub shutter: i32,
    /// Shutter delay in milliseconds.
    pub shutter_delay_ms: i32,
}

impl Acquisition {
    /// Full-frame, unbinned acquisition of `width` x `height`.
    pub const fn new(width: i32, height: i32, exposure: f64) -> Self {
        Self {
            processing: Processing::Unprocessed,
            width,
            height,
            binning: 1,
            top: 0,
            left: 0,
            bottom: height,
            right: width,
            exposure,
            corrections: 0,
            shutter: 0,
            shutter_delay_ms: 0,
        }
    }

    /// Sets the processing mode.
    #[must_use]
    pub const fn processing(mut self, processing: Processing) -> Self {
        self.processing = processing;
        self
    }

    /// Sets the binning factor.
    #[must_use]
    pub const fn binning(mut self, binning: i32) -> Self {
        self.binning = binning;
        self
    }

    /// Restricts readout to a subarea.
    #[must_use]
    pub const fn area(mut self, top: i32, left: i32, bottom: i32, right: i32) -> Self {
        self.top = top;
        self.left = left;
        self.bottom = bottom;
        self.right = right;
        self
    }

    /// Sets correction flags.
    #[must_use]
    pub const fn corrections(mut self, flags: i32) -> Self {
        self.corrections = flags;
        self
    }

    /// Sets the shutter and its delay.
    #[must_use]
    pub const fn shutter(mut self, shutter: i32, delay_ms: i32) -> Self {
        self.shutter = shutter;
        self.shutter_delay_ms = delay_ms;
        self
    }

    /// Builds the request packet.
    pub fn to_message(&self) -> Message {
        let dark = self.processing == Processing::Dark;
        let mut longs = vec![
            self.width.saturating_mul(self.height),
            self.width,
            self.height,
        ];
        longs.extend(self.processing.code());
        longs.extend([
            self.binning,
            self.top,
            self.left,
            self.bottom,
            self.right,
            self.shutter,
        ]);
        if !dark {
            longs.push(self.shutter_delay_ms);
        }
        // divide-by-2 is never requested
        longs.extend([0, self.corrections]);

        // settling time is left to the plugin
        Message::call(self.processing.function())
            .longs(longs)
            .doubles([self.exposure, 0.0])
    }
}

impl Client {
    /// Acquires an image and streams it back.
    ///
    /// A negative status from the plugin fails with [`Error::Rejected`]
    /// and leaves the session usable; any failure after the payload
    /// header desynchronizes it.
    pub fn acquire(&mut self, acquisition: &Acquisition) -> Result<Image> {
        let function = acquisition.processing.function();
        let response = self.exchange(&acquisition.to_message(), ACQUIRE_RESPONSE)?;
        let status = response.head();
        if status < 0 {
            warn!(%function, status, "acquisition rejected");
            return Err(Error::Rejected { function, status });
        }

        let header = ChunkHeader::from_response(&response).inspect_err(|_| self.mark_desynced())?;
        debug!(processing = %acquisition.processing, ?header, "acquisition accepted");
        chunked::read_image(self.transport_mut(), header)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::Peer;

    #[test]
    fn image_request_layout() {
        let m = Acquisition::new(4, 2, 0.5)
            .processing(Processing::GainNormalized)
            .shutter(1, 30)
            .corrections(1)
            .to_message();
        assert_eq!(
            m.longs,
            vec![Function::GetAcquiredImage.code(), 8, 4, 2, 2, 1, 0, 0, 2, 4, 1, 30, 0, 1]
        );
        assert_eq!(m.doubles, vec![0.5, 0.0]);
    }

    #[test]
    fn dark_request_omits_processing_and_delay() {
        let m = Acquisition::new(4, 2, 0.5)
            .processing(Processing::Dark)
            .shutter(1, 30)
            .to_message();
        assert_eq!(
            m.longs,
            vec![Function::GetDarkReference.code(), 8, 4, 2, 1, 0, 0, 2, 4, 1, 0, 0]
        );
    }

    #[test]
    fn processing_names() {
        for p in [
            Processing::Dark,
            Processing::Unprocessed,
            Processing::DarkSubtracted,
            Processing::GainNormalized,
        ] {
            assert_eq!(p.to_string().parse::<Processing>().unwrap(), p);
        }
        assert!(matches!("bright".parse::<Processing>(), Err(Error::Config(_))));
    }

    #[test]
    fn two_chunk_image() {
        let peer = Peer::spawn(|conn| {
            let req = conn.recv(Shape::new(14, 0, 2));
            assert_eq!(req.head(), Function::GetAcquiredImage.code());
            conn.reply(&Message::default().longs([0, 8, 4, 2, 2]));

            let bytes = conn.samples(&[1, 2, 3, 4, 5, 6, 7, 8]);
            conn.write(&bytes[..8]);
            let raw = conn.recv_raw().unwrap();
            assert_eq!(conn.code(&raw), Function::ChunkHandshake.code());
            conn.write(&bytes[8..]);
        });

        let mut client = Client::connect(&peer.config()).unwrap();
        let image = client.acquire(&Acquisition::new(4, 2, 1.0)).unwrap();
        assert_eq!(image.to_rows(), vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        peer.join();
    }

    #[test]
    fn big_endian_samples() {
        let peer = Peer::spawn_ordered(semccd_proto::ByteOrder::Big, |conn| {
            conn.recv(Shape::new(14, 0, 2));
            conn.reply(&Message::default().longs([0, 2, 2, 1, 1]));
            conn.write(&[0x01, 0x02, 0xff, 0x00]);
        });

        let mut client = Client::connect(&peer.config()).unwrap();
        let image = client.acquire(&Acquisition::new(2, 1, 1.0)).unwrap();
        assert_eq!(image.pixels(), &[0x0102, 0xff00]);
        peer.join();
    }

    #[test]
    fn negative_status_is_rejected() {
        let peer = Peer::spawn(|conn| {
            conn.recv(Shape::new(14, 0, 2));
            conn.reply(&Message::default().longs([-1, 0, 0, 0, 0]));

            conn.recv(Shape::new(2, 0, 0));
            conn.reply(&Message::default().longs([0]));
        });

        let mut client = Client::connect(&peer.config()).unwrap();
        let err = client.acquire(&Acquisition::new(4, 2, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Rejected {
                function: Function::GetAcquiredImage,
                status: -1,
            }
        ));
        // the session is still in step
        client.select_camera(0).unwrap();
        peer.join();
    }
}
