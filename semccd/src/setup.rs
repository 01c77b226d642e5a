//! Multi-argument camera setup: counting-mode parameters, frame file
//! saving, and camera insertion.

use semccd_proto::{ByteOrder, Function, Message, Shape, text};
use tracing::{debug, info};

use crate::client::{Client, warn_status};
use crate::error::Result;

/// Flag bit requesting correlated double sampling.
const FLAG_USE_CDS: i32 = 1 << 6;

/// File-saving flag bit for early return.
const FLAG_EARLY_RETURN: i32 = 128;

/// File-saving flag bit for LZW-compressed TIFF frames.
const FLAG_LZW_TIFF: i32 = 8;

/// Pixel size sent with file-saving setups; the plugin ignores it.
const PIXEL_SIZE: f64 = 1.0;

/// Counting-camera acquisition parameters, sent as `GS_SetK2Parameters2`.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct CountingParams {
    /// Read mode (see [`crate::read_mode`]).
    pub read_mode: i32,
    /// Count scaling.
    pub scaling: f64,
    /// Hardware processing selector.
    pub hardware_processing: i32,
    /// Return individual frames rather than a sum.
    pub dose_fractionation: bool,
    /// Frame time in seconds.
    pub frame_time: f64,
    /// Align frames in the plugin.
    pub align_frames: bool,
    /// Save frames to disk.
    pub save_frames: bool,
    /// Alignment filter name; empty for none.
    pub filter: String,
    /// Use correlated double sampling.
    pub use_cds: bool,
    /// Rotation and flip for summed images; 0 keeps the GMS setting.
    pub rotation_flip: i32,
}

impl CountingParams {
    /// Parameters for `read_mode` with everything else defaulted.
    pub fn new(read_mode: i32) -> Self {
        Self {
            read_mode,
            scaling: 1.0,
            hardware_processing: 1,
            dose_fractionation: false,
            frame_time: 0.25,
            align_frames: false,
            save_frames: false,
            filter: String::new(),
            use_cds: false,
            rotation_flip: 0,
        }
    }

    /// Sets the count scaling.
    #[must_use]
    pub const fn scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    /// Sets the hardware processing selector.
    #[must_use]
    pub const fn hardware_processing(mut self, value: i32) -> Self {
        self.hardware_processing = value;
        self
    }

    /// Enables dose fractionation with the given frame time.
    #[must_use]
    pub const fn dose_fractionation(mut self, frame_time: f64) -> Self {
        self.dose_fractionation = true;
        self.frame_time = frame_time;
        self
    }

    /// Enables frame alignment with `filter`.
    #[must_use]
    pub fn align_frames(mut self, filter: impl Into<String>) -> Self {
        self.align_frames = true;
        self.filter = filter.into();
        self
    }

    /// Enables frame saving.
    #[must_use]
    pub const fn save_frames(mut self, save: bool) -> Self {
        self.save_frames = save;
        self
    }

    /// Enables correlated double sampling.
    #[must_use]
    pub const fn use_cds(mut self, cds: bool) -> Self {
        self.use_cds = cds;
        self
    }

    /// Flag word carried as the fourth long argument.
    pub const fn flags(&self) -> i32 {
        if self.use_cds { FLAG_USE_CDS } else { 0 }
    }

    /// Builds the request packet.
    pub fn to_message(&self, order: ByteOrder) -> Message {
        Message::call(Function::SetK2Parameters2)
            .longs([
                self.read_mode,
                self.hardware_processing,
                self.rotation_flip,
                self.flags(),
            ])
            .bools([self.dose_fractionation, self.align_frames, self.save_frames])
            // reduced and full sizes, then two reserved slots
            .doubles([self.scaling, self.frame_time, 0.0, 0.0, 0.0, 0.0])
            .array(text::encode_str(&self.filter, order))
    }
}

/// Where and how frames are written.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct FileSaving {
    /// Rotation and flip applied to saved frames.
    pub rotation_flip: i32,
    /// Output directory on the camera computer.
    pub directory: String,
    /// File name root.
    pub root_name: String,
    /// One file per frame instead of a stack.
    pub file_per_image: bool,
    /// Return to the caller before all frames are written.
    pub early_return: bool,
    /// Frames summed before an early return.
    pub early_return_frames: i32,
    /// RAM grabs kept for an early return.
    pub early_return_ram_grabs: i32,
    /// Write LZW-compressed TIFF.
    pub lzw_tiff: bool,
}

impl FileSaving {
    /// Saves into `directory` with file names starting with `root_name`.
    pub fn new(directory: impl Into<String>, root_name: impl Into<String>) -> Self {
        Self {
            rotation_flip: 0,
            directory: directory.into(),
            root_name: root_name.into(),
            file_per_image: false,
            early_return: false,
            early_return_frames: 0,
            early_return_ram_grabs: 0,
            lzw_tiff: false,
        }
    }

    /// Sets rotation and flip.
    #[must_use]
    pub const fn rotation_flip(mut self, value: i32) -> Self {
        self.rotation_flip = value;
        self
    }

    /// Writes one file per frame.
    #[must_use]
    pub const fn file_per_image(mut self, value: bool) -> Self {
        self.file_per_image = value;
        self
    }

    /// Returns early once `frames` are summed, keeping `ram_grabs` grabs.
    #[must_use]
    pub const fn early_return(mut self, frames: i32, ram_grabs: i32) -> Self {
        self.early_return = true;
        self.early_return_frames = frames;
        self.early_return_ram_grabs = ram_grabs;
        self
    }

    /// Writes LZW-compressed TIFF.
    #[must_use]
    pub const fn lzw_tiff(mut self, value: bool) -> Self {
        self.lzw_tiff = value;
        self
    }

    /// Early-return grabs and frame count packed as `65536 * grabs + frames`.
    #[allow(clippy::cast_lossless)]
    pub const fn num_grab_sum(&self) -> i64 {
        ((self.early_return_ram_grabs as i64) << 16) + self.early_return_frames as i64
    }

    /// Flag word of the extended variant.
    pub const fn flags(&self) -> i32 {
        let mut flags = 0;
        if self.early_return {
            flags |= FLAG_EARLY_RETURN;
        }
        if self.lzw_tiff {
            flags |= FLAG_LZW_TIFF;
        }
        flags
    }

    /// Builds the request packet.
    ///
    /// The extended `GS_SetupFileSaving2` form is used only when frames
    /// are being saved and early return or compression is requested.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_message(&self, save_frames: bool, order: ByteOrder) -> Message {
        let names = text::encode_strs(&[&self.directory, &self.root_name], order);
        let extended = save_frames && (self.early_return || self.lzw_tiff);
        let message = if extended {
            Message::call(Function::SetupFileSaving2)
                .longs([self.rotation_flip, self.flags()])
                .doubles([PIXEL_SIZE, self.num_grab_sum() as f64, 0.0, 0.0, 0.0])
        } else {
            Message::call(Function::SetupFileSaving)
                .longs([self.rotation_flip])
                .doubles([PIXEL_SIZE])
        };
        message.bools([self.file_per_image]).array(names)
    }
}

/// Outcome of the last frame-saving acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSaveResult {
    /// Frames written.
    pub frames_saved: i32,
    /// Plugin error code; 0 on success.
    pub error: i32,
}

impl Client {
    /// Sends counting-mode parameters and remembers whether frames will
    /// be saved.
    pub fn set_k2_parameters(&mut self, params: &CountingParams) -> Result<()> {
        self.save_frames = params.save_frames;
        let request = params.to_message(self.byte_order());
        self.apply(&request)
    }

    /// Configures frame file saving.
    pub fn setup_file_saving(&mut self, saving: &FileSaving) -> Result<()> {
        self.num_grab_sum = saving.num_grab_sum();
        let request = saving.to_message(self.save_frames, self.byte_order());
        let response = self.exchange(&request, Shape::new(2, 0, 0))?;
        warn_status(&request, response.head());
        debug!(directory = %saving.directory, root = %saving.root_name, "file saving configured");
        Ok(())
    }

    /// Frames written and error code of the last saving acquisition.
    pub fn file_save_result(&mut self) -> Result<FileSaveResult> {
        let request = Message::call(Function::GetFileSaveResult);
        let response = self.exchange(&request, Shape::new(3, 0, 0))?;
        Ok(FileSaveResult {
            frames_saved: response.long(1),
            error: response.long(2),
        })
    }

    /// Inserts or retracts a camera if it is not already in that state.
    ///
    /// Returns whether a change was requested.
    pub fn set_camera_inserted(&mut self, camera: i32, inserted: bool) -> Result<bool> {
        if self.is_camera_inserted(camera)? == inserted {
            return Ok(false);
        }
        info!(camera, inserted, "changing camera insertion");
        self.insert_camera(camera, inserted)?;
        Ok(true)
    }

    /// Selects `camera` and makes sure it is inserted.
    pub fn prepare_camera(&mut self, camera: i32) -> Result<()> {
        self.select_camera(camera)?;
        self.set_camera_inserted(camera, true)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::read_mode;
    use crate::testing::Peer;

    #[test]
    fn num_grab_sum_does_not_overflow() {
        let saving = FileSaving::new("d", "r").early_return(32_767, 70_000);
        assert_eq!(saving.num_grab_sum(), 70_000_i64 * 65_536 + 32_767);

        let extended = saving.to_message(true, ByteOrder::Little);
        assert_eq!(extended.double(1), 4_587_552_767.0);
    }

    #[test]
    fn counting_params_layout() {
        let params = CountingParams::new(read_mode::K2_COUNTING)
            .dose_fractionation(0.05)
            .save_frames(true)
            .use_cds(true);
        let m = params.to_message(ByteOrder::Little);

        assert_eq!(m.longs, vec![Function::SetK2Parameters2.code(), 1, 1, 0, 64]);
        assert_eq!(m.bools, vec![true, false, true]);
        assert_eq!(m.doubles, vec![1.0, 0.05, 0.0, 0.0, 0.0, 0.0]);
        // empty filter name is one NUL word
        assert_eq!(m.array, vec![0]);
    }

    #[test]
    fn file_saving_variants() {
        let order = ByteOrder::Little;
        let saving = FileSaving::new("D:\\frames", "img").early_return(10, 2);
        assert_eq!(saving.num_grab_sum(), 2 * 65536 + 10);

        let basic = saving.to_message(false, order);
        assert_eq!(basic.longs, vec![Function::SetupFileSaving.code(), 0]);
        assert_eq!(basic.doubles, vec![1.0]);

        let extended = saving.to_message(true, order);
        assert_eq!(extended.longs, vec![Function::SetupFileSaving2.code(), 0, 128]);
        assert_eq!(extended.doubles, vec![1.0, 131_082.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            text::decode_str(&extended.array, order),
            "D:\\frames",
            "directory comes first"
        );

        let lzw = FileSaving::new("d", "r").lzw_tiff(true).to_message(true, order);
        assert_eq!(lzw.long(2), 8);

        // plain saving never needs the extended form
        let plain = FileSaving::new("d", "r").to_message(true, order);
        assert_eq!(plain.head(), Function::SetupFileSaving.code());
    }

    #[test]
    fn file_saving_uses_session_frame_flag() {
        let peer = Peer::spawn(|conn| {
            conn.recv(Shape::new(5, 3, 6).with_array(1));
            conn.reply(&Message::default().longs([0]));

            let raw = conn.recv_raw().unwrap();
            assert_eq!(conn.code(&raw), Function::SetupFileSaving2.code());
            conn.reply(&Message::default().longs([0, 0]));

            conn.recv(Shape::new(1, 0, 0));
            conn.reply(&Message::default().longs([0, 40, 0]));
        });

        let mut client = Client::connect(&peer.config()).unwrap();
        client
            .set_k2_parameters(&CountingParams::new(read_mode::K2_COUNTING).save_frames(true))
            .unwrap();
        assert!(client.save_frames());
        client
            .setup_file_saving(&FileSaving::new("d", "r").lzw_tiff(true))
            .unwrap();
        assert_eq!(
            client.file_save_result().unwrap(),
            FileSaveResult {
                frames_saved: 40,
                error: 0,
            }
        );
        peer.join();
    }

    #[test]
    fn insertion_changes_only_when_needed() {
        let peer = Peer::spawn(|conn| {
            conn.recv(Shape::new(2, 0, 0));
            conn.reply(&Message::default().longs([0]).bools([true]));

            conn.recv(Shape::new(2, 0, 0));
            conn.reply(&Message::default().longs([0]).bools([false]));
            let req = conn.recv(Shape::new(2, 1, 0));
            assert_eq!(req.head(), Function::InsertCamera.code());
            assert_eq!(req.bools, vec![true]);
            conn.reply(&Message::default().longs([0]));
        });

        let mut client = Client::connect(&peer.config()).unwrap();
        assert!(!client.set_camera_inserted(1, true).unwrap());
        assert!(client.set_camera_inserted(1, true).unwrap());
        peer.join();
    }
}
