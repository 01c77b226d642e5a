//! Remote script execution.
//!
//! Behavior without a dedicated function code is reached by sending a
//! small DigitalMicrograph script through `GS_ExecuteScript`. The script
//! travels as a packed string; the plugin answers with its status and the
//! script's `Exit()` value.

use std::fs;
use std::path::Path;

use semccd_proto::{Function, Message, Shape, text};
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};

/// Response to every script: status plus the exit value.
pub const SCRIPT_RESPONSE: Shape = Shape::new(1, 0, 1);

/// Marker making the plugin run a script without blocking the reply.
const BACKGROUND_MARKER: &str = "// $BACKGROUND$\n\n";

/// Script exiting with `1.0` if `name` is callable on the peer, else `-1.0`.
pub fn probe_script(name: &str) -> String {
    format!("if ( DoesFunctionExist(\"{name}\") ) {{ Exit(1.0); }} else {{ Exit(-1.0); }}")
}

/// Script applying `function` to the camera at list position `camera`.
pub fn camera_object_script(function: &str, camera: i32) -> String {
    [
        "Object manager = CM_GetCameraManager();".to_owned(),
        "Object cameraList = CM_GetCameras(manager);".to_owned(),
        format!("Object camera = ObjectAt(cameraList,{camera});"),
        format!("{function}(camera);"),
    ]
    .join("\n")
}

impl Client {
    /// Runs `script` and reads a response of shape `expect`.
    ///
    /// With `select_camera` set the plugin selects the current camera
    /// before running the script.
    pub fn execute_script(
        &mut self,
        script: &str,
        select_camera: bool,
        expect: Shape,
    ) -> Result<Message> {
        let words = text::encode_str(script, self.byte_order());
        let request = Message::call(Function::ExecuteScript)
            .bools([select_camera])
            .array(words);
        self.exchange(&request, expect)
    }

    /// Runs a script and returns its exit value.
    ///
    /// Fails with [`Error::ScriptFailed`] on a positive status.
    pub fn execute_double(&mut self, script: &str, select_camera: bool) -> Result<f64> {
        let response = self.execute_script(script, select_camera, SCRIPT_RESPONSE)?;
        match response.head() {
            status if status > 0 => Err(Error::ScriptFailed { status }),
            _ => Ok(response.double(0)),
        }
    }

    /// Runs a script and returns its exit value truncated toward zero.
    #[allow(clippy::cast_possible_truncation)]
    pub fn execute_long(&mut self, script: &str, select_camera: bool) -> Result<i32> {
        Ok(self.execute_double(script, select_camera)? as i32)
    }

    /// Runs a script for its side effects and returns the peer status.
    pub fn execute_send(&mut self, script: &str, select_camera: bool) -> Result<i32> {
        let response = self.execute_script(script, select_camera, SCRIPT_RESPONSE)?;
        Ok(response.head())
    }

    /// Whether a script function named `name` exists on the peer.
    pub fn has_function(&mut self, name: &str) -> Result<bool> {
        let exists = self.execute_double(&probe_script(name), false)? > 0.0;
        debug!(name, exists, "probed script function");
        Ok(exists)
    }

    /// Runs the script stored at `path`.
    ///
    /// In the background the plugin replies before the script finishes.
    pub fn run_script_file(&mut self, path: impl AsRef<Path>, background: bool) -> Result<Message> {
        let mut script = fs::read_to_string(path)?;
        if background {
            script.insert_str(0, BACKGROUND_MARKER);
        }
        self.execute_script(&script, false, SCRIPT_RESPONSE)
    }

    /// Applies a camera-object function to the camera at `camera`.
    ///
    /// Fails with [`Error::CapabilityUnavailable`] if the peer does not
    /// define `function`.
    pub fn camera_object(&mut self, function: &str, camera: i32) -> Result<Message> {
        if !self.has_function(function)? {
            return Err(Error::CapabilityUnavailable(function.to_owned()));
        }
        let script = camera_object_script(function, camera);
        self.execute_script(&script, camera != 0, SCRIPT_RESPONSE)
    }

    /// Camera-object function returning only a status.
    pub fn camera_object_status(&mut self, function: &str, camera: i32) -> Result<i32> {
        Ok(self.camera_object(function, camera)?.head())
    }

    /// Camera-object function returning a double.
    pub fn camera_object_double(&mut self, function: &str, camera: i32) -> Result<f64> {
        Ok(self.camera_object(function, camera)?.double(0))
    }

    /// Name of the camera at `camera`.
    ///
    /// Script replies carry a status and a double but no text, so current
    /// plugins cannot report the name this way and the call fails with
    /// [`Error::CapabilityUnavailable`] once the script has run.
    pub fn camera_name(&mut self, camera: i32) -> Result<String> {
        let response = self.camera_object("CM_GetCameraName", camera)?;
        if response.array.is_empty() {
            return Err(Error::CapabilityUnavailable(
                "camera name text in script reply".into(),
            ));
        }
        Ok(text::decode_str(&response.array, self.byte_order()))
    }

    /// Prepares a fresh dark reference for the camera at `camera`.
    pub fn prepare_dark_reference(&mut self, camera: i32) -> Result<i32> {
        self.camera_object_status("CM_PrepareDarkReference", camera)
    }

    /// Refreshes the K2 hardware dark reference for the camera at `camera`.
    pub fn update_hardware_dark_reference(&mut self, camera: i32) -> Result<i32> {
        self.camera_object_status("K2_updateHardwareDarkReference", camera)
    }
}
