//! Image acquisition: live camera frames and uploaded files, normalized to
//! one payload representation so the rest of the pipeline is format-agnostic.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::{fmt, path::Path, time::Duration};
use thiserror::Error;

/// Upper bound on an uploaded file, matching the upload widget's limit.
pub const MAX_FILE_BYTES: usize = 10_090_000;

/// Pause inserted after a successful capture so the captured-frame preview
/// can render before the step advances.
pub const CAPTURE_PREVIEW_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no camera is available; use the file upload path")]
    CameraUnavailable,

    #[error("the camera produced an empty frame")]
    EmptyFrame,

    #[error("unsupported file type {0:?}; accepted types are jpeg, png and pdf")]
    UnsupportedFormat(String),

    #[error("file is {0} bytes, over the {MAX_FILE_BYTES} byte limit")]
    FileTooLarge(usize),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepted payload encodings, per the upload accept-filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Pdf,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Pdf => "application/pdf",
        }
    }

    fn from_path(path: &Path) -> Result<Self, CaptureError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "pdf" => Ok(ImageFormat::Pdf),
            other => Err(CaptureError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// An acquired image, camera frame or uploaded file alike.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    format: ImageFormat,
    bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as a data URL, the form the verification service accepts.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Camera facing preference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera, toward the user.
    User,
    /// Rear camera, toward the scene.
    Environment,
}

/// Which of the two required captures is being taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureStage {
    Document,
    Portrait,
}

/// Fixed for the lifetime of one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    Mobile,
    Desktop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraAvailability {
    /// Probe has not completed yet.
    Unknown,
    Available,
    Unavailable,
}

/// Device camera capability. Implementations hand out one stream at a time.
///
/// TODO: wire a real webcam implementation once a capture backend is chosen
/// for the desktop build; today only the simulations provide one.
pub trait MediaCapture {
    fn open(&mut self, facing: FacingMode) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// An open camera stream a still frame can be grabbed from.
pub trait CameraStream {
    /// Grab one frame, encoded at the stream's native resolution. Rescaling
    /// loses detail the verification service's OCR depends on.
    fn grab_frame(&mut self) -> Result<ImagePayload, CaptureError>;
}

/// File access capability backing the upload path.
pub trait FileReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error>;
}

/// Reads from the local filesystem.
pub struct FsFileReader;

impl FileReader for FsFileReader {
    fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        std::fs::read(path)
    }
}

/// Owns camera state and the two captured images for one session.
pub struct CaptureController {
    device_class: DeviceClass,
    availability: CameraAvailability,
    // The camera is exclusive: at most one open stream, replaced when the
    // capture stage changes.
    stream: Option<Box<dyn CameraStream>>,
    document_image: Option<ImagePayload>,
    portrait_image: Option<ImagePayload>,
}

impl CaptureController {
    pub fn new(device_class: DeviceClass) -> Self {
        Self {
            device_class,
            availability: CameraAvailability::Unknown,
            stream: None,
            document_image: None,
            portrait_image: None,
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        self.device_class
    }

    pub fn camera_availability(&self) -> CameraAvailability {
        self.availability
    }

    /// Facing preference for a capture stage. Document capture prefers the
    /// rear camera on phones and the front camera on desktops; the portrait
    /// is always taken with the front camera.
    pub fn facing_for(&self, stage: CaptureStage) -> FacingMode {
        match (stage, self.device_class) {
            (CaptureStage::Portrait, _) => FacingMode::User,
            (CaptureStage::Document, DeviceClass::Mobile) => FacingMode::Environment,
            (CaptureStage::Document, DeviceClass::Desktop) => FacingMode::User,
        }
    }

    /// Probe the camera for the given stage, replacing any stream held for a
    /// previous stage. Failure is not fatal: the session degrades to the
    /// file upload path.
    pub fn probe_camera(
        &mut self,
        media: &mut dyn MediaCapture,
        stage: CaptureStage,
    ) -> CameraAvailability {
        match media.open(self.facing_for(stage)) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.availability = CameraAvailability::Available;
            }
            Err(error) => {
                tracing::warn!(%error, "camera unavailable; offering file upload only");
                self.stream = None;
                self.availability = CameraAvailability::Unavailable;
            }
        }

        self.availability
    }

    /// Grab a frame from the active stream and store it for the stage.
    pub fn capture_frame(&mut self, stage: CaptureStage) -> Result<ImagePayload, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(CaptureError::CameraUnavailable)?;

        let frame = stream.grab_frame()?;
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }

        self.store(stage, frame.clone());
        Ok(frame)
    }

    /// Read an uploaded file, apply the accept-filter and size cap, and store
    /// the payload for the stage.
    pub fn upload_file(
        &mut self,
        reader: &dyn FileReader,
        path: &Path,
        stage: CaptureStage,
    ) -> Result<ImagePayload, CaptureError> {
        let format = ImageFormat::from_path(path)?;
        let bytes = reader.read(path)?;

        if bytes.len() > MAX_FILE_BYTES {
            return Err(CaptureError::FileTooLarge(bytes.len()));
        }
        if bytes.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }

        let payload = ImagePayload::new(format, bytes);
        self.store(stage, payload.clone());
        Ok(payload)
    }

    fn store(&mut self, stage: CaptureStage, payload: ImagePayload) {
        tracing::info!(?stage, payload = ?payload, "image captured");
        match stage {
            CaptureStage::Document => self.document_image = Some(payload),
            CaptureStage::Portrait => self.portrait_image = Some(payload),
        }
    }

    pub fn document_image(&self) -> Option<&ImagePayload> {
        self.document_image.as_ref()
    }

    pub fn portrait_image(&self) -> Option<&ImagePayload> {
        self.portrait_image.as_ref()
    }

    pub fn both_present(&self) -> bool {
        self.document_image.is_some() && self.portrait_image.is_some()
    }

    /// Wholesale replacement on "start over": both images are dropped.
    pub fn clear_images(&mut self) {
        self.document_image = None;
        self.portrait_image = None;
    }
}
