use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClipcamConfig {
    pub camera: CameraConfig,
    pub annotation: AnnotationConfig,
    pub recording: RecordingConfig,
    pub output: OutputConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Native capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Preferred camera facing for the first acquisition attempt
    /// ("environment" or "any"); the fallback attempt is always unconstrained
    #[serde(default = "default_camera_facing")]
    pub facing: String,

    /// Request a microphone track alongside video
    #[serde(default = "default_camera_audio")]
    pub audio: bool,

    /// Simulate a host without an environment-facing camera so the
    /// unconstrained fallback path is taken (synthetic provider only)
    #[serde(default)]
    pub simulate_missing_environment: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnnotationConfig {
    /// Target annotation frame rate (frame-presentation cadence)
    #[serde(default = "default_annotation_fps")]
    pub fps: u32,

    /// Radius in pixels for rendered facial keypoints
    #[serde(default = "default_keypoint_radius")]
    pub keypoint_radius: u32,

    /// Initial displayed video size the overlay is sized to (width, height)
    #[serde(default = "default_display_size")]
    pub display_size: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Recording duration in whole minutes; 0 means unbounded (manual stop)
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,

    /// Encoded chunk cadence in milliseconds (synthetic provider only)
    #[serde(default = "default_timeslice_ms")]
    pub timeslice_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Directory finished artifacts are written to
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ClipcamConfig {
    /// Load configuration from a file path plus `CLIPCAM_*` env overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.facing", default_camera_facing())?
            .set_default("camera.audio", default_camera_audio())?
            .set_default("camera.simulate_missing_environment", false)?
            .set_default("annotation.fps", default_annotation_fps())?
            .set_default("annotation.keypoint_radius", default_keypoint_radius())?
            .set_default(
                "annotation.display_size",
                vec![default_display_size().0, default_display_size().1],
            )?
            .set_default("recording.duration_minutes", default_duration_minutes())?
            .set_default("recording.timeslice_ms", default_timeslice_ms() as i64)?
            .set_default("output.dir", default_output_dir())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with CLIPCAM_ prefix
            .add_source(Environment::with_prefix("CLIPCAM").separator("_"))
            .build()?;

        let config: ClipcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.annotation.fps == 0 {
            return Err(ConfigError::Message(
                "Annotation fps must be greater than 0".to_string(),
            ));
        }

        if self.annotation.display_size.0 == 0 || self.annotation.display_size.1 == 0 {
            return Err(ConfigError::Message(
                "Annotation display size must be greater than 0".to_string(),
            ));
        }

        if self.recording.timeslice_ms == 0 {
            return Err(ConfigError::Message(
                "Recording timeslice must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ClipcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                facing: default_camera_facing(),
                audio: default_camera_audio(),
                simulate_missing_environment: false,
            },
            annotation: AnnotationConfig {
                fps: default_annotation_fps(),
                keypoint_radius: default_keypoint_radius(),
                display_size: default_display_size(),
            },
            recording: RecordingConfig {
                duration_minutes: default_duration_minutes(),
                timeslice_ms: default_timeslice_ms(),
            },
            output: OutputConfig {
                dir: default_output_dir(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}

fn default_camera_fps() -> u32 {
    30
}

fn default_camera_facing() -> String {
    "environment".to_string()
}

fn default_camera_audio() -> bool {
    true
}

fn default_annotation_fps() -> u32 {
    30
}

fn default_keypoint_radius() -> u32 {
    3
}

fn default_display_size() -> (u32, u32) {
    (640, 360)
}

fn default_duration_minutes() -> u32 {
    1
}

fn default_timeslice_ms() -> u64 {
    1000
}

fn default_output_dir() -> String {
    "./recordings".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}
