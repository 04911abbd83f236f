//! Per-source settings and plugin-level options.

use std::{collections::HashMap, time::Duration};

use tracing::warn;

use crate::transport::RecvColorFormat;

/// Settings key: name of the NDI source to connect to.
pub const PROP_SOURCE: &str = "ndi_source_name";
/// Settings key: bandwidth mode (0 highest, 1 lowest, 2 audio only).
pub const PROP_BANDWIDTH: &str = "ndi_bw_mode";
/// Settings key: request hardware-accelerated decoding.
pub const PROP_HW_ACCEL: &str = "ndi_recv_hw_accel";
/// Settings key: timestamp source (0 internal, 1 sender timestamp).
pub const PROP_SYNC: &str = "ndi_sync";
/// Settings key: alpha blending fix.
pub const PROP_FIX_ALPHA: &str = "ndi_fix_alpha_blending";

pub const PROP_BW_HIGHEST: i64 = 0;
pub const PROP_BW_LOWEST: i64 = 1;
pub const PROP_BW_AUDIO_ONLY: i64 = 2;

pub const PROP_SYNC_INTERNAL: i64 = 0;
pub const PROP_SYNC_NDI_TIMESTAMP: i64 = 1;

/// Default bound on a single capture call.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Read access to the host's settings map.
///
/// Missing keys read as the type's zero value, like the host does.
pub trait SettingsData {
    fn get_string(&self, key: &str) -> String;
    fn get_int(&self, key: &str) -> i64;
    fn get_bool(&self, key: &str) -> bool;
}

/// A value stored in [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Bool(bool),
}

/// In-memory settings map.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_string<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.values
            .insert(key.into(), SettingValue::String(value.into()));
        self
    }

    pub fn set_int<K: Into<String>>(&mut self, key: K, value: i64) -> &mut Self {
        self.values.insert(key.into(), SettingValue::Int(value));
        self
    }

    pub fn set_bool<K: Into<String>>(&mut self, key: K, value: bool) -> &mut Self {
        self.values.insert(key.into(), SettingValue::Bool(value));
        self
    }
}

impl SettingsData for Settings {
    fn get_string(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(SettingValue::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn get_int(&self, key: &str) -> i64 {
        match self.values.get(key) {
            Some(SettingValue::Int(v)) => *v,
            _ => 0,
        }
    }

    fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(SettingValue::Bool(true)))
    }
}

/// Requested stream detail level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    #[default]
    Highest,
    Lowest,
    AudioOnly,
}

impl Bandwidth {
    /// Decodes the `ndi_bw_mode` setting; unknown values fall back to `Highest`.
    pub fn from_setting(value: i64) -> Self {
        match value {
            PROP_BW_HIGHEST => Bandwidth::Highest,
            PROP_BW_LOWEST => Bandwidth::Lowest,
            PROP_BW_AUDIO_ONLY => Bandwidth::AudioOnly,
            other => {
                warn!(value = other, "unknown bandwidth mode, using highest");
                Bandwidth::Highest
            }
        }
    }
}

/// Where frame timestamps come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Stamp frames with the host clock when they are translated.
    #[default]
    Internal,
    /// Use the sender's timestamp, converted to nanoseconds.
    SenderTimestamp,
}

impl SyncMode {
    /// Decodes the `ndi_sync` setting; anything but 1 means internal.
    pub fn from_setting(value: i64) -> Self {
        match value {
            PROP_SYNC_NDI_TIMESTAMP => SyncMode::SenderTimestamp,
            _ => SyncMode::Internal,
        }
    }
}

/// Snapshot of one source's settings.
///
/// Built on every update and moved into the worker; never shared mutably.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    pub source_name: String,
    pub bandwidth: Bandwidth,
    pub hw_accel: bool,
    pub sync: SyncMode,
    /// Read and carried, not yet applied to translation.
    pub fix_alpha: bool,
}

impl SourceSettings {
    /// Reads every known key from the host's settings map.
    pub fn from_data<D: SettingsData + ?Sized>(data: &D) -> Self {
        Self {
            source_name: data.get_string(PROP_SOURCE),
            bandwidth: Bandwidth::from_setting(data.get_int(PROP_BANDWIDTH)),
            hw_accel: data.get_bool(PROP_HW_ACCEL),
            sync: SyncMode::from_setting(data.get_int(PROP_SYNC)),
            fix_alpha: data.get_bool(PROP_FIX_ALPHA),
        }
    }

    /// Whether a connection can be attempted at all.
    pub fn has_source(&self) -> bool {
        !self.source_name.is_empty()
    }
}

/// Plugin-level options shared by every source instance.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ndi_source::SourceOptions;
///
/// let options = SourceOptions::builder()
///     .capture_timeout(Duration::from_millis(250))
///     .emit_audio(true)
///     .build();
/// assert!(options.emit_audio);
/// ```
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Upper bound on one capture call, and so on shutdown latency.
    pub capture_timeout: Duration,
    /// Translate and emit received audio instead of only releasing it.
    pub emit_audio: bool,
    /// Name this receiver announces to senders.
    pub receiver_name: Option<String>,
    pub color_format: RecvColorFormat,
}

impl Default for SourceOptions {
    fn default() -> Self {
        SourceOptionsBuilder::new().build()
    }
}

impl SourceOptions {
    /// Create a builder for configuring source options
    pub fn builder() -> SourceOptionsBuilder {
        SourceOptionsBuilder::new()
    }
}

/// Builder for [`SourceOptions`].
#[derive(Debug, Clone, Default)]
pub struct SourceOptionsBuilder {
    capture_timeout: Option<Duration>,
    emit_audio: Option<bool>,
    receiver_name: Option<String>,
    color_format: Option<RecvColorFormat>,
}

impl SourceOptionsBuilder {
    /// Creates a new builder with default settings.
    ///
    /// Default settings:
    /// - `capture_timeout`: 1000 ms
    /// - `emit_audio`: `false`
    /// - `receiver_name`: `None`
    /// - `color_format`: `UYVY_BGRA`
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn emit_audio(mut self, enabled: bool) -> Self {
        self.emit_audio = Some(enabled);
        self
    }

    #[must_use]
    pub fn receiver_name<S: Into<String>>(mut self, name: S) -> Self {
        self.receiver_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn color_format(mut self, format: RecvColorFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    #[must_use]
    pub fn build(self) -> SourceOptions {
        SourceOptions {
            capture_timeout: self.capture_timeout.unwrap_or(DEFAULT_CAPTURE_TIMEOUT),
            emit_audio: self.emit_audio.unwrap_or(false),
            receiver_name: self.receiver_name,
            color_format: self.color_format.unwrap_or(RecvColorFormat::UYVY_BGRA),
        }
    }
}
