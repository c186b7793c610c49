/// Transform options and the store that holds them
///
/// The option record is what gets handed to the engine with every request.
/// It is serialized to camelCase JSON, which is the engine's wire format.

use serde::{Deserialize, Serialize};

/// All tunable parameters for the batch transform
///
/// The record is `Copy`: every read is a snapshot, so a request that was
/// issued before a slider moved keeps the values it was issued with.
/// No range validation happens here — the sliders constrain what the user
/// can enter, and anything else is the engine's problem to reject.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Lower bound of the random resize scale (fraction of original size)
    pub resize_min: f32,
    /// Upper bound of the random resize scale
    pub resize_max: f32,
    /// Maximum random rotation in degrees, both directions
    pub rotate_max_deg: f32,
    /// Maximum brightness perturbation, both directions
    pub brightness_range: f32,
    /// Maximum contrast perturbation, both directions
    pub contrast_range: f32,
    /// Standard deviation of injected pixel noise
    pub noise_sigma: f32,
    /// JPEG re-encode quality, 1-100 (UI offers 50-100)
    pub jpeg_quality: u8,
    /// WEBP re-encode quality, 1-100 (UI offers 50-100)
    pub webp_quality: u8,
    /// Whether the engine should drop EXIF metadata on output
    pub strip_exif: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            resize_min: 0.9,
            resize_max: 1.1,
            rotate_max_deg: 2.0,
            brightness_range: 5.0,
            contrast_range: 5.0,
            noise_sigma: 1.0,
            jpeg_quality: 90,
            webp_quality: 90,
            strip_exif: true,
        }
    }
}

/// A single-field mutation of the option record
///
/// The UI edits one field at a time; routing every edit through this enum
/// keeps "replace exactly one field" a structural guarantee instead of a
/// convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionUpdate {
    ResizeMin(f32),
    ResizeMax(f32),
    RotateMaxDeg(f32),
    BrightnessRange(f32),
    ContrastRange(f32),
    NoiseSigma(f32),
    JpegQuality(u8),
    WebpQuality(u8),
    StripExif(bool),
}

impl OptionUpdate {
    /// Apply this update to an option record, touching only its own field
    fn apply(self, options: &mut ConvertOptions) {
        match self {
            OptionUpdate::ResizeMin(v) => options.resize_min = v,
            OptionUpdate::ResizeMax(v) => options.resize_max = v,
            OptionUpdate::RotateMaxDeg(v) => options.rotate_max_deg = v,
            OptionUpdate::BrightnessRange(v) => options.brightness_range = v,
            OptionUpdate::ContrastRange(v) => options.contrast_range = v,
            OptionUpdate::NoiseSigma(v) => options.noise_sigma = v,
            OptionUpdate::JpegQuality(v) => options.jpeg_quality = v,
            OptionUpdate::WebpQuality(v) => options.webp_quality = v,
            OptionUpdate::StripExif(v) => options.strip_exif = v,
        }
    }
}

/// Observer callback invoked after every store mutation
type Observer = Box<dyn Fn(&ConvertOptions) + Send>;

/// Holds the current option record for the session
///
/// Lives as long as the session. Mutations go through `set` (one field) or
/// `replace` (whole record, used when a preset loads); both notify every
/// observer synchronously before returning.
pub struct OptionStore {
    current: ConvertOptions,
    observers: Vec<Observer>,
}

impl OptionStore {
    /// Create a store seeded with the default options
    pub fn new() -> Self {
        Self {
            current: ConvertOptions::default(),
            observers: Vec::new(),
        }
    }

    /// Current snapshot (a copy — later mutations don't reach it)
    pub fn get(&self) -> ConvertOptions {
        self.current
    }

    /// Replace exactly one field, leaving the others untouched
    pub fn set(&mut self, update: OptionUpdate) {
        update.apply(&mut self.current);
        self.notify();
    }

    /// Swap in a whole record at once (preset load)
    pub fn replace(&mut self, options: ConvertOptions) {
        self.current = options;
        self.notify();
    }

    /// Register an observer; it fires on every subsequent mutation
    pub fn subscribe(&mut self, observer: impl Fn(&ConvertOptions) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer(&self.current);
        }
    }
}

impl std::fmt::Debug for OptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionStore")
            .field("current", &self.current)
            .field("observers", &self.observers.len())
            .finish()
    }
}
