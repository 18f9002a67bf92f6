//! Light-domain values exchanged with lightsd
//!
//! These types only exist to get the wire shapes right: lightsd takes colors
//! as positional `hue, saturation, brightness, kelvin` parameters, reports
//! them back as a 4-element `hsbk` array, and names waveforms in upper case.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which bulbs a command applies to
///
/// A selector is `"*"` (every bulb), `"#tag"` (a tag group), a label or a
/// device address. lightsd also accepts a list of selectors, so a target
/// serializes either as a string or as an array of strings.
///
/// # Examples
///
/// ```rust
/// use lightsc_client::Target;
///
/// assert_eq!(serde_json::to_string(&Target::all()).unwrap(), "\"*\"");
/// assert_eq!(Target::tag("kitchen").to_string(), "#kitchen");
///
/// let many = Target::from(vec!["#kitchen", "porch"]);
/// assert_eq!(serde_json::to_string(&many).unwrap(), r##"["#kitchen","porch"]"##);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// A single selector
    One(String),
    /// Several selectors, the union of which is targeted
    Many(Vec<String>),
}

impl Target {
    /// Every bulb known to lightsd
    pub fn all() -> Self {
        Target::One("*".to_string())
    }

    /// Every bulb carrying `tag`
    pub fn tag(tag: &str) -> Self {
        Target::One(format!("#{}", tag))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::One(selector) => f.write_str(selector),
            Target::Many(selectors) => f.write_str(&selectors.join(",")),
        }
    }
}

impl From<&str> for Target {
    fn from(selector: &str) -> Self {
        Target::One(selector.to_string())
    }
}

impl From<String> for Target {
    fn from(selector: String) -> Self {
        Target::One(selector)
    }
}

impl From<&String> for Target {
    fn from(selector: &String) -> Self {
        Target::One(selector.clone())
    }
}

impl From<Vec<String>> for Target {
    fn from(selectors: Vec<String>) -> Self {
        Target::Many(selectors)
    }
}

impl From<Vec<&str>> for Target {
    fn from(selectors: Vec<&str>) -> Self {
        Target::Many(selectors.into_iter().map(str::to_string).collect())
    }
}

type HsbkArray = (f64, f64, f64, u16);

/// A color as lightsd understands it
///
/// On the wire this is the array `[hue, saturation, brightness, kelvin]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "HsbkArray", into = "HsbkArray")]
pub struct Hsbk {
    /// Hue in degrees, 0.0 to 360.0
    pub hue: f64,
    /// Saturation, 0.0 to 1.0
    pub saturation: f64,
    /// Brightness, 0.0 to 1.0
    pub brightness: f64,
    /// White point in kelvin, typically 2500 to 9000
    pub kelvin: u16,
}

impl Hsbk {
    pub fn new(hue: f64, saturation: f64, brightness: f64, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }

    /// Same color with brightness shifted by `delta` and clamped to `0.0..=1.0`
    pub fn with_brightness_delta(self, delta: f64) -> Self {
        Self {
            brightness: (self.brightness + delta).clamp(0.0, 1.0),
            ..self
        }
    }
}

impl From<HsbkArray> for Hsbk {
    fn from((hue, saturation, brightness, kelvin): HsbkArray) -> Self {
        Self::new(hue, saturation, brightness, kelvin)
    }
}

impl From<Hsbk> for HsbkArray {
    fn from(color: Hsbk) -> Self {
        (color.hue, color.saturation, color.brightness, color.kelvin)
    }
}

/// Periodic brightness/color animations supported by the bulbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Waveform {
    Saw,
    Sine,
    HalfSine,
    Triangle,
    Square,
}

impl Waveform {
    /// Name used in `set_waveform` parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Waveform::Saw => "SAW",
            Waveform::Sine => "SINE",
            Waveform::HalfSine => "HALF_SINE",
            Waveform::Triangle => "TRIANGLE",
            Waveform::Square => "SQUARE",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bulb as reported by `get_light_state`
///
/// Fields lightsd adds beyond these are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    /// Current color
    pub hsbk: Hsbk,
    /// Whether the bulb is on
    pub power: bool,
    /// User-assigned label
    pub label: String,
    /// Tags the bulb belongs to
    #[serde(default)]
    pub tags: Vec<String>,
}
