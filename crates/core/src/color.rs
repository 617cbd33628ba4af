//! Color model: RGB triples plus the named color and emotion tables.
//!
//! The tables are configuration, not persisted state. A built-in set covers
//! the common cases; a JSON file can extend or override it:
//!
//! ```json
//! {
//!   "colors": { "teal": [0, 128, 128] },
//!   "emotions": { "joy": "teal" }
//! }
//! ```
//!
//! Names are case-insensitive. Channel values outside 0..=255 are rejected,
//! never clamped, so a bad table or literal fails before anything is
//! enqueued.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// An RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// All channels at zero; the "off" color.
    pub const OFF: Rgb = Rgb::new(0, 0, 0);
    /// Full white, used as the reset color when cycling stops.
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse an `r,g,b` literal with decimal channels.
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(Error::InvalidColor(format!(
                "expected `r,g,b` with three channels, got `{s}`"
            )));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = parse_channel(part)?;
        }
        Ok(Self::new(channels[0], channels[1], channels[2]))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

fn parse_channel(s: &str) -> Result<u8> {
    let value: i64 = s
        .parse()
        .map_err(|_| Error::InvalidColor(format!("channel `{s}` is not a number")))?;
    if !(0..=255).contains(&value) {
        return Err(Error::InvalidColor(format!(
            "channel value {value} out of range (allowed 0..=255)"
        )));
    }
    Ok(value as u8)
}

/// On-disk table format. Both sections are optional; whatever is present
/// extends or overrides the built-in tables.
#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    colors: HashMap<String, [i64; 3]>,
    #[serde(default)]
    emotions: HashMap<String, String>,
}

/// Named colors plus the emotion-to-color mapping.
///
/// `white` and `off` always exist: loading a file merges over the built-in
/// defaults rather than replacing them.
#[derive(Debug, Clone)]
pub struct ColorTable {
    colors: HashMap<String, Rgb>,
    emotions: HashMap<String, String>,
}

impl Default for ColorTable {
    fn default() -> Self {
        let colors = [
            ("off", Rgb::OFF),
            ("white", Rgb::WHITE),
            ("red", Rgb::new(255, 0, 0)),
            ("green", Rgb::new(0, 255, 0)),
            ("blue", Rgb::new(0, 0, 255)),
            ("yellow", Rgb::new(255, 255, 0)),
            ("cyan", Rgb::new(0, 255, 255)),
            ("magenta", Rgb::new(255, 0, 255)),
            ("orange", Rgb::new(255, 165, 0)),
            ("purple", Rgb::new(128, 0, 128)),
        ]
        .into_iter()
        .map(|(name, rgb)| (name.to_string(), rgb))
        .collect();

        let emotions = [
            ("anger", "red"),
            ("disgust", "green"),
            ("fear", "purple"),
            ("joy", "yellow"),
            ("neutral", "white"),
            ("sadness", "blue"),
            ("surprise", "orange"),
        ]
        .into_iter()
        .map(|(label, color)| (label.to_string(), color.to_string()))
        .collect();

        Self { colors, emotions }
    }
}

impl ColorTable {
    /// Load a JSON table file and merge it over the built-in defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Table(format!("{}: {e}", path.display())))?;
        let file: TableFile = serde_json::from_str(&text)
            .map_err(|e| Error::Table(format!("{}: {e}", path.display())))?;

        let mut table = Self::default();
        for (name, channels) in file.colors {
            let [r, g, b] = channels;
            let rgb = Rgb::new(
                check_channel(&name, r)?,
                check_channel(&name, g)?,
                check_channel(&name, b)?,
            );
            table.colors.insert(name.to_lowercase(), rgb);
        }
        for (label, color) in file.emotions {
            let color = color.to_lowercase();
            if !table.colors.contains_key(&color) {
                return Err(Error::Table(format!(
                    "emotion `{label}` maps to unknown color `{color}`"
                )));
            }
            table.emotions.insert(label.to_lowercase(), color);
        }
        debug!(
            colors = table.colors.len(),
            emotions = table.emotions.len(),
            path = %path.display(),
            "Loaded color table"
        );
        Ok(table)
    }

    /// Look up a color by name. Case-insensitive.
    pub fn get(&self, name: &str) -> Option<Rgb> {
        self.colors.get(&name.to_lowercase()).copied()
    }

    /// Resolve a color given either a known name or an `r,g,b` literal.
    pub fn resolve(&self, spec: &str) -> Result<Rgb> {
        if spec.contains(',') {
            return Rgb::parse(spec);
        }
        self.get(spec).ok_or_else(|| {
            Error::InvalidColor(format!(
                "unknown color name `{spec}` (known: {})",
                self.color_names().join(", ")
            ))
        })
    }

    /// Name of the color configured for an emotion label. Case-insensitive.
    pub fn emotion_target(&self, label: &str) -> Option<&str> {
        self.emotions.get(&label.to_lowercase()).map(String::as_str)
    }

    /// Known color names, sorted for display.
    pub fn color_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.colors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Known emotion labels, sorted for display.
    pub fn emotion_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.emotions.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

fn check_channel(name: &str, value: i64) -> Result<u8> {
    if !(0..=255).contains(&value) {
        return Err(Error::Table(format!(
            "color `{name}`: channel value {value} out of range (allowed 0..=255)"
        )));
    }
    Ok(value as u8)
}
