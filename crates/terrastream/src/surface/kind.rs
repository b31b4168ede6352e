use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};

/// The synthetic surface selected for a request.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Elevation,
    Temperature,
    Pressure,
    Noise,
    SineWave,
}

impl FieldKind {
    pub const ALL: [Self; 5] = [
        Self::Elevation,
        Self::Temperature,
        Self::Pressure,
        Self::Noise,
        Self::SineWave,
    ];

    /// Wire key for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Elevation => "elevation",
            Self::Temperature => "temperature",
            Self::Pressure => "pressure",
            Self::Noise => "noise",
            Self::SineWave => "sine_wave",
        }
    }

    /// Looks up a kind by its exact wire key.
    pub fn lookup(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// Like [`FieldKind::lookup`] but unknown keys fall back to
    /// [`FieldKind::Elevation`].
    pub fn resolve(key: &str) -> Self {
        Self::lookup(key).unwrap_or_default()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned by [`FieldKind::from_str`] for keys outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field kind: {0}")]
pub struct UnknownFieldKind(pub String);

impl FromStr for FieldKind {
    type Err = UnknownFieldKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| UnknownFieldKind(s.to_string()))
    }
}
