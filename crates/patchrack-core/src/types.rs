//! Shared domain types
//!
//! The synth model tag is the closed set of hardware the librarian speaks to.
//! Wire formats live in patchrack-midi; the database only needs the tag as
//! part of the (model, fingerprint) dedup key.

use serde::{Deserialize, Serialize};

/// Supported synthesizer models
///
/// Adding a model means adding a variant here plus a descriptor in
/// patchrack-midi; nothing in the engines changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthModel {
    /// Sequential Prophet Rev2
    Rev2,
    /// Sequential / DSI OB-6
    Ob6,
    /// Pioneer Toraiz AS-1
    ToraizAs1,
}

impl SynthModel {
    /// Stable tag stored in the database key
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Rev2 => "rev2",
            Self::Ob6 => "ob6",
            Self::ToraizAs1 => "toraiz_as1",
        }
    }

    /// Human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rev2 => "Sequential Prophet Rev2",
            Self::Ob6 => "Sequential OB-6",
            Self::ToraizAs1 => "Pioneer Toraiz AS-1",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "rev2" => Some(Self::Rev2),
            "ob6" => Some(Self::Ob6),
            "toraiz_as1" => Some(Self::ToraizAs1),
            _ => None,
        }
    }

    /// All supported models, in descriptor registration order
    pub fn all() -> &'static [SynthModel] {
        &[Self::Rev2, Self::Ob6, Self::ToraizAs1]
    }
}

impl std::fmt::Display for SynthModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where an imported patch came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatchSource {
    /// Dumped from a detected device
    Device {
        /// Display name of the device at import time
        device: String,
    },
    /// Imported from a sysex file on disk
    File {
        /// Path the file was read from
        path: String,
    },
}

impl PatchSource {
    /// Stable kind tag for the database column
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Device { .. } => "device",
            Self::File { .. } => "file",
        }
    }

    /// The device name or file path, depending on kind
    pub fn name(&self) -> &str {
        match self {
            Self::Device { device } => device,
            Self::File { path } => path,
        }
    }

    pub fn from_parts(kind: &str, name: &str) -> Option<Self> {
        match kind {
            "device" => Some(Self::Device { device: name.to_string() }),
            "file" => Some(Self::File { path: name.to_string() }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_tag_roundtrip() {
        for model in SynthModel::all() {
            assert_eq!(SynthModel::from_tag(model.tag()), Some(*model));
        }
        assert_eq!(SynthModel::from_tag("dx7"), None);
    }

    #[test]
    fn test_source_parts_roundtrip() {
        let source = PatchSource::File { path: "/tmp/bank.syx".to_string() };
        assert_eq!(
            PatchSource::from_parts(source.kind(), source.name()),
            Some(source)
        );
        assert_eq!(PatchSource::from_parts("cloud", "x"), None);
    }
}
