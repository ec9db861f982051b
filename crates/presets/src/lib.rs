//! Layered effect configuration.
//!
//! Every effect resolves its parameters from three layers with a fixed
//! precedence: built-in defaults, then a named preset from a TOML file, then
//! explicit overrides. Explicit beats preset beats default, and resolution
//! happens once, at mount time.
//!
//! Preset files group patches per effect:
//!
//! ```toml
//! version = 1
//!
//! [vortex.calm]
//! spin_speed = 2.0
//! contrast = 2.5
//!
//! [ether.card]
//! mouse_force = 15.0
//! resolution = 0.4
//! auto_demo = false
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use effects::{BeamsConfig, BeamsPatch, EtherConfig, EtherPatch, VortexConfig, VortexPatch};

/// Presets shipped with the binary.
const BUILTIN_PRESETS: &str = r##"version = 1

[vortex.ember]
color1 = "#DE443B"
color2 = "#006BB4"
color3 = "#162325"

[vortex.calm]
spin_speed = 2.0
contrast = 2.5
lighting = 0.3
color1 = "#2B4162"
color2 = "#385F71"
color3 = "#0B0C10"

[vortex.carousel]
rotate = true
spin_rotation = -1.2

[beams.midnight]
light_color = "#ffffff"
noise_intensity = 1.75

[beams.dusk]
light_color = "#FFB347"
speed = 1.2
rotation = 12.0

[ether.backdrop]
mouse_force = 20.0
cursor_size = 100.0
resolution = 0.6
auto_demo = true

[ether.card]
mouse_force = 15.0
cursor_size = 80.0
resolution = 0.4
auto_demo = false
auto_speed = 0.3
auto_intensity = 1.5
"##;

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("failed to read preset file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse presets: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown {effect} preset '{name}'")]
    UnknownPreset { effect: &'static str, name: String },
}

fn default_version() -> u32 {
    1
}

/// A parsed preset file: named patches per effect.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresetFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub vortex: BTreeMap<String, VortexPatch>,
    #[serde(default)]
    pub beams: BTreeMap<String, BeamsPatch>,
    #[serde(default)]
    pub ether: BTreeMap<String, EtherPatch>,
}

impl Default for PresetFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            vortex: BTreeMap::new(),
            beams: BTreeMap::new(),
            ether: BTreeMap::new(),
        }
    }
}

impl PresetFile {
    pub fn from_toml_str(source: &str) -> Result<Self, PresetError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, PresetError> {
        let source = fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// The preset set shipped with the binary.
    pub fn builtin() -> Result<Self, PresetError> {
        Self::from_toml_str(BUILTIN_PRESETS)
    }

    /// Preset names per effect, for listings.
    pub fn names(&self) -> impl Iterator<Item = (&'static str, &str)> {
        let vortex = self.vortex.keys().map(|name| ("vortex", name.as_str()));
        let beams = self.beams.keys().map(|name| ("beams", name.as_str()));
        let ether = self.ether.keys().map(|name| ("ether", name.as_str()));
        vortex.chain(beams).chain(ether)
    }

    pub fn resolve_vortex(
        &self,
        preset: Option<&str>,
        overrides: &VortexPatch,
    ) -> Result<VortexConfig, PresetError> {
        let mut config = VortexConfig::default();
        if let Some(name) = preset {
            self.vortex
                .get(name)
                .ok_or_else(|| PresetError::UnknownPreset {
                    effect: "vortex",
                    name: name.to_owned(),
                })?
                .apply_to(&mut config);
        }
        overrides.apply_to(&mut config);
        Ok(config)
    }

    pub fn resolve_beams(
        &self,
        preset: Option<&str>,
        overrides: &BeamsPatch,
    ) -> Result<BeamsConfig, PresetError> {
        let mut config = BeamsConfig::default();
        if let Some(name) = preset {
            self.beams
                .get(name)
                .ok_or_else(|| PresetError::UnknownPreset {
                    effect: "beams",
                    name: name.to_owned(),
                })?
                .apply_to(&mut config);
        }
        overrides.apply_to(&mut config);
        Ok(config)
    }

    pub fn resolve_ether(
        &self,
        preset: Option<&str>,
        overrides: &EtherPatch,
    ) -> Result<EtherConfig, PresetError> {
        let mut config = EtherConfig::default();
        if let Some(name) = preset {
            self.ether
                .get(name)
                .ok_or_else(|| PresetError::UnknownPreset {
                    effect: "ether",
                    name: name.to_owned(),
                })?
                .apply_to(&mut config);
        }
        overrides.apply_to(&mut config);
        Ok(config)
    }
}

/// Builds a patch from `key = value` assignment lines (TOML syntax on the
/// right-hand side, so strings keep their quotes).
pub fn patch_from_assignments<T>(assignments: &[String]) -> Result<T, PresetError>
where
    T: DeserializeOwned + Default,
{
    if assignments.is_empty() {
        return Ok(T::default());
    }
    let document = assignments.join("\n");
    Ok(toml::from_str(&document)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_presets_parse() {
        let file = PresetFile::builtin().unwrap();
        assert!(file.vortex.contains_key("calm"));
        assert!(file.beams.contains_key("midnight"));
        assert!(file.ether.contains_key("card"));
    }

    #[test]
    fn explicit_overrides_beat_preset_beats_default() {
        let file = PresetFile::from_toml_str(
            r#"
version = 1

[vortex.test]
spin_speed = 3.0
contrast = 1.5
"#,
        )
        .unwrap();

        let overrides = VortexPatch {
            spin_speed: Some(9.0),
            ..VortexPatch::default()
        };
        let config = file.resolve_vortex(Some("test"), &overrides).unwrap();
        // Explicit override wins.
        assert_eq!(config.spin_speed, 9.0);
        // Preset beats the default.
        assert_eq!(config.contrast, 1.5);
        // Untouched fields keep defaults.
        assert_eq!(config.lighting, 0.4);
    }

    #[test]
    fn unknown_preset_is_a_typed_error() {
        let file = PresetFile::default();
        let result = file.resolve_ether(Some("missing"), &EtherPatch::default());
        assert!(matches!(
            result,
            Err(PresetError::UnknownPreset {
                effect: "ether",
                ..
            })
        ));
    }

    #[test]
    fn resolving_without_preset_uses_defaults() {
        let file = PresetFile::default();
        let config = file.resolve_beams(None, &BeamsPatch::default()).unwrap();
        assert_eq!(config.beam_count, 12);
    }

    #[test]
    fn assignments_build_a_patch() {
        let patch: EtherPatch = patch_from_assignments(&[
            "mouse_force = 12.5".to_owned(),
            "auto_demo = false".to_owned(),
        ])
        .unwrap();
        assert_eq!(patch.mouse_force, Some(12.5));
        assert_eq!(patch.auto_demo, Some(false));
        assert!(patch.cursor_size.is_none());
    }

    #[test]
    fn bad_assignment_reports_parse_error() {
        let result: Result<VortexPatch, _> =
            patch_from_assignments(&["spin_speed = fast".to_owned()]);
        assert!(matches!(result, Err(PresetError::Parse(_))));
    }

    #[test]
    fn version_defaults_to_one() {
        let file = PresetFile::from_toml_str("[vortex.x]\nspin_speed = 1.0\n").unwrap();
        assert_eq!(file.version, 1);
    }
}
