use super::rig::FeatureState;
use crate::scene::setup::{ClipPlanes, ShaderMode, UnitType};
use ar_constants::render_settings::{AR_FAR_CLIP, AR_NEAR_CLIP};
use bevy::prelude::*;

/// Value of one toggleable feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Flag(bool),
    Shader(ShaderMode),
    Clip(ClipPlanes),
    Flags(Vec<bool>),
    Units(UnitType),
}

/// Accessor pair for one feature plus the value it takes while AR is active.
struct FeatureToggle {
    name: &'static str,
    get: fn(&FeatureState) -> FeatureValue,
    set: fn(&mut FeatureState, &FeatureValue) -> bool,
    in_ar: fn(&FeatureState) -> FeatureValue,
}

/// Saves, overrides and restores the viewer features that conflict with AR.
///
/// The snapshot is single-use: a second `suspend` without a `restore` is
/// refused, and `restore` without a snapshot is a no-op.
pub struct SceneFeatureToggler {
    toggles: Vec<FeatureToggle>,
    saved: Option<Vec<FeatureValue>>,
}

impl Default for SceneFeatureToggler {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneFeatureToggler {
    pub fn new() -> Self {
        Self {
            toggles: default_toggles(),
            saved: None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.saved.is_some()
    }

    /// Feature names in snapshot order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.toggles.iter().map(|t| t.name)
    }

    /// Snapshot every feature, then switch each to its AR value.
    pub fn suspend(&mut self, state: &mut FeatureState) -> bool {
        if self.saved.is_some() {
            warn!("Scene features already suspended; nested AR entry ignored");
            return false;
        }

        let snapshot: Vec<FeatureValue> = self.toggles.iter().map(|t| (t.get)(state)).collect();
        for toggle in &self.toggles {
            let value = (toggle.in_ar)(state);
            if !(toggle.set)(state, &value) {
                warn!("Feature '{}' rejected its AR value", toggle.name);
            }
        }
        self.saved = Some(snapshot);
        debug!("Suspended {} scene features for AR", self.toggles.len());
        true
    }

    /// Write the snapshot back and clear it.
    pub fn restore(&mut self, state: &mut FeatureState) -> bool {
        let Some(snapshot) = self.saved.take() else {
            return false;
        };

        for (toggle, value) in self.toggles.iter().zip(snapshot.iter()) {
            if !(toggle.set)(state, value) {
                warn!("Feature '{}' could not be restored", toggle.name);
            }
        }
        debug!("Restored {} scene features", snapshot.len());
        true
    }
}

fn default_toggles() -> Vec<FeatureToggle> {
    vec![
        FeatureToggle {
            name: "floor",
            get: |s| FeatureValue::Flag(s.setup.floor_visible),
            set: |s, v| set_flag(v, &mut s.setup.floor_visible),
            in_ar: |_| FeatureValue::Flag(false),
        },
        FeatureToggle {
            name: "grid",
            get: |s| FeatureValue::Flag(s.setup.grid_visible),
            set: |s, v| set_flag(v, &mut s.setup.grid_visible),
            in_ar: |_| FeatureValue::Flag(false),
        },
        FeatureToggle {
            name: "tape",
            get: |s| FeatureValue::Flag(s.setup.tape_enabled),
            set: |s, v| set_flag(v, &mut s.setup.tape_enabled),
            in_ar: |_| FeatureValue::Flag(false),
        },
        FeatureToggle {
            name: "slicer",
            get: |s| FeatureValue::Flag(s.setup.slicer_enabled),
            set: |s, v| set_flag(v, &mut s.setup.slicer_enabled),
            in_ar: |_| FeatureValue::Flag(false),
        },
        FeatureToggle {
            name: "shader_mode",
            get: |s| FeatureValue::Shader(s.setup.shader_mode),
            set: |s, v| match v {
                FeatureValue::Shader(mode) => {
                    s.setup.shader_mode = *mode;
                    true
                }
                _ => false,
            },
            in_ar: |_| FeatureValue::Shader(ShaderMode::Default),
        },
        FeatureToggle {
            name: "annotations",
            get: |s| FeatureValue::Flag(s.setup.annotations_visible),
            set: |s, v| set_flag(v, &mut s.setup.annotations_visible),
            in_ar: |_| FeatureValue::Flag(false),
        },
        FeatureToggle {
            name: "navigation",
            get: |s| FeatureValue::Flag(s.setup.navigation_enabled),
            set: |s, v| set_flag(v, &mut s.setup.navigation_enabled),
            in_ar: |_| FeatureValue::Flag(false),
        },
        FeatureToggle {
            name: "clip_planes",
            get: |s| FeatureValue::Clip(s.clip),
            set: |s, v| match v {
                FeatureValue::Clip(clip) => {
                    s.clip = *clip;
                    true
                }
                _ => false,
            },
            in_ar: |_| {
                FeatureValue::Clip(ClipPlanes {
                    near: AR_NEAR_CLIP,
                    far: AR_FAR_CLIP,
                })
            },
        },
        FeatureToggle {
            name: "light_shadows",
            get: |s| FeatureValue::Flags(s.lights.iter().map(|l| l.shadows_enabled).collect()),
            set: |s, v| match v {
                FeatureValue::Flags(flags) => {
                    for (light, flag) in s.lights.iter_mut().zip(flags) {
                        light.shadows_enabled = *flag;
                    }
                    flags.len() == s.lights.len()
                }
                _ => false,
            },
            // Only the contact shadow casts while in AR.
            in_ar: |s| FeatureValue::Flags(vec![false; s.lights.len()]),
        },
        FeatureToggle {
            name: "units",
            get: |s| FeatureValue::Units(s.setup.units),
            set: |s, v| match v {
                FeatureValue::Units(units) => {
                    s.setup.units = *units;
                    true
                }
                _ => false,
            },
            in_ar: |_| FeatureValue::Units(UnitType::Meters),
        },
    ]
}

fn set_flag(value: &FeatureValue, target: &mut bool) -> bool {
    match value {
        FeatureValue::Flag(flag) => {
            *target = *flag;
            true
        }
        _ => false,
    }
}
