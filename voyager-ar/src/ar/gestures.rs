//! Touch gestures on the placed scene.
//!
//! ```text
//!            select-start, 1 finger, ray hits plane ──> Translating
//!   Idle ──> select-start, 1 finger, ray misses     ──> Rotating   (floor mounts only)
//!            select-start, 2 fingers                ──> Scaling
//!
//!   Translating / Rotating ── second finger ──> Scaling
//!   Scaling ── fewer than 2 fingers ──> Idle (readout fades)
//!   any ── select-end, or fingers down then none ──> Idle
//! ```
//!
//! Exactly one mode is active at a time; [`GestureMode`] makes that structural.

use super::contact_shadow::ContactShadow;
use super::ray::{ray_hits_obb, screen_ray};
use super::rig::{InteractionGeometry, SceneRig};
use crate::platform::TransientInputResult;
use ar_constants::gesture::{
    MIN_FINGER_SEPARATION, READOUT_FADE_SECONDS, ROTATION_RATE, ROTATION_SNAP_STEP,
    SCALE_MAX, SCALE_MIN, SCALE_SNAP_MAX, SCALE_SNAP_MIN, TRANSLATE_DRAG_THRESHOLD,
};
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureMode {
    #[default]
    Idle,
    Translating,
    Rotating,
    Scaling,
}

/// Commit factors close to natural size as exactly 1.0.
pub fn snap_scale(scale: f32) -> f32 {
    if scale > SCALE_SNAP_MIN && scale < SCALE_SNAP_MAX {
        1.0
    } else {
        scale
    }
}

/// Surface point the scene is anchored to. Scale and rotation pivot around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementAnchor {
    pub point: Vec3,
    pub wall_mount: bool,
}

/// Move the scene root so the object's bottom centre (or back centre for wall
/// mounts) sits on the anchor, honouring the root's current yaw and scale.
pub fn seat_on_anchor(rig: &mut SceneRig, anchor: &PlacementAnchor) {
    let bounds = rig.bounds;
    let center = bounds.center();
    let local = if anchor.wall_mount {
        Vec3::new(center.x, center.y, bounds.min.z)
    } else {
        Vec3::new(center.x, bounds.min.y, center.z)
    };
    let offset = rig.root.rotation * (local * rig.scale());
    rig.root.translation = anchor.point - offset;
}

/// Apply a uniform scale, keep the object seated and let the shadow follow.
pub fn apply_scale(
    rig: &mut SceneRig,
    shadow: Option<&mut ContactShadow>,
    anchor: &PlacementAnchor,
    scale: f32,
) {
    rig.root.scale = Vec3::splat(scale);
    seat_on_anchor(rig, anchor);
    if let Some(shadow) = shadow {
        shadow.set_scale_and_offset(scale, 0.0);
    }
}

/// Set the scene yaw and keep lights and shadow fixed in world space.
pub fn apply_yaw(
    rig: &mut SceneRig,
    shadow: Option<&mut ContactShadow>,
    anchor: &PlacementAnchor,
    yaw: f32,
) {
    rig.root.rotation = Quat::from_rotation_y(yaw);
    // The light rig is a child of the root; undo the root's yaw.
    rig.light_rig.rotation = Quat::from_rotation_y(-yaw);
    seat_on_anchor(rig, anchor);
    if let Some(shadow) = shadow {
        shadow.set_rotation(yaw);
    }
}

/// Floating percentage label shown while scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleReadout {
    pub visible: bool,
    pub text: String,
    pub opacity: f32,
    pub fading: bool,
    /// Window position in logical pixels.
    pub screen_position: Vec2,
}

impl Default for ScaleReadout {
    fn default() -> Self {
        Self {
            visible: false,
            text: String::new(),
            opacity: 0.0,
            fading: false,
            screen_position: Vec2::ZERO,
        }
    }
}

impl ScaleReadout {
    pub fn show(&mut self, scale: f32) {
        self.visible = true;
        self.fading = false;
        self.opacity = 1.0;
        self.text = format!("{:.0}%", scale * 100.0);
    }

    pub fn start_fade(&mut self) {
        if self.visible {
            self.fading = true;
        }
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.fading = false;
        self.opacity = 0.0;
    }

    pub fn tick(&mut self, delta_secs: f32) {
        if !self.fading {
            return;
        }
        self.opacity -= delta_secs / READOUT_FADE_SECONDS;
        if self.opacity <= 0.0 {
            self.hide();
        }
    }
}

/// Per-frame inputs that are not part of the touch data.
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureInput {
    /// Modifier held: rotation moves in 90° steps.
    pub snap_rotation: bool,
}

/// Scene pieces a gesture may modify.
pub struct GestureTarget<'a> {
    pub rig: &'a mut SceneRig,
    pub shadow: Option<&'a mut ContactShadow>,
    pub interaction: Option<&'a InteractionGeometry>,
    pub anchor: &'a mut PlacementAnchor,
}

#[derive(Debug, Default)]
pub struct GestureController {
    mode: GestureMode,
    select_pending: bool,
    /// Whether the previous frame carried any touch.
    had_touches: bool,
    /// Reused touch buffer, one entry per active finger.
    touches: Vec<Vec2>,
    drag_delta: Vec2,
    drag_total: f32,
    last_axes: Vec2,
    last_hit: Option<Vec3>,
    /// Plane movement held back until the drag threshold is crossed.
    held_delta: Vec3,
    start_separation: f32,
    start_scale: f32,
    snap_accumulator: f32,
    readout: ScaleReadout,
}

impl GestureController {
    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    pub fn readout(&self) -> &ScaleReadout {
        &self.readout
    }

    pub fn readout_mut(&mut self) -> &mut ScaleReadout {
        &mut self.readout
    }

    /// Accumulated screen drag of the current gesture.
    pub fn drag_delta(&self) -> Vec2 {
        self.drag_delta
    }

    /// A touch began. Classification waits for the touch data of the next frame.
    pub fn select_start(&mut self) {
        self.select_pending = true;
    }

    pub fn select_end(&mut self) {
        self.reset();
        self.readout.hide();
    }

    /// Drop all gesture state.
    pub fn reset(&mut self) {
        self.mode = GestureMode::Idle;
        self.select_pending = false;
        self.had_touches = false;
        self.drag_delta = Vec2::ZERO;
        self.drag_total = 0.0;
        self.last_hit = None;
        self.held_delta = Vec3::ZERO;
        self.start_separation = 0.0;
        self.snap_accumulator = 0.0;
    }

    pub fn update(
        &mut self,
        results: &[TransientInputResult],
        target: GestureTarget<'_>,
        input: GestureInput,
    ) {
        self.touches.clear();
        self.touches.extend(results.iter().map(|r| r.axes));

        if self.touches.is_empty() {
            // A select-start may arrive before the frame with its touch.
            if self.had_touches {
                if self.mode != GestureMode::Idle {
                    debug!("All fingers lifted; gesture reset");
                }
                let fading = self.mode == GestureMode::Scaling;
                let pending = self.select_pending;
                self.reset();
                self.select_pending = pending;
                if fading {
                    self.readout.start_fade();
                }
            }
            return;
        }
        self.had_touches = true;

        if self.select_pending {
            self.select_pending = false;
            self.classify(&target);
        }

        if self.touches.len() >= 2
            && matches!(self.mode, GestureMode::Translating | GestureMode::Rotating)
        {
            self.begin_scaling(target.rig.scale());
        }

        match self.mode {
            GestureMode::Idle => {}
            GestureMode::Scaling => self.update_scaling(target),
            GestureMode::Rotating => self.update_rotating(target, input),
            GestureMode::Translating => self.update_translating(target),
        }
    }

    fn classify(&mut self, target: &GestureTarget<'_>) {
        if self.touches.len() >= 2 {
            self.begin_scaling(target.rig.scale());
            return;
        }

        let axes = self.touches[0];
        self.last_axes = axes;
        self.drag_delta = Vec2::ZERO;
        self.drag_total = 0.0;
        self.held_delta = Vec3::ZERO;

        if let Some(hit) = plane_hit(target.rig, target.interaction, axes) {
            self.mode = GestureMode::Translating;
            self.last_hit = Some(hit);
        } else if !target.anchor.wall_mount {
            self.mode = GestureMode::Rotating;
            self.snap_accumulator = 0.0;
        } else {
            self.mode = GestureMode::Idle;
        }
        debug!("Gesture started: {:?}", self.mode);
    }

    fn begin_scaling(&mut self, current_scale: f32) {
        self.mode = GestureMode::Scaling;
        self.last_hit = None;
        self.snap_accumulator = 0.0;
        self.start_scale = current_scale;
        self.start_separation = match self.touches.as_slice() {
            [a, b, ..] => a.distance(*b),
            _ => 0.0,
        };
    }

    fn update_scaling(&mut self, target: GestureTarget<'_>) {
        let (a, b) = match self.touches.as_slice() {
            [a, b, ..] => (*a, *b),
            _ => {
                // Leaving scale mode does not fall back to translate or rotate.
                self.mode = GestureMode::Idle;
                self.start_separation = 0.0;
                self.readout.start_fade();
                return;
            }
        };

        let separation = a.distance(b);
        if self.start_separation < MIN_FINGER_SEPARATION {
            self.start_separation = separation;
            return;
        }

        let raw = self.start_scale * separation / self.start_separation;
        let scale = snap_scale(raw.clamp(SCALE_MIN, SCALE_MAX));
        apply_scale(target.rig, target.shadow, target.anchor, scale);
        self.readout.show(scale);
    }

    fn update_rotating(&mut self, target: GestureTarget<'_>, input: GestureInput) {
        let axes = self.touches[0];
        let delta = axes - self.last_axes;
        self.last_axes = axes;
        self.drag_delta += delta;

        let raw = delta.x * ROTATION_RATE;
        let yaw = target.rig.yaw();
        let increment = if input.snap_rotation {
            self.snap_accumulator += raw;
            if self.snap_accumulator.abs() >= ROTATION_SNAP_STEP {
                let direction = self.snap_accumulator.signum();
                self.snap_accumulator = 0.0;
                let snapped = ((yaw / ROTATION_SNAP_STEP).round() + direction) * ROTATION_SNAP_STEP;
                snapped - yaw
            } else {
                0.0
            }
        } else {
            raw
        };

        if increment != 0.0 {
            apply_yaw(target.rig, target.shadow, target.anchor, yaw + increment);
        }
    }

    fn update_translating(&mut self, target: GestureTarget<'_>) {
        let axes = self.touches[0];
        self.drag_delta += axes - self.last_axes;
        self.last_axes = axes;

        let Some(hit) = plane_hit(target.rig, target.interaction, axes) else {
            return;
        };
        let Some(last) = self.last_hit.replace(hit) else {
            return;
        };

        let step = hit - last;
        self.drag_total += step.length();
        self.held_delta += step;
        if self.drag_total < TRANSLATE_DRAG_THRESHOLD {
            return;
        }

        let delta = std::mem::take(&mut self.held_delta);
        target.rig.root.translation += delta;
        target.anchor.point += delta;
        if let Some(shadow) = target.shadow {
            shadow.needs_update = true;
        }
    }
}

/// World point where the ray through a touch meets the hit plane.
fn plane_hit(
    rig: &SceneRig,
    interaction: Option<&InteractionGeometry>,
    axes: Vec2,
) -> Option<Vec3> {
    let interaction = interaction?;
    // Touch axes grow downwards; NDC grows upwards.
    let ndc = Vec2::new(axes.x, -axes.y);
    let (origin, dir) = screen_ray(rig.camera.world_matrix(), rig.camera.projection, ndc);
    let plane = interaction.plane_world(&rig.root);
    let t = ray_hits_obb(origin, dir, &plane, interaction.plane_size)?;
    Some(origin + dir * t)
}
