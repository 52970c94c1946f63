use std::time::Duration;

use crate::math::pose::Pose;
use crate::placement::gesture::{GestureThrottle, TouchGesture};
use crate::placement::reticle::Reticle;
use crate::scene_graph::{ObjectId, Scene};

#[derive(Debug, Clone)]
pub struct PlacementPolicy {
    /// Scale per logical pixel of pinch distance.
    pub scale_per_pixel: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    /// Minimum time between two accepted scale gestures.
    pub gesture_interval: Duration,
    /// Radians per frame around the object's vertical axis while it is visible.
    pub idle_rotation_step: f32,
    /// Scale given to the object when the asset finishes loading.
    pub initial_scale: f32,
}

impl Default for PlacementPolicy {
    fn default() -> Self {
        Self {
            scale_per_pixel: 0.001,
            min_scale: 0.3,
            max_scale: 1.5,
            gesture_interval: Duration::from_millis(100),
            idle_rotation_step: 0.005,
            initial_scale: 0.5,
        }
    }
}

impl PlacementPolicy {
    /// Absolute uniform scale for a pinch of `distance` logical pixels.
    pub fn scale_for_distance(&self, distance: f32) -> f32 {
        (distance * self.scale_per_pixel).clamp(self.min_scale, self.max_scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementState {
    Unplaced,
    Placed,
}

/// Placement state for one session.
///
/// `Unplaced` follows the surface with the reticle; a select confirms the reticle pose and moves
/// to `Placed`, which only `reset` leaves again.
pub struct PlacementController {
    state: PlacementState,
    reticle: Option<Reticle>,
    gestures: GestureThrottle,
    policy: PlacementPolicy,
}

impl PlacementController {
    pub fn new(reticle: Reticle, policy: PlacementPolicy) -> Self {
        Self {
            state: PlacementState::Unplaced,
            reticle: Some(reticle),
            gestures: GestureThrottle::new(policy.gesture_interval),
            policy,
        }
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn reticle(&self) -> Option<&Reticle> {
        self.reticle.as_ref()
    }

    pub fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    pub fn is_reticle_visible(&self, scene: &Scene) -> bool {
        self.reticle
            .as_ref()
            .is_some_and(|reticle| reticle.is_visible(scene))
    }

    /// Per-frame surface update. Does nothing once the object has been placed.
    pub fn update_surface(&mut self, scene: &mut Scene, surface: Option<Pose>) {
        if self.state != PlacementState::Unplaced {
            return;
        }

        let Some(reticle) = self.reticle.as_ref() else {
            return;
        };

        match surface {
            Some(pose) => reticle.show_at(scene, pose),
            None => reticle.hide(scene),
        }
    }

    /// Confirms placement at the reticle. Returns whether the object was placed.
    ///
    /// Ignored unless the controller is unplaced, the reticle is showing and the asset exists.
    pub fn select(&mut self, scene: &mut Scene, placement_object: Option<ObjectId>) -> bool {
        if self.state != PlacementState::Unplaced {
            return false;
        }

        let Some(object) = placement_object.filter(|&object| scene.contains(object)) else {
            log::debug!("Select ignored: asset not loaded");
            return false;
        };

        let pose = match self.reticle.as_ref() {
            Some(reticle) if reticle.is_visible(scene) => reticle.pose(scene),
            _ => None,
        };

        let Some(pose) = pose else {
            log::debug!("Select ignored: no surface under the reticle");
            return false;
        };

        scene.set_object_pose(object, pose);
        scene.set_object_visible(object, true);

        if let Some(reticle) = self.reticle.take() {
            reticle.remove(scene);
        }

        self.state = PlacementState::Placed;
        log::info!(
            "Placed object at ({:.3}, {:.3}, {:.3})",
            pose.position.x,
            pose.position.y,
            pose.position.z
        );

        true
    }

    /// Applies a pinch as an absolute scale. Returns the new scale if the gesture was accepted.
    pub fn apply_gesture(
        &mut self,
        scene: &mut Scene,
        placement_object: Option<ObjectId>,
        gesture: &TouchGesture,
    ) -> Option<f32> {
        let distance = gesture.pinch_distance()?;
        let object = placement_object.filter(|&object| scene.contains(object))?;

        if !self.gestures.try_accept(gesture.timestamp) {
            return None;
        }

        let scale = self.policy.scale_for_distance(distance);
        scene.set_object_scale(object, scale);

        Some(scale)
    }

    /// Session teardown: hides the object, drops the reticle, returns to `Unplaced`.
    ///
    /// The object's pose and scale are kept for the next session.
    pub fn reset(&mut self, scene: &mut Scene, placement_object: Option<ObjectId>) {
        if let Some(reticle) = self.reticle.take() {
            reticle.remove(scene);
        }

        if let Some(object) = placement_object {
            scene.set_object_visible(object, false);
        }

        self.gestures.reset();
        self.state = PlacementState::Unplaced;
    }
}
