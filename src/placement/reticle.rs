use glam::Vec4;

use crate::math::pose::Pose;
use crate::model::{Material, Model};
use crate::scene_graph::{Object3D, ObjectId, Scene, SceneModel, SceneModelId};

const RETICLE_MODEL_NAME: &str = "Reticle";

#[derive(Debug, Clone)]
pub struct ReticleStyle {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub segments: u32,
    pub color: Vec4,
}

impl Default for ReticleStyle {
    fn default() -> Self {
        Self {
            inner_radius: 0.1,
            outer_radius: 0.2,
            segments: 32,
            color: Vec4::new(0.0, 1.0, 0.0, 1.0),
        }
    }
}

/// Marker for the current placement candidate. The scene object is the source of truth for
/// its pose and visibility.
#[derive(Debug)]
pub struct Reticle {
    object: ObjectId,
}

impl Reticle {
    /// Adds a hidden reticle to the scene, sharing the ring model between sessions.
    pub fn spawn(scene: &mut Scene, style: &ReticleStyle) -> Self {
        let model = Self::ring_model(scene, style);
        let object = scene.add_object(
            Object3D::new(RETICLE_MODEL_NAME)
                .with_model(model)
                .with_visibility(false),
        );

        Self { object }
    }

    fn ring_model(scene: &mut Scene, style: &ReticleStyle) -> SceneModelId {
        if let Some(model) = scene.find_model_by_name(RETICLE_MODEL_NAME) {
            return model;
        }

        scene.add_model(SceneModel::new(Model::ring(
            RETICLE_MODEL_NAME,
            style.inner_radius,
            style.outer_radius,
            style.segments,
            Material {
                base_color: style.color,
                unlit: true,
            },
        )))
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn show_at(&self, scene: &mut Scene, pose: Pose) {
        scene.set_object_pose(self.object, pose);
        scene.set_object_visible(self.object, true);
    }

    pub fn hide(&self, scene: &mut Scene) {
        scene.set_object_visible(self.object, false);
    }

    pub fn is_visible(&self, scene: &Scene) -> bool {
        scene.is_object_visible(self.object)
    }

    pub fn pose(&self, scene: &Scene) -> Option<Pose> {
        scene
            .get_object_transform(self.object)
            .map(|transform| transform.pose())
    }

    pub fn remove(self, scene: &mut Scene) {
        scene.remove_object(self.object);
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;

    #[test]
    fn reticles_share_one_ring_model() {
        let mut scene = Scene::new();
        let style = ReticleStyle::default();

        let first = Reticle::spawn(&mut scene, &style);
        let second = Reticle::spawn(&mut scene, &style);

        assert_eq!(scene.models.len(), 1);
        assert!(!first.is_visible(&scene));
        assert!(!second.is_visible(&scene));
    }

    #[test]
    fn removed_reticle_leaves_the_scene() {
        let mut scene = Scene::new();
        let reticle = Reticle::spawn(&mut scene, &ReticleStyle::default());
        let object = reticle.object();

        reticle.show_at(&mut scene, Pose::new(Vec3::X, Quat::IDENTITY));
        reticle.remove(&mut scene);

        assert!(!scene.contains(object));
    }
}
