use glam::Quat;

use crate::scene_graph::{ObjectId, Scene};
use crate::session::SessionContext;
use crate::xr::{XrFrame, XrSession};

/// One display frame of an active session: estimate, update placement visuals, draw.
///
/// Placement logic is skipped while there is no frame or the hit-test source is still pending,
/// but the draw callback always runs so the picture stays live.
pub fn tick<S, F, D>(
    context: &mut SessionContext<S>,
    frame: Option<&F>,
    scene: &mut Scene,
    placement_object: Option<ObjectId>,
    draw: D,
) -> anyhow::Result<()>
where
    S: XrSession,
    F: XrFrame<ReferenceSpace = S::ReferenceSpace, HitTestSource = S::HitTestSource>,
    D: FnOnce(&Scene) -> anyhow::Result<()>,
{
    let (surface, reference_space, placement) = context.frame_parts();

    if let Some(frame) = frame {
        if surface.poll_ready() {
            let pose = surface.estimate(frame, reference_space);
            placement.update_surface(scene, pose);

            if let Some(object) = placement_object.filter(|&object| scene.is_object_visible(object))
            {
                let step = placement.policy().idle_rotation_step;
                scene.rotate_object(object, Quat::from_rotation_y(step));
            }
        }
    }

    scene.late_update();
    draw(scene)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use pollster::block_on;

    use super::*;
    use crate::math::pose::Pose;
    use crate::placement::{PlacementPolicy, PlacementState, ReticleStyle};
    use crate::scene_graph::Object3D;
    use crate::session::SessionLifecycle;
    use crate::xr::sim::{SimConfig, SimFrame, SimSession, SimSystem};
    use crate::xr::{XrError, XrLayerBinding};

    struct NoopBinding;

    impl XrLayerBinding<SimSession> for NoopBinding {
        async fn bind_session(&mut self, _session: &SimSession) -> Result<(), XrError> {
            Ok(())
        }

        fn unbind_session(&mut self) {}
    }

    struct Fixture {
        lifecycle: SessionLifecycle<SimSystem>,
        scene: Scene,
        object: ObjectId,
        draws: usize,
    }

    fn fixture(warmup_frames: u32) -> Fixture {
        let mut scene = Scene::new();
        let object = scene.add_object(Object3D::new("cup").with_visibility(false));
        let mut lifecycle = SessionLifecycle::new(
            SimSystem::new(SimConfig {
                hit_test_warmup_frames: warmup_frames,
                ..Default::default()
            }),
            PlacementPolicy::default(),
            ReticleStyle::default(),
        );
        block_on(lifecycle.start(&mut NoopBinding, &mut scene)).unwrap();

        Fixture {
            lifecycle,
            scene,
            object,
            draws: 0,
        }
    }

    impl Fixture {
        /// Advances the simulated session one frame and runs the driver with the given hits.
        fn frame(&mut self, hits: Vec<Pose>) -> bool {
            let context = self.lifecycle.context_mut().unwrap();
            let produced = context.session_mut().next_frame(None).is_some();
            let frame = SimFrame::with_hits(hits);

            let draws = &mut self.draws;
            tick(context, Some(&frame), &mut self.scene, Some(self.object), |_| {
                *draws += 1;
                Ok(())
            })
            .unwrap();

            produced
        }

        fn select(&mut self) {
            self.lifecycle.context_mut().unwrap().session_mut().select();
            self.lifecycle
                .pump_events(&mut self.scene, Some(self.object), &mut NoopBinding);
        }

        fn reticle_visible(&self) -> bool {
            self.lifecycle.is_reticle_visible(&self.scene)
        }
    }

    fn pose_at(z: f32) -> Pose {
        Pose::new(Vec3::new(0.0, 0.0, z), Quat::IDENTITY)
    }

    #[test]
    fn reticle_stays_hidden_until_hit_test_source_is_ready() {
        let mut f = fixture(3);

        for _ in 0..3 {
            assert!(f.frame(vec![pose_at(-1.0)]));
            assert!(!f.reticle_visible());
        }

        f.frame(vec![pose_at(-1.0)]);
        assert!(f.reticle_visible());
        assert_eq!(f.draws, 4);
    }

    #[test]
    fn missing_frame_still_draws() {
        let mut f = fixture(0);
        let context = f.lifecycle.context_mut().unwrap();
        let mut drawn = false;

        tick::<_, SimFrame, _>(context, None, &mut f.scene, Some(f.object), |_| {
            drawn = true;
            Ok(())
        })
        .unwrap();

        assert!(drawn);
        assert!(!f.reticle_visible());
    }

    #[test]
    fn reticle_follows_surface_then_placement_sticks() {
        let mut f = fixture(0);
        f.frame(Vec::new());

        for frame in 1..10 {
            f.frame(if frame % 2 == 0 { vec![pose_at(-2.0)] } else { Vec::new() });
        }

        f.frame(vec![pose_at(-1.5)]);
        assert!(f.reticle_visible());
        let reticle = f
            .lifecycle
            .context()
            .unwrap()
            .placement()
            .reticle()
            .unwrap()
            .pose(&f.scene)
            .unwrap();
        assert!(reticle.abs_diff_eq(&pose_at(-1.5), 1e-6));

        f.select();
        assert_eq!(f.lifecycle.placement_state(), PlacementState::Placed);
        assert!(!f.reticle_visible());
        let placed = f.scene.get_object_transform(f.object).unwrap().translation();
        assert!(placed.abs_diff_eq(Vec3::new(0.0, 0.0, -1.5), 1e-6));

        for _ in 0..20 {
            f.frame(vec![pose_at(-4.0)]);
            f.frame(Vec::new());
            assert_eq!(f.lifecycle.placement_state(), PlacementState::Placed);
        }

        let placed = f.scene.get_object_transform(f.object).unwrap().translation();
        assert!(placed.abs_diff_eq(Vec3::new(0.0, 0.0, -1.5), 1e-6));
    }

    #[test]
    fn visible_object_spins_about_its_vertical_axis() {
        let mut f = fixture(0);
        f.frame(vec![pose_at(-1.0)]);
        f.select();

        for _ in 0..10 {
            f.frame(Vec::new());
        }

        let rotation = f.scene.get_object_transform(f.object).unwrap().rotation();
        let expected = Quat::from_rotation_y(0.005 * 10.0);
        assert!(rotation.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn hidden_object_does_not_spin() {
        let mut f = fixture(0);

        for _ in 0..10 {
            f.frame(vec![pose_at(-1.0)]);
        }

        let rotation = f.scene.get_object_transform(f.object).unwrap().rotation();
        assert_eq!(rotation, Quat::IDENTITY);
    }
}
