//! Session start-up, event routing and teardown.
//!
//! Everything that only makes sense while a session runs lives in [`SessionContext`], which is
//! created in one go by [`SessionLifecycle::start`] and dropped in one go by the teardown path.

use crate::placement::{
    PlacementController, PlacementPolicy, PlacementState, Reticle, ReticleStyle,
    SurfaceEstimator, TouchGesture,
};
use crate::scene_graph::{ObjectId, Scene};
use crate::xr::{
    ReferenceSpaceType, SessionEvent, SessionInit, SessionMode, XrError, XrLayerBinding,
    XrSession, XrSystem,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Immersive AR is not supported here. Please use a browser or device with AR support.")]
    Unsupported,
    #[error("an AR session is already running")]
    AlreadyActive,
    #[error("AR startup failed: {0}")]
    Xr(#[from] XrError),
}

/// What handling a session event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    Ignored,
    Placed,
    Ended,
}

pub struct SessionContext<S: XrSession> {
    session: S,
    reference_space: S::ReferenceSpace,
    surface: SurfaceEstimator<S::HitTestSource>,
    placement: PlacementController,
}

impl<S: XrSession> SessionContext<S> {
    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn reference_space(&self) -> &S::ReferenceSpace {
        &self.reference_space
    }

    pub fn placement(&self) -> &PlacementController {
        &self.placement
    }

    /// Split borrow for the per-frame driver.
    pub fn frame_parts(
        &mut self,
    ) -> (
        &mut SurfaceEstimator<S::HitTestSource>,
        &S::ReferenceSpace,
        &mut PlacementController,
    ) {
        (&mut self.surface, &self.reference_space, &mut self.placement)
    }
}

pub struct SessionLifecycle<X: XrSystem> {
    system: X,
    policy: PlacementPolicy,
    reticle_style: ReticleStyle,
    context: Option<SessionContext<X::Session>>,
}

impl<X: XrSystem> SessionLifecycle<X> {
    pub fn new(system: X, policy: PlacementPolicy, reticle_style: ReticleStyle) -> Self {
        Self {
            system,
            policy,
            reticle_style,
            context: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    pub fn context(&self) -> Option<&SessionContext<X::Session>> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut SessionContext<X::Session>> {
        self.context.as_mut()
    }

    /// `Unplaced` whenever no session is running.
    pub fn placement_state(&self) -> PlacementState {
        self.context
            .as_ref()
            .map(|context| context.placement.state())
            .unwrap_or(PlacementState::Unplaced)
    }

    pub fn is_reticle_visible(&self, scene: &Scene) -> bool {
        self.context
            .as_ref()
            .is_some_and(|context| context.placement.is_reticle_visible(scene))
    }

    /// Runs the start-up sequence. Each step waits for the previous one; a failure at any step
    /// releases whatever was acquired so far and leaves the lifecycle inactive.
    pub async fn start<B>(&mut self, binding: &mut B, scene: &mut Scene) -> Result<(), SessionError>
    where
        B: XrLayerBinding<X::Session>,
    {
        if self.context.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        if !self
            .system
            .is_session_supported(SessionMode::ImmersiveAr)
            .await
        {
            return Err(SessionError::Unsupported);
        }

        let mut session = self
            .system
            .request_session(SessionMode::ImmersiveAr, &SessionInit::surface_placement())
            .await?;

        if let Err(error) = binding.bind_session(&session).await {
            session.end();
            return Err(error.into());
        }

        let reference_space = match session
            .request_reference_space(ReferenceSpaceType::LocalFloor)
            .await
        {
            Ok(space) => space,
            Err(error) => {
                binding.unbind_session();
                session.end();
                return Err(error.into());
            }
        };

        let reticle = Reticle::spawn(scene, &self.reticle_style);
        let pending_hit_test = session.request_hit_test_source(&reference_space);

        self.context = Some(SessionContext {
            session,
            reference_space,
            surface: SurfaceEstimator::new(pending_hit_test),
            placement: PlacementController::new(reticle, self.policy.clone()),
        });

        log::info!("AR session started");
        Ok(())
    }

    pub fn handle_event<B>(
        &mut self,
        event: SessionEvent,
        scene: &mut Scene,
        placement_object: Option<ObjectId>,
        binding: &mut B,
    ) -> SessionUpdate
    where
        B: XrLayerBinding<X::Session>,
    {
        let Some(context) = self.context.as_mut() else {
            return SessionUpdate::Ignored;
        };

        match event {
            SessionEvent::Select => {
                if context.placement.select(scene, placement_object) {
                    SessionUpdate::Placed
                } else {
                    SessionUpdate::Ignored
                }
            }
            SessionEvent::End => {
                self.teardown(scene, placement_object, binding);
                SessionUpdate::Ended
            }
        }
    }

    /// Handles every event the session has queued, in order.
    pub fn pump_events<B>(
        &mut self,
        scene: &mut Scene,
        placement_object: Option<ObjectId>,
        binding: &mut B,
    ) -> Vec<SessionUpdate>
    where
        B: XrLayerBinding<X::Session>,
    {
        let mut updates = Vec::new();

        while let Some(event) = self
            .context
            .as_mut()
            .and_then(|context| context.session.poll_event())
        {
            updates.push(self.handle_event(event, scene, placement_object, binding));
        }

        updates
    }

    /// Routes a pinch to the active session. Returns the applied scale if it was accepted.
    pub fn handle_gesture(
        &mut self,
        scene: &mut Scene,
        placement_object: Option<ObjectId>,
        gesture: &TouchGesture,
    ) -> Option<f32> {
        self.context
            .as_mut()?
            .placement
            .apply_gesture(scene, placement_object, gesture)
    }

    /// Ends the running session and tears it down immediately. Returns false if none was running.
    pub fn end<B>(
        &mut self,
        scene: &mut Scene,
        placement_object: Option<ObjectId>,
        binding: &mut B,
    ) -> bool
    where
        B: XrLayerBinding<X::Session>,
    {
        let Some(context) = self.context.as_mut() else {
            return false;
        };

        context.session.end();
        self.teardown(scene, placement_object, binding);
        true
    }

    fn teardown<B>(&mut self, scene: &mut Scene, placement_object: Option<ObjectId>, binding: &mut B)
    where
        B: XrLayerBinding<X::Session>,
    {
        let Some(mut context) = self.context.take() else {
            return;
        };

        context.placement.reset(scene, placement_object);
        binding.unbind_session();

        log::info!("AR session ended");
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec2, Vec3};
    use pollster::block_on;
    use std::time::Instant;

    use super::*;
    use crate::math::pose::Pose;
    use crate::scene_graph::Object3D;
    use crate::xr::sim::{SimConfig, SimSession, SimSystem};
    use crate::xr::XrFeature;

    #[derive(Default)]
    struct TestBinding {
        bound: bool,
        reject: bool,
        bind_calls: usize,
    }

    impl XrLayerBinding<SimSession> for TestBinding {
        async fn bind_session(&mut self, _session: &SimSession) -> Result<(), XrError> {
            self.bind_calls += 1;
            if self.reject {
                return Err(XrError::Binding("no surface".to_string()));
            }
            self.bound = true;
            Ok(())
        }

        fn unbind_session(&mut self) {
            self.bound = false;
        }
    }

    struct Fixture {
        lifecycle: SessionLifecycle<SimSystem>,
        scene: Scene,
        object: ObjectId,
        binding: TestBinding,
    }

    fn fixture(config: SimConfig) -> Fixture {
        let mut scene = Scene::new();
        let object = scene.add_object(Object3D::new("cup").with_visibility(false));

        Fixture {
            lifecycle: SessionLifecycle::new(
                SimSystem::new(config),
                PlacementPolicy::default(),
                ReticleStyle::default(),
            ),
            scene,
            object,
            binding: TestBinding::default(),
        }
    }

    impl Fixture {
        fn start(&mut self) -> Result<(), SessionError> {
            block_on(self.lifecycle.start(&mut self.binding, &mut self.scene))
        }

        fn place_at(&mut self, pose: Pose) {
            let context = self.lifecycle.context_mut().unwrap();
            let (_, _, placement) = context.frame_parts();
            placement.update_surface(&mut self.scene, Some(pose));

            self.lifecycle.context_mut().unwrap().session_mut().select();
            let updates =
                self.lifecycle
                    .pump_events(&mut self.scene, Some(self.object), &mut self.binding);
            assert_eq!(updates, vec![SessionUpdate::Placed]);
        }

        fn end(&mut self) -> bool {
            self.lifecycle
                .end(&mut self.scene, Some(self.object), &mut self.binding)
        }

        fn live_object_count(&self) -> usize {
            self.scene.live_objects().count()
        }
    }

    #[test]
    fn start_spawns_hidden_reticle_and_binds_renderer() {
        let mut f = fixture(SimConfig::default());

        f.start().unwrap();

        assert!(f.lifecycle.is_active());
        assert!(f.binding.bound);
        assert_eq!(f.lifecycle.placement_state(), PlacementState::Unplaced);
        assert!(f.lifecycle.context().unwrap().placement().reticle().is_some());
        assert!(!f.lifecycle.is_reticle_visible(&f.scene));
        assert_eq!(f.live_object_count(), 2);
    }

    #[test]
    fn unsupported_device_never_requests_a_session() {
        let mut f = fixture(SimConfig {
            supported: false,
            ..Default::default()
        });

        assert_eq!(f.start(), Err(SessionError::Unsupported));
        assert!(!f.lifecycle.is_active());
        assert_eq!(f.binding.bind_calls, 0);
        assert_eq!(f.live_object_count(), 1);
    }

    #[test]
    fn rejected_session_request_leaves_nothing_behind() {
        let mut f = fixture(SimConfig {
            available_features: vec![XrFeature::DomOverlay, XrFeature::LocalFloor],
            ..Default::default()
        });

        assert_eq!(
            f.start(),
            Err(SessionError::Xr(XrError::FeatureUnavailable(XrFeature::HitTest)))
        );
        assert!(!f.lifecycle.is_active());
        assert_eq!(f.binding.bind_calls, 0);
    }

    #[test]
    fn rejected_binding_aborts_start() {
        let mut f = fixture(SimConfig::default());
        f.binding.reject = true;

        assert!(matches!(
            f.start(),
            Err(SessionError::Xr(XrError::Binding(_)))
        ));
        assert!(!f.lifecycle.is_active());
        assert!(!f.binding.bound);
        assert_eq!(f.live_object_count(), 1);
    }

    #[test]
    fn rejected_reference_space_unbinds_renderer() {
        let mut f = fixture(SimConfig {
            available_spaces: vec![ReferenceSpaceType::Viewer],
            ..Default::default()
        });

        assert_eq!(
            f.start(),
            Err(SessionError::Xr(XrError::ReferenceSpaceUnavailable(
                ReferenceSpaceType::LocalFloor
            )))
        );
        assert!(!f.lifecycle.is_active());
        assert_eq!(f.binding.bind_calls, 1);
        assert!(!f.binding.bound);
        assert_eq!(f.live_object_count(), 1);
    }

    #[test]
    fn second_activation_is_rejected_without_side_effects() {
        let mut f = fixture(SimConfig::default());
        f.start().unwrap();
        let reticle = f.lifecycle.context().unwrap().placement().reticle().unwrap().object();

        assert_eq!(f.start(), Err(SessionError::AlreadyActive));

        assert_eq!(f.binding.bind_calls, 1);
        assert_eq!(
            f.lifecycle.context().unwrap().placement().reticle().unwrap().object(),
            reticle
        );
        assert_eq!(f.live_object_count(), 2);
    }

    #[test]
    fn ending_after_placement_resets_everything_but_the_transform() {
        let mut f = fixture(SimConfig::default());
        f.start().unwrap();
        let pose = Pose::new(Vec3::new(0.0, 0.0, -1.0), Quat::from_rotation_y(1.0));
        f.place_at(pose);
        assert_eq!(f.lifecycle.placement_state(), PlacementState::Placed);

        assert!(f.end());

        assert!(!f.lifecycle.is_active());
        assert!(!f.binding.bound);
        assert_eq!(f.lifecycle.placement_state(), PlacementState::Unplaced);
        assert!(!f.scene.is_object_visible(f.object));
        assert!(f
            .scene
            .get_object_transform(f.object)
            .unwrap()
            .pose()
            .abs_diff_eq(&pose, 1e-6));
        assert_eq!(f.live_object_count(), 1);
        assert!(!f.end());
    }

    #[test]
    fn ending_while_unplaced_removes_reticle() {
        let mut f = fixture(SimConfig::default());
        f.start().unwrap();
        let reticle = f.lifecycle.context().unwrap().placement().reticle().unwrap().object();

        f.end();

        assert!(!f.scene.contains(reticle));
        assert!(!f.scene.is_object_visible(f.object));
        assert_eq!(f.lifecycle.placement_state(), PlacementState::Unplaced);
    }

    #[test]
    fn repeated_sessions_reuse_the_reticle_slot() {
        let mut f = fixture(SimConfig::default());

        for _ in 0..5 {
            f.start().unwrap();
            assert!(f.end());
        }

        assert_eq!(f.scene.objects.len(), 2);
        assert_eq!(f.scene.models.len(), 1);
        assert_eq!(f.live_object_count(), 1);
    }

    #[test]
    fn runtime_initiated_end_tears_down_through_events() {
        let mut f = fixture(SimConfig::default());
        f.start().unwrap();

        f.lifecycle.context_mut().unwrap().session_mut().end();
        let updates = f
            .lifecycle
            .pump_events(&mut f.scene, Some(f.object), &mut f.binding);

        assert_eq!(updates, vec![SessionUpdate::Ended]);
        assert!(!f.lifecycle.is_active());
        assert!(!f.binding.bound);
        assert_eq!(f.live_object_count(), 1);
    }

    #[test]
    fn a_new_session_starts_unplaced_after_the_previous_one_ended() {
        let mut f = fixture(SimConfig::default());
        f.start().unwrap();
        f.place_at(Pose::IDENTITY);
        f.end();

        f.start().unwrap();

        assert_eq!(f.lifecycle.placement_state(), PlacementState::Unplaced);
        assert!(f.lifecycle.context().unwrap().placement().reticle().is_some());
        assert!(!f.scene.is_object_visible(f.object));
    }

    #[test]
    fn gestures_only_apply_during_a_session() {
        let mut f = fixture(SimConfig::default());
        let pinch = TouchGesture::new(vec![Vec2::ZERO, Vec2::new(600.0, 0.0)], Instant::now());

        assert_eq!(
            f.lifecycle
                .handle_gesture(&mut f.scene, Some(f.object), &pinch),
            None
        );

        f.start().unwrap();
        let scale = f
            .lifecycle
            .handle_gesture(&mut f.scene, Some(f.object), &pinch)
            .unwrap();

        assert!((scale - 0.6).abs() < 1e-5);
    }

    #[test]
    fn events_without_a_session_are_ignored() {
        let mut f = fixture(SimConfig::default());

        assert_eq!(
            f.lifecycle.handle_event(
                SessionEvent::Select,
                &mut f.scene,
                Some(f.object),
                &mut f.binding
            ),
            SessionUpdate::Ignored
        );
        assert_eq!(
            f.lifecycle.handle_event(
                SessionEvent::End,
                &mut f.scene,
                Some(f.object),
                &mut f.binding
            ),
            SessionUpdate::Ignored
        );
    }
}
