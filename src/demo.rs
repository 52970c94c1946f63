use glam::Vec2;

use crate::{
    asset_loader::{AssetEvent, AssetLoader},
    camera::Camera,
    config::AppConfig,
    environment::check_activation_allowed,
    math::ray::Ray,
    overlay::{Activation, OverlayState},
    placement::{PlacementState, TouchGesture},
    render_loop,
    scene_graph::{ObjectId, Scene},
    session::{SessionError, SessionLifecycle, SessionUpdate},
    xr::{
        sim::{SimSession, SimSystem},
        XrLayerBinding,
    },
};

/// Whatever turns the scene into pixels. It doubles as the session's presentation layer.
pub trait Presenter: XrLayerBinding<SimSession> {
    /// Extra per-frame state drawn on top of the scene, such as the UI context.
    type Overlay: ?Sized;

    /// Creates GPU resources for models added since the last call.
    fn upload_models(&mut self, scene: &mut Scene);

    fn present(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        overlay: &mut Self::Overlay,
    ) -> anyhow::Result<()>;
}

pub struct DemoState {
    pub camera: Camera,
    pub scene: Scene,
    pub overlay: OverlayState,
    lifecycle: SessionLifecycle<SimSystem>,
    assets: Option<AssetLoader>,
    placement_object: Option<ObjectId>,
    viewer_ray: Option<Ray>,
    initial_scale: f32,
}

impl DemoState {
    pub fn new(config: AppConfig) -> Self {
        let mut overlay = OverlayState::new();

        if let Err(error) = check_activation_allowed(&config.origin) {
            log::error!("{}", error);
            overlay.disable_activation();
            overlay.alert(error.to_string());
        }

        log::info!("Loading model from {}", config.asset_path.display());

        Self {
            camera: Camera::standing_viewer(),
            scene: Scene::new(),
            overlay,
            lifecycle: SessionLifecycle::new(
                SimSystem::new(config.sim),
                config.placement.clone(),
                config.reticle,
            ),
            assets: Some(AssetLoader::spawn(config.asset_path)),
            placement_object: None,
            viewer_ray: None,
            initial_scale: config.placement.initial_scale,
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn placement_state(&self) -> PlacementState {
        self.lifecycle.placement_state()
    }

    pub fn placement_object(&self) -> Option<ObjectId> {
        self.placement_object
    }

    pub fn is_reticle_visible(&self) -> bool {
        self.lifecycle.is_reticle_visible(&self.scene)
    }

    pub fn is_loading(&self) -> bool {
        self.assets.is_some()
    }

    /// Points the viewer through a cursor position, in physical pixels.
    pub fn set_cursor(&mut self, cursor: Vec2, resolution: Vec2) {
        self.viewer_ray = self.camera.viewer_ray(cursor, resolution);
    }

    pub fn set_viewer_ray(&mut self, ray: Option<Ray>) {
        self.viewer_ray = ray;
    }

    fn poll_assets(&mut self) {
        let Some(loader) = self.assets.as_mut() else {
            return;
        };

        for event in loader.poll() {
            match event {
                AssetEvent::Progress { loaded, total } => {
                    self.overlay.set_loading_progress(loaded, total);
                    if let Some(fraction) = self.overlay.loading() {
                        log::info!("Loading model: {:.2}%", fraction * 100.0);
                    }
                }
                AssetEvent::Loaded(asset) => {
                    self.overlay.hide_loading();

                    match self
                        .scene
                        .spawn_gltf_scene(&asset.name, &asset.document, &asset.buffers)
                    {
                        Ok(root) => {
                            self.scene.set_object_visible(root, false);
                            self.scene.set_object_scale(root, self.initial_scale);
                            self.placement_object = Some(root);
                            log::info!("Model {} ready to place", asset.name);
                        }
                        Err(error) => {
                            log::error!("Failed to build model {}: {}", asset.name, error);
                        }
                    }
                }
                AssetEvent::Failed(error) => {
                    self.overlay.hide_loading();
                    log::error!("Failed to load {}: {}", loader.path().display(), error);
                }
            }
        }

        if !loader.is_pending() {
            self.assets = None;
        }
    }

    pub fn start_session<P: Presenter>(&mut self, presenter: &mut P) {
        if self.overlay.activation() == Activation::Disabled {
            log::warn!("Activation is disabled in this environment");
            return;
        }

        match pollster::block_on(self.lifecycle.start(presenter, &mut self.scene)) {
            Ok(()) => self.overlay.session_started(),
            Err(SessionError::AlreadyActive) => {
                log::warn!("Ignoring activation: a session is already running");
            }
            Err(error @ SessionError::Unsupported) => {
                log::error!("{}", error);
                self.overlay.disable_activation();
                self.overlay.alert(error.to_string());
            }
            Err(error) => {
                log::error!("{}", error);
                self.overlay.alert(error.to_string());
            }
        }
    }

    pub fn end_session<P: Presenter>(&mut self, presenter: &mut P) {
        if self
            .lifecycle
            .end(&mut self.scene, self.placement_object, presenter)
        {
            self.overlay.session_ended();
        }
    }

    /// A tap. Becomes a select event of the running session.
    pub fn select(&mut self) {
        if let Some(context) = self.lifecycle.context_mut() {
            context.session_mut().select();
        }
    }

    pub fn gesture(&mut self, gesture: &TouchGesture) {
        let scale = self
            .lifecycle
            .handle_gesture(&mut self.scene, self.placement_object, gesture);

        if let Some(scale) = scale {
            log::debug!("Scaled model to {:.3}", scale);
        }
    }

    /// Runs one display frame.
    pub fn frame<P: Presenter>(
        &mut self,
        presenter: &mut P,
        overlay: &mut P::Overlay,
    ) -> anyhow::Result<()> {
        self.poll_assets();
        presenter.upload_models(&mut self.scene);

        let updates = self
            .lifecycle
            .pump_events(&mut self.scene, self.placement_object, presenter);
        if updates.contains(&SessionUpdate::Ended) {
            self.overlay.session_ended();
        }

        let camera = &self.camera;

        match self.lifecycle.context_mut() {
            Some(context) => {
                let frame = context.session_mut().next_frame(self.viewer_ray);

                render_loop::tick(
                    context,
                    frame.as_ref(),
                    &mut self.scene,
                    self.placement_object,
                    |scene| presenter.present(scene, camera, overlay),
                )
            }
            None => {
                self.scene.late_update();
                presenter.present(&self.scene, camera, overlay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf, time::Duration};

    use glam::Vec3;

    use super::*;
    use crate::asset_loader::{POINTS_SECOND_NODE_GLTF, TRIANGLE_GLTF};
    use crate::xr::sim::SimConfig;
    use crate::xr::XrError;

    #[derive(Default)]
    struct TestPresenter {
        bound: bool,
        uploads: usize,
        presents: usize,
    }

    impl XrLayerBinding<SimSession> for TestPresenter {
        async fn bind_session(&mut self, _session: &SimSession) -> Result<(), XrError> {
            self.bound = true;
            Ok(())
        }

        fn unbind_session(&mut self) {
            self.bound = false;
        }
    }

    impl Presenter for TestPresenter {
        type Overlay = ();

        fn upload_models(&mut self, scene: &mut Scene) {
            self.uploads = scene.models.len();
        }

        fn present(
            &mut self,
            _scene: &Scene,
            _camera: &Camera,
            _overlay: &mut (),
        ) -> anyhow::Result<()> {
            self.presents += 1;
            Ok(())
        }
    }

    fn config(asset_path: impl Into<PathBuf>) -> AppConfig {
        AppConfig {
            asset_path: asset_path.into(),
            sim: SimConfig {
                hit_test_warmup_frames: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn floor_ray() -> Ray {
        Ray::new(Vec3::new(0.0, 1.6, 0.0), Vec3::new(0.0, -1.0, -1.0))
    }

    fn run_until_loaded(demo: &mut DemoState, presenter: &mut TestPresenter) {
        for _ in 0..500 {
            demo.frame(presenter, &mut ()).unwrap();
            if !demo.is_loading() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        panic!("asset never finished loading");
    }

    fn gltf_file(source: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".gltf")
            .tempfile()
            .unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loaded_model_is_placed_and_hidden_again_on_end() {
        let file = gltf_file(TRIANGLE_GLTF);
        let mut presenter = TestPresenter::default();
        let mut demo = DemoState::new(config(file.path()));

        run_until_loaded(&mut demo, &mut presenter);
        assert_eq!(demo.overlay.loading(), None);
        let object = demo.placement_object().unwrap();
        assert!(!demo.scene.is_object_visible(object));

        demo.start_session(&mut presenter);
        assert!(presenter.bound);
        assert_eq!(demo.overlay.activation(), Activation::Hidden);

        demo.set_viewer_ray(Some(floor_ray()));
        demo.frame(&mut presenter, &mut ()).unwrap();
        assert!(demo.is_reticle_visible());

        demo.select();
        demo.frame(&mut presenter, &mut ()).unwrap();
        assert_eq!(demo.placement_state(), PlacementState::Placed);
        assert!(demo.scene.is_object_visible(object));

        let transform = demo.scene.get_object_transform(object).unwrap();
        assert!(transform
            .translation()
            .abs_diff_eq(Vec3::new(0.0, 0.0, -1.6), 1e-4));
        assert_eq!(transform.scale(), 0.5);

        demo.end_session(&mut presenter);
        assert!(!presenter.bound);
        assert!(!demo.is_session_active());
        assert!(!demo.scene.is_object_visible(object));
        assert_eq!(demo.overlay.activation(), Activation::Available);
    }

    #[test]
    fn failed_asset_hides_loader_and_select_does_nothing() {
        let mut presenter = TestPresenter::default();
        let mut demo = DemoState::new(config("does/not/exist.glb"));

        run_until_loaded(&mut demo, &mut presenter);
        assert_eq!(demo.overlay.loading(), None);
        assert_eq!(demo.placement_object(), None);

        demo.start_session(&mut presenter);
        demo.set_viewer_ray(Some(floor_ray()));
        demo.frame(&mut presenter, &mut ()).unwrap();
        assert!(demo.is_reticle_visible());

        demo.select();
        demo.frame(&mut presenter, &mut ()).unwrap();
        assert_eq!(demo.placement_state(), PlacementState::Unplaced);
        assert!(demo.is_reticle_visible());
    }

    #[test]
    fn partly_broken_model_leaves_nothing_to_draw() {
        let file = gltf_file(POINTS_SECOND_NODE_GLTF);
        let mut presenter = TestPresenter::default();
        let mut demo = DemoState::new(config(file.path()));

        run_until_loaded(&mut demo, &mut presenter);
        demo.scene.late_update();

        assert_eq!(demo.overlay.loading(), None);
        assert_eq!(demo.placement_object(), None);
        assert_eq!(demo.scene.drawable_objects().count(), 0);
    }

    #[test]
    fn insecure_origin_blocks_activation() {
        let mut presenter = TestPresenter::default();
        let mut demo = DemoState::new(AppConfig {
            origin: "http://192.168.0.10:8080".to_string(),
            ..config("does/not/exist.glb")
        });

        assert_eq!(demo.overlay.activation(), Activation::Disabled);
        assert!(demo.overlay.current_alert().is_some());

        demo.start_session(&mut presenter);
        assert!(!demo.is_session_active());
        assert!(!presenter.bound);
    }

    #[test]
    fn unsupported_device_alerts_and_disables_activation() {
        let mut presenter = TestPresenter::default();
        let mut config = config("does/not/exist.glb");
        config.sim.supported = false;
        let mut demo = DemoState::new(config);

        demo.start_session(&mut presenter);

        assert!(!demo.is_session_active());
        assert_eq!(demo.overlay.activation(), Activation::Disabled);
        assert_eq!(
            demo.overlay.current_alert(),
            Some(SessionError::Unsupported.to_string().as_str())
        );
    }

    #[test]
    fn second_activation_keeps_the_running_session() {
        let mut presenter = TestPresenter::default();
        let mut demo = DemoState::new(config("does/not/exist.glb"));

        demo.start_session(&mut presenter);
        demo.start_session(&mut presenter);

        assert!(demo.is_session_active());
        assert_eq!(demo.overlay.current_alert(), None);
    }

    #[test]
    fn frames_present_with_and_without_a_session() {
        let mut presenter = TestPresenter::default();
        let mut demo = DemoState::new(config("does/not/exist.glb"));

        demo.frame(&mut presenter, &mut ()).unwrap();
        demo.start_session(&mut presenter);
        demo.frame(&mut presenter, &mut ()).unwrap();

        assert_eq!(presenter.presents, 2);
        assert_eq!(presenter.uploads, 1);
    }
}
