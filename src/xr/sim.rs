//! Desktop stand-in for an augmented-reality runtime.
//!
//! The "real world" is a single floor plane. Hit tests cast the viewer ray supplied by the host
//! against it, and every knob that a real runtime could refuse is configurable so that failure
//! paths can be exercised deterministically.

use std::collections::VecDeque;

use glam::Quat;
use tokio::sync::oneshot;

use crate::math::{plane::Plane, pose::Pose, ray::Ray};
use crate::xr::{
    PendingHitTestSource, ReferenceSpaceType, SessionEvent, SessionInit, SessionMode, XrError,
    XrFeature, XrFrame, XrSession, XrSystem,
};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub supported: bool,
    pub available_features: Vec<XrFeature>,
    pub available_spaces: Vec<ReferenceSpaceType>,
    /// Frames between requesting a hit-test source and receiving it.
    pub hit_test_warmup_frames: u32,
    /// Height of the floor plane. The scene is drawn in the same frame as the hit poses.
    pub floor_height: f32,
    pub max_hit_distance: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            supported: true,
            available_features: vec![
                XrFeature::HitTest,
                XrFeature::DomOverlay,
                XrFeature::LocalFloor,
                XrFeature::Accelerometer,
                XrFeature::Gyroscope,
            ],
            available_spaces: vec![
                ReferenceSpaceType::Viewer,
                ReferenceSpaceType::Local,
                ReferenceSpaceType::LocalFloor,
            ],
            hit_test_warmup_frames: 30,
            floor_height: 0.0,
            max_hit_distance: 10.0,
        }
    }
}

pub struct SimSystem {
    config: SimConfig,
}

impl SimSystem {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl XrSystem for SimSystem {
    type Session = SimSession;

    async fn is_session_supported(&self, mode: SessionMode) -> bool {
        mode == SessionMode::ImmersiveAr && self.config.supported
    }

    async fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> Result<SimSession, XrError> {
        if !self.is_session_supported(mode).await {
            return Err(XrError::UnsupportedMode(mode));
        }

        if let Some(missing) = init
            .required_features
            .iter()
            .find(|feature| !self.config.available_features.contains(feature))
        {
            return Err(XrError::FeatureUnavailable(*missing));
        }

        let enabled_features = init
            .required_features
            .iter()
            .chain(init.optional_features.iter())
            .filter(|feature| self.config.available_features.contains(feature))
            .copied()
            .collect::<Vec<_>>();

        log::debug!("Simulated session granted with {:?}", enabled_features);

        Ok(SimSession {
            config: self.config.clone(),
            enabled_features,
            events: VecDeque::new(),
            pending_hit_test: None,
            ended: false,
        })
    }
}

/// The simulated world is laid out in local-floor coordinates, so every space shares its origin
/// with the scene the renderer draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimReferenceSpace {
    pub kind: ReferenceSpaceType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimHitTestSource {
    pub space: SimReferenceSpace,
}

struct PendingSource {
    sender: oneshot::Sender<Result<SimHitTestSource, XrError>>,
    source: SimHitTestSource,
    frames_left: u32,
}

pub struct SimSession {
    config: SimConfig,
    enabled_features: Vec<XrFeature>,
    events: VecDeque<SessionEvent>,
    pending_hit_test: Option<PendingSource>,
    ended: bool,
}

impl SimSession {
    pub fn enabled_features(&self) -> &[XrFeature] {
        &self.enabled_features
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Queues a select event, as a tap on the screen would.
    pub fn select(&mut self) {
        if !self.ended {
            self.events.push_back(SessionEvent::Select);
        }
    }

    /// Produces the next frame. Returns `None` once the session has ended.
    ///
    /// `viewer_ray` is the world-space ray the device is pointing along, if it is tracking.
    pub fn next_frame(&mut self, viewer_ray: Option<Ray>) -> Option<SimFrame> {
        if self.ended {
            return None;
        }

        self.advance_hit_test_source();

        let hits = viewer_ray
            .and_then(|ray| self.cast_against_floor(&ray))
            .into_iter()
            .collect();

        Some(SimFrame { hits })
    }

    fn advance_hit_test_source(&mut self) {
        let Some(pending) = self.pending_hit_test.as_mut() else {
            return;
        };

        if pending.frames_left > 0 {
            pending.frames_left -= 1;
            return;
        }

        if let Some(pending) = self.pending_hit_test.take() {
            // The receiver may already be gone if the host dropped its session context
            let _ = pending.sender.send(Ok(pending.source));
        }
    }

    fn cast_against_floor(&self, ray: &Ray) -> Option<Pose> {
        let floor = Plane::horizontal(self.config.floor_height);
        let distance = floor.intersect_ray(ray)?;

        (distance <= self.config.max_hit_distance)
            .then(|| Pose::new(ray.at(distance), Quat::IDENTITY))
    }
}

impl XrSession for SimSession {
    type ReferenceSpace = SimReferenceSpace;
    type HitTestSource = SimHitTestSource;

    async fn request_reference_space(
        &self,
        kind: ReferenceSpaceType,
    ) -> Result<SimReferenceSpace, XrError> {
        if self.ended {
            return Err(XrError::SessionEnded);
        }

        if !self.config.available_spaces.contains(&kind) {
            return Err(XrError::ReferenceSpaceUnavailable(kind));
        }

        Ok(SimReferenceSpace { kind })
    }

    fn request_hit_test_source(
        &mut self,
        space: &SimReferenceSpace,
    ) -> PendingHitTestSource<SimHitTestSource> {
        let (sender, receiver) = oneshot::channel();

        if self.ended || !self.enabled_features.contains(&XrFeature::HitTest) {
            let _ = sender.send(Err(XrError::FeatureUnavailable(XrFeature::HitTest)));
            return receiver;
        }

        self.pending_hit_test = Some(PendingSource {
            sender,
            source: SimHitTestSource { space: *space },
            frames_left: self.config.hit_test_warmup_frames,
        });

        receiver
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }

        self.ended = true;
        self.events.clear();
        self.events.push_back(SessionEvent::End);

        if let Some(pending) = self.pending_hit_test.take() {
            let _ = pending.sender.send(Err(XrError::SessionEnded));
        }
    }
}

/// Hit-test results in world space. Each frame is independent of the previous one.
#[derive(Debug, Clone, Default)]
pub struct SimFrame {
    hits: Vec<Pose>,
}

impl SimFrame {
    pub fn with_hits(hits: Vec<Pose>) -> Self {
        Self { hits }
    }
}

impl XrFrame for SimFrame {
    type ReferenceSpace = SimReferenceSpace;
    type HitTestSource = SimHitTestSource;
    type HitTestResult = Pose;

    fn hit_test_results(&self, _source: &SimHitTestSource) -> Vec<Pose> {
        self.hits.clone()
    }

    fn pose(&self, result: &Pose, _space: &SimReferenceSpace) -> Option<Pose> {
        Some(*result)
    }
}
