//! Seam between the placement logic and an augmented-reality runtime.
//!
//! The traits mirror the shape of a browser-style immersive session: a system that can be asked
//! whether a mode is supported and hand out sessions, sessions that give out reference spaces and
//! hit-test subscriptions, and per-frame views that answer hit-test queries.

pub mod sim;

use tokio::sync::oneshot;

use crate::math::pose::Pose;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum XrError {
    #[error("session mode {0:?} is not supported")]
    UnsupportedMode(SessionMode),
    #[error("required feature {0:?} is not available")]
    FeatureUnavailable(XrFeature),
    #[error("reference space {0:?} is not available")]
    ReferenceSpaceUnavailable(ReferenceSpaceType),
    #[error("the session has already ended")]
    SessionEnded,
    #[error("renderer could not be bound to the session: {0}")]
    Binding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    ImmersiveAr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XrFeature {
    HitTest,
    DomOverlay,
    LocalFloor,
    Accelerometer,
    Gyroscope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceType {
    Viewer,
    Local,
    LocalFloor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInit {
    pub required_features: Vec<XrFeature>,
    pub optional_features: Vec<XrFeature>,
}

impl SessionInit {
    /// The feature set surface placement needs. Motion sensors are nice to have.
    pub fn surface_placement() -> Self {
        Self {
            required_features: vec![
                XrFeature::HitTest,
                XrFeature::DomOverlay,
                XrFeature::LocalFloor,
            ],
            optional_features: vec![XrFeature::Accelerometer, XrFeature::Gyroscope],
        }
    }
}

/// Events a running session delivers to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Primary action, e.g. a screen tap.
    Select,
    /// The session has ended, either on request or because the runtime stopped it.
    End,
}

/// Hit-test subscription whose acquisition completes some frames after it was requested.
pub type PendingHitTestSource<H> = oneshot::Receiver<Result<H, XrError>>;

#[allow(async_fn_in_trait)]
pub trait XrSystem {
    type Session: XrSession;

    async fn is_session_supported(&self, mode: SessionMode) -> bool;

    async fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> Result<Self::Session, XrError>;
}

#[allow(async_fn_in_trait)]
pub trait XrSession {
    type ReferenceSpace;
    type HitTestSource;

    async fn request_reference_space(
        &self,
        kind: ReferenceSpaceType,
    ) -> Result<Self::ReferenceSpace, XrError>;

    fn request_hit_test_source(
        &mut self,
        space: &Self::ReferenceSpace,
    ) -> PendingHitTestSource<Self::HitTestSource>;

    fn poll_event(&mut self) -> Option<SessionEvent>;

    /// Asks the runtime to end the session. The `End` event follows through `poll_event`.
    fn end(&mut self);
}

/// The per-frame view of a session.
pub trait XrFrame {
    type ReferenceSpace;
    type HitTestSource;
    type HitTestResult;

    /// Results ordered by priority, nearest surface first.
    fn hit_test_results(&self, source: &Self::HitTestSource) -> Vec<Self::HitTestResult>;

    fn pose(&self, result: &Self::HitTestResult, space: &Self::ReferenceSpace) -> Option<Pose>;
}

/// Binds a presentation surface to a session for as long as it runs.
#[allow(async_fn_in_trait)]
pub trait XrLayerBinding<S: XrSession> {
    async fn bind_session(&mut self, session: &S) -> Result<(), XrError>;

    fn unbind_session(&mut self);
}

/// State of a hit-test subscription request.
pub enum HitTestSubscription<H> {
    Pending(PendingHitTestSource<H>),
    Ready(H),
    Failed,
}

impl<H> HitTestSubscription<H> {
    pub fn new(pending: PendingHitTestSource<H>) -> Self {
        Self::Pending(pending)
    }

    /// Moves a pending request forward without blocking and returns the source once ready.
    pub fn poll(&mut self) -> Option<&H> {
        if let Self::Pending(receiver) = self {
            match receiver.try_recv() {
                Ok(Ok(source)) => {
                    log::debug!("Hit-test source ready");
                    *self = Self::Ready(source);
                }
                Ok(Err(error)) => {
                    log::warn!("Hit-test source request failed: {}", error);
                    *self = Self::Failed;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    log::warn!("Hit-test source request was dropped by the runtime");
                    *self = Self::Failed;
                }
            }
        }

        match self {
            Self::Ready(source) => Some(source),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_stays_pending_until_delivered() {
        let (sender, receiver) = oneshot::channel::<Result<u32, XrError>>();
        let mut subscription = HitTestSubscription::new(receiver);

        assert_eq!(subscription.poll(), None);
        assert!(!subscription.is_ready());

        sender.send(Ok(7)).unwrap();

        assert_eq!(subscription.poll(), Some(&7));
        assert_eq!(subscription.poll(), Some(&7));
    }

    #[test]
    fn dropped_request_fails_permanently() {
        let (sender, receiver) = oneshot::channel::<Result<u32, XrError>>();
        let mut subscription = HitTestSubscription::new(receiver);
        drop(sender);

        assert_eq!(subscription.poll(), None);
        assert!(matches!(subscription, HitTestSubscription::Failed));
    }

    #[test]
    fn rejected_request_fails_permanently() {
        let (sender, receiver) = oneshot::channel::<Result<u32, XrError>>();
        let mut subscription = HitTestSubscription::new(receiver);
        sender.send(Err(XrError::SessionEnded)).unwrap();

        assert_eq!(subscription.poll(), None);
        assert!(matches!(subscription, HitTestSubscription::Failed));
    }
}
