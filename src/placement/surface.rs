use crate::math::pose::Pose;
use crate::xr::{HitTestSubscription, PendingHitTestSource, XrFrame};

/// Turns a frame's hit-test results into a single placement candidate.
///
/// Every frame stands alone: the first result wins and nothing is carried over.
pub struct SurfaceEstimator<H> {
    subscription: HitTestSubscription<H>,
}

impl<H> SurfaceEstimator<H> {
    pub fn new(pending: PendingHitTestSource<H>) -> Self {
        Self {
            subscription: HitTestSubscription::new(pending),
        }
    }

    /// Polls the subscription and reports whether hit tests can be run this frame.
    pub fn poll_ready(&mut self) -> bool {
        self.subscription.poll().is_some()
    }

    pub fn estimate<F>(&mut self, frame: &F, space: &F::ReferenceSpace) -> Option<Pose>
    where
        F: XrFrame<HitTestSource = H>,
    {
        let source = self.subscription.poll()?;
        first_hit_pose(frame, source, space)
    }
}

pub fn first_hit_pose<F: XrFrame>(
    frame: &F,
    source: &F::HitTestSource,
    space: &F::ReferenceSpace,
) -> Option<Pose> {
    frame
        .hit_test_results(source)
        .first()
        .and_then(|result| frame.pose(result, space))
}
