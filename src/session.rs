//! One tick of the booth: analyze, estimate, score, decide, render.
//!
//! All cross-tick state lives in [`SessionState`], which goes into
//! [`Pipeline::process`] and comes back out updated. The pipeline itself is
//! immutable configuration plus an injected [`Clock`].

use crate::analysis::{
    DistanceEstimator, DistanceSample, MaskAnalyzer, PersonDescriptor, PoseSimilarityScorer,
};
use crate::compositor::{Backdrop, FrameCompositor};
use crate::config::BoothConfig;
use crate::countdown::{
    CaptureEvent, CaptureStateMachine, CaptureStatus, Clock, SystemClock, TickInput,
};
use crate::error::BoothResult;
use crate::segmentation::Matte;
use image::RgbImage;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// Everything that survives from one tick to the next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Last smoothed distance; zero until the first tick.
    pub previous_distance_m: f32,
    pub capture: CaptureStatus,
    /// Pose the subject is asked to match.
    pub reference: Option<PersonDescriptor>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the reference pose. Any countdown, ready flag or cooldown is dropped.
    pub fn with_reference(self, reference: Option<PersonDescriptor>) -> Self {
        Self {
            capture: CaptureStatus::default(),
            reference,
            ..self
        }
    }
}

/// One delivery from the segmentation provider plus operator input.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub frame: &'a RgbImage,
    /// `None` when segmentation failed or is not running.
    pub matte: Option<&'a Matte>,
    pub manual_trigger: bool,
    pub capture_requested: bool,
}

impl<'a> FrameInput<'a> {
    pub fn new(frame: &'a RgbImage, matte: Option<&'a Matte>) -> Self {
        Self {
            frame,
            matte,
            manual_trigger: false,
            capture_requested: false,
        }
    }
}

/// What a tick hands back to its collaborators.
#[derive(Debug, Clone)]
pub struct TickOutput {
    /// Frame for display, at canvas resolution.
    pub composite: RgbImage,
    pub descriptor: Option<PersonDescriptor>,
    pub distance: DistanceSample,
    /// Zero when there is nothing to compare against.
    pub similarity: f32,
    pub capture: CaptureStatus,
    pub events: Vec<CaptureEvent>,
    /// Unmasked canvas-size frame, present on the tick that fires `CaptureNow`.
    pub captured: Option<RgbImage>,
}

impl TickOutput {
    pub fn countdown(&self) -> Option<u8> {
        self.capture.countdown()
    }

    pub fn ready_to_capture(&self) -> bool {
        self.capture.ready_to_capture
    }
}

/// How a contained tick ended.
#[derive(Debug)]
pub enum TickOutcome {
    Completed(SessionState, TickOutput),
    /// The tick panicked. `state` is the state from before the tick and
    /// `display` is the frame to show in its place.
    Recovered {
        state: SessionState,
        display: RgbImage,
    },
}

impl TickOutcome {
    pub fn state(&self) -> &SessionState {
        match self {
            Self::Completed(state, _) => state,
            Self::Recovered { state, .. } => state,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

pub struct Pipeline<C: Clock = SystemClock> {
    config: BoothConfig,
    analyzer: MaskAnalyzer,
    distance: DistanceEstimator,
    scorer: PoseSimilarityScorer,
    machine: CaptureStateMachine,
    compositor: FrameCompositor,
    clock: C,
}

impl Pipeline<SystemClock> {
    pub fn new(config: BoothConfig) -> BoothResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Pipeline<C> {
    pub fn with_clock(config: BoothConfig, clock: C) -> BoothResult<Self> {
        config.validate()?;

        Ok(Self {
            analyzer: MaskAnalyzer::new(config.pixel_threshold, config.bbox_threshold),
            distance: DistanceEstimator::new(config.distance_smoothing, config.in_range_max_m),
            scorer: PoseSimilarityScorer::new(config.pose_tolerances, config.pose_weights),
            machine: CaptureStateMachine::new(config.countdown.clone(), config.capture_mode),
            compositor: FrameCompositor::new(
                config.canvas_width,
                config.canvas_height,
                config.blur_sigma,
                config.mirror_output,
            ),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &BoothConfig {
        &self.config
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    /// Descriptor for a reference pose matte, analyzed at its own resolution.
    pub fn analyze_reference(&self, matte: &Matte) -> Option<PersonDescriptor> {
        self.analyzer.analyze(matte, matte.width(), matte.height())
    }

    /// Run one tick.
    pub fn process(
        &self,
        state: SessionState,
        input: FrameInput<'_>,
        backdrop: &Backdrop,
    ) -> (SessionState, TickOutput) {
        let _span = tracing::debug_span!("tick").entered();
        let now = self.clock.now();
        let (width, height) = self.compositor.canvas_size();

        let original = self.compositor.fit_frame(input.frame);
        let matte = input.matte.map(|m| self.compositor.fit_matte(m));
        let descriptor = matte
            .as_deref()
            .and_then(|m| self.analyzer.analyze(m, width, height));

        let distance = self
            .distance
            .sample(descriptor.as_ref(), state.previous_distance_m);

        let similarity = state
            .reference
            .as_ref()
            .filter(|_| self.config.enable_pose_matching)
            .map(|reference| self.scorer.score(descriptor.as_ref(), Some(reference)));

        let tick = TickInput {
            similarity,
            in_range: distance.in_range,
            manual_trigger: input.manual_trigger,
            capture_requested: input.capture_requested,
        };
        let (capture, events) = self.machine.advance(state.capture, &tick, now);

        debug!(
            raw_m = distance.raw_m,
            smoothed_m = distance.smoothed_m,
            in_range = distance.in_range,
            similarity = ?similarity,
            state = ?capture.state,
            ready = capture.ready_to_capture,
            "tick"
        );

        let composite = self.compositor.composite_fitted(
            &original,
            matte.as_deref(),
            backdrop,
            distance.in_range,
            capture.countdown(),
        );

        let captured = events
            .contains(&CaptureEvent::CaptureNow)
            .then_some(original);

        let next = SessionState {
            previous_distance_m: distance.smoothed_m,
            capture,
            reference: state.reference,
        };

        let output = TickOutput {
            composite,
            descriptor,
            distance,
            similarity: similarity.unwrap_or(0.0),
            capture,
            events,
            captured,
        };

        (next, output)
    }

    /// [`process`](Self::process), but a panicking tick leaves the previous
    /// state in force and shows `last_good` (or the raw frame fitted to the
    /// canvas) instead of stopping the loop.
    pub fn process_contained(
        &self,
        state: SessionState,
        input: FrameInput<'_>,
        backdrop: &Backdrop,
        last_good: Option<&RgbImage>,
    ) -> TickOutcome {
        self.contain(state, input.frame, last_good, |state| {
            self.process(state, input, backdrop)
        })
    }

    /// Run `tick` on a copy of `state`, recovering from a panic.
    pub fn contain<F>(
        &self,
        state: SessionState,
        raw_frame: &RgbImage,
        last_good: Option<&RgbImage>,
        tick: F,
    ) -> TickOutcome
    where
        F: FnOnce(SessionState) -> (SessionState, TickOutput),
    {
        match panic::catch_unwind(AssertUnwindSafe(|| tick(state.clone()))) {
            Ok((next, output)) => TickOutcome::Completed(next, output),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("unknown panic");
                error!("Tick failed, keeping previous state: {}", reason);

                let display = match last_good {
                    Some(frame) => frame.clone(),
                    None => self.compositor.fit_frame(raw_frame),
                };
                TickOutcome::Recovered { state, display }
            }
        }
    }
}
