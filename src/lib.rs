//! Pose-matching photobooth core.
//!
//! Each incoming (frame, matte) pair runs through one synchronous tick:
//! the matte is reduced to a [`PersonDescriptor`], which feeds the distance
//! estimate and the pose similarity score; those drive the countdown state
//! machine, and the compositor renders the displayable frame.
//!
//! Camera capture, segmentation and output devices live behind the
//! [`capture::CaptureSource`], [`segmentation::SegmentationModel`] and
//! [`output::OutputSink`] traits.

pub mod analysis;
pub mod capture;
pub mod compositor;
pub mod config;
pub mod countdown;
pub mod error;
pub mod output;
pub mod segmentation;
pub mod session;

pub use analysis::{
    DistanceEstimator, DistanceSample, MaskAnalyzer, PersonDescriptor, PoseSimilarityScorer,
};
pub use compositor::{Backdrop, BackgroundSpec, FrameCompositor};
pub use config::{BoothConfig, CaptureMode};
pub use countdown::{
    CaptureEvent, CaptureState, CaptureStateMachine, CaptureStatus, Clock, ManualClock,
    SystemClock,
};
pub use error::{BoothError, BoothResult};
pub use session::{FrameInput, Pipeline, SessionState, TickOutcome, TickOutput};
