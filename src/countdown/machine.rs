//! Countdown / cooldown state machine.
//!
//! The machine is a pure transition function: it takes the previous
//! [`CaptureStatus`], this tick's inputs and the current instant, and
//! returns the next status plus the events the tick produced. Timers are
//! deadlines compared against `now`, so irregular tick spacing never
//! stretches a countdown step or the cooldown.

use crate::config::{CaptureMode, CountdownConfig};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    CountingDown {
        /// Digit currently shown.
        remaining: u8,
        /// When the next digit is due.
        next_step_at: Instant,
        /// What happens when the count reaches zero.
        mode: CaptureMode,
    },
    Cooldown {
        until: Instant,
    },
}

/// Capture state plus the manual-flow ready flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStatus {
    pub state: CaptureState,
    pub ready_to_capture: bool,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        Self {
            state: CaptureState::Idle,
            ready_to_capture: false,
        }
    }
}

impl CaptureStatus {
    /// Digit to overlay, if a countdown is running.
    pub fn countdown(&self) -> Option<u8> {
        match self.state {
            CaptureState::CountingDown { remaining, .. } => Some(remaining),
            _ => None,
        }
    }

    pub fn is_counting_down(&self) -> bool {
        matches!(self.state, CaptureState::CountingDown { .. })
    }

    pub fn is_cooling_down(&self) -> bool {
        matches!(self.state, CaptureState::Cooldown { .. })
    }

    /// Countdown running or waiting on a manual capture.
    pub fn is_busy(&self) -> bool {
        self.is_counting_down() || self.ready_to_capture
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        match self.state {
            CaptureState::Cooldown { until } => until.saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }
}

/// What a tick did, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    CountdownStarted { remaining: u8, mode: CaptureMode },
    CountdownStep { remaining: u8 },
    CountdownCancelled,
    /// Manual countdown finished; waiting for a capture request.
    ReadyToCapture,
    /// Take the photo now.
    CaptureNow,
    CooldownEnded,
}

/// Inputs observed on one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickInput {
    /// Pose similarity, or `None` when no reference pose is being matched.
    pub similarity: Option<f32>,
    pub in_range: bool,
    /// Operator asked to start a countdown.
    pub manual_trigger: bool,
    /// Operator pressed capture; honoured only while ready.
    pub capture_requested: bool,
}

pub struct CaptureStateMachine {
    config: CountdownConfig,
    mode: CaptureMode,
}

impl CaptureStateMachine {
    pub fn new(config: CountdownConfig, mode: CaptureMode) -> Self {
        Self { config, mode }
    }

    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    /// Advance one tick.
    ///
    /// Order within a tick: cooldown expiry, cancellation, manual capture,
    /// countdown steps, then a possible new countdown. Cancellation runs
    /// before the countdown steps so a dropped pose can never fire a capture,
    /// and no countdown starts on the tick that captured.
    pub fn advance(
        &self,
        status: CaptureStatus,
        input: &TickInput,
        now: Instant,
    ) -> (CaptureStatus, Vec<CaptureEvent>) {
        let mut status = status;
        let mut events = Vec::new();

        if let CaptureState::Cooldown { until } = status.state {
            if now >= until {
                debug!("Capture cooldown ended");
                status.state = CaptureState::Idle;
                events.push(CaptureEvent::CooldownEnded);
            }
        }

        // Readings inside [cancel, trigger) neither start nor cancel.
        let cancel = !input.in_range
            || input
                .similarity
                .is_some_and(|s| s < self.config.cancel_threshold);

        if status.is_busy() && cancel {
            info!(
                similarity = ?input.similarity,
                in_range = input.in_range,
                "Pose lost, cancelling countdown"
            );
            if status.is_counting_down() {
                status.state = CaptureState::Idle;
            }
            status.ready_to_capture = false;
            events.push(CaptureEvent::CountdownCancelled);
        }

        if input.capture_requested {
            if status.ready_to_capture {
                info!("Manual capture confirmed");
                status.ready_to_capture = false;
                events.push(CaptureEvent::CaptureNow);
            } else {
                debug!("Capture request ignored, not ready");
            }
        }

        if let CaptureState::CountingDown {
            mut remaining,
            mut next_step_at,
            mode,
        } = status.state
        {
            // A long stall can cover several steps; never count past zero.
            while remaining > 0 && now >= next_step_at {
                remaining -= 1;
                next_step_at += self.config.step;
                if remaining > 0 {
                    debug!("Countdown: {}", remaining);
                    events.push(CaptureEvent::CountdownStep { remaining });
                }
            }

            status.state = if remaining == 0 {
                self.finish(mode, now, &mut status.ready_to_capture, &mut events)
            } else {
                CaptureState::CountingDown {
                    remaining,
                    next_step_at,
                    mode,
                }
            };
        }

        let captured = events.contains(&CaptureEvent::CaptureNow);
        if status.state == CaptureState::Idle && !status.ready_to_capture && !captured {
            let pose_matched = input.in_range
                && input
                    .similarity
                    .is_some_and(|s| s >= self.config.trigger_threshold);
            let manual = input.manual_trigger && !cancel;

            if pose_matched || manual {
                let mode = if manual { CaptureMode::Manual } else { self.mode };
                info!(
                    similarity = ?input.similarity,
                    ?mode,
                    "Starting countdown from {}",
                    self.config.start_count
                );
                status.state = CaptureState::CountingDown {
                    remaining: self.config.start_count,
                    next_step_at: now + self.config.step,
                    mode,
                };
                events.push(CaptureEvent::CountdownStarted {
                    remaining: self.config.start_count,
                    mode,
                });
            }
        } else if input.manual_trigger {
            debug!("Countdown trigger ignored, machine busy or cooling down");
        }

        (status, events)
    }

    fn finish(
        &self,
        mode: CaptureMode,
        now: Instant,
        ready_to_capture: &mut bool,
        events: &mut Vec<CaptureEvent>,
    ) -> CaptureState {
        match mode {
            CaptureMode::Auto => {
                info!(
                    "Countdown finished, capturing; cooldown {:?}",
                    self.config.cooldown
                );
                events.push(CaptureEvent::CaptureNow);
                CaptureState::Cooldown {
                    until: now + self.config.cooldown,
                }
            }
            CaptureMode::Manual => {
                info!("Countdown finished, ready to capture");
                *ready_to_capture = true;
                events.push(CaptureEvent::ReadyToCapture);
                CaptureState::Idle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn machine(mode: CaptureMode) -> CaptureStateMachine {
        CaptureStateMachine::new(CountdownConfig::default(), mode)
    }

    fn seen(similarity: f32) -> TickInput {
        TickInput {
            similarity: Some(similarity),
            in_range: true,
            ..Default::default()
        }
    }

    #[test]
    fn matched_pose_counts_down_and_captures() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let mut status = CaptureStatus::default();
        let mut states = Vec::new();
        let mut all_events = Vec::new();

        for (i, similarity) in [0.5, 0.82, 0.82, 0.82, 0.82].into_iter().enumerate() {
            let (next, events) = m.advance(status, &seen(similarity), t0 + SECOND * i as u32);
            status = next;
            states.push(status.countdown());
            all_events.push(events);
        }

        assert_eq!(states, vec![None, Some(3), Some(2), Some(1), None]);
        assert!(all_events[..4]
            .iter()
            .flatten()
            .all(|e| *e != CaptureEvent::CaptureNow));
        assert_eq!(all_events[4], vec![CaptureEvent::CaptureNow]);
        assert_eq!(
            status.state,
            CaptureState::Cooldown { until: t0 + SECOND * 4 + SECOND * 3 }
        );
    }

    #[test]
    fn drop_below_cancel_threshold_cancels_same_tick() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let (status, _) = m.advance(CaptureStatus::default(), &seen(0.85), t0);
        let (status, _) = m.advance(status, &seen(0.85), t0 + SECOND);
        assert_eq!(status.countdown(), Some(2));

        // Even with the next step already due, cancellation wins.
        let (status, events) = m.advance(status, &seen(0.70), t0 + SECOND * 3);
        assert_eq!(status.state, CaptureState::Idle);
        assert_eq!(events, vec![CaptureEvent::CountdownCancelled]);
    }

    #[test]
    fn leaving_range_cancels() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let (status, _) = m.advance(CaptureStatus::default(), &seen(0.9), t0);

        let away = TickInput {
            similarity: Some(0.9),
            in_range: false,
            ..Default::default()
        };
        let (status, events) = m.advance(status, &away, t0 + Duration::from_millis(300));
        assert_eq!(status.state, CaptureState::Idle);
        assert!(events.contains(&CaptureEvent::CountdownCancelled));
    }

    #[test]
    fn hysteresis_band_neither_starts_nor_cancels() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();

        let (idle, events) = m.advance(CaptureStatus::default(), &seen(0.77), t0);
        assert_eq!(idle.state, CaptureState::Idle);
        assert!(events.is_empty());

        let (status, _) = m.advance(CaptureStatus::default(), &seen(0.80), t0);
        assert_eq!(status.countdown(), Some(3));
        let (status, events) = m.advance(status, &seen(0.75), t0 + Duration::from_millis(500));
        assert_eq!(status.countdown(), Some(3));
        assert!(events.is_empty());
    }

    #[test]
    fn cooldown_blocks_new_countdown() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let status = CaptureStatus {
            state: CaptureState::Cooldown { until: t0 + SECOND * 3 },
            ready_to_capture: false,
        };

        for offset_ms in [0u64, 500, 1000, 2999] {
            for input in [
                seen(1.0),
                seen(0.9),
                TickInput {
                    similarity: None,
                    in_range: true,
                    manual_trigger: true,
                    capture_requested: false,
                },
            ] {
                let (next, _) = m.advance(status, &input, t0 + Duration::from_millis(offset_ms));
                assert!(next.is_cooling_down());
                assert_eq!(next.countdown(), None);
            }
        }

        let (next, events) = m.advance(status, &seen(0.9), t0 + SECOND * 3);
        assert_eq!(
            events,
            vec![
                CaptureEvent::CooldownEnded,
                CaptureEvent::CountdownStarted { remaining: 3, mode: CaptureMode::Auto },
            ]
        );
        assert_eq!(next.countdown(), Some(3));
    }

    #[test]
    fn second_trigger_is_a_no_op() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let (status, _) = m.advance(CaptureStatus::default(), &seen(0.9), t0);
        let input = TickInput {
            manual_trigger: true,
            ..seen(0.95)
        };
        let (next, events) = m.advance(status, &input, t0 + Duration::from_millis(100));
        assert_eq!(next, status);
        assert!(events.is_empty());
    }

    #[test]
    fn long_stall_does_not_run_past_zero() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let (status, _) = m.advance(CaptureStatus::default(), &seen(0.9), t0);

        let (status, events) = m.advance(status, &seen(0.9), t0 + SECOND * 30);
        assert_eq!(
            events,
            vec![
                CaptureEvent::CountdownStep { remaining: 2 },
                CaptureEvent::CountdownStep { remaining: 1 },
                CaptureEvent::CaptureNow,
            ]
        );
        assert_eq!(status.cooldown_remaining(t0 + SECOND * 30), SECOND * 3);
        assert_eq!(status.cooldown_remaining(t0 + SECOND * 90), Duration::ZERO);
    }

    #[test]
    fn steps_follow_wall_clock_not_ticks() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let (mut status, _) = m.advance(CaptureStatus::default(), &seen(0.9), t0);

        // Thirty ticks inside the first second leave the digit alone.
        for frame in 1..30u64 {
            let (next, _) = m.advance(status, &seen(0.9), t0 + Duration::from_millis(frame * 33));
            status = next;
        }
        assert_eq!(status.countdown(), Some(3));

        let (status, _) = m.advance(status, &seen(0.9), t0 + Duration::from_millis(1010));
        assert_eq!(status.countdown(), Some(2));
    }

    #[test]
    fn manual_mode_waits_for_confirmation() {
        let m = machine(CaptureMode::Manual);
        let t0 = Instant::now();
        let mut status = CaptureStatus::default();
        for i in 0..4u32 {
            let (next, _) = m.advance(status, &seen(0.9), t0 + SECOND * i);
            status = next;
        }
        assert_eq!(status.state, CaptureState::Idle);
        assert!(status.ready_to_capture);

        // Ready blocks a fresh countdown.
        let (status, events) = m.advance(status, &seen(0.9), t0 + SECOND * 4);
        assert!(events.is_empty());

        let confirm = TickInput {
            capture_requested: true,
            ..seen(0.9)
        };
        let (status, events) = m.advance(status, &confirm, t0 + SECOND * 5);
        assert_eq!(events, vec![CaptureEvent::CaptureNow]);
        assert!(!status.ready_to_capture);
        assert!(!status.is_cooling_down());
        assert_eq!(status.countdown(), None);
    }

    #[test]
    fn ready_flag_is_cancelled_by_pose_loss() {
        let m = machine(CaptureMode::Manual);
        let t0 = Instant::now();
        let status = CaptureStatus {
            state: CaptureState::Idle,
            ready_to_capture: true,
        };

        let input = TickInput {
            capture_requested: true,
            ..seen(0.6)
        };
        let (status, events) = m.advance(status, &input, t0);
        assert!(!status.ready_to_capture);
        assert_eq!(events, vec![CaptureEvent::CountdownCancelled]);
    }

    #[test]
    fn manual_trigger_without_reference_pose() {
        let m = machine(CaptureMode::Auto);
        let t0 = Instant::now();
        let input = TickInput {
            similarity: None,
            in_range: true,
            manual_trigger: true,
            capture_requested: false,
        };
        let (status, events) = m.advance(CaptureStatus::default(), &input, t0);
        assert_eq!(
            events,
            vec![CaptureEvent::CountdownStarted { remaining: 3, mode: CaptureMode::Manual }]
        );

        // Without a reference only range matters.
        let hold = TickInput {
            manual_trigger: false,
            ..input
        };
        let (status, _) = m.advance(status, &hold, t0 + SECOND);
        assert_eq!(status.countdown(), Some(2));
    }

    #[test]
    fn capture_request_ignored_when_not_ready() {
        let m = machine(CaptureMode::Manual);
        let input = TickInput {
            capture_requested: true,
            ..seen(0.5)
        };
        let (status, events) = m.advance(CaptureStatus::default(), &input, Instant::now());
        assert_eq!(status, CaptureStatus::default());
        assert!(events.is_empty());
    }
}
