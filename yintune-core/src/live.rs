//! # Live Tuner Module
//!
//! The consumer half of the live pipeline. Blocks arrive on a channel from the
//! capture callback; this side runs the estimator and the smoother on each of
//! them and hands the display state to a sink.
//!
//! The loop stops cooperatively: on a shutdown message, when the block
//! channel disconnects, or when the sink asks it to.

use crossbeam_channel::{select, Receiver};

use crate::config::TunerConfig;
use crate::pitch::{YinEstimator, YinParams};
use crate::smoothing::{LiveDisplayState, LiveSmoother, SmootherParams};
use crate::tuning::TuningReference;
use crate::{AudioFrame, PitchResult};

/// What the sink wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Why [`run_live`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A shutdown message arrived (or its sender was dropped).
    Shutdown,
    /// The block channel disconnected.
    SourceClosed,
    /// The sink returned [`LoopControl::Stop`].
    SinkStopped,
}

/// Summary of one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveSummary {
    pub reason: ExitReason,
    /// Blocks analysed.
    pub blocks: usize,
    /// Blocks that produced a pitch on the display.
    pub pitched: usize,
}

/// Estimator and smoother for one live stream.
///
/// The estimator keeps its FFT plans across blocks of the same size.
#[derive(Debug, Clone)]
pub struct LiveTuner {
    estimator: YinEstimator,
    smoother: LiveSmoother,
}

impl LiveTuner {
    pub fn new(yin: YinParams, tuning: TuningReference, smoother: SmootherParams) -> Self {
        Self {
            estimator: YinEstimator::new(yin),
            smoother: LiveSmoother::new(tuning, smoother),
        }
    }

    pub fn from_config(config: &TunerConfig) -> Self {
        Self::new(
            config.yin_params(),
            config.tuning(),
            config.smoother_params(),
        )
    }

    pub fn smoother(&self) -> &LiveSmoother {
        &self.smoother
    }

    /// Estimates one frame and updates the display state.
    pub fn process_frame(&mut self, frame: &AudioFrame) -> (PitchResult, LiveDisplayState) {
        let result = self.estimator.estimate_frame(frame);
        let state = self.smoother.update(result);
        (result, state)
    }
}

/// Drains `blocks` until told to stop, feeding every block through `tuner`.
///
/// # Arguments
/// * `blocks` - Mono frames from the capture side
/// * `shutdown` - Any message (or disconnect) stops the loop
/// * `tuner` - Estimator and smoother state
/// * `sink` - Receives each raw result and display state
pub fn run_live<F>(
    blocks: &Receiver<AudioFrame>,
    shutdown: &Receiver<()>,
    tuner: &mut LiveTuner,
    mut sink: F,
) -> LiveSummary
where
    F: FnMut(&PitchResult, &LiveDisplayState) -> LoopControl,
{
    let mut blocks_seen = 0;
    let mut pitched = 0;
    log::debug!("Entering live processing loop");

    let reason = loop {
        // A pending shutdown wins over queued audio.
        if shutdown.try_recv().is_ok() {
            break ExitReason::Shutdown;
        }
        select! {
            recv(blocks) -> msg => match msg {
                Ok(frame) => {
                    let (result, state) = tuner.process_frame(&frame);
                    blocks_seen += 1;
                    if matches!(state, LiveDisplayState::Pitch { .. }) {
                        pitched += 1;
                    }
                    if sink(&result, &state) == LoopControl::Stop {
                        break ExitReason::SinkStopped;
                    }
                }
                Err(_) => {
                    log::debug!("Audio channel closed");
                    break ExitReason::SourceClosed;
                }
            },
            recv(shutdown) -> _ => {
                log::debug!("Received shutdown signal");
                break ExitReason::Shutdown;
            },
        }
    };

    log::debug!("Live loop finished ({reason:?}) after {blocks_seen} block(s)");
    LiveSummary {
        reason,
        blocks: blocks_seen,
        pitched,
    }
}
