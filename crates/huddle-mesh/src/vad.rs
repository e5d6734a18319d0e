//! Local voice activity detection.
//!
//! While the microphone is live and unmuted, a background task measures the
//! RMS energy of the latest sample window once per tick and reports only
//! transitions between "speaking" and "not speaking".

use std::time::Duration;

use huddle_config::schema::VoiceActivityConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::media::LocalAudioStream;

/// Root-mean-square level of a sample window. Zero for an empty window.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Threshold detector that only reports state changes.
#[derive(Debug, Clone)]
pub struct SpeakingDetector {
    threshold: f32,
    speaking: bool,
}

impl SpeakingDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            speaking: false,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Feed one RMS level. Returns the new state on a transition.
    pub fn observe(&mut self, level: f32) -> Option<bool> {
        let speaking = level >= self.threshold;
        if speaking == self.speaking {
            return None;
        }
        self.speaking = speaking;
        Some(speaking)
    }
}

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub threshold: f32,
    pub buffer_size: usize,
    pub tick: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from(&VoiceActivityConfig::default())
    }
}

impl From<&VoiceActivityConfig> for SamplerConfig {
    fn from(config: &VoiceActivityConfig) -> Self {
        Self {
            threshold: config.threshold as f32,
            buffer_size: config.buffer_size as usize,
            tick: Duration::from_millis(config.tick_ms.into()),
        }
    }
}

/// A speaking transition from one sampler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakingTransition {
    pub generation: u64,
    pub speaking: bool,
}

/// A running sampler. Dropping it stops sampling.
pub(crate) struct Sampler {
    generation: u64,
    task: JoinHandle<()>,
}

impl Sampler {
    pub(crate) fn spawn<T>(
        stream: LocalAudioStream,
        config: SamplerConfig,
        generation: u64,
        reports: mpsc::Sender<T>,
    ) -> Self
    where
        T: From<SpeakingTransition> + Send + 'static,
    {
        let task = tokio::spawn(run_sampler(stream, config, generation, reports));
        Self { generation, task }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_sampler<T>(
    stream: LocalAudioStream,
    config: SamplerConfig,
    generation: u64,
    reports: mpsc::Sender<T>,
) where
    T: From<SpeakingTransition> + Send + 'static,
{
    let mut detector = SpeakingDetector::new(config.threshold);
    let mut window = vec![0.0f32; config.buffer_size.max(1)];
    let mut ticker = tokio::time::interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(generation, "Voice activity sampler started");
    loop {
        ticker.tick().await;
        stream.read_samples(&mut window);
        if let Some(speaking) = detector.observe(rms(&window)) {
            let transition = SpeakingTransition {
                generation,
                speaking,
            };
            if reports.send(transition.into()).await.is_err() {
                break;
            }
        }
    }
}
