// Animation scheduler - Per-frame numeric interpolation toward a target
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Smaller changes than this are not animated.
pub const CHANGE_THRESHOLD: f64 = 0.1;

const DEFAULT_DURATION: Duration = Duration::from_millis(750);
const DEFAULT_PRECISION: u32 = 2;
const PERCENTAGE_DURATION: Duration = Duration::from_millis(500);
const PERCENTAGE_PRECISION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Easing {
    Linear,
    #[default]
    EaseOutExpo,
    EaseInOutQuad,
    /// Overshoots the target slightly before settling.
    EaseOutBack,
}

impl Easing {
    pub fn apply(self, progress: f64) -> f64 {
        match self {
            Easing::Linear => progress,
            Easing::EaseOutExpo => {
                if progress >= 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * progress)
                }
            }
            Easing::EaseInOutQuad => {
                if progress < 0.5 {
                    2.0 * progress * progress
                } else {
                    1.0 - (-2.0 * progress + 2.0).powi(2) / 2.0
                }
            }
            Easing::EaseOutBack => {
                const C1: f64 = 1.70158;
                const C3: f64 = C1 + 1.0;
                1.0 + C3 * (progress - 1.0).powi(3) + C1 * (progress - 1.0).powi(2)
            }
        }
    }
}

/// Unset fields fall back to the defaults of the animation kind being started.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimationOptions {
    pub duration: Option<Duration>,
    pub easing: Option<Easing>,
    pub precision: Option<u32>,
}

impl AnimationOptions {
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ResolvedOptions {
    duration: Duration,
    easing: Easing,
    precision: u32,
}

impl ResolvedOptions {
    fn value(options: AnimationOptions) -> Self {
        Self {
            duration: options.duration.unwrap_or(DEFAULT_DURATION),
            easing: options.easing.unwrap_or_default(),
            precision: options.precision.unwrap_or(DEFAULT_PRECISION),
        }
    }

    fn percentage(options: AnimationOptions) -> Self {
        Self {
            duration: options.duration.unwrap_or(PERCENTAGE_DURATION),
            easing: options.easing.unwrap_or_default(),
            precision: options.precision.unwrap_or(PERCENTAGE_PRECISION),
        }
    }
}

/// Linear progress in `[0, 1]` after `elapsed` of `duration`.
pub fn progress_at(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

pub fn round_to(value: f64, precision: u32) -> f64 {
    let multiplier = 10f64.powi(precision as i32);
    (value * multiplier).round() / multiplier
}

/// Eased, rounded value between `from` and `to` at linear `progress`.
pub fn interpolate(from: f64, to: f64, progress: f64, easing: Easing, precision: u32) -> f64 {
    round_to(from + (to - from) * easing.apply(progress), precision)
}

/// An in-flight animation. Dropping the handle leaves the animation running.
#[derive(Debug)]
pub struct AnimationHandle {
    task: JoinHandle<()>,
}

impl AnimationHandle {
    /// Stops the animation; no further frames are delivered.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the final frame has been delivered or the animation was cancelled.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnimationScheduler {
    frame_interval: Duration,
}

impl Default for AnimationScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl AnimationScheduler {
    pub fn new(frame_interval: Duration) -> Self {
        Self { frame_interval }
    }

    /// Drives `on_frame` from `from` toward `to`, once per frame.
    ///
    /// The last frame always delivers exactly `to`, whatever rounding did before it.
    pub fn animate<F>(&self, from: f64, to: f64, on_frame: F, options: AnimationOptions) -> AnimationHandle
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.run(from, to, on_frame, ResolvedOptions::value(options))
    }

    /// Like `animate`, with both ends clamped to `[0, 100]` and shorter, coarser defaults.
    pub fn animate_percentage<F>(
        &self,
        from: f64,
        to: f64,
        on_frame: F,
        options: AnimationOptions,
    ) -> AnimationHandle
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.run(
            from.clamp(0.0, 100.0),
            to.clamp(0.0, 100.0),
            on_frame,
            ResolvedOptions::percentage(options),
        )
    }

    fn run<F>(&self, from: f64, to: f64, mut on_frame: F, options: ResolvedOptions) -> AnimationHandle
    where
        F: FnMut(f64) + Send + 'static,
    {
        let started = Instant::now();
        let frame_interval = self.frame_interval;

        let task = tokio::spawn(async move {
            let mut frames = tokio::time::interval_at(started + frame_interval, frame_interval);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                frames.tick().await;
                let progress = progress_at(started.elapsed(), options.duration);
                if progress >= 1.0 {
                    on_frame(to);
                    break;
                }
                on_frame(interpolate(from, to, progress, options.easing, options.precision));
            }
        });

        AnimationHandle { task }
    }
}

/// How a field animates toward a new target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationStyle {
    Value(AnimationOptions),
    Percentage(AnimationOptions),
}

/// Display state of one animated numeric field.
///
/// Owns at most one in-flight animation; retargeting cancels it before starting the next,
/// and dropping the field cancels it too.
#[derive(Debug)]
pub struct AnimatedValue {
    display: Arc<watch::Sender<f64>>,
    last_value: f64,
    in_flight: Option<AnimationHandle>,
}

impl Default for AnimatedValue {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimatedValue {
    pub fn new() -> Self {
        Self {
            display: Arc::new(watch::Sender::new(0.0)),
            last_value: 0.0,
            in_flight: None,
        }
    }

    /// The target most recently animated toward.
    pub fn last_value(&self) -> f64 {
        self.last_value
    }

    /// The currently rendered, interpolated value.
    pub fn displayed(&self) -> f64 {
        *self.display.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.display.subscribe()
    }

    pub fn is_animating(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Starts animating toward `target` from the displayed value.
    ///
    /// Returns false when the change is within `CHANGE_THRESHOLD` of the last target.
    pub fn retarget(&mut self, scheduler: &AnimationScheduler, target: f64, style: AnimationStyle) -> bool {
        if (self.last_value - target).abs() <= CHANGE_THRESHOLD {
            return false;
        }

        self.cancel();
        let from = self.displayed();
        let display = Arc::clone(&self.display);
        let on_frame = move |value: f64| {
            display.send_replace(value);
        };

        let handle = match style {
            AnimationStyle::Value(options) => scheduler.animate(from, target, on_frame, options),
            AnimationStyle::Percentage(options) => {
                scheduler.animate_percentage(from, target, on_frame, options)
            }
        };
        self.in_flight = Some(handle);
        self.last_value = target;
        true
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.cancel();
        }
    }
}

impl Drop for AnimatedValue {
    fn drop(&mut self) {
        self.cancel();
    }
}
