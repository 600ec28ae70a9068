// src/predict_loop.rs - capture, estimate, publish, wait for the next tick
use crate::error::GameError;
use crate::tracking::{Hand, HandDetector};
use crate::video::FrameSource;
use anyhow::Result;
use image::DynamicImage;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct LatestFrame {
    pub frame: Option<DynamicImage>,
    pub hands: Vec<Hand>,
    pub iteration: u64,
}

pub type SharedFrame = Arc<Mutex<LatestFrame>>;

pub struct PredictLoop<S: FrameSource> {
    source: S,
    detector: Box<dyn HandDetector>,
    shared: SharedFrame,
    iteration: u64,
}

impl<S: FrameSource> PredictLoop<S> {
    pub fn new(source: S, detector: Box<dyn HandDetector>, shared: SharedFrame) -> Self {
        Self {
            source,
            detector,
            shared,
            iteration: 0,
        }
    }

    /// One iteration. A failed detection still publishes the frame, with no
    /// hands, so the video keeps moving.
    pub fn step(&mut self) -> Result<usize> {
        let frame = self.source.read_frame()?;
        let hands = match self.detector.estimate_hands(&frame) {
            Ok(hands) => hands,
            Err(e) => {
                tracing::warn!("Hand estimation failed: {:#}", e);
                Vec::new()
            }
        };
        let detected = hands.len();

        self.iteration += 1;
        let mut latest = self
            .shared
            .lock()
            .map_err(|_| anyhow::anyhow!("Latest frame lock poisoned"))?;
        latest.frame = Some(frame);
        latest.hands = hands;
        latest.iteration = self.iteration;
        tracing::trace!("Frame {} published with {} hand(s)", self.iteration, detected);
        Ok(detected)
    }

    /// Steps until `stop` fires or is dropped, or `max_iterations` is hit.
    /// Ticks missed while a step overruns are skipped, not queued.
    pub fn run(mut self, interval: Duration, stop: Receiver<()>, max_iterations: Option<u64>) -> u64 {
        let mut completed = 0;
        loop {
            let started = Instant::now();
            if let Err(e) = self.step() {
                tracing::warn!("Predict loop iteration failed: {:#}", e);
            }
            completed += 1;
            if max_iterations.is_some_and(|max| completed >= max) {
                break;
            }

            let wait = interval.saturating_sub(started.elapsed());
            match stop.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!("Predict loop stopped after {} iteration(s)", completed);
        completed
    }
}

pub struct PredictLoopHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<u64>>,
}

impl PredictLoopHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signals the loop and waits for it, returning the iterations it ran.
    pub fn stop(mut self) -> u64 {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for PredictLoopHandle {
    fn drop(&mut self) {
        // dropping the sender disconnects the channel, which ends the loop
        self.stop.take();
    }
}

/// Starts the loop on its own thread. The frame source is opened on that
/// thread, so it never has to cross threads; an open failure is returned here.
pub fn start<S, F>(
    open_source: F,
    detector: Box<dyn HandDetector>,
    shared: SharedFrame,
    interval: Duration,
    max_iterations: Option<u64>,
) -> Result<PredictLoopHandle, GameError>
where
    S: FrameSource + 'static,
    F: FnOnce() -> Result<S, GameError> + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let thread = std::thread::Builder::new()
        .name("predict-loop".into())
        .spawn(move || {
            let source = match open_source() {
                Ok(source) => {
                    let _ = ready_tx.send(Ok(()));
                    source
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return 0;
                }
            };
            tracing::info!("Predict loop started");
            PredictLoop::new(source, detector, shared).run(interval, stop_rx, max_iterations)
        })
        .map_err(|e| GameError::StreamFailed(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(PredictLoopHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => Err(GameError::StreamFailed("predict loop exited during startup".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::tests::synthetic_hand;

    struct ScriptedSource {
        frames_left: Option<usize>,
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<DynamicImage> {
            match self.frames_left.as_mut() {
                Some(0) => anyhow::bail!("out of frames"),
                Some(left) => *left -= 1,
                None => {}
            }
            Ok(DynamicImage::new_rgb8(36, 20))
        }
    }

    /// Finds a hand on even calls and fails on every third.
    struct ScriptedDetector {
        calls: usize,
    }

    impl HandDetector for ScriptedDetector {
        fn estimate_hands(&mut self, _frame: &DynamicImage) -> Result<Vec<Hand>> {
            self.calls += 1;
            if self.calls % 3 == 0 {
                anyhow::bail!("estimation failed");
            }
            Ok(if self.calls % 2 == 0 { vec![synthetic_hand(0.0)] } else { Vec::new() })
        }
    }

    /// Sleeps for `delays[n]` on call n (the last entry repeats) and records
    /// when each call started.
    struct SlowDetector {
        delays: Vec<Duration>,
        started: Arc<Mutex<Vec<Instant>>>,
    }

    impl HandDetector for SlowDetector {
        fn estimate_hands(&mut self, _frame: &DynamicImage) -> Result<Vec<Hand>> {
            let mut started = self.started.lock().unwrap();
            let delay = self.delays[started.len().min(self.delays.len() - 1)];
            started.push(Instant::now());
            drop(started);
            std::thread::sleep(delay);
            Ok(Vec::new())
        }
    }

    fn shared() -> SharedFrame {
        Arc::new(Mutex::new(LatestFrame::default()))
    }

    #[test]
    fn step_publishes_frame_and_hands() {
        let shared = shared();
        let mut predict = PredictLoop::new(
            ScriptedSource { frames_left: None },
            Box::new(ScriptedDetector { calls: 0 }),
            shared.clone(),
        );

        assert_eq!(predict.step().unwrap(), 0);
        assert!(shared.lock().unwrap().frame.is_some());

        assert_eq!(predict.step().unwrap(), 1);
        assert_eq!(shared.lock().unwrap().hands.len(), 1);

        // third call fails inside the detector; the frame still lands
        assert_eq!(predict.step().unwrap(), 0);
        let latest = shared.lock().unwrap();
        assert_eq!(latest.iteration, 3);
        assert!(latest.hands.is_empty());
    }

    #[test]
    fn frame_errors_do_not_end_the_loop() {
        let shared = shared();
        let (_stop_tx, stop_rx) = mpsc::channel();
        let predict = PredictLoop::new(
            ScriptedSource { frames_left: Some(2) },
            Box::new(ScriptedDetector { calls: 0 }),
            shared.clone(),
        );
        let completed = predict.run(Duration::ZERO, stop_rx, Some(5));
        assert_eq!(completed, 5);
        assert_eq!(shared.lock().unwrap().iteration, 2);
    }

    #[test]
    fn bounded_start_runs_exact_iterations() {
        let shared = shared();
        let handle = start(
            || Ok(ScriptedSource { frames_left: None }),
            Box::new(ScriptedDetector { calls: 0 }),
            shared.clone(),
            Duration::from_millis(1),
            Some(4),
        )
        .unwrap();
        assert_eq!(handle.stop(), 4);
        assert_eq!(shared.lock().unwrap().iteration, 4);
    }

    #[test]
    fn stop_ends_an_unbounded_loop() {
        let handle = start(
            || Ok(ScriptedSource { frames_left: None }),
            Box::new(ScriptedDetector { calls: 0 }),
            shared(),
            Duration::from_millis(5),
            None,
        )
        .unwrap();
        assert!(handle.is_running());
        std::thread::sleep(Duration::from_millis(30));
        assert!(handle.stop() >= 1);
    }

    #[test]
    fn slow_estimation_paces_the_loop() {
        let interval = Duration::from_millis(10);
        let step = Duration::from_millis(30);
        let window = Duration::from_millis(300);
        let started = Arc::new(Mutex::new(Vec::new()));
        let handle = start(
            || Ok(ScriptedSource { frames_left: None }),
            Box::new(SlowDetector { delays: vec![step], started: started.clone() }),
            shared(),
            interval,
            None,
        )
        .unwrap();
        std::thread::sleep(window);
        let completed = handle.stop();

        // paced by the 30 ms estimation, never by the 10 ms tick
        let by_step = (window.as_millis() / step.as_millis()) as u64;
        let by_tick = (window.as_millis() / interval.as_millis()) as u64;
        assert!(completed >= 1);
        assert!(completed <= by_step + 2, "{} iterations", completed);
        assert!(completed < by_tick / 2, "{} iterations", completed);

        let started = started.lock().unwrap();
        for pair in started.windows(2) {
            assert!(pair[1] - pair[0] >= step);
        }
    }

    #[test]
    fn missed_ticks_are_not_replayed() {
        let interval = Duration::from_millis(20);
        let started = Arc::new(Mutex::new(Vec::new()));
        let (_stop_tx, stop_rx) = mpsc::channel();
        let predict = PredictLoop::new(
            ScriptedSource { frames_left: None },
            Box::new(SlowDetector {
                delays: vec![Duration::from_millis(100), Duration::ZERO],
                started: started.clone(),
            }),
            shared(),
        );
        assert_eq!(predict.run(interval, stop_rx, Some(5)), 5);

        // one overrun of five ticks costs one immediate step, then the
        // regular spacing resumes instead of a burst of catch-up steps
        let started = started.lock().unwrap();
        let gaps: Vec<Duration> = started.windows(2).map(|pair| pair[1] - pair[0]).collect();
        assert!(gaps[0] >= Duration::from_millis(100));
        for gap in &gaps[1..] {
            assert!(*gap >= Duration::from_millis(15), "{:?}", gaps);
        }
    }

    #[test]
    fn open_failure_is_reported_at_start() {
        let result = start(
            || Err::<ScriptedSource, _>(GameError::StreamFailed("permission denied".into())),
            Box::new(ScriptedDetector { calls: 0 }),
            shared(),
            Duration::from_millis(1),
            None,
        );
        assert!(matches!(result, Err(GameError::StreamFailed(_))));
    }
}
