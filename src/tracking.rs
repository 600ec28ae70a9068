// src/tracking.rs - hand landmarks and the detectors that produce them
use crate::config::DetectorConfig;
use anyhow::{Context, Result};
use image::DynamicImage;
use nalgebra::Vector3;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

/// Landmarks per hand reported by the MediaPipe hand landmarker.
pub const HAND_LANDMARKS: usize = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Thumb,
    IndexFinger,
    MiddleFinger,
    RingFinger,
    Pinky,
    PalmBase,
}

// Landmark indices of each region for a 21-point hand
const REGION_LAYOUT: [(Region, &[usize]); 6] = [
    (Region::Thumb, &[1, 2, 3, 4]),
    (Region::IndexFinger, &[5, 6, 7, 8]),
    (Region::MiddleFinger, &[9, 10, 11, 12]),
    (Region::RingFinger, &[13, 14, 15, 16]),
    (Region::Pinky, &[17, 18, 19, 20]),
    (Region::PalmBase, &[0]),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    regions: Vec<(Region, Vec<Vector3<f64>>)>,
}

impl Annotations {
    pub fn from_landmarks(landmarks: &[Vector3<f64>]) -> Self {
        if landmarks.len() < HAND_LANDMARKS {
            return Self::default();
        }
        let regions = REGION_LAYOUT
            .iter()
            .map(|(region, indices)| (*region, indices.iter().map(|&i| landmarks[i]).collect()))
            .collect();
        Self { regions }
    }

    pub fn get(&self, region: Region) -> Option<&[Vector3<f64>]> {
        self.regions
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, points)| points.as_slice())
    }

    pub fn palm_base(&self) -> Option<Vector3<f64>> {
        self.get(Region::PalmBase).and_then(|points| points.first().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Region, &[Vector3<f64>])> {
        self.regions.iter().map(|(r, points)| (*r, points.as_slice()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    pub landmarks: Vec<Vector3<f64>>,
    pub annotations: Annotations,
}

impl Hand {
    pub fn new(landmarks: Vec<Vector3<f64>>) -> Self {
        let annotations = Annotations::from_landmarks(&landmarks);
        Self { landmarks, annotations }
    }
}

pub trait HandDetector: Send {
    /// Zero or more hands found in `frame`, landmarks in frame pixels.
    fn estimate_hands(&mut self, frame: &DynamicImage) -> Result<Vec<Hand>>;
}

/// Stand-in used when no landmark model could be started.
pub struct NoDetector;

impl HandDetector for NoDetector {
    fn estimate_hands(&mut self, _frame: &DynamicImage) -> Result<Vec<Hand>> {
        Ok(Vec::new())
    }
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: String,
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Parses one detector response line. Coordinates come in normalised and
/// are scaled to the frame so they match what the classifier was trained on.
pub fn parse_detection(line: &str, width: u32, height: u32, min_confidence: f32) -> Result<Vec<Hand>> {
    let result: DetectionJson = serde_json::from_str(line.trim())
        .with_context(|| format!("Failed to parse detector response: {}", line.trim()))?;

    if let Some(error) = result.error {
        anyhow::bail!("Detector error: {}", error);
    }

    let (w, h) = (width as f64, height as f64);
    let hands = result
        .hands
        .into_iter()
        .filter(|hand| {
            if hand.score < min_confidence {
                tracing::debug!("Dropping {} hand at score {:.2}", hand.handedness, hand.score);
                return false;
            }
            if hand.landmarks.len() != HAND_LANDMARKS {
                tracing::warn!("Expected {} landmarks, got {}", HAND_LANDMARKS, hand.landmarks.len());
                return false;
            }
            true
        })
        .map(|hand| {
            let landmarks = hand
                .landmarks
                .iter()
                .map(|lm| Vector3::new(lm.x * w, lm.y * h, lm.z * w))
                .collect();
            Hand::new(landmarks)
        })
        .collect();

    Ok(hands)
}

/// Kills and reaps the child when dropped, on every exit path.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

/// MediaPipe hand landmarker running in a Python child process.
///
/// Per frame the child receives a little-endian `width, height, channels`
/// header followed by raw RGB bytes, and answers with one JSON line.
pub struct MediaPipeDetector {
    process: ChildGuard,
    stdout_reader: BufReader<ChildStdout>,
    min_confidence: f32,
}

impl MediaPipeDetector {
    pub fn spawn(config: &DetectorConfig) -> Result<Self> {
        if !config.script.exists() {
            anyhow::bail!("Hand detection script not found at {}", config.script.display());
        }

        tracing::info!("Starting MediaPipe hand detector: {}", config.script.display());
        let mut process = ChildGuard(
            Command::new(&config.python)
                .arg(&config.script)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .with_context(|| format!("Failed to start {}", config.python.display()))?,
        );

        let stdout = process.0.stdout.take().context("Failed to get detector stdout")?;
        let mut stdout_reader = BufReader::new(stdout);

        let mut ready = String::new();
        stdout_reader.read_line(&mut ready)?;
        if ready.trim() != "READY" {
            anyhow::bail!("Detector did not signal ready, got: {}", ready.trim());
        }

        tracing::info!("MediaPipe hand detector ready");
        Ok(Self {
            process,
            stdout_reader,
            min_confidence: config.min_confidence,
        })
    }
}

impl HandDetector for MediaPipeDetector {
    fn estimate_hands(&mut self, frame: &DynamicImage) -> Result<Vec<Hand>> {
        let rgb = frame.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let stdin = self.process.0.stdin.as_mut().context("Detector stdin closed")?;
        stdin.write_all(&width.to_le_bytes())?;
        stdin.write_all(&height.to_le_bytes())?;
        stdin.write_all(&3u32.to_le_bytes())?;
        stdin.write_all(rgb.as_raw())?;
        stdin.flush()?;

        let mut response = String::new();
        if self.stdout_reader.read_line(&mut response)? == 0 {
            anyhow::bail!("Detector exited");
        }

        parse_detection(&response, width, height, self.min_confidence)
    }
}
