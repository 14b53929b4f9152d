// SPDX-License-Identifier: GPL-3.0-only

#![cfg(all(target_arch = "x86_64", feature = "freedepth"))]

//! Kinect session through freedepth
//!
//! freedepth talks to the sensor over USB directly, unbinding the kernel
//! driver while the session is open and rebinding it on shutdown. Depth comes
//! as 11-bit frames; one delivery thread forwards the centre pixel of each
//! frame to whichever sink is installed (polled channel or stream callback).
//! Motor status comes straight from the device's tilt state report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use freedepth::{DepthFormat, DepthFrame, KinectStreamer, Resolution, VideoFormat, VideoFrame};
use tracing::{debug, info, warn};

use super::DeviceSession;
use super::motor_control::clamp_tilt;
use super::types::*;
use crate::constants::{CENTER_PIXEL_INDEX, DEPTH_READ_TIMEOUT};

type SinkSlot = Arc<Mutex<Option<DepthCallback>>>;
type FailureSlot = Arc<Mutex<Option<String>>>;

/// Enumerate sensors visible to freedepth
pub fn enumerate_devices() -> Vec<DeviceInfo> {
    match freedepth::enumerate_devices() {
        Ok(devices) => devices
            .iter()
            .map(|dev| DeviceInfo {
                name: dev.name.clone(),
                locator: dev.index.to_string(),
                driver: "freedepth",
            })
            .collect(),
        Err(e) => {
            debug!("Failed to enumerate freedepth devices: {}", e);
            Vec::new()
        }
    }
}

/// Device session backed by freedepth's USB streamer
pub struct NativeSession {
    index: usize,
    name: String,
    streamer: Option<KinectStreamer>,
    sink: SinkSlot,
    failure: FailureSlot,
    polled_rx: Option<Receiver<DepthSample>>,
    running: Arc<AtomicBool>,
    delivery_thread: Option<JoinHandle<()>>,
}

impl NativeSession {
    /// Open the sensor and start its depth stream
    pub fn open(index: usize) -> BackendResult<Self> {
        info!(index, "Opening Kinect through freedepth");

        let mut streamer = KinectStreamer::new(index).map_err(|e| {
            BackendError::DeviceNotFound(format!("freedepth device {}: {}", index, e))
        })?;

        let (video_rx, depth_rx) = streamer
            .start(VideoFormat::Bayer, Resolution::Medium, DepthFormat::Depth11Bit)
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to start streaming: {}", e)))?;

        let sink: SinkSlot = Arc::new(Mutex::new(None));
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let running = Arc::new(AtomicBool::new(true));
        let thread_sink = Arc::clone(&sink);
        let thread_failure = Arc::clone(&failure);
        let thread_running = Arc::clone(&running);
        let delivery_thread = thread::spawn(move || {
            delivery_loop(thread_running, video_rx, depth_rx, thread_sink, thread_failure);
        });

        Ok(Self {
            index,
            name: format!("Kinect #{} (freedepth)", index),
            streamer: Some(streamer),
            sink,
            failure,
            polled_rx: None,
            running,
            delivery_thread: Some(delivery_thread),
        })
    }

    fn streamer(&self) -> BackendResult<&KinectStreamer> {
        self.streamer
            .as_ref()
            .ok_or_else(|| BackendError::Other("freedepth session is shut down".to_string()))
    }

    fn install_sink(&self, callback: Option<DepthCallback>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    /// Error the delivery thread ended on, if any
    fn delivery_failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DeviceSession for NativeSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_led(&mut self, _color: LedColor) -> BackendResult<()> {
        // freedepth drives the LED from the device state itself
        Err(BackendError::NotSupported("LED control through freedepth"))
    }

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()> {
        let degrees = clamp_tilt(degrees, freedepth::TILT_MIN_DEGREES, freedepth::TILT_MAX_DEGREES);
        debug!(degrees, "Setting tilt via freedepth");
        self.streamer()?
            .set_tilt(degrees)
            .map_err(|e| BackendError::Other(format!("Failed to set tilt: {}", e)))
    }

    fn tilt_status(&mut self) -> BackendResult<TiltStatus> {
        let state = self
            .streamer()?
            .get_tilt_state()
            .map_err(|e| BackendError::Other(format!("Failed to get tilt state: {}", e)))?;
        Ok(motor_status(state.tilt_status))
    }

    fn read_depth_sample(&mut self) -> BackendResult<DepthSample> {
        self.streamer()?;

        if self.polled_rx.is_none() {
            let (sender, receiver) = mpsc::sync_channel(1);
            self.install_sink(Some(Box::new(move |sample| {
                let _ = sender.try_send(sample);
            })));
            self.polled_rx = Some(receiver);
        }

        let Some(receiver) = self.polled_rx.as_ref() else {
            return Err(BackendError::DepthReadFailed("no capture channel".to_string()));
        };

        while receiver.try_recv().is_ok() {}

        match receiver.recv_timeout(DEPTH_READ_TIMEOUT) {
            Ok(sample) => Ok(sample),
            Err(RecvTimeoutError::Timeout) => Err(BackendError::DepthReadFailed(
                self.delivery_failure().unwrap_or_else(|| {
                    format!("no depth frame within {} ms", DEPTH_READ_TIMEOUT.as_millis())
                }),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(BackendError::DepthReadFailed(
                "depth stream ended".to_string(),
            )),
        }
    }

    fn start_depth_stream(&mut self, callback: DepthCallback) -> BackendResult<()> {
        self.streamer()?;
        self.polled_rx = None;
        self.install_sink(Some(callback));
        Ok(())
    }

    fn stop_depth_stream(&mut self) -> BackendResult<()> {
        self.install_sink(None);
        match self.delivery_failure() {
            Some(message) => Err(BackendError::DepthReadFailed(message)),
            None => Ok(()),
        }
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        let Some(mut streamer) = self.streamer.take() else {
            return Ok(());
        };
        info!(index = self.index, "Releasing Kinect");

        self.install_sink(None);
        self.polled_rx = None;
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.delivery_thread.take() {
            let _ = thread.join();
        }

        // Stopping the streamer rebinds the kernel driver
        streamer.stop();
        streamer
            .rebind_driver()
            .map_err(|e| BackendError::Other(format!("Failed to rebind kernel driver: {}", e)))
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Failed to release Kinect on drop");
        }
    }
}

/// Map the motor status byte of a tilt state report
fn motor_status(status: freedepth::TiltStatus) -> TiltStatus {
    match status {
        freedepth::TiltStatus::Stopped => TiltStatus::Stopped,
        freedepth::TiltStatus::Limit => TiltStatus::AtLimit,
        freedepth::TiltStatus::Moving => TiltStatus::Moving,
    }
}

/// Forward depth frames to the installed sink until stopped
///
/// If the streamer goes away first, the reason is left in `failure`.
fn delivery_loop(
    running: Arc<AtomicBool>,
    video_rx: Receiver<VideoFrame>,
    depth_rx: Receiver<DepthFrame>,
    sink: SinkSlot,
    failure: FailureSlot,
) {
    let mut sequence = 0u32;

    while running.load(Ordering::Relaxed) {
        // Video is not used, drain it so the streamer never backs up
        while video_rx.try_recv().is_ok() {}

        match depth_rx.try_recv() {
            Ok(frame) => {
                let Some(value) = frame.as_u16().and_then(|px| px.get(CENTER_PIXEL_INDEX).copied())
                else {
                    continue;
                };
                let sample = DepthSample { value, sequence };
                sequence = sequence.wrapping_add(1);
                if let Ok(mut guard) = sink.lock()
                    && let Some(callback) = guard.as_mut()
                {
                    callback(sample);
                }
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(1)),
            Err(TryRecvError::Disconnected) => {
                if running.load(Ordering::Relaxed) {
                    warn!("freedepth depth stream ended unexpectedly");
                    *failure.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some("freedepth depth stream ended".to_string());
                }
                break;
            }
        }
    }

    debug!(frames = sequence, "freedepth delivery thread ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_status_mapping() {
        assert_eq!(motor_status(freedepth::TiltStatus::Stopped), TiltStatus::Stopped);
        assert_eq!(motor_status(freedepth::TiltStatus::Limit), TiltStatus::AtLimit);
        assert!(motor_status(freedepth::TiltStatus::Moving).is_moving());
    }
}
