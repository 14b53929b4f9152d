// SPDX-License-Identifier: GPL-3.0-only

//! Kinect session through the kernel gspca_kinect driver
//!
//! The motor is driven with the `V4L2_CID_TILT_ABSOLUTE` control and depth
//! is captured as Y10B (10-bit packed grayscale) with the v4l crate. The
//! driver reports only the current angle, so tilt status comes from a
//! [`TiltTracker`].
//!
//! Capture always runs on its own thread. Polled reads go through a one-slot
//! channel; streamed mode hands every frame straight to the caller's callback.
//! A capture thread that dies keeps its error, and stopping it reports that
//! error to the caller.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use super::DeviceSession;
use super::motor_control::{TiltTracker, clamp_tilt};
use super::types::*;
use super::v4l2_controls::{self, V4L2_CID_TILT_ABSOLUTE};
use crate::constants::{
    CENTER_PIXEL_INDEX, DEPTH_HEIGHT, DEPTH_READ_TIMEOUT, DEPTH_WIDTH, TILT_MAX_DEGREES,
    TILT_MIN_DEGREES, V4L2_BUFFER_COUNT, V4L2_DEQUEUE_TIMEOUT,
};

/// Extract one pixel from Y10B data (4 pixels = 5 bytes, MSB first)
pub fn unpack_y10b_pixel(raw: &[u8], index: usize) -> Option<u16> {
    let bit = index * 10;
    let byte = bit / 8;
    let hi = *raw.get(byte)?;
    let lo = *raw.get(byte + 1)?;
    let shift = 6 - (bit % 8);
    Some((((u16::from(hi) << 8) | u16::from(lo)) >> shift) & 0x3FF)
}

/// Packed size in bytes of a Y10B frame
pub fn y10b_frame_size(width: u32, height: u32) -> usize {
    (width as usize * height as usize * 10).div_ceil(8)
}

/// Enumerate V4L2 capture nodes that belong to a Kinect
pub fn enumerate_kinect_nodes() -> Vec<DeviceInfo> {
    v4l::context::enum_devices()
        .into_iter()
        .filter_map(|node| {
            let path = node.path().to_string_lossy().to_string();
            let name = node.name().unwrap_or_else(|| "Unknown".to_string());
            let is_kinect = name.to_lowercase().contains("kinect")
                || v4l2_controls::has_control(&path, V4L2_CID_TILT_ABSOLUTE);
            if !is_kinect {
                return None;
            }
            debug!(name = %name, path = %path, "Found Kinect V4L2 node");
            Some(DeviceInfo {
                name,
                locator: path,
                driver: "gspca_kinect",
            })
        })
        .collect()
}

/// Capture thread together with the error it ended on
struct CaptureWorker {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
    failure: Arc<Mutex<Option<String>>>,
}

impl CaptureWorker {
    /// Run `work` on a new thread, feeding frames into `sink`
    ///
    /// The error `work` returns is stored before `sink` is dropped, so a
    /// reader that sees the sink disconnect always finds the error.
    fn spawn<F>(mut sink: DepthCallback, work: F) -> Self
    where
        F: FnOnce(&mut DepthCallback, &AtomicBool) -> Result<(), String> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let failure = Arc::new(Mutex::new(None));
        let thread_running = Arc::clone(&running);
        let thread_failure = Arc::clone(&failure);

        let thread = thread::spawn(move || {
            if let Err(e) = work(&mut sink, &thread_running) {
                error!(error = %e, "Depth capture loop failed");
                *thread_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
            }
            drop(sink);
        });

        Self {
            running,
            thread,
            failure,
        }
    }

    /// Error the capture thread ended on, if any
    fn failure(&self) -> Option<String> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the thread and report the error it ended on
    fn stop(self) -> BackendResult<()> {
        self.running.store(false, Ordering::SeqCst);
        self.thread
            .join()
            .map_err(|_| BackendError::Other("depth capture thread panicked".to_string()))?;

        match self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            Some(message) => Err(BackendError::DepthReadFailed(message)),
            None => Ok(()),
        }
    }
}

/// Device session backed by the kernel driver
pub struct KernelSession {
    device_path: String,
    name: String,
    tilt_min: i8,
    tilt_max: i8,
    tracker: TiltTracker,
    capture: Option<CaptureWorker>,
    polled_rx: Option<Receiver<DepthSample>>,
    open: bool,
}

impl KernelSession {
    /// Open the capture node and check it has a tilt motor
    pub fn open(device_path: &str) -> BackendResult<Self> {
        let dev = Device::with_path(device_path).map_err(|e| {
            BackendError::DeviceNotFound(format!("{}: {}", device_path, e))
        })?;
        let name = dev
            .query_caps()
            .map(|caps| caps.card)
            .unwrap_or_else(|_| "Kinect".to_string());
        drop(dev);

        let tilt = v4l2_controls::query_control(device_path, V4L2_CID_TILT_ABSOLUTE)
            .filter(|range| !range.is_disabled())
            .ok_or_else(|| {
                BackendError::InitializationFailed(format!(
                    "{} has no tilt control, is it a Kinect depth node?",
                    device_path
                ))
            })?;

        let tilt_min = i8::try_from(tilt.minimum).unwrap_or(TILT_MIN_DEGREES);
        let tilt_max = i8::try_from(tilt.maximum).unwrap_or(TILT_MAX_DEGREES);

        info!(
            device_path,
            name = %name,
            tilt_min,
            tilt_max,
            "Opened Kinect through kernel driver"
        );

        Ok(Self {
            device_path: device_path.to_string(),
            name,
            tilt_min,
            tilt_max,
            tracker: TiltTracker::new(tilt_min, tilt_max),
            capture: None,
            polled_rx: None,
            open: true,
        })
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::Other(format!("{} is shut down", self.device_path)))
        }
    }

    fn start_capture(&mut self, sink: DepthCallback) {
        let device_path = self.device_path.clone();
        self.capture = Some(CaptureWorker::spawn(sink, move |sink, running| {
            capture_loop(&device_path, sink, running)
        }));
    }

    fn stop_capture(&mut self) -> BackendResult<()> {
        self.polled_rx = None;
        if let Some(capture) = self.capture.take() {
            capture.stop()?;
            info!("Depth capture thread stopped");
        }
        Ok(())
    }

    fn capture_failure(&self) -> String {
        self.capture
            .as_ref()
            .and_then(CaptureWorker::failure)
            .unwrap_or_else(|| "capture thread ended".to_string())
    }
}

impl DeviceSession for KernelSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_led(&mut self, _color: LedColor) -> BackendResult<()> {
        Err(BackendError::NotSupported("LED control through the kernel driver"))
    }

    fn set_tilt(&mut self, degrees: i8) -> BackendResult<()> {
        self.ensure_open()?;
        let degrees = clamp_tilt(degrees, self.tilt_min, self.tilt_max);
        debug!(device_path = %self.device_path, degrees, "Setting tilt via V4L2");
        v4l2_controls::set_control(&self.device_path, V4L2_CID_TILT_ABSOLUTE, i32::from(degrees))?;
        self.tracker.command(degrees);
        Ok(())
    }

    fn tilt_status(&mut self) -> BackendResult<TiltStatus> {
        self.ensure_open()?;
        let reading = v4l2_controls::get_control(&self.device_path, V4L2_CID_TILT_ABSOLUTE)?;
        let reading = reading.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8;
        Ok(self.tracker.observe(reading))
    }

    fn read_depth_sample(&mut self) -> BackendResult<DepthSample> {
        self.ensure_open()?;

        if self.polled_rx.is_none() {
            if self.capture.is_some() {
                return Err(BackendError::Other(
                    "depth stream is running, polled reads are unavailable".to_string(),
                ));
            }
            let (sender, receiver) = mpsc::sync_channel(1);
            self.start_capture(Box::new(move |sample| {
                // Full slot means the reader has not asked yet; the frame is stale anyway
                let _ = sender.try_send(sample);
            }));
            self.polled_rx = Some(receiver);
        }

        let Some(receiver) = self.polled_rx.as_ref() else {
            return Err(BackendError::DepthReadFailed("no capture channel".to_string()));
        };

        // Drop frames captured before this call, they may predate the last tilt move
        while receiver.try_recv().is_ok() {}

        match receiver.recv_timeout(DEPTH_READ_TIMEOUT) {
            Ok(sample) => Ok(sample),
            Err(RecvTimeoutError::Timeout) => Err(BackendError::DepthReadFailed(format!(
                "no depth frame within {} ms",
                DEPTH_READ_TIMEOUT.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BackendError::DepthReadFailed(self.capture_failure()))
            }
        }
    }

    fn start_depth_stream(&mut self, callback: DepthCallback) -> BackendResult<()> {
        self.ensure_open()?;
        // A polled capture may be running from earlier reads
        self.stop_capture()?;
        self.start_capture(callback);
        Ok(())
    }

    fn stop_depth_stream(&mut self) -> BackendResult<()> {
        self.stop_capture()
    }

    fn shutdown(&mut self) -> BackendResult<()> {
        if !self.open {
            return Ok(());
        }
        info!(device_path = %self.device_path, "Releasing Kinect");
        self.open = false;
        self.stop_capture()
    }
}

impl Drop for KernelSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Failed to release Kinect on drop");
        }
    }
}

/// Capture loop running on the capture thread
fn capture_loop(
    device_path: &str,
    sink: &mut DepthCallback,
    running: &AtomicBool,
) -> Result<(), String> {
    let mut dev = Device::with_path(device_path)
        .map_err(|e| format!("Failed to open V4L2 device {}: {}", device_path, e))?;

    let y10b_fourcc = v4l::FourCC::new(b"Y10B");
    let mut format = dev
        .format()
        .map_err(|e| format!("Failed to get format: {}", e))?;
    format.width = DEPTH_WIDTH;
    format.height = DEPTH_HEIGHT;
    format.fourcc = y10b_fourcc;

    let applied = dev
        .set_format(&format)
        .map_err(|e| format!("Failed to set Y10B format: {}", e))?;
    if applied.fourcc != y10b_fourcc {
        return Err(format!(
            "Device did not accept Y10B format, got {:?}",
            applied.fourcc
        ));
    }

    let expected_size = y10b_frame_size(applied.width, applied.height);
    let mut stream = MmapStream::with_buffers(&mut dev, Type::VideoCapture, V4L2_BUFFER_COUNT)
        .map_err(|e| format!("Failed to create buffer stream: {}", e))?;
    // Bounded dequeue so a silent device cannot keep the thread from seeing `running`
    stream.set_timeout(V4L2_DEQUEUE_TIMEOUT);

    info!(
        device_path,
        width = applied.width,
        height = applied.height,
        expected_size,
        "V4L2 depth capture started"
    );

    let mut frames = 0u64;
    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                frames += 1;
                if buf.len() < expected_size && frames % 30 == 1 {
                    warn!(got = buf.len(), expected = expected_size, "Short depth frame");
                }
                match unpack_y10b_pixel(buf, CENTER_PIXEL_INDEX) {
                    Some(value) => sink(DepthSample {
                        value,
                        sequence: meta.sequence,
                    }),
                    None => debug!(sequence = meta.sequence, "Depth frame too short for centre pixel"),
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                debug!("No depth frame within dequeue timeout");
            }
            Err(e) => {
                warn!(error = %e, "Failed to capture depth frame");
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    info!(frames, "V4L2 depth capture loop ended");
    Ok(())
}
