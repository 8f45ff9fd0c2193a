// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! DSP engine thread and its async control handle.
//!
//! One OS thread owns the radio device and the whole [`PipelineState`].
//! Control requests arrive over an mpsc channel and are applied between
//! chunks, so channel state is never touched by two parties at once.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use sdrx_core::{PerformanceSnapshot, VfoId, VfoInfo, VfoParams, VfoPatch};
use sdrx_dsp::{DspError, PipelineConfig, PipelineSink, PipelineState, SpectrumFrame};

use crate::device::{Gains, RadioDevice};

const CONTROL_CHANNEL_BUFFER: usize = 32;
const AUDIO_BROADCAST_CAPACITY: usize = 64;
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("DSP error: {0}")]
    Dsp(#[from] DspError),

    #[error("device error: {0}")]
    Device(String),

    #[error("DSP engine is not running")]
    Stopped,
}

/// Everything needed to start the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub pipeline: PipelineConfig,
    pub gains: Gains,
    pub report_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            gains: Gains::default(),
            report_interval: Duration::from_millis(500),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Requests served by the engine thread between chunks.
pub enum ControlRequest {
    AddVfo {
        params: Option<VfoParams>,
        reply: Reply<VfoId>,
    },
    RemoveVfo {
        id: VfoId,
        reply: Reply<()>,
    },
    SetVfoParams {
        id: VfoId,
        patch: VfoPatch,
        reply: Reply<()>,
    },
    SetCenterFrequency {
        center_hz: f64,
        reply: Reply<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Forwards pipeline output onto the tokio channels.
struct ChannelSink {
    audio_tx: broadcast::Sender<Vec<f32>>,
    spectrum_tx: watch::Sender<Option<SpectrumFrame>>,
}

impl PipelineSink for ChannelSink {
    fn spectrum_frame(&mut self, frame: SpectrumFrame) {
        self.spectrum_tx.send_replace(Some(frame));
    }

    fn audio_batch(&mut self, batch: Vec<f32>) {
        // No subscribers is fine.
        let _ = self.audio_tx.send(batch);
    }
}

struct Outputs {
    sink: ChannelSink,
    vfo_tx: watch::Sender<Vec<VfoInfo>>,
    perf_tx: watch::Sender<PerformanceSnapshot>,
    running_tx: watch::Sender<bool>,
}

/// Clonable async handle to the engine thread.
#[derive(Clone)]
pub struct DspHandle {
    control_tx: mpsc::Sender<ControlRequest>,
    audio_tx: broadcast::Sender<Vec<f32>>,
    spectrum_rx: watch::Receiver<Option<SpectrumFrame>>,
    vfo_rx: watch::Receiver<Vec<VfoInfo>>,
    perf_rx: watch::Receiver<PerformanceSnapshot>,
    running_rx: watch::Receiver<bool>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Open and configure `device`, build the pipeline, and start the engine
/// thread. Configuration errors are returned before any thread starts.
pub fn spawn(
    config: EngineConfig,
    mut device: Box<dyn RadioDevice>,
) -> Result<DspHandle, EngineError> {
    let pipeline = &config.pipeline;
    device
        .set_sample_rate(pipeline.capture_rate)
        .map_err(EngineError::Device)?;
    device
        .set_center_frequency(pipeline.center_hz)
        .map_err(EngineError::Device)?;
    device
        .set_gains(config.gains)
        .map_err(EngineError::Device)?;
    let state = PipelineState::new(pipeline)?;
    device.open().map_err(EngineError::Device)?;

    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_BUFFER);
    let (audio_tx, _) = broadcast::channel(AUDIO_BROADCAST_CAPACITY);
    let (spectrum_tx, spectrum_rx) = watch::channel(None);
    let (vfo_tx, vfo_rx) = watch::channel(state.vfos().vfo_infos());
    let (perf_tx, perf_rx) = watch::channel(PerformanceSnapshot::default());
    let (running_tx, running_rx) = watch::channel(true);

    let outputs = Outputs {
        sink: ChannelSink {
            audio_tx: audio_tx.clone(),
            spectrum_tx,
        },
        vfo_tx,
        perf_tx,
        running_tx,
    };

    info!(
        "starting DSP engine ({:.0} S/s at {:.0} Hz, {} channel(s))",
        pipeline.capture_rate,
        pipeline.center_hz,
        state.vfos().len()
    );
    let chunk_bytes = pipeline.max_chunk * 2;
    let report_interval = config.report_interval;
    let thread = std::thread::Builder::new()
        .name("sdrx-dsp".to_string())
        .spawn(move || {
            run_engine(
                device,
                state,
                control_rx,
                outputs,
                chunk_bytes,
                report_interval,
            );
        })
        .expect("failed to spawn sdrx-dsp thread");

    Ok(DspHandle {
        control_tx,
        audio_tx,
        spectrum_rx,
        vfo_rx,
        perf_rx,
        running_rx,
        thread: Arc::new(Mutex::new(Some(thread))),
    })
}

enum Flow {
    Continue,
    Stop(Option<oneshot::Sender<()>>),
}

fn run_engine(
    mut device: Box<dyn RadioDevice>,
    mut state: PipelineState,
    mut control_rx: mpsc::Receiver<ControlRequest>,
    mut outputs: Outputs,
    chunk_bytes: usize,
    report_interval: Duration,
) {
    let mut buf = vec![0_i8; chunk_bytes];
    let mut last_report = Instant::now();

    let stop_reply = 'outer: loop {
        loop {
            match control_rx.try_recv() {
                Ok(request) => {
                    if let Flow::Stop(reply) =
                        handle_request(request, &mut state, device.as_mut(), &outputs)
                    {
                        break 'outer reply;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    debug!("all DSP handles dropped");
                    break 'outer None;
                }
            }
        }

        let n = match device.read_chunk(&mut buf) {
            Ok(0) => {
                info!("IQ stream ended");
                break None;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("IQ read error: {}; retrying", e);
                std::thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };

        if let Err(e) = state.process_chunk(&buf[..n], &mut outputs.sink) {
            error!("dropping capture chunk: {}", e);
        }

        let now = Instant::now();
        if now.duration_since(last_report) >= report_interval {
            if let Some(snapshot) = state.roll_telemetry(now) {
                outputs.perf_tx.send_replace(snapshot);
                last_report = now;
            }
        }
    };

    state.finish(&mut outputs.sink);
    device.close();
    drop(state);
    outputs.running_tx.send_replace(false);
    info!("DSP engine stopped");
    if let Some(reply) = stop_reply {
        let _ = reply.send(());
    }
}

fn handle_request(
    request: ControlRequest,
    state: &mut PipelineState,
    device: &mut dyn RadioDevice,
    outputs: &Outputs,
) -> Flow {
    match request {
        ControlRequest::AddVfo { params, reply } => {
            let vfos = state.vfos_mut();
            let result = match params {
                Some(params) => vfos.add_vfo_with(params),
                None => vfos.add_vfo(),
            };
            let _ = reply.send(result.map_err(EngineError::from));
        }
        ControlRequest::RemoveVfo { id, reply } => {
            let result = state.vfos_mut().remove_vfo(id);
            let _ = reply.send(result.map_err(EngineError::from));
        }
        ControlRequest::SetVfoParams { id, patch, reply } => {
            let result = state.vfos_mut().set_vfo_params(id, &patch);
            if let Err(ref e) = result {
                warn!("vfo {}: rejected update: {}", id, e);
            }
            let _ = reply.send(result.map_err(EngineError::from));
        }
        ControlRequest::SetCenterFrequency { center_hz, reply } => {
            let result = device
                .set_center_frequency(center_hz)
                .map_err(EngineError::Device)
                .and_then(|()| {
                    state
                        .vfos_mut()
                        .set_center_frequency(center_hz)
                        .map_err(EngineError::from)
                });
            if result.is_ok() {
                info!("retuned to {:.0} Hz", center_hz);
            }
            let _ = reply.send(result);
        }
        ControlRequest::Shutdown { reply } => return Flow::Stop(Some(reply)),
    }
    outputs.vfo_tx.send_replace(state.vfos().vfo_infos());
    Flow::Continue
}

impl DspHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ControlRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::Stopped)?;
        reply_rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Add a disabled WFM channel at the capture center, or one with `params`.
    pub async fn add_vfo(&self, params: Option<VfoParams>) -> Result<VfoId, EngineError> {
        self.request(|reply| ControlRequest::AddVfo { params, reply })
            .await
    }

    pub async fn remove_vfo(&self, id: VfoId) -> Result<(), EngineError> {
        self.request(|reply| ControlRequest::RemoveVfo { id, reply })
            .await
    }

    pub async fn set_vfo_params(&self, id: VfoId, patch: VfoPatch) -> Result<(), EngineError> {
        self.request(|reply| ControlRequest::SetVfoParams { id, patch, reply })
            .await
    }

    pub async fn set_center_frequency(&self, center_hz: f64) -> Result<(), EngineError> {
        self.request(|reply| ControlRequest::SetCenterFrequency { center_hz, reply })
            .await
    }

    /// Channel metadata as of the last control change.
    pub fn vfo_infos(&self) -> Vec<VfoInfo> {
        self.vfo_rx.borrow().clone()
    }

    pub fn performance_snapshot(&self) -> PerformanceSnapshot {
        self.perf_rx.borrow().clone()
    }

    pub fn subscribe_audio(&self) -> broadcast::Receiver<Vec<f32>> {
        self.audio_tx.subscribe()
    }

    pub fn spectrum(&self) -> watch::Receiver<Option<SpectrumFrame>> {
        self.spectrum_rx.clone()
    }

    pub fn vfo_updates(&self) -> watch::Receiver<Vec<VfoInfo>> {
        self.vfo_rx.clone()
    }

    pub fn performance(&self) -> watch::Receiver<PerformanceSnapshot> {
        self.perf_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running_rx.borrow()
    }

    /// Resolves once the engine thread has released its resources.
    pub async fn stopped(&self) {
        let mut rx = self.running_rx.clone();
        let _ = rx.wait_for(|running| !*running).await;
    }

    /// Ask the engine to stop between chunks and join its thread.
    pub async fn stop(&self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .control_tx
            .send(ControlRequest::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
        self.stopped().await;

        let thread = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(e) => {
                error!("DSP thread handle mutex poisoned: {}", e);
                None
            }
        };
        if let Some(thread) = thread {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                error!("DSP engine thread panicked");
            }
        }
    }
}
