//! Per-refresh draw sequence.
//!
//! The host owns the refresh signal; each time it fires it calls
//! [`RenderLoop::tick`], which draws one frame and asks the requester for the
//! next one. Stopping is explicit through a [`StopHandle`], and tests drive a
//! fixed number of ticks with [`RenderLoop::run_ticks`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{BackendError, GraphicsBackend, ProgramId};
use crate::params::{ParameterVector, ViewportSize};
use crate::sandbox::Sandbox;
use crate::texture::{TextureAxis, WrapMode};

/// Opaque black.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Schedules the next refresh callback.
pub trait FrameRequester {
    fn request_frame(&self);
}

/// Requester that never schedules anything; ticks are driven by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualFrames;

impl FrameRequester for ManualFrames {
    fn request_frame(&self) {}
}

/// Shared flag that ends the loop after the current tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Uniform values pushed for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub program: ProgramId,
    pub params: ParameterVector,
    pub viewport: ViewportSize,
    pub time: f32,
    pub wrap: (WrapMode, WrapMode),
}

#[derive(Debug, Default)]
struct FrameStats {
    window_start: Option<Instant>,
    frames: u32,
}

impl FrameStats {
    fn record(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= STATS_INTERVAL {
            let fps = self.frames as f32 / elapsed.as_secs_f32();
            tracing::debug!(frames = self.frames, fps, "render stats");
            self.window_start = Some(now);
            self.frames = 0;
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderLoop {
    stop: StopHandle,
    frames: u64,
    stats: FrameStats,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Frames successfully presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Draws one frame and schedules the next.
    ///
    /// Returns `Ok(None)` when nothing was drawn: the loop is stopped, or the
    /// surface has zero area. A backend error is returned to the host but the
    /// next refresh is still requested so the host can recover.
    pub fn tick<B: GraphicsBackend>(
        &mut self,
        sandbox: &mut Sandbox<B>,
        requester: &dyn FrameRequester,
    ) -> Result<Option<FrameReport>, BackendError> {
        if self.is_stopped() {
            return Ok(None);
        }

        let result = self.draw(sandbox);
        if !self.is_stopped() {
            requester.request_frame();
        }
        result
    }

    /// Runs up to `count` ticks, stopping early if the loop is stopped.
    pub fn run_ticks<B: GraphicsBackend>(
        &mut self,
        sandbox: &mut Sandbox<B>,
        requester: &dyn FrameRequester,
        count: usize,
    ) -> Result<Vec<FrameReport>, BackendError> {
        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            if self.is_stopped() {
                break;
            }
            if let Some(report) = self.tick(sandbox, requester)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    fn draw<B: GraphicsBackend>(
        &mut self,
        sandbox: &mut Sandbox<B>,
    ) -> Result<Option<FrameReport>, BackendError> {
        let Sandbox {
            backend,
            clock,
            geometry,
            texture,
            pipeline,
            params,
            ..
        } = sandbox;

        let viewport = backend.surface_size();
        params.observe_viewport(viewport);
        if viewport.is_empty() {
            return Ok(None);
        }

        backend.begin_frame()?;
        backend.clear(CLEAR_COLOR);

        let active = pipeline.active();
        backend.use_program(active.program());
        geometry.bind(backend, active.attributes());

        texture.bind(backend);

        let now = clock.now();
        let values = params.snapshot();
        let time = active.elapsed_seconds(now);
        let uniforms = active.uniforms();
        if let Some(location) = uniforms.user_param {
            backend.set_uniform_vec4(location, values.to_array());
        }
        if let Some(location) = uniforms.viewport_size {
            backend.set_uniform_uvec2(location, viewport.to_array());
        }
        if let Some(location) = uniforms.time {
            backend.set_uniform_f32(location, time);
        }

        backend.set_viewport(viewport);
        backend.draw_indexed(geometry.index_count())?;
        backend.end_frame()?;

        self.frames += 1;
        self.stats.record(now);

        Ok(Some(FrameReport {
            program: active.program(),
            params: values,
            viewport,
            time,
            wrap: (
                texture.wrap_mode(TextureAxis::X),
                texture.wrap_mode(TextureAxis::Y),
            ),
        }))
    }
}
