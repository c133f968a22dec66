//! Effect controller - per-frame orchestration
//!
//! Owns the live parameter set, its automation and drivers, and the frame
//! compositor. Each tick advances automation, snapshots the parameters and
//! renders the configured passes.

use std::sync::Arc;
use std::time::Duration;

use super::automation::{AutomationSet, ParameterDriver};
use super::binding::EffectMaterialBinding;
use super::compositor::{ApplyReport, FrameCompositor};
use super::error::EffectError;
use super::registry::EffectRegistry;
use super::traits::{FramebufferId, ProgramId, RenderBackend};
use super::types::{LfoSource, ParameterSet, ParameterSnapshot};
use crate::settings::EffectSettings;
use crate::telemetry::{EffectMetrics, FrameProfiler};

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Parameters configurable, no backend resources yet
    Uninitialized,
    /// Programs created; `tick` renders frames
    Ready,
    /// Resources released; terminal
    Disposed,
}

impl ControllerState {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Uninitialized => "uninitialized",
            ControllerState::Ready => "ready",
            ControllerState::Disposed => "disposed",
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick number, starting at 1
    pub frame: u64,
    /// Elapsed time in seconds at this tick
    pub time: f32,
    /// Compositor outcome (empty for a pass-through tick)
    pub apply: ApplyReport,
    /// No active passes; the source was copied through unmodified
    pub passthrough: bool,
    /// Drivers whose update failed this tick
    pub driver_errors: usize,
    /// Wall time spent in the tick
    pub duration: Duration,
}

/// Drives the painterly post-process for one output
pub struct EffectController {
    settings: EffectSettings,
    parameters: ParameterSet,
    automation: AutomationSet,
    drivers: Vec<Box<dyn ParameterDriver>>,
    compositor: FrameCompositor,
    /// Programs created in `initialize`, destroyed in `dispose`
    programs: Vec<ProgramId>,
    state: ControllerState,
    elapsed: f32,
    frame_count: u64,
    reported_passthrough: bool,
    profiler: FrameProfiler,
}

impl EffectController {
    /// Create a controller from settings
    ///
    /// Fails if a parameter value is not finite or an automation targets an
    /// unknown parameter.
    pub fn new(settings: EffectSettings) -> Result<Self, EffectError> {
        let mut parameters = ParameterSet::new(Arc::new(settings.schema()));
        for (name, value) in settings.parameters() {
            parameters.set(name, value)?;
        }

        let mut automation = AutomationSet::new();
        for entry in &settings.automations {
            automation.add(&parameters, &entry.parameter, entry.source())?;
        }

        Ok(Self {
            settings,
            parameters,
            automation,
            drivers: Vec::new(),
            compositor: FrameCompositor::new(),
            programs: Vec::new(),
            state: ControllerState::Uninitialized,
            elapsed: 0.0,
            frame_count: 0,
            reported_passthrough: false,
            profiler: FrameProfiler::new(),
        })
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    /// Live parameter values
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Copy of the current parameter values
    pub fn snapshot(&self) -> ParameterSnapshot {
        self.parameters.snapshot()
    }

    /// Seconds advanced by all ticks so far
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    /// Set a parameter value
    ///
    /// For an automated parameter this moves the base value the LFO
    /// modulates around.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<(), EffectError> {
        if self.state == ControllerState::Disposed {
            return Err(EffectError::NotReady(self.state.name()));
        }
        self.parameters.set(name, value)?;
        self.automation.set_base(name, value);
        Ok(())
    }

    /// Automate a parameter with an LFO, replacing any existing automation
    pub fn automate(&mut self, parameter: &str, source: LfoSource) -> Result<(), EffectError> {
        if self.state == ControllerState::Disposed {
            return Err(EffectError::NotReady(self.state.name()));
        }
        self.automation.add(&self.parameters, parameter, source)
    }

    /// Add an external parameter driver; drivers run in insertion order
    pub fn add_driver(&mut self, driver: Box<dyn ParameterDriver>) {
        self.drivers.push(driver);
    }

    /// Bypass or re-enable a configured pass
    pub fn set_bypassed(&mut self, index: usize, bypassed: bool) -> bool {
        let changed = self.compositor.set_bypassed(index, bypassed);
        if let Some(pass) = self.settings.passes.get_mut(index) {
            pass.bypassed = bypassed;
        }
        changed
    }

    /// Create programs and bindings for every configured pass
    ///
    /// On failure every program created so far is destroyed and the
    /// controller stays uninitialized.
    pub fn initialize<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        registry: &EffectRegistry,
    ) -> Result<(), EffectError> {
        if self.state != ControllerState::Uninitialized {
            return Err(EffectError::NotReady(self.state.name()));
        }

        let mut compositor = FrameCompositor::new();
        let mut programs = Vec::with_capacity(self.settings.passes.len());

        for (index, pass) in self.settings.passes.iter().enumerate() {
            let binding = registry
                .create_program(&pass.effect, backend)
                .and_then(|program| {
                    programs.push(program);
                    let uniforms = registry.uniforms(&pass.effect).unwrap_or(&[]);
                    EffectMaterialBinding::new(pass.effect.as_str(), program, uniforms, self.parameters.schema())
                });

            let binding = match binding {
                Ok(binding) => binding,
                Err(err) => {
                    tracing::error!(effect = %pass.effect, index, "Failed to create pass: {}", err);
                    for program in programs {
                        backend.destroy_program(program);
                    }
                    return Err(err);
                }
            };

            tracing::debug!(effect = %pass.effect, program = %binding.program(), bypassed = pass.bypassed, "Created pass");
            compositor.add_pass(binding);
            compositor.set_bypassed(index, pass.bypassed);
        }

        if compositor.is_empty() {
            tracing::warn!("No passes configured; frames will pass through unmodified");
        }

        self.compositor = compositor;
        self.programs = programs;
        self.state = ControllerState::Ready;
        tracing::info!(
            passes = self.compositor.len(),
            active = self.compositor.active_count(),
            "Effect controller ready"
        );
        Ok(())
    }

    /// Render one frame from `source` into `destination`
    ///
    /// `source` and `destination` may be the same framebuffer.
    pub fn tick<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        delta_time: f32,
        source: FramebufferId,
        destination: FramebufferId,
    ) -> Result<TickReport, EffectError> {
        if self.state != ControllerState::Ready {
            return Err(EffectError::NotReady(self.state.name()));
        }

        self.profiler.begin_frame();
        let delta_time = if delta_time.is_finite() { delta_time.max(0.0) } else { 0.0 };
        self.elapsed += delta_time;

        let mut report = TickReport {
            frame: self.frame_count + 1,
            time: self.elapsed,
            ..Default::default()
        };

        if let Err(err) = self.automation.update(self.elapsed, delta_time, &mut self.parameters) {
            tracing::warn!("Automation update failed: {}", err);
        }
        for driver in &mut self.drivers {
            if let Err(err) = driver.update(self.elapsed, delta_time, &mut self.parameters) {
                tracing::warn!("Parameter driver failed: {}", err);
                report.driver_errors += 1;
            }
        }

        // Every draw this tick sees these values
        let snapshot = self.parameters.snapshot();

        match self.compositor.apply(backend, &snapshot, source, destination) {
            Ok(apply) => report.apply = apply,
            Err(EffectError::PipelineConfig(reason)) => {
                if self.reported_passthrough {
                    tracing::debug!("Passing frame through: {}", reason);
                } else {
                    tracing::warn!("Passing frame through: {}", reason);
                    self.reported_passthrough = true;
                }
                report.passthrough = true;
            }
            Err(err) => {
                self.profiler.end_frame();
                return Err(err);
            }
        }

        self.frame_count += 1;
        report.duration = self.profiler.end_frame().unwrap_or_default();
        tracing::trace!(
            frame = report.frame,
            draws = report.apply.draws,
            duration_us = report.duration.as_micros() as u64,
            "Tick complete"
        );
        Ok(report)
    }

    /// Release scratch buffers and destroy the programs this controller made
    ///
    /// Safe to call more than once.
    pub fn dispose<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if self.state == ControllerState::Disposed {
            return;
        }
        self.compositor.release(backend);
        for program in self.programs.drain(..) {
            backend.destroy_program(program);
        }
        self.state = ControllerState::Disposed;
        tracing::info!(frames = self.frame_count, "Effect controller disposed");
    }

    /// Timing and pipeline metrics
    pub fn metrics(&self) -> EffectMetrics {
        EffectMetrics {
            frame_stats: self.profiler.stats(),
            fps: self.profiler.fps(),
            target_fps: self.settings.target_fps,
            frame_count: self.frame_count,
            pass_count: self.compositor.len(),
            active_pass_count: self.compositor.active_count(),
        }
    }
}
