//! Frame compositor - multi-pass effect chain processing
//!
//! This module provides the runtime that turns an ordered list of bound
//! passes into full-screen draws:
//! - `ScratchPool` - Ping-pong intermediate framebuffers for multi-pass chains
//! - `FrameCompositor` - Binds each pass and chains outputs to inputs

use super::binding::EffectMaterialBinding;
use super::error::EffectError;
use super::traits::{FramebufferId, ProgramId, RenderBackend};
use super::types::{EffectUniform, ParameterSnapshot};

/// Manages intermediate framebuffers for effect chain processing
///
/// Uses a ping-pong strategy: each pass writes to whichever scratch buffer
/// it is not reading from, so at most two buffers are ever allocated.
/// Buffers are created lazily; a single non-in-place pass needs none.
#[derive(Debug, Default)]
pub struct ScratchPool {
    buffers: Vec<FramebufferId>,
    width: u32,
    height: u32,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the buffers if the frame size changed
    pub fn resize<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.release(backend);
        self.width = width;
        self.height = height;
    }

    /// Get a scratch buffer that is not `avoid`, allocating one if needed
    pub fn acquire_other_than<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        avoid: FramebufferId,
    ) -> Result<FramebufferId, EffectError> {
        if let Some(buffer) = self.buffers.iter().copied().find(|b| *b != avoid) {
            return Ok(buffer);
        }

        let label = if self.buffers.is_empty() {
            "Effect Scratch A"
        } else {
            "Effect Scratch B"
        };
        let buffer = backend.create_framebuffer(self.width.max(1), self.height.max(1), label)?;
        tracing::debug!(framebuffer = %buffer, width = self.width, height = self.height, "Allocated scratch buffer");
        self.buffers.push(buffer);
        Ok(buffer)
    }

    /// Free all scratch buffers
    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        for buffer in self.buffers.drain(..) {
            backend.release_framebuffer(buffer);
        }
    }

    /// Number of allocated buffers
    pub fn allocated(&self) -> usize {
        self.buffers.len()
    }

    /// Get pool dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// One pass in the compositor chain
#[derive(Debug, Clone)]
pub struct CompositorPass {
    pub binding: EffectMaterialBinding,
    /// Whether the pass is skipped
    pub bypassed: bool,
}

/// What happened during one `apply`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Full-screen draws issued
    pub draws: usize,
    /// Unmodified copies issued
    pub blits: usize,
    /// `(effect_type, uniform)` pairs the programs did not expose
    pub missing_uniforms: Vec<(String, EffectUniform)>,
    /// Effect types whose pass was skipped because its program was gone
    pub skipped: Vec<String>,
}

/// Orchestrates the post-processing passes of one frame
///
/// The pass order is fixed at configuration time. The compositor never
/// keeps host framebuffers between calls; it only owns its scratch buffers.
#[derive(Debug, Default)]
pub struct FrameCompositor {
    passes: Vec<CompositorPass>,
    scratch: ScratchPool,
}

impl FrameCompositor {
    /// Create an empty compositor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compositor from bindings in processing order
    pub fn with_bindings(bindings: Vec<EffectMaterialBinding>) -> Self {
        Self {
            passes: bindings
                .into_iter()
                .map(|binding| CompositorPass {
                    binding,
                    bypassed: false,
                })
                .collect(),
            scratch: ScratchPool::new(),
        }
    }

    /// Append a pass to the end of the chain
    pub fn add_pass(&mut self, binding: EffectMaterialBinding) {
        self.passes.push(CompositorPass {
            binding,
            bypassed: false,
        });
    }

    /// Bypass or re-enable a pass; returns false if the index is out of range
    pub fn set_bypassed(&mut self, index: usize, bypassed: bool) -> bool {
        match self.passes.get_mut(index) {
            Some(pass) => {
                pass.bypassed = bypassed;
                true
            }
            None => false,
        }
    }

    /// All passes in order
    pub fn passes(&self) -> &[CompositorPass] {
        &self.passes
    }

    /// Programs referenced by the passes, in order
    pub fn programs(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.passes.iter().map(|p| p.binding.program())
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Number of passes that are not bypassed
    pub fn active_count(&self) -> usize {
        self.passes.iter().filter(|p| !p.bypassed).count()
    }

    /// Render `source` through every active pass into `destination`
    ///
    /// With no active passes the source is copied through unmodified and
    /// `PipelineConfig` is returned so the caller can tell the difference.
    /// If `source == destination` the final pass renders into scratch and
    /// the result is blitted back, so no draw reads and writes one buffer.
    pub fn apply<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        snapshot: &ParameterSnapshot,
        source: FramebufferId,
        destination: FramebufferId,
    ) -> Result<ApplyReport, EffectError> {
        let (width, height) = backend
            .framebuffer_size(source)
            .ok_or(EffectError::UnknownFramebuffer(source))?;
        if backend.framebuffer_size(destination).is_none() {
            return Err(EffectError::UnknownFramebuffer(destination));
        }

        let active: Vec<usize> = self
            .passes
            .iter()
            .enumerate()
            .filter(|(_, pass)| !pass.bypassed)
            .map(|(i, _)| i)
            .collect();

        if active.is_empty() {
            // No effects: copy input to output
            if source != destination {
                backend.blit(source, destination)?;
            }
            return Err(EffectError::PipelineConfig(format!(
                "no active passes ({} configured)",
                self.passes.len()
            )));
        }

        let in_place = source == destination;
        if in_place {
            tracing::trace!(framebuffer = %source, "In-place apply, final pass goes through scratch");
        }

        self.scratch.resize(backend, width, height);

        let mut report = ApplyReport::default();
        let last = active.len() - 1;
        let mut current = source;

        for (position, &index) in active.iter().enumerate() {
            let pass = &mut self.passes[index];

            let outcome = match pass.binding.bind(backend, snapshot) {
                Ok(outcome) => outcome,
                Err(err @ EffectError::ProgramInvalidated(_)) => {
                    tracing::warn!(effect = pass.binding.effect_type(), "Skipping pass: {}", err);
                    report.skipped.push(pass.binding.effect_type().to_string());
                    continue;
                }
                Err(err) => return Err(err),
            };

            for uniform in outcome.missing {
                report
                    .missing_uniforms
                    .push((pass.binding.effect_type().to_string(), uniform));
            }

            let output = if position == last && !in_place {
                destination
            } else {
                self.scratch.acquire_other_than(backend, current)?
            };

            tracing::trace!(
                effect = pass.binding.effect_type(),
                input = %current,
                output = %output,
                "Drawing pass"
            );
            backend.draw_fullscreen(pass.binding.program(), current, output)?;
            report.draws += 1;
            current = output;
        }

        // Final pass was skipped or rendered to scratch
        if current != destination {
            backend.blit(current, destination)?;
            report.blits += 1;
        }

        Ok(report)
    }

    /// Free scratch buffers
    pub fn release<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        self.scratch.release(backend);
    }

    /// Scratch pool (for inspection)
    pub fn scratch(&self) -> &ScratchPool {
        &self.scratch
    }
}
