//! wgpu rendering backend
//!
//! Framebuffers are RGBA8 textures; each program is a render pipeline with
//! its own parameter buffer. Every draw is submitted immediately so the
//! parameter write it depends on is never overtaken by a later pass.

use std::collections::HashMap;
use std::sync::mpsc;

use image::RgbaImage;

use super::{GpuContext, GpuError};
use crate::effects::{
    EffectDefinition, EffectError, EffectParams, FramebufferId, ImageTransfer, ProgramId, RenderBackend, UniformTable,
};
use crate::shaders::{compose_effect_shader, COPY_SHADER, FRAGMENT_ENTRY, VERTEX_ENTRY};

/// Texture format of every framebuffer
///
/// Linear (not sRGB) so shader math sees the stored byte values, matching
/// the CPU kernels.
pub const FRAMEBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const PARAMS_SIZE: u64 = std::mem::size_of::<EffectParams>() as u64;

/// Bytes per row of a readback buffer, padded to the copy alignment
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

/// Strip row padding from a readback buffer
pub fn unpad_rows(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let unpadded = (width * 4) as usize;
    let padded = padded_bytes_per_row as usize;
    if unpadded == padded {
        return data[..unpadded * height as usize].to_vec();
    }
    let mut pixels = Vec::with_capacity(unpadded * height as usize);
    for row in 0..height as usize {
        let start = row * padded;
        pixels.extend_from_slice(&data[start..start + unpadded]);
    }
    pixels
}

struct GpuFramebuffer {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuProgram {
    effect_type: &'static str,
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    uniforms: UniformTable,
}

/// Rendering backend executing WGSL effect passes with wgpu
pub struct WgpuBackend {
    context: GpuContext,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    /// Effects sample texel centers exactly
    effect_sampler: wgpu::Sampler,
    /// Blits filter when scaling
    blit_sampler: wgpu::Sampler,
    copy_pipeline: wgpu::RenderPipeline,
    copy_params: wgpu::Buffer,
    framebuffers: HashMap<FramebufferId, GpuFramebuffer>,
    programs: HashMap<ProgramId, GpuProgram>,
    next_id: u32,
}

impl WgpuBackend {
    /// Create a backend on an existing context
    pub fn new(context: GpuContext) -> Result<Self, EffectError> {
        let device = &context.device;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Effect Bind Group Layout"),
            entries: &[
                // Input texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Parameters uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(PARAMS_SIZE),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Effect Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            })
        };
        let effect_sampler = sampler("Effect Sampler", wgpu::FilterMode::Nearest);
        let blit_sampler = sampler("Blit Sampler", wgpu::FilterMode::Linear);

        let copy_pipeline = Self::build_pipeline(device, &pipeline_layout, "Copy", &compose_effect_shader(COPY_SHADER))?;
        let copy_params = Self::create_params_buffer(device, "Copy Params Buffer");
        context
            .queue
            .write_buffer(&copy_params, 0, bytemuck::bytes_of(&EffectParams::default()));

        Ok(Self {
            context,
            bind_group_layout,
            pipeline_layout,
            effect_sampler,
            blit_sampler,
            copy_pipeline,
            copy_params,
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            next_id: 0,
        })
    }

    /// Create a backend on a new headless context
    pub fn new_headless(force_fallback_adapter: bool) -> Result<Self, EffectError> {
        let context = GpuContext::new_blocking(force_fallback_adapter)?;
        Self::new(context)
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Allocate a framebuffer and upload `image` into it
    pub fn framebuffer_from_image(&mut self, image: &RgbaImage) -> Result<FramebufferId, EffectError> {
        let id = self.create_framebuffer(image.width(), image.height(), "Host Frame")?;
        self.upload(id, image)?;
        Ok(id)
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn create_params_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: PARAMS_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Compile a composed WGSL module into a full-screen pipeline
    ///
    /// Validation errors are captured instead of reaching the device's
    /// uncaptured error handler.
    fn build_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        name: &str,
        source: &str,
    ) -> Result<wgpu::RenderPipeline, EffectError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} Shader", name)),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{} Pipeline", name)),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: FRAMEBUFFER_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => {
                log::error!("{} pipeline failed validation: {}", name, err);
                Err(EffectError::Backend(format!("{} pipeline: {}", name, err)))
            }
            None => Ok(pipeline),
        }
    }

    /// Run one full-screen pass with the given pipeline
    fn render(
        &self,
        pipeline: &wgpu::RenderPipeline,
        params: &wgpu::Buffer,
        sampler: &wgpu::Sampler,
        input: FramebufferId,
        output: FramebufferId,
    ) -> Result<(), EffectError> {
        let source = self.framebuffers.get(&input).ok_or(EffectError::UnknownFramebuffer(input))?;
        let target = self
            .framebuffers
            .get(&output)
            .ok_or(EffectError::UnknownFramebuffer(output))?;
        let device = &self.context.device;

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Effect Pass Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Effect Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn create_framebuffer(&mut self, width: u32, height: u32, label: &str) -> Result<FramebufferId, EffectError> {
        let max = self.context.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(EffectError::Backend(format!(
                "cannot allocate {} with size {}x{} (max {})",
                label, width, height, max
            )));
        }

        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAMEBUFFER_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = FramebufferId(self.next_id());
        self.framebuffers.insert(
            id,
            GpuFramebuffer {
                texture,
                view,
                width,
                height,
            },
        );
        log::debug!("Created {} {} ({}x{})", label, id, width, height);
        Ok(id)
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(fb) = self.framebuffers.remove(&framebuffer) {
            fb.texture.destroy();
        }
    }

    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<(u32, u32)> {
        self.framebuffers.get(&framebuffer).map(|fb| (fb.width, fb.height))
    }

    fn create_program(&mut self, definition: &dyn EffectDefinition) -> Result<ProgramId, EffectError> {
        let fragment = definition
            .wgsl_source()
            .ok_or_else(|| EffectError::UnsupportedEffect(definition.effect_type().to_string()))?;

        let device = &self.context.device;
        let pipeline = Self::build_pipeline(
            device,
            &self.pipeline_layout,
            definition.display_name(),
            &compose_effect_shader(fragment),
        )?;
        let params_buffer = Self::create_params_buffer(device, &format!("{} Params Buffer", definition.display_name()));

        let id = ProgramId(self.next_id());
        self.programs.insert(
            id,
            GpuProgram {
                effect_type: definition.effect_type(),
                pipeline,
                params_buffer,
                uniforms: UniformTable::new(definition.uniforms()),
            },
        );
        log::debug!("Created GPU program {} for {}", id, definition.effect_type());
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        if let Some(p) = self.programs.remove(&program) {
            p.params_buffer.destroy();
            log::debug!("Destroyed GPU program {} ({})", program, p.effect_type);
        }
    }

    fn uniforms(&self, program: ProgramId) -> Option<&UniformTable> {
        self.programs.get(&program).map(|p| &p.uniforms)
    }

    fn uniforms_mut(&mut self, program: ProgramId) -> Option<&mut UniformTable> {
        self.programs.get_mut(&program).map(|p| &mut p.uniforms)
    }

    fn draw_fullscreen(
        &mut self,
        program: ProgramId,
        input: FramebufferId,
        output: FramebufferId,
    ) -> Result<(), EffectError> {
        if input == output {
            return Err(EffectError::Backend(format!("draw reads and writes {}", input)));
        }
        let pass = self.programs.get(&program).ok_or(EffectError::ProgramInvalidated(program))?;
        let (width, height) = self
            .framebuffer_size(output)
            .ok_or(EffectError::UnknownFramebuffer(output))?;

        let params = EffectParams::new(width, height, &pass.uniforms);
        self.context
            .queue
            .write_buffer(&pass.params_buffer, 0, bytemuck::bytes_of(&params));
        self.render(&pass.pipeline, &pass.params_buffer, &self.effect_sampler, input, output)
    }

    fn blit(&mut self, input: FramebufferId, output: FramebufferId) -> Result<(), EffectError> {
        if input == output {
            return Ok(());
        }
        let source = self.framebuffers.get(&input).ok_or(EffectError::UnknownFramebuffer(input))?;
        let target = self
            .framebuffers
            .get(&output)
            .ok_or(EffectError::UnknownFramebuffer(output))?;

        if (source.width, source.height) != (target.width, target.height) {
            return self.render(&self.copy_pipeline, &self.copy_params, &self.blit_sampler, input, output);
        }

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Blit Encoder") });
        encoder.copy_texture_to_texture(
            source.texture.as_image_copy(),
            target.texture.as_image_copy(),
            wgpu::Extent3d {
                width: source.width,
                height: source.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl ImageTransfer for WgpuBackend {
    fn upload(&mut self, framebuffer: FramebufferId, image: &RgbaImage) -> Result<(), EffectError> {
        let fb = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(EffectError::UnknownFramebuffer(framebuffer))?;
        if image.dimensions() != (fb.width, fb.height) {
            return Err(EffectError::Backend(format!(
                "upload of {}x{} image into {}x{} {}",
                image.width(),
                image.height(),
                fb.width,
                fb.height,
                framebuffer
            )));
        }

        self.context.queue.write_texture(
            fb.texture.as_image_copy(),
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(fb.width * 4),
                rows_per_image: Some(fb.height),
            },
            wgpu::Extent3d {
                width: fb.width,
                height: fb.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn download(&mut self, framebuffer: FramebufferId) -> Result<RgbaImage, EffectError> {
        let fb = self
            .framebuffers
            .get(&framebuffer)
            .ok_or(EffectError::UnknownFramebuffer(framebuffer))?;
        let (width, height) = (fb.width, fb.height);
        let bytes_per_row = padded_bytes_per_row(width);
        let device = &self.context.device;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            fb.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(Some(encoder.finish()));

        let (tx, rx) = mpsc::channel();
        staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| EffectError::Backend("readback callback dropped".to_string()))?
            .map_err(GpuError::BufferMap)?;

        let pixels = {
            let data = staging.slice(..).get_mapped_range();
            unpad_rows(&data, width, height, bytes_per_row)
        };
        staging.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| EffectError::Backend(format!("readback of {} has the wrong size", framebuffer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_row_alignment() {
        // 1920 * 4 = 7680 is already a multiple of 256
        assert_eq!(padded_bytes_per_row(1920), 7680);
        // 100 * 4 = 400 rounds up to 512
        assert_eq!(padded_bytes_per_row(100), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
    }

    #[test]
    fn test_unpad_rows() {
        let width = 3;
        let height = 2;
        let padded = padded_bytes_per_row(width);
        let mut data = vec![0xAA; (padded * height) as usize];
        for row in 0..height as usize {
            for i in 0..12 {
                data[row * padded as usize + i] = (row * 12 + i) as u8;
            }
        }

        let pixels = unpad_rows(&data, width, height, padded);
        assert_eq!(pixels.len(), 24);
        assert_eq!(pixels, (0..24).collect::<Vec<u8>>());
    }

    #[test]
    fn test_unpad_rows_without_padding() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(unpad_rows(&data, 64, 1, 256), data);
    }

    #[test]
    fn test_params_block_matches_shader() {
        // Params in fullscreen_quad.wgsl: vec2 + vec2 + array<vec4, 3>
        assert_eq!(PARAMS_SIZE, 64);
    }
}
