//! Software rendering backend
//!
//! Framebuffers are RGBA8 images held in memory; programs are the CPU
//! kernels of effect definitions. Used for tests, headless batch runs and
//! machines without a usable GPU adapter.

use std::collections::HashMap;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::effects::{
    CpuKernel, EffectDefinition, EffectError, FramebufferId, ImageTransfer, ProgramId, RenderBackend, UniformTable,
};

struct CpuProgram {
    kernel: Box<dyn CpuKernel>,
    uniforms: UniformTable,
}

/// In-memory backend executing effects with their CPU kernels
#[derive(Default)]
pub struct CpuBackend {
    framebuffers: HashMap<FramebufferId, RgbaImage>,
    programs: HashMap<ProgramId, CpuProgram>,
    next_id: u32,
    draw_count: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Allocate a framebuffer holding a copy of `image`
    pub fn framebuffer_from_image(&mut self, image: &RgbaImage) -> FramebufferId {
        let id = FramebufferId(self.next_id());
        self.framebuffers.insert(id, image.clone());
        id
    }

    /// Borrow a framebuffer's contents
    pub fn image(&self, framebuffer: FramebufferId) -> Option<&RgbaImage> {
        self.framebuffers.get(&framebuffer)
    }

    /// Number of live framebuffers
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of live programs
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Full-screen draws executed so far
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    fn resized(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        if image.dimensions() == (width, height) {
            image.clone()
        } else {
            imageops::resize(image, width, height, FilterType::Triangle)
        }
    }
}

impl RenderBackend for CpuBackend {
    fn create_framebuffer(&mut self, width: u32, height: u32, label: &str) -> Result<FramebufferId, EffectError> {
        if width == 0 || height == 0 {
            return Err(EffectError::Backend(format!(
                "cannot allocate {} with size {}x{}",
                label, width, height
            )));
        }
        let id = FramebufferId(self.next_id());
        self.framebuffers.insert(id, RgbaImage::new(width, height));
        tracing::trace!(framebuffer = %id, label, width, height, "Created framebuffer");
        Ok(id)
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffers.remove(&framebuffer);
    }

    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<(u32, u32)> {
        self.framebuffers.get(&framebuffer).map(|image| image.dimensions())
    }

    fn create_program(&mut self, definition: &dyn EffectDefinition) -> Result<ProgramId, EffectError> {
        let kernel = definition
            .create_cpu_kernel()
            .ok_or_else(|| EffectError::UnsupportedEffect(definition.effect_type().to_string()))?;

        // The table exposes what the kernel reads, which may be less than the
        // definition binds
        let uniforms = UniformTable::new(kernel.uniforms());
        let id = ProgramId(self.next_id());
        self.programs.insert(id, CpuProgram { kernel, uniforms });
        tracing::debug!(program = %id, effect = definition.effect_type(), "Created CPU program");
        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
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
        let pass = self
            .programs
            .get(&program)
            .ok_or(EffectError::ProgramInvalidated(program))?;
        let (width, height) = self
            .framebuffers
            .get(&output)
            .map(|image| image.dimensions())
            .ok_or(EffectError::UnknownFramebuffer(output))?;
        let source = self
            .framebuffers
            .get(&input)
            .map(|image| Self::resized(image, width, height))
            .ok_or(EffectError::UnknownFramebuffer(input))?;

        let mut target = RgbaImage::new(width, height);
        pass.kernel.process(&source, &mut target, &pass.uniforms);
        self.framebuffers.insert(output, target);
        self.draw_count += 1;
        Ok(())
    }

    fn blit(&mut self, input: FramebufferId, output: FramebufferId) -> Result<(), EffectError> {
        if input == output {
            return Ok(());
        }
        let (width, height) = self
            .framebuffer_size(output)
            .ok_or(EffectError::UnknownFramebuffer(output))?;
        let copy = self
            .framebuffers
            .get(&input)
            .map(|image| Self::resized(image, width, height))
            .ok_or(EffectError::UnknownFramebuffer(input))?;
        self.framebuffers.insert(output, copy);
        Ok(())
    }
}

impl ImageTransfer for CpuBackend {
    fn upload(&mut self, framebuffer: FramebufferId, image: &RgbaImage) -> Result<(), EffectError> {
        let target = self
            .framebuffers
            .get_mut(&framebuffer)
            .ok_or(EffectError::UnknownFramebuffer(framebuffer))?;
        if target.dimensions() != image.dimensions() {
            return Err(EffectError::Backend(format!(
                "upload of {}x{} image into {}x{} {}",
                image.width(),
                image.height(),
                target.width(),
                target.height(),
                framebuffer
            )));
        }
        target.clone_from(image);
        Ok(())
    }

    fn download(&mut self, framebuffer: FramebufferId) -> Result<RgbaImage, EffectError> {
        self.framebuffers
            .get(&framebuffer)
            .cloned()
            .ok_or(EffectError::UnknownFramebuffer(framebuffer))
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;
    use crate::effects::builtin::{BlurDefinition, VignetteDefinition};
    use crate::effects::EffectUniform;

    struct GpuOnly;

    impl EffectDefinition for GpuOnly {
        fn effect_type(&self) -> &'static str {
            "gpu_only"
        }

        fn display_name(&self) -> &'static str {
            "GPU Only"
        }

        fn category(&self) -> &'static str {
            "Test"
        }

        fn uniforms(&self) -> &'static [EffectUniform] {
            &[]
        }

        fn wgsl_source(&self) -> Option<&'static str> {
            None
        }

        fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
            None
        }
    }

    #[test]
    fn test_framebuffer_lifecycle() {
        let mut backend = CpuBackend::new();
        let fb = backend.create_framebuffer(4, 3, "test").unwrap();
        assert_eq!(backend.framebuffer_size(fb), Some((4, 3)));
        backend.release_framebuffer(fb);
        assert_eq!(backend.framebuffer_size(fb), None);
        assert!(backend.create_framebuffer(0, 3, "empty").is_err());
    }

    #[test]
    fn test_program_without_cpu_kernel_unsupported() {
        let mut backend = CpuBackend::new();
        assert_eq!(
            backend.create_program(&GpuOnly),
            Err(EffectError::UnsupportedEffect("gpu_only".to_string()))
        );
    }

    #[test]
    fn test_program_exposes_kernel_uniforms() {
        let mut backend = CpuBackend::new();
        let program = backend.create_program(&VignetteDefinition).unwrap();
        let table = backend.uniforms(program).unwrap();
        assert!(table.contains(EffectUniform::VignetteIntensity));
        assert!(table.contains(EffectUniform::VignetteSmoothness));
        assert!(!table.contains(EffectUniform::Radius));
    }

    #[test]
    fn test_draw_rejects_aliasing() {
        let mut backend = CpuBackend::new();
        let program = backend.create_program(&BlurDefinition).unwrap();
        let fb = backend.create_framebuffer(4, 4, "test").unwrap();
        assert!(matches!(backend.draw_fullscreen(program, fb, fb), Err(EffectError::Backend(_))));
    }

    #[test]
    fn test_draw_after_destroy_fails() {
        let mut backend = CpuBackend::new();
        let program = backend.create_program(&BlurDefinition).unwrap();
        let a = backend.create_framebuffer(4, 4, "a").unwrap();
        let b = backend.create_framebuffer(4, 4, "b").unwrap();
        backend.destroy_program(program);
        assert_eq!(
            backend.draw_fullscreen(program, a, b),
            Err(EffectError::ProgramInvalidated(program))
        );
    }

    #[test]
    fn test_blit_copies_and_scales() {
        let mut backend = CpuBackend::new();
        let source = backend.framebuffer_from_image(&RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255])));
        let same = backend.create_framebuffer(4, 4, "same").unwrap();
        let bigger = backend.create_framebuffer(8, 8, "bigger").unwrap();

        backend.blit(source, same).unwrap();
        assert_eq!(backend.image(same), backend.image(source));

        backend.blit(source, bigger).unwrap();
        assert_eq!(backend.framebuffer_size(bigger), Some((8, 8)));
        assert_eq!(*backend.image(bigger).unwrap().get_pixel(3, 3), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_upload_download() {
        let mut backend = CpuBackend::new();
        let fb = backend.create_framebuffer(2, 2, "io").unwrap();
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4]));
        backend.upload(fb, &image).unwrap();
        assert_eq!(backend.download(fb).unwrap(), image);

        let wrong = RgbaImage::new(3, 3);
        assert!(matches!(backend.upload(fb, &wrong), Err(EffectError::Backend(_))));
        assert_eq!(
            backend.download(FramebufferId(99)),
            Err(EffectError::UnknownFramebuffer(FramebufferId(99)))
        );
    }
}
