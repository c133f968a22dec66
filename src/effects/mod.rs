//! Effects system for the compositor
//!
//! Full-screen post-processing passes driven by a named parameter set.
//!
//! # Architecture
//!
//! The effects system keeps data, binding and execution apart:
//!
//! - **Types** (`types.rs`): parameter schema, live `ParameterSet`, per-frame
//!   `ParameterSnapshot`, the `EffectUniform` table and LFO descriptions
//! - **Traits** (`traits.rs`): `EffectDefinition` factories, `CpuKernel`, and
//!   the `RenderBackend` / `ImageTransfer` seams to the rendering collaborator
//! - **Registry** (`registry.rs`): central table of available effects
//! - **Binding** (`binding.rs`): maps parameters onto one program's uniforms
//! - **Compositor** (`compositor.rs`): ordered passes, scratch ping-pong
//! - **Automation** (`automation.rs`): LFO modulation and parameter drivers
//! - **Controller** (`controller.rs`): lifecycle and per-frame tick
//! - **Builtin** (`builtin/`): impasto, surface normal, blur, vignette and the
//!   single-pass painterly combination
//!
//! # Usage
//!
//! ```ignore
//! let registry = EffectRegistry::with_builtin();
//! let mut backend = CpuBackend::new();
//! let mut controller = EffectController::new(EffectSettings::default())?;
//! controller.set_parameter("vignette_intensity", 0.8)?;
//! controller.initialize(&mut backend, &registry)?;
//!
//! // Once per frame
//! let report = controller.tick(&mut backend, delta_time, source, destination)?;
//!
//! controller.dispose(&mut backend);
//! ```

mod automation;
mod binding;
mod compositor;
mod controller;
mod error;
mod registry;
mod traits;
mod types;
pub mod builtin;

pub use automation::*;
pub use binding::*;
pub use compositor::*;
pub use controller::*;
pub use error::*;
pub use registry::*;
pub use traits::*;
pub use types::*;
