//! State of the emulated system.

pub mod gpu;
pub mod gsp;
pub mod kernel;
pub mod mem;

use crate::modules::debug::DebugModule;
use crate::system::gpu::Gpu;
use crate::system::kernel::Kernel;
use crate::system::mem::Memory;

/// System modules.
pub struct Modules {
    pub debug: Box<dyn DebugModule>,
}

/// System state.
pub struct System {
    /// System modules.
    pub modules: Modules,
    /// Guest memory.
    pub mem: Memory,
    /// The GPU register file.
    pub gpu: Gpu,
    /// Kernel objects shared with the guest.
    pub kernel: Kernel,
    /// The GPU service interface.
    pub gsp: gsp::Interface,
}

impl System {
    pub fn new(modules: Modules) -> Self {
        let mut kernel = Kernel::default();
        let gsp = gsp::Interface::new(&mut kernel);

        Self {
            modules,
            mem: Memory::new(),
            gpu: Gpu::default(),
            kernel,
            gsp,
        }
    }
}
