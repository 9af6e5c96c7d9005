//! Service call surface of the GPU service.
//!
//! Requests arrive as a word buffer with the command header in word 0 and
//! arguments and results at function specific words. The numeric headers,
//! names and argument layout are the wire contract with the guest and must
//! not change.

use easyerr::Error;

use crate::Address;
use crate::system::System;
use crate::system::kernel::Handle;

/// A service function handler. Receives the id of the calling guest thread
/// and its command buffer, which must be at least 0x42 words long.
pub type Handler = fn(&mut System, u32, &mut [u32]);

/// A service function: numeric command header, handler, name.
pub struct FunctionInfo {
    pub header: u32,
    pub handler: Option<Handler>,
    pub name: &'static str,
}

impl FunctionInfo {
    const fn new(header: u32, handler: Option<Handler>, name: &'static str) -> Self {
        Self {
            header,
            handler,
            name,
        }
    }
}

/// The service's function table.
#[rustfmt::skip]
pub const FUNCTION_TABLE: &[FunctionInfo] = &[
    FunctionInfo::new(0x0001_0082, Some(self::write_hw_regs),                  "WriteHWRegs"),
    FunctionInfo::new(0x0002_0084, None,                                       "WriteHWRegsWithMask"),
    FunctionInfo::new(0x0003_0082, None,                                       "WriteHWRegRepeat"),
    FunctionInfo::new(0x0004_0080, Some(self::read_hw_regs),                   "ReadHWRegs"),
    FunctionInfo::new(0x0005_0200, None,                                       "SetBufferSwap"),
    FunctionInfo::new(0x0006_0082, None,                                       "SetCommandList"),
    FunctionInfo::new(0x0007_00C2, None,                                       "RequestDma"),
    FunctionInfo::new(0x0008_0082, None,                                       "FlushDataCache"),
    FunctionInfo::new(0x0009_0082, None,                                       "InvalidateDataCache"),
    FunctionInfo::new(0x000A_0044, None,                                       "RegisterInterruptEvents"),
    FunctionInfo::new(0x000B_0040, None,                                       "SetLcdForceBlack"),
    FunctionInfo::new(0x000C_0000, Some(self::trigger_cmd_req_queue),          "TriggerCmdReqQueue"),
    FunctionInfo::new(0x000D_0140, None,                                       "SetDisplayTransfer"),
    FunctionInfo::new(0x000E_0180, None,                                       "SetTextureCopy"),
    FunctionInfo::new(0x000F_0200, None,                                       "SetMemoryFill"),
    FunctionInfo::new(0x0010_0040, None,                                       "SetAxiConfigQoSMode"),
    FunctionInfo::new(0x0011_0040, None,                                       "SetPerfLogMode"),
    FunctionInfo::new(0x0012_0000, None,                                       "GetPerfLog"),
    FunctionInfo::new(0x0013_0042, Some(self::register_interrupt_relay_queue), "RegisterInterruptRelayQueue"),
    FunctionInfo::new(0x0014_0000, None,                                       "UnregisterInterruptRelayQueue"),
    FunctionInfo::new(0x0015_0002, None,                                       "TryAcquireRight"),
    FunctionInfo::new(0x0016_0042, None,                                       "AcquireRight"),
    FunctionInfo::new(0x0017_0000, None,                                       "ReleaseRight"),
    FunctionInfo::new(0x0018_0000, None,                                       "ImportDisplayCaptureInfo"),
    FunctionInfo::new(0x0019_0000, None,                                       "SaveVramSysArea"),
    FunctionInfo::new(0x001A_0000, None,                                       "RestoreVramSysArea"),
    FunctionInfo::new(0x001B_0000, None,                                       "ResetGpuCore"),
    FunctionInfo::new(0x001C_0040, None,                                       "SetLedForceOff"),
    FunctionInfo::new(0x001D_0040, None,                                       "SetTestCommand"),
    FunctionInfo::new(0x001E_0080, None,                                       "SetInternalPriorities"),
];

/// Error for service requests that cannot be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service function {name} is not implemented (header 0x{header:08X})")]
    Unimplemented { header: u32, name: &'static str },
    #[error("unknown service function (header 0x{header:08X})")]
    UnknownFunction { header: u32 },
}

/// Dispatches a service request through the function table.
pub fn handle_request(
    sys: &mut System,
    client_thread: u32,
    cmd_buf: &mut [u32],
) -> Result<(), ServiceError> {
    let header = cmd_buf[0];
    let Some(function) = FUNCTION_TABLE.iter().find(|f| f.header == header) else {
        return Err(ServiceError::UnknownFunction { header });
    };

    let Some(handler) = function.handler else {
        return Err(ServiceError::Unimplemented {
            header,
            name: function.name,
        });
    };

    handler(sys, client_thread, cmd_buf);
    Ok(())
}

/// Writes a block of GPU registers from guest memory.
///
/// Arguments: register offset in word 1, byte size in word 2, source pointer
/// in word 4. Rejected accesses are logged and have no effect.
fn write_hw_regs(sys: &mut System, _client_thread: u32, cmd_buf: &mut [u32]) {
    let base = cmd_buf[1];
    let size = cmd_buf[2];
    let source = Address(cmd_buf[4]);

    let Some(data) = sys.mem.bytes(source, size as usize) else {
        tracing::error!("register write source is unmapped (address {source}, size 0x{size:08X})");
        return;
    };

    if let Err(e) = super::write_register_block(&mut sys.gpu, base, data) {
        tracing::error!("register write rejected: {e}");
    }
}

/// Reads a block of GPU registers into guest memory.
///
/// Arguments: register offset in word 1, byte size in word 2, destination
/// pointer in word 0x41 (the static buffer slot).
fn read_hw_regs(sys: &mut System, _client_thread: u32, cmd_buf: &mut [u32]) {
    let base = cmd_buf[1];
    let size = cmd_buf[2];
    let dest = Address(cmd_buf[0x41]);

    let Some(data) = sys.mem.bytes_mut(dest, size as usize) else {
        tracing::error!(
            "register read destination is unmapped (address {dest}, size 0x{size:08X})"
        );
        return;
    };

    if let Err(e) = super::read_register_block(&sys.gpu, base, data) {
        tracing::error!("register read rejected: {e}");
    }
}

/// Registers the calling thread's completion event and hands back its queue.
///
/// Arguments: flags in word 1, event handle in word 3. Results: 0 in word 0,
/// the assigned queue index in word 2, the shared block handle in word 4.
fn register_interrupt_relay_queue(sys: &mut System, client_thread: u32, cmd_buf: &mut [u32]) {
    let flags = cmd_buf[1];
    let event = Handle(cmd_buf[3]);

    let registration = super::register_queue(sys, client_thread, flags, event);

    cmd_buf[0] = 0;
    cmd_buf[2] = registration.thread_index;
    cmd_buf[4] = registration.shared_memory.0;
}

/// Drains the calling thread's command queue.
fn trigger_cmd_req_queue(sys: &mut System, client_thread: u32, _cmd_buf: &mut [u32]) {
    let Some(binding) = sys.gsp.binding(client_thread) else {
        tracing::error!("command queue trigger from unregistered thread {client_thread}");
        return;
    };

    super::process_queue(sys, binding.thread_index);
}

#[cfg(test)]
mod tests {
    use super::super::{QUEUE_BASE, RECORD_SIZE, command_buffer_offset, read_header};
    use super::*;
    use crate::Primitive;
    use crate::modules::debug::NopDebugModule;
    use crate::system::gpu::{MMIO_BASE, Reg};
    use crate::system::mem::HEAP_BASE;
    use crate::system::{Modules, System};

    fn system() -> System {
        System::new(Modules {
            debug: Box::new(NopDebugModule),
        })
    }

    fn request(sys: &mut System, client_thread: u32, words: &[(usize, u32)]) -> [u32; 0x80] {
        let mut cmd_buf = [0u32; 0x80];
        for (index, value) in words {
            cmd_buf[*index] = *value;
        }

        handle_request(sys, client_thread, &mut cmd_buf).unwrap();
        cmd_buf
    }

    #[test]
    fn hw_regs_round_trip_through_guest_memory() {
        let mut sys = system();

        let data = [0xEF, 0xBE, 0xAD, 0xDE, 0x78, 0x56, 0x34, 0x12];
        sys.mem
            .bytes_mut(Address(HEAP_BASE), data.len())
            .unwrap()
            .copy_from_slice(&data);

        request(
            &mut sys,
            0,
            &[(0, 0x0001_0082), (1, 0x100), (2, 8), (4, HEAP_BASE)],
        );
        assert_eq!(sys.gpu.read32(MMIO_BASE + 0x100), 0xDEAD_BEEF);
        assert_eq!(sys.gpu.read32(MMIO_BASE + 0x104), 0x1234_5678);

        request(
            &mut sys,
            0,
            &[
                (0, 0x0004_0080),
                (1, 0x100),
                (2, 8),
                (0x41, HEAP_BASE + 0x40),
            ],
        );
        assert_eq!(
            sys.mem.bytes(Address(HEAP_BASE + 0x40), 8).unwrap(),
            &data
        );
    }

    #[test]
    fn rejected_hw_reg_writes_are_absorbed() {
        let mut sys = system();

        // misaligned size: the request succeeds at the service boundary but
        // touches no registers
        request(
            &mut sys,
            0,
            &[(0, 0x0001_0082), (1, 0x100), (2, 6), (4, HEAP_BASE)],
        );
        assert_eq!(sys.gpu.read32(MMIO_BASE + 0x100), 0);
    }

    #[test]
    fn register_and_trigger() {
        let mut sys = system();
        let event = sys.kernel.create_event();

        let cmd_buf = request(&mut sys, 3, &[(0, 0x0013_0042), (1, 0), (3, event.0)]);
        assert_eq!(cmd_buf[0], 0);
        assert_eq!(cmd_buf[2], 0);
        assert_eq!(cmd_buf[4], sys.gsp.shared_memory.0);
        assert!(sys.kernel.event_signaled(event));

        // enqueue a memory fill like the guest library: record in slot 0,
        // pending count raised to 1
        let offset = command_buffer_offset(0, QUEUE_BASE);
        let shared = sys.kernel.shared_memory_mut(sys.gsp.shared_memory);
        let mut record = [0u8; RECORD_SIZE];
        for (index, word) in [0x02u32, 0x1000, 0xFF, 0x2000, 0, 0, 0].iter().enumerate() {
            word.write_le_bytes(&mut record[4 * index..]);
        }
        shared[offset..offset + RECORD_SIZE].copy_from_slice(&record);
        0x0000_0100u32.write_le_bytes(&mut shared[command_buffer_offset(0, 0)..]);

        request(&mut sys, 3, &[(0, 0x000C_0000)]);

        assert_eq!(sys.gpu.read_reg(Reg::MemoryFill, 0), 0x200);
        assert_eq!(sys.gpu.read_reg(Reg::MemoryFill, 3), 0xFF);
        assert_eq!(read_header(&sys, 0).pending(), 0);
    }

    #[test]
    fn triggers_from_unregistered_threads_are_ignored() {
        let mut sys = system();
        request(&mut sys, 5, &[(0, 0x000C_0000)]);
    }

    #[test]
    fn unimplemented_functions_are_reported() {
        let mut sys = system();
        let mut cmd_buf = [0u32; 0x80];
        cmd_buf[0] = 0x0005_0200;

        assert_eq!(
            handle_request(&mut sys, 0, &mut cmd_buf),
            Err(ServiceError::Unimplemented {
                header: 0x0005_0200,
                name: "SetBufferSwap"
            })
        );
    }

    #[test]
    fn unknown_functions_are_reported() {
        let mut sys = system();
        let mut cmd_buf = [0u32; 0x80];
        cmd_buf[0] = 0xDEAD_0000;

        assert_eq!(
            handle_request(&mut sys, 0, &mut cmd_buf),
            Err(ServiceError::UnknownFunction {
                header: 0xDEAD_0000
            })
        );
    }

    #[test]
    fn every_table_entry_has_a_unique_header() {
        for entry in FUNCTION_TABLE {
            let matches = FUNCTION_TABLE
                .iter()
                .filter(|other| other.header == entry.header)
                .count();
            assert_eq!(matches, 1, "duplicate header for {}", entry.name);
        }
    }
}
