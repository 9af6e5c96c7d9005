//! GPU service (GSP).
//!
//! The guest submits GPU work by writing 32 byte command records into its
//! slice of the shared command buffer block, raising the pending count in
//! the queue header, then triggering the queue through the service call
//! surface in [`ipc`]. Processing is synchronous: the whole queue is drained
//! before the trigger returns to the guest, which is also why completion
//! events are left permanently signaled (see [`register_queue`]).
pub mod ipc;

use bitos::bitos;
use easyerr::Error;
use rustc_hash::FxHashMap;
use static_assertions::const_assert;
use strum::FromRepr;

use crate::system::System;
use crate::system::gpu::{Gpu, MMIO_BASE, REGISTER_SPACE_SIZE, Reg};
use crate::system::kernel::{Handle, Kernel};
use crate::{Address, Primitive};

/// Length of the shared command buffer block.
pub const SHARED_MEMORY_LEN: usize = 0x1000;

/// Offset of the first per-thread command buffer within the shared block.
pub const COMMAND_BUFFER_BASE: u32 = 0x800;

/// Stride between per-thread command buffers.
pub const COMMAND_BUFFER_STRIDE: u32 = 0x200;

/// Offset of the first command record within a command buffer.
const QUEUE_BASE: u32 = 0x20;

/// Size of one command record.
pub const RECORD_SIZE: usize = 0x20;

/// Number of record slots in a command buffer.
pub const QUEUE_CAPACITY: u8 = 15;

/// How many command buffers fit in the shared block.
pub const MAX_QUEUES: u32 =
    (SHARED_MEMORY_LEN as u32 - COMMAND_BUFFER_BASE) / COMMAND_BUFFER_STRIDE;

const_assert!(QUEUE_BASE as usize + QUEUE_CAPACITY as usize * RECORD_SIZE
    == COMMAND_BUFFER_STRIDE as usize);

/// Header word of a command queue.
#[bitos(32)]
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueHeader {
    /// Slot of the oldest unprocessed record.
    #[bits(0..8)]
    pub index: u8,
    /// Commands enqueued but not yet completed. Raised by the guest when it
    /// enqueues (and must then be at most [`QUEUE_CAPACITY`]), lowered here
    /// as records complete.
    #[bits(8..16)]
    pub pending: u8,
}

/// A command record tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u32)]
pub enum CommandId {
    RequestDma       = 0x00,
    CommandListLast  = 0x01,
    MemoryFill       = 0x02,
    DisplayTransfer  = 0x03,
    TextureCopy      = 0x04,
    CommandListFirst = 0x05,
}

/// One range of a memory fill command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillRange {
    pub start: Address,
    pub value: u32,
    pub end: Address,
}

/// Parameters shared by display transfers and texture copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCopy {
    pub input_address: Address,
    pub output_address: Address,
    pub input_size: u32,
    pub output_size: u32,
    pub flags: u32,
}

/// A decoded command record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Guest to guest copy, typically heap to VRAM.
    RequestDma {
        source: Address,
        dest: Address,
        size: u32,
    },
    /// First half of the two phase command list protocol. The guest library
    /// batches everything into the last half, so this is a recognized no-op;
    /// a guest relying on real two phase semantics is unsupported.
    CommandListFirst,
    CommandListLast {
        address: Address,
        size: u32,
    },
    /// Two independent fill ranges, one per fill engine.
    MemoryFill {
        fills: [FillRange; 2],
    },
    DisplayTransfer(ImageCopy),
    TextureCopy(ImageCopy),
    Unknown(u32),
}

/// Decodes a command record.
pub fn decode(record: &[u8; RECORD_SIZE]) -> Command {
    let word = |index: usize| u32::read_le_bytes(&record[4 * index..]);
    let addr = |index: usize| Address(word(index));

    let Some(id) = CommandId::from_repr(word(0)) else {
        return Command::Unknown(word(0));
    };

    match id {
        CommandId::RequestDma => Command::RequestDma {
            source: addr(1),
            dest: addr(2),
            size: word(3),
        },
        CommandId::CommandListLast => Command::CommandListLast {
            address: addr(1),
            size: word(2),
        },
        CommandId::MemoryFill => Command::MemoryFill {
            fills: [
                FillRange {
                    start: addr(1),
                    value: word(2),
                    end: addr(3),
                },
                FillRange {
                    start: addr(4),
                    value: word(5),
                    end: addr(6),
                },
            ],
        },
        CommandId::DisplayTransfer => Command::DisplayTransfer(self::decode_image_copy(record)),
        CommandId::TextureCopy => Command::TextureCopy(self::decode_image_copy(record)),
        CommandId::CommandListFirst => Command::CommandListFirst,
    }
}

fn decode_image_copy(record: &[u8; RECORD_SIZE]) -> ImageCopy {
    let word = |index: usize| u32::read_le_bytes(&record[4 * index..]);

    ImageCopy {
        input_address: Address(word(1)),
        output_address: Address(word(2)),
        input_size: word(3),
        output_size: word(4),
        flags: word(5),
    }
}

/// Error for rejected accesses to the GPU register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("register range out of bounds (base 0x{base:08X}, size 0x{size:08X})")]
    OutOfRange { base: u32, size: u32 },
    #[error("register access not word aligned (base 0x{base:08X}, size 0x{size:08X})")]
    Misaligned { base: u32, size: u32 },
}

fn check_register_range(base: u32, size: u32) -> Result<(), AccessError> {
    if base.checked_add(size).is_none_or(|end| end >= REGISTER_SPACE_SIZE) {
        return Err(AccessError::OutOfRange { base, size });
    }

    if base % 4 != 0 || size % 4 != 0 {
        return Err(AccessError::Misaligned { base, size });
    }

    Ok(())
}

/// Writes a block of words to the register file in ascending address order.
///
/// The write is all or nothing: a range or alignment violation leaves every
/// register unchanged.
pub fn write_register_block(gpu: &mut Gpu, base: u32, data: &[u8]) -> Result<(), AccessError> {
    self::check_register_range(base, data.len() as u32)?;

    for (offset, word) in data.chunks_exact(4).enumerate() {
        gpu.write32(MMIO_BASE + base + 4 * offset as u32, u32::read_le_bytes(word));
    }

    Ok(())
}

/// Reads a block of words from the register file in ascending address order,
/// into `data`. Validation matches [`write_register_block`].
pub fn read_register_block(gpu: &Gpu, base: u32, data: &mut [u8]) -> Result<(), AccessError> {
    self::check_register_range(base, data.len() as u32)?;

    for (offset, word) in data.chunks_exact_mut(4).enumerate() {
        gpu.read32(MMIO_BASE + base + 4 * offset as u32)
            .write_le_bytes(word);
    }

    Ok(())
}

/// A client's registration: its command buffer index and completion event.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub thread_index: u32,
    pub event: Handle,
}

/// Result of registering a client queue.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub thread_index: u32,
    pub shared_memory: Handle,
}

/// GSP interface.
pub struct Interface {
    /// Handle to the shared command buffer block.
    pub shared_memory: Handle,
    /// Registered clients, keyed by guest thread id.
    bindings: FxHashMap<u32, Binding>,
}

impl Interface {
    pub fn new(kernel: &mut Kernel) -> Self {
        Self {
            shared_memory: kernel.create_shared_memory("GSPSharedMem", SHARED_MEMORY_LEN),
            bindings: FxHashMap::default(),
        }
    }

    /// Returns the binding of the given guest thread, if registered.
    pub fn binding(&self, client_thread: u32) -> Option<Binding> {
        self.bindings.get(&client_thread).copied()
    }
}

/// Registers a client's completion event and assigns it a command buffer.
///
/// The event is signaled and left permanently latched: dispatch happens
/// synchronously inside the trigger, so the queue is always ready again by
/// the time the guest can wait. A backend that executes commands on its own
/// thread has to replace the latch with a real completion signal.
///
/// # Panics
/// Panics if `event` is the null handle or the shared block has no free
/// command buffer left.
pub fn register_queue(
    sys: &mut System,
    client_thread: u32,
    flags: u32,
    event: Handle,
) -> Registration {
    assert!(!event.is_null(), "interrupt relay event handle is not valid");

    sys.kernel.signal_event(event);
    sys.kernel.set_event_latched(event, true);

    let next = sys.gsp.bindings.len() as u32;
    let binding = sys.gsp.bindings.entry(client_thread).or_insert_with(|| {
        assert!(next < MAX_QUEUES, "out of command buffers for client threads");
        Binding {
            thread_index: next,
            event,
        }
    });
    binding.event = event;
    let thread_index = binding.thread_index;

    tracing::debug!(client_thread, flags, thread_index, "registered interrupt relay queue");

    Registration {
        thread_index,
        shared_memory: sys.gsp.shared_memory,
    }
}

/// Byte offset of a command buffer within the shared block.
///
/// Bounds are whatever the backing block provides: the shared region is
/// guest writable, so out of range offsets fault here rather than being
/// silently wrapped.
fn command_buffer_offset(thread_index: u32, offset: u32) -> usize {
    (COMMAND_BUFFER_BASE + thread_index * COMMAND_BUFFER_STRIDE + offset) as usize
}

fn read_header(sys: &System, thread_index: u32) -> QueueHeader {
    let shared = sys.kernel.shared_memory(sys.gsp.shared_memory);
    QueueHeader::from_bits(u32::read_le_bytes(
        &shared[self::command_buffer_offset(thread_index, 0)..],
    ))
}

fn write_header(sys: &mut System, thread_index: u32, header: QueueHeader) {
    let shared = sys.kernel.shared_memory_mut(sys.gsp.shared_memory);
    header
        .to_bits()
        .write_le_bytes(&mut shared[self::command_buffer_offset(thread_index, 0)..]);
}

fn read_record(sys: &System, thread_index: u32, slot: u8) -> [u8; RECORD_SIZE] {
    let offset = self::command_buffer_offset(
        thread_index,
        QUEUE_BASE + slot as u32 * RECORD_SIZE as u32,
    );
    let shared = sys.kernel.shared_memory(sys.gsp.shared_memory);

    let mut record = [0; RECORD_SIZE];
    record.copy_from_slice(&shared[offset..offset + RECORD_SIZE]);
    record
}

/// Drains the command queue of the given thread, processing every pending
/// record in submission order.
pub fn process_queue(sys: &mut System, thread_index: u32) {
    loop {
        let header = self::read_header(sys, thread_index);
        if header.pending() == 0 {
            break;
        }

        let slot = header.index() % QUEUE_CAPACITY;
        let record = self::read_record(sys, thread_index, slot);

        let command = self::decode(&record);
        tracing::debug!("processing {:02X?}", command);
        self::execute(sys, command);

        self::finish_command(sys, thread_index, &record);
    }
}

fn execute(sys: &mut System, command: Command) {
    match command {
        Command::RequestDma { source, dest, size } => {
            if let Err(e) = sys.mem.copy(dest, source, size as usize) {
                tracing::error!("dropping DMA request: {e}");
            }
        }

        Command::CommandListFirst => (),

        Command::CommandListLast { address, size } => {
            sys.gpu.write_reg(Reg::CommandProcessor, 2, address.value() >> 3);
            sys.gpu.write_reg(Reg::CommandProcessor, 0, size >> 3);
            // the processor starts walking the list as soon as this is set
            sys.gpu.write_reg(Reg::CommandProcessor, 4, 1);

            match sys.mem.bytes(address, size as usize) {
                Some(data) => sys.modules.debug.command_list_submitted(address, data),
                None => {
                    tracing::error!("command list at {address} (size 0x{size:X}) is unmapped");
                }
            }
        }

        Command::MemoryFill { fills } => {
            for (engine, fill) in fills.into_iter().enumerate() {
                let base = 4 * engine as u32;
                sys.gpu.write_reg(Reg::MemoryFill, base, fill.start.value() >> 3);
                sys.gpu.write_reg(Reg::MemoryFill, base + 1, fill.end.value() >> 3);
                sys.gpu.write_reg(
                    Reg::MemoryFill,
                    base + 2,
                    fill.end.value().wrapping_sub(fill.start.value()),
                );
                sys.gpu.write_reg(Reg::MemoryFill, base + 3, fill.value);
            }
        }

        Command::DisplayTransfer(params) | Command::TextureCopy(params) => {
            sys.gpu.write_reg(Reg::DisplayTransfer, 0, params.input_address.value() >> 3);
            sys.gpu.write_reg(Reg::DisplayTransfer, 1, params.output_address.value() >> 3);
            sys.gpu.write_reg(Reg::DisplayTransfer, 3, params.input_size);
            sys.gpu.write_reg(Reg::DisplayTransfer, 2, params.output_size);
            sys.gpu.write_reg(Reg::DisplayTransfer, 4, params.flags);

            // start the transfer
            sys.gpu.write_reg(Reg::DisplayTransfer, 6, 1);
        }

        Command::Unknown(id) => tracing::error!("unknown command 0x{id:08X}"),
    }
}

/// Finishes execution of a queued command: notifies the debug module and
/// retires the record from the queue. The pending count is guest raised, so
/// it saturates instead of wrapping on a bogus zero.
fn finish_command(sys: &mut System, thread_index: u32, record: &[u8]) {
    sys.modules.debug.command_processed(record);

    let mut header = self::read_header(sys, thread_index);
    let slot = header.index() % QUEUE_CAPACITY;
    header.set_pending(header.pending().saturating_sub(1));
    header.set_index((slot + 1) % QUEUE_CAPACITY);
    self::write_header(sys, thread_index, header);
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::modules::debug::{DebugModule, NopDebugModule};
    use crate::system::mem::{HEAP_BASE, VRAM_BASE};
    use crate::system::{Modules, System};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum DebugEvent {
        Processed(Vec<u8>),
        ListSubmitted(Address, Vec<u8>),
    }

    #[derive(Clone, Default)]
    struct RecordingDebug(Arc<Mutex<Vec<DebugEvent>>>);

    impl DebugModule for RecordingDebug {
        fn command_processed(&mut self, record: &[u8]) {
            self.0
                .lock()
                .unwrap()
                .push(DebugEvent::Processed(record.to_vec()));
        }

        fn command_list_submitted(&mut self, address: Address, data: &[u8]) {
            self.0
                .lock()
                .unwrap()
                .push(DebugEvent::ListSubmitted(address, data.to_vec()));
        }
    }

    fn system() -> System {
        System::new(Modules {
            debug: Box::new(NopDebugModule),
        })
    }

    fn recording_system() -> (System, Arc<Mutex<Vec<DebugEvent>>>) {
        let debug = RecordingDebug::default();
        let events = debug.0.clone();
        let sys = System::new(Modules {
            debug: Box::new(debug),
        });

        (sys, events)
    }

    fn record(words: &[u32]) -> [u8; RECORD_SIZE] {
        let mut record = [0; RECORD_SIZE];
        for (index, word) in words.iter().enumerate() {
            word.write_le_bytes(&mut record[4 * index..]);
        }

        record
    }

    /// Writes a record into the next free slot and raises the pending count,
    /// like the guest library does.
    fn enqueue(sys: &mut System, thread_index: u32, record: [u8; RECORD_SIZE]) {
        let mut header = read_header(sys, thread_index);
        let slot = (header.index() + header.pending()) % QUEUE_CAPACITY;

        let offset =
            command_buffer_offset(thread_index, QUEUE_BASE + slot as u32 * RECORD_SIZE as u32);
        let shared = sys.kernel.shared_memory_mut(sys.gsp.shared_memory);
        shared[offset..offset + RECORD_SIZE].copy_from_slice(&record);

        header.set_pending(header.pending() + 1);
        write_header(sys, thread_index, header);
    }

    fn register(sys: &mut System, client_thread: u32) -> (Registration, Handle) {
        let event = sys.kernel.create_event();
        let registration = register_queue(sys, client_thread, 0, event);
        (registration, event)
    }

    #[test]
    fn register_block_round_trip() {
        let mut sys = system();
        let data: Vec<u8> = (0u8..16).collect();

        write_register_block(&mut sys.gpu, 0x20, &data).unwrap();

        let mut read = vec![0; 16];
        read_register_block(&sys.gpu, 0x20, &mut read).unwrap();
        assert_eq!(read, data);
    }

    #[test]
    fn last_accessible_word_matches_the_wire_bound() {
        let mut sys = system();

        // base + size == the space size is already rejected, so the last
        // word reachable through the block path ends at 0x41FFFC
        write_register_block(&mut sys.gpu, 0x41_FFF8, &[1, 0, 0, 0]).unwrap();
        assert_eq!(
            write_register_block(&mut sys.gpu, 0x41_FFFC, &[1, 0, 0, 0]),
            Err(AccessError::OutOfRange {
                base: 0x41_FFFC,
                size: 4
            })
        );
    }

    #[test]
    fn rejected_block_accesses_have_no_effect() {
        let mut sys = system();

        assert_eq!(
            write_register_block(&mut sys.gpu, 0x43_0000, &[0xFF; 8]),
            Err(AccessError::OutOfRange {
                base: 0x43_0000,
                size: 8
            })
        );
        assert_eq!(
            write_register_block(&mut sys.gpu, 0xFFFF_FFFC, &[0xFF; 8]),
            Err(AccessError::OutOfRange {
                base: 0xFFFF_FFFC,
                size: 8
            })
        );
        assert_eq!(
            write_register_block(&mut sys.gpu, 0x20, &[0xFF; 6]),
            Err(AccessError::Misaligned {
                base: 0x20,
                size: 6
            })
        );
        assert_eq!(
            write_register_block(&mut sys.gpu, 0x22, &[0xFF; 4]),
            Err(AccessError::Misaligned {
                base: 0x22,
                size: 4
            })
        );

        for offset in 0..REGISTER_SPACE_SIZE / 4 {
            assert_eq!(sys.gpu.read32(MMIO_BASE + 4 * offset), 0);
        }

        let mut read = [0; 4];
        assert_eq!(
            read_register_block(&sys.gpu, 0x43_0000, &mut read),
            Err(AccessError::OutOfRange {
                base: 0x43_0000,
                size: 4
            })
        );
    }

    #[test]
    #[should_panic = "interrupt relay event handle is not valid"]
    fn registering_a_null_event_is_fatal() {
        let mut sys = system();
        register_queue(&mut sys, 0, 0, Handle(0));
    }

    #[test]
    fn completion_event_stays_signaled() {
        let mut sys = system();
        let (registration, event) = register(&mut sys, 7);

        assert_eq!(registration.thread_index, 0);
        assert_eq!(registration.shared_memory, sys.gsp.shared_memory);
        assert!(sys.kernel.event_signaled(event));

        // guest side resets must not unsignal it
        sys.kernel.clear_event(event);
        assert!(sys.kernel.event_signaled(event));
    }

    #[test]
    fn each_client_gets_its_own_queue() {
        let mut sys = system();
        let (first, _) = register(&mut sys, 10);
        let (second, _) = register(&mut sys, 11);

        assert_eq!(first.thread_index, 0);
        assert_eq!(second.thread_index, 1);
        assert_eq!(first.shared_memory, second.shared_memory);

        // re-registering keeps the assigned queue
        let (again, _) = register(&mut sys, 10);
        assert_eq!(again.thread_index, 0);

        // the second client's queue dispatches independently
        enqueue(&mut sys, 1, record(&[0x02, 0x1000, 0xAB, 0x2000, 0, 0, 0]));
        process_queue(&mut sys, 1);
        assert_eq!(sys.gpu.read_reg(Reg::MemoryFill, 3), 0xAB);
        assert_eq!(read_header(&sys, 1).pending(), 0);
        assert_eq!(read_header(&sys, 0).pending(), 0);
    }

    #[test]
    #[should_panic = "out of command buffers"]
    fn queue_exhaustion_is_fatal() {
        let mut sys = system();
        for client_thread in 0..=MAX_QUEUES {
            register(&mut sys, client_thread);
        }
    }

    #[test]
    fn memory_fill_programs_both_engines() {
        let mut sys = system();
        enqueue(
            &mut sys,
            0,
            record(&[0x02, 0x1000, 0xFF, 0x2000, 0x3000, 0x00, 0x3100]),
        );

        process_queue(&mut sys, 0);

        let expected = [0x200, 0x400, 0x1000, 0xFF, 0x600, 0x620, 0x100, 0x00];
        for (offset, value) in expected.into_iter().enumerate() {
            assert_eq!(sys.gpu.read_reg(Reg::MemoryFill, offset as u32), value);
        }

        let header = read_header(&sys, 0);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.index(), 1);
    }

    #[test]
    fn command_list_programs_the_processor_and_notifies() {
        let (mut sys, events) = recording_system();

        let list: Vec<u8> = (0..0x200).map(|byte| byte as u8).collect();
        sys.mem
            .bytes_mut(Address(VRAM_BASE), list.len())
            .unwrap()
            .copy_from_slice(&list);

        let submitted = record(&[0x01, VRAM_BASE, 0x200]);
        enqueue(&mut sys, 0, submitted);
        process_queue(&mut sys, 0);

        assert_eq!(sys.gpu.read_reg(Reg::CommandProcessor, 2), VRAM_BASE >> 3);
        assert_eq!(sys.gpu.read_reg(Reg::CommandProcessor, 0), 0x200 >> 3);
        assert_eq!(sys.gpu.read_reg(Reg::CommandProcessor, 4), 1);

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                DebugEvent::ListSubmitted(Address(VRAM_BASE), list),
                DebugEvent::Processed(submitted.to_vec()),
            ]
        );
    }

    #[test]
    fn display_transfer_programs_the_engine_and_trigger() {
        let mut sys = system();
        enqueue(
            &mut sys,
            0,
            record(&[0x03, VRAM_BASE, VRAM_BASE + 0x10_0000, 0x80, 0x40, 0x2]),
        );

        process_queue(&mut sys, 0);

        assert_eq!(sys.gpu.read_reg(Reg::DisplayTransfer, 0), VRAM_BASE >> 3);
        assert_eq!(
            sys.gpu.read_reg(Reg::DisplayTransfer, 1),
            (VRAM_BASE + 0x10_0000) >> 3
        );
        assert_eq!(sys.gpu.read_reg(Reg::DisplayTransfer, 3), 0x80);
        assert_eq!(sys.gpu.read_reg(Reg::DisplayTransfer, 2), 0x40);
        assert_eq!(sys.gpu.read_reg(Reg::DisplayTransfer, 4), 0x2);
        assert_eq!(sys.gpu.read_reg(Reg::DisplayTransfer, 6), 1);
    }

    #[test]
    fn texture_copy_decodes_like_a_display_transfer() {
        let copy = ImageCopy {
            input_address: Address(0x0830_0000),
            output_address: Address(0x1810_0000),
            input_size: 0x100,
            output_size: 0x80,
            flags: 0x8,
        };

        assert_eq!(
            decode(&record(&[0x04, 0x0830_0000, 0x1810_0000, 0x100, 0x80, 0x8])),
            Command::TextureCopy(copy)
        );
        assert_eq!(
            decode(&record(&[0x03, 0x0830_0000, 0x1810_0000, 0x100, 0x80, 0x8])),
            Command::DisplayTransfer(copy)
        );
        assert_eq!(decode(&record(&[0x99])), Command::Unknown(0x99));
    }

    #[test]
    fn dma_copies_between_guest_ranges() {
        let mut sys = system();

        let data = [0xA5; 16];
        sys.mem
            .bytes_mut(Address(HEAP_BASE + 0x100), data.len())
            .unwrap()
            .copy_from_slice(&data);

        enqueue(
            &mut sys,
            0,
            record(&[0x00, HEAP_BASE + 0x100, VRAM_BASE + 0x40, 16]),
        );
        process_queue(&mut sys, 0);

        assert_eq!(
            sys.mem.bytes(Address(VRAM_BASE + 0x40), 16).unwrap(),
            &data
        );
    }

    #[test]
    fn zero_size_dma_is_a_no_op() {
        let mut sys = system();

        // size zero never touches memory, even with unmapped addresses
        enqueue(&mut sys, 0, record(&[0x00, 0, 0, 0]));
        process_queue(&mut sys, 0);

        assert_eq!(read_header(&sys, 0).pending(), 0);
    }

    #[test]
    fn unknown_commands_complete_without_register_writes() {
        let mut sys = system();
        enqueue(&mut sys, 0, record(&[0x99, 1, 2, 3]));

        process_queue(&mut sys, 0);

        let header = read_header(&sys, 0);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.index(), 1);

        for offset in 0..REGISTER_SPACE_SIZE / 4 {
            assert_eq!(sys.gpu.read32(MMIO_BASE + 4 * offset), 0);
        }
    }

    #[test]
    fn command_list_first_is_a_recognized_no_op() {
        let mut sys = system();
        enqueue(&mut sys, 0, record(&[0x05, 0xDEAD, 0xBEEF]));

        process_queue(&mut sys, 0);

        let header = read_header(&sys, 0);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.index(), 1);
    }

    #[test]
    fn queue_drains_all_pending_records() {
        let (mut sys, events) = recording_system();

        let records = [
            record(&[0x99, 1]),
            record(&[0x99, 2]),
            record(&[0x99, 3]),
        ];
        for submitted in records {
            enqueue(&mut sys, 0, submitted);
        }

        process_queue(&mut sys, 0);

        let header = read_header(&sys, 0);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.index(), 3);

        assert_eq!(
            *events.lock().unwrap(),
            records
                .iter()
                .map(|r| DebugEvent::Processed(r.to_vec()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn queue_index_wraps_around() {
        let (mut sys, events) = recording_system();

        let mut header = QueueHeader::default();
        header.set_index(QUEUE_CAPACITY - 1);
        write_header(&mut sys, 0, header);

        let records = [record(&[0x99, 1]), record(&[0x99, 2])];
        for submitted in records {
            enqueue(&mut sys, 0, submitted);
        }

        process_queue(&mut sys, 0);

        let header = read_header(&sys, 0);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.index(), 1);

        assert_eq!(
            *events.lock().unwrap(),
            records
                .iter()
                .map(|r| DebugEvent::Processed(r.to_vec()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn pending_count_saturates_at_zero() {
        let mut sys = system();

        finish_command(&mut sys, 0, &[0; RECORD_SIZE]);

        let header = read_header(&sys, 0);
        assert_eq!(header.pending(), 0);
        assert_eq!(header.index(), 1);
    }
}
