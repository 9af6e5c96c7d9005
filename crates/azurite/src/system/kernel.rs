//! Kernel objects shared between the guest and the service layer.

use rustc_hash::FxHashMap;

/// A kernel object handle. Zero is the null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle(pub u32);

impl Handle {
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// A binary synchronization event.
#[derive(Debug, Clone, Copy, Default)]
struct Event {
    signaled: bool,
    /// While set, the event stays signaled through clears.
    latched: bool,
}

/// Kernel object tables.
#[derive(Default)]
pub struct Kernel {
    next_handle: u32,
    events: FxHashMap<Handle, Event>,
    shared: FxHashMap<Handle, Box<[u8]>>,
}

impl Kernel {
    fn allocate_handle(&mut self) -> Handle {
        self.next_handle += 1;
        Handle(self.next_handle)
    }

    /// Creates a new event, initially not signaled.
    pub fn create_event(&mut self) -> Handle {
        let handle = self.allocate_handle();
        self.events.insert(handle, Event::default());
        handle
    }

    pub fn signal_event(&mut self, handle: Handle) {
        self.event_mut(handle).signaled = true;
    }

    /// Clears an event. Has no effect while the event is latched.
    pub fn clear_event(&mut self, handle: Handle) {
        let event = self.event_mut(handle);
        if !event.latched {
            event.signaled = false;
        }
    }

    /// Latches or unlatches an event. Latching signals it as well.
    pub fn set_event_latched(&mut self, handle: Handle, latched: bool) {
        let event = self.event_mut(handle);
        event.latched = latched;
        if latched {
            event.signaled = true;
        }
    }

    pub fn event_signaled(&self, handle: Handle) -> bool {
        let Some(event) = self.events.get(&handle) else {
            panic!("unknown event handle {handle}");
        };

        event.signaled
    }

    fn event_mut(&mut self, handle: Handle) -> &mut Event {
        let Some(event) = self.events.get_mut(&handle) else {
            panic!("unknown event handle {handle}");
        };

        event
    }

    /// Allocates a zero initialized, named shared memory block.
    pub fn create_shared_memory(&mut self, name: &str, len: usize) -> Handle {
        let handle = self.allocate_handle();
        self.shared.insert(handle, vec![0; len].into_boxed_slice());
        tracing::debug!("created shared memory block {name} ({handle}, 0x{len:X} bytes)");
        handle
    }

    pub fn shared_memory(&self, handle: Handle) -> &[u8] {
        let Some(block) = self.shared.get(&handle) else {
            panic!("unknown shared memory handle {handle}");
        };

        block
    }

    pub fn shared_memory_mut(&mut self, handle: Handle) -> &mut [u8] {
        let Some(block) = self.shared.get_mut(&handle) else {
            panic!("unknown shared memory handle {handle}");
        };

        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_signal_and_clear() {
        let mut kernel = Kernel::default();
        let event = kernel.create_event();
        assert!(!kernel.event_signaled(event));

        kernel.signal_event(event);
        assert!(kernel.event_signaled(event));

        kernel.clear_event(event);
        assert!(!kernel.event_signaled(event));
    }

    #[test]
    fn latched_events_survive_clears() {
        let mut kernel = Kernel::default();
        let event = kernel.create_event();

        kernel.set_event_latched(event, true);
        assert!(kernel.event_signaled(event));

        kernel.clear_event(event);
        assert!(kernel.event_signaled(event));

        kernel.set_event_latched(event, false);
        kernel.clear_event(event);
        assert!(!kernel.event_signaled(event));
    }

    #[test]
    #[should_panic = "unknown event handle"]
    fn unknown_event_handles_are_fatal() {
        let kernel = Kernel::default();
        kernel.event_signaled(Handle(42));
    }

    #[test]
    fn shared_memory_is_zero_initialized() {
        let mut kernel = Kernel::default();
        let block = kernel.create_shared_memory("TestBlock", 0x100);

        assert_eq!(kernel.shared_memory(block).len(), 0x100);
        assert!(kernel.shared_memory(block).iter().all(|byte| *byte == 0));

        kernel.shared_memory_mut(block)[0x40] = 0xAB;
        assert_eq!(kernel.shared_memory(block)[0x40], 0xAB);
    }
}
