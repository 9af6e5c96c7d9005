//! Debugger module interface.

use crate::Address;

/// Observer for the GPU service's command traffic. Implementations are pure
/// sinks: the service behaves identically under [`NopDebugModule`].
pub trait DebugModule: Send {
    /// Called after a queued command record finishes executing, with the raw
    /// record bytes.
    fn command_processed(&mut self, record: &[u8]);

    /// Called when a command list is handed to the command processor, with
    /// its guest address and resolved contents.
    fn command_list_submitted(&mut self, address: Address, data: &[u8]);
}

/// An implementation of [`DebugModule`] that does nothing.
#[derive(Debug, Clone, Copy)]
pub struct NopDebugModule;

impl DebugModule for NopDebugModule {
    fn command_processed(&mut self, _: &[u8]) {}

    fn command_list_submitted(&mut self, _: Address, _: &[u8]) {}
}
