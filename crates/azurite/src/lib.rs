pub mod primitive;

pub mod modules;
pub mod system;

pub use primitive::Primitive;
pub use system::System;

use zerocopy::{FromBytes, Immutable, IntoBytes};

/// A guest virtual address.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    FromBytes,
    IntoBytes,
    Immutable,
)]
#[repr(transparent)]
pub struct Address(pub u32);

impl Address {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::ops::Add<u32> for Address {
    type Output = Address;

    fn add(self, rhs: u32) -> Address {
        Address(self.0 + rhs)
    }
}

impl std::ops::Sub for Address {
    type Output = u32;

    fn sub(self, rhs: Address) -> u32 {
        self.0 - rhs.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}
