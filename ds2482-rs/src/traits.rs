use crate::Register;

/// Trait for registers that can be read back from the DS2482.
///
/// See [`Ds2482::read_register`](crate::Ds2482::read_register).
pub trait Interact: Sized {
    /// Register selected by the Set Read Pointer command.
    const REGISTER: Register;

    /// Builds the register from the byte read at the pointer.
    fn from_register(value: u8) -> Self;
}
