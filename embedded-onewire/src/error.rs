/// One wire communication error type.
///
/// Bus-level outcomes such as a missing presence pulse or a failed ROM
/// search are not errors; they are reported through return values.
#[derive(Debug, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying hardware.
    Other(E),
    /// Indicates that the operation is not implemented by the bus master,
    /// such as reading a triplet or driving a strong pullup.
    Unimplemented,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}
