//! Debuggee memory address type.

use std::fmt;
use std::ops::Add;

/// Strongly typed address in the debuggee's virtual address space
///
/// Wrapping the raw `u64` keeps addresses from being mixed up with byte
/// counts when they travel through [`ProcessController::read_memory`].
///
/// ## Example
///
/// ```rust
/// use manadbg_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x100;
/// assert_eq!(next_addr.value(), 0x1100);
/// ```
///
/// [`ProcessController::read_memory`]: crate::process::ProcessController::read_memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value (usable in const contexts).
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Address of the first byte of the page after the one containing `self`.
    ///
    /// `page_size` must be a power of two.
    ///
    /// ```rust
    /// use manadbg_core::types::Address;
    ///
    /// assert_eq!(Address::from(0x1ff0).next_page_boundary(0x1000), Address::from(0x2000));
    /// assert_eq!(Address::from(0x2000).next_page_boundary(0x1000), Address::from(0x3000));
    /// ```
    pub const fn next_page_boundary(self, page_size: u64) -> Self
    {
        Address(self.0.wrapping_add(page_size) & !(page_size - 1))
    }

    /// Number of bytes from `self` up to the end of its page.
    pub const fn bytes_to_page_end(self, page_size: u64) -> u64
    {
        self.next_page_boundary(page_size).0.wrapping_sub(self.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}
