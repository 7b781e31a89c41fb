/// Relaxed-load rounds of the spin lock's "test" phase between two exchanges.
pub(crate) const SPIN_TEST_ROUNDS: u32 = 64_u32;

/// Timed spin acquisition yields the core every this many failed attempts.
pub(crate) const SPIN_YIELD_EVERY: u32 = 128_u32;

/// Bit marking an active writer in the reader/writer state word.
pub(crate) const WRITER_ACTIVE: usize = 1_usize;

/// Increment of the reader count in the reader/writer state word.
pub(crate) const ONE_READER: usize = 2_usize;

/// Maximum number of concurrent readers.
pub(crate) const MAX_READERS: usize = (usize::MAX >> 1) - 1;
