/// Width in bits of the widest value the target can update with a single
/// native atomic instruction.
pub const fn atomic_word_width() -> usize {
    #[cfg(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "mips64",
        target_arch = "riscv64"
    ))]
    {
        64_usize
    }
    #[cfg(any(
        target_arch = "x86",
        target_arch = "arm",
        target_arch = "powerpc",
        target_arch = "mips",
        target_arch = "riscv32"
    ))]
    {
        32_usize
    }

    #[cfg(not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "powerpc64",
        target_arch = "mips64",
        target_arch = "riscv64",
        target_arch = "x86",
        target_arch = "arm",
        target_arch = "powerpc",
        target_arch = "mips",
        target_arch = "riscv32"
    )))]
    {
        #[cfg(target_pointer_width = "64")]
        {
            64_usize
        }
        #[cfg(target_pointer_width = "32")]
        {
            32_usize
        }
        #[cfg(target_pointer_width = "16")]
        {
            16_usize
        }
    }
}

///
/// Whether a value of type `D` fits in a single machine word slot.
pub const fn fits_atomic_word<D>() -> bool {
    (std::mem::size_of::<D>() * 8) <= atomic_word_width()
}
