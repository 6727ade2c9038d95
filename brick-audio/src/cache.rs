//! Cache maintenance around DMA-visible buffers.
//!
//! Two barriers bracket every processed block:
//!
//! - [`acquire`](CacheMaintenance::acquire) before the CPU reads memory the DMA
//!   engine wrote (invalidate),
//! - [`publish`](CacheMaintenance::publish) before the DMA engine reads memory
//!   the CPU wrote (clean).
//!
//! On cache-coherent targets (or buffers placed in non-cacheable RAM) both are
//! no-ops: use [`Coherent`]. On a Cortex-M7 with the D-cache on, enable the
//! `cortex-m7` feature and use `CortexM7DCache`.

use crate::constants::CACHE_LINE_BYTES;

/// Memory-visibility barriers for buffers shared with a DMA engine.
///
/// Implementations must be callable from the audio worker while interrupts
/// keep firing; they must not block.
pub trait CacheMaintenance {
    /// Make CPU writes in `[addr, addr + len)` visible to DMA.
    fn publish(&self, addr: usize, len: usize);

    /// Discard any stale CPU view of `[addr, addr + len)` so DMA writes are seen.
    fn acquire(&self, addr: usize, len: usize);
}

/// Barrier implementation for coherent memory. Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Coherent;

impl CacheMaintenance for Coherent {
    #[inline(always)]
    fn publish(&self, _addr: usize, _len: usize) {}

    #[inline(always)]
    fn acquire(&self, _addr: usize, _len: usize) {}
}

/// Widen `[addr, addr + len)` to whole cache lines.
///
/// Returns `(aligned_start, aligned_len)`. An empty region stays empty.
pub fn line_span(addr: usize, len: usize) -> (usize, usize) {
    if len == 0 {
        return (addr, 0);
    }
    let mask = CACHE_LINE_BYTES - 1;
    let start = addr & !mask;
    let end = (addr + len + mask) & !mask;
    (start, end - start)
}

/// Start of the SRAM window the DMA controllers can reach.
pub const DMA_SRAM_START: usize = 0x2000_0000;

/// End (exclusive) of the DMA-reachable SRAM window.
pub const DMA_SRAM_END: usize = 0x4000_0000;

/// Whether `addr` lies in SRAM the DMA engines can reach.
pub fn is_dma_reachable(addr: usize) -> bool {
    (DMA_SRAM_START..DMA_SRAM_END).contains(&addr)
}

#[cfg(feature = "cortex-m7")]
pub use self::cortex_m7::CortexM7DCache;

#[cfg(feature = "cortex-m7")]
mod cortex_m7 {
    use super::{is_dma_reachable, line_span, CacheMaintenance};
    use cortex_m::peripheral::SCB;

    /// Real D-cache maintenance for Cortex-M7 cores.
    ///
    /// Only regions inside the DMA-reachable SRAM window are touched, and
    /// nothing happens while the D-cache is disabled.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct CortexM7DCache;

    impl CacheMaintenance for CortexM7DCache {
        fn publish(&self, addr: usize, len: usize) {
            if len == 0 || !SCB::dcache_enabled() || !is_dma_reachable(addr) {
                return;
            }
            let (start, span) = line_span(addr, len);
            // SAFETY: cache maintenance by address has no memory-safety impact
            // on a clean; the SCB is only used for the by-address operation.
            let mut scb = unsafe { cortex_m::Peripherals::steal() }.SCB;
            scb.clean_dcache_by_address(start, span);
        }

        fn acquire(&self, addr: usize, len: usize) {
            if len == 0 || !SCB::dcache_enabled() || !is_dma_reachable(addr) {
                return;
            }
            let (start, span) = line_span(addr, len);
            // SAFETY: the span covers whole lines of a DMA buffer half that
            // the CPU has not written since the last publish, so discarding
            // dirty lines cannot lose CPU data. Buffers are 32-byte aligned.
            unsafe {
                let mut scb = cortex_m::Peripherals::steal().SCB;
                scb.invalidate_dcache_by_address(start, span);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_region_is_unchanged() {
        assert_eq!(line_span(0x2400_0000, 64), (0x2400_0000, 64));
    }

    #[test]
    fn unaligned_region_widens_to_lines() {
        // 0x..04 + 40 bytes touches lines 0x..00 and 0x..20.
        assert_eq!(line_span(0x2400_0004, 40), (0x2400_0000, 64));
        // A single byte still maintains a full line.
        assert_eq!(line_span(0x2400_003F, 1), (0x2400_0020, 32));
    }

    #[test]
    fn empty_region_stays_empty() {
        assert_eq!(line_span(0x2400_0010, 0), (0x2400_0010, 0));
    }

    #[test]
    fn dma_window_bounds() {
        assert!(!is_dma_reachable(0x1FFF_FFFF));
        assert!(is_dma_reachable(0x2000_0000));
        assert!(is_dma_reachable(0x3800_0000));
        assert!(!is_dma_reachable(0x4000_0000));
    }

    #[test]
    fn coherent_barriers_are_noops() {
        let mut data = [1u32; 8];
        Coherent.publish(data.as_ptr() as usize, 32);
        Coherent.acquire(data.as_ptr() as usize, 32);
        data[0] = 2;
        assert_eq!(data, [2, 1, 1, 1, 1, 1, 1, 1]);
    }
}
