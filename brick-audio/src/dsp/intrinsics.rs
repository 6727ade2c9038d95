//! ARM DSP instruction wrappers with pure-Rust fallbacks.
//!
//! On `thumbv7em` targets (Cortex-M4/M7 with DSP extension) these compile to
//! single instructions. Elsewhere (host tests) an equivalent Rust version runs.

/// Saturate an `i32` to the signed 24-bit range (`-8388608..=8388607`).
///
/// Maps to ARM `SSAT #24`.
#[inline(always)]
pub fn saturate24(val: i32) -> i32 {
    #[cfg(all(target_arch = "arm", target_feature = "dsp"))]
    {
        let out: i32;
        unsafe {
            core::arch::asm!(
                "ssat {out}, #24, {val}",
                out = out(reg) out,
                val = in(reg) val,
            );
        }
        out
    }
    #[cfg(not(all(target_arch = "arm", target_feature = "dsp")))]
    {
        const MAX: i32 = (1 << 23) - 1;
        const MIN: i32 = -(1 << 23);
        val.clamp(MIN, MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturate24() {
        assert_eq!(saturate24(0), 0);
        assert_eq!(saturate24(8_388_607), 8_388_607);
        assert_eq!(saturate24(8_388_608), 8_388_607);
        assert_eq!(saturate24(-8_388_608), -8_388_608);
        assert_eq!(saturate24(-8_388_609), -8_388_608);
        assert_eq!(saturate24(i32::MAX), 8_388_607);
        assert_eq!(saturate24(i32::MIN), -8_388_608);
    }
}
