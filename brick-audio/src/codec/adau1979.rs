//! Driver for a pair of ADAU1979 quad ADCs sharing one I2C bus.
//!
//! Both chips run as TDM slaves of the serial interface. Chip 0 drives slots
//! 0..3 and chip 1 slots 4..7, so the eight capture slots line up with the
//! four stereo tracks.
//!
//! # Example
//!
//! ```ignore
//! let mut adcs = Adau1979Pair::new(i2c, delay);
//! adcs.init()?;                  // DEVID check on both chips
//! adcs.apply_default_config()?;  // PLL lock + TDM slot mapping
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::constants::PLL_LOCK_TIMEOUT_MS;

use self::registers as reg;
use super::{CodecControl, CodecError};

/// Register map and bit fields used by the driver.
pub mod registers {
    /// I2C address of the chip feeding slots 0..3.
    pub const I2C_ADDR_0: u8 = 0x11;
    /// I2C address of the chip feeding slots 4..7.
    pub const I2C_ADDR_1: u8 = 0x12;

    pub const M_POWER: u8 = 0x00;
    pub const PLL_CONTROL: u8 = 0x01;
    pub const PLL_CONTROL2: u8 = 0x02;
    pub const PLL_CONTROL3: u8 = 0x03;
    pub const BLOCK_POWER: u8 = 0x04;
    pub const SAI_CTRL0: u8 = 0x05;
    pub const SAI_SLOT0: u8 = 0x07;
    pub const SAI_SLOT1: u8 = 0x08;
    pub const SAI_SLOT2: u8 = 0x09;
    pub const SAI_SLOT3: u8 = 0x0A;
    pub const MISC_CONTROL: u8 = 0x0F;
    pub const DEVID0: u8 = 0xF0;

    pub const DEVID0_EXPECTED: u8 = 0x79;

    // M_POWER
    pub const MASTER_POWER: u8 = 1 << 0;

    // PLL_CONTROL
    pub const PLL_LOCKED: u8 = 1 << 7;
    pub const PLL_MUTE_ON_UNLOCK: u8 = 1 << 6;
    /// MCLK = 256 fs.
    pub const PLL_MCS_256FS: u8 = 0x01;

    // BLOCK_POWER
    pub const BLOCKS_ALL: u8 = 0x0F;

    // SAI_CTRL0
    pub const SAI_MODE_TDM: u8 = 2 << 5;
    pub const SAI_WORD_24: u8 = 4 << 1;

    // MISC_CONTROL
    pub const MISC_UNMUTE: u8 = 1 << 2;

    /// `SAI_SLOTn` values per chip: TDM slot in bits 7:4, channel in 3:0.
    pub const SLOT_MAP: [[u8; 4]; 2] = [[0x00, 0x21, 0x42, 0x63], [0x10, 0x31, 0x52, 0x73]];
}

const ADDRESSES: [u8; 2] = [reg::I2C_ADDR_0, reg::I2C_ADDR_1];
const SLOT_REGS: [u8; 4] = [reg::SAI_SLOT0, reg::SAI_SLOT1, reg::SAI_SLOT2, reg::SAI_SLOT3];

/// Two ADAU1979 converters at [`registers::I2C_ADDR_0`] and
/// [`registers::I2C_ADDR_1`].
///
/// Generic over I2C bus and delay provider. The delay paces the PLL lock poll.
pub struct Adau1979Pair<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C, D> Adau1979Pair<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Give back the bus and the delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    // ── Low-level I2C helpers ──────────────────────────────────────────

    pub fn write_register(&mut self, address: u8, register: u8, value: u8) -> Result<(), CodecError> {
        self.i2c
            .write(address, &[register, value])
            .map_err(CodecError::from_bus)
    }

    pub fn read_register(&mut self, address: u8, register: u8) -> Result<u8, CodecError> {
        let mut value = [0u8];
        self.i2c
            .write_read(address, &[register], &mut value)
            .map_err(CodecError::from_bus)?;
        Ok(value[0])
    }

    /// Same register, same value, both chips.
    fn broadcast(&mut self, register: u8, value: u8) -> Result<(), CodecError> {
        for address in ADDRESSES {
            self.write_register(address, register, value)?;
        }
        Ok(())
    }

    fn both_locked(&mut self) -> Result<bool, CodecError> {
        for address in ADDRESSES {
            if self.read_register(address, reg::PLL_CONTROL)? & reg::PLL_LOCKED == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Poll the lock bit of both chips every millisecond, up to the timeout.
    fn wait_pll_locked(&mut self) -> Result<(), CodecError> {
        for _ in 0..PLL_LOCK_TIMEOUT_MS {
            if self.both_locked()? {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        if self.both_locked()? {
            Ok(())
        } else {
            Err(CodecError::ClockLockTimeout)
        }
    }

    /// Digital mute of the capture path. Both chips are attempted even if
    /// the first one fails; the first error is returned.
    pub fn mute_capture(&mut self, mute: bool) -> Result<(), CodecError> {
        let mut result = Ok(());
        for address in ADDRESSES {
            let step = self.read_register(address, reg::MISC_CONTROL).and_then(|misc| {
                let misc = if mute {
                    misc & !reg::MISC_UNMUTE
                } else {
                    misc | reg::MISC_UNMUTE
                };
                self.write_register(address, reg::MISC_CONTROL, misc)
            });
            if result.is_ok() {
                result = step;
            }
        }
        result
    }
}

impl<I2C, D> CodecControl for Adau1979Pair<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    fn init(&mut self) -> Result<(), CodecError> {
        for address in ADDRESSES {
            let found = self.read_register(address, reg::DEVID0)?;
            if found != reg::DEVID0_EXPECTED {
                return Err(CodecError::WrongIdentity { address, found });
            }
        }
        Ok(())
    }

    fn apply_default_config(&mut self) -> Result<(), CodecError> {
        // Nothing may reach the bus while the clocks settle.
        self.broadcast(reg::BLOCK_POWER, 0x00)?;

        self.broadcast(reg::M_POWER, reg::MASTER_POWER)?;
        self.broadcast(reg::PLL_CONTROL, reg::PLL_MUTE_ON_UNLOCK | reg::PLL_MCS_256FS)?;
        self.broadcast(reg::PLL_CONTROL2, 0x00)?;
        self.broadcast(reg::PLL_CONTROL3, 0x00)?;
        self.wait_pll_locked()?;

        self.broadcast(reg::SAI_CTRL0, reg::SAI_MODE_TDM | reg::SAI_WORD_24)?;
        for (address, slots) in ADDRESSES.into_iter().zip(reg::SLOT_MAP) {
            for (register, value) in SLOT_REGS.into_iter().zip(slots) {
                self.write_register(address, register, value)?;
            }
        }

        self.broadcast(reg::BLOCK_POWER, reg::BLOCKS_ALL)?;
        self.broadcast(reg::MISC_CONTROL, reg::MISC_UNMUTE)
    }

    /// The output mute lives on the DAC; the ADCs stay live so metering
    /// keeps working while muted.
    fn set_mute(&mut self, _mute: bool) -> Result<(), CodecError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{self, ErrorType, NoAcknowledgeSource, Operation};

    // ── Mock I2C with one register file per chip ──────────────────────

    #[derive(Debug)]
    struct MockError(i2c::ErrorKind);

    impl i2c::Error for MockError {
        fn kind(&self) -> i2c::ErrorKind {
            self.0
        }
    }

    struct MockI2c {
        regs: [[u8; 256]; 2],
        /// Write log in chronological order: (address, register, value).
        log: Vec<(u8, u8, u8)>,
        /// PLL_CONTROL reads before the lock bit appears, per chip.
        lock_after: [Option<u32>; 2],
        pll_reads: [u32; 2],
        absent: Option<u8>,
    }

    impl MockI2c {
        fn new() -> Self {
            let mut regs = [[0u8; 256]; 2];
            regs[0][reg::DEVID0 as usize] = reg::DEVID0_EXPECTED;
            regs[1][reg::DEVID0 as usize] = reg::DEVID0_EXPECTED;
            Self {
                regs,
                log: Vec::new(),
                lock_after: [Some(0), Some(0)],
                pll_reads: [0; 2],
                absent: None,
            }
        }

        fn chip(&self, address: u8) -> Result<usize, MockError> {
            if self.absent == Some(address) {
                return Err(MockError(i2c::ErrorKind::NoAcknowledge(
                    NoAcknowledgeSource::Address,
                )));
            }
            match address {
                reg::I2C_ADDR_0 => Ok(0),
                reg::I2C_ADDR_1 => Ok(1),
                _ => Err(MockError(i2c::ErrorKind::NoAcknowledge(
                    NoAcknowledgeSource::Address,
                ))),
            }
        }

        fn read_reg(&mut self, chip: usize, register: u8) -> u8 {
            let mut value = self.regs[chip][register as usize];
            if register == reg::PLL_CONTROL {
                self.pll_reads[chip] += 1;
                match self.lock_after[chip] {
                    Some(n) if self.pll_reads[chip] > n => value |= reg::PLL_LOCKED,
                    _ => value &= !reg::PLL_LOCKED,
                }
            }
            value
        }

        fn writes_to(&self, address: u8) -> Vec<(u8, u8)> {
            self.log
                .iter()
                .filter(|w| w.0 == address)
                .map(|w| (w.1, w.2))
                .collect()
        }
    }

    impl ErrorType for MockI2c {
        type Error = MockError;
    }

    impl I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            let chip = self.chip(address)?;
            let mut pointer = 0u8;
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        pointer = bytes[0];
                        if let Some(&value) = bytes.get(1) {
                            self.regs[chip][pointer as usize] = value;
                            self.log.push((address, pointer, value));
                        }
                    }
                    Operation::Read(buf) => {
                        for b in buf.iter_mut() {
                            *b = self.read_reg(chip, pointer);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    // ── Mock delay counting milliseconds ──────────────────────────────

    #[derive(Default)]
    struct MockDelay {
        ns: u64,
    }

    impl DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += ns as u64;
        }
    }

    fn make_pair(i2c: MockI2c) -> Adau1979Pair<MockI2c, MockDelay> {
        Adau1979Pair::new(i2c, MockDelay::default())
    }

    #[test]
    fn init_accepts_both_chips() {
        let mut adcs = make_pair(MockI2c::new());
        assert_eq!(adcs.init(), Ok(()));
        let (i2c, _) = adcs.release();
        assert!(i2c.log.is_empty());
    }

    #[test]
    fn init_rejects_wrong_device_id() {
        let mut i2c = MockI2c::new();
        i2c.regs[1][reg::DEVID0 as usize] = 0x42;
        let mut adcs = make_pair(i2c);
        assert_eq!(
            adcs.init(),
            Err(CodecError::WrongIdentity { address: reg::I2C_ADDR_1, found: 0x42 })
        );
    }

    #[test]
    fn init_reports_missing_chip() {
        let mut i2c = MockI2c::new();
        i2c.absent = Some(reg::I2C_ADDR_0);
        let mut adcs = make_pair(i2c);
        assert_eq!(adcs.init(), Err(CodecError::NotResponding));
    }

    #[test]
    fn default_config_sequence() {
        let mut adcs = make_pair(MockI2c::new());
        adcs.apply_default_config().unwrap();
        let (i2c, _) = adcs.release();

        let expected: [(u8, u8); 12] = [
            (reg::BLOCK_POWER, 0x00),
            (reg::M_POWER, 0x01),
            (reg::PLL_CONTROL, 0x41),
            (reg::PLL_CONTROL2, 0x00),
            (reg::PLL_CONTROL3, 0x00),
            (reg::SAI_CTRL0, 0x48),
            (reg::SAI_SLOT0, 0),
            (reg::SAI_SLOT1, 0),
            (reg::SAI_SLOT2, 0),
            (reg::SAI_SLOT3, 0),
            (reg::BLOCK_POWER, 0x0F),
            (reg::MISC_CONTROL, 0x04),
        ];
        for (chip, address) in ADDRESSES.into_iter().enumerate() {
            let writes = i2c.writes_to(address);
            assert_eq!(writes.len(), expected.len());
            for (i, (&got, &want)) in writes.iter().zip(expected.iter()).enumerate() {
                if (6..10).contains(&i) {
                    assert_eq!(got, (want.0, reg::SLOT_MAP[chip][i - 6]));
                } else {
                    assert_eq!(got, want, "write {i} to {address:#x}");
                }
            }
        }
    }

    #[test]
    fn slot_map_covers_all_eight_slots_once() {
        let mut seen = [false; 8];
        for chip in reg::SLOT_MAP {
            for (channel, value) in chip.into_iter().enumerate() {
                assert_eq!((value & 0x0F) as usize, channel);
                let slot = (value >> 4) as usize;
                assert!(!seen[slot]);
                seen[slot] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn late_lock_waits_in_millisecond_steps() {
        let mut i2c = MockI2c::new();
        i2c.lock_after = [Some(5), Some(0)];
        let mut adcs = make_pair(i2c);
        assert_eq!(adcs.apply_default_config(), Ok(()));
        let (_, delay) = adcs.release();
        assert_eq!(delay.ns, 5_000_000);
    }

    #[test]
    fn pll_that_never_locks_times_out() {
        let mut i2c = MockI2c::new();
        i2c.lock_after = [Some(0), None];
        let mut adcs = make_pair(i2c);
        assert_eq!(adcs.apply_default_config(), Err(CodecError::ClockLockTimeout));
        let (i2c, delay) = adcs.release();
        assert_eq!(delay.ns, PLL_LOCK_TIMEOUT_MS as u64 * 1_000_000);
        // Blocks stay powered down.
        assert!(!i2c.writes_to(reg::I2C_ADDR_0).contains(&(reg::BLOCK_POWER, 0x0F)));
    }

    #[test]
    fn capture_mute_toggles_misc_bit() {
        let mut adcs = make_pair(MockI2c::new());
        adcs.apply_default_config().unwrap();
        adcs.mute_capture(true).unwrap();
        let (i2c, delay) = adcs.release();
        for chip in 0..2 {
            assert_eq!(i2c.regs[chip][reg::MISC_CONTROL as usize] & reg::MISC_UNMUTE, 0);
        }

        let mut adcs = Adau1979Pair::new(i2c, delay);
        adcs.mute_capture(false).unwrap();
        let (i2c, _) = adcs.release();
        for chip in 0..2 {
            assert_ne!(i2c.regs[chip][reg::MISC_CONTROL as usize] & reg::MISC_UNMUTE, 0);
        }
    }
}
