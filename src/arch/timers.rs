//! PIT channel 0 and the CMOS periodic interrupt.

use x86_64::instructions::port::Port;

use crate::config::RTC_BASE_HZ;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
/// Channel 0, lobyte/hibyte, mode 3 (square wave).
const PIT_MODE: u8 = 0x36;

const CMOS_INDEX: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;
/// Index bit that keeps NMIs off while a register is selected.
const NMI_DISABLE: u8 = 0x80;
const RTC_REG_A: u8 = 0x0A;
const RTC_REG_B: u8 = 0x0B;
const RTC_REG_C: u8 = 0x0C;
const RTC_PERIODIC_ENABLE: u8 = 0x40;

pub fn init_pit(divisor: u16) {
    let mut command = Port::<u8>::new(PIT_COMMAND);
    let mut channel0 = Port::<u8>::new(PIT_CHANNEL0);
    let [low, high] = divisor.to_le_bytes();
    unsafe {
        command.write(PIT_MODE);
        channel0.write(low);
        channel0.write(high);
    }
}

fn cmos_read(reg: u8) -> u8 {
    let mut index = Port::<u8>::new(CMOS_INDEX);
    let mut data = Port::<u8>::new(CMOS_DATA);
    unsafe {
        index.write(NMI_DISABLE | reg);
        data.read()
    }
}

fn cmos_write(reg: u8, value: u8) {
    let mut index = Port::<u8>::new(CMOS_INDEX);
    let mut data = Port::<u8>::new(CMOS_DATA);
    unsafe {
        index.write(NMI_DISABLE | reg);
        data.write(value);
    }
}

/// Rate-select value for `hz`: the chip divides 32768 Hz by `2^(rs - 1)`.
fn rate_select(hz: u32) -> u8 {
    (32768u32 / hz).trailing_zeros() as u8 + 1
}

/// Starts the periodic interrupt at the virtualized base rate.
pub fn init_rtc() {
    let b = cmos_read(RTC_REG_B);
    cmos_write(RTC_REG_B, b | RTC_PERIODIC_ENABLE);
    let a = cmos_read(RTC_REG_A);
    cmos_write(RTC_REG_A, (a & 0xF0) | rate_select(RTC_BASE_HZ));
    acknowledge_rtc();
}

/// The RTC raises no further interrupts until register C is read.
pub fn acknowledge_rtc() {
    cmos_read(RTC_REG_C);
}
