//! Human-readable decoders for interrupt/status/detail registers.

use super::regs::*;
use super::types::{ChargerStatus, VbusState};

#[inline]
fn log_named_bits(tag: &str, val: u8, map: &[(&'static str, u8)]) {
    let mut any = false;
    for (name, mask) in map {
        if (val & *mask) != 0 {
            if !any {
                debug!("{}:", tag);
                any = true;
            }
            debug!("  - {}", *name);
        }
    }
    if !any {
        debug!("{}: (none set, 0x{:02X})", tag, val);
    }
}

const INT_MAP: &[(&str, u8)] = &[
    ("AICL", AICL_I),
    ("CHGIN", CHGIN_I),
    ("WCIN", WCIN_I),
    ("CHG", CHG_I),
    ("BAT", BAT_I),
    ("BATP", BATP_I),
    ("BYP", BYP_I),
];

/// INT (clear-on-read) as it arrived with an interrupt.
pub fn log_int(int: u8) {
    debug!("INT = 0x{:02X}", int);
    log_named_bits("INT bits", int, INT_MAP);
}

pub fn log_int_ok(ok: u8) {
    debug!("INT_OK = 0x{:02X}", ok);
    log_named_bits("INT_OK bits", ok, INT_MAP);
}

pub fn log_details(d0: u8, d1: u8, d2: u8) {
    let chgin = VbusState::from_bits((d0 & CHGIN_DTLS_MASK) >> CHGIN_DTLS_SHIFT);
    let wcin = VbusState::from_bits((d0 & WCIN_DTLS_MASK) >> WCIN_DTLS_SHIFT);
    let chg = d1 & CHG_DTLS_MASK;
    let bat = (d1 & BAT_DTLS_MASK) >> BAT_DTLS_SHIFT;
    debug!(
        "DETAILS = {:02X} {:02X} {:02X}: chgin={:?} wcin={:?} chg=0x{:X} ({:?}) bat=0x{:X}",
        d0,
        d1,
        d2,
        chgin,
        wcin,
        chg,
        ChargerStatus::from_chg_dtls(chg),
        bat
    );
    if d0 & AUTOIBUS != 0 {
        debug!("  - AUTOIBUS: input current auto-limited");
    }
    if d1 & TREG != 0 {
        debug!("  - TREG: junction temperature regulation");
    }
    if d2 & BYP_DTLS_MASK != 0 {
        debug!("  - BYP_DTLS: 0x{:X}", d2 & BYP_DTLS_MASK);
    }
}

/// Register dump as one line per register.
pub fn log_dump(regs: &[(u8, u8)]) {
    info!("register dump ({} regs)", regs.len());
    for (reg, val) in regs {
        info!("  0x{:02X} = 0x{:02X}", *reg, *val);
    }
}
