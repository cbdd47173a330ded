//! Register addresses and bit masks for the charger block.
//! Single-byte registers; the PMIC interrupt mask shares the same port.

pub const I2C_ADDR: u8 = 0x69;

pub const REG_PMIC_SYSTEM_INT_MASK: u8 = 0x26;
pub const   SYSOVLO_IM: u8 = 1 << 5;

pub const REG_INT: u8 = 0xB0;
pub const REG_INT_MASK: u8 = 0xB1;
pub const REG_INT_OK: u8 = 0xB2;
// INT / INT_MASK / INT_OK share the bit layout
pub const   BYP_I: u8   = 1 << 0;
pub const   BATP_I: u8  = 1 << 2;
pub const   BAT_I: u8   = 1 << 3;
pub const   CHG_I: u8   = 1 << 4;
pub const   WCIN_I: u8  = 1 << 5;
pub const   CHGIN_I: u8 = 1 << 6;
pub const   AICL_I: u8  = 1 << 7;

pub const REG_DETAILS_00: u8 = 0xB3;
pub const   BATP_DTLS: u8 = 1 << 0;
pub const   WCIN_DTLS_MASK: u8 = 0b0001_1000; // <<3
pub const   WCIN_DTLS_SHIFT: u8 = 3;
pub const   CHGIN_DTLS_MASK: u8 = 0b0110_0000; // <<5
pub const   CHGIN_DTLS_SHIFT: u8 = 5;
pub const   AUTOIBUS: u8 = 1 << 7;

pub const REG_DETAILS_01: u8 = 0xB4;
pub const   CHG_DTLS_MASK: u8 = 0b0000_1111;
pub const   BAT_DTLS_MASK: u8 = 0b0111_0000; // <<4
pub const   BAT_DTLS_SHIFT: u8 = 4;
pub const   TREG: u8 = 1 << 7;

pub const REG_DETAILS_02: u8 = 0xB5;
pub const   BYP_DTLS_MASK: u8 = 0b0000_1111;
pub const   BYP_DTLS_OTG_ILIM: u8 = 1 << 0;

pub const REG_CNFG_00: u8 = 0xB7;
pub const   MODE_MASK: u8 = 0b0000_1111;
pub const   WDTEN: u8 = 1 << 4;

pub const REG_CNFG_01: u8 = 0xB8;
pub const   FCHGTIME_MASK: u8 = 0b0000_0111;
pub const   RECYCLE_EN: u8 = 1 << 3;
pub const   CHG_RSTRT_MASK: u8 = 0b0011_0000; // <<4
pub const   PQEN: u8 = 1 << 7;

pub const REG_CNFG_02: u8 = 0xB9;
pub const   CHG_CC_MASK: u8 = 0b0011_1111;
pub const   OTG_ILIM_MASK: u8 = 0b1100_0000; // <<6
pub const   OTG_ILIM_SHIFT: u8 = 6;

pub const REG_CNFG_03: u8 = 0xBA;
pub const   TO_ITH_MASK: u8 = 0b0000_0111;
pub const   TO_TIME_MASK: u8 = 0b0011_1000; // <<3
pub const   TO_TIME_SHIFT: u8 = 3;
pub const   AUTO_SHIP_MODE: u8 = 1 << 6;
pub const   SYS_TRACK_DIS: u8 = 1 << 7;

pub const REG_CNFG_04: u8 = 0xBB;
pub const   CHG_CV_PRM_MASK: u8 = 0b0011_1111;

pub const REG_CNFG_05: u8 = 0xBC;
pub const   B2SOVRC_MASK: u8 = 0b0000_1111;
pub const   UNOILIM_MASK: u8 = 0b0111_0000; // <<4
pub const   UNOILIM_SHIFT: u8 = 4;

pub const REG_CNFG_06: u8 = 0xBD;
pub const   WDTCLR_MASK: u8 = 0b0000_0011;
pub const   WDTCLR: u8 = 0x01;
pub const   CHGPROT_MASK: u8 = 0b0000_1100; // <<2
pub const   CHGPROT_UNLOCKED: u8 = 0b0000_1100;
pub const   DIS_AICL: u8 = 1 << 4;
pub const   SLOWLX_MASK: u8 = 0b0110_0000; // <<5
pub const   SLOWLX_SLOWEST: u8 = 0b0110_0000;
pub const   B2SOVRC_DTC: u8 = 1 << 7;

pub const REG_CNFG_07: u8 = 0xBE;
pub const   FMBST: u8 = 1 << 2;
pub const   FGSRC: u8 = 1 << 3;
pub const   SHIP_MODE: u8 = 1 << 7;

pub const REG_CNFG_08: u8 = 0xBF;
pub const   FSW_MASK: u8 = 0b0000_0011;

pub const REG_CNFG_09: u8 = 0xC0;
pub const   CHGIN_ILIM_MASK: u8 = 0b0111_1111;
pub const   CHG_EN: u8 = 1 << 7;

pub const REG_CNFG_10: u8 = 0xC1;
pub const   WCIN_ILIM_MASK: u8 = 0b0011_1111;

pub const REG_CNFG_11: u8 = 0xC2;
pub const   VBYPSET_MASK: u8 = 0b0111_1111;

pub const REG_CNFG_12: u8 = 0xC3;
pub const   DISKIP: u8 = 1 << 0;
pub const   VCHGIN_REG_MASK: u8 = 0b0001_1000; // <<3
pub const   VCHGIN_REG_4500: u8 = 0b0000_0000; // UVLO 4.7 V
pub const   VCHGIN_REG_4600: u8 = 0b0000_1000; // UVLO 4.8 V
pub const   CHGINSEL: u8 = 1 << 5;
pub const   WCINSEL: u8 = 1 << 6;

/// Range covered by the debug register dump.
pub const DUMP_FIRST: u8 = REG_INT_MASK;
pub const DUMP_LAST: u8 = REG_CNFG_12;
pub const DUMP_LEN: usize = (DUMP_LAST - DUMP_FIRST) as usize + 1;

/// Watchdog-expired value of DETAILS_01 CHG_DTLS.
pub const CHG_DTLS_WDT_EXPIRED: u8 = 0x0B;
/// CHG_DTLS bit shared by the timer-fault and watchdog codes.
pub const CHG_DTLS_OFF_BIT: u8 = 0x08;

/// WCIN limit written when no wireless pad is present (500 mA).
pub const WC_DEFAULT_ILIM_CODE: u8 = 0x13;
