//! Public enums and driver error type.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// Register access failed; nothing was committed.
    Port(E),
    /// The mode register did not read back what was written.
    ReadbackMismatch { reg: u8, expected: u8, actual: u8 },
    /// Parameter outside allowed range.
    InvalidInput,
    /// Property not handled by this controller.
    Unsupported,
    /// A collaborator needed for the request is missing or refused it.
    NoDevice,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Port(e)
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Port(_) => defmt::write!(f, "Port(..)"),
            Error::ReadbackMismatch { reg, expected, actual } => defmt::write!(
                f,
                "ReadbackMismatch(reg=0x{:02x} expected=0x{:02x} actual=0x{:02x})",
                reg,
                expected,
                actual
            ),
            Error::InvalidInput => defmt::write!(f, "InvalidInput"),
            Error::Unsupported => defmt::write!(f, "Unsupported"),
            Error::NoDevice => defmt::write!(f, "NoDevice"),
        }
    }
}

/// Errors from the I2C register port.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusError<E> {
    I2c(E),
    Timeout,
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for BusError<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            BusError::I2c(_) => defmt::write!(f, "I2c(..)"),
            BusError::Timeout => defmt::write!(f, "Timeout"),
        }
    }
}

/// What is plugged into the input paths.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CableType {
    #[default]
    None,
    Wired,
    HvWired,
    Wireless,
    HvWireless,
}

impl CableType {
    /// Input arrives through the wireless coil (WCIN).
    pub fn is_wireless(self) -> bool {
        matches!(self, CableType::Wireless | CableType::HvWireless)
    }

    pub fn is_hv_wireless(self) -> bool {
        self == CableType::HvWireless
    }

    pub fn is_hv_wired(self) -> bool {
        self == CableType::HvWired
    }

    pub fn is_none(self) -> bool {
        self == CableType::None
    }
}

/// Input voltage classification from CHGIN_DTLS / WCIN_DTLS.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VbusState {
    /// Below UVLO.
    UnderVoltage = 0,
    /// Above UVLO but below the battery voltage.
    Invalid = 1,
    OverVoltage = 2,
    Valid = 3,
}

impl VbusState {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => VbusState::UnderVoltage,
            1 => VbusState::Invalid,
            2 => VbusState::OverVoltage,
            _ => VbusState::Valid,
        }
    }

    /// UVLO or below battery voltage.
    pub fn is_low(self) -> bool {
        matches!(self, VbusState::UnderVoltage | VbusState::Invalid)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerStatus {
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl ChargerStatus {
    /// Decode DETAILS_01 CHG_DTLS.
    pub fn from_chg_dtls(dtls: u8) -> Self {
        match dtls & 0x0F {
            0x00..=0x03 => ChargerStatus::Charging,
            0x04 => ChargerStatus::Full,
            0x05 | 0x06 | 0x07 | 0x0A | 0x0B => ChargerStatus::NotCharging,
            0x08 | 0x0C | 0x0D | 0x0E => ChargerStatus::Discharging,
            _ => ChargerStatus::Unknown,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargeType {
    None,
    Trickle,
    Fast,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Health {
    #[default]
    Good,
    OverVoltage,
    UnderVoltage,
    WatchdogTimerExpire,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SwitchingFrequency {
    Mhz3 = 0,
    Mhz2 = 1,
    Mhz1_5 = 2,
}

/// Coil rectifier headroom requested from the wireless receiver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Headroom(pub u16);

impl Headroom {
    pub const NOMINAL: Headroom = Headroom(0);
    pub const HV_RAMP: Headroom = Headroom(277);
}

/// Pad-side errors reported to the wireless collaborator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// Wireless TX overcurrent.
    Ocp,
    /// OTG was turned on while TX was active.
    OtgOn,
    /// TX request refused for another reason.
    Etc,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnoControl {
    Off,
    On,
    /// Boost-only UNO, forced without a transition lookup.
    Only,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ShipMode {
    Disable,
    Enable,
    /// Ship mode through the companion firmware; not available here.
    EnableOp,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtgCurrent {
    Ma500 = 0,
    Ma900 = 1,
    Ma1200 = 2,
    Ma1500 = 3,
}

/// UNO output current steps in CNFG_05 UNOILIM.
pub const UNO_ILIM_STEPS: [(u16, u8); 7] = [
    (200, 1),
    (300, 2),
    (400, 3),
    (600, 4),
    (800, 5),
    (1_000, 6),
    (1_500, 7),
];

pub const UNO_VOUT_MIN_MV: u16 = 5_000;
pub const UNO_VOUT_MAX_MV: u16 = 11_000;
