//! src/shared_state.rs

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubChannel, Publisher, Subscriber};

use crate::charger::mode::{ModeIntent, PowerPathMode};
use crate::charger::types::{
    CableType, ChargerStatus, Headroom, Health, ShipMode, TxError, UnoControl, VbusState,
};

/// The data structure that will be broadcast from the charger monitor task.
/// It must be `Copy` to be used in a PubSubChannel.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargerReadings {
    pub mode: PowerPathMode,
    pub cable: CableType,
    pub is_charging: bool,
    pub otg_on: bool,
    pub uno_on: bool,
    pub battery_present: bool,
    pub health: Health,
    pub status: ChargerStatus,
    pub vbus: VbusState,
    // Limits
    pub input_current_limit_ma: u16,
    pub charge_current_ma: u16,
    pub float_voltage_mv: u16,
    /// Zero when AICL has not reduced the input limit.
    pub aicl_current_ma: u16,
}

/// The PubSubChannel for broadcasting charger readings.
///
/// This channel has a buffer for 2 messages, can support up to 3 subscribers,
/// and only ever expects 1 publisher.
pub type ChargerReadingsChannel = PubSubChannel<CriticalSectionRawMutex, ChargerReadings, 2, 3, 1>;
pub type ChargerReadingsPublisher<'a> = Publisher<'a, CriticalSectionRawMutex, ChargerReadings, 2, 3, 1>;
pub static CHARGER_CHANNEL: ChargerReadingsChannel = PubSubChannel::new();

/// The commands that can be sent to the charger command task.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerCommand {
    Attach(CableType),
    SetInputCurrentLimit(u16),
    SetChargeCurrent(u16),
    SetFloatVoltage(u16),
    SetTopoffCurrent(u16),
    SetWirelessChargeCurrent(u16),
    SetCharging(ModeIntent),
    SetOtg(bool),
    SetUno(UnoControl),
    SetUnoCurrent(u16),
    SetUnoVoltage(u16),
    SetShipMode(ShipMode),
    SetAutoShipMode(bool),
    DumpRegisters,
    Init,
}

/// The PubSubChannel for sending commands to the charger command task.
pub type ChargerCommandChannel = PubSubChannel<CriticalSectionRawMutex, ChargerCommand, 2, 1, 3>;
pub type ChargerCommandSubscriber<'a> = Subscriber<'a, CriticalSectionRawMutex, ChargerCommand, 2, 1, 3>;
pub static CHARGER_COMMAND_CHANNEL: ChargerCommandChannel = PubSubChannel::new();

/// Notifications for the battery manager, wireless receiver and fuel gauge.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerEvent {
    AiclCurrent(u16),
    SlowCharging,
    BatteryPresence(bool),
    SystemOvervoltage,
    OtgOvercurrent,
    DpmEvent(bool),
    ThermalControl(bool),
    QbatSwitch(bool),
    Headroom(Headroom),
    WirelessOtgControl(bool),
    WirelessVout5v,
    Misaligned,
    TxError(TxError),
    FuelGaugeReset,
}

/// Events are published immediately (oldest dropped when full).
pub type ChargerEventChannel = PubSubChannel<CriticalSectionRawMutex, ChargerEvent, 8, 3, 1>;
pub static CHARGER_EVENT_CHANNEL: ChargerEventChannel = PubSubChannel::new();
