//! Collaborators queried and notified by the charger: the battery manager,
//! the wireless receiver and the fuel gauge.

use super::types::{Headroom, Health, TxError};
use super::work::Shared;
use crate::shared_state::{ChargerEvent, ChargerEventChannel};

pub trait BatteryManager {
    fn capacity_percent(&self) -> u8;
    fn health(&self) -> Health;
    /// A high-voltage PD contract is active; AICL is not used then.
    fn hv_pdo_active(&self) -> bool;
    /// Wireless receiver firmware is being flashed; OTG must stay off.
    fn wireless_fw_updating(&self) -> bool;
    fn wireless_tx_requested(&self) -> bool;

    fn notify_aicl_current(&self, ma: u16);
    fn notify_slow_charging(&self);
    fn notify_presence(&self, present: bool);
    fn notify_sysovlo(&self);
    fn notify_otg_overcurrent(&self);
    fn set_dpm_event(&self, active: bool);
    fn set_thermal_control(&self, enabled: bool);
    fn set_qbat_switch(&self, on: bool);
}

pub trait WirelessPower {
    fn is_online(&self) -> bool;
    /// The pad is delivering power even if the receiver is not enumerated.
    fn energy_present(&self) -> bool;
    fn set_headroom(&self, headroom: Headroom);
    fn set_otg_control(&self, enabled: bool);
    fn request_vout_5v(&self);
    fn notify_misaligned(&self);
    fn notify_tx_error(&self, err: TxError);
}

pub trait FuelGauge {
    fn input_current_ma(&self) -> u16;
    fn bypass_voltage_mv(&self) -> u16;
    fn reset_capacity(&self);
}

/// Everything the charger talks to, as one bound.
pub trait Collaborators: BatteryManager + WirelessPower + FuelGauge {}

impl<T: BatteryManager + WirelessPower + FuelGauge> Collaborators for T {}

/// Latest values from the other drivers, pushed in by the board.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SupplySnapshot {
    pub capacity_percent: u8,
    pub health: Health,
    pub hv_pdo: bool,
    pub wireless_fw_updating: bool,
    pub wireless_tx_requested: bool,
    pub wireless_online: bool,
    pub wireless_energy: bool,
    pub input_current_ma: u16,
    pub bypass_voltage_mv: u16,
}

/// Collaborators backed by a snapshot for queries and a PubSubChannel for
/// notifications.
pub struct ChannelSupplies<'a> {
    events: &'a ChargerEventChannel,
    snapshot: Shared<SupplySnapshot>,
}

impl<'a> ChannelSupplies<'a> {
    pub fn new(events: &'a ChargerEventChannel) -> Self {
        Self { events, snapshot: Shared::new(SupplySnapshot::default()) }
    }

    pub fn update(&self, f: impl FnOnce(&mut SupplySnapshot)) {
        self.snapshot.update(f)
    }

    pub fn snapshot(&self) -> SupplySnapshot {
        self.snapshot.get()
    }

    fn emit(&self, event: ChargerEvent) {
        // Oldest event is dropped if no subscriber keeps up.
        self.events.immediate_publisher().publish_immediate(event);
    }
}

impl BatteryManager for ChannelSupplies<'_> {
    fn capacity_percent(&self) -> u8 {
        self.snapshot.get().capacity_percent
    }
    fn health(&self) -> Health {
        self.snapshot.get().health
    }
    fn hv_pdo_active(&self) -> bool {
        self.snapshot.get().hv_pdo
    }
    fn wireless_fw_updating(&self) -> bool {
        self.snapshot.get().wireless_fw_updating
    }
    fn wireless_tx_requested(&self) -> bool {
        self.snapshot.get().wireless_tx_requested
    }
    fn notify_aicl_current(&self, ma: u16) {
        self.emit(ChargerEvent::AiclCurrent(ma))
    }
    fn notify_slow_charging(&self) {
        self.emit(ChargerEvent::SlowCharging)
    }
    fn notify_presence(&self, present: bool) {
        self.emit(ChargerEvent::BatteryPresence(present))
    }
    fn notify_sysovlo(&self) {
        self.emit(ChargerEvent::SystemOvervoltage)
    }
    fn notify_otg_overcurrent(&self) {
        self.emit(ChargerEvent::OtgOvercurrent)
    }
    fn set_dpm_event(&self, active: bool) {
        self.emit(ChargerEvent::DpmEvent(active))
    }
    fn set_thermal_control(&self, enabled: bool) {
        self.emit(ChargerEvent::ThermalControl(enabled))
    }
    fn set_qbat_switch(&self, on: bool) {
        self.emit(ChargerEvent::QbatSwitch(on))
    }
}

impl WirelessPower for ChannelSupplies<'_> {
    fn is_online(&self) -> bool {
        self.snapshot.get().wireless_online
    }
    fn energy_present(&self) -> bool {
        self.snapshot.get().wireless_energy
    }
    fn set_headroom(&self, headroom: Headroom) {
        self.emit(ChargerEvent::Headroom(headroom))
    }
    fn set_otg_control(&self, enabled: bool) {
        self.emit(ChargerEvent::WirelessOtgControl(enabled))
    }
    fn request_vout_5v(&self) {
        self.emit(ChargerEvent::WirelessVout5v)
    }
    fn notify_misaligned(&self) {
        self.emit(ChargerEvent::Misaligned)
    }
    fn notify_tx_error(&self, err: TxError) {
        self.emit(ChargerEvent::TxError(err))
    }
}

impl FuelGauge for ChannelSupplies<'_> {
    fn input_current_ma(&self) -> u16 {
        self.snapshot.get().input_current_ma
    }
    fn bypass_voltage_mv(&self) -> u16 {
        self.snapshot.get().bypass_voltage_mv
    }
    fn reset_capacity(&self) {
        self.emit(ChargerEvent::FuelGaugeReset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::pubsub::PubSubChannel;

    #[test]
    fn notifications_reach_subscribers() {
        let channel: ChargerEventChannel = PubSubChannel::new();
        let mut sub = channel.subscriber().unwrap();
        let supplies = ChannelSupplies::new(&channel);

        supplies.notify_aicl_current(700);
        supplies.notify_tx_error(TxError::Ocp);

        assert_eq!(sub.try_next_message_pure(), Some(ChargerEvent::AiclCurrent(700)));
        assert_eq!(sub.try_next_message_pure(), Some(ChargerEvent::TxError(TxError::Ocp)));
        assert_eq!(sub.try_next_message_pure(), None);
    }

    #[test]
    fn queries_read_the_snapshot() {
        let channel: ChargerEventChannel = PubSubChannel::new();
        let supplies = ChannelSupplies::new(&channel);
        supplies.update(|s| {
            s.capacity_percent = 85;
            s.wireless_online = true;
        });
        assert_eq!(supplies.capacity_percent(), 85);
        assert!(WirelessPower::is_online(&supplies));
        assert!(!supplies.hv_pdo_active());
    }
}
