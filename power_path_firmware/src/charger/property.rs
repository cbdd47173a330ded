//! Property-style get/set surface used by the battery manager and the OTG
//! consumer.

use super::collab::Collaborators;
use super::device::{Charger, Result};
use super::mode::ModeIntent;
use super::port::RegisterPort;
use super::regs::*;
use super::types::*;

/// Upper bound accepted for any current value.
const MAX_PROP_MA: i32 = 10_000;
/// Upper bound accepted for any voltage value.
const MAX_PROP_MV: i32 = 20_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargerProperty {
    /// Get: cable seen by the input comparators. Set: cable attach/detach.
    Online,
    /// Get: charger status. Set: status override, `Unknown` clears it.
    Status,
    Health,
    ChargeType,
    Present,
    InputCurrentLimit,
    ConstantChargeCurrent,
    ConstantChargeVoltage,
    /// Charge current applied once the wireless input has settled.
    WirelessChargeCurrent,
    TopoffCurrent,
    ChargingEnabled,
    OtgControl,
    UnoControl,
    UnoIout,
    UnoVout,
    ShipMode,
    AutoShipMode,
    FgSrc,
    AiclCurrent,
    /// Set only: re-enable the AICL fault interrupt.
    RearmAicl,
    /// Set only: input surge seen by the battery manager.
    Surge,
    /// Set only: force the wired input selection.
    ChgInSel,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OtgProperty {
    Online,
    /// 1.5 A OTG instead of 900 mA.
    HighPower,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PropVal {
    Int(i32),
    Bool(bool),
    Cable(CableType),
    Status(ChargerStatus),
    Health(Health),
    ChargeType(ChargeType),
    Intent(ModeIntent),
    Uno(UnoControl),
    Ship(ShipMode),
}

fn in_range<E>(val: PropVal, max: i32) -> Result<u16, E> {
    match val {
        PropVal::Int(v) if (0..=max).contains(&v) => Ok(v as u16),
        _ => Err(Error::InvalidInput),
    }
}

fn flag<E>(val: PropVal) -> Result<bool, E> {
    match val {
        PropVal::Bool(b) => Ok(b),
        PropVal::Int(0) => Ok(false),
        PropVal::Int(1) => Ok(true),
        _ => Err(Error::InvalidInput),
    }
}

/// A property write that passed validation.
#[derive(Copy, Clone, Debug)]
enum Request {
    Cable(CableType),
    /// `None` clears the override.
    Status(Option<ChargerStatus>),
    InputCurrent(u16),
    ChargeCurrent(u16),
    FloatVoltage(u16),
    WirelessChargeCurrent(u16),
    Topoff(u16),
    Charging(ModeIntent),
    Otg(bool),
    Uno(UnoControl),
    UnoIout(u16),
    UnoVout(u16),
    Ship(ShipMode),
    AutoShip(bool),
    FgSrc(bool),
    RearmAicl,
    Surge,
    ChgInSel(bool),
}

impl Request {
    fn parse<E>(prop: ChargerProperty, val: PropVal) -> Result<Self, E> {
        use ChargerProperty as C;
        Ok(match (prop, val) {
            (C::Health | C::ChargeType | C::Present | C::AiclCurrent, _) => return Err(Error::Unsupported),
            (C::Online, PropVal::Cable(cable)) => Request::Cable(cable),
            (C::Status, PropVal::Status(ChargerStatus::Unknown)) => Request::Status(None),
            (C::Status, PropVal::Status(status)) => Request::Status(Some(status)),
            (C::InputCurrentLimit, v) => Request::InputCurrent(in_range::<E>(v, MAX_PROP_MA)?),
            (C::ConstantChargeCurrent, v) => Request::ChargeCurrent(in_range::<E>(v, MAX_PROP_MA)?),
            (C::ConstantChargeVoltage, v) => Request::FloatVoltage(in_range::<E>(v, MAX_PROP_MV)?),
            (C::WirelessChargeCurrent, v) => Request::WirelessChargeCurrent(in_range::<E>(v, MAX_PROP_MA)?),
            (C::TopoffCurrent, v) => Request::Topoff(in_range::<E>(v, MAX_PROP_MA)?),
            (C::ChargingEnabled, PropVal::Intent(intent)) if intent.is_charge_control() => {
                Request::Charging(intent)
            }
            (C::OtgControl, v) => Request::Otg(flag::<E>(v)?),
            (C::UnoControl, PropVal::Uno(control)) => Request::Uno(control),
            (C::UnoControl, v) => Request::Uno(if flag::<E>(v)? { UnoControl::On } else { UnoControl::Off }),
            (C::UnoIout, v) => Request::UnoIout(in_range::<E>(v, MAX_PROP_MA)?),
            (C::UnoVout, v) => Request::UnoVout(in_range::<E>(v, MAX_PROP_MV)?),
            (C::ShipMode, PropVal::Ship(mode)) => Request::Ship(mode),
            (C::AutoShipMode, v) => Request::AutoShip(flag::<E>(v)?),
            (C::FgSrc, v) => Request::FgSrc(flag::<E>(v)?),
            (C::RearmAicl, _) => Request::RearmAicl,
            (C::Surge, _) => Request::Surge,
            (C::ChgInSel, v) => Request::ChgInSel(flag::<E>(v)?),
            _ => return Err(Error::InvalidInput),
        })
    }
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    pub async fn get_property(&self, prop: ChargerProperty) -> Result<PropVal, P::Error> {
        use ChargerProperty as C;
        Ok(match prop {
            C::Online => PropVal::Cable(self.get_online().await?),
            C::Status => PropVal::Status(self.get_status().await?),
            C::Health => PropVal::Health(self.check_health().await?),
            C::ChargeType => PropVal::ChargeType(self.charge_type().await),
            C::Present => PropVal::Bool(self.battery_present()),
            C::InputCurrentLimit => PropVal::Int(self.get_input_current_limit().await? as i32),
            C::ConstantChargeCurrent => PropVal::Int(self.get_charge_current().await? as i32),
            C::ConstantChargeVoltage => PropVal::Int(self.get_float_voltage().await? as i32),
            C::WirelessChargeCurrent => PropVal::Int(self.cable().charging_current_ma as i32),
            C::ChargingEnabled => PropVal::Bool(self.mode_state().await.is_charging),
            C::OtgControl => PropVal::Bool(self.mode_state().await.otg_on),
            C::UnoControl => PropVal::Bool(self.mode_state().await.uno_on),
            C::UnoIout => PropVal::Int(self.get_uno_current().await? as i32),
            C::AiclCurrent => PropVal::Int(self.aicl_state().aicl_current_ma.unwrap_or(0) as i32),
            C::TopoffCurrent
            | C::UnoVout
            | C::ShipMode
            | C::AutoShipMode
            | C::FgSrc
            | C::RearmAicl
            | C::Surge
            | C::ChgInSel => return Err(Error::Unsupported),
        })
    }

    /// Apply a property write. The value is validated first, then the
    /// register lock is checked, then the write goes out.
    pub async fn set_property(&self, prop: ChargerProperty, val: PropVal) -> Result<(), P::Error> {
        let req = Request::parse::<P::Error>(prop, val)?;
        self.ensure_unlocked().await?;
        debug!("set_property {:?} = {:?}", prop, val);

        match req {
            Request::Cable(cable) => self.set_cable(cable).await,
            Request::Status(status) => {
                self.set_status_override(status);
                Ok(())
            }
            Request::InputCurrent(ma) => self.request_input_current(ma).await,
            Request::ChargeCurrent(ma) => self.set_charge_current(ma).await,
            Request::FloatVoltage(mv) => self.set_float_voltage(mv).await,
            Request::WirelessChargeCurrent(ma) => {
                self.set_wireless_charge_current(ma);
                Ok(())
            }
            Request::Topoff(ma) => self.set_topoff_current(ma).await,
            Request::Charging(intent) => self.set_charging_enabled(intent).await.map(|_| ()),
            Request::Otg(on) => self.set_otg(on).await,
            Request::Uno(control) => self.set_uno(control).await,
            Request::UnoIout(ma) => self.set_uno_current(ma).await,
            Request::UnoVout(mv) => self.set_uno_voltage(mv).await,
            Request::Ship(mode) => self.set_ship_mode(mode).await,
            Request::AutoShip(on) => self.set_auto_ship_mode(on).await,
            Request::FgSrc(on) => self.set_fgsrc(on).await,
            Request::RearmAicl => self.rearm_aicl().await,
            // The lock check above is all a surge needs.
            Request::Surge => Ok(()),
            Request::ChgInSel(wired) => {
                self.update(REG_CNFG_12, if wired { CHGINSEL } else { 0 }, CHGINSEL).await
            }
        }
    }

    pub async fn get_otg_property(&self, prop: OtgProperty) -> Result<PropVal, P::Error> {
        let st = self.mode_state().await;
        Ok(match prop {
            OtgProperty::Online => PropVal::Bool(st.otg_on),
            OtgProperty::HighPower => PropVal::Bool(st.hp_otg),
        })
    }

    pub async fn set_otg_property(&self, prop: OtgProperty, val: PropVal) -> Result<(), P::Error> {
        let on = flag::<P::Error>(val)?;
        self.ensure_unlocked().await?;
        match prop {
            OtgProperty::Online => self.set_otg(on).await,
            OtgProperty::HighPower => self.set_hp_otg(on).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::mock::fixture;
    use crate::charger::mode::PowerPathMode;
    use embassy_futures::block_on;

    #[test]
    fn write_only_and_read_only_keys_are_unsupported() {
        let (charger, port, _) = fixture();
        port.clear_log();
        assert_eq!(block_on(charger.get_property(ChargerProperty::RearmAicl)), Err(Error::Unsupported));
        assert_eq!(
            block_on(charger.set_property(ChargerProperty::ChargeType, PropVal::Int(1))),
            Err(Error::Unsupported)
        );
        assert!(port.writes().is_empty());
    }

    #[test]
    fn bad_values_are_rejected_without_writes() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.clear_log();
        for v in [PropVal::Int(-1), PropVal::Int(70_000), PropVal::Bool(true)] {
            assert_eq!(
                block_on(charger.set_property(ChargerProperty::InputCurrentLimit, v)),
                Err(Error::InvalidInput)
            );
        }
        assert_eq!(
            block_on(charger.set_property(ChargerProperty::Online, PropVal::Int(1))),
            Err(Error::InvalidInput)
        );
        assert!(port.writes().is_empty());
    }

    #[test]
    fn wired_input_limit_is_written_directly() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        block_on(charger.set_property(ChargerProperty::InputCurrentLimit, PropVal::Int(1_500))).unwrap();
        assert_eq!(port.get(REG_CNFG_09) & CHGIN_ILIM_MASK, 59);
        assert_eq!(
            block_on(charger.get_property(ChargerProperty::InputCurrentLimit)),
            Ok(PropVal::Int(1_500))
        );
    }

    #[test]
    fn online_set_attaches_the_cable() {
        let (charger, _, _) = fixture();
        block_on(charger.set_property(ChargerProperty::Online, PropVal::Cable(CableType::Wired))).unwrap();
        assert_eq!(charger.cable().cable, CableType::Wired);
    }

    #[test]
    fn status_override_and_clear() {
        let (charger, port, _) = fixture();
        port.set(REG_DETAILS_01, 0x04);
        block_on(charger.set_property(ChargerProperty::Status, PropVal::Status(ChargerStatus::NotCharging)))
            .unwrap();
        assert_eq!(
            block_on(charger.get_property(ChargerProperty::Status)),
            Ok(PropVal::Status(ChargerStatus::NotCharging))
        );
        block_on(charger.set_property(ChargerProperty::Status, PropVal::Status(ChargerStatus::Unknown))).unwrap();
        assert_eq!(
            block_on(charger.get_property(ChargerProperty::Status)),
            Ok(PropVal::Status(ChargerStatus::Full))
        );
    }

    #[test]
    fn charging_enabled_takes_a_charge_intent() {
        let (charger, port, _) = fixture();
        block_on(async {
            charger.set_mode_for_test(PowerPathMode::Buck).await;
            charger
                .set_property(ChargerProperty::ChargingEnabled, PropVal::Intent(ModeIntent::ChargingOn))
                .await
                .unwrap();
            assert_eq!(
                charger
                    .set_property(ChargerProperty::ChargingEnabled, PropVal::Intent(ModeIntent::OtgOn))
                    .await,
                Err(Error::InvalidInput)
            );
        });
        assert_eq!(port.mode_writes(), [0x5]);
        assert_eq!(
            block_on(charger.get_property(ChargerProperty::ChargingEnabled)),
            Ok(PropVal::Bool(true))
        );
    }

    #[test]
    fn relocked_chip_is_reinitialized_before_a_set() {
        let (charger, port, _) = fixture();
        port.set(REG_CNFG_06, 0);
        block_on(charger.set_property(ChargerProperty::AutoShipMode, PropVal::Bool(true))).unwrap();
        assert_eq!(port.get(REG_CNFG_06) & CHGPROT_MASK, CHGPROT_UNLOCKED);
        assert_ne!(port.get(REG_CNFG_03) & AUTO_SHIP_MODE, 0);
    }

    #[test]
    fn invalid_set_on_relocked_chip_writes_nothing() {
        let (charger, port, _) = fixture();
        port.set(REG_CNFG_06, 0);
        port.clear_log();
        assert_eq!(
            block_on(charger.set_property(ChargerProperty::InputCurrentLimit, PropVal::Int(-1))),
            Err(Error::InvalidInput)
        );
        assert_eq!(
            block_on(charger.set_property(ChargerProperty::ChargingEnabled, PropVal::Bool(true))),
            Err(Error::InvalidInput)
        );
        assert_eq!(
            block_on(charger.set_property(ChargerProperty::ChargingEnabled, PropVal::Intent(ModeIntent::UnoOn))),
            Err(Error::InvalidInput)
        );
        assert!(port.writes().is_empty());
        assert_eq!(port.get(REG_CNFG_06) & CHGPROT_MASK, 0);
    }

    #[test]
    fn otg_property_drives_otg() {
        let (charger, port, _) = fixture();
        block_on(async {
            charger.set_mode_for_test(PowerPathMode::Buck).await;
            charger.set_otg_property(OtgProperty::HighPower, PropVal::Bool(true)).await.unwrap();
            charger.set_otg_property(OtgProperty::Online, PropVal::Int(1)).await.unwrap();
            assert_eq!(charger.get_otg_property(OtgProperty::Online).await, Ok(PropVal::Bool(true)));
        });
        assert_eq!(
            (port.get(REG_CNFG_02) & OTG_ILIM_MASK) >> OTG_ILIM_SHIFT,
            OtgCurrent::Ma1500 as u8
        );
        assert_eq!(
            block_on(charger.set_otg_property(OtgProperty::Online, PropVal::Int(5))),
            Err(Error::InvalidInput)
        );
    }

    #[test]
    fn chginsel_forces_wired_input() {
        let (charger, port, _) = fixture();
        block_on(charger.set_property(ChargerProperty::ChgInSel, PropVal::Bool(true))).unwrap();
        assert_ne!(port.get(REG_CNFG_12) & CHGINSEL, 0);
    }
}
