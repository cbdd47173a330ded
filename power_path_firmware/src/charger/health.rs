//! Health and fault monitor.

use embassy_time::Timer;

use super::collab::Collaborators;
use super::device::{Charger, Result};
use super::mode::{ModeIntent, PowerPathMode};
use super::port::RegisterPort;
use super::regs::*;
use super::types::{CableType, Health, SwitchingFrequency, VbusState};

/// Capacity at which the noise workaround moves to 3 MHz switching.
const NOISE_WA_CAPACITY: u8 = 80;

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    /// Input voltage state of the path `cable` draws from.
    pub async fn vbus_state(&self, cable: CableType) -> Result<VbusState, P::Error> {
        let d0 = self.read(REG_DETAILS_00).await?;
        let bits = if cable.is_wireless() {
            (d0 & WCIN_DTLS_MASK) >> WCIN_DTLS_SHIFT
        } else {
            (d0 & CHGIN_DTLS_MASK) >> CHGIN_DTLS_SHIFT
        };
        Ok(VbusState::from_bits(bits))
    }

    /// Health check, run on demand and from the monitor tick. Kicks the
    /// watchdog and re-initializes if it had already expired.
    pub async fn check_health(&self) -> Result<Health, P::Error> {
        self.kick_watchdog().await?;

        if self.config.enable_noise_wa {
            let fsw = if self.supplies.capacity_percent() >= NOISE_WA_CAPACITY {
                SwitchingFrequency::Mhz3
            } else {
                SwitchingFrequency::Mhz1_5
            };
            self.set_switching_frequency(fsw).await?;
        }

        let st = self.mode_state().await;
        let ctx = self.cable();
        let cable = ctx.cable;

        let d1 = self.read(REG_DETAILS_01).await?;
        let chg_dtls = d1 & CHG_DTLS_MASK;
        let wdt_expired = chg_dtls == CHG_DTLS_WDT_EXPIRED;
        let battery_health = self.supplies.health();
        let mut vbus = self.vbus_state(cable).await?;
        let cnfg00 = self.read(REG_CNFG_00).await?;

        // Charging stalled by the charger itself: cycle charging and restore
        // the float voltage.
        let mut abnormal = false;
        if st.is_charging && !st.uno_on && (chg_dtls == CHG_DTLS_OFF_BIT || chg_dtls == CHG_DTLS_WDT_EXPIRED) {
            warn!("health: abnormal CHG_DTLS 0x{:X} while charging", chg_dtls);
            self.dump_registers().await?;
            self.request_transition(ModeIntent::ChargingOff).await?;
            self.set_float_voltage(ctx.float_voltage_mv).await?;
            self.request_transition(ModeIntent::ChargingOn).await?;
            abnormal = true;
        }

        info!(
            "health: vbus={:?} chg_dtls=0x{:X} iin={}mA vbyp={}mV battery={:?} abnormal={}",
            vbus,
            chg_dtls,
            self.supplies.input_current_ma(),
            self.supplies.bypass_voltage_mv(),
            battery_health,
            abnormal
        );

        let buck_or_chg = cnfg00 & PowerPathMode::BuckChg.bits() != 0;
        let health = if vbus == VbusState::OverVoltage {
            let mut polls = 0;
            while polls < self.config.ovp_confirm_polls && vbus == VbusState::OverVoltage {
                Timer::after(self.config.ovp_confirm_interval).await;
                vbus = self.vbus_state(cable).await?;
                polls += 1;
            }
            if vbus == VbusState::OverVoltage {
                warn!("health: over-voltage after {} polls", polls);
                Health::OverVoltage
            } else {
                info!("health: transient over-voltage");
                Health::Good
            }
        } else if vbus.is_low() && chg_dtls & CHG_DTLS_OFF_BIT != 0 && buck_or_chg && !cable.is_wireless() {
            info!("health: vbus under-voltage");
            Health::UnderVoltage
        } else if battery_health == Health::UnderVoltage && vbus.is_low() && !cable.is_wireless() {
            Health::UnderVoltage
        } else if wdt_expired {
            error!("health: watchdog expired");
            Health::WatchdogTimerExpire
        } else {
            if cable.is_wireless() {
                self.count_misalignment(abnormal || vbus.is_low());
            }
            Health::Good
        };

        self.flags.update(|f| {
            f.health = health;
            f.vbus = vbus;
        });

        if health == Health::WatchdogTimerExpire {
            self.reinitialize().await?;
        }
        Ok(health)
    }

    fn count_misalignment(&self, invalid: bool) {
        let count = self.aicl.update(|a| {
            a.misalign_count = if invalid { a.misalign_count.saturating_add(1) } else { 0 };
            a.misalign_count
        });
        if count >= self.config.misalign_threshold {
            warn!("health: invalid WCIN, misaligned ({})", count);
            self.supplies.notify_misaligned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::mock::{fixture, fixture_with, Note};
    use crate::config::ChargerConfig;
    use embassy_futures::block_on;

    const CHGIN_VALID: u8 = 0b11 << CHGIN_DTLS_SHIFT;
    const CHGIN_OVP: u8 = 0b10 << CHGIN_DTLS_SHIFT;
    const WCIN_VALID: u8 = 0b11 << WCIN_DTLS_SHIFT;

    fn misaligned(notes: &[Note]) -> usize {
        notes.iter().filter(|n| **n == Note::Misaligned).count()
    }

    #[test]
    fn three_invalid_wireless_samples_flag_misalignment() {
        let (charger, _, supplies) = fixture();
        charger.set_cable_for_test(CableType::Wireless);
        for _ in 0..2 {
            assert_eq!(block_on(charger.check_health()), Ok(Health::Good));
        }
        assert_eq!(misaligned(&supplies.events()), 0);
        block_on(charger.check_health()).unwrap();
        assert_eq!(misaligned(&supplies.events()), 1);
    }

    #[test]
    fn valid_sample_resets_the_count() {
        let (charger, port, supplies) = fixture();
        charger.set_cable_for_test(CableType::Wireless);
        block_on(charger.check_health()).unwrap();
        block_on(charger.check_health()).unwrap();
        port.set(REG_DETAILS_00, WCIN_VALID);
        block_on(charger.check_health()).unwrap();
        assert_eq!(misaligned(&supplies.events()), 0);
        assert_eq!(charger.aicl_state().misalign_count, 0);
    }

    #[test]
    fn transient_overvoltage_is_rejected() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_DETAILS_00, CHGIN_VALID);
        port.script_reads(REG_DETAILS_00, &[CHGIN_OVP]);
        assert_eq!(block_on(charger.check_health()), Ok(Health::Good));
    }

    #[test]
    fn persistent_overvoltage_is_reported() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_DETAILS_00, CHGIN_OVP);
        assert_eq!(block_on(charger.check_health()), Ok(Health::OverVoltage));
        assert_eq!(charger.last_health(), Health::OverVoltage);
    }

    #[test]
    fn wired_uvlo_while_buck_charging() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_DETAILS_01, CHG_DTLS_OFF_BIT);
        port.set(REG_CNFG_00, PowerPathMode::BuckChg.bits());
        assert_eq!(block_on(charger.check_health()), Ok(Health::UnderVoltage));
    }

    #[test]
    fn watchdog_expiry_reinitializes() {
        let (charger, port, _) = fixture();
        port.set(REG_DETAILS_01, CHG_DTLS_WDT_EXPIRED);
        assert_eq!(block_on(charger.check_health()), Ok(Health::WatchdogTimerExpire));
        assert_ne!(port.get(REG_CNFG_09) & CHG_EN, 0);
        assert_ne!(port.get(REG_CNFG_00) & WDTEN, 0);
    }

    #[test]
    fn stalled_charging_is_cycled() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_DETAILS_00, CHGIN_VALID);
        port.set(REG_DETAILS_01, CHG_DTLS_OFF_BIT);
        block_on(charger.set_mode_for_test(PowerPathMode::BuckChg));
        port.clear_log();
        assert_eq!(block_on(charger.check_health()), Ok(Health::Good));
        assert_eq!(port.mode_writes(), [0x4, 0x5]);
    }

    #[test]
    fn noise_workaround_follows_capacity() {
        let cfg = ChargerConfig { enable_noise_wa: true, ..ChargerConfig::fast() };
        let (charger, port, supplies) = fixture_with(cfg);
        supplies.with(|s| s.capacity = 50);
        block_on(charger.check_health()).unwrap();
        assert_eq!(port.get(REG_CNFG_08) & FSW_MASK, SwitchingFrequency::Mhz1_5 as u8);
        supplies.with(|s| s.capacity = 90);
        block_on(charger.check_health()).unwrap();
        assert_eq!(port.get(REG_CNFG_08) & FSW_MASK, SwitchingFrequency::Mhz3 as u8);
    }
}
