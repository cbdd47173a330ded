//! Wireless input current ramp.
//!
//! Abrupt changes of the wireless input limit can drop the coil link, so the
//! limit is walked toward the target one step per tick. A new request always
//! supersedes the running ramp.

use embassy_time::{Duration, Timer};

use crate::config::WC_CURRENT_START_MA;

use super::collab::Collaborators;
use super::device::{Charger, Result};
use super::port::RegisterPort;
use super::regs::*;
use super::types::Headroom;
use super::work::Ticket;

/// Guarded by the ramp lock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampState {
    pub present_ma: u16,
    pub target_ma: u16,
    pub step_ma: u16,
}

impl RampState {
    pub const fn new(start_ma: u16, step_ma: u16) -> Self {
        Self { present_ma: start_ma, target_ma: start_ma, step_ma }
    }

    /// Next limit on the way to the target, at most one step away.
    pub fn next_step(&self) -> u16 {
        let step = self.step_ma as i32;
        let diff = (self.present_ma as i32 - self.target_ma as i32).clamp(-step, step);
        (self.present_ma as i32 - diff) as u16
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RampStep {
    /// Limit moved to this value; next tick armed.
    Stepped(u16),
    /// Target reached, charge current applied and headroom restored.
    Settled,
    /// Cable is no longer wireless; wireless limit back to default.
    Reset,
    /// Superseded by a newer request.
    Stale,
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    /// Start a ramp of the wireless input limit toward `target_ma`.
    pub async fn request_wireless_current(&self, target_ma: u16) -> Result<(), P::Error> {
        self.charge_work.cancel();

        let cable = self.cable().cable;
        if cable.is_wireless() && !self.ramp_work.is_busy() {
            // Extra rectifier headroom while the limit moves.
            let headroom = if cable.is_hv_wireless() {
                Headroom::HV_RAMP
            } else {
                Headroom(self.config.nv_wc_headroom_mv)
            };
            self.supplies.set_headroom(headroom);
            Timer::after(self.config.headroom_settle).await;
        }

        // The step worker writes the limit under the ramp lock, so the
        // starting point is read under it too.
        let mut r = self.ramp.lock().await;
        if cable.is_wireless() {
            let present = self.get_input_current_limit_for(cable).await?;
            if target_ma > present {
                self.set_charge_current(self.cable().charging_current_ma).await?;
            }
            r.present_ma = present;
        }
        r.target_ma = target_ma;
        info!("ramp: {} -> {} mA ({:?})", r.present_ma, target_ma, cable);
        self.ramp_work.schedule(Duration::from_ticks(0));
        Ok(())
    }

    /// Input-limit request from the battery manager: ramped on the wireless
    /// path, direct otherwise.
    pub async fn request_input_current(&self, ma: u16) -> Result<(), P::Error> {
        if self.aicl_work.is_pending() {
            self.aicl_work.cancel();
            self.aicl.update(|a| a.aicl_current_ma = None);
            self.aicl_work.schedule(self.config.aicl_recheck);
        }
        let cable = self.cable().cable;
        if cable.is_wireless() || cable.is_none() {
            self.request_wireless_current(ma).await?;
        }
        if !cable.is_wireless() {
            self.set_input_current_limit(cable, ma).await?;
        }
        self.cable.update(|c| c.input_current_ma = ma);
        Ok(())
    }

    /// One ramp tick, run from the ramp work item.
    pub async fn ramp_tick(&self, ticket: Ticket) -> Result<RampStep, P::Error> {
        let otg_on = self.mode.lock().await.otg_on;
        let cable = self.cable().cable;

        let mut r = self.ramp.lock().await;
        if !self.ramp_work.is_current(ticket) {
            return Ok(RampStep::Stale);
        }

        if !cable.is_wireless() {
            r.present_ma = WC_CURRENT_START_MA;
            let _lim = self.limits.lock().await;
            self.write(REG_CNFG_10, WC_DEFAULT_ILIM_CODE).await?;
            debug!("ramp: not wireless, WCIN limit reset");
            return Ok(RampStep::Reset);
        }

        if r.present_ma == r.target_ma {
            drop(r);
            self.set_charge_current(self.cable().charging_current_ma).await?;
            // Coil voltage settles with every lock released.
            Timer::after(self.config.headroom_settle).await;
            if !self.ramp_work.is_current(ticket) {
                return Ok(RampStep::Stale);
            }
            self.supplies.set_headroom(Headroom::NOMINAL);
            info!("ramp: settled");
            return Ok(RampStep::Settled);
        }

        let next = r.next_step();
        {
            let mut lim = self.limits.lock().await;
            self.set_input_current_locked(&mut lim, cable, next).await?;
        }
        r.present_ma = next;
        debug!("ramp: step to {} mA (target {})", next, r.target_ma);
        self.ramp_work.reschedule(ticket, self.config.ramp_step_interval(otg_on));
        Ok(RampStep::Stepped(next))
    }

    /// Cancel the ramp and put the wireless limit back to its default.
    pub(crate) async fn stop_wireless_ramp(&self) -> Result<(), P::Error> {
        let mut r = self.ramp.lock().await;
        self.ramp_work.cancel();
        r.present_ma = WC_CURRENT_START_MA;
        r.target_ma = WC_CURRENT_START_MA;
        let _lim = self.limits.lock().await;
        self.write(REG_CNFG_10, WC_DEFAULT_ILIM_CODE).await
    }

    /// Charge current to apply once the wireless input has settled.
    pub fn set_wireless_charge_current(&self, ma: u16) {
        self.cable.update(|c| c.charging_current_ma = ma);
        self.charge_work.schedule(Duration::from_ticks(0));
    }

    /// Charge-current settle tick, run from the charge work item.
    pub async fn charge_current_tick(&self, ticket: Ticket) -> Result<(), P::Error> {
        if !self.charge_work.is_current(ticket) {
            return Ok(());
        }
        self.set_charge_current(self.cable().charging_current_ma).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::current::decode_input_limit;
    use crate::charger::mock::{fixture, fixture_with, Note};
    use crate::charger::types::CableType;
    use crate::config::ChargerConfig;
    use embassy_futures::block_on;

    fn run_ramp<P: RegisterPort, S: Collaborators>(charger: &Charger<P, S>) -> RampStep {
        block_on(async {
            loop {
                let t = charger.ramp_work.next().await;
                let step = charger.ramp_tick(t).await.unwrap();
                charger.ramp_work.done(t);
                if !matches!(step, RampStep::Stepped(_)) {
                    return step;
                }
            }
        })
    }

    #[test]
    fn step_is_clamped_both_ways() {
        let up = RampState { present_ma: 400, target_ma: 1_200, step_ma: 200 };
        assert_eq!(up.next_step(), 600);
        let down = RampState { present_ma: 1_200, target_ma: 1_100, step_ma: 200 };
        assert_eq!(down.next_step(), 1_100);
    }

    #[test]
    fn ramp_up_writes_each_step_then_restores_headroom() {
        let cfg = ChargerConfig { wc_current_step_ma: 200, ..ChargerConfig::fast() };
        let (charger, port, supplies) = fixture_with(cfg);
        charger.set_cable_for_test(CableType::Wireless);
        port.set(REG_CNFG_10, 15); // 400 mA
        port.clear_log();

        block_on(charger.request_wireless_current(1_200)).unwrap();
        assert_eq!(run_ramp(&charger), RampStep::Settled);

        let steps: Vec<u16> = port
            .writes_to(REG_CNFG_10)
            .iter()
            .map(|v| decode_input_limit(v & WCIN_ILIM_MASK, WCIN_ILIM_MASK, 1_600))
            .collect();
        assert_eq!(steps, [600, 800, 1_000, 1_200]);

        let events = supplies.events();
        assert_eq!(events.first(), Some(&Note::Headroom(Headroom(270))));
        assert_eq!(events.last(), Some(&Note::Headroom(Headroom::NOMINAL)));
        assert!(!charger.ramp_work.is_busy());
    }

    #[test]
    fn hv_wireless_uses_ramp_headroom() {
        let (charger, port, supplies) = fixture();
        charger.set_cable_for_test(CableType::HvWireless);
        port.set(REG_CNFG_10, 19);
        block_on(charger.request_wireless_current(700)).unwrap();
        assert_eq!(supplies.events().first(), Some(&Note::Headroom(Headroom::HV_RAMP)));
    }

    #[test]
    fn new_request_supersedes_running_ramp() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wireless);
        port.set(REG_CNFG_10, 19); // 500 mA
        block_on(async {
            charger.request_wireless_current(1_000).await.unwrap();
            let old = charger.ramp_work.next().await;
            assert_eq!(charger.ramp_tick(old).await.unwrap(), RampStep::Stepped(600));
            charger.ramp_work.done(old);

            charger.request_wireless_current(500).await.unwrap();
            assert_eq!(charger.ramp_tick(old).await.unwrap(), RampStep::Stale);
            assert_eq!(charger.ramp.lock().await.target_ma, 500);
        });
        assert_eq!(run_ramp(&charger), RampStep::Settled);
        assert_eq!(port.get(REG_CNFG_10) & WCIN_ILIM_MASK, 19);
    }

    #[test]
    fn request_starts_from_limit_left_by_inflight_step() {
        let (charger, port, _) = fixture_with(ChargerConfig::fast());
        charger.set_cable_for_test(CableType::Wireless);
        port.set(REG_CNFG_10, 19); // 500 mA
        block_on(async {
            let step = async {
                let mut r = charger.ramp.lock().await;
                Timer::after(Duration::from_millis(20)).await;
                port.set(REG_CNFG_10, 23);
                r.present_ma = 600;
            };
            let (_, res) = embassy_futures::join::join(step, charger.request_wireless_current(1_000)).await;
            res.unwrap();
            let present = charger.get_input_current_limit_for(CableType::Wireless).await.unwrap();
            assert_ne!(present, 500);
            assert_eq!(charger.ramp.lock().await.present_ma, present);
        });
    }

    #[test]
    fn leaving_wireless_resets_the_limit() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        block_on(charger.request_wireless_current(900)).unwrap();
        assert_eq!(run_ramp(&charger), RampStep::Reset);
        assert_eq!(port.get(REG_CNFG_10), WC_DEFAULT_ILIM_CODE);
        assert_eq!(block_on(charger.ramp.lock()).present_ma, WC_CURRENT_START_MA);
    }

    #[test]
    fn wireless_charge_current_is_applied_later() {
        let (charger, port, _) = fixture();
        charger.set_wireless_charge_current(800);
        assert!(charger.charge_work.is_pending());
        block_on(async {
            let t = charger.charge_work.next().await;
            charger.charge_current_tick(t).await.unwrap();
            charger.charge_work.done(t);
        });
        assert_eq!(port.get(REG_CNFG_02) & CHG_CC_MASK, 16);
    }
}
