//! Adaptive input current limit loop.
//!
//! An input-current fault (the source voltage collapsing under load) walks
//! the input limit down one step per recheck until the fault clears or the
//! floor is reached. The reduced value is latched for the rest of the
//! attach session.

use super::collab::Collaborators;
use super::device::{Charger, Result};
use super::port::RegisterPort;
use super::regs::*;
use super::work::Ticket;
use crate::charger::current::input_ceiling;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AiclPhase {
    #[default]
    Normal,
    Reducing,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AiclState {
    pub phase: AiclPhase,
    /// Last reduced limit of this attach session.
    pub aicl_current_ma: Option<u16>,
    pub irq_enabled: bool,
    /// Consecutive invalid wireless-input samples.
    pub misalign_count: u8,
}

impl Default for AiclState {
    fn default() -> Self {
        Self { phase: AiclPhase::Normal, aicl_current_ma: None, irq_enabled: true, misalign_count: 0 }
    }
}

impl AiclState {
    /// Start of a new attach session.
    pub fn reset(&mut self) {
        self.phase = AiclPhase::Normal;
        self.aicl_current_ma = None;
        self.misalign_count = 0;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AiclOutcome {
    /// Not an AICL condition; nothing written.
    Skipped,
    /// Limit reduced and a recheck armed.
    Reduced(u16),
    /// Floor reached; the fault interrupt is now masked.
    Floor,
    /// Fault gone; carries the latched value if a reduction happened.
    Cleared(Option<u16>),
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    /// AICL fault interrupt. A check already armed keeps its deadline.
    pub fn on_aicl_fault(&self) {
        debug!("aicl: fault irq");
        self.aicl_work.queue(self.config.aicl_recheck);
    }

    /// Re-enable the fault interrupt and check right away if the fault is
    /// still asserted.
    pub async fn rearm_aicl(&self) -> Result<(), P::Error> {
        self.set_aicl_irq(true).await?;
        if self.read(REG_INT_OK).await? & AICL_I == 0 {
            self.aicl_work.queue(self.config.aicl_recheck);
        }
        Ok(())
    }

    /// One pass of the AICL loop, run from the AICL work item.
    pub async fn aicl_check(&self, ticket: Ticket) -> Result<AiclOutcome, P::Error> {
        let ctx = self.cable();
        let ramping_down = if ctx.cable.is_wireless() {
            let r = self.ramp.lock().await;
            r.present_ma > r.target_ma
        } else {
            false
        };
        if ctx.cable.is_none()
            || ramping_down
            || !self.aicl.get().irq_enabled
            || self.supplies.hv_pdo_active()
        {
            debug!("aicl: skip ({:?})", ctx.cable);
            self.aicl.update(|a| a.aicl_current_ma = None);
            return Ok(AiclOutcome::Skipped);
        }

        self.ensure_unlocked().await?;
        let int_ok = self.read(REG_INT_OK).await?;
        if !self.aicl_work.is_current(ticket) {
            return Ok(AiclOutcome::Skipped);
        }

        if int_ok & AICL_I != 0 {
            let latched = self.aicl.update(|a| {
                a.phase = AiclPhase::Normal;
                a.aicl_current_ma
            });
            info!("aicl: fault cleared (INT_OK 0x{:02X}), latched {:?}", int_ok, latched);
            if let Some(ma) = latched {
                self.supplies.notify_aicl_current(ma);
            }
            return Ok(AiclOutcome::Cleared(latched));
        }

        // A ramp tick would fight the reduction.
        {
            let _ramp = self.ramp.lock().await;
            self.ramp_work.cancel();
        }

        let floor = self.config.aicl_floor_ma;
        let reduced = {
            let mut lim = self.limits.lock().await;
            let present = self.get_input_current_limit_for(ctx.cable).await?;
            if present <= floor {
                present
            } else {
                let ceiling = input_ceiling(&self.config, ctx.cable);
                let next = present.saturating_sub(self.config.aicl_step_ma).clamp(floor, ceiling);
                self.write_input_limit(&mut lim, ctx.cable, next).await?
            }
        };
        info!("aicl: input limit reduced to {} mA", reduced);
        self.aicl.update(|a| a.aicl_current_ma = Some(reduced));

        if !ctx.cable.is_wireless() {
            self.check_slow_charging(reduced);
        }

        if reduced <= floor {
            self.set_aicl_irq(false).await?;
            self.aicl.update(|a| a.phase = AiclPhase::Normal);
            self.supplies.notify_aicl_current(floor);
            Ok(AiclOutcome::Floor)
        } else {
            self.aicl.update(|a| a.phase = AiclPhase::Reducing);
            self.aicl_work.reschedule(ticket, self.config.aicl_recheck);
            Ok(AiclOutcome::Reduced(reduced))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charger::mock::{fixture, Note};
    use crate::charger::types::CableType;
    use embassy_futures::block_on;
    use embassy_time::Duration;

    fn tick<P: RegisterPort, S: Collaborators>(charger: &Charger<P, S>) -> Result<AiclOutcome, P::Error> {
        block_on(async {
            if !charger.aicl_work.is_pending() {
                charger.aicl_work.schedule(Duration::from_ticks(0));
            }
            let t = charger.aicl_work.next().await;
            let r = charger.aicl_check(t).await;
            charger.aicl_work.done(t);
            r
        })
    }

    #[test]
    fn fault_reduces_one_step_and_rearms() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_CNFG_09, 39); // 1000 mA
        port.set(REG_INT_OK, BATP_I);

        assert_eq!(tick(&charger), Ok(AiclOutcome::Reduced(900)));
        assert!(charger.aicl_work.is_pending());
        assert_eq!(charger.aicl_state().phase, AiclPhase::Reducing);
        assert_eq!(charger.aicl_state().aicl_current_ma, Some(900));
    }

    #[test]
    fn reduction_is_monotonic_and_stops_at_floor() {
        let (charger, port, supplies) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_CNFG_09, 19); // 500 mA
        port.set(REG_INT_OK, BATP_I);

        let mut last = 500;
        loop {
            match tick(&charger).unwrap() {
                AiclOutcome::Reduced(ma) => {
                    assert!(ma < last && ma >= 100);
                    last = ma;
                }
                AiclOutcome::Floor => break,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(!charger.aicl_work.is_pending());
        assert!(!charger.aicl_state().irq_enabled);
        assert_ne!(port.get(REG_INT_MASK) & AICL_I, 0);
        assert!(supplies.events().contains(&Note::AiclCurrent(100)));
        assert!(charger.cable().slow_charging);

        // Masked now: a late interrupt changes nothing.
        assert_eq!(tick(&charger), Ok(AiclOutcome::Skipped));
    }

    #[test]
    fn clearing_reports_latched_value() {
        let (charger, port, supplies) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_CNFG_09, 39);
        port.set(REG_INT_OK, BATP_I);
        assert_eq!(tick(&charger), Ok(AiclOutcome::Reduced(900)));

        port.set(REG_INT_OK, BATP_I | AICL_I);
        assert_eq!(tick(&charger), Ok(AiclOutcome::Cleared(Some(900))));
        assert!(!charger.aicl_work.is_pending());
        assert_eq!(supplies.events(), [Note::AiclCurrent(900)]);
        assert_eq!(charger.aicl_state().phase, AiclPhase::Normal);
    }

    #[test]
    fn no_cable_or_hv_pdo_is_skipped() {
        let (charger, port, supplies) = fixture();
        port.set(REG_INT_OK, BATP_I);
        port.clear_log();
        assert_eq!(tick(&charger), Ok(AiclOutcome::Skipped));

        charger.set_cable_for_test(CableType::Wired);
        supplies.with(|s| s.hv_pdo = true);
        assert_eq!(tick(&charger), Ok(AiclOutcome::Skipped));
        assert!(port.writes().is_empty());
        assert_eq!(charger.aicl_state().aicl_current_ma, None);
    }

    #[test]
    fn wireless_ramp_down_in_progress_is_skipped() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wireless);
        port.set(REG_INT_OK, BATP_I);
        block_on(async {
            let mut r = charger.ramp.lock().await;
            r.present_ma = 1_000;
            r.target_ma = 500;
        });
        port.clear_log();
        assert_eq!(tick(&charger), Ok(AiclOutcome::Skipped));
        assert!(port.writes().is_empty());
    }

    #[test]
    fn attach_resets_the_session() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_CNFG_09, 39);
        port.set(REG_INT_OK, BATP_I);
        tick(&charger).unwrap();

        block_on(charger.set_cable(CableType::Wired)).unwrap();
        let st = charger.aicl_state();
        assert_eq!(st.aicl_current_ma, None);
        assert_eq!(st.phase, AiclPhase::Normal);
        assert!(st.irq_enabled);
    }

    #[test]
    fn stale_ticket_exits_without_effect() {
        let (charger, port, _) = fixture();
        charger.set_cable_for_test(CableType::Wired);
        port.set(REG_CNFG_09, 39);
        port.set(REG_INT_OK, BATP_I);
        port.clear_log();
        let r = block_on(async {
            charger.aicl_work.schedule(Duration::from_ticks(0));
            let t = charger.aicl_work.next().await;
            charger.aicl_work.cancel();
            charger.aicl_check(t).await
        });
        assert_eq!(r, Ok(AiclOutcome::Skipped));
        assert!(port.writes().is_empty());
    }

    #[test]
    fn fault_irq_keeps_an_armed_check() {
        let (charger, _, _) = fixture();
        charger.on_aicl_fault();
        assert!(charger.aicl_work.is_pending());
        charger.on_aicl_fault();
        assert!(charger.aicl_work.is_pending());
    }
}
