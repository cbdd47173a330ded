//! Input/charge current limits and the other charge parameters.
//!
//! Register read-modify-writes of the current-limit fields run under the
//! current-limit lock, never under the mode lock.

use crate::config::{ChargerConfig, MIN_INPUT_CURRENT_MA, SLOW_CHARGING_CURRENT_MA};

use super::collab::Collaborators;
use super::device::{Charger, CurrentLimits, Result};
use super::port::RegisterPort;
use super::regs::*;
use super::types::CableType;

const INPUT_STEP_MA: u16 = 25;
const CHARGE_STEP_MA: u16 = 50;
const TOPOFF_BASE_MA: u16 = 150;
const TOPOFF_MAX_MA: u16 = 500;
const TOPOFF_STEP_MA: u16 = 50;

/// Input limit ceiling of the path `cable` draws from.
pub fn input_ceiling(cfg: &ChargerConfig, cable: CableType) -> u16 {
    if cable.is_wireless() {
        cfg.wireless_ceiling_ma
    } else {
        cfg.wired_ceiling_ma
    }
}

/// Register and field mask holding the input limit for `cable`.
fn input_field(cable: CableType) -> (u8, u8) {
    if cable.is_wireless() {
        (REG_CNFG_10, WCIN_ILIM_MASK)
    } else {
        (REG_CNFG_09, CHGIN_ILIM_MASK)
    }
}

/// 25 mA/step, offset by one step. Below 100 mA the field is written as off.
pub fn encode_input_limit(ma: u16, ceiling: u16) -> u8 {
    if ma < MIN_INPUT_CURRENT_MA {
        return 0;
    }
    (ma.min(ceiling) / INPUT_STEP_MA - 1) as u8
}

pub fn decode_input_limit(code: u8, field_max: u8, ceiling: u16) -> u16 {
    match code {
        0 => 0,
        1..=3 => MIN_INPUT_CURRENT_MA,
        c if c >= field_max => ceiling,
        c => (c as u16 + 1) * INPUT_STEP_MA,
    }
}

/// 50 mA/step, clamped to `max_ma` and to the field; below 100 mA charging
/// current is off.
pub fn encode_charge_current(ma: u16, max_ma: u16) -> u8 {
    if ma < 100 {
        return 0;
    }
    (ma.min(max_ma) / CHARGE_STEP_MA).min(CHG_CC_MASK as u16) as u8
}

pub fn decode_charge_current(code: u8) -> u16 {
    match code & CHG_CC_MASK {
        0 => 0,
        1..=2 => 100,
        c => c as u16 * CHARGE_STEP_MA,
    }
}

/// Piecewise float-voltage code: 50 mV steps up to 4.2 V, 10 mV above.
pub fn encode_float_voltage(mv: u16) -> u8 {
    match mv {
        0 => 0x13,
        3_800 => 0x38,
        3_900 => 0x39,
        v if v >= 4_500 => 0x23,
        v if v <= 4_200 => ((v.max(4_000) - 4_000) / 50) as u8,
        v => ((v - 4_200) / 10 + 4) as u8,
    }
}

pub fn decode_float_voltage(code: u8) -> u16 {
    match code & CHG_CV_PRM_MASK {
        0x39 => 3_900,
        0x38 => 3_800,
        0x23 => 4_500,
        c if c <= 0x04 => c as u16 * 50 + 4_000,
        c => (c as u16 - 4) * 10 + 4_200,
    }
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    /// Set the input limit of `cable`'s path. Returns the value programmed.
    pub async fn set_input_current_limit(&self, cable: CableType, ma: u16) -> Result<u16, P::Error> {
        let mut lim = self.limits.lock().await;
        self.set_input_current_locked(&mut lim, cable, ma).await
    }

    pub(crate) async fn set_input_current_locked(
        &self,
        lim: &mut CurrentLimits,
        cable: CableType,
        ma: u16,
    ) -> Result<u16, P::Error> {
        if self.config.factory_mode {
            info!("icl: factory mode, skip {} mA", ma);
            return self.get_input_current_limit_for(cable).await;
        }
        lim.dpm_last_icl_ma = ma;
        self.apply_input_limit_locked(lim, cable, ma).await
    }

    /// Input limit with the battery-absent floor applied.
    pub(crate) async fn apply_input_limit_locked(
        &self,
        lim: &mut CurrentLimits,
        cable: CableType,
        ma: u16,
    ) -> Result<u16, P::Error> {
        let mut ma = ma;
        if self.config.enable_dpm && !self.battery_present() && ma < self.config.dpm_icl_ma {
            ma = self.config.dpm_icl_ma;
            info!("icl: battery absent, raised to {} mA", ma);
        }
        self.write_input_limit(lim, cable, ma).await
    }

    pub(crate) async fn write_input_limit(
        &self,
        lim: &mut CurrentLimits,
        cable: CableType,
        ma: u16,
    ) -> Result<u16, P::Error> {
        let ceiling = input_ceiling(&self.config, cable);
        let (reg, mask) = input_field(cable);
        let code = encode_input_limit(ma, ceiling);
        self.update(reg, code, mask).await?;

        let applied = decode_input_limit(code, mask, ceiling);
        lim.input_ma = applied;
        if self.cable().cable == cable {
            self.cable.update(|c| c.input_current_ma = applied);
        }
        debug!("icl: reg 0x{:02X} code 0x{:02X} -> {} mA", reg, code, applied);
        Ok(applied)
    }

    /// Input limit of the attached cable's path.
    pub async fn get_input_current_limit(&self) -> Result<u16, P::Error> {
        self.get_input_current_limit_for(self.cable().cable).await
    }

    pub async fn get_input_current_limit_for(&self, cable: CableType) -> Result<u16, P::Error> {
        let (reg, mask) = input_field(cable);
        let code = self.read(reg).await? & mask;
        Ok(decode_input_limit(code, mask, input_ceiling(&self.config, cable)))
    }

    pub async fn set_charge_current(&self, ma: u16) -> Result<(), P::Error> {
        if self.config.factory_mode {
            info!("fcc: factory mode, skip {} mA", ma);
            return Ok(());
        }
        let mut lim = self.limits.lock().await;
        self.write_charge_current(&mut lim, ma).await
    }

    pub(crate) async fn write_charge_current(&self, lim: &mut CurrentLimits, ma: u16) -> Result<(), P::Error> {
        let code = encode_charge_current(ma, self.config.max_fcc_ma);
        self.update(REG_CNFG_02, code, CHG_CC_MASK).await?;
        lim.charge_ma = ma.min(self.config.max_fcc_ma);
        self.cable.update(|c| c.charging_current_ma = lim.charge_ma);
        debug!("fcc: code 0x{:02X} ({} mA)", code, lim.charge_ma);
        Ok(())
    }

    pub async fn get_charge_current(&self) -> Result<u16, P::Error> {
        Ok(decode_charge_current(self.read(REG_CNFG_02).await?))
    }

    /// Float (constant-voltage) target, clamped to the configured maximum.
    pub async fn set_float_voltage(&self, mv: u16) -> Result<(), P::Error> {
        let mv = if mv > self.config.float_voltage_mv {
            info!("float: {} mV clamped to {} mV", mv, self.config.float_voltage_mv);
            self.config.float_voltage_mv
        } else {
            mv
        };
        self.update(REG_CNFG_04, encode_float_voltage(mv), CHG_CV_PRM_MASK).await?;
        self.cable.update(|c| c.float_voltage_mv = mv);
        Ok(())
    }

    pub async fn get_float_voltage(&self) -> Result<u16, P::Error> {
        Ok(decode_float_voltage(self.read(REG_CNFG_04).await?))
    }

    /// Termination current, 150..=500 mA.
    pub async fn set_topoff_current(&self, ma: u16) -> Result<(), P::Error> {
        let ma = ma.clamp(TOPOFF_BASE_MA, TOPOFF_MAX_MA);
        let code = ((ma - TOPOFF_BASE_MA) / TOPOFF_STEP_MA) as u8;
        self.update(REG_CNFG_03, code, TO_ITH_MASK).await
    }

    pub async fn set_topoff_time(&self, minutes: u16) -> Result<(), P::Error> {
        let code = ((minutes / 10).min(7) as u8) << TO_TIME_SHIFT;
        self.update(REG_CNFG_03, code, TO_TIME_MASK).await
    }

    /// Mark the session as slow charging when the input limit is low.
    pub(crate) fn check_slow_charging(&self, input_ma: u16) {
        let ctx = self.cable();
        let slow = input_ma <= SLOW_CHARGING_CURRENT_MA && !ctx.cable.is_none();
        self.cable.update(|c| c.slow_charging = slow);
        if slow {
            info!("slow charging: {} mA on {:?}", input_ma, ctx.cable);
            self.supplies.notify_slow_charging();
        }
    }
}
