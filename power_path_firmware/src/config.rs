//! Compile-time knobs for the charger controller.
//! These are the defaults behind `ChargerConfig::default()`; boards override
//! fields on the struct instead of editing globals.
use embassy_time::Duration;

use crate::charger::types::SwitchingFrequency;

/// Input current ceilings per input path.
pub const WIRELESS_INPUT_CEILING_MA: u16 = 1_600;
pub const WIRED_INPUT_CEILING_MA: u16 = 3_200;

/// Below this the input limit register is written as "off".
pub const MIN_INPUT_CURRENT_MA: u16 = 100;

pub const MAX_FAST_CHARGE_CURRENT_MA: u16 = 3_150;
pub const FLOAT_VOLTAGE_MV: u16 = 4_350;

// AICL
pub const AICL_FLOOR_MA: u16 = 100;
pub const AICL_STEP_MA: u16 = 100;
pub const AICL_RECHECK_MS: u64 = 100;
/// Input limits at or below this mark the session as slow charging.
pub const SLOW_CHARGING_CURRENT_MA: u16 = 400;

// Wireless ramp
pub const WC_CURRENT_STEP_MA: u16 = 100;
pub const WC_CURRENT_START_MA: u16 = 500;
pub const WC_RAMP_INTERVAL_MS: u64 = 1_000;
pub const WC_RAMP_INTERVAL_FACTORY_MS: u64 = 250;
pub const WC_RAMP_INTERVAL_OTG_MS: u64 = 200;
pub const WC_HEADROOM_SETTLE_MS: u64 = 500; // coil voltage settle around a ramp
pub const WC_HEADROOM_MV: u16 = 270;

// Health
pub const OVP_CONFIRM_POLLS: u8 = 3;
pub const OVP_CONFIRM_INTERVAL_MS: u64 = 50;
pub const MISALIGN_THRESHOLD: u8 = 3;
pub const MONITOR_PERIOD_MS: u64 = 10_000;

// Register protection
pub const UNLOCK_RETRIES: u8 = 10;
pub const UNLOCK_RETRY_MS: u64 = 20;

/// Settle time in buck-only mode when switching between OTG and UNO.
pub const OTG_UNO_SETTLE_MS: u64 = 1;
pub const OUTPUT_OFF_SETTLE_MS: u64 = 50;

pub const DPM_INPUT_CURRENT_MA: u16 = 1_800;
pub const B2SOVRC_OCP_MA: u16 = 5_600;
pub const TOPOFF_TIME_MIN: u16 = 30;

/// Controller configuration, injected at construction.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChargerConfig {
    /// Factory line: keep charging/buck state as-is and skip DPM/AICL setup.
    pub factory_mode: bool,
    /// Factory single-input mode: leave CNFG_12 input selection alone.
    pub factory_siso: bool,
    /// Power-off charging: OTG requests are ignored.
    pub lp_charge: bool,
    /// Battery-absent operation (Q-battery switch and DPM input floor).
    pub enable_dpm: bool,
    pub enable_noise_wa: bool,
    /// Boost-voltage AICL: the AICL interrupt stays enabled for HV inputs.
    pub boosting_voltage_aicl: bool,
    pub enable_sysovlo_irq: bool,
    pub ship_mode_supported: bool,

    pub max_fcc_ma: u16,
    pub float_voltage_mv: u16,
    pub dpm_icl_ma: u16,
    pub wireless_ceiling_ma: u16,
    pub wired_ceiling_ma: u16,
    pub nv_wc_headroom_mv: u16,
    pub wc_current_step_ma: u16,
    pub b2sovrc_ocp_ma: u16,
    pub topoff_time_min: u16,
    pub fsw: SwitchingFrequency,

    pub aicl_floor_ma: u16,
    pub aicl_step_ma: u16,
    pub aicl_recheck: Duration,

    pub ramp_interval: Duration,
    pub ramp_interval_factory: Duration,
    pub ramp_interval_otg: Duration,
    pub headroom_settle: Duration,

    pub ovp_confirm_polls: u8,
    pub ovp_confirm_interval: Duration,
    pub misalign_threshold: u8,
    pub unlock_retries: u8,
    pub unlock_retry_delay: Duration,
    pub otg_uno_settle: Duration,
    pub output_off_settle: Duration,
    pub monitor_period: Duration,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            factory_mode: false,
            factory_siso: false,
            lp_charge: false,
            enable_dpm: false,
            enable_noise_wa: false,
            boosting_voltage_aicl: false,
            enable_sysovlo_irq: false,
            ship_mode_supported: true,

            max_fcc_ma: MAX_FAST_CHARGE_CURRENT_MA,
            float_voltage_mv: FLOAT_VOLTAGE_MV,
            dpm_icl_ma: DPM_INPUT_CURRENT_MA,
            wireless_ceiling_ma: WIRELESS_INPUT_CEILING_MA,
            wired_ceiling_ma: WIRED_INPUT_CEILING_MA,
            nv_wc_headroom_mv: WC_HEADROOM_MV,
            wc_current_step_ma: WC_CURRENT_STEP_MA,
            b2sovrc_ocp_ma: B2SOVRC_OCP_MA,
            topoff_time_min: TOPOFF_TIME_MIN,
            fsw: SwitchingFrequency::Mhz1_5,

            aicl_floor_ma: AICL_FLOOR_MA,
            aicl_step_ma: AICL_STEP_MA,
            aicl_recheck: Duration::from_millis(AICL_RECHECK_MS),

            ramp_interval: Duration::from_millis(WC_RAMP_INTERVAL_MS),
            ramp_interval_factory: Duration::from_millis(WC_RAMP_INTERVAL_FACTORY_MS),
            ramp_interval_otg: Duration::from_millis(WC_RAMP_INTERVAL_OTG_MS),
            headroom_settle: Duration::from_millis(WC_HEADROOM_SETTLE_MS),

            ovp_confirm_polls: OVP_CONFIRM_POLLS,
            ovp_confirm_interval: Duration::from_millis(OVP_CONFIRM_INTERVAL_MS),
            misalign_threshold: MISALIGN_THRESHOLD,
            unlock_retries: UNLOCK_RETRIES,
            unlock_retry_delay: Duration::from_millis(UNLOCK_RETRY_MS),
            otg_uno_settle: Duration::from_millis(OTG_UNO_SETTLE_MS),
            output_off_settle: Duration::from_millis(OUTPUT_OFF_SETTLE_MS),
            monitor_period: Duration::from_millis(MONITOR_PERIOD_MS),
        }
    }
}

impl ChargerConfig {
    /// Interval between wireless ramp steps.
    pub fn ramp_step_interval(&self, otg_on: bool) -> Duration {
        if otg_on {
            self.ramp_interval_otg
        } else if self.factory_mode {
            self.ramp_interval_factory
        } else {
            self.ramp_interval
        }
    }

    /// A configuration with every pacing delay shortened, for host tests.
    #[cfg(test)]
    pub fn fast() -> Self {
        let ms = Duration::from_millis(1);
        Self {
            aicl_recheck: ms,
            ramp_interval: ms,
            ramp_interval_factory: ms,
            ramp_interval_otg: ms,
            headroom_settle: ms,
            ovp_confirm_interval: ms,
            unlock_retry_delay: ms,
            otg_uno_settle: ms,
            output_off_settle: ms,
            monitor_period: Duration::from_millis(5),
            ..Self::default()
        }
    }
}
