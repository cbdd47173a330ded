//! Controller instance (async, owns the register port so it can live in a
//! static). Component logic lives in the sibling modules as further `impl`
//! blocks on `Charger`.

use core::result::Result as CoreResult;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;

use crate::config::{ChargerConfig, WC_CURRENT_START_MA};
use crate::shared_state::ChargerReadings;

use super::aicl::AiclState;
use super::collab::Collaborators;
use super::decode;
use super::mode::{ModeIntent, ModeState, PowerPathMode, Transition};
use super::port::RegisterPort;
use super::ramp::RampState;
use super::regs::*;
use super::types::*;
use super::work::{DelayedWork, Shared};

pub type Result<T, E> = CoreResult<T, Error<E>>;

/// What is attached and what was asked of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CableContext {
    pub cable: CableType,
    pub input_current_ma: u16,
    pub charging_current_ma: u16,
    pub float_voltage_mv: u16,
    pub slow_charging: bool,
}

/// Values last programmed into the current-limit fields. Guarded by the
/// current-limit lock together with the register read-modify-writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentLimits {
    pub input_ma: u16,
    pub charge_ma: u16,
    /// Input limit requested before a battery-absent floor was applied.
    pub dpm_last_icl_ma: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Flags {
    pub battery_present: bool,
    pub status_override: Option<ChargerStatus>,
    pub health: Health,
    pub vbus: VbusState,
}

/// Charger controller.
pub struct Charger<P: RegisterPort, S: Collaborators> {
    port: Mutex<CriticalSectionRawMutex, P>,
    pub(crate) supplies: S,
    pub(crate) config: ChargerConfig,

    // The three locks; never take one while holding another except
    // ramp -> current-limit.
    pub(crate) mode: Mutex<CriticalSectionRawMutex, ModeState>,
    pub(crate) limits: Mutex<CriticalSectionRawMutex, CurrentLimits>,
    pub(crate) ramp: Mutex<CriticalSectionRawMutex, RampState>,

    pub(crate) cable: Shared<CableContext>,
    pub(crate) aicl: Shared<AiclState>,
    pub(crate) flags: Shared<Flags>,

    pub(crate) aicl_work: DelayedWork,
    pub(crate) ramp_work: DelayedWork,
    pub(crate) charge_work: DelayedWork,
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    pub fn new(port: P, supplies: S, config: ChargerConfig) -> Self {
        Self {
            port: Mutex::new(port),
            supplies,
            config,
            mode: Mutex::new(ModeState::default()),
            limits: Mutex::new(CurrentLimits::default()),
            ramp: Mutex::new(RampState::new(WC_CURRENT_START_MA, config.wc_current_step_ma)),
            cable: Shared::new(CableContext {
                float_voltage_mv: config.float_voltage_mv,
                ..CableContext::default()
            }),
            aicl: Shared::new(AiclState::default()),
            flags: Shared::new(Flags {
                battery_present: true,
                status_override: None,
                health: Health::Good,
                vbus: VbusState::UnderVoltage,
            }),
            aicl_work: DelayedWork::new(),
            ramp_work: DelayedWork::new(),
            charge_work: DelayedWork::new(),
        }
    }

    pub fn config(&self) -> &ChargerConfig {
        &self.config
    }

    pub fn supplies(&self) -> &S {
        &self.supplies
    }

    // ------------------ Register helpers ------------------
    // The port lock is held for one operation only.

    pub(crate) async fn read(&self, reg: u8) -> Result<u8, P::Error> {
        let mut port = self.port.lock().await;
        Ok(port.read(reg).await?)
    }

    pub(crate) async fn write(&self, reg: u8, val: u8) -> Result<(), P::Error> {
        let mut port = self.port.lock().await;
        Ok(port.write(reg, val).await?)
    }

    pub(crate) async fn update(&self, reg: u8, val: u8, mask: u8) -> Result<(), P::Error> {
        let mut port = self.port.lock().await;
        Ok(port.update(reg, val, mask).await?)
    }

    // ------------------ State accessors ------------------

    pub fn battery_present(&self) -> bool {
        self.flags.get().battery_present
    }

    pub fn cable(&self) -> CableContext {
        self.cable.get()
    }

    pub fn aicl_state(&self) -> AiclState {
        self.aicl.get()
    }

    pub fn last_health(&self) -> Health {
        self.flags.get().health
    }

    // ------------------ Bring-up ------------------

    /// First bring-up: adopt the hardware mode and program every register.
    pub async fn initialize(&self) -> Result<(), P::Error> {
        let bits = self.read(REG_CNFG_00).await? & MODE_MASK;
        let mut mode = PowerPathMode::from_bits(bits);
        if mode.is_reserved() {
            warn!("init: reserved mode 0x{:02x} in hardware, forcing all-off", bits);
            self.write_mode(PowerPathMode::AllOff).await?;
            mode = PowerPathMode::AllOff;
        }
        {
            let mut st = self.mode.lock().await;
            st.mode = mode;
            st.is_charging = mode.charging();
            st.charge_mode = if mode.charging() { ModeIntent::ChargingOn } else { ModeIntent::ChargingOff };
            st.otg_on = mode.otg_active();
            st.uno_on = mode.uno_active();
        }
        info!("init: mode {:?}", mode);

        self.init_registers().await?;

        let cable = self.cable().cable;
        let input = self.get_input_current_limit_for(cable).await?;
        let charge = self.get_charge_current().await?;
        {
            let mut lim = self.limits.lock().await;
            lim.input_ma = input;
            lim.charge_ma = charge;
            lim.dpm_last_icl_ma = input;
        }
        self.cable.update(|c| {
            c.input_current_ma = input;
            c.charging_current_ma = charge;
        });

        self.dump_registers().await?;
        Ok(())
    }

    /// Recovery after a watchdog expiry or a re-engaged register lock:
    /// program every register again and restore the in-memory mode and
    /// limits instead of adopting whatever the hardware fell back to.
    pub async fn reinitialize(&self) -> Result<(), P::Error> {
        warn!("init: full re-initialization");
        self.init_registers().await?;
        {
            let st = self.mode.lock().await;
            self.write_mode(st.mode).await?;
        }
        let cable = self.cable().cable;
        let mut lim = self.limits.lock().await;
        let (input, charge) = (lim.input_ma, lim.charge_ma);
        self.write_input_limit(&mut lim, cable, input).await?;
        self.write_charge_current(&mut lim, charge).await?;
        Ok(())
    }

    async fn init_registers(&self) -> Result<(), P::Error> {
        let cfg = &self.config;

        // Unlock protected registers, slowest LX slope.
        self.update(
            REG_CNFG_06,
            CHGPROT_UNLOCKED | SLOWLX_SLOWEST,
            CHGPROT_MASK | SLOWLX_MASK,
        )
        .await?;
        if !cfg.factory_mode {
            self.update(REG_CNFG_06, 0, DIS_AICL).await?;
        }

        // Fast-charge timer off, restart off, recycle and prequal on.
        self.update(
            REG_CNFG_01,
            CHG_RSTRT_MASK | RECYCLE_EN | PQEN,
            FCHGTIME_MASK | CHG_RSTRT_MASK | RECYCLE_EN | PQEN,
        )
        .await?;

        self.update(REG_CNFG_02, (OtgCurrent::Ma900 as u8) << OTG_ILIM_SHIFT, OTG_ILIM_MASK).await?;
        self.set_uno_current(1_000).await?;
        self.set_b2sovrc(cfg.b2sovrc_ocp_ma).await?;

        self.set_topoff_current(150).await?;
        self.update(REG_CNFG_03, SYS_TRACK_DIS, SYS_TRACK_DIS).await?;
        self.set_topoff_time(cfg.topoff_time_min).await?;
        self.set_float_voltage(cfg.float_voltage_mv).await?;

        let int_ok = self.read(REG_INT_OK).await?;
        if !cfg.factory_siso {
            let vchgin = if int_ok & CHGIN_I != 0 { VCHGIN_REG_4600 } else { VCHGIN_REG_4500 };
            self.update(REG_CNFG_12, vchgin, VCHGIN_REG_MASK).await?;
        }
        self.update(REG_CNFG_07, FMBST, FMBST).await?;

        let present = int_ok & BATP_I != 0;
        self.flags.update(|f| f.battery_present = present);
        if cfg.enable_dpm {
            self.supplies.set_qbat_switch(present);
        }
        info!("init: battery {}", if present { "present" } else { "absent" });

        self.update(REG_CNFG_07, if cfg.factory_mode { FGSRC } else { 0 }, FGSRC).await?;

        if cfg.factory_mode {
            self.update(REG_CNFG_00, 0, WDTEN).await?;
        } else {
            self.update(REG_CNFG_00, WDTEN, WDTEN).await?;
            self.kick_watchdog().await?;
        }
        self.update(REG_CNFG_09, CHG_EN, CHG_EN).await?;

        // Bypass 5 V, switching frequency, skip mode auto.
        self.update(REG_CNFG_11, 0, VBYPSET_MASK).await?;
        self.set_switching_frequency(cfg.fsw).await?;
        self.update(REG_CNFG_12, 0, DISKIP).await?;

        self.update(REG_CNFG_07, 0, SHIP_MODE).await?;
        self.update(REG_CNFG_03, 0, AUTO_SHIP_MODE).await?;
        Ok(())
    }

    /// Check the register-protect field; if it re-engaged, unlock it and
    /// re-initialize. Returns whether a re-initialization ran.
    pub async fn ensure_unlocked(&self) -> Result<bool, P::Error> {
        let mut relocked = false;
        for attempt in 0..self.config.unlock_retries {
            let v = self.read(REG_CNFG_06).await?;
            if v & CHGPROT_MASK == CHGPROT_UNLOCKED {
                break;
            }
            warn!("unlock: CNFG_06=0x{:02x}, attempt {}", v, attempt);
            self.update(REG_CNFG_06, CHGPROT_UNLOCKED, CHGPROT_MASK).await?;
            relocked = true;
            Timer::after(self.config.unlock_retry_delay).await;
        }
        if relocked {
            self.reinitialize().await?;
        }
        Ok(relocked)
    }

    pub async fn kick_watchdog(&self) -> Result<(), P::Error> {
        self.update(REG_CNFG_06, WDTCLR, WDTCLR_MASK).await
    }

    pub async fn set_switching_frequency(&self, fsw: SwitchingFrequency) -> Result<(), P::Error> {
        self.update(REG_CNFG_08, fsw as u8, FSW_MASK).await
    }

    /// Battery-to-system overcurrent threshold; 0 disables it.
    pub async fn set_b2sovrc(&self, ocp_ma: u16) -> Result<(), P::Error> {
        let code = if ocp_ma == 0 {
            0
        } else {
            // 3.0 A at code 1, 250 mA/step
            (((ocp_ma.clamp(3_000, 6_500) - 3_000) / 250) + 1) as u8
        };
        self.update(REG_CNFG_05, code, B2SOVRC_MASK).await?;
        self.update(REG_CNFG_06, B2SOVRC_DTC, B2SOVRC_DTC).await
    }

    // ------------------ Attach / detach ------------------

    /// Cable attach or detach. Resets the AICL session.
    pub async fn set_cable(&self, cable: CableType) -> Result<(), P::Error> {
        let prev = self.cable().cable;
        info!("cable: {:?} -> {:?}", prev, cable);
        self.cable.update(|c| {
            c.cable = cable;
            c.slow_charging = false;
        });
        self.aicl.update(|a| a.reset());

        let input = self.get_input_current_limit_for(cable).await?;
        self.cable.update(|c| c.input_current_ma = input);

        if !self.config.factory_siso {
            let sel = if cable.is_wireless() { 0 } else { CHGINSEL };
            self.update(REG_CNFG_12, sel, CHGINSEL).await?;
        }

        let boosting = self.config.boosting_voltage_aicl;
        if boosting {
            self.set_aicl_irq(true).await?;
        }

        if cable.is_none() {
            self.stop_wireless_ramp().await?;
            self.update(REG_CNFG_12, VCHGIN_REG_4500, VCHGIN_REG_MASK).await?;
            if self.config.enable_sysovlo_irq {
                self.update(REG_PMIC_SYSTEM_INT_MASK, 0, SYSOVLO_IM).await?;
            }
            self.aicl_work.cancel();
            if !boosting {
                self.set_aicl_irq(true).await?;
            }
            return Ok(());
        }

        if !cable.is_wireless() {
            self.update(REG_CNFG_12, VCHGIN_REG_4600, VCHGIN_REG_MASK).await?;
        }
        if !boosting {
            if cable.is_hv_wired() || self.supplies.hv_pdo_active() {
                self.set_aicl_irq(false).await?;
                self.aicl_work.cancel();
            } else {
                self.set_aicl_irq(true).await?;
            }
        }
        Ok(())
    }

    pub async fn set_aicl_irq(&self, enabled: bool) -> Result<(), P::Error> {
        self.update(REG_INT_MASK, if enabled { 0 } else { AICL_I }, AICL_I).await?;
        self.aicl.update(|a| a.irq_enabled = enabled);
        debug!("aicl: irq {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Charge-control request from the battery manager. Remembered so it can
    /// be re-applied after the battery returns.
    pub async fn set_charging_enabled(&self, intent: ModeIntent) -> Result<Transition, P::Error> {
        if !intent.is_charge_control() {
            return Err(Error::InvalidInput);
        }
        self.aicl.update(|a| a.misalign_count = 0);
        let mut st = self.mode.lock().await;
        st.charge_mode = intent;
        self.transition_locked(&mut st, intent).await
    }

    // ------------------ OTG / UNO ------------------

    pub async fn set_otg(&self, enable: bool) -> Result<(), P::Error> {
        // Check and transition under one hold of the mode lock so two
        // requests cannot both see OTG off.
        let mut st = self.mode.lock().await;
        if st.otg_on == enable || self.config.lp_charge {
            debug!("otg: already {}, skip", enable);
            return Ok(());
        }
        if enable && self.supplies.wireless_fw_updating() {
            warn!("otg: wireless firmware update in progress");
            return Err(Error::NoDevice);
        }
        if enable {
            self.check_wcin_before_otg(st.mode.uno_active()).await?;
        }

        let prev_ilim = self.read(REG_CNFG_02).await? & OTG_ILIM_MASK;
        let hp = enable && st.hp_otg;
        self.set_otg_current(if hp { OtgCurrent::Ma1500 } else { OtgCurrent::Ma900 }).await?;
        if enable {
            self.supplies.set_otg_control(true);
        }
        let intent = if enable { ModeIntent::OtgOn } else { ModeIntent::OtgOff };
        if let Err(e) = self.transition_locked(&mut st, intent).await {
            error!("otg: {} failed, rolling back", if enable { "on" } else { "off" });
            if enable {
                self.supplies.set_otg_control(false);
            }
            if let Err(re) = self.update(REG_CNFG_02, prev_ilim, OTG_ILIM_MASK).await {
                error!("otg: current restore failed: {:?}", re);
            }
            return Err(e);
        }
        st.otg_on = enable;
        if !enable {
            st.hp_otg = false;
        }
        drop(st);

        if enable {
            self.set_aicl_irq(false).await?;
            self.aicl_work.cancel();
            self.aicl.update(|a| a.reset());
            self.cable.update(|c| c.slow_charging = false);
        } else {
            Timer::after(self.config.output_off_settle).await;
            self.supplies.set_otg_control(false);
            self.set_aicl_irq(true).await?;
        }
        info!("otg: {}", if enable { "on" } else { "off" });
        Ok(())
    }

    async fn check_wcin_before_otg(&self, uno_active: bool) -> Result<(), P::Error> {
        if self.supplies.is_online() {
            return Ok(());
        }
        if uno_active {
            self.supplies.notify_tx_error(TxError::OtgOn);
            return Ok(());
        }
        let d0 = self.read(REG_DETAILS_00).await?;
        let wcin = VbusState::from_bits((d0 & WCIN_DTLS_MASK) >> WCIN_DTLS_SHIFT);
        if wcin == VbusState::Valid && self.supplies.energy_present() {
            // Pad is powering the coil; pin it to 5 V before boosting.
            self.supplies.request_vout_5v();
        }
        Ok(())
    }

    /// High-power (1.5 A) OTG request; applied now if OTG is running.
    pub async fn set_hp_otg(&self, enable: bool) -> Result<(), P::Error> {
        let mut st = self.mode.lock().await;
        st.hp_otg = enable;
        if st.otg_on {
            self.set_otg_current(if enable { OtgCurrent::Ma1500 } else { OtgCurrent::Ma900 }).await?;
        }
        Ok(())
    }

    /// Drive the bus output without touching the OTG bookkeeping.
    pub async fn set_otg_vbus(&self, enable: bool) -> Result<Transition, P::Error> {
        self.request_transition(if enable { ModeIntent::OtgOn } else { ModeIntent::OtgOff }).await
    }

    /// OTG_ILIM shares CNFG_02 with the charge current, but the masked
    /// update is atomic under the port lock, so the limits lock is not
    /// taken and this may run under the mode lock.
    pub async fn set_otg_current(&self, ilim: OtgCurrent) -> Result<(), P::Error> {
        self.update(REG_CNFG_02, (ilim as u8) << OTG_ILIM_SHIFT, OTG_ILIM_MASK).await
    }

    pub async fn set_uno(&self, control: UnoControl) -> Result<(), P::Error> {
        let mut st = self.mode.lock().await;
        if st.otg_on {
            warn!("uno: OTG is on, skip {:?}", control);
            if control != UnoControl::Off && self.supplies.wireless_tx_requested() {
                self.supplies.notify_tx_error(TxError::Etc);
            }
            return Ok(());
        }
        if control != UnoControl::Off {
            let int_ok = self.read(REG_INT_OK).await?;
            if int_ok & WCIN_I != 0 {
                warn!("uno: wireless input present, skip");
                return Ok(());
            }
        }

        let prev = st.uno_on;
        st.uno_on = control != UnoControl::Off;
        let res = match control {
            UnoControl::Only => self.force_uno_only_locked(&mut st).await,
            UnoControl::On => self.transition_locked(&mut st, ModeIntent::UnoOn).await.map(|_| ()),
            UnoControl::Off => self.transition_locked(&mut st, ModeIntent::UnoOff).await.map(|_| ()),
        };
        if let Err(e) = res {
            st.uno_on = prev;
            return Err(e);
        }
        drop(st);

        if control == UnoControl::Off {
            Timer::after(self.config.output_off_settle).await;
        }
        info!("uno: {:?}", control);
        Ok(())
    }

    async fn force_uno_only_locked(&self, st: &mut ModeState) -> Result<(), P::Error> {
        if st.mode.otg_active() {
            self.force_mode_locked(st, PowerPathMode::Buck).await?;
            Timer::after(self.config.otg_uno_settle).await;
        }
        self.force_mode_locked(st, PowerPathMode::BoostUno).await
    }

    pub async fn set_uno_current(&self, ma: u16) -> Result<(), P::Error> {
        let code = UNO_ILIM_STEPS
            .iter()
            .find(|(step, _)| ma <= *step)
            .map_or(UNO_ILIM_STEPS[UNO_ILIM_STEPS.len() - 1].1, |(_, code)| *code);
        self.update(REG_CNFG_05, code << UNOILIM_SHIFT, UNOILIM_MASK).await
    }

    pub async fn get_uno_current(&self) -> Result<u16, P::Error> {
        let code = (self.read(REG_CNFG_05).await? & UNOILIM_MASK) >> UNOILIM_SHIFT;
        Ok(UNO_ILIM_STEPS.iter().find(|(_, c)| *c == code).map_or(0, |(ma, _)| *ma))
    }

    /// UNO output voltage; 0 restores the default.
    pub async fn set_uno_voltage(&self, mv: u16) -> Result<(), P::Error> {
        let code = if mv == 0 {
            0
        } else {
            let mv = mv.clamp(UNO_VOUT_MIN_MV, UNO_VOUT_MAX_MV);
            ((mv - UNO_VOUT_MIN_MV) / 100) as u8
        };
        self.update(REG_CNFG_11, code, VBYPSET_MASK).await
    }

    // ------------------ Ship mode / FG source ------------------

    pub async fn set_ship_mode(&self, mode: ShipMode) -> Result<(), P::Error> {
        match mode {
            ShipMode::Enable if self.config.ship_mode_supported => {
                info!("ship mode: enable");
                self.update(REG_CNFG_07, SHIP_MODE, SHIP_MODE).await
            }
            _ => Err(Error::Unsupported),
        }
    }

    pub async fn set_auto_ship_mode(&self, enable: bool) -> Result<(), P::Error> {
        self.update(REG_CNFG_03, if enable { AUTO_SHIP_MODE } else { 0 }, AUTO_SHIP_MODE).await
    }

    pub async fn set_fgsrc(&self, enable: bool) -> Result<(), P::Error> {
        self.update(REG_CNFG_07, if enable { FGSRC } else { 0 }, FGSRC).await
    }

    // ------------------ Status ------------------

    /// Cable seen by the input comparators.
    pub async fn get_online(&self) -> Result<CableType, P::Error> {
        let int_ok = self.read(REG_INT_OK).await?;
        let known = self.cable().cable;
        Ok(if int_ok & WCIN_I != 0 {
            if known.is_wireless() { known } else { CableType::Wireless }
        } else if int_ok & CHGIN_I != 0 {
            if known.is_wireless() || known.is_none() { CableType::Wired } else { known }
        } else {
            CableType::None
        })
    }

    pub async fn get_status(&self) -> Result<ChargerStatus, P::Error> {
        if let Some(status) = self.flags.get().status_override {
            return Ok(status);
        }
        let d1 = self.read(REG_DETAILS_01).await?;
        Ok(ChargerStatus::from_chg_dtls(d1 & CHG_DTLS_MASK))
    }

    /// Status forced by the battery manager, reported until cleared.
    pub fn set_status_override(&self, status: Option<ChargerStatus>) {
        self.flags.update(|f| f.status_override = status);
    }

    pub async fn charge_type(&self) -> ChargeType {
        if !self.mode.lock().await.is_charging {
            ChargeType::None
        } else if self.cable().slow_charging {
            ChargeType::Trickle
        } else {
            ChargeType::Fast
        }
    }

    /// Snapshot for the readings channel.
    pub async fn readings(&self) -> Result<ChargerReadings, P::Error> {
        let st = self.mode_state().await;
        let ctx = self.cable();
        let flags = self.flags.get();
        Ok(ChargerReadings {
            mode: st.mode,
            cable: ctx.cable,
            is_charging: st.is_charging,
            otg_on: st.otg_on,
            uno_on: st.uno_on,
            battery_present: flags.battery_present,
            health: flags.health,
            status: self.get_status().await?,
            vbus: flags.vbus,
            input_current_limit_ma: self.get_input_current_limit().await?,
            charge_current_ma: self.get_charge_current().await?,
            float_voltage_mv: self.get_float_voltage().await?,
            aicl_current_ma: self.aicl.get().aicl_current_ma.unwrap_or(0),
        })
    }

    // ------------------ Debug ------------------

    /// Read and log every register in the debug window.
    pub async fn dump_registers(&self) -> Result<heapless::Vec<(u8, u8), DUMP_LEN>, P::Error> {
        let mut out = heapless::Vec::new();
        for reg in DUMP_FIRST..=DUMP_LAST {
            let v = self.read(reg).await?;
            // Capacity equals the window size.
            let _ = out.push((reg, v));
        }
        decode::log_dump(&out);
        Ok(out)
    }

    pub async fn write_debug_register(&self, reg: u8, val: u8) -> Result<(), P::Error> {
        if !(DUMP_FIRST..=DUMP_LAST).contains(&reg) {
            return Err(Error::InvalidInput);
        }
        self.write(reg, val).await
    }

    /// Periodic snapshot for the log: mode, protection and input routing.
    pub async fn monitor(&self) -> Result<(), P::Error> {
        let mode = self.power_path_mode().await;
        let cnfg05 = self.read(REG_CNFG_05).await?;
        let cnfg12 = self.read(REG_CNFG_12).await?;
        let d = (
            self.read(REG_DETAILS_00).await?,
            self.read(REG_DETAILS_01).await?,
            self.read(REG_DETAILS_02).await?,
        );
        info!(
            "monitor: mode={:?} b2sovrc=0x{:02x} wcinsel={} cable={:?}",
            mode,
            cnfg05 & B2SOVRC_MASK,
            cnfg12 & WCINSEL != 0,
            self.cable().cable
        );
        decode::log_details(d.0, d.1, d.2);
        if self.config.enable_dpm && !self.battery_present() {
            self.supplies.set_thermal_control(false);
            self.supplies.set_dpm_event(true);
        }
        Ok(())
    }
}

#[cfg(test)]
impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    pub(crate) async fn set_mode_for_test(&self, mode: PowerPathMode) {
        let mut st = self.mode.lock().await;
        st.mode = mode;
        st.is_charging = mode.charging();
        st.otg_on = mode.otg_active();
        st.uno_on = mode.uno_active();
    }

    pub(crate) fn set_battery_present_for_test(&self, present: bool) {
        self.flags.update(|f| f.battery_present = present);
    }

    pub(crate) fn set_cable_for_test(&self, cable: CableType) {
        self.cable.update(|c| c.cable = cable);
    }
}
