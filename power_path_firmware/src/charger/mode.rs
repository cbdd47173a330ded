//! Power-path mode state machine.
//!
//! The mode nibble in CNFG_00 selects which sub-paths run together:
//! bit0 charge, bit1 OTG-select, bit2 buck, bit3 boost. With boost on,
//! OTG-select picks the bus output (OTG) over the coil output (UNO), so
//! the two outputs can never be active in the same value.

use embassy_time::Timer;

use super::collab::Collaborators;
use super::device::Charger;
use super::port::RegisterPort;
use super::regs::*;
use super::types::Error;

const CHG: u8 = 1 << 0;
const OTG_SEL: u8 = 1 << 1;
const BUCK: u8 = 1 << 2;
const BOOST: u8 = 1 << 3;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerPathMode {
    AllOff = 0x0,
    ChgOnly = 0x1,
    OtgSelOnly = 0x2,
    ChgOtgSel = 0x3,
    Buck = 0x4,
    BuckChg = 0x5,
    BuckOtgSel = 0x6,
    BuckChgOtgSel = 0x7,
    BoostUno = 0x8,
    ChgBoostUno = 0x9,
    BoostOtg = 0xA,
    ChgBoostOtg = 0xB,
    BuckBoostUno = 0xC,
    BuckChgBoostUno = 0xD,
    BuckBoostOtg = 0xE,
    BuckChgBoostOtg = 0xF,
}

impl PowerPathMode {
    pub const ALL: [PowerPathMode; 16] = [
        PowerPathMode::AllOff,
        PowerPathMode::ChgOnly,
        PowerPathMode::OtgSelOnly,
        PowerPathMode::ChgOtgSel,
        PowerPathMode::Buck,
        PowerPathMode::BuckChg,
        PowerPathMode::BuckOtgSel,
        PowerPathMode::BuckChgOtgSel,
        PowerPathMode::BoostUno,
        PowerPathMode::ChgBoostUno,
        PowerPathMode::BoostOtg,
        PowerPathMode::ChgBoostOtg,
        PowerPathMode::BuckBoostUno,
        PowerPathMode::BuckChgBoostUno,
        PowerPathMode::BuckBoostOtg,
        PowerPathMode::BuckChgBoostOtg,
    ];

    pub fn from_bits(bits: u8) -> Self {
        Self::ALL[(bits & MODE_MASK) as usize]
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn buck(self) -> bool {
        self.bits() & BUCK != 0
    }

    pub fn charging(self) -> bool {
        self.bits() & CHG != 0
    }

    pub fn otg_active(self) -> bool {
        self.bits() & (BOOST | OTG_SEL) == BOOST | OTG_SEL
    }

    pub fn uno_active(self) -> bool {
        self.bits() & (BOOST | OTG_SEL) == BOOST
    }

    /// Values the controller never programs: charge without buck, or an
    /// OTG select with the boost stage off.
    pub fn is_reserved(self) -> bool {
        let b = self.bits();
        (b & CHG != 0 && b & BUCK == 0) || (b & OTG_SEL != 0 && b & BOOST == 0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeIntent {
    ChargingOn,
    ChargingOff,
    BuckOff,
    OtgOn,
    OtgOff,
    UnoOn,
    UnoOff,
}

impl ModeIntent {
    pub const ALL: [ModeIntent; 7] = [
        ModeIntent::ChargingOn,
        ModeIntent::ChargingOff,
        ModeIntent::BuckOff,
        ModeIntent::OtgOn,
        ModeIntent::OtgOff,
        ModeIntent::UnoOn,
        ModeIntent::UnoOff,
    ];

    pub fn is_charge_control(self) -> bool {
        matches!(self, ModeIntent::ChargingOn | ModeIntent::ChargingOff | ModeIntent::BuckOff)
    }
}

use ModeIntent as I;
use PowerPathMode as M;

/// (current mode, intent) -> next mode. Pairs not listed are no-ops.
pub const TRANSITIONS: [(PowerPathMode, ModeIntent, PowerPathMode); 35] = [
    (M::AllOff, I::ChargingOff, M::Buck),
    (M::AllOff, I::ChargingOn, M::BuckChg),
    (M::AllOff, I::OtgOn, M::BoostOtg),
    (M::AllOff, I::UnoOn, M::BoostUno),
    (M::Buck, I::ChargingOn, M::BuckChg),
    (M::Buck, I::BuckOff, M::AllOff),
    (M::Buck, I::OtgOn, M::BuckBoostOtg),
    (M::Buck, I::UnoOn, M::BuckBoostUno),
    (M::BuckChg, I::BuckOff, M::AllOff),
    (M::BuckChg, I::ChargingOff, M::Buck),
    (M::BuckChg, I::OtgOn, M::BuckChgBoostOtg),
    (M::BuckChg, I::UnoOn, M::BuckChgBoostUno),
    (M::BoostUno, I::ChargingOff, M::BuckBoostUno),
    (M::BoostUno, I::ChargingOn, M::BuckChgBoostUno),
    (M::BoostUno, I::UnoOff, M::AllOff),
    (M::BoostUno, I::OtgOn, M::BoostOtg),
    (M::BoostOtg, I::ChargingOff, M::BuckBoostOtg),
    (M::BoostOtg, I::ChargingOn, M::BuckChgBoostOtg),
    (M::BoostOtg, I::OtgOff, M::AllOff),
    (M::BoostOtg, I::UnoOn, M::BoostUno),
    (M::BuckBoostUno, I::BuckOff, M::BoostUno),
    (M::BuckBoostUno, I::ChargingOn, M::BuckChgBoostUno),
    (M::BuckBoostUno, I::UnoOff, M::Buck),
    (M::BuckBoostUno, I::OtgOn, M::BuckBoostOtg),
    (M::BuckChgBoostUno, I::BuckOff, M::BoostUno),
    (M::BuckChgBoostUno, I::ChargingOff, M::BuckBoostUno),
    (M::BuckChgBoostUno, I::UnoOff, M::BuckChg),
    (M::BuckChgBoostUno, I::OtgOn, M::BuckBoostOtg),
    (M::BuckBoostOtg, I::BuckOff, M::BoostOtg),
    (M::BuckBoostOtg, I::ChargingOn, M::BuckChgBoostOtg),
    (M::BuckBoostOtg, I::OtgOff, M::Buck),
    (M::BuckBoostOtg, I::UnoOn, M::BuckBoostUno),
    (M::BuckChgBoostOtg, I::ChargingOff, M::BuckBoostOtg),
    (M::BuckChgBoostOtg, I::BuckOff, M::BoostOtg),
    (M::BuckChgBoostOtg, I::OtgOff, M::BuckChg),
];

pub fn successor(mode: PowerPathMode, intent: ModeIntent) -> Option<PowerPathMode> {
    TRANSITIONS
        .iter()
        .find(|(from, i, _)| *from == mode && *i == intent)
        .map(|(_, _, to)| *to)
}

/// Register writes needed for one transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModePlan {
    pub target: PowerPathMode,
    /// Buck-only step written first when swapping between the two boost outputs.
    pub via: Option<PowerPathMode>,
}

pub fn plan(mode: PowerPathMode, intent: ModeIntent) -> Option<ModePlan> {
    let target = successor(mode, intent)?;
    let swap = (mode.otg_active() && target.uno_active()) || (mode.uno_active() && target.otg_active());
    Some(ModePlan { target, via: swap.then_some(PowerPathMode::Buck) })
}

/// Everything guarded by the mode lock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeState {
    pub mode: PowerPathMode,
    pub is_charging: bool,
    /// Last charge-control intent requested from outside; re-applied when
    /// the battery comes back.
    pub charge_mode: ModeIntent,
    pub otg_on: bool,
    pub uno_on: bool,
    /// OTG at 1.5 A instead of 900 mA.
    pub hp_otg: bool,
}

impl Default for ModeState {
    fn default() -> Self {
        Self {
            mode: PowerPathMode::AllOff,
            is_charging: false,
            charge_mode: ModeIntent::ChargingOff,
            otg_on: false,
            uno_on: false,
            hp_otg: false,
        }
    }
}

/// Outcome of `request_transition`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// No table entry for the intent in the current mode.
    Unchanged(PowerPathMode),
    Applied { from: PowerPathMode, to: PowerPathMode, via: Option<PowerPathMode> },
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    /// Look up and apply the successor mode for `intent` under the mode lock.
    pub async fn request_transition(&self, intent: ModeIntent) -> Result<Transition, Error<P::Error>> {
        let mut st = self.mode.lock().await;
        self.transition_locked(&mut st, intent).await
    }

    pub(crate) async fn transition_locked(
        &self,
        st: &mut ModeState,
        intent: ModeIntent,
    ) -> Result<Transition, Error<P::Error>> {
        let mut intent = intent;
        if intent == ModeIntent::ChargingOn && !self.battery_present() {
            warn!("mode: battery absent, charging-on forced to charging-off");
            intent = ModeIntent::ChargingOff;
        }
        let is_charging = match intent {
            ModeIntent::ChargingOn => true,
            ModeIntent::ChargingOff | ModeIntent::BuckOff => false,
            _ => st.is_charging,
        };

        if self.config.factory_mode && intent.is_charge_control() {
            info!("mode: factory mode, skip {:?}", intent);
            st.is_charging = is_charging;
            return Ok(Transition::Unchanged(st.mode));
        }

        let Some(plan) = plan(st.mode, intent) else {
            debug!("mode: {:?} has no successor for {:?}", st.mode, intent);
            st.is_charging = is_charging;
            return Ok(Transition::Unchanged(st.mode));
        };

        let from = st.mode;
        if let Some(via) = plan.via {
            self.write_mode(via).await?;
            // From here on the hardware runs the intermediate mode.
            st.mode = via;
            Timer::after(self.config.otg_uno_settle).await;
        }

        // OTG on top of buck+charge: keep the wireless input deselected
        // while the boost output starts.
        let wcin_workaround = intent == ModeIntent::OtgOn && plan.target == PowerPathMode::BuckChgBoostOtg;
        if wcin_workaround {
            self.update(REG_CNFG_12, 0, WCINSEL).await?;
        }

        let written = self.write_mode(plan.target).await;
        // WCINSEL goes back on whether or not the mode write landed.
        let restored = if wcin_workaround {
            self.update(REG_CNFG_12, WCINSEL, WCINSEL).await
        } else {
            Ok(())
        };
        if let Err(e) = &restored {
            error!("mode: WCINSEL restore failed: {:?}", e);
        }
        written?;
        st.mode = plan.target;
        st.is_charging = is_charging;
        info!("mode: {:?} -> {:?} ({:?})", from, plan.target, intent);
        restored?;

        if wcin_workaround && self.cable().cable.is_wireless() {
            self.supplies.request_vout_5v();
        }

        Ok(Transition::Applied { from, to: plan.target, via: plan.via })
    }

    /// Write a mode outside the table. Only boost-only UNO uses this.
    pub(crate) async fn force_mode_locked(
        &self,
        st: &mut ModeState,
        mode: PowerPathMode,
    ) -> Result<(), Error<P::Error>> {
        self.write_mode(mode).await?;
        info!("mode: forced {:?} -> {:?}", st.mode, mode);
        st.mode = mode;
        Ok(())
    }

    /// One masked write of the mode nibble followed by a readback.
    pub(crate) async fn write_mode(&self, mode: PowerPathMode) -> Result<(), Error<P::Error>> {
        if let Err(e) = self.update(REG_CNFG_00, mode.bits(), MODE_MASK).await {
            error!("mode: write {:?} failed: {:?}", mode, e);
            return Err(e);
        }
        let actual = self.read(REG_CNFG_00).await? & MODE_MASK;
        if actual != mode.bits() {
            error!("mode: readback 0x{:02x}, wrote 0x{:02x}", actual, mode.bits());
            return Err(Error::ReadbackMismatch { reg: REG_CNFG_00, expected: mode.bits(), actual });
        }
        Ok(())
    }

    pub async fn mode_state(&self) -> ModeState {
        *self.mode.lock().await
    }

    pub async fn power_path_mode(&self) -> PowerPathMode {
        self.mode.lock().await.mode
    }
}
