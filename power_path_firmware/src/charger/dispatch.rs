//! Interrupt dispatch and the long-running tasks that drive the controller.
//!
//! Tasks here are generic over the port and the collaborators, so the board
//! wraps each one in a concrete `#[embassy_executor::task]`.

use core::future::Future;

use embassy_time::{Duration, Ticker, Timer};
use embedded_hal_async::digital::Wait;

use crate::shared_state::{
    ChargerCommand, ChargerCommandSubscriber, ChargerReadings, ChargerReadingsPublisher,
};

use super::collab::Collaborators;
use super::decode;
use super::device::{Charger, Result};
use super::port::RegisterPort;
use super::regs::*;
use super::types::TxError;
use super::work::{DelayedWork, Ticket};

const INT_RETRY: Duration = Duration::from_millis(10);

/// Interrupt sources handled by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    BatteryPresence,
    /// Bypass path overcurrent (OTG or UNO output overloaded).
    Bypass,
    AiclFault,
    SystemOvervoltage,
}

impl Interrupt {
    /// Sources flagged in a charger INT value.
    pub fn from_int(int: u8) -> heapless::Vec<Interrupt, 3> {
        let mut out = heapless::Vec::new();
        for (bit, irq) in [
            (BATP_I, Interrupt::BatteryPresence),
            (BYP_I, Interrupt::Bypass),
            (AICL_I, Interrupt::AiclFault),
        ] {
            if int & bit != 0 {
                // One slot per source.
                let _ = out.push(irq);
            }
        }
        out
    }
}

impl<P: RegisterPort, S: Collaborators> Charger<P, S> {
    pub async fn handle_interrupt(&self, irq: Interrupt) -> Result<(), P::Error> {
        info!("irq: {:?}", irq);
        match irq {
            Interrupt::BatteryPresence => self.on_battery_presence().await,
            Interrupt::Bypass => self.on_bypass().await,
            Interrupt::AiclFault => {
                self.on_aicl_fault();
                Ok(())
            }
            Interrupt::SystemOvervoltage => self.on_sysovlo().await,
        }
    }

    /// Read (and thereby clear) the charger INT register and handle every
    /// source it flags. Returns the raw INT value.
    pub async fn service_int(&self) -> Result<u8, P::Error> {
        let int = self.read(REG_INT).await?;
        decode::log_int(int);
        for irq in Interrupt::from_int(int) {
            self.handle_interrupt(irq).await?;
        }
        Ok(int)
    }

    async fn on_battery_presence(&self) -> Result<(), P::Error> {
        self.ensure_unlocked().await?;
        let int_ok = self.read(REG_INT_OK).await?;
        decode::log_int_ok(int_ok);
        let present = int_ok & BATP_I != 0;
        let was = self.flags.update(|f| core::mem::replace(&mut f.battery_present, present));
        if was == present {
            debug!("batp: duplicate ({})", present);
            return Ok(());
        }
        info!("batp: battery {}", if present { "inserted" } else { "removed" });

        if self.config.enable_dpm {
            if present {
                self.supplies.reset_capacity();
            }
            self.supplies.set_qbat_switch(present);
            self.supplies.set_thermal_control(present);
            self.supplies.set_dpm_event(!present);

            let cable = self.cable().cable;
            let mut lim = self.limits.lock().await;
            let icl = lim.dpm_last_icl_ma;
            self.apply_input_limit_locked(&mut lim, cable, icl).await?;
        } else {
            self.supplies.notify_presence(present);
        }

        // Re-apply the last charge request; an absent battery turns
        // charging-on into charging-off.
        let mut st = self.mode.lock().await;
        let intent = st.charge_mode;
        self.transition_locked(&mut st, intent).await?;
        Ok(())
    }

    async fn on_bypass(&self) -> Result<(), P::Error> {
        self.ensure_unlocked().await?;
        let d2 = self.read(REG_DETAILS_02).await?;
        let byp = d2 & BYP_DTLS_MASK;
        info!("bypass: BYP_DTLS 0x{:02X}", byp);
        if byp & BYP_DTLS_OTG_ILIM == 0 {
            return Ok(());
        }

        let st = self.mode_state().await;
        if st.otg_on {
            warn!("bypass: OTG overcurrent, turning OTG off");
            self.supplies.notify_otg_overcurrent();
            self.set_otg(false).await?;
        } else if st.uno_on {
            warn!("bypass: UNO overcurrent");
            self.supplies.notify_tx_error(TxError::Ocp);
        }
        Ok(())
    }

    async fn on_sysovlo(&self) -> Result<(), P::Error> {
        self.supplies.notify_sysovlo();
        // Stays masked until the next detach.
        self.update(REG_PMIC_SYSTEM_INT_MASK, SYSOVLO_IM, SYSOVLO_IM).await
    }

    /// Execute one command from the command channel.
    pub async fn handle_command(&self, command: ChargerCommand) -> Result<(), P::Error> {
        debug!("command: {:?}", command);
        match command {
            ChargerCommand::Attach(cable) => self.set_cable(cable).await,
            ChargerCommand::SetInputCurrentLimit(ma) => self.request_input_current(ma).await,
            ChargerCommand::SetChargeCurrent(ma) => self.set_charge_current(ma).await,
            ChargerCommand::SetFloatVoltage(mv) => self.set_float_voltage(mv).await,
            ChargerCommand::SetTopoffCurrent(ma) => self.set_topoff_current(ma).await,
            ChargerCommand::SetWirelessChargeCurrent(ma) => {
                self.set_wireless_charge_current(ma);
                Ok(())
            }
            ChargerCommand::SetCharging(intent) => self.set_charging_enabled(intent).await.map(|_| ()),
            ChargerCommand::SetOtg(on) => self.set_otg(on).await,
            ChargerCommand::SetUno(control) => self.set_uno(control).await,
            ChargerCommand::SetUnoCurrent(ma) => self.set_uno_current(ma).await,
            ChargerCommand::SetUnoVoltage(mv) => self.set_uno_voltage(mv).await,
            ChargerCommand::SetShipMode(mode) => self.set_ship_mode(mode).await,
            ChargerCommand::SetAutoShipMode(on) => self.set_auto_ship_mode(on).await,
            ChargerCommand::DumpRegisters => self.dump_registers().await.map(|_| ()),
            ChargerCommand::Init => self.initialize().await,
        }
    }

    /// Health check, monitor log and a readings snapshot.
    pub async fn monitor_once(&self) -> Result<ChargerReadings, P::Error> {
        self.check_health().await?;
        self.monitor().await?;
        self.readings().await
    }
}

// ------------------ Tasks ------------------

/// Charger INTB line (active-low, held until INT is read).
pub async fn int_task<P, S, W>(charger: &Charger<P, S>, mut pin: W)
where
    P: RegisterPort,
    S: Collaborators,
    W: Wait,
{
    loop {
        if pin.wait_for_low().await.is_err() {
            warn!("int: pin wait failed");
            continue;
        }
        if let Err(e) = charger.service_int().await {
            error!("int: {:?}", e);
            // INTB stays low until INT is read successfully.
            Timer::after(INT_RETRY).await;
        }
    }
}

/// PMIC system-overvoltage line.
pub async fn sysovlo_task<P, S, W>(charger: &Charger<P, S>, mut pin: W)
where
    P: RegisterPort,
    S: Collaborators,
    W: Wait,
{
    loop {
        if pin.wait_for_falling_edge().await.is_err() {
            warn!("sysovlo: pin wait failed");
            continue;
        }
        if let Err(e) = charger.handle_interrupt(Interrupt::SystemOvervoltage).await {
            error!("sysovlo: {:?}", e);
        }
    }
}

pub async fn aicl_task<P: RegisterPort, S: Collaborators>(charger: &Charger<P, S>) {
    run_work(&charger.aicl_work, "aicl", |t| async move {
        charger.aicl_check(t).await.map(|o| debug!("aicl: {:?}", o))
    })
    .await
}

pub async fn ramp_task<P: RegisterPort, S: Collaborators>(charger: &Charger<P, S>) {
    run_work(&charger.ramp_work, "ramp", |t| async move {
        charger.ramp_tick(t).await.map(|s| debug!("ramp: {:?}", s))
    })
    .await
}

pub async fn charge_current_task<P: RegisterPort, S: Collaborators>(charger: &Charger<P, S>) {
    run_work(&charger.charge_work, "fcc", |t| charger.charge_current_tick(t)).await
}

async fn run_work<E, F, Fut>(work: &DelayedWork, name: &'static str, mut tick: F) -> !
where
    E: core::fmt::Debug,
    F: FnMut(Ticket) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    loop {
        let ticket = work.next().await;
        if let Err(e) = tick(ticket).await {
            warn!("{}: {:?}", name, e);
        }
        work.done(ticket);
    }
}

/// Periodic health check and readings broadcast.
pub async fn monitor_task<P: RegisterPort, S: Collaborators>(
    charger: &Charger<P, S>,
    publisher: ChargerReadingsPublisher<'_>,
) {
    let mut ticker = Ticker::every(charger.config.monitor_period);
    loop {
        match charger.monitor_once().await {
            Ok(readings) => {
                if publisher.try_publish(readings).is_err() {
                    debug!("monitor: readings dropped (no subscriber)");
                }
            }
            Err(e) => warn!("monitor: {:?}", e),
        }
        ticker.next().await;
    }
}

/// Executes commands published on the command channel.
pub async fn command_task<P: RegisterPort, S: Collaborators>(
    charger: &Charger<P, S>,
    mut subscriber: ChargerCommandSubscriber<'_>,
) {
    loop {
        let command = subscriber.next_message_pure().await;
        if let Err(e) = charger.handle_command(command).await {
            warn!("command {:?} failed: {:?}", command, e);
        }
    }
}
