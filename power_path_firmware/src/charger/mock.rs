//! Host-side stand-ins for the register port and the collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use super::collab::{BatteryManager, FuelGauge, WirelessPower};
use super::device::Charger;
use super::port::RegisterPort;
use super::regs::*;
use super::types::{Headroom, Health, TxError};
use crate::config::ChargerConfig;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MockError;

struct PortState {
    regs: [u8; 256],
    log: Vec<(u8, u8)>,
    scripted: HashMap<u8, VecDeque<u8>>,
    failing: HashSet<u8>,
}

/// Register file with a write log. Clones share the same state.
#[derive(Clone)]
pub struct MockPort(Arc<Mutex<PortState>>);

impl MockPort {
    pub fn new() -> Self {
        let mut regs = [0u8; 256];
        regs[REG_INT_OK as usize] = BATP_I | AICL_I;
        regs[REG_CNFG_06 as usize] = CHGPROT_UNLOCKED;
        Self(Arc::new(Mutex::new(PortState {
            regs,
            log: Vec::new(),
            scripted: HashMap::new(),
            failing: HashSet::new(),
        })))
    }

    fn with<R>(&self, f: impl FnOnce(&mut PortState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn get(&self, reg: u8) -> u8 {
        self.with(|s| s.regs[reg as usize])
    }

    /// Set a register without logging a write.
    pub fn set(&self, reg: u8, val: u8) {
        self.with(|s| s.regs[reg as usize] = val)
    }

    /// Values returned by the next reads of `reg`, before the register file.
    pub fn script_reads(&self, reg: u8, vals: &[u8]) {
        self.with(|s| s.scripted.entry(reg).or_default().extend(vals.iter().copied()))
    }

    pub fn fail_writes(&self, reg: u8, fail: bool) {
        self.with(|s| {
            if fail {
                s.failing.insert(reg);
            } else {
                s.failing.remove(&reg);
            }
        })
    }

    pub fn clear_log(&self) {
        self.with(|s| s.log.clear())
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.with(|s| s.log.clone())
    }

    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.writes().into_iter().filter(|(r, _)| *r == reg).map(|(_, v)| v).collect()
    }

    /// Mode nibbles written to CNFG_00, in order.
    pub fn mode_writes(&self) -> Vec<u8> {
        self.writes_to(REG_CNFG_00).into_iter().map(|v| v & MODE_MASK).collect()
    }
}

impl RegisterPort for MockPort {
    type Error = MockError;

    async fn read(&mut self, reg: u8) -> Result<u8, MockError> {
        Ok(self.with(|s| {
            s.scripted
                .get_mut(&reg)
                .and_then(|q| q.pop_front())
                .unwrap_or(s.regs[reg as usize])
        }))
    }

    async fn write(&mut self, reg: u8, val: u8) -> Result<(), MockError> {
        self.with(|s| {
            if s.failing.contains(&reg) {
                return Err(MockError);
            }
            s.regs[reg as usize] = val;
            s.log.push((reg, val));
            Ok(())
        })
    }
}

/// Collaborator notifications in the order they were made.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Note {
    AiclCurrent(u16),
    SlowCharging,
    Presence(bool),
    Sysovlo,
    OtgOvercurrent,
    DpmEvent(bool),
    ThermalControl(bool),
    QbatSwitch(bool),
    Headroom(Headroom),
    OtgControl(bool),
    Vout5v,
    Misaligned,
    TxError(TxError),
    FgReset,
}

pub struct SupplyState {
    pub fw_updating: bool,
    pub tx_requested: bool,
    pub hv_pdo: bool,
    pub online: bool,
    pub energy: bool,
    pub capacity: u8,
    pub health: Health,
    pub input_current: u16,
    pub vbyp: u16,
    pub events: Vec<Note>,
}

#[derive(Clone)]
pub struct MockSupplies(Arc<Mutex<SupplyState>>);

impl MockSupplies {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(SupplyState {
            fw_updating: false,
            tx_requested: false,
            hv_pdo: false,
            online: false,
            energy: false,
            capacity: 50,
            health: Health::Good,
            input_current: 0,
            vbyp: 0,
            events: Vec::new(),
        })))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SupplyState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn events(&self) -> Vec<Note> {
        self.with(|s| s.events.clone())
    }

    fn note(&self, n: Note) {
        self.with(|s| s.events.push(n))
    }
}

impl BatteryManager for MockSupplies {
    fn capacity_percent(&self) -> u8 {
        self.with(|s| s.capacity)
    }
    fn health(&self) -> Health {
        self.with(|s| s.health)
    }
    fn hv_pdo_active(&self) -> bool {
        self.with(|s| s.hv_pdo)
    }
    fn wireless_fw_updating(&self) -> bool {
        self.with(|s| s.fw_updating)
    }
    fn wireless_tx_requested(&self) -> bool {
        self.with(|s| s.tx_requested)
    }
    fn notify_aicl_current(&self, ma: u16) {
        self.note(Note::AiclCurrent(ma))
    }
    fn notify_slow_charging(&self) {
        self.note(Note::SlowCharging)
    }
    fn notify_presence(&self, present: bool) {
        self.note(Note::Presence(present))
    }
    fn notify_sysovlo(&self) {
        self.note(Note::Sysovlo)
    }
    fn notify_otg_overcurrent(&self) {
        self.note(Note::OtgOvercurrent)
    }
    fn set_dpm_event(&self, active: bool) {
        self.note(Note::DpmEvent(active))
    }
    fn set_thermal_control(&self, enabled: bool) {
        self.note(Note::ThermalControl(enabled))
    }
    fn set_qbat_switch(&self, on: bool) {
        self.note(Note::QbatSwitch(on))
    }
}

impl WirelessPower for MockSupplies {
    fn is_online(&self) -> bool {
        self.with(|s| s.online)
    }
    fn energy_present(&self) -> bool {
        self.with(|s| s.energy)
    }
    fn set_headroom(&self, headroom: Headroom) {
        self.note(Note::Headroom(headroom))
    }
    fn set_otg_control(&self, enabled: bool) {
        self.note(Note::OtgControl(enabled))
    }
    fn request_vout_5v(&self) {
        self.note(Note::Vout5v)
    }
    fn notify_misaligned(&self) {
        self.note(Note::Misaligned)
    }
    fn notify_tx_error(&self, err: TxError) {
        self.note(Note::TxError(err))
    }
}

impl FuelGauge for MockSupplies {
    fn input_current_ma(&self) -> u16 {
        self.with(|s| s.input_current)
    }
    fn bypass_voltage_mv(&self) -> u16 {
        self.with(|s| s.vbyp)
    }
    fn reset_capacity(&self) {
        self.note(Note::FgReset)
    }
}

pub type TestCharger = Charger<MockPort, MockSupplies>;

pub fn fixture() -> (TestCharger, MockPort, MockSupplies) {
    fixture_with(ChargerConfig::fast())
}

pub fn fixture_with(cfg: ChargerConfig) -> (TestCharger, MockPort, MockSupplies) {
    let port = MockPort::new();
    let supplies = MockSupplies::new();
    let charger = Charger::new(port.clone(), supplies.clone(), cfg);
    (charger, port, supplies)
}
