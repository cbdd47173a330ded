//! Power-path controller for a switch-mode charger with an OTG boost output
//! and a wireless-TX (UNO) output.

pub mod aicl;
pub mod collab;
pub mod current;
pub mod decode;
pub mod device;
pub mod dispatch;
pub mod health;
pub mod mode;
pub mod port;
pub mod property;
pub mod ramp;
pub mod regs;
pub mod types;
pub mod work;

#[cfg(test)]
pub(crate) mod mock;

pub use collab::{BatteryManager, ChannelSupplies, Collaborators, FuelGauge, SupplySnapshot, WirelessPower};
pub use device::{CableContext, Charger};
pub use dispatch::{
    aicl_task, charge_current_task, command_task, int_task, monitor_task, ramp_task, sysovlo_task, Interrupt,
};
pub use mode::{ModeIntent, PowerPathMode, Transition};
pub use port::{I2cRegisterPort, RegisterPort};
pub use property::{ChargerProperty, OtgProperty, PropVal};
pub use types::{CableType, Error, Health};
