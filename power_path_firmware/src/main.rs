#![no_std]
#![no_main]

use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::Pull;
use embassy_stm32::i2c::{Config as I2cConfig, I2c, Master};
use embassy_stm32::mode::Async;
use embassy_stm32::peripherals::*;
use embassy_stm32::time::Hertz;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use power_path_firmware::charger::{self, ChannelSupplies, Charger, I2cRegisterPort};
use power_path_firmware::config::ChargerConfig;
use power_path_firmware::shared_state::{
    CHARGER_CHANNEL, CHARGER_COMMAND_CHANNEL, CHARGER_EVENT_CHANNEL,
};

type I2cBus = I2c<'static, Async, Master>;
type I2cBusMutex = Mutex<CriticalSectionRawMutex, I2cBus>;
pub type I2cDev<'a> = I2cDevice<'a, CriticalSectionRawMutex, I2cBus>;

type BoardCharger = Charger<I2cRegisterPort<I2cDev<'static>>, ChannelSupplies<'static>>;

static I2C_BUS: StaticCell<I2cBusMutex> = StaticCell::new();
static CHARGER: StaticCell<BoardCharger> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct Irqs {
    I2C1_EV  => embassy_stm32::i2c::EventInterruptHandler<I2C1>;
    I2C1_ER  => embassy_stm32::i2c::ErrorInterruptHandler<I2C1>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    use embassy_stm32::rcc::{
        ADCPrescaler, AHBPrescaler, APBPrescaler, Hse, HseMode, Pll, PllMul, PllPreDiv, PllSource,
        Sysclk,
    };

    let mut config = embassy_stm32::Config::default();
    config.rcc.hse = Some(Hse { freq: Hertz::mhz(8), mode: HseMode::Oscillator });
    config.rcc.pll = Some(Pll { src: PllSource::HSE, prediv: PllPreDiv::DIV1, mul: PllMul::MUL9 });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre  = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV2;
    config.rcc.apb2_pre = APBPrescaler::DIV1;
    config.rcc.adc_pre  = ADCPrescaler::DIV6;

    let p = embassy_stm32::init(config);
    defmt::info!("Embassy is up.");

    // I2C bus + shared device handles
    let mut i2c_cfg = I2cConfig::default();
    i2c_cfg.frequency = Hertz(400_000);
    let raw_i2c = I2c::new(p.I2C1, p.PB6, p.PB7, Irqs, p.DMA1_CH6, p.DMA1_CH7, i2c_cfg);
    let bus_mutex: &'static I2cBusMutex = I2C_BUS.init(Mutex::new(raw_i2c));

    let i2c_dev: I2cDev<'static> = I2cDevice::new(bus_mutex);
    let port = I2cRegisterPort::new(i2c_dev);
    let supplies = ChannelSupplies::new(&CHARGER_EVENT_CHANNEL);
    let charger: &'static BoardCharger = CHARGER.init(Charger::new(port, supplies, ChargerConfig::default()));

    if let Err(e) = charger.initialize().await {
        defmt::error!("charger init failed: {:?}", e);
    }

    // INTB is open-drain, active-low; SYSOVLO is the PMIC's edge output.
    let chg_int = ExtiInput::new(p.PC10, p.EXTI10, Pull::Up);
    let sysovlo = ExtiInput::new(p.PC7, p.EXTI7, Pull::Up);

    defmt::info!("Spawning charger tasks");
    spawner.spawn(charger_int_task(charger, chg_int)).unwrap();
    spawner.spawn(charger_sysovlo_task(charger, sysovlo)).unwrap();
    spawner.spawn(charger_aicl_task(charger)).unwrap();
    spawner.spawn(charger_ramp_task(charger)).unwrap();
    spawner.spawn(charger_fcc_task(charger)).unwrap();
    spawner.spawn(charger_monitor_task(charger)).unwrap();
    spawner.spawn(charger_command_task(charger)).unwrap();
    spawner.spawn(event_log_task()).unwrap();
    defmt::info!("Charger tasks spawned");
}

#[embassy_executor::task]
async fn charger_int_task(charger: &'static BoardCharger, pin: ExtiInput<'static>) {
    charger::int_task(charger, pin).await
}

#[embassy_executor::task]
async fn charger_sysovlo_task(charger: &'static BoardCharger, pin: ExtiInput<'static>) {
    charger::sysovlo_task(charger, pin).await
}

#[embassy_executor::task]
async fn charger_aicl_task(charger: &'static BoardCharger) {
    charger::aicl_task(charger).await
}

#[embassy_executor::task]
async fn charger_ramp_task(charger: &'static BoardCharger) {
    charger::ramp_task(charger).await
}

#[embassy_executor::task]
async fn charger_fcc_task(charger: &'static BoardCharger) {
    charger::charge_current_task(charger).await
}

#[embassy_executor::task]
async fn charger_monitor_task(charger: &'static BoardCharger) {
    let publisher = CHARGER_CHANNEL.publisher().unwrap();
    charger::monitor_task(charger, publisher).await
}

#[embassy_executor::task]
async fn charger_command_task(charger: &'static BoardCharger) {
    let subscriber = CHARGER_COMMAND_CHANNEL.subscriber().unwrap();
    charger::command_task(charger, subscriber).await
}

/// Stand-in consumer until the battery manager and wireless receiver
/// drivers subscribe to the event channel.
#[embassy_executor::task]
async fn event_log_task() {
    let mut sub = CHARGER_EVENT_CHANNEL.subscriber().unwrap();
    loop {
        let event = sub.next_message_pure().await;
        defmt::info!("charger event: {:?}", event);
    }
}
