//! Hardware initialization for the wellflow device
//!
//! Pin assignments:
//! - GPIO4: flow sensor pulse input (rising edge, pulled down)
//! - GPIO2: status LED (active high)
//! - GPIO12 / GPIO11: I2C SDA / SCL for the SHT40

use core::cell::RefCell;

use critical_section::Mutex;
use esp_hal::gpio::{
    Event, Input, InputConfig, InputPin, Io, Level, Output, OutputConfig, OutputPin, Pull,
};
use esp_hal::handler;
use esp_hal::{i2c::master::Config as I2cConfig, time::Rate};
use log::info;
use wellflow_core::pulse::PulseCounter;

/// Edges seen on the flow sensor input since boot.
pub static PULSES: PulseCounter = PulseCounter::new();

static FLOW_INPUT: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));

#[handler]
fn flow_edge_handler() {
    critical_section::with(|cs| {
        if let Some(input) = FLOW_INPUT.borrow_ref_mut(cs).as_mut()
            && input.is_interrupt_set()
        {
            PULSES.on_edge();
            input.clear_interrupt();
        }
    });
}

/// Route flow sensor rising edges into [`PULSES`].
///
/// Must be called once; the GPIO interrupt handler is shared by all pins.
pub fn init_flow_sensor(io: &mut Io<'_>, pin: impl InputPin + 'static) {
    io.set_interrupt_handler(flow_edge_handler);

    let mut input = Input::new(pin, InputConfig::default().with_pull(Pull::Down));
    critical_section::with(|cs| {
        input.listen(Event::RisingEdge);
        FLOW_INPUT.borrow_ref_mut(cs).replace(input);
    });
    info!("Flow sensor interrupt armed");
}

/// Status LED, starting dark.
pub fn create_status_led(pin: impl OutputPin + 'static) -> Output<'static> {
    Output::new(pin, Level::Low, OutputConfig::default())
}

/// Initialize the I2C bus hardware
///
/// Creates the I2C peripheral with proper configuration
pub fn create_i2c_bus(
    i2c0: esp_hal::peripherals::I2C0<'static>,
    sda: esp_hal::peripherals::GPIO12<'static>,
    scl: esp_hal::peripherals::GPIO11<'static>,
) -> esp_hal::i2c::master::I2c<'static, esp_hal::Async> {
    esp_hal::i2c::master::I2c::new(
        i2c0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .unwrap()
    .with_sda(sda)
    .with_scl(scl)
    .into_async()
}
