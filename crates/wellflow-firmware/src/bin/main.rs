#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::Io;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::CountryInfo;
use log::{error, info};
use static_cell::StaticCell;

use wellflow_core::aggregator::Aggregator;
use wellflow_core::network::NetworkSupervisor;
use wellflow_core::runtime;
use wellflow_firmware::app_state::{
    AppState, PULSES, create_i2c_bus, create_status_led, init_flow_sensor,
};
use wellflow_firmware::clock::{SntpClockSync, SyncedClock};
use wellflow_firmware::delay::TaskDelay;
use wellflow_firmware::device_config::device_config;
use wellflow_firmware::http::{HTTP_PORT, TcpListener};
use wellflow_firmware::wifi::{WifiLink, net_task};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static CLOCK: SyncedClock = SyncedClock::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let device = match device_config() {
        Ok(device) => device,
        Err(err) => halt(format_args!("Invalid device configuration: {}", err)).await,
    };

    // Count pulses from the very start so no flow is missed during bring-up
    let mut io = Io::new(peripherals.IO_MUX);
    init_flow_sensor(&mut io, peripherals.GPIO4);
    let mut led = create_status_led(peripherals.GPIO2);

    let i2c = create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11);
    #[cfg(feature = "sensor-sht40")]
    let mut sensor = wellflow_firmware::sensors::SHT40Sensor::new(i2c);
    #[cfg(not(feature = "sensor-sht40"))]
    let mut sensor = {
        drop(i2c);
        wellflow_firmware::sensors::NoSensor
    };

    let radio_init =
        RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let wifi_config = esp_radio::wifi::Config::default()
        .with_country_code(CountryInfo::from(device.network.country_code));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, wifi_config)
            .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        NET_RESOURCES.init(StackResources::<4>::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).expect("Failed to spawn network task");

    let mut delay = TaskDelay;
    let mut supervisor = NetworkSupervisor::new(
        WifiLink::new(wifi_controller, stack),
        SntpClockSync::new(stack, &CLOCK),
        device.network,
    );
    if let Err(err) = supervisor.connect(true, &mut delay).await {
        halt(format_args!("Network connection failed: {}", err)).await;
    }
    runtime::flash_connected(&mut led, &mut delay).await;

    let state = AppState::new(&PULSES, Aggregator::new(&CLOCK, device.utc_offset_hours));
    let mut listener = TcpListener::new(stack, HTTP_PORT);
    info!("Serving stats on port {}", HTTP_PORT);

    runtime::run(
        &state,
        &mut supervisor,
        &mut listener,
        &mut sensor,
        &mut led,
        delay,
    )
    .await;

    // The runtime loops never finish
    halt(format_args!("Monitor tasks exited")).await
}

/// Log a fatal startup error and park forever.
async fn halt(reason: core::fmt::Arguments<'_>) -> ! {
    error!("{}", reason);
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
