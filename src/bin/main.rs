#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::timer::timg::TimerGroup;
use log::*;

use ledcontroller::config::{ApConfig, HTTP_PORT};
use ledcontroller::net::{self, HttpListener};
use ledcontroller::page::StaticPage;
use ledcontroller::router::Router;
use ledcontroller::server::Server;

esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let peripherals = esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    // WiFi driver and network stack allocate from this heap
    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("LED controller v{}", env!("CARGO_PKG_VERSION"));

    // Onboard LED on most ESP32 dev boards
    let led = Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default());

    let ap_config = ApConfig::load();
    let stack = match net::provision_access_point(&spawner, peripherals.WIFI, &ap_config).await {
        Ok(stack) => stack,
        Err(e) => {
            error!("Access point setup failed: {:?}", e);
            Timer::after(Duration::from_secs(5)).await;
            esp_hal::system::software_reset();
        }
    };

    let page = StaticPage::load();

    let mut server = Server::new(Router::new(led, page));
    let mut listener = HttpListener::new(stack, HTTP_PORT);
    info!("HTTP on http://{}:{}/", ap_config.address, HTTP_PORT);

    server.run(&mut listener).await;
}
