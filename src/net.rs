//! WiFi access point and TCP glue
//!
//! Brings up the soft AP with the static IPv4 settings from [`ApConfig`],
//! runs a small DHCP server so joining clients get an address, and accepts
//! HTTP connections on the AP interface one at a time.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use embassy_executor::{SpawnError, Spawner};
use embassy_net::tcp::{AcceptError, TcpSocket};
use embassy_net::{Ipv4Cidr, Runner, Stack, StackResources, StaticConfigV4};
use embassy_time::{Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{
    AccessPointConfig, AuthMethod, ModeConfig, WifiController, WifiDevice, WifiError, WifiEvent,
};
use log::*;
use static_cell::StaticCell;

use crate::config::{ApConfig, ConfigError};
use crate::server::{Connection, Listener};

/// Read/write stall limit for one HTTP connection
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_BUFFER_SIZE: usize = 1536;
/// Back-off after a failed accept so a broken stack does not spin
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(200);

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

/// Errors that keep the access point from coming up
#[derive(Debug)]
pub enum ProvisionError {
    /// Radio driver initialisation failed
    Radio(esp_radio::InitializationError),
    /// WiFi controller rejected the configuration or failed to start
    Wifi(WifiError),
    /// Network parameters are unusable
    Config(ConfigError),
    /// A background task could not be spawned
    Spawn(SpawnError),
}

/// Start the AP and its network stack
///
/// Returns once the AP interface has its static address, so the HTTP
/// server can start accepting right away.
pub async fn provision_access_point(
    spawner: &Spawner,
    wifi: WIFI<'static>,
    config: &ApConfig,
) -> Result<Stack<'static>, ProvisionError> {
    let prefix = config.prefix_len().map_err(ProvisionError::Config)?;

    let radio = RADIO.init(esp_radio::init().map_err(ProvisionError::Radio)?);
    let (mut controller, interfaces) =
        esp_radio::wifi::new(radio, wifi, Default::default()).map_err(ProvisionError::Wifi)?;

    let auth_method = if config.is_open() {
        warn!("AP password empty, network is open");
        AuthMethod::None
    } else {
        AuthMethod::Wpa2Personal
    };
    let ap_config = AccessPointConfig::default()
        .with_ssid(config.ssid.into())
        .with_password(config.password.into())
        .with_channel(config.channel)
        .with_auth_method(auth_method);

    controller
        .set_config(&ModeConfig::AccessPoint(ap_config))
        .map_err(ProvisionError::Wifi)?;
    controller.start_async().await.map_err(ProvisionError::Wifi)?;
    info!("AP started: ssid=\"{}\" channel={}", config.ssid, config.channel);

    let mut dns_servers = heapless::Vec::new();
    let _ = dns_servers.push(config.dns);
    let net_config = embassy_net::Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(config.address, prefix),
        gateway: Some(config.gateway),
        dns_servers,
    });

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let resources = NET_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(interfaces.ap, net_config, resources, seed);

    spawner.spawn(net_task(runner)).map_err(ProvisionError::Spawn)?;
    spawner.spawn(ap_task(controller)).map_err(ProvisionError::Spawn)?;
    spawner
        .spawn(dhcp_task(stack, config.address))
        .map_err(ProvisionError::Spawn)?;

    stack.wait_config_up().await;
    info!("AP network up: {}/{}", config.address, prefix);

    Ok(stack)
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

/// Keep the AP up; restart it if the driver stops it
#[embassy_executor::task]
async fn ap_task(mut controller: WifiController<'static>) {
    loop {
        controller.wait_for_event(WifiEvent::ApStop).await;
        warn!("AP stopped, restarting");
        Timer::after(Duration::from_secs(1)).await;
        if let Err(e) = controller.start_async().await {
            error!("AP restart failed: {:?}", e);
        }
    }
}

/// Lease addresses on the AP subnet, with this device as router
#[embassy_executor::task]
async fn dhcp_task(stack: Stack<'static>, server_ip: Ipv4Addr) {
    use edge_dhcp::io::{self, DEFAULT_SERVER_PORT};
    use edge_dhcp::server::{Server, ServerOptions};
    use edge_nal::UdpBind;
    use edge_nal_embassy::{Udp, UdpBuffers};

    let mut buf = [0u8; 1500];
    let mut gw_buf = [Ipv4Addr::UNSPECIFIED];

    let buffers = UdpBuffers::<2, 1024, 1024, 4>::new();
    let udp = Udp::new(stack, &buffers);
    let mut socket = match udp
        .bind(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::UNSPECIFIED,
            DEFAULT_SERVER_PORT,
        )))
        .await
    {
        Ok(socket) => socket,
        Err(e) => {
            error!("DHCP bind failed: {:?}", e);
            return;
        }
    };

    let mut server = Server::<_, 16>::new_with_et(server_ip);
    info!("DHCP server running on {}", server_ip);

    loop {
        if let Err(e) = io::server::run(
            &mut server,
            &ServerOptions::new(server_ip, Some(&mut gw_buf)),
            &mut socket,
            &mut buf,
        )
        .await
        {
            warn!("DHCP server error: {:?}", e);
        }
        Timer::after(Duration::from_millis(500)).await;
    }
}

/// Accepts HTTP connections on the AP interface, one socket at a time
pub struct HttpListener {
    stack: Stack<'static>,
    port: u16,
    rx_buffer: [u8; SOCKET_BUFFER_SIZE],
    tx_buffer: [u8; SOCKET_BUFFER_SIZE],
}

impl HttpListener {
    pub fn new(stack: Stack<'static>, port: u16) -> Self {
        Self {
            stack,
            port,
            rx_buffer: [0; SOCKET_BUFFER_SIZE],
            tx_buffer: [0; SOCKET_BUFFER_SIZE],
        }
    }
}

impl Listener for HttpListener {
    type Error = AcceptError;
    type Conn<'a> = TcpSocket<'a>;

    async fn accept(&mut self) -> Result<TcpSocket<'_>, AcceptError> {
        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        if let Err(e) = socket.accept(self.port).await {
            Timer::after(ACCEPT_RETRY_DELAY).await;
            return Err(e);
        }
        debug!("HTTP connection from {:?}", socket.remote_endpoint());
        Ok(socket)
    }
}

impl Connection for TcpSocket<'_> {
    async fn close(&mut self) {
        TcpSocket::close(self);
        if let Err(e) = TcpSocket::flush(self).await {
            debug!("HTTP close flush failed: {:?}", e);
        }
    }
}
