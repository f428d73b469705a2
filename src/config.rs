//! Access point configuration
//!
//! Fixed network parameters for the soft AP. Every value has a default and
//! can be overridden at build time (see `build.rs`):
//!
//! | Variable             | Default         |
//! |----------------------|-----------------|
//! | `LEDCTL_AP_SSID`     | `240KM/H`       |
//! | `LEDCTL_AP_PASSWORD` | `123456789`     |
//! | `LEDCTL_AP_CHANNEL`  | `11`            |
//! | `LEDCTL_AP_IP`       | `192.168.4.20`  |
//! | `LEDCTL_AP_NETMASK`  | `255.255.255.0` |
//! | `LEDCTL_AP_GATEWAY`  | `192.168.4.1`   |
//! | `LEDCTL_AP_DNS`      | `8.8.8.8`       |
//!
//! An override that does not parse is ignored with a warning.

use core::fmt;
use core::net::Ipv4Addr;
use core::str::FromStr;

use log::*;

/// Port the HTTP server listens on
pub const HTTP_PORT: u16 = 80;

// Defaults
const DEFAULT_SSID: &str = "240KM/H";
const DEFAULT_PASSWORD: &str = "123456789";
const DEFAULT_CHANNEL: u8 = 11;
const DEFAULT_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 20);
const DEFAULT_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
const DEFAULT_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
const DEFAULT_DNS: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

// WPA2 passphrase bounds, 802.11 SSID bound
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 64;
const MAX_SSID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Not a dotted-quad IPv4 address
    InvalidAddress,
    /// Not a channel number
    InvalidChannel,
    /// Netmask bits are not contiguous
    NonContiguousMask,
    /// SSID empty or longer than 32 bytes
    InvalidSsid,
    /// WPA2 passphrase outside 8..=64 characters
    InvalidPassword,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress => write!(f, "invalid IPv4 address"),
            ConfigError::InvalidChannel => write!(f, "invalid channel"),
            ConfigError::NonContiguousMask => write!(f, "netmask is not contiguous"),
            ConfigError::InvalidSsid => write!(f, "SSID must be 1-{} bytes", MAX_SSID_LEN),
            ConfigError::InvalidPassword => write!(
                f,
                "password must be empty or {}-{} characters",
                MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
            ),
        }
    }
}

/// Raw build-time overrides, as strings
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub ssid: Option<&'static str>,
    pub password: Option<&'static str>,
    pub channel: Option<&'static str>,
    pub address: Option<&'static str>,
    pub netmask: Option<&'static str>,
    pub gateway: Option<&'static str>,
    pub dns: Option<&'static str>,
}

impl Overrides {
    /// Values captured by `build.rs` for this image
    pub const fn from_build() -> Self {
        Self {
            ssid: option_env!("LEDCTL_AP_SSID"),
            password: option_env!("LEDCTL_AP_PASSWORD"),
            channel: option_env!("LEDCTL_AP_CHANNEL"),
            address: option_env!("LEDCTL_AP_IP"),
            netmask: option_env!("LEDCTL_AP_NETMASK"),
            gateway: option_env!("LEDCTL_AP_GATEWAY"),
            dns: option_env!("LEDCTL_AP_DNS"),
        }
    }
}

/// Soft AP parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    pub ssid: &'static str,
    /// Empty for an open network
    pub password: &'static str,
    pub channel: u8,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns: Ipv4Addr,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_SSID,
            password: DEFAULT_PASSWORD,
            channel: DEFAULT_CHANNEL,
            address: DEFAULT_ADDRESS,
            netmask: DEFAULT_NETMASK,
            gateway: DEFAULT_GATEWAY,
            dns: DEFAULT_DNS,
        }
    }
}

impl ApConfig {
    /// Load the configuration for this image, using defaults for missing
    /// or unparsable overrides
    pub fn load() -> Self {
        let config = Self::from_overrides(&Overrides::from_build());
        info!(
            "AP config: ssid=\"{}\" channel={} ip={} mask={} gw={} dns={} open={}",
            config.ssid,
            config.channel,
            config.address,
            config.netmask,
            config.gateway,
            config.dns,
            config.is_open()
        );
        config
    }

    pub fn from_overrides(overrides: &Overrides) -> Self {
        let mut config = Self::default();

        if let Some(ssid) = overrides.ssid {
            match validate_ssid(ssid) {
                Ok(ssid) => config.ssid = ssid,
                Err(e) => warn!("LEDCTL_AP_SSID ignored: {}", e),
            }
        }
        if let Some(password) = overrides.password {
            match validate_password(password) {
                Ok(password) => config.password = password,
                Err(e) => warn!("LEDCTL_AP_PASSWORD ignored: {}", e),
            }
        }
        if let Some(channel) = overrides.channel {
            match u8::from_str(channel.trim()) {
                Ok(channel) => config.set_channel(channel),
                Err(_) => warn!("LEDCTL_AP_CHANNEL ignored: {}", ConfigError::InvalidChannel),
            }
        }

        apply_address(&mut config.address, overrides.address, "LEDCTL_AP_IP");
        apply_address(&mut config.gateway, overrides.gateway, "LEDCTL_AP_GATEWAY");
        apply_address(&mut config.dns, overrides.dns, "LEDCTL_AP_DNS");

        if let Some(mask) = overrides.netmask {
            match parse_ipv4(mask).and_then(|m| netmask_to_prefix(m).map(|_| m)) {
                Ok(mask) => config.netmask = mask,
                Err(e) => warn!("LEDCTL_AP_NETMASK ignored: {}", e),
            }
        }

        config
    }

    /// Set the WiFi channel, clamped to 1-13
    pub fn set_channel(&mut self, channel: u8) {
        let clamped = channel.clamp(1, 13);
        if clamped != channel {
            warn!("AP channel {} out of range, using {}", channel, clamped);
        }
        self.channel = clamped;
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// CIDR prefix length of the netmask
    pub fn prefix_len(&self) -> Result<u8, ConfigError> {
        netmask_to_prefix(self.netmask)
    }
}

fn apply_address(field: &mut Ipv4Addr, value: Option<&str>, name: &str) {
    if let Some(value) = value {
        match parse_ipv4(value) {
            Ok(addr) => *field = addr,
            Err(e) => warn!("{} ignored: {}", name, e),
        }
    }
}

fn parse_ipv4(s: &str) -> Result<Ipv4Addr, ConfigError> {
    Ipv4Addr::from_str(s.trim()).map_err(|_| ConfigError::InvalidAddress)
}

fn validate_ssid(ssid: &'static str) -> Result<&'static str, ConfigError> {
    if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::InvalidSsid);
    }
    Ok(ssid)
}

fn validate_password(password: &'static str) -> Result<&'static str, ConfigError> {
    let len = password.chars().count();
    if len != 0 && !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ConfigError::InvalidPassword);
    }
    Ok(password)
}

/// Convert a netmask such as 255.255.255.0 to its prefix length (24)
pub fn netmask_to_prefix(mask: Ipv4Addr) -> Result<u8, ConfigError> {
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    // All set bits must be leading ones
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(ConfigError::NonContiguousMask);
    }
    Ok(prefix as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApConfig::default();
        assert_eq!(config.ssid, "240KM/H");
        assert_eq!(config.channel, 11);
        assert_eq!(config.address, Ipv4Addr::new(192, 168, 4, 20));
        assert_eq!(config.gateway, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(config.prefix_len(), Ok(24));
        assert!(!config.is_open());
    }

    #[test]
    fn test_no_overrides_is_default() {
        assert_eq!(ApConfig::from_overrides(&Overrides::default()), ApConfig::default());
    }

    #[test]
    fn test_valid_overrides_apply() {
        let config = ApConfig::from_overrides(&Overrides {
            ssid: Some("lab-led"),
            password: Some(""),
            channel: Some(" 6 "),
            address: Some("10.0.0.2"),
            netmask: Some("255.255.0.0"),
            gateway: Some("10.0.0.1"),
            dns: Some("1.1.1.1"),
        });
        assert_eq!(config.ssid, "lab-led");
        assert!(config.is_open());
        assert_eq!(config.channel, 6);
        assert_eq!(config.address, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(config.prefix_len(), Ok(16));
        assert_eq!(config.gateway, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(config.dns, Ipv4Addr::new(1, 1, 1, 1));
    }

    #[test]
    fn test_bad_overrides_keep_defaults() {
        let config = ApConfig::from_overrides(&Overrides {
            ssid: Some(""),
            password: Some("short"),
            channel: Some("eleven"),
            address: Some("192.168.4"),
            netmask: Some("255.0.255.0"),
            gateway: Some("not-an-ip"),
            dns: Some("8.8.8.8.8"),
        });
        assert_eq!(config, ApConfig::default());
    }

    #[test]
    fn test_channel_is_clamped() {
        let mut config = ApConfig::default();
        config.set_channel(0);
        assert_eq!(config.channel, 1);
        config.set_channel(14);
        assert_eq!(config.channel, 13);
        config.set_channel(1);
        assert_eq!(config.channel, 1);
    }

    #[test]
    fn test_netmask_to_prefix() {
        assert_eq!(netmask_to_prefix(Ipv4Addr::new(255, 255, 255, 0)), Ok(24));
        assert_eq!(netmask_to_prefix(Ipv4Addr::new(255, 255, 255, 255)), Ok(32));
        assert_eq!(netmask_to_prefix(Ipv4Addr::new(0, 0, 0, 0)), Ok(0));
        assert_eq!(netmask_to_prefix(Ipv4Addr::new(255, 255, 254, 0)), Ok(23));
        assert_eq!(
            netmask_to_prefix(Ipv4Addr::new(255, 0, 255, 0)),
            Err(ConfigError::NonContiguousMask)
        );
    }

    #[test]
    fn test_password_length_bounds() {
        assert!(validate_password("").is_ok());
        assert!(validate_password("12345678").is_ok());
        assert_eq!(validate_password("1234567"), Err(ConfigError::InvalidPassword));
    }
}
