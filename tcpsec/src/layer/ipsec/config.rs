use crate::wire::SecurityProtocol;

/// Process wide IPsec input configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Accept ESP.
    pub esp_enable: bool,

    /// Accept AH.
    pub ah_enable: bool,

    /// Accept IPCOMP.
    pub ipcomp_enable: bool,

    /// The most headers a decapsulated IPv6 packet may be dispatched through.
    ///
    /// `0` disables the limit.
    pub ip6_nesting_limit: u8,
}

impl Config {
    /// Whether input of the protocol is enabled.
    pub fn enabled(&self, proto: SecurityProtocol) -> bool {
        match proto {
            SecurityProtocol::Esp => self.esp_enable,
            SecurityProtocol::Ah => self.ah_enable,
            SecurityProtocol::IpComp => self.ipcomp_enable,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            esp_enable: true,
            ah_enable: true,
            ipcomp_enable: true,
            ip6_nesting_limit: 15,
        }
    }
}
