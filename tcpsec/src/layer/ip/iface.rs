use alloc::vec::Vec;

/// The properties of a network interface relevant to segment sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Interface {
    /// The link MTU.
    pub mtu: u32,
    /// Whether this is a loopback interface.
    pub loopback: bool,
}

/// The set of live interfaces.
#[derive(Clone, Debug, Default)]
pub struct Interfaces {
    list: Vec<Interface>,
}

impl Interface {
    /// A regular interface with the given MTU.
    pub fn new(mtu: u32) -> Self {
        Interface { mtu, loopback: false }
    }

    /// A loopback interface with the given MTU.
    pub fn loopback(mtu: u32) -> Self {
        Interface { mtu, loopback: true }
    }
}

impl Interfaces {
    /// An empty set.
    pub fn new() -> Self {
        Interfaces::default()
    }

    /// Add a live interface.
    pub fn push(&mut self, iface: Interface) {
        self.list.push(iface);
    }

    /// Iterate over all interfaces.
    pub fn iter(&self) -> impl Iterator<Item=&Interface> {
        self.list.iter()
    }

    /// The largest MTU of any interface that is not a loopback.
    ///
    /// Loopback interfaces often have MTUs far larger than any real path and are excluded. Returns
    /// `0` if there is no such interface.
    pub fn max_mtu(&self) -> u32 {
        self.list.iter()
            .filter(|iface| !iface.loopback)
            .map(|iface| iface.mtu)
            .max()
            .unwrap_or(0)
    }
}

impl core::iter::FromIterator<Interface> for Interfaces {
    fn from_iter<I: IntoIterator<Item=Interface>>(iter: I) -> Self {
        Interfaces { list: iter.into_iter().collect() }
    }
}
