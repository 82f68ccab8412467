//! Find a TCP port on the local host that nothing is listening on.
//!
//! Availability is judged by trying to connect, not by binding.  The answer can be stale by the
//! time the caller binds the port, so treat it as a good guess rather than a reservation.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_PORT_RANGE_MIN: u16 = 8000;
pub const DEFAULT_PORT_RANGE_MAX: u16 = 8999;
pub const DEFAULT_PORT_MAX_TRIES: usize = 50;

/// Upper bound on a single probe; refusals on loopback come back long before this
const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// Inclusive range of ports to search
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Result<Self> {
        if min == 0 || max < min {
            return Err(Error::InvalidPortRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports in the range
    pub fn size(&self) -> usize {
        usize::from(self.max - self.min) + 1
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_PORT_RANGE_MIN,
            max: DEFAULT_PORT_RANGE_MAX,
        }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Order in which candidate ports are probed
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchType {
    /// Ascending from the start of the range
    #[default]
    Sequential,
    /// Distinct ports drawn uniformly from the range
    Random,
}

impl SearchType {
    pub fn variants() -> [&'static str; 2] {
        [Self::Sequential.as_str(), Self::Random.as_str()]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Random => "random",
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "random" => Ok(Self::Random),
            _ => Err(Error::InvalidSearchType {
                value: s.to_owned(),
            }),
        }
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    pub range: PortRange,
    pub max_tries: usize,
    pub search_type: SearchType,
}

impl SearchConfig {
    pub fn new(range: PortRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    pub fn max_tries(mut self, max_tries: usize) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    /// Probes to make: never more than the range holds
    pub fn effective_tries(&self) -> usize {
        self.max_tries.min(self.range.size())
    }

    /// Ports to probe, in order
    ///
    /// A random search draws a fresh sample on every call.
    pub fn candidates(&self) -> Candidates {
        let tries = self.effective_tries();
        let order = match self.search_type {
            SearchType::Sequential => {
                Order::Sequential((self.range.min..=self.range.max).take(tries))
            }
            SearchType::Random => {
                let mut rng = rand::thread_rng();
                let indices = rand::seq::index::sample(&mut rng, self.range.size(), tries);
                Order::Random {
                    base: self.range.min,
                    indices: indices.into_iter(),
                }
            }
        };
        Candidates(order)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            range: PortRange::default(),
            max_tries: DEFAULT_PORT_MAX_TRIES,
            search_type: SearchType::default(),
        }
    }
}

/// Lazily produced ports for [`SearchConfig::candidates`]
#[derive(Debug)]
pub struct Candidates(Order);

#[derive(Debug)]
enum Order {
    Sequential(std::iter::Take<std::ops::RangeInclusive<u16>>),
    Random {
        base: u16,
        indices: rand::seq::index::IndexVecIntoIter,
    },
}

impl Iterator for Candidates {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        match &mut self.0 {
            Order::Sequential(ports) => ports.next(),
            // `index < range.size()`, so the sum stays within the range
            Order::Random { base, indices } => indices
                .next()
                .map(|index| (usize::from(*base) + index) as u16),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.0 {
            Order::Sequential(ports) => ports.size_hint(),
            Order::Random { indices, .. } => indices.size_hint(),
        }
    }
}

/// Whether nothing on `127.0.0.1` accepts connections on `port`
///
/// A successful connection means the port is taken.  Any failure to connect is taken to mean
/// it is free.
pub fn is_port_available(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match TcpStream::connect_timeout(&addr, PROBE_TIMEOUT) {
        Ok(_stream) => {
            log::trace!("Port {port} is in use");
            false
        }
        Err(e) => {
            log::trace!("Port {port} looks available ({e})");
            true
        }
    }
}

/// Search `config.range` for a port that [`is_port_available`]
pub fn find_available_port(config: &SearchConfig) -> Result<u16> {
    find_available_port_with(config, is_port_available)
}

/// Search `config.range`, using `probe` to decide whether a port is available
///
/// Stops at the first port `probe` accepts.
pub fn find_available_port_with(
    config: &SearchConfig,
    mut probe: impl FnMut(u16) -> bool,
) -> Result<u16> {
    let tries = config.effective_tries();
    log::debug!(
        "Searching {} for an available port ({} search, {} tries)",
        config.range,
        config.search_type,
        tries
    );
    config
        .candidates()
        .find(|port| probe(*port))
        .ok_or(Error::NoAvailablePortFound {
            range: config.range,
            search_type: config.search_type,
            tries,
        })
}
