use std::time::{Duration, Instant};

/// Raw wall-clock windows recorded by the transport driver.
///
/// Windows overlap on purpose: `open` spans the whole connection attempt,
/// including the resolver pass the platform performs inside
/// `TcpStream::connect`, so the isolated handshake figure is derived later
/// by subtracting the `dns` window (see `metrics::aggregate`).
#[derive(Debug, Default, Clone)]
pub struct PhaseTimings {
    pub dns_start: Option<Instant>,
    pub dns_end: Option<Instant>,
    pub open_start: Option<Instant>,
    pub open_end: Option<Instant>,
    pub tcp_connect_start: Option<Instant>,
    pub tcp_connect_end: Option<Instant>,
    pub first_byte_start: Option<Instant>,
    pub first_byte_end: Option<Instant>,
    pub total_start: Option<Instant>,
    pub total_end: Option<Instant>,
    pub redirects: Duration,
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_total(&mut self) {
        self.total_start = Some(Instant::now());
    }

    pub fn end_total(&mut self) {
        self.total_end = Some(Instant::now());
    }

    pub fn start_dns(&mut self) {
        self.dns_start = Some(Instant::now());
    }

    pub fn end_dns(&mut self) {
        self.dns_end = Some(Instant::now());
    }

    pub fn start_open(&mut self) {
        self.open_start = Some(Instant::now());
    }

    pub fn end_open(&mut self) {
        self.open_end = Some(Instant::now());
    }

    pub fn start_tcp_connect(&mut self) {
        self.tcp_connect_start = Some(Instant::now());
    }

    pub fn end_tcp_connect(&mut self) {
        self.tcp_connect_end = Some(Instant::now());
    }

    pub fn start_first_byte(&mut self) {
        self.first_byte_start = Some(Instant::now());
    }

    pub fn end_first_byte(&mut self) {
        self.first_byte_end = Some(Instant::now());
    }

    pub fn add_redirect(&mut self, hop: Duration) {
        self.redirects += hop;
    }

    /// Clears the per-hop windows before following a redirect, so the
    /// reported connect/handshake/first-byte figures describe the final
    /// transfer only. DNS, redirect and total windows survive.
    pub fn reset_hop(&mut self) {
        self.open_start = None;
        self.open_end = None;
        self.tcp_connect_start = None;
        self.tcp_connect_end = None;
        self.first_byte_start = None;
        self.first_byte_end = None;
    }

    pub fn dns_duration(&self) -> Option<Duration> {
        Some(self.dns_end?.duration_since(self.dns_start?))
    }

    pub fn open_duration(&self) -> Option<Duration> {
        Some(self.open_end?.duration_since(self.open_start?))
    }

    pub fn tcp_connect_duration(&self) -> Option<Duration> {
        Some(self.tcp_connect_end?.duration_since(self.tcp_connect_start?))
    }

    pub fn first_byte_duration(&self) -> Option<Duration> {
        Some(self.first_byte_end?.duration_since(self.first_byte_start?))
    }

    pub fn total_duration(&self) -> Option<Duration> {
        Some(self.total_end?.duration_since(self.total_start?))
    }
}
