use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable snapshot of one trace attempt.
///
/// Every duration is in whole milliseconds. All numeric fields default to
/// 0 and `ip` to `None`, so a result is always fully constructible even
/// when the request never left the machine; `status_code == 0` means the
/// server was never reached. Field declaration order is the key order of
/// both `as_dict` and `as_json`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub(crate) status_code: u16,
    pub(crate) dns: i64,
    pub(crate) handshake: i64,
    pub(crate) connect: i64,
    pub(crate) first_byte: i64,
    pub(crate) total: i64,
    pub(crate) body_length: u64,
    pub(crate) headers_length: u64,
    pub(crate) ip: Option<String>,
    pub(crate) redirects: i64,
}

impl TraceResult {
    /// HTTP status of the final response, or 0 if no response arrived.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Hostname resolution time; 0 if resolution failed or was answered
    /// from the platform resolver's cache.
    pub fn dns(&self) -> i64 {
        self.dns
    }

    /// Connection establishment time with the DNS share subtracted out.
    /// TLS handshake included for HTTPS. May be negative when the platform
    /// answered the in-connect lookup faster than the measured one, unless
    /// flooring was requested on the tracer.
    pub fn handshake(&self) -> i64 {
        self.handshake
    }

    /// Raw TCP connect time, without the TLS handshake.
    pub fn connect(&self) -> i64 {
        self.connect
    }

    /// Time from the request hitting the wire to the response status line.
    pub fn first_byte(&self) -> i64 {
        self.first_byte
    }

    /// End-to-end time, trace start to last body byte.
    pub fn total(&self) -> i64 {
        self.total
    }

    /// Response body bytes actually read (not `Content-Length`).
    pub fn body_length(&self) -> u64 {
        self.body_length
    }

    /// Response head bytes: status line plus serialized header lines.
    pub fn headers_length(&self) -> u64 {
        self.headers_length
    }

    /// Peer IP of the final connection; `None` when resolution failed.
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    /// Cumulative time spent on redirect hops before the final transfer.
    pub fn redirects(&self) -> i64 {
        self.redirects
    }

    /// Ordered mapping view: field name -> value, every declared field
    /// present, declaration order preserved.
    pub fn as_dict(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A plain struct of integers and an optional string always
            // serializes to an object.
            _ => unreachable!("TraceResult serializes to a JSON object"),
        }
    }

    /// JSON projection of the mapping view.
    pub fn as_json(&self) -> String {
        serde_json::to_string(self).expect("TraceResult serialization cannot fail")
    }
}

impl fmt::Display for TraceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time breakdown:")?;
        writeln!(f, "  DNS lookup:      {:>8} ms", self.dns)?;
        writeln!(f, "  TCP connect:     {:>8} ms", self.connect)?;
        writeln!(f, "  Handshake:       {:>8} ms", self.handshake)?;
        writeln!(f, "  First byte:      {:>8} ms", self.first_byte)?;
        writeln!(f, "  Redirects:       {:>8} ms", self.redirects)?;
        writeln!(f, "  Total time:      {:>8} ms", self.total)?;
        writeln!(f, "  Status:          {:>8}", self.status_code)?;
        match self.ip.as_deref() {
            Some(ip) => writeln!(f, "  Peer IP:         {:>8}", ip),
            None => writeln!(f, "  Peer IP:         {:>8}", "N/A"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: [&str; 10] = [
        "status_code",
        "dns",
        "handshake",
        "connect",
        "first_byte",
        "total",
        "body_length",
        "headers_length",
        "ip",
        "redirects",
    ];

    #[test]
    fn default_result_exposes_every_field() {
        let dict = TraceResult::default().as_dict();
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, FIELDS);
        for field in FIELDS {
            let value = &dict[field];
            if field == "ip" {
                assert!(value.is_null());
            } else {
                assert_eq!(value.as_i64(), Some(0), "{field} should default to 0");
            }
        }
    }

    #[test]
    fn as_dict_is_idempotent() {
        let result = TraceResult {
            status_code: 200,
            dns: 12,
            handshake: 34,
            ip: Some("93.184.216.34".to_string()),
            ..Default::default()
        };
        assert_eq!(result.as_dict(), result.as_dict());
    }

    #[test]
    fn json_round_trips_to_the_mapping_view() {
        let result = TraceResult {
            status_code: 301,
            dns: 5,
            handshake: -2,
            connect: 3,
            first_byte: 80,
            total: 120,
            body_length: 512,
            headers_length: 230,
            ip: Some("127.0.0.1".to_string()),
            redirects: 44,
        };
        let parsed: Value = serde_json::from_str(&result.as_json()).unwrap();
        assert_eq!(parsed, Value::Object(result.as_dict()));

        let back: TraceResult = serde_json::from_str(&result.as_json()).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn display_shows_the_breakdown() {
        let rendered = TraceResult::default().to_string();
        assert!(rendered.contains("DNS lookup"));
        assert!(rendered.contains("Total time"));
        assert!(rendered.contains("N/A"));
    }
}
