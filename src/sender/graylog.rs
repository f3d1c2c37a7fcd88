use super::chunking::{message_id, plan_datagrams};
use super::envelope::{EnvelopeFields, encode};
use super::metrics::{DatagramMetrics, DatagramStats};
use crate::app::config::serde_helpers;
use crate::domain::LogRecord;
use crate::transport::properties::{
    FilterOptions, FilterOverrides, PropertyBag, read_property, write_property,
};
use crate::transport::{PropertyError, Transport, TransportError};
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const GRAYLOG_NAME: &str = "Graylog";

fn system_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraylogSettings {
    /// Collector address: an IP literal or a hostname to resolve.
    pub host: String,
    pub port: u16,
    /// Value of the envelope's `host` field.
    pub from_hostname: String,
    pub facility: String,
    pub service: String,
    pub version: String,
    /// Largest datagram payload before a message is chunked.
    pub chunk_size: usize,
    /// First `_logSequence` value; 0 leaves the field out.
    pub data_sequence: u64,
    pub additional_fields: Map<String, Value>,
    #[serde(with = "serde_helpers")]
    pub resolve_timeout: Duration,
}

impl Default for GraylogSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 12202,
            from_hostname: system_hostname(),
            facility: "rust".to_string(),
            service: "api".to_string(),
            version: "1.0".to_string(),
            chunk_size: 1100,
            data_sequence: 0,
            additional_fields: Map::new(),
            resolve_timeout: Duration::from_millis(5000),
        }
    }
}

impl GraylogSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }
}

/// Where datagrams go, as far as resolution has got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressState {
    Resolving,
    Resolved(SocketAddr),
    Failed(String),
}

#[derive(Debug)]
struct AddressSlot {
    /// Bumped on every new resolution so stale lookups are discarded.
    epoch: u64,
    state: AddressState,
}

/// Sends records to a Graylog-compatible collector over UDP.
///
/// Each record becomes a zlib-compressed JSON envelope. Envelopes larger
/// than `chunk_size` are split into at most 128 chunks. All network work
/// (name resolution and sending) runs on tokio tasks; `deliver` only
/// encodes and spawns.
#[derive(Debug)]
pub struct GraylogTransport {
    filters: FilterOverrides,
    settings: PropertyBag<GraylogSettings>,
    address: Arc<RwLock<AddressSlot>>,
    sequence: AtomicU64,
    stats: DatagramStats,
    shutdown: CancellationToken,
}

impl GraylogTransport {
    pub fn new(settings: GraylogSettings) -> Result<Self, TransportError> {
        Self::with_filters(settings, FilterOverrides::default())
    }

    pub fn with_filters(settings: GraylogSettings, filters: FilterOverrides) -> Result<Self, TransportError> {
        validate(&settings)?;

        let transport = Self {
            filters,
            sequence: AtomicU64::new(settings.data_sequence),
            settings: PropertyBag::new(settings),
            address: Arc::new(RwLock::new(AddressSlot {
                epoch: 0,
                state: AddressState::Resolving,
            })),
            stats: DatagramStats::new(),
            shutdown: CancellationToken::new(),
        };

        transport.resolve();
        Ok(transport)
    }

    pub fn from_options(options: &Map<String, Value>) -> Result<Self, TransportError> {
        let value = Value::Object(options.clone());
        let filters: FilterOptions = serde_json::from_value(value.clone())
            .map_err(|e| TransportError::Configuration(format!("graylog filters: {e}")))?;
        let settings: GraylogSettings = serde_json::from_value(value)
            .map_err(|e| TransportError::Configuration(format!("graylog options: {e}")))?;

        Self::with_filters(settings, FilterOverrides::from_options(filters))
    }

    pub fn settings(&self) -> GraylogSettings {
        self.settings.snapshot()
    }

    pub fn address_state(&self) -> AddressState {
        self.address.read().state.clone()
    }

    pub fn address(&self) -> Option<SocketAddr> {
        match self.address.read().state {
            AddressState::Resolved(addr) => Some(addr),
            _ => None,
        }
    }

    /// Why sending is disabled, if resolving the host failed.
    pub fn resolution_error(&self) -> Option<TransportError> {
        match &self.address.read().state {
            AddressState::Failed(reason) => Some(resolution_error(&self.settings.read().host, reason)),
            _ => None,
        }
    }

    pub fn stats(&self) -> DatagramMetrics {
        self.stats.snapshot()
    }

    /// Start resolving the configured host, replacing any earlier result.
    fn resolve(&self) {
        let (host, port, timeout) = {
            let settings = self.settings.read();
            (settings.host.clone(), settings.port, settings.resolve_timeout)
        };

        let epoch = {
            let mut slot = self.address.write();
            slot.epoch += 1;

            if let Ok(ip) = host.parse::<IpAddr>() {
                slot.state = AddressState::Resolved(SocketAddr::new(ip, port));
                return;
            }

            slot.state = AddressState::Resolving;
            slot.epoch
        };

        let Ok(handle) = Handle::try_current() else {
            let reason = "hostname resolution needs a tokio runtime".to_string();
            report_resolution_failure(&host, &reason);
            self.address.write().state = AddressState::Failed(reason);
            return;
        };

        let slot = self.address.clone();
        let cancelled = self.shutdown.clone();

        handle.spawn(async move {
            let lookup = tokio::time::timeout(timeout, tokio::net::lookup_host((host.as_str(), port)));

            let state = tokio::select! {
                _ = cancelled.cancelled() => return,
                result = lookup => match result {
                    Ok(Ok(addrs)) => {
                        let addrs: Vec<SocketAddr> = addrs.collect();
                        match addrs.iter().find(|a| a.is_ipv4()).or_else(|| addrs.first()) {
                            Some(addr) => AddressState::Resolved(*addr),
                            None => AddressState::Failed("no addresses returned".to_string()),
                        }
                    }
                    Ok(Err(e)) => AddressState::Failed(e.to_string()),
                    Err(_) => AddressState::Failed(format!("timed out after {timeout:?}")),
                },
            };

            let mut slot = slot.write();
            if slot.epoch != epoch {
                return;
            }

            match &state {
                AddressState::Resolved(addr) => debug!(host = %host, address = %addr, "Resolved Graylog host"),
                AddressState::Failed(reason) => report_resolution_failure(&host, reason),
                AddressState::Resolving => {}
            }
            slot.state = state;
        });
    }

    fn next_sequence(&self, enabled: bool) -> Option<u64> {
        enabled.then(|| self.sequence.fetch_add(1, Ordering::Relaxed))
    }
}

fn resolution_error(host: &str, reason: &str) -> TransportError {
    TransportError::Resolution {
        host: host.to_string(),
        reason: reason.to_string(),
    }
}

fn report_resolution_failure(host: &str, reason: &str) {
    let error = resolution_error(host, reason);
    warn!(error = %error, "Graylog sending disabled");
}

fn validate(settings: &GraylogSettings) -> Result<(), TransportError> {
    if settings.host.is_empty() {
        return Err(TransportError::Configuration(
            "graylog transport requires a host".to_string(),
        ));
    }
    if settings.chunk_size == 0 {
        return Err(TransportError::Configuration(
            "graylog chunk_size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

impl Transport for GraylogTransport {
    fn name(&self) -> &str {
        GRAYLOG_NAME
    }

    fn filters(&self) -> &FilterOverrides {
        &self.filters
    }

    fn deliver(&self, record: &Arc<LogRecord>) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            self.stats.record_drop();
            return Err(TransportError::Closed);
        }

        let Ok(handle) = Handle::try_current() else {
            self.stats.record_drop();
            return Err(TransportError::Configuration(
                "graylog transport needs a tokio runtime to send".to_string(),
            ));
        };

        let target = match self.address_state() {
            AddressState::Resolved(addr) => addr,
            AddressState::Resolving => {
                debug!(group = %record.group, "Graylog address not resolved yet; dropping record");
                self.stats.record_drop();
                return Ok(());
            }
            // Already reported when resolution failed
            AddressState::Failed(_) => {
                self.stats.record_drop();
                return Ok(());
            }
        };

        let (payload, chunk_size) = {
            let settings = self.settings.read();
            let fields = EnvelopeFields {
                host: &settings.from_hostname,
                facility: &settings.facility,
                service: &settings.service,
                version: &settings.version,
                additional_fields: &settings.additional_fields,
                sequence: self.next_sequence(settings.data_sequence != 0),
            };
            (encode(record, &fields)?, settings.chunk_size)
        };

        let datagrams = match plan_datagrams(Bytes::from(payload), chunk_size, message_id()) {
            Ok(datagrams) => datagrams,
            Err(e) => {
                self.stats.record_drop();
                return Err(e);
            }
        };

        handle.spawn(send_datagrams(datagrams, target, self.stats.clone()));
        Ok(())
    }

    fn property(&self, key: &str) -> Option<Value> {
        if key == "data_sequence" && self.settings.read().data_sequence != 0 {
            return Some(Value::from(self.sequence.load(Ordering::Relaxed)));
        }
        read_property(&self.filters, &self.settings, key)
    }

    fn set_property(&self, key: &str, value: Value) -> Result<(), PropertyError> {
        if FilterOverrides::is_filter_key(key) {
            return write_property(GRAYLOG_NAME, &self.filters, &self.settings, key, value);
        }

        self.settings
            .set_validated(GRAYLOG_NAME, key, value, |s| validate(s).map_err(|e| e.to_string()))?;

        match key {
            "host" | "port" => self.resolve(),
            "data_sequence" => {
                let start = self.settings.read().data_sequence;
                self.sequence.store(start, Ordering::Relaxed);
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}

/// Send every datagram of one message from a fresh socket.
///
/// The socket is dropped once the last datagram has been handed off.
async fn send_datagrams(datagrams: Vec<Bytes>, target: SocketAddr, stats: DatagramStats) {
    let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "Failed to bind UDP socket for Graylog");
            stats.record_failure();
            stats.record_drop();
            return;
        }
    };

    let total = datagrams.len();
    let mut failed = 0;

    for (index, datagram) in datagrams.iter().enumerate() {
        match socket.send_to(datagram, target).await {
            Ok(sent) => stats.record_datagram(sent),
            Err(e) => {
                warn!(target = %target, index, total, error = %e, "Failed to send Graylog datagram");
                stats.record_failure();
                failed += 1;
            }
        }
    }

    if failed == 0 {
        stats.record_message();
    } else {
        stats.record_drop();
    }
    debug!(target = %target, datagrams = total, failed, "Sent Graylog message");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::chunking::{CHUNK_HEADER_SIZE, CHUNK_MAGIC, ChunkDescriptor};
    use flate2::read::ZlibDecoder;
    use serde_json::json;
    use std::io::Read;

    async fn collector() -> (UdpSocket, u16) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        (socket, port)
    }

    async fn recv(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = vec![0u8; 65_536];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .expect("datagram should arrive")
            .unwrap();
        buf.truncate(len);
        buf
    }

    fn inflate(data: &[u8]) -> Value {
        let mut json = String::new();
        ZlibDecoder::new(data).read_to_string(&mut json).unwrap();
        serde_json::from_str(&json).unwrap()
    }

    /// Text that compresses poorly.
    fn noise(len: u32) -> String {
        (0..len)
            .map(|i| char::from(b'a' + ((i.wrapping_mul(2_654_435_761) >> 13) % 26) as u8))
            .collect()
    }

    #[test]
    fn test_host_is_required() {
        let result = GraylogTransport::new(GraylogSettings::default());
        assert!(matches!(result, Err(TransportError::Configuration(_))));
    }

    #[test]
    fn test_ip_literal_resolves_immediately() {
        let transport = GraylogTransport::new(GraylogSettings::new("127.0.0.1", 12202)).unwrap();
        assert_eq!(transport.address(), Some("127.0.0.1:12202".parse().unwrap()));
        assert!(transport.resolution_error().is_none());

        let transport = GraylogTransport::new(GraylogSettings::new("::1", 12202)).unwrap();
        assert_eq!(transport.address(), Some("[::1]:12202".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_sends_single_datagram() {
        let (socket, port) = collector().await;
        let transport = GraylogTransport::new(GraylogSettings::new("127.0.0.1", port)).unwrap();

        let record = LogRecord::new("api:users", "created").with_properties(
            json!({ "user": 7 }).as_object().cloned().unwrap(),
        );
        transport.deliver(&Arc::new(record)).unwrap();

        let datagram = recv(&socket).await;
        assert_ne!(datagram[..2], CHUNK_MAGIC);

        let envelope = inflate(&datagram);
        assert_eq!(envelope["short_message"], json!("created"));
        assert_eq!(envelope["baseGroup"], json!("api"));
        assert_eq!(envelope["facility"], json!("rust"));
        assert_eq!(envelope["user"], json!(7));
    }

    #[tokio::test]
    async fn test_sends_chunked_message() {
        let (socket, port) = collector().await;
        let mut settings = GraylogSettings::new("127.0.0.1", port);
        settings.chunk_size = 64;
        let transport = GraylogTransport::new(settings).unwrap();

        let noise = noise(2000);
        transport
            .deliver(&Arc::new(LogRecord::new("info", noise.clone())))
            .unwrap();

        let first = ChunkDescriptor::decode(&Bytes::from(recv(&socket).await)).unwrap();
        let total = first.sequence_count as usize;
        assert!(total > 1);

        let mut chunks = vec![first];
        for _ in 1..total {
            chunks.push(ChunkDescriptor::decode(&Bytes::from(recv(&socket).await)).unwrap());
        }
        chunks.sort_by_key(|c| c.sequence_index);

        assert!(chunks.iter().all(|c| c.message_id == chunks[0].message_id));
        assert!(chunks.iter().all(|c| c.payload.len() <= 64));

        let payload: Vec<u8> = chunks.iter().flat_map(|c| c.payload.to_vec()).collect();
        assert_eq!(inflate(&payload)["short_message"], json!(noise));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = transport.stats();
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.chunks_sent, total as u64);
        assert!(stats.bytes_sent > (CHUNK_HEADER_SIZE * total) as u64);
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let mut settings = GraylogSettings::new("127.0.0.1", 9);
        settings.chunk_size = 1;
        let transport = GraylogTransport::new(settings).unwrap();

        let err = transport
            .deliver(&Arc::new(LogRecord::new("info", noise(1000))))
            .unwrap_err();

        assert!(matches!(err, TransportError::PayloadTooLarge { .. }));
        assert_eq!(transport.stats().messages_dropped, 1);
        assert_eq!(transport.stats().chunks_sent, 0);
    }

    #[tokio::test]
    async fn test_sequence_counter() {
        let (socket, port) = collector().await;
        let mut settings = GraylogSettings::new("127.0.0.1", port);
        settings.data_sequence = 10;
        let transport = GraylogTransport::new(settings).unwrap();

        transport.deliver(&Arc::new(LogRecord::new("info", "a"))).unwrap();
        let first = inflate(&recv(&socket).await);
        transport.deliver(&Arc::new(LogRecord::new("info", "b"))).unwrap();
        let second = inflate(&recv(&socket).await);

        assert_eq!(first["_logSequence"], json!(10));
        assert_eq!(second["_logSequence"], json!(11));
        assert_eq!(transport.property("data_sequence"), Some(json!(12)));
    }

    #[tokio::test]
    async fn test_hostname_resolution() {
        let (socket, port) = collector().await;
        let transport = GraylogTransport::new(GraylogSettings::new("localhost", port)).unwrap();

        for _ in 0..100 {
            if transport.address_state() != AddressState::Resolving {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let Some(addr) = transport.address() else {
            panic!("localhost should resolve, got {:?}", transport.address_state());
        };
        assert_eq!(addr.port(), port);

        if addr.is_ipv4() {
            transport.deliver(&Arc::new(LogRecord::new("info", "resolved"))).unwrap();
            assert_eq!(inflate(&recv(&socket).await)["short_message"], json!("resolved"));
        }
    }

    #[tokio::test]
    async fn test_records_dropped_while_resolving_or_failed() {
        let mut settings = GraylogSettings::new("nonexistent.invalid", 12202);
        settings.resolve_timeout = Duration::from_millis(50);
        let transport = GraylogTransport::new(settings).unwrap();

        transport.deliver(&Arc::new(LogRecord::new("info", "early"))).unwrap();

        for _ in 0..250 {
            if matches!(transport.address_state(), AddressState::Failed(_)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(matches!(transport.address_state(), AddressState::Failed(_)));
        assert!(matches!(
            transport.resolution_error(),
            Some(TransportError::Resolution { ref host, .. }) if host == "nonexistent.invalid"
        ));
        transport.deliver(&Arc::new(LogRecord::new("info", "late"))).unwrap();
        assert_eq!(transport.stats().messages_dropped, 2);
    }

    #[test]
    fn test_without_runtime_hostname_fails_and_deliver_errors() {
        let transport = GraylogTransport::new(GraylogSettings::new("localhost", 12202)).unwrap();

        assert!(matches!(transport.address_state(), AddressState::Failed(_)));
        assert!(matches!(
            transport.resolution_error(),
            Some(TransportError::Resolution { ref reason, .. }) if reason.contains("runtime")
        ));

        let err = transport
            .deliver(&Arc::new(LogRecord::new("info", "offline")))
            .unwrap_err();
        assert!(matches!(err, TransportError::Configuration(_)));
        assert_eq!(transport.stats().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_port_change_retargets() {
        let transport = GraylogTransport::new(GraylogSettings::new("127.0.0.1", 1000)).unwrap();

        transport.set_property("port", json!(2000)).unwrap();
        assert_eq!(transport.address(), Some("127.0.0.1:2000".parse().unwrap()));

        let err = transport.set_property("chunk_size", json!(0)).unwrap_err();
        assert!(matches!(err, PropertyError::Invalid { .. }));
        assert_eq!(transport.settings().chunk_size, 1100);
    }

    #[tokio::test]
    async fn test_close_stops_sending() {
        let transport = GraylogTransport::new(GraylogSettings::new("127.0.0.1", 9)).unwrap();
        transport.close();

        let result = transport.deliver(&Arc::new(LogRecord::new("info", "after close")));
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
