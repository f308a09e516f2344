use std::collections::BTreeMap;
use shared::{Node, Scope};
use crate::error::ScrapeError;
use super::device::uptime_percent;
use super::fields::{integer, number, number_or, text, unsigned};
use super::Readings;

/// Labels identifying one peer. Hostname prefers what the peer reports about
/// itself over the locally assigned name.
pub fn peer_labels(peer: &Node) -> BTreeMap<String, String> {
    let remote = peer.get("remote");
    let hostname = match remote.get("hostname") {
        Node::Scalar(hostname) => hostname,
        Node::Store(_) => text(peer, "name"),
    };

    let mut labels = BTreeMap::from([
        ("remote_mac".to_string(), text(peer, "mac")),
        ("remote_lastip".to_string(), text(peer, "lastip")),
        ("remote_hostname".to_string(), hostname),
    ]);
    for (label, field) in [("remote_platform", "platform"), ("remote_version", "version")] {
        let value = text(&remote, field);
        if !value.is_empty() {
            labels.insert(label.to_string(), value);
        }
    }
    labels
}

const PEER_GAUGES: &[(&str, &str, &str)] = &[
    ("airos_remote_ccq_percent", "Remote CCQ", "ccq"),
    ("airos_remote_tx_rate_mbps", "Remote TX Rate", "tx"),
    ("airos_remote_rx_rate_mbps", "Remote RX Rate", "rx"),
];

const PEER_RADIO_GAUGES: &[(&str, &str, &str)] = &[
    ("airos_remote_rssi_dbm", "Remote RSSI", "rssi"),
    ("airos_remote_tx_power_dbm", "Remote TX Power", "txpower"),
    ("airos_remote_tx_signal_dbm", "Signal received by remote device", "signal"),
    ("airos_remote_noise_floor_dbm", "Remote Noise Floor", "noisefloor"),
    ("airos_remote_distance_meters", "Remote Distance", "distance"),
];

const PEER_COUNTERS: &[(&str, &str, &str)] = &[
    ("airos_remote_tx_bytes_total", "Bytes sent by remote device", "stats.tx_bytes"),
    ("airos_remote_rx_bytes_total", "Bytes received by remote device", "stats.rx_bytes"),
];

const PEER_AIRMAX_GAUGES: &[(&str, &str, &str)] = &[
    ("airos_remote_amq", "Remote airMax Quality", "airmax.quality"),
    ("airos_remote_amc", "Remote airMax Capacity", "airmax.capacity"),
    ("airos_remote_airmax_priority", "Remote airMax Priority", "airmax.priority"),
];

/// Readings for the peer at `position` in the station list, labelled with
/// the device labels plus its own.
pub fn derive(
    position: usize,
    peer: &Node,
    device_labels: &BTreeMap<String, String>,
    device_uptime: i64,
) -> Result<Readings, ScrapeError> {
    let mut labels = device_labels.clone();
    labels.extend(peer_labels(peer));
    let mut out = Readings::new(labels, Scope::Peer(position));

    for (name, help, field) in PEER_GAUGES {
        out.gauge(name, help, number(peer, field)?);
    }

    out.gauge(
        "airos_remote_tx_latency_seconds",
        "Remote TX Latency",
        number_or(peer, "tx_latency", 0.0)? / 1000.0,
    );

    for (name, help, field) in PEER_RADIO_GAUGES {
        out.gauge(name, help, number(peer, field)?);
    }

    for (name, help, field) in PEER_COUNTERS {
        out.counter(name, help, unsigned(peer, field)? as f64);
    }

    for (name, help, field) in PEER_AIRMAX_GAUGES {
        out.gauge(name, help, number(peer, field)?);
    }

    out.gauge(
        "airos_remote_uptime_perc",
        "Wireless Service Uptime (Percentage)",
        uptime_percent(integer(peer, "uptime")?, device_uptime)?,
    );

    Ok(out)
}
