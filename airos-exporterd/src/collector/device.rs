use std::collections::BTreeMap;
use shared::Store;
use crate::error::ScrapeError;
use super::fields::{integer, number, number_or, percent, text, unsigned};
use super::Readings;

/// Location of the wireless utilization counters in `ubntbox status`.
/// Assumes the wireless interface is the third entry, which holds for
/// stock firmware but is not guaranteed.
pub const UTILIZATION_PATH: &str = "interfaces.2.wireless.utilization";

pub const ANTENNA_GAIN_PATH: &str = "board.radio.0.antenna.0.gain";

/// Device-scoped labels from aggregate status.
pub fn device_labels(aggregate: &Store) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("ap_mac".to_string(), text(aggregate, "apMac")),
        ("device_id".to_string(), text(aggregate, "deviceId")),
        ("device_name".to_string(), text(aggregate, "deviceName")),
        ("wireless_mode".to_string(), text(aggregate, "wlanOpmode")),
    ])
}

pub fn ram_usage_percent(total: f64, free: f64) -> Result<f64, ScrapeError> {
    percent(total - free, total, "ram usage")
}

/// Share of device uptime the link has been up, truncated.
pub fn uptime_percent(link_uptime: i64, device_uptime: i64) -> Result<f64, ScrapeError> {
    Ok(percent(link_uptime as f64, device_uptime as f64, "uptime percentage")?.trunc())
}

/// RX and TX share of busy airtime, truncated.
pub fn busy_percent(rx_busy: f64, tx_busy: f64, busy: f64) -> Result<(f64, f64), ScrapeError> {
    let rx = percent(rx_busy, busy, "rx busy percentage")?.trunc();
    let tx = percent(tx_busy, busy, "tx busy percentage")?.trunc();
    Ok((rx, tx))
}

/// Gauges read straight from aggregate status: (metric, help, field).
const AGGREGATE_GAUGES: &[(&str, &str, &str)] = &[
    ("airos_airmax_quality_percents", "The airMax Quality (AMQ) is based on the number of retries and the quality of the physical link", "wlanPollingQuality"),
    ("airos_airmax_capacity_percents", "The airMax Capacity (AMC) is based on the ratio of current rate and maximum rate", "wlanPollingCapacity"),
    ("airos_wlan_tx_rate_mbps", "Radio TX rate", "wlanTxRate"),
    ("airos_wlan_rx_rate_mbps", "Radio RX rate", "wlanRxRate"),
    ("airos_signal_dbm", "Signal", "signal"),
    ("airos_chanbw_mhz", "Channel Width", "chanbw"),
    ("airos_center_freq_mhz", "Frequency", "centerFreq"),
    ("airos_tx_power_dbm", "TX Power", "txPower"),
    ("airos_chain_0_signal_dbm", "Chan 0 Signal", "chain0Signal"),
    ("airos_chain_1_signal_dbm", "Chan 1 Signal", "chain1Signal"),
    ("airos_noise_dbm", "Noise Floor", "noise"),
    ("airos_distance_meter", "Distance", "distance"),
    ("airos_lan_plugged", "LAN plugged", "lanPlugged"),
];

const AGGREGATE_COUNTERS: &[(&str, &str, &str)] = &[
    ("airos_lan_rx_packets_total", "LAN RX packets", "lanRxPackets"),
    ("airos_lan_tx_packets_total", "LAN TX packets", "lanTxPackets"),
    ("airos_wlan_rx_packets_total", "WLAN RX packets", "wlanRxPackets"),
    ("airos_wlan_tx_packets_total", "WLAN TX packets", "wlanTxPackets"),
    ("airos_lan_rx_bytes_total", "LAN RX bytes", "lanRxBytes"),
    ("airos_lan_tx_bytes_total", "LAN TX bytes", "lanTxBytes"),
    ("airos_wlan_rx_bytes_total", "WLAN RX bytes", "wlanRxBytes"),
    ("airos_wlan_tx_bytes_total", "WLAN TX bytes", "wlanTxBytes"),
];

/// Readings describing the polled device itself.
pub fn derive(
    aggregate: &Store,
    status: &Store,
    peers: &Store,
    out: &mut Readings,
) -> Result<(), ScrapeError> {
    out.gauge("airos_device_load_avg", "Device Load Average", number(aggregate, "loadavg")?);

    let mem_total = number(aggregate, "memTotal")?;
    let mem_free = number(aggregate, "memFree")?;
    out.gauge(
        "airos_device_ram_usage_percent",
        "Device RAM Usage",
        ram_usage_percent(mem_total, mem_free)?,
    );

    for (name, help, field) in AGGREGATE_GAUGES {
        out.gauge(name, help, number(aggregate, field)?);
    }

    out.gauge("airos_ccq_percent", "CCQ", number(aggregate, "ccq")? / 10.0);

    let peer_count = peers.iter().count();
    // presence of the key, even when empty or null
    let extra_reporting = peers
        .iter()
        .filter(|(_, peer)| !peer.get("remote").is_empty())
        .count();
    out.gauge("airos_remote_devices", "Remote Devices", peer_count as f64);
    out.gauge(
        "airos_remote_devices_extra_reporting",
        "Remote Devices with Extra Reporting",
        extra_reporting as f64,
    );

    for (name, help, field) in AGGREGATE_COUNTERS {
        out.counter(name, help, unsigned(aggregate, field)? as f64);
    }

    out.gauge(
        "airos_wireless_service_uptime_perc",
        "Wireless Service Uptime (Percentage)",
        uptime_percent(integer(aggregate, "wlanUptime")?, integer(aggregate, "uptime")?)?,
    );

    out.gauge(
        "airos_antenna_gain_dbm",
        "Antenna Gain, dBi",
        number_or(status, ANTENNA_GAIN_PATH, 0.0)?,
    );

    let utilization = status.path(UTILIZATION_PATH);
    let (rx_busy, tx_busy) = busy_percent(
        number(&utilization, "rx_busy")?,
        number(&utilization, "tx_busy")?,
        number(&utilization, "busy")?,
    )?;
    out.gauge("airos_wlan_rx_busy_percentage", "RX Busy (Percentage)", rx_busy);
    out.gauge("airos_wlan_tx_busy_percentage", "TX Busy (Percentage)", tx_busy);

    Ok(())
}
