use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use shared::{MetricKind, MetricReading, Scope};

/// Split readings into one block per scope, in order of first appearance.
fn blocks(readings: &[MetricReading]) -> Vec<(&Scope, Vec<&MetricReading>)> {
    let mut blocks: Vec<(&Scope, Vec<&MetricReading>)> = Vec::new();
    for reading in readings {
        match blocks.iter_mut().find(|(scope, _)| **scope == reading.scope) {
            Some((_, block)) => block.push(reading),
            None => blocks.push((&reading.scope, vec![reading])),
        }
    }
    blocks
}

fn register(registry: &Registry, reading: &MetricReading) -> prometheus::Result<()> {
    let names: Vec<&str> = reading.labels.keys().map(String::as_str).collect();
    let values: Vec<&str> = reading.labels.values().map(String::as_str).collect();
    let opts = Opts::new(reading.name.as_str(), reading.help.as_str());

    match reading.kind {
        MetricKind::Gauge => {
            let gauge = GaugeVec::new(opts, &names)?;
            gauge.get_metric_with_label_values(&values)?.set(reading.value);
            registry.register(Box::new(gauge))
        }
        MetricKind::Counter => {
            let counter = CounterVec::new(opts, &names)?;
            counter.get_metric_with_label_values(&values)?.inc_by(reading.value);
            registry.register(Box::new(counter))
        }
    }
}

/// Prometheus text exposition: a registry per block, encoded back to back.
pub fn render(readings: &[MetricReading]) -> prometheus::Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();

    for (_, block) in blocks(readings) {
        let registry = Registry::new();
        for reading in block {
            register(&registry, reading)?;
        }
        encoder.encode(&registry.gather(), &mut body)?;
    }

    Ok(body)
}

pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
