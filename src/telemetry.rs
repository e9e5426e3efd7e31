//! # Telemetry Store
//!
//! [`MetricsSink`] is the seam between the scheduler and metric storage. The
//! scheduler owns an injected sink for the process lifetime; there is no
//! global registry. [`PrometheusSink`] keeps everything in its own
//! [`prometheus::Registry`] and renders the text exposition format.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::debug;

use crate::constants::{
    CONNECTION_METRIC_NAME, ERROR_COUNT_METRIC_NAME, INFO_METRIC_NAME, OVERRUN_METRIC_NAME,
    READ_LATENCY_METRIC_NAME,
};
use crate::error::{ExporterError, ExporterResult};
use crate::model::{LabelSet, MetricDescriptor, MetricModel, MetricSample, INDEX_LABEL};

/// Storage for data samples and scrape telemetry.
///
/// `labels` arguments of the per-register methods come from
/// [`MetricModel::register_labels`].
pub trait MetricsSink: Send + Sync {
    /// Create the per-register error counter at zero.
    fn init_register(&self, labels: &LabelSet) -> ExporterResult<()>;

    fn set_connection_up(&self, up: bool) -> ExporterResult<()>;

    fn observe_read_latency(&self, labels: &LabelSet, seconds: f64) -> ExporterResult<()>;

    fn increment_errors(&self, labels: &LabelSet) -> ExporterResult<()>;

    /// Replace the samples of one register.
    fn publish(&self, descriptor: &MetricDescriptor, samples: &[MetricSample]) -> ExporterResult<()>;

    /// Drop the samples of one register, e.g. after a failed read.
    fn forget(&self, descriptor: &MetricDescriptor) -> ExporterResult<()>;

    fn record_overrun(&self) -> ExporterResult<()>;
}

/// Latency buckets in seconds, from sub-millisecond to the default timeout.
const LATENCY_BUCKETS: [f64; 12] = [
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0,
];

fn label_names(labels: &LabelSet) -> Vec<&str> {
    labels.keys().map(String::as_str).collect()
}

fn as_map(labels: &LabelSet) -> HashMap<&str, &str> {
    labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Label set of a data sample as stored, with `index` filled in. An absent
/// index becomes the empty label value.
fn sample_labels(sample: &MetricSample) -> LabelSet {
    let mut labels = sample.labels.clone();
    labels.insert(
        INDEX_LABEL.to_string(),
        sample.index.map(|i| i.to_string()).unwrap_or_default(),
    );
    labels
}

/// Prometheus-backed [`MetricsSink`].
pub struct PrometheusSink {
    registry: Registry,
    connection_labels: LabelSet,
    connection_up: GaugeVec,
    read_latency: HistogramVec,
    error_count: IntCounterVec,
    overruns: IntCounterVec,
    /// Data gauges by metric name, created on first publish
    data: Mutex<HashMap<String, GaugeVec>>,
    /// Label sets currently published per register
    published: Mutex<HashMap<String, Vec<LabelSet>>>,
}

impl PrometheusSink {
    /// Register the telemetry metrics and set `{namespace}_info` to 1.
    pub fn new(model: &MetricModel) -> ExporterResult<Self> {
        let registry = Registry::new();
        let connection_labels = model.connection_labels();
        let connection_names = label_names(&connection_labels);

        let register_label_names = model.register_label_names();
        let register_names: Vec<&str> = register_label_names.iter().map(String::as_str).collect();

        let info = GaugeVec::new(
            Opts::new(
                model.metric_name(INFO_METRIC_NAME),
                "Information about the PLC Exporter",
            ),
            &connection_names,
        )?;
        let connection_up = GaugeVec::new(
            Opts::new(
                model.metric_name(CONNECTION_METRIC_NAME),
                "Connection status to the PLC",
            ),
            &connection_names,
        )?;
        let read_latency = HistogramVec::new(
            HistogramOpts::new(
                model.metric_name(READ_LATENCY_METRIC_NAME),
                "Read latency in seconds on a register",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &register_names,
        )?;
        let error_count = IntCounterVec::new(
            Opts::new(
                model.metric_name(ERROR_COUNT_METRIC_NAME),
                "Number of errors while reading from the register",
            ),
            &register_names,
        )?;
        let overruns = IntCounterVec::new(
            Opts::new(
                model.metric_name(OVERRUN_METRIC_NAME),
                "Number of scrape cycles that took longer than the scrape interval",
            ),
            &connection_names,
        )?;

        registry.register(Box::new(info.clone()))?;
        registry.register(Box::new(connection_up.clone()))?;
        registry.register(Box::new(read_latency.clone()))?;
        registry.register(Box::new(error_count.clone()))?;
        registry.register(Box::new(overruns.clone()))?;

        info.get_metric_with(&as_map(&connection_labels))?.set(1.0);
        overruns.get_metric_with(&as_map(&connection_labels))?;

        Ok(Self {
            registry,
            connection_labels,
            connection_up,
            read_latency,
            error_count,
            overruns,
            data: Mutex::new(HashMap::new()),
            published: Mutex::new(HashMap::new()),
        })
    }

    /// Render the registry in the text exposition format.
    pub fn encode_text(&self) -> ExporterResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| ExporterError::protocol(format!("exposition is not UTF-8: {}", e)))
    }

    fn gauge_for(&self, descriptor: &MetricDescriptor) -> ExporterResult<GaugeVec> {
        let mut data = lock(&self.data);
        if let Some(gauge) = data.get(&descriptor.name) {
            return Ok(gauge.clone());
        }
        let names: Vec<&str> = descriptor.label_names.iter().map(String::as_str).collect();
        let gauge = GaugeVec::new(Opts::new(descriptor.name.clone(), descriptor.help.clone()), &names)?;
        self.registry.register(Box::new(gauge.clone()))?;
        debug!("Registered metric {}", descriptor.name);
        data.insert(descriptor.name.clone(), gauge.clone());
        Ok(gauge)
    }

    fn remove_series(gauge: &GaugeVec, stale: &[LabelSet]) {
        for labels in stale {
            // Already absent is fine
            let _ = gauge.remove(&as_map(labels));
        }
    }
}

impl MetricsSink for PrometheusSink {
    fn init_register(&self, labels: &LabelSet) -> ExporterResult<()> {
        self.error_count.get_metric_with(&as_map(labels))?.inc_by(0);
        Ok(())
    }

    fn set_connection_up(&self, up: bool) -> ExporterResult<()> {
        let value = if up { 1.0 } else { 0.0 };
        self.connection_up
            .get_metric_with(&as_map(&self.connection_labels))?
            .set(value);
        Ok(())
    }

    fn observe_read_latency(&self, labels: &LabelSet, seconds: f64) -> ExporterResult<()> {
        self.read_latency
            .get_metric_with(&as_map(labels))?
            .observe(seconds);
        Ok(())
    }

    fn increment_errors(&self, labels: &LabelSet) -> ExporterResult<()> {
        self.error_count.get_metric_with(&as_map(labels))?.inc();
        Ok(())
    }

    fn publish(&self, descriptor: &MetricDescriptor, samples: &[MetricSample]) -> ExporterResult<()> {
        let gauge = self.gauge_for(descriptor)?;
        let current: Vec<LabelSet> = samples.iter().map(sample_labels).collect();

        let mut published = lock(&self.published);
        if let Some(previous) = published.get(&descriptor.series_key) {
            let stale: Vec<LabelSet> = previous
                .iter()
                .filter(|labels| !current.contains(labels))
                .cloned()
                .collect();
            Self::remove_series(&gauge, &stale);
        }

        for (sample, labels) in samples.iter().zip(&current) {
            gauge.get_metric_with(&as_map(labels))?.set(sample.value);
        }
        published.insert(descriptor.series_key.clone(), current);
        Ok(())
    }

    fn forget(&self, descriptor: &MetricDescriptor) -> ExporterResult<()> {
        let Some(stale) = lock(&self.published).remove(&descriptor.series_key) else {
            return Ok(());
        };
        if let Some(gauge) = lock(&self.data).get(&descriptor.name) {
            Self::remove_series(gauge, &stale);
        }
        Ok(())
    }

    fn record_overrun(&self) -> ExporterResult<()> {
        self.overruns
            .get_metric_with(&as_map(&self.connection_labels))?
            .inc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegisterDefinition;
    use crate::model::{DynamicLayout, StaticLayout};
    use crate::types::{RegisterType, TypeSpec, ValueType};
    use crate::value::RegisterValue;

    fn definition(name: &str, address: u16, value_type: ValueType, size: usize) -> RegisterDefinition {
        RegisterDefinition {
            name: name.to_string(),
            description: format!("{} help", name),
            address,
            size,
            spec: TypeSpec::new(value_type, size),
            mock_value: RegisterValue::zero(value_type, size),
        }
    }

    fn static_model() -> MetricModel {
        let mut labels = LabelSet::new();
        labels.insert("site".to_string(), "a".to_string());
        MetricModel::with_layout("plc", "master", labels, Box::new(StaticLayout))
    }

    #[test]
    fn test_info_and_connection() {
        let model = static_model();
        let sink = PrometheusSink::new(&model).unwrap();
        sink.set_connection_up(true).unwrap();

        let text = sink.encode_text().unwrap();
        assert!(text.contains("# HELP plc_info Information about the PLC Exporter"));
        assert!(text.contains("plc_info{plc=\"master\",site=\"a\"} 1"));
        assert!(text.contains("plc_connection_up{plc=\"master\",site=\"a\"} 1"));

        sink.set_connection_up(false).unwrap();
        let text = sink.encode_text().unwrap();
        assert!(text.contains("plc_connection_up{plc=\"master\",site=\"a\"} 0"));
    }

    #[test]
    fn test_error_counter_starts_at_zero() {
        let model = static_model();
        let sink = PrometheusSink::new(&model).unwrap();
        let def = definition("temperature", 0x10, ValueType::Int16, 1);
        let labels = model.register_labels(RegisterType::HoldingRegisters, &def);
        sink.init_register(&labels).unwrap();

        let series = "plc_error_count{name=\"temperature\",plc=\"master\",register_type=\"holding_registers\",site=\"a\",start_address=\"0x0010\"}";
        let text = sink.encode_text().unwrap();
        assert!(text.contains(&format!("{} 0", series)), "{}", text);

        sink.increment_errors(&labels).unwrap();
        sink.increment_errors(&labels).unwrap();
        sink.observe_read_latency(&labels, 0.002).unwrap();
        let text = sink.encode_text().unwrap();
        assert!(text.contains(&format!("{} 2", series)));
        assert!(text.contains("plc_read_time_seconds_count{name=\"temperature\""));
    }

    #[test]
    fn test_publish_scalar_without_index() {
        let model = static_model();
        let sink = PrometheusSink::new(&model).unwrap();
        let def = definition("temperature", 0x10, ValueType::Float32, 1);
        let descriptor = model.descriptor(RegisterType::HoldingRegisters, &def);
        let samples = model.samples(RegisterType::HoldingRegisters, &def, &RegisterValue::F32(21.5));
        sink.publish(&descriptor, &samples).unwrap();

        let text = sink.encode_text().unwrap();
        assert!(text.contains("# HELP plc_temperature temperature help"));
        assert!(text.contains(
            "plc_temperature{index=\"\",plc=\"master\",register_type=\"holding_registers\",site=\"a\",start_address=\"0x0010\",value_type=\"float32\"} 21.5"
        ), "{}", text);
    }

    #[test]
    fn test_publish_replaces_and_forget_removes() {
        let model = MetricModel::with_layout("plc", "master", LabelSet::new(), Box::new(DynamicLayout));
        let sink = PrometheusSink::new(&model).unwrap();
        let def = definition("serial", 0x20, ValueType::String, 4);
        let descriptor = model.descriptor(RegisterType::InputRegisters, &def);

        let samples = model.samples(RegisterType::InputRegisters, &def, &RegisterValue::from("TEST"));
        sink.publish(&descriptor, &samples).unwrap();
        let text = sink.encode_text().unwrap();
        assert_eq!(text.matches("plc_input_registers{").count(), 4);
        assert!(text.contains("index=\"3\""));

        let samples = model.samples(RegisterType::InputRegisters, &def, &RegisterValue::from("OK"));
        sink.publish(&descriptor, &samples).unwrap();
        let text = sink.encode_text().unwrap();
        assert_eq!(text.matches("plc_input_registers{").count(), 2);
        assert!(!text.contains("index=\"3\""));

        sink.forget(&descriptor).unwrap();
        let text = sink.encode_text().unwrap();
        assert!(!text.contains("plc_input_registers{"));
        // Forgetting twice is a no-op
        sink.forget(&descriptor).unwrap();
    }

    #[test]
    fn test_shared_metric_across_registers() {
        let model = MetricModel::with_layout("plc", "master", LabelSet::new(), Box::new(DynamicLayout));
        let sink = PrometheusSink::new(&model).unwrap();
        for (name, address) in [("a", 1), ("b", 2)] {
            let def = definition(name, address, ValueType::Uint16, 1);
            let descriptor = model.descriptor(RegisterType::HoldingRegisters, &def);
            let samples = model.samples(RegisterType::HoldingRegisters, &def, &RegisterValue::U16(7));
            sink.publish(&descriptor, &samples).unwrap();
        }
        let text = sink.encode_text().unwrap();
        assert_eq!(text.matches("# TYPE plc_holding_registers gauge").count(), 1);
        assert_eq!(text.matches("plc_holding_registers{").count(), 2);
    }

    #[test]
    fn test_overrun_counter() {
        let sink = PrometheusSink::new(&static_model()).unwrap();
        sink.record_overrun().unwrap();
        let text = sink.encode_text().unwrap();
        assert!(text.contains("plc_scrape_overrun_count{plc=\"master\",site=\"a\"} 1"));
    }
}
