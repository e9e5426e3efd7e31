//! # Scrape Scheduler
//!
//! Drives one polling cycle per scrape interval:
//!
//! 1. In mock mode, every register publishes its mock value and the
//!    transport is never touched.
//! 2. Otherwise an existing connection is reused or a new one opened. If
//!    that fails the connection gauge drops to 0 and the cycle ends.
//! 3. Registers are read one at a time in group order, decoded and
//!    published. A failed read or decode only affects its own register.
//! 4. A timeout or broken link drops the connection and the next register
//!    reconnects first. If that reconnect fails the rest of the cycle is
//!    skipped and the connection gauge drops to 0.
//!
//! Cycles run inline on the interval task and never overlap. Shutdown is
//! checked between registers, so an in-flight read always completes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::codec::RegisterCodec;
use crate::config::{ExporterConfig, RegisterDefinition, RegisterGroups};
use crate::error::{ExporterError, ExporterResult};
use crate::model::MetricModel;
use crate::telemetry::MetricsSink;
use crate::transport::{Connector, RegisterReader};
use crate::types::RegisterType;
use crate::value::RegisterValue;

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub connected: bool,
    /// Registers published
    pub reads: usize,
    /// Registers that failed to read or decode
    pub errors: usize,
    pub samples: usize,
    /// Shutdown was requested before every register was visited
    pub interrupted: bool,
    pub duration: Duration,
}

pub struct Scheduler<C: Connector, S: MetricsSink> {
    registers: Arc<RegisterGroups>,
    model: MetricModel,
    codec: RegisterCodec,
    sink: Arc<S>,
    connector: C,
    connection: Option<C::Connection>,
    mock: bool,
    scrape_interval: Duration,
    operation_timeout: Duration,
}

fn stop_requested(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.map(|rx| *rx.borrow()).unwrap_or(false)
}

impl<C: Connector, S: MetricsSink> Scheduler<C, S> {
    /// Build a scheduler and create every register's error counter at zero.
    pub fn new(config: &ExporterConfig, connector: C, sink: Arc<S>) -> Self {
        let runtime = &config.runtime;
        let scheduler = Self {
            registers: Arc::new(config.registers.clone()),
            model: MetricModel::new(runtime),
            codec: RegisterCodec::new(runtime.endianness, runtime.word_order),
            sink,
            connector,
            connection: None,
            mock: runtime.mock,
            scrape_interval: runtime.scrape_interval,
            operation_timeout: config.plc.timeout,
        };

        for (group, def) in scheduler.registers.iter() {
            let labels = scheduler.model.register_labels(group, def);
            scheduler.log_sink_error("init error counter", scheduler.sink.init_register(&labels));
        }
        scheduler
    }

    pub fn model(&self) -> &MetricModel {
        &self.model
    }

    fn log_sink_error(&self, operation: &str, result: ExporterResult<()>) {
        if let Err(e) = result {
            warn!("Failed to {}: {}", operation, e);
        }
    }

    /// Run cycles until `shutdown` turns true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.scrape_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Scraping {} registers every {:?} (layout={:?}, mock={})",
            self.registers.len(),
            self.scrape_interval,
            self.model.layout_kind(),
            self.mock
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let report = self.cycle(Some(&shutdown)).await;
            debug!(
                "Cycle finished in {:?}: connected={} reads={} errors={} samples={}",
                report.duration, report.connected, report.reads, report.errors, report.samples
            );
            if report.duration > self.scrape_interval {
                warn!(
                    "Scrape cycle took {:?}, longer than the {:?} interval",
                    report.duration, self.scrape_interval
                );
                self.log_sink_error("record overrun", self.sink.record_overrun());
            }
            if report.interrupted {
                break;
            }
        }
        info!("Scheduler stopped");
    }

    /// Run one cycle without a shutdown signal.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle(None).await
    }

    async fn cycle(&mut self, shutdown: Option<&watch::Receiver<bool>>) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        if self.mock {
            report.connected = true;
            self.log_sink_error("set connection status", self.sink.set_connection_up(true));
        } else {
            report.connected = self.ensure_connection().await;
            self.log_sink_error(
                "set connection status",
                self.sink.set_connection_up(report.connected),
            );
            if !report.connected {
                report.duration = started.elapsed();
                return report;
            }
        }

        let registers = Arc::clone(&self.registers);
        for (group, def) in registers.iter() {
            if stop_requested(shutdown) {
                report.interrupted = true;
                break;
            }
            // A link failure on the previous register dropped the connection.
            // Only a failed reconnect ends the cycle early.
            if !self.mock && self.connection.is_none() && !self.ensure_connection().await {
                report.connected = false;
                self.log_sink_error("set connection status", self.sink.set_connection_up(false));
                break;
            }

            let read_started = Instant::now();
            let result = if self.mock {
                Ok(def.mock_value.clone())
            } else {
                self.read_register(group, def).await
            };
            self.record(group, def, result, read_started.elapsed(), &mut report);
        }

        report.duration = started.elapsed();
        report
    }

    async fn ensure_connection(&mut self) -> bool {
        if self.connection.as_ref().is_some_and(|c| c.is_connected()) {
            return true;
        }
        self.connection = None;

        let result = match timeout(self.operation_timeout, self.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(ExporterError::timeout(
                "connect",
                self.operation_timeout.as_millis() as u64,
            )),
        };
        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                true
            }
            Err(e) => {
                error!("Could not connect to PLC: {}", e);
                false
            }
        }
    }

    async fn read_register(
        &mut self,
        group: RegisterType,
        def: &RegisterDefinition,
    ) -> ExporterResult<RegisterValue> {
        let count = u16::try_from(def.register_count())
            .map_err(|_| ExporterError::read(format!("{} registers exceed a single read", def.register_count())))?;
        let Some(connection) = self.connection.as_mut() else {
            return Err(ExporterError::connection("Not connected"));
        };

        let read = read_words(connection, group, def.address, count);
        let result = match timeout(self.operation_timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(ExporterError::timeout(
                format!("read {} {}", group, def.name),
                self.operation_timeout.as_millis() as u64,
            )),
        };
        let words = match result {
            Ok(words) => words,
            Err(e) => {
                // A cancelled or broken exchange leaves the stream unusable.
                if e.is_link_failure() {
                    self.connection = None;
                }
                return Err(e);
            }
        };
        Ok(self.codec.decode(&words, def.value_type(), def.size)?)
    }

    fn record(
        &self,
        group: RegisterType,
        def: &RegisterDefinition,
        result: ExporterResult<RegisterValue>,
        elapsed: Duration,
        report: &mut CycleReport,
    ) {
        let labels = self.model.register_labels(group, def);
        self.log_sink_error(
            "observe read latency",
            self.sink.observe_read_latency(&labels, elapsed.as_secs_f64()),
        );
        let descriptor = self.model.descriptor(group, def);

        match result {
            Ok(value) => {
                debug!("{} {} = {}", group, def.name, value);
                let samples = self.model.samples(group, def, &value);
                report.reads += 1;
                report.samples += samples.len();
                self.log_sink_error("publish samples", self.sink.publish(&descriptor, &samples));
            }
            Err(e) => {
                report.errors += 1;
                match &e {
                    ExporterError::Codec(codec) if codec.is_internal_defect() => error!(
                        "Decoding {} {} at {} hit an internal defect: {}",
                        group,
                        def.name,
                        def.start_address(),
                        codec
                    ),
                    _ => warn!(
                        "Failed to read {} {} at {}: {}",
                        group,
                        def.name,
                        def.start_address(),
                        e
                    ),
                }
                self.log_sink_error("count error", self.sink.increment_errors(&labels));
                self.log_sink_error("remove stale samples", self.sink.forget(&descriptor));
            }
        }
    }
}

/// Raw words of one register; bits become 0/1 words.
async fn read_words<R: RegisterReader>(
    connection: &mut R,
    group: RegisterType,
    address: u16,
    count: u16,
) -> ExporterResult<Vec<u16>> {
    let bits_to_words = |bits: Vec<bool>| bits.into_iter().map(u16::from).collect();
    match group {
        RegisterType::Coils => connection.read_coils(address, count).await.map(bits_to_words),
        RegisterType::DiscreteInputs => connection
            .read_discrete_inputs(address, count)
            .await
            .map(bits_to_words),
        RegisterType::InputRegisters => connection.read_input_registers(address, count).await,
        RegisterType::HoldingRegisters => connection.read_holding_registers(address, count).await,
    }
}
