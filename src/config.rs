//! # Configuration
//!
//! YAML configuration file and its validation. [`FileConfig`] mirrors the
//! file layout; [`FileConfig::validate`] turns it into an immutable
//! [`ExporterConfig`] or fails with the first [`ConfigError`] found. Nothing
//! touches the network before validation succeeds.
//!
//! ```yaml
//! exporter:
//!   port: 9075
//!   scrape_interval: 30s
//!   log_level: info
//! plc:
//!   host: 192.168.0.10
//!   port: 502
//!   word_order: little
//! metric_layout: static
//! static_labels:
//!   site: plant-a
//! holding_registers:
//!   - name: temperature
//!     description: Tank temperature
//!     address: 0x10
//!     value_type: float32
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::bytes::Endianness;
use crate::constants::{
    CONNECTION_METRIC_NAME, DEFAULT_EXPORTER_PORT, DEFAULT_IDENTIFIER, DEFAULT_NAMESPACE,
    DEFAULT_SCRAPE_INTERVAL_SECS, DEFAULT_TIMEOUT_MS, DEFAULT_UNIT_ID, ERROR_COUNT_METRIC_NAME,
    INFO_METRIC_NAME, MAX_READ_COILS, MAX_READ_REGISTERS, OVERRUN_METRIC_NAME,
    READ_LATENCY_METRIC_NAME,
};
use crate::error::ConfigError;
use crate::logging::LogLevel;
use crate::types::{RegisterType, TypeSpec, ValueType};
use crate::value::RegisterValue;

/// Labels the exporter sets itself; static labels may not reuse them.
pub const RESERVED_LABELS: [&str; 6] = [
    "plc",
    "name",
    "register_type",
    "start_address",
    "value_type",
    "index",
];

// ============================================================================
// File Schema
// ============================================================================

/// Metric naming layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// One metric per register, named after the register
    Static,
    /// One metric per register group, register carried in a `name` label
    #[default]
    Dynamic,
}

/// Raw configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub exporter: ExporterSection,
    pub plc: PlcSection,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_identifier")]
    pub identifier: String,
    #[serde(default)]
    pub metric_layout: LayoutKind,
    #[serde(default)]
    pub mock: bool,
    #[serde(default)]
    pub static_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub coils: Vec<RegisterEntry>,
    #[serde(default)]
    pub discrete_inputs: Vec<RegisterEntry>,
    #[serde(default)]
    pub input_registers: Vec<RegisterEntry>,
    #[serde(default)]
    pub holding_registers: Vec<RegisterEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterSection {
    #[serde(default = "default_exporter_port")]
    pub port: i64,
    #[serde(default = "default_scrape_interval", with = "humantime_serde")]
    pub scrape_interval: Duration,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            port: default_exporter_port(),
            scrape_interval: default_scrape_interval(),
            log_level: LogLevel::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlcSection {
    pub host: String,
    pub port: i64,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Bound on every connect and read
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub endianness: Endianness,
    #[serde(default)]
    pub word_order: Endianness,
}

/// One register as written in the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub address: i64,
    pub value_type: Option<String>,
    pub size: Option<i64>,
    pub mock: Option<MockValue>,
}

/// Mock value as YAML gives it; checked against the value type later.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MockValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_identifier() -> String {
    DEFAULT_IDENTIFIER.to_string()
}

fn default_exporter_port() -> i64 {
    i64::from(DEFAULT_EXPORTER_PORT)
}

fn default_scrape_interval() -> Duration {
    Duration::from_secs(DEFAULT_SCRAPE_INTERVAL_SECS)
}

fn default_unit_id() -> u8 {
    DEFAULT_UNIT_ID
}

fn default_timeout() -> Duration {
    Duration::from_millis(DEFAULT_TIMEOUT_MS)
}

// ============================================================================
// Validated Configuration
// ============================================================================

/// Settings shared by the metric model and the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    pub namespace: String,
    pub identifier: String,
    pub metric_layout: LayoutKind,
    pub mock: bool,
    pub static_labels: BTreeMap<String, String>,
    pub endianness: Endianness,
    pub word_order: Endianness,
    pub scrape_interval: Duration,
}

/// Where and how to reach the PLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlcConnection {
    pub host: String,
    pub port: u16,
    pub unit_id: u8,
    pub timeout: Duration,
}

impl PlcConnection {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A validated register descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterDefinition {
    pub name: String,
    pub description: String,
    pub address: u16,
    /// Declared character count; 1 for non-string types
    pub size: usize,
    pub spec: TypeSpec,
    pub mock_value: RegisterValue,
}

impl RegisterDefinition {
    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.spec.value_type
    }

    #[inline]
    pub fn register_count(&self) -> usize {
        self.spec.register_count
    }

    /// Address rendered as `0x` plus four lowercase hex digits.
    pub fn start_address(&self) -> String {
        format!("0x{:04x}", self.address)
    }
}

/// The four register groups, each in configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterGroups {
    groups: BTreeMap<RegisterType, Vec<RegisterDefinition>>,
}

impl RegisterGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: RegisterType, definition: RegisterDefinition) {
        self.groups.entry(group).or_default().push(definition);
    }

    pub fn get(&self, group: RegisterType) -> &[RegisterDefinition] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups in polling order: coils, discrete inputs, input registers,
    /// holding registers.
    pub fn iter(&self) -> impl Iterator<Item = (RegisterType, &RegisterDefinition)> + '_ {
        RegisterType::ALL
            .into_iter()
            .flat_map(move |group| self.get(group).iter().map(move |def| (group, def)))
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exporter process settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub log_level: LogLevel,
}

/// Fully validated configuration, immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    pub runtime: RuntimeConfig,
    pub plc: PlcConnection,
    pub server: ServerConfig,
    pub registers: RegisterGroups,
}

impl ExporterConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Loaded config file {}", path.display());
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = serde_yaml::from_str(text)?;
        file.validate()
    }
}

// ============================================================================
// Validation
// ============================================================================

impl FileConfig {
    pub fn validate(self) -> Result<ExporterConfig, ConfigError> {
        let server = ServerConfig {
            port: validate_port("exporter", self.exporter.port)?,
            log_level: self.exporter.log_level,
        };
        if self.exporter.scrape_interval.is_zero() {
            return Err(invalid_field("scrape_interval", "must be greater than zero"));
        }

        if self.plc.host.trim().is_empty() {
            return Err(invalid_field("plc.host", "must not be empty"));
        }
        if self.plc.timeout.is_zero() {
            return Err(invalid_field("plc.timeout", "must be greater than zero"));
        }
        let plc = PlcConnection {
            host: self.plc.host.trim().to_string(),
            port: validate_port("plc", self.plc.port)?,
            unit_id: self.plc.unit_id,
            timeout: self.plc.timeout,
        };

        if !is_valid_metric_name(&self.namespace) {
            return Err(invalid_field(
                "namespace",
                format!("'{}' is not a valid metric name prefix", self.namespace),
            ));
        }
        if self.identifier.is_empty() {
            return Err(invalid_field("identifier", "must not be empty"));
        }
        for label in self.static_labels.keys() {
            validate_static_label(label)?;
        }

        let mut registers = RegisterGroups::new();
        let entries = [
            (RegisterType::Coils, self.coils),
            (RegisterType::DiscreteInputs, self.discrete_inputs),
            (RegisterType::InputRegisters, self.input_registers),
            (RegisterType::HoldingRegisters, self.holding_registers),
        ];
        for (group, list) in entries {
            let mut seen = HashSet::new();
            for entry in list {
                let definition = validate_entry(group, entry)?;
                if !seen.insert(definition.name.clone()) {
                    return Err(ConfigError::DuplicateName {
                        group: group.to_string(),
                        name: definition.name,
                    });
                }
                if self.metric_layout == LayoutKind::Static {
                    validate_static_metric_name(&self.namespace, group, &definition.name)?;
                }
                registers.insert(group, definition);
            }
        }

        let runtime = RuntimeConfig {
            namespace: self.namespace,
            identifier: self.identifier,
            metric_layout: self.metric_layout,
            mock: self.mock,
            static_labels: self.static_labels,
            endianness: self.plc.endianness,
            word_order: self.plc.word_order,
            scrape_interval: self.exporter.scrape_interval,
        };

        Ok(ExporterConfig {
            runtime,
            plc,
            server,
            registers,
        })
    }
}

fn invalid_field(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

fn validate_port(field: &str, port: i64) -> Result<u16, ConfigError> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(ConfigError::InvalidPort {
            field: field.to_string(),
            port,
        }),
    }
}

fn validate_entry(group: RegisterType, entry: RegisterEntry) -> Result<RegisterDefinition, ConfigError> {
    let group_name = group.to_string();
    let name = entry.name.trim().to_string();
    if name.is_empty() {
        return Err(ConfigError::EmptyName { group: group_name });
    }

    let value_type = match (&entry.value_type, group.is_bit_table()) {
        (None, true) => ValueType::Bool,
        (None, false) => {
            return Err(ConfigError::MissingValueType {
                group: group_name,
                name,
            })
        }
        (Some(tag), is_bit_table) => {
            let value_type = ValueType::parse(tag).map_err(|_| ConfigError::UnsupportedType {
                group: group_name.clone(),
                name: name.clone(),
                tag: tag.clone(),
            })?;
            if is_bit_table && value_type != ValueType::Bool {
                return Err(ConfigError::InvalidValueType {
                    group: group_name,
                    name,
                    tag: tag.clone(),
                });
            }
            value_type
        }
    };

    let address = u16::try_from(entry.address).map_err(|_| ConfigError::AddressOutOfRange {
        group: group_name.clone(),
        name: name.clone(),
        address: entry.address,
    })?;

    let declared_size = entry.size.unwrap_or(1);
    let size = match usize::try_from(declared_size) {
        Ok(s) if s >= 1 => s,
        _ => {
            return Err(ConfigError::InvalidSize {
                group: group_name,
                name,
                size: declared_size,
            })
        }
    };
    let spec = TypeSpec::new(value_type, size);

    let max_count = if group.is_bit_table() {
        MAX_READ_COILS
    } else {
        MAX_READ_REGISTERS
    };
    if spec.register_count > max_count {
        return Err(ConfigError::InvalidSize {
            group: group_name,
            name,
            size: declared_size,
        });
    }

    let count = spec.register_count as u32;
    if u32::from(address) + count - 1 > u32::from(u16::MAX) {
        return Err(ConfigError::AddressSpanOverflow {
            group: group_name,
            name,
            address,
            count: count as u16,
        });
    }

    let mock_value = resolve_mock(value_type, size, entry.mock.as_ref()).map_err(|message| {
        ConfigError::InvalidMockValue {
            group: group_name.clone(),
            name: name.clone(),
            message,
        }
    })?;

    Ok(RegisterDefinition {
        name,
        description: entry.description,
        address,
        size,
        spec,
        mock_value,
    })
}

/// Check a configured mock value against its type. An absent value is the
/// type's zero.
pub fn resolve_mock(
    value_type: ValueType,
    size: usize,
    mock: Option<&MockValue>,
) -> Result<RegisterValue, String> {
    let Some(mock) = mock else {
        return Ok(RegisterValue::zero(value_type, size));
    };

    match value_type {
        ValueType::Bool => match mock {
            MockValue::Bool(b) => Ok(RegisterValue::Bool(*b)),
            MockValue::Unsigned(0) => Ok(RegisterValue::Bool(false)),
            MockValue::Unsigned(1) => Ok(RegisterValue::Bool(true)),
            other => Err(format!("expected a boolean, got {:?}", other)),
        },
        ValueType::Char => match mock {
            MockValue::Text(s) if s.len() == 1 && s.is_ascii() => {
                Ok(RegisterValue::Char(s.as_bytes()[0]))
            }
            other => Err(format!("expected a single ASCII character, got {:?}", other)),
        },
        ValueType::String => match mock {
            MockValue::Text(s) if !s.is_ascii() => Err(format!("'{}' is not ASCII", s)),
            MockValue::Text(s) if s.len() > size => Err(format!(
                "'{}' is longer than the declared size {}",
                s, size
            )),
            MockValue::Text(s) => {
                let mut codes = s.as_bytes().to_vec();
                codes.resize(size, 0);
                Ok(RegisterValue::Text(codes))
            }
            other => Err(format!("expected a string, got {:?}", other)),
        },
        ValueType::Float16 | ValueType::Float32 | ValueType::Float64 => {
            let value = match mock {
                MockValue::Unsigned(u) => *u as f64,
                MockValue::Signed(i) => *i as f64,
                MockValue::Float(f) => *f,
                other => return Err(format!("expected a number, got {:?}", other)),
            };
            float_mock(value_type, value)
        }
        _ => {
            let value = match mock {
                MockValue::Unsigned(u) => i128::from(*u),
                MockValue::Signed(i) => i128::from(*i),
                MockValue::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i128,
                other => return Err(format!("expected an integer, got {:?}", other)),
            };
            integer_mock(value_type, value)
        }
    }
}

fn float_mock(value_type: ValueType, value: f64) -> Result<RegisterValue, String> {
    const F16_MAX: f64 = 65504.0;
    let limit = match value_type {
        ValueType::Float16 => F16_MAX,
        ValueType::Float32 => f64::from(f32::MAX),
        _ => f64::MAX,
    };
    if value.is_finite() && value.abs() > limit {
        return Err(format!(
            "{} out of accepted range for type {} [{}, {}]",
            value, value_type, -limit, limit
        ));
    }
    Ok(match value_type {
        ValueType::Float16 => RegisterValue::F16(value as f32),
        ValueType::Float32 => RegisterValue::F32(value as f32),
        _ => RegisterValue::F64(value),
    })
}

fn integer_mock(value_type: ValueType, value: i128) -> Result<RegisterValue, String> {
    let Some((min, max)) = value_type.integer_range() else {
        return Err(format!("{} does not take an integer mock", value_type));
    };
    if value < min || value > max {
        return Err(format!(
            "{} out of accepted range for type {} [{}, {}]",
            value, value_type, min, max
        ));
    }
    // Range checked above, the casts are lossless
    Ok(match value_type {
        ValueType::Uint8 => RegisterValue::U8(value as u8),
        ValueType::Int8 => RegisterValue::I8(value as i8),
        ValueType::Uint16 => RegisterValue::U16(value as u16),
        ValueType::Int16 => RegisterValue::I16(value as i16),
        ValueType::Uint32 => RegisterValue::U32(value as u32),
        ValueType::Int32 => RegisterValue::I32(value as i32),
        ValueType::Uint64 => RegisterValue::U64(value as u64),
        _ => RegisterValue::I64(value as i64),
    })
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn validate_static_label(label: &str) -> Result<(), ConfigError> {
    let message = if !is_valid_label_name(label) {
        "not a valid label name"
    } else if label.starts_with("__") {
        "names starting with '__' are reserved"
    } else if RESERVED_LABELS.contains(&label) {
        "collides with a label set by the exporter"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidLabel {
        label: label.to_string(),
        message: message.to_string(),
    })
}

/// In the static layout register names become metric names.
fn validate_static_metric_name(
    namespace: &str,
    group: RegisterType,
    name: &str,
) -> Result<(), ConfigError> {
    let field = format!("{}.{}", group, name);
    if !is_valid_metric_name(&format!("{}_{}", namespace, name)) {
        return Err(invalid_field(&field, "not usable as a metric name"));
    }
    let telemetry = [
        INFO_METRIC_NAME,
        CONNECTION_METRIC_NAME,
        READ_LATENCY_METRIC_NAME,
        ERROR_COUNT_METRIC_NAME,
        OVERRUN_METRIC_NAME,
    ];
    let histogram_suffixed = ["_bucket", "_sum", "_count"]
        .iter()
        .any(|suffix| name.strip_suffix(suffix) == Some(READ_LATENCY_METRIC_NAME));
    if telemetry.contains(&name) || histogram_suffixed {
        return Err(invalid_field(&field, "collides with an exporter metric"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "plc:\n  host: 10.0.0.1\n  port: 502\n";

    fn parse(extra: &str) -> Result<ExporterConfig, ConfigError> {
        ExporterConfig::from_yaml_str(&format!("{}{}", MINIMAL, extra))
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.server.port, 9075);
        assert_eq!(config.server.log_level, LogLevel::Info);
        assert_eq!(config.runtime.scrape_interval, Duration::from_secs(30));
        assert_eq!(config.runtime.namespace, "plc");
        assert_eq!(config.runtime.identifier, "master");
        assert_eq!(config.runtime.metric_layout, LayoutKind::Dynamic);
        assert!(!config.runtime.mock);
        assert_eq!(config.runtime.endianness, Endianness::Big);
        assert_eq!(config.runtime.word_order, Endianness::Big);
        assert_eq!(config.plc.unit_id, 1);
        assert_eq!(config.plc.timeout, Duration::from_secs(5));
        assert_eq!(config.plc.address(), "10.0.0.1:502");
        assert!(config.registers.is_empty());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
exporter:
  port: 9100
  scrape_interval: 1m 30s
  log_level: WARNING
plc:
  host: plc.local
  port: 5020
  unit_id: 3
  timeout: 750ms
  endianness: little
  word_order: little
namespace: factory
identifier: line1
metric_layout: static
mock: true
static_labels:
  site: plant-a
coils:
  - name: pump_on
    description: Pump running
    address: 0
    mock: true
input_registers:
  - name: serial
    description: Serial number
    address: 0x20
    value_type: string
    size: 5
    mock: AB12
holding_registers:
  - name: setpoint
    description: Temperature setpoint
    address: 100
    value_type: float32
    mock: 21.5
  - name: offset
    description: Calibration offset
    address: 102
    value_type: int16
    mock: -12
"#;
        let config = ExporterConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.log_level, LogLevel::Warning);
        assert_eq!(config.runtime.scrape_interval, Duration::from_secs(90));
        assert_eq!(config.plc.timeout, Duration::from_millis(750));
        assert_eq!(config.plc.unit_id, 3);
        assert_eq!(config.runtime.endianness, Endianness::Little);
        assert_eq!(config.runtime.metric_layout, LayoutKind::Static);
        assert_eq!(config.runtime.static_labels["site"], "plant-a");
        assert_eq!(config.registers.len(), 4);

        let coils = config.registers.get(RegisterType::Coils);
        assert_eq!(coils[0].value_type(), ValueType::Bool);
        assert_eq!(coils[0].mock_value, RegisterValue::Bool(true));

        let serial = &config.registers.get(RegisterType::InputRegisters)[0];
        assert_eq!(serial.register_count(), 3);
        assert_eq!(serial.start_address(), "0x0020");
        assert_eq!(serial.mock_value, RegisterValue::Text(b"AB12\0".to_vec()));

        let holding = config.registers.get(RegisterType::HoldingRegisters);
        assert_eq!(holding[0].mock_value, RegisterValue::F32(21.5));
        assert_eq!(holding[1].mock_value, RegisterValue::I16(-12));

        let order: Vec<_> = config.registers.iter().map(|(_, d)| d.name.as_str()).collect();
        assert_eq!(order, ["pump_on", "serial", "setpoint", "offset"]);
    }

    #[test]
    fn test_unknown_value_type() {
        let err = parse(
            "holding_registers:\n  - {name: a, description: x, address: 1, value_type: uint128}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedType { ref tag, .. } if tag == "uint128"));
    }

    #[test]
    fn test_coils_must_be_bool() {
        let err = parse("coils:\n  - {name: a, description: x, address: 1, value_type: uint16}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValueType { .. }));
    }

    #[test]
    fn test_registers_require_value_type() {
        let err = parse("input_registers:\n  - {name: a, description: x, address: 1}\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingValueType { .. }));
    }

    #[test]
    fn test_duplicate_name_in_group() {
        let err = parse(
            "holding_registers:\n  - {name: a, description: x, address: 1, value_type: uint16}\n  - {name: a, description: y, address: 2, value_type: uint16}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { ref name, .. } if name == "a"));
    }

    #[test]
    fn test_same_name_in_different_groups() {
        let config = parse(
            "input_registers:\n  - {name: a, description: x, address: 1, value_type: uint16}\nholding_registers:\n  - {name: a, description: y, address: 1, value_type: uint16}\n",
        )
        .unwrap();
        assert_eq!(config.registers.len(), 2);
    }

    #[test]
    fn test_address_range() {
        let err = parse("holding_registers:\n  - {name: a, description: x, address: 65536, value_type: uint16}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::AddressOutOfRange { address: 65536, .. }));

        let err = parse("holding_registers:\n  - {name: a, description: x, address: -1, value_type: uint16}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::AddressOutOfRange { .. }));

        let err = parse("holding_registers:\n  - {name: a, description: x, address: 65535, value_type: uint32}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::AddressSpanOverflow { count: 2, .. }));

        assert!(parse("holding_registers:\n  - {name: a, description: x, address: 65535, value_type: uint16}\n").is_ok());
    }

    #[test]
    fn test_invalid_size() {
        let err = parse("holding_registers:\n  - {name: a, description: x, address: 1, value_type: string, size: 0}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSize { size: 0, .. }));

        let err = parse("holding_registers:\n  - {name: a, description: x, address: 1, value_type: string, size: 251}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSize { .. }));
    }

    #[test]
    fn test_mock_validation() {
        assert_eq!(
            resolve_mock(ValueType::Uint8, 1, Some(&MockValue::Unsigned(255))),
            Ok(RegisterValue::U8(255))
        );
        assert!(resolve_mock(ValueType::Uint8, 1, Some(&MockValue::Unsigned(256))).is_err());
        assert!(resolve_mock(ValueType::Uint16, 1, Some(&MockValue::Signed(-1))).is_err());
        assert!(resolve_mock(ValueType::Int16, 1, Some(&MockValue::Float(1.5))).is_err());
        assert_eq!(
            resolve_mock(ValueType::Int32, 1, Some(&MockValue::Float(-4.0))),
            Ok(RegisterValue::I32(-4))
        );
        assert!(resolve_mock(ValueType::Float16, 1, Some(&MockValue::Float(70000.0))).is_err());
        assert_eq!(
            resolve_mock(ValueType::Float64, 1, Some(&MockValue::Unsigned(3))),
            Ok(RegisterValue::F64(3.0))
        );
        assert!(resolve_mock(ValueType::Bool, 1, Some(&MockValue::Unsigned(2))).is_err());
        assert_eq!(
            resolve_mock(ValueType::Bool, 1, Some(&MockValue::Unsigned(1))),
            Ok(RegisterValue::Bool(true))
        );
        assert_eq!(
            resolve_mock(ValueType::Char, 1, Some(&MockValue::Text("x".into()))),
            Ok(RegisterValue::Char(b'x'))
        );
        assert!(resolve_mock(ValueType::Char, 1, Some(&MockValue::Text("xy".into()))).is_err());
        assert!(resolve_mock(ValueType::String, 2, Some(&MockValue::Text("abc".into()))).is_err());
        assert!(resolve_mock(ValueType::String, 2, Some(&MockValue::Unsigned(0))).is_err());
        assert_eq!(
            resolve_mock(ValueType::String, 3, None),
            Ok(RegisterValue::Text(vec![0, 0, 0]))
        );
        assert_eq!(resolve_mock(ValueType::Uint64, 1, None), Ok(RegisterValue::U64(0)));
    }

    #[test]
    fn test_mock_error_names_register() {
        let err = parse("holding_registers:\n  - {name: level, description: x, address: 1, value_type: uint8, mock: 300}\n")
            .unwrap_err();
        assert!(err.to_string().contains("holding_registers.level"));
    }

    #[test]
    fn test_ports() {
        let err = ExporterConfig::from_yaml_str("plc:\n  host: a\n  port: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { port: 0, .. }));
        let err = parse("exporter:\n  port: 70000\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { port: 70000, .. }));
    }

    #[test]
    fn test_required_fields() {
        assert!(matches!(
            ExporterConfig::from_yaml_str("plc:\n  port: 502\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ExporterConfig::from_yaml_str("plc:\n  host: ''\n  port: 502\n"),
            Err(ConfigError::InvalidField { .. })
        ));
        assert!(matches!(parse("identifier: ''\n"), Err(ConfigError::InvalidField { .. })));
        assert!(matches!(
            parse("exporter:\n  scrape_interval: 0s\n"),
            Err(ConfigError::InvalidField { .. })
        ));
        assert!(matches!(parse("unknown_key: 1\n"), Err(ConfigError::Parse(_))));
        assert!(matches!(parse("metric_layout: flat\n"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            parse("exporter:\n  log_level: loud\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_static_labels() {
        assert!(parse("static_labels:\n  site: a\n  _zone: b\n").is_ok());
        for bad in ["plc", "index", "__meta", "1site", "a-b"] {
            let err = parse(&format!("static_labels:\n  '{}': x\n", bad)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidLabel { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_static_layout_metric_names() {
        let err = parse(
            "metric_layout: static\nholding_registers:\n  - {name: 'tank level', description: x, address: 1, value_type: uint16}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));

        let err = parse(
            "metric_layout: static\nholding_registers:\n  - {name: connection_up, description: x, address: 1, value_type: uint16}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));

        // Dynamic layout only uses names as label values
        assert!(parse(
            "holding_registers:\n  - {name: 'tank level', description: x, address: 1, value_type: uint16}\n",
        )
        .is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = ExporterConfig::load("/nonexistent/plc.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = ExporterConfig::from_yaml_str(include_str!("../config.example.yaml")).unwrap();
        assert_eq!(config.registers.len(), 6);
        assert_eq!(config.runtime.word_order, Endianness::Little);
        assert_eq!(
            config.registers.get(RegisterType::HoldingRegisters)[1].mock_value,
            RegisterValue::Char(b'A')
        );
    }

    #[test]
    fn test_byte_order_aliases() {
        let config = ExporterConfig::from_yaml_str(
            "plc: {host: 10.0.0.1, port: 502, endianness: LE, word_order: be}\n",
        )
        .unwrap();
        assert_eq!(config.runtime.endianness, Endianness::Little);
        assert_eq!(config.runtime.word_order, Endianness::Big);

        assert!(ExporterConfig::from_yaml_str(
            "plc: {host: 10.0.0.1, port: 502, endianness: middle}\n",
        )
        .is_err());
    }
}
