//! # Metric Model
//!
//! Projects decoded register values into metric samples. Naming follows one
//! of two layouts, chosen once at startup:
//!
//! | Layout | Metric name | Identity label |
//! |--------|-------------|----------------|
//! | static | `{namespace}_{register_name}` | `register_type` |
//! | dynamic | `{namespace}_{register_group}` | `name` |
//!
//! Every data sample also carries `plc`, `start_address`, `value_type` and
//! the configured static labels. Strings expand to one sample per
//! character with an `index` label; scalars have no index.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::{LayoutKind, RegisterDefinition, RuntimeConfig};
use crate::types::RegisterType;
use crate::value::RegisterValue;

/// Label holding the character position of string samples.
pub const INDEX_LABEL: &str = "index";

pub type LabelSet = BTreeMap<String, String>;

/// One metric sample ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub labels: LabelSet,
    /// Character position for string samples, absent for scalars.
    ///
    /// Every series of one gauge shares the same label names, so `None` is
    /// exported as `index=""`, which Prometheus treats as an absent label.
    pub index: Option<usize>,
    pub value: f64,
}

/// Everything the exposition layer needs to register a data metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    /// Sorted label names, including [`INDEX_LABEL`]
    pub label_names: Vec<String>,
    /// Identifies the register whose samples live under this descriptor
    pub series_key: String,
}

/// Naming strategy for data samples.
pub trait MetricLayout: Send + Sync + fmt::Debug {
    fn kind(&self) -> LayoutKind;

    fn metric_name(&self, namespace: &str, group: RegisterType, def: &RegisterDefinition) -> String;

    /// The label that tells registers sharing a metric name apart.
    fn identity_label(&self) -> &'static str;

    fn identity_value(&self, group: RegisterType, def: &RegisterDefinition) -> String;

    fn help(&self, group: RegisterType, def: &RegisterDefinition) -> String;
}

/// One metric per register.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticLayout;

impl MetricLayout for StaticLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Static
    }

    fn metric_name(&self, namespace: &str, _group: RegisterType, def: &RegisterDefinition) -> String {
        format!("{}_{}", namespace, def.name)
    }

    fn identity_label(&self) -> &'static str {
        "register_type"
    }

    fn identity_value(&self, group: RegisterType, _def: &RegisterDefinition) -> String {
        group.to_string()
    }

    fn help(&self, group: RegisterType, def: &RegisterDefinition) -> String {
        if def.description.trim().is_empty() {
            group.description().to_string()
        } else {
            def.description.clone()
        }
    }
}

/// One metric per register group.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLayout;

impl MetricLayout for DynamicLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Dynamic
    }

    fn metric_name(&self, namespace: &str, group: RegisterType, _def: &RegisterDefinition) -> String {
        format!("{}_{}", namespace, group)
    }

    fn identity_label(&self) -> &'static str {
        "name"
    }

    fn identity_value(&self, _group: RegisterType, def: &RegisterDefinition) -> String {
        def.name.clone()
    }

    fn help(&self, group: RegisterType, _def: &RegisterDefinition) -> String {
        group.description().to_string()
    }
}

/// Select the layout implementation for a configured kind.
pub fn layout_for(kind: LayoutKind) -> Box<dyn MetricLayout> {
    match kind {
        LayoutKind::Static => Box::new(StaticLayout),
        LayoutKind::Dynamic => Box::new(DynamicLayout),
    }
}

/// Builds data samples and telemetry label sets.
#[derive(Debug)]
pub struct MetricModel {
    namespace: String,
    identifier: String,
    static_labels: LabelSet,
    layout: Box<dyn MetricLayout>,
}

impl MetricModel {
    pub fn new(runtime: &RuntimeConfig) -> Self {
        Self::with_layout(
            &runtime.namespace,
            &runtime.identifier,
            runtime.static_labels.clone(),
            layout_for(runtime.metric_layout),
        )
    }

    pub fn with_layout(
        namespace: &str,
        identifier: &str,
        static_labels: LabelSet,
        layout: Box<dyn MetricLayout>,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            identifier: identifier.to_string(),
            static_labels,
            layout,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn layout_kind(&self) -> LayoutKind {
        self.layout.kind()
    }

    /// `{namespace}_{suffix}`
    pub fn metric_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.namespace, suffix)
    }

    /// Labels of the connection and info gauges: `plc` plus static labels.
    pub fn connection_labels(&self) -> LabelSet {
        let mut labels = self.static_labels.clone();
        labels.insert("plc".to_string(), self.identifier.clone());
        labels
    }

    /// Labels of the per-register latency and error metrics, identical in
    /// both layouts.
    pub fn register_labels(&self, group: RegisterType, def: &RegisterDefinition) -> LabelSet {
        let mut labels = self.connection_labels();
        labels.insert("name".to_string(), def.name.clone());
        labels.insert("register_type".to_string(), group.to_string());
        labels.insert("start_address".to_string(), def.start_address());
        labels
    }

    /// Label names of [`Self::register_labels`], sorted.
    pub fn register_label_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.static_labels.keys().cloned().collect();
        names.extend(
            ["plc", "name", "register_type", "start_address"]
                .into_iter()
                .map(String::from),
        );
        names.into_iter().collect()
    }

    fn data_labels(&self, group: RegisterType, def: &RegisterDefinition) -> LabelSet {
        let mut labels = self.connection_labels();
        labels.insert("start_address".to_string(), def.start_address());
        labels.insert(
            "value_type".to_string(),
            def.value_type().label_value().to_string(),
        );
        labels.insert(
            self.layout.identity_label().to_string(),
            self.layout.identity_value(group, def),
        );
        labels
    }

    pub fn descriptor(&self, group: RegisterType, def: &RegisterDefinition) -> MetricDescriptor {
        let mut label_names: BTreeSet<String> = self.data_labels(group, def).into_keys().collect();
        label_names.insert(INDEX_LABEL.to_string());
        MetricDescriptor {
            name: self.layout.metric_name(&self.namespace, group, def),
            help: self.layout.help(group, def),
            label_names: label_names.into_iter().collect(),
            series_key: format!("{}/{}", group, def.name),
        }
    }

    /// Expand a decoded value into samples.
    pub fn samples(
        &self,
        group: RegisterType,
        def: &RegisterDefinition,
        value: &RegisterValue,
    ) -> Vec<MetricSample> {
        let name = self.layout.metric_name(&self.namespace, group, def);
        let labels = self.data_labels(group, def);

        match value {
            RegisterValue::Text(codes) => codes
                .iter()
                .enumerate()
                .map(|(index, code)| MetricSample {
                    name: name.clone(),
                    labels: labels.clone(),
                    index: Some(index),
                    value: f64::from(*code),
                })
                .collect(),
            RegisterValue::Char(code) => vec![MetricSample {
                name,
                labels,
                index: None,
                value: f64::from(*code),
            }],
            scalar => vec![MetricSample {
                name,
                labels,
                index: None,
                value: scalar.scalar().unwrap_or_default(),
            }],
        }
    }
}
