//! Prometheus text exposition format (version 0.0.4).
//!
//! ```
//! # use xer::encoding::text::encode;
//! # use xer::metrics::counter::Counter;
//! # use xer::metrics::family::Family;
//! # use xer::registry::Registry;
//! let mut registry = Registry::default();
//! let runs = Family::<Vec<(String, String)>, Counter>::default();
//! registry.register("xer_total_set_runs", "Total set runs", runs.clone()).unwrap();
//!
//! runs.get_or_create(&vec![("set".to_owned(), "svc-a".to_owned())]).inc();
//!
//! let mut buffer = String::new();
//! encode(&mut buffer, &registry).unwrap();
//!
//! let expected = "# HELP xer_total_set_runs Total set runs\n".to_owned()
//!     + "# TYPE xer_total_set_runs counter\n"
//!     + "xer_total_set_runs{set=\"svc-a\"} 1\n";
//! assert_eq!(expected, buffer);
//! ```

use crate::encoding::EncodeLabelSet;
use crate::metrics::MetricType;
use crate::registry::Registry;
use std::fmt::Write;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Encode the metrics registered with the provided [`Registry`] into the
/// provided [`Write`]r.
pub fn encode<W: Write>(writer: &mut W, registry: &Registry) -> Result<(), std::fmt::Error> {
    for (descriptor, metric) in registry.iter() {
        encode_descriptor(writer, descriptor.name(), descriptor.help(), metric.metric_type())?;

        let encoder = MetricEncoder {
            writer: &mut *writer,
            name: descriptor.name(),
            family_labels: None,
        };
        metric.encode(encoder)?;
    }

    Ok(())
}

fn encode_descriptor<W: Write>(
    writer: &mut W,
    name: &str,
    help: &str,
    metric_type: MetricType,
) -> Result<(), std::fmt::Error> {
    writer.write_str("# HELP ")?;
    writer.write_str(name)?;
    writer.write_str(" ")?;
    for c in help.chars() {
        match c {
            '\\' => writer.write_str("\\\\")?,
            '\n' => writer.write_str("\\n")?,
            c => writer.write_char(c)?,
        }
    }
    writer.write_str("\n")?;

    writer.write_str("# TYPE ")?;
    writer.write_str(name)?;
    writer.write_str(" ")?;
    writer.write_str(metric_type.as_str())?;
    writer.write_str("\n")?;

    Ok(())
}

/// Encoder for the samples of a single metric.
pub struct MetricEncoder<'a> {
    writer: &'a mut dyn Write,
    name: &'a str,
    family_labels: Option<&'a dyn EncodeLabelSet>,
}

impl std::fmt::Debug for MetricEncoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricEncoder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl MetricEncoder<'_> {
    /// Encode a counter sample.
    pub fn encode_counter(&mut self, v: u64) -> Result<(), std::fmt::Error> {
        self.write_name_and_labels(None, None)?;
        self.writer.write_str(itoa::Buffer::new().format(v))?;
        self.writer.write_str("\n")
    }

    /// Encode a gauge sample.
    pub fn encode_gauge(&mut self, v: f64) -> Result<(), std::fmt::Error> {
        self.write_name_and_labels(None, None)?;
        write_f64(&mut *self.writer, v)?;
        self.writer.write_str("\n")
    }

    /// Encode the samples of a summary: one per quantile, then `_sum` and
    /// `_count`.
    pub fn encode_summary(
        &mut self,
        sum: f64,
        count: u64,
        quantiles: &[(f64, f64)],
    ) -> Result<(), std::fmt::Error> {
        for (quantile, value) in quantiles {
            self.write_name_and_labels(None, Some(*quantile))?;
            write_f64(&mut *self.writer, *value)?;
            self.writer.write_str("\n")?;
        }

        self.write_name_and_labels(Some("_sum"), None)?;
        write_f64(&mut *self.writer, sum)?;
        self.writer.write_str("\n")?;

        self.write_name_and_labels(Some("_count"), None)?;
        self.writer.write_str(itoa::Buffer::new().format(count))?;
        self.writer.write_str("\n")
    }

    /// Encode a member of a metric family with the given label set.
    pub fn encode_family<'s, S: EncodeLabelSet>(&'s mut self, label_set: &'s S) -> MetricEncoder<'s> {
        debug_assert!(self.family_labels.is_none());

        MetricEncoder {
            writer: &mut *self.writer,
            name: self.name,
            family_labels: Some(label_set),
        }
    }

    fn write_name_and_labels(
        &mut self,
        suffix: Option<&str>,
        quantile: Option<f64>,
    ) -> Result<(), std::fmt::Error> {
        self.writer.write_str(self.name)?;
        if let Some(suffix) = suffix {
            self.writer.write_str(suffix)?;
        }

        let mut labels = String::new();
        let mut encoder = LabelSetEncoder { buffer: &mut labels };
        if let Some(family_labels) = self.family_labels {
            family_labels.encode(&mut encoder)?;
        }
        if let Some(quantile) = quantile {
            let mut value = String::new();
            write_f64(&mut value, quantile)?;
            encoder.encode_label("quantile", &value)?;
        }

        if !labels.is_empty() {
            self.writer.write_str("{")?;
            self.writer.write_str(&labels)?;
            self.writer.write_str("}")?;
        }

        self.writer.write_str(" ")
    }
}

/// Encoder for a label set.
#[derive(Debug)]
pub struct LabelSetEncoder<'a> {
    buffer: &'a mut String,
}

impl LabelSetEncoder<'_> {
    /// Encode a single `key="value"` pair, escaping the value.
    pub fn encode_label(&mut self, key: &str, value: &str) -> Result<(), std::fmt::Error> {
        if !self.buffer.is_empty() {
            self.buffer.push(',');
        }

        self.buffer.push_str(key);
        self.buffer.push_str("=\"");
        for c in value.chars() {
            match c {
                '\\' => self.buffer.push_str("\\\\"),
                '"' => self.buffer.push_str("\\\""),
                '\n' => self.buffer.push_str("\\n"),
                c => self.buffer.push(c),
            }
        }
        self.buffer.push('"');

        Ok(())
    }
}

fn write_f64(writer: &mut dyn Write, v: f64) -> Result<(), std::fmt::Error> {
    if v.is_nan() {
        writer.write_str("NaN")
    } else if v.is_infinite() {
        writer.write_str(if v.is_sign_positive() { "+Inf" } else { "-Inf" })
    } else {
        writer.write_str(dtoa::Buffer::new().format_finite(v))
    }
}
