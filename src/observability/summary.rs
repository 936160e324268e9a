//! Count/sum summary collector.
//!
//! The prometheus crate ships no summary type. This collector tracks only the
//! sample count and sum per label set and exposes them as a `SUMMARY` family
//! with no quantiles, which is enough for mean-latency queries.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto;

/// A labeled family of count/sum summaries.
#[derive(Clone)]
pub struct SummaryVec {
    inner: Arc<SummaryVecCore>,
}

struct SummaryVecCore {
    desc: Desc,
    cells: DashMap<Vec<String>, Summary>,
}

impl SummaryVec {
    /// Create a summary family named `name` with the given variable label
    /// names and constant labels.
    pub fn new(
        name: &str,
        help: &str,
        label_names: &[&str],
        const_labels: HashMap<String, String>,
    ) -> Result<Self, prometheus::Error> {
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            label_names.iter().map(|l| l.to_string()).collect(),
            const_labels,
        )?;
        Ok(Self {
            inner: Arc::new(SummaryVecCore {
                desc,
                cells: DashMap::new(),
            }),
        })
    }

    /// Get (creating if needed) the summary for one set of label values.
    ///
    /// Values are matched to label names by position.
    pub fn with_label_values(&self, values: &[&str]) -> Summary {
        debug_assert_eq!(values.len(), self.inner.desc.variable_labels.len());
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.inner.cells.entry(key).or_default().clone()
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let desc = &self.inner.desc;

        let mut metrics: Vec<(Vec<String>, proto::Metric)> = self
            .inner
            .cells
            .iter()
            .map(|entry| {
                let (count, sum) = entry.value().snapshot();
                let mut summary = proto::Summary::default();
                summary.set_sample_count(count);
                summary.set_sample_sum(sum);

                let mut labels = desc.const_label_pairs.clone();
                for (name, value) in desc.variable_labels.iter().zip(entry.key()) {
                    let mut pair = proto::LabelPair::default();
                    pair.set_name(name.clone());
                    pair.set_value(value.clone());
                    labels.push(pair);
                }
                labels.sort_by(|a, b| a.get_name().cmp(b.get_name()));

                let mut metric = proto::Metric::default();
                metric.set_label(labels.into());
                metric.set_summary(summary);
                (entry.key().clone(), metric)
            })
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));

        let mut family = proto::MetricFamily::default();
        family.set_name(desc.fq_name.clone());
        family.set_help(desc.help.clone());
        family.set_field_type(proto::MetricType::SUMMARY);
        family.set_metric(
            metrics
                .into_iter()
                .map(|(_, metric)| metric)
                .collect::<Vec<_>>()
                .into(),
        );
        vec![family]
    }
}

/// Count and sum for one label set.
///
/// Both values sit behind one lock so a scrape never sees a count that
/// disagrees with its sum.
#[derive(Clone, Default)]
pub struct Summary {
    state: Arc<Mutex<(u64, f64)>>,
}

impl Summary {
    /// Record one sample.
    pub fn observe(&self, value: f64) {
        let mut state = self.state.lock();
        state.0 += 1;
        state.1 += value;
    }

    /// Current `(count, sum)`.
    pub fn snapshot(&self) -> (u64, f64) {
        *self.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    fn handler_label(name: &str) -> HashMap<String, String> {
        HashMap::from([("handler".to_string(), name.to_string())])
    }

    #[test]
    fn observations_accumulate_per_label_set() {
        let vec = SummaryVec::new("latency", "help", &["method"], handler_label("t")).unwrap();
        vec.with_label_values(&["get"]).observe(0.5);
        vec.with_label_values(&["get"]).observe(1.5);
        vec.with_label_values(&["post"]).observe(2.0);

        assert_eq!(vec.with_label_values(&["get"]).snapshot(), (2, 2.0));
        assert_eq!(vec.with_label_values(&["post"]).snapshot(), (1, 2.0));
    }

    #[test]
    fn gathers_as_summary_family() {
        let registry = Registry::new();
        let vec = SummaryVec::new("latency", "help", &["method"], handler_label("t")).unwrap();
        registry.register(Box::new(vec.clone())).unwrap();
        vec.with_label_values(&["get"]).observe(0.25);

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        let family = &families[0];
        assert_eq!(family.get_name(), "latency");
        assert_eq!(family.get_field_type(), proto::MetricType::SUMMARY);

        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_summary().get_sample_count(), 1);
        assert_eq!(metric.get_summary().get_sample_sum(), 0.25);
        let labels: Vec<(&str, &str)> = metric
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect();
        assert_eq!(labels, vec![("handler", "t"), ("method", "get")]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = Registry::new();
        let a = SummaryVec::new("latency", "help", &["method"], handler_label("t")).unwrap();
        let b = SummaryVec::new("latency", "help", &["method"], handler_label("t")).unwrap();
        registry.register(Box::new(a)).unwrap();
        assert!(matches!(
            registry.register(Box::new(b)),
            Err(prometheus::Error::AlreadyReg)
        ));
    }
}
