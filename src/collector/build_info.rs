use futures::future::BoxFuture;

use crate::metrics::{Collector, Desc, MetricType, Sample};

pub static BUILD_INFO_DESC: Desc = Desc {
    name: "gcp_quota_exporter_build_info",
    help: "A metric with a constant '1' value labeled by the exporter version.",
    metric_type: MetricType::Gauge,
    label_names: &["version"],
};

/// 常量构建信息。
pub struct BuildInfoCollector {
    version: &'static str,
}

impl BuildInfoCollector {
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl Default for BuildInfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for BuildInfoCollector {
    fn describe(&self) -> Vec<&'static Desc> {
        vec![&BUILD_INFO_DESC]
    }

    fn collect(&self) -> BoxFuture<'_, Vec<Sample>> {
        let sample = Sample::new(&BUILD_INFO_DESC, vec![self.version.to_string()], 1.0);
        Box::pin(async move { vec![sample] })
    }
}
