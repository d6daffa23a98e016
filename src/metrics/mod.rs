//! 拉取式监控的指标模型：描述符、样本、采集器与注册表。
//!
//! 描述符是静态的（名称、帮助文本、标签集合与采集结果无关），
//! 这样即便一次采集没有任何数据，拉取端看到的指标身份也保持稳定。

mod format;

use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::ExporterError;

pub use format::{TEXT_CONTENT_TYPE, render_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
        }
    }
}

/// 指标描述符。
#[derive(Debug, PartialEq, Eq)]
pub struct Desc {
    pub name: &'static str,
    pub help: &'static str,
    pub metric_type: MetricType,
    pub label_names: &'static [&'static str],
}

/// 一条样本：描述符 + 与 `label_names` 一一对应的标签值 + 数值。
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: &'static Desc,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(desc: &'static Desc, label_values: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(desc.label_names.len(), label_values.len(), "{}", desc.name);
        Self {
            desc,
            label_values,
            value,
        }
    }

    pub fn unlabelled(desc: &'static Desc, value: f64) -> Self {
        Self::new(desc, Vec::new(), value)
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

/// 注册到 [`Registry`] 的采集器。
pub trait Collector: Send + Sync {
    /// 静态描述符集合，不依赖任何一次采集。
    fn describe(&self) -> Vec<&'static Desc>;

    /// 每次拉取时调用一次。
    fn collect(&self) -> BoxFuture<'_, Vec<Sample>>;
}

#[derive(Default)]
pub struct Registry {
    collectors: Vec<Arc<dyn Collector>>,
    names: HashSet<&'static str>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册采集器；描述符名称与已注册的冲突时拒绝。
    pub fn register(&mut self, collector: Arc<dyn Collector>) -> Result<(), ExporterError> {
        let descs = collector.describe();
        let mut seen = HashSet::new();
        for d in &descs {
            if self.names.contains(d.name) || !seen.insert(d.name) {
                return Err(ExporterError::config(format!("指标 {} 重复注册", d.name)));
            }
        }
        self.names.extend(seen);
        self.collectors.push(collector);
        Ok(())
    }

    pub fn descriptors(&self) -> Vec<&'static Desc> {
        self.collectors.iter().flat_map(|c| c.describe()).collect()
    }

    /// 按注册顺序依次采集。
    pub async fn gather(&self) -> Vec<Sample> {
        let mut out = Vec::new();
        for c in &self.collectors {
            out.extend(c.collect().await);
        }
        out
    }

    pub async fn render(&self) -> String {
        let samples = self.gather().await;
        render_text(&self.descriptors(), &samples)
    }
}
