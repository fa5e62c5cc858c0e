//! host 端的耗时统计
//!
//! 计时单位为微秒，写出时按 category 汇总；
//! `part_of_time_to_inference` 的计数器额外累加到 "Time to Inference"。

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;

use crate::errors::Result;

#[derive(Clone, Debug)]
pub struct PerformanceCounter {
    name: String,
    category: String,
    part_of_time_to_inference: bool,
    start: Option<Instant>,
    elapsed: Duration,
}

impl PerformanceCounter {
    pub fn new(name: impl Into<String>, category: impl Into<String>, part_of_time_to_inference: bool) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            part_of_time_to_inference,
            start: None,
            elapsed: Duration::ZERO,
        }
    }

    #[inline]
    pub fn start(&mut self) {
        self.start = Some(Instant::now());
    }

    /// 多次 start / stop 时耗时累加
    pub fn stop(&mut self) {
        if let Some(start) = self.start.take() {
            self.elapsed += start.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.start = None;
        self.elapsed = Duration::ZERO;
    }

    #[inline]
    pub fn elapsed_micros(&self) -> i64 {
        self.elapsed.as_micros() as i64
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[inline]
    pub fn is_part_of_time_to_inference(&self) -> bool {
        self.part_of_time_to_inference
    }
}

/// [`PerfCounters::start`] 返回的句柄
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterId(usize);

#[derive(Serialize)]
struct CounterEntry<'a> {
    name: &'a str,
    value: i64,
    unit: &'static str,
}

#[derive(Serialize)]
struct CategoryEntry<'a> {
    #[serde(rename = "total time")]
    total_time: i64,
    unit: &'static str,
    counters: Vec<CounterEntry<'a>>,
}

#[derive(Default)]
pub struct PerfCounters {
    counters: Vec<PerformanceCounter>,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新建一个计数器并开始计时
    pub fn start(&mut self, name: impl Into<String>, category: impl Into<String>, part_of_tti: bool) -> CounterId {
        let mut counter = PerformanceCounter::new(name, category, part_of_tti);
        counter.start();
        self.counters.push(counter);
        CounterId(self.counters.len() - 1)
    }

    pub fn stop(&mut self, id: CounterId) {
        if let Some(counter) = self.counters.get_mut(id.0) {
            counter.stop();
        }
    }

    pub fn push(&mut self, counter: PerformanceCounter) {
        self.counters.push(counter);
    }

    #[inline]
    pub fn counters(&self) -> &[PerformanceCounter] {
        &self.counters
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut categories: BTreeMap<&str, CategoryEntry> = BTreeMap::new();
        let mut time_to_inference = 0;
        let mut total = 0;
        for counter in &self.counters {
            let elapsed = counter.elapsed_micros();
            if counter.is_part_of_time_to_inference() {
                time_to_inference += elapsed;
            }
            total += elapsed;

            let entry = categories.entry(counter.category()).or_insert_with(|| CategoryEntry {
                total_time: 0,
                unit: "microseconds",
                counters: vec![],
            });
            entry.total_time += elapsed;
            entry.counters.push(CounterEntry {
                name: counter.name(),
                value: elapsed,
                unit: "microseconds",
            });
        }

        let mut out = json!({
            "Time to Inference": time_to_inference,
            "Total Scenario Time": total,
            "unit": "microseconds",
        });
        for (category, entry) in categories {
            if category.is_empty() {
                out["Uncategorized"] = json!(entry.counters);
            } else {
                out[category] = json!(entry);
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, &self.to_json())
    }
}

/// 以 4 个空格缩进写出 JSON
pub fn write_json_pretty(path: &Path, value: &serde_json::Value) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    std::fs::write(path, buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(name: &str, category: &str, tti: bool, micros: u64) -> PerformanceCounter {
        let mut counter = PerformanceCounter::new(name, category, tti);
        counter.elapsed = Duration::from_micros(micros);
        counter
    }

    #[test]
    fn test_perf_counter_json() {
        let mut perf = PerfCounters::new();
        perf.push(counter("Parse VGF: graph", "Scenario Setup", true, 10));
        perf.push(counter("Load Tensor: input", "Scenario Setup", false, 5));
        perf.push(counter("Create Pipeline: main. Iteration: 1", "Pipeline Setup", true, 7));
        perf.push(counter("free", "", false, 3));

        let json = perf.to_json();
        assert_eq!(json["Time to Inference"], 17);
        assert_eq!(json["Total Scenario Time"], 25);
        assert_eq!(json["unit"], "microseconds");
        assert_eq!(json["Scenario Setup"]["total time"], 15);
        assert_eq!(json["Scenario Setup"]["counters"].as_array().unwrap().len(), 2);
        assert_eq!(json["Pipeline Setup"]["counters"][0]["unit"], "microseconds");
        assert_eq!(json["Uncategorized"][0]["name"], "free");
        assert_eq!(json["Uncategorized"][0]["value"], 3);
    }

    #[test]
    fn test_start_stop_accumulates() {
        let mut perf = PerfCounters::new();
        let id = perf.start("load", "Scenario Setup", false);
        perf.stop(id);
        perf.stop(id);
        assert_eq!(perf.counters().len(), 1);
        assert!(perf.counters()[0].elapsed_micros() >= 0);

        let mut counter = counter("x", "", false, 42);
        counter.reset();
        assert_eq!(counter.elapsed_micros(), 0);
    }
}
