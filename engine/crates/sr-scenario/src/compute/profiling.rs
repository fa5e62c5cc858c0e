//! dispatch 的 GPU 计时
//!
//! 每个 dispatch 前后各写一个 timestamp，按顺序两两配对到被计时的命令上。

use std::path::Path;

use serde::Serialize;

use crate::errors::{Result, ScenarioError};
use crate::perf_counter::write_json_pretty;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimestampRecord {
    #[serde(rename = "Command type")]
    pub command_type: String,
    #[serde(rename = "Cycle count before command")]
    pub before: u64,
    #[serde(rename = "Cycle count after command")]
    pub after: u64,
    #[serde(rename = "Cycle count for command")]
    pub cycles: u64,
    #[serde(rename = "Timestamp Period")]
    pub timestamp_period: f32,
    #[serde(rename = "Time for command [ms]")]
    pub time_ms: f32,
    /// 从 1 开始
    #[serde(rename = "Iteration")]
    pub iteration: u32,
}

/// `timestamps` 的数量必须是命令数量的两倍
pub fn pair_timestamps(
    timestamps: &[u64],
    commands: &[&str],
    timestamp_period: f32,
    iteration: u32,
) -> Result<Vec<TimestampRecord>> {
    if timestamps.len() != commands.len() * 2 {
        return Err(ScenarioError::TimestampCountMismatch {
            timestamps: timestamps.len(),
            commands: commands.len(),
        });
    }
    Ok(timestamps
        .chunks_exact(2)
        .zip(commands)
        .map(|(pair, command)| {
            let cycles = pair[1].wrapping_sub(pair[0]);
            TimestampRecord {
                command_type: command.to_string(),
                before: pair[0],
                after: pair[1],
                cycles,
                timestamp_period,
                time_ms: cycles as f32 * timestamp_period / 1_000_000.0,
                iteration: iteration + 1,
            }
        })
        .collect())
}

/// 所有迭代的计时结果，最后一次迭代结束后写出
#[derive(Default)]
pub struct ProfilingLog {
    records: Vec<TimestampRecord>,
}

impl ProfilingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, records: Vec<TimestampRecord>) {
        self.records.extend(records);
    }

    #[inline]
    pub fn records(&self) -> &[TimestampRecord] {
        &self.records
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "Timestamps": serde_json::to_value(&self.records)? }))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, &self.to_json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_timestamps() {
        let records =
            pair_timestamps(&[100, 300, 1000, 1500], &["ComputeDispatch", "DataGraphDispatch"], 2.0, 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cycles, 200);
        assert_eq!(records[1].command_type, "DataGraphDispatch");
        assert_eq!(records[1].iteration, 1);
        assert!((records[1].time_ms - 0.001).abs() < 1e-6);
    }

    #[test]
    fn test_pair_timestamps_count_mismatch() {
        let err = pair_timestamps(&[1, 2, 3], &["ComputeDispatch"], 1.0, 0).unwrap_err();
        assert!(matches!(err, ScenarioError::TimestampCountMismatch { timestamps: 3, commands: 1 }));

        // 少一个 timestamp 同样是错误
        let commands = ["ComputeDispatch", "ComputeDispatch", "DataGraphDispatch"];
        let err = pair_timestamps(&[1, 2, 3, 4, 5], &commands, 1.0, 0).unwrap_err();
        assert!(matches!(err, ScenarioError::TimestampCountMismatch { timestamps: 5, commands: 3 }));

        let records = pair_timestamps(&[1, 2, 3, 5, 8, 13], &commands, 1.0, 2).unwrap();
        assert_eq!(records.iter().map(|r| r.cycles).collect::<Vec<_>>(), vec![1, 2, 5]);
        assert!(records.iter().all(|r| r.iteration == 3));

        assert!(pair_timestamps(&[], &[], 1.0, 0).unwrap().is_empty());
        assert!(pair_timestamps(&[1], &[], 1.0, 0).is_err());
    }

    #[test]
    fn test_profiling_json_layout() {
        let mut log = ProfilingLog::new();
        log.extend(pair_timestamps(&[0, 10], &["ComputeDispatch"], 1.0, 0).unwrap());
        log.extend(pair_timestamps(&[20, 25], &["ComputeDispatch"], 1.0, 1).unwrap());
        let json = log.to_json().unwrap();
        let entries = json["Timestamps"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["Cycle count for command"], 10);
        assert_eq!(entries[1]["Iteration"], 2);
        assert_eq!(entries[1]["Command type"], "ComputeDispatch");
    }
}
