use std::process::Stdio;

use super::probe::{DeviceProbe, ProbeError};
use crate::types::{DeviceSnapshot, SnapshotSet};

/// Columns requested from `nvidia-smi --query-gpu`, in output order.
pub const QUERY_FIELDS: &str =
    "index,name,temperature.gpu,utilization.gpu,memory.used,memory.total";

/// Snapshots GPUs by running `nvidia-smi` in CSV query mode.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    program: String,
}

impl NvidiaSmiProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

#[async_trait::async_trait]
impl DeviceProbe for NvidiaSmiProbe {
    fn name(&self) -> &str {
        "nvidia-smi"
    }

    async fn snapshot(&self) -> Result<SnapshotSet, ProbeError> {
        let output = tokio::process::Command::new(&self.program)
            .arg(format!("--query-gpu={QUERY_FIELDS}"))
            .arg("--format=csv,noheader,nounits")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Exit {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(SnapshotSet::new(parse_query_output(&text)?))
    }
}

/// Parse `nvidia-smi` CSV query output (no header, no units), one GPU per line.
pub fn parse_query_output(text: &str) -> Result<Vec<DeviceSnapshot>, ProbeError> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<DeviceSnapshot, ProbeError> {
    let bad = |reason: String| ProbeError::Parse {
        line: line.to_owned(),
        reason,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [index, name, temp, util, used, total] = fields.as_slice() else {
        return Err(bad(format!("expected 6 fields, got {}", fields.len())));
    };

    let index: u32 = index
        .parse()
        .map_err(|_| bad(format!("bad index {index:?}")))?;
    let used: f64 = used
        .parse()
        .map_err(|_| bad(format!("bad memory.used {used:?}")))?;
    let total: f64 = total
        .parse()
        .map_err(|_| bad(format!("bad memory.total {total:?}")))?;

    // Temperature and utilization read "[N/A]" on some boards.
    let temp = temp.parse::<u32>().map_or_else(|_| "??".to_owned(), |t| t.to_string());
    let util = util.parse::<u32>().map_or_else(|_| "??".to_owned(), |u| u.to_string());

    let display =
        format!("[{index}] {name} | {temp:>2}°C, {util:>3} % | {used:>5.0} / {total:>5.0} MB");
    Ok(DeviceSnapshot::new(index, (total - used).max(0.0), display))
}
