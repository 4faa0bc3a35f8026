//! 远程脚本输出解析
//!
//! PowerShell `ConvertTo-Json` 会把单元素数组折叠成对象，这里统一按列表处理。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ExecutorError, Result};

/// 指标健康等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

impl HealthLevel {
    /// CPU：< 70 正常，< 90 警告，其余严重
    pub fn for_cpu(usage: f64) -> Self {
        Self::grade(usage, 70.0, 90.0)
    }

    /// 内存：< 80 正常，< 95 警告，其余严重
    pub fn for_memory(usage: f64) -> Self {
        Self::grade(usage, 80.0, 95.0)
    }

    fn grade(value: f64, warn: f64, critical: f64) -> Self {
        if value < warn {
            HealthLevel::Healthy
        } else if value < critical {
            HealthLevel::Warning
        } else {
            HealthLevel::Critical
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "🟢",
            HealthLevel::Warning => "🟡",
            HealthLevel::Critical => "🔴",
        }
    }
}

/// ncrpes 监控结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NcrpesStatus {
    pub service_found: bool,
    pub service_name: Option<String>,
    pub service_display_name: Option<String>,
    pub service_status: Option<String>,
    pub service_start_type: Option<String>,
    pub service_error: Option<String>,

    pub process_found: bool,
    pub process_count: Option<u64>,
    #[serde(deserialize_with = "one_or_many")]
    pub processes: Vec<ProcessInfo>,
    pub process_error: Option<String>,

    pub system_info: Option<SystemInfo>,
    pub timestamp: Option<String>,
    pub computer_name: Option<String>,
}

impl NcrpesStatus {
    /// 服务是否正在运行
    pub fn is_running(&self) -> bool {
        self.service_found && self.service_status.as_deref() == Some("Running")
    }

    /// 单行摘要，如 `ncrpes.exe RUNNING (2 processes)`
    pub fn summary(&self) -> String {
        let status = match (&self.service_found, self.service_status.as_deref()) {
            (true, Some(status)) => status.to_uppercase(),
            (true, None) => "UNKNOWN".to_string(),
            (false, _) => "NOT FOUND".to_string(),
        };
        format!(
            "ncrpes.exe {} ({} processes)",
            status,
            self.process_count.unwrap_or(self.processes.len() as u64)
        )
    }
}

/// 进程信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProcessInfo {
    #[serde(rename = "PID")]
    pub pid: Option<u64>,
    pub process_name: Option<String>,
    pub start_time: Option<String>,
    #[serde(rename = "CPU")]
    pub cpu: Option<f64>,
    pub working_set: Option<f64>,
    pub virtual_memory: Option<f64>,
    pub handle_count: Option<u64>,
    pub thread_count: Option<u64>,
}

/// 系统性能
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemInfo {
    #[serde(rename = "CPUUsage")]
    pub cpu_usage: Option<f64>,
    #[serde(rename = "TotalMemoryGB")]
    pub total_memory_gb: Option<f64>,
    #[serde(rename = "FreeMemoryGB")]
    pub free_memory_gb: Option<f64>,
    #[serde(rename = "MemoryUsagePercent")]
    pub memory_usage_percent: Option<f64>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
}

/// 单个服务的健康检查结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceHealth {
    pub service_name: String,
    pub status: String,
    pub start_type: String,
    pub process_info: Option<String>,
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn status_emoji(&self) -> &'static str {
        match self.status.as_str() {
            "Running" => "🟢",
            "Stopped" => "🔴",
            "NotFound" => "❓",
            _ => "🟡",
        }
    }
}

/// 解析 ncrpes 监控输出
pub fn parse_ncrpes_status(stdout: &str) -> Result<NcrpesStatus> {
    parse_json(stdout)
}

/// 解析服务健康检查输出
pub fn parse_service_health(stdout: &str) -> Result<Vec<ServiceHealth>> {
    let json = extract_json(stdout)?;
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| ExecutorError::Parse(format!("无法解析服务信息: {}", e)))?;
    let list = match value {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    list.into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| ExecutorError::Parse(format!("无法解析服务信息: {}", e))))
        .collect()
}

fn parse_json<T: DeserializeOwned>(stdout: &str) -> Result<T> {
    let json = extract_json(stdout)?;
    serde_json::from_str(json).map_err(|e| ExecutorError::Parse(format!("无法解析服务信息: {}", e)))
}

/// 截取输出中第一个 JSON 对象或数组
fn extract_json(stdout: &str) -> Result<&str> {
    let start = stdout
        .find(|c| c == '{' || c == '[')
        .ok_or_else(|| ExecutorError::Parse("虚拟机没有返回 JSON 输出".to_string()))?;
    let end = stdout
        .rfind(|c| c == '}' || c == ']')
        .filter(|end| *end >= start)
        .ok_or_else(|| ExecutorError::Parse("JSON 输出不完整".to_string()))?;
    Ok(&stdout[start..=end])
}

fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
        Null(()),
    }

    match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::Many(items) => Ok(items),
        OneOrMany::One(item) => Ok(vec![item]),
        OneOrMany::Null(()) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NCRPES_JSON: &str = r#"{
        "ServiceFound": true,
        "ServiceName": "ncrpes",
        "ServiceDisplayName": "NCR Promotions Engine Service",
        "ServiceStatus": "Running",
        "ServiceStartType": "Automatic",
        "ProcessFound": true,
        "ProcessCount": 1,
        "Processes": {
            "PID": 4412,
            "ProcessName": "ncrpes",
            "StartTime": "2024-05-01 06:00:12",
            "CPU": 1532.25,
            "WorkingSet": 812.4,
            "VirtualMemory": 2048.0,
            "HandleCount": 1210,
            "ThreadCount": 64
        },
        "SystemInfo": {"CPUUsage": 35.5, "TotalMemoryGB": 16.0, "FreeMemoryGB": 4.2, "MemoryUsagePercent": 73.75},
        "Timestamp": "2024-05-01 10:15:00",
        "ComputerName": "CLPEWEB01"
    }"#;

    #[test]
    fn test_parse_ncrpes_single_process() {
        let status = parse_ncrpes_status(NCRPES_JSON).unwrap();
        assert!(status.is_running());
        assert_eq!(status.processes.len(), 1);
        assert_eq!(status.processes[0].pid, Some(4412));
        assert_eq!(status.summary(), "ncrpes.exe RUNNING (1 processes)");

        let sys = status.system_info.unwrap();
        assert_eq!(HealthLevel::for_cpu(sys.cpu_usage.unwrap()), HealthLevel::Healthy);
        assert_eq!(HealthLevel::for_memory(sys.memory_usage_percent.unwrap()), HealthLevel::Healthy);
    }

    #[test]
    fn test_parse_ncrpes_service_missing() {
        let raw = r#"{"ServiceFound": false, "ServiceError": "Cannot find any service with service name 'ncrpes'.", "ProcessFound": false}"#;
        let status = parse_ncrpes_status(raw).unwrap();
        assert!(!status.is_running());
        assert!(status.processes.is_empty());
        assert_eq!(status.summary(), "ncrpes.exe NOT FOUND (0 processes)");
    }

    #[test]
    fn test_parse_with_surrounding_noise() {
        let raw = format!("WARNING: something\n{}\n", NCRPES_JSON);
        assert!(parse_ncrpes_status(&raw).is_ok());
        assert!(parse_ncrpes_status("no json here").is_err());
    }

    #[test]
    fn test_parse_service_health_single_object() {
        let raw = r#"{"ServiceName": "W3SVC", "Status": "Running", "StartType": "Automatic", "ProcessInfo": "PID: 1", "Error": null}"#;
        let services = parse_service_health(raw).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].status_emoji(), "🟢");
    }

    #[test]
    fn test_parse_service_health_list() {
        let raw = r#"[
            {"ServiceName": "W3SVC", "Status": "Stopped", "StartType": "Manual", "ProcessInfo": "", "Error": null},
            {"ServiceName": "Nope", "Status": "NotFound", "StartType": "Unknown", "ProcessInfo": "", "Error": "Cannot find any service"}
        ]"#;
        let services = parse_service_health(raw).unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].status_emoji(), "🔴");
        assert_eq!(services[1].status_emoji(), "❓");
        assert!(services[1].error.is_some());
    }

    #[test]
    fn test_health_thresholds() {
        assert_eq!(HealthLevel::for_cpu(69.9), HealthLevel::Healthy);
        assert_eq!(HealthLevel::for_cpu(70.0), HealthLevel::Warning);
        assert_eq!(HealthLevel::for_cpu(90.0), HealthLevel::Critical);
        assert_eq!(HealthLevel::for_memory(94.9), HealthLevel::Warning);
        assert_eq!(HealthLevel::for_memory(95.0), HealthLevel::Critical);
    }
}
