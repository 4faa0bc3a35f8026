//! 运维配置管理
//!
//! 支持从多个源加载配置:
//! - 环境变量 (优先级最高)
//! - 配置文件 (TOML/YAML/JSON)
//! - 默认值 (优先级最低)
//!
//! 配置文件搜索路径 (按优先级):
//! 1. `VMOPS_CONFIG` 环境变量指定的路径
//! 2. `./vmops.toml` (当前目录)
//! 3. `./config/vmops.toml`
//! 4. `~/.config/vmops/config.toml` (用户配置目录)
//! 5. `/etc/vmops/config.toml` (系统配置目录)

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vmops_azure::{AzureConfig, AzureCredential, OsType};

use crate::directory::{TagFilter, VmFilter};

/// 运维配置 (顶层)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsConfig {
    /// Azure 连接配置
    #[serde(default)]
    pub azure: AzureSection,

    /// ncrpes 监控和文件重命名的目标虚拟机
    #[serde(default)]
    pub target: TargetSection,

    /// 执行行为
    #[serde(default)]
    pub run: RunSection,

    /// WEB 层服务健康检查
    #[serde(default)]
    pub health: HealthSection,

    /// 日志级别 (trace/debug/info/warn/error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Azure 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureSection {
    /// 订阅 ID
    #[serde(default = "default_subscription_id")]
    pub subscription_id: String,

    /// 管理平面地址
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// 连接超时 (秒)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// 请求超时 (秒)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// 长时操作轮询间隔 (秒)
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// 显式访问令牌，未设置时使用 Azure CLI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// 目标虚拟机筛选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    /// 必须匹配的标签 (`Key:Value`)
    #[serde(default = "default_target_tags")]
    pub tags: Vec<String>,

    /// Name 标签包含的子串
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,

    /// 操作系统 (windows/linux)，脚本均为 PowerShell，默认 windows
    #[serde(default = "default_target_os_type", skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
}

/// 执行行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// 单台虚拟机命令超时 (秒)
    #[serde(default = "default_command_timeout")]
    pub command_timeout: u64,

    /// 超时重试次数
    #[serde(default)]
    pub retries: u32,

    /// 监控的服务名
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// 健康检查配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSection {
    /// 必须匹配的标签 (`Key:Value`)
    #[serde(default = "default_health_tags")]
    pub tags: Vec<String>,

    /// Name 标签包含的子串
    #[serde(default = "default_health_name_contains")]
    pub name_contains: Option<String>,

    /// 未指定 `--service` 时检查的服务
    #[serde(default)]
    pub default_services: Vec<String>,
}

// ============================================
// 默认值
// ============================================

fn default_subscription_id() -> String {
    "5b479b96-2b99-464d-a824-2761380620ea".to_string()
}

fn default_management_endpoint() -> String {
    vmops_azure::DEFAULT_MANAGEMENT_ENDPOINT.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

fn default_target_tags() -> Vec<String> {
    vec!["System:CENTRAL_LOYALTY_PROMOTIONS_ENGINE".to_string()]
}

fn default_target_os_type() -> Option<String> {
    Some("windows".to_string())
}

fn default_command_timeout() -> u64 {
    300
}

fn default_service_name() -> String {
    "ncrpes".to_string()
}

fn default_health_tags() -> Vec<String> {
    vec![
        "System:CENTRAL_LOYALTY_PROMOTIONS_ENGINE".to_string(),
        "ARIS:CLPE".to_string(),
    ]
}

fn default_health_name_contains() -> Option<String> {
    Some("WEB".to_string())
}

impl Default for AzureSection {
    fn default() -> Self {
        Self {
            subscription_id: default_subscription_id(),
            management_endpoint: default_management_endpoint(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            poll_interval: default_poll_interval(),
            access_token: None,
        }
    }
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            tags: default_target_tags(),
            name_contains: None,
            os_type: default_target_os_type(),
        }
    }
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            command_timeout: default_command_timeout(),
            retries: 0,
            service_name: default_service_name(),
        }
    }
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            tags: default_health_tags(),
            name_contains: default_health_name_contains(),
            default_services: Vec::new(),
        }
    }
}

// ============================================
// 加载
// ============================================

impl OpsConfig {
    /// 从多个源加载配置 (优先级: 环境变量 > 配置文件 > 默认值)
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                tracing::debug!("加载配置文件: {:?}", path);
                Self::load_from_file(&path)?
            }
            None => {
                tracing::debug!("未找到配置文件，使用默认配置");
                Self::default()
            }
        };

        config.apply_env_vars()?;
        Ok(config)
    }

    /// 从指定文件加载配置，再应用环境变量
    pub fn load_with_path(path: &Path) -> Result<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_vars()?;
        Ok(config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {:?}", path))?;

        let config = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("无法解析 TOML 配置: {:?}", path))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("无法解析 YAML 配置: {:?}", path))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("无法解析 JSON 配置: {:?}", path))?,
            _ => anyhow::bail!("不支持的配置文件格式: {:?}", path),
        };

        Ok(config)
    }

    /// 查找配置文件 (按优先级搜索)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("VMOPS_CONFIG") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
            tracing::warn!("VMOPS_CONFIG 指向的文件不存在: {:?}", p);
        }

        let mut paths = vec![
            PathBuf::from("./vmops.toml"),
            PathBuf::from("./vmops.yaml"),
            PathBuf::from("./config/vmops.toml"),
        ];

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config/vmops/config.toml"));
            paths.push(home.join(".config/vmops/config.yaml"));
        }

        #[cfg(target_os = "linux")]
        paths.push(PathBuf::from("/etc/vmops/config.toml"));

        paths.into_iter().find(|p| p.exists())
    }

    /// 从环境变量覆盖配置
    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// 按变量名查找覆盖值
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(sub) = lookup("VMOPS_SUBSCRIPTION_ID") {
            self.azure.subscription_id = sub;
        }
        if let Some(endpoint) = lookup("VMOPS_MANAGEMENT_ENDPOINT") {
            self.azure.management_endpoint = endpoint;
        }
        if let Some(token) = lookup("VMOPS_ACCESS_TOKEN") {
            self.azure.access_token = Some(token);
        }
        if let Some(timeout) = lookup("VMOPS_COMMAND_TIMEOUT") {
            self.run.command_timeout = timeout
                .parse()
                .with_context(|| format!("VMOPS_COMMAND_TIMEOUT 不是有效的秒数: {}", timeout))?;
        }
        if let Some(retries) = lookup("VMOPS_RETRIES") {
            self.run.retries = retries
                .parse()
                .with_context(|| format!("VMOPS_RETRIES 不是有效的次数: {}", retries))?;
        }
        if let Some(level) = lookup("VMOPS_LOG_LEVEL") {
            self.log_level = Some(level);
        }

        Ok(())
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.azure.subscription_id.trim().is_empty() {
            anyhow::bail!("订阅 ID 不能为空");
        }
        if self.azure.management_endpoint.trim().is_empty() {
            anyhow::bail!("管理平面地址不能为空");
        }
        if self.azure.connect_timeout == 0 || self.azure.request_timeout == 0 {
            anyhow::bail!("Azure 连接超时和请求超时必须大于 0");
        }
        if self.run.command_timeout == 0 {
            anyhow::bail!("命令超时必须大于 0");
        }
        if self.run.service_name.trim().is_empty() {
            anyhow::bail!("服务名不能为空");
        }

        self.target_filter()?;
        self.health_filter()?;

        Ok(())
    }

    /// 单台虚拟机命令超时
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.run.command_timeout)
    }

    /// 监控/重命名的目标筛选条件
    pub fn target_filter(&self) -> Result<VmFilter> {
        let mut filter = VmFilter::new().tags(parse_tags(&self.target.tags)?);
        if let Some(needle) = &self.target.name_contains {
            filter = filter.name_tag_contains(needle.clone());
        }
        if let Some(os) = &self.target.os_type {
            filter = filter.os_type(OsType::from_str_lossy(os));
        }
        Ok(filter)
    }

    /// 健康检查的目标筛选条件 (仅 Windows)
    pub fn health_filter(&self) -> Result<VmFilter> {
        let mut filter = VmFilter::new()
            .tags(parse_tags(&self.health.tags)?)
            .os_type(OsType::Windows);
        if let Some(needle) = &self.health.name_contains {
            filter = filter.name_tag_contains(needle.clone());
        }
        Ok(filter)
    }

    /// Azure 客户端配置
    pub fn azure_config(&self) -> AzureConfig {
        AzureConfig {
            management_endpoint: self.azure.management_endpoint.clone(),
            connect_timeout: self.azure.connect_timeout,
            request_timeout: self.azure.request_timeout,
            poll_interval: self.azure.poll_interval,
        }
    }

    /// 凭据来源
    pub fn credential(&self) -> AzureCredential {
        match &self.azure.access_token {
            Some(token) if !token.trim().is_empty() => AzureCredential::Static(token.clone()),
            _ => AzureCredential::AzureCli,
        }
    }
}

fn parse_tags(tags: &[String]) -> Result<Vec<TagFilter>> {
    tags.iter()
        .map(|t| t.parse::<TagFilter>().map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::VirtualMachineRef;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = OpsConfig::default();
        assert_eq!(config.azure.subscription_id, "5b479b96-2b99-464d-a824-2761380620ea");
        assert_eq!(config.azure.management_endpoint, "https://management.azure.com");
        assert_eq!(config.run.command_timeout, 300);
        assert_eq!(config.run.retries, 0);
        assert_eq!(config.run.service_name, "ncrpes");
        assert!(config.validate().is_ok());
        assert!(matches!(config.credential(), AzureCredential::AzureCli));
    }

    #[test]
    fn test_load_toml_partial() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[azure]
subscription_id = "00000000-0000-0000-0000-000000000001"
access_token = "token"

[run]
command_timeout = 60
retries = 2

[health]
default_services = ["W3SVC", "ncrpes"]
"#
        )
        .unwrap();

        let config = OpsConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.azure.subscription_id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(config.azure.request_timeout, 30);
        assert_eq!(config.command_timeout(), Duration::from_secs(60));
        assert_eq!(config.run.retries, 2);
        assert_eq!(config.run.service_name, "ncrpes");
        assert_eq!(config.health.default_services.len(), 2);
        assert_eq!(config.health.tags.len(), 2);
        assert!(matches!(config.credential(), AzureCredential::Static(_)));
    }

    #[test]
    fn test_load_yaml_and_unsupported() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "target:\n  tags: [\"ARIS:CLPE\"]\n  name_contains: DB\n  os_type: windows").unwrap();
        let config = OpsConfig::load_from_file(yaml.path()).unwrap();
        let filter = config.target_filter().unwrap();
        assert_eq!(filter.tags, vec![TagFilter::new("ARIS", "CLPE")]);
        assert_eq!(filter.name_tag_contains.as_deref(), Some("DB"));
        assert_eq!(filter.os_type, Some(OsType::Windows));

        let ini = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(OpsConfig::load_from_file(ini.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VMOPS_SUBSCRIPTION_ID", "sub-from-env"),
            ("VMOPS_COMMAND_TIMEOUT", "45"),
            ("VMOPS_RETRIES", "1"),
            ("VMOPS_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = OpsConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.azure.subscription_id, "sub-from-env");
        assert_eq!(config.run.command_timeout, 45);
        assert_eq!(config.run.retries, 1);
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let mut config = OpsConfig::default();
        let bad = config.apply_overrides(|k| (k == "VMOPS_COMMAND_TIMEOUT").then(|| "soon".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = OpsConfig::default();
        config.azure.subscription_id = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = OpsConfig::default();
        config.run.command_timeout = 0;
        assert!(config.validate().is_err());

        let mut config = OpsConfig::default();
        config.target.tags = vec!["no-colon".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_filter_defaults_to_windows() {
        let filter = OpsConfig::default().target_filter().unwrap();
        assert_eq!(filter.os_type, Some(OsType::Windows));

        let tagged = |os_type: OsType| {
            let mut vm = VirtualMachineRef::new("CLPEAPP01", "RG-CLPE", "sub")
                .with_tag("System", "CENTRAL_LOYALTY_PROMOTIONS_ENGINE");
            vm.os_type = os_type;
            vm
        };
        assert!(filter.matches(&tagged(OsType::Windows)));
        assert!(!filter.matches(&tagged(OsType::Linux)));

        // 配置里只写标签时也保持 windows
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "[target]\ntags = [\"ARIS:CLPE\"]").unwrap();
        let config = OpsConfig::load_from_file(toml_file.path()).unwrap();
        assert_eq!(config.target_filter().unwrap().os_type, Some(OsType::Windows));
    }

    #[test]
    fn test_health_filter_is_windows_web() {
        let filter = OpsConfig::default().health_filter().unwrap();
        assert_eq!(filter.os_type, Some(OsType::Windows));
        assert_eq!(filter.name_tag_contains.as_deref(), Some("WEB"));
        assert_eq!(filter.tags.len(), 2);
    }
}
