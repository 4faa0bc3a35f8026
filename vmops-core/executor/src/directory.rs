//! 虚拟机目录解析
//!
//! 按标签、Name 标签子串、操作系统和名称筛选订阅下的虚拟机，
//! 输出按枚举顺序排列、按名称去重的目标列表。

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vmops_azure::{OsType, PowerState, VirtualMachine};

use crate::session::ComputeSession;
use crate::{ExecutorError, Result};

/// 目标虚拟机
///
/// 在一次运行中构造后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineRef {
    /// 虚拟机名称（目录内唯一）
    pub name: String,
    /// 资源组
    pub resource_group: String,
    /// 订阅 ID
    pub subscription_id: String,
    /// 资源标签
    pub tags: BTreeMap<String, String>,
    /// 区域
    pub location: String,
    /// 规格
    pub vm_size: Option<String>,
    /// 操作系统
    pub os_type: OsType,
    /// 电源状态
    pub power_state: PowerState,
}

impl VirtualMachineRef {
    /// 构造一个最小目标（测试或按名称直接指定时使用）
    pub fn new(name: impl Into<String>, resource_group: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_group: resource_group.into(),
            subscription_id: subscription_id.into(),
            tags: BTreeMap::new(),
            location: String::new(),
            vm_size: None,
            os_type: OsType::Windows,
            power_state: PowerState::Unknown,
        }
    }

    /// 添加标签
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// 从 ARM 资源构造，无法确定资源组时返回 None
    pub fn from_resource(vm: &VirtualMachine, default_subscription: &str) -> Option<Self> {
        let resource_group = vm.resource_group()?.to_string();
        Some(Self {
            name: vm.name.clone(),
            resource_group,
            subscription_id: vm
                .subscription_id()
                .unwrap_or(default_subscription)
                .to_string(),
            tags: vm.tags().into_iter().collect(),
            location: vm.location.clone(),
            vm_size: vm.vm_size().map(|s| s.to_string()),
            os_type: vm.os_type(),
            power_state: PowerState::Unknown,
        })
    }

    /// 读取标签值
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// 按名称推断角色
    pub fn role(&self) -> &'static str {
        if self.name.to_uppercase().contains("DB") {
            "Database Server"
        } else {
            "Web Server"
        }
    }

    /// 标签的单行显示
    pub fn tags_display(&self) -> String {
        if self.tags.is_empty() {
            return "No tags".to_string();
        }
        self.tags
            .iter()
            .map(|(k, v)| format!("{}:{}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 标签过滤条件 `Key:Value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagFilter {
    pub key: String,
    pub value: String,
}

impl TagFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `tags[key] == value`，或者某个标签值恰好是 `key:value` 字面量
    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        if tags.get(&self.key).map_or(false, |v| v == &self.value) {
            return true;
        }
        let literal = self.to_string();
        tags.values().any(|v| v == &literal)
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

impl FromStr for TagFilter {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = s
            .split_once(':')
            .ok_or_else(|| ExecutorError::Config(format!("标签过滤条件格式应为 Key:Value: {}", s)))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(ExecutorError::Config(format!("标签过滤条件的键和值不能为空: {}", s)));
        }
        Ok(Self::new(key, value))
    }
}

impl TryFrom<String> for TagFilter {
    type Error = ExecutorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TagFilter> for String {
    fn from(filter: TagFilter) -> Self {
        filter.to_string()
    }
}

/// 虚拟机筛选条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmFilter {
    /// 必须全部满足的标签
    pub tags: Vec<TagFilter>,
    /// Name 标签需包含的子串（不区分大小写）
    pub name_tag_contains: Option<String>,
    /// 操作系统
    pub os_type: Option<OsType>,
    /// 精确的虚拟机名称
    pub vm_name: Option<String>,
}

impl VmFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, filter: TagFilter) -> Self {
        self.tags.push(filter);
        self
    }

    pub fn tags(mut self, filters: impl IntoIterator<Item = TagFilter>) -> Self {
        self.tags.extend(filters);
        self
    }

    pub fn name_tag_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_tag_contains = Some(needle.into());
        self
    }

    pub fn os_type(mut self, os_type: OsType) -> Self {
        self.os_type = Some(os_type);
        self
    }

    pub fn vm_name(mut self, name: impl Into<String>) -> Self {
        self.vm_name = Some(name.into());
        self
    }

    /// 检查虚拟机是否满足全部条件
    pub fn matches(&self, vm: &VirtualMachineRef) -> bool {
        if let Some(name) = &self.vm_name {
            if !vm.name.eq_ignore_ascii_case(name) {
                return false;
            }
        }

        if let Some(os_type) = self.os_type {
            if vm.os_type != os_type {
                return false;
            }
        }

        if !self.tags.iter().all(|t| t.matches(&vm.tags)) {
            return false;
        }

        if let Some(needle) = &self.name_tag_contains {
            let name_tag = vm.tag("Name").unwrap_or("");
            if !name_tag.to_uppercase().contains(&needle.to_uppercase()) {
                return false;
            }
        }

        true
    }

    /// 条件描述（用于日志和提示）
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for tag in &self.tags {
            lines.push(format!("Tag {}", tag));
        }
        if let Some(needle) = &self.name_tag_contains {
            lines.push(format!("Name tag contains: {}", needle));
        }
        if let Some(os_type) = self.os_type {
            lines.push(format!("OS Type: {}", os_type));
        }
        if let Some(name) = &self.vm_name {
            lines.push(format!("VM name: {}", name));
        }
        lines
    }
}

/// 目录解析器
pub struct DirectoryResolver {
    session: Arc<dyn ComputeSession>,
    lookup_power_state: bool,
}

impl DirectoryResolver {
    pub fn new(session: Arc<dyn ComputeSession>) -> Self {
        Self {
            session,
            lookup_power_state: true,
        }
    }

    /// 不查询电源状态（全部记为 unknown）
    pub fn without_power_state(mut self) -> Self {
        self.lookup_power_state = false;
        self
    }

    /// 解析目标虚拟机
    ///
    /// 空结果不是错误；枚举失败时返回 `DirectoryResolution`，凭据失败时返回 `Auth`。
    pub async fn resolve(&self, filter: &VmFilter) -> Result<Vec<VirtualMachineRef>> {
        info!("解析虚拟机目录: 订阅 {}", self.session.subscription_id());

        let resources = self.session.list_virtual_machines().await.map_err(|e| {
            if e.is_auth() {
                ExecutorError::Auth(e.to_string())
            } else {
                ExecutorError::DirectoryResolution(e.to_string())
            }
        })?;

        let total = resources.len();
        let mut seen = HashSet::new();
        let mut vms = Vec::new();

        for resource in &resources {
            let Some(vm) = VirtualMachineRef::from_resource(resource, self.session.subscription_id()) else {
                warn!("无法从资源 ID 解析资源组，跳过: {}", resource.id);
                continue;
            };

            if !filter.matches(&vm) {
                continue;
            }

            if !seen.insert(vm.name.to_lowercase()) {
                debug!("重复的虚拟机名称，忽略: {}", vm.name);
                continue;
            }

            vms.push(vm);
        }

        if self.lookup_power_state {
            for vm in &mut vms {
                match self.session.power_state(&vm.resource_group, &vm.name).await {
                    Ok(state) => vm.power_state = state,
                    Err(e) => warn!("无法获取 {} 的电源状态: {}", vm.name, e),
                }
            }
        }

        info!("目录解析完成: 共 {} 台, 匹配 {} 台", total, vms.len());
        Ok(vms)
    }
}
