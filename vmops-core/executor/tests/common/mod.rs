//! 测试用的内存云会话

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use vmops_azure::{AzureError, PowerState, Result, VirtualMachine};
use vmops_executor::{ComputeSession, RemoteOutput, VirtualMachineRef};

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

/// 单台虚拟机的模拟行为
pub enum Behavior {
    /// 返回固定输出
    Output(RemoteOutput),
    /// 返回错误
    Error(fn() -> AzureError),
    /// 前 `times` 次调用永不返回，之后成功
    Hang { times: usize },
    /// 触发取消令牌后永不返回
    Cancel(CancellationToken),
}

pub struct MockSession {
    vms: Vec<VirtualMachine>,
    list_error: Option<fn() -> AzureError>,
    power_errors: Vec<String>,
    behaviors: HashMap<String, Behavior>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockSession {
    pub fn new(vms: Vec<VirtualMachine>) -> Self {
        Self {
            vms,
            list_error: None,
            power_errors: Vec::new(),
            behaviors: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_list(make: fn() -> AzureError) -> Self {
        let mut session = Self::new(Vec::new());
        session.list_error = Some(make);
        session
    }

    pub fn with_behavior(mut self, vm: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(vm.to_string(), behavior);
        self
    }

    pub fn with_power_error(mut self, vm: &str) -> Self {
        self.power_errors.push(vm.to_string());
        self
    }

    /// 按调用顺序记录的 (虚拟机, 脚本)
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputeSession for MockSession {
    fn subscription_id(&self) -> &str {
        SUBSCRIPTION
    }

    async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        match self.list_error {
            Some(make) => Err(make()),
            None => Ok(self.vms.clone()),
        }
    }

    async fn power_state(&self, _resource_group: &str, vm_name: &str) -> Result<PowerState> {
        if self.power_errors.iter().any(|n| n == vm_name) {
            return Err(AzureError::ApiError(500, "instance view unavailable".to_string()));
        }
        Ok(PowerState::Running)
    }

    async fn run_command(&self, target: &VirtualMachineRef, script: &str) -> Result<RemoteOutput> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((target.name.clone(), script.to_string()));
            calls.iter().filter(|(name, _)| name == &target.name).count()
        };

        match self.behaviors.get(&target.name) {
            None => Ok(RemoteOutput::new(format!("ok from {}", target.name), "", Some(0))),
            Some(Behavior::Output(output)) => Ok(output.clone()),
            Some(Behavior::Error(make)) => Err(make()),
            Some(Behavior::Hang { times }) if attempt <= *times => std::future::pending().await,
            Some(Behavior::Hang { .. }) => Ok(RemoteOutput::new("recovered", "", Some(0))),
            Some(Behavior::Cancel(token)) => {
                token.cancel();
                std::future::pending().await
            }
        }
    }
}

/// 构造 ARM 虚拟机资源
pub fn vm_resource(name: &str, resource_group: &str, tags: &[(&str, &str)], os_type: &str) -> VirtualMachine {
    let tags: HashMap<&str, &str> = tags.iter().copied().collect();
    serde_json::from_value(json!({
        "id": format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            SUBSCRIPTION, resource_group, name
        ),
        "name": name,
        "location": "eastus",
        "tags": tags,
        "properties": {
            "hardwareProfile": {"vmSize": "Standard_D4s_v3"},
            "storageProfile": {"osDisk": {"osType": os_type}}
        }
    }))
    .unwrap()
}

pub fn vm_ref(name: &str) -> VirtualMachineRef {
    VirtualMachineRef::new(name, "RG-CLPE", SUBSCRIPTION)
}
