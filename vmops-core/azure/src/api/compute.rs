//! 计算资源 API
//!
//! - 虚拟机枚举（自动处理 nextLink 分页）
//! - 实例视图（电源状态）
//! - Run Command（长时操作轮询）

use std::time::Duration;

use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use crate::client::AzureClient;
use crate::error::{AzureError, Result};
use crate::models::{
    AsyncOperationStatus, InstanceView, ListResponse, OsType, PowerState, RunCommandInput,
    RunCommandResult, VirtualMachine,
};

/// Compute 资源提供程序 API 版本
pub const COMPUTE_API_VERSION: &str = "2023-03-01";

const ASYNC_OPERATION: &str = "azure-asyncoperation";

/// 计算资源 API
pub struct ComputeApi<'a> {
    client: &'a AzureClient,
}

impl<'a> ComputeApi<'a> {
    pub(crate) fn new(client: &'a AzureClient) -> Self {
        Self { client }
    }

    fn vm_path(&self, resource_group: &str, vm_name: &str) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}",
            self.client.subscription_id(),
            resource_group,
            vm_name
        )
    }

    /// 查询订阅下所有虚拟机(自动处理分页)
    pub async fn list_all(&self) -> Result<Vec<VirtualMachine>> {
        info!("查询订阅 {} 下的虚拟机", self.client.subscription_id());

        let mut next = Some(format!(
            "/subscriptions/{}/providers/Microsoft.Compute/virtualMachines?api-version={}",
            self.client.subscription_id(),
            COMPUTE_API_VERSION
        ));
        let mut vms = Vec::new();

        while let Some(url) = next.take() {
            let page: ListResponse<VirtualMachine> =
                self.client.request::<(), _>(Method::GET, &url, None).await?;
            debug!("本页虚拟机数量: {}", page.value.len());
            vms.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }

        info!("共查询到 {} 台虚拟机", vms.len());
        Ok(vms)
    }

    /// 查询实例视图
    pub async fn instance_view(&self, resource_group: &str, vm_name: &str) -> Result<InstanceView> {
        let path = format!(
            "{}/instanceView?api-version={}",
            self.vm_path(resource_group, vm_name),
            COMPUTE_API_VERSION
        );
        self.client.request::<(), _>(Method::GET, &path, None).await
    }

    /// 查询电源状态
    pub async fn power_state(&self, resource_group: &str, vm_name: &str) -> Result<PowerState> {
        Ok(self.instance_view(resource_group, vm_name).await?.power_state())
    }

    /// 执行 Run Command 并等待完成
    ///
    /// 本方法不设总超时，调用方使用 `tokio::time::timeout` 包裹。
    pub async fn run_command(
        &self,
        resource_group: &str,
        vm_name: &str,
        os_type: OsType,
        script: &str,
    ) -> Result<RunCommandResult> {
        info!("执行 Run Command: {}/{} ({})", resource_group, vm_name, os_type.run_command_id());

        let path = format!(
            "{}/runCommand?api-version={}",
            self.vm_path(resource_group, vm_name),
            COMPUTE_API_VERSION
        );
        let input = RunCommandInput::new(os_type, script);

        let response = self.client.send(Method::POST, &path, Some(&input)).await?;

        if response.status() == StatusCode::OK {
            return response
                .json::<RunCommandResult>()
                .await
                .map_err(|e| AzureError::ParseError(e.to_string()));
        }

        let headers = response.headers().clone();
        let retry_after = self.retry_after(&headers);

        if let Some(location) = header_str(&headers, LOCATION.as_str()) {
            return self.poll_location(&location, retry_after).await;
        }
        if let Some(operation) = header_str(&headers, ASYNC_OPERATION) {
            return self.poll_async_operation(&operation, retry_after).await;
        }

        Err(AzureError::OperationFailed(format!(
            "Run Command 返回 {} 但未提供轮询地址",
            response.status()
        )))
    }

    /// 轮询 Location 头，直到返回 200 和结果
    async fn poll_location(&self, location: &str, mut delay: Duration) -> Result<RunCommandResult> {
        loop {
            tokio::time::sleep(delay).await;
            let response = self.client.send::<()>(Method::GET, location, None).await?;

            if response.status() == StatusCode::ACCEPTED {
                debug!("Run Command 仍在执行");
                delay = self.retry_after(response.headers());
                continue;
            }

            let text = response
                .text()
                .await
                .map_err(|e| AzureError::ParseError(e.to_string()))?;
            if text.trim().is_empty() {
                return Ok(RunCommandResult::default());
            }
            return serde_json::from_str(&text).map_err(|e| AzureError::ParseError(e.to_string()));
        }
    }

    /// 轮询 Azure-AsyncOperation 头，直到状态终结
    async fn poll_async_operation(&self, url: &str, mut delay: Duration) -> Result<RunCommandResult> {
        loop {
            tokio::time::sleep(delay).await;
            let response = self.client.send::<()>(Method::GET, url, None).await?;
            delay = self.retry_after(response.headers());

            let status: AsyncOperationStatus = response
                .json()
                .await
                .map_err(|e| AzureError::ParseError(e.to_string()))?;

            match status.status.as_str() {
                "Succeeded" => {
                    return Ok(status
                        .properties
                        .and_then(|p| p.output)
                        .unwrap_or_default());
                }
                "Failed" | "Canceled" => {
                    let detail = status
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| status.status.clone());
                    return Err(AzureError::OperationFailed(detail));
                }
                other => debug!("Run Command 状态: {}", other),
            }
        }
    }

    fn retry_after(&self, headers: &HeaderMap) -> Duration {
        header_str(headers, RETRY_AFTER.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(self.client.config().poll_interval))
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_header_str() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("10"));
        headers.insert(ASYNC_OPERATION, HeaderValue::from_static("https://management.azure.com/op/1"));
        assert_eq!(header_str(&headers, "retry-after").as_deref(), Some("10"));
        assert_eq!(
            header_str(&headers, ASYNC_OPERATION).as_deref(),
            Some("https://management.azure.com/op/1")
        );
        assert_eq!(header_str(&headers, "location"), None);
    }
}
