//! Azure Resource Manager 客户端核心实现

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::api::ComputeApi;
use crate::credential::{AccessToken, AzureCredential};
use crate::error::{AzureError, Result};

/// 默认管理平面地址
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// 令牌过期前提前刷新的余量
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Azure 客户端配置
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// 管理平面地址
    pub management_endpoint: String,

    /// 连接超时（秒）
    pub connect_timeout: u64,

    /// 单次请求超时（秒）
    pub request_timeout: u64,

    /// 长时操作轮询间隔（秒），服务端 Retry-After 优先
    pub poll_interval: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            connect_timeout: 10,
            request_timeout: 30,
            poll_interval: 5,
        }
    }
}

/// Azure 客户端
///
/// 绑定一个订阅和一个凭据来源，访问令牌在首次使用时获取并缓存。
pub struct AzureClient {
    /// 管理平面基础 URL
    base_url: String,

    /// 订阅 ID
    subscription_id: String,

    /// HTTP 客户端
    http_client: Client,

    /// 凭据来源
    credential: AzureCredential,

    /// 缓存的访问令牌
    access_token: Arc<RwLock<Option<AccessToken>>>,

    /// 配置
    config: AzureConfig,
}

impl AzureClient {
    /// 创建新的 Azure 客户端
    pub fn new(subscription_id: &str, credential: AzureCredential, config: AzureConfig) -> Result<Self> {
        if subscription_id.trim().is_empty() {
            return Err(AzureError::ConfigError("订阅 ID 不能为空".to_string()));
        }

        let endpoint = Url::parse(&config.management_endpoint).map_err(|e| {
            AzureError::ConfigError(format!("无效的管理平面地址 {}: {}", config.management_endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(AzureError::ConfigError(format!(
                "管理平面地址必须是 http(s): {}",
                config.management_endpoint
            )));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .build()
            .map_err(|e| AzureError::HttpError(e.to_string()))?;

        Ok(Self {
            base_url: config.management_endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.trim().to_string(),
            http_client,
            credential,
            access_token: Arc::new(RwLock::new(None)),
            config,
        })
    }

    /// 认证：获取并缓存访问令牌
    ///
    /// 在枚举虚拟机之前调用，使凭据问题尽早暴露。
    pub async fn authenticate(&self) -> Result<()> {
        info!("Azure 客户端认证: 订阅 {}", self.subscription_id);
        let token = self.credential.get_token().await?;
        *self.access_token.write().await = Some(token);
        info!("Azure 客户端认证成功");
        Ok(())
    }

    /// 获取计算资源 API
    pub fn compute(&self) -> ComputeApi<'_> {
        ComputeApi::new(self)
    }

    /// 订阅 ID
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// 配置
    pub fn config(&self) -> &AzureConfig {
        &self.config
    }

    /// 获取当前有效的令牌，必要时刷新
    pub async fn get_token(&self) -> Result<String> {
        {
            let cached = self.access_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.expires_within(TOKEN_REFRESH_MARGIN) {
                    return Ok(token.token.clone());
                }
                debug!("访问令牌即将过期，重新获取");
            }
        }

        let token = self.credential.get_token().await?;
        let value = token.token.clone();
        *self.access_token.write().await = Some(token);
        Ok(value)
    }

    /// 拼接完整 URL（已是完整 URL 时原样返回，用于 nextLink / Location）
    pub(crate) fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}{}", self.base_url, path_or_url)
        }
    }

    /// 发送请求并返回原始响应（非 2xx 转为错误）
    pub(crate) async fn send<T: Serialize>(
        &self,
        method: Method,
        path_or_url: &str,
        body: Option<&T>,
    ) -> Result<Response> {
        let url = self.url(path_or_url);
        debug!("Azure API 请求: {} {}", method, url);

        let token = self.get_token().await?;

        let mut request = self.http_client.request(method, &url).bearer_auth(token);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误响应".to_string());
            warn!("Azure API 请求失败: {} - {}", status, error_text);
            return Err(AzureError::from_status(status.as_u16(), error_text));
        }

        Ok(response)
    }

    /// 发送请求并解析 JSON 响应
    pub(crate) async fn request<T: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path_or_url: &str,
        body: Option<&T>,
    ) -> Result<R> {
        let response = self.send(method, path_or_url, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| AzureError::ParseError(e.to_string()))
    }
}
