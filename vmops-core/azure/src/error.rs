//! Azure 客户端错误定义

use thiserror::Error;

/// Azure 客户端错误类型
#[derive(Error, Debug)]
pub enum AzureError {
    #[error("HTTP 错误: {0}")]
    HttpError(String),

    #[error("认证错误: {0}")]
    AuthError(String),

    #[error("API 错误 [{0}]: {1}")]
    ApiError(u16, String),

    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("超时错误: {0}")]
    Timeout(String),

    #[error("资源不存在: {0}")]
    NotFound(String),

    #[error("虚拟机未运行: {0}")]
    NotRunning(String),

    #[error("操作失败: {0}")]
    OperationFailed(String),
}

impl AzureError {
    /// 根据 HTTP 状态码归类 API 错误
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => AzureError::AuthError(body),
            404 => AzureError::NotFound(body),
            409 if body.contains("OperationNotAllowed") || body.to_lowercase().contains("running") => {
                AzureError::NotRunning(body)
            }
            _ => AzureError::ApiError(status, body),
        }
    }

    /// 是否为认证类错误
    pub fn is_auth(&self) -> bool {
        matches!(self, AzureError::AuthError(_))
    }
}

impl From<reqwest::Error> for AzureError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AzureError::Timeout(e.to_string())
        } else {
            AzureError::HttpError(e.to_string())
        }
    }
}

/// Azure 客户端结果类型
pub type Result<T> = std::result::Result<T, AzureError>;
