//! Azure 凭据
//!
//! 访问令牌由外部获取，本模块只负责取用：
//! - `AzureCli`: 调用系统 `az account get-access-token`（需已 `az login`）
//! - `Static`: 直接使用给定的令牌（托管身份、CI 环境或测试）

use std::process::{Output, Stdio};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{AzureError, Result};

/// Azure Resource Manager 资源标识
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// `az` 命令执行超时
const AZ_CLI_TIMEOUT: Duration = Duration::from_secs(60);

/// 访问令牌
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// 令牌内容
    pub token: String,
    /// 过期时间（未知时为 None）
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// 创建无过期时间的令牌
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_on: None,
        }
    }

    /// 令牌是否将在 `margin` 内过期
    pub fn expires_within(&self, margin: Duration) -> bool {
        match self.expires_on {
            Some(expires_on) => {
                let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
                Utc::now() + margin >= expires_on
            }
            None => false,
        }
    }
}

/// 凭据来源
#[derive(Debug, Clone)]
pub enum AzureCredential {
    /// 使用 Azure CLI 登录态
    AzureCli,
    /// 使用显式令牌
    Static(String),
}

/// `az account get-access-token` 的输出
#[derive(Debug, Deserialize)]
struct CliTokenOutput {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// 新版 CLI 输出 POSIX 时间戳
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
    /// 旧版 CLI 只输出本地时间字符串，如 "2024-05-01 12:00:00.000000"
    #[serde(default, rename = "expiresOn")]
    expires_on_local: Option<String>,
}

impl AzureCredential {
    /// 获取访问令牌
    pub async fn get_token(&self) -> Result<AccessToken> {
        match self {
            AzureCredential::Static(token) => {
                if token.trim().is_empty() {
                    return Err(AzureError::AuthError("访问令牌为空".to_string()));
                }
                Ok(AccessToken::new(token.trim()))
            }
            AzureCredential::AzureCli => {
                let output = Self::run_az_cli().await?;
                parse_cli_token(&output)
            }
        }
    }

    async fn run_az_cli() -> Result<String> {
        info!("通过 Azure CLI 获取访问令牌");

        let mut cmd = Command::new(if cfg!(windows) { "az.cmd" } else { "az" });
        cmd.arg("account")
            .arg("get-access-token")
            .arg("--resource")
            .arg(MANAGEMENT_RESOURCE)
            .arg("--output")
            .arg("json");

        let output = output_with_timeout(cmd, AZ_CLI_TIMEOUT).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AzureError::AuthError(format!(
                "Azure CLI 获取令牌失败，请先执行 az login: {}",
                stderr
            )));
        }

        debug!("Azure CLI 返回令牌, 长度: {}", output.stdout.len());
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// 执行命令并收集输出，超时后终止子进程
async fn output_with_timeout(mut cmd: Command, limit: Duration) -> Result<Output> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| AzureError::AuthError(format!("无法启动 Azure CLI (请确认已安装 az): {}", e)))?;

    // 超时丢弃 future 时 child 一并被丢弃并 kill
    timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| AzureError::Timeout(format!("Azure CLI 在 {:?} 内未返回", limit)))?
        .map_err(|e| AzureError::AuthError(format!("等待 Azure CLI 失败: {}", e)))
}

/// 解析 Azure CLI 的令牌 JSON
fn parse_cli_token(raw: &str) -> Result<AccessToken> {
    let parsed: CliTokenOutput = serde_json::from_str(raw)
        .map_err(|e| AzureError::AuthError(format!("无法解析 Azure CLI 令牌输出: {}", e)))?;

    if parsed.access_token.is_empty() {
        return Err(AzureError::AuthError("Azure CLI 返回了空令牌".to_string()));
    }

    let expires_on = match (parsed.expires_on, parsed.expires_on_local.as_deref()) {
        (Some(ts), _) => Utc.timestamp_opt(ts, 0).single(),
        (None, Some(local)) => parse_local_time(local),
        (None, None) => None,
    };

    Ok(AccessToken {
        token: parsed.access_token,
        expires_on,
    })
}

fn parse_local_time(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let token = AzureCredential::Static(" abc ".into()).get_token().await.unwrap();
        assert_eq!(token.token, "abc");
        assert!(!token.expires_within(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_empty_static_token_is_auth_error() {
        let err = AzureCredential::Static("  ".into()).get_token().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_parse_cli_token_with_timestamp() {
        let raw = r#"{
            "accessToken": "eyJ0eXAi",
            "expiresOn": "2099-01-01 00:00:00.000000",
            "expires_on": 4070908800,
            "subscription": "5b479b96-2b99-464d-a824-2761380620ea",
            "tokenType": "Bearer"
        }"#;
        let token = parse_cli_token(raw).unwrap();
        assert_eq!(token.token, "eyJ0eXAi");
        assert!(token.expires_on.is_some());
        assert!(!token.expires_within(Duration::from_secs(300)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(format!("sleep 1 && touch '{}'", marker.display()));

        let err = output_with_timeout(cmd, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, AzureError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cli_output_collected() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo token; echo warn >&2");

        let output = output_with_timeout(cmd, Duration::from_secs(5)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "token");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "warn");
    }

    #[test]
    fn test_expired_token() {
        let token = AccessToken {
            token: "t".into(),
            expires_on: Some(Utc::now() - chrono::Duration::minutes(1)),
        };
        assert!(token.expires_within(Duration::from_secs(0)));
    }

    #[test]
    fn test_parse_cli_token_garbage() {
        assert!(parse_cli_token("not json").unwrap_err().is_auth());
    }
}
