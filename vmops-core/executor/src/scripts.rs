//! 远程 PowerShell 脚本
//!
//! 所有插入脚本的参数都经过校验或单引号转义。

use std::sync::OnceLock;

use regex::Regex;

use crate::{ExecutorError, Result};

/// 服务名只允许字母、数字、下划线、点和连字符
fn service_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("static regex"))
}

/// 校验服务名
pub fn validate_service_name(name: &str) -> Result<()> {
    if service_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(ExecutorError::InvalidScript(format!("非法的服务名: {:?}", name)))
    }
}

/// PowerShell 单引号字符串
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// 去掉 `.exe` 后缀（服务名和进程名均不带后缀）
fn strip_exe(name: &str) -> &str {
    name.strip_suffix(".exe")
        .or_else(|| name.strip_suffix(".EXE"))
        .unwrap_or(name)
}

/// ncrpes 服务监控脚本
///
/// 输出 JSON：服务状态、进程列表、系统 CPU/内存、时间戳和计算机名。
pub fn ncrpes_monitor_script(service_name: &str) -> Result<String> {
    let name = strip_exe(service_name);
    validate_service_name(name)?;
    let name = ps_quote(name);

    Ok(format!(
        r#"
$serviceName = {name}
$processName = {name}
$results = @{{}}

try {{
    $service = Get-Service -Name $serviceName -ErrorAction Stop
    $results.ServiceFound = $true
    $results.ServiceName = $service.Name
    $results.ServiceDisplayName = $service.DisplayName
    $results.ServiceStatus = $service.Status.ToString()
    $results.ServiceStartType = $service.StartType.ToString()
}} catch {{
    $results.ServiceFound = $false
    $results.ServiceError = $_.Exception.Message
}}

try {{
    $processes = @(Get-Process -Name $processName -ErrorAction SilentlyContinue)
    if ($processes.Count -gt 0) {{
        $results.ProcessFound = $true
        $results.ProcessCount = $processes.Count
        $results.Processes = @()
        foreach ($proc in $processes) {{
            $results.Processes += @{{
                PID = $proc.Id
                ProcessName = $proc.ProcessName
                StartTime = if ($proc.StartTime) {{ $proc.StartTime.ToString("yyyy-MM-dd HH:mm:ss") }} else {{ "Unknown" }}
                CPU = [math]::Round($proc.CPU, 2)
                WorkingSet = [math]::Round($proc.WorkingSet64/1MB, 2)
                VirtualMemory = [math]::Round($proc.VirtualMemorySize64/1MB, 2)
                HandleCount = $proc.HandleCount
                ThreadCount = $proc.Threads.Count
            }}
        }}
    }} else {{
        $results.ProcessFound = $false
    }}
}} catch {{
    $results.ProcessFound = $false
    $results.ProcessError = $_.Exception.Message
}}

try {{
    $cpu = Get-WmiObject -Class Win32_Processor | Measure-Object -Property LoadPercentage -Average
    $memory = Get-WmiObject -Class Win32_OperatingSystem
    $results.SystemInfo = @{{
        CPUUsage = [math]::Round($cpu.Average, 2)
        TotalMemoryGB = [math]::Round($memory.TotalVisibleMemorySize/1MB, 2)
        FreeMemoryGB = [math]::Round($memory.FreePhysicalMemory/1MB, 2)
        MemoryUsagePercent = [math]::Round((($memory.TotalVisibleMemorySize - $memory.FreePhysicalMemory) / $memory.TotalVisibleMemorySize) * 100, 2)
    }}
}} catch {{
    $results.SystemInfo = @{{ Error = $_.Exception.Message }}
}}

$results.Timestamp = (Get-Date).ToString("yyyy-MM-dd HH:mm:ss")
$results.ComputerName = $env:COMPUTERNAME

$results | ConvertTo-Json -Depth 4
"#
    ))
}

/// 多服务健康检查脚本，输出 JSON 数组
pub fn service_health_script(service_names: &[String]) -> Result<String> {
    if service_names.is_empty() {
        return Err(ExecutorError::InvalidScript("未指定要检查的服务".to_string()));
    }
    for name in service_names {
        validate_service_name(name)?;
    }

    let services = service_names
        .iter()
        .map(|s| ps_quote(s))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        r#"
$services = @({services})
$results = @()

foreach ($serviceName in $services) {{
    try {{
        $service = Get-Service -Name $serviceName -ErrorAction Stop
        $processInfo = ""

        if ($service.Status -eq 'Running' -and $service.ServiceType -ne 'Win32ShareProcess') {{
            try {{
                $wmi = Get-WmiObject -Class Win32_Service -Filter "Name='$serviceName'"
                $process = Get-Process -Id $wmi.ProcessId -ErrorAction SilentlyContinue
                if ($process) {{
                    $processInfo = "PID: $($process.Id), CPU: $([math]::Round($process.CPU, 2))s, Memory: $([math]::Round($process.WorkingSet64/1MB, 2))MB"
                }}
            }} catch {{
                $processInfo = "Process info unavailable"
            }}
        }}

        $results += [PSCustomObject]@{{
            ServiceName = $serviceName
            Status = $service.Status.ToString()
            StartType = $service.StartType.ToString()
            ProcessInfo = $processInfo
            Error = $null
        }}
    }} catch {{
        $results += [PSCustomObject]@{{
            ServiceName = $serviceName
            Status = "NotFound"
            StartType = "Unknown"
            ProcessInfo = ""
            Error = $_.Exception.Message
        }}
    }}
}}

ConvertTo-Json -InputObject $results -Depth 3
"#
    ))
}

/// 文件重命名脚本
///
/// `new_name` 只能是文件名，不能包含路径分隔符。
pub fn rename_file_script(path: &str, new_name: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(ExecutorError::InvalidScript("文件路径不能为空".to_string()));
    }
    if new_name.trim().is_empty() || new_name.contains(['\\', '/', ':']) {
        return Err(ExecutorError::InvalidScript(format!(
            "新文件名不能为空且不能包含路径分隔符: {:?}",
            new_name
        )));
    }

    let path = ps_quote(path.trim());
    let new_name = ps_quote(new_name.trim());

    Ok(format!(
        r#"
$path = {path}
$newName = {new_name}
if (-not (Test-Path -LiteralPath $path)) {{
    throw "File not found: $path"
}}
$item = Rename-Item -LiteralPath $path -NewName $newName -PassThru -ErrorAction Stop
Write-Output "Renamed: $path -> $($item.FullName)"
"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote("ncrpes"), "'ncrpes'");
        assert_eq!(ps_quote("it's"), "'it''s'");
    }

    #[test]
    fn test_validate_service_name() {
        assert!(validate_service_name("W3SVC").is_ok());
        assert!(validate_service_name("MSSQL.Server-1").is_ok());
        assert!(validate_service_name("x'; Remove-Item C:\\ -Recurse; '").is_err());
        assert!(validate_service_name("").is_err());
    }

    #[test]
    fn test_ncrpes_script_strips_exe() {
        let script = ncrpes_monitor_script("ncrpes.exe").unwrap();
        assert!(script.contains("$serviceName = 'ncrpes'"));
        assert!(script.contains("ConvertTo-Json -Depth 4"));
        assert!(!script.contains("{{"));
    }

    #[test]
    fn test_service_health_script() {
        let script = service_health_script(&["W3SVC".to_string(), "Spooler".to_string()]).unwrap();
        assert!(script.contains("$services = @('W3SVC', 'Spooler')"));
        assert!(service_health_script(&[]).is_err());
        assert!(service_health_script(&["bad name".to_string()]).is_err());
    }

    #[test]
    fn test_rename_script() {
        let script = rename_file_script(r"D:\NCR\config\app.config", "app.config.bak").unwrap();
        assert!(script.contains(r"$path = 'D:\NCR\config\app.config'"));
        assert!(script.contains("$newName = 'app.config.bak'"));
        assert!(rename_file_script(r"D:\a.txt", r"..\b.txt").is_err());
        assert!(rename_file_script("", "b.txt").is_err());
    }
}
