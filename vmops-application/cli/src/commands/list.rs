//! 虚拟机目录查看命令

use anyhow::{Context, Result};
use colored::Colorize;
use vmops_executor::{OpsConfig, TagFilter, VmFilter};

use super::common::{create_session, resolve_directory};
use super::output;

pub async fn handle(config: &OpsConfig, tags: Vec<String>) -> Result<()> {
    let filter = if tags.is_empty() {
        config.target_filter()?
    } else {
        let tags = tags
            .iter()
            .map(|t| t.parse::<TagFilter>())
            .collect::<Result<Vec<_>, _>>()
            .context("无效的 --tag 参数")?;
        VmFilter::new().tags(tags)
    };

    output::print_filter(&config.azure.subscription_id, &filter);

    let session = create_session(config).await?;
    let directory = resolve_directory(session, &filter).await?;

    if directory.is_empty() {
        println!("{} 没有找到匹配的虚拟机", "❌".red());
    } else {
        output::print_directory(&directory);
    }

    Ok(())
}
