//! 交互式输入

use std::io::{self, BufRead, Write};

use colored::Colorize;
use vmops_executor::selector::{parse_choice, parse_confirm};
use vmops_executor::{ChoiceInput, InteractiveSelector, Selection, VirtualMachineRef};

use super::output;

/// 读取一行输入，EOF 或读取失败时返回 None
pub fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    io::stdout().flush().ok()?;

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// y/N 确认
pub fn confirm(question: &str) -> bool {
    read_line(&format!("{} (y/N): ", question))
        .map(|answer| parse_confirm(&answer))
        .unwrap_or(false)
}

/// 从标准输入选择虚拟机
pub fn stdin_selector(
    allow_all: bool,
) -> InteractiveSelector<impl Fn(&[VirtualMachineRef]) -> Selection + Send + Sync> {
    InteractiveSelector::new(move |vms: &[VirtualMachineRef]| {
        output::print_directory(vms);

        let prompt = if allow_all {
            format!("\n选择虚拟机 (1-{}) 或输入 'all' 选择全部, 'q' 退出: ", vms.len())
        } else {
            format!("\n选择虚拟机 (1-{}), 'q' 退出: ", vms.len())
        };

        loop {
            let Some(input) = read_line(&prompt) else {
                return Selection::Cancel;
            };

            match parse_choice(&input, vms.len(), allow_all) {
                ChoiceInput::Quit => return Selection::Cancel,
                ChoiceInput::All => return Selection::All,
                ChoiceInput::Index(index) => {
                    let vm = &vms[index];
                    println!("\n{} 已选择: {}", "📋".cyan(), vm.name.green());
                    println!("   电源状态: {}", vm.power_state.display_with_emoji());

                    if !vm.power_state.is_running() {
                        println!("{} 虚拟机未处于运行状态", "⚠️".yellow());
                        if !confirm("仍然继续?") {
                            return Selection::Cancel;
                        }
                    }
                    return Selection::One(index);
                }
                ChoiceInput::Invalid(hint) => println!("{} {}", "❌".red(), hint),
            }
        }
    })
}

/// 逐行输入服务名，空行结束
pub fn read_service_names() -> Vec<String> {
    println!("输入要检查的服务名 (每行一个，空行结束):");
    println!("{}", "示例: W3SVC, MSSQLSERVER, Spooler, Themes".bright_black());

    let mut services = Vec::new();
    while let Some(name) = read_line("服务名: ") {
        if name.is_empty() {
            break;
        }
        services.push(name);
    }
    services
}
