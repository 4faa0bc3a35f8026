//! 虚拟机选择
//!
//! 交互式选择通过 `VmSelector` 抽象，编排逻辑可以在测试中非交互地驱动。

use crate::directory::VirtualMachineRef;

/// 选择结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// 全部虚拟机
    All,
    /// 目录中的单台虚拟机（0-based）
    One(usize),
    /// 放弃
    Cancel,
}

impl Selection {
    /// 按选择结果截取目录
    pub fn apply(self, vms: &[VirtualMachineRef]) -> Vec<VirtualMachineRef> {
        match self {
            Selection::All => vms.to_vec(),
            Selection::One(index) => vms.get(index).cloned().into_iter().collect(),
            Selection::Cancel => Vec::new(),
        }
    }
}

/// 虚拟机选择器 trait
pub trait VmSelector: Send + Sync {
    /// 从目录中选择目标
    fn select(&self, vms: &[VirtualMachineRef]) -> Selection;
}

/// 选择全部
pub struct SelectAll;

impl VmSelector for SelectAll {
    fn select(&self, vms: &[VirtualMachineRef]) -> Selection {
        if vms.is_empty() {
            Selection::Cancel
        } else {
            Selection::All
        }
    }
}

/// 按名称选择（不区分大小写）
pub struct SelectByName(pub String);

impl VmSelector for SelectByName {
    fn select(&self, vms: &[VirtualMachineRef]) -> Selection {
        vms.iter()
            .position(|vm| vm.name.eq_ignore_ascii_case(&self.0))
            .map(Selection::One)
            .unwrap_or(Selection::Cancel)
    }
}

/// 交互式选择器：通过回调函数询问用户
pub struct InteractiveSelector<F>
where
    F: Fn(&[VirtualMachineRef]) -> Selection + Send + Sync,
{
    selector_fn: F,
}

impl<F> InteractiveSelector<F>
where
    F: Fn(&[VirtualMachineRef]) -> Selection + Send + Sync,
{
    pub fn new(selector_fn: F) -> Self {
        Self { selector_fn }
    }
}

impl<F> VmSelector for InteractiveSelector<F>
where
    F: Fn(&[VirtualMachineRef]) -> Selection + Send + Sync,
{
    fn select(&self, vms: &[VirtualMachineRef]) -> Selection {
        if vms.is_empty() {
            return Selection::Cancel;
        }
        (self.selector_fn)(vms)
    }
}

/// 解析后的一行用户输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceInput {
    All,
    Quit,
    /// 0-based
    Index(usize),
    /// 无效输入及提示
    Invalid(String),
}

/// 解析选择提示的输入：序号（1-based）、`all`、`q`/`quit`/`exit`
pub fn parse_choice(input: &str, count: usize, allow_all: bool) -> ChoiceInput {
    let choice = input.trim().to_lowercase();

    match choice.as_str() {
        "q" | "quit" | "exit" => return ChoiceInput::Quit,
        "all" if allow_all => return ChoiceInput::All,
        _ => {}
    }

    match choice.parse::<usize>() {
        Ok(n) if n >= 1 && n <= count => ChoiceInput::Index(n - 1),
        Ok(_) => ChoiceInput::Invalid("无效的选择，请重试".to_string()),
        Err(_) if allow_all => ChoiceInput::Invalid("请输入有效的序号或 'all'".to_string()),
        Err(_) => ChoiceInput::Invalid("请输入有效的序号".to_string()),
    }
}

/// 解析 y/N 确认，只有 `y`/`yes` 视为确认
pub fn parse_confirm(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
