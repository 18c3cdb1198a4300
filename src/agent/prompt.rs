//! 系统提示词构建：把检索到的记忆拼进 system 消息，置于对话历史之前

use crate::llm::types::Message;
use crate::memory::store::StoreItem;

pub const DEFAULT_SYSTEM_TEMPLATE: &str = "你是一个正在与用户交谈的小助手。用户信息：{info}";

pub const INFO_PLACEHOLDER: &str = "{info}";

/// 按检索顺序用换行拼接事实；没有 `data` 字段的记录被跳过
pub fn info_block(items: &[StoreItem]) -> String {
    items
        .iter()
        .filter_map(StoreItem::fact)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_system_prompt(template: &str, info: &str) -> String {
    template.replace(INFO_PLACEHOLDER, info)
}

/// `[system] + history`
pub fn augment(system_prompt: String, history: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(history);
    messages
}
