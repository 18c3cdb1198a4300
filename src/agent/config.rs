//! Agent 配置

use crate::agent::prompt::DEFAULT_SYSTEM_TEMPLATE;
use crate::memory::store::MEMORIES_COLLECTION;

/// [`MemoryAgent`](crate::agent::MemoryAgent) 运行时配置
///
/// 通过构建器链式调用设置各项参数。
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub(crate) agent_name: String,
    /// 记忆命名空间的集合名，与 `user_id` 组成 namespace
    pub(crate) collection: String,
    /// 系统提示词模板，`{info}` 会被替换为检索到的用户信息
    pub(crate) system_template: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new("memory_agent")
    }
}

impl AgentConfig {
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            collection: MEMORIES_COLLECTION.to_string(),
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }

    pub fn collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    /// 模板中不含 `{info}` 时检索结果不会进入提示词
    pub fn system_template(mut self, template: &str) -> Self {
        self.system_template = template.to_string();
        self
    }
}
