//! 记忆提取
//!
//! 检查最新一条用户消息：包含「记住」/ `remember` 等触发词时，依次尝试提取规则，
//! 第一条命中的规则决定写入的事实；全部未命中则原样保存整句。
//!
//! | 标记 | 生成的事实 |
//! |------|-----------|
//! | `我的名字是X` | `用户的名字是X` |
//! | `my name is X` | `user's name is X` |
//! | `我喜欢Y` | `用户喜欢Y` |
//! | `I like Y` | `user likes Y` |
//!
//! 规则是有序的 `(matcher, formatter)` 列表，可通过 [`FactExtractor::with_rule`]
//! 追加自定义规则，无需改动对话流程。

use std::sync::Arc;

/// 文本标记；`ignore_ascii_case` 时按 ASCII 忽略大小写匹配，
/// `whole_word` 时要求标记前后都不是 ASCII 字母数字（中文紧邻不影响）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    text: String,
    ignore_ascii_case: bool,
    whole_word: bool,
}

impl Marker {
    /// 精确匹配
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ignore_ascii_case: false,
            whole_word: false,
        }
    }

    /// 忽略 ASCII 大小写
    pub fn ignore_case(text: impl Into<String>) -> Self {
        Self {
            ignore_ascii_case: true,
            ..Self::exact(text)
        }
    }

    /// 忽略大小写，且必须是完整的词（`I like` 不匹配 `Hi like` 或 `I liked`）
    pub fn word(text: impl Into<String>) -> Self {
        Self {
            whole_word: true,
            ..Self::ignore_case(text)
        }
    }

    /// 第一次命中时返回标记之后的字节偏移
    pub fn find_end(&self, haystack: &str) -> Option<usize> {
        if self.text.is_empty() {
            return None;
        }
        // to_ascii_lowercase 不改变字节长度，偏移可直接用于原串
        let (hay, needle) = if self.ignore_ascii_case {
            (
                haystack.to_ascii_lowercase(),
                self.text.to_ascii_lowercase(),
            )
        } else {
            (haystack.to_string(), self.text.clone())
        };

        hay.match_indices(needle.as_str())
            .map(|(start, _)| start)
            .find(|&start| !self.whole_word || is_whole_word(haystack, start, needle.len()))
            .map(|start| start + needle.len())
    }

    pub fn matches(&self, haystack: &str) -> bool {
        self.find_end(haystack).is_some()
    }
}

fn is_whole_word(haystack: &str, start: usize, len: usize) -> bool {
    let before = haystack[..start].chars().next_back();
    let after = haystack[start + len..].chars().next();
    [before, after]
        .into_iter()
        .flatten()
        .all(|c| !c.is_ascii_alphanumeric())
}

/// 单条提取规则：命中时返回事实文本
pub trait ExtractionRule: Send + Sync {
    fn extract(&self, text: &str) -> Option<String>;
}

type Formatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 标记规则：取标记之后的文本（去掉首尾空白）交给 formatter
#[derive(Clone)]
pub struct MarkerRule {
    marker: Marker,
    formatter: Formatter,
}

impl MarkerRule {
    pub fn new<F>(marker: Marker, formatter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            marker,
            formatter: Arc::new(formatter),
        }
    }

    /// 事实 = `prefix` + 标记之后的文本
    pub fn prefixed(marker: Marker, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::new(marker, move |rest| format!("{prefix}{rest}"))
    }
}

impl ExtractionRule for MarkerRule {
    fn extract(&self, text: &str) -> Option<String> {
        let end = self.marker.find_end(text)?;
        Some((self.formatter)(text[end..].trim()))
    }
}

/// 用闭包实现的规则，便于临时扩展
pub struct FnRule<F>(pub F);

impl<F> ExtractionRule for FnRule<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn extract(&self, text: &str) -> Option<String> {
        (self.0)(text)
    }
}

/// 触发词 + 有序规则
pub struct FactExtractor {
    triggers: Vec<Marker>,
    rules: Vec<Box<dyn ExtractionRule>>,
}

impl Default for FactExtractor {
    /// 中英双语：触发词「记住」/ `remember`，姓名规则优先于偏好规则
    fn default() -> Self {
        Self::empty()
            .with_trigger(Marker::exact("记住"))
            .with_trigger(Marker::ignore_case("remember"))
            .with_rule(MarkerRule::prefixed(Marker::exact("我的名字是"), "用户的名字是"))
            .with_rule(MarkerRule::prefixed(Marker::word("my name is"), "user's name is "))
            .with_rule(MarkerRule::prefixed(Marker::exact("我喜欢"), "用户喜欢"))
            .with_rule(MarkerRule::prefixed(Marker::word("i like"), "user likes "))
    }
}

impl FactExtractor {
    /// 没有任何触发词与规则，`extract` 永远返回 `None`
    pub fn empty() -> Self {
        Self {
            triggers: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: Marker) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// 追加到规则列表末尾（优先级最低）
    pub fn with_rule(mut self, rule: impl ExtractionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn is_triggered(&self, text: &str) -> bool {
        self.triggers.iter().any(|t| t.matches(text))
    }

    /// 未触发返回 `None`；触发后总能得到事实（无规则命中时为原文）
    pub fn extract(&self, text: &str) -> Option<String> {
        if !self.is_triggered(text) {
            return None;
        }
        let fact = self
            .rules
            .iter()
            .find_map(|rule| rule.extract(text))
            .unwrap_or_else(|| text.to_string());
        Some(fact)
    }
}
