//! # Dialogue 模块
//!
//! 编译后的对话条目：角色名、各语言文本、按阶段归类的 lazy 代码。

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::script::hash;
use crate::script::{BlockType, ParsedBlock, ParsedDialogueEntry};

/// lazy 代码块的执行阶段，由代码块属性 `stage` 指定
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueActionStage {
    /// 存档点之前
    BeforeCheckpoint,
    /// 默认阶段（未指定 `stage`）
    Default,
    /// 对话显示之后
    AfterDialogue,
}

impl DialogueActionStage {
    pub const ALL: [Self; 3] = [Self::BeforeCheckpoint, Self::Default, Self::AfterDialogue];

    /// 对应的 `stage` 属性值
    pub fn attribute_value(self) -> &'static str {
        match self {
            Self::BeforeCheckpoint => "before_checkpoint",
            Self::Default => "",
            Self::AfterDialogue => "after_dialogue",
        }
    }

    /// 从代码块属性中解析阶段
    pub fn of_block(block: &ParsedBlock) -> Option<Self> {
        let value = block
            .attributes
            .as_ref()
            .and_then(|attributes| attributes.get("stage"))
            .and_then(|value| value.as_deref())
            .unwrap_or("");
        Self::ALL
            .into_iter()
            .find(|stage| stage.attribute_value() == value)
    }
}

/// 某个语言下的对话文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedDialogueEntry {
    pub display_name: String,
    pub dialogue: String,
}

/// 对话条目
///
/// 身份与语言无关，只有文本随语言变化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueEntry {
    line: usize,
    character_name: String,
    /// 默认语言文本
    text: LocalizedDialogueEntry,
    /// 其他语言文本
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    localized: BTreeMap<String, LocalizedDialogueEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    actions: BTreeMap<DialogueActionStage, String>,
    text_hash: u64,
}

impl DialogueEntry {
    pub fn new(
        line: usize,
        character_name: impl Into<String>,
        text: LocalizedDialogueEntry,
        actions: BTreeMap<DialogueActionStage, String>,
    ) -> Self {
        let character_name = character_name.into();
        let text_hash = hash::fold(
            [
                hash::hash_str(&character_name),
                hash::hash_str(&text.display_name),
                hash::hash_str(&text.dialogue),
            ]
            .into_iter()
            .chain(actions.values().map(|code| hash::hash_str(code))),
        );

        Self {
            line,
            character_name,
            text,
            localized: BTreeMap::new(),
            actions,
            text_hash,
        }
    }

    /// 从解析结果构造，lazy 代码按阶段合并
    pub fn from_parsed(parsed: ParsedDialogueEntry) -> Self {
        let actions = collect_actions(parsed.line, &parsed.code_blocks);
        Self::new(
            parsed.line,
            parsed.character_name,
            LocalizedDialogueEntry {
                display_name: parsed.display_name,
                dialogue: parsed.dialogue,
            },
            actions,
        )
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    /// 默认语言文本
    pub fn default_text(&self) -> &LocalizedDialogueEntry {
        &self.text
    }

    /// 指定语言的文本，缺失时回退到默认语言
    pub fn text(&self, locale: &str) -> &LocalizedDialogueEntry {
        self.localized.get(locale).unwrap_or(&self.text)
    }

    /// 已有译文的语言
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.localized.keys().map(String::as_str)
    }

    pub fn action(&self, stage: DialogueActionStage) -> Option<&str> {
        self.actions.get(&stage).map(String::as_str)
    }

    pub fn actions(&self) -> &BTreeMap<DialogueActionStage, String> {
        &self.actions
    }

    pub fn text_hash(&self) -> u64 {
        self.text_hash
    }

    pub(crate) fn add_localized(&mut self, locale: &str, entry: LocalizedDialogueEntry) {
        self.localized.insert(locale.to_string(), entry);
    }
}

/// 把同一阶段的 lazy 代码块按顺序拼接
fn collect_actions(line: usize, blocks: &[ParsedBlock]) -> BTreeMap<DialogueActionStage, String> {
    let mut codes: BTreeMap<DialogueActionStage, String> = BTreeMap::new();
    for block in blocks.iter().filter(|block| block.kind == BlockType::LazyExecution) {
        let Some(stage) = DialogueActionStage::of_block(block) else {
            warn!(line, attributes = ?block.attributes, "未知的代码块阶段，已忽略");
            continue;
        };
        let code = codes.entry(stage).or_default();
        code.push_str(&block.content);
        code.push('\n');
    }

    codes
        .into_iter()
        .filter_map(|(stage, code)| {
            let code = code.trim();
            (!code.is_empty()).then(|| (stage, code.to_string()))
        })
        .collect()
}
