//! Bilingual message catalog.
//!
//! Every user-facing string lives here so the REPL can switch languages at
//! runtime with `/lang`. Log output stays English; only chat UI is localized.

use std::str::FromStr;

/// Supported UI languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "zh" => Ok(Language::Zh),
            other => Err(format!("unsupported language '{other}' (expected en or zh)")),
        }
    }
}

impl Language {
    /// The message catalog for this language.
    pub fn messages(&self) -> &'static Messages {
        match self {
            Language::En => &EN,
            Language::Zh => &ZH,
        }
    }
}

/// All user-facing strings for one language.
#[derive(Debug)]
pub struct Messages {
    pub welcome: &'static str,
    pub user_prompt: &'static str,
    pub exit_message: &'static str,
    pub thinking: &'static str,
    pub response_time: &'static str,
    pub error_prefix: &'static str,
    pub retry_message: &'static str,
    pub clear_message: &'static str,
    pub history_title: &'static str,
    pub history_empty: &'static str,
    pub language_changed: &'static str,
    pub invalid_command: &'static str,
    pub timeout: &'static str,
    pub interrupt_hint: &'static str,
    pub cached_note: &'static str,
    pub missing_api_key: &'static str,

    // Retrieval
    pub load_usage: &'static str,
    pub load_not_found: &'static str,
    pub load_success: &'static str,
    pub load_chunks: &'static str,
    pub load_preview_title: &'static str,
    pub load_empty: &'static str,
    pub kb_cleared: &'static str,
    pub kb_unavailable: &'static str,
    pub embedding_preparing: &'static str,

    // Prompt assembly
    pub system_prompt: &'static str,
    pub context_header: &'static str,

    pub help: &'static str,
}

pub static EN: Messages = Messages {
    welcome: "Welcome to termchat! How can I assist you today?",
    user_prompt: "User> ",
    exit_message: "Goodbye! Have a great day!",
    thinking: "Thinking, please wait...",
    response_time: "Response time: {time} seconds",
    error_prefix: "Error",
    retry_message: "Request failed: {error}. Retrying {retry}/{max}...",
    clear_message: "Screen cleared.",
    history_title: "Chat History",
    history_empty: "No chat history yet.",
    language_changed: "Language changed to English.",
    invalid_command: "Invalid command. Type /help to see available commands.",
    timeout: "Request timeout, please try again later",
    interrupt_hint: "Press Ctrl+C again to exit",
    cached_note: "(cached)",
    missing_api_key: "No API key configured. Set TERMCHAT_API__KEY or api.key in settings.toml.",

    load_usage: "Usage: /load <file path>",
    load_not_found: "Cannot load file, check the path: {path}",
    load_success: "Loaded file: {path}",
    load_chunks: "Split into {count} chunks",
    load_preview_title: "Preview of first chunks",
    load_empty: "The file produced no chunks (is it empty?)",
    kb_cleared: "Knowledge base cleared.",
    kb_unavailable: "Retrieval is not available in this session.",
    embedding_preparing: "Preparing embedding model {model} (first use may download weights)...",

    system_prompt: "You are a helpful AI assistant.",
    context_header: "Relevant context:",

    help: "Available commands:\n  /help            show this help\n  /load <path>     load a document into the knowledge base\n  /reset           clear the knowledge base\n  /history         show recent chat history\n  /clear           clear the screen\n  /lang <en|zh>    switch language\n  /exit            quit",
};

pub static ZH: Messages = Messages {
    welcome: "欢迎使用 termchat！我能为您做些什么？",
    user_prompt: "User> ",
    exit_message: "再见！祝您愉快！",
    thinking: "正在思考中，请稍候...",
    response_time: "响应时间: {time} 秒",
    error_prefix: "错误",
    retry_message: "请求失败: {error}. 重试 {retry}/{max}...",
    clear_message: "屏幕已清除。",
    history_title: "聊天记录",
    history_empty: "暂无聊天记录。",
    language_changed: "语言已切换为中文。",
    invalid_command: "无效的命令。输入 /help 查看可用命令。",
    timeout: "请求超时，请稍后重试",
    interrupt_hint: "再按一次 Ctrl+C 退出程序",
    cached_note: "(缓存)",
    missing_api_key: "未配置 API 密钥。请设置 TERMCHAT_API__KEY 或 settings.toml 中的 api.key。",

    load_usage: "用法: /load <文件路径>",
    load_not_found: "无法加载文件, 请检查文件路径: {path}",
    load_success: "成功加载文件: {path}",
    load_chunks: "分割为 {count} 个文本块",
    load_preview_title: "预览前几个文本块",
    load_empty: "该文件未产生任何文本块（文件为空？）",
    kb_cleared: "已清空知识库。",
    kb_unavailable: "当前会话无法使用检索功能。",
    embedding_preparing: "正在准备嵌入模型 {model}（首次使用可能需要下载权重）...",

    system_prompt: "你是一个有帮助的 AI 助手。",
    context_header: "相关上下文：",

    help: "可用命令:\n  /help            显示帮助信息\n  /load <路径>     加载文档到知识库\n  /reset           清空知识库\n  /history         显示聊天记录\n  /clear           清除屏幕\n  /lang <en|zh>    切换语言\n  /exit            退出程序",
};

/// Fill a `{name}` placeholder in a catalog string.
pub fn fill(template: &str, name: &str, value: &str) -> String {
    template.replace(&format!("{{{name}}}"), value)
}
