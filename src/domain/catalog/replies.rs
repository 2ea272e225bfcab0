//! Canned reply rendering for the guided menu flow.
//!
//! All user-facing copy for the non-generative turns lives here: the menu,
//! the selection/confirmation prompts, and the reset banner.

use super::catalog::CategoryCatalog;
use super::category::Category;

/// Renders the numbered category menu.
pub fn menu(catalog: &CategoryCatalog) -> String {
    let mut text = String::from("📋 請選擇你想討論的問題類型：\n\n");
    for (index, category) in catalog.iter().enumerate() {
        text.push_str(&format!(
            "{}. {} - {}\n",
            index + 1,
            category.name,
            category.description
        ));
    }
    text.push_str(&format!(
        "\n請輸入數字 (1-{}) 選擇分類。\n輸入「重置」可隨時重新開始。",
        catalog.len()
    ));
    text
}

/// Renders the reset banner followed by the menu.
pub fn reset_message(catalog: &CategoryCatalog) -> String {
    format!("🔄 好的，讓我們重新開始！\n\n{}", menu(catalog))
}

/// Renders the confirmation prompt for a selected category.
pub fn category_confirmation(category: &Category) -> String {
    format!(
        "✅ 你選擇了「{}」\n\n{}\n\n例如：{}\n\n要開始這個主題的對話嗎？請回覆「是」或「否」：",
        category.name, category.description, category.example
    )
}

/// Prompt returned for a selection outside 1..=N or non-numeric input.
pub fn invalid_selection(catalog: &CategoryCatalog) -> String {
    format!("❌ 請輸入有效的數字 (1-{})：", catalog.len())
}

/// Prompt returned when a confirmation reply is neither yes nor no.
pub fn invalid_confirmation() -> String {
    "❓ 請回覆「是」或「否」：".to_string()
}

/// System prompt for the opening reply after a category is confirmed.
pub fn opening_system_prompt(category: &Category) -> String {
    format!(
        "你是一個專業的{}顧問。\n\n{}\n\n請用友善、專業的語氣向用戶打招呼，並詢問他們遇到的具體問題。",
        category.name, category.description
    )
}

/// Canned user turn that seeds the opening generation call.
pub const OPENING_USER_TURN: &str = "你好，我想開始對話";

/// Generic system prompt for dialogue without a category.
///
/// Defensive fallback only; a conversation without a category should not
/// normally reach the dialogue state.
pub const GENERIC_SYSTEM_PROMPT: &str = "你是一個友善的AI助手，請根據用戶的問題提供有用的建議。";

/// Reply when a confirmed category can no longer be resolved.
pub const FALLBACK_OPENING: &str = "好的，讓我們開始對話吧！";
