//! Category catalog - fixed set of problem-framing categories.
//!
//! Loaded once at process start from the built-in definitions. Lookup is
//! exact-match by key or by 1-based menu number; there is no fuzzy matching.

use once_cell::sync::Lazy;

use super::category::{Category, CategoryKey};

/// Built-in category definitions for the reference deployment.
static BUILTIN_CATEGORIES: Lazy<Vec<Category>> = Lazy::new(|| {
    vec![
        Category::new(
            "career",
            "職涯發展",
            "工作選擇、轉職、升遷與職場發展相關的問題",
            "我正在考慮要不要接受外縣市的工作機會",
            "你是一位專業的職涯發展顧問，擅長協助使用者釐清工作與職涯上的困擾。\
             請透過提問幫助使用者整理思緒，分析選項的利弊，並提供具體可行的建議。",
        )
        .expect("builtin category"),
        Category::new(
            "relationship",
            "人際關係",
            "與朋友、同事、家人或伴侶之間的相處問題",
            "我和多年好友最近常常吵架，不知道該怎麼辦",
            "你是一位溫暖的人際關係顧問，擅長傾聽並協助使用者理解關係中的矛盾。\
             請以同理的語氣引導使用者描述情境，幫助他們看見不同的觀點。",
        )
        .expect("builtin category"),
        Category::new(
            "learning",
            "學習成長",
            "進修、考試、培養新技能與自我提升的疑問",
            "我想自學程式設計轉換跑道，但不知道從哪裡開始",
            "你是一位學習規劃顧問，擅長把模糊的學習目標拆解成可執行的步驟。\
             請先了解使用者的現況與目標，再給出循序漸進的學習建議。",
        )
        .expect("builtin category"),
        Category::new(
            "decision",
            "生活決策",
            "搬家、購屋、理財等生活中的重大決定",
            "我在考慮要繼續租房還是買房",
            "你是一位生活決策顧問，擅長協助使用者釐清重大決定的考量因素。\
             請幫助使用者列出選項、比較利弊，並留意他們真正在意的價值。",
        )
        .expect("builtin category"),
        Category::new(
            "stress",
            "情緒壓力",
            "焦慮、壓力調適與自我照顧的困擾",
            "最近工作壓力很大，晚上常常睡不著",
            "你是一位善於傾聽的壓力調適顧問。請以溫和、不評價的語氣回應，\
             協助使用者覺察壓力來源，並提供務實的調適方法。必要時提醒使用者尋求專業協助。",
        )
        .expect("builtin category"),
    ]
});

/// Fixed, enumerable set of categories with number- and key-indexed lookup.
#[derive(Debug, Clone)]
pub struct CategoryCatalog {
    categories: Vec<Category>,
}

impl CategoryCatalog {
    /// Creates a catalog from explicit category records.
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Creates the catalog with the built-in reference categories.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_CATEGORIES.clone())
    }

    /// Number of categories (N in the 1..N selection range).
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Returns true if the catalog has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Looks up a category by its 1-based menu number.
    pub fn by_number(&self, number: usize) -> Option<&Category> {
        if number == 0 {
            return None;
        }
        self.categories.get(number - 1)
    }

    /// Looks up a category by its stable key.
    pub fn by_key(&self, key: &CategoryKey) -> Option<&Category> {
        self.categories.iter().find(|c| &c.key == key)
    }

    /// Iterates over categories in menu order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    /// Parses user input as a menu selection.
    ///
    /// Trims whitespace and requires a pure integer in 1..=N. Anything
    /// else (non-numeric, zero, out of range) is `None` - the invalid
    /// selection path, never an error.
    pub fn select(&self, input: &str) -> Option<&Category> {
        let number: usize = input.trim().parse().ok()?;
        self.by_number(number)
    }
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
