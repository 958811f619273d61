//! Emotion tagging for spoken segments
//!
//! Before each spoken segment the pacer sends an emotion hint to the client.
//! The label is derived lexically from the segment text; the symbol sent on
//! the wire is either a pictographic glyph or an English token, chosen once
//! per deployment.

use serde::{Deserialize, Serialize};

/// Recognized labels and their glyph / English-token symbols
const SYMBOL_TABLE: &[(&str, &str, &str)] = &[
    ("neutral", "😶", "Neutral"),
    ("happy", "🙂", "Happy"),
    ("laughing", "😆", "Laughing"),
    ("funny", "😂", "Funny"),
    ("sad", "😔", "Sad"),
    ("angry", "😠", "Angry"),
    ("crying", "😭", "Crying"),
    ("loving", "😍", "Loving"),
    ("embarrassed", "😳", "Embarrassed"),
    ("surprised", "😲", "Surprised"),
    ("shocked", "😱", "Shocked"),
    ("thinking", "🤔", "Thinking"),
    ("winking", "😉", "Winking"),
    ("cool", "😎", "Cool"),
    ("relaxed", "😌", "Relaxed"),
    ("delicious", "🤤", "Delicious"),
    ("kissy", "😘", "Kissy"),
    ("confident", "😏", "Confident"),
    ("sleepy", "😴", "Sleepy"),
    ("silly", "😜", "Silly"),
    ("confused", "🙄", "Confused"),
];

/// Lexical cues per label, checked in order; first hit wins
const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("laughing", &["哈哈", "笑死", "haha", "lol"]),
    ("crying", &["呜呜", "想哭", "哭了", "泪"]),
    ("angry", &["生气", "愤怒", "可恶", "angry"]),
    ("sad", &["难过", "伤心", "遗憾", "sad"]),
    ("loving", &["爱你", "么么", "love you"]),
    ("embarrassed", &["尴尬", "不好意思", "embarrassed"]),
    ("shocked", &["震惊", "天哪", "omg", "shocked"]),
    ("surprised", &["惊讶", "没想到", "居然", "surprised"]),
    ("thinking", &["让我想想", "思考一下", "let me think"]),
    ("kissy", &["亲亲", "mua", "kiss"]),
    ("delicious", &["好吃", "美味", "香喷喷", "delicious", "yummy"]),
    ("sleepy", &["好困", "想睡", "晚安", "sleepy"]),
    ("cool", &["好酷", "太酷", "cool"]),
    ("confident", &["放心", "交给我", "没问题", "当然"]),
    ("silly", &["嘿嘿", "傻乎乎", "silly"]),
    ("confused", &["疑惑", "不明白", "搞不懂", "confused"]),
    ("funny", &["搞笑", "有趣", "逗", "funny"]),
    ("relaxed", &["放松", "悠闲", "relax"]),
    ("winking", &["眨眨眼", "你懂的"]),
    ("happy", &["开心", "高兴", "快乐", "太好了", "happy", "great"]),
];

/// Wire representation of the emotion hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionStyle {
    /// Pictographic glyph, e.g. `🙂`
    #[default]
    Emoji,
    /// English token, e.g. `Happy`
    Label,
}

/// Derive an emotion label from segment text
///
/// Glyphs already present in the text take precedence over keyword cues.
pub fn analyze_emotion(text: &str) -> &'static str {
    for &(label, glyph, _) in SYMBOL_TABLE {
        if text.contains(glyph) {
            return label;
        }
    }

    let lowered = text.to_lowercase();
    for &(label, keywords) in KEYWORD_TABLE {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return label;
        }
    }

    "neutral"
}

/// Map a label to its wire symbol under the deployment's style
///
/// Unknown labels fall back to the happy glyph / token.
pub fn emotion_symbol(label: &str, style: EmotionStyle) -> &'static str {
    let entry = SYMBOL_TABLE
        .iter()
        .find(|(l, _, _)| *l == label)
        .or_else(|| SYMBOL_TABLE.iter().find(|(l, _, _)| *l == "happy"))
        .copied();

    match (entry, style) {
        (Some((_, glyph, _)), EmotionStyle::Emoji) => glyph,
        (Some((_, _, token)), EmotionStyle::Label) => token,
        (None, _) => "🙂",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_detection() {
        assert_eq!(analyze_emotion("哈哈，太有意思了"), "laughing");
        assert_eq!(analyze_emotion("真让人难过。"), "sad");
        assert_eq!(analyze_emotion("I love you so much"), "loving");
        assert_eq!(analyze_emotion("天气不错。"), "neutral");
    }

    #[test]
    fn test_glyph_takes_precedence() {
        assert_eq!(analyze_emotion("好的😴我们明天继续"), "sleepy");
    }

    #[test]
    fn test_symbol_styles() {
        assert_eq!(emotion_symbol("crying", EmotionStyle::Emoji), "😭");
        assert_eq!(emotion_symbol("crying", EmotionStyle::Label), "Crying");
    }

    #[test]
    fn test_unknown_label_falls_back() {
        assert_eq!(emotion_symbol("grumpy", EmotionStyle::Emoji), "🙂");
        assert_eq!(emotion_symbol("grumpy", EmotionStyle::Label), "Happy");
    }

    #[test]
    fn test_every_label_has_symbols() {
        for &(label, _, _) in SYMBOL_TABLE {
            assert!(!emotion_symbol(label, EmotionStyle::Emoji).is_empty());
            assert!(!emotion_symbol(label, EmotionStyle::Label).is_empty());
        }
    }
}
