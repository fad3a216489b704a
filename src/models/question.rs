use serde::{Deserialize, Serialize};

/// 正确答案字母
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerLetter {
    A,
    B,
    C,
    D,
}

impl AnswerLetter {
    /// 从 0-3 的选项下标转换
    pub fn from_index(index: u64) -> Option<Self> {
        match index {
            0 => Some(AnswerLetter::A),
            1 => Some(AnswerLetter::B),
            2 => Some(AnswerLetter::C),
            3 => Some(AnswerLetter::D),
            _ => None,
        }
    }

    /// 从单个字母解析（忽略大小写）
    pub fn from_letter(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(AnswerLetter::A),
            "B" => Some(AnswerLetter::B),
            "C" => Some(AnswerLetter::C),
            "D" => Some(AnswerLetter::D),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            AnswerLetter::A => 'A',
            AnswerLetter::B => 'B',
            AnswerLetter::C => 'C',
            AnswerLetter::D => 'D',
        }
    }

    /// 对应的选项下标
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for AnswerLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// 规范化后的四选一题目
///
/// 选项固定为 4 个且均非空，答案只能是 A-D 之一，由类型保证。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuestion {
    pub question_text: String,
    pub options: [String; 4],
    pub correct_answer: AnswerLetter,
    #[serde(default)]
    pub explanation: String,
}

impl CanonicalQuestion {
    /// 正确选项的文本
    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_answer.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_letter_conversions() {
        assert_eq!(AnswerLetter::from_index(2), Some(AnswerLetter::C));
        assert_eq!(AnswerLetter::from_index(4), None);
        assert_eq!(AnswerLetter::from_letter("d"), Some(AnswerLetter::D));
        assert_eq!(AnswerLetter::from_letter("E"), None);
        assert_eq!(AnswerLetter::B.index(), 1);
    }

    #[test]
    fn test_serializes_answer_as_letter() {
        let q = CanonicalQuestion {
            question_text: "1+1=?".to_string(),
            options: ["1".into(), "2".into(), "3".into(), "4".into()],
            correct_answer: AnswerLetter::B,
            explanation: String::new(),
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["correct_answer"], "B");
        assert_eq!(json["options"].as_array().unwrap().len(), 4);
        assert_eq!(q.correct_option(), "2");
    }
}
