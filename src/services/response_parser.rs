//! 响应解析与题目规范化 - 业务能力层
//!
//! 模型返回的文本可能带代码围栏、前后说明文字或错误的转义，
//! 这里负责把它变成 JSON 数组，再把每一项整理成 [`CanonicalQuestion`]。
//! 单个坏题目只会被丢弃，不会影响整批结果。

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{AnswerLetter, CanonicalQuestion};
use crate::utils::logging::truncate_text;

/// 题干字段的候选名称（按优先级）
const TEXT_KEYS: [&str; 4] = ["question_text", "question", "text", "question_content"];
/// 对象形式选项的文本字段
const OPTION_KEYS: [&str; 3] = ["text", "content", "value"];
/// 对象形式解析的语言字段
const EXPLANATION_KEYS: [&str; 4] = ["en", "vi", "text", "content"];

/// JSON 提取失败的原因
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("响应为空")]
    Empty,
    #[error("响应中没有 JSON 数组")]
    NoJsonArray,
    #[error("JSON 顶层不是数组")]
    NotAnArray,
    #[error("JSON 格式错误: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// 规范化结果及统计
#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub questions: Vec<CanonicalQuestion>,
    /// 被丢弃的条目数
    pub dropped: usize,
    /// 答案无法识别、回退为 A 的题目数
    pub answer_fallbacks: usize,
}

// ========== JSON 提取 ==========

/// 从模型响应中提取 JSON 数组，任何失败都返回空列表
pub fn parse_json_response(text: &str) -> Vec<Value> {
    match try_parse_json_response(text) {
        Ok(items) => items,
        Err(ParseError::Empty) => {
            warn!("模型返回了空响应");
            Vec::new()
        }
        Err(e) => {
            error!("无法从响应中解析 JSON: {}", e);
            debug!("问题响应: {}", truncate_text(text, 500));
            Vec::new()
        }
    }
}

/// 从模型响应中提取 JSON 数组
///
/// 先直接解析；失败（或得到空数组）后去掉代码围栏、修复转义再解析一次。
pub fn try_parse_json_response(text: &str) -> Result<Vec<Value>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    match extract_json_array(text) {
        Ok(items) if !items.is_empty() => return Ok(items),
        Ok(_) | Err(_) => {}
    }

    let cleaned = fix_json_escapes(&strip_code_fences(text));
    extract_json_array(&cleaned)
}

/// 取第一个 `[` 到最后一个 `]` 之间的内容解析；找不到括号时解析整段文本
fn extract_json_array(text: &str) -> Result<Vec<Value>, ParseError> {
    let candidate = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text.trim(),
    };

    let value: Value = serde_json::from_str(candidate).map_err(|e| {
        if candidate.contains('[') {
            ParseError::Malformed(e)
        } else {
            ParseError::NoJsonArray
        }
    })?;

    match value {
        Value::Array(items) => Ok(items),
        other => {
            warn!("期望 JSON 数组，实际为 {}", json_type_name(&other));
            Err(ParseError::NotAnArray)
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"```(?:json)?\s*").expect("fence regex is valid"))
}

/// 去掉 Markdown 代码围栏
fn strip_code_fences(text: &str) -> String {
    fence_regex().replace_all(text, "").trim().to_string()
}

/// 修复模型常见的错误转义
///
/// 依次替换 `\"`、`\n`/`\r`/`\t`、`\\`、`\/`，最后删掉后面不是合法转义字符的反斜杠。
fn fix_json_escapes(text: &str) -> String {
    let replaced = text
        .replace("\\\"", "\"")
        .replace("\\n", " ")
        .replace("\\r", " ")
        .replace("\\t", " ")
        .replace("\\\\", "\\")
        .replace("\\/", "/");

    let mut out = String::with_capacity(replaced.len());
    let mut chars = replaced.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u') => out.push(c),
                _ => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ========== 题目规范化 ==========

/// 规范化题目列表
pub fn normalize_questions(items: &[Value], provider: &str) -> Vec<CanonicalQuestion> {
    normalize_with_report(items, provider).questions
}

/// 规范化题目列表，并返回丢弃数和答案回退数
pub fn normalize_with_report(items: &[Value], provider: &str) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for (index, item) in items.iter().enumerate() {
        let Some(object) = item.as_object() else {
            warn!("[{}] 第 {} 题不是对象，已丢弃", provider, index);
            report.dropped += 1;
            continue;
        };

        match normalize_single(object, index, provider) {
            Some((question, fell_back)) => {
                if fell_back {
                    report.answer_fallbacks += 1;
                }
                report.questions.push(question);
            }
            None => report.dropped += 1,
        }
    }

    info!(
        "[{}] 规范化完成: {}/{} 道题有效",
        provider,
        report.questions.len(),
        items.len()
    );
    report
}

/// 返回规范化后的题目以及答案是否回退
fn normalize_single(
    object: &Map<String, Value>,
    index: usize,
    provider: &str,
) -> Option<(CanonicalQuestion, bool)> {
    let Some(question_text) = TEXT_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .map(scalar_to_string)
        .find(|s| !s.is_empty())
    else {
        warn!("[{}] 第 {} 题缺少题干", provider, index);
        return None;
    };

    let options = normalize_options(object.get("options"), index, provider);
    if options.len() < 4 {
        warn!(
            "[{}] 第 {} 题选项不足: {}/4",
            provider,
            index,
            options.len()
        );
        return None;
    }
    let mut options = options.into_iter();
    let options: [String; 4] = std::array::from_fn(|_| options.next().unwrap_or_default());

    let raw_answer = object
        .get("correct_answer")
        .filter(|v| !is_blank(v))
        .or_else(|| object.get("answer"));
    let (correct_answer, fell_back) = match raw_answer.and_then(normalize_answer) {
        Some(letter) => (letter, false),
        None => {
            warn!(
                "[{}] 第 {} 题答案格式无效: {:?}，默认为 A",
                provider,
                index,
                raw_answer.map(|v| v.to_string())
            );
            (AnswerLetter::A, true)
        }
    };

    Some((
        CanonicalQuestion {
            question_text,
            options,
            correct_answer,
            explanation: normalize_explanation(object.get("explanation")),
        },
        fell_back,
    ))
}

/// 选项：字符串或 `{text|content|value}` 对象组成的列表，去空白后丢弃空项
fn normalize_options(raw: Option<&Value>, index: usize, provider: &str) -> Vec<String> {
    let Some(list) = raw.and_then(Value::as_array) else {
        warn!("[{}] 第 {} 题的选项不是列表", provider, index);
        return Vec::new();
    };

    list.iter()
        .map(|opt| match opt {
            Value::String(s) => s.trim().to_string(),
            Value::Object(map) => OPTION_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .map(scalar_to_string)
                .find(|s| !s.is_empty())
                .unwrap_or_default(),
            other => scalar_to_string(other),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// 答案：0-3 的数字（或数字字符串）映射为 A-D；单个字母 A-D 忽略大小写
fn normalize_answer(raw: &Value) -> Option<AnswerLetter> {
    match raw {
        Value::Number(n) => n.as_u64().and_then(AnswerLetter::from_index),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse::<u64>().ok().and_then(AnswerLetter::from_index)
            } else if s.chars().count() == 1 {
                AnswerLetter::from_letter(s)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// 解析：字符串去空白；对象按 en → vi → text → content 取第一个非空值
fn normalize_explanation(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Object(map)) => EXPLANATION_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .map(scalar_to_string)
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// 标量转为去空白的字符串，null / 数组 / 对象视为空
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========== JSON 提取 ==========

    #[test]
    fn test_parse_clean_array() {
        let text = r#"[
            {
                "question_text": "What is 2+2?",
                "options": ["3", "4", "5", "6"],
                "correct_answer": "B",
                "explanation": "Basic math"
            }
        ]"#;
        let items = parse_json_response(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["question_text"], "What is 2+2?");
        assert_eq!(items[0]["correct_answer"], "B");
    }

    #[test]
    fn test_fenced_array_parses_like_bare_array() {
        let bare = r#"[{"question_text": "Test question", "options": ["A","B","C","D"], "correct_answer": "A"}]"#;
        let fenced = format!("```json\n{}\n```", bare);
        assert_eq!(parse_json_response(&fenced), parse_json_response(bare));
        assert_eq!(parse_json_response(&fenced).len(), 1);
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let text = r#"Here are your exam questions as requested:

        [{"question_text": "Q1", "options": ["A","B","C","D"], "correct_answer": "A"}]

        I hope these questions meet your requirements!"#;
        assert_eq!(parse_json_response(text).len(), 1);
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert!(parse_json_response("").is_empty());
        assert!(parse_json_response("   \n").is_empty());
        assert!(parse_json_response("{invalid: json: here").is_empty());
        assert!(matches!(try_parse_json_response(""), Err(ParseError::Empty)));
        assert!(matches!(
            try_parse_json_response("no json at all"),
            Err(ParseError::NoJsonArray)
        ));
    }

    #[test]
    fn test_parse_non_array_json() {
        assert!(parse_json_response(r#"{"single": "object"}"#).is_empty());
        assert!(matches!(
            try_parse_json_response(r#"{"single": "object"}"#),
            Err(ParseError::NotAnArray)
        ));
    }

    #[test]
    fn test_malformed_array_reports_malformed() {
        assert!(matches!(
            try_parse_json_response("[{\"a\": }]"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_escape_repair() {
        // 模型把整个数组当作字符串转义输出
        let text = r#"[{\"question_text\": \"Line one\nLine two\", \"options\": [\"a\",\"b\",\"c\",\"d\"], \"correct_answer\": \"A\"}]"#;
        let items = parse_json_response(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["question_text"], "Line one Line two");
    }

    #[test]
    fn test_fix_json_escapes_drops_invalid_backslash() {
        assert_eq!(fix_json_escapes(r"a\qb"), "aqb");
        assert_eq!(fix_json_escapes(r"C:\/path"), "C:/path");
        assert_eq!(fix_json_escapes(r"\u00e9"), r"\u00e9");
    }

    // ========== 题目规范化 ==========

    fn q(answer: Value) -> Value {
        json!({"question_text": "Q", "options": ["A", "B", "C", "D"], "correct_answer": answer})
    }

    #[test]
    fn test_normalize_string_options() {
        let items = vec![json!({
            "question_text": " Capital of France? ",
            "options": ["Paris", "London", "Berlin", "Madrid"],
            "correct_answer": "A",
            "explanation": "Paris is correct"
        })];
        let questions = normalize_questions(&items, "test");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_text, "Capital of France?");
        assert_eq!(questions[0].options, ["Paris", "London", "Berlin", "Madrid"]);
        assert_eq!(questions[0].correct_answer, AnswerLetter::A);
        assert_eq!(questions[0].explanation, "Paris is correct");
    }

    #[test]
    fn test_normalize_dict_options() {
        let items = vec![json!({
            "question": "Q1",
            "options": [
                {"label": "A", "text": "Answer A"},
                {"label": "B", "content": "Answer B"},
                {"label": "C", "value": "Answer C"},
                {"label": "D", "text": "Answer D"}
            ],
            "answer": "d"
        })];
        let questions = normalize_questions(&items, "test");
        assert_eq!(
            questions[0].options,
            ["Answer A", "Answer B", "Answer C", "Answer D"]
        );
        assert_eq!(questions[0].correct_answer, AnswerLetter::D);
    }

    #[test]
    fn test_answer_normalization() {
        let cases = [
            (json!("a"), AnswerLetter::A, false),
            (json!("c"), AnswerLetter::C, false),
            (json!(0), AnswerLetter::A, false),
            (json!(3), AnswerLetter::D, false),
            (json!("2"), AnswerLetter::C, false),
            (json!("z"), AnswerLetter::A, true),
            (json!("invalid"), AnswerLetter::A, true),
            (json!(7), AnswerLetter::A, true),
            (json!(null), AnswerLetter::A, true),
        ];
        for (raw, expected, fell_back) in cases {
            let report = normalize_with_report(&[q(raw.clone())], "test");
            assert_eq!(report.questions[0].correct_answer, expected, "{}", raw);
            assert_eq!(report.answer_fallbacks, usize::from(fell_back), "{}", raw);
        }
    }

    #[test]
    fn test_missing_answer_is_counted_fallback() {
        let item = json!({"question_text": "Q", "options": ["1", "2", "3", "4"]});
        let report = normalize_with_report(&[item], "test");
        assert_eq!(report.questions[0].correct_answer, AnswerLetter::A);
        assert_eq!(report.answer_fallbacks, 1);
    }

    #[test]
    fn test_items_are_dropped_not_fatal() {
        let items = vec![
            json!({"question_text": "Valid", "options": ["A", "B", "C", "D"], "correct_answer": "A"}),
            json!({"question_text": "", "options": ["A", "B", "C", "D"], "correct_answer": "A"}),
            json!({"question_text": "Three", "options": ["A", "B", "C"], "correct_answer": "A"}),
            json!({"question_text": "Blanks", "options": ["A", " ", "C", ""], "correct_answer": "A"}),
            json!({"question_text": "Not list", "options": "A,B,C,D"}),
            json!("just a string"),
            json!(42),
        ];
        let report = normalize_with_report(&items, "test");
        assert_eq!(report.questions.len(), 1);
        assert_eq!(report.dropped, 6);
        assert_eq!(report.questions[0].question_text, "Valid");
    }

    #[test]
    fn test_scalar_question_text_is_kept() {
        let items = vec![
            json!({"question_text": 1789, "options": ["A", "B", "C", "D"], "correct_answer": "A"}),
            json!({"question_text": null, "question": " Fallback ", "options": ["A", "B", "C", "D"], "answer": 2}),
            json!({"question_text": ["x"], "options": ["A", "B", "C", "D"], "correct_answer": "A"}),
        ];
        let report = normalize_with_report(&items, "test");
        assert_eq!(report.questions.len(), 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.questions[0].question_text, "1789");
        assert_eq!(report.questions[1].question_text, "Fallback");
        assert_eq!(report.questions[1].correct_answer, AnswerLetter::C);
    }

    #[test]
    fn test_invalid_answer_of_any_shape_falls_back() {
        let items = vec![q(json!({"letter": "B"})), q(json!(true)), q(json!(7))];
        let report = normalize_with_report(&items, "test");
        assert_eq!(report.answer_fallbacks, 3);
        assert!(report
            .questions
            .iter()
            .all(|question| question.correct_answer == AnswerLetter::A));
    }

    #[test]
    fn test_extra_options_are_truncated() {
        let item = json!({"question_text": "Q", "options": ["A", "B", "C", "D", "E", "F"], "correct_answer": "A"});
        let questions = normalize_questions(&[item], "test");
        assert_eq!(questions[0].options, ["A", "B", "C", "D"]);
    }

    #[test]
    fn test_explanation_shapes() {
        let with = |explanation: Value| {
            let mut item = q(json!("A"));
            item["explanation"] = explanation;
            normalize_questions(&[item], "test").remove(0).explanation
        };
        assert_eq!(with(json!("  Simple text ")), "Simple text");
        assert_eq!(with(json!({"vi": "Tiếng Việt", "en": "English"})), "English");
        assert_eq!(with(json!({"vi": "Tiếng Việt"})), "Tiếng Việt");
        assert_eq!(with(json!({"fr": "Français"})), "");
        assert_eq!(with(json!(["a"])), "");
        assert_eq!(normalize_questions(&[q(json!("A"))], "test")[0].explanation, "");
    }
}
