//! Pure classifier: task text -> agent kind + reason.
//!
//! The pattern tables are declarative domain data mined from a Turkish/English
//! request corpus; the scoring itself is a small, stateless, referentially
//! transparent function so it can be unit tested exhaustively without a
//! database or LLM in the loop.

use std::sync::LazyLock;

use regex::Regex;

use crate::job::AgentKind;

const LANG_TOKENS: &str = r"(python|javascript|typescript|js|ts|java|go|golang|rust|c\+\+|c#|ruby|php)";

static CODE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\bkod( yaz|la)?\b",
        r"\bcode\b",
        r"\bimplement(et|ation)?\b",
        r"\b(function|class|method|api|endpoint)\b",
        r"\btest(ler|)\b|\bunit test\b|\bpytest\b|\bassert\b",
        r"```",
        r"\bimport\s+\w+",
        &format!(r"\b{LANG_TOKENS}\b"),
    ])
});

static CONTENT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\bblog\b",
        r"\bmakale\b",
        r"\byazı\b",
        r"\biçerik\b",
        r"\bnedir\b",
        r"\baçıkla\b",
        r"\bözet(le|)\b",
        r"\brehber\b",
        r"\bkarşılaştır\b",
        r"\bkaynak(ça)?\b",
        r"\breferans(lar)?\b",
        r"\blink ver\b",
        r"\bar(a|â)ştır(ma)?\b",
        r"\bincele\b",
    ])
});

static HARD_CODE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\bkod yaz\b",
        r"\bunit test\b",
        r"\bpytest\b",
        r"\bfonksiyon yaz\b",
        r"```",
        r"\bfunction\b",
        r"\bclass\b",
    ])
});

static HARD_CONTENT: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile_all(&[r"\bblog yaz\b", r"\bmakale yaz\b", r"\bkaynak(ça)? ver\b"]));

static CO_OCCUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(\b{LANG_TOKENS}\b.*\b(örnek|orneği|ornegi|örneği|kod|kodu|snippet|demo|fonksiyon|function)\b)|(\b(örnek|orneği|ornegi|örneği|kod|kodu|snippet|demo|fonksiyon|function)\b.*\b{LANG_TOKENS}\b)"
    ))
    .expect("co-occurrence pattern is a fixed, valid regex")
});

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).unwrap_or_else(|e| panic!("invalid router pattern {p:?}: {e}")))
        .collect()
}

/// The breakdown of code/content scores behind a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub code: i32,
    pub content: i32,
}

/// The outcome of `decide`: an agent kind plus a human-readable reason.
#[derive(Debug, Clone)]
pub struct Decision {
    pub agent: AgentKind,
    pub reason: String,
}

fn count_matches(patterns: &[Regex], text: &str) -> i32 {
    patterns.iter().filter(|p| p.is_match(text)).count() as i32
}

fn score(text: &str) -> ScoreBreakdown {
    let lower = text.to_lowercase();

    let mut code = count_matches(&CODE_PATTERNS, &lower);
    let mut content = count_matches(&CONTENT_PATTERNS, &lower);

    if HARD_CODE.iter().any(|p| p.is_match(&lower)) {
        code += 2;
    }
    if HARD_CONTENT.iter().any(|p| p.is_match(&lower)) {
        content += 2;
    }
    if CO_OCCUR.is_match(&lower) {
        code += 2;
    }

    ScoreBreakdown { code, content }
}

/// Classify a task into an agent kind. Pure and referentially transparent:
/// the same input always produces the same output, and the function never
/// touches I/O.
pub fn decide(task: &str) -> Decision {
    let breakdown = score(task);

    if breakdown.code >= 2 && breakdown.code > breakdown.content {
        return Decision {
            agent: AgentKind::Code,
            reason: format!(
                "rules: code_signals={{code: {}, content: {}}}",
                breakdown.code, breakdown.content
            ),
        };
    }
    if breakdown.content >= 1 && breakdown.content >= breakdown.code {
        return Decision {
            agent: AgentKind::Content,
            reason: format!(
                "rules: content_signals={{code: {}, content: {}}}",
                breakdown.code, breakdown.content
            ),
        };
    }
    Decision {
        agent: AgentKind::Content,
        reason: format!(
            "fallback_content: signals={{code: {}, content: {}}}",
            breakdown.code, breakdown.content
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_turkish_python_code_request_to_code() {
        let decision = decide("Python kodu yaz: quicksort ve 3 test");
        assert_eq!(decision.agent, AgentKind::Code);
    }

    #[test]
    fn routes_turkish_blog_request_to_content() {
        let decision = decide("Blog yaz: Quicksort nedir? 2 kaynaktan referans ver.");
        assert_eq!(decision.agent, AgentKind::Content);
    }

    #[test]
    fn ambiguous_text_falls_back_to_content() {
        let decision = decide("merhaba nasılsın");
        assert_eq!(decision.agent, AgentKind::Content);
        assert!(decision.reason.starts_with("fallback_content"));
    }

    #[test]
    fn decide_is_total_for_arbitrary_strings() {
        for task in ["", "   ", "12345", "😀😀😀", "a".repeat(5000).as_str()] {
            let decision = decide(task);
            assert!(matches!(decision.agent, AgentKind::Code | AgentKind::Content));
            assert!(!decision.reason.is_empty());
        }
    }

    #[test]
    fn hard_code_pattern_dominates_weak_content_signal() {
        let decision = decide("fonksiyon yaz ve açıkla");
        assert_eq!(decision.agent, AgentKind::Code);
    }

    #[test]
    fn language_and_example_cooccurrence_boosts_code() {
        let decision = decide("javascript örnek gösterir misin");
        assert_eq!(decision.agent, AgentKind::Code);
    }

    #[test]
    fn ties_resolve_toward_content() {
        // "method" (+1 code, not a hard pattern) and "nedir" (+1 content) => code=1, content=1.
        let decision = decide("method nedir");
        assert_eq!(decision.agent, AgentKind::Content);
    }
}
