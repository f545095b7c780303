//! Signal detectors.
//!
//! Each detector is an independent, zero-cost heuristic over the lowercased
//! message text: phrase membership against a curated vocabulary, or a
//! lightweight pattern match. [`SignalDetector::detect`] runs all of them
//! once and packs the results into [`Signals`], which the rule tables and the
//! priority calculator consume without re-deriving anything.

use std::sync::LazyLock;

use regex::Regex;
use studyhall_config::{AssistantConfig, DecisionConfig};

use crate::types::{AcademicSignal, QuestionKind, QuestionSignal, Signals, Subject};

/// Address forms; `{}` is replaced by each configured assistant name.
const MENTION_FORMS: &[&str] = &[
    "@{}", "hey {}", "hi {}", "hello {}", "ok {}", "okay {}", "{},", "{}:", "{} can you",
    "{} could you", "{} please", "{} help", "ask {}", "ask the {}",
];

const INTERROGATIVES: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "can", "could", "would", "should",
    "is", "are", "do", "does", "did", "will",
];

const HELP_SEEKING: &[&str] = &[
    "help me", "can someone", "can anyone", "i need help", "how do i", "how to", "stuck on",
    "i'm stuck", "im stuck", "i don't get", "i dont get", "can you show", "walk me through",
];

const UNCERTAINTY: &[&str] = &[
    "not sure", "i don't understand", "i dont understand", "confused", "i wonder",
    "no idea", "makes no sense", "doesn't make sense",
];

const SUBJECT_VOCABULARY: &[(Subject, &[&str])] = &[
    (
        Subject::Math,
        &[
            "math", "maths", "algebra", "calculus", "geometry", "trigonometry", "derivative",
            "integral", "equation", "polynomial", "theorem", "chain rule", "matrix", "matrices",
            "probability", "statistics", "fraction", "logarithm", "quadratic", "vector",
        ],
    ),
    (
        Subject::Science,
        &[
            "science", "physics", "chemistry", "biology", "photosynthesis", "molecule", "atom",
            "cell", "dna", "energy", "gravity", "velocity", "acceleration", "evolution",
            "chemical reaction", "ecosystem", "enzyme", "mitosis", "newton",
        ],
    ),
    (
        Subject::Programming,
        &[
            "programming", "code", "coding", "algorithm", "python", "javascript", "java",
            "rust", "c++", "compile", "compiler", "recursion", "data structure", "array",
            "database", "sql",
        ],
    ),
    (
        Subject::History,
        &[
            "history", "historical", "revolution", "empire", "century", "civilization",
            "treaty", "dynasty", "colonial", "world war",
        ],
    ),
    (
        Subject::Literature,
        &[
            "literature", "essay", "novel", "poem", "poetry", "thesis", "metaphor",
            "shakespeare", "narrative", "protagonist",
        ],
    ),
    (
        Subject::Language,
        &[
            "grammar", "vocabulary", "translate", "translation", "conjugate", "conjugation",
            "spanish", "french", "german", "pronunciation", "verb tense",
        ],
    ),
    (
        Subject::Economics,
        &[
            "economics", "economy", "inflation", "supply and demand", "gdp", "microeconomics",
            "macroeconomics", "interest rate",
        ],
    ),
];

const ASSIGNMENT_NOUNS: &[&str] = &[
    "homework", "assignment", "exam", "quiz", "midterm", "final exam", "lab report",
    "problem set", "lecture", "syllabus", "study guide", "textbook", "coursework",
];

const ACADEMIC_VERBS: &[&str] = &[
    "explain", "analyze", "solve", "calculate", "prove", "derive", "define", "compare",
    "evaluate", "summarize", "differentiate", "integrate",
];

/// Kept narrow on purpose: only unmistakably social phrasing.
const CASUAL_PHRASES: &[&str] = &[
    "how was your", "how are you", "how's it going", "hows it going", "what's up", "whats up",
    "weekend", "party", "hang out", "hangout", "movie", "netflix", "lunch", "dinner",
    "birthday", "vacation", "lol", "lmao", "haha", "miss you", "love you", "date night",
    "going out", "video game", "concert",
];

const GREETING_WORDS: &[&str] = &[
    "hi", "hello", "hey", "yo", "sup", "hiya", "howdy", "thanks", "thank", "you", "thx", "ty",
    "ok", "okay", "k", "bye", "cya", "goodbye", "good", "morning", "afternoon", "evening",
    "night", "everyone", "all", "guys", "folks", "team", "there", "cool", "nice",
];

const EDUCATIONAL_KEYWORDS: &[&str] = &[
    "explain", "understand", "learn", "teach", "study", "practice", "example", "concept",
    "review", "clarify", "walk me through", "step by step", "how does", "why does",
];

const ERROR_KEYWORDS: &[&str] = &[
    "error", "bug", "exception", "crash", "doesn't work", "does not work", "not working",
    "broken", "fails", "failing", "wrong answer", "stack trace", "undefined", "segfault",
];

const URGENCY_KEYWORDS: &[&str] = &[
    "urgent", "asap", "deadline", "due tomorrow", "due today", "due tonight",
    "exam tomorrow", "test tomorrow", "emergency", "quickly", "right now", "help!",
];

static MATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d+\s*[-+*/^=×÷]\s*\d+)|(\b[a-z]\s*\^\s*\d)|(\b\d*[a-z]\s*[-+]\s*\d+\s*=)|[√∫∑π]|\b(sqrt|sin|cos|tan|log|ln)\s*\(",
    )
    .expect("math pattern is valid")
});

static CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)```|\b(for|while|if)\s*\([^)]*\)\s*\{|\bdef\s+\w+\s*\(|\bfunction\s*\w*\s*\(|\bfn\s+\w+\s*\(|\bclass\s+[A-Za-z_]\w*\s*[:{(]|\b(let|const|var)\s+\w+\s*=|\bimport\s+[\w.]+\s*;?\s*$|\breturn\s+[^;\n]*;|console\.log|println!|printf\(|System\.out|\w+\([^)]*\)\s*[;{]|=>|&&|\|\|",
    )
    .expect("code pattern is valid")
});

static DOMAIN_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\bwhat\s+is\s+.+\s+equal\s+to\b|\b(solve|simplify|factor|differentiate|integrate)\b|\b(derivative|integral)\s+of\b|\bhow\s+many\b|\bfind\s+the\b|\bcalculate\b",
    )
    .expect("domain question pattern is valid")
});

/// Runs every detector over a message.
#[derive(Debug, Clone)]
pub struct SignalDetector {
    mention_phrases: Vec<String>,
    min_substantive_chars: usize,
}

impl SignalDetector {
    pub fn new(assistant: &AssistantConfig, decision: &DecisionConfig) -> Self {
        let mut mention_phrases = Vec::new();
        for name in &assistant.address_names {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            for form in MENTION_FORMS {
                mention_phrases.push(form.replace("{}", &name));
            }
        }
        mention_phrases.sort();
        mention_phrases.dedup();

        Self {
            mention_phrases,
            min_substantive_chars: decision.min_substantive_chars,
        }
    }

    /// Run all detectors once.
    pub fn detect(&self, text: &str) -> Signals {
        let lower = text.trim().to_lowercase();
        let char_count = lower.chars().filter(|c| !c.is_whitespace()).count();

        Signals {
            explicit_mention: self.mentions_assistant(&lower),
            question: question(&lower),
            academic: academic(&lower),
            casual: contains_any(&lower, CASUAL_PHRASES),
            greeting_only: greeting_only(&lower),
            trivial: char_count < self.min_substantive_chars,
            math: MATH_PATTERN.is_match(&lower),
            code: CODE_PATTERN.is_match(text),
            educational: contains_any(&lower, EDUCATIONAL_KEYWORDS),
            error_report: contains_any(&lower, ERROR_KEYWORDS),
            urgency: URGENCY_KEYWORDS
                .iter()
                .filter(|k| contains_term(&lower, k))
                .count(),
            char_count,
        }
    }

    /// Whether the text addresses the assistant directly.
    pub fn is_explicit_mention(&self, text: &str) -> bool {
        self.mentions_assistant(&text.trim().to_lowercase())
    }

    fn mentions_assistant(&self, lower: &str) -> bool {
        self.mention_phrases.iter().any(|p| contains_term(lower, p))
    }
}

impl Default for SignalDetector {
    fn default() -> Self {
        Self::new(&AssistantConfig::default(), &DecisionConfig::default())
    }
}

/// Question detector: the first matching rule in strength order wins.
pub fn question(lower: &str) -> QuestionSignal {
    let first_word = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .find(|w| !w.is_empty())
        .unwrap_or("");
    let opens_with_interrogative = INTERROGATIVES.contains(&first_word);
    let marked = lower.trim_end().ends_with('?');

    let (kind, confidence) = if DOMAIN_QUESTION.is_match(lower) {
        (QuestionKind::Domain, 0.9)
    } else if opens_with_interrogative && marked {
        (QuestionKind::Direct, 0.85)
    } else if marked {
        (QuestionKind::Marked, 0.75)
    } else if contains_any(lower, HELP_SEEKING) {
        (QuestionKind::HelpSeeking, 0.7)
    } else if opens_with_interrogative {
        (QuestionKind::Implicit, 0.6)
    } else if contains_any(lower, UNCERTAINTY) {
        (QuestionKind::Uncertainty, 0.55)
    } else {
        return QuestionSignal::none();
    };

    QuestionSignal {
        is_question: true,
        kind: Some(kind),
        confidence,
    }
}

/// Academic-intent detector. Subject vocabulary or assignment nouns make a
/// message academic; academic verbs only add indicators.
pub fn academic(lower: &str) -> AcademicSignal {
    let mut indicators = Vec::new();
    let mut subject: Option<(Subject, usize)> = None;

    for (candidate, vocabulary) in SUBJECT_VOCABULARY {
        let hits: Vec<&str> = vocabulary
            .iter()
            .copied()
            .filter(|term| contains_term(lower, term))
            .collect();
        if hits.is_empty() {
            continue;
        }
        indicators.push(format!("subject:{candidate}"));
        // Strictly greater keeps the earliest subject on ties
        if subject.is_none_or(|(_, best)| hits.len() > best) {
            subject = Some((*candidate, hits.len()));
        }
    }

    let assignment_hits: Vec<&str> = ASSIGNMENT_NOUNS
        .iter()
        .copied()
        .filter(|term| contains_term(lower, term))
        .collect();
    for hit in &assignment_hits {
        indicators.push(format!("assignment:{hit}"));
    }

    for verb in ACADEMIC_VERBS {
        if contains_term(lower, verb) {
            indicators.push(format!("verb:{verb}"));
        }
    }

    AcademicSignal {
        is_academic: subject.is_some() || !assignment_hits.is_empty(),
        subject: subject.map(|(s, _)| s),
        indicators,
    }
}

/// Subjects mentioned anywhere in `lower`.
pub fn subjects(lower: &str) -> Vec<Subject> {
    SUBJECT_VOCABULARY
        .iter()
        .filter(|(_, vocabulary)| vocabulary.iter().any(|term| contains_term(lower, term)))
        .map(|(subject, _)| *subject)
        .collect()
}

fn greeting_only(lower: &str) -> bool {
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    !words.is_empty() && words.len() <= 4 && words.iter().all(|w| GREETING_WORDS.contains(w))
}

fn contains_any(lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| contains_term(lower, term))
}

/// Substring match that refuses to match inside a longer word.
///
/// A boundary is only required on a side where the term itself starts or
/// ends with an alphanumeric character, so `"ai,"` matches `"ai, explain"`
/// and `"lol"` does not match `"lollipop"`.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let needs_left = term.chars().next().is_some_and(char::is_alphanumeric);
    let needs_right = term.chars().next_back().is_some_and(char::is_alphanumeric);

    haystack.match_indices(term).any(|(idx, _)| {
        let left_ok = !needs_left
            || haystack[..idx]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
        let right_ok = !needs_right
            || haystack[idx + term.len()..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric());
        left_ok && right_ok
    })
}
