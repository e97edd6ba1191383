//! Built-in vocabulary for code-relevance scoring.
//!
//! Matching is case-insensitive substring matching, so entries should be
//! distinctive enough not to fire inside unrelated words.

pub const DEFAULT_CODE_KEYWORDS: &[&str] = &[
    // algorithmic
    "algorithm",
    "pseudocode",
    "complexity",
    "invariant",
    "recursion",
    "data structure",
    "benchmark",
    "throughput",
    "latency",
    // implementation
    "implementation",
    "interface",
    "function",
    "method",
    "parameter",
    "return value",
    "variable",
    "struct",
    "enum",
    "module",
    "library",
    "compile",
    "runtime",
    "syntax",
    "snippet",
    "endpoint",
    "schema",
    // distributed systems
    "protocol",
    "consensus",
    "transaction",
    "replica",
];
