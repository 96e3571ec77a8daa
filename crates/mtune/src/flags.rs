//! Catalog of tunable optimization flags.

use std::fmt;
use std::process::Command;

use tracing::debug;

use crate::{Error, Result};

/// Tunable flags and the first GCC release that supports them, encoded
/// as `major * 10000 + minor * 100 + patch`.
///
/// Deliberately left out of the catalog:
/// `branch-target-load-optimize2` (cannot run multiple times),
/// `common`, `data-sections` and `strict-aliasing` (affect semantics),
/// `section-anchors` (may conflict with other flags), and
/// `tree-coalesce-inlined-vars` (has no disabling counterpart).
pub const FLAG_VERSIONS: &[(&str, u32)] = &[
    ("aggressive-loop-optimizations", 40800),
    ("align-functions", 40500),
    ("align-jumps", 40500),
    ("align-labels", 40500),
    ("align-loops", 40500),
    ("branch-count-reg", 40500),
    ("branch-target-load-optimize", 40500),
    ("btr-bb-exclusive", 40500),
    ("caller-saves", 40500),
    ("combine-stack-adjustments", 40600),
    ("compare-elim", 40600),
    ("conserve-stack", 40500),
    ("cprop-registers", 40500),
    ("crossjumping", 40500),
    ("cse-follow-jumps", 40500),
    ("dce", 40500),
    ("defer-pop", 40500),
    ("delete-null-pointer-checks", 40500),
    ("devirtualize", 40600),
    ("dse", 40500),
    ("early-inlining", 40500),
    ("expensive-optimizations", 40500),
    ("forward-propagate", 40500),
    ("gcse", 40500),
    ("gcse-after-reload", 40500),
    ("gcse-las", 40500),
    ("gcse-lm", 40500),
    ("gcse-sm", 40500),
    ("guess-branch-probability", 40500),
    ("hoist-adjacent-loads", 40800),
    ("if-conversion", 40500),
    ("if-conversion2", 40500),
    ("inline", 40500),
    ("inline-atomics", 40700),
    ("inline-functions", 40500),
    ("inline-functions-called-once", 40500),
    ("inline-small-functions", 40500),
    ("ipa-cp", 40500),
    ("ipa-cp-clone", 40500),
    ("ipa-profile", 40600),
    ("ipa-pta", 40500),
    ("ipa-pure-const", 40500),
    ("ipa-reference", 40500),
    ("ipa-sra", 40500),
    ("ira-hoist-pressure", 40800),
    ("ivopts", 40500),
    ("merge-constants", 40500),
    ("modulo-sched", 40500),
    ("move-loop-invariants", 40500),
    ("omit-frame-pointer", 40500),
    ("optimize-sibling-calls", 40500),
    ("optimize-strlen", 40700),
    ("peephole", 40500),
    ("peephole2", 40500),
    ("predictive-commoning", 40500),
    ("prefetch-loop-arrays", 40500),
    ("regmove", 40500),
    ("rename-registers", 40500),
    ("reorder-blocks", 40500),
    ("reorder-functions", 40500),
    ("rerun-cse-after-loop", 40500),
    ("reschedule-modulo-scheduled-loops", 40500),
    ("sched-critical-path-heuristic", 40500),
    ("sched-dep-count-heuristic", 40500),
    ("sched-group-heuristic", 40500),
    ("sched-interblock", 40500),
    ("sched-last-insn-heuristic", 40500),
    ("sched-pressure", 40500),
    ("sched-rank-heuristic", 40500),
    ("sched-spec", 40500),
    ("sched-spec-insn-heuristic", 40500),
    ("sched-spec-load", 40500),
    ("sched-stalled-insns", 40500),
    ("sched-stalled-insns-dep", 40500),
    ("schedule-insns", 40500),
    ("schedule-insns2", 40500),
    ("sel-sched-pipelining", 40500),
    ("sel-sched-pipelining-outer-loops", 40500),
    ("sel-sched-reschedule-pipelined", 40500),
    ("selective-scheduling", 40500),
    ("selective-scheduling2", 40500),
    ("shrink-wrap", 40700),
    ("split-ivs-in-unroller", 40500),
    ("split-wide-types", 40500),
    ("thread-jumps", 40500),
    ("toplevel-reorder", 40500),
    ("tree-bit-ccp", 40600),
    ("tree-builtin-call-dce", 40500),
    ("tree-ccp", 40500),
    ("tree-ch", 40500),
    ("tree-coalesce-vars", 40800),
    ("tree-copy-prop", 40500),
    ("tree-copyrename", 40500),
    ("tree-cselim", 40500),
    ("tree-dce", 40500),
    ("tree-dominator-opts", 40500),
    ("tree-dse", 40500),
    ("tree-forwprop", 40500),
    ("tree-fre", 40500),
    ("tree-loop-distribute-patterns", 40600),
    ("tree-loop-distribution", 40500),
    ("tree-loop-if-convert", 40600),
    ("tree-loop-im", 40500),
    ("tree-loop-ivcanon", 40500),
    ("tree-loop-optimize", 40500),
    ("tree-partial-pre", 40800),
    ("tree-phiprop", 40500),
    ("tree-pre", 40500),
    ("tree-pta", 40500),
    ("tree-reassoc", 40500),
    ("tree-scev-cprop", 40500),
    ("tree-sink", 40500),
    ("tree-slp-vectorize", 40500),
    ("tree-slsr", 40800),
    ("tree-sra", 40500),
    ("tree-switch-conversion", 40500),
    ("tree-tail-merge", 40700),
    ("tree-ter", 40500),
    ("tree-vect-loop-version", 40500),
    ("tree-vectorize", 40500),
    ("tree-vrp", 40500),
    ("unroll-all-loops", 40500),
    ("unroll-loops", 40500),
    ("unswitch-loops", 40500),
    ("variable-expansion-in-unroller", 40500),
    ("vect-cost-model", 40500),
    ("web", 40500),
];

/// One optimization flag with its polarity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub enabled: bool,
}

impl Flag {
    /// An enabled flag.
    #[must_use]
    pub fn enabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
        }
    }

    /// A disabled flag.
    #[must_use]
    pub fn disabled(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
        }
    }

    /// Render the flag as a command-line token.
    #[must_use]
    pub fn token(&self) -> String {
        if self.enabled {
            format!("-f{}", self.name)
        } else {
            format!("-fno-{}", self.name)
        }
    }

    /// Parse a `-f<name>` or `-fno-<name>` token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(name) = token.strip_prefix("-fno-") {
            Some(Self::disabled(name))
        } else {
            token.strip_prefix("-f").map(Self::enabled)
        }
    }

    /// The same flag with its polarity inverted.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            name: self.name.clone(),
            enabled: !self.enabled,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Every flag tunable at the given compiler version, enabled, in
/// catalog order.
#[must_use]
pub fn candidates(version: u32) -> Vec<Flag> {
    FLAG_VERSIONS
        .iter()
        .filter(|&&(_, min_version)| min_version <= version)
        .map(|&(name, _)| Flag::enabled(name))
        .collect()
}

/// Detect the compiler version by running `<cc> -dumpversion`.
///
/// # Errors
///
/// Fails if the compiler cannot be spawned or its output does not start
/// with a dotted version number.
pub fn detect_compiler_version(cc: &str) -> Result<u32> {
    debug!(command = cc, "detecting compiler version");
    let output = Command::new(cc).arg("-dumpversion").output()?;
    let text = String::from_utf8_lossy(&output.stdout);
    parse_version(text.trim())
}

/// Parse a dotted version string into its encoded form.
///
/// GCC 7 and later print a bare major by default, so missing minor and
/// patch components count as zero.
fn parse_version(text: &str) -> Result<u32> {
    let mut parts = text.split('.');
    let major = parts
        .next()
        .and_then(|p| p.trim().parse::<u32>().ok())
        .ok_or_else(|| Error::VersionParse(text.to_string()))?;
    let mut minor = 0;
    let mut patch = 0;
    if let Some(p) = parts.next() {
        minor = p
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::VersionParse(text.to_string()))?;
    }
    if let Some(p) = parts.next() {
        patch = p
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::VersionParse(text.to_string()))?;
    }
    Ok(major * 10000 + minor * 100 + patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_polarity() {
        let flag = Flag::enabled("dce");
        assert_eq!(flag.token(), "-fdce");
        assert_eq!(flag.flipped().token(), "-fno-dce");
    }

    #[test]
    fn test_flip_round_trip() {
        let flag = Flag::enabled("tree-pre");
        assert_eq!(flag.flipped().flipped(), flag);
        assert_eq!(
            Flag::parse(&flag.flipped().token()).unwrap().flipped(),
            flag
        );
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(Flag::parse("-fdce"), Some(Flag::enabled("dce")));
        assert_eq!(Flag::parse("-fno-dce"), Some(Flag::disabled("dce")));
        assert_eq!(Flag::parse("-O3"), None);
    }

    #[test]
    fn test_candidates_respect_min_version() {
        // tree-partial-pre needs 4.8.0
        let older = candidates(40700);
        assert!(!older.iter().any(|f| f.name == "tree-partial-pre"));
        let newer = candidates(40800);
        assert!(newer.iter().any(|f| f.name == "tree-partial-pre"));
        assert!(newer.iter().all(|f| f.enabled));
    }

    #[test]
    fn test_candidates_shrink_with_age() {
        assert!(candidates(40500).len() < candidates(40800).len());
        assert_eq!(candidates(40800).len(), FLAG_VERSIONS.len());
    }

    #[test]
    fn test_excluded_flags_absent() {
        for name in [
            "branch-target-load-optimize2",
            "common",
            "data-sections",
            "section-anchors",
            "strict-aliasing",
            "tree-coalesce-inlined-vars",
        ] {
            assert!(!FLAG_VERSIONS.iter().any(|&(n, _)| n == name));
        }
    }

    #[test]
    fn test_parse_version_three_components() {
        assert_eq!(parse_version("4.9.0").unwrap(), 40900);
        assert_eq!(parse_version("10.2.1").unwrap(), 100201);
    }

    #[test]
    fn test_parse_version_short_forms() {
        assert_eq!(parse_version("7").unwrap(), 70000);
        assert_eq!(parse_version("4.9").unwrap(), 40900);
    }

    #[test]
    fn test_parse_version_rejects_garbage() {
        assert!(parse_version("").is_err());
        assert!(parse_version("gcc").is_err());
        assert!(parse_version("4.x.0").is_err());
    }
}
