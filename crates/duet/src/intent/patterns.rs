// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint tables: per-category keyword regexes with weights and named
//! error-pattern regexes. Pure data plus a one-time compile step.

use regex::Regex;

use super::Category;

pub struct CategoryRule {
    pub category: Category,
    pub weight: f64,
    /// Keyword regex sources matched against the utterance.
    pub keywords: &'static [&'static str],
    /// Named error-pattern regex sources, matched against the utterance
    /// and against recent observed errors.
    pub errors: &'static [(&'static str, &'static str)],
}

pub const RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::Installation,
        weight: 1.0,
        keywords: &[
            r"(?i)\binstall(ation|ing|ed)?\b",
            r"(?i)\b(npm|pip|cargo|gem|brew|apt)\s+(i|install|add)\b",
            r"(?i)\bnode_modules\b",
            r"(?i)\bdependenc(y|ies)\b",
            r"(?i)\bpackage(s)?\b",
        ],
        errors: &[
            ("npm-err", r"npm ERR!"),
            ("enoent", r"\bENOENT\b"),
            ("eresolve", r"\bERESOLVE\b"),
            ("e404", r"\bE404\b"),
            ("module-not-found", r"(?i)(ModuleNotFoundError|cannot find module|No module named)"),
            ("could-not-find-crate", r"(?i)error: could not find .* in registry"),
        ],
    },
    CategoryRule {
        category: Category::Configuration,
        weight: 1.0,
        keywords: &[
            r"(?i)\bconfig(ure|uration)?\b",
            r"(?i)\bsettings\b",
            r"(?i)\benvironment variable\b",
            r"(?i)\.env\b",
            r"(?i)\bset ?up\b",
        ],
        errors: &[
            ("missing-env", r"(?i)(missing|undefined) environment variable"),
            ("bad-config", r"(?i)(invalid|malformed|unexpected) (config|configuration)"),
        ],
    },
    CategoryRule {
        category: Category::Build,
        weight: 1.0,
        keywords: &[
            r"(?i)\bbuild(ing|s)?\b",
            r"(?i)\bcompil(e|er|ation|ing)\b",
            r"(?i)\b(webpack|tsc|bundler|bundle)\b",
            r"(?i)\bcargo build\b",
        ],
        errors: &[
            ("rustc-error", r"error\[E\d+\]"),
            ("syntax-error", r"(?i)SyntaxError"),
            ("ts-error", r"\bTS\d{4,5}\b"),
            ("undefined-reference", r"(?i)undefined reference to"),
            ("cannot-find-symbol", r"(?i)cannot find symbol"),
        ],
    },
    CategoryRule {
        category: Category::Runtime,
        weight: 1.0,
        keywords: &[
            r"(?i)\bcrash(es|ed|ing)?\b",
            r"(?i)\bexception\b",
            r"(?i)\bat runtime\b",
            r"(?i)\bstack ?trace\b",
            r"(?i)\bsegfault\b",
        ],
        errors: &[
            ("type-error", r"(?i)\bTypeError\b"),
            ("null-pointer", r"NullPointerException"),
            ("segfault", r"(?i)segmentation fault"),
            ("panic", r"(?i)panicked at"),
            ("unhandled-rejection", r"(?i)UnhandledPromiseRejection"),
        ],
    },
    CategoryRule {
        category: Category::Network,
        weight: 1.0,
        keywords: &[
            r"(?i)\bnetwork\b",
            r"(?i)\bconnect(ion|ing)?\b",
            r"(?i)\btime(d)? ?out\b",
            r"(?i)\b(dns|proxy|port)\b",
            r"(?i)\brefused\b",
        ],
        errors: &[
            ("econnrefused", r"\bECONNREFUSED\b"),
            ("etimedout", r"\bETIMEDOUT\b"),
            ("enotfound", r"\bENOTFOUND\b"),
            ("getaddrinfo", r"(?i)getaddrinfo"),
            ("tls", r"(?i)(certificate verify failed|SSL_ERROR)"),
        ],
    },
    CategoryRule {
        category: Category::Permissions,
        weight: 1.0,
        keywords: &[
            r"(?i)\bpermission(s)?\b",
            r"(?i)\bdenied\b",
            r"(?i)\b(sudo|chmod|chown)\b",
            r"(?i)\baccess\b",
        ],
        errors: &[
            ("eacces", r"\bEACCES\b"),
            ("eperm", r"\bEPERM\b"),
            ("permission-denied", r"(?i)permission denied"),
            ("not-permitted", r"(?i)operation not permitted"),
        ],
    },
    CategoryRule {
        category: Category::Git,
        weight: 1.0,
        keywords: &[
            r"(?i)\bgit\b",
            r"(?i)\b(commit|branch|merge|rebase|stash)\b",
            r"(?i)\b(push|pull)\b",
            r"(?i)\bconflict(s)?\b",
        ],
        errors: &[
            ("merge-conflict", r"(?i)(merge conflict|CONFLICT \()"),
            ("non-fast-forward", r"(?i)non-fast-forward"),
            ("detached-head", r"(?i)detached HEAD"),
            ("no-upstream", r"(?i)has no upstream branch"),
        ],
    },
    CategoryRule {
        category: Category::Docker,
        weight: 1.0,
        keywords: &[
            r"(?i)\bdocker\b",
            r"(?i)\bcontainer(s)?\b",
            r"(?i)\b(image|dockerfile|compose)\b",
            r"(?i)\b(kubernetes|k8s|pod)\b",
        ],
        errors: &[
            ("docker-daemon", r"(?i)Cannot connect to the Docker daemon"),
            ("manifest-unknown", r"(?i)manifest unknown"),
            ("oci-runtime", r"(?i)OCI runtime"),
        ],
    },
    CategoryRule {
        category: Category::Deployment,
        weight: 1.0,
        keywords: &[
            r"(?i)\bdeploy(ment|ing|ed)?\b",
            r"(?i)\brelease\b",
            r"(?i)\bproduction\b",
            r"(?i)\b(ci/cd|pipeline)\b",
        ],
        errors: &[
            ("healthcheck", r"(?i)health ?check failed"),
            ("rollout", r"(?i)rollout (failed|stuck)"),
        ],
    },
    CategoryRule {
        category: Category::HowTo,
        weight: 1.0,
        keywords: &[
            r"(?i)\bhow (do|can|would) i\b",
            r"(?i)\bhow to\b",
            r"(?i)\bwhat (is|are|does)\b",
            r"(?i)\bexplain\b",
            r"(?i)\bshow me\b",
            r"(?i)\bexample\b",
        ],
        errors: &[],
    },
    CategoryRule {
        category: Category::Optimization,
        weight: 1.0,
        keywords: &[
            r"(?i)\bslow(er|ly)?\b",
            r"(?i)\bperformance\b",
            r"(?i)\boptimi[sz]e\b",
            r"(?i)\bfaster\b",
            r"(?i)\b(memory|cpu) usage\b",
            r"(?i)\bprofil(e|ing|er)\b",
        ],
        errors: &[
            ("oom", r"(?i)(out of memory|OOMKilled|heap limit)"),
        ],
    },
    CategoryRule {
        category: Category::Debugging,
        weight: 0.6,
        keywords: &[
            r"(?i)\berror(s)?\b",
            r"(?i)\bfail(s|ed|ing|ure)?\b",
            r"(?i)\bbroken\b",
            r"(?i)\bfix\b",
            r"(?i)\b(doesn't|does not|won't|isn't) work(ing)?\b",
            r"(?i)\bwhy\b",
        ],
        errors: &[
            ("generic-error", r"(?i)\b(error|fatal|exception)\b"),
        ],
    },
];

/// A compiled rule table, built once per classifier.
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

pub(super) struct CompiledRule {
    pub category: Category,
    pub weight: f64,
    pub keywords: Vec<Regex>,
    pub errors: Vec<(&'static str, Regex)>,
}

impl RuleSet {
    pub fn compile() -> anyhow::Result<Self> {
        let mut rules = Vec::with_capacity(RULES.len());
        for rule in RULES {
            let keywords =
                rule.keywords.iter().map(|p| Regex::new(p)).collect::<Result<Vec<_>, _>>()?;
            let errors = rule
                .errors
                .iter()
                .map(|(name, p)| Regex::new(p).map(|re| (*name, re)))
                .collect::<Result<Vec<_>, _>>()?;
            rules.push(CompiledRule { category: rule.category, weight: rule.weight, keywords, errors });
        }
        Ok(Self { rules })
    }

    pub(super) fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// Name of the first error fingerprint matching the given message, if any.
///
/// Used by the history tracker to tag observed errors; compiles lazily and
/// stops at the first hit, which is fine at error-recording rates.
pub fn extract_error_pattern(message: &str) -> Option<&'static str> {
    for rule in RULES {
        for (name, source) in rule.errors {
            if Regex::new(source).is_ok_and(|re| re.is_match(message)) {
                return Some(name);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
