//! Live check of lounge detail URLs.
//!
//! A URL that does not open directly is walked down a short ladder of
//! alternatives (recover from the redirect target, drop the duplicated
//! airport segment, recover again from where the repaired URL landed).
//! The first candidate that opens wins; if none does the URL is discarded.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::fetch::Fetcher;
use crate::links::Site;
use crate::parser::detail::parse_detail_page;
use crate::types::DetailMeta;

/// Characters of the body inspected for a soft 404.
const HEAD_CHARS: usize = 2500;

/// Result of one live check. `body` is kept for ok verdicts only.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub ok: bool,
    pub resolved_url: String,
    pub body: Option<String>,
}

impl Verdict {
    fn rejected(resolved_url: &str) -> Self {
        Self {
            ok: false,
            resolved_url: resolved_url.to_string(),
            body: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Direct,
    RecoverRedirect,
    RepairSegment,
    RecoverAfterRepair,
}

const LADDER: [Step; 4] = [
    Step::Direct,
    Step::RecoverRedirect,
    Step::RepairSegment,
    Step::RecoverAfterRepair,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Valid(String),
    Recovered(String),
    Repaired(String),
    Discarded,
}

impl Outcome {
    fn from_step(step: Step, url: String) -> Self {
        match step {
            Step::Direct => Self::Valid(url),
            Step::RecoverRedirect | Step::RecoverAfterRepair => Self::Recovered(url),
            Step::RepairSegment => Self::Repaired(url),
        }
    }

    /// The URL to keep, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Valid(u) | Self::Recovered(u) | Self::Repaired(u) => Some(u),
            Self::Discarded => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Recovered(_) => "recovered",
            Self::Repaired(_) => "repaired",
            Self::Discarded => "discarded",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url() {
            Some(url) => write!(f, "{} {}", self.label(), url),
            None => f.write_str(self.label()),
        }
    }
}

/// Outcome plus what the winning page showed.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub outcome: Outcome,
    pub meta: DetailMeta,
}

#[derive(Clone)]
pub struct Validator {
    site: Arc<Site>,
    fetcher: Arc<Fetcher>,
}

impl Validator {
    pub fn new(site: Arc<Site>, fetcher: Arc<Fetcher>) -> Self {
        Self { site, fetcher }
    }

    /// One fetch of `url`. Transport failures and non-detail landings are
    /// not ok; `resolved_url` is where the request ended up.
    pub async fn probe(&self, url: &str) -> Verdict {
        if !self.site.is_detail_url(url) {
            return Verdict::rejected(url);
        }
        let page = match self.fetcher.get(url).await {
            Ok(page) => page,
            Err(e) => {
                debug!("probe {} failed: {}", url, e);
                return Verdict::rejected(url);
            }
        };
        if !self.site.is_detail_url(&page.final_url) {
            return Verdict::rejected(&page.final_url);
        }

        let ok = page.status < 400 && !looks_not_found(&page.body);
        Verdict {
            ok,
            resolved_url: page.final_url,
            body: ok.then_some(page.body),
        }
    }

    /// Walk the ladder for `url`. Candidates already probed are skipped.
    pub async fn validate(&self, url: &str) -> Validation {
        let mut tried: HashSet<String> = HashSet::new();
        let mut direct_landing: Option<String> = None;
        let mut repaired: Option<(String, String)> = None;

        for step in LADDER {
            let candidate = match step {
                Step::Direct => Some(url.to_string()),
                Step::RecoverRedirect => direct_landing
                    .as_deref()
                    .and_then(|landing| self.site.recover_from_redirect(url, landing)),
                Step::RepairSegment => {
                    Some(self.site.repair_duplicated_segment(url)).filter(|r| r != url)
                }
                Step::RecoverAfterRepair => repaired
                    .as_ref()
                    .and_then(|(fixed, landing)| self.site.recover_from_redirect(fixed, landing)),
            };
            let Some(candidate) = candidate else {
                continue;
            };
            if !tried.insert(candidate.clone()) {
                continue;
            }

            let verdict = self.probe(&candidate).await;
            if verdict.ok {
                let resolved = self.site.canonicalize(&verdict.resolved_url);
                let meta = verdict
                    .body
                    .as_deref()
                    .map(|body| parse_detail_page(body, &verdict.resolved_url))
                    .unwrap_or_default();
                debug!("{} -> {:?} via {:?}", url, resolved, step);
                return Validation {
                    outcome: Outcome::from_step(step, resolved),
                    meta,
                };
            }

            match step {
                Step::Direct => direct_landing = Some(verdict.resolved_url),
                Step::RepairSegment => repaired = Some((candidate, verdict.resolved_url)),
                _ => {}
            }
        }

        debug!("{} discarded", url);
        Validation {
            outcome: Outcome::Discarded,
            meta: DetailMeta::default(),
        }
    }
}

/// Soft 404 check on the start of the body. Imprecise: a real lounge page
/// that mentions "404" near the top without the word "lounge" is rejected.
pub fn looks_not_found(body: &str) -> bool {
    let head: String = body.chars().take(HEAD_CHARS).collect::<String>().to_lowercase();
    head.contains("page not found") || (head.contains("404") && !head.contains("lounge"))
}
