//! Request classification.
//!
//! A [`RuleSet`] is an ordered list of [`Rule`]s. Each rule looks at the
//! request head and either claims the request (producing a [`Decision`]) or
//! passes. The first rule that claims a request wins; a request nobody claims
//! is forwarded.
//!
//! The built-in order is:
//! 1. [`Rule::SchemeCheck`] - only `http` and `https` targets (400 otherwise)
//! 2. [`Rule::RejectAuthenticated`] - any authentication header (404)
//! 3. [`Rule::HeadOk`] - `HEAD` (bare 200)
//! 4. [`Rule::RejectConnect`] - `CONNECT` (404)
//! 5. [`Rule::ImageOk`] - image URLs (bare 200)
//! 6. [`Rule::EmptyDocument`] - everything else (200 `<html></html>`)
//!
//! Classification is synchronous and never touches the network.

use std::borrow::Cow;

use http::{HeaderMap, Method, Request, StatusCode, Uri};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::defaults::EMPTY_DOCUMENT;
use crate::error::DecoyError;
use crate::headers;

/// Web URL whose last path or query segment ends in a common image extension.
static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?:[/|.\w\s?=&%+\-]*\.(?:jpg|gif|png)$").expect("image pattern is valid")
});

/// The parts of a request the classifier looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

impl<'a, B> From<&'a Request<B>> for RequestHead<'a> {
    fn from(req: &'a Request<B>) -> Self {
        Self {
            method: req.method(),
            uri: req.uri(),
            headers: req.headers(),
        }
    }
}

/// What happens to a classified request.
#[derive(Debug)]
pub enum Outcome {
    /// Answer immediately with a synthetic response.
    Respond {
        status: StatusCode,
        body: &'static str,
    },
    /// Refuse the request; the error carries status and body.
    Reject(DecoyError),
    /// Hand the request to the forwarder.
    Forward,
}

/// Result of classifying one request.
#[derive(Debug)]
pub struct Decision {
    /// Rule that claimed the request, `None` when nothing matched.
    pub rule: Option<Rule>,
    pub outcome: Outcome,
    /// Human-readable reason, written to the decision log.
    pub reason: Cow<'static, str>,
}

impl Decision {
    fn respond(rule: Rule, status: StatusCode, body: &'static str, reason: &'static str) -> Self {
        Self {
            rule: Some(rule),
            outcome: Outcome::Respond { status, body },
            reason: Cow::Borrowed(reason),
        }
    }

    fn reject(rule: Rule, error: DecoyError) -> Self {
        let reason = Cow::Owned(error.to_string());
        Self {
            rule: Some(rule),
            outcome: Outcome::Reject(error),
            reason,
        }
    }

    /// Returns `true` if the request goes to the upstream.
    pub fn is_forward(&self) -> bool {
        matches!(self.outcome, Outcome::Forward)
    }
}

/// A single classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Reject targets whose scheme is not exactly `http` or `https`.
    SchemeCheck,
    /// Pretend the resource does not exist when credentials are presented.
    RejectAuthenticated,
    /// Answer `HEAD` with a bare 200.
    HeadOk,
    /// Refuse tunnel establishment.
    RejectConnect,
    /// Answer image URLs with a bare 200.
    ImageOk,
    /// Answer with a minimal HTML document.
    EmptyDocument,
    /// Forward to the upstream named by the target.
    Forward,
}

impl Rule {
    /// Evaluates this rule alone against `head`.
    ///
    /// Returns `None` when the rule does not claim the request.
    pub fn evaluate(&self, head: &RequestHead<'_>) -> Option<Decision> {
        match self {
            Rule::SchemeCheck => {
                let scheme = head.uri.scheme_str().unwrap_or("");
                if scheme == "http" || scheme == "https" {
                    None
                } else {
                    Some(Decision::reject(
                        *self,
                        DecoyError::UnsupportedScheme(scheme.to_string()),
                    ))
                }
            }
            Rule::RejectAuthenticated => headers::has_authentication(head.headers)
                .then(|| Decision::reject(*self, DecoyError::AuthenticationPresent)),
            Rule::HeadOk => (*head.method == Method::HEAD).then(|| {
                Decision::respond(*self, StatusCode::OK, "", "HEAD request - returning OK")
            }),
            Rule::RejectConnect => (*head.method == Method::CONNECT).then(|| Decision {
                rule: Some(*self),
                outcome: Outcome::Reject(DecoyError::TunnelNotSupported),
                reason: Cow::Borrowed("CONNECT request - returning 404"),
            }),
            Rule::ImageOk => is_image_url(&head.uri.to_string())
                .then(|| Decision::respond(*self, StatusCode::OK, "", "image request")),
            Rule::EmptyDocument => Some(Decision::respond(
                *self,
                StatusCode::OK,
                EMPTY_DOCUMENT,
                "returning empty HTML",
            )),
            Rule::Forward => Some(Decision {
                rule: Some(*self),
                outcome: Outcome::Forward,
                reason: Cow::Borrowed("forwarding to upstream"),
            }),
        }
    }

    /// Returns `true` for rules that claim every request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Rule::EmptyDocument | Rule::Forward)
    }
}

/// Returns `true` if `target` looks like a web URL for a JPEG, GIF or PNG.
///
/// The extension is case-sensitive and must end the string.
///
/// # Example
///
/// ```
/// use decoy_core::classifier::is_image_url;
///
/// assert!(is_image_url("http://example.com/logo.png"));
/// assert!(!is_image_url("http://example.com/logo.pngx"));
/// ```
pub fn is_image_url(target: &str) -> bool {
    IMAGE_URL.is_match(target)
}

/// Ordered, first-match-wins list of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from(vec![
            Rule::SchemeCheck,
            Rule::RejectAuthenticated,
            Rule::HeadOk,
            Rule::RejectConnect,
            Rule::ImageOk,
            Rule::EmptyDocument,
        ])
    }
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl RuleSet {
    /// The default order with the empty-document fallback replaced by
    /// forwarding.
    pub fn forwarding() -> Self {
        let rules = Self::default()
            .rules
            .into_iter()
            .map(|rule| if rule == Rule::EmptyDocument { Rule::Forward } else { rule })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns `true` if some request can reach the forwarder.
    pub fn forwards(&self) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.is_terminal())
            .is_none_or(|rule| *rule == Rule::Forward)
    }

    /// Classifies a request: the first rule that claims it decides.
    pub fn classify(&self, head: &RequestHead<'_>) -> Decision {
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(head))
            .unwrap_or_else(|| Decision {
                rule: None,
                outcome: Outcome::Forward,
                reason: Cow::Borrowed("no rule matched - forwarding to upstream"),
            })
    }
}
