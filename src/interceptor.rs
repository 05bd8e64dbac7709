//! Request interception.
//!
//! An [`Interceptor`] holds an ordered list of [`Rule`]s. Each rule pairs a matcher
//! (HTTP method plus [`RoutePattern`]) with a [`Responder`] and a [`Shots`] budget. The
//! first rule that matches a request decides how it is answered; a rule whose budget runs
//! out is dropped, so later requests fall through to the default behaviour.

use std::collections::HashMap;
use std::fmt;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{error::Error, response::MockResponse, Result};

/// An outgoing request, as seen by the mock API
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    /// Path without the query string
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl InterceptedRequest {
    /// Create a request for `path_and_query`, e.g. `/assistants?search=frog`
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (
                path,
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect(),
            ),
            None => (path_and_query, Vec::new()),
        };

        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: &str) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach any serializable body
    pub fn with_body<T: Serialize>(self, body: &T) -> Result<Self> {
        Ok(self.with_json(serde_json::to_value(body)?))
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("Invalid header value {value:?}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add an `Authorization: Bearer` header
    pub fn with_bearer(self, token: &str) -> Result<Self> {
        self.with_header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// The bearer token, if a non-empty one was sent
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the JSON body; a missing body decodes from `{}`
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self
            .body
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(serde_json::from_value(body)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `{name}`: one segment, captured
    Param(String),
    /// `*`: one segment
    Any,
    /// `**`: zero or more segments
    AnyDepth,
}

/// A path pattern such as `/threads/{id}/messages` or `**/files/*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern. Malformed patterns are accepted here and rejected by
    /// [`RoutePattern::validate`].
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::AnyDepth,
                _ => match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(name) => Segment::Param(name.to_string()),
                    None => Segment::Literal(s.to_string()),
                },
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Reject patterns that can never be what the author meant
    pub fn validate(&self) -> Result<()> {
        if self.raw.trim().is_empty() {
            return Err(Error::Config("Route pattern cannot be empty".to_string()));
        }
        for segment in &self.segments {
            match segment {
                Segment::Param(name) if name.is_empty() || name.contains(['{', '}']) => {
                    return Err(Error::Config(format!(
                        "Route pattern {:?} has an invalid capture",
                        self.raw
                    )));
                }
                Segment::Literal(text) if text.contains(['{', '}']) => {
                    return Err(Error::Config(format!(
                        "Route pattern {:?} has unbalanced braces",
                        self.raw
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Match `path`, returning the captured parameters
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = HashMap::new();
        if match_segments(&self.segments, &parts, &mut params) {
            Some(params)
        } else {
            None
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_segments(
    segments: &[Segment],
    parts: &[&str],
    params: &mut HashMap<String, String>,
) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return parts.is_empty();
    };

    match first {
        Segment::AnyDepth => (0..=parts.len()).any(|skip| {
            let mut attempt = params.clone();
            if match_segments(rest, &parts[skip..], &mut attempt) {
                *params = attempt;
                true
            } else {
                false
            }
        }),
        _ => {
            let Some((part, remaining)) = parts.split_first() else {
                return false;
            };
            match first {
                Segment::Literal(text) if text != part => return false,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
                _ => {}
            }
            match_segments(rest, remaining, params)
        }
    }
}

/// How a matched request is answered
#[derive(Debug, Clone)]
pub enum Responder {
    /// Answer with a programmed response
    Canned(MockResponse),
    /// Answer from the fixture store
    FromStore,
    /// Forward to the real upstream
    PassThrough,
}

/// How many requests a rule answers before it is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shots {
    Always,
    Once,
    Times(usize),
}

/// One interception rule
#[derive(Debug, Clone)]
pub struct Rule {
    /// `None` matches any method
    pub method: Option<Method>,
    pub pattern: RoutePattern,
    pub responder: Responder,
    pub shots: Shots,
    hits: usize,
}

impl Rule {
    /// A rule that answers every matching request
    pub fn new(method: Option<Method>, pattern: &str, responder: Responder) -> Self {
        Self {
            method,
            pattern: RoutePattern::new(pattern),
            responder,
            shots: Shots::Always,
            hits: 0,
        }
    }

    /// Answer `method pattern` with a fixed response
    pub fn canned(method: Method, pattern: &str, response: MockResponse) -> Self {
        Self::new(Some(method), pattern, Responder::Canned(response))
    }

    /// Answer only the first matching request
    pub fn once(mut self) -> Self {
        self.shots = Shots::Once;
        self
    }

    /// Answer the first `n` matching requests
    pub fn times(mut self, n: usize) -> Self {
        self.shots = Shots::Times(n);
        self
    }

    /// Number of requests answered so far
    pub fn hits(&self) -> usize {
        self.hits
    }

    fn is_exhausted(&self) -> bool {
        match self.shots {
            Shots::Always => false,
            Shots::Once => self.hits >= 1,
            Shots::Times(n) => self.hits >= n,
        }
    }

    fn same_route(&self, other: &Rule) -> bool {
        self.method == other.method && self.pattern.as_str() == other.pattern.as_str()
    }

    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().is_none_or(|m| m == method) && self.pattern.matches(path).is_some()
    }
}

/// Ordered rule list
#[derive(Debug, Default)]
pub struct Interceptor {
    rules: Vec<Rule>,
}

impl Interceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and install a rule.
    ///
    /// Fails for rules that could never behave as written: a malformed pattern, a
    /// `Times(0)` budget, or a pass-through when no upstream exists.
    pub fn register(&mut self, rule: Rule, can_pass_through: bool) -> Result<()> {
        rule.pattern.validate()?;

        if rule.shots == Shots::Times(0) {
            return Err(Error::Config(format!(
                "Rule for {} would never answer a request (Times(0))",
                rule.pattern
            )));
        }

        if matches!(rule.responder, Responder::PassThrough) && !can_pass_through {
            return Err(Error::Config(format!(
                "Pass-through rule for {} needs an upstream URL",
                rule.pattern
            )));
        }

        self.install(rule);
        Ok(())
    }

    /// Install a rule that is known to be valid. A rule for the same method and pattern
    /// replaces the earlier one in place.
    pub(crate) fn install(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.same_route(&rule)) {
            Some(existing) => {
                tracing::debug!(pattern = %rule.pattern, "replacing route rule");
                *existing = rule;
            }
            None => self.rules.push(rule),
        }
    }

    /// Remove the rule for `method pattern`
    pub fn unregister(&mut self, method: Option<&Method>, pattern: &str) -> bool {
        let before = self.rules.len();
        self.rules
            .retain(|r| !(r.method.as_ref() == method && r.pattern.as_str() == pattern));
        self.rules.len() != before
    }

    /// Find the responder for a request and spend one shot of its rule
    pub fn resolve(&mut self, method: &Method, path: &str) -> Option<Responder> {
        let index = self.rules.iter().position(|r| r.matches(method, path))?;
        let rule = &mut self.rules[index];
        rule.hits += 1;
        let responder = rule.responder.clone();

        if rule.is_exhausted() {
            tracing::info!(
                %method,
                pattern = %rule.pattern,
                hits = rule.hits,
                "route rule consumed"
            );
            self.rules.remove(index);
        }

        Some(responder)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;

    fn status_of(responder: Option<Responder>) -> Option<StatusCode> {
        match responder? {
            Responder::Canned(response) => Some(response.status),
            _ => None,
        }
    }

    #[test]
    fn test_pattern_matching() {
        let pattern = RoutePattern::new("/threads/{id}/messages");
        let params = pattern.matches("/threads/thread_1/messages").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("thread_1"));
        assert!(pattern.matches("/threads/thread_1").is_none());
        assert!(pattern.matches("/threads/thread_1/messages/extra").is_none());

        let any = RoutePattern::new("/files/*");
        assert!(any.matches("/files/file-1").is_some());
        assert!(any.matches("/files").is_none());

        let deep = RoutePattern::new("*/**/api/files/delete");
        assert!(deep.matches("/localhost/api/files/delete").is_some());
        assert!(deep.matches("/host/a/b/api/files/delete").is_some());
        assert!(deep.matches("/api/files/delete").is_none());

        let trailing = RoutePattern::new("/assistants/**");
        assert!(trailing.matches("/assistants").is_some());
        assert!(trailing.matches("/assistants/asst_1/files").is_some());
    }

    #[test]
    fn test_pattern_validation() {
        assert!(RoutePattern::new("/threads/{id}").validate().is_ok());
        assert!(RoutePattern::new("").validate().is_err());
        assert!(RoutePattern::new("/threads/{}").validate().is_err());
        assert!(RoutePattern::new("/threads/{id").validate().is_err());
        assert!(RoutePattern::new("/threads/id}").validate().is_err());
    }

    #[test]
    fn test_request_parsing() {
        let request = InterceptedRequest::get("/assistants?search=frog%20helper&x=1")
            .with_bearer("token")
            .unwrap();
        assert_eq!(request.path, "/assistants");
        assert_eq!(request.query_param("search"), Some("frog helper"));
        assert_eq!(request.query_param("missing"), None);
        assert_eq!(request.bearer_token(), Some("token"));

        let anonymous = InterceptedRequest::get("/assistants");
        assert_eq!(anonymous.bearer_token(), None);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut interceptor = Interceptor::new();
        interceptor.install(Rule::canned(
            Method::POST,
            "/threads",
            MockResponse::internal_server_error("first"),
        ));
        interceptor.install(Rule::new(None, "/threads", Responder::FromStore));

        assert_eq!(
            status_of(interceptor.resolve(&Method::POST, "/threads")),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert!(matches!(
            interceptor.resolve(&Method::GET, "/threads"),
            Some(Responder::FromStore)
        ));
        assert!(interceptor.resolve(&Method::GET, "/files").is_none());
    }

    #[test]
    fn test_single_shot_rule_is_consumed() {
        let mut interceptor = Interceptor::new();
        interceptor
            .register(
                Rule::canned(
                    Method::DELETE,
                    "/files/{id}",
                    MockResponse::status_only(StatusCode::INTERNAL_SERVER_ERROR),
                )
                .once(),
                false,
            )
            .unwrap();

        assert_eq!(
            status_of(interceptor.resolve(&Method::DELETE, "/files/file-1")),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert!(interceptor.resolve(&Method::DELETE, "/files/file-1").is_none());
        assert!(interceptor.rules().is_empty());
    }

    #[test]
    fn test_times_budget() {
        let mut interceptor = Interceptor::new();
        interceptor.install(
            Rule::canned(Method::GET, "/files", MockResponse::ok(serde_json::json!([]))).times(2),
        );
        assert!(interceptor.resolve(&Method::GET, "/files").is_some());
        assert_eq!(interceptor.rules()[0].hits(), 1);
        assert!(interceptor.resolve(&Method::GET, "/files").is_some());
        assert!(interceptor.resolve(&Method::GET, "/files").is_none());
    }

    #[test]
    fn test_reregistering_replaces() {
        let mut interceptor = Interceptor::new();
        interceptor.install(Rule::canned(
            Method::GET,
            "/assistants",
            MockResponse::internal_server_error("old"),
        ));
        interceptor.install(Rule::canned(
            Method::GET,
            "/assistants",
            MockResponse::ok(serde_json::json!({"data": []})),
        ));

        assert_eq!(interceptor.rules().len(), 1);
        assert_eq!(
            status_of(interceptor.resolve(&Method::GET, "/assistants")),
            Some(StatusCode::OK)
        );
    }

    #[test]
    fn test_register_rejects_nonsense() {
        let mut interceptor = Interceptor::new();

        let zero = Rule::canned(Method::GET, "/files", MockResponse::ok(serde_json::json!({})))
            .times(0);
        assert!(interceptor.register(zero, true).unwrap_err().is_config_error());

        let pass = Rule::new(Some(Method::GET), "/files", Responder::PassThrough);
        assert!(interceptor.register(pass.clone(), false).is_err());
        assert!(interceptor.register(pass, true).is_ok());

        let bad = Rule::new(None, "/threads/{}", Responder::FromStore);
        assert!(interceptor.register(bad, true).is_err());
        assert_eq!(interceptor.rules().len(), 1);
    }

    #[test]
    fn test_unregister_and_clear() {
        let mut interceptor = Interceptor::new();
        interceptor.install(Rule::new(Some(Method::GET), "/files", Responder::FromStore));
        interceptor.install(Rule::new(None, "/threads", Responder::FromStore));

        assert!(interceptor.unregister(Some(&Method::GET), "/files"));
        assert!(!interceptor.unregister(Some(&Method::GET), "/files"));
        assert_eq!(interceptor.rules().len(), 1);

        interceptor.clear();
        assert!(interceptor.rules().is_empty());
    }
}
