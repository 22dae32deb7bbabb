//! Path templates: `/pets/{id}` (OpenAPI) and `/pets/(id:number)` (DSL)

use std::collections::BTreeMap;

use rand::Rng;

use super::match_literal;
use crate::error::{ContractError, Result};
use crate::pattern::{Pattern, token};
use crate::resolver::Resolver;
use crate::result::{Failure, FailureReason, MatchResult, MismatchKind};
use crate::row::Row;
use crate::value::ValueExt;

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Literal(String),
    Param { name: String, pattern: Pattern },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpPathPattern {
    pub segments: Vec<PathSegment>,
}

impl HttpPathPattern {
    /// Parse a template. `{name}` takes its pattern from `params` (string
    /// when undeclared); `(name:type)` carries its own token.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::InvalidPatternToken`] for a malformed
    /// `(name:type)` segment.
    pub fn parse(template: &str, params: &BTreeMap<String, Pattern>) -> Result<Self> {
        let segments = split(template)
            .map(|segment| {
                if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    let pattern = params.get(name).cloned().unwrap_or_else(Pattern::string);
                    return Ok(PathSegment::Param {
                        name: name.to_string(),
                        pattern,
                    });
                }
                if token::is_token(segment) {
                    let inner = &segment[1..segment.len() - 1];
                    let (name, type_token) = inner
                        .split_once(':')
                        .ok_or_else(|| ContractError::InvalidPatternToken(segment.to_string()))?;
                    let pattern = token::parse_token(&format!("({})", type_token.trim()))?;
                    return Ok(PathSegment::Param {
                        name: name.trim().to_string(),
                        pattern,
                    });
                }
                Ok(PathSegment::Literal(segment.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// Template in OpenAPI form, `/pets/{id}`.
    #[must_use]
    pub fn template(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(text) => text.clone(),
                PathSegment::Param { name, .. } => format!("{{{name}}}"),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    /// Declared parameters by name.
    #[must_use]
    pub fn params(&self) -> BTreeMap<String, Pattern> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                PathSegment::Param { name, pattern } => Some((name.clone(), pattern.clone())),
                PathSegment::Literal(_) => None,
            })
            .collect()
    }

    fn with_params(&self, params: &BTreeMap<String, Pattern>) -> Self {
        let segments = self
            .segments
            .iter()
            .map(|s| match s {
                PathSegment::Param { name, pattern } => PathSegment::Param {
                    name: name.clone(),
                    pattern: params.get(name).cloned().unwrap_or_else(|| pattern.clone()),
                },
                literal => literal.clone(),
            })
            .collect();
        Self { segments }
    }

    pub fn matches(&self, path: &str, resolver: &Resolver) -> MatchResult {
        let actual: Vec<&str> = split(path).collect();
        let mismatch = || {
            MatchResult::failure(
                Failure::new(
                    MismatchKind::ValueMismatch,
                    format!("Expected path {}, actual was {path}", self.template()),
                )
                .with_reason(FailureReason::UrlPathMismatch),
            )
        };
        if actual.len() != self.segments.len() {
            return mismatch();
        }

        let mut failures = Vec::new();
        for (segment, literal) in self.segments.iter().zip(&actual) {
            match segment {
                PathSegment::Literal(expected) if expected != literal => return mismatch(),
                PathSegment::Literal(_) => {}
                PathSegment::Param { name, pattern } => {
                    if let Some(failure) = match_literal(pattern, literal, resolver) {
                        failures.push(failure.under(name.as_str()));
                    }
                }
            }
        }
        MatchResult::from_failures(failures)
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(text) => text.clone(),
                PathSegment::Param { pattern, .. } => pattern.generate(resolver, rng).to_string_literal(),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Box<dyn Iterator<Item = (Self, Option<String>)>> {
        let this = self.clone();
        Box::new(super::positive_fields(&self.params(), row, resolver).map(move |(p, c)| (this.with_params(&p), c)))
    }

    /// Negative path parameters. Omitting a segment changes the route, so
    /// only value mutations are produced.
    #[must_use]
    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
    ) -> Box<dyn Iterator<Item = (Self, Option<String>)>> {
        let this = self.clone();
        let declared = self.params();
        Box::new(
            super::negative_fields(&declared, row, resolver)
                .filter(move |(p, _)| declared.keys().all(|k| p.contains_key(k)))
                .map(move |(p, c)| (this.with_params(&p), c)),
        )
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn pets_by_id() -> HttpPathPattern {
        let params: BTreeMap<_, _> = [("id".to_string(), Pattern::integer())].into();
        HttpPathPattern::parse("/pets/{id}", &params).unwrap()
    }

    #[test]
    fn openapi_and_dsl_templates_agree() {
        let dsl = HttpPathPattern::parse("/pets/(id:integer)", &BTreeMap::new()).unwrap();
        assert_eq!(dsl, pets_by_id());
        assert_eq!(dsl.template(), "/pets/{id}");
    }

    #[test]
    fn params_are_parsed_and_matched() {
        let resolver = Resolver::default();
        assert!(pets_by_id().matches("/pets/10", &resolver).is_success());
        assert!(pets_by_id().matches("/pets/10/", &resolver).is_success());
        let bad = pets_by_id().matches("/pets/rex", &resolver);
        let failure = bad.as_failure().unwrap();
        assert_eq!(failure.entries()[0].0, "id");
        assert!(!failure.is_fluffy(0));
    }

    #[test]
    fn literal_mismatches_are_fluffy() {
        let resolver = Resolver::default();
        for path in ["/owners/10", "/pets", "/pets/10/toys"] {
            let result = pets_by_id().matches(path, &resolver);
            assert_eq!(
                result.as_failure().and_then(Failure::first_reason),
                Some(FailureReason::UrlPathMismatch),
                "{path}"
            );
        }
    }

    #[test]
    fn generated_paths_match() {
        let mut rng = SmallRng::seed_from_u64(11);
        let resolver = Resolver::default();
        let path = pets_by_id().generate(&resolver, &mut rng);
        assert!(path.starts_with("/pets/"));
        assert!(pets_by_id().matches(&path, &resolver).is_success());
    }

    #[test]
    fn negatives_keep_every_segment() {
        let resolver = Resolver::default();
        let negatives: Vec<_> = pets_by_id().negative_based_on(&Row::new(), &resolver).collect();
        assert!(!negatives.is_empty());
        for (pattern, _) in negatives {
            assert_eq!(pattern.segments.len(), 2);
        }
    }

    #[test]
    fn malformed_dsl_segments_are_rejected() {
        assert!(HttpPathPattern::parse("/pets/(id)", &BTreeMap::new()).is_err());
        assert!(HttpPathPattern::parse("/pets/(id:strnig)", &BTreeMap::new()).is_err());
    }
}
