use std::collections::BTreeMap;

use rand::Rng;

use super::{FieldPolicy, generate_fields, match_fields};
use crate::pattern::Pattern;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::row::Row;

/// Query parameters: exact, case-sensitive names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpQueryParamPattern {
    pub params: BTreeMap<String, Pattern>,
    /// Accept parameters the pattern does not declare
    pub additional: bool,
}

impl HttpQueryParamPattern {
    #[must_use]
    pub fn new(params: BTreeMap<String, Pattern>) -> Self {
        Self {
            params,
            additional: false,
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, pattern: Pattern) {
        self.params.insert(name.into(), pattern);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn matches(&self, actual: &BTreeMap<String, String>, resolver: &Resolver) -> MatchResult {
        self.matches_allowing(actual, &[], resolver)
    }

    /// Match, treating `allowed` names (API keys sent in the query) as declared.
    pub fn matches_allowing(
        &self,
        actual: &BTreeMap<String, String>,
        allowed: &[&str],
        resolver: &Resolver,
    ) -> MatchResult {
        let ignored = |name: &str| allowed.iter().any(|a| *a == name);
        let policy = FieldPolicy {
            case_insensitive: false,
            check_unexpected: !self.additional,
            ignored: &ignored,
        };
        MatchResult::from_failures(match_fields(&self.params, actual, policy, resolver))
    }

    pub fn generate(&self, resolver: &Resolver, rng: &mut impl Rng) -> BTreeMap<String, String> {
        generate_fields(&self.params, resolver, rng)
    }

    fn with_params(&self, params: BTreeMap<String, Pattern>) -> Self {
        Self {
            params,
            additional: self.additional,
        }
    }

    #[must_use]
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Box<dyn Iterator<Item = (Self, Option<String>)>> {
        let this = self.clone();
        Box::new(super::positive_fields(&self.params, row, resolver).map(move |(p, c)| (this.with_params(p), c)))
    }

    #[must_use]
    pub fn negative_based_on(
        &self,
        row: &Row,
        resolver: &Resolver,
    ) -> Box<dyn Iterator<Item = (Self, Option<String>)>> {
        let this = self.clone();
        Box::new(super::negative_fields(&self.params, row, resolver).map(move |(p, c)| (this.with_params(p), c)))
    }
}
