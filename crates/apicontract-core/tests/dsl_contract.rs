//! End-to-end: DSL feature → generated tests → stubbed responses

use apicontract_core::dsl::{DslFeature, DslScenario, Step, compile_feature};
use apicontract_core::{
    ContractReport, Feature, GeneratedTest, GenerationStrategy, HttpRequest, MatchReport, ResolverSettings, TestKind,
    converge_values,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| (*c).to_string()).collect())
        .collect()
}

fn store() -> Feature {
    let dsl = DslFeature {
        name: "store".into(),
        background: vec![
            Step::new("Given", "type Item").with_table(table(&[
                &["sku", "(string)"],
                &["quantity", "(integer)"],
                &["gift?", "(boolean)"],
            ])),
            Step::new("Given", "type Order").with_table(table(&[
                &["id", "(integer)"],
                &["items", "(Item*)"],
            ])),
        ],
        scenarios: vec![
            DslScenario {
                name: "place order".into(),
                steps: vec![
                    Step::new("When", "POST /orders"),
                    Step::new("And", "request-header Content-Type application/json"),
                    Step::new("And", "request-body (Item)"),
                    Step::new("Then", "status 201"),
                    Step::new("And", "response-body (Order)"),
                ],
                examples: table(&[&["sku", "quantity"], &["ABC-1", "3"]]),
            },
            DslScenario {
                name: "fetch order".into(),
                steps: vec![
                    Step::new("When", "GET /orders/(id:integer)"),
                    Step::new("Then", "status 200"),
                    Step::new("And", "response-body (Order)"),
                ],
                examples: Vec::new(),
            },
        ],
    };
    compile_feature(&dsl).unwrap().with_settings(ResolverSettings {
        strategy: GenerationStrategy::GenerativeTestsEnabled { positive_only: false },
        ..ResolverSettings::default()
    })
}

#[test]
fn generated_requests_respect_their_kind() {
    let feature = store();
    let resolver = feature.resolver();
    let mut rng = SmallRng::seed_from_u64(17);

    let tests: Vec<_> = feature.generate_tests().unwrap().collect();
    assert!(tests.iter().any(|t| t.kind == TestKind::Negative));

    for test in &tests {
        let scenario = feature.scenario(&test.scenario).unwrap();
        let request = test.generate_request(&resolver, &mut rng);
        let result = scenario.matches_request(&request, &resolver);
        match test.kind {
            TestKind::Positive => assert!(result.is_success(), "{}: {}", test.name(), result.report()),
            TestKind::Negative => assert!(!result.is_success(), "{} was accepted", test.name()),
        }
    }
}

#[test]
fn example_values_seed_the_first_test() {
    let feature = store();
    let resolver = feature.resolver();
    let mut rng = SmallRng::seed_from_u64(1);
    let first = feature.generate_tests().unwrap().next().unwrap();
    let generated = GeneratedTest::new(&first, &resolver, &mut rng);
    assert_eq!(generated.expected_status, "201");
    let body = generated.request.body.unwrap();
    assert_eq!(body["sku"], "ABC-1");
    assert_eq!(body["quantity"], 3);
}

#[test]
fn stubbed_responses_satisfy_the_contract_and_converge() {
    let feature = store();
    let resolver = feature.resolver();
    let mut rng = SmallRng::seed_from_u64(5);
    let scenario = feature.scenario("fetch order").unwrap();

    let bodies: Vec<_> = (1..=5)
        .map(|id| {
            let response = feature
                .stub_response(&HttpRequest::new("GET", &format!("/orders/{id}")), &mut rng)
                .unwrap();
            assert!(scenario.matches_response(&response, &resolver).is_success());
            response.body.unwrap()
        })
        .collect();

    let converged = converge_values(&bodies, "fetch order").unwrap();
    for body in &bodies {
        assert!(converged.matches(body, &resolver).is_success());
    }
}

#[test]
fn unmatched_requests_are_reported() {
    let feature = store();
    let mut rng = SmallRng::seed_from_u64(2);
    let failure = feature
        .stub_response(&HttpRequest::new("DELETE", "/orders/1"), &mut rng)
        .unwrap_err();
    let report = ContractReport {
        spec: "store.feature".into(),
        matches: vec![MatchReport::new(
            "DELETE /orders/1",
            &apicontract_core::MatchResult::failure(failure),
        )],
        ..ContractReport::default()
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["matches"][0]["success"], false);
    assert!(json["matches"][0]["report"].as_str().unwrap().contains("method"));
}
