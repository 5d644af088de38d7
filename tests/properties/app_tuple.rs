//! Property tests for app tuples.

use proptest::prelude::*;

use deckhand::AppTuple;

fn component() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[a-zA-Z0-9_-]{1,12}").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: a tuple parses back from its slug.
    #[test]
    fn property_slug_parses_back(app in component(), infra in component(), flavor in component()) {
        let tuple = AppTuple::new(app, infra, flavor).unwrap();
        let parsed: AppTuple = tuple.slug().parse().unwrap();
        prop_assert_eq!(parsed, tuple);
    }

    /// PROPERTY: tuples that differ in any component are different keys.
    #[test]
    fn property_components_all_matter(
        a in component(),
        b in component(),
        c in component(),
        other in component(),
        which in 0usize..3,
    ) {
        let base = AppTuple::new(a.clone(), b.clone(), c.clone()).unwrap();
        let changed = match which {
            0 => AppTuple::new(other.clone(), b, c),
            1 => AppTuple::new(a, other.clone(), c),
            _ => AppTuple::new(a, b, other.clone()),
        }
        .unwrap();
        let original = [base.app(), base.infra(), base.flavor()][which].to_string();
        prop_assert_eq!(base == changed, original == other);
    }

    /// PROPERTY: parsing never panics on arbitrary input.
    #[test]
    fn property_parse_never_panics(input in "(?s).{0,64}") {
        let _ = input.parse::<AppTuple>();
    }
}
