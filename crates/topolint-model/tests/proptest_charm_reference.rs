use proptest::prelude::*;
use proptest::test_runner::Config;
use topolint_model::CharmName;

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn decorations_strip_to_the_bare_name(
        origin in "(cs:|ch:|local:)?",
        owner in "(~[a-z][a-z0-9.-]{0,8}/)?",
        series in "([a-z][a-z0-9]{0,6}/){0,2}",
        name in "[a-z][a-z0-9]{0,12}",
        revision in "(-[0-9]{1,3})?"
    ) {
        let reference = format!("{origin}{owner}{series}{name}{revision}");
        let parsed = CharmName::parse(&reference);
        prop_assert!(parsed.is_ok(), "reference {reference}");
        let parsed = parsed.unwrap();
        prop_assert_eq!(parsed.as_str(), name.as_str());
    }

    #[test]
    fn parse_is_deterministic(reference in "\\PC{0,24}") {
        let first = CharmName::parse(&reference);
        let second = CharmName::parse(&reference);
        prop_assert_eq!(first, second);
    }
}
