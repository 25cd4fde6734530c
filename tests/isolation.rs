//! isolation property: a select reply never exposes another tenant's keys

mod common;

use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig { cases: 12, .. ProptestConfig::default() })]

    #[test]
    fn selects_never_leak_across_prefixes(trace in common::traces()) {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcomes = skv::execute(&trace, dir.path()).expect("trace execution");
        if let Err(violation) = skv::check_isolation(&outcomes) {
            prop_assert!(false, "{}", violation);
        }
    }
}
