use promptgrid_core::CombinationSpace;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn axis(prefix: &'static str) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec((0u8..12).prop_map(move |n| format!("{prefix}{n:02}")), 0..6)
}

proptest! {
    #[test]
    fn yields_each_triple_once_in_prompt_major_order(
        prompts in axis("p"),
        cases in axis("t"),
        models in axis("m"),
    ) {
        let space = CombinationSpace::new(prompts.clone(), cases.clone(), models.clone());
        let p: BTreeSet<_> = prompts.into_iter().collect();
        let t: BTreeSet<_> = cases.into_iter().collect();
        let m: BTreeSet<_> = models.into_iter().collect();

        let got: Vec<_> = space.iter().collect();
        prop_assert_eq!(got.len(), p.len() * t.len() * m.len());
        prop_assert_eq!(space.iter().len(), got.len());

        let distinct: BTreeSet<_> = got.iter().cloned().collect();
        prop_assert_eq!(distinct.len(), got.len());

        // Combination orders by (prompt, test case, model), so sorted == prompt-major
        prop_assert!(got.windows(2).all(|w| w[0] < w[1]));

        for c in &got {
            prop_assert!(p.contains(&c.prompt_id));
            prop_assert!(t.contains(&c.test_case_id));
            prop_assert!(m.contains(&c.model_id));
        }

        // restartable
        let again: Vec<_> = space.iter().collect();
        prop_assert_eq!(again, got);
    }
}
