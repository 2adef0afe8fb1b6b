use crate::model::Combination;

/// The prompt × test case × model product.
///
/// Each axis is sorted and deduplicated on construction; iteration is
/// prompt-major, then test case, then model, and produces triples on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinationSpace {
    prompts: Vec<String>,
    test_cases: Vec<String>,
    models: Vec<String>,
}

fn normalized(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids.dedup();
    ids
}

impl CombinationSpace {
    pub fn new(prompts: Vec<String>, test_cases: Vec<String>, models: Vec<String>) -> Self {
        Self {
            prompts: normalized(prompts),
            test_cases: normalized(test_cases),
            models: normalized(models),
        }
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn test_cases(&self) -> &[String] {
        &self.test_cases
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.prompts.len() * self.test_cases.len() * self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Combinations<'_> {
        Combinations {
            space: self,
            next: 0,
            end: self.len(),
        }
    }

    fn at(&self, idx: usize) -> Combination {
        let per_prompt = self.test_cases.len() * self.models.len();
        let m = self.models.len();
        Combination::new(
            &self.prompts[idx / per_prompt],
            &self.test_cases[(idx / m) % self.test_cases.len()],
            &self.models[idx % m],
        )
    }
}

/// Lazy iterator over a [`CombinationSpace`].
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    space: &'a CombinationSpace,
    next: usize,
    end: usize,
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Combination> {
        if self.next >= self.end {
            return None;
        }
        let combo = self.space.at(self.next);
        self.next += 1;
        Some(combo)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Combinations<'_> {}

impl<'a> IntoIterator for &'a CombinationSpace {
    type Item = Combination;
    type IntoIter = Combinations<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prompt_major_sorted_order() {
        let space = CombinationSpace::new(ids(&["B.md", "A.md"]), ids(&["Y.md", "X.md"]), ids(&["m2", "m1"]));
        let got: Vec<String> = space.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            got,
            vec![
                "A.md × X.md × m1",
                "A.md × X.md × m2",
                "A.md × Y.md × m1",
                "A.md × Y.md × m2",
                "B.md × X.md × m1",
                "B.md × X.md × m2",
                "B.md × Y.md × m1",
                "B.md × Y.md × m2",
            ]
        );
        assert_eq!(space.iter().len(), 8);
    }

    #[test]
    fn empty_axis_yields_nothing() {
        let space = CombinationSpace::new(ids(&["A.md"]), vec![], ids(&["m"]));
        assert!(space.is_empty());
        assert_eq!(space.iter().next(), None);
    }

    #[test]
    fn iteration_is_restartable() {
        let space = CombinationSpace::new(ids(&["A.md"]), ids(&["X.md"]), ids(&["m", "m"]));
        assert_eq!(space.len(), 1);
        assert_eq!(space.iter().count(), 1);
        assert_eq!(space.iter().count(), 1);
    }
}
