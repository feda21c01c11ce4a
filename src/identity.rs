/// Catalog identity of the `k`-th instance of a class, `k` counted from one
///
/// Identities are unique across the whole catalog without a shared counter:
/// each class owns the half-open range
/// `(ordinal * n_class, (ordinal + 1) * n_class]`.
pub const fn identity(class_ordinal: usize, k: usize, n_class: usize) -> u32 {
    debug_assert!(k >= 1 && k <= n_class);
    (class_ordinal * n_class + k) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_class::SourceClass;

    use std::collections::HashSet;

    #[test]
    fn first_class_counts_from_one() {
        assert_eq!(identity(0, 1, 500), 1);
        assert_eq!(identity(0, 500, 500), 500);
    }

    #[test]
    fn offsets_follow_class_ordinal() {
        assert_eq!(identity(2, 1, 500), 1001);
        assert_eq!(identity(4, 17, 20), 97);
    }

    #[test]
    fn unique_across_all_classes() {
        let n_class = 23;
        let ids: HashSet<_> = SourceClass::ALL
            .iter()
            .flat_map(|class| {
                (1..=n_class).map(move |k| identity(class.ordinal(), k, n_class))
            })
            .collect();
        assert_eq!(ids.len(), SourceClass::ALL.len() * n_class);
    }
}
