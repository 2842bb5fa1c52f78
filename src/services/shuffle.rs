// src/services/shuffle.rs

use std::cmp::Ordering;

use rand::Rng;

/// Reorders `items` by sorting them with a comparator that answers at random.
///
/// This reproduces the ordering learners have always seen for shuffled
/// quizzes: a binary insertion sort driven by a coin-flip comparator. The
/// resulting permutation distribution is NOT uniform; items tend to stay
/// near their original position.
pub fn comparator_shuffle<T, R: Rng>(items: &mut [T], rng: &mut R) {
    let mut coin_flip = |_: &T, _: &T| {
        if rng.gen_range(-0.5f64..0.5) < 0.0 {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    };
    binary_insertion_sort(items, &mut coin_flip);
}

/// Binary insertion sort that tolerates inconsistent comparators.
fn binary_insertion_sort<T, F>(items: &mut [T], compare: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let (mut left, mut right) = (0, i);
        while left < right {
            let mid = left + ((right - left) >> 1);
            if compare(&items[i], &items[mid]) == Ordering::Less {
                right = mid;
            } else {
                left = mid + 1;
            }
        }
        items[left..=i].rotate_right(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_shuffle_keeps_every_item() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut items: Vec<u32> = (0..20).collect();

        comparator_shuffle(&mut items, &mut rng);

        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<u32>>());
    }

    #[test]
    fn test_shuffle_is_reproducible_with_same_seed() {
        let mut first: Vec<u32> = (0..10).collect();
        let mut second = first.clone();

        comparator_shuffle(&mut first, &mut StdRng::seed_from_u64(42));
        comparator_shuffle(&mut second, &mut StdRng::seed_from_u64(42));

        assert_eq!(first, second);
    }

    #[test]
    fn test_shuffle_actually_moves_items() {
        let mut rng = StdRng::seed_from_u64(1);
        let original: Vec<u32> = (0..10).collect();
        let moved = (0..50).any(|_| {
            let mut items = original.clone();
            comparator_shuffle(&mut items, &mut rng);
            items != original
        });
        assert!(moved);
    }

    #[test]
    fn test_tiny_inputs() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut empty: Vec<u8> = vec![];
        comparator_shuffle(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut one = vec![9];
        comparator_shuffle(&mut one, &mut rng);
        assert_eq!(one, vec![9]);
    }

    #[test]
    fn test_insertion_sort_with_consistent_comparator() {
        let mut items = vec![5, 1, 4, 2, 3];
        binary_insertion_sort(&mut items, &mut |a: &i32, b: &i32| a.cmp(b));
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_distribution_is_biased() {
        // With a uniform shuffle each of the 6 orders of 3 items would show up
        // about 1/6 of the time; the coin-flip sort favours some orders.
        let mut rng = StdRng::seed_from_u64(99);
        let trials = 6000;
        let mut identity = 0;
        for _ in 0..trials {
            let mut items = [0, 1, 2];
            comparator_shuffle(&mut items, &mut rng);
            if items == [0, 1, 2] {
                identity += 1;
            }
        }
        // Binary insertion on 3 items keeps the original order with p = 1/4.
        assert!(identity > trials / 5, "identity order seen {identity} times");
    }
}
