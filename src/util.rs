pub trait IterSelections<T> {
    /// Get all selections of `k` elements from this collection whose weights sum up to exactly
    /// `target`.
    ///
    /// Selections are returned in lexicographic order of the element positions, each selection
    /// holding the borrowed elements in collection order. The result is empty if k == 0 or k > n.
    ///
    /// All weights must be positive. This allows to prune each partial selection as soon as the
    /// remaining elements (of weight >= 1 each) cannot fit into the target anymore, so the number of
    /// visited partial selections stays far below (n choose k) for small targets.
    fn selections_with_sum<W>(&self, k: usize, target: usize, weight: W) -> Vec<Vec<&T>>
    where
        W: Fn(&T) -> usize;
}

impl<T> IterSelections<T> for [T] {
    fn selections_with_sum<W>(&self, k: usize, target: usize, weight: W) -> Vec<Vec<&T>>
    where
        W: Fn(&T) -> usize,
    {
        let mut result = Vec::new();
        if k == 0 || k > self.len() {
            return result;
        }
        let weights: Vec<usize> = self.iter().map(|x| weight(x)).collect();
        let mut index = Vec::with_capacity(k);
        collect_selections(&weights, k, target, 0, 0, &mut index, &mut |selection| {
            result.push(selection.iter().map(|i| &self[*i]).collect())
        });
        result
    }
}

/// Depth-first enumeration of index selections, extending `index` with positions >= `start`
fn collect_selections<F>(
    weights: &[usize],
    k: usize,
    target: usize,
    start: usize,
    sum: usize,
    index: &mut Vec<usize>,
    emit: &mut F,
) where
    F: FnMut(&[usize]),
{
    if index.len() == k {
        if sum == target {
            emit(index);
        }
        return;
    }
    let missing_after_this = k - index.len() - 1;
    for i in start..weights.len() {
        // not enough elements left to complete the selection
        if weights.len() - i <= missing_after_this {
            break;
        }
        if sum + weights[i] + missing_after_this > target {
            continue;
        }
        index.push(i);
        collect_selections(weights, k, target, i + 1, sum + weights[i], index, emit);
        index.pop();
    }
}
