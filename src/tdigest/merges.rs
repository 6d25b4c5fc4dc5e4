use crate::tdigest::centroids::Centroid;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::iter::Peekable;

/// Merge stream that interleaves existing centroids with a run-length
/// encoding of sorted buffered samples `(value, weight)`. Consecutive samples
/// with the same value become one atomic pile.
///
/// Equal means are not coalesced here: a centroid and a pile at the same mean
/// come out back to back, and the compressor folds them.
pub(crate) struct MergeByMean<'a, I>
where
    I: Iterator<Item = &'a Centroid>,
{
    centroids: Peekable<I>,
    samples: Peekable<std::slice::Iter<'a, (f64, f64)>>,
}

impl<'a, I> MergeByMean<'a, I>
where
    I: Iterator<Item = &'a Centroid>,
{
    /// `samples` must be sorted by value.
    pub(crate) fn new(centroids: I, samples: &'a [(f64, f64)]) -> Self {
        debug_assert!(samples.windows(2).all(|w| w[0].0 <= w[1].0));
        Self {
            centroids: centroids.peekable(),
            samples: samples.iter().peekable(),
        }
    }

    /// Drain a run of identical sample values into one pile.
    fn next_sample_run(&mut self) -> Option<Centroid> {
        let &(value, mut weight) = self.samples.next()?;
        while let Some(&&(v, w)) = self.samples.peek() {
            if v != value {
                break;
            }
            weight += w;
            self.samples.next();
        }
        Some(Centroid::new_atomic(value, weight))
    }
}

impl<'a, I> Iterator for MergeByMean<'a, I>
where
    I: Iterator<Item = &'a Centroid>,
{
    type Item = Centroid;

    fn next(&mut self) -> Option<Self::Item> {
        let take_centroid = match (self.centroids.peek(), self.samples.peek()) {
            (Some(c), Some(&&(v, _))) => c.mean() <= v,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        if take_centroid {
            self.centroids.next().copied()
        } else {
            self.next_sample_run()
        }
    }
}

/// k-way merge of mean-sorted centroid runs, coalescing equal means.
///
/// Heads sharing a mean become one centroid at exactly that mean carrying the
/// summed weight; it is atomic iff every contributor was atomic.
pub(crate) struct KWayCentroidMerge<'a> {
    runs: Vec<&'a [Centroid]>,
    pos: Vec<usize>,
    heap: BinaryHeap<(Reverse<OrderedFloat<f64>>, Reverse<usize>)>, // (mean, run_idx)
}

impl<'a> KWayCentroidMerge<'a> {
    pub(crate) fn new(runs: Vec<&'a [Centroid]>) -> Self {
        let mut heap = BinaryHeap::with_capacity(runs.len());
        let pos = vec![0; runs.len()];
        for (i, r) in runs.iter().enumerate() {
            if let Some(c) = r.first() {
                heap.push((Reverse(OrderedFloat::from(c.mean())), Reverse(i)));
            }
        }
        Self { runs, pos, heap }
    }

    /// Consume the head of `run_idx` and queue its successor.
    #[inline]
    fn advance(&mut self, run_idx: usize) -> Centroid {
        let p = self.pos[run_idx];
        let r = self.runs[run_idx];
        let c = r[p];
        self.pos[run_idx] = p + 1;
        if let Some(next) = r.get(p + 1) {
            self.heap
                .push((Reverse(OrderedFloat::from(next.mean())), Reverse(run_idx)));
        }
        c
    }
}

impl<'a> Iterator for KWayCentroidMerge<'a> {
    type Item = Centroid;

    fn next(&mut self) -> Option<Self::Item> {
        let (Reverse(min_mean), Reverse(first_run)) = self.heap.pop()?;
        let mut out = self.advance(first_run);
        debug_assert!(out.mean() == min_mean.into_inner());

        while let Some(&(Reverse(m), Reverse(run_idx))) = self.heap.peek() {
            if m != min_mean {
                break;
            }
            self.heap.pop();
            let c = self.advance(run_idx);
            out = Centroid::with_kind(
                min_mean.into_inner(),
                out.weight() + c.weight(),
                out.is_atomic() && c.is_atomic(),
            );
        }
        Some(out)
    }
}
