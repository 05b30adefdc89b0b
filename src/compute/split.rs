//! Axon/dendrite split by synapse segregation
//!
//! Every edge of the skeleton is a candidate cut. A cut is scored by the
//! segregation index: one minus the size-weighted synapse-type entropy of the
//! two sides, relative to the entropy of the whole cell. The best cut wins and
//! the side with the larger presynaptic fraction is labeled axon.
//!
//! A split is only reported when both synapse kinds are present, the best
//! cut separates them at all, and its quality reaches the threshold. Anything
//! less is "no split", never an error.

use super::skeleton::Skeleton;
use crate::service::Synapse;

/// Quality reported when the evidence cannot support any split
pub const NO_EVIDENCE_QUALITY: f64 = -1.0;

/// Outcome of the split decision
#[derive(Clone, Debug, PartialEq)]
pub struct AxonSplit {
    /// Sorted axon vertex indices; empty means "no split"
    pub is_axon: Vec<usize>,
    /// Segregation index of the best cut, or [`NO_EVIDENCE_QUALITY`]
    pub quality: f64,
}

impl AxonSplit {
    fn none(quality: f64) -> Self {
        Self {
            is_axon: Vec::new(),
            quality,
        }
    }

    /// Whether an axon was labeled
    pub fn is_split(&self) -> bool {
        !self.is_axon.is_empty()
    }
}

/// Decide the axon split for a skeleton given its synapses
pub fn split_axon(
    skeleton: &Skeleton,
    pre_syn: &[Synapse],
    post_syn: &[Synapse],
    threshold: f64,
) -> AxonSplit {
    let n = skeleton.len();
    let mut pre = vec![0u64; n];
    let mut post = vec![0u64; n];
    for s in pre_syn.iter().filter(|s| s.vertex < n) {
        pre[s.vertex] += 1;
    }
    for s in post_syn.iter().filter(|s| s.vertex < n) {
        post[s.vertex] += 1;
    }

    let total_pre: u64 = pre.iter().sum();
    let total_post: u64 = post.iter().sum();
    if total_pre == 0 || total_post == 0 {
        return AxonSplit::none(NO_EVIDENCE_QUALITY);
    }

    // Subtree synapse counts, children before parents
    let mut sub_pre = pre;
    let mut sub_post = post;
    for &v in skeleton.topological_order().iter().rev() {
        if let Some(p) = skeleton.parents[v] {
            sub_pre[p] += sub_pre[v];
            sub_post[p] += sub_post[v];
        }
    }

    let total = (total_pre + total_post) as f64;
    let h_total = entropy(total_pre as f64 / total);

    let mut best: Option<(usize, f64)> = None;
    for v in (0..n).filter(|&v| skeleton.parents[v].is_some()) {
        let inside = (sub_pre[v], sub_post[v]);
        let outside = (total_pre - sub_pre[v], total_post - sub_post[v]);
        let h_split = weighted_entropy(inside, total) + weighted_entropy(outside, total);
        let quality = 1.0 - h_split / h_total;
        if best.is_none_or(|(_, q)| quality > q) {
            best = Some((v, quality));
        }
    }

    let Some((cut, quality)) = best else {
        return AxonSplit::none(0.0);
    };
    if quality <= 0.0 || quality < threshold {
        return AxonSplit::none(quality);
    }

    let subtree = skeleton.subtree(cut);
    let inside_frac = pre_fraction(sub_pre[cut], sub_post[cut]);
    let outside_frac = pre_fraction(total_pre - sub_pre[cut], total_post - sub_post[cut]);
    let is_axon = if inside_frac >= outside_frac {
        subtree
    } else {
        let mut in_subtree = vec![false; n];
        for &v in &subtree {
            in_subtree[v] = true;
        }
        (0..n).filter(|&v| !in_subtree[v]).collect()
    };

    AxonSplit { is_axon, quality }
}

/// Binary entropy in nats
fn entropy(p: f64) -> f64 {
    let term = |x: f64| if x > 0.0 { -x * x.ln() } else { 0.0 };
    term(p) + term(1.0 - p)
}

fn weighted_entropy((pre, post): (u64, u64), total: f64) -> f64 {
    let n = (pre + post) as f64;
    if n == 0.0 {
        return 0.0;
    }
    (n / total) * entropy(pre as f64 / n)
}

fn pre_fraction(pre: u64, post: u64) -> f64 {
    let n = pre + post;
    if n == 0 { 0.0 } else { pre as f64 / n as f64 }
}
