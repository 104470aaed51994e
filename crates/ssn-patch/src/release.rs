//! Release path resolution
//!
//! The CDN only ships a subset of all possible `(from, to)` patches. Which
//! ones exist follows a fixed publishing pattern, so the chain of hops
//! between two releases can be worked out locally without consulting a
//! manifest. This also covers releases that have not been published yet.
//!
//! Edges into release `to` for regular products:
//!
//! - `to-1 → to`, always
//! - `0 → to` when `to >= 2`
//! - when `to` is a multiple of five: `to-5 → to` (`to >= 10`),
//!   `to-20 → to` (`to >= 25`) and downgrades from `to+1 ..= to+4`
//! - otherwise `to - to%5 → to` when `to >= 7` and `to%5 > 1`
//!
//! Launcher products only ship fresh installs, so their single edge is
//! `-1 → to`.

use crate::error::{PatchError, Result};
use crate::product::Product;
use std::fmt;

/// One direct upgrade between two releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseEdge {
    /// Installed release, `-1` for none
    pub from: i32,
    /// Release after applying the hop
    pub to: i32,
}

impl ReleaseEdge {
    pub const fn new(from: i32, to: i32) -> Self {
        Self { from, to }
    }
}

impl From<(i32, i32)> for ReleaseEdge {
    fn from((from, to): (i32, i32)) -> Self {
        Self::new(from, to)
    }
}

impl fmt::Display for ReleaseEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}to{}", self.from, self.to)
    }
}

/// Releases that have a published patch into `to`, in rule order
pub fn sources_for(product: Product, to: i32) -> Vec<i32> {
    if to < 0 {
        return Vec::new();
    }
    if product.is_launcher() {
        return vec![-1];
    }

    let mut sources = vec![to - 1];
    if to >= 2 {
        sources.push(0);
    }
    if to % 5 == 0 {
        if to >= 10 {
            sources.push(to - 5);
        }
        if to >= 25 {
            sources.push(to - 20);
        }
        sources.extend((1..=4).map(|n| to + n));
    } else if to >= 7 && to % 5 > 1 {
        sources.push(to - to % 5);
    }
    sources
}

/// Chain of hops leading from `from` to `to`
///
/// An empty chain means no route is known. Candidates are tried in
/// ascending order of their source release and the first one that leads
/// back to `from` wins, so the result is not always the shortest chain.
pub fn resolve(product: Product, from: i32, to: i32) -> Result<Vec<ReleaseEdge>> {
    if to <= from {
        return Err(PatchError::InvalidRange { from, to });
    }
    Ok(search(product, from, to))
}

fn search(product: Product, from: i32, to: i32) -> Vec<ReleaseEdge> {
    let mut sources = sources_for(product, to);
    if sources.contains(&from) {
        return vec![ReleaseEdge::new(from, to)];
    }

    sources.retain(|&x| x > from);
    sources.sort_unstable();
    for interim in sources {
        let mut path = search(product, from, interim);
        if !path.is_empty() {
            path.push(ReleaseEdge::new(interim, to));
            return path;
        }
    }
    Vec::new()
}
