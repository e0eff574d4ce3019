//! Facet selection policy
//!
//! Picks one representative facet value per facet type from similarity-scored
//! candidates. Only the top-K shortlist by score is ever considered; within
//! the shortlist a quantity floor prefers well-stocked values, with the
//! highest-scoring candidate as the fallback so a category never goes
//! unrepresented merely because every good visual match is low-stock.

use crate::types::{ScoredFacet, SelectedFacet};

/// Truncate a ranked candidate list to the top-K shortlist.
///
/// `scored` must already be ranked descending by score. K is
/// min(`shortlist_size`, |scored|); values outside the shortlist are never
/// considered for selection regardless of vocabulary size.
pub fn shortlist(scored: &[ScoredFacet], shortlist_size: usize) -> &[ScoredFacet] {
    let k = shortlist_size.min(scored.len());
    &scored[..k]
}

/// Select one facet value for `facet_type` from ranked candidates.
///
/// Scans the top-K shortlist in rank order and returns the first candidate
/// whose quantity strictly exceeds `quantity_floor`. If none qualifies, falls
/// back to the rank-1 candidate regardless of quantity.
///
/// Returns `None` when `scored` is empty: the caller skips the facet type
/// entirely. This is a silent skip, not a failure.
pub fn select(
    facet_type: &str,
    scored: &[ScoredFacet],
    shortlist_size: usize,
    quantity_floor: u32,
) -> Option<SelectedFacet> {
    let shortlist = shortlist(scored, shortlist_size);
    let first = shortlist.first()?;

    let chosen = shortlist
        .iter()
        .find(|facet| facet.quantity > quantity_floor)
        .unwrap_or(first);

    Some(SelectedFacet {
        facet_type: facet_type.to_string(),
        selected_facet: chosen.name.clone(),
        quantity: chosen.quantity,
    })
}
