use crate::document::Location;

/// Indices of the records that still need geocoding, in file order.
/// A record qualifies when any of `lat`, `lon` or `country` is missing,
/// unless `country` already marks a failed lookup.
pub fn select(locations: &[Location]) -> Vec<usize> {
    locations
        .iter()
        .enumerate()
        .filter(|(_, loc)| !loc.is_complete())
        .map(|(i, _)| i)
        .collect()
}
