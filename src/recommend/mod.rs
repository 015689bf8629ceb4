//! Recommendation assembly.
//!
//! Turns the index's ordered matches into display-ready [`PaperRecord`]s.
//! Each record keeps its true similarity rank, then the list is shuffled so
//! the most related paper is not always drawn at the same angle of the
//! radial graph. Radius carries relatedness, angle carries nothing.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::models::{
    Match, PaperRecord, META_INSTITUTION, META_TITLE, META_URL, NO_URL, UNKNOWN_INSTITUTION,
    UNTITLED,
};

/// Build ranked records from matches in index order.
///
/// # Arguments
/// * `matches` - Matches ordered by decreasing similarity
/// * `label_fn` - Label lookup taking `(institution, id)`; `None` is a miss
///
/// # Returns
/// One record per match, with `rank` equal to the match's position (0 is the
/// most related). The returned list is still in rank order.
pub fn assemble<F>(matches: Vec<Match>, label_fn: F) -> Vec<PaperRecord>
where
    F: Fn(&str, &str) -> Option<String>,
{
    matches
        .into_iter()
        .enumerate()
        .map(|(rank, m)| {
            let institution = m
                .metadata_str(META_INSTITUTION)
                .unwrap_or(UNKNOWN_INSTITUTION)
                .to_string();
            let id = m.label_key().to_string();
            let class_label = label_fn(&institution, &id);

            PaperRecord {
                title: m.metadata_str(META_TITLE).unwrap_or(UNTITLED).to_string(),
                url: m.metadata_str(META_URL).unwrap_or(NO_URL).to_string(),
                institution,
                rank,
                score: m.score,
                class_label,
                id,
            }
        })
        .collect()
}

/// Shuffle records into a random display order. Ranks are left untouched.
pub fn shuffle_for_display<R: Rng + ?Sized>(records: &mut [PaperRecord], rng: &mut R) {
    records.shuffle(rng);
    debug!("Shuffled {} records for display", records.len());
}

/// [`assemble`] followed by [`shuffle_for_display`].
pub fn assemble_shuffled<F, R>(matches: Vec<Match>, label_fn: F, rng: &mut R) -> Vec<PaperRecord>
where
    F: Fn(&str, &str) -> Option<String>,
    R: Rng + ?Sized,
{
    let mut records = assemble(matches, label_fn);
    shuffle_for_display(&mut records, rng);
    records
}

/// Records in rank order, regardless of display order.
pub fn by_rank(records: &[PaperRecord]) -> Vec<&PaperRecord> {
    let mut sorted: Vec<&PaperRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.rank);
    sorted
}
