//! # Bulk element-set reader
//!
//! Scans text line by line and keeps every consecutive pair
//! `1 NNNNN...` / `2 NNNNN...` whose satellite numbers agree. Title lines (three-line
//! format), blank lines and malformed pairs are skipped; nothing is reported to the caller
//! apart from the shorter result.

use std::{collections::HashMap, fs, path::Path, sync::LazyLock};

use hifitime::Epoch;
use log::debug;
use regex::Regex;

use crate::{element_set::ElementSet, tlefit_errors::TleFitError};

static LINE1: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^1 [ 0-9A-Za-z]{5}").ok());
static LINE2: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^2 [ 0-9A-Za-z]{5}").ok());

fn matches(re: &LazyLock<Option<Regex>>, line: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(line))
}

fn same_object(line1: &str, line2: &str) -> bool {
    matches!((line1.get(1..7), line2.get(1..7)), (Some(a), Some(b)) if a == b)
}

/// Read every valid element set in `text`, in input order.
pub fn read_element_sets(text: &str) -> Vec<ElementSet> {
    let lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();
    let mut sets = Vec::with_capacity(lines.len() / 2);

    let mut i = 0;
    while i + 1 < lines.len() {
        let (line1, line2) = (lines[i], lines[i + 1]);
        if matches(&LINE1, line1) && matches(&LINE2, line2) && same_object(line1, line2) {
            match ElementSet::parse(line1, line2) {
                Ok(set) => {
                    sets.push(set);
                    i += 2;
                    continue;
                }
                Err(e) => debug!("skipping element set at line {}: {e}", i + 1),
            }
        }
        i += 1;
    }
    sets
}

/// Read every valid element set of a file.
pub fn read_element_sets_from_file(path: impl AsRef<Path>) -> Result<Vec<ElementSet>, TleFitError> {
    Ok(read_element_sets(&fs::read_to_string(path)?))
}

/// Group element sets by object id, keeping the input order within each group.
pub fn map_by_object_id(sets: Vec<ElementSet>) -> HashMap<String, Vec<ElementSet>> {
    let mut map: HashMap<String, Vec<ElementSet>> = HashMap::new();
    for set in sets {
        map.entry(set.object_id().to_string()).or_default().push(set);
    }
    map
}

/// Drop element sets whose epoch equals the one of the set just before them.
pub fn clean_duplicates(sets: Vec<ElementSet>) -> Vec<ElementSet> {
    let mut out: Vec<ElementSet> = Vec::with_capacity(sets.len());
    for set in sets {
        if out.last().is_none_or(|prev| prev.epoch() != set.epoch()) {
            out.push(set);
        }
    }
    out
}

/// Keep the element sets whose epoch lies in `[start, end]`, in input order.
pub fn filter_by_epoch(sets: Vec<ElementSet>, start: Epoch, end: Epoch) -> Vec<ElementSet> {
    sets.into_iter()
        .filter(|set| start <= set.epoch() && set.epoch() <= end)
        .collect()
}

#[cfg(test)]
mod test_tle_reader {
    use super::*;

    const TEXT: &str = "\
ISS (ZARYA)
1 25544U 98067A   20032.50000000  .00001264  00000-0  31069-4 0  9993
2 25544  51.6440 300.1215 0005330 172.9516 293.3211 15.49168571211289
1 25544U 98067A   20032.50000000  .00001264  00000-0  31069-4 0  9993
2 25544  51.6440 300.1215 0005330 172.9516 293.3211 15.49168571211289
1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990
2 41086 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040
1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990
2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040
";

    #[test]
    fn test_read_skips_mismatched_ids() {
        let sets = read_element_sets(TEXT);
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[2].object_id(), "41085");
    }

    #[test]
    fn test_map_and_clean() {
        let sets = read_element_sets(TEXT);
        let map = map_by_object_id(sets.clone());
        assert_eq!(map["25544"].len(), 2);
        assert_eq!(map["41085"].len(), 1);

        let cleaned = clean_duplicates(sets);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn test_filter_by_epoch() {
        let sets = read_element_sets(TEXT);
        let iss = sets[0].epoch();
        let sentinel = sets[2].epoch();

        assert_eq!(filter_by_epoch(sets.clone(), iss, iss).len(), 2);
        let only_2019 = filter_by_epoch(sets.clone(), sentinel, sentinel);
        assert_eq!(only_2019.len(), 1);
        assert_eq!(only_2019[0].object_id(), "41085");
        assert_eq!(filter_by_epoch(sets.clone(), sentinel, iss).len(), 3);
        assert!(filter_by_epoch(sets, iss, sentinel).is_empty());
    }
}
