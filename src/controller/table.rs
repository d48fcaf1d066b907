use std::cmp::Ordering;

use crate::metrics::{parse_outcome_prices, parse_volume};
use crate::types::Market;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Volume,
    Yes,
    No,
}

impl SortKey {
    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Volume => "Volume",
            SortKey::Yes => "Yes Price",
            SortKey::No => "No Price",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn flip(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// Comparison value for a row. Unparseable fields sort as 0.
pub fn sort_value(key: SortKey, market: &Market) -> f64 {
    match key {
        SortKey::Volume => parse_volume(market.volume.as_deref()),
        SortKey::Yes => parse_outcome_prices(market.outcome_prices.as_deref())
            .yes
            .unwrap_or(0.0),
        SortKey::No => parse_outcome_prices(market.outcome_prices.as_deref())
            .no
            .unwrap_or(0.0),
    }
}

/// Sort state for the market table. Starts at volume, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub key: SortKey,
    pub dir: SortDir,
}

impl Default for SortState {
    fn default() -> Self {
        Self { key: SortKey::Volume, dir: SortDir::Desc }
    }
}

impl SortState {
    /// Same key flips direction; a new key starts descending.
    pub fn select(&mut self, key: SortKey) {
        if key == self.key {
            self.dir = self.dir.flip();
        } else {
            self.key = key;
            self.dir = SortDir::Desc;
        }
    }

    /// Stable: rows with equal values keep their fetched order in both directions.
    pub fn sort<'a>(&self, markets: &'a [Market]) -> Vec<&'a Market> {
        let mut keyed: Vec<(f64, &Market)> =
            markets.iter().map(|m| (sort_value(self.key, m), m)).collect();
        keyed.sort_by(|a, b| {
            let ord = a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal);
            match self.dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
        keyed.into_iter().map(|(_, m)| m).collect()
    }

    /// Header arrow for `key`, empty when the table is not sorted by it.
    pub fn indicator(&self, key: SortKey) -> &'static str {
        match (key == self.key, self.dir) {
            (false, _) => "",
            (true, SortDir::Asc) => " ▲",
            (true, SortDir::Desc) => " ▼",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(id: &str, volume: &str, prices: &str) -> Market {
        Market {
            id: id.to_string(),
            question: format!("Question {id}"),
            category: None,
            volume: Some(volume.to_string()),
            outcome_prices: Some(prices.to_string()),
        }
    }

    fn ids(rows: &[&Market]) -> Vec<String> {
        rows.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn starts_at_volume_descending() {
        assert_eq!(SortState::default(), SortState { key: SortKey::Volume, dir: SortDir::Desc });
    }

    #[test]
    fn same_key_flips_direction() {
        let mut s = SortState::default();
        s.select(SortKey::Volume);
        assert_eq!(s.dir, SortDir::Asc);
        s.select(SortKey::Volume);
        assert_eq!(s.dir, SortDir::Desc);
    }

    #[test]
    fn new_key_resets_to_descending() {
        let mut s = SortState::default();
        s.select(SortKey::Volume);
        assert_eq!(s.dir, SortDir::Asc);
        s.select(SortKey::Yes);
        assert_eq!(s, SortState { key: SortKey::Yes, dir: SortDir::Desc });
    }

    #[test]
    fn sorts_by_volume_both_ways() {
        let rows = vec![market("a", "10", "[]"), market("b", "3000", "[]"), market("c", "200", "[]")];
        let mut s = SortState::default();
        assert_eq!(ids(&s.sort(&rows)), vec!["b", "c", "a"]);
        s.select(SortKey::Volume);
        assert_eq!(ids(&s.sort(&rows)), vec!["a", "c", "b"]);
    }

    #[test]
    fn ties_keep_original_order_in_both_directions() {
        let rows = vec![
            market("a", "5", r#"["0.5","0.5"]"#),
            market("b", "9", r#"["0.2","0.8"]"#),
            market("c", "5", r#"["0.5","0.5"]"#),
            market("d", "5", r#"["0.9","0.1"]"#),
        ];
        let mut s = SortState::default();
        assert_eq!(ids(&s.sort(&rows)), vec!["b", "a", "c", "d"]);
        s.select(SortKey::Volume);
        assert_eq!(ids(&s.sort(&rows)), vec!["a", "c", "d", "b"]);

        s.select(SortKey::Yes);
        assert_eq!(ids(&s.sort(&rows)), vec!["d", "a", "c", "b"]);
        s.select(SortKey::Yes);
        assert_eq!(ids(&s.sort(&rows)), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn malformed_fields_sort_as_zero() {
        let rows = vec![
            market("bad", "n/a", "not json"),
            market("neg", "-1", r#"["0.1"]"#),
            market("ok", "1", r#"["0.3","0.7"]"#),
        ];
        let mut s = SortState { key: SortKey::Volume, dir: SortDir::Asc };
        assert_eq!(ids(&s.sort(&rows)), vec!["neg", "bad", "ok"]);

        s.select(SortKey::No);
        // "bad" and "neg" both fall back to 0 and keep their order
        assert_eq!(ids(&s.sort(&rows)), vec!["ok", "bad", "neg"]);
        assert_eq!(sort_value(SortKey::No, &rows[1]), 0.0);
    }

    #[test]
    fn indicator_marks_active_column() {
        let s = SortState::default();
        assert_eq!(s.indicator(SortKey::Volume), " ▼");
        assert_eq!(s.indicator(SortKey::Yes), "");
    }
}
