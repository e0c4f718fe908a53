use serde::{Deserialize, Serialize};
use xi_rope::Rope;

use super::slice::safe_substr;

/// A tag source range: the byte range `[start, end)` covered by one tag's
/// source syntax, as recorded by the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    /// Inclusive start byte offset.
    pub start: i64,
    /// Exclusive end byte offset.
    pub end: i64,
}

impl SourceRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Returns the width in bytes. Negative widths saturate to zero.
    #[must_use]
    pub fn len(self) -> i64 {
        (self.end - self.start).max(0)
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Shifts both bounds by `amount`.
    pub fn offset(&mut self, amount: i64) {
        self.start += amount;
        self.end += amount;
    }

    pub fn substr(self, source: &Rope) -> String {
        safe_substr(source, self.start, self.len())
    }
}

/// A document source range: where a node's complete subtree came from in
/// the source text, together with the widths of its opening and closing
/// syntax.
///
/// Either bound may be unknown. Consumers must read `None` as "no known
/// provenance", never as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomSourceRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
    /// Width of the opening syntax, when known.
    pub open_width: Option<i64>,
    /// Width of the closing syntax, when known.
    pub close_width: Option<i64>,
    /// Whitespace preceding the node that belongs to it.
    pub leading_ws: i64,
    /// Whitespace following the node that belongs to it.
    pub trailing_ws: i64,
}

impl DomSourceRange {
    pub fn new(
        start: Option<i64>,
        end: Option<i64>,
        open_width: Option<i64>,
        close_width: Option<i64>,
    ) -> Self {
        Self {
            start,
            end,
            open_width,
            close_width,
            leading_ws: 0,
            trailing_ws: 0,
        }
    }

    /// A span with both bounds known and no tag widths.
    pub fn bounds(start: i64, end: i64) -> Self {
        Self::new(Some(start), Some(end), None, None)
    }

    /// Builds a span from a tag source range, treating the whole tsr as
    /// opening syntax.
    pub fn from_tsr(tsr: SourceRange) -> Self {
        Self::new(Some(tsr.start), Some(tsr.end), Some(tsr.len()), Some(0))
    }

    /// Both bounds are set and non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s >= 0 && e >= 0)
    }

    /// Valid bounds plus known, non-negative tag widths that fit inside them.
    #[must_use]
    pub fn has_valid_tag_widths(&self) -> bool {
        let (Some(start), Some(end), Some(open), Some(close)) =
            (self.start, self.end, self.open_width, self.close_width)
        else {
            return false;
        };
        start >= 0 && open >= 0 && close >= 0 && start + open <= end - close
    }

    /// First offset after the opening syntax.
    pub fn inner_start(&self) -> Option<i64> {
        Some(self.start? + self.open_width.unwrap_or(0))
    }

    /// First offset of the closing syntax.
    pub fn inner_end(&self) -> Option<i64> {
        Some(self.end? - self.close_width.unwrap_or(0))
    }

    pub fn inner_len(&self) -> Option<i64> {
        Some(self.inner_end()? - self.inner_start()?)
    }

    pub fn inner_range(&self) -> Option<SourceRange> {
        Some(SourceRange::new(self.inner_start()?, self.inner_end()?))
    }

    pub fn open_range(&self) -> Option<SourceRange> {
        Some(SourceRange::new(self.start?, self.inner_start()?))
    }

    pub fn close_range(&self) -> Option<SourceRange> {
        Some(SourceRange::new(self.inner_end()?, self.end?))
    }

    /// The full `[start, end)` slice, or `None` when a bound is unknown.
    pub fn substr(&self, source: &Rope) -> Option<String> {
        let (start, end) = (self.start?, self.end?);
        Some(safe_substr(source, start, end - start))
    }

    pub fn inner_substr(&self, source: &Rope) -> Option<String> {
        self.inner_range().map(|r| r.substr(source))
    }

    pub fn open_substr(&self, source: &Rope) -> Option<String> {
        self.open_range().map(|r| r.substr(source))
    }

    pub fn close_substr(&self, source: &Rope) -> Option<String> {
        self.close_range().map(|r| r.substr(source))
    }

    /// Shifts the known bounds by `amount`.
    pub fn offset(&mut self, amount: i64) {
        if let Some(start) = self.start.as_mut() {
            *start += amount;
        }
        if let Some(end) = self.end.as_mut() {
            *end += amount;
        }
    }

    /// Compact `[start, end, open, close]` form; whitespace widths are
    /// appended only when either is non-zero.
    pub fn to_json_array(&self) -> Vec<Option<i64>> {
        let mut out = vec![self.start, self.end, self.open_width, self.close_width];
        if self.leading_ws != 0 || self.trailing_ws != 0 {
            out.push(Some(self.leading_ws));
            out.push(Some(self.trailing_ws));
        }
        out
    }

    /// Inverse of [`Self::to_json_array`]. Missing entries read as unknown.
    pub fn from_json_array(values: &[Option<i64>]) -> Self {
        let at = |i: usize| values.get(i).copied().flatten();
        Self {
            start: at(0),
            end: at(1),
            open_width: at(2),
            close_width: at(3),
            leading_ws: at(4).unwrap_or(0),
            trailing_ws: at(5).unwrap_or(0),
        }
    }
}

impl Serialize for DomSourceRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DomSourceRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Option<i64>>::deserialize(deserializer)?;
        Ok(Self::from_json_array(&values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(DomSourceRange::bounds(0, 10), true)]
    #[case(DomSourceRange::bounds(-1, 10), false)]
    #[case(DomSourceRange::new(Some(3), None, None, None), false)]
    #[case(DomSourceRange::default(), false)]
    fn validity(#[case] dsr: DomSourceRange, #[case] valid: bool) {
        assert_eq!(dsr.is_valid(), valid);
    }

    #[rstest]
    #[case(DomSourceRange::new(Some(0), Some(10), Some(2), Some(2)), true)]
    #[case(DomSourceRange::new(Some(0), Some(3), Some(2), Some(2)), false)]
    #[case(DomSourceRange::new(Some(0), Some(10), None, Some(2)), false)]
    fn tag_widths(#[case] dsr: DomSourceRange, #[case] valid: bool) {
        assert_eq!(dsr.has_valid_tag_widths(), valid);
    }

    #[test]
    fn inner_and_outer_slices() {
        let source = Rope::from("''bold'' rest");
        let dsr = DomSourceRange::new(Some(0), Some(8), Some(2), Some(2));
        assert_eq!(dsr.substr(&source).as_deref(), Some("''bold''"));
        assert_eq!(dsr.inner_substr(&source).as_deref(), Some("bold"));
        assert_eq!(dsr.open_substr(&source).as_deref(), Some("''"));
        assert_eq!(dsr.close_substr(&source).as_deref(), Some("''"));
        assert_eq!(dsr.inner_len(), Some(4));
    }

    #[test]
    fn unknown_bounds_have_no_slices() {
        let source = Rope::from("abc");
        let dsr = DomSourceRange::new(None, Some(2), None, None);
        assert_eq!(dsr.substr(&source), None);
        assert_eq!(dsr.inner_range(), None);
    }

    #[test]
    fn offset_moves_known_bounds_only() {
        let mut dsr = DomSourceRange::new(Some(4), None, Some(1), None);
        dsr.offset(3);
        assert_eq!(dsr.start, Some(7));
        assert_eq!(dsr.end, None);
    }

    #[test]
    fn from_tsr_treats_tag_as_opening_syntax() {
        let dsr = DomSourceRange::from_tsr(SourceRange::new(5, 15));
        assert_eq!(dsr, DomSourceRange::new(Some(5), Some(15), Some(10), Some(0)));
    }

    #[test]
    fn json_array_form() {
        let mut dsr = DomSourceRange::new(Some(1), Some(9), None, Some(0));
        assert_eq!(dsr.to_json_array(), vec![Some(1), Some(9), None, Some(0)]);
        dsr.leading_ws = 2;
        let values = dsr.to_json_array();
        assert_eq!(values.len(), 6);
        assert_eq!(DomSourceRange::from_json_array(&values), dsr);
    }
}
