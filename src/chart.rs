//! Chord charts: whitespace-separated chord symbols with optional `|` bar lines.
//!
//! Tokens that do not parse as chords are dropped from the structured chart;
//! bar lines survive when a chart is re-serialized so the text round-trips.

use std::ops::Range;

use crate::chord::{ChordSymbol, parse_chord_symbol};

/// A whitespace-delimited piece of text with its byte range in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken<'a> {
    pub text: &'a str,
    pub range: Range<usize>,
}

/// One parsed chord in a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartToken {
    pub chord: ChordSymbol,
    pub raw: String,
    pub range: Range<usize>,
}

/// An ordered chord progression. Order is bar order and drives chord advancement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChordChart {
    pub text: String,
    pub tokens: Vec<ChartToken>,
}

/// Split text on whitespace, keeping byte ranges for highlighting.
pub fn tokenize(text: &str) -> Vec<RawToken<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(RawToken {
                    text: &text[s..i],
                    range: s..i,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(RawToken {
            text: &text[s..],
            range: s..text.len(),
        });
    }
    tokens
}

/// Strip surrounding characters that cannot belong to a chord symbol
/// (anything but alphanumerics, `#` and `/`).
pub fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| !(c.is_alphanumeric() || c == '#' || c == '/'))
}

fn is_bar_line(token: &str) -> bool {
    token == "|"
}

impl ChordChart {
    pub fn parse(text: &str) -> Self {
        let tokens = tokenize(text)
            .into_iter()
            .filter(|t| !is_bar_line(t.text))
            .filter_map(|t| {
                let chord = parse_chord_symbol(clean_token(t.text))?;
                Some(ChartToken {
                    chord,
                    raw: t.text.to_string(),
                    range: t.range,
                })
            })
            .collect();
        Self {
            text: text.to_string(),
            tokens,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Chord at `index`, wrapping around the chart.
    pub fn chord_at(&self, index: usize) -> Option<&ChordSymbol> {
        if self.tokens.is_empty() {
            return None;
        }
        Some(&self.tokens[index % self.tokens.len()].chord)
    }

    /// Source range of the chord at `index` (wrapping), for highlighting.
    pub fn range_at(&self, index: usize) -> Option<Range<usize>> {
        if self.tokens.is_empty() {
            return None;
        }
        Some(self.tokens[index % self.tokens.len()].range.clone())
    }
}

/// Pull a chord chart out of arbitrary text: keep bar lines and tokens that
/// parse as chords (in cleaned form), joined by single spaces.
pub fn extract_chord_chart(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .filter_map(|t| {
            if is_bar_line(t.text) {
                return Some(t.text);
            }
            let cleaned = clean_token(t.text);
            parse_chord_symbol(cleaned).map(|_| cleaned)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::PitchClass;

    #[test]
    fn test_tokenize_ranges() {
        let tokens = tokenize("  Em  C\tG ");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["Em", "C", "G"]);
        assert_eq!(tokens[0].range, 2..4);
        assert_eq!(tokens[1].range, 6..7);
        assert_eq!(tokens[2].range, 8..9);
    }

    #[test]
    fn test_clean_token() {
        assert_eq!(clean_token("(Em)"), "Em");
        assert_eq!(clean_token("D/F#,"), "D/F#");
        assert_eq!(clean_token("\"Bb\""), "Bb");
        assert_eq!(clean_token("..."), "");
    }

    #[test]
    fn test_chart_skips_bar_lines_and_junk() {
        let chart = ChordChart::parse("| Em C | G xyz D/F# |");
        let roots: Vec<PitchClass> = chart.tokens.iter().map(|t| t.chord.root).collect();
        assert_eq!(
            roots,
            vec![PitchClass::E, PitchClass::C, PitchClass::G, PitchClass::D]
        );
        assert_eq!(chart.tokens[3].chord.bass, Some(PitchClass::FSharp));
        assert_eq!(chart.tokens[1].range, 5..6);
    }

    #[test]
    fn test_chart_wraps() {
        let chart = ChordChart::parse("Em C");
        assert_eq!(chart.chord_at(2).map(|c| c.root), Some(PitchClass::E));
        assert_eq!(chart.chord_at(3).map(|c| c.root), Some(PitchClass::C));
        assert_eq!(ChordChart::parse("").chord_at(0), None);
    }

    #[test]
    fn test_extract_from_prose() {
        let text = "Verse: (Em) then C, hold it... | G D/F# | xyz";
        assert_eq!(extract_chord_chart(text), "Em C | G D/F# |");
    }

    #[test]
    fn test_extract_round_trip() {
        let chart = "Em   C  G\nD";
        assert_eq!(extract_chord_chart(chart), "Em C G D");
        assert_eq!(extract_chord_chart(&extract_chord_chart(chart)), "Em C G D");
    }
}
