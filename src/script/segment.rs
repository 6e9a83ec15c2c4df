use serde::{Deserialize, Serialize};

use crate::config::SegmentPolicy;

/// One narration segment of a script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position; playback order.
    pub index: usize,
    /// Trimmed, truncated narration text. May be empty for a bare label.
    pub text: String,
}

/// Split `script` into ordered segments.
///
/// Never fails: a script without markers becomes one segment, a fragment without a closing marker
/// keeps its raw (truncated) text, and fragments beyond `policy.max_segments` are dropped.
pub fn segment_script(script: &str, policy: &SegmentPolicy) -> Vec<Segment> {
    if !script.contains(policy.marker.as_str()) {
        tracing::warn!("script has no segment markers, narrating the full text");
        return vec![Segment {
            index: 1,
            text: truncate_chars(script.trim(), policy.max_narration_chars),
        }];
    }

    let fragments: Vec<&str> = script
        .split(policy.marker.as_str())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fragments.len() > policy.max_segments {
        tracing::info!(
            found = fragments.len(),
            kept = policy.max_segments,
            "dropping segments beyond the cap"
        );
    }

    fragments
        .into_iter()
        .take(policy.max_segments)
        .enumerate()
        .map(|(i, fragment)| Segment {
            index: i + 1,
            text: truncate_chars(
                narration_text(fragment, &policy.closing_marker),
                policy.max_narration_chars,
            ),
        })
        .collect()
}

/// Text after the label's closing marker, or the whole fragment when there is none.
fn narration_text<'a>(fragment: &'a str, closing_marker: &str) -> &'a str {
    if closing_marker.is_empty() {
        return fragment;
    }
    match fragment.find(closing_marker) {
        Some(pos) => fragment[pos + closing_marker.len()..].trim(),
        None => fragment,
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => s[..byte_idx].to_owned(),
        None => s.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn caps_at_three_and_drops_the_rest() {
        let script =
            "[SEGMENT 1] Hello world [SEGMENT 2] Second part [SEGMENT 3] Third [SEGMENT 4] Fourth";
        let segs = segment_script(script, &SegmentPolicy::default());
        assert_eq!(texts(&segs), vec!["Hello world", "Second part", "Third"]);
        assert_eq!(
            segs.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn no_marker_is_single_segment() {
        let segs = segment_script("  just one block of text  ", &SegmentPolicy::default());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].index, 1);
        assert_eq!(segs[0].text, "just one block of text");
    }

    #[test]
    fn no_marker_long_script_is_truncated() {
        let script = "x".repeat(1000);
        let segs = segment_script(&script, &SegmentPolicy::default());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].text.chars().count(), 300);
    }

    #[test]
    fn preamble_before_first_marker_is_a_segment() {
        let script = "# Sample\n[SEGMENT 1] Intro\n[SEGMENT 2] Body";
        let segs = segment_script(script, &SegmentPolicy::default());
        assert_eq!(texts(&segs), vec!["# Sample", "Intro", "Body"]);
    }

    #[test]
    fn missing_closing_marker_keeps_raw_fragment() {
        let script = "[SEGMENT 1 no label end here[SEGMENT 2] ok";
        let segs = segment_script(script, &SegmentPolicy::default());
        assert_eq!(texts(&segs), vec!["1 no label end here", "ok"]);
    }

    #[test]
    fn narration_keeps_text_after_later_closing_brackets() {
        let segs = segment_script("[SEGMENT 1] see [note] here", &SegmentPolicy::default());
        assert_eq!(texts(&segs), vec!["see [note] here"]);

        let segs = segment_script(
            "[SEGMENT 1] a] b] c [SEGMENT 2] plain",
            &SegmentPolicy::default(),
        );
        assert_eq!(texts(&segs), vec!["a] b] c", "plain"]);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let policy = SegmentPolicy {
            max_narration_chars: 4,
            ..SegmentPolicy::default()
        };
        let segs = segment_script("[SEGMENT 1] Xin chào bạn", &policy);
        assert_eq!(segs[0].text, "Xin ");

        let segs = segment_script("[SEGMENT 1] \u{1eeb}\u{1eeb}\u{1eeb}\u{1eeb}\u{1eeb}", &policy);
        assert_eq!(segs[0].text, "\u{1eeb}\u{1eeb}\u{1eeb}\u{1eeb}");
    }

    #[test]
    fn returns_min_of_count_and_cap_in_order() {
        for n in 1..=6usize {
            let script: String = (1..=n)
                .map(|i| format!("[SEGMENT {i}] part {i}\n"))
                .collect();
            for cap in 1..=4usize {
                let policy = SegmentPolicy {
                    max_segments: cap,
                    ..SegmentPolicy::default()
                };
                let segs = segment_script(&script, &policy);
                assert_eq!(segs.len(), n.min(cap));
                for (i, s) in segs.iter().enumerate() {
                    assert_eq!(s.index, i + 1);
                    assert_eq!(s.text, format!("part {}", i + 1));
                }
            }
        }
    }

    #[test]
    fn empty_fragments_are_discarded() {
        let segs = segment_script("[SEGMENT[SEGMENT   [SEGMENT 1] a", &SegmentPolicy::default());
        assert_eq!(texts(&segs), vec!["a"]);
    }

    #[test]
    fn bare_label_yields_empty_text() {
        let segs = segment_script("[SEGMENT 1] a [SEGMENT 2]", &SegmentPolicy::default());
        assert_eq!(texts(&segs), vec!["a", ""]);
    }
}
