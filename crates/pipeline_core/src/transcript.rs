use serde::{Deserialize, Serialize};

/// A timed token within the ASR output (spec.md §3 "Word").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
	pub text: String,
	pub start_ms: i64,
	pub end_ms: i64,
	pub confidence: f32,
	pub speaker: Option<String>,
}

impl Word {
	/// Identity used by `Fuse` to track which words have already been
	/// assigned to a line (spec.md §4.6 step 2: "tuple of text+start+end
	/// +speaker"), grounded in `TranscriptService._get_word_id`.
	fn identity(&self) -> (String, i64, i64, Option<String>) {
		(self.text.clone(), self.start_ms, self.end_ms, self.speaker.clone())
	}
}

/// A timed text block derived from the ASR job (spec.md §3 "Subtitle").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
	pub start_ms: i64,
	pub end_ms: i64,
	pub text: String,
}

/// Text, timing, and the words it contains (spec.md §3 "TranscriptLine").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
	pub text: String,
	pub start_ms: i64,
	pub end_ms: i64,
	pub words: Vec<Word>,
}

/// Coverage statistics computed alongside `fuse` purely for logging
/// (SPEC_FULL §4.6, grounded in `TranscriptService._calculate_coverage`).
/// Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageStats {
	pub total_words: usize,
	pub matched_words: usize,
	pub coverage_percentage: f64,
	pub unmatched_examples: Vec<Word>,
}

/// Align timed words with subtitle cues into karaoke lines (spec.md §4.6
/// "Fuse"), grounded in
/// `application/karaoke_tracks/services/transcript_service.py`'s
/// `TranscriptService.create_transcript`.
///
/// Words are matched to the cue whose `[start, end]` interval contains the
/// word's *end* time (ASR end-times are more stable than start-times across
/// word boundaries); a matched word's start is then clamped forward to the
/// cue's start so no word carries a negative line-local offset.
#[must_use]
pub fn fuse(words: &[Word], subtitles: &[SubtitleCue]) -> (Vec<TranscriptLine>, CoverageStats) {
	let mut sorted_words: Vec<Word> = words.to_vec();
	sorted_words.sort_by_key(|w| w.start_ms);

	let mut sorted_subtitles: Vec<SubtitleCue> = subtitles.to_vec();
	sorted_subtitles.sort_by_key(|c| c.start_ms);

	let mut consumed = std::collections::HashSet::new();
	let mut lines = Vec::with_capacity(sorted_subtitles.len());

	for cue in &sorted_subtitles {
		let mut cue_words = Vec::new();
		for word in &sorted_words {
			let id = word.identity();
			if consumed.contains(&id) {
				continue;
			}
			if word.end_ms >= cue.start_ms && word.end_ms <= cue.end_ms {
				cue_words.push(word.clone());
				consumed.insert(id);
			}
		}

		let clamped: Vec<Word> = cue_words
			.into_iter()
			.map(|mut w| {
				w.start_ms = w.start_ms.max(cue.start_ms);
				w
			})
			.collect();

		lines.push(TranscriptLine { text: cue.text.clone(), start_ms: cue.start_ms, end_ms: cue.end_ms, words: clamped });
	}

	let total_words = sorted_words.len();
	let matched_words = consumed.len();
	let coverage_percentage = if total_words == 0 { 100.0 } else { (matched_words as f64 / total_words as f64) * 100.0 };
	let unmatched_examples = sorted_words
		.iter()
		.filter(|w| !consumed.contains(&w.identity()))
		.take(5)
		.cloned()
		.collect();

	(lines, CoverageStats { total_words, matched_words, coverage_percentage, unmatched_examples })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn word(text: &str, start_ms: i64, end_ms: i64) -> Word {
		Word { text: text.to_string(), start_ms, end_ms, confidence: 0.9, speaker: None }
	}

	fn cue(start_ms: i64, end_ms: i64, text: &str) -> SubtitleCue {
		SubtitleCue { start_ms, end_ms, text: text.to_string() }
	}

	#[test]
	fn happy_path_produces_one_line_with_both_words() {
		let words = vec![word("hello", 0, 500), word("world", 600, 1100)];
		let subtitles = vec![cue(0, 1200, "hello world")];

		let (lines, stats) = fuse(&words, &subtitles);

		assert_eq!(lines.len(), 1);
		let line = &lines[0];
		assert_eq!(line.text, "hello world");
		assert_eq!(line.start_ms, 0);
		assert_eq!(line.end_ms, 1200);
		assert_eq!(line.words, vec![word("hello", 0, 500), word("world", 600, 1100)]);
		assert_eq!(stats.matched_words, 2);
		assert!((stats.coverage_percentage - 100.0).abs() < f64::EPSILON);
	}

	#[test]
	fn word_start_is_clamped_to_cue_start() {
		let words = vec![word("la", 950, 1050)];
		let subtitles = vec![cue(1000, 2000, "la")];

		let (lines, _) = fuse(&words, &subtitles);

		assert_eq!(lines.len(), 1);
		assert_eq!(lines[0].words.len(), 1);
		assert_eq!(lines[0].words[0].start_ms, 1000);
		assert_eq!(lines[0].words[0].end_ms, 1050);
	}

	#[test]
	fn every_word_appears_in_at_most_one_line() {
		let words = vec![word("a", 0, 100), word("b", 150, 900), word("c", 1000, 1100)];
		let subtitles = vec![cue(0, 1000, "a b"), cue(1000, 1500, "c")];

		let (lines, _) = fuse(&words, &subtitles);

		let mut seen = std::collections::HashSet::new();
		for line in &lines {
			for w in &line.words {
				assert!(seen.insert(w.identity()), "word {w:?} appeared twice");
			}
		}
	}

	#[test]
	fn words_stay_within_their_lines_bounds() {
		let words = vec![word("a", 0, 100), word("b", 150, 900), word("c", 1000, 1100)];
		let subtitles = vec![cue(0, 1000, "a b"), cue(1000, 1500, "c")];

		let (lines, _) = fuse(&words, &subtitles);

		for line in &lines {
			for w in &line.words {
				assert!(line.start_ms <= w.start_ms);
				assert!(w.start_ms <= w.end_ms);
				assert!(w.end_ms <= line.end_ms);
			}
		}
	}

	#[test]
	fn lines_are_in_non_decreasing_start_order() {
		let subtitles = vec![cue(1000, 1500, "second"), cue(0, 900, "first")];
		let (lines, _) = fuse(&[], &subtitles);

		for pair in lines.windows(2) {
			assert!(pair[0].start_ms <= pair[1].start_ms);
		}
	}

	#[test]
	fn unmatched_words_are_dropped_but_counted() {
		let words = vec![word("orphan", 5000, 5100)];
		let subtitles = vec![cue(0, 1000, "nothing here")];

		let (lines, stats) = fuse(&words, &subtitles);

		assert_eq!(lines[0].words.len(), 0);
		assert_eq!(stats.total_words, 1);
		assert_eq!(stats.matched_words, 0);
		assert_eq!(stats.unmatched_examples.len(), 1);
	}

	#[test]
	fn fuse_is_deterministic() {
		let words = vec![word("hello", 0, 500), word("world", 600, 1100)];
		let subtitles = vec![cue(0, 1200, "hello world")];

		let (first, _) = fuse(&words, &subtitles);
		let (second, _) = fuse(&words, &subtitles);

		assert_eq!(first, second);
	}

	#[test]
	fn empty_inputs_produce_no_lines() {
		let (lines, stats) = fuse(&[], &[]);
		assert!(lines.is_empty());
		assert_eq!(stats.total_words, 0);
		assert!((stats.coverage_percentage - 100.0).abs() < f64::EPSILON);
	}
}
