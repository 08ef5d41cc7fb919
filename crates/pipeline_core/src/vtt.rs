use crate::transcript::SubtitleCue;

/// Parses a WebVTT payload into subtitle cues (spec.md §4.7).
///
/// Blocks are separated by blank lines. A block is a cue when its first
/// non-empty line contains ` --> ` separating two timestamps
/// (`HH:MM:SS.mmm` or `MM:SS.mmm`). Everything after that first line, joined
/// by newlines, is the cue text. Malformed blocks are skipped rather than
/// aborting the whole parse; a payload with zero parseable cues returns an
/// empty vec, which the caller treats as a parse failure (spec.md §4.7:
/// "a completely unparseable payload yields an empty list and a FAILED
/// step").
#[must_use]
pub fn parse_vtt(payload: &str) -> Vec<SubtitleCue> {
	let mut cues = Vec::new();

	for block in split_blocks(payload) {
		let mut lines = block.lines();
		let Some(header) = lines.next() else { continue };

		let Some((start_raw, end_raw)) = split_timing_line(header) else {
			continue;
		};

		let (Some(start_ms), Some(end_ms)) = (parse_timestamp(start_raw), parse_timestamp(end_raw)) else {
			continue;
		};

		let text: String = lines.collect::<Vec<_>>().join("\n");
		cues.push(SubtitleCue { start_ms, end_ms, text });
	}

	cues.sort_by_key(|c| c.start_ms);
	cues
}

fn split_blocks(payload: &str) -> Vec<String> {
	let without_header = payload.strip_prefix("WEBVTT").unwrap_or(payload);

	without_header
		.replace("\r\n", "\n")
		.split("\n\n")
		.map(str::trim)
		.filter(|b| !b.is_empty())
		.map(str::to_string)
		.collect()
}

fn split_timing_line(line: &str) -> Option<(&str, &str)> {
	let line = line.trim();
	let (start, rest) = line.split_once(" --> ")?;
	let end = rest.split_whitespace().next()?;
	Some((start.trim(), end))
}

/// Parses `HH:MM:SS.mmm` or `MM:SS.mmm` into milliseconds, zero-padding or
/// right-truncating the fractional part to 3 digits (spec.md §4.7).
fn parse_timestamp(raw: &str) -> Option<i64> {
	let (time_part, frac_part) = raw.split_once('.')?;
	let millis = normalize_millis(frac_part)?;

	let parts: Vec<&str> = time_part.split(':').collect();
	let (hours, minutes, seconds) = match parts.as_slice() {
		[h, m, s] => (h.parse::<i64>().ok()?, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
		[m, s] => (0, m.parse::<i64>().ok()?, s.parse::<i64>().ok()?),
		_ => return None,
	};

	Some(((hours * 3600 + minutes * 60 + seconds) * 1000) + millis)
}

fn normalize_millis(frac: &str) -> Option<i64> {
	let mut digits: String = frac.chars().take(3).collect();
	if !digits.chars().all(|c| c.is_ascii_digit()) {
		return None;
	}
	while digits.len() < 3 {
		digits.push('0');
	}
	digits.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_single_cue_with_header() {
		let payload = "WEBVTT\n\n00:00:00.000 --> 00:00:01.200\nhello world";
		let cues = parse_vtt(payload);
		assert_eq!(cues, vec![SubtitleCue { start_ms: 0, end_ms: 1200, text: "hello world".to_string() }]);
	}

	#[test]
	fn parses_multiple_cues_sorted_by_start() {
		let payload = "WEBVTT\n\n00:00:05.000 --> 00:00:06.000\nsecond\n\n00:00:00.000 --> 00:00:01.000\nfirst";
		let cues = parse_vtt(payload);
		assert_eq!(cues.len(), 2);
		assert_eq!(cues[0].text, "first");
		assert_eq!(cues[1].text, "second");
	}

	#[test]
	fn accepts_mm_ss_format() {
		let payload = "00:01.500 --> 00:02.000\nshort form";
		let cues = parse_vtt(payload);
		assert_eq!(cues, vec![SubtitleCue { start_ms: 1500, end_ms: 2000, text: "short form".to_string() }]);
	}

	#[test]
	fn multiline_cue_text_is_joined_with_newlines() {
		let payload = "00:00:00.000 --> 00:00:01.000\nline one\nline two";
		let cues = parse_vtt(payload);
		assert_eq!(cues[0].text, "line one\nline two");
	}

	#[test]
	fn malformed_block_is_skipped_not_fatal() {
		let payload = "00:00:00.000 --> 00:00:01.000\ngood\n\nnot a cue at all\n\n00:00:02.000 --> 00:00:03.000\nalso good";
		let cues = parse_vtt(payload);
		assert_eq!(cues.len(), 2);
	}

	#[test]
	fn unparseable_payload_yields_empty_vec() {
		let cues = parse_vtt("this is not vtt at all, just prose.");
		assert!(cues.is_empty());
	}

	#[test]
	fn truncates_millis_longer_than_three_digits() {
		assert_eq!(parse_timestamp("00:00:01.23456"), Some(1234));
	}

	#[test]
	fn pads_millis_shorter_than_three_digits() {
		assert_eq!(parse_timestamp("00:00:01.5"), Some(1500));
	}
}
