use super::*;

fn chunker(chunk_size: usize, chunk_overlap: usize) -> Chunker {
    Chunker::new(ChunkingConfig::new(chunk_size, chunk_overlap).expect("valid config"))
        .expect("should build chunker")
}

#[test]
fn concrete_scenario_offsets() {
    let text = "x".repeat(2500);
    let chunks = chunker(1000, 100).chunk("doc1.md", &text);

    let spans: Vec<(usize, usize)> = chunks
        .iter()
        .map(|c| (c.start_offset, c.end_offset))
        .collect();
    assert_eq!(spans, vec![(0, 1000), (900, 1900), (1800, 2500)]);
    assert!(chunks.iter().all(|c| c.source == "doc1.md"));
    assert_eq!(
        chunks.iter().map(|c| c.sequence_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn short_text_is_a_single_chunk() {
    let chunks = chunker(1000, 100).chunk("a.md", "Just one line.");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Just one line.");
    assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 14));
}

#[test]
fn empty_and_whitespace_text_yield_nothing() {
    let chunker = chunker(10, 2);
    assert!(chunker.chunk("a.md", "").is_empty());
    assert!(chunker.chunk("a.md", "   \n\n\t  ").is_empty());
}

#[test]
fn whitespace_windows_are_dropped_without_gaps_in_sequence() {
    let text = format!("{}{}{}", "a".repeat(10), " ".repeat(30), "b".repeat(10));
    let chunks = chunker(10, 0).chunk("a.md", &text);

    assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
    let indexes: Vec<usize> = chunks.iter().map(|c| c.sequence_index).collect();
    assert_eq!(indexes, (0..chunks.len()).collect::<Vec<_>>());
    assert_eq!(chunks.last().map(|c| c.end_offset), Some(50));
}

#[test]
fn prefers_heading_breaks_over_line_breaks() {
    let text = format!(
        "# Intro\n{}\nline\n## Install\n{}",
        "a".repeat(40),
        "b".repeat(40)
    );
    let chunks = chunker(70, 5).chunk("guide.md", &text);

    let heading_at = text.find("\n## ").expect("heading present");
    assert_eq!(chunks[0].end_offset, heading_at);
    assert!(chunks[1].text.contains("## Install"));
}

#[test]
fn falls_back_to_spaces_then_hard_cut() {
    let text = "alpha beta gamma delta epsilon zeta eta theta";
    let chunks = chunker(12, 2).chunk("words.md", text);
    assert!(chunks.iter().all(|c| c.char_len() <= 12));
    assert_eq!(chunks[0].text, "alpha beta");

    let solid = "y".repeat(25);
    let chunks = chunker(12, 2).chunk("solid.md", &solid);
    assert_eq!(chunks[0].end_offset, 12);
}

#[test]
fn coverage_and_overlap_hold() {
    let mut text = "Lorem ipsum dolor sit amet.\nConsectetur adipiscing elit.\n## Next\n"
        .repeat(40);
    text.push_str("End.");
    let total = text.chars().count();

    for (size, overlap) in [(100, 10), (250, 50), (64, 0), (1000, 100)] {
        let chunks = chunker(size, overlap).chunk("lorem.md", &text);

        assert_eq!(chunks.first().map(|c| c.start_offset), Some(0));
        assert_eq!(chunks.last().map(|c| c.end_offset), Some(total));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end_offset - pair[1].start_offset, overlap);
        }
        for chunk in &chunks {
            assert!(chunk.start_offset < chunk.end_offset);
            assert!(chunk.char_len() <= size);
        }
    }
}

#[test]
fn offsets_count_characters_not_bytes() {
    let text = "é".repeat(30);
    let chunks = chunker(20, 5).chunk("accents.md", &text);

    assert_eq!(chunks[0].text.chars().count(), 20);
    assert_eq!(chunks.last().map(|c| c.end_offset), Some(30));
}

#[test]
fn chunking_is_deterministic() {
    let text = "Section one.\n\n## Two\nMore text here.\n".repeat(20);
    let chunker = chunker(90, 15);
    assert_eq!(chunker.chunk("d.md", &text), chunker.chunk("d.md", &text));
}

#[test]
fn invalid_configurations_are_rejected() {
    assert!(matches!(
        ChunkingConfig::new(100, 100),
        Err(ConfigError::OverlapTooLarge(100, 100))
    ));
    assert!(ChunkingConfig::new(100, 150).is_err());
    assert!(matches!(
        ChunkingConfig::new(0, 0),
        Err(ConfigError::InvalidChunkSize(0))
    ));
    assert!(chunk_text("text", 10, 10).is_err());
}

#[test]
fn chunk_text_uses_default_separators() {
    let chunks = chunk_text("one two three four five", 10, 2).expect("valid config");
    assert_eq!(chunks[0].text, "one two");
    assert_eq!(ChunkingConfig::default().separators, default_separators());
}
