use super::*;
use tempfile::TempDir;

#[test]
fn loads_markdown_recursively_in_path_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let root = temp_dir.path();
    fs::create_dir_all(root.join("guide/nested")).expect("should create dirs");

    fs::write(root.join("b.md"), "# B").expect("should write file");
    fs::write(root.join("a.MD"), "# A").expect("should write file");
    fs::write(root.join("guide/nested/c.md"), "# C").expect("should write file");
    fs::write(root.join("notes.txt"), "ignored").expect("should write file");
    fs::write(root.join("page.html"), "<p>ignored</p>").expect("should write file");

    let documents = load_markdown_documents(root).expect("should load documents");

    let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, vec!["# A", "# B", "# C"]);
    assert!(documents.iter().all(|d| d.modified.is_some()));
    assert!(documents[2].source.ends_with("c.md"));
}

#[test]
fn missing_directory_is_an_invalid_argument() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let err = load_markdown_documents(&temp_dir.path().join("absent"))
        .expect_err("missing directory fails");
    assert!(matches!(err, DocsError::InvalidArgument(_)));
}

#[test]
fn empty_directory_yields_no_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let documents = load_markdown_documents(temp_dir.path()).expect("should load");
    assert!(documents.is_empty());
}

#[test]
fn in_memory_documents_have_no_timestamp() {
    let document = Document::new("doc1.md", "text");
    assert_eq!(document.source, "doc1.md");
    assert!(document.modified.is_none());
}
