use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};

use super::destination::resolve_page_index;
use super::pdf::decode_text_bytes;
use super::text::parse_outline_text;
use super::*;
use crate::model::{Bookmark, Destination, OutlineNode};

struct FakeDocument {
    pages: HashMap<ObjectId, u32>,
    names: HashMap<Vec<u8>, ObjectId>,
}

impl FakeDocument {
    fn with_pages(count: u32) -> Self {
        let pages = (0..count).map(|index| ((100 + index, 0), index)).collect();
        Self {
            pages,
            names: HashMap::new(),
        }
    }

    fn page_ref(index: u32) -> ObjectId {
        (100 + index, 0)
    }
}

impl DestinationLookup for FakeDocument {
    fn page_index(&self, reference: ObjectId) -> Option<u32> {
        self.pages.get(&reference).copied()
    }

    fn named_destination(&self, name: &[u8]) -> Option<ObjectId> {
        self.names.get(name).copied()
    }
}

fn leaf(title: &str, destination: Option<Destination>) -> OutlineNode {
    OutlineNode {
        title: title.to_string(),
        children: Vec::new(),
        destination,
    }
}

fn branch(title: &str, destination: Option<Destination>, children: Vec<OutlineNode>) -> OutlineNode {
    OutlineNode {
        title: title.to_string(),
        children,
        destination,
    }
}

fn explicit(index: u32) -> Option<Destination> {
    Some(Destination::Explicit(FakeDocument::page_ref(index)))
}

#[test]
fn parse_outline_text_reads_quoted_titles_in_file_order() {
    let bookmarks = parse_outline_text("# comment\n\"Ch 1\", 1\n\"Ch 2\", 2\n")
        .expect("outline should parse");
    assert_eq!(
        bookmarks,
        vec![Bookmark::new("Ch 1", 1), Bookmark::new("Ch 2", 2)]
    );
}

#[test]
fn parse_outline_text_of_empty_input_is_empty() {
    let bookmarks = parse_outline_text("").expect("empty outline should parse");
    assert!(bookmarks.is_empty());
}

#[test]
fn parse_outline_text_accepts_unquoted_titles_and_crlf() {
    let bookmarks = parse_outline_text("Preface,3\r\n\r\n  Part One , 12  \r\nIntro, 1")
        .expect("outline should parse");
    assert_eq!(
        bookmarks,
        vec![
            Bookmark::new("Preface", 3),
            Bookmark::new("Part One", 12),
            Bookmark::new("Intro", 1),
        ]
    );
}

#[test]
fn parse_outline_text_trims_surrounding_whitespace_before_matching() {
    let bookmarks = parse_outline_text("\"Ch\", 5  \n\t\"Tabbed\", 6\t\n   \n")
        .expect("outline should parse");
    assert_eq!(
        bookmarks,
        vec![Bookmark::new("Ch", 5), Bookmark::new("Tabbed", 6)]
    );
}

#[test]
fn parse_outline_text_drops_malformed_and_comment_lines() {
    let contents = "\"#comment\", 5\n\
                    no page here\n\
                    \"Roman\", iv\n\
                    \"Zero\", 0\n\
                    \"Huge\", 99999999999999\n\
                    \"Kept, with comma\", 42\n";

    let bookmarks = parse_outline_text(contents).expect("outline should parse");
    assert_eq!(bookmarks, vec![Bookmark::new("Kept, with comma", 42)]);
}

#[test]
fn bootstrap_template_parses_to_no_bookmarks() {
    let bookmarks = parse_outline_text(OUTLINE_TEMPLATE).expect("template should parse");
    assert!(bookmarks.is_empty());
    assert!(OUTLINE_TEMPLATE.starts_with("# title (use quotes if there are spaces), page number\n"));
    assert!(OUTLINE_TEMPLATE.ends_with("# ...\n"));
}

#[test]
fn read_outline_file_propagates_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let missing = dir.path().join(OUTLINE_FILE_NAME);

    let err = read_outline_file(&missing).expect_err("missing file should fail");
    assert!(err.to_string().contains("failed to read outline file"));
}

#[test]
fn read_outline_file_parses_contents_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join(OUTLINE_FILE_NAME);
    std::fs::write(&path, "\"Foreword\", 7\n").expect("outline should be written");

    let bookmarks = read_outline_file(&path).expect("outline should be read");
    assert_eq!(bookmarks, vec![Bookmark::new("Foreword", 7)]);
}

#[test]
fn resolve_page_index_follows_named_destinations() {
    let mut document = FakeDocument::with_pages(3);
    document
        .names
        .insert(b"chapter.2".to_vec(), FakeDocument::page_ref(2));

    assert_eq!(
        resolve_page_index(&document, &Destination::Named(b"chapter.2".to_vec())),
        Some(2)
    );
    assert_eq!(
        resolve_page_index(&document, &Destination::Named(b"missing".to_vec())),
        None
    );
    assert_eq!(
        resolve_page_index(&document, &Destination::Explicit((999, 0))),
        None
    );
}

#[test]
fn walk_with_budget_one_emits_only_top_level_nodes() {
    let document = FakeDocument::with_pages(5);
    let nodes = vec![
        leaf("A", explicit(0)),
        branch("B", explicit(2), vec![leaf("B1", explicit(3))]),
        leaf("C", None),
    ];

    let mut output = Vec::new();
    let skipped = walk_outline(&document, &nodes, 1, &mut output);

    assert_eq!(output, vec![Bookmark::new("A", 1), Bookmark::new("B", 3)]);
    assert_eq!(skipped, 1);
}

#[test]
fn walk_with_budget_two_expands_branches_in_place() {
    let document = FakeDocument::with_pages(5);
    let nodes = vec![
        leaf("A", explicit(0)),
        branch("B", explicit(1), vec![leaf("B1", explicit(4))]),
    ];

    let mut output = Vec::new();
    let skipped = walk_outline(&document, &nodes, 2, &mut output);

    assert_eq!(output, vec![Bookmark::new("A", 1), Bookmark::new("B1", 5)]);
    assert_eq!(skipped, 0);
}

#[test]
fn walk_treats_nodes_at_budget_depth_as_leaves() {
    let document = FakeDocument::with_pages(10);
    let nodes = vec![branch(
        "Part I",
        explicit(0),
        vec![
            branch(
                "Chapter 1",
                explicit(1),
                vec![leaf("1.1", explicit(2)), leaf("1.2", explicit(3))],
            ),
            leaf("Chapter 2", explicit(5)),
        ],
    )];

    let mut depth_two = Vec::new();
    walk_outline(&document, &nodes, 2, &mut depth_two);
    assert_eq!(
        depth_two,
        vec![Bookmark::new("Chapter 1", 2), Bookmark::new("Chapter 2", 6)]
    );

    let mut depth_five = Vec::new();
    walk_outline(&document, &nodes, 5, &mut depth_five);
    assert_eq!(
        depth_five,
        vec![
            Bookmark::new("1.1", 3),
            Bookmark::new("1.2", 4),
            Bookmark::new("Chapter 2", 6),
        ]
    );
}

#[test]
fn walk_keeps_outline_order_without_sorting_or_dedup() {
    let document = FakeDocument::with_pages(5);
    let nodes = vec![
        leaf("Late", explicit(4)),
        leaf("Early", explicit(0)),
        leaf("Late again", explicit(4)),
    ];

    let mut output = Vec::new();
    walk_outline(&document, &nodes, 3, &mut output);

    let pages: Vec<u32> = output.iter().map(|bookmark| bookmark.page).collect();
    assert_eq!(pages, vec![5, 1, 5]);
}

#[test]
fn walk_appends_to_existing_output() {
    let document = FakeDocument::with_pages(2);
    let mut output = vec![Bookmark::new("existing", 9)];

    walk_outline(&document, &[leaf("A", explicit(1))], 1, &mut output);

    assert_eq!(output, vec![Bookmark::new("existing", 9), Bookmark::new("A", 2)]);
}

#[test]
fn decode_text_bytes_handles_utf16_and_latin1() {
    let utf16 = [0xFE, 0xFF, 0x00, 0x43, 0x00, 0x68, 0x00, 0xE9];
    assert_eq!(decode_text_bytes(&utf16), "Ché");
    assert_eq!(decode_text_bytes(b"Plain"), "Plain");
    assert_eq!(decode_text_bytes(&[0x43, 0xE9]), "Cé");
}

/// Three-page document whose outline mixes every supported destination form:
///
/// ```text
/// A              /Dest [p1 /Fit]
/// B              (no destination)
///   B1           /Dest (chap2)           -> /Names /Dests name tree
///   B2           /A GoTo /D /legacy      -> catalog /Dests
/// C              /Dest [7 /Fit]          (remote page number, unresolvable)
/// ```
fn outline_document() -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let page_ids: Vec<ObjectId> = (0..3)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<Object>>(),
            "Count" => 3,
        }),
    );

    let outlines_id = doc.new_object_id();
    let node_a = doc.new_object_id();
    let node_b = doc.new_object_id();
    let node_b1 = doc.new_object_id();
    let node_b2 = doc.new_object_id();
    let node_c = doc.new_object_id();

    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => node_a,
            "Last" => node_c,
            "Count" => 5,
        }),
    );
    doc.objects.insert(
        node_a,
        Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("A"),
            "Parent" => outlines_id,
            "Next" => node_b,
            "Dest" => vec![Object::Reference(page_ids[0]), "Fit".into()],
        }),
    );
    doc.objects.insert(
        node_b,
        Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("B"),
            "Parent" => outlines_id,
            "Prev" => node_a,
            "Next" => node_c,
            "First" => node_b1,
            "Last" => node_b2,
            "Count" => 2,
        }),
    );
    doc.objects.insert(
        node_b1,
        Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("B1"),
            "Parent" => node_b,
            "Next" => node_b2,
            "Dest" => Object::string_literal("chap2"),
        }),
    );
    doc.objects.insert(
        node_b2,
        Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("B2"),
            "Parent" => node_b,
            "Prev" => node_b1,
            "A" => dictionary! {
                "S" => "GoTo",
                "D" => Object::Name(b"legacy".to_vec()),
            },
        }),
    );
    doc.objects.insert(
        node_c,
        Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("C"),
            "Parent" => outlines_id,
            "Prev" => node_b,
            "Dest" => vec![7.into(), "Fit".into()],
        }),
    );

    let name_tree_leaf = doc.add_object(dictionary! {
        "Names" => vec![
            Object::string_literal("chap2"),
            Object::Array(vec![Object::Reference(page_ids[1]), "XYZ".into(), 0.into(), 800.into(), Object::Null]),
        ],
        "Limits" => vec![Object::string_literal("chap2"), Object::string_literal("chap2")],
    });

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines_id,
        "Names" => dictionary! {
            "Dests" => dictionary! {
                "Kids" => vec![Object::Reference(name_tree_leaf)],
            },
        },
        "Dests" => dictionary! {
            "legacy" => dictionary! {
                "D" => vec![Object::Reference(page_ids[2]), "Fit".into()],
            },
        },
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

#[test]
fn pdf_outline_builds_tree_with_destinations() {
    let pdf = PdfOutline::from_document(outline_document());
    assert_eq!(pdf.page_count(), 3);

    let nodes = pdf.outline();
    let titles: Vec<&str> = nodes.iter().map(|node| node.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B", "C"]);

    assert!(matches!(nodes[0].destination, Some(Destination::Explicit(_))));
    assert_eq!(nodes[1].destination, None);
    assert_eq!(nodes[1].children.len(), 2);
    assert_eq!(
        nodes[1].children[0].destination,
        Some(Destination::Named(b"chap2".to_vec()))
    );
    assert_eq!(
        nodes[1].children[1].destination,
        Some(Destination::Named(b"legacy".to_vec()))
    );
    assert_eq!(nodes[2].destination, None);
}

#[test]
fn pdf_outline_resolves_named_destinations_from_both_tables() {
    let pdf = PdfOutline::from_document(outline_document());
    let nodes = pdf.outline();

    let mut output = Vec::new();
    let skipped = walk_outline(&pdf, &nodes, 2, &mut output);

    assert_eq!(
        output,
        vec![
            Bookmark::new("A", 1),
            Bookmark::new("B1", 2),
            Bookmark::new("B2", 3),
        ]
    );
    assert_eq!(skipped, 1);
}

/// One page per entry; each outline entry points at its page through a
/// named destination whose key is taken byte for byte.
fn raw_named_destination_document(tree_keys: &[&[u8]], legacy_key: &[u8]) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_count = tree_keys.len() + 1;
    let page_ids: Vec<ObjectId> = (0..page_count)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            })
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<Object>>(),
            "Count" => page_count as i64,
        }),
    );

    let outlines_id = doc.new_object_id();
    let node_ids: Vec<ObjectId> = (0..page_count).map(|_| doc.new_object_id()).collect();
    let mut names = Vec::new();
    for (index, key) in tree_keys.iter().enumerate() {
        let mut node = dictionary! {
            "Title" => Object::string_literal(format!("Tree {index}")),
            "Parent" => outlines_id,
            "Next" => node_ids[index + 1],
            "Dest" => Object::String(key.to_vec(), StringFormat::Literal),
        };
        if index > 0 {
            node.set("Prev", node_ids[index - 1]);
        }
        doc.objects.insert(node_ids[index], Object::Dictionary(node));

        names.push(Object::String(key.to_vec(), StringFormat::Hexadecimal));
        names.push(Object::Array(vec![Object::Reference(page_ids[index]), "Fit".into()]));
    }

    let legacy_index = tree_keys.len();
    doc.objects.insert(
        node_ids[legacy_index],
        Object::Dictionary(dictionary! {
            "Title" => Object::string_literal("Legacy"),
            "Parent" => outlines_id,
            "A" => dictionary! {
                "S" => "GoTo",
                "D" => Object::Name(legacy_key.to_vec()),
            },
        }),
    );
    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => node_ids[0],
            "Last" => node_ids[legacy_index],
        }),
    );

    let mut legacy = Dictionary::new();
    legacy.set(
        legacy_key.to_vec(),
        vec![Object::Reference(page_ids[legacy_index]), "Fit".into()],
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines_id,
        "Names" => dictionary! {
            "Dests" => dictionary! {
                "Names" => names,
            },
        },
        "Dests" => legacy,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

#[test]
fn pdf_outline_matches_named_destinations_on_raw_key_bytes() {
    let latin1: &[u8] = b"chap\xe9";
    let utf16: &[u8] = &[0xFE, 0xFF, 0x00, 0x63];
    let pdf = PdfOutline::from_document(raw_named_destination_document(
        &[latin1, utf16],
        b"annexe\xe9",
    ));
    let nodes = pdf.outline();

    assert_eq!(nodes[0].destination, Some(Destination::Named(latin1.to_vec())));
    assert_eq!(nodes[1].destination, Some(Destination::Named(utf16.to_vec())));

    let mut output = Vec::new();
    let skipped = walk_outline(&pdf, &nodes, 1, &mut output);

    assert_eq!(
        output,
        vec![
            Bookmark::new("Tree 0", 1),
            Bookmark::new("Tree 1", 2),
            Bookmark::new("Legacy", 3),
        ]
    );
    assert_eq!(skipped, 0);
}

#[test]
fn pdf_outline_does_not_match_decoded_form_of_raw_key() {
    let document = raw_named_destination_document(&[b"chap\xe9".as_slice()], b"annexe");
    let pdf = PdfOutline::from_document(document);

    assert_eq!(pdf.named_destination("chap\u{e9}".as_bytes()), None);
    assert!(pdf.named_destination(b"chap\xe9").is_some());
}

#[test]
fn pdf_outline_with_budget_one_skips_branch_without_destination() {
    let pdf = PdfOutline::from_document(outline_document());
    let nodes = pdf.outline();

    let mut output = Vec::new();
    let skipped = walk_outline(&pdf, &nodes, 1, &mut output);

    assert_eq!(output, vec![Bookmark::new("A", 1)]);
    assert_eq!(skipped, 2);
}

#[test]
fn pdf_outline_is_empty_without_outlines_entry() {
    let mut doc = outline_document();
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .expect("catalog reference should exist");
    doc.get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .expect("catalog should be a dictionary")
        .remove(b"Outlines");

    let pdf = PdfOutline::from_document(doc);
    assert!(pdf.outline().is_empty());
}

#[test]
fn pdf_outline_loads_saved_file() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("book.pdf");
    let mut doc = outline_document();
    doc.save(&path).expect("pdf should be saved");

    let pdf = PdfOutline::load(&path).expect("pdf should load");
    assert_eq!(pdf.outline().len(), 3);
}

#[test]
fn pdf_outline_load_reports_unreadable_file() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"not a pdf").expect("file should be written");

    let err = PdfOutline::load(&path).err().expect("garbage should not load");
    assert!(err.to_string().contains("failed to load pdf"));
}
