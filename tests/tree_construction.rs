use gosub_shared::async_executor::block_on;
use gosub_shared::node::NodeId;
use gosub_xml::errors::Error;
use gosub_xml::node::NodeType;
use gosub_xml::parser::errors::ParserError;
use gosub_xml::parser::task::ParseTask;
use gosub_xml::writer::DocumentWriter;
use gosub_xml::xml_compile;
use parking_lot::Mutex;
use std::sync::Arc;
use test_case::test_case;

#[test]
fn minimal_document() {
    let doc = xml_compile(r#"<?xml version="1.0"?><root/>"#).unwrap();
    let binding = doc.get();

    let root_children = binding.root().unwrap().children();
    assert_eq!(root_children.len(), 1);

    let root = binding.document_element().unwrap();
    assert_eq!(binding.element_data(root).unwrap().name(), "root");
    assert!(binding.node_by_id(root).unwrap().children().is_empty());
    assert_eq!(binding.xml_version(), Some("1.0"));
}

#[test_case("<root><a></b></root>", ParserError::MismatchedClosingTag, 1, 10; "mismatched closing tag")]
#[test_case("<root>", ParserError::UnexpectedEndOfInput, 1, 7; "unclosed root")]
#[test_case(r#"<?xml version="1.0"?>"#, ParserError::MissingRootElement, 1, 22; "missing root")]
#[test_case(r#"<?xml version="2.0"?><root/>"#, ParserError::UnsupportedVersion, 1, 1; "unsupported version")]
#[test_case(r#"<root/><?xml version="1.0"?>"#, ParserError::DeclarationMisplaced, 1, 8; "declaration after content")]
#[test_case("<root/>\n<!DOCTYPE root>", ParserError::DoctypeAfterContent, 2, 1; "doctype after content")]
#[test_case("</root>", ParserError::UnexpectedClosingTag, 1, 1; "closing tag without open element")]
fn fatal_errors(input: &str, kind: ParserError, line: usize, column: usize) {
    let err = xml_compile(input).unwrap_err();

    match err {
        Error::Fatal { kind: k, location } => {
            assert_eq!(k, kind);
            assert_eq!((location.line, location.column), (line, column));
        }
        e => panic!("unexpected error {e}"),
    }
}

#[test]
fn prolog_and_body() {
    let input = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!-- before -->
<!DOCTYPE note [
  <!ENTITY writer "Donald Duck">
]>
<?stylesheet href="note.css"?>
<note id="n1">
  <to>Tove</to>
  <from>&writer; &amp; &#x263A;</from>
  <body><![CDATA[<b>raw</b>]]></body>
</note>
"#;

    let doc = xml_compile(input).unwrap();
    let binding = doc.get();

    assert!(binding.standalone());
    assert_eq!(binding.input_encoding(), Some("UTF-8"));

    let types: Vec<NodeType> = binding
        .root()
        .unwrap()
        .children()
        .iter()
        .map(|id| binding.node_by_id(*id).unwrap().type_of())
        .collect();
    assert_eq!(
        types,
        vec![
            NodeType::CommentNode,
            NodeType::DocTypeNode,
            NodeType::ProcessingInstructionNode,
            NodeType::ElementNode
        ]
    );

    let doctype = binding.node_by_id(binding.doctype().unwrap()).unwrap();
    assert!(doctype
        .get_doctype_data()
        .unwrap()
        .type_definitions()
        .contains("<!ENTITY writer \"Donald Duck\">"));

    let note = binding.document_element().unwrap();
    assert_eq!(binding.element_data(note).unwrap().attribute("id"), Some("n1"));

    let elements: Vec<NodeId> = binding
        .node_by_id(note)
        .unwrap()
        .children()
        .iter()
        .copied()
        .filter(|id| binding.node_by_id(*id).unwrap().is_element_node())
        .collect();
    assert_eq!(elements.len(), 3);
    assert_eq!(binding.text_content(elements[0]), "Tove");
    assert_eq!(binding.text_content(elements[1]), "Donald Duck & ☺");
    assert_eq!(binding.text_content(elements[2]), "<b>raw</b>");
}

#[test]
fn duplicate_attribute_last_value_wins() {
    let task = ParseTask::from_str(r#"<e a="1" b="x" a="2"/>"#, None);
    let doc = task.run().unwrap();

    let binding = doc.get();
    let data = binding.element_data(binding.document_element().unwrap()).unwrap();
    let attributes: Vec<(&str, &str)> = data
        .attributes()
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(attributes, vec![("a", "2"), ("b", "x")]);

    let codes: Vec<ParserError> = task.errors().iter().map(|e| e.code).collect();
    assert_eq!(
        codes,
        vec![ParserError::DuplicateAttribute, ParserError::UndefinedMarkupDeclaration]
    );
}

#[test]
fn subscribers_see_tokenizer_and_builder_records() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let task = ParseTask::from_str("<root>&unknown;<a></root>", None);
    let sink = seen.clone();
    task.subscribe(Box::new(move |err| sink.lock().push((err.code, err.fatal))));

    let err = task.run().unwrap_err();
    assert_eq!(err.kind(), Some(ParserError::MismatchedClosingTag));

    assert_eq!(
        *seen.lock(),
        vec![
            (ParserError::UndefinedMarkupDeclaration, false),
            (ParserError::UnknownEntity, false),
            (ParserError::MismatchedClosingTag, true),
        ]
    );
}

#[test]
fn run_twice_returns_the_same_document() {
    let task = ParseTask::from_str("<root><child/></root>", None);

    let first = task.run().unwrap();
    let second = task.run().unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(task.errors().len(), 1);
}

#[test]
fn spawn_after_run_is_invalid() {
    let task = ParseTask::from_str("<root/>", None);
    task.run().unwrap();

    assert!(matches!(task.spawn(), Err(Error::InvalidOperation(_))));
}

#[test]
fn spawn_and_join() {
    let task = ParseTask::from_str(r#"<?xml version="1.0"?><root><a/><b/></root>"#, None);
    let handle = task.spawn().unwrap();

    let doc = handle.join().unwrap();
    let awaited = block_on(task.spawn().unwrap()).unwrap();
    assert!(doc.ptr_eq(&awaited));

    let binding = doc.get();
    let root = binding.document_element().unwrap();
    assert_eq!(binding.node_by_id(root).unwrap().children().len(), 2);
}

#[test]
fn writer_round_trip() {
    let input = r#"<?xml version="1.0" encoding="UTF-8"?><!--c--><root a="1" b="&lt;"><x>t &amp; u</x><y/><?pi data?></root>"#;

    let doc = xml_compile(input).unwrap();
    assert_eq!(DocumentWriter::write_document(&doc), input);
}

#[test]
fn exponential_entities_are_not_expanded() {
    let mut subset = String::from("<!ENTITY l0 \"lol\">");
    for level in 1..=8 {
        let refs = format!("&l{};", level - 1).repeat(10);
        subset.push_str(&format!("<!ENTITY l{level} \"{refs}\">"));
    }
    let input = format!("<?xml version=\"1.0\"?><!DOCTYPE r [{subset}]><r a=\"&l8;\">&l1;|&l8;</r>");

    let task = ParseTask::from_str(&input, None);
    let doc = task.run().unwrap();

    let binding = doc.get();
    let root = binding.document_element().unwrap();
    assert_eq!(binding.element_data(root).unwrap().attribute("a"), Some("&l8;"));
    assert_eq!(binding.text_content(root), format!("{}|&l8;", "lol".repeat(10)));

    let limits = task
        .errors()
        .iter()
        .filter(|e| e.code == ParserError::EntityExpansionLimit)
        .count();
    assert_eq!(limits, 2);
}
