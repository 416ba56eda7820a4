//! Reading hand-built files and writing them back in standard mode.

mod common;

use common::*;
use pdfcore::io::lexer::{Lexer, Token};
use pdfcore::io::parser::parse_value;
use pdfcore::{
    Dictionary, Location, Name, Object, ObjectId, PdfDate, PdfDocument, PdfError, PdfString,
    PdfVersion, ReaderConfiguration, SaveMode, Stream, StreamKind, WriterConfiguration,
    XrefFormat,
};

fn id(number: u32) -> ObjectId {
    ObjectId::new(number, 0)
}

// ===========================================================================
// Parsing
// ===========================================================================

#[test]
fn test_catalog_dictionary_parses() {
    let value = parse_value(b"<< /Type /Catalog /Pages 2 0 R >>").unwrap();
    let dict = value.as_dict().unwrap();
    let keys: Vec<_> = dict.keys().map(|k| k.as_str_lossy().into_owned()).collect();
    assert_eq!(keys, vec!["Type", "Pages"]);
    assert_eq!(dict.get(b"Pages"), Some(&Object::Reference(id(2))));
}

#[test]
fn test_literal_with_escapes_tokenizes_to_five_bytes() {
    let mut lexer = Lexer::new(b"(ab\\)c\\n)");
    match lexer.move_next().unwrap() {
        Some(Token::Literal(bytes)) => assert_eq!(bytes, b"ab)c\n".to_vec()),
        other => panic!("unexpected token {:?}", other),
    }
}

// ===========================================================================
// Loading
// ===========================================================================

#[test]
fn test_load_classic_file() {
    let mut doc = load(&classic_pdf());
    assert_eq!(doc.version(), PdfVersion::V1_4);
    assert_eq!(doc.xref_format(), XrefFormat::Table);
    assert_eq!(doc.catalog().unwrap().get_type(), Some(&b"Catalog"[..]));
    assert_eq!(stream_content(&mut doc, 4), CONTENT);

    let info = doc.info().unwrap().unwrap();
    assert!(matches!(info.get(b"CreationDate"), Some(Object::Date(_))));
    assert!(doc.notifications().is_empty());
}

#[test]
fn test_load_packed_file() {
    let mut doc = load(&packed_pdf());
    assert_eq!(doc.xref_format(), XrefFormat::Stream);
    assert!(doc.objects().xref_streams().contains(&6));
    assert_eq!(
        doc.objects().location(5),
        Some(Location::Compressed { stream: 3, index: 1 })
    );

    // entries are read relative to /First, not from the start of the body
    let second = doc.resolve(id(5)).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(second.get(b"Kind"), Some(&Object::Name(Name::from("Second"))));
    let first = doc.resolve(id(4)).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(first.get(b"Kind"), Some(&Object::Name(Name::from("First"))));
}

#[test]
fn test_bad_length_strict_and_failsafe() {
    let bytes = bad_length_pdf();

    let mut strict = load(&bytes);
    assert!(matches!(strict.resolve(id(3)), Err(PdfError::Format { .. })));

    let config = ReaderConfiguration { failsafe: true };
    let mut lenient = PdfDocument::load_with_configuration(bytes, config).unwrap();
    assert_eq!(stream_content(&mut lenient, 3), b"thirteen byte");
    assert_eq!(lenient.notifications().len(), 1);
}

#[test]
fn test_dangling_reference_in_loaded_file() {
    let mut doc = load(&classic_pdf());
    assert_eq!(doc.resolve(id(40)).unwrap(), None);
    assert_eq!(doc.resolve(ObjectId::new(1, 2)).unwrap(), None);
}

// ===========================================================================
// Standard round trip
// ===========================================================================

fn populated_document() -> (PdfDocument, Vec<ObjectId>) {
    let mut doc = PdfDocument::new();
    let mut dict = Dictionary::new();
    dict.set("Int", 42);
    dict.set("Real", -1.5);
    dict.set("Flag", false);
    dict.set("Nothing", Object::Null);
    dict.set("Title", PdfString::literal(b"Report (draft)\n".to_vec()));
    dict.set("Key", PdfString::hexadecimal(vec![0x00, 0xFF, 0x10]));
    dict.set(
        "Created",
        PdfDate::parse(b"D:20230405060708-05'30'").unwrap(),
    );
    dict.set("Name", Name::from("A B#"));
    let a = doc.register(dict);

    let b = doc.register(vec![
        Object::Integer(1),
        Object::Reference(a),
        Object::from(vec![Object::Boolean(true)]),
    ]);

    let mut header = Dictionary::new();
    header.set("Subtype", Name::from("Form"));
    let c = doc.register(Stream::new(header, CONTENT.to_vec()));
    (doc, vec![a, b, c])
}

/// Structural comparison; stream headers may differ in `/Length` and
/// `/Filter`, so streams compare by decoded body plus the other keys
fn assert_same(left: &Object, right: &Object) {
    match (left, right) {
        (Object::Stream(l), Object::Stream(r)) => {
            assert_eq!(l.decoded_content().unwrap(), r.decoded_content().unwrap());
            let strip = |d: &Dictionary| {
                let mut d = d.clone();
                for key in [&b"Length"[..], b"Filter", b"DecodeParms"] {
                    d.remove(key);
                }
                d
            };
            assert_eq!(strip(&l.dict), strip(&r.dict));
        }
        _ => assert_eq!(left, right),
    }
}

#[test]
fn test_standard_round_trip() {
    let (mut doc, ids) = populated_document();
    let bytes = doc.save_to_vec(SaveMode::Standard).unwrap();
    let mut reloaded = load(&bytes);

    for id in ids {
        let original = doc.resolve(id).unwrap().unwrap().clone();
        let copy = reloaded.resolve(id).unwrap().unwrap().clone();
        assert_same(&original, &copy);
    }
    assert_eq!(reloaded.trailer().get(b"Root"), doc.trailer().get(b"Root"));
}

#[test]
fn test_standard_round_trip_with_table() {
    let (mut doc, ids) = populated_document();
    let config = WriterConfiguration {
        xref_format: Some(XrefFormat::Table),
        compress_streams: false,
        ..WriterConfiguration::default()
    };
    let bytes = pdfcore::PdfWriter::new(&mut doc)
        .with_config(config)
        .write_to_vec()
        .unwrap();
    let mut reloaded = load(&bytes);
    assert_eq!(reloaded.xref_format(), XrefFormat::Table);
    let stream = reloaded.resolve(ids[2]).unwrap().unwrap().as_stream().unwrap();
    assert!(!stream.is_filtered());
    assert_eq!(stream.content(), CONTENT);
}

#[test]
fn test_loaded_file_round_trip() {
    let original = classic_pdf();
    let mut doc = load(&original);
    let bytes = doc.save_to_vec(SaveMode::Standard).unwrap();
    let mut reloaded = load(&bytes);

    // upgraded for the cross-reference stream
    assert_eq!(reloaded.version(), PdfVersion::V1_5);
    for number in 1..=6 {
        let a = doc.resolve(id(number)).unwrap().unwrap().clone();
        let b = reloaded.resolve(id(number)).unwrap().unwrap().clone();
        // the indirect /Length is written inline
        if let (Object::Stream(l), Object::Stream(r)) = (&a, &b) {
            assert_eq!(l.decoded_content().unwrap(), r.decoded_content().unwrap());
            continue;
        }
        assert_eq!(a, b);
    }
}

#[test]
fn test_packed_objects_survive_standard_save() {
    let mut doc = load(&packed_pdf());
    let bytes = doc.save_to_vec(SaveMode::Standard).unwrap();
    let mut reloaded = load(&bytes);

    assert!(matches!(
        reloaded.objects().location(4),
        Some(Location::Compressed { stream: 3, .. })
    ));
    let second = reloaded.resolve(id(5)).unwrap().unwrap().clone();
    assert_eq!(second.as_dict().unwrap().get(b"N"), Some(&Object::Integer(2)));

    // the old cross-reference stream became a free placeholder
    assert!(reloaded.objects().location(6).unwrap().is_free());
    assert_eq!(reloaded.resolve(id(6)).unwrap(), None);
}

#[test]
fn test_extends_survives_standard_save() {
    let mut doc = load(&extending_pdf());
    assert_eq!(extends_of(&mut doc, 5), Some(Object::Reference(id(3))));
    let bytes = doc.save_to_vec(SaveMode::Standard).unwrap();

    let mut reloaded = load(&bytes);
    assert_eq!(
        reloaded.objects().location(6),
        Some(Location::Compressed { stream: 5, index: 0 })
    );
    assert_eq!(extends_of(&mut reloaded, 5), Some(Object::Reference(id(3))));
    let extra = reloaded.resolve(id(6)).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(extra.get(b"Kind"), Some(&Object::Name(Name::from("Extra"))));
}

#[test]
fn test_packed_objects_unpacked_for_table_output() {
    let mut doc = load(&packed_pdf());
    let config = WriterConfiguration {
        xref_format: Some(XrefFormat::Table),
        ..WriterConfiguration::default()
    };
    let bytes = pdfcore::PdfWriter::new(&mut doc)
        .with_config(config)
        .write_to_vec()
        .unwrap();
    let mut reloaded = load(&bytes);
    assert!(matches!(
        reloaded.objects().location(4),
        Some(Location::InUse { .. })
    ));
    assert!(reloaded.objects().location(3).unwrap().is_free());
    let first = reloaded.resolve(id(4)).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(first.get(b"Kind"), Some(&Object::Name(Name::from("First"))));
}

#[test]
fn test_decode_is_idempotent_on_loaded_stream() {
    let mut doc = load(&populated_bytes());
    let target = id(5);
    let stream = doc
        .resolve_mut(target)
        .unwrap()
        .unwrap()
        .as_stream_mut()
        .unwrap();
    assert!(stream.is_filtered());
    let once = stream.decode().unwrap().to_vec();
    let twice = stream.decode().unwrap().to_vec();
    assert_eq!(once, twice);
    assert_eq!(once, CONTENT);
    assert_eq!(stream.kind(), StreamKind::Generic);
}

/// A standard save of the populated document: catalog 2, pages 1,
/// then objects 3, 4, 5
fn populated_bytes() -> Vec<u8> {
    let (mut doc, _) = populated_document();
    doc.save_to_vec(SaveMode::Standard).unwrap()
}
