//! Object lifecycle through save and reload: deletion, slot reuse,
//! packing and cloning.

mod common;

use common::*;
use pdfcore::{
    Dictionary, Location, Name, Object, ObjectId, PdfDocument, PdfError, PdfWriter, SaveMode,
    WriterConfiguration, XrefFormat,
};

fn id(number: u32) -> ObjectId {
    ObjectId::new(number, 0)
}

fn named(kind: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Kind", Name::from(kind));
    dict
}

fn reload(doc: &mut PdfDocument) -> PdfDocument {
    let bytes = doc.save_to_vec(SaveMode::Standard).unwrap();
    load(&bytes)
}

// ===========================================================================
// Deletion and slot reuse
// ===========================================================================

#[test]
fn test_deleted_object_survives_reload_as_free_slot() {
    let mut doc = PdfDocument::new();
    let ids: Vec<ObjectId> = ["a", "b", "c"]
        .iter()
        .map(|kind| doc.register(named(kind)))
        .collect();
    doc.delete(ids[1]).unwrap();
    assert_eq!(doc.resolve(ids[1]).unwrap(), None);

    let mut reloaded = reload(&mut doc);
    assert_eq!(
        reloaded.objects().location(ids[1].number),
        Some(Location::Free {
            next: 0,
            generation: 1
        })
    );
    assert_eq!(reloaded.resolve(ids[1]).unwrap(), None);
    for kept in [ids[0], ids[2]] {
        assert!(reloaded.resolve(kept).unwrap().is_some());
    }

    let reused = reloaded.register(named("d"));
    assert_eq!(reused, ObjectId::new(ids[1].number, 1));
    // the stale identifier still designates nothing
    assert_eq!(reloaded.resolve(ids[1]).unwrap(), None);
    let value = reloaded.resolve(reused).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(value.get(b"Kind"), Some(&Object::Name(Name::from("d"))));
}

#[test]
fn test_dangling_reference_resolves_to_none() {
    let mut doc = PdfDocument::new();
    let target = doc.register(named("target"));
    let mut holder = Dictionary::new();
    holder.set("Target", target);
    let holder = doc.register(holder);
    doc.delete(target).unwrap();

    let mut reloaded = reload(&mut doc);
    let link = reloaded
        .resolve(holder)
        .unwrap()
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Target")
        .cloned()
        .unwrap();
    assert_eq!(link, Object::Reference(target));
    assert_eq!(reloaded.deref(&link).unwrap(), None);
}

#[test]
fn test_delete_twice_fails() {
    let mut doc = load(&classic_pdf());
    doc.delete(id(6)).unwrap();
    assert!(matches!(doc.delete(id(6)), Err(PdfError::Contract(_))));
}

// ===========================================================================
// Editing loaded objects
// ===========================================================================

#[test]
fn test_set_value_and_mark_updated_on_loaded_objects() {
    let mut doc = load(&classic_pdf());
    assert!(!doc.objects().is_dirty(2));

    doc.set_value(id(6), named("replaced")).unwrap();
    doc.mark_updated(id(2)).unwrap();
    assert!(doc.objects().is_dirty(2));
    assert!(doc.objects().is_dirty(6));
    assert!(!doc.objects().is_dirty(3));

    let summary = PdfWriter::new(&mut doc)
        .with_config(WriterConfiguration::new(SaveMode::Incremental))
        .write_with_summary()
        .unwrap()
        .1;
    assert_eq!(summary.entries.keys().copied().collect::<Vec<_>>(), vec![2, 6]);
}

#[test]
fn test_set_value_on_missing_object_fails() {
    let mut doc = PdfDocument::new();
    assert!(doc.set_value(id(40), 1).is_err());
    assert!(doc.mark_updated(id(40)).is_err());
}

// ===========================================================================
// Object streams
// ===========================================================================

#[test]
fn test_packed_object_round_trip() {
    let mut doc = PdfDocument::new();
    let container = doc.new_object_stream().unwrap();
    let a = doc.register(named("a"));
    let b = doc.register(named("b"));
    doc.compress(a, container).unwrap();
    doc.compress(b, container).unwrap();

    let mut reloaded = reload(&mut doc);
    assert_eq!(
        reloaded.objects().location(a.number),
        Some(Location::Compressed {
            stream: container.number,
            index: 0
        })
    );
    assert_eq!(
        reloaded.objects().location(b.number),
        Some(Location::Compressed {
            stream: container.number,
            index: 1
        })
    );

    // moving the first member out shifts the second down
    reloaded.uncompress(a).unwrap();
    assert_eq!(
        reloaded.objects().location(b.number),
        Some(Location::Compressed {
            stream: container.number,
            index: 0
        })
    );

    let mut again = reload(&mut reloaded);
    match again.objects().location(a.number) {
        Some(Location::InUse { offset, .. }) => assert!(offset > 0),
        other => panic!("unexpected location {:?}", other),
    }
    let value = again.resolve(a).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(value.get(b"Kind"), Some(&Object::Name(Name::from("a"))));
    let value = again.resolve(b).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(value.get(b"Kind"), Some(&Object::Name(Name::from("b"))));
}

#[test]
fn test_table_output_unpacks_everything() {
    let mut doc = PdfDocument::new();
    let container = doc.new_object_stream().unwrap();
    let a = doc.register(named("a"));
    doc.compress(a, container).unwrap();

    let config = WriterConfiguration {
        xref_format: Some(XrefFormat::Table),
        ..WriterConfiguration::default()
    };
    let bytes = PdfWriter::new(&mut doc).with_config(config).write_to_vec().unwrap();
    let mut reloaded = load(&bytes);
    assert!(matches!(
        reloaded.objects().location(a.number),
        Some(Location::InUse { .. })
    ));
    assert!(reloaded.objects().location(container.number).unwrap().is_free());
    assert!(reloaded.resolve(a).unwrap().is_some());
    // the model of the saved document is unchanged
    assert!(doc.objects().location(a.number).unwrap().is_compressed());
}

#[test]
fn test_streams_cannot_be_packed() {
    let mut doc = PdfDocument::new();
    let container = doc.new_object_stream().unwrap();
    let stream = doc.register(pdfcore::Stream::new(Dictionary::new(), CONTENT.to_vec()));
    assert!(matches!(
        doc.compress(stream, container),
        Err(PdfError::Contract(_))
    ));
    assert!(matches!(
        doc.compress(container, container),
        Err(PdfError::Contract(_))
    ));
}

#[test]
fn test_container_with_members_cannot_be_deleted() {
    let mut doc = load(&packed_pdf());
    assert!(matches!(doc.delete(id(3)), Err(PdfError::Contract(_))));
    doc.uncompress(id(4)).unwrap();
    doc.uncompress(id(5)).unwrap();
    doc.delete(id(3)).unwrap();

    let mut reloaded = reload(&mut doc);
    assert!(reloaded.objects().location(3).unwrap().is_free());
    let second = reloaded.resolve(id(5)).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(second.get(b"N"), Some(&Object::Integer(2)));
}

// ===========================================================================
// Cloning
// ===========================================================================

#[test]
fn test_clone_between_documents_follows_references() {
    let mut source = PdfDocument::new();
    let pages = source
        .catalog()
        .unwrap()
        .get(b"Pages")
        .unwrap()
        .as_reference()
        .unwrap();
    let mut page = Dictionary::new();
    page.set("Type", Name::from("Page"));
    page.set("Parent", pages);
    let page = source.register(page);
    source
        .resolve_mut(pages)
        .unwrap()
        .unwrap()
        .as_dict_mut()
        .unwrap()
        .set("Kids", vec![Object::Reference(page)]);

    let mut target = PdfDocument::new();
    let before = target.objects().len();
    let copy = target.clone_object(&mut source, page).unwrap();
    // the page and its parent; the cycle back to the page is not copied twice
    assert_eq!(target.objects().len(), before + 2);

    let parent = target
        .resolve(copy)
        .unwrap()
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Parent")
        .unwrap()
        .as_reference()
        .unwrap();
    assert_ne!(parent, copy);
    let kids = target
        .resolve(parent)
        .unwrap()
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Kids")
        .unwrap()
        .as_array()
        .unwrap()
        .clone();
    assert_eq!(kids.get(0), Some(&Object::Reference(copy)));

    // copies are new objects and reach the output
    let mut reloaded = reload(&mut target);
    assert!(reloaded.resolve(copy).unwrap().is_some());
}

#[test]
fn test_clone_from_loaded_document_copies_stream() {
    let mut source = load(&classic_pdf());
    let mut target = PdfDocument::new();
    let copy = target.clone_object(&mut source, id(3)).unwrap();

    let contents = target
        .resolve(copy)
        .unwrap()
        .unwrap()
        .as_dict()
        .unwrap()
        .get(b"Contents")
        .unwrap()
        .as_reference()
        .unwrap();
    assert_eq!(stream_content(&mut target, contents.number), CONTENT);
}

#[test]
fn test_clone_from_document_copy_is_deep() {
    let mut doc = PdfDocument::new();
    let mut twin = doc.clone();
    let marker = twin.register(named("marker"));
    let unrelated = doc.register(named("unrelated"));
    assert_eq!(marker, unrelated);

    let copy = doc.clone_object(&mut twin, marker).unwrap();
    assert_ne!(copy, unrelated);
    let value = doc.resolve(copy).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(value.get(b"Kind"), Some(&Object::Name(Name::from("marker"))));
    let value = doc.resolve(unrelated).unwrap().unwrap().as_dict().unwrap();
    assert_eq!(value.get(b"Kind"), Some(&Object::Name(Name::from("unrelated"))));
}

#[test]
fn test_clone_object_stream_is_unsupported() {
    let mut source = load(&packed_pdf());
    let mut target = PdfDocument::new();
    assert!(matches!(
        target.clone_object(&mut source, id(3)),
        Err(PdfError::Unsupported(_))
    ));
}
