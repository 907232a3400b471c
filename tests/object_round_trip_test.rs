//! Serialization and parsing of every object kind

use pdf_vault::pdf::{
    decode_name, encode_name, parse_indirect_object, parse_object_bytes, Dictionary, Object, ObjectId, PdfString,
    Stream,
};
use pdf_vault::{Document, PDFError, PDFWriter};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn nested_dictionary() -> Object {
    let mut inner = Dictionary::new();
    inner.set("Empty", Dictionary::new());
    inner.set("Nothing", Object::Null);

    let mut dict = Dictionary::new();
    dict.set("Type", Object::name("Annot"));
    dict.set("Rect", vec![Object::integer(0), Object::real(10.5), Object::integer(-20), Object::real(0.125)]);
    dict.set("Contents", Object::string(b"(nested) \\ parens\r\n\x01".to_vec()));
    dict.set("ID", Object::hex_string(vec![0x00, 0xFF, 0x7F]));
    dict.set("Parent", ObjectId::new(4, 2));
    dict.set("Odd Name#", true);
    dict.set("Inner", inner);
    Object::Dictionary(dict)
}

#[rstest]
#[case(Object::Null)]
#[case(Object::from(true))]
#[case(Object::from(false))]
#[case(Object::integer(0))]
#[case(Object::integer(-2147483648))]
#[case(Object::real(3.25))]
#[case(Object::real(-0.5))]
#[case(Object::real(0.1234567))]
#[case(Object::real(1e-7))]
#[case(Object::real(-123456.000001))]
#[case(Object::real(1e20))]
#[case(Object::name("Type"))]
#[case(Object::name("A B/C(D)"))]
#[case(Object::name("Ünïcødé"))]
#[case(Object::name(b"F\xE91".to_vec()))]
#[case(Object::name(vec![0x80, 0xFF, b'#', b' ']))]
#[case(Object::string(b"plain text".to_vec()))]
#[case(Object::string(Vec::new()))]
#[case(Object::string((0u8..=255).collect::<Vec<_>>()))]
#[case(Object::hex_string(b"\x00\x01binary".to_vec()))]
#[case(Object::reference(12, 0))]
#[case(Object::Array(Vec::new()))]
#[case(Object::Array(vec![Object::reference(1, 0), Object::Null, Object::Array(vec![Object::integer(1)])]))]
#[case(Object::Dictionary(Dictionary::new()))]
#[case(nested_dictionary())]
fn test_direct_object_round_trip(#[case] object: Object) {
    let bytes = object.to_bytes();
    assert_eq!(parse_object_bytes(&bytes).unwrap(), object, "{}", String::from_utf8_lossy(&bytes));
}

#[test_log::test]
fn test_stream_round_trip() {
    let mut dict = Dictionary::new();
    dict.set("Subtype", Object::name("Form"));
    let content = b"endstream appears inside\r\nand binary \x00\xFF bytes".to_vec();
    let stream = Object::Stream(Stream::new(dict, content));

    let mut data = b"7 0 obj\n".to_vec();
    stream.write_to(&mut data);
    data.extend_from_slice(b"\nendobj\n");

    let (id, parsed) = parse_indirect_object(&data, 0, &|_| None).unwrap();
    assert_eq!(id, ObjectId::new(7, 0));
    assert_eq!(parsed, stream);
}

#[test_log::test]
fn test_catalog_object() {
    let (id, object) =
        parse_indirect_object(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj", 0, &|_| None).unwrap();
    assert_eq!(id, ObjectId::new(1, 0));

    let dict = object.as_dict().unwrap();
    assert_eq!(dict.get("Type"), Some(&Object::name("Catalog")));
    assert_eq!(dict.get("Pages"), Some(&Object::reference(2, 0)));
}

#[test_log::test]
fn test_name_encoding() {
    assert_eq!(Object::name("A B").to_bytes(), b"/A#20B");
    assert_eq!(encode_name("A B"), b"/A#20B");
    assert_eq!(decode_name(b"/A#20B"), "A B");
    assert_eq!(decode_name(b"/Lime#20Green"), "Lime Green");
    assert_eq!(decode_name(b"/F#E91").as_bytes(), b"F\xE91");
}

#[test_log::test]
fn test_non_utf8_resource_names_survive_rewrite() {
    let source = b"<< /Font << /F#E91 5 0 R /F2 6 0 R >> >>";
    let parsed = parse_object_bytes(source).unwrap();
    assert_eq!(parsed.to_bytes(), source.to_vec());

    let fonts = parsed.as_dict().unwrap().get_dict("Font").unwrap();
    assert_eq!(fonts.get(b"F\xE91"), Some(&Object::reference(5, 0)));
    assert_eq!(fonts.get("F2"), Some(&Object::reference(6, 0)));
    assert_eq!(fonts.len(), 2);
}

#[test_log::test]
fn test_number_formatting() {
    assert_eq!(Object::integer(42).to_bytes(), b"42");
    assert_eq!(Object::real(1.5).to_bytes(), b"1.5");
    assert_eq!(Object::real(2.0).to_bytes(), b"2");
    assert_eq!(Object::real(-0.0).to_bytes(), b"0");
    assert_eq!(Object::real(0.000_001).to_bytes(), b"0.000001");
    assert_eq!(Object::real(0.1234567).to_bytes(), b"0.1234567");
    assert_eq!(Object::real(1e-7).to_bytes(), b"0.0000001");
}

#[test_log::test]
fn test_string_formats() {
    assert_eq!(Object::string(b"a(b)c\\".to_vec()).to_bytes(), b"(a\\(b\\)c\\\\)");
    assert_eq!(Object::hex_string(vec![0xAB, 0x01]).to_bytes(), b"<AB01>");
    assert_eq!(Object::Dictionary(Dictionary::new()).to_bytes(), b"<< >>");
}

#[test_log::test]
fn test_odd_hex_is_padded() {
    let parsed = parse_object_bytes(b"<ABC>").unwrap();
    assert_eq!(parsed.as_bytes(), Some(&[0xAB, 0xC0][..]));
    assert_eq!(PdfString::from_hex_digits(b"F").unwrap().as_bytes(), &[0xF0]);
}

#[test_log::test]
fn test_unconvertible_values() {
    assert!(matches!(Object::try_from(f64::NAN), Err(PDFError::Conversion { .. })));
    assert!(matches!(Object::try_from(u64::MAX), Err(PDFError::Conversion { .. })));
    assert_eq!(Object::try_from(7usize).unwrap(), Object::integer(7));
}

#[rstest]
#[case(b"".to_vec())]
#[case(b"not a pdf at all".to_vec())]
#[case(b"%PDF-1.4\n1 0 obj << >> endobj\n".to_vec())]
#[case(b"%PDF-1.4\nxref\n0 1\n0000000000 65535 f \ntrailer << /Size 1 >>\nstartxref\n999\n%%EOF".to_vec())]
fn test_structural_errors_fail_fast(#[case] data: Vec<u8>) {
    let err = Document::load(data).unwrap_err();
    assert!(err.is_structure_error(), "{:?}", err);
}

#[test_log::test]
fn test_missing_reference_is_null() {
    let mut doc = Document::new();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::name("Catalog"));
    catalog.set("Outlines", ObjectId::new(99, 0));
    let catalog = doc.add_object(catalog);
    doc.trailer_mut().root = Some(catalog);

    let bytes = PDFWriter::default().write(&doc).unwrap();
    let reparsed = Document::load(bytes).unwrap();
    let outlines = reparsed.catalog().unwrap().get("Outlines").unwrap();
    assert_eq!(reparsed.resolve(outlines).unwrap(), &Object::Null);
    assert!(reparsed.get_object(ObjectId::new(99, 0)).unwrap_err().is_recoverable());
}
