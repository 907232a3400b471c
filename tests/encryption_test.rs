//! Whole-document encryption and decryption

use pdf_vault::handlers::{handler_for, Aes128Handler};
use pdf_vault::pdf::{Dictionary, Object, ObjectId, Stream};
use pdf_vault::security::{Decryptor, Encryptor};
use pdf_vault::{
    Document, EncryptionAlgorithm, EncryptionHandler, EncryptionOptions, PDFError, PDFVault, PDFWriter,
    PasswordKind, Permission, Permissions,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

const CONTENT: &[u8] = b"BT /F1 24 Tf 72 720 Td (Hello, encrypted world) Tj ET";
const TITLE: &[u8] = b"Annual report (draft)";

fn one_page_document() -> Document {
    let mut doc = Document::new();
    let content = doc.add_object(Stream::new(Dictionary::new(), CONTENT.to_vec()));
    let pages = doc.next_object_id();
    doc.insert_object(pages, Dictionary::new());

    let mut font = Dictionary::new();
    font.set("Type", Object::name("Font"));
    font.set("Subtype", Object::name("Type1"));
    font.set("BaseFont", Object::name("Helvetica"));
    let mut fonts = Dictionary::new();
    fonts.set("F1", font);
    let mut resources = Dictionary::new();
    resources.set("Font", fonts);

    let mut page = Dictionary::new();
    page.set("Type", Object::name("Page"));
    page.set("Parent", pages);
    page.set("MediaBox", vec![Object::integer(0), Object::integer(0), Object::integer(612), Object::integer(792)]);
    page.set("Resources", resources);
    page.set("Contents", content);
    let page = doc.add_object(page);

    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::name("Pages"));
    pages_dict.set("Kids", vec![Object::from(page)]);
    pages_dict.set("Count", 1);
    doc.insert_object(pages, pages_dict);

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::name("Catalog"));
    catalog.set("Pages", pages);
    let catalog = doc.add_object(catalog);

    let mut info = Dictionary::new();
    info.set("Title", Object::string(TITLE.to_vec()));
    let info = doc.add_object(info);

    doc.trailer_mut().root = Some(catalog);
    doc.trailer_mut().info = Some(info);
    doc
}

fn plain_bytes() -> Vec<u8> {
    PDFWriter::default().write(&one_page_document()).unwrap()
}

fn page_content(document: &Document) -> Vec<u8> {
    let contents = document.get_page(0).unwrap().get_reference("Contents").unwrap();
    document.get_object(contents).unwrap().as_stream().unwrap().content().to_vec()
}

fn title(document: &Document) -> Vec<u8> {
    document.info().unwrap().unwrap().get_string("Title").unwrap().to_vec()
}

#[test_log::test]
fn test_aes128_content_decrypts_with_derived_key() {
    let keyed = Encryptor::new(one_page_document(), Box::new(Aes128Handler::default()))
        .unwrap()
        .derive_keys("user", "owner", Permissions::allow_all(), None)
        .unwrap();
    let file_key = keyed.context().file_key().to_vec();
    let bytes = keyed.rewrite().unwrap().serialize(&PDFWriter::default()).unwrap();

    let encrypted = Document::load(bytes).unwrap();
    assert!(encrypted.is_encrypted());
    assert_eq!(encrypted.version(), "1.5");

    let contents = encrypted.get_page(0).unwrap().get_reference("Contents").unwrap();
    let ciphertext = encrypted.get_object(contents).unwrap().as_stream().unwrap().content();
    assert_ne!(ciphertext, CONTENT);
    assert_eq!(ciphertext.len(), 16 + (CONTENT.len() / 16 + 1) * 16);

    let handler = Aes128Handler::default();
    let plaintext = handler
        .decrypt(ciphertext, &file_key, contents.number(), contents.generation())
        .unwrap();
    assert_eq!(plaintext, CONTENT);

    let info = encrypted.trailer().info.unwrap();
    let encrypted_title = encrypted.get_object(info).unwrap().as_dict().unwrap().get_string("Title").unwrap();
    assert_eq!(
        handler.decrypt(encrypted_title, &file_key, info.number(), info.generation()).unwrap(),
        TITLE
    );
}

#[rstest]
#[case(EncryptionAlgorithm::RC4_40)]
#[case(EncryptionAlgorithm::RC4_128)]
#[case(EncryptionAlgorithm::AES_128)]
#[case(EncryptionAlgorithm::AES_256)]
fn test_vault_round_trip(#[case] algorithm: EncryptionAlgorithm) {
    let vault = PDFVault::new();
    let options = EncryptionOptions::new(algorithm)
        .user_password("open sesame")
        .owner_password("master key");

    let encrypted = vault.encrypt(plain_bytes(), &options).unwrap();
    assert!(!encrypted.windows(CONTENT.len()).any(|w| w == CONTENT));

    for password in ["open sesame", "master key"] {
        let decrypted = Document::load(vault.decrypt(encrypted.clone(), password).unwrap()).unwrap();
        assert!(!decrypted.is_encrypted());
        assert_eq!(page_content(&decrypted), CONTENT);
        assert_eq!(title(&decrypted), TITLE);
        assert_eq!(decrypted.page_count().unwrap(), 1);
    }

    assert!(matches!(
        vault.decrypt(encrypted, "guess"),
        Err(PDFError::AuthenticationFailed)
    ));
}

#[rstest]
#[case(EncryptionAlgorithm::RC4_40, 1, 2, 40, "1.4")]
#[case(EncryptionAlgorithm::RC4_128, 2, 3, 128, "1.4")]
#[case(EncryptionAlgorithm::AES_128, 4, 4, 128, "1.5")]
#[case(EncryptionAlgorithm::AES_256, 5, 6, 256, "1.7")]
fn test_encryption_dictionary(
    #[case] algorithm: EncryptionAlgorithm,
    #[case] version: i64,
    #[case] revision: i64,
    #[case] bits: i64,
    #[case] pdf_version: &str,
) {
    let permissions = Permissions::deny_all().with(Permission::Print).with(Permission::Copy);
    let options = EncryptionOptions::new(algorithm).user_password("u").permissions(permissions);
    let bytes = PDFVault::new().encrypt(plain_bytes(), &options).unwrap();
    let document = Document::load(bytes.clone()).unwrap();
    assert_eq!(document.version(), pdf_version);
    assert_eq!(document.trailer().file_id().map(<[u8]>::len), Some(16));

    let dict = document.get_object(document.trailer().encrypt.unwrap()).unwrap().as_dict().unwrap();
    assert_eq!(dict.get_name("Filter"), Some("Standard"));
    assert_eq!(dict.get_integer("V"), Some(version));
    assert_eq!(dict.get_integer("R"), Some(revision));
    assert_eq!(dict.get_integer("Length"), Some(bits));
    assert_eq!(dict.get_integer("P"), Some(i64::from(permissions.value())));

    let (o, u) = (dict.get_string("O").unwrap(), dict.get_string("U").unwrap());
    if algorithm == EncryptionAlgorithm::AES_256 {
        assert_eq!((o.len(), u.len()), (48, 48));
        assert_eq!(dict.get_string("OE").map(<[u8]>::len), Some(32));
        assert_eq!(dict.get_string("UE").map(<[u8]>::len), Some(32));
        assert_eq!(dict.get_string("Perms").map(<[u8]>::len), Some(16));
    } else {
        assert_eq!((o.len(), u.len()), (32, 32));
    }

    let method = dict.get_dict("CF").and_then(|cf| cf.get_dict("StdCF")).and_then(|f| f.get_name("CFM"));
    match algorithm {
        EncryptionAlgorithm::AES_128 => assert_eq!(method, Some("AESV2")),
        EncryptionAlgorithm::AES_256 => assert_eq!(method, Some("AESV3")),
        _ => assert_eq!(method, None),
    }

    let info = PDFVault::new().get_encryption_info(bytes).unwrap().unwrap();
    assert_eq!(info.algorithm, algorithm);
    assert_eq!(info.permissions, permissions);
    assert!(info.permissions.is_allowed(Permission::Print));
    assert!(!info.permissions.is_allowed(Permission::Modify));
}

#[test_log::test]
fn test_info_for_plain_document() {
    assert_eq!(PDFVault::new().get_encryption_info(plain_bytes()).unwrap(), None);
}

#[test_log::test]
fn test_empty_user_password_opens_with_empty_string() {
    let options = EncryptionOptions::new(EncryptionAlgorithm::AES_256).owner_password("owner");
    let bytes = PDFVault::new().encrypt(plain_bytes(), &options).unwrap();

    let decryptor = Decryptor::new(Document::load(bytes).unwrap()).unwrap();
    assert_eq!(decryptor.authenticate("").unwrap().kind(), PasswordKind::User);
    let (document, kind) = decryptor.decrypt("owner").unwrap();
    assert_eq!(kind, PasswordKind::Owner);
    assert_eq!(page_content(&document), CONTENT);
}

#[test_log::test]
fn test_metadata_left_in_clear() {
    let xmp = b"<?xpacket begin=''?><x:xmpmeta xmlns:x='adobe:ns:meta/'/><?xpacket end='w'?>".to_vec();
    let mut document = one_page_document();
    let mut meta = Dictionary::new();
    meta.set("Type", Object::name("Metadata"));
    meta.set("Subtype", Object::name("XML"));
    let metadata = document.add_object(Stream::new(meta, xmp.clone()));
    let root = document.trailer().root.unwrap();
    document.get_object_mut(root).unwrap().as_dict_mut().unwrap().set("Metadata", metadata);

    let options = EncryptionOptions::new(EncryptionAlgorithm::AES_128)
        .user_password("u")
        .encrypt_metadata(false);
    let bytes = PDFVault::new().encrypt_document(document, &options).unwrap();
    assert!(bytes.windows(xmp.len()).any(|w| w == xmp.as_slice()));

    let encrypted = Document::load(bytes.clone()).unwrap();
    let dict = encrypted.get_object(encrypted.trailer().encrypt.unwrap()).unwrap().as_dict().unwrap();
    assert_eq!(dict.get_bool("EncryptMetadata"), Some(false));

    let decrypted = PDFVault::new().decrypt_document(encrypted, "u").unwrap();
    assert_eq!(page_content(&decrypted), CONTENT);
}

#[test_log::test]
fn test_compressed_then_encrypted() {
    let options = EncryptionOptions::new(EncryptionAlgorithm::RC4_128)
        .user_password("u")
        .compress_streams(true);
    let mut document = one_page_document();
    let content = document.get_page(0).unwrap().get_reference("Contents").unwrap();
    document
        .get_object_mut(content)
        .unwrap()
        .as_stream_mut()
        .unwrap()
        .set_content(CONTENT.repeat(10));

    let bytes = PDFVault::new().encrypt_document(document, &options).unwrap();
    let decrypted = PDFVault::new().decrypt_document(Document::load(bytes).unwrap(), "u").unwrap();

    let contents = decrypted.get_page(0).unwrap().get_reference("Contents").unwrap();
    let stream = decrypted.get_object(contents).unwrap().as_stream().unwrap();
    assert_eq!(stream.dict().get_name("Filter"), Some("FlateDecode"));
    assert_eq!(stream.decoded_content().unwrap(), CONTENT.repeat(10));
}

#[test_log::test]
fn test_already_encrypted_rejected() {
    let options = EncryptionOptions::new(EncryptionAlgorithm::AES_128).user_password("u");
    let encrypted = PDFVault::new().encrypt(plain_bytes(), &options).unwrap();
    assert!(matches!(
        PDFVault::new().encrypt(encrypted, &options),
        Err(PDFError::InvalidState(_))
    ));
}

#[test_log::test]
fn test_sparse_numbers_do_not_collide() {
    let mut document = Document::new();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::name("Catalog"));
    catalog.set("Pages", ObjectId::new(9, 0));
    document.insert_object(ObjectId::new(5, 0), catalog);
    let mut pages = Dictionary::new();
    pages.set("Type", Object::name("Pages"));
    pages.set("Kids", Vec::<Object>::new());
    pages.set("Count", 0);
    document.insert_object(ObjectId::new(9, 0), pages);
    document.trailer_mut().root = Some(ObjectId::new(5, 0));

    let rewritten = Encryptor::new(document, handler_for(EncryptionAlgorithm::RC4_128, true))
        .unwrap()
        .derive_keys("", "", Permissions::allow_all(), None)
        .unwrap()
        .rewrite()
        .unwrap();
    assert_eq!(rewritten.encrypt_id(), ObjectId::new(3, 0));
    assert_eq!(rewritten.document().len(), 3);

    let reparsed = Document::load(rewritten.serialize(&PDFWriter::default()).unwrap()).unwrap();
    assert_eq!(reparsed.catalog().unwrap().get_reference("Pages"), Some(ObjectId::new(2, 0)));
}

#[test_log::test]
fn test_file_facade() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.pdf");
    let encrypted = dir.path().join("encrypted.pdf");
    let decrypted = dir.path().join("decrypted.pdf");
    std::fs::write(&plain, plain_bytes()).unwrap();

    let vault = PDFVault::new();
    let options = EncryptionOptions::new(EncryptionAlgorithm::AES_256).user_password("u");
    vault.encrypt_file(&plain, &encrypted, &options).unwrap();
    vault.decrypt_file(&encrypted, &decrypted, "u").unwrap();
    assert_eq!(page_content(&Document::load_file(&decrypted).unwrap()), CONTENT);

    // Failed operations leave no output behind
    let missing = dir.path().join("missing.pdf");
    let output = dir.path().join("never.pdf");
    let err = vault.encrypt_file(&missing, &output, &options).unwrap_err();
    assert!(matches!(err, PDFError::Io { ref path, .. } if path == &missing));
    assert!(vault.decrypt_file(&encrypted, &output, "wrong").is_err());
    assert!(!output.exists());
}
