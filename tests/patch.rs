use std::io::Write;

use pretty_assertions::assert_eq;

use dolpatch::assembler::{Item, Op};
use dolpatch::isa::{R0, R3, R30, R4, R31};
use dolpatch::writer::DolBuilder;
use dolpatch::{Error, Image, Instruction, SymbolTable};

const TEXT: u32 = 0x8000_3100;

/// One text segment at 0x80003100, file offset 0x100, size 0x200.
fn sample() -> Vec<u8> {
    let code: Vec<u8> = (0..0x200u32).map(|i| (i * 7) as u8).collect();
    DolBuilder::new(TEXT)
        .text(TEXT, code)
        .data(0x8040_0000, vec![0x55; 0x60])
        .bss(0x8041_0000, 0x400)
        .build()
        .unwrap()
}

fn temp_image(data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn patches_file_at_translated_offset() {
    let original = sample();
    let file = temp_image(&original);

    let mut image = Image::open_path(file.path()).unwrap();
    {
        let mut session = image.edit().unwrap();
        session
            .write_instructions(
                0x8000_3104,
                &[
                    Instruction::Or { ra: R3, rs: R30, rb: R30, record: false },
                    Instruction::Li { rd: R4, simm: 0x29 },
                ],
            )
            .unwrap();
    }

    let on_disk = std::fs::read(file.path()).unwrap();
    assert_eq!(&on_disk[0x104..0x10C], &[0x7F, 0xC3, 0xF3, 0x78, 0x38, 0x80, 0x00, 0x29]);
    assert_eq!(&on_disk[..0x104], &original[..0x104]);
    assert_eq!(&on_disk[0x10C..], &original[0x10C..]);
}

#[test]
fn unmodified_image_round_trips() {
    let original = sample();
    let file = temp_image(&original);

    let image = Image::open_path(file.path()).unwrap();
    assert_eq!(image.as_bytes(), original.as_slice());
    assert_eq!(image.header().as_bytes(), &original[..0x100]);

    let reopened = Image::from_bytes(image.to_bytes()).unwrap();
    assert_eq!(reopened.to_bytes(), original);

    let mut image = image;
    image.edit().unwrap().finish().unwrap();
    assert_eq!(std::fs::read(file.path()).unwrap(), original);
}

#[test]
fn header_padding_survives_patching() {
    let mut original = sample();
    original[0xE4..0x100].copy_from_slice(&[0xEE; 0x1C]);
    let mut image = Image::from_bytes(original.clone()).unwrap();
    let mut session = image.edit().unwrap();
    session.write_instructions(TEXT, &[Instruction::Blr]).unwrap();
    session.finish().unwrap();
    assert_eq!(&image.store()[..0x100], &original[..0x100]);
}

#[test]
fn rewriting_the_same_sequence_is_idempotent() {
    let sequence = [
        Instruction::Mflr { rd: R0 },
        Instruction::Stw { rs: R0, d: 4, ra: dolpatch::isa::R1 },
        Instruction::bl(0x8000_3100),
        Instruction::Blr,
    ];

    let mut once = Image::from_bytes(sample()).unwrap();
    once.edit().unwrap().write_instructions(0x8000_3200, &sequence).unwrap();

    let mut twice = Image::from_bytes(sample()).unwrap();
    {
        let mut session = twice.edit().unwrap();
        session.write_instructions(0x8000_3200, &sequence).unwrap();
        session.write_instructions(0x8000_3200, &sequence).unwrap();
    }
    twice.edit().unwrap().write_instructions(0x8000_3200, &sequence).unwrap();

    assert_eq!(once.store(), twice.store());
}

#[test]
fn one_bad_instruction_leaves_image_unchanged() {
    let mut image = Image::from_bytes(sample()).unwrap();
    let before = image.to_bytes();

    let mut session = image.edit().unwrap();
    let result = session.write_instructions(
        0x8000_3110,
        &[
            Instruction::Li { rd: R3, simm: 1 },
            Instruction::Li { rd: R4, simm: 0x10000 },
            Instruction::Blr,
        ],
    );
    assert!(matches!(result, Err(Error::OperandOutOfRange { .. })));

    let result = session.write_instructions(0x8000_3110, &[Instruction::Nop, Instruction::bl(0x8000_3112)]);
    assert!(matches!(result, Err(Error::MisalignedTarget { .. })));

    assert_eq!(session.read_bytes(0x8000_3110, 12).unwrap(), &before[0x110..0x11C]);
    session.finish().unwrap();

    assert!(!image.is_dirty());
    assert_eq!(image.as_bytes(), before.as_slice());
    assert_eq!(image.store().as_slice(), before.as_slice());
}

#[test]
fn write_past_segment_end_fails() {
    let mut image = Image::from_bytes(sample()).unwrap();
    let before = image.to_bytes();
    let mut session = image.edit().unwrap();

    // text0 ends at 0x80003300
    let result = session.write_instructions(0x8000_3304, &[Instruction::Nop]);
    assert!(matches!(result, Err(Error::AddressNotMapped { address: 0x8000_3304, .. })));

    let result = session.write_instructions(0x8000_32FC, &[Instruction::Nop, Instruction::Nop]);
    assert!(matches!(result, Err(Error::CrossSegmentWrite { .. })));

    let result = session.write_bytes(0x8041_0000, &[0; 4]);
    assert!(matches!(result, Err(Error::AddressNotMapped { .. })));

    session.finish().unwrap();
    assert_eq!(image.as_bytes(), before.as_slice());
}

#[test]
fn labelled_items_patch_a_hook() {
    let symbols: SymbolTable = [("OnFrame", 0x8000_3100u32)].into_iter().collect();
    let items = vec![
        Item::from(Instruction::Stwu { rs: dolpatch::isa::R1, d: -0x10, ra: dolpatch::isa::R1 }),
        Item::from(Instruction::Cmpwi { crf: dolpatch::isa::CR0, ra: R31, simm: 0 }),
        Item::from(Instruction::beq("skip")),
        Item::from(Op::LoadImmediate32 { rd: R3, value: 0x8040_0010 }),
        Item::from(Instruction::bl("OnFrame")),
        Item::from(Instruction::Addi { rd: dolpatch::isa::R1, ra: dolpatch::isa::R1, simm: 0x10 }).with_label("skip"),
        Item::from(Instruction::Blr),
    ];

    let mut image = Image::from_bytes(sample()).unwrap();
    image.edit().unwrap().write_items(0x8000_3200, &items, &symbols).unwrap();

    // beq at 0x80003208 skips forward to 0x80003218
    assert_eq!(image.read_u32(0x8000_3208).unwrap(), 0x4182_0010);
    assert_eq!(image.read_u32(0x8000_320C).unwrap(), 0x3C60_8040);
    assert_eq!(image.read_u32(0x8000_3210).unwrap(), 0x6063_0010);
    // bl at 0x80003214 back to 0x80003100
    assert_eq!(image.read_u32(0x8000_3214).unwrap(), 0x4BFF_FEED);
    assert_eq!(image.read_u32(0x8000_3218).unwrap(), 0x3821_0010);
}

#[test]
fn second_session_is_refused() {
    let mut image = Image::from_bytes(sample()).unwrap();
    image.begin_edit().unwrap();
    assert!(matches!(image.edit(), Err(Error::SessionAlreadyHeld)));
    image.commit().unwrap();
    assert!(image.edit().is_ok());
}

#[test]
fn truncated_file_is_rejected() {
    let original = sample();
    let file = temp_image(&original[..0x180]);
    assert!(matches!(Image::open_path(file.path()), Err(Error::Format(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Image::open_path(dir.path().join("missing.dol")),
        Err(Error::Io(_))
    ));
}
