use super::{
    BLOCKS_PER_AU, BLOCKS_PER_DISK, BLOCK_SIZE, FAT_BLOCKS, ROOT_DIR_ENTRIES,
};

pub const MAGIC_NUMBER: u16 = 0xAA55;
pub const MEDIA_DESCRIPTOR: u8 = 0xF0;

/// First three bytes of each FAT: the media descriptor in entry 0 and an
/// end-of-chain marker in entry 1.
pub const FAT_HEADER: [u8; 3] = [MEDIA_DESCRIPTOR, 0xFF, 0xFF];

const BYTES_PER_SECTOR_OFFSET: usize = 0x0B;
const SECTORS_PER_CLUSTER_OFFSET: usize = 0x0D;
const TOTAL_SECTORS_OFFSET: usize = 0x13;
const SERIAL_OFFSET: usize = 0x27;
const LABEL_OFFSET: usize = 0x2B;
const FS_TYPE_OFFSET: usize = 0x36;
const BOOT_CODE_OFFSET: usize = 0x3E;
const MAGIC_OFFSET: usize = 0x1FE;

pub const LABEL_LEN: usize = 11;

// prints the message at 0x7C5A through the BIOS teletype service and halts
const BOOT_CODE: [u8; 28] = [
    0xFA, // cli
    0x31, 0xC0, // xor ax, ax
    0x8E, 0xD0, // mov ss, ax
    0xBC, 0x00, 0x7C, // mov sp, 0x7c00
    0xFB, // sti
    0x8E, 0xD8, // mov ds, ax
    0xBE, 0x5A, 0x7C, // mov si, 0x7c5a
    0xAC, // lodsb
    0x08, 0xC0, // or al, al
    0x74, 0x06, // jz halt
    0xB4, 0x0E, // mov ah, 0x0e
    0xCD, 0x10, // int 0x10
    0xEB, 0xF5, // jmp lodsb
    0xF4, // halt: hlt
    0xEB, 0xFD, // jmp halt
];
const BOOT_MESSAGE: &[u8] = b"This is not a bootable disk.\r\n\0";

/// Block 0 of every image, before the serial number and label are stamped.
pub const TEMPLATE: [u8; BLOCK_SIZE] = template();

const fn template() -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];

    block = put(block, 0x00, &[0xEB, 0x3C, 0x90]);
    block = put(block, 0x03, b"MSDOS5.0");
    block = put(block, BYTES_PER_SECTOR_OFFSET, &(BLOCK_SIZE as u16).to_le_bytes());
    block[SECTORS_PER_CLUSTER_OFFSET] = BLOCKS_PER_AU as u8;
    block = put(block, 0x0E, &1u16.to_le_bytes()); // reserved sectors
    block[0x10] = 2; // fat count
    block = put(block, 0x11, &(ROOT_DIR_ENTRIES as u16).to_le_bytes());
    block = put(block, TOTAL_SECTORS_OFFSET, &(BLOCKS_PER_DISK as u16).to_le_bytes());
    block[0x15] = MEDIA_DESCRIPTOR;
    block = put(block, 0x16, &(FAT_BLOCKS as u16).to_le_bytes());
    block = put(block, 0x18, &18u16.to_le_bytes()); // sectors per track
    block = put(block, 0x1A, &2u16.to_le_bytes()); // heads
    block[0x26] = 0x29; // extended boot signature
    block = put(block, LABEL_OFFSET, b"NO NAME    ");
    block = put(block, FS_TYPE_OFFSET, b"FAT12   ");
    block = put(block, BOOT_CODE_OFFSET, &BOOT_CODE);
    block = put(block, BOOT_CODE_OFFSET + BOOT_CODE.len(), BOOT_MESSAGE);
    block = put(block, MAGIC_OFFSET, &MAGIC_NUMBER.to_le_bytes());

    block
}

const fn put(mut block: [u8; BLOCK_SIZE], offset: usize, bytes: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut i = 0;
    while i < bytes.len() {
        block[offset + i] = bytes[i];
        i += 1;
    }
    block
}

/// Copies the template into `block` and stamps the volume serial and label.
pub fn stamp(block: &mut [u8], serial: u32, label: &[u8; LABEL_LEN]) {
    block[..BLOCK_SIZE].copy_from_slice(&TEMPLATE);
    block[SERIAL_OFFSET..SERIAL_OFFSET + 4].copy_from_slice(&serial.to_le_bytes());
    block[LABEL_OFFSET..LABEL_OFFSET + LABEL_LEN].copy_from_slice(label);
}

#[inline]
fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Whether `bytes` starts with the boot sector of a 1.44 MB floppy.
pub fn has_floppy_header(bytes: &[u8]) -> bool {
    bytes.len() >= BLOCK_SIZE
        && read_u16(bytes, MAGIC_OFFSET) == MAGIC_NUMBER
        && read_u16(bytes, BYTES_PER_SECTOR_OFFSET) as usize == BLOCK_SIZE
        && bytes[SECTORS_PER_CLUSTER_OFFSET] as usize == BLOCKS_PER_AU
        && read_u16(bytes, TOTAL_SECTORS_OFFSET) as usize == BLOCKS_PER_DISK
}

/// The identifying fields of a stamped boot sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSector {
    pub serial: u32,
    pub label: [u8; LABEL_LEN],
    pub fs_type: [u8; 8],
}

impl BootSector {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if !has_floppy_header(bytes) {
            return None;
        }

        let mut label = [0u8; LABEL_LEN];
        label.copy_from_slice(&bytes[LABEL_OFFSET..LABEL_OFFSET + LABEL_LEN]);
        let mut fs_type = [0u8; 8];
        fs_type.copy_from_slice(&bytes[FS_TYPE_OFFSET..FS_TYPE_OFFSET + 8]);

        Some(Self {
            serial: u32::from_le_bytes([
                bytes[SERIAL_OFFSET],
                bytes[SERIAL_OFFSET + 1],
                bytes[SERIAL_OFFSET + 2],
                bytes[SERIAL_OFFSET + 3],
            ]),
            label,
            fs_type,
        })
    }

    pub fn label_str(&self) -> String {
        String::from_utf8_lossy(&self.label).trim_end().to_string()
    }
}
